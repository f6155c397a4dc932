use serde::Serialize;
use tracing::{debug, info, trace};

use crate::chain::{Acceptance, ChainCheckpoint, Constraint, check_all};
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::partition::Assignment;
use crate::recom::Proposal;
use crate::retry::with_retries;
use crate::rng::{ChainRng, derive_seed, seeded};

/// Counters describing how a chain spent its proposals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChainStats {
    /// Proposal attempts, successful or not.
    pub proposals: usize,
    /// Attempts where the proposal found no balanced cut.
    pub failed_proposals: usize,
    /// Candidates rejected by a constraint.
    pub constraint_rejections: usize,
    /// Valid candidates the acceptance rule declined.
    pub acceptance_rejections: usize,
    /// Candidates adopted as the new state.
    pub accepted: usize,
}

/// A single-threaded Markov chain over assignments.
///
/// Yields `total_steps` items: the initial state first, then the chain state after
/// each step. A step retries proposals until one satisfies every constraint; running
/// out of attempts is fatal. After an error the iterator is exhausted.
pub struct MarkovChain<'g, P, A> {
    graph: &'g Graph,
    proposal: P,
    constraints: Vec<Box<dyn Constraint>>,
    acceptance: A,
    state: Assignment,
    rng: ChainRng,
    total_steps: usize,
    step: usize,               // number of items yielded so far
    max_attempts: usize,
    stats: ChainStats,
    finished: bool,
}

/// Default bound on proposal attempts per step.
pub const DEFAULT_MAX_STEP_ATTEMPTS: usize = 10_000;

impl<'g, P: Proposal, A: Acceptance> MarkovChain<'g, P, A> {
    /// Build a chain, checking the initial state against every constraint.
    pub fn new(
        graph: &'g Graph,
        proposal: P,
        constraints: Vec<Box<dyn Constraint>>,
        acceptance: A,
        initial: Assignment,
        total_steps: usize,
        rng: ChainRng,
    ) -> Result<Self> {
        if initial.node_count() != graph.node_count() {
            return Err(Error::InvalidAssignment(format!(
                "initial state covers {} nodes, graph has {}", initial.node_count(), graph.node_count()
            )));
        }
        if let Some(c) = constraints.iter().find(|c| !c.is_satisfied(graph, &initial)) {
            return Err(Error::InitialStateInvalid { constraint: c.name() });
        }

        Ok(Self {
            graph,
            proposal,
            constraints,
            acceptance,
            state: initial,
            rng,
            total_steps,
            step: 0,
            max_attempts: DEFAULT_MAX_STEP_ATTEMPTS,
            stats: ChainStats::default(),
            finished: false,
        })
    }

    /// Continue a chain from a checkpoint.
    ///
    /// The checkpointed state is not yielded again; the next item has index
    /// `checkpoint.step + 1`. The random stream is derived from `(seed, checkpoint.step)`.
    pub fn resume(
        graph: &'g Graph,
        proposal: P,
        constraints: Vec<Box<dyn Constraint>>,
        acceptance: A,
        checkpoint: &ChainCheckpoint,
        total_steps: usize,
        seed: u64,
    ) -> Result<Self> {
        if checkpoint.step >= total_steps {
            return Err(Error::InvalidConfig(format!(
                "checkpoint step {} is not before total_steps {total_steps}", checkpoint.step
            )));
        }

        let state = checkpoint.restore(graph)?;
        let rng = seeded(derive_seed(seed, checkpoint.step as u64));
        let mut chain = Self::new(graph, proposal, constraints, acceptance, state, total_steps, rng)?;
        chain.step = checkpoint.step + 1;

        info!(step = checkpoint.step, total_steps, "resuming chain from checkpoint");
        Ok(chain)
    }

    /// Replace the per-step proposal attempt bound.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        assert!(max_attempts > 0, "max_attempts must be at least 1");
        self.max_attempts = max_attempts;
        self
    }

    #[inline] pub fn graph(&self) -> &'g Graph { self.graph }

    /// The current (last yielded) state.
    #[inline] pub fn state(&self) -> &Assignment { &self.state }

    /// Number of items yielded so far.
    #[inline] pub fn step(&self) -> usize { self.step }

    #[inline] pub fn total_steps(&self) -> usize { self.total_steps }

    #[inline] pub fn stats(&self) -> ChainStats { self.stats }

    /// Snapshot of the last yielded state, or None before the first item.
    pub fn checkpoint(&self) -> Option<ChainCheckpoint> {
        let step = self.step.checked_sub(1)?;
        Some(ChainCheckpoint { step, n_parts: self.state.n_parts(), labels: self.state.labels().to_vec() })
    }

    /// Restart the chain from `state` for `total_steps` more items, keeping the
    /// random stream and statistics. `state` is yielded first.
    pub(crate) fn rebase(&mut self, state: Assignment, total_steps: usize) {
        debug_assert!(check_all(&self.constraints, self.graph, &state).is_ok(), "rebased onto an invalid state");
        self.state = state;
        self.total_steps = total_steps;
        self.step = 0;
        self.finished = false;
    }

    /// Run one step: propose until a candidate passes every constraint, then apply the acceptance rule.
    fn advance(&mut self) -> Result<()> {
        let graph = self.graph;
        let step = self.step;

        let outcome = with_retries(self.max_attempts, |attempt| {
            self.stats.proposals += 1;
            trace!(step, attempt, "proposing");

            let candidate = self.proposal.propose(graph, &self.state, &mut self.rng)
                .inspect_err(|err| if err.is_retryable() { self.stats.failed_proposals += 1 })?;

            check_all(&self.constraints, graph, &candidate).inspect_err(|err| {
                self.stats.constraint_rejections += 1;
                debug!(step, attempt, error = %err, "candidate rejected");
            })?;

            Ok(candidate)
        });

        let candidate = match outcome {
            Ok(candidate) => candidate,
            Err(err) if err.is_retryable() => return Err(Error::StepRetriesExhausted {
                step,
                attempts: self.max_attempts,
                last: Box::new(err),
            }),
            Err(err) => return Err(err),
        };

        if self.acceptance.accept(graph, &self.state, &candidate, &mut self.rng)? {
            self.stats.accepted += 1;
            self.state = candidate;
        } else {
            self.stats.acceptance_rejections += 1;
            debug!(step, "acceptance rule kept the current state");
        }
        Ok(())
    }
}

impl<P: Proposal, A: Acceptance> Iterator for MarkovChain<'_, P, A> {
    type Item = Result<Assignment>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.step >= self.total_steps { return None }

        if self.step > 0 {
            if let Err(err) = self.advance() {
                self.finished = true;
                return Some(Err(err));
            }
        }

        self.step += 1;
        Some(Ok(self.state.clone()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished { return (0, Some(0)) }
        (0, Some(self.total_steps.saturating_sub(self.step)))
    }
}
