//! Top-level ensemble runs: resolve the starting state, drive a chain or short
//! bursts, and hand every yielded step to a sink.

use std::io::Write;

use serde::Serialize;
use tracing::info;

use crate::chain::{Acceptance, AlwaysAccept, ChainStats, Constraint, Contiguous, MarkovChain, Tilted, WithinPopulation};
use crate::config::{ResolvedConfig, RunConfig};
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::io::{Recorder, StepSink};
use crate::optimize::{BurstSummary, Objective, ScoreFunction, ShortBursts};
use crate::partition::Assignment;
use crate::recom::Recom;
use crate::rng::{ChainRng, seeded};

/// Where a run starts.
#[derive(Clone, Debug, PartialEq)]
pub enum InitialAssignment {
    /// A precomputed label per node, in canonical node order.
    Labels(Vec<u32>),
    /// Labels stored in a numeric node attribute, such as `init_part_1`.
    Attribute(String),
    /// A random balanced partition drawn from the run's random source.
    Random,
}

impl InitialAssignment {
    pub fn resolve(&self, graph: &Graph, config: &ResolvedConfig, rng: &mut ChainRng) -> Result<Assignment> {
        match self {
            InitialAssignment::Labels(labels) => Assignment::from_labels(graph, labels.clone(), config.n_parts),
            InitialAssignment::Attribute(name) => Assignment::from_attribute(graph, name, config.n_parts),
            InitialAssignment::Random => Assignment::from_balanced_random_with(
                graph, config.n_parts, config.pop, &config.partition, rng,
            ),
        }
    }
}

/// What a run produced, independent of the sink.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunOutcome {
    /// Steps handed to the sink.
    pub steps: usize,
    pub stats: ChainStats,
    /// Highest score seen, when the run has a score.
    pub best_score: Option<f64>,
    /// Per-burst summaries of a short-burst run; empty otherwise.
    pub bursts: Vec<BurstSummary>,
}

/// Outcome of a recorded run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunSummary {
    #[serde(flatten)]
    pub outcome: RunOutcome,
    /// Hex sha256 of the BEN stream written.
    pub ben_sha256: String,
}

/// Resolve `config` against `graph`, run it, and record every step as BEN frames
/// into `ben` and JSONL tally lines into `jsonl`.
pub fn run_ensemble<B: Write, J: Write>(
    graph: &Graph,
    initial: &InitialAssignment,
    config: &RunConfig,
    ben: B,
    jsonl: J,
) -> Result<RunSummary> {
    let resolved = config.resolve(graph)?;
    let mut recorder = Recorder::new(resolved.tallies.clone(), ben, jsonl)?;
    let outcome = run_with_sink(graph, initial, &resolved, &mut recorder)?;
    let record = recorder.finish()?;

    if record.steps != outcome.steps {
        return Err(Error::InvariantViolation(format!(
            "recorded {} steps but the run yielded {}", record.steps, outcome.steps
        )));
    }
    Ok(RunSummary { outcome, ben_sha256: record.ben_sha256 })
}

/// Run a resolved configuration, handing each yielded step to `sink` in order.
///
/// Plain runs yield `total_steps` states. With a burst length, the run is
/// `total_steps / burst_length` short bursts; with a tilt probability, the chain
/// uses tilted acceptance. Any error stops the run; steps already handed to the
/// sink stay recorded.
pub fn run_with_sink(
    graph: &Graph,
    initial: &InitialAssignment,
    config: &ResolvedConfig,
    sink: &mut impl StepSink,
) -> Result<RunOutcome> {
    let mut rng = seeded(config.random_seed);
    let initial = initial.resolve(graph, config, &mut rng)?;

    let constraints: Vec<Box<dyn Constraint>> = vec![
        Box::new(Contiguous),
        Box::new(WithinPopulation::new(config.pop, config.pop_target, config.epsilon)),
    ];
    let recom = Recom::new(config.recom.clone());

    info!(
        nodes = graph.node_count(),
        n_parts = config.n_parts,
        total_steps = config.total_steps,
        seed = config.random_seed,
        "starting run"
    );

    let outcome = match (&config.score, config.burst_length, config.tilt_probability) {
        (Some(score), Some(burst_length), _) => {
            let chain = MarkovChain::new(graph, recom, constraints, AlwaysAccept, initial, burst_length, rng)?
                .with_max_attempts(config.max_step_attempts);
            let num_bursts = config.total_steps / burst_length;
            run_bursts(graph, ShortBursts::new(chain, score.clone(), burst_length, num_bursts)?, config, sink)?
        }
        (Some(score), None, Some(p)) => {
            let acceptance = Tilted::new(score.clone(), p)?;
            let chain = MarkovChain::new(graph, recom, constraints, acceptance, initial, config.total_steps, rng)?
                .with_max_attempts(config.max_step_attempts);
            run_chain(chain, Some(score), config, sink)?
        }
        (score, _, _) => {
            let chain = MarkovChain::new(graph, recom, constraints, AlwaysAccept, initial, config.total_steps, rng)?
                .with_max_attempts(config.max_step_attempts);
            run_chain(chain, score.as_ref(), config, sink)?
        }
    };

    info!(
        steps = outcome.steps,
        accepted = outcome.stats.accepted,
        failed_proposals = outcome.stats.failed_proposals,
        best_score = ?outcome.best_score,
        "run complete"
    );
    Ok(outcome)
}

fn log_progress(config: &ResolvedConfig, steps: usize, stats: &ChainStats) {
    if config.log_every > 0 && steps % config.log_every == 0 {
        info!(step = steps, total_steps = config.total_steps, accepted = stats.accepted, "progress");
    }
}

fn run_chain<A: Acceptance>(
    mut chain: MarkovChain<'_, Recom, A>,
    score: Option<&Objective>,
    config: &ResolvedConfig,
    sink: &mut impl StepSink,
) -> Result<RunOutcome> {
    let graph = chain.graph();
    let mut steps = 0;
    let mut best_score: Option<f64> = None;

    while let Some(state) = chain.next() {
        let state = state?;
        let value = score.map(|s| s.score(graph, &state)).transpose()?;
        if let Some(v) = value.filter(|&v| best_score.is_none_or(|best| v > best)) {
            best_score = Some(v);
        }

        sink.record(graph, steps, &state, value)?;
        steps += 1;
        log_progress(config, steps, &chain.stats());
    }

    Ok(RunOutcome { steps, stats: chain.stats(), best_score, bursts: Vec::new() })
}

fn run_bursts<A: Acceptance>(
    graph: &Graph,
    mut bursts: ShortBursts<'_, Recom, A, Objective>,
    config: &ResolvedConfig,
    sink: &mut impl StepSink,
) -> Result<RunOutcome> {
    let mut steps = 0;

    while let Some(step) = bursts.next() {
        let step = step?;
        sink.record(graph, steps, &step.assignment, Some(step.score))?;
        steps += 1;
        log_progress(config, steps, &bursts.chain_stats());
    }

    Ok(RunOutcome {
        steps,
        stats: bursts.chain_stats(),
        best_score: bursts.best().map(|(_, score)| score),
        bursts: bursts.summaries().to_vec(),
    })
}
