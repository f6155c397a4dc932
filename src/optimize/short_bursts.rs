use serde::Serialize;
use tracing::debug;

use crate::chain::{Acceptance, ChainStats, MarkovChain};
use crate::error::{Error, Result};
use crate::optimize::ScoreFunction;
use crate::partition::Assignment;
use crate::recom::Proposal;

/// One yielded state of a short-burst run.
#[derive(Clone, Debug, PartialEq)]
pub struct BurstStep {
    pub assignment: Assignment,
    pub score: f64,
    pub burst: usize,
}

/// Outcome of one completed burst.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BurstSummary {
    pub burst: usize,
    pub baseline_score: f64,
    pub best_score: f64,
    /// Whether the next burst starts somewhere other than where this one ended.
    pub rewound: bool,
}

/// Short-burst hill climbing over a Markov chain.
///
/// Runs `num_bursts` bursts of `burst_length` items each. A burst's first item is
/// its baseline and the other `burst_length - 1` are chain steps; at the end of a burst the chain rewinds to the highest-scoring
/// state seen during it (the earliest on ties), which becomes the next baseline.
/// Every state of every burst is yielded.
pub struct ShortBursts<'g, P, A, S> {
    chain: MarkovChain<'g, P, A>,
    score: S,
    burst_length: usize,
    num_bursts: usize,
    burst: usize,
    baseline_score: Option<f64>,
    best: Option<(Assignment, f64)>,        // best of the current burst
    overall_best: Option<(Assignment, f64)>,
    summaries: Vec<BurstSummary>,
    finished: bool,
}

impl<'g, P: Proposal, A: Acceptance, S: ScoreFunction> ShortBursts<'g, P, A, S> {
    /// Wrap a chain; its current state is the first burst's baseline.
    ///
    /// `burst_length` must be at least 2, since a burst of one item is only its baseline.
    pub fn new(mut chain: MarkovChain<'g, P, A>, score: S, burst_length: usize, num_bursts: usize) -> Result<Self> {
        if burst_length < 2 {
            return Err(Error::InvalidConfig(format!("burst_length must be at least 2, got {burst_length}")));
        }
        if num_bursts == 0 {
            return Err(Error::InvalidConfig("the number of bursts must be at least 1".into()));
        }

        let start = chain.state().clone();
        chain.rebase(start, burst_length);

        Ok(Self {
            chain,
            score,
            burst_length,
            num_bursts,
            burst: 0,
            baseline_score: None,
            best: None,
            overall_best: None,
            summaries: Vec::with_capacity(num_bursts),
            finished: false,
        })
    }

    /// Summaries of the bursts completed so far.
    #[inline] pub fn summaries(&self) -> &[BurstSummary] { &self.summaries }

    /// Best state seen over the whole run, with its score.
    pub fn best(&self) -> Option<(&Assignment, f64)> {
        self.overall_best.as_ref().map(|(a, s)| (a, *s))
    }

    #[inline] pub fn chain_stats(&self) -> ChainStats { self.chain.stats() }

    /// Close the current burst and, unless it was the last, rewind to its best state.
    fn end_burst(&mut self) {
        let Some((best, best_score)) = self.best.take() else { return };
        let rewound = best != *self.chain.state();
        let summary = BurstSummary {
            burst: self.burst,
            baseline_score: self.baseline_score.take().unwrap_or(best_score),
            best_score,
            rewound,
        };
        debug!(burst = summary.burst, baseline = summary.baseline_score, best = best_score, rewound, "burst complete");
        self.summaries.push(summary);

        self.burst += 1;
        if self.burst < self.num_bursts {
            self.chain.rebase(best, self.burst_length);
        }
    }

    fn observe(&mut self, assignment: Assignment) -> Result<BurstStep> {
        let score = self.score.score(self.chain.graph(), &assignment)?;

        self.baseline_score.get_or_insert(score);
        if self.best.as_ref().is_none_or(|&(_, best)| score > best) {
            self.best = Some((assignment.clone(), score));
        }
        if self.overall_best.as_ref().is_none_or(|&(_, best)| score > best) {
            self.overall_best = Some((assignment.clone(), score));
        }

        Ok(BurstStep { assignment, score, burst: self.burst })
    }
}

impl<P: Proposal, A: Acceptance, S: ScoreFunction> Iterator for ShortBursts<'_, P, A, S> {
    type Item = Result<BurstStep>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            match self.chain.next() {
                Some(Ok(assignment)) => {
                    let step = self.observe(assignment);
                    if step.is_err() { self.finished = true }
                    return Some(step);
                }
                Some(Err(err)) => {
                    self.finished = true;
                    return Some(Err(err));
                }
                None => {
                    self.end_burst();
                    if self.burst >= self.num_bursts { self.finished = true }
                }
            }
        }
        None
    }
}
