use rand::Rng;

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::optimize::ScoreFunction;
use crate::partition::Assignment;
use crate::rng::ChainRng;

/// Decides whether a valid candidate replaces the current chain state.
pub trait Acceptance {
    fn accept(&mut self, graph: &Graph, current: &Assignment, candidate: &Assignment, rng: &mut ChainRng) -> Result<bool>;
}

/// Accept every valid candidate.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysAccept;

impl Acceptance for AlwaysAccept {
    fn accept(&mut self, _: &Graph, _: &Assignment, _: &Assignment, _: &mut ChainRng) -> Result<bool> {
        Ok(true)
    }
}

/// Accept candidates that score at least as well as the current state,
/// and worse ones with a fixed probability `p`.
#[derive(Clone, Debug)]
pub struct Tilted<S> {
    score: S,
    p: f64,
}

impl<S: ScoreFunction> Tilted<S> {
    pub fn new(score: S, p: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&p) {
            return Err(Error::InvalidConfig(format!("tilt probability must be in [0, 1], got {p}")));
        }
        Ok(Self { score, p })
    }
}

impl<S: ScoreFunction> Acceptance for Tilted<S> {
    fn accept(&mut self, graph: &Graph, current: &Assignment, candidate: &Assignment, rng: &mut ChainRng) -> Result<bool> {
        let before = self.score.score(graph, current)?;
        let after = self.score.score(graph, candidate)?;
        Ok(after >= before || rng.random::<f64>() < self.p)
    }
}
