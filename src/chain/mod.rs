mod accept;
mod checkpoint;
mod constraint;
mod markov;

pub(crate) use constraint::check_all;

pub use accept::{Acceptance, AlwaysAccept, Tilted};
pub use checkpoint::ChainCheckpoint;
pub use constraint::{Constraint, Contiguous, WithinPopulation};
pub use markov::{ChainStats, DEFAULT_MAX_STEP_ATTEMPTS, MarkovChain};
