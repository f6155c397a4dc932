#![doc = "recomchain public API"]
pub mod chain;
pub mod config;
mod error;
pub mod graph;
pub mod io;
pub mod optimize;
pub mod partition;
pub mod recom;
pub mod retry;
pub mod rng;
pub mod run;

#[doc(inline)]
pub use error::{Error, Result};

#[doc(inline)]
pub use graph::{AttrId, Graph, GraphSource, NodeRecord};

#[doc(inline)]
pub use partition::{Assignment, Election, TieBreak};

#[doc(inline)]
pub use recom::{Recom, RecomParams};

#[doc(inline)]
pub use chain::{ChainCheckpoint, MarkovChain};

#[doc(inline)]
pub use optimize::{Objective, ScoreFunction, ShortBursts};

#[doc(inline)]
pub use config::{ResolvedConfig, RunConfig};

#[doc(inline)]
pub use run::{InitialAssignment, RunSummary, run_ensemble, run_with_sink};
