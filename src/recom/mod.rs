mod cut;
mod proposal;
mod tree;

pub use cut::{Cut, CutSelection, PopulationBounds, balanced_cuts, select_cut};
pub use proposal::{Proposal, Recom, RecomParams};
pub use tree::{SpanningTree, TreeMethod};
