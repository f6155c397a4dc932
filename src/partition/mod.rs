mod assignment;
mod contiguity;
mod election;
mod partition_set;
mod randomize;
mod tally;

pub(crate) use partition_set::PartitionSet;

pub use assignment::Assignment;
pub use contiguity::{disconnected_districts, find_components, is_contiguous};
pub use election::{Election, ElectionResults, TieBreak, compute_election};
pub use randomize::RandomPartitionParams;
pub use tally::{Tally, compute_shares, compute_tally, max_population_deviation};
