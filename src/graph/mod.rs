mod attributes;
mod coarsen;
mod graph;
mod grid;
mod source;

pub(crate) use attributes::AttributeMatrix;

pub use attributes::AttrId;
pub use coarsen::{Coarsening, coarsen};
pub use graph::Graph;
pub use grid::{grid, grid_with_votes};
pub use source::{GraphSource, NodeRecord};
