use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::graph::{AttributeMatrix, Graph};
use crate::partition::is_contiguous;

/// A graph of building blocks, each formed by merging a class of base units.
#[derive(Clone, Debug)]
pub struct Coarsening {
    graph: Graph,
    units: Vec<Vec<usize>>,   // units[b] = base nodes merged into block b
    block_of: Vec<u32>,       // block_of[u] = block containing base node u
}

impl Coarsening {
    /// The coarse (block-level) graph.
    #[inline] pub fn graph(&self) -> &Graph { &self.graph }

    /// Base units merged into each block.
    #[inline] pub fn units(&self, block: usize) -> &[usize] { &self.units[block] }

    /// Block containing a base unit.
    #[inline] pub fn block_of(&self, unit: usize) -> u32 { self.block_of[unit] }

    /// Number of blocks.
    #[inline] pub fn block_count(&self) -> usize { self.units.len() }

    /// Map a block-level labeling onto the base units.
    pub fn lift(&self, block_labels: &[u32]) -> Result<Vec<u32>> {
        if block_labels.len() != self.units.len() {
            return Err(Error::InvalidAssignment(format!(
                "expected {} block labels, got {}", self.units.len(), block_labels.len()
            )));
        }
        Ok(self.block_of.iter().map(|&b| block_labels[b as usize]).collect())
    }
}

/// Merge base units into building blocks, one block per distinct label.
///
/// Blocks are numbered in order of first appearance and named `"0"`, `"1"`, ...
/// Every attribute is summed over a block's units; two blocks are adjacent iff
/// some pair of their units is. Fails with [`Error::InvalidAssignment`] on a
/// labeling of the wrong length or a block whose units are not contiguous.
pub fn coarsen(graph: &Graph, labels: &[u32]) -> Result<Coarsening> {
    if labels.len() != graph.node_count() {
        return Err(Error::InvalidAssignment(format!(
            "expected {} labels, got {}", graph.node_count(), labels.len()
        )));
    }

    // Renumber labels densely by first appearance.
    let mut renumber = ahash::AHashMap::new();
    let block_of = labels.iter()
        .map(|&label| { let next = renumber.len() as u32; *renumber.entry(label).or_insert(next) })
        .collect::<Vec<u32>>();
    let num_blocks = renumber.len();

    let mut units = vec![Vec::new(); num_blocks];
    for (u, &b) in block_of.iter().enumerate() { units[b as usize].push(u) }
    if let Some(b) = units.iter().position(|members| !is_contiguous(graph, members)) {
        let label = labels[units[b][0]];
        return Err(Error::InvalidAssignment(format!("building block {label} is not contiguous")));
    }

    // Aggregate attributes.
    let width = graph.attribute_names().len();
    let mut values = vec![0.0; num_blocks * width];
    for (u, &b) in block_of.iter().enumerate() {
        let row = &mut values[b as usize * width .. (b as usize + 1) * width];
        for (acc, &x) in row.iter_mut().zip(graph.row(u).iter()) { *acc += x }
    }

    // Quotient adjacency.
    let mut neighbor_sets = vec![BTreeSet::new(); num_blocks];
    for (u, v) in graph.undirected_edges() {
        let (a, b) = (block_of[u], block_of[v]);
        if a != b {
            neighbor_sets[a as usize].insert(b);
            neighbor_sets[b as usize].insert(a);
        }
    }
    let adjacency = neighbor_sets.into_iter().map(|set| set.into_iter().collect()).collect::<Vec<Vec<u32>>>();

    let coarse = Graph::from_parts(
        (0..num_blocks).map(|b| b.to_string()).collect(),
        &adjacency,
        AttributeMatrix::new(graph.attribute_names().to_vec(), num_blocks, values),
    );

    Ok(Coarsening { graph: coarse, units, block_of })
}
