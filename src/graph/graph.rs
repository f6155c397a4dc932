use ahash::AHashMap;
use ndarray::ArrayView1;

use crate::error::Result;
use crate::graph::{AttrId, AttributeMatrix};

/// An undirected adjacency graph in compressed sparse row format, with named numeric node attributes.
///
/// Nodes are indexed `0..node_count()` in the canonical order fixed at load time;
/// the external id of each node is kept for output. The graph is immutable once built.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    size: usize,
    offsets: Vec<u32>,
    edges: Vec<u32>,
    node_ids: Vec<String>,
    index: AHashMap<String, usize>,
    attributes: AttributeMatrix,
}

impl Graph {
    /// Construct a graph from already validated adjacency lists, ids and attributes.
    pub(crate) fn from_parts(node_ids: Vec<String>, adjacency: &[Vec<u32>], attributes: AttributeMatrix) -> Self {
        assert!(adjacency.len() == node_ids.len(), "adjacency.len() must equal number of node ids");

        Self {
            size: node_ids.len(),
            offsets: std::iter::once(0u32).chain(
                adjacency.iter()
                    .map(|v| v.len() as u32)
                    .scan(0u32, |acc, len| {*acc += len; Some(*acc)})
            ).collect::<Vec<u32>>(),
            edges: adjacency.iter().flatten().copied().collect(),
            index: node_ids.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect(),
            node_ids,
            attributes,
        }
    }

    /// Get the number of nodes in the graph.
    #[inline] pub fn node_count(&self) -> usize { self.size }

    /// Get the number of undirected edges in the graph.
    #[inline] pub fn edge_count(&self) -> usize { self.edges.len() / 2 }

    /// Get the range of edges for a given node.
    #[inline]
    fn range(&self, node: usize) -> std::ops::Range<usize> {
        self.offsets[node] as usize .. self.offsets[node + 1] as usize
    }

    /// Get the degree (number of neighbors) of a given node.
    #[inline] pub fn degree(&self, node: usize) -> usize { self.range(node).len() }

    /// Get the ith neighbor of a given node.
    #[inline]
    pub fn edge(&self, node: usize, i: usize) -> Option<usize> {
        self.range(node).nth(i).map(|v| self.edges[v] as usize)
    }

    /// Get an iterator over the neighbors of a given node.
    #[inline]
    pub fn edges(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.range(node).map(move |v| self.edges[v] as usize)
    }

    /// Iterate over each undirected edge once, as `(u, v)` with `u < v`.
    pub fn undirected_edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.size).flat_map(move |u| self.edges(u).filter(move |&v| u < v).map(move |v| (u, v)))
    }

    /// External id of a node.
    #[inline] pub fn node_id(&self, node: usize) -> &str { &self.node_ids[node] }

    /// External ids of all nodes, in canonical order.
    #[inline] pub fn node_ids(&self) -> &[String] { &self.node_ids }

    /// Canonical index of an external node id.
    #[inline] pub fn index_of(&self, id: &str) -> Option<usize> { self.index.get(id).copied() }

    /// Declared attribute names, in schema order.
    #[inline] pub fn attribute_names(&self) -> &[String] { self.attributes.names() }

    /// Resolve an attribute name, failing if it was not declared.
    #[inline] pub fn attr(&self, name: &str) -> Result<AttrId> { self.attributes.resolve(name) }

    /// Value of an attribute on a node.
    #[inline] pub fn value(&self, attr: AttrId, node: usize) -> f64 { self.attributes.get(attr, node) }

    /// Values of an attribute over all nodes.
    #[inline] pub fn column(&self, attr: AttrId) -> ArrayView1<'_, f64> { self.attributes.column(attr) }

    /// Sum of an attribute over the whole graph.
    #[inline] pub fn total(&self, attr: AttrId) -> f64 { self.attributes.column(attr).sum() }

    /// All attribute values of a node, in schema order.
    #[inline] pub(crate) fn row(&self, node: usize) -> ArrayView1<'_, f64> { self.attributes.row(node) }
}
