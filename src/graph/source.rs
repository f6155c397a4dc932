use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};

use crate::error::{Error, Result};
use crate::graph::{AttributeMatrix, Graph};

/// One node of a graph source: its id, neighbor ids and numeric attributes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeRecord {
    pub id: String,
    pub neighbors: Vec<String>,
    pub attributes: BTreeMap<String, f64>,
}

impl NodeRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), ..Default::default() }
    }

    pub fn neighbor(mut self, id: impl Into<String>) -> Self {
        self.neighbors.push(id.into());
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, value: f64) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }
}

/// Unvalidated graph input supplied by an external loader.
///
/// `schema` lists the attribute names the run will use; every node must carry
/// each of them. Attributes not in the schema are dropped at load time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphSource {
    pub schema: Vec<String>,
    pub nodes: Vec<NodeRecord>,
}

impl GraphSource {
    pub fn new<S: Into<String>>(schema: impl IntoIterator<Item = S>) -> Self {
        Self { schema: schema.into_iter().map(Into::into).collect(), nodes: Vec::new() }
    }

    pub fn push(&mut self, node: NodeRecord) -> &mut Self {
        self.nodes.push(node);
        self
    }
}

impl Graph {
    /// Validate a graph source and build the immutable graph.
    ///
    /// Fails with [`Error::MalformedGraph`] on duplicate ids, dangling or self-referencing
    /// neighbors, asymmetric adjacency, or a missing or non-finite schema attribute.
    pub fn load(source: GraphSource) -> Result<Graph> {
        let GraphSource { schema, nodes } = source;

        let mut seen_attrs = AHashSet::new();
        for name in &schema {
            if !seen_attrs.insert(name.as_str()) {
                return Err(Error::MalformedGraph(format!("attribute '{name}' declared twice")));
            }
        }

        // Assign canonical indices, rejecting duplicates.
        let mut index = AHashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.id.as_str(), i as u32).is_some() {
                return Err(Error::MalformedGraph(format!("duplicate node id '{}'", node.id)));
            }
        }

        // Resolve neighbor lists.
        let mut adjacency = Vec::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            let mut neighbors = Vec::with_capacity(node.neighbors.len());
            for id in &node.neighbors {
                let &j = index.get(id.as_str()).ok_or_else(|| Error::MalformedGraph(
                    format!("node '{}' lists unknown neighbor '{id}'", node.id)
                ))?;
                if j as usize == i {
                    return Err(Error::MalformedGraph(format!("node '{}' lists itself as a neighbor", node.id)));
                }
                neighbors.push(j);
            }
            neighbors.sort_unstable();
            neighbors.dedup();
            adjacency.push(neighbors);
        }

        // Adjacency must be symmetric.
        for (u, neighbors) in adjacency.iter().enumerate() {
            for &v in neighbors {
                if adjacency[v as usize].binary_search(&(u as u32)).is_err() {
                    return Err(Error::MalformedGraph(format!(
                        "asymmetric adjacency: '{}' lists '{}' but not the reverse",
                        nodes[u].id, nodes[v as usize].id,
                    )));
                }
            }
        }

        // Pull schema attributes into a dense row-major buffer.
        let mut values = Vec::with_capacity(nodes.len() * schema.len());
        for node in &nodes {
            for name in &schema {
                let value = *node.attributes.get(name).ok_or_else(|| Error::MalformedGraph(
                    format!("node '{}' is missing attribute '{name}'", node.id)
                ))?;
                if !value.is_finite() {
                    return Err(Error::MalformedGraph(format!("node '{}' has non-finite '{name}'", node.id)));
                }
                values.push(value);
            }
        }

        let rows = nodes.len();
        let node_ids = nodes.into_iter().map(|node| node.id).collect::<Vec<_>>();
        Ok(Graph::from_parts(node_ids, &adjacency, AttributeMatrix::new(schema, rows, values)))
    }
}
