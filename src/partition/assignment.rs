use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::partition::PartitionSet;

/// A total assignment of graph nodes to districts `0..n_parts`.
///
/// Keeps both the dense label vector (the canonical, recorded form) and the
/// node list of every district. Assignments are values: operations that change
/// districts return a new `Assignment` and leave the original untouched.
#[derive(Clone, Debug)]
pub struct Assignment {
    labels: Vec<u32>,
    parts: PartitionSet,
}

impl PartialEq for Assignment {
    fn eq(&self, other: &Self) -> bool {
        self.labels == other.labels && self.n_parts() == other.n_parts()
    }
}

impl Eq for Assignment {}

impl Assignment {
    /// Build an assignment from one label per node, in canonical node order.
    ///
    /// Fails with [`Error::InvalidAssignment`] unless `labels` covers every node,
    /// every label is below `n_parts`, and every district is non-empty.
    pub fn from_labels(graph: &Graph, labels: Vec<u32>, n_parts: u32) -> Result<Self> {
        if n_parts == 0 {
            return Err(Error::InvalidAssignment("n_parts must be at least 1".into()));
        }
        if labels.len() != graph.node_count() {
            return Err(Error::InvalidAssignment(format!(
                "expected {} labels, got {}", graph.node_count(), labels.len()
            )));
        }
        if let Some((node, &label)) = labels.iter().enumerate().find(|&(_, &l)| l >= n_parts) {
            return Err(Error::InvalidAssignment(format!(
                "node '{}' has district {label}, outside [0, {n_parts})", graph.node_id(node)
            )));
        }

        let assignment = Self::from_labels_unchecked(labels, n_parts);
        if let Some(empty) = (0..n_parts).find(|&d| assignment.nodes(d).is_empty()) {
            return Err(Error::InvalidAssignment(format!("district {empty} has no nodes")));
        }
        Ok(assignment)
    }

    /// Build an assignment from a numeric node attribute holding district labels
    /// (for example `init_part_1`). Values must be non-negative integers.
    pub fn from_attribute(graph: &Graph, attr: &str, n_parts: u32) -> Result<Self> {
        let id = graph.attr(attr)?;
        let labels = graph.column(id).iter().enumerate()
            .map(|(node, &x)| {
                if x >= 0.0 && x.fract() == 0.0 && x <= u32::MAX as f64 { Ok(x as u32) }
                else { Err(Error::InvalidAssignment(format!(
                    "attribute '{attr}' on node '{}' is not a district label: {x}", graph.node_id(node)
                ))) }
            })
            .collect::<Result<Vec<u32>>>()?;
        Self::from_labels(graph, labels, n_parts)
    }

    /// Build without validation. Labels must be below `n_parts`.
    pub(crate) fn from_labels_unchecked(labels: Vec<u32>, n_parts: u32) -> Self {
        let index = labels.iter().map(|&l| l as usize).collect::<Vec<_>>();
        let parts = PartitionSet::from_assignments(n_parts as usize, &index);
        Self { labels, parts }
    }

    /// Number of districts.
    #[inline] pub fn n_parts(&self) -> u32 { self.parts.num_sets() as u32 }

    /// Number of assigned nodes.
    #[inline] pub fn node_count(&self) -> usize { self.labels.len() }

    /// District of a node.
    #[inline] pub fn district_of(&self, node: usize) -> u32 { self.labels[node] }

    /// Dense labels in canonical node order.
    #[inline] pub fn labels(&self) -> &[u32] { &self.labels }

    /// Nodes currently in a district (in no particular order).
    #[inline] pub fn nodes(&self, district: u32) -> &[usize] { self.parts.get(district as usize) }

    /// Iterator over every district's node list, by district id.
    #[inline]
    pub fn districts(&self) -> impl Iterator<Item = &[usize]> + '_ { self.parts.iter_sets() }

    /// Return a new assignment with the given `(node, district)` changes applied.
    pub fn with_flips(&self, flips: impl IntoIterator<Item = (usize, u32)>) -> Self {
        let mut next = self.clone();
        for (node, district) in flips {
            assert!(district < self.n_parts(), "district {district} out of range [0, {})", self.n_parts());
            next.labels[node] = district;
            next.parts.move_to(node, district as usize);
        }
        next
    }

    /// Edges whose endpoints lie in different districts, as `(u, v)` with `u < v`.
    pub fn cut_edges(&self, graph: &Graph) -> Vec<(usize, usize)> {
        graph.undirected_edges()
            .filter(|&(u, v)| self.labels[u] != self.labels[v])
            .collect()
    }

    /// Check whether two districts share a boundary edge.
    pub fn districts_adjacent(&self, graph: &Graph, a: u32, b: u32) -> bool {
        let (small, other) = if self.nodes(a).len() <= self.nodes(b).len() { (a, b) } else { (b, a) };
        self.nodes(small).iter()
            .any(|&u| graph.edges(u).any(|v| self.labels[v] == other))
    }

    /// Number of nodes whose district differs between two assignments of the same graph.
    pub fn distance(&self, other: &Assignment) -> usize {
        assert!(self.labels.len() == other.labels.len(), "assignments cover different graphs");
        self.labels.iter().zip(&other.labels).filter(|(a, b)| a != b).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::grid;

    #[test]
    fn from_labels_builds_district_views() {
        let graph = grid(2, 2);
        let assignment = Assignment::from_labels(&graph, vec![0, 0, 1, 1], 2).unwrap();

        assert_eq!(assignment.n_parts(), 2);
        assert_eq!(assignment.nodes(0), &[0, 1]);
        assert_eq!(assignment.nodes(1), &[2, 3]);
        assert_eq!(assignment.district_of(3), 1);
        assert_eq!(assignment.cut_edges(&graph), vec![(0, 2), (1, 3)]);
        assert!(assignment.districts_adjacent(&graph, 0, 1));
    }

    #[test]
    fn from_labels_rejects_bad_input() {
        let graph = grid(2, 2);

        let short = Assignment::from_labels(&graph, vec![0, 1, 1], 2);
        assert!(matches!(short, Err(Error::InvalidAssignment(msg)) if msg.contains("expected 4")));

        let out_of_range = Assignment::from_labels(&graph, vec![0, 1, 2, 1], 2);
        assert!(matches!(out_of_range, Err(Error::InvalidAssignment(msg)) if msg.contains("outside")));

        let empty_district = Assignment::from_labels(&graph, vec![0, 0, 0, 0], 2);
        assert!(matches!(empty_district, Err(Error::InvalidAssignment(msg)) if msg.contains("no nodes")));
    }

    #[test]
    fn from_attribute_reads_integer_labels() {
        use crate::graph::{GraphSource, NodeRecord};

        let mut source = GraphSource::new(["population", "init_part_1"]);
        source
            .push(NodeRecord::new("a").neighbor("b").attribute("population", 1.0).attribute("init_part_1", 1.0))
            .push(NodeRecord::new("b").neighbor("a").attribute("population", 1.0).attribute("init_part_1", 0.0));
        let graph = Graph::load(source).unwrap();

        let assignment = Assignment::from_attribute(&graph, "init_part_1", 2).unwrap();
        assert_eq!(assignment.labels(), &[1, 0]);

        assert!(matches!(Assignment::from_attribute(&graph, "population", 2), Err(Error::InvalidAssignment(_))));
        assert!(matches!(Assignment::from_attribute(&graph, "missing", 2), Err(Error::UnknownAttribute(_))));
    }

    #[test]
    fn with_flips_is_pure() {
        let graph = grid(2, 2);
        let before = Assignment::from_labels(&graph, vec![0, 0, 1, 1], 2).unwrap();
        let after = before.with_flips([(0, 1), (3, 0)]);

        assert_eq!(before.labels(), &[0, 0, 1, 1]);
        assert_eq!(after.labels(), &[1, 0, 1, 0]);
        assert_eq!(after.nodes(0).len(), 2);
        assert!(after.nodes(1).contains(&0));
        assert_eq!(before.distance(&after), 2);
        assert_ne!(before, after);
    }
}
