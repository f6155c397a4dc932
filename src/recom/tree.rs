use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::graph::Graph;

/// How random spanning trees are drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeMethod {
    /// Wilson's loop-erased random walks (exactly uniform).
    #[default]
    Wilson,
    /// Minimum spanning tree under i.i.d. uniform edge weights.
    RandomMst,
}

/// Cut-friendly rooted spanning tree over a region of the graph.
///
/// Nodes are stored in preorder, so every subtree is a contiguous slice of `order`.
#[derive(Debug)]
pub struct SpanningTree {
    root: usize,
    parent: Vec<Option<usize>>, // parent[root] = root; None if node not in tree.
    order: Vec<usize>,          // preorder over nodes in the tree
    index: Vec<Option<usize>>,  // preorder entry index, or None if node not in tree.
    size: Vec<Option<usize>>,   // subtree sizes, or None if node not in tree.
}

impl SpanningTree {
    /// Draw a random spanning tree of the subgraph induced by `nodes`.
    /// Assumes the induced subgraph is connected and non-empty.
    pub fn random(graph: &Graph, nodes: &[usize], method: TreeMethod, rng: &mut impl Rng) -> Self {
        assert!(!nodes.is_empty(), "cannot build spanning tree for an empty region");

        let mut in_region = vec![false; graph.node_count()];
        for &u in nodes { in_region[u] = true }

        let (root, parent) = match method {
            TreeMethod::Wilson => wilson(graph, nodes, &in_region, rng),
            TreeMethod::RandomMst => random_mst(graph, nodes, &in_region, rng),
        };

        Self::from_parents(root, parent, nodes)
    }

    /// Lay out a parent forest rooted at `root` in preorder and compute subtree sizes.
    fn from_parents(root: usize, parent: Vec<Option<usize>>, nodes: &[usize]) -> Self {
        let n = parent.len();

        let mut children = vec![SmallVec::<[usize; 4]>::new(); n];
        for &u in nodes {
            if let Some(p) = parent[u] {
                if p != u { children[p].push(u) }
            }
        }

        let mut order = Vec::with_capacity(nodes.len());
        let mut index = vec![None; n];
        let mut size = vec![None; n];

        // Iterative DFS preorder from the unique root
        let mut stack = vec![(root, false)];
        while let Some((i, entered)) = stack.pop() {
            if !entered {
                index[i] = Some(order.len());
                order.push(i);
                stack.push((i, true));
                for &u in children[i].iter().rev() {
                    stack.push((u, false));
                }
            } else {
                let count = 1 + children[i].iter().map(|&u| size[u].unwrap_or(0)).sum::<usize>();
                size[i] = Some(count);
            }
        }

        assert!(order.len() == nodes.len(), "spanning tree does not reach every node of the region");

        Self { root, parent, order, index, size }
    }

    #[inline] pub fn root(&self) -> usize { self.root }

    /// Number of nodes in the tree.
    #[inline] pub fn len(&self) -> usize { self.order.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.order.is_empty() }

    /// Nodes in preorder; `order()[0]` is the root.
    #[inline] pub fn order(&self) -> &[usize] { &self.order }

    #[inline] pub fn contains(&self, node: usize) -> bool { self.parent[node].is_some() }

    /// Parent of a node (the root is its own parent), or None if `node` is not in the tree.
    #[inline] pub fn parent(&self, node: usize) -> Option<usize> { self.parent[node] }

    /// Preorder position of a node.
    #[inline] pub fn position(&self, node: usize) -> Option<usize> { self.index[node] }

    /// Subtree slice for `node` (contiguous in `order`), or None if `node` not in tree.
    #[inline]
    pub fn subtree_slice(&self, node: usize) -> Option<&[usize]> {
        let index = self.index[node]?;
        let size = self.size[node]?;
        Some(&self.order[index .. index + size])
    }

    /// Nodes outside the subtree of `node`.
    pub fn complement(&self, node: usize) -> Option<impl Iterator<Item = usize> + '_> {
        let index = self.index[node]?;
        let size = self.size[node]?;
        Some(self.order[..index].iter().chain(&self.order[index + size..]).copied())
    }

    /// Tree edges as `(parent, child)` pairs, in preorder of the child.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.order[1..].iter().filter_map(move |&u| Some((self.parent[u]?, u)))
    }
}

/// Wilson's algorithm over the region flagged by `in_region`.
fn wilson(graph: &Graph, nodes: &[usize], in_region: &[bool], rng: &mut impl Rng) -> (usize, Vec<Option<usize>>) {
    let n = graph.node_count();
    let mut nodes = nodes.to_vec();
    let mut parent = vec![None; n];

    // Randomize the order of the nodes, and choose a random root.
    nodes.shuffle(rng);
    let root = nodes[0];
    parent[root] = Some(root);

    let mut walk_start = vec![usize::MAX; n];
    let mut walk_position = vec![0; n];
    let mut neighbors = SmallVec::<[usize; 8]>::new();

    for &start in &nodes[1..] {
        if parent[start].is_some() { continue } // already in the tree

        let mut walk = vec![start];
        walk_start[start] = start;
        walk_position[start] = 0;

        // Walk until we hit the tree
        let mut current = start;
        while parent[current].is_none() {
            neighbors.clear();
            neighbors.extend(graph.edges(current).filter(|&v| in_region[v]));
            current = *neighbors.choose(rng).expect("region must be connected");

            if walk_start[current] == start && walk.get(walk_position[current]) == Some(&current) {
                walk.truncate(walk_position[current] + 1); // erase the loop
            } else {
                walk_start[current] = start;
                walk_position[current] = walk.len();
                walk.push(current);
            }
        }

        // Stitch loop-erased path into the tree (reverse)
        while let Some(node) = walk.pop() {
            if parent[node].is_some() { continue }
            parent[node] = Some(current);
            current = node;
        }
    }

    (root, parent)
}

/// Kruskal's algorithm under uniform random edge weights, then oriented from a random root.
fn random_mst(graph: &Graph, nodes: &[usize], in_region: &[bool], rng: &mut impl Rng) -> (usize, Vec<Option<usize>>) {
    let n = graph.node_count();

    let mut weighted = nodes.iter()
        .flat_map(|&u| graph.edges(u).filter(move |&v| u < v && in_region[v]).map(move |v| (u, v)))
        .map(|(u, v)| (rng.random::<f64>(), u, v))
        .collect::<Vec<_>>();
    weighted.sort_by(|a, b| a.0.total_cmp(&b.0));

    // Union-find with path halving.
    let mut leader = (0..n).collect::<Vec<_>>();
    fn find(leader: &mut [usize], mut x: usize) -> usize {
        while leader[x] != x {
            leader[x] = leader[leader[x]];
            x = leader[x];
        }
        x
    }

    let mut adjacency = vec![SmallVec::<[usize; 4]>::new(); n];
    let mut joined = 0;
    for &(_, u, v) in &weighted {
        if joined + 1 == nodes.len() { break }
        let (a, b) = (find(&mut leader, u), find(&mut leader, v));
        if a != b {
            leader[a] = b;
            adjacency[u].push(v);
            adjacency[v].push(u);
            joined += 1;
        }
    }

    // Orient edges away from a random root.
    let root = *nodes.choose(rng).expect("region is non-empty");
    let mut parent = vec![None; n];
    parent[root] = Some(root);
    let mut stack = vec![root];
    while let Some(u) = stack.pop() {
        for &v in &adjacency[u] {
            if parent[v].is_none() {
                parent[v] = Some(u);
                stack.push(v);
            }
        }
    }

    (root, parent)
}
