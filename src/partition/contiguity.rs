use std::collections::VecDeque;

use crate::graph::Graph;
use crate::partition::Assignment;

/// Breadth-first search from `start` restricted to nodes flagged in `mask`.
/// Visited nodes are cleared from the mask and returned in visit order.
fn flood(graph: &Graph, start: usize, mask: &mut [bool]) -> Vec<usize> {
    let mut component = vec![start];
    let mut queue = VecDeque::from([start]);
    mask[start] = false;

    while let Some(u) = queue.pop_front() {
        for v in graph.edges(u) {
            if mask[v] {
                mask[v] = false;
                component.push(v);
                queue.push_back(v);
            }
        }
    }

    component
}

/// Check whether the subgraph induced by `nodes` is connected.
/// The empty set is not considered connected.
pub fn is_contiguous(graph: &Graph, nodes: &[usize]) -> bool {
    let Some(&start) = nodes.first() else { return false };

    let mut mask = vec![false; graph.node_count()];
    let mut distinct = 0;
    for &u in nodes {
        if !mask[u] { mask[u] = true; distinct += 1 }
    }

    flood(graph, start, &mut mask).len() == distinct
}

/// Connected components of the subgraph induced by `nodes`, in order of first appearance.
pub fn find_components(graph: &Graph, nodes: &[usize]) -> Vec<Vec<usize>> {
    let mut mask = vec![false; graph.node_count()];
    for &u in nodes { mask[u] = true }

    let mut components = Vec::new();
    for &u in nodes {
        if mask[u] { components.push(flood(graph, u, &mut mask)) }
    }
    components
}

/// Districts of an assignment whose nodes do not induce a connected subgraph
/// (including empty districts).
pub fn disconnected_districts(graph: &Graph, assignment: &Assignment) -> Vec<u32> {
    (0..assignment.n_parts())
        .filter(|&d| !is_contiguous(graph, assignment.nodes(d)))
        .collect()
}
