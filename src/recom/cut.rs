use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::graph::{AttrId, Graph};
use crate::recom::SpanningTree;

/// Which balanced cut to take when several tree edges qualify.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutSelection {
    /// Uniformly at random among qualifying edges.
    #[default]
    Random,
    /// The qualifying edge whose child comes first in preorder.
    First,
    /// The qualifying edge with the smallest population deviation; earliest in preorder on ties.
    MostBalanced,
}

/// Population window a piece must land in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PopulationBounds {
    pub target: f64,
    pub epsilon: f64,
}

impl PopulationBounds {
    pub fn new(target: f64, epsilon: f64) -> Self { Self { target, epsilon } }

    /// Relative deviation of a population from the target.
    #[inline] pub fn deviation(&self, population: f64) -> f64 { (population - self.target).abs() / self.target }

    #[inline]
    pub fn admits(&self, population: f64) -> bool {
        (population - self.target).abs() <= self.epsilon * self.target
    }
}

/// A qualifying tree edge `(parent[node], node)` and the side it carves off.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cut {
    /// Child endpoint of the cut edge.
    pub node: usize,
    /// True when the balanced piece is the complement of `node`'s subtree.
    pub complement: bool,
    /// Population of the balanced piece.
    pub population: f64,
}

impl Cut {
    /// Nodes of the balanced piece.
    pub fn piece(&self, tree: &SpanningTree) -> Vec<usize> {
        if self.complement {
            tree.complement(self.node).map(Iterator::collect).unwrap_or_default()
        } else {
            tree.subtree_slice(self.node).map(<[usize]>::to_vec).unwrap_or_default()
        }
    }
}

/// Scan the tree's edges in preorder for cuts that leave a balanced piece.
///
/// Two-sided search (`one_sided == false`) requires both the subtree and its
/// complement to satisfy `bounds`. One-sided search accepts an edge if either
/// side does, preferring the subtree; the other side is left unconstrained.
pub fn balanced_cuts(graph: &Graph, tree: &SpanningTree, pop: AttrId, bounds: PopulationBounds, one_sided: bool) -> Vec<Cut> {
    // Prefix sums over preorder.
    let mut prefix = Vec::with_capacity(tree.len() + 1);
    prefix.push(0.0);
    for &u in tree.order() {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + graph.value(pop, u));
    }
    let total = prefix[tree.len()];

    let mut cuts = Vec::new();
    for &u in &tree.order()[1..] {
        let (Some(start), Some(slice)) = (tree.position(u), tree.subtree_slice(u)) else { continue };
        let inside = prefix[start + slice.len()] - prefix[start];
        let outside = total - inside;

        let cut = if one_sided {
            if bounds.admits(inside) { Some(Cut { node: u, complement: false, population: inside }) }
            else if bounds.admits(outside) { Some(Cut { node: u, complement: true, population: outside }) }
            else { None }
        } else {
            (bounds.admits(inside) && bounds.admits(outside))
                .then_some(Cut { node: u, complement: false, population: inside })
        };
        cuts.extend(cut);
    }

    cuts
}

/// Pick one cut according to the selection policy.
pub fn select_cut(cuts: &[Cut], selection: CutSelection, bounds: PopulationBounds, rng: &mut impl Rng) -> Option<Cut> {
    match selection {
        CutSelection::Random => cuts.choose(rng).copied(),
        CutSelection::First => cuts.first().copied(),
        CutSelection::MostBalanced => cuts.iter()
            .copied()
            .reduce(|best, cut| {
                if bounds.deviation(cut.population) < bounds.deviation(best.population) { cut } else { best }
            }),
    }
}
