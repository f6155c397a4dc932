use ahash::AHashSet;
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::graph::{AttrId, Graph};
use crate::partition::{Assignment, is_contiguous};
use crate::recom::{CutSelection, PopulationBounds, SpanningTree, TreeMethod, balanced_cuts, select_cut};
use crate::rng::ChainRng;

/// A pure proposal: given the current state, produce a candidate (or fail).
pub trait Proposal {
    fn propose(&self, graph: &Graph, state: &Assignment, rng: &mut ChainRng) -> Result<Assignment>;
}

impl<F> Proposal for F
where
    F: Fn(&Graph, &Assignment, &mut ChainRng) -> Result<Assignment>,
{
    fn propose(&self, graph: &Graph, state: &Assignment, rng: &mut ChainRng) -> Result<Assignment> {
        self(graph, state, rng)
    }
}

/// Parameters of the recombination move.
#[derive(Clone, Debug, PartialEq)]
pub struct RecomParams {
    pub pop: AttrId,
    pub pop_target: f64,
    pub epsilon: f64,
    /// Spanning trees drawn per district pair before giving up on it.
    pub node_repeats: usize,
    pub cut_selection: CutSelection,
    pub tree_method: TreeMethod,
    /// After a failed pair, retry with another adjacent pair until none remain.
    pub pair_reselection: bool,
}

impl RecomParams {
    pub fn new(pop: AttrId, pop_target: f64, epsilon: f64) -> Self {
        Self {
            pop,
            pop_target,
            epsilon,
            node_repeats: 1,
            cut_selection: CutSelection::default(),
            tree_method: TreeMethod::default(),
            pair_reselection: false,
        }
    }

    pub fn node_repeats(mut self, node_repeats: usize) -> Self { self.node_repeats = node_repeats; self }

    pub fn cut_selection(mut self, cut_selection: CutSelection) -> Self { self.cut_selection = cut_selection; self }

    pub fn tree_method(mut self, tree_method: TreeMethod) -> Self { self.tree_method = tree_method; self }

    pub fn pair_reselection(mut self, pair_reselection: bool) -> Self { self.pair_reselection = pair_reselection; self }

    #[inline] pub fn bounds(&self) -> PopulationBounds { PopulationBounds::new(self.pop_target, self.epsilon) }
}

/// ReCom: merge two adjacent districts and re-split them along a balanced spanning-tree cut.
#[derive(Clone, Debug)]
pub struct Recom {
    params: RecomParams,
}

impl Recom {
    pub fn new(params: RecomParams) -> Self {
        assert!(params.node_repeats > 0, "node_repeats must be at least 1");
        Self { params }
    }

    #[inline] pub fn params(&self) -> &RecomParams { &self.params }

    /// Re-split districts `a` and `b`; the balanced cut piece becomes `a`, the rest `b`.
    ///
    /// Draws up to `node_repeats` spanning trees of the merged region and fails with
    /// [`Error::NoBalancedCutFound`] if none of them has a balanced edge.
    pub fn bipartition(&self, graph: &Graph, state: &Assignment, a: u32, b: u32, rng: &mut impl Rng) -> Result<Assignment> {
        let params = &self.params;
        let merged = state.nodes(a).iter().chain(state.nodes(b)).copied().collect::<Vec<_>>();
        if !is_contiguous(graph, &merged) {
            return Err(Error::InvalidAssignment(format!("districts {a} and {b} do not form a connected region")));
        }

        let bounds = params.bounds();
        for attempt in 0..params.node_repeats {
            let tree = SpanningTree::random(graph, &merged, params.tree_method, rng);
            let cuts = balanced_cuts(graph, &tree, params.pop, bounds, false);
            trace!(a, b, attempt, candidates = cuts.len(), "searched spanning tree for balanced cuts");

            if let Some(cut) = select_cut(&cuts, params.cut_selection, bounds, rng) {
                let mut in_piece = vec![false; graph.node_count()];
                for u in cut.piece(&tree) { in_piece[u] = true }

                let flips = merged.iter().map(|&u| (u, if in_piece[u] { a } else { b }));
                return Ok(state.with_flips(flips));
            }
        }

        debug!(a, b, trees = params.node_repeats, "no balanced cut found");
        Err(Error::NoBalancedCutFound { a, b, attempts: params.node_repeats })
    }
}

/// Unordered key of a district pair.
#[inline]
fn pair_key(a: u32, b: u32) -> (u32, u32) { (a.min(b), a.max(b)) }

impl Proposal for Recom {
    /// Choose the district pair through a uniformly random cut edge, then bipartition.
    fn propose(&self, graph: &Graph, state: &Assignment, rng: &mut ChainRng) -> Result<Assignment> {
        let cut_edges = state.cut_edges(graph);
        let &(u, v) = cut_edges.choose(rng)
            .ok_or_else(|| Error::InvalidAssignment("no two districts are adjacent".into()))?;
        let (mut a, mut b) = (state.district_of(u), state.district_of(v));

        if !self.params.pair_reselection {
            return self.bipartition(graph, state, a, b, rng);
        }

        let mut bad_pairs = AHashSet::new();
        loop {
            match self.bipartition(graph, state, a, b, rng) {
                Err(err @ Error::NoBalancedCutFound { .. }) => {
                    bad_pairs.insert(pair_key(a, b));
                    let remaining = cut_edges.iter()
                        .filter(|&&(u, v)| !bad_pairs.contains(&pair_key(state.district_of(u), state.district_of(v))))
                        .collect::<Vec<_>>();
                    let Some(&&(u, v)) = remaining.choose(rng) else { return Err(err) };

                    warn!(a, b, tried = bad_pairs.len(), "no balanced cut for district pair, reselecting");
                    (a, b) = (state.district_of(u), state.district_of(v));
                }
                outcome => return outcome,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphSource, NodeRecord, grid};
    use crate::partition::{compute_tally, disconnected_districts};
    use crate::rng::seeded;

    fn cycle4() -> Graph {
        let mut source = GraphSource::new(["population"]);
        for i in 0..4 {
            source.push(NodeRecord::new(i.to_string())
                .neighbor(((i + 1) % 4).to_string())
                .neighbor(((i + 3) % 4).to_string())
                .attribute("population", 1.0));
        }
        Graph::load(source).unwrap()
    }

    #[test]
    fn cycle_step_keeps_arcs() {
        let graph = cycle4();
        let pop = graph.attr("population").unwrap();
        let start = Assignment::from_labels(&graph, vec![0, 0, 1, 1], 2).unwrap();
        let recom = Recom::new(RecomParams::new(pop, 2.0, 0.0).node_repeats(2));
        let mut rng = seeded(17);

        for _ in 0..50 {
            let Ok(next) = recom.propose(&graph, &start, &mut rng) else { continue };
            assert_eq!(compute_tally(&graph, &next, pop), vec![2.0, 2.0]);
            assert!(disconnected_districts(&graph, &next).is_empty());

            let labels = next.labels();
            assert!(labels[0] != labels[2] && labels[1] != labels[3], "diagonal split: {labels:?}");
        }
    }

    #[test]
    fn proposal_is_pure_and_balanced() {
        let graph = grid(6, 6);
        let pop = graph.attr("population").unwrap();
        let labels = (0..36).map(|u| (u % 6 / 2) as u32).collect::<Vec<_>>(); // three 6x2 columns
        let start = Assignment::from_labels(&graph, labels.clone(), 3).unwrap();
        let recom = Recom::new(RecomParams::new(pop, 12.0, 0.1).node_repeats(50));
        let mut rng = seeded(2);

        let next = recom.propose(&graph, &start, &mut rng).unwrap();
        assert_eq!(start.labels(), labels.as_slice());
        for population in compute_tally(&graph, &next, pop) {
            assert!((11.0..=13.0).contains(&population), "unbalanced district: {population}");
        }
        assert!(disconnected_districts(&graph, &next).is_empty());

        // Only two districts may change.
        let changed = (0..36).filter(|&u| next.district_of(u) != start.district_of(u))
            .flat_map(|u| [start.district_of(u), next.district_of(u)])
            .collect::<AHashSet<_>>();
        assert!(changed.len() <= 2);
    }

    #[test]
    fn impossible_balance_reports_no_cut() {
        // Path a-b-c with populations 1, 1, 4: no edge splits {1,1,4} into 3 and 3.
        let mut source = GraphSource::new(["population"]);
        source
            .push(NodeRecord::new("a").neighbor("b").attribute("population", 1.0))
            .push(NodeRecord::new("b").neighbor("a").neighbor("c").attribute("population", 1.0))
            .push(NodeRecord::new("c").neighbor("b").attribute("population", 4.0));
        let graph = Graph::load(source).unwrap();
        let pop = graph.attr("population").unwrap();
        let start = Assignment::from_labels(&graph, vec![0, 0, 1], 2).unwrap();

        for reselect in [false, true] {
            let recom = Recom::new(RecomParams::new(pop, 3.0, 0.0).node_repeats(3).pair_reselection(reselect));
            let err = recom.propose(&graph, &start, &mut seeded(0)).unwrap_err();
            assert!(matches!(err, Error::NoBalancedCutFound { attempts: 3, .. }));
            assert!(err.is_retryable());
        }
    }

    #[test]
    fn pair_reselection_finds_a_workable_pair() {
        // Path 0-1-2-3 with populations 1, 1, 2, 2 split as {0} {1,2} {3}: only pair (0, 1) can balance at 2.
        let mut source = GraphSource::new(["population"]);
        let pops = [1.0, 1.0, 2.0, 2.0];
        for i in 0..4usize {
            let mut node = NodeRecord::new(i.to_string()).attribute("population", pops[i]);
            if i > 0 { node = node.neighbor((i - 1).to_string()) }
            if i < 3 { node = node.neighbor((i + 1).to_string()) }
            source.push(node);
        }
        let graph = Graph::load(source).unwrap();
        let pop = graph.attr("population").unwrap();
        let start = Assignment::from_labels(&graph, vec![0, 1, 1, 2], 3).unwrap();
        let recom = Recom::new(RecomParams::new(pop, 2.0, 0.0).pair_reselection(true));

        for seed in 0..10 {
            let next = recom.propose(&graph, &start, &mut seeded(seed)).unwrap();
            assert_eq!(compute_tally(&graph, &next, pop), vec![2.0, 2.0, 2.0]);
        }
    }
}
