use rand::Rng;
use tracing::debug;

use crate::error::{Error, Result};
use crate::graph::{AttrId, Graph};
use crate::partition::{Assignment, is_contiguous};
use crate::recom::{CutSelection, PopulationBounds, SpanningTree, TreeMethod, balanced_cuts, select_cut};
use crate::retry::with_retries;

/// Knobs for random balanced partition construction.
#[derive(Clone, Debug, PartialEq)]
pub struct RandomPartitionParams {
    /// Relative population tolerance of every district.
    pub epsilon: f64,
    /// Spanning trees drawn per district before the attempt is abandoned.
    pub node_repeats: usize,
    /// Whole-construction attempts before giving up.
    pub max_attempts: usize,
    pub tree_method: TreeMethod,
}

impl RandomPartitionParams {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon, node_repeats: 5, max_attempts: 1000, tree_method: TreeMethod::default() }
    }
}

impl Assignment {
    /// Draw a random assignment of `n_parts` contiguous districts, each within `epsilon`
    /// of `total / n_parts` population, with default retry bounds.
    pub fn from_balanced_random(graph: &Graph, n_parts: u32, pop: AttrId, epsilon: f64, rng: &mut impl Rng) -> Result<Self> {
        Self::from_balanced_random_with(graph, n_parts, pop, &RandomPartitionParams::new(epsilon), rng)
    }

    /// Draw a random balanced assignment, peeling one district at a time off a random
    /// spanning tree of the unassigned region.
    ///
    /// Running population debt narrows each district's window so the final remainder
    /// also lands within tolerance. Fails with [`Error::NoBalancedPartitionFound`]
    /// once `params.max_attempts` constructions have failed.
    pub fn from_balanced_random_with(
        graph: &Graph,
        n_parts: u32,
        pop: AttrId,
        params: &RandomPartitionParams,
        rng: &mut impl Rng,
    ) -> Result<Self> {
        if n_parts == 0 || n_parts as usize > graph.node_count() {
            return Err(Error::InvalidConfig(format!(
                "n_parts must be in [1, {}], got {n_parts}", graph.node_count()
            )));
        }
        if params.max_attempts == 0 || params.node_repeats == 0 {
            return Err(Error::InvalidConfig("partition attempts and node_repeats must be at least 1".into()));
        }
        if !is_contiguous(graph, &(0..graph.node_count()).collect::<Vec<_>>()) {
            return Err(Error::InvalidConfig("random balanced partitions require a connected graph".into()));
        }

        let labels = with_retries(params.max_attempts, |attempt| {
            peel_districts(graph, n_parts, pop, params, rng)
                .inspect_err(|err| debug!(attempt, error = %err, "balanced partition attempt failed"))
        })
        .map_err(|err| match err {
            Error::NoBalancedPartitionFound { n_parts, reason } => Error::NoBalancedPartitionFound {
                n_parts,
                reason: format!("gave up after {} attempts, last: {reason}", params.max_attempts),
            },
            other => other,
        })?;

        Ok(Self::from_labels_unchecked(labels, n_parts))
    }
}

/// One construction attempt.
fn peel_districts(graph: &Graph, n_parts: u32, pop: AttrId, params: &RandomPartitionParams, rng: &mut impl Rng) -> Result<Vec<u32>> {
    let fail = |reason: String| Error::NoBalancedPartitionFound { n_parts, reason };

    let target = graph.total(pop) / n_parts as f64;
    let (lo, hi) = (target * (1.0 - params.epsilon), target * (1.0 + params.epsilon));

    let mut labels = vec![n_parts - 1; graph.node_count()];
    let mut remaining = (0..graph.node_count()).collect::<Vec<_>>();
    let mut debt = 0.0;

    for part in 0..n_parts - 1 {
        let min_pop = lo.max(lo - debt);
        let max_pop = hi.min(hi - debt);
        if min_pop > max_pop {
            return Err(fail(format!("no population window left for district {part}")));
        }
        let window_target = (min_pop + max_pop) / 2.0;
        let bounds = PopulationBounds::new(window_target, (max_pop - min_pop) / (2.0 * window_target));

        let mut found = None;
        for _ in 0..params.node_repeats {
            let tree = SpanningTree::random(graph, &remaining, params.tree_method, rng);
            let cuts = balanced_cuts(graph, &tree, pop, bounds, true);
            if let Some(cut) = select_cut(&cuts, CutSelection::Random, bounds, rng) {
                found = Some((cut.piece(&tree), cut.population));
                break;
            }
        }
        let Some((piece, population)) = found else {
            return Err(fail(format!("no balanced cut for district {part}")));
        };

        debt += population - target;
        for &u in &piece { labels[u] = part }
        remaining.retain(|&u| labels[u] == n_parts - 1);
    }

    let last = remaining.iter().map(|&u| graph.value(pop, u)).sum::<f64>();
    if !PopulationBounds::new(target, params.epsilon).admits(last) {
        return Err(fail(format!("final district population {last} is outside tolerance")));
    }

    Ok(labels)
}
