use smallvec::SmallVec;

use crate::graph::{AttrId, Graph};
use crate::partition::Assignment;

/// One or more attribute columns summed together per district.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tally {
    columns: SmallVec<[AttrId; 2]>,
}

impl Tally {
    /// Sum of `columns`; None when there are none.
    pub fn sum(columns: impl IntoIterator<Item = AttrId>) -> Option<Self> {
        let columns: SmallVec<[AttrId; 2]> = columns.into_iter().collect();
        (!columns.is_empty()).then_some(Self { columns })
    }

    #[inline] pub fn columns(&self) -> &[AttrId] { &self.columns }

    /// Per-district sums, indexed by district id.
    pub fn compute(&self, graph: &Graph, assignment: &Assignment) -> Vec<f64> {
        assignment.districts()
            .map(|nodes| nodes.iter()
                .map(|&u| self.columns.iter().map(|&attr| graph.value(attr, u)).sum::<f64>())
                .sum())
            .collect()
    }

    /// Per-district share of this tally in `denominator`, 0 where the denominator is 0.
    pub fn shares(&self, denominator: &Tally, graph: &Graph, assignment: &Assignment) -> Vec<f64> {
        self.compute(graph, assignment).into_iter()
            .zip(denominator.compute(graph, assignment))
            .map(|(num, den)| if den == 0.0 { 0.0 } else { num / den })
            .collect()
    }
}

impl From<AttrId> for Tally {
    fn from(attr: AttrId) -> Self {
        Self { columns: SmallVec::from_slice(&[attr]) }
    }
}

/// Sum an attribute over every district, indexed by district id.
pub fn compute_tally(graph: &Graph, assignment: &Assignment, attr: AttrId) -> Vec<f64> {
    assignment.districts()
        .map(|nodes| nodes.iter().map(|&u| graph.value(attr, u)).sum())
        .collect()
}

/// Share of `numerator` in `denominator` per district, 0 where the denominator is 0.
pub fn compute_shares(
    graph: &Graph,
    assignment: &Assignment,
    numerator: impl Into<Tally>,
    denominator: impl Into<Tally>,
) -> Vec<f64> {
    numerator.into().shares(&denominator.into(), graph, assignment)
}

/// Largest relative deviation of any district's population from `target`.
pub fn max_population_deviation(graph: &Graph, assignment: &Assignment, pop: AttrId, target: f64) -> f64 {
    compute_tally(graph, assignment, pop).into_iter()
        .map(|p| (p - target).abs() / target)
        .fold(0.0, f64::max)
}
