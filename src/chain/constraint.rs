use crate::error::{Error, Result};
use crate::graph::{AttrId, Graph};
use crate::partition::{Assignment, compute_tally, is_contiguous};
use crate::recom::PopulationBounds;

/// A validity predicate every chain state must satisfy.
pub trait Constraint {
    /// Short name used in rejection errors and logs.
    fn name(&self) -> &'static str;

    fn is_satisfied(&self, graph: &Graph, assignment: &Assignment) -> bool;
}

/// Every district induces a connected, non-empty subgraph.
#[derive(Clone, Copy, Debug, Default)]
pub struct Contiguous;

impl Constraint for Contiguous {
    fn name(&self) -> &'static str { "contiguous" }

    fn is_satisfied(&self, graph: &Graph, assignment: &Assignment) -> bool {
        assignment.districts().all(|nodes| is_contiguous(graph, nodes))
    }
}

/// Every district's population lies within a relative tolerance of a target.
#[derive(Clone, Copy, Debug)]
pub struct WithinPopulation {
    pop: AttrId,
    bounds: PopulationBounds,
}

impl WithinPopulation {
    pub fn new(pop: AttrId, target: f64, epsilon: f64) -> Self {
        Self { pop, bounds: PopulationBounds::new(target, epsilon) }
    }
}

impl Constraint for WithinPopulation {
    fn name(&self) -> &'static str { "population_bounds" }

    fn is_satisfied(&self, graph: &Graph, assignment: &Assignment) -> bool {
        compute_tally(graph, assignment, self.pop).into_iter().all(|p| self.bounds.admits(p))
    }
}

/// Return the first constraint the assignment violates, as a rejection.
pub(crate) fn check_all(constraints: &[Box<dyn Constraint>], graph: &Graph, assignment: &Assignment) -> Result<()> {
    match constraints.iter().find(|c| !c.is_satisfied(graph, assignment)) {
        Some(c) => Err(Error::ConstraintRejected { constraint: c.name() }),
        None => Ok(()),
    }
}
