use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::partition::{Assignment, Election, Tally, compute_election};

/// A score over assignments, maximized by the short-burst optimizer.
pub trait ScoreFunction {
    fn score(&self, graph: &Graph, assignment: &Assignment) -> Result<f64>;
}

impl<F> ScoreFunction for F
where
    F: Fn(&Graph, &Assignment) -> f64,
{
    fn score(&self, graph: &Graph, assignment: &Assignment) -> Result<f64> {
        Ok(self(graph, assignment))
    }
}

/// Opportunity-district score variants over per-district minority shares.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GingleScore {
    /// Count of districts at or above threshold.
    NumOpportunityDists,
    /// Count plus the highest share below threshold; undefined if no district is below.
    RewardPartialDist,
    /// As `RewardPartialDist`, but falls back to the count if no district is below.
    #[default]
    SafeRewardPartialDist,
    /// Count plus credit for a below-threshold district within 0.1 of the threshold.
    RewardNextHighestClose,
    /// Count plus a penalty for the largest share over threshold.
    PenalizeMaximumOver,
    /// Count plus a penalty for the average share of opportunity districts.
    PenalizeAvgOver,
}

impl GingleScore {
    /// Evaluate on per-district shares, returning None where the score is undefined.
    pub fn evaluate(self, shares: &[f64], threshold: f64) -> Option<f64> {
        let opportunity = shares.iter().filter(|&&s| s >= threshold).count() as f64;
        let next_below = shares.iter().copied().filter(|&s| s < threshold).reduce(f64::max);

        match self {
            GingleScore::NumOpportunityDists => Some(opportunity),
            GingleScore::RewardPartialDist => next_below.map(|next| opportunity + next),
            GingleScore::SafeRewardPartialDist => Some(opportunity + next_below.unwrap_or(0.0)),
            GingleScore::RewardNextHighestClose => next_below.map(|next| {
                if next < threshold - 0.1 { opportunity }
                else { opportunity + (next - threshold + 0.1) * 10.0 }
            }),
            GingleScore::PenalizeMaximumOver => {
                if opportunity == 0.0 { return Some(0.0) }
                let max = shares.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                Some(opportunity + (1.0 - max) / (1.0 - threshold))
            }
            GingleScore::PenalizeAvgOver => {
                if opportunity == 0.0 { return Some(0.0) }
                let avg = shares.iter().filter(|&&s| s >= threshold).sum::<f64>() / opportunity;
                Some(opportunity + (1.0 - avg) / (1.0 - threshold))
            }
        }
    }

    fn short_name(self) -> &'static str {
        match self {
            GingleScore::NumOpportunityDists => "num_opportunity_dists",
            GingleScore::RewardPartialDist => "reward_partial_dist",
            GingleScore::SafeRewardPartialDist => "safe_reward_partial_dist",
            GingleScore::RewardNextHighestClose => "reward_next_highest_close",
            GingleScore::PenalizeMaximumOver => "penalize_maximum_over",
            GingleScore::PenalizeAvgOver => "penalize_avg_over",
        }
    }
}

#[derive(Clone, Debug)]
enum ObjectiveKind {
    Gingles { minority: Tally, total: Tally, threshold: f64, variant: GingleScore },
    PartySeats { election: Election, party: String },
}

/// A named score over assignments, as chosen in a run configuration.
#[derive(Clone, Debug)]
pub struct Objective {
    kind: ObjectiveKind,
}

impl Objective {
    /// Opportunity-district score where a district's share is `minority / total`.
    ///
    /// Either side may be a single attribute or a [`Tally`] over several columns.
    pub fn gingles(
        minority: impl Into<Tally>,
        total: impl Into<Tally>,
        threshold: f64,
        variant: GingleScore,
    ) -> Result<Self> {
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(Error::InvalidConfig(format!("threshold must be in (0, 1), got {threshold}")));
        }
        Ok(Self { kind: ObjectiveKind::Gingles { minority: minority.into(), total: total.into(), threshold, variant } })
    }

    /// Number of seats `party` wins in `election`.
    pub fn party_seats(election: Election, party: impl Into<String>) -> Result<Self> {
        let party = party.into();
        if !election.parties().any(|p| p == party) {
            return Err(Error::InvalidConfig(format!(
                "party '{party}' does not take part in election '{}'", election.name()
            )));
        }
        Ok(Self { kind: ObjectiveKind::PartySeats { election, party } })
    }
}

impl ScoreFunction for Objective {
    fn score(&self, graph: &Graph, assignment: &Assignment) -> Result<f64> {
        match &self.kind {
            ObjectiveKind::Gingles { minority, total, threshold, variant } => {
                let shares = minority.shares(total, graph, assignment);
                variant.evaluate(&shares, *threshold).ok_or_else(|| Error::UndefinedScore {
                    score: self.to_string(),
                    reason: "no district is below threshold".into(),
                })
            }
            ObjectiveKind::PartySeats { election, party } => {
                Ok(compute_election(graph, assignment, election).seats(party) as f64)
            }
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ObjectiveKind::Gingles { threshold, variant, .. } =>
                write!(f, "{}(threshold={threshold})", variant.short_name()),
            ObjectiveKind::PartySeats { election, party } =>
                write!(f, "seats(election='{}', party='{party}')", election.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphSource, NodeRecord};

    fn close(a: f64, b: f64) -> bool { (a - b).abs() < 1e-12 }

    #[test]
    fn opportunity_counts_and_partial_credit() {
        let shares = [0.62, 0.5, 0.41, 0.3];

        assert_eq!(GingleScore::NumOpportunityDists.evaluate(&shares, 0.5), Some(2.0));
        assert!(close(GingleScore::RewardPartialDist.evaluate(&shares, 0.5).unwrap(), 2.41));
        assert!(close(GingleScore::SafeRewardPartialDist.evaluate(&shares, 0.5).unwrap(), 2.41));
        assert!(close(GingleScore::RewardNextHighestClose.evaluate(&shares, 0.5).unwrap(), 2.1));
        assert_eq!(GingleScore::RewardNextHighestClose.evaluate(&[0.62, 0.35], 0.5), Some(1.0));
        assert!(close(GingleScore::PenalizeMaximumOver.evaluate(&shares, 0.5).unwrap(), 2.0 + 0.38 / 0.5));
        assert!(close(GingleScore::PenalizeAvgOver.evaluate(&shares, 0.5).unwrap(), 2.0 + (1.0 - 0.56) / 0.5));
    }

    #[test]
    fn nothing_below_threshold() {
        let shares = [0.7, 0.55, 0.5];

        assert_eq!(GingleScore::SafeRewardPartialDist.evaluate(&shares, 0.5), Some(3.0));
        assert_eq!(GingleScore::RewardPartialDist.evaluate(&shares, 0.5), None);
        assert_eq!(GingleScore::RewardNextHighestClose.evaluate(&shares, 0.5), None);
    }

    #[test]
    fn no_opportunity_districts_scores_zero_for_penalties() {
        let shares = [0.2, 0.1];
        assert_eq!(GingleScore::PenalizeMaximumOver.evaluate(&shares, 0.5), Some(0.0));
        assert_eq!(GingleScore::PenalizeAvgOver.evaluate(&shares, 0.5), Some(0.0));
    }

    fn two_district_graph() -> (Graph, Assignment) {
        let mut source = GraphSource::new(["population", "D", "R"]);
        source
            .push(NodeRecord::new("a").neighbor("b").attribute("population", 4.0).attribute("D", 3.0).attribute("R", 1.0))
            .push(NodeRecord::new("b").neighbor("a").attribute("population", 4.0).attribute("D", 1.0).attribute("R", 3.0));
        let graph = Graph::load(source).unwrap();
        let assignment = Assignment::from_labels(&graph, vec![0, 1], 2).unwrap();
        (graph, assignment)
    }

    #[test]
    fn objective_scores_assignments() {
        let (graph, assignment) = two_district_graph();
        let dem = graph.attr("D").unwrap();
        let pop = graph.attr("population").unwrap();

        let gingles = Objective::gingles(dem, pop, 0.5, GingleScore::SafeRewardPartialDist).unwrap();
        assert!(close(gingles.score(&graph, &assignment).unwrap(), 1.25));
        assert_eq!(gingles.to_string(), "safe_reward_partial_dist(threshold=0.5)");

        let seats = Objective::party_seats(Election::new(&graph, "SEN", &["D", "R"]).unwrap(), "R").unwrap();
        assert_eq!(seats.score(&graph, &assignment).unwrap(), 1.0);
    }

    #[test]
    fn shares_against_a_two_column_total() {
        let (graph, assignment) = two_district_graph();
        let dem = graph.attr("D").unwrap();
        let votes = Tally::sum([dem, graph.attr("R").unwrap()]).unwrap();

        // District shares of the two-party vote are 0.75 and 0.25.
        let gingles = Objective::gingles(dem, votes, 0.7, GingleScore::RewardPartialDist).unwrap();
        assert!(close(gingles.score(&graph, &assignment).unwrap(), 1.25));
    }

    #[test]
    fn undefined_scores_are_errors() {
        let (graph, assignment) = two_district_graph();
        let dem = graph.attr("D").unwrap();
        let pop = graph.attr("population").unwrap();

        let unsafe_partial = Objective::gingles(dem, pop, 0.2, GingleScore::RewardPartialDist).unwrap();
        let err = unsafe_partial.score(&graph, &assignment).unwrap_err();
        assert!(matches!(err, Error::UndefinedScore { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn objectives_validate_arguments() {
        let (graph, _) = two_district_graph();
        let dem = graph.attr("D").unwrap();
        let pop = graph.attr("population").unwrap();

        assert!(Objective::gingles(dem, pop, 1.0, GingleScore::PenalizeAvgOver).is_err());
        assert!(Objective::gingles(dem, pop, 0.0, GingleScore::PenalizeAvgOver).is_err());
        let election = Election::new(&graph, "SEN", &["D", "R"]).unwrap();
        assert!(matches!(Objective::party_seats(election, "G"), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn closures_are_score_functions() {
        let (graph, assignment) = two_district_graph();
        let constant = |_: &Graph, _: &Assignment| 4.5;
        assert_eq!(constant.score(&graph, &assignment).unwrap(), 4.5);
    }
}
