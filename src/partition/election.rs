use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::graph::{AttrId, Graph};
use crate::partition::{Assignment, compute_tally};

/// How a district with tied leading parties is decided.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// The tied party listed last wins (with two parties, the second).
    #[default]
    LastListed,
    /// The tied party listed first wins.
    FirstListed,
    /// Nobody wins a tied district.
    NoWinner,
}

/// An election: named vote-count attributes for an ordered list of parties.
#[derive(Clone, Debug)]
pub struct Election {
    name: String,
    parties: Vec<(String, AttrId)>,
    tie_break: TieBreak,
}

impl Election {
    /// Define an election whose party names are also the graph attributes holding their votes.
    pub fn new(graph: &Graph, name: impl Into<String>, parties: &[&str]) -> Result<Self> {
        Self::with_columns(graph, name, parties.iter().map(|&p| (p, p)))
    }

    /// Define an election from `(party, attribute)` pairs.
    pub fn with_columns<'a>(
        graph: &Graph,
        name: impl Into<String>,
        parties: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self> {
        let name = name.into();
        let parties = parties.into_iter()
            .map(|(party, column)| Ok((party.to_string(), graph.attr(column)?)))
            .collect::<Result<Vec<_>>>()?;

        if parties.is_empty() {
            return Err(Error::InvalidConfig(format!("election '{name}' has no parties")));
        }
        for (i, (party, _)) in parties.iter().enumerate() {
            if parties[..i].iter().any(|(p, _)| p == party) {
                return Err(Error::InvalidConfig(format!("election '{name}' lists party '{party}' twice")));
            }
        }

        Ok(Self { name, parties, tie_break: TieBreak::default() })
    }

    /// Replace the tie-break policy.
    pub fn tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    #[inline] pub fn name(&self) -> &str { &self.name }

    /// Party names in listed order.
    pub fn parties(&self) -> impl Iterator<Item = &str> + '_ {
        self.parties.iter().map(|(p, _)| p.as_str())
    }
}

/// Per-district results of one election under one assignment.
#[derive(Clone, Debug, PartialEq)]
pub struct ElectionResults {
    parties: Vec<String>,
    votes: Vec<Vec<f64>>,        // votes[party][district]
    winners: Vec<Option<usize>>, // winners[district] = winning party index
}

/// Tally every party's votes by district and decide each district's winner.
///
/// The winner is the party with strictly the most votes; ties (including
/// all-zero districts) follow the election's [`TieBreak`].
pub fn compute_election(graph: &Graph, assignment: &Assignment, election: &Election) -> ElectionResults {
    let votes = election.parties.iter()
        .map(|&(_, attr)| compute_tally(graph, assignment, attr))
        .collect::<Vec<_>>();

    let winners = (0..assignment.n_parts() as usize)
        .map(|d| {
            let best = votes.iter().map(|v| v[d]).fold(f64::NEG_INFINITY, f64::max);
            let mut leaders = (0..votes.len()).filter(|&p| votes[p][d] == best);
            match election.tie_break {
                TieBreak::FirstListed => leaders.next(),
                TieBreak::LastListed => leaders.last(),
                TieBreak::NoWinner => {
                    let first = leaders.next();
                    if leaders.next().is_some() { None } else { first }
                }
            }
        })
        .collect();

    ElectionResults {
        parties: election.parties.iter().map(|(p, _)| p.clone()).collect(),
        votes,
        winners,
    }
}

impl ElectionResults {
    fn party_index(&self, party: &str) -> Option<usize> {
        self.parties.iter().position(|p| p == party)
    }

    /// Party names in listed order.
    #[inline] pub fn parties(&self) -> &[String] { &self.parties }

    /// Number of districts.
    #[inline] pub fn num_districts(&self) -> usize { self.winners.len() }

    /// Per-district vote counts for a party.
    pub fn counts(&self, party: &str) -> Option<&[f64]> {
        self.party_index(party).map(|p| self.votes[p].as_slice())
    }

    /// Total votes for a party across all districts.
    pub fn total_votes(&self, party: &str) -> Option<f64> {
        self.counts(party).map(|v| v.iter().sum())
    }

    /// Each district's vote share for a party, 0 in districts with no votes cast.
    pub fn percents(&self, party: &str) -> Option<Vec<f64>> {
        let p = self.party_index(party)?;
        Some((0..self.num_districts())
            .map(|d| {
                let total = self.votes.iter().map(|v| v[d]).sum::<f64>();
                if total == 0.0 { 0.0 } else { self.votes[p][d] / total }
            })
            .collect())
    }

    /// Winning party of a district, if any.
    pub fn winner(&self, district: u32) -> Option<&str> {
        self.winners[district as usize].map(|p| self.parties[p].as_str())
    }

    /// Winning party of every district.
    pub fn winners(&self) -> Vec<Option<&str>> {
        (0..self.num_districts() as u32).map(|d| self.winner(d)).collect()
    }

    /// Number of districts a party wins (0 for unknown parties).
    pub fn seats(&self, party: &str) -> usize {
        self.party_index(party)
            .map_or(0, |p| self.winners.iter().filter(|&&w| w == Some(p)).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphSource, NodeRecord};

    /// Path of four units; districts {0,1} and {2,3}.
    fn votes_graph(d: [f64; 4], r: [f64; 4]) -> (Graph, Assignment) {
        let mut source = GraphSource::new(["population", "D", "R"]);
        for i in 0..4 {
            let mut node = NodeRecord::new(i.to_string())
                .attribute("population", 1.0)
                .attribute("D", d[i])
                .attribute("R", r[i]);
            if i > 0 { node = node.neighbor((i - 1).to_string()) }
            if i < 3 { node = node.neighbor((i + 1).to_string()) }
            source.push(node);
        }
        let graph = Graph::load(source).unwrap();
        let assignment = Assignment::from_labels(&graph, vec![0, 0, 1, 1], 2).unwrap();
        (graph, assignment)
    }

    #[test]
    fn strict_majority_wins() {
        let (graph, assignment) = votes_graph([3.0, 2.0, 1.0, 0.0], [1.0, 1.0, 2.0, 2.0]);
        let election = Election::new(&graph, "SEN", &["D", "R"]).unwrap();
        let results = compute_election(&graph, &assignment, &election);

        assert_eq!(results.counts("D").unwrap(), &[5.0, 1.0]);
        assert_eq!(results.counts("R").unwrap(), &[2.0, 4.0]);
        assert_eq!(results.winners(), vec![Some("D"), Some("R")]);
        assert_eq!(results.seats("D"), 1);
        assert_eq!(results.seats("R"), 1);
        assert_eq!(results.seats("G"), 0);
        assert_eq!(results.total_votes("D"), Some(6.0));
        assert_eq!(results.percents("R").unwrap(), vec![2.0 / 7.0, 0.8]);
    }

    #[test]
    fn ties_follow_policy() {
        let (graph, assignment) = votes_graph([1.0, 1.0, 0.0, 0.0], [1.0, 1.0, 0.0, 0.0]);
        let election = Election::new(&graph, "SEN", &["D", "R"]).unwrap();

        let last = compute_election(&graph, &assignment, &election);
        assert_eq!(last.winners(), vec![Some("R"), Some("R")]);

        let first = compute_election(&graph, &assignment, &election.clone().tie_break(TieBreak::FirstListed));
        assert_eq!(first.winners(), vec![Some("D"), Some("D")]);

        let none = compute_election(&graph, &assignment, &election.tie_break(TieBreak::NoWinner));
        assert_eq!(none.winners(), vec![None, None]);
        assert_eq!(none.seats("D") + none.seats("R"), 0);
        assert_eq!(none.percents("D").unwrap(), vec![0.5, 0.0]);
    }

    #[test]
    fn rejects_bad_party_lists() {
        let (graph, _) = votes_graph([0.0; 4], [0.0; 4]);
        assert!(matches!(Election::new(&graph, "X", &[]), Err(Error::InvalidConfig(_))));
        assert!(matches!(Election::new(&graph, "X", &["D", "D"]), Err(Error::InvalidConfig(_))));
        assert!(matches!(Election::new(&graph, "X", &["D", "G"]), Err(Error::UnknownAttribute(_))));
    }
}
