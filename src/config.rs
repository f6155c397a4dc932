//! Run configuration.
//!
//! A [`RunConfig`] is plain data, usually parsed from JSON. It names attributes
//! by string; [`RunConfig::resolve`] checks it against a loaded [`Graph`] and
//! produces a [`ResolvedConfig`] holding attribute handles and built components,
//! so a run never discovers a bad option after it has started.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::chain::DEFAULT_MAX_STEP_ATTEMPTS;
use crate::error::{Error, Result};
use crate::graph::{AttrId, Graph};
use crate::io::TallySpec;
use crate::optimize::{GingleScore, Objective};
use crate::partition::{Election, RandomPartitionParams, Tally, TieBreak};
use crate::recom::{CutSelection, RecomParams, TreeMethod};

/// A score function, by attribute and election names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreSpec {
    /// Opportunity districts where `minority / total` reaches `threshold`.
    /// Each side names a declared tally or a graph attribute.
    Gingles {
        minority: String,
        total: String,
        threshold: f64,
        #[serde(default)]
        variant: GingleScore,
    },
    /// Seats won by `party` in the configured election `election`.
    PartySeats { election: String, party: String },
}

/// An election by name. `columns`, when given, lists the vote attribute of each
/// party in order; otherwise each party name is its own attribute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElectionSpec {
    pub name: String,
    pub parties: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
}

/// A per-district sum: one attribute by name, or a named sum of several columns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TallyDecl {
    Attribute(String),
    Sum { name: String, columns: Vec<String> },
}

impl TallyDecl {
    pub fn name(&self) -> &str {
        match self {
            TallyDecl::Attribute(name) | TallyDecl::Sum { name, .. } => name,
        }
    }

    pub fn columns(&self) -> &[String] {
        match self {
            TallyDecl::Attribute(name) => std::slice::from_ref(name),
            TallyDecl::Sum { columns, .. } => columns,
        }
    }

    fn resolve(&self, graph: &Graph) -> Result<Tally> {
        let columns = self.columns().iter().map(|c| graph.attr(c)).collect::<Result<Vec<_>>>()?;
        Tally::sum(columns)
            .ok_or_else(|| Error::InvalidConfig(format!("tally '{}' has no columns", self.name())))
    }
}

impl From<&str> for TallyDecl {
    fn from(name: &str) -> Self { TallyDecl::Attribute(name.to_string()) }
}

impl From<String> for TallyDecl {
    fn from(name: String) -> Self { TallyDecl::Attribute(name) }
}

fn default_node_repeats() -> usize { 1 }
fn default_max_step_attempts() -> usize { DEFAULT_MAX_STEP_ATTEMPTS }
fn default_max_partition_attempts() -> usize { 1000 }
fn default_log_every() -> usize { 100 }

/// Options of one ensemble run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub pop_attr: String,
    /// Target population per district; defaults to total population over `n_parts`.
    #[serde(default)]
    pub pop_target: Option<f64>,
    pub epsilon: f64,
    pub n_parts: u32,
    #[serde(default = "default_node_repeats")]
    pub node_repeats: usize,
    pub total_steps: usize,
    /// Run short bursts of this length (requires `score`).
    #[serde(default)]
    pub burst_length: Option<usize>,
    #[serde(default)]
    pub random_seed: u64,
    #[serde(default)]
    pub cut_selection: CutSelection,
    #[serde(default)]
    pub spanning_tree: TreeMethod,
    #[serde(default)]
    pub pair_reselection: bool,
    #[serde(default = "default_max_step_attempts")]
    pub max_step_attempts: usize,
    #[serde(default = "default_max_partition_attempts")]
    pub max_partition_attempts: usize,
    /// Log progress every this many steps; 0 disables progress logging.
    #[serde(default = "default_log_every")]
    pub log_every: usize,
    #[serde(default)]
    pub tie_break: TieBreak,
    #[serde(default)]
    pub score: Option<ScoreSpec>,
    /// Accept worse-scoring candidates with this probability (requires `score`, excludes bursts).
    #[serde(default)]
    pub tilt_probability: Option<f64>,
    #[serde(default)]
    pub tallies: Vec<TallyDecl>,
    #[serde(default)]
    pub elections: Vec<ElectionSpec>,
}

impl RunConfig {
    /// A configuration with every optional knob at its default.
    pub fn new(pop_attr: impl Into<String>, n_parts: u32, epsilon: f64, total_steps: usize) -> Self {
        Self {
            pop_attr: pop_attr.into(),
            pop_target: None,
            epsilon,
            n_parts,
            node_repeats: default_node_repeats(),
            total_steps,
            burst_length: None,
            random_seed: 0,
            cut_selection: CutSelection::default(),
            spanning_tree: TreeMethod::default(),
            pair_reselection: false,
            max_step_attempts: default_max_step_attempts(),
            max_partition_attempts: default_max_partition_attempts(),
            log_every: default_log_every(),
            tie_break: TieBreak::default(),
            score: None,
            tilt_probability: None,
            tallies: Vec::new(),
            elections: Vec::new(),
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|err| Error::InvalidConfig(err.to_string()))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("[config] Failed to read {}", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Attribute names the run reads, in first-use order without repeats.
    ///
    /// This is the schema to load the graph with.
    pub fn attributes(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut add = |name: &str| {
            if !names.iter().any(|n| n == name) { names.push(name.to_string()) }
        };

        add(&self.pop_attr);
        for tally in &self.tallies {
            for column in tally.columns() { add(column) }
        }
        for election in &self.elections {
            let columns = if election.columns.is_empty() { &election.parties } else { &election.columns };
            for column in columns { add(column) }
        }
        if let Some(ScoreSpec::Gingles { minority, total, .. }) = &self.score {
            for name in [minority, total] {
                if !self.tallies.iter().any(|t| t.name() == name) { add(name) }
            }
        }
        names
    }

    /// Check every option against `graph` and build the run's components.
    pub fn resolve(&self, graph: &Graph) -> Result<ResolvedConfig> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));

        if self.n_parts < 2 || self.n_parts as usize > graph.node_count() {
            return invalid(format!("n_parts must be in [2, {}], got {}", graph.node_count(), self.n_parts));
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return invalid(format!("epsilon must be finite and non-negative, got {}", self.epsilon));
        }
        if self.node_repeats == 0 {
            return invalid("node_repeats must be at least 1".into());
        }
        if self.total_steps == 0 {
            return invalid("total_steps must be at least 1".into());
        }
        if self.max_step_attempts == 0 || self.max_partition_attempts == 0 {
            return invalid("max_step_attempts and max_partition_attempts must be at least 1".into());
        }
        match self.burst_length {
            Some(len) if len < 2 => return invalid(format!("burst_length must be at least 2, got {len}")),
            Some(len) if self.total_steps % len != 0 => return invalid(format!(
                "total_steps ({}) must be a multiple of burst_length ({len})", self.total_steps
            )),
            Some(_) if self.score.is_none() => return invalid("burst_length requires a score".into()),
            _ => {}
        }
        if let Some(p) = self.tilt_probability {
            if self.score.is_none() {
                return invalid("tilt_probability requires a score".into());
            }
            if self.burst_length.is_some() {
                return invalid("tilt_probability cannot be combined with burst_length".into());
            }
            if !(0.0..=1.0).contains(&p) {
                return invalid(format!("tilt_probability must be in [0, 1], got {p}"));
            }
        }

        let pop = graph.attr(&self.pop_attr)?;
        let pop_target = match self.pop_target {
            Some(target) if target.is_finite() && target > 0.0 => target,
            Some(target) => return invalid(format!("pop_target must be finite and positive, got {target}")),
            None => graph.total(pop) / self.n_parts as f64,
        };

        let mut elections = Vec::with_capacity(self.elections.len());
        for spec in &self.elections {
            if elections.iter().any(|e: &Election| e.name() == spec.name) {
                return invalid(format!("election '{}' is declared twice", spec.name));
            }
            elections.push(resolve_election(graph, spec, self.tie_break)?);
        }

        let mut declared: Vec<(&str, Tally)> = Vec::with_capacity(self.tallies.len());
        for decl in &self.tallies {
            if declared.iter().any(|(name, _)| *name == decl.name()) {
                return invalid(format!("tally '{}' is declared twice", decl.name()));
            }
            declared.push((decl.name(), decl.resolve(graph)?));
        }
        let lookup = |name: &str| -> Result<Tally> {
            match declared.iter().find(|(n, _)| *n == name) {
                Some((_, tally)) => Ok(tally.clone()),
                None => Ok(graph.attr(name)?.into()),
            }
        };

        let score = match &self.score {
            None => None,
            Some(ScoreSpec::Gingles { minority, total, threshold, variant }) => {
                Some(Objective::gingles(lookup(minority)?, lookup(total)?, *threshold, *variant)?)
            }
            Some(ScoreSpec::PartySeats { election, party }) => {
                let election = elections.iter().find(|e| e.name() == election).cloned()
                    .ok_or_else(|| Error::InvalidConfig(format!("score refers to undeclared election '{election}'")))?;
                Some(Objective::party_seats(election, party.as_str())?)
            }
        };

        let mut tallies = TallySpec::new(pop);
        for (name, tally) in declared {
            tallies = tallies.sum(name, tally);
        }
        for election in &elections {
            tallies = tallies.election(election.clone());
        }

        let recom = RecomParams::new(pop, pop_target, self.epsilon)
            .node_repeats(self.node_repeats)
            .cut_selection(self.cut_selection)
            .tree_method(self.spanning_tree)
            .pair_reselection(self.pair_reselection);

        let partition = RandomPartitionParams {
            epsilon: self.epsilon,
            node_repeats: self.node_repeats.max(RandomPartitionParams::new(self.epsilon).node_repeats),
            max_attempts: self.max_partition_attempts,
            tree_method: self.spanning_tree,
        };

        Ok(ResolvedConfig {
            pop,
            pop_target,
            epsilon: self.epsilon,
            n_parts: self.n_parts,
            total_steps: self.total_steps,
            burst_length: self.burst_length,
            random_seed: self.random_seed,
            max_step_attempts: self.max_step_attempts,
            log_every: self.log_every,
            recom,
            partition,
            tallies,
            score,
            tilt_probability: self.tilt_probability,
        })
    }
}

fn resolve_election(graph: &Graph, spec: &ElectionSpec, tie_break: TieBreak) -> Result<Election> {
    let columns = if spec.columns.is_empty() { &spec.parties } else { &spec.columns };
    if columns.len() != spec.parties.len() {
        return Err(Error::InvalidConfig(format!(
            "election '{}' lists {} parties but {} columns", spec.name, spec.parties.len(), spec.columns.len()
        )));
    }
    let pairs = spec.parties.iter().zip(columns).map(|(p, c)| (p.as_str(), c.as_str()));
    Ok(Election::with_columns(graph, spec.name.as_str(), pairs)?.tie_break(tie_break))
}

/// A configuration checked against a graph.
#[derive(Clone, Debug)]
pub struct ResolvedConfig {
    pub pop: AttrId,
    pub pop_target: f64,
    pub epsilon: f64,
    pub n_parts: u32,
    pub total_steps: usize,
    pub burst_length: Option<usize>,
    pub random_seed: u64,
    pub max_step_attempts: usize,
    pub log_every: usize,
    pub recom: RecomParams,
    pub partition: RandomPartitionParams,
    pub tallies: TallySpec,
    pub score: Option<Objective>,
    pub tilt_probability: Option<f64>,
}

impl ResolvedConfig {
    /// Number of short bursts, if the run optimizes.
    pub fn num_bursts(&self) -> Option<usize> {
        self.burst_length.map(|len| self.total_steps / len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphSource, NodeRecord, grid, grid_with_votes};
    use crate::optimize::ScoreFunction;
    use crate::partition::Assignment;
    use crate::rng::seeded;

    #[test]
    fn parses_with_defaults() {
        let config = RunConfig::from_json_str(r#"{
            "pop_attr": "population", "epsilon": 0.05, "n_parts": 4, "total_steps": 100
        }"#).unwrap();

        assert_eq!(config, RunConfig::new("population", 4, 0.05, 100));
        assert_eq!(config.node_repeats, 1);
        assert_eq!(config.max_step_attempts, 10_000);
        assert_eq!(config.max_partition_attempts, 1000);
        assert_eq!(config.log_every, 100);
        assert_eq!(config.cut_selection, CutSelection::Random);
        assert_eq!(config.spanning_tree, TreeMethod::Wilson);
        assert_eq!(config.tie_break, TieBreak::LastListed);
    }

    #[test]
    fn parses_scores_and_elections() {
        let config = RunConfig::from_json_str(r#"{
            "pop_attr": "population", "epsilon": 0.1, "n_parts": 6, "total_steps": 100,
            "burst_length": 10, "random_seed": 7, "cut_selection": "most_balanced",
            "spanning_tree": "random_mst", "tie_break": "no_winner",
            "score": {"kind": "gingles", "minority": "D", "total": "population", "threshold": 0.5,
                      "variant": "reward_next_highest_close"},
            "elections": [{"name": "SEN", "parties": ["D", "R"]}]
        }"#).unwrap();

        assert_eq!(config.burst_length, Some(10));
        assert_eq!(config.cut_selection, CutSelection::MostBalanced);
        assert_eq!(config.spanning_tree, TreeMethod::RandomMst);
        assert_eq!(config.score, Some(ScoreSpec::Gingles {
            minority: "D".into(), total: "population".into(), threshold: 0.5,
            variant: GingleScore::RewardNextHighestClose,
        }));
        assert_eq!(config.attributes(), vec!["population", "D", "R"]);

        let graph = grid_with_votes(6, 6, 18, &mut seeded(0));
        let resolved = config.resolve(&graph).unwrap();
        assert_eq!(resolved.pop_target, 6.0);
        assert_eq!(resolved.num_bursts(), Some(10));
        assert_eq!(resolved.recom.cut_selection, CutSelection::MostBalanced);
    }

    #[test]
    fn rejects_unknown_fields_and_bad_json() {
        assert!(matches!(RunConfig::from_json_str("{"), Err(Error::InvalidConfig(_))));
        let extra = r#"{"pop_attr": "p", "epsilon": 0, "n_parts": 2, "total_steps": 1, "steps": 3}"#;
        assert!(matches!(RunConfig::from_json_str(extra), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn resolve_validates_options() {
        let graph = grid(4, 4);
        let base = RunConfig::new("population", 4, 0.1, 20);
        assert!(base.resolve(&graph).is_ok());

        let cases: Vec<(&str, Box<dyn Fn(&mut RunConfig)>)> = vec![
            ("one part", Box::new(|c: &mut RunConfig| c.n_parts = 1)),
            ("too many parts", Box::new(|c: &mut RunConfig| c.n_parts = 17)),
            ("negative epsilon", Box::new(|c: &mut RunConfig| c.epsilon = -0.1)),
            ("nan epsilon", Box::new(|c: &mut RunConfig| c.epsilon = f64::NAN)),
            ("no repeats", Box::new(|c: &mut RunConfig| c.node_repeats = 0)),
            ("no steps", Box::new(|c: &mut RunConfig| c.total_steps = 0)),
            ("empty burst", Box::new(|c: &mut RunConfig| c.burst_length = Some(0))),
            ("single-step bursts", Box::new(|c: &mut RunConfig| {
                c.total_steps = 20;
                c.burst_length = Some(1);
                c.score = Some(ScoreSpec::Gingles {
                    minority: "population".into(), total: "population".into(), threshold: 0.5, variant: GingleScore::default(),
                });
            })),
            ("duplicate tally", Box::new(|c: &mut RunConfig| c.tallies = vec!["population".into(), "population".into()])),
            ("empty tally", Box::new(|c: &mut RunConfig| {
                c.tallies = vec![TallyDecl::Sum { name: "votes".into(), columns: vec![] }];
            })),
            ("burst without score", Box::new(|c: &mut RunConfig| c.burst_length = Some(5))),
            ("indivisible bursts", Box::new(|c: &mut RunConfig| {
                c.burst_length = Some(3);
                c.score = Some(ScoreSpec::Gingles {
                    minority: "population".into(), total: "population".into(), threshold: 0.5, variant: GingleScore::default(),
                });
            })),
            ("tilt without score", Box::new(|c: &mut RunConfig| c.tilt_probability = Some(0.1))),
            ("bad pop target", Box::new(|c: &mut RunConfig| c.pop_target = Some(0.0))),
            ("no attempts", Box::new(|c: &mut RunConfig| c.max_step_attempts = 0)),
        ];

        for (name, mutate) in cases {
            let mut config = base.clone();
            mutate(&mut config);
            assert!(matches!(config.resolve(&graph), Err(Error::InvalidConfig(_))), "{name} should be rejected");
        }
    }

    #[test]
    fn resolve_rejects_unknown_names() {
        let graph = grid(4, 4);

        let mut config = RunConfig::new("TOTPOP", 4, 0.1, 20);
        assert!(matches!(config.resolve(&graph), Err(Error::UnknownAttribute(name)) if name == "TOTPOP"));

        config.pop_attr = "population".into();
        config.tallies = vec!["BVAP".into()];
        assert!(matches!(config.resolve(&graph), Err(Error::UnknownAttribute(_))));

        config.tallies.clear();
        config.score = Some(ScoreSpec::PartySeats { election: "SEN".into(), party: "D".into() });
        assert!(matches!(config.resolve(&graph), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn scores_against_composite_tallies() {
        let config = RunConfig::from_json_str(r#"{
            "pop_attr": "population", "epsilon": 0.0, "n_parts": 2, "total_steps": 10,
            "tallies": ["D", {"name": "total_vote_population", "columns": ["D", "R"]}],
            "score": {"kind": "gingles", "minority": "D", "total": "total_vote_population", "threshold": 0.6,
                      "variant": "num_opportunity_dists"}
        }"#).unwrap();
        assert_eq!(config.tallies[1].columns(), ["D", "R"]);
        assert_eq!(config.attributes(), vec!["population", "D", "R"]);

        let mut source = GraphSource::new(["population", "D", "R"]);
        for (id, nbrs, pop, d, r) in [("a", ["b", "d"], 10.0, 3.0, 1.0), ("b", ["a", "c"], 10.0, 3.0, 1.0),
                                      ("c", ["b", "d"], 10.0, 1.0, 3.0), ("d", ["c", "a"], 10.0, 1.0, 3.0)] {
            let mut node = NodeRecord::new(id).attribute("population", pop).attribute("D", d).attribute("R", r);
            for n in nbrs { node = node.neighbor(n) }
            source.push(node);
        }
        let graph = Graph::load(source).unwrap();
        let resolved = config.resolve(&graph).unwrap();
        let plan = Assignment::from_labels(&graph, vec![0, 0, 1, 1], 2).unwrap();

        // D holds 0.75 of the two-party vote in district 0 but only 0.3 of its population.
        let score = resolved.score.as_ref().unwrap();
        assert_eq!(score.score(&graph, &plan).unwrap(), 1.0);

        let record = resolved.tallies.record(&graph, 0, &plan, None);
        assert_eq!(record.tallies["total_vote_population"], vec![8.0, 8.0]);
        assert_eq!(record.tallies["D"], vec![6.0, 2.0]);
    }

    #[test]
    fn election_columns() {
        let graph = grid_with_votes(4, 4, 8, &mut seeded(1));
        let mut config = RunConfig::new("population", 2, 0.0, 10);
        config.elections = vec![ElectionSpec {
            name: "PRES".into(),
            parties: vec!["Dem".into(), "Rep".into()],
            columns: vec!["D".into(), "R".into()],
        }];
        config.score = Some(ScoreSpec::PartySeats { election: "PRES".into(), party: "Dem".into() });
        assert_eq!(config.attributes(), vec!["population", "D", "R"]);
        assert!(config.resolve(&graph).is_ok());

        config.elections[0].columns.pop();
        assert!(matches!(config.resolve(&graph), Err(Error::InvalidConfig(_))));
    }
}
