use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::graph::{AttrId, Graph};
use crate::io::{BenEncoder, JsonlWriter, encode_frame};
use crate::partition::{Assignment, Election, Tally, compute_election, compute_tally, disconnected_districts};

/// Per-election outcome of one step.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ElectionRecord {
    pub seats_won: BTreeMap<String, usize>,
    pub votes: BTreeMap<String, Vec<f64>>,
    pub winners: Vec<Option<String>>,
}

/// One JSONL line: the tallies of one accepted step.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: usize,
    pub population: Vec<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tallies: BTreeMap<String, Vec<f64>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub elections: BTreeMap<String, ElectionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Which tallies go into each step record.
#[derive(Clone, Debug)]
pub struct TallySpec {
    population: AttrId,
    tallies: Vec<(String, Tally)>,
    elections: Vec<Election>,
}

impl TallySpec {
    pub fn new(population: AttrId) -> Self {
        Self { population, tallies: Vec::new(), elections: Vec::new() }
    }

    /// Add a summed attribute, resolved against `graph`.
    pub fn tally(mut self, graph: &Graph, name: &str) -> Result<Self> {
        let attr = graph.attr(name)?;
        self.tallies.push((name.to_string(), attr.into()));
        Ok(self)
    }

    /// Add a named tally summing several columns.
    pub fn sum(mut self, name: impl Into<String>, tally: Tally) -> Self {
        self.tallies.push((name.into(), tally));
        self
    }

    pub fn election(mut self, election: Election) -> Self {
        self.elections.push(election);
        self
    }

    /// Compute the record of one step.
    pub fn record(&self, graph: &Graph, step: usize, assignment: &Assignment, score: Option<f64>) -> StepRecord {
        let tallies = self.tallies.iter()
            .map(|(name, tally)| (name.clone(), tally.compute(graph, assignment)))
            .collect();

        let elections = self.elections.iter().map(|election| {
            let results = compute_election(graph, assignment, election);
            let record = ElectionRecord {
                seats_won: results.parties().iter().map(|p| (p.clone(), results.seats(p))).collect(),
                votes: results.parties().iter()
                    .map(|p| (p.clone(), results.counts(p).map(<[f64]>::to_vec).unwrap_or_default()))
                    .collect(),
                winners: results.winners().into_iter().map(|w| w.map(str::to_string)).collect(),
            };
            (election.name().to_string(), record)
        }).collect();

        StepRecord {
            step,
            population: compute_tally(graph, assignment, self.population),
            tallies,
            elections,
            score,
        }
    }
}

/// Consumer of accepted steps.
pub trait StepSink {
    fn record(&mut self, graph: &Graph, step: usize, assignment: &Assignment, score: Option<f64>) -> Result<()>;
}

/// Writer adapter keeping a running sha256 of everything written through it.
struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> { self.inner.flush() }
}

/// What a finished recorder wrote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RecordSummary {
    pub steps: usize,
    /// Hex sha256 of the whole BEN stream, header included.
    pub ben_sha256: String,
}

/// Streams one BEN frame and one JSONL [`StepRecord`] per accepted step.
///
/// Labels are checked against the graph before anything is written; a bad state
/// fails with [`Error::InvariantViolation`] and leaves the outputs ending at the
/// last good step.
///
/// Both outputs of a step are encoded before either is written. An I/O error
/// while writing can still leave the BEN stream one frame ahead of the JSONL
/// stream; the recorder then refuses further steps.
pub struct Recorder<B: Write, J: Write> {
    ben: BenEncoder<HashingWriter<B>>,
    jsonl: JsonlWriter<J>,
    spec: TallySpec,
    check_contiguity: bool,
    last_step: Option<usize>,
    recorded: usize,
    diverged: bool,
}

impl<B: Write, J: Write> Recorder<B, J> {
    pub fn new(spec: TallySpec, ben: B, jsonl: J) -> Result<Self> {
        let ben = BenEncoder::new(HashingWriter { inner: ben, hasher: Sha256::new() })?;
        Ok(Self {
            ben,
            jsonl: JsonlWriter::new(jsonl),
            spec,
            check_contiguity: true,
            last_step: None,
            recorded: 0,
            diverged: false,
        })
    }

    /// Whether to re-check district contiguity before writing (on by default).
    pub fn check_contiguity(mut self, check: bool) -> Self {
        self.check_contiguity = check;
        self
    }

    /// Steps written to both outputs.
    #[inline] pub fn steps(&self) -> usize { self.recorded }

    fn verify(&self, graph: &Graph, step: usize, assignment: &Assignment) -> Result<()> {
        if self.diverged {
            return Err(Error::InvariantViolation(format!(
                "step {step}: outputs diverged after a failed write at step {}", self.recorded
            )));
        }
        if let Some(last) = self.last_step.filter(|&last| step <= last) {
            return Err(Error::InvariantViolation(format!("step {step} recorded after step {last}")));
        }
        if assignment.node_count() != graph.node_count() {
            return Err(Error::InvariantViolation(format!(
                "step {step}: {} labels for {} nodes", assignment.node_count(), graph.node_count()
            )));
        }

        let mut members = 0;
        for district in 0..assignment.n_parts() {
            let nodes = assignment.nodes(district);
            if nodes.is_empty() {
                return Err(Error::InvariantViolation(format!("step {step}: district {district} is empty")));
            }
            if let Some(&node) = nodes.iter().find(|&&u| assignment.district_of(u) != district) {
                return Err(Error::InvariantViolation(format!(
                    "step {step}: node '{}' listed in district {district} but labeled {}",
                    graph.node_id(node), assignment.district_of(node)
                )));
            }
            members += nodes.len();
        }
        if members != graph.node_count() {
            return Err(Error::InvariantViolation(format!(
                "step {step}: districts hold {members} nodes, graph has {}", graph.node_count()
            )));
        }

        if self.check_contiguity {
            let broken = disconnected_districts(graph, assignment);
            if !broken.is_empty() {
                return Err(Error::InvariantViolation(format!("step {step}: districts {broken:?} are not contiguous")));
            }
        }
        Ok(())
    }

    /// Flush both streams and return the digest of the BEN stream.
    pub fn finish(self) -> Result<RecordSummary> {
        let steps = self.recorded;
        let hashing = self.ben.finish()?;
        self.jsonl.finish()?;
        Ok(RecordSummary { steps, ben_sha256: hex::encode(hashing.hasher.finalize()) })
    }
}

impl Recorder<BufWriter<File>, BufWriter<File>> {
    /// Record into a pair of files, truncating them.
    pub fn create(spec: TallySpec, ben_path: &Path, jsonl_path: &Path) -> Result<Self> {
        let ben = File::create(ben_path)
            .with_context(|| format!("[io::recorder] Failed to create {}", ben_path.display()))?;
        let jsonl = File::create(jsonl_path)
            .with_context(|| format!("[io::recorder] Failed to create {}", jsonl_path.display()))?;
        Self::new(spec, BufWriter::new(ben), BufWriter::new(jsonl))
    }
}

impl<B: Write, J: Write> StepSink for Recorder<B, J> {
    fn record(&mut self, graph: &Graph, step: usize, assignment: &Assignment, score: Option<f64>) -> Result<()> {
        self.verify(graph, step, assignment)?;
        let record = self.spec.record(graph, step, assignment, score);
        let line = self.jsonl.encode(&record)?;
        let frame = encode_frame(assignment.labels());

        let written = self.ben.write_encoded(&frame).and_then(|()| self.jsonl.write_line(&line));
        if written.is_err() {
            self.diverged = true;
        }
        written?;
        self.last_step = Some(step);
        self.recorded += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphSource, NodeRecord, grid};
    use crate::io::{BenDecoder, read_jsonl};

    fn square() -> Graph {
        let mut source = GraphSource::new(["population", "D", "R"]);
        for (id, nbrs, d, r) in [("a", ["b", "d"], 3.0, 1.0), ("b", ["a", "c"], 1.0, 3.0),
                                 ("c", ["b", "d"], 2.0, 2.0), ("d", ["c", "a"], 0.0, 4.0)] {
            let mut node = NodeRecord::new(id).attribute("population", 4.0).attribute("D", d).attribute("R", r);
            for n in nbrs { node = node.neighbor(n) }
            source.push(node);
        }
        Graph::load(source).unwrap()
    }

    #[test]
    fn records_frames_and_tallies() {
        let graph = square();
        let votes = Tally::sum([graph.attr("D").unwrap(), graph.attr("R").unwrap()]).unwrap();
        let spec = TallySpec::new(graph.attr("population").unwrap())
            .tally(&graph, "D").unwrap()
            .sum("total_vote", votes)
            .election(Election::new(&graph, "SEN", &["D", "R"]).unwrap());

        let mut recorder = Recorder::new(spec, Vec::new(), Vec::new()).unwrap();
        let first = Assignment::from_labels(&graph, vec![0, 0, 1, 1], 2).unwrap();
        let second = Assignment::from_labels(&graph, vec![0, 1, 1, 0], 2).unwrap();
        recorder.record(&graph, 0, &first, None).unwrap();
        recorder.record(&graph, 1, &second, Some(1.5)).unwrap();
        assert_eq!(recorder.steps(), 2);

        let ben = recorder.ben.finish().unwrap().inner;
        let frames = BenDecoder::new(ben.as_slice()).unwrap().collect::<anyhow::Result<Vec<_>>>().unwrap();
        assert_eq!(frames, vec![vec![0, 0, 1, 1], vec![0, 1, 1, 0]]);

        let lines: Vec<StepRecord> = read_jsonl(recorder.jsonl.finish().unwrap().as_slice()).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].population, vec![8.0, 8.0]);
        assert_eq!(lines[0].tallies["D"], vec![4.0, 2.0]);
        assert_eq!(lines[0].tallies["total_vote"], vec![8.0, 8.0]);
        assert_eq!(lines[0].score, None);
        assert_eq!(lines[1].score, Some(1.5));

        // Second step: district 0 = {a, d} votes D 3 / R 5, district 1 = {b, c} votes D 3 / R 5.
        let sen = &lines[1].elections["SEN"];
        assert_eq!(sen.votes["D"], vec![3.0, 3.0]);
        assert_eq!(sen.seats_won["R"], 2);
        assert_eq!(sen.winners, vec![Some("R".to_string()), Some("R".to_string())]);
    }

    #[test]
    fn digest_matches_stream() {
        let graph = grid(2, 2);
        let spec = TallySpec::new(graph.attr("population").unwrap());
        let mut recorder = Recorder::new(spec, Vec::new(), std::io::sink()).unwrap();
        recorder.record(&graph, 0, &Assignment::from_labels(&graph, vec![0, 0, 1, 1], 2).unwrap(), None).unwrap();
        let summary = recorder.finish().unwrap();

        let mut expected = BenEncoder::new(Vec::new()).unwrap();
        expected.write(&[0, 0, 1, 1]).unwrap();
        let expected = hex::encode(Sha256::digest(expected.finish().unwrap()));
        assert_eq!(summary, RecordSummary { steps: 1, ben_sha256: expected });
    }

    #[test]
    fn refuses_broken_states() {
        let graph = grid(2, 2);
        let spec = TallySpec::new(graph.attr("population").unwrap());
        let mut recorder = Recorder::new(spec, Vec::new(), Vec::new()).unwrap();

        // Nodes 0 and 3 are diagonal in a 2x2 grid.
        let diagonal = Assignment::from_labels(&graph, vec![0, 1, 1, 0], 2).unwrap();
        assert!(matches!(recorder.record(&graph, 0, &diagonal, None), Err(Error::InvariantViolation(_))));
        assert_eq!(recorder.steps(), 0);

        let good = Assignment::from_labels(&graph, vec![0, 0, 1, 1], 2).unwrap();
        recorder.record(&graph, 3, &good, None).unwrap();
        assert!(matches!(recorder.record(&graph, 3, &good, None), Err(Error::InvariantViolation(_))));

        let other = grid(1, 2);
        let small = Assignment::from_labels(&other, vec![0, 1], 2).unwrap();
        assert!(matches!(recorder.record(&graph, 4, &small, None), Err(Error::InvariantViolation(_))));
        assert_eq!(recorder.steps(), 1);
    }

    struct Full;

    impl Write for Full {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
        }
        fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
    }

    #[test]
    fn stops_after_a_failed_write() {
        let graph = grid(2, 2);
        let spec = TallySpec::new(graph.attr("population").unwrap());
        let mut recorder = Recorder::new(spec, Vec::new(), Full).unwrap();
        let plan = Assignment::from_labels(&graph, vec![0, 0, 1, 1], 2).unwrap();

        assert!(matches!(recorder.record(&graph, 0, &plan, None), Err(Error::Io(_))));
        assert_eq!(recorder.steps(), 0);
        assert!(matches!(recorder.record(&graph, 1, &plan, None), Err(Error::InvariantViolation(_))));
        assert_eq!(recorder.ben.frames(), 1);
    }

    #[test]
    fn creates_files() {
        let graph = grid(2, 2);
        let dir = tempfile::tempdir().unwrap();
        let (ben, jsonl) = (dir.path().join("plans.ben"), dir.path().join("tallies.jsonl"));

        let mut recorder = Recorder::create(TallySpec::new(graph.attr("population").unwrap()), &ben, &jsonl).unwrap();
        recorder.record(&graph, 0, &Assignment::from_labels(&graph, vec![1, 0, 1, 0], 2).unwrap(), None).unwrap();
        recorder.finish().unwrap();

        let frames = BenDecoder::new(File::open(&ben).unwrap()).unwrap().collect::<anyhow::Result<Vec<_>>>().unwrap();
        assert_eq!(frames, vec![vec![1, 0, 1, 0]]);
        let text = std::fs::read_to_string(&jsonl).unwrap();
        assert_eq!(text, "{\"step\":0,\"population\":[2.0,2.0]}\n");
    }
}
