use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::Graph;
use crate::partition::Assignment;

/// The last yielded chain state and its step index, enough to continue a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainCheckpoint {
    pub step: usize,
    pub n_parts: u32,
    pub labels: Vec<u32>,
}

impl ChainCheckpoint {
    /// Rebuild the checkpointed assignment, validating it against the graph.
    pub fn restore(&self, graph: &Graph) -> Result<Assignment> {
        Assignment::from_labels(graph, self.labels.clone(), self.n_parts)
    }

    /// Write the checkpoint as JSON.
    pub fn save(&self, path: &Path) -> AnyResult<()> {
        let file = File::create(path)
            .with_context(|| format!("[chain::checkpoint] failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)
            .context("[chain::checkpoint] failed to serialize checkpoint")?;
        writer.flush().context("[chain::checkpoint] failed to flush checkpoint")?;
        Ok(())
    }

    /// Read a checkpoint written by [`ChainCheckpoint::save`].
    pub fn load(path: &Path) -> AnyResult<Self> {
        let file = File::open(path)
            .with_context(|| format!("[chain::checkpoint] failed to open {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("[chain::checkpoint] malformed checkpoint {}", path.display()))
    }
}
