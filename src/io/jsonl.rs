//! JSON Lines: one serde record per line.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use serde::{Serialize, de::DeserializeOwned};

/// Append-only JSONL writer.
pub struct JsonlWriter<W: Write> {
    writer: W,
    lines: usize,
}

impl<W: Write> JsonlWriter<W> {
    pub fn new(writer: W) -> Self { Self { writer, lines: 0 } }

    /// Serialize `record` as a single line.
    pub fn write<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let line = self.encode(record)?;
        self.write_line(&line)
    }

    /// Serialize `record` into a newline-terminated buffer without writing it.
    pub fn encode<T: Serialize>(&self, record: &T) -> Result<Vec<u8>> {
        let mut line = serde_json::to_vec(record)
            .with_context(|| format!("[io::jsonl] Failed to serialize record {}", self.lines))?;
        line.push(b'\n');
        Ok(line)
    }

    /// Append a line produced by [`JsonlWriter::encode`].
    pub fn write_line(&mut self, line: &[u8]) -> Result<()> {
        self.writer.write_all(line)
            .with_context(|| format!("[io::jsonl] Failed to write record {}", self.lines))?;
        self.lines += 1;
        Ok(())
    }

    /// Number of records written.
    #[inline] pub fn lines(&self) -> usize { self.lines }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush().context("[io::jsonl] Failed to flush stream")?;
        Ok(self.writer)
    }
}

/// Read every record of a JSONL stream, skipping blank lines.
pub fn read_jsonl<T: DeserializeOwned, R: BufRead>(reader: R) -> Result<Vec<T>> {
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("[io::jsonl] Failed to read line {}", i + 1))?;
        if line.trim().is_empty() { continue }
        let record = serde_json::from_str(&line)
            .with_context(|| format!("[io::jsonl] Invalid record on line {}", i + 1))?;
        records.push(record);
    }
    Ok(records)
}
