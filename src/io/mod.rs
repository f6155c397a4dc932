//! Reading and writing of run inputs and outputs, organized by format.
//!
//! # Format Modules
//!
//! - `ben` - run-length, bit-packed binary streams of assignments
//! - `jsonl` - one JSON record per line, used for per-step tallies
//! - `json` - adjacency JSON graph files with optional label columns
//! - `recorder` - the per-step sink combining a BEN stream and a JSONL tally log
//!
//! Format modules return `anyhow::Result` with `[io::<format>]` context;
//! the recorder surfaces them as [`crate::Error::Io`].

mod ben;
mod json;
mod jsonl;
mod recorder;

pub use ben::{BEN_HEADER, BenDecoder, BenEncoder, encode_frame};
pub use json::{read_adjacency_json, read_graph_json, write_adjacency_json, write_graph_json};
pub use jsonl::{JsonlWriter, read_jsonl};
pub use recorder::{ElectionRecord, RecordSummary, Recorder, StepRecord, StepSink, TallySpec};
