//! Error taxonomy for the ensemble engine.
//!
//! Errors fall into three families:
//! - configuration errors (malformed graphs, bad options, exhausted retry bounds), which abort a run;
//! - expected conditions ([`Error::NoBalancedCutFound`], [`Error::NoBalancedPartitionFound`]),
//!   which callers retry and which only escalate once a retry bound is exhausted;
//! - invariant violations, which indicate a defect and must never reach the output.

use thiserror::Error;

/// Result alias used throughout the core.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical error type for graph loading, partition construction and chain runs.
#[derive(Debug, Error)]
pub enum Error {
    /// The graph source violates a structural invariant.
    #[error("malformed graph: {0}")]
    MalformedGraph(String),

    /// An attribute name was not declared in the graph schema.
    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),

    /// A labeling does not describe a valid assignment of the graph.
    #[error("invalid assignment: {0}")]
    InvalidAssignment(String),

    /// A configuration option is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No balanced spanning-tree cut was found for a pair of districts.
    #[error("no balanced cut found for districts {a} and {b} after {attempts} spanning trees")]
    NoBalancedCutFound { a: u32, b: u32, attempts: usize },

    /// A random balanced partition attempt failed.
    #[error("no balanced partition found into {n_parts} parts ({reason})")]
    NoBalancedPartitionFound { n_parts: u32, reason: String },

    /// A candidate assignment failed a chain constraint.
    #[error("constraint '{constraint}' rejected the candidate")]
    ConstraintRejected { constraint: &'static str },

    /// The initial state of a chain does not satisfy its constraints.
    #[error("initial state rejected by constraint '{constraint}'")]
    InitialStateInvalid { constraint: &'static str },

    /// A bounded retry loop ran out of attempts.
    #[error("step {step}: no valid proposal after {attempts} attempts (last failure: {last})")]
    StepRetriesExhausted { step: usize, attempts: usize, last: Box<Error> },

    /// A score function has no value on the given assignment.
    #[error("score '{score}' is undefined: {reason}")]
    UndefinedScore { score: String, reason: String },

    /// An internal invariant was broken; the offending state must not be recorded.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Failure in an output sink or input file.
    #[error("io error: {0:#}")]
    Io(#[from] anyhow::Error),
}

impl Error {
    /// Whether this error is a routine, expected outcome that callers retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self,
            Error::NoBalancedCutFound { .. }
            | Error::NoBalancedPartitionFound { .. }
            | Error::ConstraintRejected { .. }
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self { Error::Io(err.into()) }
}
