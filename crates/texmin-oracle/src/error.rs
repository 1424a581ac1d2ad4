//! Error types for compiler oracles.

use thiserror::Error;

/// Errors that prevent an oracle from judging a candidate at all.
///
/// A candidate that compiles, fails or times out is a normal result, never
/// an error.
#[derive(Debug, Error)]
pub enum OracleError {
    /// Writing the candidate or reading its artifacts failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The compiler (or container runtime) could not be started.
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for oracle operations.
pub type Result<T> = std::result::Result<T, OracleError>;
