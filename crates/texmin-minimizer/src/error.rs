//! Error types for the minimizer.

use texmin_core::StructureError;
use texmin_oracle::{OracleError, Signature};
use thiserror::Error;

/// Errors that can occur while minimizing a document.
#[derive(Debug, Error)]
pub enum MinimizerError {
    /// The input document, or a unit inside it, is structurally malformed.
    #[error(transparent)]
    Structure(#[from] StructureError),

    /// The oracle itself failed (I/O, spawn).
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    /// A compilation left no diagnostic artifact behind.
    #[error("No diagnostic produced for candidate {label}; check the compiler setup")]
    OracleSetupFailure { label: String },

    /// The original document compiles cleanly (nothing to minimize).
    #[error("Document compiles without a fatal error - nothing to minimize")]
    NoFailure,

    /// The original document times out instead of failing.
    #[error("Compiler timed out on the original document")]
    TargetTimedOut,

    /// Maximum search passes reached before a resolution.
    #[error("Maximum passes ({0}) reached without a resolution")]
    MaxPassesReached(usize),

    /// The configured oracle call budget ran out.
    #[error("Oracle call budget ({0}) exhausted")]
    OracleBudgetExhausted(usize),

    /// The final document no longer reproduces the target signature.
    #[error("Minimized document no longer reproduces {0}")]
    VerificationFailed(Signature),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization error while producing a report.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result type alias for minimizer operations.
pub type Result<T> = std::result::Result<T, MinimizerError>;
