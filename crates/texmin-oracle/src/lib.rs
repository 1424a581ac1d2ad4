//! Compiler oracles for LaTeX minimization.
//!
//! An oracle compiles a candidate document and reduces the outcome to a
//! [`Signature`]: the first fatal diagnostic line of the log, a clean run,
//! or a timeout. The minimizer only ever compares signatures for equality.
//!
//! - [`ProcessOracle`]: runs `pdflatex` (or any compatible compiler) on the
//!   host or in a container
//! - [`FnOracle`]: judges candidates with a closure
//!
//! All calls of one run share a [`RunContext`] that names their artifacts.

pub mod context;
pub mod error;
pub mod function;
pub mod process;
pub mod signature;
pub mod traits;

pub use context::RunContext;
pub use error::{OracleError, Result};
pub use function::FnOracle;
pub use process::{Launcher, ProcessOracle, ProcessOracleConfig};
pub use signature::{extract_signature, OracleResult, Signature};
pub use traits::CompilerOracle;
