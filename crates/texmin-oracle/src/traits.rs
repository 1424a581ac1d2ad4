//! The oracle abstraction the minimizer compiles candidates through.

use async_trait::async_trait;

use crate::context::RunContext;
use crate::error::Result;
use crate::signature::OracleResult;

/// Judges candidate documents.
///
/// Implementations compile `candidate` and report its normalized error
/// signature. `label` names the tested chunk and is used to name any
/// artifacts the call leaves behind.
#[async_trait]
pub trait CompilerOracle: Send + Sync {
    /// Short name of this oracle.
    fn name(&self) -> &str;

    /// Compiles one candidate and returns its signature.
    async fn evaluate(&self, ctx: &mut RunContext, candidate: &str, label: &str) -> Result<OracleResult>;

    /// Human-readable description.
    fn description(&self) -> &str {
        "No description available"
    }
}
