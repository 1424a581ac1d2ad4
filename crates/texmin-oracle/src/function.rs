//! Oracle backed by a plain function.

use async_trait::async_trait;
use tracing::trace;

use crate::context::RunContext;
use crate::error::Result;
use crate::signature::{OracleResult, Signature};
use crate::traits::CompilerOracle;

/// Evaluates candidates with a closure instead of a compiler.
///
/// Useful for library callers with their own notion of failure and for
/// emulating TeX in tests.
pub struct FnOracle<F> {
    name: String,
    judge: F,
}

impl<F> FnOracle<F>
where
    F: Fn(&str) -> Signature + Send + Sync,
{
    pub fn new(judge: F) -> Self {
        Self {
            name: "function".to_string(),
            judge,
        }
    }

    /// Sets the name reported by [`CompilerOracle::name`].
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl<F> CompilerOracle for FnOracle<F>
where
    F: Fn(&str) -> Signature + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn evaluate(&self, ctx: &mut RunContext, candidate: &str, label: &str) -> Result<OracleResult> {
        let artifact = ctx.next_artifact(label);
        let signature = (self.judge)(candidate);
        trace!(%artifact, %signature, "Evaluated candidate");
        Ok(OracleResult::new(signature))
    }

    fn description(&self) -> &str {
        "Judges candidates with an in-process function"
    }
}
