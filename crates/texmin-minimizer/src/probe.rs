//! Oracle access with target matching, budget and statistics.

use texmin_oracle::{CompilerOracle, RunContext, Signature};
use tracing::{debug, trace};

use crate::error::{MinimizerError, Result};
use crate::result::MinimizationStats;

/// Label of the call that establishes the target signature.
pub const TARGET_LABEL: &str = "original";

/// Wraps an oracle for one run: every candidate is compared against the
/// target signature, counted, and checked against the call budget.
pub struct OracleProbe<'o> {
    oracle: &'o dyn CompilerOracle,
    ctx: RunContext,
    target: Signature,
    max_calls: Option<usize>,
    pub(crate) stats: MinimizationStats,
}

impl<'o> OracleProbe<'o> {
    pub fn new(oracle: &'o dyn CompilerOracle, ctx: RunContext, target: Signature, max_calls: Option<usize>) -> Self {
        Self {
            oracle,
            ctx,
            target,
            max_calls,
            stats: MinimizationStats::new(),
        }
    }

    /// Compiles the original document and adopts its signature as the target.
    pub async fn establish(
        oracle: &'o dyn CompilerOracle,
        ctx: RunContext,
        document: &str,
        max_calls: Option<usize>,
    ) -> Result<Self> {
        let mut probe = Self::new(oracle, ctx, Signature::Clean, max_calls);
        let signature = probe.evaluate(document, TARGET_LABEL).await?;
        match signature {
            Signature::Clean => Err(MinimizerError::NoFailure),
            Signature::TimedOut => Err(MinimizerError::TargetTimedOut),
            Signature::Diagnostic(_) => {
                probe.target = signature;
                Ok(probe)
            }
        }
    }

    pub fn target(&self) -> &Signature {
        &self.target
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn stats(&self) -> &MinimizationStats {
        &self.stats
    }

    /// Starts a new artifact generation for a search pass.
    pub fn begin_pass(&mut self) -> u32 {
        self.stats.record_pass();
        self.ctx.begin_pass()
    }

    /// Returns true if `candidate` fails with the target signature.
    pub async fn reproduces(&mut self, candidate: &str, label: &str) -> Result<bool> {
        let signature = self.evaluate(candidate, label).await?;
        let matched = signature == self.target;
        trace!(label, matched, %signature, "Tested candidate");
        Ok(matched)
    }

    async fn evaluate(&mut self, candidate: &str, label: &str) -> Result<Signature> {
        if let Some(max) = self.max_calls {
            if self.stats.oracle_calls >= max {
                debug!(max, "Oracle call budget exhausted");
                return Err(MinimizerError::OracleBudgetExhausted(max));
            }
        }
        self.stats.record_oracle_call();

        let result = self.oracle.evaluate(&mut self.ctx, candidate, label).await?;
        if !result.produced_diagnostic {
            return Err(MinimizerError::OracleSetupFailure {
                label: label.to_string(),
            });
        }
        Ok(result.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use texmin_oracle::{FnOracle, OracleResult};

    struct SilentOracle;

    #[async_trait]
    impl CompilerOracle for SilentOracle {
        fn name(&self) -> &str {
            "silent"
        }

        async fn evaluate(&self, _ctx: &mut RunContext, _candidate: &str, _label: &str) -> texmin_oracle::Result<OracleResult> {
            Ok(OracleResult::missing())
        }
    }

    fn undefined_if_bad() -> FnOracle<impl Fn(&str) -> Signature + Send + Sync> {
        FnOracle::new(|candidate: &str| {
            if candidate.contains("\\bad") {
                Signature::diagnostic("! Undefined control sequence.")
            } else {
                Signature::Clean
            }
        })
    }

    #[tokio::test]
    async fn test_establish_target() {
        let oracle = undefined_if_bad();
        let mut probe = OracleProbe::establish(&oracle, RunContext::new(), "x\\bad", None).await.unwrap();
        assert_eq!(probe.target(), &Signature::diagnostic("! Undefined control sequence."));

        assert!(probe.reproduces("\\bad", "a").await.unwrap());
        assert!(!probe.reproduces("fine", "b").await.unwrap());
        assert_eq!(probe.stats().oracle_calls, 3);
    }

    #[tokio::test]
    async fn test_establish_rejects_clean_and_timeout() {
        let oracle = undefined_if_bad();
        let err = OracleProbe::establish(&oracle, RunContext::new(), "fine", None).await.err().unwrap();
        assert!(matches!(err, MinimizerError::NoFailure));

        let oracle = FnOracle::new(|_: &str| Signature::TimedOut);
        let err = OracleProbe::establish(&oracle, RunContext::new(), "x", None).await.err().unwrap();
        assert!(matches!(err, MinimizerError::TargetTimedOut));
    }

    #[tokio::test]
    async fn test_missing_log_is_setup_failure() {
        let err = OracleProbe::establish(&SilentOracle, RunContext::new(), "x", None).await.err().unwrap();
        assert!(matches!(err, MinimizerError::OracleSetupFailure { ref label } if label == TARGET_LABEL));
    }

    #[tokio::test]
    async fn test_budget() {
        let oracle = undefined_if_bad();
        let mut probe = OracleProbe::establish(&oracle, RunContext::new(), "\\bad", Some(2)).await.unwrap();
        assert!(probe.reproduces("\\bad", "a").await.unwrap());
        let err = probe.reproduces("\\bad", "b").await.unwrap_err();
        assert!(matches!(err, MinimizerError::OracleBudgetExhausted(2)));
        assert_eq!(probe.stats().oracle_calls, 2);
    }
}
