//! The hierarchical minimization driver.
//!
//! The driver validates the document, establishes the target signature and
//! then runs search passes over a worklist of scopes: the document body
//! first, the preamble once the body turns out to be irrelevant, and the
//! interiors of nested units as they are isolated.

use std::slice;
use std::time::Instant;

use texmin_core::{
    check_balanced, check_closed, command_name, concat, decompose_document, defined_command, find_environment_begin,
    lex_units, DeltaKind, DeltaUnit, Frame, StructureError,
};
use texmin_oracle::{CompilerOracle, RunContext};
use tracing::{debug, info, warn};

use crate::attribution::{attribute, Attribution};
use crate::config::MinimizerConfig;
use crate::error::{MinimizerError, Result};
use crate::probe::OracleProbe;
use crate::result::{Minimized, Resolution};
use crate::search::{PassOutcome, Scope, ScopeLevel, SearchPass};

enum Step {
    Search(Scope),
    Resolved(String, Resolution),
}

/// Minimizes failing LaTeX documents against a compiler oracle.
pub struct Driver {
    config: MinimizerConfig,
}

impl Driver {
    pub fn new(config: MinimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MinimizerConfig {
        &self.config
    }

    /// Minimizes `document` with a fresh run context.
    pub async fn minimize(&self, document: &str, oracle: &dyn CompilerOracle) -> Result<Minimized> {
        self.minimize_in(RunContext::new(), document, oracle).await
    }

    /// Minimizes `document`, naming artifacts through `ctx`.
    pub async fn minimize_in(&self, ctx: RunContext, document: &str, oracle: &dyn CompilerOracle) -> Result<Minimized> {
        let start = Instant::now();
        info!(
            run_id = %ctx.run_id(),
            oracle = oracle.name(),
            size = document.len(),
            "Starting LaTeX minimization"
        );

        check_balanced(document)?;
        check_closed(document)?;
        let decomposition = decompose_document(document, &self.config.body_environment)?;
        let (frame, center) = Frame::from_decomposition(&decomposition);

        let mut probe = OracleProbe::establish(oracle, ctx, document, self.config.max_oracle_calls).await?;
        info!(signature = %probe.target(), "Established target signature");

        let (minimized, resolution) = self
            .search(&mut probe, Scope::new(frame, center, ScopeLevel::Body))
            .await?;

        if self.config.verify_final && !probe.reproduces(&minimized, "final").await? {
            warn!(
                signature = %probe.target(),
                "Final verification failed: minimized document no longer reproduces"
            );
            return Err(MinimizerError::VerificationFailed(probe.target().clone()));
        }

        let mut stats = probe.stats().clone();
        stats.original_size = document.len();
        stats.minimized_size = minimized.len();
        stats.duration = Some(start.elapsed());
        info!(
            original = stats.original_size,
            minimized = stats.minimized_size,
            resolution = ?resolution,
            oracle_calls = stats.oracle_calls,
            passes = stats.passes,
            "Minimization complete"
        );

        Ok(Minimized {
            document: minimized,
            resolution,
            signature: probe.target().clone(),
            stats,
        })
    }

    async fn search(&self, probe: &mut OracleProbe<'_>, initial: Scope) -> Result<(String, Resolution)> {
        let mut worklist = vec![initial];
        while let Some(scope) = worklist.pop() {
            if probe.stats().passes >= self.config.max_passes {
                warn!(max_passes = self.config.max_passes, "Pass limit reached");
                return Err(MinimizerError::MaxPassesReached(self.config.max_passes));
            }
            let level = scope.level;
            let interaction = scope.interaction;
            debug!(%level, interaction, center_len = scope.center.len(), "Searching scope");

            let outcome = SearchPass::new(scope, &self.config).run(probe).await?;
            let step = match outcome {
                PassOutcome::Isolated { unit, id, frame } => {
                    debug!(%id, kind = %unit.kind, nested = unit.nested, "Isolated unit");
                    if unit.nested {
                        match attribute(probe, &frame, &unit, level).await? {
                            Attribution::Shell { document } => Step::Resolved(document, Resolution::Shell),
                            Attribution::Content { document } => Step::Resolved(document, Resolution::Content),
                            Attribution::Descend(scope) => Step::Search(scope),
                            Attribution::Unresolved => {
                                Step::Resolved(frame.assemble(&[unit]), Resolution::Unresolved)
                            }
                        }
                    } else {
                        match self.definition_scope(probe, &frame, &unit, level).await? {
                            Some(scope) => Step::Search(scope),
                            None => Step::Resolved(frame.assemble(&[unit]), Resolution::Content),
                        }
                    }
                }
                PassOutcome::OutsideCenter { frame } => self.outside_center(frame, level)?,
                PassOutcome::DefinitionExhausted { document, frame, .. } => {
                    if probe.reproduces(&frame.document(), "without-definition").await? {
                        self.outside_center(frame, level)?
                    } else {
                        Step::Resolved(document, Resolution::DefinitionConstruct)
                    }
                }
                PassOutcome::Exhausted { frame, center } => {
                    let resolution = if interaction {
                        Resolution::Interaction
                    } else {
                        Resolution::Unresolved
                    };
                    Step::Resolved(frame.assemble(&center), resolution)
                }
            };

            match step {
                Step::Search(next) => {
                    probe.stats.record_rescope();
                    worklist.push(next);
                }
                Step::Resolved(document, resolution) => return Ok((document, resolution)),
            }
        }
        Err(MinimizerError::Internal("scope worklist drained without a resolution".to_string()))
    }

    /// Handles a frame that reproduces with its center emptied: the body
    /// gives way to the preamble, anything else is resolved.
    fn outside_center(&self, frame: Frame, level: ScopeLevel) -> Result<Step> {
        Ok(match level {
            ScopeLevel::Body => Step::Search(self.preamble_scope(&frame, &[])?),
            ScopeLevel::Preamble => Step::Resolved(frame.document(), Resolution::ClassOrDelimiters),
            ScopeLevel::Nested(_) => Step::Resolved(frame.document(), Resolution::Shell),
        })
    }

    /// Moves the search of an isolated body command into the preamble when
    /// the preamble defines it and the failure needs that definition.
    ///
    /// The command stays in the body while the preamble is reduced, so the
    /// walker can enter the definition once it is the only unit left.
    async fn definition_scope(
        &self,
        probe: &mut OracleProbe<'_>,
        frame: &Frame,
        unit: &DeltaUnit,
        level: ScopeLevel,
    ) -> Result<Option<Scope>> {
        if level != ScopeLevel::Body || !self.config.descend_definitions || unit.kind != DeltaKind::Macro {
            return Ok(None);
        }
        let Some(name) = command_name(&unit.verbatim) else {
            return Ok(None);
        };
        let scope = match self.preamble_scope(frame, slice::from_ref(unit)) {
            Ok(scope) => scope,
            Err(MinimizerError::Structure(StructureError::MissingDocumentClass)) => return Ok(None),
            Err(err) => return Err(err),
        };
        let Some(position) = scope
            .center
            .iter()
            .rposition(|candidate| defined_command(&candidate.verbatim) == Some(name))
        else {
            return Ok(None);
        };

        let mut without = scope.center.clone();
        without.remove(position);
        if probe.reproduces(&scope.frame.assemble(&without), "undefined-command").await? {
            debug!(command = name, "Failure does not depend on the definition");
            return Ok(None);
        }
        debug!(command = name, "Searching preamble around definition");
        Ok(Some(scope))
    }

    /// Builds the preamble scope from a body frame.
    ///
    /// Leading comments, blank text and `\documentclass` stay in the frame;
    /// everything after `\documentclass` up to the body marker is searched.
    /// `kept` is placed right after the body marker.
    fn preamble_scope(&self, frame: &Frame, kept: &[DeltaUnit]) -> Result<Scope> {
        let front = frame.front.concat();
        let split_at = find_environment_begin(&front, &self.config.body_environment)
            .ok_or(StructureError::MissingDocumentBody)?;

        let mut units = lex_units(&front[..split_at]);
        let class_at = units
            .iter()
            .position(|unit| !is_preamble_padding(unit))
            .filter(|&index| units[index].verbatim.starts_with("\\documentclass"))
            .ok_or(StructureError::MissingDocumentClass)?;
        let center = units.split_off(class_at + 1);

        let mut back = vec![front[split_at..].to_string()];
        if !kept.is_empty() {
            back.push(concat(kept));
        }
        back.extend(frame.back.iter().cloned());
        debug!(center_len = center.len(), "Promoting preamble");
        Ok(Scope::new(Frame::new(vec![concat(&units)], back), center, ScopeLevel::Preamble))
    }
}

fn is_preamble_padding(unit: &DeltaUnit) -> bool {
    match unit.kind {
        DeltaKind::Comment => true,
        DeltaKind::Text => unit.is_blank(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use texmin_oracle::{OracleResult, Signature};

    const UNDEFINED: &str = "! Undefined control sequence.";

    /// Emulates TeX with a predicate and records every call.
    struct RecordingOracle {
        judge: Box<dyn Fn(&str) -> bool + Send + Sync>,
        calls: Mutex<Vec<(u32, String)>>,
        clean_final: bool,
    }

    impl RecordingOracle {
        fn new(judge: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
            Self {
                judge: Box::new(judge),
                calls: Mutex::new(Vec::new()),
                clean_final: false,
            }
        }

        fn failing_on(needle: &'static str) -> Self {
            Self::new(move |candidate| candidate.contains(needle))
        }

        fn calls(&self) -> Vec<(u32, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompilerOracle for RecordingOracle {
        fn name(&self) -> &str {
            "recording"
        }

        async fn evaluate(&self, ctx: &mut RunContext, candidate: &str, label: &str) -> texmin_oracle::Result<OracleResult> {
            ctx.next_artifact(label);
            self.calls.lock().unwrap().push((ctx.generation(), label.to_string()));
            let fails = (self.judge)(candidate) && !(self.clean_final && label == "final");
            Ok(OracleResult::new(if fails {
                Signature::diagnostic(UNDEFINED)
            } else {
                Signature::Clean
            }))
        }
    }

    async fn minimize(document: &str, oracle: &RecordingOracle) -> Result<Minimized> {
        Driver::new(MinimizerConfig::default()).minimize(document, oracle).await
    }

    #[tokio::test]
    async fn test_undefined_command_in_body() {
        let document = "\\documentclass{article}\n\\begin{document}\n\\undefinedcmd{x}\n\\end{document}\n";
        let oracle = RecordingOracle::failing_on("\\undefinedcmd");
        let result = minimize(document, &oracle).await.unwrap();

        assert_eq!(result.resolution, Resolution::Content);
        assert_eq!(
            result.document,
            "\\documentclass{article}\n\\begin{document}\\undefinedcmd{x}\\end{document}\n"
        );
        assert_eq!(result.signature, Signature::diagnostic(UNDEFINED));
        assert_eq!(result.stats.original_size, document.len());
        assert_eq!(result.stats.minimized_size, result.document.len());
        assert_eq!(result.stats.oracle_calls, oracle.calls().len());
    }

    #[tokio::test]
    async fn test_environment_content_is_isolated() {
        let document =
            "\\documentclass{article}\n\\begin{document}\nA\\begin{quote}B\\badcmd C\\end{quote}D\n\\end{document}\n";
        let oracle = RecordingOracle::failing_on("\\badcmd");
        let result = minimize(document, &oracle).await.unwrap();

        assert_eq!(result.resolution, Resolution::Content);
        assert_eq!(
            result.document,
            "\\documentclass{article}\n\\begin{document}\\badcmd\\end{document}\n"
        );
        assert!(result.stats.attribution_tests > 0);
    }

    #[tokio::test]
    async fn test_candidate_labels_are_unique_per_generation() {
        let document =
            "\\documentclass{article}\n\\begin{document}\nA\\begin{quote}B\\badcmd C\\end{quote}D\n\\end{document}\n";
        let oracle = RecordingOracle::failing_on("\\badcmd");
        minimize(document, &oracle).await.unwrap();

        let calls = oracle.calls();
        let unique: HashSet<_> = calls.iter().cloned().collect();
        assert_eq!(unique.len(), calls.len(), "repeated candidate in {:?}", calls);
        assert_eq!(calls[0], (0, "original".to_string()));
    }

    #[tokio::test]
    async fn test_unterminated_environment_fails_before_compiling() {
        let document = "\\documentclass{article}\n\\begin{document}\n\\begin{env}x\n\\end{document}\n";
        let oracle = RecordingOracle::new(|_| true);
        let err = minimize(document, &oracle).await.unwrap_err();

        assert!(matches!(
            err,
            MinimizerError::Structure(StructureError::UnterminatedEnvironment(ref name)) if name == "env"
        ));
        assert!(oracle.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stray_closer_fails_before_compiling() {
        let document = "\\documentclass{article}\n\\begin{document}\nx\\end{itemize}\n\\end{document}\n";
        let oracle = RecordingOracle::new(|_| true);
        let err = minimize(document, &oracle).await.unwrap_err();

        assert!(matches!(err, MinimizerError::Structure(StructureError::UnbalancedClosers { .. })));
        assert!(oracle.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_document_body() {
        let oracle = RecordingOracle::new(|_| true);
        let err = minimize("\\documentclass{article}\nHello\n", &oracle).await.unwrap_err();
        assert!(matches!(err, MinimizerError::Structure(StructureError::MissingDocumentBody)));
        assert!(oracle.calls().is_empty());
    }

    #[tokio::test]
    async fn test_definition_body_in_preamble() {
        let document = "\\documentclass{article}\n\\newcommand{\\foo}{\\badcmd}\n\\begin{document}\nHello\n\\end{document}\n";
        let oracle = RecordingOracle::failing_on("\\badcmd");
        let result = minimize(document, &oracle).await.unwrap();

        assert_eq!(result.resolution, Resolution::Content);
        assert_eq!(
            result.document,
            "\\documentclass{article}\\newcommand{}{\\badcmd}\\begin{document}\\end{document}\n"
        );
        assert_eq!(result.stats.definition_entries, 2);
        assert_eq!(result.stats.rescopes, 1);
    }

    #[tokio::test]
    async fn test_definitions_can_be_left_closed() {
        let document = "\\documentclass{article}\n\\newcommand{\\foo}{\\badcmd}\n\\begin{document}\nHello\n\\end{document}\n";
        let oracle = RecordingOracle::failing_on("\\badcmd");
        let config = MinimizerConfig::default().with_descend_definitions(false);
        let result = Driver::new(config).minimize(document, &oracle).await.unwrap();

        assert_eq!(result.stats.definition_entries, 0);
        assert_eq!(result.resolution, Resolution::Content);
        assert_eq!(
            result.document,
            "\\documentclass{article}\\badcmd\\begin{document}\\end{document}\n"
        );
    }

    #[tokio::test]
    async fn test_command_usage_descends_into_its_definition() {
        let document = "\\documentclass{article}\n\\usepackage{x}\n\\newcommand{\\foo}{\\badcmd}\n\\begin{document}\\foo\\end{document}\n";
        let oracle = RecordingOracle::new(|candidate| {
            candidate.contains("\\newcommand{\\foo}{\\badcmd}") && candidate.contains("\\begin{document}\\foo")
        });
        let result = minimize(document, &oracle).await.unwrap();

        assert_eq!(result.resolution, Resolution::Content);
        assert_eq!(
            result.document,
            "\\documentclass{article}\\newcommand{\\foo}{\\badcmd}\\begin{document}\\foo\\end{document}\n"
        );
        assert_eq!(result.stats.definition_entries, 2);
        assert_eq!(result.stats.rescopes, 1);
        assert!(oracle.calls().iter().any(|(_, label)| label == "undefined-command"));
    }

    #[tokio::test]
    async fn test_command_without_relevant_definition_stays_in_body() {
        let document = "\\documentclass{article}\n\\newcommand{\\foo}{x}\n\\begin{document}\n\\foo\n\\end{document}\n";
        let oracle = RecordingOracle::failing_on("{document}\\foo");
        let result = minimize(document, &oracle).await.unwrap();

        assert_eq!(result.resolution, Resolution::Content);
        assert_eq!(
            result.document,
            "\\documentclass{article}\n\\newcommand{\\foo}{x}\n\\begin{document}\\foo\\end{document}\n"
        );
        assert_eq!(result.stats.rescopes, 0);
        assert_eq!(result.stats.definition_entries, 0);
    }

    #[tokio::test]
    async fn test_commented_body_marker_in_preamble() {
        let document = "\\documentclass{article}\n% \\begin{document} old\n\\begin{document}\n\\bad x\n\\end{document}\n";
        let oracle = RecordingOracle::failing_on("\\bad");
        let result = minimize(document, &oracle).await.unwrap();

        assert_eq!(result.resolution, Resolution::Content);
        assert_eq!(
            result.document,
            "\\documentclass{article}\n% \\begin{document} old\n\\begin{document}\\bad\\end{document}\n"
        );
    }

    #[tokio::test]
    async fn test_preamble_promotion_skips_commented_marker() {
        let document = "\\documentclass{article}\n% \\begin{document} old\n\\badcmd\n\\begin{document}\nHi\n\\end{document}\n";
        let oracle = RecordingOracle::failing_on("\\badcmd");
        let result = minimize(document, &oracle).await.unwrap();

        assert_eq!(result.resolution, Resolution::Content);
        assert_eq!(result.document, "\\documentclass{article}\\badcmd\\begin{document}\\end{document}\n");
    }

    #[tokio::test]
    async fn test_document_class_failure() {
        let document = "\\documentclass{nope}\n\\usepackage{x}\n\\begin{document}\nHi\n\\end{document}\n";
        let oracle = RecordingOracle::failing_on("\\documentclass{nope}");
        let result = minimize(document, &oracle).await.unwrap();

        assert_eq!(result.resolution, Resolution::ClassOrDelimiters);
        assert_eq!(result.document, "\\documentclass{nope}\\begin{document}\\end{document}\n");
    }

    #[tokio::test]
    async fn test_command_before_document_class() {
        let document = "\\usepackage{x}\n\\documentclass{article}\n\\begin{document}\nHi\n\\end{document}\n";
        let oracle = RecordingOracle::failing_on("\\usepackage");
        let err = minimize(document, &oracle).await.unwrap_err();
        assert!(matches!(err, MinimizerError::Structure(StructureError::MissingDocumentClass)));
    }

    #[tokio::test]
    async fn test_shell_resolution() {
        let document = "\\documentclass{article}\n\\begin{document}\n\\begin{badenv}x\\end{badenv}\n\\end{document}\n";
        let oracle = RecordingOracle::failing_on("\\begin{badenv}");
        let result = minimize(document, &oracle).await.unwrap();

        assert_eq!(result.resolution, Resolution::Shell);
        assert_eq!(
            result.document,
            "\\documentclass{article}\n\\begin{document}\\begin{badenv}\\end{badenv}\\end{document}\n"
        );
    }

    #[tokio::test]
    async fn test_scattered_failure_is_unresolved() {
        let document = "\\documentclass{article}\n\\begin{document}\n\\x a b \\y\n\\end{document}\n";
        let oracle = RecordingOracle::new(|candidate| candidate.contains("\\x") && candidate.contains("\\y"));
        let result = minimize(document, &oracle).await.unwrap();

        assert_eq!(result.resolution, Resolution::Unresolved);
        assert_eq!(result.document, document);
        assert!(result.stats.memo_hits > 0);
    }

    #[tokio::test]
    async fn test_clean_document() {
        let oracle = RecordingOracle::new(|_| false);
        let err = minimize("\\documentclass{article}\\begin{document}x\\end{document}", &oracle)
            .await
            .unwrap_err();
        assert!(matches!(err, MinimizerError::NoFailure));
    }

    #[tokio::test]
    async fn test_oracle_budget() {
        let document =
            "\\documentclass{article}\n\\begin{document}\nA\\begin{quote}B\\badcmd C\\end{quote}D\n\\end{document}\n";
        let oracle = RecordingOracle::failing_on("\\badcmd");
        let config = MinimizerConfig::default().with_max_oracle_calls(2);
        let err = Driver::new(config).minimize(document, &oracle).await.unwrap_err();

        assert!(matches!(err, MinimizerError::OracleBudgetExhausted(2)));
        assert_eq!(oracle.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_pass_limit() {
        let document = "\\documentclass{article}\n\\newcommand{\\foo}{\\badcmd}\n\\begin{document}\nHello\n\\end{document}\n";
        let oracle = RecordingOracle::failing_on("\\badcmd");
        let config = MinimizerConfig::default().with_max_passes(1);
        let err = Driver::new(config).minimize(document, &oracle).await.unwrap_err();
        assert!(matches!(err, MinimizerError::MaxPassesReached(1)));
    }

    #[tokio::test]
    async fn test_final_verification() {
        let document = "\\documentclass{article}\n\\begin{document}\n\\undefinedcmd{x}\n\\end{document}\n";
        let mut oracle = RecordingOracle::failing_on("\\undefinedcmd");
        oracle.clean_final = true;
        let err = minimize(document, &oracle).await.unwrap_err();
        assert!(matches!(err, MinimizerError::VerificationFailed(_)));

        let config = MinimizerConfig::default().with_verify_final(false);
        let result = Driver::new(config).minimize(document, &oracle).await.unwrap();
        assert_eq!(result.resolution, Resolution::Content);
    }
}
