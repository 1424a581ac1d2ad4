//! Error signatures extracted from compiler logs.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// First line of a TeX log carrying the fatal-error marker.
static FATAL_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^! .*$").expect("fatal line pattern is valid"));

/// Normalized outcome of compiling one candidate.
///
/// Two candidates fail the same way iff their signatures are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signature {
    /// The candidate compiled without a fatal diagnostic.
    Clean,
    /// The first fatal diagnostic line, e.g. `! Undefined control sequence.`
    Diagnostic(String),
    /// The compiler did not finish within its time limit.
    TimedOut,
}

impl Signature {
    /// Convenience constructor for a diagnostic signature.
    pub fn diagnostic(line: impl Into<String>) -> Self {
        Signature::Diagnostic(line.into())
    }

    /// Returns true for a diagnostic signature.
    pub fn is_failure(&self) -> bool {
        matches!(self, Signature::Diagnostic(_))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signature::Clean => write!(f, "<clean>"),
            Signature::Diagnostic(line) => write!(f, "{}", line),
            Signature::TimedOut => write!(f, "<timed out>"),
        }
    }
}

/// What an oracle reports for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleResult {
    pub signature: Signature,
    /// False when the toolchain left no diagnostic artifact at all.
    pub produced_diagnostic: bool,
}

impl OracleResult {
    /// A result backed by a diagnostic artifact.
    pub fn new(signature: Signature) -> Self {
        Self {
            signature,
            produced_diagnostic: true,
        }
    }

    /// The toolchain produced no log for the candidate.
    pub fn missing() -> Self {
        Self {
            signature: Signature::Clean,
            produced_diagnostic: false,
        }
    }

    /// The compiler was stopped after its time limit.
    pub fn timed_out() -> Self {
        Self::new(Signature::TimedOut)
    }
}

/// Extracts the signature from a compiler log.
pub fn extract_signature(log: &str) -> Signature {
    FATAL_LINE
        .find(log)
        .map(|m| Signature::Diagnostic(m.as_str().trim_end().to_string()))
        .unwrap_or(Signature::Clean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_fatal_line_wins() {
        let log = "This is pdfTeX\n(./candidate.tex\n! Undefined control sequence.\r\nl.3 \\badcmd\n! Emergency stop.\n";
        assert_eq!(
            extract_signature(log),
            Signature::Diagnostic("! Undefined control sequence.".into())
        );
    }

    #[test]
    fn test_marker_must_start_the_line() {
        assert_eq!(extract_signature("Output written\n no ! here\n"), Signature::Clean);
        assert_eq!(extract_signature(""), Signature::Clean);
    }

    #[test]
    fn test_timeout_never_matches_a_diagnostic() {
        assert_ne!(Signature::TimedOut, Signature::diagnostic("! Emergency stop."));
        assert!(!Signature::TimedOut.is_failure());
        assert!(OracleResult::timed_out().produced_diagnostic);
        assert!(!OracleResult::missing().produced_diagnostic);
    }
}
