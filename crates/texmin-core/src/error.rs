//! Error types for structural analysis of LaTeX sources.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kind of region whose closing marker could not be found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryKind {
    /// `\begin{name}` without a matching `\end{name}`.
    NamedEnvironment(String),
    /// `\(` without `\)`.
    RoundBracketMath,
    /// `\[` without `\]`.
    SquareBracketMath,
    /// `$` without a closing `$`.
    DollarMath,
    /// `$$` without a closing `$$`.
    DoubleDollarMath,
    /// `{` (plain group or command argument) without `}`.
    Group,
}

impl fmt::Display for BoundaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryKind::NamedEnvironment(name) => write!(f, "environment {}", name),
            BoundaryKind::RoundBracketMath => write!(f, "math environment round brackets"),
            BoundaryKind::SquareBracketMath => write!(f, "math environment square brackets"),
            BoundaryKind::DollarMath => write!(f, "math environment $"),
            BoundaryKind::DoubleDollarMath => write!(f, "math environment $$"),
            BoundaryKind::Group => write!(f, "group or command argument"),
        }
    }
}

/// Region families counted by the closure validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionKind {
    /// `\begin{..}` / `\end{..}`.
    Environment,
    /// `\(` / `\)`.
    InlineMath,
    /// `\[` / `\]`.
    DisplayMath,
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionKind::Environment => write!(f, "normal environment"),
            RegionKind::InlineMath => write!(f, "math environment round brackets"),
            RegionKind::DisplayMath => write!(f, "math environment square brackets"),
        }
    }
}

/// Errors raised while decomposing, unwrapping or walking LaTeX structure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    /// The configured boundary opens but never closes.
    #[error("{kind} does not close; considered string part: {fragment}")]
    UnterminatedBoundary { kind: BoundaryKind, fragment: String },

    /// A nested environment has no `\end{name}`.
    #[error("the following environment does not close: {0}")]
    UnterminatedEnvironment(String),

    /// A closing marker appears more often than its opener.
    #[error("we end a {region}{} without beginning it", name_suffix(.name))]
    UnbalancedClosers {
        region: RegionKind,
        name: Option<String>,
    },

    /// The boundary marker could not be located at all.
    #[error("boundary marker {0} not found")]
    MissingBoundary(String),

    /// The document has no `\begin{document}` (or configured body environment).
    #[error("the \\begin{{document}} and/or \\end{{document}} are missing")]
    MissingDocumentBody,

    /// Something other than comments precedes `\documentclass`, or it is missing.
    #[error("command before \\documentclass or \\documentclass missing/mis-spelled")]
    MissingDocumentClass,

    /// A unit offered to the definition walker is not a recognised definition.
    #[error("not a supported definition form: {0}")]
    UnsupportedDefinitionShape(String),

    /// The definition walker was asked for a bracket the definition lacks.
    #[error("definition has {total} bracket positions, position {position} requested")]
    InvalidDefinitionPosition { position: u8, total: u8 },

    /// The definition walker only works on a single-unit center.
    #[error("definition walk needs exactly one center unit, found {0}")]
    CenterNotSingle(usize),

    /// A text or comment unit has no shell to strip.
    #[error("unit has no nested structure: {0}")]
    NotNestable(String),
}

/// Result type alias for structural operations.
pub type Result<T> = std::result::Result<T, StructureError>;

fn name_suffix(name: &Option<String>) -> String {
    name.as_ref().map(|n| format!(" {}", n)).unwrap_or_default()
}

/// Shortens a fragment for inclusion in an error message.
pub(crate) fn excerpt(text: &str) -> String {
    const LIMIT: usize = 80;
    match text.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbalanced_message_names_environment() {
        let err = StructureError::UnbalancedClosers {
            region: RegionKind::Environment,
            name: Some("env".into()),
        };
        assert_eq!(
            err.to_string(),
            "we end a normal environment env without beginning it"
        );

        let err = StructureError::UnbalancedClosers {
            region: RegionKind::DisplayMath,
            name: None,
        };
        assert_eq!(
            err.to_string(),
            "we end a math environment square brackets without beginning it"
        );
    }

    #[test]
    fn test_excerpt_truncates_long_fragments() {
        let long = "x".repeat(200);
        let short = excerpt(&long);
        assert!(short.ends_with("..."));
        assert_eq!(short.len(), 83);
        assert_eq!(excerpt("short"), "short");
    }
}
