//! Result types for minimization runs.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use texmin_oracle::Signature;

use crate::error::Result;

/// How the search ended and where the failure was pinned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// A single flat unit reproduces the failure.
    Content,
    /// The wrapping markup of a nested unit reproduces it on its own.
    Shell,
    /// Shell and content are only needed together.
    Interaction,
    /// The body and preamble can both be emptied: the failure lies in the
    /// document class or the delimiters themselves.
    ClassOrDelimiters,
    /// The failure needs the definition construct, not any one argument.
    DefinitionConstruct,
    /// No chunk reproduced at the finest granularity.
    Unresolved,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Resolution::Content => "the error is in the remaining content",
            Resolution::Shell => "the error is in the wrapping markup",
            Resolution::Interaction => "the error needs the markup and its content together",
            Resolution::ClassOrDelimiters => "the error is in \\documentclass or the document delimiters",
            Resolution::DefinitionConstruct => "the error is in the definition construct itself",
            Resolution::Unresolved => "no smaller reproducing fragment was found",
        };
        f.write_str(text)
    }
}

/// Statistics collected during a minimization run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinimizationStats {
    /// Size of the input document in bytes.
    pub original_size: usize,

    /// Size of the final document in bytes.
    pub minimized_size: usize,

    /// Number of search passes started.
    pub passes: usize,

    /// Number of oracle calls made, the initial one included.
    pub oracle_calls: usize,

    /// Number of chunks skipped because they were already tested.
    pub memo_hits: usize,

    /// Number of times the center shrank to a reproducing chunk.
    pub shrinks: usize,

    /// Number of granularity increases.
    pub granularity_increases: usize,

    /// Largest divider reached.
    pub max_divider: usize,

    /// Number of times the search moved to a new scope.
    pub rescopes: usize,

    /// Oracle calls spent on shell and content attribution.
    pub attribution_tests: usize,

    /// Number of definition brackets entered.
    pub definition_entries: usize,

    /// Time taken.
    #[serde(skip)]
    pub duration: Option<Duration>,
}

impl MinimizationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pass(&mut self) {
        self.passes += 1;
    }

    pub fn record_oracle_call(&mut self) {
        self.oracle_calls += 1;
    }

    pub fn record_memo_hit(&mut self) {
        self.memo_hits += 1;
    }

    pub fn record_shrink(&mut self) {
        self.shrinks += 1;
    }

    /// Record a granularity increase.
    pub fn record_granularity_increase(&mut self, new_divider: usize) {
        self.granularity_increases += 1;
        if new_divider > self.max_divider {
            self.max_divider = new_divider;
        }
    }

    pub fn record_rescope(&mut self) {
        self.rescopes += 1;
    }

    pub fn record_attribution_test(&mut self) {
        self.attribution_tests += 1;
    }

    pub fn record_definition_entry(&mut self) {
        self.definition_entries += 1;
    }

    /// Percentage of the input removed.
    pub fn reduction_percentage(&self) -> f64 {
        if self.original_size == 0 {
            0.0
        } else {
            (1.0 - self.minimized_size as f64 / self.original_size as f64) * 100.0
        }
    }
}

impl fmt::Display for MinimizationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ {} -> {} bytes ({:.1}% reduction), {} passes, {} oracle calls, {} memo hits",
            self.original_size,
            self.minimized_size,
            self.reduction_percentage(),
            self.passes,
            self.oracle_calls,
            self.memo_hits
        )?;
        if let Some(duration) = self.duration {
            write!(f, ", took {:?}", duration)?;
        }
        write!(f, " }}")
    }
}

/// Outcome of a successful minimization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Minimized {
    /// The reduced, compilable document.
    pub document: String,

    /// Where the failure was attributed.
    pub resolution: Resolution,

    /// The diagnostic the document still reproduces.
    pub signature: Signature,

    pub stats: MinimizationStats,
}

impl Minimized {
    /// Serializes the result as a pretty-printed JSON report.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for Minimized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.signature, self.resolution, self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduction_percentage() {
        let mut stats = MinimizationStats::new();
        assert_eq!(stats.reduction_percentage(), 0.0);

        stats.original_size = 200;
        stats.minimized_size = 50;
        assert!((stats.reduction_percentage() - 75.0).abs() < 0.01);
    }

    #[test]
    fn test_granularity_tracks_max_divider() {
        let mut stats = MinimizationStats::new();
        stats.record_granularity_increase(4);
        stats.record_granularity_increase(8);
        stats.record_granularity_increase(2);
        assert_eq!(stats.granularity_increases, 3);
        assert_eq!(stats.max_divider, 8);
    }

    #[test]
    fn test_report_json() {
        let minimized = Minimized {
            document: "\\documentclass{article}".to_string(),
            resolution: Resolution::ClassOrDelimiters,
            signature: Signature::diagnostic("! LaTeX Error: File `nope.cls' not found."),
            stats: MinimizationStats {
                duration: Some(Duration::from_millis(5)),
                ..MinimizationStats::new()
            },
        };
        let json = minimized.to_json().unwrap();
        assert!(json.contains("\"resolution\": \"class_or_delimiters\""));
        assert!(!json.contains("duration"));

        let parsed: Minimized = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.resolution, Resolution::ClassOrDelimiters);
        assert!(parsed.stats.duration.is_none());
    }

    #[test]
    fn test_display_mentions_signature() {
        let minimized = Minimized {
            document: String::new(),
            resolution: Resolution::Content,
            signature: Signature::diagnostic("! Undefined control sequence."),
            stats: MinimizationStats::new(),
        };
        assert!(minimized.to_string().starts_with("! Undefined control sequence. (the error is in the remaining content)"));
    }
}
