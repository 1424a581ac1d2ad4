//! Per-run state threaded through every oracle call.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest label kept in an artifact name.
const MAX_LABEL_LEN: usize = 48;

/// Identity and counters of one minimization run.
///
/// Owned by the driver and passed by `&mut` to each oracle call, so artifact
/// names are unique within the run and the run id keeps concurrent runs in
/// the same work directory apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    run_id: Uuid,
    generation: u32,
    counter: u64,
}

impl RunContext {
    /// Creates a context with a fresh random run id.
    pub fn new() -> Self {
        Self::with_run_id(Uuid::new_v4())
    }

    /// Creates a context with the given run id.
    pub fn with_run_id(run_id: Uuid) -> Self {
        Self {
            run_id,
            generation: 0,
            counter: 0,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Number of search passes started so far.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Number of artifacts named so far.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Marks the start of a new search pass.
    pub fn begin_pass(&mut self) -> u32 {
        self.generation += 1;
        self.generation
    }

    /// Returns a fresh artifact name `g<generation>-<counter>-<label>`.
    pub fn next_artifact(&mut self, label: &str) -> String {
        self.counter += 1;
        format!("g{}-{}-{}", self.generation, self.counter, sanitize(label))
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

fn sanitize(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_') { c } else { '_' })
        .take(MAX_LABEL_LEN)
        .collect();
    if cleaned.is_empty() {
        "unlabeled".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_names_are_unique_and_sanitized() {
        let mut ctx = RunContext::new();
        let first = ctx.next_artifact("P1..P3");
        let second = ctx.next_artifact("P1..P3");
        assert_ne!(first, second);
        assert_eq!(first, "g0-1-P1..P3");

        ctx.begin_pass();
        assert_eq!(ctx.next_artifact("../etc/passwd x"), "g1-3-.._etc_passwd_x");
        assert_eq!(ctx.next_artifact(""), "g1-4-unlabeled");
        assert_eq!(ctx.counter(), 4);
    }

    #[test]
    fn test_long_labels_are_truncated() {
        let mut ctx = RunContext::with_run_id(Uuid::nil());
        let name = ctx.next_artifact(&"x".repeat(200));
        assert_eq!(name.len(), "g0-1-".len() + MAX_LABEL_LEN);
        assert_eq!(ctx.run_id(), Uuid::nil());
    }

    #[test]
    fn test_generation_tracks_passes() {
        let mut ctx = RunContext::default();
        assert_eq!(ctx.generation(), 0);
        assert_eq!(ctx.begin_pass(), 1);
        assert_eq!(ctx.begin_pass(), 2);
    }
}
