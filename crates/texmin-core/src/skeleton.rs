//! Skeleton/center split.
//!
//! The skeleton is the text held fixed around the center content while a
//! pass tests subsets of the center. Shells stripped off nested units are
//! pushed onto it, innermost last on the front and first on the back.

use serde::{Deserialize, Serialize};

use crate::decompose::Decomposition;
use crate::delta::DeltaUnit;

/// Splits a decomposition's units into front skeleton, center and back skeleton.
///
/// The caller guarantees `body_start <= body_end <= units.len()`.
pub fn split(units: &[DeltaUnit], body_start: usize, body_end: usize) -> (Vec<String>, Vec<DeltaUnit>, Vec<String>) {
    let front = units[..body_start].iter().map(|u| u.verbatim.clone()).collect();
    let center = units[body_start..body_end].to_vec();
    let back = units[body_end..].iter().map(|u| u.verbatim.clone()).collect();
    (front, center, back)
}

/// Fixed text surrounding the center content of a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub front: Vec<String>,
    pub back: Vec<String>,
}

impl Frame {
    pub fn new(front: Vec<String>, back: Vec<String>) -> Self {
        Self { front, back }
    }

    /// Splits a decomposition into its frame and center content.
    pub fn from_decomposition(decomposition: &Decomposition) -> (Self, Vec<DeltaUnit>) {
        let (front, center, back) = split(
            &decomposition.units,
            decomposition.body_start,
            decomposition.body_end,
        );
        (Self { front, back }, center)
    }

    /// Assembles a candidate document `front ++ chunk ++ back`.
    pub fn assemble(&self, chunk: &[DeltaUnit]) -> String {
        let mut out = String::with_capacity(self.skeleton_len() + chunk.iter().map(DeltaUnit::len).sum::<usize>());
        self.front.iter().for_each(|s| out.push_str(s));
        chunk.iter().for_each(|u| out.push_str(&u.verbatim));
        self.back.iter().for_each(|s| out.push_str(s));
        out
    }

    /// Assembles a candidate around raw text instead of units.
    pub fn assemble_text(&self, middle: &str) -> String {
        let mut out = String::with_capacity(self.skeleton_len() + middle.len());
        self.front.iter().for_each(|s| out.push_str(s));
        out.push_str(middle);
        self.back.iter().for_each(|s| out.push_str(s));
        out
    }

    /// The document with an empty center.
    pub fn document(&self) -> String {
        self.assemble(&[])
    }

    /// Returns a frame with a shell pushed inside the current one.
    pub fn wrap(&self, shell_front: impl Into<String>, shell_back: impl Into<String>) -> Self {
        let mut front = self.front.clone();
        front.push(shell_front.into());
        let mut back = Vec::with_capacity(self.back.len() + 1);
        back.push(shell_back.into());
        back.extend(self.back.iter().cloned());
        Self { front, back }
    }

    /// Total length of the skeleton text in bytes.
    pub fn skeleton_len(&self) -> usize {
        self.front.iter().chain(self.back.iter()).map(String::len).sum()
    }
}
