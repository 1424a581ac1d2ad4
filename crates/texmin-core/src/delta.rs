//! Delta units: the atoms a minimization pass includes or excludes.
//!
//! A LaTeX source is decomposed into an ordered sequence of [`DeltaUnit`]s.
//! Concatenating the verbatim text of a sequence reproduces the substring it
//! was decomposed from, so any subset of units can be reassembled into a
//! candidate document.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Structural kind of a delta unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeltaKind {
    /// A run of plain characters.
    Text,
    /// A `%` comment including its line break.
    Comment,
    /// A control sequence with its directly attached arguments.
    Macro,
    /// A brace group `{...}`.
    Group,
    /// A `\begin{name}...\end{name}` region.
    Environment,
    /// An inline or display math region.
    Math,
}

impl DeltaKind {
    /// Returns true for kinds that carry structure beyond plain text.
    pub fn is_structural(self) -> bool {
        !matches!(self, DeltaKind::Text | DeltaKind::Comment)
    }
}

impl fmt::Display for DeltaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeltaKind::Text => "text",
            DeltaKind::Comment => "comment",
            DeltaKind::Macro => "macro",
            DeltaKind::Group => "group",
            DeltaKind::Environment => "environment",
            DeltaKind::Math => "math",
        };
        f.write_str(name)
    }
}

/// Where the units of a pass were taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Provenance {
    /// Document body or a nested shell inside it.
    Body,
    /// The preamble between `\documentclass` and `\begin{document}`.
    Preamble,
    /// The n-th bracket (1-indexed) of a macro or environment definition.
    Definition { position: u8 },
}

impl Provenance {
    fn prefix(self) -> String {
        match self {
            Provenance::Body => String::new(),
            Provenance::Preamble => "P".to_string(),
            Provenance::Definition { position } => format!("E{}.", position),
        }
    }
}

/// Identifies a unit within one pass: a positional index plus provenance.
///
/// Ids are compared and hashed structurally. The display form (`3`, `P3`,
/// `E2.3`) only serves to name oracle artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeltaId {
    pub provenance: Provenance,
    pub index: usize,
}

impl DeltaId {
    /// Creates an id with the given provenance and index.
    #[inline]
    pub const fn new(provenance: Provenance, index: usize) -> Self {
        Self { provenance, index }
    }

    /// Creates a body id.
    #[inline]
    pub const fn body(index: usize) -> Self {
        Self::new(Provenance::Body, index)
    }
}

impl fmt::Display for DeltaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.provenance.prefix(), self.index)
    }
}

/// One structural element of a LaTeX source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaUnit {
    /// Exact source text of the unit.
    pub verbatim: String,
    /// Structural kind.
    pub kind: DeltaKind,
    /// Whether the unit has an interior worth descending into.
    pub nested: bool,
    /// Positional label within the current pass.
    pub id: DeltaId,
}

impl DeltaUnit {
    /// Creates a unit with a body id of zero; callers relabel sequences.
    pub fn new(verbatim: impl Into<String>, kind: DeltaKind, nested: bool) -> Self {
        Self {
            verbatim: verbatim.into(),
            kind,
            nested,
            id: DeltaId::body(0),
        }
    }

    /// Creates a flat text unit.
    pub fn text(verbatim: impl Into<String>) -> Self {
        Self::new(verbatim, DeltaKind::Text, false)
    }

    /// Returns the unit with a new id.
    pub fn with_id(mut self, id: DeltaId) -> Self {
        self.id = id;
        self
    }

    /// Returns true if the unit consists only of whitespace.
    pub fn is_blank(&self) -> bool {
        self.verbatim.trim().is_empty()
    }

    /// Length of the verbatim text in bytes.
    pub fn len(&self) -> usize {
        self.verbatim.len()
    }

    /// Returns true if the verbatim text is empty.
    pub fn is_empty(&self) -> bool {
        self.verbatim.is_empty()
    }
}

impl fmt::Display for DeltaUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.verbatim)
    }
}

/// Reassigns positional ids `0..n` with the given provenance.
pub fn relabel(units: &mut [DeltaUnit], provenance: Provenance) {
    for (index, unit) in units.iter_mut().enumerate() {
        unit.id = DeltaId::new(provenance, index);
    }
}

/// Concatenates the verbatim text of a sequence.
pub fn concat(units: &[DeltaUnit]) -> String {
    units.iter().map(|u| u.verbatim.as_str()).collect()
}

/// Memo key for a tested chunk: the ids it contains within one pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkKey {
    provenance: Provenance,
    ids: Vec<DeltaId>,
}

impl ChunkKey {
    /// Builds the key for a chunk of units taken from a center with the
    /// given provenance.
    pub fn new(provenance: Provenance, units: &[DeltaUnit]) -> Self {
        Self {
            provenance,
            ids: units.iter().map(|u| u.id).collect(),
        }
    }

    /// Returns true for the empty chunk.
    pub fn is_blank(&self) -> bool {
        self.ids.is_empty()
    }

    /// The ids in this chunk.
    pub fn ids(&self) -> &[DeltaId] {
        &self.ids
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ids.as_slice() {
            [] => match self.provenance {
                Provenance::Body => write!(f, "blank"),
                other => write!(f, "{}-blank", other.prefix().trim_end_matches('.')),
            },
            [only] => write!(f, "{}", only),
            [first, .., last] => write!(f, "{}..{}", first, last),
        }
    }
}
