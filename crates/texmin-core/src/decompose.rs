//! Structural decomposition of a text around a boundary marker.
//!
//! The region enclosed by the boundary becomes the center content, lexed
//! into delta units. Whatever precedes and follows it is kept as one flat
//! skeleton unit on each side.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::delta::{relabel, DeltaUnit, Provenance};
use crate::error::{excerpt, BoundaryKind, Result, StructureError};
use crate::lexer::{find_environment_begin, find_environment_end, lex_units};

/// Opening marker of a boundary that is not a named environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Opening {
    /// A plain `{` group.
    Group,
    /// A command literal up to and including its opening brace, e.g. `\textbf{`.
    Command(String),
    /// `\(`
    InlineParen,
    /// `\[`
    DisplayBracket,
    /// `$`
    Dollar,
    /// `$$`
    DoubleDollar,
}

impl Opening {
    /// The literal searched for to find the start of the region.
    pub fn literal(&self) -> &str {
        match self {
            Opening::Group => "{",
            Opening::Command(literal) => literal,
            Opening::InlineParen => "\\(",
            Opening::DisplayBracket => "\\[",
            Opening::Dollar => "$",
            Opening::DoubleDollar => "$$",
        }
    }

    /// The literal that closes the region.
    pub fn closer(&self) -> &'static str {
        match self {
            Opening::Group | Opening::Command(_) => "}",
            Opening::InlineParen => "\\)",
            Opening::DisplayBracket => "\\]",
            Opening::Dollar => "$",
            Opening::DoubleDollar => "$$",
        }
    }

    fn kind(&self) -> BoundaryKind {
        match self {
            Opening::Group | Opening::Command(_) => BoundaryKind::Group,
            Opening::InlineParen => BoundaryKind::RoundBracketMath,
            Opening::DisplayBracket => BoundaryKind::SquareBracketMath,
            Opening::Dollar => BoundaryKind::DollarMath,
            Opening::DoubleDollar => BoundaryKind::DoubleDollarMath,
        }
    }
}

/// The marker enclosing the center content of a decomposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Boundary {
    /// The whole text is center content.
    Whole,
    /// `\begin{name}` ... matching `\end{name}`.
    Environment(String),
    /// A group, command argument or math region.
    Opening(Opening),
}

/// Result of decomposing a text around a boundary.
///
/// `units` is `[front?] ++ center ++ [back?]`; the skeleton units are only
/// present when non-empty. The center is `units[body_start..body_end]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decomposition {
    pub units: Vec<DeltaUnit>,
    pub body_start: usize,
    pub body_end: usize,
}

impl Decomposition {
    fn from_span(text: &str, start: usize, end: usize) -> Self {
        let mut center = lex_units(&text[start..end]);
        relabel(&mut center, Provenance::Body);

        let mut units = Vec::with_capacity(center.len() + 2);
        if start > 0 {
            units.push(DeltaUnit::text(&text[..start]));
        }
        let body_start = units.len();
        units.extend(center);
        let body_end = units.len();
        if end < text.len() {
            units.push(DeltaUnit::text(&text[end..]));
        }

        Self { units, body_start, body_end }
    }

    /// The center content.
    pub fn center(&self) -> &[DeltaUnit] {
        &self.units[self.body_start..self.body_end]
    }
}

/// Decomposes `text` around `boundary`.
pub fn decompose(text: &str, boundary: &Boundary) -> Result<Decomposition> {
    let (start, end) = locate(text, boundary)?;
    let decomposition = Decomposition::from_span(text, start, end);
    trace!(
        ?boundary,
        center_len = decomposition.body_end - decomposition.body_start,
        "Decomposed region"
    );
    Ok(decomposition)
}

/// Decomposes a full document around its body environment.
pub fn decompose_document(text: &str, body_environment: &str) -> Result<Decomposition> {
    decompose(text, &Boundary::Environment(body_environment.to_string())).map_err(|err| match err {
        StructureError::MissingBoundary(_)
        | StructureError::UnterminatedBoundary {
            kind: BoundaryKind::NamedEnvironment(_),
            ..
        } => StructureError::MissingDocumentBody,
        other => other,
    })
}

fn locate(text: &str, boundary: &Boundary) -> Result<(usize, usize)> {
    match boundary {
        Boundary::Whole => Ok((0, text.len())),
        Boundary::Environment(name) => {
            let marker = format!("\\begin{{{}}}", name);
            let begin = find_environment_begin(text, name)
                .ok_or_else(|| StructureError::MissingBoundary(marker.clone()))?;
            let start = begin + marker.len();
            let (end, _) = find_environment_end(text, start, name).ok_or_else(|| {
                StructureError::UnterminatedBoundary {
                    kind: BoundaryKind::NamedEnvironment(name.clone()),
                    fragment: excerpt(&text[begin..]),
                }
            })?;
            Ok((start, end))
        }
        Boundary::Opening(opening) => {
            let literal = opening.literal();
            let begin = text
                .find(literal)
                .ok_or_else(|| StructureError::MissingBoundary(literal.to_string()))?;
            let start = begin + literal.len();
            match text.rfind(opening.closer()) {
                Some(end) if end >= start => Ok((start, end)),
                _ => Err(StructureError::UnterminatedBoundary {
                    kind: opening.kind(),
                    fragment: excerpt(&text[begin..]),
                }),
            }
        }
    }
}
