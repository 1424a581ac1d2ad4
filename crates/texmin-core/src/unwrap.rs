//! Stripping the outer shell of a nested unit.

use std::sync::LazyLock;

use regex::Regex;

use crate::decompose::{decompose, Boundary, Decomposition, Opening};
use crate::delta::{concat, DeltaKind, DeltaUnit};
use crate::error::{excerpt, BoundaryKind, Result, StructureError};
use crate::lexer::{find_environment_end, has_structure, macro_span, match_brace};

static COMMAND_WITH_BRACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[A-Za-z@]+\*?\{").expect("command pattern is valid"));

/// A nested unit split into its interior and the shell around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unwrapped {
    /// Interior content, lexed into fresh units.
    pub inner: Vec<DeltaUnit>,
    /// Text before the interior, e.g. `\begin{quote}`.
    pub shell_front: String,
    /// Text after the interior, e.g. `\end{quote}`.
    pub shell_back: String,
}

impl Unwrapped {
    fn from_decomposition(decomposition: Decomposition) -> Self {
        let Decomposition { mut units, body_start, body_end } = decomposition;
        let back = units.split_off(body_end);
        let inner = units.split_off(body_start);
        Self {
            inner,
            shell_front: concat(&units),
            shell_back: concat(&back),
        }
    }

    /// The unit reassembled from shell and interior.
    pub fn rewrap(&self, inner: &[DeltaUnit]) -> String {
        format!("{}{}{}", self.shell_front, concat(inner), self.shell_back)
    }
}

/// Determines the boundary that encloses the interior of `text`.
///
/// A `{` before any command or `$` selects a plain group. A leading
/// `\begin{name}` selects that environment, provided its `\end{name}` is
/// present. Otherwise the earliest of `\(`, `\[`, `$$`, `$` and a command
/// with a brace argument wins.
pub fn detect_opening(text: &str) -> Result<Boundary> {
    let first_brace = text.find('{');
    let first_marker = text.find(['\\', '$']);

    if let Some(brace) = first_brace {
        if first_marker.map_or(true, |marker| brace < marker) {
            return Ok(Boundary::Opening(Opening::Group));
        }
    }
    let marker = first_marker.ok_or_else(|| StructureError::MissingBoundary(excerpt(text)))?;

    if text[marker..].starts_with("\\begin{") {
        let open = marker + "\\begin".len();
        let close = match_brace(text, open)
            .ok_or_else(|| StructureError::UnterminatedEnvironment(excerpt(&text[open + 1..])))?;
        let name = &text[open + 1..close];
        if find_environment_end(text, close + 1, name).is_none() {
            return Err(StructureError::UnterminatedEnvironment(name.to_string()));
        }
        return Ok(Boundary::Environment(name.to_string()));
    }

    let rest = &text[marker..];
    let command = COMMAND_WITH_BRACE
        .find(rest)
        .map(|m| (m.start(), Opening::Command(m.as_str().to_string())));
    [
        rest.find("\\(").map(|at| (at, Opening::InlineParen)),
        rest.find("\\[").map(|at| (at, Opening::DisplayBracket)),
        rest.find("$$").map(|at| (at, Opening::DoubleDollar)),
        rest.find('$').map(|at| (at, Opening::Dollar)),
        command,
    ]
    .into_iter()
    .flatten()
    .min_by_key(|(at, _)| *at)
    .map(|(_, opening)| Boundary::Opening(opening))
    .ok_or_else(|| StructureError::MissingBoundary(excerpt(text)))
}

/// Strips the outer shell of `unit` and decomposes its interior.
///
/// Macros open their shell at the last brace argument whose interior has
/// structure, falling back to the last brace argument, so the remaining
/// arguments stay in the shell.
pub fn unwrap_delta(unit: &DeltaUnit) -> Result<Unwrapped> {
    match unit.kind {
        DeltaKind::Text | DeltaKind::Comment => Err(StructureError::NotNestable(excerpt(&unit.verbatim))),
        DeltaKind::Macro => unwrap_macro(&unit.verbatim),
        DeltaKind::Group | DeltaKind::Environment | DeltaKind::Math => {
            let boundary = detect_opening(&unit.verbatim)?;
            let decomposition = decompose(&unit.verbatim, &boundary)?;
            Ok(Unwrapped::from_decomposition(decomposition))
        }
    }
}

fn unwrap_macro(text: &str) -> Result<Unwrapped> {
    if !text.starts_with('\\') {
        return Err(StructureError::NotNestable(excerpt(text)));
    }
    let span = macro_span(text, 0);
    let braces: Vec<_> = span.arguments.iter().filter(|arg| !arg.square).collect();
    let chosen = braces
        .iter()
        .rev()
        .find(|arg| has_structure(arg.interior(text)))
        .or_else(|| braces.last())
        .ok_or_else(|| StructureError::NotNestable(excerpt(text)))?;

    if !chosen.terminated {
        return Err(StructureError::UnterminatedBoundary {
            kind: BoundaryKind::Group,
            fragment: excerpt(text),
        });
    }

    let literal = text[..=chosen.open].to_string();
    let decomposition = decompose(&text[..=chosen.close], &Boundary::Opening(Opening::Command(literal)))?;
    let mut unwrapped = Unwrapped::from_decomposition(decomposition);
    unwrapped.shell_back.push_str(&text[chosen.close + 1..]);
    Ok(unwrapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex_units;

    fn unit(text: &str) -> DeltaUnit {
        let mut units = lex_units(text);
        assert_eq!(units.len(), 1, "{:?} should lex to one unit", text);
        units.remove(0)
    }

    #[test]
    fn test_detect_opening_kinds() {
        assert_eq!(detect_opening("{\\bf x}").unwrap(), Boundary::Opening(Opening::Group));
        assert_eq!(
            detect_opening("\\begin{quote}x\\end{quote}").unwrap(),
            Boundary::Environment("quote".into())
        );
        assert_eq!(detect_opening("$$x$$").unwrap(), Boundary::Opening(Opening::DoubleDollar));
        assert_eq!(detect_opening("$x$").unwrap(), Boundary::Opening(Opening::Dollar));
        assert_eq!(detect_opening("\\(x\\)").unwrap(), Boundary::Opening(Opening::InlineParen));
        assert_eq!(
            detect_opening("\\textbf{x}").unwrap(),
            Boundary::Opening(Opening::Command("\\textbf{".into()))
        );
    }

    #[test]
    fn test_detect_opening_requires_environment_end() {
        let err = detect_opening("\\begin{env}x").unwrap_err();
        assert_eq!(err, StructureError::UnterminatedEnvironment("env".into()));
    }

    #[test]
    fn test_unwrap_environment() {
        let unwrapped = unwrap_delta(&unit("\\begin{quote}B\\badcmd C\\end{quote}")).unwrap();
        assert_eq!(unwrapped.shell_front, "\\begin{quote}");
        assert_eq!(unwrapped.shell_back, "\\end{quote}");
        let inner: Vec<_> = unwrapped.inner.iter().map(|u| u.verbatim.as_str()).collect();
        assert_eq!(inner, vec!["B", "\\badcmd", " C"]);
    }

    #[test]
    fn test_unwrap_nested_environments_one_level() {
        let unwrapped = unwrap_delta(&unit("\\begin{a}\\begin{b}\\text{o}x\\end{b}\\end{a}")).unwrap();
        assert_eq!(unwrapped.shell_front, "\\begin{a}");
        assert_eq!(unwrapped.inner.len(), 1);
        assert!(unwrapped.inner[0].nested);
        assert_eq!(unwrapped.shell_back, "\\end{a}");
    }

    #[test]
    fn test_unwrap_macro_keeps_other_arguments_in_shell() {
        let unwrapped = unwrap_delta(&unit("\\frac{\\alpha}{2}")).unwrap();
        assert_eq!(unwrapped.shell_front, "\\frac{");
        assert_eq!(unwrapped.shell_back, "}{2}");
        assert_eq!(unwrapped.inner[0].verbatim, "\\alpha");

        let unwrapped = unwrap_delta(&unit("\\section[short]{A \\emph{b}}")).unwrap();
        assert_eq!(unwrapped.shell_front, "\\section[short]{");
        assert_eq!(unwrapped.shell_back, "}");
        assert_eq!(unwrapped.rewrap(&unwrapped.inner), "\\section[short]{A \\emph{b}}");
    }

    #[test]
    fn test_unwrap_math_and_group() {
        let unwrapped = unwrap_delta(&unit("$x^{2}$")).unwrap();
        assert_eq!((unwrapped.shell_front.as_str(), unwrapped.shell_back.as_str()), ("$", "$"));

        let unwrapped = unwrap_delta(&unit("{\\bf x}")).unwrap();
        assert_eq!((unwrapped.shell_front.as_str(), unwrapped.shell_back.as_str()), ("{", "}"));
        assert_eq!(unwrapped.inner.len(), 2);
    }

    #[test]
    fn test_flat_units_are_not_nestable() {
        assert!(matches!(
            unwrap_delta(&DeltaUnit::text("plain")),
            Err(StructureError::NotNestable(_))
        ));
        assert!(matches!(
            unwrap_delta(&unit("\\%")),
            Err(StructureError::NotNestable(_))
        ));
    }
}
