//! Walking the bracket arguments of macro and environment definitions.
//!
//! A definition such as `\newcommand{\foo}[1]{body}` is a single unit whose
//! interesting content sits in positional bracket arguments rather than in
//! an ordinary nested group. Positions are 1-indexed and counted over the
//! brace groups; an optional `[...]` right after the first brace group
//! takes position 2 and shifts the later ones by one.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::delta::{relabel, DeltaUnit, Provenance};
use crate::error::{excerpt, Result, StructureError};
use crate::lexer::{comment_end, escape_end, lex_units, match_brace, match_bracket};
use crate::skeleton::Frame;

static ENVIRONMENT_DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\\(?:re)?newenvironment\*?\s*\{").expect("environment definition pattern is valid")
});
static COMMAND_DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\\(?:(?:re)?newcommand|providecommand)\*?\s*\{").expect("command definition pattern is valid")
});
// The `titling` hooks; other `\pre...` macros such as `\prettyref` are ordinary commands.
static HOOK_DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\\(?:pre|post)(?:title|author|date)\s*\{").expect("hook pattern is valid")
});

/// The recognised definition forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefinitionKind {
    /// `\newenvironment` / `\renewenvironment`: name, begin half, end half.
    Environment,
    /// `\newcommand` / `\renewcommand` / `\providecommand`: name, body.
    Command,
    /// `\pretitle`, `\postdate` and the other `titling` hooks: one code argument.
    Hook,
}

impl DefinitionKind {
    fn brace_positions(self) -> u8 {
        match self {
            DefinitionKind::Environment => 3,
            DefinitionKind::Command => 2,
            DefinitionKind::Hook => 1,
        }
    }
}

/// Shape of a definition unit: its kind and whether it has an optional argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionShape {
    pub kind: DefinitionKind,
    pub optional: bool,
}

impl DefinitionShape {
    /// Recognises a definition, or fails with `UnsupportedDefinitionShape`.
    pub fn detect(text: &str) -> Result<Self> {
        let kind = if ENVIRONMENT_DEFINITION.is_match(text) {
            DefinitionKind::Environment
        } else if COMMAND_DEFINITION.is_match(text) {
            DefinitionKind::Command
        } else if HOOK_DEFINITION.is_match(text) {
            DefinitionKind::Hook
        } else {
            return Err(StructureError::UnsupportedDefinitionShape(excerpt(text)));
        };

        let groups = top_level_groups(text);
        let optional = matches!(groups.as_slice(), [first, second, ..] if !first.square && second.square);
        let shape = Self { kind, optional };

        let braces = groups.iter().filter(|g| !g.square).count();
        if braces < usize::from(kind.brace_positions()) {
            return Err(StructureError::UnsupportedDefinitionShape(excerpt(text)));
        }
        Ok(shape)
    }

    /// Number of bracket positions, the optional argument included.
    pub fn total_positions(&self) -> u8 {
        self.kind.brace_positions() + u8::from(self.optional)
    }

    /// Offsets of the opening and closing delimiter at `position`.
    fn locate(&self, text: &str, position: u8) -> Result<(usize, usize)> {
        let total = self.total_positions();
        if position == 0 || position > total {
            return Err(StructureError::InvalidDefinitionPosition { position, total });
        }

        let groups = top_level_groups(text);
        let target = if self.optional && position == 2 {
            groups.iter().find(|g| g.square)
        } else {
            let brace_index = if self.optional && position > 2 { position - 1 } else { position };
            groups.iter().filter(|g| !g.square).nth(usize::from(brace_index) - 1)
        };
        target
            .map(|g| (g.open, g.close))
            .ok_or_else(|| StructureError::UnsupportedDefinitionShape(excerpt(text)))
    }
}

/// The command a `\newcommand`-style unit defines, e.g. `\foo`.
pub fn defined_command(text: &str) -> Option<&str> {
    let shape = DefinitionShape::detect(text).ok()?;
    if shape.kind != DefinitionKind::Command {
        return None;
    }
    let (open, close) = shape.locate(text, 1).ok()?;
    Some(text[open + 1..close].trim())
}

#[derive(Debug, Clone, Copy)]
struct BracketGroup {
    open: usize,
    close: usize,
    square: bool,
}

/// Bracket groups at nesting depth zero, in order. A `[...]` only counts
/// when it directly follows a brace group, whitespace aside.
fn top_level_groups(text: &str) -> Vec<BracketGroup> {
    let bytes = text.as_bytes();
    let mut groups = Vec::new();
    let mut after_brace = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i = escape_end(text, i);
                after_brace = false;
            }
            b'%' => i = comment_end(bytes, i),
            b'{' => {
                let Some(close) = match_brace(text, i) else { break };
                groups.push(BracketGroup { open: i, close, square: false });
                i = close + 1;
                after_brace = true;
            }
            b'[' if after_brace => {
                let Some(close) = match_bracket(text, i) else { break };
                groups.push(BracketGroup { open: i, close, square: true });
                i = close + 1;
                after_brace = false;
            }
            b' ' | b'\t' | b'\r' | b'\n' => i += 1,
            _ => {
                i += 1;
                after_brace = false;
            }
        }
    }
    groups
}

/// The state after entering one bracket of a definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionEntry {
    /// Frame with the definition text around the bracket interior pushed on.
    pub frame: Frame,
    /// The bracket interior, with `Definition { position }` ids.
    pub center: Vec<DeltaUnit>,
    /// The frame the definition unit was taken from.
    pub previous_frame: Frame,
    /// The single definition unit that was entered.
    pub previous_center: Vec<DeltaUnit>,
    /// Text of the definition up to and including the opening delimiter.
    pub head: String,
    /// Text of the definition from the closing delimiter on.
    pub tail: String,
    pub position: u8,
    pub total: u8,
    /// True once `position` is the definition's last bracket.
    pub finished: bool,
}

/// Exposes bracket `position` of the single definition unit in `center`.
pub fn enter_definition_argument(frame: &Frame, center: &[DeltaUnit], position: u8) -> Result<DefinitionEntry> {
    let [unit] = center else {
        return Err(StructureError::CenterNotSingle(center.len()));
    };
    let text = unit.verbatim.as_str();
    let shape = DefinitionShape::detect(text)?;
    let total = shape.total_positions();
    let (open, close) = shape.locate(text, position)?;

    let head = text[..=open].to_string();
    let tail = text[close..].to_string();
    let mut inner = lex_units(&text[open + 1..close]);
    relabel(&mut inner, Provenance::Definition { position });
    debug!(
        kind = ?shape.kind,
        position,
        total,
        center_len = inner.len(),
        "Entered definition argument"
    );

    Ok(DefinitionEntry {
        frame: frame.wrap(head.clone(), tail.clone()),
        center: inner,
        previous_frame: frame.clone(),
        previous_center: center.to_vec(),
        head,
        tail,
        position,
        total,
        finished: position == total,
    })
}
