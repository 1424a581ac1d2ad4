//! Single-pass structural scanner.
//!
//! The scanner works on byte offsets. Every delimiter it looks for is ASCII,
//! so every cut it makes falls on a character boundary. Unterminated
//! structures run to the end of the input and stray closers become units of
//! their own, which keeps the scan lossless for arbitrary text.

use crate::delta::{DeltaKind, DeltaUnit};

/// Environments whose bodies are not LaTeX and are matched literally.
pub const VERBATIM_ENVIRONMENTS: &[&str] = &["verbatim", "Verbatim", "lstlisting", "minted", "comment"];

/// Delimiter-sizing macros: a following `[` is content, not an argument.
const DELIMITER_SIZERS: &[&str] = &[
    "left", "right", "middle", "big", "Big", "bigg", "Bigg", "bigl", "bigr", "Bigl", "Bigr",
    "biggl", "biggr", "Biggl", "Biggr", "bigm", "Bigm",
];

/// Definition macros whose arguments may be separated by whitespace.
const SPACED_ARGUMENT_MACROS: &[&str] = &[
    "newcommand",
    "renewcommand",
    "providecommand",
    "newenvironment",
    "renewenvironment",
];

/// One `{...}` or `[...]` argument attached to a control word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Argument {
    /// Offset of the opening delimiter.
    pub open: usize,
    /// Offset of the closing delimiter, or the end of input if unterminated.
    pub close: usize,
    pub square: bool,
    pub terminated: bool,
}

impl Argument {
    pub fn interior<'t>(&self, text: &'t str) -> &'t str {
        &text[self.open + 1..self.close]
    }
}

/// Extent of a control word together with its attached arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MacroSpan {
    pub end: usize,
    pub arguments: Vec<Argument>,
}

/// Splits `text` into delta units.
///
/// Never fails. Concatenating the verbatim text of the result reproduces
/// `text` exactly.
pub fn lex_units(text: &str) -> Vec<DeltaUnit> {
    let mut units = Vec::new();
    let mut pos = 0;
    while pos < text.len() {
        let (end, kind, nested) = scan_unit(text, pos);
        units.push(DeltaUnit::new(&text[pos..end], kind, nested));
        pos = end;
    }
    units
}

/// Returns true if `text` lexes to at least one structural unit.
pub fn has_structure(text: &str) -> bool {
    lex_units(text).iter().any(|unit| unit.kind.is_structural())
}

/// Returns true for environments whose contents are never lexed.
pub fn is_verbatim_environment(name: &str) -> bool {
    VERBATIM_ENVIRONMENTS.contains(&name)
}

fn scan_unit(text: &str, pos: usize) -> (usize, DeltaKind, bool) {
    let bytes = text.as_bytes();
    match bytes[pos] {
        b'%' => (comment_end(bytes, pos), DeltaKind::Comment, false),
        b'{' => {
            let close = match_brace(text, pos).unwrap_or(text.len());
            let end = (close + 1).min(text.len());
            (end, DeltaKind::Group, close > pos + 1)
        }
        b'}' => (pos + 1, DeltaKind::Text, false),
        b'$' => scan_dollar(text, pos),
        b'\\' => scan_backslash(text, pos),
        _ => (text_end(bytes, pos), DeltaKind::Text, false),
    }
}

fn text_end(bytes: &[u8], pos: usize) -> usize {
    let mut i = pos;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' | b'$' | b'{' | b'}' | b'%' => break,
            b'\n' => return i + 1,
            _ => i += 1,
        }
    }
    i
}

fn scan_dollar(text: &str, pos: usize) -> (usize, DeltaKind, bool) {
    let delimiter = if text.as_bytes()[pos..].starts_with(b"$$") { "$$" } else { "$" };
    scan_delimited(text, pos, delimiter.len(), delimiter)
}

fn scan_delimited(text: &str, pos: usize, opener_len: usize, closer: &str) -> (usize, DeltaKind, bool) {
    let interior_start = pos + opener_len;
    match find_closer(text, interior_start, closer) {
        Some(close) => (close + closer.len(), DeltaKind::Math, close > interior_start),
        None => (text.len(), DeltaKind::Math, text.len() > interior_start),
    }
}

fn scan_backslash(text: &str, pos: usize) -> (usize, DeltaKind, bool) {
    let bytes = text.as_bytes();
    let name_end = control_word_end(bytes, pos + 1);
    if name_end == pos + 1 {
        return match bytes.get(pos + 1) {
            None => (pos + 1, DeltaKind::Text, false),
            Some(b'(') => scan_delimited(text, pos, 2, "\\)"),
            Some(b'[') => scan_delimited(text, pos, 2, "\\]"),
            Some(_) => (escape_end(text, pos), DeltaKind::Macro, false),
        };
    }

    match &text[pos + 1..name_end] {
        "begin" => {
            if let Some(scanned) = scan_environment(text, name_end) {
                return scanned;
            }
        }
        "verb" => return (verb_end(text, name_end), DeltaKind::Macro, false),
        _ => {}
    }

    let span = macro_span(text, pos);
    let nested = span
        .arguments
        .iter()
        .any(|arg| has_structure(arg.interior(text)));
    (span.end, DeltaKind::Macro, nested)
}

fn scan_environment(text: &str, name_end: usize) -> Option<(usize, DeltaKind, bool)> {
    if text.as_bytes().get(name_end) != Some(&b'{') {
        return None;
    }
    let name_close = match_brace(text, name_end)?;
    let name = &text[name_end + 1..name_close];
    let interior_start = name_close + 1;
    let verbatim = is_verbatim_environment(name);
    let (interior_end, end) = find_environment_end(text, interior_start, name)
        .unwrap_or((text.len(), text.len()));
    Some((end, DeltaKind::Environment, !verbatim && interior_end > interior_start))
}

fn verb_end(text: &str, name_end: usize) -> usize {
    let mut i = name_end;
    if text.as_bytes().get(i) == Some(&b'*') {
        i += 1;
    }
    let Some(delimiter) = text[i..].chars().next() else {
        return i;
    };
    let body = i + delimiter.len_utf8();
    text[body..]
        .find(delimiter)
        .map_or(text.len(), |offset| body + offset + delimiter.len_utf8())
}

/// Scans the control word at `pos` and the arguments directly attached to it.
pub(crate) fn macro_span(text: &str, pos: usize) -> MacroSpan {
    let bytes = text.as_bytes();
    let name_end = control_word_end(bytes, pos + 1);
    let name = &text[pos + 1..name_end];
    let takes_brackets = !DELIMITER_SIZERS.contains(&name);
    let spaced = SPACED_ARGUMENT_MACROS.contains(&name);

    let mut i = name_end;
    if bytes.get(i) == Some(&b'*') {
        i += 1;
    }
    let mut arguments = Vec::new();
    loop {
        let next = if spaced { skip_inline_space(bytes, i) } else { i };
        match bytes.get(next) {
            Some(b'{') => match match_brace(text, next) {
                Some(close) => {
                    arguments.push(Argument { open: next, close, square: false, terminated: true });
                    i = close + 1;
                }
                None => {
                    arguments.push(Argument {
                        open: next,
                        close: text.len(),
                        square: false,
                        terminated: false,
                    });
                    i = text.len();
                    break;
                }
            },
            Some(b'[') if takes_brackets => match match_bracket(text, next) {
                Some(close) => {
                    arguments.push(Argument { open: next, close, square: true, terminated: true });
                    i = close + 1;
                }
                None => break,
            },
            _ => break,
        }
    }

    MacroSpan { end: i, arguments }
}

/// The control word a macro unit starts with, e.g. `\foo` for `\foo{x}`.
pub fn command_name(text: &str) -> Option<&str> {
    if !text.starts_with('\\') {
        return None;
    }
    let end = control_word_end(text.as_bytes(), 1);
    (end > 1).then(|| &text[..end])
}

/// End of a control word name (letters and `@`), starting after the backslash.
pub(crate) fn control_word_end(bytes: &[u8], from: usize) -> usize {
    let mut i = from;
    while i < bytes.len() && (bytes[i].is_ascii_alphabetic() || bytes[i] == b'@') {
        i += 1;
    }
    i
}

/// Skips spaces, tabs and at most one line break.
fn skip_inline_space(bytes: &[u8], from: usize) -> usize {
    let mut i = from;
    let mut newlines = 0;
    while i < bytes.len() {
        match bytes[i] {
            b' ' | b'\t' | b'\r' => i += 1,
            b'\n' if newlines == 0 => {
                newlines += 1;
                i += 1;
            }
            _ => break,
        }
    }
    i
}

/// Offset just past the escape sequence starting at the backslash at `pos`.
pub(crate) fn escape_end(text: &str, pos: usize) -> usize {
    text[pos + 1..]
        .chars()
        .next()
        .map_or(pos + 1, |c| pos + 1 + c.len_utf8())
}

/// Offset just past the comment starting at `pos`, line break included.
pub(crate) fn comment_end(bytes: &[u8], pos: usize) -> usize {
    bytes[pos..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |offset| pos + offset + 1)
}

/// Finds the `}` matching the `{` at `open`, skipping escapes and comments.
pub(crate) fn match_brace(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&b'{') {
        return None;
    }
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i = escape_end(text, i);
                continue;
            }
            b'%' => {
                i = comment_end(bytes, i);
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Finds the `]` matching the `[` at `open`, at brace depth zero.
pub(crate) fn match_bracket(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&b'[') {
        return None;
    }
    let mut depth = 0usize;
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i = escape_end(text, i);
                continue;
            }
            b'%' => {
                i = comment_end(bytes, i);
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                if depth == 0 {
                    return None;
                }
                depth -= 1;
            }
            b']' if depth == 0 => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Finds the first unescaped occurrence of `closer` at or after `from`.
pub(crate) fn find_closer(text: &str, from: usize, closer: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let needle = closer.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if bytes[i..].starts_with(needle) {
            return Some(i);
        }
        match bytes[i] {
            b'\\' => i = escape_end(text, i),
            b'%' => i = comment_end(bytes, i),
            _ => i += 1,
        }
    }
    None
}

/// Offset of the first `\begin{name}` outside comments and escapes.
pub fn find_environment_begin(text: &str, name: &str) -> Option<usize> {
    find_closer(text, 0, &format!("\\begin{{{}}}", name))
}

/// Locates the `\end{name}` matching an environment whose interior starts at
/// `from`. Returns the offsets of the end marker's start and of its end.
pub(crate) fn find_environment_end(text: &str, from: usize, name: &str) -> Option<(usize, usize)> {
    let begin = format!("\\begin{{{}}}", name);
    let end = format!("\\end{{{}}}", name);
    if is_verbatim_environment(name) {
        return text[from..]
            .find(&end)
            .map(|offset| (from + offset, from + offset + end.len()));
    }

    let bytes = text.as_bytes();
    let mut depth = 1usize;
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if bytes[i..].starts_with(end.as_bytes()) => {
                depth -= 1;
                if depth == 0 {
                    return Some((i, i + end.len()));
                }
                i += end.len();
            }
            b'\\' if bytes[i..].starts_with(begin.as_bytes()) => {
                depth += 1;
                i += begin.len();
            }
            b'\\' => i = escape_end(text, i),
            b'%' => i = comment_end(bytes, i),
            _ => i += 1,
        }
    }
    None
}
