//! Closure validation for environments and bracket math.
//!
//! The decomposer keeps unmatched closers as ordinary units, so a document
//! that ends an environment it never began would be minimized against a
//! structure that does not exist. These checks run before any oracle call.

use std::collections::HashMap;

use crate::error::{BoundaryKind, RegionKind, Result, StructureError};
use crate::lexer::{comment_end, escape_end, find_environment_end, is_verbatim_environment, match_brace};

#[derive(Debug, Default)]
struct RegionCounts {
    /// Environment names in order of first appearance.
    order: Vec<String>,
    environments: HashMap<String, (usize, usize)>,
    inline: (usize, usize),
    display: (usize, usize),
}

impl RegionCounts {
    fn environment(&mut self, name: &str) -> &mut (usize, usize) {
        if !self.environments.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.environments.entry(name.to_string()).or_default()
    }

    fn scan(text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut counts = Self::default();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'%' => i = comment_end(bytes, i),
                b'\\' => {
                    let rest = &bytes[i..];
                    if rest.starts_with(b"\\(") {
                        counts.inline.0 += 1;
                    } else if rest.starts_with(b"\\)") {
                        counts.inline.1 += 1;
                    } else if rest.starts_with(b"\\[") {
                        counts.display.0 += 1;
                    } else if rest.starts_with(b"\\]") {
                        counts.display.1 += 1;
                    } else if let Some((name, after)) = marker_name(text, i, "\\begin") {
                        counts.environment(name).0 += 1;
                        if is_verbatim_environment(name) {
                            // Contents are opaque; jump past the end marker if present.
                            match find_environment_end(text, after, name) {
                                Some((_, end)) => {
                                    counts.environment(name).1 += 1;
                                    i = end;
                                }
                                None => i = text.len(),
                            }
                            continue;
                        }
                        i = after;
                        continue;
                    } else if let Some((name, after)) = marker_name(text, i, "\\end") {
                        counts.environment(name).1 += 1;
                        i = after;
                        continue;
                    }
                    i = escape_end(text, i);
                }
                _ => i += 1,
            }
        }
        counts
    }
}

/// Reads the `{name}` following a `\begin` or `\end` at `pos`.
fn marker_name<'t>(text: &'t str, pos: usize, marker: &str) -> Option<(&'t str, usize)> {
    let open = pos + marker.len();
    if !text.as_bytes()[pos..].starts_with(marker.as_bytes()) || text.as_bytes().get(open) != Some(&b'{') {
        return None;
    }
    let close = match_brace(text, open)?;
    Some((&text[open + 1..close], close + 1))
}

/// Checks that no region is closed more often than it is opened.
///
/// Reports the first environment (in order of appearance) whose `\end`
/// markers outnumber its `\begin` markers, then `\)` over `\(`, then `\]`
/// over `\[`. Over-opened input is accepted here; see [`check_closed`].
pub fn check_balanced(text: &str) -> Result<()> {
    let counts = RegionCounts::scan(text);

    for name in &counts.order {
        let (opened, closed) = counts.environments[name];
        if closed > opened {
            return Err(StructureError::UnbalancedClosers {
                region: RegionKind::Environment,
                name: Some(name.clone()),
            });
        }
    }
    if counts.inline.1 > counts.inline.0 {
        return Err(StructureError::UnbalancedClosers {
            region: RegionKind::InlineMath,
            name: None,
        });
    }
    if counts.display.1 > counts.display.0 {
        return Err(StructureError::UnbalancedClosers {
            region: RegionKind::DisplayMath,
            name: None,
        });
    }
    Ok(())
}

/// Checks that every opened region is closed.
///
/// Complements [`check_balanced`]: a `\begin{name}` without a matching
/// `\end{name}` would otherwise swallow the rest of the document.
pub fn check_closed(text: &str) -> Result<()> {
    let counts = RegionCounts::scan(text);

    for name in &counts.order {
        let (opened, closed) = counts.environments[name];
        if opened > closed {
            return Err(StructureError::UnterminatedEnvironment(name.clone()));
        }
    }
    if counts.inline.0 > counts.inline.1 {
        return Err(StructureError::UnterminatedBoundary {
            kind: BoundaryKind::RoundBracketMath,
            fragment: "\\(".to_string(),
        });
    }
    if counts.display.0 > counts.display.1 {
        return Err(StructureError::UnterminatedBoundary {
            kind: BoundaryKind::SquareBracketMath,
            fragment: "\\[".to_string(),
        });
    }
    Ok(())
}
