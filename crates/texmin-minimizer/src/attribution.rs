//! Attribution of an isolated nested unit to its shell or its content.
//!
//! Once a search pass isolates a single nested unit, the failure may come
//! from the markup around its interior, from one interior unit, or from the
//! two together. The tests run in that order and stop at the first match.

use texmin_core::{unwrap_delta, DeltaUnit, Frame, StructureError};
use tracing::debug;

use crate::error::Result;
use crate::probe::OracleProbe;
use crate::search::{Scope, ScopeLevel};

/// What the attribution tests concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribution {
    /// The shell with an empty interior reproduces.
    Shell { document: String },
    /// A single flat interior unit reproduces.
    Content { document: String },
    /// Search continues in a narrower scope.
    Descend(Scope),
    /// Nothing smaller than the unit itself reproduces.
    Unresolved,
}

async fn attribution_test(probe: &mut OracleProbe<'_>, candidate: &str, label: &str) -> Result<bool> {
    probe.stats.record_attribution_test();
    probe.reproduces(candidate, label).await
}

/// Runs the attribution tests for `unit`, isolated inside `frame`.
pub async fn attribute(probe: &mut OracleProbe<'_>, frame: &Frame, unit: &DeltaUnit, level: ScopeLevel) -> Result<Attribution> {
    let unwrapped = match unwrap_delta(unit) {
        Ok(unwrapped) => unwrapped,
        Err(StructureError::NotNestable(_)) => {
            return Ok(Attribution::Content {
                document: frame.assemble(std::slice::from_ref(unit)),
            })
        }
        Err(err) => return Err(err.into()),
    };
    let shell = frame.wrap(unwrapped.shell_front.as_str(), unwrapped.shell_back.as_str());
    let inner = unwrapped.inner;
    let nested_level = ScopeLevel::Nested(level.depth() + 1);
    debug!(
        shell_front = %unwrapped.shell_front,
        shell_back = %unwrapped.shell_back,
        inner_len = inner.len(),
        "Attributing isolated unit"
    );

    let document = shell.assemble(&[]);
    if attribution_test(probe, &document, "shell-only").await? {
        return Ok(Attribution::Shell { document });
    }

    for (index, candidate_unit) in inner.iter().enumerate() {
        let document = frame.assemble(std::slice::from_ref(candidate_unit));
        if attribution_test(probe, &document, &format!("content-{}", index)).await? {
            return Ok(settle(frame.clone(), candidate_unit, document, nested_level));
        }
    }

    for (index, candidate_unit) in inner.iter().enumerate() {
        let document = shell.assemble(std::slice::from_ref(candidate_unit));
        if attribution_test(probe, &document, &format!("shell+{}", index)).await? {
            return Ok(settle(shell.clone(), candidate_unit, document, nested_level));
        }
    }

    if inner.len() > 1 {
        for end in 2..=inner.len() {
            let document = shell.assemble(&inner[..end]);
            if attribution_test(probe, &document, &format!("shell+..{}", end)).await? {
                let scope = Scope::new(shell, inner[..end].to_vec(), nested_level).with_interaction();
                return Ok(Attribution::Descend(scope));
            }
        }
    }

    Ok(Attribution::Unresolved)
}

/// A reproducing single unit is final when flat, otherwise searched further.
fn settle(frame: Frame, unit: &DeltaUnit, document: String, level: ScopeLevel) -> Attribution {
    if unit.nested {
        Attribution::Descend(Scope::new(frame, vec![unit.clone()], level))
    } else {
        Attribution::Content { document }
    }
}
