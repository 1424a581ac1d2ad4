//! One ddmin pass over the center content of a scope.
//!
//! A pass tests contiguous chunks of the center at increasing granularity
//! and shrinks the center to the first chunk that still reproduces the
//! target. The empty chunk is tried once per round, after the real chunks.
//! When the center is down to a single definition unit the pass walks its
//! bracket arguments one at a time.

use std::collections::HashSet;
use std::fmt;
use std::mem;
use std::ops::Range;

use texmin_core::{
    concat, enter_definition_argument, relabel, ChunkKey, DefinitionEntry, DeltaId, DeltaKind, DeltaUnit, Frame, Provenance,
};
use tracing::{debug, info, trace};

use crate::config::MinimizerConfig;
use crate::error::Result;
use crate::probe::OracleProbe;

/// Where a scope's center content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeLevel {
    /// The document body.
    Body,
    /// The preamble, after the body turned out to be irrelevant.
    Preamble,
    /// The interior of a nested unit, at the given depth.
    Nested(u32),
}

impl ScopeLevel {
    fn provenance(self) -> Provenance {
        match self {
            ScopeLevel::Preamble => Provenance::Preamble,
            ScopeLevel::Body | ScopeLevel::Nested(_) => Provenance::Body,
        }
    }

    /// Nesting depth below the document body or preamble.
    pub fn depth(self) -> u32 {
        match self {
            ScopeLevel::Nested(depth) => depth,
            ScopeLevel::Body | ScopeLevel::Preamble => 0,
        }
    }
}

impl fmt::Display for ScopeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeLevel::Body => write!(f, "body"),
            ScopeLevel::Preamble => write!(f, "preamble"),
            ScopeLevel::Nested(depth) => write!(f, "nested:{}", depth),
        }
    }
}

/// A frame and the center content searched inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub frame: Frame,
    pub center: Vec<DeltaUnit>,
    pub level: ScopeLevel,
    /// Set when the center was rebuilt from a shell and a prefix of its
    /// content, so an unresolved outcome means the two interact.
    pub interaction: bool,
}

impl Scope {
    pub fn new(frame: Frame, center: Vec<DeltaUnit>, level: ScopeLevel) -> Self {
        Self {
            frame,
            center,
            level,
            interaction: false,
        }
    }

    pub fn with_interaction(mut self) -> Self {
        self.interaction = true;
        self
    }

    /// The full candidate document for this scope.
    pub fn document(&self) -> String {
        self.frame.assemble(&self.center)
    }
}

/// How a search pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// A single unit reproduces and no smaller chunk does.
    Isolated { unit: DeltaUnit, id: DeltaId, frame: Frame },
    /// The frame reproduces with an empty center.
    OutsideCenter { frame: Frame },
    /// Every bracket of a definition was walked and emptying the last one
    /// still reproduces. `frame` and `center` hold the definition as a
    /// single unit in the frame it came from.
    DefinitionExhausted {
        document: String,
        frame: Frame,
        center: Vec<DeltaUnit>,
    },
    /// No chunk reproduces at the finest granularity.
    Exhausted { frame: Frame, center: Vec<DeltaUnit> },
}

/// Bracket walk through a single definition unit.
#[derive(Debug, Clone)]
struct DefinitionWalk {
    position: u8,
    total: u8,
    outer_frame: Frame,
    head: String,
    tail: String,
}

impl DefinitionWalk {
    fn from_entry(entry: &DefinitionEntry) -> Self {
        Self {
            position: entry.position,
            total: entry.total,
            outer_frame: entry.previous_frame.clone(),
            head: entry.head.clone(),
            tail: entry.tail.clone(),
        }
    }

    fn has_next(&self) -> bool {
        self.position < self.total
    }

    /// The definition rebuilt around the reduced bracket content.
    fn construct(&self, center: &[DeltaUnit]) -> DeltaUnit {
        DeltaUnit::new(format!("{}{}{}", self.head, concat(center), self.tail), DeltaKind::Macro, true)
    }
}

enum Round {
    Shrunk(Vec<DeltaUnit>),
    BlankReproduces,
    NoMatch,
}

/// Chunk size for a center of `len` units split `divider` ways.
pub fn chunk_size(len: usize, divider: usize) -> usize {
    (len / divider.max(1)).max(1)
}

/// State of one search pass.
pub struct SearchPass<'c> {
    config: &'c MinimizerConfig,
    frame: Frame,
    center: Vec<DeltaUnit>,
    provenance: Provenance,
    divider: usize,
    memo: HashSet<ChunkKey>,
    walk: Option<DefinitionWalk>,
}

impl<'c> SearchPass<'c> {
    pub fn new(scope: Scope, config: &'c MinimizerConfig) -> Self {
        let provenance = scope.level.provenance();
        let mut center = scope.center;
        relabel(&mut center, provenance);
        let mut pass = Self {
            config,
            frame: scope.frame,
            center,
            provenance,
            divider: 2,
            memo: HashSet::new(),
            walk: None,
        };
        pass.remember_center();
        pass
    }

    /// Runs the pass to completion.
    pub async fn run(mut self, probe: &mut OracleProbe<'_>) -> Result<PassOutcome> {
        let generation = probe.begin_pass();
        info!(generation, center_len = self.center.len(), "Starting search pass");

        self.try_enter_definition(probe);
        loop {
            let outcome = match self.round(probe).await? {
                Round::Shrunk(chunk) => {
                    self.adopt(chunk, probe);
                    None
                }
                Round::BlankReproduces => self.on_blank_reproduces(probe)?,
                Round::NoMatch => self.on_no_match(probe)?,
            };
            if let Some(outcome) = outcome {
                debug!(generation, outcome = outcome.name(), "Search pass finished");
                return Ok(outcome);
            }
        }
    }

    async fn round(&mut self, probe: &mut OracleProbe<'_>) -> Result<Round> {
        if self.center.is_empty() {
            return Ok(Round::BlankReproduces);
        }
        let len = self.center.len();
        let size = chunk_size(len, self.divider);
        let mut start = 0;
        while start < len {
            let end = (start + size).min(len);
            if self.test(probe, start..end).await? {
                return Ok(Round::Shrunk(self.center[start..end].to_vec()));
            }
            start = end;
        }

        if self.test(probe, 0..0).await? {
            Ok(Round::BlankReproduces)
        } else {
            Ok(Round::NoMatch)
        }
    }

    /// Tests one chunk of the center, skipping chunks seen in this pass.
    async fn test(&mut self, probe: &mut OracleProbe<'_>, range: Range<usize>) -> Result<bool> {
        let chunk = &self.center[range];
        let key = ChunkKey::new(self.provenance, chunk);
        let label = key.to_string();
        if !self.memo.insert(key) {
            probe.stats.record_memo_hit();
            trace!(%label, "Skipping memoized chunk");
            return Ok(false);
        }
        let candidate = self.frame.assemble(chunk);
        probe.reproduces(&candidate, &label).await
    }

    /// The current center is known to reproduce.
    fn remember_center(&mut self) {
        self.memo.insert(ChunkKey::new(self.provenance, &self.center));
    }

    fn adopt(&mut self, chunk: Vec<DeltaUnit>, probe: &mut OracleProbe<'_>) {
        debug!(from = self.center.len(), to = chunk.len(), "Shrinking center");
        probe.stats.record_shrink();
        self.center = chunk;
        self.divider = 2;
        self.try_enter_definition(probe);
    }

    fn can_enter_definition(&self) -> bool {
        self.walk.is_none() && self.config.descend_definitions && self.center.len() == 1
    }

    fn can_refine(&self) -> bool {
        self.divider < self.center.len()
    }

    fn can_advance_walk(&self) -> bool {
        self.walk.as_ref().is_some_and(DefinitionWalk::has_next)
    }

    fn try_enter_definition(&mut self, probe: &mut OracleProbe<'_>) {
        if !self.can_enter_definition() {
            return;
        }
        match enter_definition_argument(&self.frame, &self.center, 1) {
            Ok(entry) => self.install(entry, probe),
            Err(err) => trace!(error = %err, "Single unit is not a walkable definition"),
        }
    }

    fn install(&mut self, entry: DefinitionEntry, probe: &mut OracleProbe<'_>) {
        probe.stats.record_definition_entry();
        self.walk = Some(DefinitionWalk::from_entry(&entry));
        self.provenance = Provenance::Definition { position: entry.position };
        self.frame = entry.frame;
        self.center = entry.center;
        self.divider = 2;
        self.remember_center();
    }

    /// Folds the reduced bracket back into the definition and enters the
    /// next bracket.
    fn advance_walk(&mut self, probe: &mut OracleProbe<'_>) -> Result<()> {
        let Some(walk) = self.walk.take() else {
            return Ok(());
        };
        let construct = walk.construct(&self.center);
        let entry = enter_definition_argument(&walk.outer_frame, &[construct], walk.position + 1)?;
        self.install(entry, probe);
        Ok(())
    }

    fn on_blank_reproduces(&mut self, probe: &mut OracleProbe<'_>) -> Result<Option<PassOutcome>> {
        if self.can_advance_walk() {
            self.center.clear();
            self.advance_walk(probe)?;
            return Ok(None);
        }
        match self.walk.take() {
            Some(walk) => Ok(Some(PassOutcome::DefinitionExhausted {
                document: self.frame.document(),
                center: vec![walk.construct(&[])],
                frame: walk.outer_frame,
            })),
            None => Ok(Some(PassOutcome::OutsideCenter {
                frame: mem::take(&mut self.frame),
            })),
        }
    }

    fn on_no_match(&mut self, probe: &mut OracleProbe<'_>) -> Result<Option<PassOutcome>> {
        if self.center.len() != 1 && self.can_refine() {
            self.divider = (self.divider * 2).min(self.center.len());
            probe.stats.record_granularity_increase(self.divider);
            debug!(divider = self.divider, center_len = self.center.len(), "Increasing granularity");
            return Ok(None);
        }
        if self.can_advance_walk() {
            self.advance_walk(probe)?;
            return Ok(None);
        }

        let frame = mem::take(&mut self.frame);
        if self.center.len() == 1 {
            let unit = self.center.remove(0);
            return Ok(Some(PassOutcome::Isolated { id: unit.id, unit, frame }));
        }
        debug!(center_len = self.center.len(), "No chunk reproduces at the finest granularity");
        Ok(Some(PassOutcome::Exhausted {
            frame,
            center: mem::take(&mut self.center),
        }))
    }
}

impl PassOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            PassOutcome::Isolated { .. } => "isolated",
            PassOutcome::OutsideCenter { .. } => "outside_center",
            PassOutcome::DefinitionExhausted { .. } => "definition_exhausted",
            PassOutcome::Exhausted { .. } => "exhausted",
        }
    }
}
