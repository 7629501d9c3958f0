//! Per-instruction records of where jump and code-copy operands came from.

use preface_core::Opcode;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// How an origin was attributed to a site.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum OriginSource {
    /// Traced through the abstract stack during exploration.
    Traced,
    /// Taken from the `PUSH` immediately preceding an otherwise unresolved jump.
    Adjacent,
}

/// A `PUSH` whose immediate reaches a jump or code-copy operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Origin {
    /// Pc of the push.
    pub pc: usize,
    /// Whether the pushed value was ever copied by a `DUP` on any path reaching the site.
    pub duplicated: bool,
    pub source: OriginSource,
}

/// One `JUMP` or `JUMPI` instruction and everything recorded about its target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct JumpSite {
    pub pc: usize,
    pub op: Opcode,
    origins: BTreeMap<usize, Origin>,
    destinations: BTreeSet<usize>,
}

impl JumpSite {
    pub fn new(pc: usize, op: Opcode) -> Self {
        Self {
            pc,
            op,
            origins: BTreeMap::new(),
            destinations: BTreeSet::new(),
        }
    }

    /// Records one `(origin, destination)` observation. Repeats are idempotent; a push seen
    /// duplicated on any path stays duplicated.
    pub fn record(
        &mut self,
        origin: usize,
        duplicated: bool,
        destination: usize,
        source: OriginSource,
    ) {
        self.record_origin(origin, duplicated, source);
        self.destinations.insert(destination);
    }

    /// Records an origin seen on a path where the jump was not taken.
    pub fn record_origin(&mut self, origin: usize, duplicated: bool, source: OriginSource) {
        self.origins
            .entry(origin)
            .and_modify(|o| o.duplicated |= duplicated)
            .or_insert(Origin {
                pc: origin,
                duplicated,
                source,
            });
    }

    pub fn is_resolved(&self) -> bool {
        !self.origins.is_empty()
    }

    pub fn origins(&self) -> impl Iterator<Item = &Origin> {
        self.origins.values()
    }

    pub fn destinations(&self) -> impl Iterator<Item = usize> + '_ {
        self.destinations.iter().copied()
    }
}

/// One `CODECOPY` instruction and the push feeding its source offset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CodeCopySite {
    pub pc: usize,
    origins: BTreeMap<usize, Origin>,
    /// Set when the offset was constant on some path but folded from other values.
    computed: bool,
    /// Set when the offset was unknown on some path.
    dynamic: bool,
}

impl CodeCopySite {
    pub fn new(pc: usize) -> Self {
        Self {
            pc,
            origins: BTreeMap::new(),
            computed: false,
            dynamic: false,
        }
    }

    pub fn record(&mut self, origin: usize, duplicated: bool) {
        self.origins
            .entry(origin)
            .and_modify(|o| o.duplicated |= duplicated)
            .or_insert(Origin {
                pc: origin,
                duplicated,
                source: OriginSource::Traced,
            });
    }

    pub fn mark_computed(&mut self) {
        self.computed = true;
    }

    pub fn mark_dynamic(&mut self) {
        self.dynamic = true;
    }

    pub fn is_computed(&self) -> bool {
        self.computed
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub fn is_resolved(&self) -> bool {
        !self.origins.is_empty() && !self.computed && !self.dynamic
    }

    pub fn origins(&self) -> impl Iterator<Item = &Origin> {
        self.origins.values()
    }
}
