//! In-place patching of `PUSH` immediates.

use crate::{Error, Result};
use preface_core::OpcodeExt;
use preface_core::decoder::Program;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Pushes that must share one immediate width.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum PatchGroup {
    /// Runtime pushes feeding `JUMP`/`JUMPI` targets.
    Jump,
    /// Runtime pushes feeding `CODECOPY` source offsets.
    CodeCopy,
    /// The init-code push carrying the runtime length.
    Length,
}

impl fmt::Display for PatchGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PatchGroup::Jump => "jump",
            PatchGroup::CodeCopy => "codecopy",
            PatchGroup::Length => "length",
        })
    }
}

/// One rewritten immediate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Patch {
    pub group: PatchGroup,
    pub pc: usize,
    pub width: usize,
    pub before: usize,
    pub after: usize,
}

/// Adds a fixed delta to push immediates, enforcing one width per [`PatchGroup`] and patching
/// each push at most once even when several groups share it.
#[derive(Debug)]
pub struct PushPatcher {
    delta: usize,
    widths: HashMap<PatchGroup, usize>,
    patched: BTreeSet<usize>,
    patches: Vec<Patch>,
}

impl PushPatcher {
    pub fn new(delta: usize) -> Self {
        Self {
            delta,
            widths: HashMap::new(),
            patched: BTreeSet::new(),
            patches: Vec::new(),
        }
    }

    /// Patches every push in `origins` inside `code`, where `program` is the decoding of the
    /// same bytes (or a prefix of them).
    ///
    /// All origins are validated before any byte is written.
    pub fn patch_group(
        &mut self,
        code: &mut [u8],
        program: &Program,
        group: PatchGroup,
        origins: impl IntoIterator<Item = usize>,
    ) -> Result<usize> {
        let mut pending = Vec::new();
        for pc in origins {
            let ins = program
                .at_pc(pc)
                .filter(|ins| ins.op.is_push())
                .ok_or(Error::MissingPush { pc })?;
            if ins.is_truncated() || pc + 1 + ins.op.immediate_width() > code.len() {
                return Err(Error::TruncatedPush { pc });
            }

            let width = ins.op.immediate_width();
            if !(1..=2).contains(&width) {
                return Err(Error::UnsupportedWidth { group, pc, width });
            }
            let expected = *self.widths.entry(group).or_insert(width);
            if expected != width {
                return Err(Error::InconsistentWidth {
                    group,
                    pc,
                    expected,
                    found: width,
                });
            }
            pending.push((pc, width));
        }

        let mut count = 0;
        for (pc, width) in pending {
            if !self.patched.insert(pc) {
                tracing::debug!("PUSH at pc 0x{:x} already patched", pc);
                continue;
            }
            let patch = self.patch_push(code, group, pc, width)?;
            tracing::debug!(
                "Patched {} PUSH{} at pc 0x{:x}: 0x{:x} -> 0x{:x}",
                group,
                width,
                pc,
                patch.before,
                patch.after
            );
            self.patches.push(patch);
            count += 1;
        }
        Ok(count)
    }

    fn patch_push(
        &self,
        code: &mut [u8],
        group: PatchGroup,
        pc: usize,
        width: usize,
    ) -> Result<Patch> {
        let immediate = &mut code[pc + 1..pc + 1 + width];
        let before = immediate.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);
        let after = before + self.delta;
        if !value_fits(after, width) {
            return Err(Error::PatchOverflow {
                pc,
                width,
                value: before,
                delta: self.delta,
            });
        }

        let bytes = after.to_be_bytes();
        immediate.copy_from_slice(&bytes[bytes.len() - width..]);
        Ok(Patch {
            group,
            pc,
            width,
            before,
            after,
        })
    }

    /// Every patch applied so far, in application order.
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn into_patches(self) -> Vec<Patch> {
        self.patches
    }
}

fn value_fits(value: usize, width: usize) -> bool {
    width >= std::mem::size_of::<usize>() || value >> (width * 8) == 0
}
