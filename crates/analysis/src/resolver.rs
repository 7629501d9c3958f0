//! Turns recorded site observations into the pushes a rewriter must patch.

use crate::interpreter::Analysis;
use crate::sites::{CodeCopySite, JumpSite, Origin, OriginSource};
use crate::{AnalysisStats, Error, Result};
use preface_core::OpcodeExt;
use preface_core::decoder::Program;
use revm::primitives::U256;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Resolved patch origins for every jump and code-copy site of a program.
#[derive(Clone, Debug, Serialize)]
pub struct Resolution {
    pub jumps: Vec<JumpSite>,
    pub codecopies: Vec<CodeCopySite>,
    pub stats: AnalysisStats,
}

impl Resolution {
    /// Pcs of every push feeding a jump target, each listed once.
    pub fn jump_origins(&self) -> BTreeSet<usize> {
        self.jumps
            .iter()
            .flat_map(|site| site.origins().map(|o| o.pc))
            .collect()
    }

    /// Pcs of every push feeding a `CODECOPY` source offset, each listed once.
    pub fn codecopy_origins(&self) -> BTreeSet<usize> {
        self.codecopies
            .iter()
            .flat_map(|site| site.origins().map(|o| o.pc))
            .collect()
    }

    /// Number of jump sites resolved by adjacency rather than exploration.
    pub fn rescued(&self) -> usize {
        self.jumps
            .iter()
            .filter(|site| site.origins().any(|o| o.source == OriginSource::Adjacent))
            .count()
    }
}

/// Validates an [`Analysis`] and fills gaps from `PUSH`/`JUMP` adjacency.
///
/// Jumps never reached during exploration are resolved from the instruction immediately
/// before them when it is a push. Afterwards every jump and `CODECOPY` must have at least
/// one origin and no origin may have been duplicated.
pub fn resolve(program: &Program, analysis: Analysis) -> Result<Resolution> {
    let Analysis {
        mut jump_sites,
        codecopy_sites,
        stats,
    } = analysis;

    for site in jump_sites.iter_mut().filter(|site| !site.is_resolved()) {
        rescue(program, site)?;
    }

    for site in &jump_sites {
        if !site.is_resolved() {
            return Err(Error::UnresolvedJump { pc: site.pc });
        }
        reject_duplicated(site.pc, "jump", site.origins())?;
    }

    for site in &codecopy_sites {
        if site.is_computed() {
            return Err(Error::UnresolvedCodeCopy {
                pc: site.pc,
                reason: "source offset is computed, not pushed",
            });
        }
        if site.is_dynamic() {
            return Err(Error::UnresolvedCodeCopy {
                pc: site.pc,
                reason: "source offset is not constant",
            });
        }
        if !site.is_resolved() {
            return Err(Error::UnresolvedCodeCopy {
                pc: site.pc,
                reason: "never reached",
            });
        }
        reject_duplicated(site.pc, "CODECOPY", site.origins())?;
    }

    let resolution = Resolution {
        jumps: jump_sites,
        codecopies: codecopy_sites,
        stats,
    };
    tracing::info!(
        "Resolved {} jump sites ({} by adjacency) and {} CODECOPY sites",
        resolution.jumps.len(),
        resolution.rescued(),
        resolution.codecopies.len()
    );
    tracing::debug!("\n{}", resolution);
    Ok(resolution)
}

fn rescue(program: &Program, site: &mut JumpSite) -> Result<()> {
    let Some(push) = program
        .index_of(site.pc)
        .and_then(|index| program.prior(index))
        .filter(|ins| ins.op.is_push())
    else {
        return Ok(());
    };

    let dest = push
        .immediate_usize()
        .filter(|dest| program.is_jumpdest(*dest))
        .ok_or_else(|| Error::InvalidJumpDestination {
            pc: site.pc,
            dest: U256::from_be_slice(&push.immediate_word()),
        })?;

    tracing::debug!(
        "Rescued {} at pc 0x{:x} from adjacent {} at pc 0x{:x}",
        site.op,
        site.pc,
        push.op,
        push.pc
    );
    site.record(push.pc, false, dest, OriginSource::Adjacent);
    Ok(())
}

fn reject_duplicated<'a>(
    pc: usize,
    site: &'static str,
    mut origins: impl Iterator<Item = &'a Origin>,
) -> Result<()> {
    match origins.find(|o| o.duplicated) {
        Some(origin) => Err(Error::DuplicatedOrigin {
            pc,
            site,
            origin: origin.pc,
        }),
        None => Ok(()),
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>8}      {:<8}      {}", "PUSH", "SITE", "DESTINATIONS")?;
        for site in &self.jumps {
            let origins: Vec<String> = site
                .origins()
                .map(|o| match o.source {
                    OriginSource::Traced => format!("0x{:04x}", o.pc),
                    OriginSource::Adjacent => format!("0x{:04x}~", o.pc),
                })
                .collect();
            let dests: Vec<String> = site.destinations().map(|d| format!("0x{d:04x}")).collect();
            writeln!(
                f,
                "{:>8}  =>  {:<5} 0x{:04x}  =>  JUMPDEST {}",
                origins.join(","),
                site.op.to_string(),
                site.pc,
                dests.join(",")
            )?;
        }
        for site in &self.codecopies {
            let origins: Vec<String> = site.origins().map(|o| format!("0x{:04x}", o.pc)).collect();
            writeln!(
                f,
                "{:>8}  =>  CODECOPY 0x{:04x}",
                origins.join(","),
                site.pc
            )?;
        }
        Ok(())
    }
}
