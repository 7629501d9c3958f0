//! Abstract interpreter with forking at unresolved conditional jumps.
//!
//! Execution starts at instruction 0 on an empty stack. At a `JUMPI` whose condition is not
//! constant the current stack is cloned, the clone's condition forced to 1 and the taken
//! branch explored recursively; the original then continues with the condition forced to 0.
//! A `(jump site, stack shape)` key is marked explored once its taken branch returns, and later
//! arrivals with that key only fall through. Arrivals while the branch is still running fork
//! again, so a function called twice from inside the branch still has both return paths
//! traced. Nesting is capped at [`MAX_FORK_DEPTH`] and total work at [`MAX_STEPS`]
//! instructions across all branches.

use crate::semantics;
use crate::sites::{CodeCopySite, JumpSite, OriginSource};
use crate::stack::AbstractStack;
use crate::value::AbstractValue;
use crate::{Error, MAX_FORK_DEPTH, MAX_STEPS, Result};
use preface_core::decoder::{Instruction, Program};
use preface_core::{Opcode, OpcodeExt, is_terminal_opcode};
use revm::primitives::U256;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Position of one exploration branch in the instruction list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecutionState {
    /// Index into the instruction list, not a program counter.
    pub index: usize,
    pub halted: bool,
}

impl ExecutionState {
    pub fn start() -> Self {
        Self {
            index: 0,
            halted: false,
        }
    }
}

/// Counters describing how much work an analysis did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisStats {
    /// Instructions executed across all branches.
    pub steps: usize,
    /// Forks explored.
    pub forks_attempted: usize,
    /// Forks skipped because their key was already explored or the depth cap was reached.
    pub forks_skipped: usize,
    /// Deepest fork nesting reached.
    pub max_depth: usize,
}

/// Everything recorded by one analysis run.
#[derive(Clone, Debug)]
pub struct Analysis {
    pub jump_sites: Vec<JumpSite>,
    pub codecopy_sites: Vec<CodeCopySite>,
    pub stats: AnalysisStats,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ForkKey {
    site: usize,
    shape: Vec<(bool, bool)>,
}

/// State for a single analysis of one program. Nothing outlives [`Session::run`].
pub struct Session<'a> {
    program: &'a Program,
    jump_sites: Vec<JumpSite>,
    jump_site_by_pc: HashMap<usize, usize>,
    codecopy_sites: Vec<CodeCopySite>,
    codecopy_site_by_pc: HashMap<usize, usize>,
    attempted: HashSet<ForkKey>,
    stats: AnalysisStats,
}

impl<'a> Session<'a> {
    pub fn new(program: &'a Program) -> Self {
        let jump_sites: Vec<JumpSite> = program
            .instructions()
            .iter()
            .filter(|ins| ins.op.is_jump())
            .map(|ins| JumpSite::new(ins.pc, ins.op))
            .collect();
        let codecopy_sites: Vec<CodeCopySite> = program
            .instructions()
            .iter()
            .filter(|ins| ins.op == Opcode::CODECOPY)
            .map(|ins| CodeCopySite::new(ins.pc))
            .collect();

        Self {
            program,
            jump_site_by_pc: jump_sites.iter().enumerate().map(|(i, s)| (s.pc, i)).collect(),
            jump_sites,
            codecopy_site_by_pc: codecopy_sites
                .iter()
                .enumerate()
                .map(|(i, s)| (s.pc, i))
                .collect(),
            codecopy_sites,
            attempted: HashSet::new(),
            stats: AnalysisStats::default(),
        }
    }

    /// Explores the program from its first instruction.
    pub fn run(mut self) -> Result<Analysis> {
        self.explore(AbstractStack::new(), ExecutionState::start(), 0)?;
        Ok(Analysis {
            jump_sites: self.jump_sites,
            codecopy_sites: self.codecopy_sites,
            stats: self.stats,
        })
    }

    fn explore(
        &mut self,
        mut stack: AbstractStack,
        mut state: ExecutionState,
        depth: usize,
    ) -> Result<()> {
        let program = self.program;
        self.stats.max_depth = self.stats.max_depth.max(depth);

        while !state.halted {
            let Some(ins) = program.get(state.index) else {
                break;
            };
            if self.stats.steps >= MAX_STEPS {
                tracing::warn!("Step budget exhausted at pc 0x{:x} (depth {})", ins.pc, depth);
                return Err(Error::StepLimit { limit: MAX_STEPS });
            }

            if ins.op == Opcode::JUMPI {
                self.fork(ins, &mut stack, state, depth)?;
            }

            self.step(ins, &mut stack, &mut state)?;
            self.stats.steps += 1;
        }

        Ok(())
    }

    /// Explores the taken side of a `JUMPI` with an unknown condition, then forces the
    /// condition to zero so the caller falls through.
    fn fork(
        &mut self,
        ins: &Instruction,
        stack: &mut AbstractStack,
        state: ExecutionState,
        depth: usize,
    ) -> Result<()> {
        let condition_known = stack.peek(1).is_none_or(AbstractValue::is_constant);
        if condition_known {
            return Ok(());
        }

        let key = ForkKey {
            site: self.jump_site_index(ins.pc)?,
            shape: stack.shape(),
        };

        if depth >= MAX_FORK_DEPTH {
            tracing::warn!(
                "Fork depth cap {} reached at JUMPI pc 0x{:x}; exploring fall-through only",
                MAX_FORK_DEPTH,
                ins.pc
            );
            self.stats.forks_skipped += 1;
        } else if self.attempted.contains(&key) {
            tracing::debug!("Skipping repeat fork at JUMPI pc 0x{:x}", ins.pc);
            self.stats.forks_skipped += 1;
        } else {
            self.stats.forks_attempted += 1;
            tracing::debug!("Forking at JUMPI pc 0x{:x} (depth {})", ins.pc, depth + 1);
            let mut taken = stack.clone();
            taken.replace(1, AbstractValue::constant(U256::from(1)));
            self.explore(taken, state, depth + 1)?;
            // The same key reached inside the taken branch forks again, down to the depth cap.
            self.attempted.insert(key);
        }

        stack.replace(1, AbstractValue::constant(U256::ZERO));
        Ok(())
    }

    /// Executes one instruction, checking its realized stack effect against the opcode table.
    fn step(
        &mut self,
        ins: &Instruction,
        stack: &mut AbstractStack,
        state: &mut ExecutionState,
    ) -> Result<()> {
        let op = ins.op;
        let before = stack.len();
        let mut next = state.index + 1;

        match op {
            Opcode::PUSH0 => stack.push(AbstractValue::from_push(ins.pc, U256::ZERO))?,
            Opcode::PUSH(_) => {
                stack.push(AbstractValue::from_immediate(ins.pc, &ins.immediate_word())?)?
            }
            Opcode::DUP(n) => stack.dup(n as usize)?,
            Opcode::SWAP(n) => stack.swap(n as usize)?,
            Opcode::JUMPDEST => {}
            Opcode::JUMP => {
                let [destination] = pop_array::<1>(stack, op)?;
                next = self.take_jump(ins, destination)?;
            }
            Opcode::JUMPI => {
                let [destination, condition] = pop_array::<2>(stack, op)?;
                match condition.value() {
                    Some(c) if !c.is_zero() => next = self.take_jump(ins, destination)?,
                    Some(_) => self.skip_jump(ins, destination)?,
                    None => return Err(Error::UnconcretizedCondition { pc: ins.pc }),
                }
            }
            Opcode::CODECOPY => {
                let [_, code_offset, _] = pop_array::<3>(stack, op)?;
                self.record_codecopy(ins.pc, code_offset);
            }
            _ => {
                let inputs = stack.pop_n(op, op.stack_inputs())?;
                if op.stack_outputs() == 1 {
                    stack.push(semantics::evaluate(op, &inputs)?)?;
                }
            }
        }

        let realized = stack.len() as isize - before as isize;
        if realized != op.stack_delta() {
            tracing::error!("{} at pc 0x{:x} moved the stack by {}", op, ins.pc, realized);
            return Err(Error::StackDeltaMismatch {
                pc: ins.pc,
                op,
                declared: op.stack_delta(),
                realized,
            });
        }

        if is_terminal_opcode(op) || next >= self.program.len() {
            state.halted = true;
        } else {
            state.index = next;
        }
        Ok(())
    }

    /// Records the jump's origin and destination and returns the destination's instruction index.
    fn take_jump(&mut self, ins: &Instruction, destination: AbstractValue) -> Result<usize> {
        let (value, origin) = jump_operand(ins, destination)?;
        let (dest_pc, index) = usize::try_from(value)
            .ok()
            .filter(|pc| self.program.is_jumpdest(*pc))
            .and_then(|pc| self.program.index_of(pc).map(|i| (pc, i)))
            .ok_or(Error::InvalidJumpDestination {
                pc: ins.pc,
                dest: value,
            })?;

        let site = self.jump_site_index(ins.pc)?;
        self.jump_sites[site].record(
            origin,
            destination.is_duplicated(),
            dest_pc,
            OriginSource::Traced,
        );
        Ok(index)
    }

    /// A `JUMPI` that falls through still has its origin recorded; its destination is only
    /// checked when taken.
    fn skip_jump(&mut self, ins: &Instruction, destination: AbstractValue) -> Result<()> {
        let (_, origin) = jump_operand(ins, destination)?;
        let site = self.jump_site_index(ins.pc)?;
        self.jump_sites[site].record_origin(
            origin,
            destination.is_duplicated(),
            OriginSource::Traced,
        );
        Ok(())
    }

    fn record_codecopy(&mut self, pc: usize, code_offset: AbstractValue) {
        let Some(&site) = self.codecopy_site_by_pc.get(&pc) else {
            return;
        };
        let site = &mut self.codecopy_sites[site];
        match (code_offset.is_constant(), code_offset.origin()) {
            (true, Some(origin)) => site.record(origin, code_offset.is_duplicated()),
            (true, None) => site.mark_computed(),
            (false, _) => site.mark_dynamic(),
        }
    }

    fn jump_site_index(&self, pc: usize) -> Result<usize> {
        self.jump_site_by_pc
            .get(&pc)
            .copied()
            .ok_or(Error::UnresolvedJump { pc })
    }
}

/// The constant target of a jump and the push it came from.
fn jump_operand(ins: &Instruction, destination: AbstractValue) -> Result<(U256, usize)> {
    let value = destination
        .value()
        .ok_or(Error::NonConstantJumpTarget { pc: ins.pc })?;
    let origin = destination
        .origin()
        .ok_or(Error::ComputedJumpTarget { pc: ins.pc })?;
    Ok((value, origin))
}

fn pop_array<const N: usize>(
    stack: &mut AbstractStack,
    op: Opcode,
) -> Result<[AbstractValue; N]> {
    let popped = stack.pop_n(op, N)?;
    let mut out = [AbstractValue::unknown(); N];
    out.copy_from_slice(&popped);
    Ok(out)
}

/// Runs a fresh [`Session`] over `program`.
pub fn analyze(program: &Program) -> Result<Analysis> {
    let analysis = Session::new(program).run()?;
    tracing::info!(
        "Analysis explored {} steps, {} forks ({} skipped, max depth {})",
        analysis.stats.steps,
        analysis.stats.forks_attempted,
        analysis.stats.forks_skipped,
        analysis.stats.max_depth
    );
    Ok(analysis)
}
