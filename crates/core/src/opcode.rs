//! Stack arity and immediate width for [`Opcode`], read from eot's static opcode table.
//!
//! Bytes that have no instruction at [`TARGET_FORK`], EOF-only opcodes included, execute like
//! `INVALID` in legacy code. They take no immediate and leave the stack alone before halting.

use crate::Opcode;
use eot::Fork;

/// Hard fork whose legacy instruction set the disassembler and interpreter model.
pub const TARGET_FORK: Fork = Fork::Prague;

/// Legacy-bytecode facts about an opcode beyond what eot exposes directly.
pub trait OpcodeExt: Copy {
    /// Returns true if the opcode executes as a real instruction at [`TARGET_FORK`].
    fn is_defined(self) -> bool;

    /// Number of stack items the opcode consumes.
    fn stack_inputs(self) -> usize;

    /// Number of stack items the opcode produces.
    fn stack_outputs(self) -> usize;

    /// Width in bytes of the inline immediate following the opcode byte.
    fn immediate_width(self) -> usize;

    /// Returns true for `PUSH0`..`PUSH32`.
    fn is_push(self) -> bool;

    /// Returns true for `JUMP` and `JUMPI` (but not `JUMPDEST`).
    fn is_jump(self) -> bool;

    /// Net change in stack depth after the opcode executes.
    fn stack_delta(self) -> isize {
        self.stack_outputs() as isize - self.stack_inputs() as isize
    }
}

impl OpcodeExt for Opcode {
    fn is_defined(self) -> bool {
        self.as_opcode().is_valid_in(TARGET_FORK)
    }

    fn stack_inputs(self) -> usize {
        if !self.is_defined() {
            return 0;
        }
        self.as_opcode().info().map_or(0, |info| info.inputs as usize)
    }

    fn stack_outputs(self) -> usize {
        if !self.is_defined() {
            return 0;
        }
        self.as_opcode().info().map_or(0, |info| info.outputs as usize)
    }

    // Only pushes carry immediates in legacy code; eot's sizes for EOF opcodes do not apply.
    fn immediate_width(self) -> usize {
        match self {
            Opcode::PUSH(n) => n as usize,
            _ => 0,
        }
    }

    fn is_push(self) -> bool {
        matches!(self, Opcode::PUSH0 | Opcode::PUSH(_))
    }

    fn is_jump(self) -> bool {
        matches!(self, Opcode::JUMP | Opcode::JUMPI)
    }
}
