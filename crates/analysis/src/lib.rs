//! Constant-tracking abstract interpretation of EVM runtime code.
//!
//! [`analyze`] walks a decoded [`Program`](preface_core::decoder::Program) over an
//! [`AbstractStack`] whose slots are either constants (remembering the `PUSH` that produced
//! them) or unknown. Conditional jumps on unknown conditions fork so both successors are
//! explored. Every `JUMP`/`JUMPI` and `CODECOPY` reached records which `PUSH` supplied its
//! target; [`resolve`] then turns those records into the set of pushes a rewriter must patch.

pub mod interpreter;
pub mod resolver;
pub mod semantics;
pub mod sites;
pub mod stack;
pub mod value;

pub use interpreter::{Analysis, AnalysisStats, ExecutionState, Session, analyze};
pub use resolver::{Resolution, resolve};
pub use sites::{CodeCopySite, JumpSite, Origin, OriginSource};
pub use stack::AbstractStack;
pub use value::AbstractValue;

use preface_core::{ErrorKind, Opcode};
use revm::primitives::U256;
use thiserror::Error;

/// Maximum number of abstract stack slots, matching the EVM limit.
pub const MAX_STACK_DEPTH: usize = 1024;

/// Maximum number of nested live forks.
pub const MAX_FORK_DEPTH: usize = 30;

/// Maximum number of instructions executed across all forks of one analysis.
pub const MAX_STEPS: usize = 10_000;

/// Error type for abstract interpretation and resolution.
#[derive(Debug, Error)]
pub enum Error {
    /// An instruction consumed more items than the stack held.
    #[error("stack underflow: {op} needs {needed} items, stack has {depth}")]
    StackUnderflow {
        op: Opcode,
        needed: usize,
        depth: usize,
    },

    /// A push would exceed [`MAX_STACK_DEPTH`].
    #[error("stack overflow: depth limit of {MAX_STACK_DEPTH} reached")]
    StackOverflow,

    /// A constant could not be represented as a 256-bit word.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// An operand fell outside the range a folding rule accepts.
    #[error("operand out of range: {0}")]
    OutOfRange(String),

    /// A jump destination was not a compile-time constant.
    #[error("non-constant jump target at pc 0x{pc:x}")]
    NonConstantJumpTarget { pc: usize },

    /// A jump destination was constant but computed rather than pushed, so there is no
    /// immediate to patch.
    #[error("jump at pc 0x{pc:x} has a computed target with no originating PUSH")]
    ComputedJumpTarget { pc: usize },

    /// A jump destination did not address a `JUMPDEST`.
    #[error("jump at pc 0x{pc:x} does not target a JUMPDEST (destination 0x{dest:x})")]
    InvalidJumpDestination { pc: usize, dest: U256 },

    /// A jump had no recorded origin after exploration and the adjacency rescue.
    #[error("cannot assign an originating PUSH to the jump at pc 0x{pc:x}")]
    UnresolvedJump { pc: usize },

    /// A patch origin was copied with `DUP`, so patching it would also move the copy.
    #[error("PUSH at pc 0x{origin:x} feeding {site} at pc 0x{pc:x} is duplicated")]
    DuplicatedOrigin {
        pc: usize,
        site: &'static str,
        origin: usize,
    },

    /// A `CODECOPY` source offset was not traced back to a `PUSH`.
    #[error("cannot assign an originating PUSH to the CODECOPY at pc 0x{pc:x}: {reason}")]
    UnresolvedCodeCopy { pc: usize, reason: &'static str },

    /// The realized stack effect of an instruction disagreed with the opcode table.
    #[error("stack delta mismatch at pc 0x{pc:x}: {op} declares {declared}, realized {realized}")]
    StackDeltaMismatch {
        pc: usize,
        op: Opcode,
        declared: isize,
        realized: isize,
    },

    /// A conditional jump reached execution with its condition still unknown.
    #[error("JUMPI at pc 0x{pc:x} executed with an unconcretized condition")]
    UnconcretizedCondition { pc: usize },

    /// The global step budget ran out.
    #[error("analysis exceeded the {limit}-step budget")]
    StepLimit { limit: usize },
}

impl Error {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::StackUnderflow { .. } => ErrorKind::StackUnderflow,
            Error::StackOverflow => ErrorKind::StackOverflow,
            Error::InvalidValue(_) => ErrorKind::InvalidValue,
            Error::OutOfRange(_) => ErrorKind::OutOfRange,
            Error::NonConstantJumpTarget { .. }
            | Error::ComputedJumpTarget { .. }
            | Error::InvalidJumpDestination { .. }
            | Error::UnresolvedJump { .. }
            | Error::DuplicatedOrigin { .. }
            | Error::UnresolvedCodeCopy { .. } => ErrorKind::UnsupportedProgram,
            Error::StackDeltaMismatch { .. } | Error::UnconcretizedCondition { .. } => {
                ErrorKind::InternalInvariant
            }
            Error::StepLimit { .. } => ErrorKind::ResourceExhaustion,
        }
    }
}

/// Analysis result type
pub type Result<T> = std::result::Result<T, Error>;
