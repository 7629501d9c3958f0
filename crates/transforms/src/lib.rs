//! Layout-aware prelude injection.
//!
//! Splicing bytes in front of a contract's runtime shifts every code offset behind the splice.
//! This crate finds the runtime payload inside the init code, asks `preface-analysis` which
//! pushes feed jump targets and `CODECOPY` offsets, bumps those immediates by the prelude
//! length and reassembles init and runtime code around the prelude.

pub mod injector;
pub mod layout;
pub mod patch;
pub mod prelude;

pub use injector::{InjectionOutput, Injector, inject};
pub use layout::{RuntimeLayout, locate_runtime_payload};
pub use patch::{Patch, PatchGroup, PushPatcher};
pub use prelude::Prelude;

use preface_core::ErrorKind;
use preface_core::artifact::METADATA_SUFFIX_LEN;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Transform error type encompassing all injection errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Core operation failed.
    #[error(transparent)]
    Core(#[from] preface_core::Error),

    /// Analysis of the runtime code failed.
    #[error(transparent)]
    Analysis(#[from] preface_analysis::Error),

    /// The init code has no `PUSH DUP1 PUSH PUSH CODECOPY PUSH RETURN` epilogue.
    #[error("no runtime copy epilogue (PUSH DUP1 PUSH PUSH CODECOPY PUSH RETURN) in init code")]
    MissingSkeleton,

    /// The payload embedded in the init code differs from the deployed bytecode.
    #[error(
        "runtime payload at init offset 0x{offset:x} ({found} bytes) does not match the {expected}-byte deployed bytecode"
    )]
    RuntimeMismatch {
        offset: usize,
        expected: usize,
        found: usize,
    },

    /// A push to patch has its immediate cut off by the end of the code.
    #[error("PUSH at pc 0x{pc:x} is truncated and cannot be patched")]
    TruncatedPush { pc: usize },

    /// A recorded origin does not address a push instruction.
    #[error("origin pc 0x{pc:x} does not address a PUSH instruction")]
    MissingPush { pc: usize },

    /// Only one- and two-byte pushes are patched.
    #[error("{group} push at pc 0x{pc:x} is PUSH{width}; only PUSH1 and PUSH2 are supported")]
    UnsupportedWidth {
        group: PatchGroup,
        pc: usize,
        width: usize,
    },

    /// Pushes within one patch group must share a width.
    #[error(
        "inconsistent push width in {group} group: PUSH{found} at pc 0x{pc:x}, expected PUSH{expected}"
    )]
    InconsistentWidth {
        group: PatchGroup,
        pc: usize,
        expected: usize,
        found: usize,
    },

    /// The patched value no longer fits in the push's immediate.
    #[error("patching PUSH{width} at pc 0x{pc:x} by {delta} overflows its immediate (value 0x{value:x})")]
    PatchOverflow {
        pc: usize,
        width: usize,
        value: usize,
        delta: usize,
    },
}

impl Error {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Core(e) => e.kind(),
            Error::Analysis(e) => e.kind(),
            Error::MissingSkeleton | Error::RuntimeMismatch { .. } | Error::TruncatedPush { .. } => {
                ErrorKind::MalformedInput
            }
            Error::UnsupportedWidth { .. }
            | Error::InconsistentWidth { .. }
            | Error::PatchOverflow { .. } => ErrorKind::UnsupportedProgram,
            Error::MissingPush { .. } => ErrorKind::InternalInvariant,
        }
    }
}

/// Transform result type
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration for prelude injection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectorConfig {
    /// Trailing compiler-metadata bytes stripped from deployed bytecode before analysis
    pub metadata_suffix_len: usize,
    /// Directory holding `<contractName>.json` build artifacts
    pub artifact_dir: PathBuf,
    /// Directory receiving injected artifacts
    pub output_dir: PathBuf,
    /// Write the injected artifact to `output_dir`
    pub persist: bool,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            metadata_suffix_len: METADATA_SUFFIX_LEN,
            artifact_dir: PathBuf::from("build/contracts"),
            output_dir: PathBuf::from("build/preface"),
            persist: true,
        }
    }
}
