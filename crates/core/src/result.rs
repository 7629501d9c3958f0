//! Core results and error types

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Coarse classification shared by every error in the workspace.
///
/// Callers use it to tell an input problem (`MalformedInput`), a program the rewriter cannot
/// handle yet (`UnsupportedProgram`, stack faults, `ResourceExhaustion`) and a defect in the
/// tool itself (`InternalInvariant`) apart without matching on crate-specific variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The input is malformed: bad hex, missing prefix, missing init-code skeleton, mismatched
    /// runtime payload.
    MalformedInput,
    /// The program uses a construct the rewriter does not support.
    UnsupportedProgram,
    /// The abstract stack had fewer items than an instruction consumes.
    StackUnderflow,
    /// The abstract stack exceeded 1024 items.
    StackOverflow,
    /// A constant value could not be represented as a 256-bit word.
    InvalidValue,
    /// An operand fell outside the range the folding rules accept.
    OutOfRange,
    /// A realized stack effect disagreed with the opcode table.
    InternalInvariant,
    /// The global instruction-step budget was exhausted.
    ResourceExhaustion,
    /// Reading or writing an artifact failed.
    Io,
}

impl ErrorKind {
    /// Returns true when the error indicates a defect in the tool rather than in its input.
    pub fn is_internal(self) -> bool {
        matches!(self, ErrorKind::InternalInvariant)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::MalformedInput => "malformed input",
            ErrorKind::UnsupportedProgram => "unsupported program",
            ErrorKind::StackUnderflow => "stack underflow",
            ErrorKind::StackOverflow => "stack overflow",
            ErrorKind::InvalidValue => "invalid value",
            ErrorKind::OutOfRange => "out of range",
            ErrorKind::InternalInvariant => "internal invariant violated",
            ErrorKind::ResourceExhaustion => "resource exhaustion",
            ErrorKind::Io => "i/o",
        };
        f.write_str(name)
    }
}

/// Core error type encompassing all core module errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read file at the specified path.
    #[error("could not read file '{path}': {source}")]
    FileRead {
        /// The path to the file that could not be read.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write file at the specified path.
    #[error("could not write file '{path}': {source}")]
    FileWrite {
        /// The path to the file that could not be written.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to decode hex string.
    #[error("hex decode failed: {0}")]
    HexDecode(#[from] hex::FromHexError),

    /// A hex string that must carry a `0x` prefix did not.
    #[error("expected a 0x-prefixed hex string, got `{0}`")]
    MissingHexPrefix(String),

    /// The immediate data for a PUSH opcode is invalid.
    #[error("invalid immediate: {0}")]
    InvalidImmediate(String),

    /// An artifact could not be (de)serialized.
    #[error("artifact json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Deployed bytecode is shorter than the metadata suffix that must be stripped from it.
    #[error("deployed bytecode is {len} bytes, shorter than the {suffix}-byte metadata suffix")]
    MetadataTooShort {
        /// Length of the deployed bytecode.
        len: usize,
        /// Configured metadata suffix length.
        suffix: usize,
    },

    /// Failed to parse assembly at the specified line.
    #[error("assembly parse error at line {line}: {msg} ⇒ `{raw}`")]
    ParseError {
        /// The line number where parsing failed.
        line: usize,
        /// Description of the parsing error.
        msg: String,
        /// The raw content that failed to parse.
        raw: String,
    },
}

impl Error {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::FileRead { .. } | Error::FileWrite { .. } => ErrorKind::Io,
            Error::HexDecode(_)
            | Error::MissingHexPrefix(_)
            | Error::InvalidImmediate(_)
            | Error::Json(_)
            | Error::MetadataTooShort { .. }
            | Error::ParseError { .. } => ErrorKind::MalformedInput,
        }
    }
}

/// Core result type
pub type Result<T> = std::result::Result<T, Error>;
