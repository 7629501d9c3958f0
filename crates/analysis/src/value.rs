//! Abstract stack values.

use crate::{Error, Result};
use revm::primitives::U256;
use std::fmt;

/// One abstract stack slot: either a known 256-bit constant or unknown.
///
/// A constant produced directly by a `PUSH` remembers that push's pc as its origin. Constants
/// folded from other values have no origin. `duplicated` is set once the slot has been copied
/// by a `DUP`; both the original and the copy carry it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AbstractValue {
    value: Option<U256>,
    origin: Option<usize>,
    duplicated: bool,
}

impl AbstractValue {
    /// A value not known at analysis time.
    pub const fn unknown() -> Self {
        Self {
            value: None,
            origin: None,
            duplicated: false,
        }
    }

    /// A folded constant with no originating push.
    pub const fn constant(value: U256) -> Self {
        Self {
            value: Some(value),
            origin: None,
            duplicated: false,
        }
    }

    /// A constant pushed by the instruction at `pc`.
    pub const fn from_push(pc: usize, value: U256) -> Self {
        Self {
            value: Some(value),
            origin: Some(pc),
            duplicated: false,
        }
    }

    /// A constant pushed by the instruction at `pc` from its big-endian immediate.
    pub fn from_immediate(pc: usize, bytes: &[u8]) -> Result<Self> {
        if bytes.len() > 32 {
            return Err(Error::InvalidValue(format!(
                "{}-byte immediate at pc 0x{pc:x} does not fit in 256 bits",
                bytes.len()
            )));
        }
        Ok(Self::from_push(pc, U256::from_be_slice(bytes)))
    }

    /// Converts an optional folding result into a value.
    pub fn from_option(value: Option<U256>) -> Self {
        value.map_or_else(Self::unknown, Self::constant)
    }

    pub fn is_constant(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Option<U256> {
        self.value
    }

    /// Pc of the push that produced this value, if it came straight from one.
    pub fn origin(&self) -> Option<usize> {
        self.origin
    }

    pub fn is_duplicated(&self) -> bool {
        self.duplicated
    }

    pub(crate) fn mark_duplicated(&mut self) {
        self.duplicated = true;
    }

    /// True when the value is the constant zero.
    pub fn is_zero_constant(&self) -> bool {
        self.value == Some(U256::ZERO)
    }

    /// The `(constant, duplicated)` pair used to compare stack shapes.
    pub fn shape(&self) -> (bool, bool) {
        (self.is_constant(), self.duplicated)
    }
}

impl fmt::Display for AbstractValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.value, self.origin) {
            (None, _) => f.write_str("?")?,
            (Some(v), None) => write!(f, "0x{v:x}")?,
            (Some(v), Some(pc)) => write!(f, "0x{v:x}@{pc:x}")?,
        }
        if self.duplicated {
            f.write_str("*")?;
        }
        Ok(())
    }
}
