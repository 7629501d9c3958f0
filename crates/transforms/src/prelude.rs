use crate::Result;
use preface_core::decode_prefixed_hex;

/// Opaque bytes to run ahead of a contract's runtime code.
///
/// The bytes are never inspected: stack balance and opcode validity are the caller's concern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prelude {
    bytes: Vec<u8>,
}

impl Prelude {
    /// Parses a `0x`-prefixed hex string. `"0x"` is the empty prelude.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let bytes = decode_prefixed_hex(hex)?;
        tracing::debug!("Prelude: {} ({} bytes)", hex.trim(), bytes.len());
        Ok(Self { bytes })
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.bytes))
    }
}
