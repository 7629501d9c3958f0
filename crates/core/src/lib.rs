//! Bytecode primitives shared by the analysis and rewriting crates: opcode metadata, the
//! disassembler and encoder, a small assembler for fixtures, and compiled-artifact I/O.

pub mod artifact;
pub mod assembler;
pub mod decoder;
pub mod encoder;
pub mod hex_bytes;
pub mod opcode;
pub mod result;

pub use eot::UnifiedOpcode as Opcode;
pub use hex_bytes::HexBytes;
pub use opcode::{OpcodeExt, TARGET_FORK};
pub use result::{Error, ErrorKind, Result};

/// Returns true if the opcode terminates execution.
///
/// Terminal opcodes end the current execution path: STOP, RETURN, REVERT, SELFDESTRUCT,
/// INVALID, and any byte with no instruction at [`TARGET_FORK`] (which executes like INVALID).
#[inline]
pub fn is_terminal_opcode(opcode: Opcode) -> bool {
    matches!(
        opcode,
        Opcode::STOP | Opcode::RETURN | Opcode::REVERT | Opcode::SELFDESTRUCT | Opcode::INVALID
    ) || !opcode.is_defined()
}

/// Strips an optional `0x` prefix, whitespace and `_` separators from a hex string.
///
/// Fails with [`Error::HexDecode`] if anything other than hex digits remains.
pub fn normalize_hex_string(input: &str) -> Result<String> {
    let trimmed = input.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    let cleaned: String = body
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .collect();

    if let Some((index, c)) = cleaned.char_indices().find(|(_, c)| !c.is_ascii_hexdigit()) {
        return Err(Error::HexDecode(hex::FromHexError::InvalidHexCharacter {
            c,
            index,
        }));
    }
    Ok(cleaned)
}

/// Decodes a hex string that must carry a `0x` prefix. `"0x"` decodes to no bytes.
pub fn decode_prefixed_hex(input: &str) -> Result<Vec<u8>> {
    let trimmed = input.trim();
    if !trimmed.starts_with("0x") {
        return Err(Error::MissingHexPrefix(trimmed.to_string()));
    }
    let normalized = normalize_hex_string(trimmed)?;
    Ok(hex::decode(normalized)?)
}
