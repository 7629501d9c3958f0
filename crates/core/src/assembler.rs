//! Minimal textual assembler for writing bytecode fixtures by mnemonic.
//!
//! Input is a sequence of mnemonics separated by whitespace or newlines. A `PUSH_n` takes the
//! next token as its `0x` immediate, left-padded with zeros to `n` bytes. `#` starts a comment
//! that runs to the end of the line.
//!
//! ```text
//! PUSH1 0x04 JUMP   # skip the INVALID
//! INVALID
//! JUMPDEST STOP
//! ```

use crate::decoder::Instruction;
use crate::encoder::encode;
use crate::hex_bytes::HexBytes;
use crate::result::Error;
use crate::{Opcode, OpcodeExt};

/// Parses assembly text into instructions with program counters assigned.
pub fn parse_assembly(asm: &str) -> Result<Vec<Instruction>, Error> {
    let mut instructions = Vec::new();
    let mut pc = 0usize;

    for (line_no, raw) in asm.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("");
        let mut tokens = line.split_whitespace();

        while let Some(token) = tokens.next() {
            let parse_error = |msg: String| Error::ParseError {
                line: line_no + 1,
                msg,
                raw: raw.trim().to_string(),
            };

            let op = parse_mnemonic(token).map_err(parse_error)?;

            let width = op.immediate_width();
            let imm = if width > 0 {
                let literal = tokens
                    .next()
                    .ok_or_else(|| parse_error(format!("{op} is missing its immediate")))?;
                Some(HexBytes(parse_immediate(literal, width).map_err(parse_error)?))
            } else {
                None
            };

            let ins = Instruction { pc, op, imm };
            pc += ins.byte_size();
            instructions.push(ins);
        }
    }

    Ok(instructions)
}

/// Assembles text straight to bytecode.
pub fn assemble(asm: &str) -> Result<Vec<u8>, Error> {
    encode(&parse_assembly(asm)?)
}

/// Accepts eot mnemonics plus the `UNKNOWN(0x..)` form undefined bytes display as.
fn parse_mnemonic(token: &str) -> Result<Opcode, String> {
    if let Some(byte) = token
        .strip_prefix("UNKNOWN(0x")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return u8::from_str_radix(byte, 16)
            .map(Opcode::from_byte)
            .map_err(|e| format!("undefined opcode `{token}`: {e}"));
    }
    token.parse()
}

fn parse_immediate(literal: &str, width: usize) -> Result<Vec<u8>, String> {
    let digits = literal
        .strip_prefix("0x")
        .ok_or_else(|| format!("immediate `{literal}` must be 0x-prefixed"))?;
    let padded = if digits.len() % 2 == 1 {
        format!("0{digits}")
    } else {
        digits.to_string()
    };
    let bytes = hex::decode(&padded).map_err(|e| format!("immediate `{literal}`: {e}"))?;
    if bytes.len() > width {
        return Err(format!(
            "immediate `{literal}` is {} bytes, wider than PUSH{width}",
            bytes.len()
        ));
    }
    let mut word = vec![0u8; width - bytes.len()];
    word.extend_from_slice(&bytes);
    Ok(word)
}
