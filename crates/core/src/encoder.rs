//! Module for encoding EVM instructions back into bytecode.

use crate::OpcodeExt;
use crate::decoder::Instruction;
use crate::result::Error;

/// Encodes a sequence of EVM instructions into bytecode.
///
/// Each instruction contributes its opcode byte followed by its immediate. A `PUSH_n` whose
/// immediate is shorter than `n` bytes is only accepted as the final instruction, which is how
/// [`decode`](crate::decoder::decode) represents a push running off the end of the code.
///
/// # Examples
/// ```
/// use preface_core::decoder::Instruction;
/// use preface_core::encoder::encode;
/// use preface_core::Opcode;
///
/// let ins = Instruction { pc: 0, op: Opcode::PUSH(1), imm: Some(vec![0xaa].into()) };
/// assert_eq!(encode(&[ins]).unwrap(), vec![0x60, 0xaa]);
/// ```
pub fn encode(instructions: &[Instruction]) -> Result<Vec<u8>, Error> {
    let mut bytes = Vec::with_capacity(instructions.len() * 2);

    for (i, ins) in instructions.iter().enumerate() {
        bytes.push(ins.op.to_byte());

        let width = ins.op.immediate_width();
        match (&ins.imm, width) {
            (None, 0) => {}
            (Some(imm), 0) => {
                return Err(Error::InvalidImmediate(format!(
                    "{} at pc={} takes no immediate, got {} bytes",
                    ins.op,
                    ins.pc,
                    imm.len()
                )));
            }
            (None, n) => {
                tracing::error!("Missing immediate for {} at pc={}", ins.op, ins.pc);
                return Err(Error::InvalidImmediate(format!(
                    "PUSH{} missing immediate at pc={}",
                    n, ins.pc
                )));
            }
            (Some(imm), n) => {
                let last = i + 1 == instructions.len();
                if imm.len() > n || (imm.len() < n && !last) {
                    return Err(Error::InvalidImmediate(format!(
                        "PUSH{} requires {}-byte immediate, got {} bytes at pc={}",
                        n,
                        n,
                        imm.len(),
                        ins.pc
                    )));
                }
                bytes.extend_from_slice(imm);
            }
        }
    }

    tracing::debug!(
        "Encoded {} instructions into {} bytes",
        instructions.len(),
        bytes.len()
    );
    Ok(bytes)
}
