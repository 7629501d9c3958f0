//! Locates the runtime payload embedded in init code.
//!
//! Solidity init code ends its constructor logic with an epilogue that copies the runtime out
//! of its own code and returns it:
//!
//! ```text
//! PUSH2 0x003a   // runtime length (patched)
//! DUP1           // reused by RETURN
//! PUSH2 0x0020   // runtime offset in init code
//! PUSH1 0x00
//! CODECOPY
//! PUSH1 0x00
//! RETURN
//! ```
//!
//! Everything from the offset onward is the deployed bytecode.

use crate::{Error, Result};
use preface_core::{Opcode, OpcodeExt};
use preface_core::decoder::{Instruction, decode};

/// Where the runtime payload sits in a contract's init code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeLayout {
    /// Pc of the push carrying the runtime length.
    pub length_push_pc: usize,
    /// Declared runtime length.
    pub runtime_len: usize,
    /// Pc of the push carrying the runtime offset.
    pub offset_push_pc: usize,
    /// Byte offset of the runtime payload within the init code.
    pub runtime_offset: usize,
}

fn matches_epilogue(window: &[Instruction]) -> bool {
    matches!(
        window.iter().map(|ins| ins.op).collect::<Vec<_>>().as_slice(),
        [a, Opcode::DUP(1), b, c, Opcode::CODECOPY, d, Opcode::RETURN]
            if a.is_push() && b.is_push() && c.is_push() && d.is_push()
    )
}

/// Finds the first runtime copy epilogue in `init_code` and checks that the bytes from its
/// offset onward equal `deployed_code`.
pub fn locate_runtime_payload(init_code: &[u8], deployed_code: &[u8]) -> Result<RuntimeLayout> {
    let program = decode(init_code);
    let window = program
        .instructions()
        .windows(7)
        .find(|window| matches_epilogue(window))
        .ok_or(Error::MissingSkeleton)?;

    let (length_push, offset_push) = (&window[0], &window[2]);
    let runtime_offset = offset_push
        .immediate_usize()
        .filter(|offset| *offset <= init_code.len())
        .ok_or(Error::RuntimeMismatch {
            offset: init_code.len(),
            expected: deployed_code.len(),
            found: 0,
        })?;
    let runtime_len = length_push.immediate_usize().unwrap_or(usize::MAX);

    tracing::info!(
        "Runtime payload at init instruction pc 0x{:x}: length {}, offset {}",
        length_push.pc,
        runtime_len,
        runtime_offset
    );

    let payload = &init_code[runtime_offset..];
    if payload != deployed_code {
        return Err(Error::RuntimeMismatch {
            offset: runtime_offset,
            expected: deployed_code.len(),
            found: payload.len(),
        });
    }
    if runtime_len != deployed_code.len() {
        tracing::warn!(
            "Epilogue length {} differs from deployed length {}",
            runtime_len,
            deployed_code.len()
        );
    }

    Ok(RuntimeLayout {
        length_push_pc: length_push.pc,
        runtime_len,
        offset_push_pc: offset_push.pc,
        runtime_offset,
    })
}
