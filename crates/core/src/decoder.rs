//! Linear disassembler turning raw bytecode into an indexed instruction stream.

use crate::hex_bytes::HexBytes;
use crate::{Opcode, OpcodeExt};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::collections::HashMap;
use std::fmt;

/// Single disassembled EVM instruction with PC, opcode, and optional immediate data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Program counter (byte offset)
    pub pc: usize,
    /// Parsed opcode
    pub op: Opcode,
    /// Immediate bytes following a `PUSH1`..`PUSH32`
    pub imm: Option<HexBytes>,
}

impl Instruction {
    /// Returns the byte size of this instruction as it appears in the code buffer.
    #[inline]
    pub fn byte_size(&self) -> usize {
        1 + self.imm.as_ref().map_or(0, |imm| imm.len())
    }

    /// Returns true when the immediate was cut short by the end of the code buffer.
    pub fn is_truncated(&self) -> bool {
        self.imm.as_ref().map_or(0, |imm| imm.len()) != self.op.immediate_width()
    }

    /// Big-endian immediate bytes, zero-padded on the right to the declared width the way the
    /// EVM reads a push that runs off the end of the code.
    pub fn immediate_word(&self) -> Vec<u8> {
        let width = self.op.immediate_width();
        let mut word = vec![0u8; width];
        if let Some(imm) = &self.imm {
            let n = imm.len().min(width);
            word[..n].copy_from_slice(&imm[..n]);
        }
        word
    }

    /// The pushed value as a `usize`, or `None` if it does not fit.
    pub fn immediate_usize(&self) -> Option<usize> {
        let word = self.immediate_word();
        let significant: Vec<u8> = word.iter().copied().skip_while(|b| *b == 0).collect();
        if significant.len() > std::mem::size_of::<usize>() {
            return None;
        }
        Some(significant.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize))
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // pc: six-digit hex, opcode left-padded to 8 chars, then optional imm
        if let Some(immediate) = &self.imm {
            write!(f, "{:06x}  {:<8} {}", self.pc, self.op.to_string(), immediate)
        } else {
            write!(f, "{:06x}  {}", self.pc, self.op)
        }
    }
}

/// Decoded bytecode metadata (length, hash).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeInfo {
    /// Bytecode length in bytes
    pub byte_length: usize,
    /// Keccak-256 hash
    pub keccak_hash: [u8; 32],
}

/// A decoded program: the instruction list plus the lookup tables built over it.
///
/// Instruction indices address `instructions`; program counters address the code buffer.
/// Immediate bytes occupy program counters but have no instruction of their own, so the
/// `pc → index` map is the only way back from a jump destination to an instruction.
#[derive(Debug, Clone)]
pub struct Program {
    instructions: Vec<Instruction>,
    index_by_pc: HashMap<usize, usize>,
    pushes: Vec<usize>,
    jumps: Vec<usize>,
    jumpdests: Vec<usize>,
    info: DecodeInfo,
}

impl Program {
    /// All instructions in program order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns true if the program has no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// PCs of every `PUSH0`..`PUSH32`, in program order.
    pub fn pushes(&self) -> &[usize] {
        &self.pushes
    }

    /// PCs of every `JUMP`/`JUMPI`, in program order.
    pub fn jumps(&self) -> &[usize] {
        &self.jumps
    }

    /// PCs of every `JUMPDEST`, in program order.
    pub fn jumpdests(&self) -> &[usize] {
        &self.jumpdests
    }

    /// Length and hash of the decoded buffer.
    pub fn info(&self) -> &DecodeInfo {
        &self.info
    }

    /// Instruction index for the instruction starting at `pc`.
    pub fn index_of(&self, pc: usize) -> Option<usize> {
        self.index_by_pc.get(&pc).copied()
    }

    /// Instruction starting at `pc`.
    pub fn at_pc(&self, pc: usize) -> Option<&Instruction> {
        self.index_of(pc).map(|i| &self.instructions[i])
    }

    /// Instruction at list index `index`.
    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    /// The instruction immediately preceding `index` in program order.
    pub fn prior(&self, index: usize) -> Option<&Instruction> {
        index.checked_sub(1).and_then(|i| self.instructions.get(i))
    }

    /// Returns true if an instruction starts at `pc` and it is a `JUMPDEST`.
    pub fn is_jumpdest(&self, pc: usize) -> bool {
        matches!(self.at_pc(pc), Some(ins) if ins.op == Opcode::JUMPDEST)
    }
}

/// Disassembles `bytes` left to right.
///
/// A `PUSH_n` captures the following `n` bytes as its immediate; those bytes are never decoded
/// as instructions. A push cut short by the end of the buffer keeps whatever bytes remain.
pub fn decode(bytes: &[u8]) -> Program {
    let mut instructions = Vec::new();
    let mut pc = 0usize;

    while pc < bytes.len() {
        let op = Opcode::from_byte(bytes[pc]);
        let width = op.immediate_width();
        let imm = (width > 0).then(|| {
            let end = (pc + 1 + width).min(bytes.len());
            HexBytes(bytes[pc + 1..end].to_vec())
        });

        if !op.is_defined() {
            tracing::trace!("Undefined opcode 0x{:02x} at pc 0x{:x}", op.to_byte(), pc);
        }

        let ins = Instruction { pc, op, imm };
        if ins.is_truncated() {
            tracing::debug!(
                "{} at pc 0x{:x} runs past the end of the code ({} of {} immediate bytes)",
                op,
                pc,
                ins.imm.as_ref().map_or(0, |imm| imm.len()),
                width
            );
        }
        pc += ins.byte_size();
        instructions.push(ins);
    }

    index(instructions, bytes)
}

fn index(instructions: Vec<Instruction>, bytes: &[u8]) -> Program {
    let mut index_by_pc = HashMap::with_capacity(instructions.len());
    let mut pushes = Vec::new();
    let mut jumps = Vec::new();
    let mut jumpdests = Vec::new();

    for (i, ins) in instructions.iter().enumerate() {
        index_by_pc.insert(ins.pc, i);
        if ins.op.is_push() {
            pushes.push(ins.pc);
        } else if ins.op.is_jump() {
            jumps.push(ins.pc);
        } else if ins.op == Opcode::JUMPDEST {
            jumpdests.push(ins.pc);
        }
    }

    let mut hasher = Keccak256::new();
    hasher.update(bytes);
    let info = DecodeInfo {
        byte_length: bytes.len(),
        keccak_hash: hasher.finalize().into(),
    };

    tracing::debug!(
        "Decoded {} bytes into {} instructions ({} pushes, {} jumps, {} jumpdests)",
        info.byte_length,
        instructions.len(),
        pushes.len(),
        jumps.len(),
        jumpdests.len()
    );

    Program {
        instructions,
        index_by_pc,
        pushes,
        jumps,
        jumpdests,
        info,
    }
}
