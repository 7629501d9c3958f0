//! Bounded abstract stack owned by a single exploration branch.

use crate::value::AbstractValue;
use crate::{Error, MAX_STACK_DEPTH, Result};
use preface_core::Opcode;

/// Abstract EVM stack. Index 0 of `slots` is the bottom.
///
/// Forking clones the whole stack, so each branch owns its slots and their `duplicated` flags
/// independently.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AbstractStack {
    slots: Vec<AbstractValue>,
}

impl AbstractStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Pushes a value, failing once the stack holds [`MAX_STACK_DEPTH`] items.
    pub fn push(&mut self, value: AbstractValue) -> Result<()> {
        if self.slots.len() >= MAX_STACK_DEPTH {
            return Err(Error::StackOverflow);
        }
        self.slots.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<AbstractValue> {
        self.slots.pop().ok_or(Error::StackUnderflow {
            op: Opcode::POP,
            needed: 1,
            depth: 0,
        })
    }

    /// Pops `n` values for `op`, returned top first.
    pub fn pop_n(&mut self, op: Opcode, n: usize) -> Result<Vec<AbstractValue>> {
        self.require(op, n)?;
        let mut popped = self.slots.split_off(self.slots.len() - n);
        popped.reverse();
        Ok(popped)
    }

    /// Exchanges the top with the slot `i` positions below it.
    pub fn swap(&mut self, i: usize) -> Result<()> {
        self.require(Opcode::SWAP(i as u8), i + 1)?;
        let top = self.slots.len() - 1;
        self.slots.swap(top, top - i);
        Ok(())
    }

    /// Copies the `i`-th slot from the top (1-indexed) onto the stack, flagging both copies as
    /// duplicated.
    pub fn dup(&mut self, i: usize) -> Result<()> {
        let at = match self.slots.len().checked_sub(i) {
            Some(at) if i > 0 => at,
            _ => {
                return Err(Error::StackUnderflow {
                    op: Opcode::DUP(i as u8),
                    needed: i,
                    depth: self.slots.len(),
                });
            }
        };
        self.slots[at].mark_duplicated();
        let copy = self.slots[at];
        self.push(copy)
    }

    /// The slot `depth` positions below the top (0 is the top).
    pub fn peek(&self, depth: usize) -> Option<&AbstractValue> {
        self.slots
            .len()
            .checked_sub(depth + 1)
            .and_then(|i| self.slots.get(i))
    }

    /// Overwrites the slot `depth` positions below the top.
    pub fn replace(&mut self, depth: usize, value: AbstractValue) -> Option<AbstractValue> {
        let i = self.slots.len().checked_sub(depth + 1)?;
        Some(std::mem::replace(&mut self.slots[i], value))
    }

    /// Constant/duplicated flags of every slot, bottom first. Values are not part of the shape.
    pub fn shape(&self) -> Vec<(bool, bool)> {
        self.slots.iter().map(AbstractValue::shape).collect()
    }

    fn require(&self, op: Opcode, needed: usize) -> Result<()> {
        if self.slots.len() < needed {
            return Err(Error::StackUnderflow {
                op,
                needed,
                depth: self.slots.len(),
            });
        }
        Ok(())
    }
}
