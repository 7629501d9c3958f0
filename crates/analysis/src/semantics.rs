//! Constant folding for value-producing opcodes.
//!
//! Words are `U256` and arithmetic wraps modulo 2^256. Signed opcodes read their operands as
//! two's complement. A result is folded only when every operand it depends on is constant,
//! except for the zero-divisor and zero-exponent rules, whose result does not depend on the
//! other operand.

use crate::value::AbstractValue;
use crate::{Error, Result};
use preface_core::Opcode;
use revm::primitives::U256;

/// Evaluates the single output of a value-producing opcode.
///
/// `inputs` are the popped operands, top of stack first. Opcodes without folding rules
/// (environment, memory, storage, calls) produce an unknown value.
pub fn evaluate(op: Opcode, inputs: &[AbstractValue]) -> Result<AbstractValue> {
    let arg = |i: usize| inputs.get(i).and_then(AbstractValue::value);
    let zero = |i: usize| inputs.get(i).is_some_and(AbstractValue::is_zero_constant);

    let folded = match op {
        Opcode::ADD => binary(arg(0), arg(1), |a, b| a.wrapping_add(b)),
        Opcode::MUL => binary(arg(0), arg(1), |a, b| a.wrapping_mul(b)),
        Opcode::SUB => binary(arg(0), arg(1), |a, b| a.wrapping_sub(b)),
        Opcode::DIV if zero(1) => Some(U256::ZERO),
        Opcode::DIV => binary(arg(0), arg(1), div),
        Opcode::SDIV if zero(1) => Some(U256::ZERO),
        Opcode::SDIV => binary(arg(0), arg(1), sdiv),
        Opcode::MOD if zero(1) => Some(U256::ZERO),
        Opcode::MOD => binary(arg(0), arg(1), rem),
        Opcode::SMOD if zero(1) => Some(U256::ZERO),
        Opcode::SMOD => binary(arg(0), arg(1), smod),
        Opcode::ADDMOD | Opcode::MULMOD if zero(2) => Some(U256::ZERO),
        Opcode::ADDMOD => match (arg(0), arg(1), arg(2)) {
            (Some(a), Some(b), Some(n)) => Some(a.add_mod(b, n)),
            _ => None,
        },
        Opcode::MULMOD => match (arg(0), arg(1), arg(2)) {
            (Some(a), Some(b), Some(n)) => Some(a.mul_mod(b, n)),
            _ => None,
        },
        Opcode::EXP => exp(arg(0), arg(1))?,
        Opcode::SIGNEXTEND => binary(arg(0), arg(1), signextend),
        Opcode::LT => binary(arg(0), arg(1), |a, b| flag(a < b)),
        Opcode::GT => binary(arg(0), arg(1), |a, b| flag(a > b)),
        Opcode::SLT => binary(arg(0), arg(1), |a, b| flag(signed_lt(a, b))),
        Opcode::SGT => binary(arg(0), arg(1), |a, b| flag(signed_lt(b, a))),
        Opcode::EQ => binary(arg(0), arg(1), |a, b| flag(a == b)),
        Opcode::ISZERO => arg(0).map(|a| flag(a.is_zero())),
        Opcode::AND => binary(arg(0), arg(1), |a, b| a & b),
        Opcode::OR => binary(arg(0), arg(1), |a, b| a | b),
        Opcode::XOR => binary(arg(0), arg(1), |a, b| a ^ b),
        Opcode::NOT => arg(0).map(|a| !a),
        Opcode::BYTE if arg(0).is_some_and(|pos| pos >= U256::from(32)) => Some(U256::ZERO),
        Opcode::BYTE => binary(arg(0), arg(1), byte),
        Opcode::SHL if arg(0).is_some_and(|s| s >= U256::from(256)) => Some(U256::ZERO),
        Opcode::SHL => binary(arg(0), arg(1), shl),
        Opcode::SHR if arg(0).is_some_and(|s| s >= U256::from(256)) => Some(U256::ZERO),
        Opcode::SHR => binary(arg(0), arg(1), shr),
        Opcode::SAR => binary(arg(0), arg(1), sar),
        _ => None,
    };

    Ok(AbstractValue::from_option(folded))
}

fn binary(a: Option<U256>, b: Option<U256>, f: impl FnOnce(U256, U256) -> U256) -> Option<U256> {
    Some(f(a?, b?))
}

fn flag(condition: bool) -> U256 {
    if condition { U256::from(1) } else { U256::ZERO }
}

fn small(x: U256) -> Option<usize> {
    usize::try_from(x).ok()
}

fn is_negative(x: U256) -> bool {
    x.bit(255)
}

fn magnitude(x: U256) -> U256 {
    if is_negative(x) { x.wrapping_neg() } else { x }
}

pub fn div(a: U256, b: U256) -> U256 {
    a.checked_div(b).unwrap_or(U256::ZERO)
}

pub fn rem(a: U256, b: U256) -> U256 {
    a.checked_rem(b).unwrap_or(U256::ZERO)
}

/// Signed division truncating toward zero. `MIN / -1` wraps back to `MIN`.
pub fn sdiv(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::ZERO;
    }
    let quotient = magnitude(a) / magnitude(b);
    if is_negative(a) != is_negative(b) {
        quotient.wrapping_neg()
    } else {
        quotient
    }
}

/// Signed remainder; the result takes the sign of the dividend.
pub fn smod(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::ZERO;
    }
    let remainder = magnitude(a) % magnitude(b);
    if is_negative(a) {
        remainder.wrapping_neg()
    } else {
        remainder
    }
}

fn exp(base: Option<U256>, exponent: Option<U256>) -> Result<Option<U256>> {
    let Some(exponent) = exponent else {
        return Ok(None);
    };
    if exponent.is_zero() {
        return Ok(Some(U256::from(1)));
    }
    let len = exponent.byte_len();
    if !(1..=32).contains(&len) {
        return Err(Error::OutOfRange(format!(
            "EXP exponent is {len} bytes, expected 1 to 32"
        )));
    }
    Ok(base.map(|base| {
        if base.is_zero() {
            U256::ZERO
        } else {
            base.wrapping_pow(exponent)
        }
    }))
}

/// Extends the sign bit of byte `k` (counted from the least significant end) upward.
pub fn signextend(k: U256, value: U256) -> U256 {
    match small(k) {
        Some(k) if k < 31 => {
            let bit = k * 8 + 7;
            let mask = (U256::from(1) << (bit + 1)).wrapping_sub(U256::from(1));
            if value.bit(bit) {
                value | !mask
            } else {
                value & mask
            }
        }
        _ => value,
    }
}

fn signed_lt(a: U256, b: U256) -> bool {
    match (is_negative(a), is_negative(b)) {
        (true, false) => true,
        (false, true) => false,
        _ => a < b,
    }
}

/// Byte `pos` of `word`, counted from the most significant end.
pub fn byte(pos: U256, word: U256) -> U256 {
    match small(pos) {
        Some(pos) if pos < 32 => (word >> (8 * (31 - pos))) & U256::from(0xff),
        _ => U256::ZERO,
    }
}

pub fn shl(shift: U256, value: U256) -> U256 {
    match small(shift) {
        Some(s) if s < 256 => value << s,
        _ => U256::ZERO,
    }
}

pub fn shr(shift: U256, value: U256) -> U256 {
    match small(shift) {
        Some(s) if s < 256 => value >> s,
        _ => U256::ZERO,
    }
}

/// Arithmetic right shift; shifts of 256 or more saturate to 0 or all ones by sign.
pub fn sar(shift: U256, value: U256) -> U256 {
    let negative = is_negative(value);
    match small(shift) {
        Some(s) if s < 256 => {
            if negative {
                !((!value) >> s)
            } else {
                value >> s
            }
        }
        _ if negative => U256::MAX,
        _ => U256::ZERO,
    }
}
