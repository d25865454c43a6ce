//! Word-level semantics of the generic opcodes.
//!
//! Operands and results are little-endian word vectors. These functions are
//! shared by statement execution and by the reference runtime that stands in
//! for external arithmetic helpers.

use crate::error::{EvalError, EvalResult};
use acsc_ir::Code;

/// Widest operation the interpreter handles, in words.
pub const MAX_WORDS: u32 = 4;

// ── Word packing ────────────────────────────────────────────────────────

fn mask(n: u32) -> u128 {
    if n >= 4 {
        u128::MAX
    } else {
        (1u128 << (32 * n)) - 1
    }
}

fn to_u(w: &[u32]) -> u128 {
    w.iter()
        .enumerate()
        .fold(0u128, |acc, (i, x)| acc | (*x as u128) << (32 * i))
}

fn to_i(w: &[u32]) -> i128 {
    if w.is_empty() {
        return 0;
    }
    let bits = 32 * w.len() as u32;
    let u = to_u(w);
    if bits >= 128 || u >> (bits - 1) == 0 {
        u as i128
    } else {
        (u as i128) - (1i128 << bits)
    }
}

fn from_u(v: u128, n: u32) -> Vec<u32> {
    (0..n).map(|i| (v >> (32 * i)) as u32).collect()
}

fn truth(b: bool) -> Vec<u32> {
    vec![b as u32]
}

fn to_f(w: &[u32]) -> EvalResult<f64> {
    match w.len() {
        1 => Ok(f32::from_bits(w[0]) as f64),
        2 => Ok(f64::from_bits(to_u(w) as u64)),
        n => Err(EvalError::Unsupported(format!("{n}-word float"))),
    }
}

fn from_f(x: f64, n: u32) -> EvalResult<Vec<u32>> {
    match n {
        1 => Ok(vec![(x as f32).to_bits()]),
        2 => Ok(from_u(x.to_bits() as u128, 2)),
        _ => Err(EvalError::Unsupported(format!("{n}-word float"))),
    }
}

fn trap(what: &str) -> EvalError {
    EvalError::ArithmeticTrap(what.to_string())
}

// ══════════════════════════════════════════════════════════════════════
// Evaluation
// ══════════════════════════════════════════════════════════════════════

/// Apply `code` at width `n` to `ops`.
pub fn apply(code: Code, n: u32, ops: &[Vec<u32>]) -> EvalResult<Vec<u32>> {
    if n == 0 || n > MAX_WORDS {
        return Err(EvalError::BadOperand(format!("{code} at {n} words")));
    }
    let sizes = code.operand_sizes(n);
    if ops.len() < sizes.len() {
        return Err(EvalError::BadOperand(format!("{code} needs {} operands", sizes.len())));
    }
    if code.is_float() {
        return apply_float(code, n, ops);
    }

    let m = mask(n);
    let bits = 32 * n;
    let ua = to_u(&ops[0]) & m;
    let ia = to_i(&ops[0]);
    let (ub, ib) = match ops.get(1) {
        Some(b) => (to_u(b), to_i(b)),
        None => (0, 0),
    };
    let frac = 16 * n;

    let r = match code {
        Code::AddU | Code::AddI => ua.wrapping_add(ub),
        Code::SubU | Code::SubI => ua.wrapping_sub(ub),
        Code::MulU | Code::MulI => ua.wrapping_mul(ub),
        Code::DivI | Code::ModI => {
            if ib == 0 {
                return Err(trap("division by zero"));
            }
            let r = if code == Code::DivI {
                ia.wrapping_div(ib)
            } else {
                ia.wrapping_rem(ib)
            };
            r as u128
        }
        Code::DivU | Code::ModU => {
            if ub == 0 {
                return Err(trap("division by zero"));
            }
            if code == Code::DivU {
                ua / ub
            } else {
                ua % ub
            }
        }
        Code::MulX => {
            if n > 2 {
                return Err(EvalError::Unsupported(format!("{code} at {n} words")));
            }
            (ia.wrapping_mul(ib) >> frac) as u128
        }
        Code::MulK => {
            if n > 2 {
                return Err(EvalError::Unsupported(format!("{code} at {n} words")));
            }
            ua.wrapping_mul(ub) >> frac
        }
        Code::DivX => {
            if ib == 0 {
                return Err(trap("division by zero"));
            }
            if n > 2 {
                return Err(EvalError::Unsupported(format!("{code} at {n} words")));
            }
            ((ia << frac) / ib) as u128
        }
        Code::DivK => {
            if ub == 0 {
                return Err(trap("division by zero"));
            }
            if n > 2 {
                return Err(EvalError::Unsupported(format!("{code} at {n} words")));
            }
            (ua << frac) / ub
        }
        Code::AndU => ua & ub,
        Code::OrIU => ua | ub,
        Code::OrXU => ua ^ ub,
        Code::InvU => !ua,
        Code::NegI => 0u128.wrapping_sub(ua),
        Code::NotU => return Ok(truth(ua == 0)),
        Code::LAnd => return Ok(truth(ua != 0 && ub != 0)),
        Code::LOrI => return Ok(truth(ua != 0 || ub != 0)),
        Code::ShLU => {
            let amt = ub as u32;
            if amt >= bits {
                0
            } else {
                ua << amt
            }
        }
        Code::ShRU => {
            let amt = ub as u32;
            if amt >= bits {
                0
            } else {
                ua >> amt
            }
        }
        Code::ShRI => {
            let amt = (ub as u32).min(bits - 1);
            (ia >> amt) as u128
        }
        Code::CmpIEq | Code::CmpUEq => return Ok(truth(ua == ub & m)),
        Code::CmpINe | Code::CmpUNe => return Ok(truth(ua != ub & m)),
        Code::CmpILt => return Ok(truth(ia < ib)),
        Code::CmpIGt => return Ok(truth(ia > ib)),
        Code::CmpILe => return Ok(truth(ia <= ib)),
        Code::CmpIGe => return Ok(truth(ia >= ib)),
        Code::CmpULt => return Ok(truth(ua < ub)),
        Code::CmpUGt => return Ok(truth(ua > ub)),
        Code::CmpULe => return Ok(truth(ua <= ub)),
        Code::CmpUGe => return Ok(truth(ua >= ub)),
        Code::Bclz => {
            let lz = (ua << (128 - bits)).leading_zeros().min(bits);
            return Ok(vec![lz]);
        }
        Code::Bclo => {
            let lo = (!ua & m).wrapping_shl(128 - bits).leading_zeros().min(bits);
            return Ok(vec![lo]);
        }
        Code::AdXU => {
            let carry_in = ops.get(2).map(|c| to_u(c) & 1).unwrap_or(0);
            let sum = ua + (ub & m) + carry_in;
            let mut out = from_u(sum & m, n);
            out.push((sum > m) as u32);
            return Ok(out);
        }
        Code::SuXU => {
            let borrow_in = ops.get(2).map(|c| to_u(c) & 1).unwrap_or(0);
            let sub = (ub & m) + borrow_in;
            let mut out = from_u(ua.wrapping_sub(sub) & m, n);
            out.push((ua < sub) as u32);
            return Ok(out);
        }
        Code::MuXU => {
            if n > 2 {
                return Err(EvalError::Unsupported(format!("{code} at {n} words")));
            }
            return Ok(from_u(ua * (ub & m), 2 * n));
        }
        Code::DiXI | Code::DiXU => {
            if ub & m == 0 {
                return Err(trap("division by zero"));
            }
            let (q, r) = if code == Code::DiXI {
                ((ia / ib) as u128, (ia % ib) as u128)
            } else {
                (ua / (ub & m), ua % (ub & m))
            };
            let mut out = from_u(q & m, n);
            out.extend(from_u(r & m, n));
            return Ok(out);
        }
        other => return Err(EvalError::Unsupported(format!("{other} is not arithmetic"))),
    };
    Ok(from_u(r & m, n))
}

fn apply_float(code: Code, n: u32, ops: &[Vec<u32>]) -> EvalResult<Vec<u32>> {
    let a = to_f(&ops[0])?;
    let single = n == 1;
    let b = match code {
        Code::ShLF | Code::ShRF => to_i(&ops[1]) as f64,
        Code::NegF => 0.0,
        _ => to_f(&ops[1])?,
    };
    let r = match code {
        Code::AddF if single => (a as f32 + b as f32) as f64,
        Code::SubF if single => (a as f32 - b as f32) as f64,
        Code::MulF if single => (a as f32 * b as f32) as f64,
        Code::DivF if single => (a as f32 / b as f32) as f64,
        Code::AddF => a + b,
        Code::SubF => a - b,
        Code::MulF => a * b,
        Code::DivF => a / b,
        Code::NegF => -a,
        Code::ShLF => a * 2f64.powi(b as i32),
        Code::ShRF => a * 2f64.powi(-(b as i32)),
        Code::CmpFEq => return Ok(truth(a == b)),
        Code::CmpFNe => return Ok(truth(a != b)),
        Code::CmpFLt => return Ok(truth(a < b)),
        Code::CmpFGt => return Ok(truth(a > b)),
        Code::CmpFLe => return Ok(truth(a <= b)),
        Code::CmpFGe => return Ok(truth(a >= b)),
        other => return Err(EvalError::Unsupported(format!("{other} is not a float op"))),
    };
    from_f(r, n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_word_add_carries() {
        let r = apply(Code::AddU, 2, &[vec![0xFFFF_FFFF, 0], vec![1, 0]]).unwrap();
        assert_eq!(r, vec![0, 1]);
    }

    #[test]
    fn signed_compare_uses_top_bit() {
        assert_eq!(apply(Code::CmpILt, 1, &[vec![0xFFFF_FFFF], vec![0]]).unwrap(), vec![1]);
        assert_eq!(apply(Code::CmpULt, 1, &[vec![0xFFFF_FFFF], vec![0]]).unwrap(), vec![0]);
    }

    #[test]
    fn fixed_mul_word() {
        let r = apply(Code::MulX, 1, &[vec![0x1_8000], vec![0x2_0000]]).unwrap();
        assert_eq!(r, vec![0x3_0000]);
    }

    #[test]
    fn bit_counts() {
        assert_eq!(apply(Code::Bclz, 1, &[vec![1]]).unwrap(), vec![31]);
        assert_eq!(apply(Code::Bclo, 1, &[vec![0xF000_0000]]).unwrap(), vec![4]);
        assert_eq!(apply(Code::Bclz, 2, &[vec![0, 0]]).unwrap(), vec![64]);
    }

    #[test]
    fn shifts() {
        assert_eq!(apply(Code::ShRI, 1, &[vec![0x8000_0000], vec![4]]).unwrap(), vec![0xF800_0000]);
        assert_eq!(apply(Code::ShRU, 1, &[vec![0x8000_0000], vec![4]]).unwrap(), vec![0x0800_0000]);
        assert_eq!(apply(Code::ShLU, 2, &[vec![0x8000_0000, 0], vec![1]]).unwrap(), vec![0, 1]);
    }

    #[test]
    fn float_add() {
        let r = apply(Code::AddF, 1, &[vec![1.5f32.to_bits()], vec![2.0f32.to_bits()]]).unwrap();
        assert_eq!(r, vec![3.5f32.to_bits()]);
    }

    #[test]
    fn division_by_zero_traps() {
        assert!(matches!(
            apply(Code::DivI, 1, &[vec![1], vec![0]]),
            Err(EvalError::ArithmeticTrap(_))
        ));
    }
}
