//! Immutable typed values.
//!
//! All arithmetic reproduces target word semantics: fixed-point results wrap
//! to the type width, or clamp when the type saturates. Float values are
//! kept as `f64` bit patterns already truncated to their layout, so equality
//! and hashing are exact.

use crate::{BinOp, CallType, Type, TypeError, TypeFixed, TypeFloat, UnOp, WORD_BITS};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A folded IR value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Empty,
    Fixed {
        #[serde(with = "raw_repr")]
        raw: i128,
        ty: TypeFixed,
    },
    Float {
        bits: u64,
        ty: TypeFloat,
    },
    Funct {
        addr: u32,
        ctype: CallType,
    },
    StrEn {
        idx: u32,
    },
    Point {
        addr: u32,
    },
    Tuple(Vec<Value>),
    Array {
        elem: Type,
        items: Vec<Value>,
    },
}

mod raw_repr {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &i128, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(v)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<i128, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ── Float layout codec ──────────────────────────────────────────────────

impl TypeFloat {
    fn mask_man(&self) -> u64 {
        (1u64 << self.bits_i) - 1
    }

    fn mask_exp(&self) -> u64 {
        (self.exp_max() as u64) << self.bits_i
    }

    fn mask_sig(&self) -> u64 {
        if self.signed {
            1u64 << (self.bits_i + self.bits_f)
        } else {
            0
        }
    }

    /// Encode `x` into this layout.
    ///
    /// The mantissa is truncated, subnormals flush to signed zero, overflow
    /// becomes INF and every NaN becomes the all-ones pattern.
    pub fn encode(&self, x: f64) -> u64 {
        let b = x.to_bits();
        let sign = if b >> 63 != 0 { self.mask_sig() } else { 0 };
        let e64 = ((b >> 52) & 0x7FF) as i64;
        let m64 = b & ((1u64 << 52) - 1);

        if e64 == 0x7FF {
            let man = if m64 != 0 { self.mask_man() } else { 0 };
            return sign | self.mask_exp() | man;
        }
        if e64 == 0 {
            return sign;
        }

        let e = e64 - 1023 + self.bias() as i64;
        if e >= self.exp_max() as i64 {
            return sign | self.mask_exp();
        }
        if e <= 0 {
            return sign;
        }
        sign | (e as u64) << self.bits_i | m64 >> (52 - self.bits_i)
    }

    /// Decode a bit pattern of this layout.
    pub fn decode(&self, bits: u64) -> f64 {
        let e = ((bits & self.mask_exp()) >> self.bits_i) as i32;
        let man = bits & self.mask_man();
        let bias = self.bias() as i32;
        let bits_i = self.bits_i as i32;

        let mag = if e == self.exp_max() as i32 {
            if man != 0 {
                f64::NAN
            } else {
                f64::INFINITY
            }
        } else if e == 0 {
            man as f64 * 2f64.powi(1 - bias - bits_i)
        } else {
            (man | 1u64 << self.bits_i) as f64 * 2f64.powi(e - bias - bits_i)
        };

        if bits & self.mask_sig() != 0 {
            -mag
        } else {
            mag
        }
    }

    /// Round-trip `x` through this layout.
    pub fn truncate(&self, x: f64) -> f64 {
        self.decode(self.encode(x))
    }
}

impl TypeFixed {
    /// Wrap `raw` to the type width, ignoring saturation.
    pub fn wrap(&self, raw: i128) -> i128 {
        TypeFixed { satur: false, ..*self }.normalize(raw)
    }
}

// ══════════════════════════════════════════════════════════════════════
// Construction and inspection
// ══════════════════════════════════════════════════════════════════════

impl Value {
    /// Fixed-point value from a raw representation, normalized to `ty`.
    pub fn fixed(raw: i128, ty: TypeFixed) -> Self {
        Value::Fixed {
            raw: ty.normalize(raw),
            ty,
        }
    }

    /// Signed word.
    pub fn word(v: i32) -> Self {
        Value::fixed(v as i128, TypeFixed::word())
    }

    /// Unsigned word, the form used for bytecode literals.
    pub fn uword(v: u32) -> Self {
        Value::fixed(v as i128, TypeFixed::int(32, false))
    }

    /// Unsigned multiword literal, least significant word first.
    pub fn uwords(words: &[u32]) -> Self {
        let mut raw = 0u128;
        for (i, w) in words.iter().enumerate() {
            raw |= (*w as u128) << (i as u32 * WORD_BITS);
        }
        let bits = (words.len() as u32 * WORD_BITS).max(WORD_BITS);
        Value::Fixed {
            raw: raw as i128,
            ty: TypeFixed::int(bits, false),
        }
    }

    pub fn float(x: f64, ty: TypeFloat) -> Self {
        Value::Float {
            bits: ty.truncate(x).to_bits(),
            ty,
        }
    }

    fn boolean(b: bool) -> Self {
        Value::word(b as i32)
    }

    /// The zero value of `ty`.
    pub fn zero(ty: &Type) -> Self {
        match ty {
            Type::Empty => Value::Empty,
            Type::Fixed(t) => Value::Fixed { raw: 0, ty: *t },
            Type::Float(t) => Value::float(0.0, *t),
            Type::Funct(c) => Value::Funct { addr: 0, ctype: *c },
            Type::StrEn => Value::StrEn { idx: 0 },
            Type::Point => Value::Point { addr: 0 },
            Type::Tuple(ts) => Value::Tuple(ts.iter().map(Value::zero).collect()),
            Type::Array(t, n) => Value::Array {
                elem: (**t).clone(),
                items: (0..*n).map(|_| Value::zero(t)).collect(),
            },
        }
    }

    pub fn ty(&self) -> Type {
        match self {
            Value::Empty => Type::Empty,
            Value::Fixed { ty, .. } => Type::Fixed(*ty),
            Value::Float { ty, .. } => Type::Float(*ty),
            Value::Funct { ctype, .. } => Type::Funct(*ctype),
            Value::StrEn { .. } => Type::StrEn,
            Value::Point { .. } => Type::Point,
            Value::Tuple(vs) => Type::Tuple(vs.iter().map(Value::ty).collect()),
            Value::Array { elem, items } => Type::Array(Box::new(elem.clone()), items.len() as u32),
        }
    }

    pub fn raw(&self) -> Option<i128> {
        match self {
            Value::Fixed { raw, .. } => Some(*raw),
            Value::Funct { addr, .. } | Value::Point { addr } => Some(*addr as i128),
            Value::StrEn { idx } => Some(*idx as i128),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float { bits, .. } => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::Fixed { raw, .. } => *raw == 0,
            Value::Float { bits, .. } => f64::from_bits(*bits) == 0.0,
            Value::Funct { addr, .. } | Value::Point { addr } => *addr == 0,
            Value::StrEn { idx } => *idx == 0,
            Value::Tuple(vs) => vs.iter().all(Value::is_zero),
            Value::Array { items, .. } => items.iter().all(Value::is_zero),
        }
    }

    // ══════════════════════════════════════════════════════════════════
    // Arithmetic
    // ══════════════════════════════════════════════════════════════════

    pub fn unary(&self, op: UnOp) -> Result<Value, TypeError> {
        match (op, self) {
            (UnOp::Not, v) => Ok(Value::boolean(v.is_zero())),
            (UnOp::Neg, Value::Fixed { raw, ty }) => Ok(Value::fixed(-raw, *ty)),
            (UnOp::Neg, Value::Float { bits, ty }) => {
                Ok(Value::float(-f64::from_bits(*bits), *ty))
            }
            (UnOp::Inv, Value::Fixed { raw, ty }) => Ok(Value::fixed(!raw, *ty)),
            _ => Err(TypeError::Mismatch),
        }
    }

    pub fn binary(&self, op: BinOp, rhs: &Value) -> Result<Value, TypeError> {
        match op {
            BinOp::LogAnd => return Ok(Value::boolean(!self.is_zero() && !rhs.is_zero())),
            BinOp::LogOrI => return Ok(Value::boolean(!self.is_zero() || !rhs.is_zero())),
            BinOp::LogOrX => return Ok(Value::boolean(!self.is_zero() != !rhs.is_zero())),
            _ => {}
        }

        match (self, rhs) {
            (Value::Fixed { raw: a, ty }, Value::Fixed { raw: b, .. }) if op.is_shift() => {
                Ok(shift_fixed(op, *a, *b, *ty))
            }
            (Value::Fixed { raw: a, ty: ta }, Value::Fixed { raw: b, ty: tb }) if ta == tb => {
                fixed_binary(op, *a, *b, *ta)
            }
            (Value::Float { bits: a, ty: ta }, Value::Float { bits: b, ty: tb }) if ta == tb => {
                float_binary(op, f64::from_bits(*a), f64::from_bits(*b), *ta)
            }
            (Value::Point { addr: a }, Value::Point { addr: b }) if op.is_compare() => {
                Ok(Value::boolean(compare(op, a, b)))
            }
            (Value::StrEn { idx: a }, Value::StrEn { idx: b }) if op.is_compare() => {
                Ok(Value::boolean(compare(op, a, b)))
            }
            (Value::Funct { addr: a, .. }, Value::Funct { addr: b, .. }) if op.is_compare() => {
                Ok(Value::boolean(compare(op, a, b)))
            }
            _ => Err(TypeError::Mismatch),
        }
    }

    // ══════════════════════════════════════════════════════════════════
    // Conversion
    // ══════════════════════════════════════════════════════════════════

    /// Convert to `to`, following the target conversion rules: fractional
    /// bits truncate toward zero and float to fixed saturates, with NaN
    /// taking the bound matching its sign bit.
    pub fn convert(&self, to: &Type) -> Result<Value, TypeError> {
        if self.ty() == *to {
            return Ok(self.clone());
        }
        match (self, to) {
            (Value::Fixed { raw, ty }, Type::Fixed(dst)) => Ok(fixed_to_fixed(*raw, *ty, *dst)),
            (Value::Fixed { raw, ty }, Type::Float(dst)) => Ok(fixed_to_float(*raw, *ty, *dst)),
            (Value::Float { bits, .. }, Type::Fixed(dst)) => {
                Ok(float_to_fixed(f64::from_bits(*bits), *dst))
            }
            (Value::Float { bits, .. }, Type::Float(dst)) => {
                Ok(Value::float(f64::from_bits(*bits), *dst))
            }
            (Value::Fixed { raw, .. }, Type::Point) => Ok(Value::Point { addr: *raw as u32 }),
            (Value::Fixed { raw, .. }, Type::StrEn) => Ok(Value::StrEn { idx: *raw as u32 }),
            (Value::Fixed { raw, .. }, Type::Funct(c)) => Ok(Value::Funct {
                addr: *raw as u32,
                ctype: *c,
            }),
            (Value::Point { .. } | Value::StrEn { .. } | Value::Funct { .. }, Type::Fixed(dst)) => {
                let raw = self.raw().ok_or(TypeError::Mismatch)?;
                Ok(Value::fixed(raw, *dst))
            }
            (Value::Tuple(vs), Type::Tuple(ts)) if vs.len() == ts.len() => vs
                .iter()
                .zip(ts)
                .map(|(v, t)| v.convert(t))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Tuple),
            _ => Err(TypeError::Mismatch),
        }
    }

    // ══════════════════════════════════════════════════════════════════
    // Word representation
    // ══════════════════════════════════════════════════════════════════

    /// Target words, least significant first.
    pub fn to_words(&self) -> Vec<u32> {
        match self {
            Value::Empty => Vec::new(),
            Value::Fixed { raw, ty } => split_words(*raw as u128, ty.words()),
            Value::Float { bits, ty } => {
                split_words(ty.encode(f64::from_bits(*bits)) as u128, ty.words())
            }
            Value::Funct { addr, .. } | Value::Point { addr } => vec![*addr],
            Value::StrEn { idx } => vec![*idx],
            Value::Tuple(vs) => vs.iter().flat_map(Value::to_words).collect(),
            Value::Array { items, .. } => items.iter().flat_map(Value::to_words).collect(),
        }
    }

    /// Rebuild a value of `ty` from target words.
    pub fn from_words(ty: &Type, words: &[u32]) -> Result<Value, TypeError> {
        if words.len() < ty.words() as usize {
            return Err(TypeError::Mismatch);
        }
        Ok(match ty {
            Type::Empty => Value::Empty,
            Type::Fixed(t) => Value::Fixed {
                raw: t.wrap(join_words(&words[..t.words() as usize]) as i128),
                ty: *t,
            },
            Type::Float(t) => {
                let bits = join_words(&words[..t.words() as usize]) as u64;
                Value::float(t.decode(bits), *t)
            }
            Type::Funct(c) => Value::Funct {
                addr: words[0],
                ctype: *c,
            },
            Type::StrEn => Value::StrEn { idx: words[0] },
            Type::Point => Value::Point { addr: words[0] },
            Type::Tuple(ts) => {
                let mut off = 0;
                let mut vs = Vec::with_capacity(ts.len());
                for t in ts {
                    vs.push(Value::from_words(t, &words[off..])?);
                    off += t.words() as usize;
                }
                Value::Tuple(vs)
            }
            Type::Array(t, n) => {
                let step = t.words() as usize;
                let items = (0..*n as usize)
                    .map(|i| Value::from_words(t, &words[i * step..]))
                    .collect::<Result<Vec<_>, _>>()?;
                Value::Array {
                    elem: (**t).clone(),
                    items,
                }
            }
        })
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn split_words(bits: u128, n: u32) -> Vec<u32> {
    (0..n).map(|i| (bits >> (i * WORD_BITS)) as u32).collect()
}

fn join_words(words: &[u32]) -> u128 {
    words
        .iter()
        .enumerate()
        .fold(0u128, |acc, (i, w)| acc | (*w as u128) << (i as u32 * WORD_BITS))
}

fn compare<T: PartialOrd>(op: BinOp, a: T, b: T) -> bool {
    match op {
        BinOp::CmpEQ => a == b,
        BinOp::CmpNE => a != b,
        BinOp::CmpLT => a < b,
        BinOp::CmpGT => a > b,
        BinOp::CmpLE => a <= b,
        BinOp::CmpGE => a >= b,
        _ => false,
    }
}

fn shift_fixed(op: BinOp, a: i128, amount: i128, ty: TypeFixed) -> Value {
    let n = amount.clamp(0, 127) as u32;
    let raw = match op {
        BinOp::ShL if n >= ty.bits() => 0,
        BinOp::ShL => a << n,
        _ if n >= ty.bits() => {
            if a < 0 {
                -1
            } else {
                0
            }
        }
        _ => a >> n,
    };
    Value::fixed(raw, ty)
}

fn fixed_binary(op: BinOp, a: i128, b: i128, ty: TypeFixed) -> Result<Value, TypeError> {
    let f = ty.bits_f;
    let raw = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => mul_shift(a, b, f, ty),
        BinOp::Div => {
            if b == 0 {
                return Err(TypeError::DivisionByZero);
            }
            div_shift(a, b, f, ty)
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(TypeError::DivisionByZero);
            }
            a % b
        }
        BinOp::BitAnd => a & b,
        BinOp::BitOrI => a | b,
        BinOp::BitOrX => a ^ b,
        op if op.is_compare() => return Ok(Value::boolean(compare(op, a, b))),
        _ => return Err(TypeError::Mismatch),
    };
    Ok(Value::fixed(raw, ty))
}

/// Full 256-bit product of two magnitudes, as `(hi, lo)`.
fn widening_mul(a: u128, b: u128) -> (u128, u128) {
    const LO: u128 = u64::MAX as u128;
    let (a1, a0) = (a >> 64, a & LO);
    let (b1, b0) = (b >> 64, b & LO);
    let p00 = a0 * b0;
    let p01 = a0 * b1;
    let p10 = a1 * b0;
    let mid = (p00 >> 64) + (p01 & LO) + (p10 & LO);
    let lo = (p00 & LO) | (mid << 64);
    let hi = a1 * b1 + (p01 >> 64) + (p10 >> 64) + (mid >> 64);
    (hi, lo)
}

/// Shift a 256-bit magnitude right by `n < 128`. The flag is set when any
/// bit was shifted out.
fn shr_wide(hi: u128, lo: u128, n: u32) -> (u128, u128, bool) {
    if n == 0 {
        return (hi, lo, false);
    }
    let lost = lo & ((1u128 << n) - 1) != 0;
    (hi >> n, (lo >> n) | (hi << (128 - n)), lost)
}

/// Divide a 256-bit magnitude by `d`, truncating. The flag is set when the
/// remainder is nonzero.
fn div_wide(hi: u128, lo: u128, d: u128) -> (u128, u128, bool) {
    let (mut qh, mut ql, mut rem) = (0u128, 0u128, 0u128);
    for i in (0..256u32).rev() {
        let bit = if i >= 128 { (hi >> (i - 128)) & 1 } else { (lo >> i) & 1 };
        let carry = rem >> 127;
        rem = (rem << 1) | bit;
        if carry != 0 || rem >= d {
            rem = rem.wrapping_sub(d);
            if i >= 128 {
                qh |= 1u128 << (i - 128);
            } else {
                ql |= 1u128 << i;
            }
        }
    }
    (qh, ql, rem != 0)
}

/// Signed raw value of a 256-bit magnitude. Saturating types clamp on any
/// magnitude past `i128`; the rest keep the low bits for `normalize` to wrap.
fn signed_raw(neg: bool, hi: u128, lo: u128, ty: TypeFixed) -> i128 {
    if ty.satur && (hi != 0 || lo > i128::MAX as u128) {
        return if neg { ty.min_raw() } else { ty.max_raw() };
    }
    let v = lo as i128;
    if neg {
        v.wrapping_neg()
    } else {
        v
    }
}

/// `(a * b) >> f`, rounding toward negative infinity.
fn mul_shift(a: i128, b: i128, f: u32, ty: TypeFixed) -> i128 {
    let neg = (a < 0) != (b < 0);
    let (hi, lo) = widening_mul(a.unsigned_abs(), b.unsigned_abs());
    let (hi, mut lo, lost) = shr_wide(hi, lo, f);
    let mut hi = hi;
    if neg && lost {
        let (l, carry) = lo.overflowing_add(1);
        lo = l;
        hi += carry as u128;
    }
    signed_raw(neg, hi, lo, ty)
}

/// `(a << f) / b`, truncating toward zero.
fn div_shift(a: i128, b: i128, f: u32, ty: TypeFixed) -> i128 {
    let neg = (a < 0) != (b < 0);
    let (hi, lo) = widening_mul(a.unsigned_abs(), 1u128 << f);
    let (hi, lo, _) = div_wide(hi, lo, b.unsigned_abs());
    signed_raw(neg, hi, lo, ty)
}

fn float_binary(op: BinOp, a: f64, b: f64, ty: TypeFloat) -> Result<Value, TypeError> {
    if op.is_compare() {
        return Ok(Value::boolean(compare(op, a, b)));
    }
    let single = ty == TypeFloat::f32();
    let r = match op {
        BinOp::Add if single => (a as f32 + b as f32) as f64,
        BinOp::Sub if single => (a as f32 - b as f32) as f64,
        BinOp::Mul if single => (a as f32 * b as f32) as f64,
        BinOp::Div if single => (a as f32 / b as f32) as f64,
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        _ => return Err(TypeError::Mismatch),
    };
    Ok(Value::float(r, ty))
}

fn fixed_to_fixed(raw: i128, src: TypeFixed, dst: TypeFixed) -> Value {
    let d = dst.bits_f as i32 - src.bits_f as i32;
    let shifted = if d >= 0 {
        raw << d
    } else if raw < 0 {
        -((-raw) >> -d)
    } else {
        raw >> -d
    };
    Value::fixed(shifted, dst)
}

fn fixed_to_float(raw: i128, src: TypeFixed, dst: TypeFloat) -> Value {
    if raw == 0 {
        return Value::float(0.0, dst);
    }
    let m = raw.unsigned_abs();
    let top = 127 - m.leading_zeros();
    let kept = if top > dst.bits_i {
        m >> (top - dst.bits_i)
    } else {
        m << (dst.bits_i - top)
    };
    let scale = top as i32 - dst.bits_i as i32 - src.bits_f as i32;
    let mag = kept as f64 * 2f64.powi(scale);
    Value::float(if raw < 0 { -mag } else { mag }, dst)
}

fn float_to_fixed(x: f64, dst: TypeFixed) -> Value {
    let neg = x.is_sign_negative();
    let mag = x.abs();

    if x.is_nan() || mag >= 2f64.powi(dst.bits_i as i32) {
        let raw = if neg && dst.signed {
            dst.min_raw()
        } else {
            dst.max_raw()
        };
        return Value::Fixed { raw, ty: dst };
    }
    let m = (mag * 2f64.powi(dst.bits_f as i32)).trunc() as i128;
    Value::fixed(if neg { -m } else { m }, dst)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => write!(f, "()"),
            Value::Fixed { raw, ty } if ty.is_integer() => write!(f, "{raw}"),
            Value::Fixed { raw, ty } => {
                write!(f, "{}", *raw as f64 / 2f64.powi(ty.bits_f as i32))
            }
            Value::Float { bits, .. } => write!(f, "{}", f64::from_bits(*bits)),
            Value::Funct { addr, .. } => write!(f, "funct {addr}"),
            Value::StrEn { idx } => write!(f, "str {idx}"),
            Value::Point { addr } => write!(f, "ptr {addr}"),
            Value::Tuple(vs) | Value::Array { items: vs, .. } => {
                write!(f, "{{")?;
                for (i, v) in vs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix16(x: f64) -> Value {
        Value::fixed((x * 65536.0) as i128, TypeFixed::acs_fixed())
    }

    #[test]
    fn fixed_mul_div() {
        let a = fix16(1.5);
        let b = fix16(2.0);
        assert_eq!(a.binary(BinOp::Mul, &b).unwrap(), fix16(3.0));
        assert_eq!(a.binary(BinOp::Div, &b).unwrap(), fix16(0.75));
    }

    #[test]
    fn word_add_wraps() {
        let r = Value::word(i32::MAX).binary(BinOp::Add, &Value::word(1)).unwrap();
        assert_eq!(r, Value::word(i32::MIN));
    }

    #[test]
    fn division_by_zero_is_error() {
        let r = Value::word(4).binary(BinOp::Div, &Value::word(0));
        assert_eq!(r, Err(TypeError::DivisionByZero));
    }

    #[test]
    fn mixed_types_mismatch() {
        let r = Value::word(4).binary(BinOp::Add, &fix16(1.0));
        assert_eq!(r, Err(TypeError::Mismatch));
    }

    #[test]
    fn float_encode_f32_matches_native() {
        let t = TypeFloat::f32();
        for x in [1.0f32, -2.5, 3.0e10, 1.0e-20] {
            assert_eq!(t.encode(x as f64) as u32, x.to_bits());
        }
        assert_eq!(t.encode(f64::NAN) as u32, 0x7FFF_FFFF);
        assert_eq!(t.encode(1.0e300) as u32, 0x7F80_0000);
        assert_eq!(t.encode(1.0e-300) as u32, 0);
    }

    #[test]
    fn words_are_lsw_first() {
        let v = Value::fixed(0x1_0000_0002, TypeFixed::int(64, false));
        assert_eq!(v.to_words(), vec![2, 1]);
        let back = Value::from_words(&v.ty(), &[2, 1]).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn negative_fixed_words() {
        assert_eq!(fix16(-1.0).to_words(), vec![0xFFFF_0000]);
    }

    #[test]
    fn shift_past_width() {
        let r = Value::word(-8).binary(BinOp::ShR, &Value::word(40)).unwrap();
        assert_eq!(r, Value::word(-1));
        let r = Value::word(1).binary(BinOp::ShL, &Value::word(32)).unwrap();
        assert_eq!(r, Value::word(0));
    }
}
