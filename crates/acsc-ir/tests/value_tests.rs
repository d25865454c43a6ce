//! Integration tests for the value model.
//!
//! Tests validate:
//! - Folding agrees with direct evaluation on folded operands
//! - Conversions truncate toward zero and saturate at the bounds
//! - Float layouts flush, overflow and canonicalize NaN the way the VM does

use acsc_ir::{BinOp, Type, TypeError, TypeFixed, TypeFloat, UnOp, Value};
use pretty_assertions::assert_eq;

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn fix16(x: f64) -> Value {
    Value::fixed((x * 65536.0) as i128, TypeFixed::acs_fixed())
}

fn int32() -> Type {
    Type::word()
}

fn f32t() -> Type {
    Type::Float(TypeFloat::f32())
}

fn f64t() -> Type {
    Type::Float(TypeFloat::f64())
}

fn float_words(v: &Value) -> Vec<u32> {
    v.to_words()
}

// ══════════════════════════════════════════════════════════════════════════════
// Fixed-point arithmetic
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn fixed_add_sub() {
    assert_eq!(fix16(1.25).binary(BinOp::Add, &fix16(2.5)).unwrap(), fix16(3.75));
    assert_eq!(fix16(1.0).binary(BinOp::Sub, &fix16(2.5)).unwrap(), fix16(-1.5));
}

#[test]
fn saturating_add_clamps() {
    let t = TypeFixed::new(15, 16, true, true);
    let big = Value::fixed(t.max_raw(), t);
    let one = Value::fixed(1 << 16, t);
    assert_eq!(big.binary(BinOp::Add, &one).unwrap(), big);
}

#[test]
fn unsigned_compare() {
    let t = TypeFixed::int(32, false);
    let a = Value::fixed(0xFFFF_FFFF, t);
    let b = Value::fixed(1, t);
    assert_eq!(a.binary(BinOp::CmpGT, &b).unwrap(), Value::word(1));
    assert_eq!(a.binary(BinOp::CmpLT, &b).unwrap(), Value::word(0));
}

#[test]
fn signed_modulo_truncates() {
    let r = Value::word(-7).binary(BinOp::Mod, &Value::word(2)).unwrap();
    assert_eq!(r, Value::word(-1));
}

#[test]
fn fixed_multiply_rounds_down() {
    assert_eq!(fix16(1.5).binary(BinOp::Mul, &fix16(-2.0)).unwrap(), fix16(-3.0));
    let t = TypeFixed::acs_fixed();
    let r = Value::fixed(-1, t).binary(BinOp::Mul, &Value::fixed(1, t)).unwrap();
    assert_eq!(r.raw(), Some(-1));
}

#[test]
fn wide_multiply_wraps() {
    let u64t = TypeFixed::int(64, false);
    let max = Value::fixed(u64::MAX as i128, u64t);
    assert_eq!(max.binary(BinOp::Mul, &max).unwrap().raw(), Some(1));

    let i64t = TypeFixed::int(64, true);
    let min = Value::fixed(i64::MIN as i128, i64t);
    let neg_one = Value::fixed(-1, i64t);
    assert_eq!(min.binary(BinOp::Mul, &neg_one).unwrap().raw(), Some(i64::MIN as i128));
}

#[test]
fn wide_multiply_saturates() {
    let t = TypeFixed::new(64, 0, false, true);
    let max = Value::fixed(t.max_raw(), t);
    assert_eq!(max.binary(BinOp::Mul, &max).unwrap().raw(), Some(t.max_raw()));

    let s = TypeFixed::new(63, 0, true, true);
    let big = Value::fixed(s.max_raw(), s);
    let neg = Value::fixed(-2, s);
    assert_eq!(big.binary(BinOp::Mul, &neg).unwrap().raw(), Some(s.min_raw()));
}

#[test]
fn wide_fraction_divide() {
    let t = TypeFixed::new(0, 64, false, false);
    let quarter = Value::fixed(1 << 62, t);
    let half = Value::fixed(1 << 63, t);
    assert_eq!(quarter.binary(BinOp::Div, &half).unwrap(), half);
    assert_eq!(half.binary(BinOp::Mul, &half).unwrap(), quarter);
    assert_eq!(
        half.binary(BinOp::Div, &Value::fixed(0, t)),
        Err(TypeError::DivisionByZero)
    );
}

#[test]
fn signed_divide_truncates() {
    let r = fix16(-3.0).binary(BinOp::Div, &fix16(2.0)).unwrap();
    assert_eq!(r, fix16(-1.5));
    let t = TypeFixed::acs_fixed();
    let r = Value::fixed(-1, t).binary(BinOp::Div, &fix16(2.0)).unwrap();
    assert_eq!(r.raw(), Some(0));
}

#[test]
fn unary_ops() {
    assert_eq!(Value::word(5).unary(UnOp::Neg).unwrap(), Value::word(-5));
    assert_eq!(Value::word(0).unary(UnOp::Inv).unwrap(), Value::word(-1));
    assert_eq!(Value::word(0).unary(UnOp::Not).unwrap(), Value::word(1));
    assert_eq!(
        Value::float(1.0, TypeFloat::f32()).unary(UnOp::Inv),
        Err(TypeError::Mismatch)
    );
}

#[test]
fn logical_ops_yield_words() {
    let r = fix16(0.5).binary(BinOp::LogAnd, &Value::word(3)).unwrap();
    assert_eq!(r, Value::word(1));
    let r = Value::word(0).binary(BinOp::LogOrX, &Value::word(0)).unwrap();
    assert_eq!(r, Value::word(0));
}

// ══════════════════════════════════════════════════════════════════════════════
// Fixed-point conversion
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn fixed_to_int_truncates_toward_zero() {
    assert_eq!(fix16(1.5).convert(&int32()).unwrap(), Value::word(1));
    assert_eq!(fix16(-1.5).convert(&int32()).unwrap(), Value::word(-1));
    assert_eq!(fix16(-0.25).convert(&int32()).unwrap(), Value::word(0));
}

#[test]
fn fixed_to_wider_int() {
    let t = Type::Fixed(TypeFixed::int(64, true));
    let v = fix16(-1.5).convert(&t).unwrap();
    assert_eq!(v.to_words(), vec![0xFFFF_FFFF, 0xFFFF_FFFF]);
}

#[test]
fn int_to_fixed_shifts() {
    let v = Value::word(3).convert(&Type::Fixed(TypeFixed::acs_fixed())).unwrap();
    assert_eq!(v, fix16(3.0));
}

#[test]
fn saturating_destination_clamps() {
    let dst = TypeFixed::new(7, 8, true, true);
    let v = fix16(300.0).convert(&Type::Fixed(dst)).unwrap();
    assert_eq!(v.raw(), Some(dst.max_raw()));
    let v = fix16(-300.0).convert(&Type::Fixed(dst)).unwrap();
    assert_eq!(v.raw(), Some(dst.min_raw()));
}

#[test]
fn narrowing_wraps_without_saturation() {
    let dst = Type::Fixed(TypeFixed::int(8, true));
    assert_eq!(Value::word(0x1FF).convert(&dst).unwrap().raw(), Some(-1));
}

// ══════════════════════════════════════════════════════════════════════════════
// Float conversion
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn float_to_int_boundaries() {
    let f = |x: f64| Value::float(x, TypeFloat::f32());
    assert_eq!(f(0.0).convert(&int32()).unwrap(), Value::word(0));
    assert_eq!(f(-2.75).convert(&int32()).unwrap(), Value::word(-2));
    assert_eq!(f(1.0e20).convert(&int32()).unwrap(), Value::word(i32::MAX));
    assert_eq!(f(-1.0e20).convert(&int32()).unwrap(), Value::word(i32::MIN));
    assert_eq!(f(f64::NAN).convert(&int32()).unwrap(), Value::word(i32::MAX));
    assert_eq!(f(f64::INFINITY).convert(&int32()).unwrap(), Value::word(i32::MAX));
}

#[test]
fn float_to_fixed_saturates_to_true_bounds() {
    let dst = Type::Fixed(TypeFixed::acs_fixed());
    let v = Value::float(1.0e9, TypeFloat::f32()).convert(&dst).unwrap();
    assert_eq!(v.to_words(), vec![0x7FFF_FFFF]);
    let v = Value::float(-1.0e9, TypeFloat::f32()).convert(&dst).unwrap();
    assert_eq!(v.to_words(), vec![0x8000_0000]);
}

#[test]
fn tiny_float_to_fixed_is_zero() {
    let dst = Type::Fixed(TypeFixed::acs_fixed());
    let v = Value::float(1.0e-6, TypeFloat::f32()).convert(&dst).unwrap();
    assert!(v.is_zero());
}

#[test]
fn int_to_float_bit_patterns() {
    let cases: [(i32, u32); 5] = [
        (1, 0x3F80_0000),
        (-1, 0xBF80_0000),
        (3, 0x4040_0000),
        (i32::MIN, 0xCF00_0000),
        (0x0100_0001, 0x4B80_0000),
    ];
    for (i, bits) in cases {
        let v = Value::word(i).convert(&f32t()).unwrap();
        assert_eq!(float_words(&v), vec![bits], "converting {i}");
    }
}

#[test]
fn fixed_to_float_keeps_fraction() {
    let v = fix16(1.5).convert(&f32t()).unwrap();
    assert_eq!(float_words(&v), vec![1.5f32.to_bits()]);
}

#[test]
fn float_widening_and_narrowing() {
    let v = Value::float(1.5, TypeFloat::f32()).convert(&f64t()).unwrap();
    let bits = 1.5f64.to_bits();
    assert_eq!(v.to_words(), vec![bits as u32, (bits >> 32) as u32]);

    let v = Value::float(1.0e300, TypeFloat::f64()).convert(&f32t()).unwrap();
    assert_eq!(v.to_words(), vec![0x7F80_0000]);

    let v = Value::float(-1.0e-300, TypeFloat::f64()).convert(&f32t()).unwrap();
    assert_eq!(v.to_words(), vec![0x8000_0000]);

    let v = Value::float(f64::NAN, TypeFloat::f64()).convert(&f32t()).unwrap();
    assert_eq!(v.to_words(), vec![0x7FFF_FFFF]);
}

#[test]
fn narrowing_truncates_mantissa() {
    let x = 1.0 + f64::EPSILON * 3.0;
    let v = Value::float(x, TypeFloat::f64()).convert(&f32t()).unwrap();
    assert_eq!(v.to_words(), vec![1.0f32.to_bits()]);
}

// ══════════════════════════════════════════════════════════════════════════════
// Word representation
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn composite_words_concatenate() {
    let v = Value::Tuple(vec![Value::word(1), Value::StrEn { idx: 4 }, fix16(1.0)]);
    assert_eq!(v.to_words(), vec![1, 4, 0x1_0000]);
    let back = Value::from_words(&v.ty(), &v.to_words()).unwrap();
    assert_eq!(back, v);
}

#[test]
fn zero_values() {
    let t = Type::Array(Box::new(Type::word()), 3);
    let z = Value::zero(&t);
    assert!(z.is_zero());
    assert_eq!(z.to_words(), vec![0, 0, 0]);
}
