//! IR types: storage layout and arithmetic category.
//!
//! Sizes are measured in target words of [`WORD_BITS`] bits. Arithmetic
//! types are limited to [`MAX_BITS`] so that every value fits an `i128`
//! raw representation with room for intermediate products.

use crate::{CallType, TypeError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bits per target word.
pub const WORD_BITS: u32 = 32;

/// Widest arithmetic type supported.
pub const MAX_BITS: u32 = 64;

// ══════════════════════════════════════════════════════════════════════
// Fixed-point / integer layout
// ══════════════════════════════════════════════════════════════════════

/// Fixed-point layout. Integers are fixed-point types with no fractional bits.
///
/// `bits_i` excludes the sign bit, so a signed 32-bit integer is
/// `bits_i = 31, bits_f = 0, signed = true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeFixed {
    pub bits_i: u32,
    pub bits_f: u32,
    pub signed: bool,
    pub satur: bool,
}

impl TypeFixed {
    pub const fn new(bits_i: u32, bits_f: u32, signed: bool, satur: bool) -> Self {
        Self {
            bits_i,
            bits_f,
            signed,
            satur,
        }
    }

    /// Integer type of `bits` total bits.
    pub const fn int(bits: u32, signed: bool) -> Self {
        Self::new(bits - signed as u32, 0, signed, false)
    }

    /// The ACS word: signed 32-bit integer.
    pub const fn word() -> Self {
        Self::int(32, true)
    }

    /// The ACS `fixed` type: signed 16.16.
    pub const fn acs_fixed() -> Self {
        Self::new(15, 16, true, false)
    }

    pub fn bits_s(&self) -> u32 {
        self.signed as u32
    }

    /// Total storage bits.
    pub fn bits(&self) -> u32 {
        self.bits_i + self.bits_f + self.bits_s()
    }

    pub fn words(&self) -> u32 {
        self.bits().div_ceil(WORD_BITS).max(1)
    }

    pub fn is_integer(&self) -> bool {
        self.bits_f == 0
    }

    /// Largest representable raw value.
    pub fn max_raw(&self) -> i128 {
        (1i128 << (self.bits_i + self.bits_f)) - 1
    }

    /// Smallest representable raw value.
    pub fn min_raw(&self) -> i128 {
        if self.signed {
            -(1i128 << (self.bits_i + self.bits_f))
        } else {
            0
        }
    }

    /// Bring `raw` into range: clamp when saturating, wrap otherwise.
    pub fn normalize(&self, raw: i128) -> i128 {
        if self.satur {
            return raw.clamp(self.min_raw(), self.max_raw());
        }
        let bits = self.bits();
        let mask = (1i128 << bits) - 1;
        let v = raw & mask;
        if self.signed && v >> (bits - 1) != 0 {
            v - (1i128 << bits)
        } else {
            v
        }
    }
}

// ══════════════════════════════════════════════════════════════════════
// Floating-point layout
// ══════════════════════════════════════════════════════════════════════

/// Float layout: `bits_i` mantissa bits (implicit bit excluded) and
/// `bits_f` exponent bits, sign bit on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeFloat {
    pub bits_i: u32,
    pub bits_f: u32,
    pub signed: bool,
    pub satur: bool,
}

impl TypeFloat {
    pub const fn new(bits_i: u32, bits_f: u32) -> Self {
        Self {
            bits_i,
            bits_f,
            signed: true,
            satur: false,
        }
    }

    /// IEEE single layout.
    pub const fn f32() -> Self {
        Self::new(23, 8)
    }

    /// IEEE double layout.
    pub const fn f64() -> Self {
        Self::new(52, 11)
    }

    pub fn bits_s(&self) -> u32 {
        self.signed as u32
    }

    pub fn bits(&self) -> u32 {
        self.bits_i + self.bits_f + self.bits_s()
    }

    pub fn words(&self) -> u32 {
        self.bits().div_ceil(WORD_BITS).max(1)
    }

    /// Exponent bias.
    pub fn bias(&self) -> u32 {
        (1 << (self.bits_f - 1)) - 1
    }

    /// All-ones exponent, the INF/NaN marker.
    pub fn exp_max(&self) -> u32 {
        (1 << self.bits_f) - 1
    }
}

// ══════════════════════════════════════════════════════════════════════
// Type
// ══════════════════════════════════════════════════════════════════════

/// An IR type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Empty,
    Fixed(TypeFixed),
    Float(TypeFloat),
    Funct(CallType),
    StrEn,
    Point,
    Tuple(Vec<Type>),
    Array(Box<Type>, u32),
}

impl Type {
    /// Signed 32-bit integer, the type of comparisons and logical ops.
    pub fn word() -> Self {
        Type::Fixed(TypeFixed::word())
    }

    /// Unsigned integer covering `words` words.
    pub fn uint_words(words: u32) -> Self {
        Type::Fixed(TypeFixed::int(words * WORD_BITS, false))
    }

    /// Size in words.
    pub fn words(&self) -> u32 {
        match self {
            Type::Empty => 0,
            Type::Fixed(t) => t.words(),
            Type::Float(t) => t.words(),
            Type::Funct(_) | Type::StrEn | Type::Point => 1,
            Type::Tuple(ts) => ts.iter().map(Type::words).sum(),
            Type::Array(t, n) => t.words() * n,
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, Type::Fixed(t) if !t.is_integer())
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Fixed(t) if t.is_integer())
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::Float(_))
    }

    pub fn is_arith(&self) -> bool {
        matches!(self, Type::Fixed(_) | Type::Float(_))
    }

    /// Reject layouts the value model cannot represent.
    pub fn check(&self) -> Result<(), TypeError> {
        let bits = match self {
            Type::Fixed(t) => t.bits(),
            Type::Float(t) => {
                if t.bits_f < 2 || t.bits_f > 11 || t.bits_i > 52 {
                    return Err(TypeError::Mismatch);
                }
                t.bits()
            }
            Type::Tuple(ts) => {
                for t in ts {
                    t.check()?;
                }
                return Ok(());
            }
            Type::Array(t, _) => return t.check(),
            _ => return Ok(()),
        };
        if bits == 0 || bits > MAX_BITS {
            return Err(TypeError::TooWide(bits));
        }
        Ok(())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Empty => write!(f, "empty"),
            Type::Fixed(t) => {
                let s = if t.signed { 's' } else { 'u' };
                let sat = if t.satur { "sat " } else { "" };
                if t.is_integer() {
                    write!(f, "{sat}{s}int{}", t.bits())
                } else {
                    write!(f, "{sat}{s}fix{}.{}", t.bits_i, t.bits_f)
                }
            }
            Type::Float(t) => write!(f, "float{}e{}", t.bits_i, t.bits_f),
            Type::Funct(c) => write!(f, "funct({c:?})"),
            Type::StrEn => write!(f, "strent"),
            Type::Point => write!(f, "point"),
            Type::Tuple(ts) => {
                write!(f, "(")?;
                for (i, t) in ts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, ")")
            }
            Type::Array(t, n) => write!(f, "{t}[{n}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_layout_sizes() {
        assert_eq!(TypeFixed::word().bits(), 32);
        assert_eq!(TypeFixed::acs_fixed().words(), 1);
        assert_eq!(TypeFixed::int(64, true).words(), 2);
        assert_eq!(TypeFixed::new(7, 8, false, false).words(), 1);
    }

    #[test]
    fn fixed_normalize_wraps_and_saturates() {
        let w = TypeFixed::word();
        assert_eq!(w.normalize(0x8000_0000), -0x8000_0000);
        assert_eq!(w.normalize(-0x8000_0001), 0x7FFF_FFFF);

        let s = TypeFixed::new(31, 0, true, true);
        assert_eq!(s.normalize(0x1_0000_0000), 0x7FFF_FFFF);
        assert_eq!(s.normalize(-0x1_0000_0000), -0x8000_0000);

        let u = TypeFixed::int(32, false);
        assert_eq!(u.normalize(-1), 0xFFFF_FFFF);
    }

    #[test]
    fn float_layout() {
        assert_eq!(TypeFloat::f32().bias(), 127);
        assert_eq!(TypeFloat::f64().bias(), 1023);
        assert_eq!(TypeFloat::f64().words(), 2);
        assert_eq!(TypeFloat::f32().exp_max(), 255);
    }

    #[test]
    fn composite_words() {
        let t = Type::Tuple(vec![Type::word(), Type::Float(TypeFloat::f64())]);
        assert_eq!(t.words(), 3);
        assert_eq!(Type::Array(Box::new(Type::word()), 4).words(), 4);
    }

    #[test]
    fn check_rejects_wide() {
        assert!(Type::Fixed(TypeFixed::int(64, false)).check().is_ok());
        assert_eq!(
            Type::Fixed(TypeFixed::int(96, false)).check(),
            Err(TypeError::TooWide(96))
        );
    }
}
