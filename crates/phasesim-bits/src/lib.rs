//! Fixed-width unsigned bit vectors
//!
//! Every signal in a phasesim circuit carries a [`Bits`] value: an unsigned
//! quantity in `[0, 2^N)` for a width `N` between 1 and 64. The stored value is
//! always masked to its width, so every constructor and every arithmetic or
//! bitwise result wraps exactly like an N-bit register would.
//!
//! Signed quantities use two's complement: [`Bits::from_signed`] stores a negative
//! number by truncation and [`Bits::as_signed`] reads it back.
//!
//! ```
//! use phasesim_bits::Bits;
//!
//! let a = Bits::new(8, 0xf0).unwrap();
//! let b = Bits::new(8, 0x0f).unwrap();
//! assert_eq!(a.add_carry_out(b, true).unwrap(), 0x100);
//! assert_eq!(a.wrapping_add(b), 0xff);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, BitAnd, BitOr, BitXor, Neg, Not};
use thiserror::Error;

/// Errors raised by malformed bit-vector operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BitsError {
    /// Bit index at or beyond the width of the value
    #[error("bit index {index} is out of range for a {width}-bit value")]
    IndexOutOfRange { index: u32, width: u32 },

    /// Slice whose high bound is below its low bound
    #[error("invalid slice range [{high}:{low}]")]
    InvalidRange { high: u32, low: u32 },

    /// Width outside `1..=64`
    #[error("invalid width {0}: widths must be between 1 and 64 bits")]
    InvalidWidth(u32),

    /// Extension to a width smaller than the source
    #[error("cannot extend a {from}-bit value to {to} bits")]
    Narrowing { from: u32, to: u32 },
}

/// Result type for bit-vector operations
pub type Result<T> = std::result::Result<T, BitsError>;

/// A validated bit width between [`Width::MIN`] and [`Width::MAX`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Width(u8);

impl Width {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 64;

    /// A single bit, the width of carries and flags
    pub const ONE: Width = Width(1);

    pub fn new(bits: u32) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&bits) {
            Ok(Width(bits as u8))
        } else {
            Err(BitsError::InvalidWidth(bits))
        }
    }

    pub fn get(self) -> u32 {
        u32::from(self.0)
    }

    /// All ones in the low `self` bits
    pub fn mask(self) -> u64 {
        if self.0 == 64 {
            u64::MAX
        } else {
            (1u64 << self.0) - 1
        }
    }

    /// Build a value of this width, truncating `value` to fit
    pub fn bits(self, value: u64) -> Bits {
        Bits {
            width: self,
            value: value & self.mask(),
        }
    }

    pub fn zero(self) -> Bits {
        self.bits(0)
    }

    /// Whether `value` fits without truncation
    pub fn fits(self, value: u64) -> bool {
        value & !self.mask() == 0
    }
}

impl TryFrom<u32> for Width {
    type Error = BitsError;

    fn try_from(bits: u32) -> Result<Self> {
        Width::new(bits)
    }
}

impl From<Width> for u32 {
    fn from(width: Width) -> Self {
        width.get()
    }
}

impl PartialEq<u32> for Width {
    fn eq(&self, other: &u32) -> bool {
        self.get() == *other
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An N-bit unsigned value, always masked to its width
///
/// Equality compares both width and value. Comparing against a bare `u64`
/// compares the numeric value only.
///
/// Binary operators accept operands of different widths: the narrower one is
/// zero-extended and the result takes the wider width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawBits")]
pub struct Bits {
    width: Width,
    value: u64,
}

#[derive(Deserialize)]
struct RawBits {
    width: Width,
    value: u64,
}

impl From<RawBits> for Bits {
    fn from(raw: RawBits) -> Self {
        raw.width.bits(raw.value)
    }
}

impl Bits {
    /// Create a `width`-bit value holding `value mod 2^width`
    pub fn new(width: u32, value: u64) -> Result<Self> {
        Ok(Width::new(width)?.bits(value))
    }

    pub fn zero(width: u32) -> Result<Self> {
        Ok(Width::new(width)?.zero())
    }

    /// Store a signed number in two's complement, truncated to `width` bits
    pub fn from_signed(width: u32, value: i64) -> Result<Self> {
        Ok(Width::new(width)?.bits(value as u64))
    }

    pub fn width(&self) -> Width {
        self.width
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    /// Interpret the value as an N-bit two's complement number
    pub fn as_signed(&self) -> i64 {
        let shift = 64 - self.width.get();
        ((self.value << shift) as i64) >> shift
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0
    }

    /// Bit N-1, the sign bit under a signed interpretation
    pub fn msb(&self) -> bool {
        (self.value >> (self.width.get() - 1)) & 1 == 1
    }

    /// Replace the value, keeping the width
    pub fn with_value(&self, value: u64) -> Bits {
        self.width.bits(value)
    }

    pub fn test_bit(&self, index: u32) -> Result<bool> {
        self.check_index(index)?;
        Ok((self.value >> index) & 1 == 1)
    }

    /// Extract bit `index` as a 1-bit value
    pub fn bit(&self, index: u32) -> Result<Bits> {
        Ok(Bits::from(self.test_bit(index)?))
    }

    /// Bits `high` down to `low`, inclusive
    pub fn slice(&self, high: u32, low: u32) -> Result<Bits> {
        if high < low {
            return Err(BitsError::InvalidRange { high, low });
        }
        self.check_index(high)?;
        let width = Width::new(high - low + 1)?;
        Ok(width.bits(self.value >> low))
    }

    /// Zero-extend to `to` bits
    pub fn extend(&self, to: u32) -> Result<Bits> {
        let width = self.widened(to)?;
        Ok(width.bits(self.value))
    }

    /// Extend to `to` bits, replicating bit N-1 into the new high bits
    pub fn sign_extend(&self, to: u32) -> Result<Bits> {
        let width = self.widened(to)?;
        if self.msb() {
            Ok(width.bits(self.value | !self.width.mask()))
        } else {
            Ok(width.bits(self.value))
        }
    }

    /// Addition modulo `2^N`
    pub fn wrapping_add(self, rhs: Bits) -> Bits {
        self.carrying_add(rhs, false).0
    }

    /// Addition with a carry-in bit, modulo `2^N`
    pub fn add_with_carry(self, rhs: Bits, carry_in: bool) -> Bits {
        self.carrying_add(rhs, carry_in).0
    }

    /// Add with carry-in, returning the N-bit sum and the carry out of bit N-1
    ///
    /// Total for every width, including 64 bits where the N+1-bit form of
    /// [`Bits::add_carry_out`] cannot be represented.
    pub fn carrying_add(self, rhs: Bits, carry_in: bool) -> (Bits, bool) {
        let width = self.width.max(rhs.width);
        let sum = u128::from(self.value) + u128::from(rhs.value) + u128::from(carry_in);
        (width.bits(sum as u64), (sum >> width.get()) & 1 == 1)
    }

    /// Add in N+1-bit space; the top bit of the result is the carry
    pub fn add_carry_out(self, rhs: Bits, carry_in: bool) -> Result<Bits> {
        let width = self.width.max(rhs.width);
        let wide = Width::new(width.get() + 1)?;
        let lhs = self.extend(wide.get())?;
        let rhs = rhs.extend(wide.get())?;
        Ok(lhs.add_with_carry(rhs, carry_in))
    }

    /// `self` in the high bits, `low` below it
    pub fn concat(self, low: Bits) -> Result<Bits> {
        let width = Width::new(self.width.get() + low.width.get())?;
        Ok(width.bits((self.value << low.width.get()) | low.value))
    }

    /// Concatenate `parts`, most significant first
    pub fn concat_all(parts: &[Bits]) -> Result<Bits> {
        let (first, rest) = parts.split_first().ok_or(BitsError::InvalidWidth(0))?;
        rest.iter().try_fold(*first, |acc, part| acc.concat(*part))
    }

    fn check_index(&self, index: u32) -> Result<()> {
        if index < self.width.get() {
            Ok(())
        } else {
            Err(BitsError::IndexOutOfRange {
                index,
                width: self.width.get(),
            })
        }
    }

    fn widened(&self, to: u32) -> Result<Width> {
        let width = Width::new(to)?;
        if width < self.width {
            return Err(BitsError::Narrowing {
                from: self.width.get(),
                to,
            });
        }
        Ok(width)
    }

    fn zip(self, rhs: Bits, op: impl FnOnce(u64, u64) -> u64) -> Bits {
        self.width.max(rhs.width).bits(op(self.value, rhs.value))
    }
}

impl From<bool> for Bits {
    fn from(bit: bool) -> Self {
        Width::ONE.bits(u64::from(bit))
    }
}

impl PartialEq<u64> for Bits {
    fn eq(&self, other: &u64) -> bool {
        self.value == *other
    }
}

impl Not for Bits {
    type Output = Bits;

    fn not(self) -> Bits {
        self.width.bits(!self.value)
    }
}

impl Neg for Bits {
    type Output = Bits;

    /// Two's complement negation
    fn neg(self) -> Bits {
        self.width.bits(self.value.wrapping_neg())
    }
}

impl Add for Bits {
    type Output = Bits;

    fn add(self, rhs: Bits) -> Bits {
        self.wrapping_add(rhs)
    }
}

impl BitAnd for Bits {
    type Output = Bits;

    fn bitand(self, rhs: Bits) -> Bits {
        self.zip(rhs, |a, b| a & b)
    }
}

impl BitOr for Bits {
    type Output = Bits;

    fn bitor(self, rhs: Bits) -> Bits {
        self.zip(rhs, |a, b| a | b)
    }
}

impl BitXor for Bits {
    type Output = Bits;

    fn bitxor(self, rhs: Bits) -> Bits {
        self.zip(rhs, |a, b| a ^ b)
    }
}

impl fmt::Display for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.value)
    }
}

impl fmt::LowerHex for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.value, f)
    }
}

impl fmt::Binary for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Binary::fmt(&self.value, f)
    }
}
