//! Goldilocks field elements.
//!
//! Every instruction argument is embedded into this field before it is hashed. The embedding
//! is part of the wire contract with the venue: changing it changes every digest.

use thiserror::Error;

/// The Goldilocks prime, `2^64 - 2^32 + 1`.
pub const MODULUS: u64 = 0xFFFF_FFFF_0000_0001;

/// Number of bytes in the little-endian encoding of an [Element].
pub const ELEMENT_BYTES: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("limb {index} is not a canonical field element")]
    NonCanonical { index: usize },
}

/// A field element, always stored as its canonical representative in `[0, MODULUS)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Element(u64);

impl Element {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(1);

    pub fn from_u32(value: u32) -> Self {
        Self(value as u64)
    }

    pub fn from_u64(value: u64) -> Self {
        // value < 2^64 < 2 * MODULUS, so one subtraction is enough.
        if value >= MODULUS {
            Self(value - MODULUS)
        } else {
            Self(value)
        }
    }

    /// Reinterprets the two's-complement bits as `u64`, then reduces. `-1` is `2^32 - 2`.
    pub fn from_i64(value: i64) -> Self {
        Self::from_u64(value as u64)
    }

    /// Returns `None` unless `value` is already reduced.
    pub fn from_canonical_u64(value: u64) -> Option<Self> {
        (value < MODULUS).then_some(Self(value))
    }

    pub fn value(self) -> u64 {
        self.0
    }

    pub fn to_le_bytes(self) -> [u8; ELEMENT_BYTES] {
        self.0.to_le_bytes()
    }
}

impl From<u32> for Element {
    fn from(value: u32) -> Self {
        Self::from_u32(value)
    }
}

impl From<i64> for Element {
    fn from(value: i64) -> Self {
        Self::from_i64(value)
    }
}

/// Splits `bytes` into 8-byte little-endian limbs (zero-padding the last one) and requires
/// each limb to be canonical.
pub fn elements_from_canonical_le_bytes(bytes: &[u8]) -> Result<Vec<Element>, FieldError> {
    bytes
        .chunks(ELEMENT_BYTES)
        .enumerate()
        .map(|(index, chunk)| {
            let mut limb = [0u8; ELEMENT_BYTES];
            limb[..chunk.len()].copy_from_slice(chunk);
            Element::from_canonical_u64(u64::from_le_bytes(limb))
                .ok_or(FieldError::NonCanonical { index })
        })
        .collect()
}
