//! Trailing-zero pattern matching over hex identifiers, and the difficulty
//! arithmetic that goes with it.

use serde::{Deserialize, Serialize};

use crate::error::PatternError;

/// Smallest target the matcher accepts.
pub const MIN_TARGET_BITS: u32 = 1;

/// Largest target the matcher accepts.
pub const MAX_TARGET_BITS: u32 = 64;

/// Value of a single hex digit, or `None` if `c` is not hex.
#[inline]
fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Count trailing zero bits of a hex string, `None` if it is empty or not hex.
///
/// Each hex digit contributes four bits; the least-significant end of the
/// string is the last character.
fn trailing_zeros_checked(identifier_hex: &str) -> Option<u32> {
    let bytes = identifier_hex.as_bytes();
    if bytes.is_empty() {
        return None;
    }

    let mut zeros = 0u32;
    let mut counting = true;
    for &c in bytes.iter().rev() {
        let value = nibble(c)?;
        if counting {
            if value == 0 {
                zeros += 4;
            } else {
                zeros += value.trailing_zeros();
                counting = false;
            }
        }
    }
    Some(zeros)
}

/// Length in consecutive zero bits of the least-significant end of
/// `identifier_hex`. Returns 0 for malformed input.
pub fn trailing_zero_run(identifier_hex: &str) -> u32 {
    trailing_zeros_checked(identifier_hex).unwrap_or(0)
}

/// Whether the binary expansion of `identifier_hex` ends in at least
/// `trailing_zero_bits` zero bits.
///
/// Invalid hex, a bit count outside `1..=64`, or an identifier with fewer
/// bits than requested all yield `false`.
pub fn matches(identifier_hex: &str, trailing_zero_bits: u32) -> bool {
    if !(MIN_TARGET_BITS..=MAX_TARGET_BITS).contains(&trailing_zero_bits) {
        return false;
    }
    if identifier_hex.len().saturating_mul(4) < trailing_zero_bits as usize {
        return false;
    }
    match trailing_zeros_checked(identifier_hex) {
        Some(zeros) => zeros >= trailing_zero_bits,
        None => false,
    }
}

/// A validated trailing-zero mining target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct PatternTarget {
    trailing_zero_bits: u32,
}

impl PatternTarget {
    /// Create a target of `trailing_zero_bits` in `1..=64`.
    pub fn new(trailing_zero_bits: u32) -> Result<Self, PatternError> {
        if !(MIN_TARGET_BITS..=MAX_TARGET_BITS).contains(&trailing_zero_bits) {
            return Err(PatternError::BitsOutOfRange(trailing_zero_bits));
        }
        Ok(PatternTarget { trailing_zero_bits })
    }

    pub fn trailing_zero_bits(&self) -> u32 {
        self.trailing_zero_bits
    }

    /// Does `identifier_hex` satisfy this target?
    #[inline]
    pub fn is_met_by(&self, identifier_hex: &str) -> bool {
        matches(identifier_hex, self.trailing_zero_bits)
    }

    /// Does a zero run of `zeros` bits, as counted by [`trailing_zero_run`],
    /// satisfy this target?
    #[inline]
    pub fn is_met_by_run(&self, zeros: u32) -> bool {
        zeros >= self.trailing_zero_bits
    }

    /// Expected number of attempts to hit the target: `2^n`.
    pub fn expected_attempts(&self) -> u128 {
        1u128 << self.trailing_zero_bits
    }

    /// Attempts spent relative to the expectation. 1.0 is average luck.
    pub fn efficiency(&self, attempts: u64) -> f64 {
        attempts as f64 / self.expected_attempts() as f64
    }

    /// Candidates per batch, growing with difficulty so that cheap targets
    /// stay responsive and hard ones amortise the per-batch bookkeeping.
    pub fn batch_size(&self) -> u64 {
        match self.trailing_zero_bits {
            0..=4 => 100,
            5..=8 => 1_000,
            _ => 5_000,
        }
    }
}

impl TryFrom<u32> for PatternTarget {
    type Error = PatternError;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        PatternTarget::new(bits)
    }
}

impl From<PatternTarget> for u32 {
    fn from(target: PatternTarget) -> u32 {
        target.trailing_zero_bits
    }
}
