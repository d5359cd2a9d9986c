//! The 32-bit value layer.
//!
//! A machine word is a pair of 16-bit halves, each bound to the halfword
//! range table. Additions and subtractions produce denormalized halves
//! that may exceed 16 bits; `normalize` recovers canonical halves and a
//! carry bit. Address decomposition splits the low half into alignment
//! bits and a range-checked word remainder.

use p3_field::{AbstractField, PrimeField32};

use crate::constraints::checker::{ConstraintChecker, StepError};
use crate::constraints::lookup::LookupLedger;
use crate::F;

/// A canonical 32-bit value: `low + high·2^16` with both halves in
/// `[0, 2^16)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct U32Val {
    pub low: F,
    pub high: F,
}

impl U32Val {
    /// A compile-time-known word; no range lookups are emitted since the
    /// halves are constants.
    pub fn from_u32(v: u32) -> Self {
        Self {
            low: F::from_canonical_u32(v & 0xFFFF),
            high: F::from_canonical_u32(v >> 16),
        }
    }

    /// Witness a word from an untrusted u32, emitting halfword lookups
    /// on both halves.
    pub fn register(
        checker: &mut ConstraintChecker,
        ledger: &mut LookupLedger,
        v: u32,
    ) -> Result<Self, StepError> {
        let val = Self::from_u32(v);
        ledger.half(checker, val.low)?;
        ledger.half(checker, val.high)?;
        Ok(val)
    }

    /// Canonical u32 of this word. Meaningful only when the halves are
    /// in range, which every constructor guarantees.
    pub fn to_u32(&self) -> u32 {
        self.low.as_canonical_u32() | (self.high.as_canonical_u32() << 16)
    }

    pub fn zero() -> Self {
        Self {
            low: F::zero(),
            high: F::zero(),
        }
    }
}

/// A possibly-overflowed pair of halves pending normalization.
#[derive(Clone, Copy, Debug)]
pub struct DenormU32 {
    pub low: F,
    pub high: F,
}

/// Denormalized sum `a + b`.
pub fn add_denorm(a: &U32Val, b: &U32Val) -> DenormU32 {
    DenormU32 {
        low: a.low + b.low,
        high: a.high + b.high,
    }
}

/// Denormalized difference `a − b`, biased by `+2^16 / +2^16−1` so both
/// halves stay nonnegative; after normalization the carry bit is 1
/// exactly when no borrow occurred (`a >= b` unsigned).
pub fn sub_denorm(a: &U32Val, b: &U32Val) -> DenormU32 {
    DenormU32 {
        low: a.low - b.low + F::from_canonical_u32(1 << 16),
        high: a.high - b.high + F::from_canonical_u32(0xFFFF),
    }
}

/// Normalize a denormalized value: witnesses canonical halves and carry
/// bits such that
///
/// ```text
/// d.low          == low  + c_low·2^16
/// d.high + c_low == high + carry·2^16
/// ```
///
/// with both halves halfword-checked and both carries boolean. Returns
/// the canonical value and the outgoing carry.
pub fn normalize(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    d: &DenormU32,
) -> Result<(U32Val, F), StepError> {
    let low_raw = d.low.as_canonical_u32();
    let c_low = F::from_canonical_u32(low_raw >> 16);
    let low = F::from_canonical_u32(low_raw & 0xFFFF);

    let high_raw = d.high.as_canonical_u32() + (low_raw >> 16);
    let carry = F::from_canonical_u32(high_raw >> 16);
    let high = F::from_canonical_u32(high_raw & 0xFFFF);

    checker.assert_bit("normalize_carry_low", c_low)?;
    checker.assert_bit("normalize_carry_high", carry)?;
    checker.assert_eq("normalize_low", d.low, low + c_low * F::from_canonical_u32(1 << 16))?;
    checker.assert_eq(
        "normalize_high",
        d.high + c_low,
        high + carry * F::from_canonical_u32(1 << 16),
    )?;
    ledger.half(checker, low)?;
    ledger.half(checker, high)?;

    Ok((U32Val { low, high }, carry))
}

/// Split a total at the 16-bit boundary: `t == out + carry·2^16` with the
/// output halfword-checked and the carry halfword-checked (carries from
/// byte-column sums stay well under 2^16).
pub fn split_total(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    label: &'static str,
    t: F,
) -> Result<(F, F), StepError> {
    let raw = t.as_canonical_u32();
    let out = F::from_canonical_u32(raw & 0xFFFF);
    let carry = F::from_canonical_u32(raw >> 16);
    checker.assert_eq(label, t, out + carry * F::from_canonical_u32(1 << 16))?;
    ledger.half(checker, out)?;
    ledger.half(checker, carry)?;
    Ok((out, carry))
}

/// Split variant whose carry is a twit (borrow-compensated subtraction
/// slices carry at most 2).
pub fn split_total_twit(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    label: &'static str,
    t: F,
) -> Result<(F, F), StepError> {
    let raw = t.as_canonical_u32();
    let out = F::from_canonical_u32(raw & 0xFFFF);
    let carry = F::from_canonical_u32(raw >> 16);
    checker.assert_eq(label, t, out + carry * F::from_canonical_u32(1 << 16))?;
    checker.assert_twit(label, carry)?;
    ledger.half(checker, out)?;
    Ok((out, carry))
}

/// A byte address split into a word address and alignment bits:
/// `addr.low == rem·4 + a1·2 + a0`, `word == rem + high·2^14`, with the
/// 14-bit remainder checked by looking up `rem·4` in the halfword table.
#[derive(Clone, Copy, Debug)]
pub struct AddrSplit {
    /// Word address, a single field element below 2^30.
    pub word: F,
    /// Low alignment bit (byte within halfword).
    pub a0: F,
    /// High alignment bit (halfword within word).
    pub a1: F,
}

pub fn split_addr(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    addr: &U32Val,
) -> Result<AddrSplit, StepError> {
    let low_raw = addr.low.as_canonical_u32();
    let a0 = F::from_canonical_u32(low_raw & 1);
    let a1 = F::from_canonical_u32((low_raw >> 1) & 1);
    let rem = F::from_canonical_u32(low_raw >> 2);

    checker.assert_bit("addr_align_a0", a0)?;
    checker.assert_bit("addr_align_a1", a1)?;
    checker.assert_eq(
        "addr_split_low",
        addr.low,
        rem * F::from_canonical_u32(4) + a1 * F::two() + a0,
    )?;
    // rem < 2^14 via the doubled-up halfword lookup.
    ledger.half(checker, rem * F::from_canonical_u32(4))?;

    let word = rem + addr.high * F::from_canonical_u32(1 << 14);
    Ok(AddrSplit { word, a0, a1 })
}
