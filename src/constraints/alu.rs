//! ALU, comparison, and bitwise operations.
//!
//! Addition and subtraction go through the denormalized-sum/normalize
//! path; unsigned comparison reads the borrow off a biased subtraction;
//! signed comparison extracts sign bits and combines them with the
//! unsigned result by the XOR formula. AND is a per-bit product over the
//! decomposed halves; OR and XOR derive from AND.

use p3_field::AbstractField;

use crate::constraints::bits::{bit_xor, decompose_bits};
use crate::constraints::checker::{ConstraintChecker, StepError};
use crate::constraints::lookup::LookupLedger;
use crate::constraints::word::{add_denorm, normalize, sub_denorm, U32Val};
use crate::F;

/// `a + b` with the overflow carry.
pub fn add(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    a: &U32Val,
    b: &U32Val,
) -> Result<(U32Val, F), StepError> {
    normalize(checker, ledger, &add_denorm(a, b))
}

/// `a − b` (wrapping) with the no-borrow carry: carry is 1 exactly when
/// `a >= b` unsigned.
pub fn sub(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    a: &U32Val,
    b: &U32Val,
) -> Result<(U32Val, F), StepError> {
    normalize(checker, ledger, &sub_denorm(a, b))
}

/// Unsigned `a < b`: `1 − carry` of the biased subtraction.
pub fn lt_unsigned(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    a: &U32Val,
    b: &U32Val,
) -> Result<F, StepError> {
    let (_, carry) = sub(checker, ledger, a, b)?;
    Ok(F::one() - carry)
}

/// Sign bit of a word: splits the high half as `s·0x8000 + rest`, with
/// the 15-bit rest checked through the doubled halfword lookup.
pub fn sign_bit(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    v: &U32Val,
) -> Result<F, StepError> {
    let raw = p3_field::PrimeField32::as_canonical_u32(&v.high);
    let s = F::from_canonical_u32(raw >> 15);
    let rest = F::from_canonical_u32(raw & 0x7FFF);
    checker.assert_bit("sign_bit", s)?;
    checker.assert_eq("sign_split", v.high, s * F::from_canonical_u32(0x8000) + rest)?;
    ledger.half(checker, rest * F::two())?;
    Ok(s)
}

/// Signed `a < b`: `ltu(a, b) ⊕ sign(a) ⊕ sign(b)`.
pub fn lt_signed(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    a: &U32Val,
    b: &U32Val,
) -> Result<F, StepError> {
    let sa = sign_bit(checker, ledger, a)?;
    let sb = sign_bit(checker, ledger, b)?;
    let ltu = lt_unsigned(checker, ledger, a, b)?;
    Ok(bit_xor(bit_xor(ltu, sa), sb))
}

/// Zero flag of a field element: witnesses `z` and an inverse such that
/// `v·inv == 1 − z` and `z·v == 0`.
pub fn is_zero(checker: &mut ConstraintChecker, v: F) -> Result<F, StepError> {
    let (z, inv) = match p3_field::Field::try_inverse(&v) {
        Some(inv) => (F::zero(), inv),
        None => (F::one(), F::zero()),
    };
    checker.assert_bit("is_zero_flag", z)?;
    checker.assert_eq("is_zero_inverse", v * inv, F::one() - z)?;
    checker.assert_zero("is_zero_product", z * v)?;
    Ok(z)
}

/// Word equality flag.
pub fn eq(
    checker: &mut ConstraintChecker,
    a: &U32Val,
    b: &U32Val,
) -> Result<F, StepError> {
    let z_low = is_zero(checker, a.low - b.low)?;
    let z_high = is_zero(checker, a.high - b.high)?;
    Ok(z_low * z_high)
}

fn half_and(
    checker: &mut ConstraintChecker,
    label: &'static str,
    a: F,
    b: F,
) -> Result<F, StepError> {
    let a_bits = decompose_bits(checker, label, a, 16)?;
    let b_bits = decompose_bits(checker, label, b, 16)?;
    let mut out = F::zero();
    for i in 0..16 {
        out += a_bits[i] * b_bits[i] * F::from_canonical_u32(1 << i);
    }
    Ok(out)
}

/// Bitwise AND via per-bit decomposition of both halves.
pub fn and(
    checker: &mut ConstraintChecker,
    a: &U32Val,
    b: &U32Val,
) -> Result<U32Val, StepError> {
    Ok(U32Val {
        low: half_and(checker, "and_low", a.low, b.low)?,
        high: half_and(checker, "and_high", a.high, b.high)?,
    })
}

/// Bitwise OR: `a + b − (a & b)` per half.
pub fn or(
    checker: &mut ConstraintChecker,
    a: &U32Val,
    b: &U32Val,
) -> Result<U32Val, StepError> {
    let anded = and(checker, a, b)?;
    Ok(U32Val {
        low: a.low + b.low - anded.low,
        high: a.high + b.high - anded.high,
    })
}

/// Bitwise XOR: `a + b − 2·(a & b)` per half.
pub fn xor(
    checker: &mut ConstraintChecker,
    a: &U32Val,
    b: &U32Val,
) -> Result<U32Val, StepError> {
    let anded = and(checker, a, b)?;
    Ok(U32Val {
        low: a.low + b.low - F::two() * anded.low,
        high: a.high + b.high - F::two() * anded.high,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::lookup::LookupChallenges;

    fn ctx() -> (ConstraintChecker, LookupLedger) {
        (
            ConstraintChecker::new(0),
            LookupLedger::new(LookupChallenges::deterministic()),
        )
    }

    fn v(x: u32) -> U32Val {
        U32Val::from_u32(x)
    }

    #[test]
    fn lt_unsigned_table() {
        let cases = [
            (0u32, 1u32, 1u32),
            (1, 0, 0),
            (5, 5, 0),
            (0xFFFF_FFFF, 0, 0),
            (0, 0xFFFF_FFFF, 1),
            (0x8000_0000, 0x7FFF_FFFF, 0),
        ];
        for (a, b, want) in cases {
            let (mut checker, mut ledger) = ctx();
            let got = lt_unsigned(&mut checker, &mut ledger, &v(a), &v(b)).unwrap();
            assert_eq!(got, F::from_canonical_u32(want), "{a} < {b}");
        }
    }

    #[test]
    fn lt_signed_table() {
        let cases = [
            (-1i32, 1i32, 1u32),
            (1, -1, 0),
            (-2, -1, 1),
            (-1, -2, 0),
            (i32::MIN, i32::MAX, 1),
            (i32::MAX, i32::MIN, 0),
            (0, 0, 0),
        ];
        for (a, b, want) in cases {
            let (mut checker, mut ledger) = ctx();
            let got = lt_signed(&mut checker, &mut ledger, &v(a as u32), &v(b as u32)).unwrap();
            assert_eq!(got, F::from_canonical_u32(want), "{a} <s {b}");
        }
    }

    #[test]
    fn eq_flag() {
        let (mut checker, _) = ctx();
        assert_eq!(eq(&mut checker, &v(42), &v(42)).unwrap(), F::one());
        assert_eq!(eq(&mut checker, &v(42), &v(43)).unwrap(), F::zero());
        assert_eq!(eq(&mut checker, &v(0x10000), &v(0)).unwrap(), F::zero());
    }

    #[test]
    fn bitwise_ops_match_u32_semantics() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand::rngs::StdRng::seed_from_u64(23);
        for _ in 0..50 {
            let a: u32 = rng.gen();
            let b: u32 = rng.gen();
            let (mut checker, _) = ctx();
            assert_eq!(and(&mut checker, &v(a), &v(b)).unwrap().to_u32(), a & b);
            assert_eq!(or(&mut checker, &v(a), &v(b)).unwrap().to_u32(), a | b);
            assert_eq!(xor(&mut checker, &v(a), &v(b)).unwrap().to_u32(), a ^ b);
        }
    }

    #[test]
    fn sign_bit_reads_top_bit() {
        let (mut checker, mut ledger) = ctx();
        assert_eq!(sign_bit(&mut checker, &mut ledger, &v(0x7FFF_FFFF)).unwrap(), F::zero());
        assert_eq!(sign_bit(&mut checker, &mut ledger, &v(0x8000_0000)).unwrap(), F::one());
    }
}
