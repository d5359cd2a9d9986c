//! Bit-level witness primitives.
//!
//! Decompositions witness the bits of a value and bind them with a
//! reassembly equality; the boolean/twit identities live on the checker.

use p3_field::{AbstractField, PrimeField32};

use crate::constraints::checker::{ConstraintChecker, StepError};
use crate::F;

/// Witness the low `n` bits of `v` and assert `v == Σ bits_i·2^i`.
/// Fails if `v` does not fit in `n` bits.
pub fn decompose_bits(
    checker: &mut ConstraintChecker,
    label: &'static str,
    v: F,
    n: usize,
) -> Result<Vec<F>, StepError> {
    let raw = v.as_canonical_u32();
    let mut bits = Vec::with_capacity(n);
    let mut sum = F::zero();
    for i in 0..n {
        let bit = F::from_canonical_u32((raw >> i) & 1);
        checker.assert_bit(label, bit)?;
        sum += bit * F::from_canonical_u32(1 << i);
        bits.push(bit);
    }
    checker.assert_eq(label, v, sum)?;
    Ok(bits)
}

/// `b·x + (1−b)·y` for a boolean selector `b`.
#[inline]
pub fn select(b: F, x: F, y: F) -> F {
    b * x + (F::one() - b) * y
}

/// Boolean XOR: `a + b − 2ab`.
#[inline]
pub fn bit_xor(a: F, b: F) -> F {
    a + b - F::two() * a * b
}

/// Boolean AND.
#[inline]
pub fn bit_and(a: F, b: F) -> F {
    a * b
}

/// Boolean NOT.
#[inline]
pub fn bit_not(a: F) -> F {
    F::one() - a
}

/// Witness a one-hot vector of length `n` selecting `index`, asserting
/// booleanity, `Σ onehot == 1`, and `Σ i·onehot_i == index_value`.
pub fn onehot(
    checker: &mut ConstraintChecker,
    label: &'static str,
    index: usize,
    index_value: F,
    n: usize,
) -> Result<Vec<F>, StepError> {
    let mut flags = Vec::with_capacity(n);
    let mut sum = F::zero();
    let mut weighted = F::zero();
    for i in 0..n {
        let flag = if i == index { F::one() } else { F::zero() };
        checker.assert_bit(label, flag)?;
        sum += flag;
        weighted += flag * F::from_canonical_u32(i as u32);
        flags.push(flag);
    }
    checker.assert_eq(label, sum, F::one())?;
    checker.assert_eq(label, weighted, index_value)?;
    Ok(flags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decompose_round_trips() {
        let mut c = ConstraintChecker::new(0);
        let bits = decompose_bits(&mut c, "bits", F::from_canonical_u32(0b1011_0010), 8).unwrap();
        assert_eq!(bits.len(), 8);
        assert_eq!(bits[1], F::one());
        assert_eq!(bits[0], F::zero());
        assert_eq!(bits[7], F::one());
    }

    #[test]
    fn decompose_rejects_oversized() {
        let mut c = ConstraintChecker::new(0);
        assert!(decompose_bits(&mut c, "bits", F::from_canonical_u32(256), 8).is_err());
    }

    #[test]
    fn xor_matches_boolean_truth_table() {
        for a in 0..2u32 {
            for b in 0..2u32 {
                let got = bit_xor(F::from_canonical_u32(a), F::from_canonical_u32(b));
                assert_eq!(got, F::from_canonical_u32(a ^ b));
            }
        }
    }

    #[test]
    fn onehot_binds_index() {
        let mut c = ConstraintChecker::new(0);
        let flags = onehot(&mut c, "oh", 5, F::from_canonical_u32(5), 8).unwrap();
        assert_eq!(flags[5], F::one());
        assert_eq!(flags.iter().filter(|f| **f == F::one()).count(), 1);
        // A mismatched index value trips the weighted-sum binding.
        assert!(onehot(&mut c, "oh", 5, F::from_canonical_u32(4), 8).is_err());
    }
}
