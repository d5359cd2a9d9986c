//! The constraint sink.
//!
//! Every zero-equality assertion the circuit emits flows through
//! [`ConstraintChecker`]. In proving, these identities become polynomial
//! constraints; here they are evaluated concretely, and the first nonzero
//! residue aborts the row with enough context (cycle, assertion label,
//! operand values) to diagnose a bad witness.

use p3_field::{AbstractField, PrimeField32};
use thiserror::Error;

use crate::{Ext, F};

/// Errors produced by constraint evaluation. There is one fatal family:
/// a violated zero-equality. Exhaustiveness violations (an arm marked
/// unreachable) are modeled the same way.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error("constraint `{label}` violated at cycle {cycle}: operands {values:?}")]
    Constraint {
        cycle: u32,
        label: &'static str,
        values: Vec<u32>,
    },

    #[error("extension constraint `{label}` violated at cycle {cycle}")]
    ConstraintExt { cycle: u32, label: &'static str },

    #[error("illegal dispatch at cycle {cycle}: major {major}, minor {minor}")]
    IllegalDispatch { cycle: u32, major: u8, minor: u8 },

    #[error("unreachable arm `{label}` reached at cycle {cycle}")]
    Unreachable { cycle: u32, label: &'static str },
}

/// Collects constraint checks for one row.
#[derive(Debug)]
pub struct ConstraintChecker {
    cycle: u32,
    emitted: usize,
}

impl ConstraintChecker {
    pub fn new(cycle: u32) -> Self {
        Self { cycle, emitted: 0 }
    }

    /// The machine cycle this row belongs to.
    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    /// Number of constraints evaluated so far on this row.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Assert `v == 0`.
    pub fn assert_zero(&mut self, label: &'static str, v: F) -> Result<(), StepError> {
        self.emitted += 1;
        if v != F::zero() {
            return Err(StepError::Constraint {
                cycle: self.cycle,
                label,
                values: vec![v.as_canonical_u32()],
            });
        }
        Ok(())
    }

    /// Assert `a == b`.
    pub fn assert_eq(&mut self, label: &'static str, a: F, b: F) -> Result<(), StepError> {
        self.emitted += 1;
        if a != b {
            return Err(StepError::Constraint {
                cycle: self.cycle,
                label,
                values: vec![a.as_canonical_u32(), b.as_canonical_u32()],
            });
        }
        Ok(())
    }

    /// Assert `v ∈ {0, 1}` via `v·(v−1) == 0`.
    pub fn assert_bit(&mut self, label: &'static str, v: F) -> Result<(), StepError> {
        self.assert_zero(label, v * (v - F::one()))
    }

    /// Assert `v ∈ {0, 1, 2, 3}` via `v·(v−1)·(v−2)·(v−3) == 0`.
    pub fn assert_twit(&mut self, label: &'static str, v: F) -> Result<(), StepError> {
        let poly = v * (v - F::one()) * (v - F::two()) * (v - F::from_canonical_u32(3));
        self.assert_zero(label, poly)
    }

    /// Assert `v == 0` in the extension field.
    pub fn assert_zero_ext(&mut self, label: &'static str, v: Ext) -> Result<(), StepError> {
        self.emitted += 1;
        if v != Ext::zero() {
            return Err(StepError::ConstraintExt {
                cycle: self.cycle,
                label,
            });
        }
        Ok(())
    }

    /// Assert `a == b` in the extension field.
    pub fn assert_eq_ext(&mut self, label: &'static str, a: Ext, b: Ext) -> Result<(), StepError> {
        self.emitted += 1;
        if a != b {
            return Err(StepError::ConstraintExt {
                cycle: self.cycle,
                label,
            });
        }
        Ok(())
    }

    /// An arm that must never be selected; asserting a nonzero constant
    /// equals zero, so reaching it always invalidates the row.
    pub fn unreachable_arm(&mut self, label: &'static str) -> StepError {
        self.emitted += 1;
        StepError::Unreachable {
            cycle: self.cycle,
            label,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_identity_accepts_zero_and_one() {
        let mut c = ConstraintChecker::new(0);
        assert!(c.assert_bit("b", F::zero()).is_ok());
        assert!(c.assert_bit("b", F::one()).is_ok());
        assert!(c.assert_bit("b", F::two()).is_err());
    }

    #[test]
    fn twit_identity_accepts_zero_through_three() {
        let mut c = ConstraintChecker::new(0);
        for v in 0..4 {
            assert!(c.assert_twit("t", F::from_canonical_u32(v)).is_ok());
        }
        assert!(c.assert_twit("t", F::from_canonical_u32(4)).is_err());
    }

    #[test]
    fn violation_carries_context() {
        let mut c = ConstraintChecker::new(17);
        let err = c.assert_eq("mismatch", F::from_canonical_u32(5), F::from_canonical_u32(6)).unwrap_err();
        match err {
            StepError::Constraint { cycle, label, values } => {
                assert_eq!(cycle, 17);
                assert_eq!(label, "mismatch");
                assert_eq!(values, vec![5, 6]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn emitted_counts_every_check() {
        let mut c = ConstraintChecker::new(0);
        c.assert_zero("a", F::zero()).unwrap();
        c.assert_eq("b", F::one(), F::one()).unwrap();
        c.assert_bit("c", F::one()).unwrap();
        assert_eq!(c.emitted(), 3);
    }
}
