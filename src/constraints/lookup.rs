//! Lookup bookkeeping: challenges, table kinds, and the per-row ledger.
//!
//! Every lookup argument in the circuit (byte/halfword range checks,
//! cycle-difference checks, the memory permutation) is the same
//! shape: a keyed event with a signed count, folded into the accumulator
//! as `count / (z·key + offset)` in the extension field. The ledger
//! records each event in emission order; `accum` does the folding.

use p3_field::{AbstractExtensionField, AbstractField};

use crate::constraints::checker::{ConstraintChecker, StepError};
use crate::constraints::word::U32Val;
use crate::oracle::LookupWidth;
use crate::{ext, Ext, F};

/// Which lookup table an event belongs to. The offset constant
/// domain-separates the tables inside the shared rational accumulator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableKind {
    Byte,
    Half,
    CycleDiff,
    Memory,
}

impl TableKind {
    /// Per-table denominator offset.
    pub fn offset(self) -> F {
        match self {
            TableKind::Byte => F::one(),
            TableKind::Half => F::two(),
            TableKind::CycleDiff => F::from_canonical_u32(3),
            TableKind::Memory => F::from_canonical_u32(4),
        }
    }
}

/// Verifier-supplied random challenges.
///
/// `z` keys the rational denominators, `alpha` compresses the memory
/// record fields, `beta` drives the sponge digest check accumulator and
/// the shift-polynomial length check.
#[derive(Clone, Copy, Debug)]
pub struct LookupChallenges {
    pub z: Ext,
    pub alpha: Ext,
    pub beta: Ext,
}

impl LookupChallenges {
    /// Explicit challenge values, as sampled by the verifier after the
    /// main trace is committed.
    pub fn new(z: Ext, alpha: Ext, beta: Ext) -> Self {
        Self { z, alpha, beta }
    }

    /// Fixed values for witness checking outside a proving session.
    ///
    /// These are NOT verifier randomness; a proof must use challenges
    /// sampled from the transcript. They are chosen away from the small
    /// integers every key ranges over so self-checks never divide by
    /// zero by accident.
    pub fn deterministic() -> Self {
        let gen = |a: u32, b: u32, c: u32, d: u32| {
            Ext::from_base_fn(|i| match i {
                0 => F::from_canonical_u32(a),
                1 => F::from_canonical_u32(b),
                2 => F::from_canonical_u32(c),
                _ => F::from_canonical_u32(d),
            })
        };
        Self {
            z: gen(0x1234_5677, 0x0BAD_CAFE, 0x0DDB_A11, 0x0C0F_FEE0),
            alpha: gen(0x0765_4321, 0x0ACE_0FBA, 0x0123_4321, 0x0F00_DFED),
            beta: gen(0x05EA_F00D, 0x0B0B_A5E2, 0x0917_AB1E, 0x0123_9876),
        }
    }
}

/// One keyed lookup event.
#[derive(Clone, Copy, Debug)]
pub struct LookupTerm {
    pub table: TableKind,
    pub key: Ext,
    pub count: F,
}

/// Per-row record of all lookup events, in emission order.
///
/// Scalar queries (byte/half/cycle-diff) are also retained as plain
/// integers so the driver can notify the oracle's multiplicity ledger.
#[derive(Debug)]
pub struct LookupLedger {
    challenges: LookupChallenges,
    alpha2: Ext,
    alpha3: Ext,
    terms: Vec<LookupTerm>,
    scalar_queries: Vec<(LookupWidth, u32)>,
}

impl LookupLedger {
    pub fn new(challenges: LookupChallenges) -> Self {
        let alpha2 = challenges.alpha * challenges.alpha;
        let alpha3 = alpha2 * challenges.alpha;
        Self {
            challenges,
            alpha2,
            alpha3,
            terms: Vec::new(),
            scalar_queries: Vec::new(),
        }
    }

    pub fn challenges(&self) -> &LookupChallenges {
        &self.challenges
    }

    pub fn terms(&self) -> &[LookupTerm] {
        &self.terms
    }

    pub fn scalar_queries(&self) -> &[(LookupWidth, u32)] {
        &self.scalar_queries
    }

    fn scalar_query(
        &mut self,
        checker: &mut ConstraintChecker,
        table: TableKind,
        width: LookupWidth,
        bound: u32,
        label: &'static str,
        v: F,
    ) -> Result<(), StepError> {
        // The multiplicity table only holds [0, bound); a query outside it
        // can never be matched, which concretely is a range violation.
        let raw = p3_field::PrimeField32::as_canonical_u32(&v);
        if raw >= bound {
            return Err(StepError::Constraint {
                cycle: checker.cycle(),
                label,
                values: vec![raw],
            });
        }
        self.terms.push(LookupTerm {
            table,
            key: ext(v),
            count: F::one(),
        });
        self.scalar_queries.push((width, raw));
        Ok(())
    }

    /// Query the byte table: asserts `v ∈ [0, 2^8)`.
    pub fn byte(&mut self, checker: &mut ConstraintChecker, v: F) -> Result<(), StepError> {
        self.scalar_query(checker, TableKind::Byte, LookupWidth::Byte, 1 << 8, "byte_range", v)
    }

    /// Query the halfword table: asserts `v ∈ [0, 2^16)`.
    pub fn half(&mut self, checker: &mut ConstraintChecker, v: F) -> Result<(), StepError> {
        self.scalar_query(checker, TableKind::Half, LookupWidth::Half, 1 << 16, "half_range", v)
    }

    /// Query the cycle-difference table: asserts `v ∈ [0, 2^16)`.
    pub fn cycle_diff(&mut self, checker: &mut ConstraintChecker, v: F) -> Result<(), StepError> {
        self.scalar_query(
            checker,
            TableKind::CycleDiff,
            LookupWidth::CycleDiff,
            1 << 16,
            "cycle_diff_range",
            v,
        )
    }

    /// Compressed key of a memory record: `addr + α·cycle + α²·low + α³·high`.
    pub fn memory_key(&self, addr: F, cycle: F, data: &U32Val) -> Ext {
        ext(addr)
            + self.challenges.alpha * ext(cycle)
            + self.alpha2 * ext(data.low)
            + self.alpha3 * ext(data.high)
    }

    /// Fold a memory record in with the given signed count
    /// (+1 insertion, −1 removal).
    pub fn memory(&mut self, addr: F, cycle: F, data: &U32Val, count: F) {
        let key = self.memory_key(addr, cycle, data);
        self.terms.push(LookupTerm {
            table: TableKind::Memory,
            key,
            count,
        });
    }

    /// Table-side entry of a scalar table with multiplicity `m`
    /// (count −m, cancelling `m` queries of `value`).
    pub fn table_side(&mut self, table: TableKind, value: F, m: F) {
        self.terms.push(LookupTerm {
            table,
            key: ext(value),
            count: -m,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_query_rejects_out_of_range() {
        let mut checker = ConstraintChecker::new(0);
        let mut ledger = LookupLedger::new(LookupChallenges::deterministic());
        assert!(ledger.byte(&mut checker, F::from_canonical_u32(255)).is_ok());
        assert!(ledger.byte(&mut checker, F::from_canonical_u32(256)).is_err());
        assert_eq!(ledger.terms().len(), 1);
    }

    #[test]
    fn half_query_accepts_full_range() {
        let mut checker = ConstraintChecker::new(0);
        let mut ledger = LookupLedger::new(LookupChallenges::deterministic());
        assert!(ledger.half(&mut checker, F::from_canonical_u32(0xFFFF)).is_ok());
        assert!(ledger.half(&mut checker, F::from_canonical_u32(0x10000)).is_err());
    }

    #[test]
    fn memory_key_separates_fields() {
        let ledger = LookupLedger::new(LookupChallenges::deterministic());
        let data = U32Val::from_u32(0xDEAD_BEEF);
        let k1 = ledger.memory_key(F::from_canonical_u32(10), F::from_canonical_u32(7), &data);
        let k2 = ledger.memory_key(F::from_canonical_u32(7), F::from_canonical_u32(10), &data);
        assert_ne!(k1, k2);
    }

    #[test]
    fn scalar_queries_recorded_for_oracle() {
        let mut checker = ConstraintChecker::new(0);
        let mut ledger = LookupLedger::new(LookupChallenges::deterministic());
        ledger.byte(&mut checker, F::from_canonical_u32(9)).unwrap();
        ledger.half(&mut checker, F::from_canonical_u32(900)).unwrap();
        assert_eq!(
            ledger.scalar_queries(),
            &[(LookupWidth::Byte, 9), (LookupWidth::Half, 900)]
        );
    }
}
