//! Accumulator folding.
//!
//! Every lookup event of the row becomes a rational contribution
//! `count / (z·key + offset)` in the extension field. The division is
//! realized without a division gate: the inverse is witnessed and bound
//! by `inv·denom == 1`, and the partial sums are threaded through the
//! telescoping identity `(s_i − s_{i−1})·denom_i == count_i`. The row
//! total is added to the running column, and the closing equation
//! reconciles the recomputed total with the exposed accumulator cell.

use p3_field::{Field, AbstractField};
use tracing::trace;

use crate::constraints::checker::{ConstraintChecker, StepError};
use crate::constraints::lookup::{LookupChallenges, LookupLedger, LookupTerm, TableKind};
use crate::{ext, Ext, F};

/// The rational contribution of a single lookup event, if the
/// denominator does not vanish (it cannot for honest challenges).
pub fn contribution(
    challenges: &LookupChallenges,
    table: TableKind,
    key: Ext,
    count: F,
) -> Option<Ext> {
    let denom = challenges.z * key + ext(table.offset());
    denom.try_inverse().map(|inv| ext(count) * inv)
}

/// The running accumulator column, updated once per row.
#[derive(Clone, Copy, Debug)]
pub struct Accumulator {
    total: Ext,
}

impl Accumulator {
    /// Start from the value carried in from the previous row.
    pub fn new(carried_in: Ext) -> Self {
        Self { total: carried_in }
    }

    pub fn total(&self) -> Ext {
        self.total
    }

    /// Fold every term of the row's ledger into the running total;
    /// returns the row sum.
    pub fn fold_row(
        &mut self,
        checker: &mut ConstraintChecker,
        ledger: &LookupLedger,
    ) -> Result<Ext, StepError> {
        let challenges = ledger.challenges();
        let mut sum = Ext::zero();
        for term in ledger.terms() {
            sum = fold_term(checker, challenges, sum, term)?;
        }
        self.total += sum;
        trace!(terms = ledger.terms().len(), "folded row lookups");
        Ok(sum)
    }

    /// The closing equation: the carried-out value must equal the
    /// exposed accumulator cell the next row carries in.
    pub fn close(
        &self,
        checker: &mut ConstraintChecker,
        exposed: Ext,
    ) -> Result<(), StepError> {
        checker.assert_eq_ext("accum_close", self.total, exposed)
    }
}

/// Register the table sides of the scalar lookups: for every value with
/// a nonzero multiplicity, a `−m` entry cancels the `m` queries folded
/// during the trace, and the oracle's ledger is drained accordingly.
/// Belongs on the closing row, after every query row has been folded.
pub fn fold_scalar_table_sides<O: crate::oracle::Oracle>(
    ledger: &mut LookupLedger,
    oracle: &mut O,
) {
    use crate::oracle::LookupWidth;

    for v in 0..1u32 << 8 {
        let m = oracle.lookup_current(LookupWidth::Byte, v);
        if m != 0 {
            ledger.table_side(TableKind::Byte, F::from_canonical_u32(v), F::from_canonical_u32(m));
            oracle.lookup_delta(LookupWidth::Byte, v, -(m as i32));
        }
    }
    for v in 0..1u32 << 16 {
        let m = oracle.lookup_current(LookupWidth::Half, v);
        if m != 0 {
            ledger.table_side(TableKind::Half, F::from_canonical_u32(v), F::from_canonical_u32(m));
            oracle.lookup_delta(LookupWidth::Half, v, -(m as i32));
        }
        let d = oracle.diff_count(v);
        if d != 0 {
            ledger.table_side(TableKind::CycleDiff, F::from_canonical_u32(v), F::from_canonical_u32(d));
            oracle.lookup_delta(LookupWidth::CycleDiff, v, -(d as i32));
        }
    }
}

fn fold_term(
    checker: &mut ConstraintChecker,
    challenges: &LookupChallenges,
    prev: Ext,
    term: &LookupTerm,
) -> Result<Ext, StepError> {
    let denom = challenges.z * term.key + ext(term.table.offset());
    let inv = match denom.try_inverse() {
        Some(inv) => inv,
        // A vanishing denominator means the challenge collided with a
        // key; the witnessed inverse cannot exist and the row dies.
        None => {
            return Err(StepError::ConstraintExt {
                cycle: checker.cycle(),
                label: "accum_denominator",
            })
        }
    };
    checker.assert_eq_ext("accum_inverse", inv * denom, Ext::one())?;

    let next = prev + ext(term.count) * inv;
    // Telescoping form of the same update, free of division.
    checker.assert_eq_ext("accum_telescope", (next - prev) * denom, ext(term.count))?;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> (ConstraintChecker, LookupLedger) {
        (
            ConstraintChecker::new(0),
            LookupLedger::new(LookupChallenges::deterministic()),
        )
    }

    #[test]
    fn row_sum_matches_direct_rationals() {
        let (mut checker, mut ledger) = ctx();
        for v in [3u32, 200, 255] {
            ledger.byte(&mut checker, F::from_canonical_u32(v)).unwrap();
        }
        let mut accum = Accumulator::new(Ext::zero());
        let row = accum.fold_row(&mut checker, &ledger).unwrap();

        let challenges = LookupChallenges::deterministic();
        let mut want = Ext::zero();
        for v in [3u32, 200, 255] {
            want += contribution(
                &challenges,
                TableKind::Byte,
                ext(F::from_canonical_u32(v)),
                F::one(),
            )
            .unwrap();
        }
        assert_eq!(row, want);
        assert_eq!(accum.total(), want);
    }

    #[test]
    fn queries_cancel_table_multiplicities() {
        let (mut checker, mut ledger) = ctx();
        // Three queries of 7, one of 9.
        for v in [7u32, 7, 9, 7] {
            ledger.byte(&mut checker, F::from_canonical_u32(v)).unwrap();
        }
        // Table side: multiplicity 3 for 7, 1 for 9.
        ledger.table_side(TableKind::Byte, F::from_canonical_u32(7), F::from_canonical_u32(3));
        ledger.table_side(TableKind::Byte, F::from_canonical_u32(9), F::one());

        let mut accum = Accumulator::new(Ext::zero());
        accum.fold_row(&mut checker, &ledger).unwrap();
        assert_eq!(accum.total(), Ext::zero());
    }

    #[test]
    fn closing_equation_detects_drift() {
        let (mut checker, mut ledger) = ctx();
        ledger.half(&mut checker, F::from_canonical_u32(77)).unwrap();
        let mut accum = Accumulator::new(Ext::zero());
        accum.fold_row(&mut checker, &ledger).unwrap();

        accum.close(&mut checker, accum.total()).unwrap();
        let drifted = accum.total() + Ext::one();
        assert!(accum.close(&mut checker, drifted).is_err());
    }

    #[test]
    fn carried_in_value_threads_through() {
        let carried = ext(F::from_canonical_u32(12345));
        let (mut checker, mut ledger) = ctx();
        ledger.byte(&mut checker, F::from_canonical_u32(1)).unwrap();
        let mut accum = Accumulator::new(carried);
        let row = accum.fold_row(&mut checker, &ledger).unwrap();
        assert_eq!(accum.total(), carried + row);
    }

    #[test]
    fn memory_insert_and_remove_cancel() {
        use crate::constraints::word::U32Val;
        let (mut checker, mut ledger) = ctx();
        let data = U32Val::from_u32(0xDEAD_BEEF);
        let addr = F::from_canonical_u32(0x40);
        let cycle = F::from_canonical_u32(9);
        ledger.memory(addr, cycle, &data, F::one());
        ledger.memory(addr, cycle, &data, -F::one());
        let mut accum = Accumulator::new(Ext::zero());
        accum.fold_row(&mut checker, &ledger).unwrap();
        assert_eq!(accum.total(), Ext::zero());
    }
}
