//! The memory subsystem.
//!
//! Every access is an (old, new) transaction pair at a word address,
//! obtained from the oracle and bound here: read-only kinds leave data
//! unchanged, the new record carries this row's logical cycle, and the
//! cycle ordering between old and new is non-decreasing (checked by
//! range-splitting the difference). Both records are folded into the
//! memory permutation lookup, the old record as a removal and the new
//! as an insertion, which is what makes a lying oracle unprovable.
//!
//! Logical memory cycle = `4·cycle + kind` so multiple accesses within
//! one machine cycle stay strictly ordered.

use p3_field::{AbstractField, PrimeField32};

use crate::constraints::checker::{ConstraintChecker, StepError};
use crate::constraints::lookup::LookupLedger;
use crate::constraints::word::U32Val;
use crate::oracle::Oracle;
use crate::F;

/// Transaction kind; doubles as the phase inside the logical cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemTxnKind {
    PageIn = 0,
    Read = 1,
    Write = 2,
    PageOut = 3,
}

impl MemTxnKind {
    pub fn phase(self) -> u32 {
        self as u32
    }

    pub fn is_read_only(self) -> bool {
        !matches!(self, MemTxnKind::Write)
    }
}

/// One side of a transaction pair.
#[derive(Clone, Copy, Debug)]
pub struct MemRecord {
    pub cycle: F,
    pub data: U32Val,
}

/// A completed transaction: the data observed (old) and recorded (new).
#[derive(Clone, Copy, Debug)]
pub struct MemTxn {
    pub addr: F,
    pub old: MemRecord,
    pub new: MemRecord,
}

/// The transaction core. `new_from` sees the (range-bound) old data and
/// the hint's new side and must produce the data the new record carries.
fn txn_core<O: Oracle, Fm>(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    oracle: &mut O,
    addr: u32,
    kind: MemTxnKind,
    new_from: Fm,
) -> Result<MemTxn, StepError>
where
    Fm: FnOnce(
        &mut ConstraintChecker,
        &mut LookupLedger,
        &U32Val,
        &U32Val,
    ) -> Result<U32Val, StepError>,
{
    let hint = oracle.mem_txn(addr);
    let old_data = U32Val {
        low: F::from_canonical_u32(hint.old_low),
        high: F::from_canonical_u32(hint.old_high),
    };
    // Old data flows in unchecked; bind both halves to the range table.
    ledger.half(checker, old_data.low)?;
    ledger.half(checker, old_data.high)?;

    let supplied = U32Val {
        low: F::from_canonical_u32(hint.new_low),
        high: F::from_canonical_u32(hint.new_high),
    };
    let new_data = new_from(checker, ledger, &old_data, &supplied)?;

    let old_cycle = F::from_canonical_u32(hint.old_cycle);
    let new_cycle_raw = 4 * checker.cycle() + kind.phase();
    let new_cycle = F::from_canonical_u32(new_cycle_raw);

    // Non-decreasing cycle order: split new − old into a checked low
    // halfword and a high part bounded to 11 bits (diff < 2^27, well
    // below the field size, so the split cannot wrap).
    let diff = new_cycle - old_cycle;
    let diff_raw = diff.as_canonical_u32();
    let diff_low = F::from_canonical_u32(diff_raw & 0xFFFF);
    let diff_high = F::from_canonical_u32(diff_raw >> 16);
    checker.assert_eq(
        "mem_cycle_order",
        diff,
        diff_low + diff_high * F::from_canonical_u32(1 << 16),
    )?;
    ledger.cycle_diff(checker, diff_low)?;
    ledger.cycle_diff(checker, diff_high * F::from_canonical_u32(32))?;

    let addr_f = F::from_canonical_u32(addr);
    let old = MemRecord {
        cycle: old_cycle,
        data: old_data,
    };
    let new = MemRecord {
        cycle: new_cycle,
        data: new_data,
    };

    ledger.memory(addr_f, old.cycle, &old.data, -F::one());
    ledger.memory(addr_f, new.cycle, &new.data, F::one());
    oracle.memory_delta(
        addr,
        hint.old_cycle,
        old.data.low.as_canonical_u32(),
        old.data.high.as_canonical_u32(),
        -1,
    );
    oracle.memory_delta(
        addr,
        new_cycle_raw,
        new.data.low.as_canonical_u32(),
        new.data.high.as_canonical_u32(),
        1,
    );

    Ok(MemTxn {
        addr: addr_f,
        old,
        new,
    })
}

/// Perform one memory transaction at word address `addr`.
///
/// For `Write`, `value` is the data the new record must carry; for the
/// read-only kinds it must be `None` and the new record is asserted to
/// repeat the old data.
pub fn memory_txn<O: Oracle>(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    oracle: &mut O,
    addr: u32,
    kind: MemTxnKind,
    value: Option<U32Val>,
) -> Result<MemTxn, StepError> {
    debug_assert_eq!(kind.is_read_only(), value.is_none());
    match value {
        Some(v) => txn_core(checker, ledger, oracle, addr, kind, |_, _, _, _| Ok(v)),
        None => txn_core(checker, ledger, oracle, addr, kind, |checker, _, old, supplied| {
            checker.assert_eq("mem_read_low_unchanged", supplied.low, old.low)?;
            checker.assert_eq("mem_read_high_unchanged", supplied.high, old.high)?;
            Ok(*supplied)
        }),
    }
}

/// Read-modify-write in a single transaction: `merge` computes the new
/// data from the old record's data (store-byte/store-half merging).
pub fn memory_rmw<O: Oracle, Fm>(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    oracle: &mut O,
    addr: u32,
    merge: Fm,
) -> Result<MemTxn, StepError>
where
    Fm: FnOnce(
        &mut ConstraintChecker,
        &mut LookupLedger,
        &U32Val,
    ) -> Result<U32Val, StepError>,
{
    txn_core(checker, ledger, oracle, addr, MemTxnKind::Write, |checker, ledger, old, _| {
        merge(checker, ledger, old)
    })
}

/// Read a word.
pub fn memory_read<O: Oracle>(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    oracle: &mut O,
    addr: u32,
) -> Result<U32Val, StepError> {
    Ok(memory_txn(checker, ledger, oracle, addr, MemTxnKind::Read, None)?.new.data)
}

/// Write a word.
pub fn memory_write<O: Oracle>(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    oracle: &mut O,
    addr: u32,
    value: U32Val,
) -> Result<(), StepError> {
    memory_txn(checker, ledger, oracle, addr, MemTxnKind::Write, Some(value))?;
    Ok(())
}

/// Write a word whose data the host supplies (host-read streaming).
pub fn memory_write_from_host<O: Oracle>(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    oracle: &mut O,
    addr: u32,
) -> Result<U32Val, StepError> {
    let txn = txn_core(
        checker,
        ledger,
        oracle,
        addr,
        MemTxnKind::Write,
        |checker, ledger, _, supplied| {
            ledger.half(checker, supplied.low)?;
            ledger.half(checker, supplied.high)?;
            Ok(*supplied)
        },
    )?;
    Ok(txn.new.data)
}

/// Page a word in (read-only at paging phase).
pub fn memory_page_in<O: Oracle>(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    oracle: &mut O,
    addr: u32,
) -> Result<U32Val, StepError> {
    Ok(memory_txn(checker, ledger, oracle, addr, MemTxnKind::PageIn, None)?.new.data)
}

/// Page a word out (reads the final value at page-out phase).
pub fn memory_page_out<O: Oracle>(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    oracle: &mut O,
    addr: u32,
) -> Result<U32Val, StepError> {
    Ok(memory_txn(checker, ledger, oracle, addr, MemTxnKind::PageOut, None)?.new.data)
}

/// Generic read under a caller-supplied one-hot over
/// {read, page-in, page-out}.
pub fn memory_get<O: Oracle>(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    oracle: &mut O,
    addr: u32,
    kind_onehot: [F; 3],
) -> Result<U32Val, StepError> {
    let [is_read, is_page_in, is_page_out] = kind_onehot;
    checker.assert_bit("mem_get_read", is_read)?;
    checker.assert_bit("mem_get_page_in", is_page_in)?;
    checker.assert_bit("mem_get_page_out", is_page_out)?;
    checker.assert_eq("mem_get_onehot", is_read + is_page_in + is_page_out, F::one())?;

    let kind = if is_read == F::one() {
        MemTxnKind::Read
    } else if is_page_in == F::one() {
        MemTxnKind::PageIn
    } else {
        MemTxnKind::PageOut
    };
    Ok(memory_txn(checker, ledger, oracle, addr, kind, None)?.new.data)
}
