//! Control operations: root digest streaming, suspend/resume of the
//! continuation snapshot, and the privileged return.
//!
//! Suspend persists pc, mode, and the state digest through the fixed
//! machine region; resume restores them and re-derives the digest from
//! the restored values, so a snapshot that was tampered with in storage
//! cannot resume.

use p3_field::AbstractField;

use crate::constraints::checker::{ConstraintChecker, StepError};
use crate::constraints::lookup::LookupLedger;
use crate::constraints::memory::{
    memory_page_in, memory_page_out, memory_read, memory_write,
};
use crate::constraints::poseidon::{state_digest, DIGEST_WORDS};
use crate::constraints::word::{split_total, U32Val};
use crate::oracle::Oracle;
use crate::types::{
    digest_word_addr, MachineState, MEPC_WORD, MODE_MACHINE, NODE_WORDS, ROOT_INDEX,
    STATE_DIGEST_WORD, SUSPEND_MODE_WORD, SUSPEND_PC_WORD,
};
use crate::F;

/// Stream the 8 root digest words in. The values land in the digest
/// storage region where the paging walk checks page hashes against them.
pub fn control_load_root<O: Oracle>(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    oracle: &mut O,
) -> Result<MachineState, StepError> {
    let base = digest_word_addr(ROOT_INDEX);
    for i in 0..NODE_WORDS {
        memory_page_in(checker, ledger, oracle, base + i)?;
    }
    Ok(MachineState::PagingIn)
}

/// Stream the 8 root digest words out; the trace is complete afterwards.
pub fn control_store_root<O: Oracle>(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    oracle: &mut O,
) -> Result<MachineState, StepError> {
    let base = digest_word_addr(ROOT_INDEX);
    for i in 0..NODE_WORDS {
        memory_page_out(checker, ledger, oracle, base + i)?;
    }
    Ok(MachineState::Halted)
}

/// Restore pc and mode from the machine region and authenticate them
/// against the stored state digest.
pub fn control_resume<O: Oracle>(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    oracle: &mut O,
) -> Result<(U32Val, F, MachineState), StepError> {
    let pc = memory_read(checker, ledger, oracle, SUSPEND_PC_WORD)?;
    let mode_word = memory_read(checker, ledger, oracle, SUSPEND_MODE_WORD)?;
    let mode = mode_word.low;
    checker.assert_bit("resume_mode", mode)?;
    checker.assert_zero("resume_mode_high", mode_word.high)?;

    let digest = state_digest(&pc, mode);
    for (i, cell) in digest.iter().enumerate() {
        let stored = memory_read(checker, ledger, oracle, STATE_DIGEST_WORD + i as u32)?;
        checker.assert_eq(
            "resume_digest",
            *cell,
            stored.low + stored.high * F::from_canonical_u32(1 << 16),
        )?;
    }

    Ok((pc, mode, MachineState::Decode))
}

/// Persist pc, mode, and the state digest to the machine region.
pub fn control_suspend<O: Oracle>(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    oracle: &mut O,
    pc: &U32Val,
    mode: F,
) -> Result<MachineState, StepError> {
    memory_write(checker, ledger, oracle, SUSPEND_PC_WORD, *pc)?;
    memory_write(
        checker,
        ledger,
        oracle,
        SUSPEND_MODE_WORD,
        U32Val {
            low: mode,
            high: F::zero(),
        },
    )?;

    let digest = state_digest(pc, mode);
    for (i, cell) in digest.iter().enumerate() {
        let (low, high) = split_total(checker, ledger, "suspend_digest_split", *cell)?;
        memory_write(
            checker,
            ledger,
            oracle,
            STATE_DIGEST_WORD + i as u32,
            U32Val { low, high },
        )?;
    }
    debug_assert_eq!(digest.len(), DIGEST_WORDS);

    Ok(MachineState::PagingOut)
}

/// Privileged return: only legal in machine mode; reads the saved
/// return address and drops back to user mode.
pub fn control_mret<O: Oracle>(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    oracle: &mut O,
    mode: F,
) -> Result<(U32Val, F, MachineState), StepError> {
    checker.assert_eq("mret_requires_machine", mode, F::from_canonical_u32(MODE_MACHINE))?;
    let new_pc = memory_read(checker, ledger, oracle, MEPC_WORD)?;
    Ok((new_pc, F::zero(), MachineState::Decode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::lookup::LookupChallenges;
    use crate::oracle::testing::StubOracle;
    use crate::types::MODE_USER;
    use p3_field::PrimeField32;

    fn ctx(cycle: u32) -> (ConstraintChecker, LookupLedger) {
        (
            ConstraintChecker::new(cycle),
            LookupLedger::new(LookupChallenges::deterministic()),
        )
    }

    #[test]
    fn suspend_then_resume_round_trips() {
        let mut oracle = StubOracle::default();
        let pc = U32Val::from_u32(0x0000_4000);
        let mode = F::from_canonical_u32(MODE_USER);

        let (mut checker, mut ledger) = ctx(1);
        let next = control_suspend(&mut checker, &mut ledger, &mut oracle, &pc, mode).unwrap();
        assert_eq!(next, MachineState::PagingOut);

        let (mut checker, mut ledger) = ctx(2);
        let (pc_back, mode_back, next) =
            control_resume(&mut checker, &mut ledger, &mut oracle).unwrap();
        assert_eq!(next, MachineState::Decode);
        assert_eq!(pc_back.to_u32(), pc.to_u32());
        assert_eq!(mode_back, mode);
    }

    #[test]
    fn resume_rejects_tampered_digest() {
        let mut oracle = StubOracle::default();
        let pc = U32Val::from_u32(0x8000);
        let (mut checker, mut ledger) = ctx(1);
        control_suspend(&mut checker, &mut ledger, &mut oracle, &pc, F::zero()).unwrap();

        // Corrupt the saved pc; the digest no longer matches.
        let (cycle, _) = oracle.mem[&SUSPEND_PC_WORD];
        oracle.mem.insert(SUSPEND_PC_WORD, (cycle, 0x8004));

        let (mut checker, mut ledger) = ctx(2);
        let err = control_resume(&mut checker, &mut ledger, &mut oracle).unwrap_err();
        assert!(matches!(err, StepError::Constraint { label: "resume_digest", .. }));
    }

    #[test]
    fn mret_rejects_user_mode() {
        let mut oracle = StubOracle::default();
        let (mut checker, mut ledger) = ctx(1);
        assert!(control_mret(&mut checker, &mut ledger, &mut oracle, F::zero()).is_err());
        let (mut checker, mut ledger) = ctx(1);
        oracle.mem.insert(MEPC_WORD, (0, 0x9000));
        let (pc, mode, _) =
            control_mret(&mut checker, &mut ledger, &mut oracle, F::one()).unwrap();
        assert_eq!(pc.to_u32(), 0x9000);
        assert_eq!(mode.as_canonical_u32(), MODE_USER);
    }

    #[test]
    fn root_streaming_touches_eight_words() {
        let mut oracle = StubOracle::default();
        let (mut checker, mut ledger) = ctx(0);
        let next = control_load_root(&mut checker, &mut ledger, &mut oracle).unwrap();
        assert_eq!(next, MachineState::PagingIn);
        let mem_terms = ledger
            .terms()
            .iter()
            .filter(|t| t.table == crate::constraints::lookup::TableKind::Memory)
            .count();
        assert_eq!(mem_terms, 16);
    }
}
