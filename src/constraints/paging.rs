//! The paging walk.
//!
//! Continuation state is paged: 32-word pages hang off a binary tree of
//! 8-word node digests. The walk consumes indices from the oracle and
//! hands every index to the hash engine: a leaf index absorbs its page
//! and checks (page-in) or stores (page-out) the page digest; a node
//! index absorbs the digests of its two children under the paired
//! encoding and checks or stores the node digest the same way. An index
//! outside the valid range ends the walk; the range check failing is
//! the termination signal.

use p3_field::AbstractField;
use tracing::trace;

use crate::constraints::checker::{ConstraintChecker, StepError};
use crate::constraints::lookup::LookupLedger;
use crate::constraints::memory::MemTxnKind;
use crate::constraints::poseidon::{AbsorbEncoding, HashState, OutMode};
use crate::oracle::{Oracle, PagingMode};
use crate::types::{
    digest_word_addr, page_base_word, MachineState, PAGE_INDEX_BASE, PAGE_INDEX_END, PAGE_WORDS,
};
use crate::F;

/// Which direction the walk is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PagingDir {
    In,
    Out,
}

/// Result of one paging cycle.
pub enum PagingOutcome {
    /// A node or leaf index starts a hash operation.
    StartHash(HashState),
    /// The walk is over; move to the given state.
    Finished(MachineState),
}

/// Minor index the cycle took, for the dispatch one-hot.
pub fn paging_minor(dir: PagingDir, mode: PagingMode) -> u8 {
    use crate::types::{
        PAGING_DONE, PAGING_LOAD_NODE, PAGING_LOAD_PAGE, PAGING_STORE_NODE, PAGING_STORE_PAGE,
    };
    match (dir, mode) {
        (PagingDir::In, PagingMode::Node) => PAGING_LOAD_NODE,
        (PagingDir::In, PagingMode::Page) => PAGING_LOAD_PAGE,
        (PagingDir::Out, PagingMode::Node) => PAGING_STORE_NODE,
        (PagingDir::Out, PagingMode::Page) => PAGING_STORE_PAGE,
        (_, PagingMode::Done) => PAGING_DONE,
    }
}

/// Assert `v ∈ [0, 2^20)` through the halfword table: the low half
/// directly, the high part scaled so only 4 bits remain.
fn range_check_index(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    label: &'static str,
    v: F,
) -> Result<(), StepError> {
    let raw = p3_field::PrimeField32::as_canonical_u32(&v);
    let low = F::from_canonical_u32(raw & 0xFFFF);
    let high = F::from_canonical_u32(raw >> 16);
    checker.assert_eq(label, v, low + high * F::from_canonical_u32(1 << 16))?;
    ledger.half(checker, low)?;
    ledger.half(checker, high * F::from_canonical_u32(1 << 12))?;
    Ok(())
}

/// One cycle of the paging walk.
pub fn paging_step<O: Oracle>(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    oracle: &mut O,
    dir: PagingDir,
) -> Result<(PagingOutcome, u8), StepError> {
    let hint = oracle.next_paging_idx();
    let minor = paging_minor(dir, hint.mode);
    trace!(index = hint.index, mode = ?hint.mode, dir = ?dir, "paging step");

    let (txn, out_mode, cont) = match dir {
        PagingDir::In => (MemTxnKind::PageIn, OutMode::Check, MachineState::PagingIn),
        PagingDir::Out => (MemTxnKind::PageOut, OutMode::Store, MachineState::PagingOut),
    };

    match hint.mode {
        PagingMode::Node => {
            // Node indices live in [1, PAGE_INDEX_BASE).
            let idx = F::from_canonical_u32(hint.index);
            range_check_index(checker, ledger, "paging_node_range", idx - F::one())?;
            let at_leaf_base = crate::constraints::alu::is_zero(
                checker,
                idx - F::from_canonical_u32(PAGE_INDEX_BASE),
            )?;
            checker.assert_zero("paging_node_below_leaves", at_leaf_base)?;

            // The node digest commits to its two children: absorb both
            // child digests (16 contiguous words) under the paired
            // encoding and check/store against the node's slot.
            let hash = HashState::begin(
                digest_word_addr(2 * hint.index),
                2,
                txn,
                AbsorbEncoding::Pairs,
                digest_word_addr(hint.index),
                out_mode,
                0,
                cont,
            );
            Ok((PagingOutcome::StartHash(hash), minor))
        }
        PagingMode::Page => {
            // Leaf indices live in [PAGE_INDEX_BASE, PAGE_INDEX_END).
            if !(PAGE_INDEX_BASE..PAGE_INDEX_END).contains(&hint.index) {
                return Err(StepError::Constraint {
                    cycle: checker.cycle(),
                    label: "paging_leaf_range",
                    values: vec![hint.index],
                });
            }
            let idx = F::from_canonical_u32(hint.index);
            range_check_index(
                checker,
                ledger,
                "paging_leaf_range",
                idx - F::from_canonical_u32(PAGE_INDEX_BASE),
            )?;

            let hash = HashState::begin(
                page_base_word(hint.index),
                PAGE_WORDS / 8,
                txn,
                AbsorbEncoding::HalfWords,
                digest_word_addr(hint.index),
                out_mode,
                0,
                cont,
            );
            Ok((PagingOutcome::StartHash(hash), minor))
        }
        PagingMode::Done => {
            let next = match dir {
                PagingDir::In => MachineState::Resume,
                PagingDir::Out => MachineState::StoreRoot,
            };
            Ok((PagingOutcome::Finished(next), minor))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::lookup::LookupChallenges;
    use crate::oracle::testing::StubOracle;
    use crate::oracle::PagingHint;

    fn ctx() -> (ConstraintChecker, LookupLedger) {
        (
            ConstraintChecker::new(0),
            LookupLedger::new(LookupChallenges::deterministic()),
        )
    }

    #[test]
    fn node_step_starts_child_digest_hash() {
        let (mut checker, mut ledger) = ctx();
        let mut oracle = StubOracle::default();
        oracle.paging.push(PagingHint {
            index: 3,
            mode: PagingMode::Node,
        });
        let (outcome, minor) =
            paging_step(&mut checker, &mut ledger, &mut oracle, PagingDir::In).unwrap();
        match outcome {
            PagingOutcome::StartHash(hash) => {
                // Children of node 3 are nodes 6 and 7; their digests
                // are 16 contiguous words.
                assert_eq!(hash.in_addr, digest_word_addr(6));
                assert_eq!(hash.blocks_left, 2);
                assert_eq!(hash.encoding, AbsorbEncoding::Pairs);
                assert_eq!(hash.out_addr, digest_word_addr(3));
                assert_eq!(hash.out_mode, OutMode::Check);
            }
            _ => panic!("expected hash start"),
        }
        assert_eq!(minor, crate::types::PAGING_LOAD_NODE);
    }

    #[test]
    fn leaf_step_starts_hash_with_check() {
        let (mut checker, mut ledger) = ctx();
        let mut oracle = StubOracle::default();
        oracle.paging.push(PagingHint {
            index: PAGE_INDEX_BASE + 5,
            mode: PagingMode::Page,
        });
        let (outcome, _) =
            paging_step(&mut checker, &mut ledger, &mut oracle, PagingDir::In).unwrap();
        match outcome {
            PagingOutcome::StartHash(hash) => {
                assert_eq!(hash.in_addr, page_base_word(PAGE_INDEX_BASE + 5));
                assert_eq!(hash.blocks_left, PAGE_WORDS / 8);
                assert_eq!(hash.out_mode, OutMode::Check);
                assert_eq!(hash.cont, MachineState::PagingIn);
            }
            _ => panic!("expected hash start"),
        }
    }

    #[test]
    fn out_of_range_node_index_fails() {
        let (mut checker, mut ledger) = ctx();
        let mut oracle = StubOracle::default();
        oracle.paging.push(PagingHint {
            index: PAGE_INDEX_BASE,
            mode: PagingMode::Node,
        });
        assert!(paging_step(&mut checker, &mut ledger, &mut oracle, PagingDir::In).is_err());
    }

    #[test]
    fn done_finishes_walk() {
        let (mut checker, mut ledger) = ctx();
        let mut oracle = StubOracle::default();
        let (outcome, minor) =
            paging_step(&mut checker, &mut ledger, &mut oracle, PagingDir::Out).unwrap();
        assert!(matches!(
            outcome,
            PagingOutcome::Finished(MachineState::StoreRoot)
        ));
        assert_eq!(minor, crate::types::PAGING_DONE);
    }
}
