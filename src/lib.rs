//! rv32im-circuit: per-cycle arithmetization of an RV32IM zkVM.
//!
//! For one proof cycle this crate decodes an instruction, computes its
//! semantic effect, emits the zero-knowledge constraints (range checks,
//! carry checks, boolean checks, permutation-argument contributions) that
//! bind the effect to a checked memory/register state, and folds every
//! lookup contribution into a running accumulator column consumed by an
//! external verifier.
//!
//! # Architecture
//!
//! - `types`: majors/minors, machine states, the fixed memory layout
//! - `oracle`: the nondeterministic hint boundary (injected trait)
//! - `constraints`: the step circuit proper, leaf to root: bit/range
//!   primitives, the 32-bit value layer, the decoder, the memory
//!   subsystem, ALU/compare/bitwise, multiply/divide, the sponge
//!   permutation, control/ECALL/paging, dispatch, and accumulation
//! - `cycle`: one proof cycle end to end, plus a run-to-halt driver
//!
//! Evaluation is a pure, deterministic function of (previous-cycle output
//! state, this cycle's oracle answers). Any constraint failure is a
//! terminal failure of the whole trace; there is no partial recovery.
//!
//! The polynomial-commitment backend, the circuit compiler, and host-side
//! witness generation are external collaborators: this crate only speaks
//! to them through the [`oracle::Oracle`] trait and the accumulator
//! column it emits.

pub mod constraints;
pub mod cycle;
pub mod oracle;
pub mod types;

use p3_baby_bear::BabyBear;
use p3_field::extension::BinomialExtensionField;

/// The base field used for ordinary constraints (Baby Bear, p = 15·2^27 + 1).
pub type F = BabyBear;

/// The degree-4 extension field used for lookup keys, challenges, and the
/// accumulator columns.
pub type Ext = BinomialExtensionField<BabyBear, 4>;

pub use constraints::checker::{ConstraintChecker, StepError};
pub use constraints::lookup::{LookupChallenges, LookupLedger, TableKind};
pub use cycle::{step_cycle, CycleIn, CycleOut, TraceRun};
pub use oracle::{
    DivideHint, HintTranscript, MemTxnHint, Oracle, PagingHint, PagingMode, RecordingOracle,
    ReplayOracle,
};
pub use types::{MachineState, Major};

/// Lift a base-field element into the extension field.
#[inline]
pub fn ext(v: F) -> Ext {
    Ext::from(v)
}
