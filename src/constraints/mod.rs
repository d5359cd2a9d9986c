//! The step circuit proper.
//!
//! Leaf-to-root composition:
//! - `checker`: the constraint sink and error taxonomy
//! - `bits`: boolean/twit witnesses and bit decompositions
//! - `word`: the 32-bit value layer (normalization, address splitting)
//! - `decode`: the instruction decoder
//! - `memory`: (old, new) memory transaction pairs
//! - `alu`, `muldiv`: arithmetic, comparison, bitwise, multiply/divide
//! - `poseidon`: the 24-cell sponge permutation and absorption
//! - `control`, `ecall`, `paging`: privileged state transitions
//! - `dispatch`: major/minor dispatch over decoded instructions
//! - `lookup`, `accum`: lookup bookkeeping and accumulator folding
//!
//! Each constraint is a polynomial identity over the base field that is
//! evaluated concretely; a nonzero residue aborts the row with a
//! [`checker::StepError`] naming the assertion and its operands.

pub mod accum;
pub mod alu;
pub mod bits;
pub mod checker;
pub mod control;
pub mod decode;
pub mod dispatch;
pub mod ecall;
pub mod lookup;
pub mod memory;
pub mod muldiv;
pub mod paging;
pub mod poseidon;
pub mod poseidon_consts;
pub mod word;

pub use checker::{ConstraintChecker, StepError};
pub use lookup::{LookupChallenges, LookupLedger, TableKind};
pub use word::{DenormU32, U32Val};
