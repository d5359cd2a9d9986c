//! The 24-cell sponge permutation and its absorption engine.
//!
//! One permutation is 4 external rounds, 21 internal rounds, 4 external
//! rounds. An external round S-boxes every cell and applies the circulant
//! mixing matrix built from the 4x4 local mix; an internal round S-boxes
//! cell 0 only and applies a diagonal multiplier plus the shared cell
//! sum. Round constants are injected by selecting from the fixed table
//! via a one-hot round index.
//!
//! A hash operation spans multiple cycles: `Load` cycles absorb 8 words
//! of memory-resident data under one of three encodings, round cycles
//! run one permutation round each, and the `Out` cycle either writes the
//! digest or folds a digest-equality check into the check accumulator.

use p3_field::AbstractField;
use serde::{Deserialize, Serialize};

use crate::constraints::bits::onehot;
use crate::constraints::checker::{ConstraintChecker, StepError};
use crate::constraints::lookup::LookupLedger;
use crate::constraints::memory::{memory_get, memory_write, MemTxnKind};
use crate::constraints::poseidon_consts::{
    CELLS, EXTERNAL_ROUND_CONSTANTS, INTERNAL_DIAGONAL, INTERNAL_ROUND_CONSTANTS, ROUNDS_FULL,
    ROUNDS_PARTIAL, ROUNDS_TOTAL,
};
use crate::constraints::word::{split_total, U32Val};
use crate::oracle::Oracle;
use crate::types::MachineState;
use crate::{ext, Ext, F};

/// Sponge rate (absorbing cells); the remaining 8 cells are capacity.
pub const RATE: usize = 16;

/// Digest width in words.
pub const DIGEST_WORDS: usize = 8;

/// The 4x4 local mix of the external linear layer.
const LOCAL_MIX: [[u32; 4]; 4] = [[5, 7, 1, 3], [4, 6, 1, 1], [1, 3, 5, 7], [1, 1, 4, 6]];

/// `x^5`.
#[inline]
pub fn sbox(x: F) -> F {
    let x2 = x * x;
    let x4 = x2 * x2;
    x4 * x
}

/// External mixing: apply the local mix per 4-cell group, then add the
/// across-group sums so the full matrix is the circulant
/// `circ(2·M4, M4, …, M4)`.
pub fn mix_external(cells: &mut [F; CELLS]) {
    let mut mixed = [F::zero(); CELLS];
    for group in 0..CELLS / 4 {
        for row in 0..4 {
            let mut acc = F::zero();
            for col in 0..4 {
                acc += F::from_canonical_u32(LOCAL_MIX[row][col]) * cells[group * 4 + col];
            }
            mixed[group * 4 + row] = acc;
        }
    }
    let mut lane_sums = [F::zero(); 4];
    for group in 0..CELLS / 4 {
        for lane in 0..4 {
            lane_sums[lane] += mixed[group * 4 + lane];
        }
    }
    for group in 0..CELLS / 4 {
        for lane in 0..4 {
            cells[group * 4 + lane] = mixed[group * 4 + lane] + lane_sums[lane];
        }
    }
}

/// Internal mixing: `cell_i ← diag_i·cell_i + Σ cells`.
pub fn mix_internal(cells: &mut [F; CELLS]) {
    let sum: F = cells.iter().copied().sum();
    for (cell, diag) in cells.iter_mut().zip(INTERNAL_DIAGONAL) {
        *cell = F::from_canonical_u32(diag) * *cell + sum;
    }
}

/// Whether a round index falls in the external schedule, and the row of
/// its constants in the matching table.
fn round_schedule(round: usize) -> (bool, usize) {
    let half = ROUNDS_FULL / 2;
    if round < half {
        (true, round)
    } else if round < half + ROUNDS_PARTIAL {
        (false, round - half)
    } else {
        (true, round - ROUNDS_PARTIAL)
    }
}

/// Run one round of the permutation in place.
pub fn run_round(cells: &mut [F; CELLS], round: usize) {
    let (external, row) = round_schedule(round);
    if external {
        for (cell, rc) in cells.iter_mut().zip(EXTERNAL_ROUND_CONSTANTS[row]) {
            *cell = sbox(*cell + F::from_canonical_u32(rc));
        }
        mix_external(cells);
    } else {
        cells[0] = sbox(cells[0] + F::from_canonical_u32(INTERNAL_ROUND_CONSTANTS[row]));
        mix_internal(cells);
    }
}

/// Run the whole permutation in place.
pub fn permute(cells: &mut [F; CELLS]) {
    for round in 0..ROUNDS_TOTAL {
        run_round(cells, round);
    }
}

/// Digest of the machine continuation state (pc, mode), used by
/// suspend/resume to authenticate the snapshot.
pub fn state_digest(pc: &U32Val, mode: F) -> [F; DIGEST_WORDS] {
    let mut cells = [F::zero(); CELLS];
    cells[0] = pc.low;
    cells[1] = pc.high;
    cells[2] = mode;
    permute(&mut cells);
    let mut digest = [F::zero(); DIGEST_WORDS];
    digest.copy_from_slice(&cells[..DIGEST_WORDS]);
    digest
}

/// How 8 memory words map onto sponge cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbsorbEncoding {
    /// One 16-bit half per cell: 16 cells, the full-word encoding.
    HalfWords,
    /// The low byte of each half, zero-extended: 16 cells, validated
    /// against a declared byte length by the shift-polynomial check.
    Bytes,
    /// `low + 2^16·high` per word: 8 cells, for re-absorbing digests.
    Pairs,
}

impl AbsorbEncoding {
    /// Rate cells consumed by one 8-word load.
    pub fn cells_per_load(self) -> usize {
        match self {
            AbsorbEncoding::HalfWords | AbsorbEncoding::Bytes => 16,
            AbsorbEncoding::Pairs => 8,
        }
    }
}

/// Whether the digest is written out or checked against stored words.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutMode {
    Store,
    Check,
}

/// In-flight hash operation state, threaded across cycles.
#[derive(Clone, Debug)]
pub struct HashState {
    pub cells: [F; CELLS],
    /// Next round index while in `HashRound`.
    pub round: u32,
    /// Rate cells already filled since the last permutation.
    pub rate_offset: u32,
    /// 8-word loads remaining.
    pub blocks_left: u32,
    /// Word address of the next load.
    pub in_addr: u32,
    /// Transaction kind the loads use (read, page-in, or page-out).
    pub txn_kind: MemTxnKind,
    pub encoding: AbsorbEncoding,
    /// Word address of the digest (written or compared).
    pub out_addr: u32,
    pub out_mode: OutMode,
    /// Bytes of declared input not yet absorbed (Bytes encoding only).
    pub remaining_len: u32,
    /// Machine state to resume once the operation completes.
    pub cont: MachineState,
}

impl HashState {
    /// Start a hash operation over `blocks` 8-word loads.
    pub fn begin(
        in_addr: u32,
        blocks: u32,
        txn_kind: MemTxnKind,
        encoding: AbsorbEncoding,
        out_addr: u32,
        out_mode: OutMode,
        declared_len: u32,
        cont: MachineState,
    ) -> Self {
        Self {
            cells: [F::zero(); CELLS],
            round: 0,
            rate_offset: 0,
            blocks_left: blocks,
            in_addr,
            txn_kind,
            encoding,
            out_addr,
            out_mode,
            remaining_len: declared_len,
            cont,
        }
    }

    fn txn_onehot(&self) -> [F; 3] {
        match self.txn_kind {
            MemTxnKind::Read => [F::one(), F::zero(), F::zero()],
            MemTxnKind::PageIn => [F::zero(), F::one(), F::zero()],
            MemTxnKind::PageOut => [F::zero(), F::zero(), F::one()],
            MemTxnKind::Write => unreachable!("loads never write"),
        }
    }
}

/// The shift-polynomial length check: a one-hot over the declared byte
/// length selects the tail of the block's byte polynomial at `beta`; the
/// tail must evaluate to zero, so the check passes exactly when every
/// byte at or past the declared length is zero.
pub fn shift_poly_check(
    checker: &mut ConstraintChecker,
    bytes: &[F; 32],
    declared: u32,
    beta: Ext,
) -> Result<(), StepError> {
    let len = declared.min(32) as usize;
    onehot(
        checker,
        "shift_poly_len",
        len,
        F::from_canonical_u32(declared),
        33,
    )?;
    let mut tail = Ext::zero();
    let mut power = Ext::one();
    for byte in bytes.iter().skip(len) {
        tail += power * ext(*byte);
        power *= beta;
    }
    checker.assert_zero_ext("shift_poly_tail", tail)
}

/// One `Load` cycle: absorb 8 words into the rate.
pub fn hash_load<O: Oracle>(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    oracle: &mut O,
    mut state: HashState,
) -> Result<(HashState, MachineState), StepError> {
    let mut words = [U32Val::zero(); 8];
    for (i, slot) in words.iter_mut().enumerate() {
        *slot = memory_get(
            checker,
            ledger,
            oracle,
            state.in_addr + i as u32,
            state.txn_onehot(),
        )?;
    }
    state.in_addr += 8;
    state.blocks_left -= 1;

    let offset = state.rate_offset as usize;
    match state.encoding {
        AbsorbEncoding::HalfWords => {
            for (i, word) in words.iter().enumerate() {
                state.cells[offset + 2 * i] += word.low;
                state.cells[offset + 2 * i + 1] += word.high;
            }
        }
        AbsorbEncoding::Bytes => {
            // Byte-decompose all 32 bytes, check the declared length,
            // absorb the low byte of each half.
            let mut bytes = [F::zero(); 32];
            for (i, word) in words.iter().enumerate() {
                let raw = word.to_u32();
                for j in 0..4 {
                    let b = F::from_canonical_u32((raw >> (8 * j)) & 0xFF);
                    ledger.byte(checker, b)?;
                    bytes[4 * i + j] = b;
                }
                checker.assert_eq(
                    "absorb_byte_low",
                    word.low,
                    bytes[4 * i] + F::from_canonical_u32(256) * bytes[4 * i + 1],
                )?;
                checker.assert_eq(
                    "absorb_byte_high",
                    word.high,
                    bytes[4 * i + 2] + F::from_canonical_u32(256) * bytes[4 * i + 3],
                )?;
            }
            let declared = state.remaining_len.min(32);
            shift_poly_check(checker, &bytes, declared, ledger.challenges().beta)?;
            state.remaining_len -= declared;
            for i in 0..8 {
                state.cells[offset + 2 * i] += bytes[4 * i];
                state.cells[offset + 2 * i + 1] += bytes[4 * i + 2];
            }
        }
        AbsorbEncoding::Pairs => {
            for (i, word) in words.iter().enumerate() {
                state.cells[offset + i] += word.low + F::from_canonical_u32(1 << 16) * word.high;
            }
        }
    }

    state.rate_offset += state.encoding.cells_per_load() as u32;
    let next = if state.rate_offset as usize >= RATE || state.blocks_left == 0 {
        state.rate_offset = 0;
        state.round = 0;
        MachineState::HashRound
    } else {
        MachineState::HashLoad
    };
    Ok((state, next))
}

/// One permutation round cycle; the round constants are selected from
/// the fixed table via the one-hot round index.
pub fn hash_round(
    checker: &mut ConstraintChecker,
    mut state: HashState,
) -> Result<(HashState, MachineState), StepError> {
    let round = state.round as usize;
    let flags = onehot(
        checker,
        "hash_round_onehot",
        round,
        F::from_canonical_u32(state.round),
        ROUNDS_TOTAL,
    )?;

    // Selected constants: zero row for internal rounds beyond cell 0.
    let mut selected = [F::zero(); CELLS];
    for (r, flag) in flags.iter().enumerate() {
        let (external, row) = round_schedule(r);
        if external {
            for (cell, rc) in selected.iter_mut().zip(EXTERNAL_ROUND_CONSTANTS[row]) {
                *cell += *flag * F::from_canonical_u32(rc);
            }
        } else {
            selected[0] += *flag * F::from_canonical_u32(INTERNAL_ROUND_CONSTANTS[row]);
        }
    }

    let (external, _) = round_schedule(round);
    if external {
        for (cell, rc) in state.cells.iter_mut().zip(selected) {
            *cell = sbox(*cell + rc);
        }
        mix_external(&mut state.cells);
    } else {
        state.cells[0] = sbox(state.cells[0] + selected[0]);
        mix_internal(&mut state.cells);
    }

    state.round += 1;
    let next = if (state.round as usize) < ROUNDS_TOTAL {
        MachineState::HashRound
    } else if state.blocks_left > 0 {
        MachineState::HashLoad
    } else {
        MachineState::HashOut
    };
    Ok((state, next))
}

/// The `Out` cycle: write the digest, or fold the digest-equality check
/// into the check accumulator and assert it closes at zero.
pub fn hash_out<O: Oracle>(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    oracle: &mut O,
    state: HashState,
) -> Result<MachineState, StepError> {
    let beta = ledger.challenges().beta;
    let mut check_accum = Ext::zero();
    let mut power = Ext::one();
    for i in 0..DIGEST_WORDS {
        let cell = state.cells[i];
        let (low, high) = split_total(checker, ledger, "digest_word_split", cell)?;
        let word = U32Val { low, high };
        match state.out_mode {
            OutMode::Store => {
                memory_write(checker, ledger, oracle, state.out_addr + i as u32, word)?;
            }
            OutMode::Check => {
                let want = memory_get(
                    checker,
                    ledger,
                    oracle,
                    state.out_addr + i as u32,
                    state.txn_onehot(),
                )?;
                let got = ext(cell);
                let expect = ext(want.low) + ext(want.high) * ext(F::from_canonical_u32(1 << 16));
                check_accum += power * (got - expect);
                power *= beta;
            }
        }
    }
    if state.out_mode == OutMode::Check {
        checker.assert_zero_ext("digest_check_accum", check_accum)?;
    }
    Ok(state.cont)
}
