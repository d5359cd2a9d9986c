//! One proof cycle end to end.
//!
//! A cycle is a pure function of (previous-cycle output state, this
//! cycle's oracle answers): it selects the handler for the current
//! machine state, binds the oracle's claimed (major, minor) pair and
//! materializes the dispatch one-hots, evaluates the handler's
//! constraints, and folds the row's lookup events into the running
//! accumulator. The output is handed to the next cycle verbatim; no
//! other state survives the row boundary.

use p3_field::{AbstractExtensionField, AbstractField};
use p3_matrix::dense::RowMajorMatrix;
use tracing::{debug, info};

use crate::constraints::accum::Accumulator;
use crate::constraints::bits::onehot;
use crate::constraints::checker::{ConstraintChecker, StepError};
use crate::constraints::control::{
    control_load_root, control_resume, control_store_root, control_suspend,
};
use crate::constraints::dispatch::dispatch_inst;
use crate::constraints::ecall::{ecall_read_words, HostReadState};
use crate::constraints::lookup::{LookupChallenges, LookupLedger};
use crate::constraints::paging::{paging_step, PagingDir, PagingOutcome};
use crate::constraints::poseidon::{hash_load, hash_out, hash_round, HashState};
use crate::constraints::word::U32Val;
use crate::oracle::Oracle;
use crate::constraints::poseidon_consts::{ROUNDS_FULL, ROUNDS_PARTIAL};
use crate::types::{
    MachineState, Major, CTRL_LOAD_ROOT, CTRL_RESUME, CTRL_STORE_ROOT, CTRL_SUSPEND,
    ECALL_HOST_READ_WORDS, HASH_CHECK_OUT, HASH_EXT_ROUND, HASH_INT_ROUND, HASH_LOAD,
    HASH_STORE_OUT, MAJOR_COUNT, MINOR_COUNT, MODE_USER,
};
use crate::{Ext, F};

/// Per-cycle input: exactly the previous cycle's output plus the
/// verifier challenges.
#[derive(Clone, Debug)]
pub struct CycleIn {
    pub pc: U32Val,
    pub state: MachineState,
    pub mode: F,
    /// Accumulator value carried in from the previous row.
    pub accum: Ext,
    /// In-flight hash operation, if one spans this row.
    pub hash: Option<HashState>,
    /// In-flight host-read stream, if one spans this row.
    pub io: Option<HostReadState>,
}

impl CycleIn {
    /// The boot state of a fresh trace.
    pub fn boot() -> Self {
        Self {
            pc: U32Val::zero(),
            state: MachineState::LoadRoot,
            mode: F::from_canonical_u32(MODE_USER),
            accum: Ext::zero(),
            hash: None,
            io: None,
        }
    }
}

/// Per-cycle output; feeds the next cycle's input.
#[derive(Clone, Debug)]
pub struct CycleOut {
    pub pc: U32Val,
    pub state: MachineState,
    pub mode: F,
    pub accum: Ext,
    pub hash: Option<HashState>,
    pub io: Option<HostReadState>,
    /// This row's lookup contribution (accum − carried-in).
    pub row_sum: Ext,
    /// Constraints evaluated on this row.
    pub constraints: usize,
}

impl CycleOut {
    pub fn to_input(&self) -> CycleIn {
        CycleIn {
            pc: self.pc,
            state: self.state,
            mode: self.mode,
            accum: self.accum,
            hash: self.hash.clone(),
            io: self.io,
        }
    }
}

/// The (major, minor) implied by a non-decode machine state.
fn state_major_minor(state: MachineState, hash: Option<&HashState>) -> (Major, u8) {
    match state {
        MachineState::LoadRoot => (Major::Control0, CTRL_LOAD_ROOT),
        MachineState::Resume => (Major::Control0, CTRL_RESUME),
        MachineState::Suspend => (Major::Control0, CTRL_SUSPEND),
        MachineState::StoreRoot => (Major::Control0, CTRL_STORE_ROOT),
        MachineState::EcallReadWords => (Major::Ecall0, ECALL_HOST_READ_WORDS),
        MachineState::HashLoad => (Major::Poseidon0, HASH_LOAD),
        MachineState::HashRound => {
            let round = hash.map(|h| h.round).unwrap_or(0) as usize;
            let internal = (ROUNDS_FULL / 2..ROUNDS_FULL / 2 + ROUNDS_PARTIAL).contains(&round);
            let minor = if internal { HASH_INT_ROUND } else { HASH_EXT_ROUND };
            (Major::Poseidon0, minor)
        }
        MachineState::HashOut => (Major::Poseidon0, HASH_CHECK_OUT),
        // Paging and Decode derive the pair inside their handlers.
        _ => unreachable!("state has no static pair"),
    }
}

/// Evaluate one proof cycle.
pub fn step_cycle<O: Oracle>(
    oracle: &mut O,
    challenges: &LookupChallenges,
    input: &CycleIn,
) -> Result<CycleOut, StepError> {
    let cycle = oracle.cycle();
    let mut checker = ConstraintChecker::new(cycle);
    let mut ledger = LookupLedger::new(*challenges);

    // The first cycle of a trace must boot through LoadRoot.
    let first = if oracle.is_first_cycle() { F::one() } else { F::zero() };
    checker.assert_bit("first_cycle_flag", first)?;
    checker.assert_zero(
        "first_cycle_state",
        first * (F::from_canonical_u32(input.state.code()) - F::from_canonical_u32(MachineState::LoadRoot.code())),
    )?;

    let mut pc = input.pc;
    let mut mode = input.mode;
    let mut hash = input.hash.clone();
    let mut io = input.io;

    let (next_state, major, minor) = match input.state {
        MachineState::LoadRoot => {
            let next = control_load_root(&mut checker, &mut ledger, oracle)?;
            (next, Major::Control0, CTRL_LOAD_ROOT)
        }
        MachineState::PagingIn | MachineState::PagingOut => {
            let dir = if input.state == MachineState::PagingIn {
                PagingDir::In
            } else {
                PagingDir::Out
            };
            let (outcome, minor) = paging_step(&mut checker, &mut ledger, oracle, dir)?;
            let next = match outcome {
                PagingOutcome::StartHash(h) => {
                    hash = Some(h);
                    MachineState::HashLoad
                }
                PagingOutcome::Finished(next) => next,
            };
            (next, Major::Paging0, minor)
        }
        MachineState::Resume => {
            let (new_pc, new_mode, next) = control_resume(&mut checker, &mut ledger, oracle)?;
            pc = new_pc;
            mode = new_mode;
            (next, Major::Control0, CTRL_RESUME)
        }
        MachineState::Decode => {
            let (outcome, major, minor) =
                dispatch_inst(&mut checker, &mut ledger, oracle, &pc, mode)?;
            pc = outcome.new_pc;
            mode = outcome.new_mode;
            if outcome.hash.is_some() {
                hash = outcome.hash;
            }
            io = outcome.io;
            (outcome.new_state, major, minor)
        }
        MachineState::Suspend => {
            let next = control_suspend(&mut checker, &mut ledger, oracle, &pc, mode)?;
            (next, Major::Control0, CTRL_SUSPEND)
        }
        MachineState::StoreRoot => {
            let next = control_store_root(&mut checker, &mut ledger, oracle)?;
            (next, Major::Control0, CTRL_STORE_ROOT)
        }
        MachineState::EcallReadWords => {
            let stream = io.take().ok_or_else(|| checker.unreachable_arm("missing_io_state"))?;
            let out = ecall_read_words(&mut checker, &mut ledger, oracle, stream)?;
            io = out.io;
            if out.hash.is_some() {
                hash = out.hash;
            }
            (out.new_state, Major::Ecall0, ECALL_HOST_READ_WORDS)
        }
        MachineState::HashLoad => {
            let state = hash.take().ok_or_else(|| checker.unreachable_arm("missing_hash_state"))?;
            let (_, claimed_minor) = state_major_minor(MachineState::HashLoad, Some(&state));
            let (state, next) = hash_load(&mut checker, &mut ledger, oracle, state)?;
            hash = Some(state);
            (next, Major::Poseidon0, claimed_minor)
        }
        MachineState::HashRound => {
            let state = hash.take().ok_or_else(|| checker.unreachable_arm("missing_hash_state"))?;
            let (_, claimed_minor) = state_major_minor(MachineState::HashRound, Some(&state));
            let (state, next) = hash_round(&mut checker, state)?;
            hash = Some(state);
            (next, Major::Poseidon0, claimed_minor)
        }
        MachineState::HashOut => {
            let state = hash.take().ok_or_else(|| checker.unreachable_arm("missing_hash_state"))?;
            let minor = if state.out_mode == crate::constraints::poseidon::OutMode::Check {
                HASH_CHECK_OUT
            } else {
                HASH_STORE_OUT
            };
            let next = hash_out(&mut checker, &mut ledger, oracle, state)?;
            (next, Major::Poseidon0, minor)
        }
        MachineState::Halted => {
            return Err(checker.unreachable_arm("step_after_halt"));
        }
    };

    // Bind the oracle's claimed dispatch pair for non-decode rows (the
    // decode path binds it against the decoded instruction itself) and
    // materialize the one-hot selectors the accumulation keys off.
    if input.state != MachineState::Decode {
        let (claimed_major, claimed_minor) = oracle.major_minor();
        checker.assert_eq(
            "dispatch_major",
            F::from_canonical_u32(claimed_major as u32),
            F::from_canonical_u32(major.index() as u32),
        )?;
        checker.assert_eq(
            "dispatch_minor",
            F::from_canonical_u32(claimed_minor as u32),
            F::from_canonical_u32(minor as u32),
        )?;
    }
    onehot(
        &mut checker,
        "major_onehot",
        major.index() as usize,
        F::from_canonical_u32(major.index() as u32),
        MAJOR_COUNT,
    )?;
    onehot(
        &mut checker,
        "minor_onehot",
        minor as usize,
        F::from_canonical_u32(minor as u32),
        MINOR_COUNT,
    )?;

    // Tell the oracle's multiplicity ledger about every scalar query.
    for (width, value) in ledger.scalar_queries() {
        oracle.lookup_delta(*width, *value, 1);
    }

    // Fold the row into the running accumulator and close.
    let mut accum = Accumulator::new(input.accum);
    let row_sum = accum.fold_row(&mut checker, &ledger)?;
    accum.close(&mut checker, input.accum + row_sum)?;

    debug!(
        cycle,
        state_in = ?input.state,
        state_out = ?next_state,
        major = ?major,
        minor,
        constraints = checker.emitted(),
        "cycle evaluated"
    );

    Ok(CycleOut {
        pc,
        state: next_state,
        mode,
        accum: accum.total(),
        hash,
        io,
        row_sum,
        constraints: checker.emitted(),
    })
}

/// The table-finalization row: folds the scalar tables' side into the
/// accumulator using the oracle's multiplicity ledger, cancelling every
/// query row of the trace. Runs once, after the machine halts.
pub fn finalize_tables<O: Oracle>(
    oracle: &mut O,
    challenges: &LookupChallenges,
    accum_in: Ext,
) -> Result<CycleOut, StepError> {
    let cycle = oracle.cycle();
    let mut checker = ConstraintChecker::new(cycle);
    let mut ledger = LookupLedger::new(*challenges);

    crate::constraints::accum::fold_scalar_table_sides(&mut ledger, oracle);

    let mut accum = Accumulator::new(accum_in);
    let row_sum = accum.fold_row(&mut checker, &ledger)?;
    accum.close(&mut checker, accum_in + row_sum)?;

    debug!(cycle, terms = ledger.terms().len(), "table sides folded");

    Ok(CycleOut {
        pc: U32Val::zero(),
        state: MachineState::Halted,
        mode: F::zero(),
        accum: accum.total(),
        hash: None,
        io: None,
        row_sum,
        constraints: checker.emitted(),
    })
}

/// A completed run: per-cycle accumulator column plus the final state.
pub struct TraceRun {
    /// One row per cycle, four extension coefficients per row.
    pub accum_column: RowMajorMatrix<F>,
    pub cycles: u32,
    pub final_pc: U32Val,
    pub final_state: MachineState,
}

/// Drive cycles until the machine halts (or `max_cycles` is hit, which
/// is a constraint failure of the driver's making, not the trace's).
pub fn run_to_halt<O: Oracle>(
    oracle: &mut O,
    challenges: &LookupChallenges,
    max_cycles: u32,
) -> Result<TraceRun, StepError> {
    let mut input = CycleIn::boot();
    let mut column = Vec::new();
    let mut cycles = 0;
    while input.state != MachineState::Halted {
        if cycles >= max_cycles {
            return Err(StepError::Constraint {
                cycle: cycles,
                label: "max_cycles_exceeded",
                values: vec![max_cycles],
            });
        }
        let out = step_cycle(oracle, challenges, &input)?;
        column.extend_from_slice(out.accum.as_base_slice());
        input = out.to_input();
        cycles += 1;
    }

    // One closing row cancels the scalar tables against their queries.
    let closing = finalize_tables(oracle, challenges, input.accum)?;
    column.extend_from_slice(closing.accum.as_base_slice());

    info!(cycles, pc = input.pc.to_u32(), "trace halted and closed");

    Ok(TraceRun {
        accum_column: RowMajorMatrix::new(column, 4),
        cycles,
        final_pc: input.pc,
        final_state: input.state,
    })
}
