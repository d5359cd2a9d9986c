//! Host-side test oracle: a sparse memory image plus scripted hints.
//!
//! This is the external collaborator's role, reduced to what the
//! scenarios need: it answers memory transactions from its own image,
//! applies record updates it is notified of, divides per the RV32M
//! rules, and replays scripted paging indices, dispatch pairs, and host
//! read data. Every answer is still bound by the circuit's constraints.

use std::collections::{HashMap, VecDeque};

use p3_field::AbstractField;

use rv32im_circuit::constraints::accum::contribution;
use rv32im_circuit::constraints::lookup::{LookupChallenges, LookupLedger, TableKind};
use rv32im_circuit::constraints::word::U32Val;
use rv32im_circuit::oracle::{
    rv32m_divide, DivideHint, LookupWidth, MemTxnHint, Oracle, PagingHint, PagingMode,
};
use rv32im_circuit::{Ext, F};

/// A recorded memory-record delta: (addr, cycle, low, high, count).
pub type MemDelta = (u32, u32, u32, u32, i32);

/// Route `RUST_LOG`-filtered tracing to the test output; safe to call
/// from every test.
#[allow(dead_code)]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Execute a single instruction row from a Decode state at `pc`.
#[allow(dead_code)]
pub fn exec_one(
    oracle: &mut TestOracle,
    pc: u32,
    inst: u32,
    pair: (u8, u8),
) -> Result<rv32im_circuit::CycleOut, rv32im_circuit::StepError> {
    use rv32im_circuit::cycle::CycleIn;
    use rv32im_circuit::{MachineState, F as Fld};

    oracle.set_word(pc >> 2, inst);
    oracle.plan(&[pair]);
    let input = CycleIn {
        pc: U32Val::from_u32(pc),
        state: MachineState::Decode,
        mode: Fld::zero(),
        accum: Ext::zero(),
        hash: None,
        io: None,
    };
    rv32im_circuit::step_cycle(oracle, &LookupChallenges::deterministic(), &input)
}

/// The (major, minor) pair a hash-engine state will take next, matching
/// the dispatcher's round schedule.
#[allow(dead_code)]
pub fn poseidon_pair(out: &rv32im_circuit::CycleOut) -> (u8, u8) {
    use rv32im_circuit::constraints::poseidon::OutMode;
    use rv32im_circuit::types as t;
    use rv32im_circuit::MachineState;

    let minor = match out.state {
        MachineState::HashLoad => t::HASH_LOAD,
        MachineState::HashRound => {
            let round = out.hash.as_ref().expect("hash state").round as usize;
            if (4..25).contains(&round) {
                t::HASH_INT_ROUND
            } else {
                t::HASH_EXT_ROUND
            }
        }
        MachineState::HashOut => {
            if out.hash.as_ref().expect("hash state").out_mode == OutMode::Check {
                t::HASH_CHECK_OUT
            } else {
                t::HASH_STORE_OUT
            }
        }
        other => panic!("not a hash state: {other:?}"),
    };
    (rv32im_circuit::Major::Poseidon0.index(), minor)
}

#[derive(Default)]
pub struct TestOracle {
    /// word addr -> (logical cycle, value) of the live record.
    pub mem: HashMap<u32, (u32, u32)>,
    /// Old record at first touch, per address (the pre-trace image).
    pub initial: HashMap<u32, (u32, u32)>,
    /// Every memory delta the circuit folded, in order.
    pub deltas: Vec<MemDelta>,
    /// Scalar-table query counts.
    pub counts: HashMap<(LookupWidth, u32), i64>,
    /// Claimed (major, minor) per row, front first.
    pub planned: VecDeque<(u8, u8)>,
    /// Paging walk script, front first.
    pub paging: VecDeque<PagingHint>,
    /// Host read payload words, front first.
    pub host_data: VecDeque<u32>,
    /// Byte length the host will declare for the next read.
    pub host_len: u32,
    host_words_left: u32,
    clock: u32,
    last_cycle: u32,
}

impl TestOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the clock past zero, as if earlier segments already ran;
    /// rows no longer claim to be the first cycle.
    pub fn start_mid_trace(&mut self) {
        self.clock = 8;
    }

    pub fn set_word(&mut self, addr: u32, value: u32) {
        self.mem.insert(addr, (0, value));
    }

    pub fn word(&self, addr: u32) -> u32 {
        self.mem.get(&addr).map(|(_, v)| *v).unwrap_or(0)
    }

    pub fn plan(&mut self, pairs: &[(u8, u8)]) {
        self.planned.extend(pairs.iter().copied());
    }

    /// Count of write-insertions folded for `addr`.
    pub fn writes_to(&self, addr: u32) -> usize {
        self.deltas
            .iter()
            .filter(|(a, cycle, _, _, d)| *a == addr && *d > 0 && cycle % 4 == 2)
            .count()
    }

    /// The whole-trace closure sum: the final accumulator plus the
    /// table sides of every scalar lookup plus the memory boundary
    /// (initial insertions, final removals). Zero for a consistent
    /// trace.
    pub fn closure_sum(&self, final_accum: Ext, challenges: &LookupChallenges) -> Ext {
        let ledger = LookupLedger::new(*challenges);
        let mut total = final_accum;

        for (&(width, value), &count) in &self.counts {
            let table = match width {
                LookupWidth::Byte => TableKind::Byte,
                LookupWidth::Half => TableKind::Half,
                LookupWidth::CycleDiff => TableKind::CycleDiff,
            };
            let c = contribution(
                challenges,
                table,
                rv32im_circuit::ext(F::from_canonical_u32(value)),
                F::from_canonical_u32(count as u32),
            )
            .expect("challenge collision");
            total -= c;
        }

        for (&addr, &(cycle, value)) in &self.initial {
            let key = ledger.memory_key(
                F::from_canonical_u32(addr),
                F::from_canonical_u32(cycle),
                &U32Val::from_u32(value),
            );
            total += contribution(challenges, TableKind::Memory, key, F::one())
                .expect("challenge collision");
        }
        for (&addr, &(cycle, value)) in &self.mem {
            if !self.initial.contains_key(&addr) {
                continue;
            }
            let key = ledger.memory_key(
                F::from_canonical_u32(addr),
                F::from_canonical_u32(cycle),
                &U32Val::from_u32(value),
            );
            total -= contribution(challenges, TableKind::Memory, key, F::one())
                .expect("challenge collision");
        }
        total
    }
}

impl Oracle for TestOracle {
    fn is_first_cycle(&mut self) -> bool {
        self.last_cycle == 0
    }

    fn cycle(&mut self) -> u32 {
        let c = self.clock;
        self.clock += 1;
        self.last_cycle = c;
        c
    }

    fn major_minor(&mut self) -> (u8, u8) {
        self.planned.pop_front().expect("dispatch plan exhausted")
    }

    fn mem_txn(&mut self, addr: u32) -> MemTxnHint {
        let (old_cycle, old) = self.mem.get(&addr).copied().unwrap_or((0, 0));
        self.initial.entry(addr).or_insert((old_cycle, old));
        let new = if self.host_words_left > 0 {
            self.host_words_left -= 1;
            self.host_data.pop_front().unwrap_or(0)
        } else {
            old
        };
        MemTxnHint {
            old_cycle,
            old_low: old & 0xFFFF,
            old_high: old >> 16,
            new_low: new & 0xFFFF,
            new_high: new >> 16,
        }
    }

    fn memory_delta(&mut self, addr: u32, cycle: u32, low: u32, high: u32, count_delta: i32) {
        self.deltas.push((addr, cycle, low, high, count_delta));
        if count_delta > 0 {
            self.mem.insert(addr, (cycle, low | (high << 16)));
        }
    }

    fn lookup_delta(&mut self, width: LookupWidth, value: u32, count_delta: i32) {
        *self.counts.entry((width, value)).or_insert(0) += count_delta as i64;
    }

    fn lookup_current(&mut self, width: LookupWidth, value: u32) -> u32 {
        self.counts.get(&(width, value)).copied().unwrap_or(0) as u32
    }

    fn diff_count(&mut self, value: u32) -> u32 {
        self.counts
            .get(&(LookupWidth::CycleDiff, value))
            .copied()
            .unwrap_or(0) as u32
    }

    fn divide(&mut self, numer: u32, denom: u32, signed: bool) -> DivideHint {
        rv32m_divide(numer, denom, signed)
    }

    fn host_read_prepare(&mut self, _fd: u32, len: u32) -> u32 {
        let actual = self.host_len.min(len);
        self.host_words_left = actual.div_ceil(4);
        actual
    }

    fn host_write(&mut self, _fd: u32, _ptr: u32, len: u32) -> u32 {
        len
    }

    fn next_paging_idx(&mut self) -> PagingHint {
        self.paging.pop_front().unwrap_or(PagingHint {
            index: 0,
            mode: PagingMode::Done,
        })
    }

    fn log(&mut self, _label: &str, _values: &[F]) {}
}
