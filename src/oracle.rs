//! The nondeterministic oracle boundary.
//!
//! Every "nondeterministic" value the step circuit consumes (memory
//! transactions, division results, paging indices, host I/O lengths) is
//! supplied synchronously by this trait before constraint evaluation.
//! The circuit never trusts an answer: each hint is bound by constraints
//! emitted at the call site, so a lying oracle produces an invalid row,
//! never a wrong-but-accepted one.
//!
//! The trait is injected into the evaluator so that host-side witness
//! generation and pure recomputation/verification share the same
//! constraint code. Hint structs are serde-serializable so a recorded
//! hint stream can be replayed.

use serde::{Deserialize, Serialize};

use crate::F;

/// One (old, new) memory transaction pair at a word address.
///
/// `new_low`/`new_high` carry host-chosen data and are only meaningful
/// for host-input writes and page-ins; for circuit-computed writes the
/// circuit substitutes its own value and for read-only kinds it asserts
/// `new == old`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemTxnHint {
    /// Logical cycle of the old record.
    pub old_cycle: u32,
    pub old_low: u32,
    pub old_high: u32,
    pub new_low: u32,
    pub new_high: u32,
}

/// Quotient/remainder pair supplied for a division row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivideHint {
    pub quot: u32,
    pub rem: u32,
}

/// What the paging walk should do at the supplied index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PagingMode {
    /// 8-word tree node at the index.
    Node,
    /// 32-word leaf page at the index.
    Page,
    /// Index out of range: the walk is over.
    Done,
}

/// Next step of the paging walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingHint {
    pub index: u32,
    pub mode: PagingMode,
}

/// Width of a scalar range-check table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LookupWidth {
    /// The 2^8 byte table.
    Byte,
    /// The 2^16 halfword table.
    Half,
    /// The 2^16 cycle-difference table.
    CycleDiff,
}

/// The oracle interface the external collaborator implements.
///
/// All calls are synchronous; nothing here blocks or suspends. `log` is
/// diagnostic only and has no constraint effect.
pub trait Oracle {
    /// 1 on the first cycle of the trace, 0 otherwise.
    fn is_first_cycle(&mut self) -> bool;

    /// The machine cycle counter for this row.
    fn cycle(&mut self) -> u32;

    /// The (major, minor) dispatch pair claimed for this row. The circuit
    /// re-derives the pair and asserts agreement.
    fn major_minor(&mut self) -> (u8, u8);

    /// The (old, new) transaction pair for a memory access at `addr`.
    fn mem_txn(&mut self, addr: u32) -> MemTxnHint;

    /// Notification that a memory record was folded into the memory
    /// lookup with the given count delta (+1 insert, -1 remove).
    fn memory_delta(&mut self, addr: u32, cycle: u32, low: u32, high: u32, count_delta: i32);

    /// Notification that a scalar table was queried.
    fn lookup_delta(&mut self, width: LookupWidth, value: u32, count_delta: i32);

    /// Current multiplicity of a scalar table entry.
    fn lookup_current(&mut self, width: LookupWidth, value: u32) -> u32;

    /// Table-side multiplicity of a cycle-difference value.
    fn diff_count(&mut self, value: u32) -> u32;

    /// Quotient/remainder for `numer / denom` under the RV32M rules.
    /// `signed` selects DIV/REM semantics over DIVU/REMU.
    fn divide(&mut self, numer: u32, denom: u32, signed: bool) -> DivideHint;

    /// Prepare a host read on `fd` for up to `len` bytes; returns the
    /// actual byte count the host will supply.
    fn host_read_prepare(&mut self, fd: u32, len: u32) -> u32;

    /// Host write of `len` bytes at byte pointer `ptr`; returns the
    /// actual count written.
    fn host_write(&mut self, fd: u32, ptr: u32, len: u32) -> u32;

    /// Next index of the paging walk.
    fn next_paging_idx(&mut self) -> PagingHint;

    /// Diagnostic logging; no constraint effect.
    fn log(&mut self, label: &str, values: &[F]);
}

/// A serializable transcript of every hint an oracle produced, in call
/// order per kind.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintTranscript {
    pub first: Vec<bool>,
    pub cycles: Vec<u32>,
    pub dispatch: Vec<(u8, u8)>,
    pub mem: Vec<MemTxnHint>,
    pub divides: Vec<DivideHint>,
    pub lookup_currents: Vec<u32>,
    pub diff_counts: Vec<u32>,
    pub host_reads: Vec<u32>,
    pub host_writes: Vec<u32>,
    pub paging: Vec<PagingHint>,
}

/// Wraps a live oracle and records every answer, so the same trace can
/// later be re-checked without the host.
pub struct RecordingOracle<'a, O: Oracle> {
    inner: &'a mut O,
    pub transcript: HintTranscript,
}

impl<'a, O: Oracle> RecordingOracle<'a, O> {
    pub fn new(inner: &'a mut O) -> Self {
        Self {
            inner,
            transcript: HintTranscript::default(),
        }
    }

    pub fn into_transcript(self) -> HintTranscript {
        self.transcript
    }
}

impl<O: Oracle> Oracle for RecordingOracle<'_, O> {
    fn is_first_cycle(&mut self) -> bool {
        let v = self.inner.is_first_cycle();
        self.transcript.first.push(v);
        v
    }

    fn cycle(&mut self) -> u32 {
        let v = self.inner.cycle();
        self.transcript.cycles.push(v);
        v
    }

    fn major_minor(&mut self) -> (u8, u8) {
        let v = self.inner.major_minor();
        self.transcript.dispatch.push(v);
        v
    }

    fn mem_txn(&mut self, addr: u32) -> MemTxnHint {
        let v = self.inner.mem_txn(addr);
        self.transcript.mem.push(v);
        v
    }

    fn memory_delta(&mut self, addr: u32, cycle: u32, low: u32, high: u32, count_delta: i32) {
        self.inner.memory_delta(addr, cycle, low, high, count_delta);
    }

    fn lookup_delta(&mut self, width: LookupWidth, value: u32, count_delta: i32) {
        self.inner.lookup_delta(width, value, count_delta);
    }

    fn lookup_current(&mut self, width: LookupWidth, value: u32) -> u32 {
        let v = self.inner.lookup_current(width, value);
        self.transcript.lookup_currents.push(v);
        v
    }

    fn diff_count(&mut self, value: u32) -> u32 {
        let v = self.inner.diff_count(value);
        self.transcript.diff_counts.push(v);
        v
    }

    fn divide(&mut self, numer: u32, denom: u32, signed: bool) -> DivideHint {
        let v = self.inner.divide(numer, denom, signed);
        self.transcript.divides.push(v);
        v
    }

    fn host_read_prepare(&mut self, fd: u32, len: u32) -> u32 {
        let v = self.inner.host_read_prepare(fd, len);
        self.transcript.host_reads.push(v);
        v
    }

    fn host_write(&mut self, fd: u32, ptr: u32, len: u32) -> u32 {
        let v = self.inner.host_write(fd, ptr, len);
        self.transcript.host_writes.push(v);
        v
    }

    fn next_paging_idx(&mut self) -> PagingHint {
        let v = self.inner.next_paging_idx();
        self.transcript.paging.push(v);
        v
    }

    fn log(&mut self, label: &str, values: &[F]) {
        self.inner.log(label, values);
    }
}

/// Replays a recorded transcript: pure recomputation of the constraint
/// checks with no host behind it. Running out of any hint stream panics,
/// which means the replayed circuit diverged from the recording.
pub struct ReplayOracle {
    transcript: HintTranscript,
    pos: ReplayCursor,
}

#[derive(Default)]
struct ReplayCursor {
    first: usize,
    cycles: usize,
    dispatch: usize,
    mem: usize,
    divides: usize,
    lookup_currents: usize,
    diff_counts: usize,
    host_reads: usize,
    host_writes: usize,
    paging: usize,
}

impl ReplayOracle {
    pub fn new(transcript: HintTranscript) -> Self {
        Self {
            transcript,
            pos: ReplayCursor::default(),
        }
    }

    fn next<T: Copy>(stream: &[T], pos: &mut usize, what: &str) -> T {
        let v = stream
            .get(*pos)
            .unwrap_or_else(|| panic!("replay exhausted: {what}"));
        *pos += 1;
        *v
    }
}

impl Oracle for ReplayOracle {
    fn is_first_cycle(&mut self) -> bool {
        Self::next(&self.transcript.first, &mut self.pos.first, "first")
    }

    fn cycle(&mut self) -> u32 {
        Self::next(&self.transcript.cycles, &mut self.pos.cycles, "cycle")
    }

    fn major_minor(&mut self) -> (u8, u8) {
        Self::next(&self.transcript.dispatch, &mut self.pos.dispatch, "dispatch")
    }

    fn mem_txn(&mut self, _addr: u32) -> MemTxnHint {
        Self::next(&self.transcript.mem, &mut self.pos.mem, "mem_txn")
    }

    fn memory_delta(&mut self, _: u32, _: u32, _: u32, _: u32, _: i32) {}

    fn lookup_delta(&mut self, _: LookupWidth, _: u32, _: i32) {}

    fn lookup_current(&mut self, _: LookupWidth, _: u32) -> u32 {
        Self::next(
            &self.transcript.lookup_currents,
            &mut self.pos.lookup_currents,
            "lookup_current",
        )
    }

    fn diff_count(&mut self, _: u32) -> u32 {
        Self::next(&self.transcript.diff_counts, &mut self.pos.diff_counts, "diff_count")
    }

    fn divide(&mut self, _: u32, _: u32, _: bool) -> DivideHint {
        Self::next(&self.transcript.divides, &mut self.pos.divides, "divide")
    }

    fn host_read_prepare(&mut self, _: u32, _: u32) -> u32 {
        Self::next(&self.transcript.host_reads, &mut self.pos.host_reads, "host_read")
    }

    fn host_write(&mut self, _: u32, _: u32, _: u32) -> u32 {
        Self::next(&self.transcript.host_writes, &mut self.pos.host_writes, "host_write")
    }

    fn next_paging_idx(&mut self) -> PagingHint {
        Self::next(&self.transcript.paging, &mut self.pos.paging, "paging")
    }

    fn log(&mut self, _label: &str, _values: &[F]) {}
}


/// Reference RV32M division semantics, usable by oracle implementations.
///
/// Divide-by-zero yields quotient `-1` (all ones) and remainder `numer`;
/// the signed overflow row `MIN / -1` yields quotient `MIN`, remainder 0.
pub fn rv32m_divide(numer: u32, denom: u32, signed: bool) -> DivideHint {
    if denom == 0 {
        return DivideHint {
            quot: u32::MAX,
            rem: numer,
        };
    }
    if signed {
        let n = numer as i32;
        let d = denom as i32;
        if n == i32::MIN && d == -1 {
            return DivideHint {
                quot: i32::MIN as u32,
                rem: 0,
            };
        }
        DivideHint {
            quot: n.wrapping_div(d) as u32,
            rem: n.wrapping_rem(d) as u32,
        }
    } else {
        DivideHint {
            quot: numer / denom,
            rem: numer % denom,
        }
    }
}
