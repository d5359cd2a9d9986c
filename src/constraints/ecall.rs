//! ECALL handling: host-dispatched effects.
//!
//! The handler reads the host-selected dispatch index from the machine
//! region and binds it to the selected minor, then performs one of the
//! fixed effects: terminate, host-read setup, host-read word streaming,
//! or host-write. Host-read data enters memory as host-supplied words
//! and is afterwards absorbed into the input digest under the byte
//! encoding, whose shift-polynomial check pins the declared length.

use p3_field::{AbstractField, PrimeField32};

use crate::constraints::alu::lt_unsigned;
use crate::constraints::checker::{ConstraintChecker, StepError};
use crate::constraints::lookup::LookupLedger;
use crate::constraints::memory::{memory_read, memory_write, memory_write_from_host, MemTxnKind};
use crate::constraints::poseidon::{AbsorbEncoding, HashState, OutMode};
use crate::constraints::word::{split_addr, U32Val};
use crate::oracle::Oracle;
use crate::types::{
    reg_word_addr, MachineState, ECALL_DISPATCH_WORD, ECALL_HOST_READ_SETUP, ECALL_HOST_READ_WORDS,
    ECALL_HOST_WRITE, ECALL_TERMINATE, INPUT_DIGEST_WORD, TERMINATE_A0_WORD, TERMINATE_A1_WORD,
};
use crate::F;

/// Words streamed per `EcallReadWords` cycle.
pub const READ_WORDS_PER_CYCLE: u32 = 4;

/// In-flight host-read stream, threaded across cycles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HostReadState {
    /// Word address the next write lands at.
    pub cursor_word: u32,
    /// Whole words still to stream.
    pub words_left: u32,
    /// Start of the destination buffer.
    pub base_word: u32,
    /// Host-declared byte length of the whole read.
    pub actual_len: u32,
}

/// What an ECALL cycle hands back to the dispatcher.
pub struct EcallOutcome {
    pub new_state: MachineState,
    pub io: Option<HostReadState>,
    pub hash: Option<HashState>,
}

/// Read the dispatch word and bind it to the claimed minor.
pub fn bind_dispatch_word<O: Oracle>(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    oracle: &mut O,
    minor: u8,
) -> Result<(), StepError> {
    let word = memory_read(checker, ledger, oracle, ECALL_DISPATCH_WORD)?;
    checker.assert_eq("ecall_dispatch_low", word.low, F::from_canonical_u32(minor as u32))?;
    checker.assert_zero("ecall_dispatch_high", word.high)?;
    Ok(())
}

/// The terminate effect: records (a0, a1) in the termination words and
/// heads for suspension.
pub fn ecall_terminate<O: Oracle>(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    oracle: &mut O,
) -> Result<EcallOutcome, StepError> {
    bind_dispatch_word(checker, ledger, oracle, ECALL_TERMINATE)?;
    let a0 = memory_read(checker, ledger, oracle, reg_word_addr(10))?;
    let a1 = memory_read(checker, ledger, oracle, reg_word_addr(11))?;
    memory_write(checker, ledger, oracle, TERMINATE_A0_WORD, a0)?;
    memory_write(checker, ledger, oracle, TERMINATE_A1_WORD, a1)?;
    Ok(EcallOutcome {
        new_state: MachineState::Suspend,
        io: None,
        hash: None,
    })
}

/// Host-read setup: takes (fd, ptr, len) from a0..a2, asks the host for
/// the actual length, checks alignment and the length decomposition,
/// and rewrites a0 with the actual count.
pub fn ecall_host_read_setup<O: Oracle>(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    oracle: &mut O,
) -> Result<EcallOutcome, StepError> {
    bind_dispatch_word(checker, ledger, oracle, ECALL_HOST_READ_SETUP)?;
    let fd = memory_read(checker, ledger, oracle, reg_word_addr(10))?;
    let ptr = memory_read(checker, ledger, oracle, reg_word_addr(11))?;
    let len = memory_read(checker, ledger, oracle, reg_word_addr(12))?;

    // The destination must be word-aligned.
    let split = split_addr(checker, ledger, &ptr)?;
    checker.assert_zero("host_read_align_a0", split.a0)?;
    checker.assert_zero("host_read_align_a1", split.a1)?;

    let actual_raw = oracle.host_read_prepare(fd.to_u32(), len.to_u32());
    let actual = U32Val::register(checker, ledger, actual_raw)?;
    // actual ≤ len.
    let over = lt_unsigned(checker, ledger, &len, &actual)?;
    checker.assert_zero("host_read_actual_bound", over)?;

    // Whole-word count: actual + pad == 4·nwords with a twit pad.
    let nwords_raw = actual_raw.div_ceil(4);
    let pad = F::from_canonical_u32(4 * nwords_raw - actual_raw);
    let nwords = F::from_canonical_u32(nwords_raw);
    checker.assert_twit("host_read_pad", pad)?;
    checker.assert_eq(
        "host_read_words",
        actual.low + actual.high * F::from_canonical_u32(1 << 16) + pad,
        nwords * F::from_canonical_u32(4),
    )?;

    memory_write(checker, ledger, oracle, reg_word_addr(10), actual)?;

    let cursor = split.word.as_canonical_u32();
    if nwords_raw == 0 {
        return Ok(EcallOutcome {
            new_state: MachineState::Decode,
            io: None,
            hash: None,
        });
    }
    Ok(EcallOutcome {
        new_state: MachineState::EcallReadWords,
        io: Some(HostReadState {
            cursor_word: cursor,
            words_left: nwords_raw,
            base_word: cursor,
            actual_len: actual_raw,
        }),
        hash: None,
    })
}

/// One streaming cycle: up to four host-supplied words written to the
/// buffer. When the stream drains, absorption of the buffer into the
/// input digest begins.
pub fn ecall_read_words<O: Oracle>(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    oracle: &mut O,
    mut io: HostReadState,
) -> Result<EcallOutcome, StepError> {
    let n = io.words_left.min(READ_WORDS_PER_CYCLE);
    for _ in 0..n {
        memory_write_from_host(checker, ledger, oracle, io.cursor_word)?;
        io.cursor_word += 1;
        io.words_left -= 1;
    }
    if io.words_left > 0 {
        return Ok(EcallOutcome {
            new_state: MachineState::EcallReadWords,
            io: Some(io),
            hash: None,
        });
    }

    // Absorb the buffer under the byte encoding; blocks cover the
    // declared length rounded up to 32 bytes.
    let blocks = io.actual_len.div_ceil(32).max(1);
    let hash = HashState::begin(
        io.base_word,
        blocks,
        MemTxnKind::Read,
        AbsorbEncoding::Bytes,
        INPUT_DIGEST_WORD,
        OutMode::Store,
        io.actual_len,
        MachineState::Decode,
    );
    Ok(EcallOutcome {
        new_state: MachineState::HashLoad,
        io: None,
        hash: Some(hash),
    })
}

/// Host-write: hands (fd, ptr, len) to the host and records the actual
/// count in a0.
pub fn ecall_host_write<O: Oracle>(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    oracle: &mut O,
) -> Result<EcallOutcome, StepError> {
    bind_dispatch_word(checker, ledger, oracle, ECALL_HOST_WRITE)?;
    let fd = memory_read(checker, ledger, oracle, reg_word_addr(10))?;
    let ptr = memory_read(checker, ledger, oracle, reg_word_addr(11))?;
    let len = memory_read(checker, ledger, oracle, reg_word_addr(12))?;

    let actual_raw = oracle.host_write(fd.to_u32(), ptr.to_u32(), len.to_u32());
    let actual = U32Val::register(checker, ledger, actual_raw)?;
    let over = lt_unsigned(checker, ledger, &len, &actual)?;
    checker.assert_zero("host_write_actual_bound", over)?;
    memory_write(checker, ledger, oracle, reg_word_addr(10), actual)?;

    Ok(EcallOutcome {
        new_state: MachineState::Decode,
        io: None,
        hash: None,
    })
}

/// Dispatch an ECALL instruction row on the host-selected minor.
pub fn ecall_dispatch<O: Oracle>(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    oracle: &mut O,
    minor: u8,
) -> Result<EcallOutcome, StepError> {
    match minor {
        ECALL_TERMINATE => ecall_terminate(checker, ledger, oracle),
        ECALL_HOST_READ_SETUP => ecall_host_read_setup(checker, ledger, oracle),
        ECALL_HOST_WRITE => ecall_host_write(checker, ledger, oracle),
        // Word streaming is a machine state, not an instruction row.
        ECALL_HOST_READ_WORDS => Err(checker.unreachable_arm("ecall_read_words_as_inst")),
        _ => Err(StepError::IllegalDispatch {
            cycle: checker.cycle(),
            major: crate::types::Major::Ecall0.index(),
            minor,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::lookup::LookupChallenges;
    use crate::oracle::testing::StubOracle;

    fn ctx(cycle: u32) -> (ConstraintChecker, LookupLedger) {
        (
            ConstraintChecker::new(cycle),
            LookupLedger::new(LookupChallenges::deterministic()),
        )
    }

    #[test]
    fn terminate_records_status() {
        let (mut checker, mut ledger) = ctx(1);
        let mut oracle = StubOracle::default();
        oracle.mem.insert(ECALL_DISPATCH_WORD, (0, ECALL_TERMINATE as u32));
        oracle.mem.insert(reg_word_addr(10), (0, 0));
        oracle.mem.insert(reg_word_addr(11), (0, 0xAA55));
        let out = ecall_terminate(&mut checker, &mut ledger, &mut oracle).unwrap();
        assert_eq!(out.new_state, MachineState::Suspend);
        assert_eq!(oracle.mem[&TERMINATE_A1_WORD].1, 0xAA55);
    }

    #[test]
    fn dispatch_word_binds_minor() {
        let (mut checker, mut ledger) = ctx(1);
        let mut oracle = StubOracle::default();
        oracle.mem.insert(ECALL_DISPATCH_WORD, (0, ECALL_HOST_WRITE as u32));
        // Terminate claimed but the host region says host-write.
        assert!(ecall_terminate(&mut checker, &mut ledger, &mut oracle).is_err());
    }

    #[test]
    fn host_read_setup_builds_stream() {
        let (mut checker, mut ledger) = ctx(1);
        let mut oracle = StubOracle::default();
        oracle
            .mem
            .insert(ECALL_DISPATCH_WORD, (0, ECALL_HOST_READ_SETUP as u32));
        oracle.mem.insert(reg_word_addr(10), (0, 3)); // fd
        oracle.mem.insert(reg_word_addr(11), (0, 0x1000)); // byte ptr
        oracle.mem.insert(reg_word_addr(12), (0, 10)); // len
        let out = ecall_host_read_setup(&mut checker, &mut ledger, &mut oracle).unwrap();
        assert_eq!(out.new_state, MachineState::EcallReadWords);
        let io = out.io.unwrap();
        assert_eq!(io.base_word, 0x1000 >> 2);
        assert_eq!(io.words_left, 3); // ceil(10 / 4)
        assert_eq!(io.actual_len, 10);
        // a0 now holds the actual length.
        assert_eq!(oracle.mem[&reg_word_addr(10)].1, 10);
    }

    #[test]
    fn read_words_drains_then_hashes() {
        let (mut checker, mut ledger) = ctx(2);
        let mut oracle = StubOracle::default();
        for i in 0..3u32 {
            oracle.pending.insert(0x400 + i, 0x11 * (i + 1));
        }
        let io = HostReadState {
            cursor_word: 0x400,
            words_left: 3,
            base_word: 0x400,
            actual_len: 10,
        };
        let out = ecall_read_words(&mut checker, &mut ledger, &mut oracle, io).unwrap();
        assert_eq!(out.new_state, MachineState::HashLoad);
        let hash = out.hash.unwrap();
        assert_eq!(hash.in_addr, 0x400);
        assert_eq!(hash.blocks_left, 1);
        assert_eq!(hash.remaining_len, 10);
        assert_eq!(oracle.mem[&0x401].1, 0x22);
    }

    #[test]
    fn misaligned_host_read_fails() {
        let (mut checker, mut ledger) = ctx(1);
        let mut oracle = StubOracle::default();
        oracle
            .mem
            .insert(ECALL_DISPATCH_WORD, (0, ECALL_HOST_READ_SETUP as u32));
        oracle.mem.insert(reg_word_addr(10), (0, 3));
        oracle.mem.insert(reg_word_addr(11), (0, 0x1002)); // halfword-aligned only
        oracle.mem.insert(reg_word_addr(12), (0, 8));
        assert!(ecall_host_read_setup(&mut checker, &mut ledger, &mut oracle).is_err());
    }
}
