//! Shared types for the step circuit: instruction majors/minors, machine
//! states, and the fixed memory layout of the machine-visible register
//! region and the paged continuation storage.
//!
//! The memory space is word-addressed: a 32-bit byte address maps to a
//! word address below 2^30, which fits a single field element. Machine
//! special registers and the node-digest storage live at fixed word
//! addresses and are touched exclusively through the memory subsystem.

use serde::{Deserialize, Serialize};

/// Bytes per machine word.
pub const WORD_SIZE: u32 = 4;

/// Number of minor slots under each major.
pub const MINOR_COUNT: usize = 8;

/// Number of majors in the dispatch table.
pub const MAJOR_COUNT: usize = 11;

// ---------------------------------------------------------------------------
// Memory layout (word addresses)
// ---------------------------------------------------------------------------

/// Base of the machine special-register region.
pub const MACHINE_REGS_WORD: u32 = 0x3FFF_F000;

/// Saved pc across suspend/resume.
pub const SUSPEND_PC_WORD: u32 = MACHINE_REGS_WORD;
/// Saved privilege mode across suspend/resume.
pub const SUSPEND_MODE_WORD: u32 = MACHINE_REGS_WORD + 1;
/// Host-selected ECALL dispatch index.
pub const ECALL_DISPATCH_WORD: u32 = MACHINE_REGS_WORD + 2;
/// Machine-mode return address consumed by MRET.
pub const MEPC_WORD: u32 = MACHINE_REGS_WORD + 3;
/// Termination status words written by the terminate ECALL.
pub const TERMINATE_A0_WORD: u32 = MACHINE_REGS_WORD + 4;
pub const TERMINATE_A1_WORD: u32 = MACHINE_REGS_WORD + 5;
/// Continuation state digest, 8 words.
pub const STATE_DIGEST_WORD: u32 = MACHINE_REGS_WORD + 8;
/// Input digest produced by host-read absorption, 8 words.
pub const INPUT_DIGEST_WORD: u32 = MACHINE_REGS_WORD + 16;

/// Base of the user register file (x0..x31), one word per register.
pub const USER_REGS_WORD: u32 = 0x3FFF_F080;

/// Word address of user register `reg`.
#[inline]
pub fn reg_word_addr(reg: u32) -> u32 {
    debug_assert!(reg < 32);
    USER_REGS_WORD + reg
}

// ---------------------------------------------------------------------------
// Paging layout
// ---------------------------------------------------------------------------

/// Words per paged page.
pub const PAGE_WORDS: u32 = 32;
/// Words per tree node digest.
pub const NODE_WORDS: u32 = 8;
/// First leaf page index; indices [1, PAGE_INDEX_BASE) are tree nodes.
pub const PAGE_INDEX_BASE: u32 = 1 << 20;
/// One past the last leaf page index.
pub const PAGE_INDEX_END: u32 = 1 << 21;
/// Root node index of the page tree.
pub const ROOT_INDEX: u32 = 1;
/// Base of the node/page digest storage region.
pub const NODE_STORE_WORD: u32 = 0x0800_0000;

/// Word address of the stored digest for page-tree index `idx`.
#[inline]
pub fn digest_word_addr(idx: u32) -> u32 {
    NODE_STORE_WORD + idx * NODE_WORDS
}

/// Base word address of the data covered by leaf page index `idx`.
#[inline]
pub fn page_base_word(idx: u32) -> u32 {
    debug_assert!((PAGE_INDEX_BASE..PAGE_INDEX_END).contains(&idx));
    (idx - PAGE_INDEX_BASE) * PAGE_WORDS
}

// ---------------------------------------------------------------------------
// Privilege modes
// ---------------------------------------------------------------------------

/// User privilege mode.
pub const MODE_USER: u32 = 0;
/// Machine privilege mode.
pub const MODE_MACHINE: u32 = 1;

// ---------------------------------------------------------------------------
// Majors
// ---------------------------------------------------------------------------

/// Instruction-class majors of the dispatch table. Each major selects
/// among up to [`MINOR_COUNT`] minors via a one-hot vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Major {
    /// ADD SUB XOR OR AND SLT SLTU ADDI
    Misc0,
    /// XORI ORI ANDI SLTI SLTIU BEQ BNE BLT
    Misc1,
    /// BGE BLTU BGEU JAL JALR LUI AUIPC
    Misc2,
    /// MUL MULH MULHSU MULHU SLL SLLI
    Mul0,
    /// DIV DIVU REM REMU SRL SRA SRLI SRAI
    Div0,
    /// LB LH LW LBU LHU
    Mem0,
    /// SB SH SW
    Mem1,
    /// LoadRoot Resume Suspend StoreRoot Mret
    Control0,
    /// Terminate HostReadSetup HostReadWords HostWrite
    Ecall0,
    /// Load ExtRound IntRound CheckOut StoreOut
    Poseidon0,
    /// LoadNode LoadPage StoreNode StorePage Done
    Paging0,
}

impl Major {
    /// Dispatch-table index of this major.
    pub fn index(self) -> u8 {
        match self {
            Major::Misc0 => 0,
            Major::Misc1 => 1,
            Major::Misc2 => 2,
            Major::Mul0 => 3,
            Major::Div0 => 4,
            Major::Mem0 => 5,
            Major::Mem1 => 6,
            Major::Control0 => 7,
            Major::Ecall0 => 8,
            Major::Poseidon0 => 9,
            Major::Paging0 => 10,
        }
    }

    /// Major for a dispatch-table index.
    pub fn from_index(idx: u8) -> Option<Major> {
        Some(match idx {
            0 => Major::Misc0,
            1 => Major::Misc1,
            2 => Major::Misc2,
            3 => Major::Mul0,
            4 => Major::Div0,
            5 => Major::Mem0,
            6 => Major::Mem1,
            7 => Major::Control0,
            8 => Major::Ecall0,
            9 => Major::Poseidon0,
            10 => Major::Paging0,
            _ => return None,
        })
    }
}

// Minor indices under Control0.
pub const CTRL_LOAD_ROOT: u8 = 0;
pub const CTRL_RESUME: u8 = 1;
pub const CTRL_SUSPEND: u8 = 2;
pub const CTRL_STORE_ROOT: u8 = 3;
pub const CTRL_MRET: u8 = 4;

// Minor indices under Ecall0. These double as the host-supplied dispatch
// codes stored at ECALL_DISPATCH_WORD.
pub const ECALL_TERMINATE: u8 = 0;
pub const ECALL_HOST_READ_SETUP: u8 = 1;
pub const ECALL_HOST_READ_WORDS: u8 = 2;
pub const ECALL_HOST_WRITE: u8 = 3;

// Minor indices under Poseidon0.
pub const HASH_LOAD: u8 = 0;
pub const HASH_EXT_ROUND: u8 = 1;
pub const HASH_INT_ROUND: u8 = 2;
pub const HASH_CHECK_OUT: u8 = 3;
pub const HASH_STORE_OUT: u8 = 4;

// Minor indices under Paging0.
pub const PAGING_LOAD_NODE: u8 = 0;
pub const PAGING_LOAD_PAGE: u8 = 1;
pub const PAGING_STORE_NODE: u8 = 2;
pub const PAGING_STORE_PAGE: u8 = 3;
pub const PAGING_DONE: u8 = 4;

// ---------------------------------------------------------------------------
// Machine states
// ---------------------------------------------------------------------------

/// Interpreter state code carried from row to row. Together with the
/// privilege mode this forms the state of the control state machine;
/// transitions are produced only by the minor handler selected for the
/// row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineState {
    /// Streaming the root digest in; the first state of a trace.
    LoadRoot,
    /// Walking the page tree, loading nodes and pages.
    PagingIn,
    /// Restoring pc/mode/digest from the machine region.
    Resume,
    /// Ready to fetch and dispatch an instruction.
    Decode,
    /// Persisting pc/mode/digest back to the machine region.
    Suspend,
    /// Walking the page tree, storing nodes and pages.
    PagingOut,
    /// Streaming the root digest out; next state is Halted.
    StoreRoot,
    /// Streaming host-read words into memory.
    EcallReadWords,
    /// Absorbing memory-resident input into the sponge.
    HashLoad,
    /// Running one permutation round per cycle.
    HashRound,
    /// Checking or storing the sponge digest.
    HashOut,
    /// Terminal state; the trace is complete.
    Halted,
}

impl MachineState {
    /// Stable numeric code of this state, as exposed in the row.
    pub fn code(self) -> u32 {
        match self {
            MachineState::LoadRoot => 0,
            MachineState::PagingIn => 1,
            MachineState::Resume => 2,
            MachineState::Decode => 3,
            MachineState::Suspend => 4,
            MachineState::PagingOut => 5,
            MachineState::StoreRoot => 6,
            MachineState::EcallReadWords => 7,
            MachineState::HashLoad => 8,
            MachineState::HashRound => 9,
            MachineState::HashOut => 10,
            MachineState::Halted => 11,
        }
    }
}
