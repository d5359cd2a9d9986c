//! Instruction decoder.
//!
//! The fetched word is decomposed into 13 twits and 6 bits aligned to the
//! RV32 field boundaries. Both halves of the word must reassemble exactly
//! from the witnesses; the opcode/register/function fields and all five
//! immediate encodings are fixed linear combinations of the same
//! witnesses, so no field can disagree with the word it came from.
//!
//! Witness layout over the instruction bits:
//!
//! ```text
//! [1:0][3:2][5:4] 6 | 7 [9:8][11:10] | [13:12] 14 | 15 [17:16][19:18]
//!   opcode          |     rd         |   func3    |     rs1
//! | 20 [22:21][24:23] | [26:25][28:27][30:29] 31
//! |       rs2         |          func7
//! ```

use p3_field::{AbstractField, PrimeField32};

use crate::constraints::checker::{ConstraintChecker, StepError};
use crate::constraints::word::U32Val;
use crate::F;

/// The decoded fields of one instruction word.
#[derive(Clone, Debug)]
pub struct DecodedInst {
    pub opcode: F,
    pub rd: F,
    pub func3: F,
    pub rs1: F,
    pub rs2: F,
    pub func7: F,
    pub imm_i: U32Val,
    pub imm_s: U32Val,
    pub imm_b: U32Val,
    pub imm_u: U32Val,
    pub imm_j: U32Val,
}

impl DecodedInst {
    pub fn opcode_u32(&self) -> u32 {
        self.opcode.as_canonical_u32()
    }
    pub fn rd_u32(&self) -> u32 {
        self.rd.as_canonical_u32()
    }
    pub fn rs1_u32(&self) -> u32 {
        self.rs1.as_canonical_u32()
    }
    pub fn rs2_u32(&self) -> u32 {
        self.rs2.as_canonical_u32()
    }
    pub fn func3_u32(&self) -> u32 {
        self.func3.as_canonical_u32()
    }
    pub fn func7_u32(&self) -> u32 {
        self.func7.as_canonical_u32()
    }
}

struct W {
    t01: F,
    t23: F,
    t45: F,
    b6: F,
    b7: F,
    t89: F,
    t1011: F,
    t1213: F,
    b14: F,
    b15: F,
    t1617: F,
    t1819: F,
    b20: F,
    t2122: F,
    t2324: F,
    t2526: F,
    t2728: F,
    t2930: F,
    b31: F,
}

fn c(v: u32) -> F {
    F::from_canonical_u32(v)
}

/// Decode an instruction word.
pub fn decode_inst(checker: &mut ConstraintChecker, inst: &U32Val) -> Result<DecodedInst, StepError> {
    let raw = inst.to_u32();
    let twit = |s: u32| F::from_canonical_u32((raw >> s) & 3);
    let bit = |s: u32| F::from_canonical_u32((raw >> s) & 1);

    let w = W {
        t01: twit(0),
        t23: twit(2),
        t45: twit(4),
        b6: bit(6),
        b7: bit(7),
        t89: twit(8),
        t1011: twit(10),
        t1213: twit(12),
        b14: bit(14),
        b15: bit(15),
        t1617: twit(16),
        t1819: twit(18),
        b20: bit(20),
        t2122: twit(21),
        t2324: twit(23),
        t2526: twit(25),
        t2728: twit(27),
        t2930: twit(29),
        b31: bit(31),
    };

    for (label, t) in [
        ("decode_twit_0", w.t01),
        ("decode_twit_2", w.t23),
        ("decode_twit_4", w.t45),
        ("decode_twit_8", w.t89),
        ("decode_twit_10", w.t1011),
        ("decode_twit_12", w.t1213),
        ("decode_twit_16", w.t1617),
        ("decode_twit_18", w.t1819),
        ("decode_twit_21", w.t2122),
        ("decode_twit_23", w.t2324),
        ("decode_twit_25", w.t2526),
        ("decode_twit_27", w.t2728),
        ("decode_twit_29", w.t2930),
    ] {
        checker.assert_twit(label, t)?;
    }
    for (label, b) in [
        ("decode_bit_6", w.b6),
        ("decode_bit_7", w.b7),
        ("decode_bit_14", w.b14),
        ("decode_bit_15", w.b15),
        ("decode_bit_20", w.b20),
        ("decode_bit_31", w.b31),
    ] {
        checker.assert_bit(label, b)?;
    }

    // Reassembly of both halves from the witnesses.
    let low = w.t01
        + c(1 << 2) * w.t23
        + c(1 << 4) * w.t45
        + c(1 << 6) * w.b6
        + c(1 << 7) * w.b7
        + c(1 << 8) * w.t89
        + c(1 << 10) * w.t1011
        + c(1 << 12) * w.t1213
        + c(1 << 14) * w.b14
        + c(1 << 15) * w.b15;
    checker.assert_eq("decode_reassemble_low", inst.low, low)?;

    let high = w.t1617
        + c(1 << 2) * w.t1819
        + c(1 << 4) * w.b20
        + c(1 << 5) * w.t2122
        + c(1 << 7) * w.t2324
        + c(1 << 9) * w.t2526
        + c(1 << 11) * w.t2728
        + c(1 << 13) * w.t2930
        + c(1 << 15) * w.b31;
    checker.assert_eq("decode_reassemble_high", inst.high, high)?;

    let opcode = w.t01 + c(1 << 2) * w.t23 + c(1 << 4) * w.t45 + c(1 << 6) * w.b6;
    let rd = w.b7 + F::two() * w.t89 + c(8) * w.t1011;
    let func3 = w.t1213 + c(4) * w.b14;
    let rs1 = w.b15 + F::two() * w.t1617 + c(8) * w.t1819;
    let rs2 = w.b20 + F::two() * w.t2122 + c(8) * w.t2324;
    let func7 = w.t2526 + c(4) * w.t2728 + c(16) * w.t2930 + c(64) * w.b31;

    // imm_i = sext(inst[31:20])
    let imm_i = U32Val {
        low: w.b20
            + F::two() * w.t2122
            + c(8) * w.t2324
            + c(32) * w.t2526
            + c(128) * w.t2728
            + c(512) * w.t2930
            + c(0xF800) * w.b31,
        high: c(0xFFFF) * w.b31,
    };

    // imm_s = sext({func7, rd})
    let imm_s = U32Val {
        low: w.b7
            + F::two() * w.t89
            + c(8) * w.t1011
            + c(32) * w.t2526
            + c(128) * w.t2728
            + c(512) * w.t2930
            + c(0xF800) * w.b31,
        high: c(0xFFFF) * w.b31,
    };

    // imm_b = sext({inst[31], inst[7], inst[30:25], inst[11:8], 0})
    let imm_b = U32Val {
        low: F::two() * w.t89
            + c(8) * w.t1011
            + c(32) * w.t2526
            + c(128) * w.t2728
            + c(512) * w.t2930
            + c(2048) * w.b7
            + c(0xF000) * w.b31,
        high: c(0xFFFF) * w.b31,
    };

    // imm_u = inst[31:12] << 12
    let imm_u = U32Val {
        low: c(1 << 12) * w.t1213 + c(1 << 14) * w.b14 + c(1 << 15) * w.b15,
        high: inst.high,
    };

    // imm_j = sext({inst[31], inst[19:12], inst[20], inst[30:21], 0})
    let imm_j = U32Val {
        low: F::two() * w.t2122
            + c(8) * w.t2324
            + c(32) * w.t2526
            + c(128) * w.t2728
            + c(512) * w.t2930
            + c(2048) * w.b20
            + c(1 << 12) * w.t1213
            + c(1 << 14) * w.b14
            + c(1 << 15) * w.b15,
        high: w.t1617 + c(4) * w.t1819 + c(0xFFF0) * w.b31,
    };

    Ok(DecodedInst {
        opcode,
        rd,
        func3,
        rs1,
        rs2,
        func7,
        imm_i,
        imm_s,
        imm_b,
        imm_u,
        imm_j,
    })
}
