//! Instruction rows for the ALU, upper-immediate, branch, and jump
//! arms, checked against plain u32 reference semantics.

mod common;

use common::{exec_one, TestOracle};

use rv32im_circuit::types::{reg_word_addr, Major};

fn rtype(func7: u32, rs2: u32, rs1: u32, func3: u32, rd: u32, opcode: u32) -> u32 {
    (func7 << 25) | (rs2 << 20) | (rs1 << 15) | (func3 << 12) | (rd << 7) | opcode
}

fn itype(imm: u32, rs1: u32, func3: u32, rd: u32, opcode: u32) -> u32 {
    ((imm & 0xFFF) << 20) | (rs1 << 15) | (func3 << 12) | (rd << 7) | opcode
}

fn btype(imm: i32, rs2: u32, rs1: u32, func3: u32) -> u32 {
    let imm = imm as u32;
    (((imm >> 12) & 1) << 31)
        | (((imm >> 5) & 0x3F) << 25)
        | (rs2 << 20)
        | (rs1 << 15)
        | (func3 << 12)
        | (((imm >> 1) & 0xF) << 8)
        | (((imm >> 11) & 1) << 7)
        | 0x63
}

const PC: u32 = 0x1_0000;

fn fresh(x5: u32, x6: u32) -> TestOracle {
    let mut oracle = TestOracle::new();
    oracle.start_mid_trace();
    oracle.set_word(reg_word_addr(5), x5);
    oracle.set_word(reg_word_addr(6), x6);
    oracle
}

#[test]
fn rtype_alu_matrix() {
    // (func3, func7, minor, f: (a, b) -> rd)
    let cases: &[(u32, u32, u8, fn(u32, u32) -> u32)] = &[
        (0, 0x00, 0, |a, b| a.wrapping_add(b)),
        (0, 0x20, 1, |a, b| a.wrapping_sub(b)),
        (4, 0x00, 2, |a, b| a ^ b),
        (6, 0x00, 3, |a, b| a | b),
        (7, 0x00, 4, |a, b| a & b),
        (2, 0x00, 5, |a, b| ((a as i32) < (b as i32)) as u32),
        (3, 0x00, 6, |a, b| (a < b) as u32),
    ];
    let operands = [
        (0u32, 0u32),
        (1, 0xFFFF_FFFF),
        (0x8000_0000, 0x7FFF_FFFF),
        (0xDEAD_BEEF, 0x1234_5678),
        (0xFFFF_FFFF, 0xFFFF_FFFF),
    ];
    for &(f3, f7, minor, model) in cases {
        for &(a, b) in &operands {
            let mut oracle = fresh(a, b);
            let inst = rtype(f7, 6, 5, f3, 7, 0x33);
            let out = exec_one(&mut oracle, PC, inst, (Major::Misc0.index(), minor)).unwrap();
            assert_eq!(
                oracle.word(reg_word_addr(7)),
                model(a, b),
                "f3={f3} f7={f7} a={a:#x} b={b:#x}"
            );
            assert_eq!(out.pc.to_u32(), PC + 4);
        }
    }
}

#[test]
fn itype_alu_matrix() {
    // addi with a negative immediate
    let mut oracle = fresh(100, 0);
    let inst = itype(-42i32 as u32, 5, 0, 7, 0x13);
    exec_one(&mut oracle, PC, inst, (Major::Misc0.index(), 7)).unwrap();
    assert_eq!(oracle.word(reg_word_addr(7)), 58);

    // xori / ori / andi / slti / sltiu
    let cases: &[(u32, u8, fn(u32, u32) -> u32)] = &[
        (4, 0, |a, i| a ^ i),
        (6, 1, |a, i| a | i),
        (7, 2, |a, i| a & i),
        (2, 3, |a, i| ((a as i32) < (i as i32)) as u32),
        (3, 4, |a, i| (a < i) as u32),
    ];
    for &(f3, minor, model) in cases {
        let a = 0x0F0F_1234u32;
        let imm = -5i32;
        let mut oracle = fresh(a, 0);
        let inst = itype(imm as u32, 5, f3, 7, 0x13);
        exec_one(&mut oracle, PC, inst, (Major::Misc1.index(), minor)).unwrap();
        assert_eq!(
            oracle.word(reg_word_addr(7)),
            model(a, imm as u32),
            "f3={f3}"
        );
    }
}

#[test]
fn writes_to_x0_are_swallowed() {
    let mut oracle = fresh(7, 8);
    let inst = rtype(0, 6, 5, 0, 0, 0x33); // add x0, x5, x6
    exec_one(&mut oracle, PC, inst, (Major::Misc0.index(), 0)).unwrap();
    assert_eq!(oracle.word(reg_word_addr(0)), 0);
}

#[test]
fn lui_and_auipc() {
    let mut oracle = fresh(0, 0);
    // lui x7, 0xABCDE
    let inst = (0xABCDE << 12) | (7 << 7) | 0x37;
    exec_one(&mut oracle, PC, inst, (Major::Misc2.index(), 5)).unwrap();
    assert_eq!(oracle.word(reg_word_addr(7)), 0xABCD_E000);

    let mut oracle = fresh(0, 0);
    // auipc x7, 0x1000
    let inst = (0x1000 << 12) | (7 << 7) | 0x17;
    exec_one(&mut oracle, PC, inst, (Major::Misc2.index(), 6)).unwrap();
    assert_eq!(oracle.word(reg_word_addr(7)), PC.wrapping_add(0x1000 << 12));
}

#[test]
fn branch_matrix() {
    // (func3, major, minor, taken: (a, b) -> bool)
    let cases: &[(u32, Major, u8, fn(u32, u32) -> bool)] = &[
        (0, Major::Misc1, 5, |a, b| a == b),
        (1, Major::Misc1, 6, |a, b| a != b),
        (4, Major::Misc1, 7, |a, b| (a as i32) < (b as i32)),
        (5, Major::Misc2, 0, |a, b| (a as i32) >= (b as i32)),
        (6, Major::Misc2, 1, |a, b| a < b),
        (7, Major::Misc2, 2, |a, b| a >= b),
    ];
    let operands = [
        (5u32, 5u32),
        (5, 6),
        (0xFFFF_FFFF, 1),
        (1, 0xFFFF_FFFF),
        (0x8000_0000, 0x8000_0000),
    ];
    let offset = -16i32;
    for &(f3, major, minor, taken) in cases {
        for &(a, b) in &operands {
            let mut oracle = fresh(a, b);
            let inst = btype(offset, 6, 5, f3);
            let out = exec_one(&mut oracle, PC, inst, (major.index(), minor)).unwrap();
            let want = if taken(a, b) {
                PC.wrapping_add(offset as u32)
            } else {
                PC + 4
            };
            assert_eq!(out.pc.to_u32(), want, "f3={f3} a={a:#x} b={b:#x}");
        }
    }
}

#[test]
fn jal_links_and_jumps() {
    let mut oracle = fresh(0, 0);
    // jal x1, +2048
    let inst = (1 << 20) | (1 << 7) | 0x6F;
    let out = exec_one(&mut oracle, PC, inst, (Major::Misc2.index(), 3)).unwrap();
    assert_eq!(oracle.word(reg_word_addr(1)), PC + 4);
    assert_eq!(out.pc.to_u32(), PC + 2048);
}

#[test]
fn jalr_clears_low_bit() {
    let mut oracle = fresh(0x2001, 0); // odd target base
    // jalr x1, x5, 0x10
    let inst = itype(0x10, 5, 0, 1, 0x67);
    let out = exec_one(&mut oracle, PC, inst, (Major::Misc2.index(), 4)).unwrap();
    assert_eq!(oracle.word(reg_word_addr(1)), PC + 4);
    assert_eq!(out.pc.to_u32(), (0x2001 + 0x10) & !1);
}

#[test]
fn wrong_dispatch_claim_is_rejected() {
    let mut oracle = fresh(1, 2);
    let inst = rtype(0, 6, 5, 0, 7, 0x33); // add
    let err = exec_one(&mut oracle, PC, inst, (Major::Misc0.index(), 1)); // claims sub
    assert!(err.is_err());
}

#[test]
fn illegal_opcode_is_unreachable_arm() {
    let mut oracle = fresh(0, 0);
    let err = exec_one(&mut oracle, PC, 0x0000_000B, (Major::Misc0.index(), 0));
    assert!(matches!(
        err,
        Err(rv32im_circuit::StepError::Unreachable { label: "illegal_instruction", .. })
    ));
}
