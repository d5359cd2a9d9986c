//! Major/minor dispatch for instruction rows.
//!
//! The decoded instruction determines the (major, minor) pair; the
//! oracle's claimed pair is asserted against it and materialized as
//! one-hot vectors for the accumulation step. Dispatch itself is an
//! exhaustive match over the pair; an opcode with no arm is an illegal
//! instruction and invalidates the row. Every handler binds the decoded
//! opcode/func3/func7 fields to the arm it runs and returns the next
//! (pc, state, mode).

use p3_field::{AbstractField, PrimeField32};

use crate::constraints::alu;
use crate::constraints::bits::select;
use crate::constraints::checker::{ConstraintChecker, StepError};
use crate::constraints::control::control_mret;
use crate::constraints::decode::{decode_inst, DecodedInst};
use crate::constraints::ecall::{ecall_dispatch, HostReadState};
use crate::constraints::lookup::LookupLedger;
use crate::constraints::memory::{memory_read, memory_rmw, memory_write};
use crate::constraints::muldiv::{
    do_div, expand_u32, multiply_accumulate, shift_amount, shift_left, shift_right_arith,
    shift_right_logical,
};
use crate::constraints::poseidon::HashState;
use crate::constraints::word::{split_addr, U32Val};
use crate::oracle::Oracle;
use crate::types::{reg_word_addr, MachineState, Major, CTRL_MRET};
use crate::F;

/// What one instruction row hands back to the cycle driver.
pub struct InstOutcome {
    pub new_pc: U32Val,
    pub new_state: MachineState,
    pub new_mode: F,
    pub io: Option<HostReadState>,
    pub hash: Option<HashState>,
}

#[inline]
fn c(v: u32) -> F {
    F::from_canonical_u32(v)
}

/// The statically-known (major, minor) of a decoded instruction; `None`
/// is an illegal instruction.
pub fn lookup_major_minor(dec: &DecodedInst) -> Option<(Major, u8)> {
    let f3 = dec.func3_u32();
    let f7 = dec.func7_u32();
    match dec.opcode_u32() {
        0x33 => match (f3, f7) {
            (0, 0x00) => Some((Major::Misc0, 0)),
            (0, 0x20) => Some((Major::Misc0, 1)),
            (4, 0x00) => Some((Major::Misc0, 2)),
            (6, 0x00) => Some((Major::Misc0, 3)),
            (7, 0x00) => Some((Major::Misc0, 4)),
            (2, 0x00) => Some((Major::Misc0, 5)),
            (3, 0x00) => Some((Major::Misc0, 6)),
            (0, 0x01) => Some((Major::Mul0, 0)),
            (1, 0x01) => Some((Major::Mul0, 1)),
            (2, 0x01) => Some((Major::Mul0, 2)),
            (3, 0x01) => Some((Major::Mul0, 3)),
            (1, 0x00) => Some((Major::Mul0, 4)),
            (4, 0x01) => Some((Major::Div0, 0)),
            (5, 0x01) => Some((Major::Div0, 1)),
            (6, 0x01) => Some((Major::Div0, 2)),
            (7, 0x01) => Some((Major::Div0, 3)),
            (5, 0x00) => Some((Major::Div0, 4)),
            (5, 0x20) => Some((Major::Div0, 5)),
            _ => None,
        },
        0x13 => match f3 {
            0 => Some((Major::Misc0, 7)),
            4 => Some((Major::Misc1, 0)),
            6 => Some((Major::Misc1, 1)),
            7 => Some((Major::Misc1, 2)),
            2 => Some((Major::Misc1, 3)),
            3 => Some((Major::Misc1, 4)),
            1 if f7 == 0x00 => Some((Major::Mul0, 5)),
            5 if f7 == 0x00 => Some((Major::Div0, 6)),
            5 if f7 == 0x20 => Some((Major::Div0, 7)),
            _ => None,
        },
        0x63 => match f3 {
            0 => Some((Major::Misc1, 5)),
            1 => Some((Major::Misc1, 6)),
            4 => Some((Major::Misc1, 7)),
            5 => Some((Major::Misc2, 0)),
            6 => Some((Major::Misc2, 1)),
            7 => Some((Major::Misc2, 2)),
            _ => None,
        },
        0x6F => Some((Major::Misc2, 3)),
        0x67 if f3 == 0 => Some((Major::Misc2, 4)),
        0x37 => Some((Major::Misc2, 5)),
        0x17 => Some((Major::Misc2, 6)),
        0x03 => match f3 {
            0 => Some((Major::Mem0, 0)),
            1 => Some((Major::Mem0, 1)),
            2 => Some((Major::Mem0, 2)),
            4 => Some((Major::Mem0, 3)),
            5 => Some((Major::Mem0, 4)),
            _ => None,
        },
        0x23 => match f3 {
            0 => Some((Major::Mem1, 0)),
            1 => Some((Major::Mem1, 1)),
            2 => Some((Major::Mem1, 2)),
            _ => None,
        },
        0x73 => {
            if f3 == 0 && f7 == 0x18 && dec.rs2_u32() == 2 {
                Some((Major::Control0, CTRL_MRET))
            } else if f3 == 0 && dec.imm_i.to_u32() == 0 {
                // The minor comes from the host dispatch word.
                Some((Major::Ecall0, 0))
            } else {
                None
            }
        }
        _ => None,
    }
}

struct InstCtx<'a, O: Oracle> {
    checker: &'a mut ConstraintChecker,
    ledger: &'a mut LookupLedger,
    oracle: &'a mut O,
    dec: DecodedInst,
    pc: U32Val,
    mode: F,
}

impl<'a, O: Oracle> InstCtx<'a, O> {
    fn enc(
        &mut self,
        opcode: u32,
        func3: Option<u32>,
        func7: Option<u32>,
    ) -> Result<(), StepError> {
        self.checker
            .assert_eq("inst_opcode", self.dec.opcode, c(opcode))?;
        if let Some(f3) = func3 {
            self.checker.assert_eq("inst_func3", self.dec.func3, c(f3))?;
        }
        if let Some(f7) = func7 {
            self.checker.assert_eq("inst_func7", self.dec.func7, c(f7))?;
        }
        Ok(())
    }

    fn read_rs1(&mut self) -> Result<U32Val, StepError> {
        memory_read(
            self.checker,
            self.ledger,
            self.oracle,
            reg_word_addr(self.dec.rs1_u32()),
        )
    }

    fn read_rs2(&mut self) -> Result<U32Val, StepError> {
        memory_read(
            self.checker,
            self.ledger,
            self.oracle,
            reg_word_addr(self.dec.rs2_u32()),
        )
    }

    /// Write the destination register; x0 swallows the value.
    fn write_rd(&mut self, value: U32Val) -> Result<(), StepError> {
        let z = alu::is_zero(self.checker, self.dec.rd)?;
        let kept = U32Val {
            low: (F::one() - z) * value.low,
            high: (F::one() - z) * value.high,
        };
        memory_write(
            self.checker,
            self.ledger,
            self.oracle,
            reg_word_addr(self.dec.rd_u32()),
            kept,
        )
    }

    fn pc_plus_4(&mut self) -> Result<U32Val, StepError> {
        let (next, _) = alu::add(
            self.checker,
            self.ledger,
            &self.pc,
            &U32Val::from_u32(4),
        )?;
        Ok(next)
    }

    fn seq(&mut self, rd_value: U32Val) -> Result<InstOutcome, StepError> {
        self.write_rd(rd_value)?;
        let new_pc = self.pc_plus_4()?;
        Ok(InstOutcome {
            new_pc,
            new_state: MachineState::Decode,
            new_mode: self.mode,
            io: None,
            hash: None,
        })
    }

    fn branch(&mut self, cond: F, imm: U32Val) -> Result<InstOutcome, StepError> {
        let (target, _) = alu::add(self.checker, self.ledger, &self.pc, &imm)?;
        let seq = self.pc_plus_4()?;
        let new_pc = U32Val {
            low: select(cond, target.low, seq.low),
            high: select(cond, target.high, seq.high),
        };
        Ok(InstOutcome {
            new_pc,
            new_state: MachineState::Decode,
            new_mode: self.mode,
            io: None,
            hash: None,
        })
    }

    /// Sign split of a halfword: `v == top·0x8000 + rest`.
    fn half_sign(&mut self, v: F) -> Result<(F, F), StepError> {
        let raw = v.as_canonical_u32();
        let top = F::from_canonical_u32(raw >> 15);
        let rest = F::from_canonical_u32(raw & 0x7FFF);
        self.checker.assert_bit("half_sign_bit", top)?;
        self.checker
            .assert_eq("half_sign_split", v, top * c(0x8000) + rest)?;
        self.ledger.half(self.checker, rest * F::two())?;
        Ok((top, rest))
    }

    /// Sign split of a byte: `v == top·0x80 + rest`.
    fn byte_sign(&mut self, v: F) -> Result<(F, F), StepError> {
        let raw = v.as_canonical_u32();
        let top = F::from_canonical_u32(raw >> 7);
        let rest = F::from_canonical_u32(raw & 0x7F);
        self.checker.assert_bit("byte_sign_bit", top)?;
        self.checker
            .assert_eq("byte_sign_split", v, top * c(0x80) + rest)?;
        self.ledger.byte(self.checker, rest * F::two())?;
        Ok((top, rest))
    }
}

/// Fetch, decode, and execute one instruction row.
///
/// Returns the outcome together with the (major, minor) actually taken,
/// which the cycle driver binds into the dispatch one-hots.
pub fn dispatch_inst<O: Oracle>(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    oracle: &mut O,
    pc: &U32Val,
    mode: F,
) -> Result<(InstOutcome, Major, u8), StepError> {
    // The pc must be word-aligned to fetch.
    let split = split_addr(checker, ledger, pc)?;
    checker.assert_zero("fetch_align_a0", split.a0)?;
    checker.assert_zero("fetch_align_a1", split.a1)?;
    let inst = memory_read(checker, ledger, oracle, split.word.as_canonical_u32())?;
    oracle.log("fetch", &[pc.low, pc.high, inst.low, inst.high]);
    let dec = decode_inst(checker, &inst)?;

    let Some((major, mut minor)) = lookup_major_minor(&dec) else {
        return Err(checker.unreachable_arm("illegal_instruction"));
    };
    let (claimed_major, claimed_minor) = oracle.major_minor();
    checker.assert_eq(
        "dispatch_major",
        c(claimed_major as u32),
        c(major.index() as u32),
    )?;
    if major == Major::Ecall0 {
        // The ECALL minor is host-selected; it is bound to the dispatch
        // word inside the handler.
        minor = claimed_minor;
    } else {
        checker.assert_eq(
            "dispatch_minor",
            c(claimed_minor as u32),
            c(minor as u32),
        )?;
    }

    let mut ctx = InstCtx {
        checker,
        ledger,
        oracle,
        dec,
        pc: *pc,
        mode,
    };

    let outcome = exec_arm(&mut ctx, major, minor)?;
    Ok((outcome, major, minor))
}

fn exec_arm<O: Oracle>(
    ctx: &mut InstCtx<'_, O>,
    major: Major,
    minor: u8,
) -> Result<InstOutcome, StepError> {
    match (major, minor) {
        // ---- Misc0 ------------------------------------------------------
        (Major::Misc0, 0) => {
            ctx.enc(0x33, Some(0), Some(0x00))?;
            let (a, b) = (ctx.read_rs1()?, ctx.read_rs2()?);
            let (sum, _) = alu::add(ctx.checker, ctx.ledger, &a, &b)?;
            ctx.seq(sum)
        }
        (Major::Misc0, 1) => {
            ctx.enc(0x33, Some(0), Some(0x20))?;
            let (a, b) = (ctx.read_rs1()?, ctx.read_rs2()?);
            let (diff, _) = alu::sub(ctx.checker, ctx.ledger, &a, &b)?;
            ctx.seq(diff)
        }
        (Major::Misc0, 2) => {
            ctx.enc(0x33, Some(4), Some(0x00))?;
            let (a, b) = (ctx.read_rs1()?, ctx.read_rs2()?);
            let out = alu::xor(ctx.checker, &a, &b)?;
            ctx.seq(out)
        }
        (Major::Misc0, 3) => {
            ctx.enc(0x33, Some(6), Some(0x00))?;
            let (a, b) = (ctx.read_rs1()?, ctx.read_rs2()?);
            let out = alu::or(ctx.checker, &a, &b)?;
            ctx.seq(out)
        }
        (Major::Misc0, 4) => {
            ctx.enc(0x33, Some(7), Some(0x00))?;
            let (a, b) = (ctx.read_rs1()?, ctx.read_rs2()?);
            let out = alu::and(ctx.checker, &a, &b)?;
            ctx.seq(out)
        }
        (Major::Misc0, 5) => {
            ctx.enc(0x33, Some(2), Some(0x00))?;
            let (a, b) = (ctx.read_rs1()?, ctx.read_rs2()?);
            let lt = alu::lt_signed(ctx.checker, ctx.ledger, &a, &b)?;
            ctx.seq(U32Val { low: lt, high: F::zero() })
        }
        (Major::Misc0, 6) => {
            ctx.enc(0x33, Some(3), Some(0x00))?;
            let (a, b) = (ctx.read_rs1()?, ctx.read_rs2()?);
            let lt = alu::lt_unsigned(ctx.checker, ctx.ledger, &a, &b)?;
            ctx.seq(U32Val { low: lt, high: F::zero() })
        }
        (Major::Misc0, 7) => {
            ctx.enc(0x13, Some(0), None)?;
            let a = ctx.read_rs1()?;
            let imm = ctx.dec.imm_i;
            let (sum, _) = alu::add(ctx.checker, ctx.ledger, &a, &imm)?;
            ctx.seq(sum)
        }

        // ---- Misc1 ------------------------------------------------------
        (Major::Misc1, 0) => {
            ctx.enc(0x13, Some(4), None)?;
            let a = ctx.read_rs1()?;
            let imm = ctx.dec.imm_i;
            let out = alu::xor(ctx.checker, &a, &imm)?;
            ctx.seq(out)
        }
        (Major::Misc1, 1) => {
            ctx.enc(0x13, Some(6), None)?;
            let a = ctx.read_rs1()?;
            let imm = ctx.dec.imm_i;
            let out = alu::or(ctx.checker, &a, &imm)?;
            ctx.seq(out)
        }
        (Major::Misc1, 2) => {
            ctx.enc(0x13, Some(7), None)?;
            let a = ctx.read_rs1()?;
            let imm = ctx.dec.imm_i;
            let out = alu::and(ctx.checker, &a, &imm)?;
            ctx.seq(out)
        }
        (Major::Misc1, 3) => {
            ctx.enc(0x13, Some(2), None)?;
            let a = ctx.read_rs1()?;
            let imm = ctx.dec.imm_i;
            let lt = alu::lt_signed(ctx.checker, ctx.ledger, &a, &imm)?;
            ctx.seq(U32Val { low: lt, high: F::zero() })
        }
        (Major::Misc1, 4) => {
            ctx.enc(0x13, Some(3), None)?;
            let a = ctx.read_rs1()?;
            let imm = ctx.dec.imm_i;
            let lt = alu::lt_unsigned(ctx.checker, ctx.ledger, &a, &imm)?;
            ctx.seq(U32Val { low: lt, high: F::zero() })
        }
        (Major::Misc1, 5) => {
            ctx.enc(0x63, Some(0), None)?;
            let (a, b) = (ctx.read_rs1()?, ctx.read_rs2()?);
            let cond = alu::eq(ctx.checker, &a, &b)?;
            let imm = ctx.dec.imm_b;
            ctx.branch(cond, imm)
        }
        (Major::Misc1, 6) => {
            ctx.enc(0x63, Some(1), None)?;
            let (a, b) = (ctx.read_rs1()?, ctx.read_rs2()?);
            let cond = F::one() - alu::eq(ctx.checker, &a, &b)?;
            let imm = ctx.dec.imm_b;
            ctx.branch(cond, imm)
        }
        (Major::Misc1, 7) => {
            ctx.enc(0x63, Some(4), None)?;
            let (a, b) = (ctx.read_rs1()?, ctx.read_rs2()?);
            let cond = alu::lt_signed(ctx.checker, ctx.ledger, &a, &b)?;
            let imm = ctx.dec.imm_b;
            ctx.branch(cond, imm)
        }

        // ---- Misc2 ------------------------------------------------------
        (Major::Misc2, 0) => {
            ctx.enc(0x63, Some(5), None)?;
            let (a, b) = (ctx.read_rs1()?, ctx.read_rs2()?);
            let cond = F::one() - alu::lt_signed(ctx.checker, ctx.ledger, &a, &b)?;
            let imm = ctx.dec.imm_b;
            ctx.branch(cond, imm)
        }
        (Major::Misc2, 1) => {
            ctx.enc(0x63, Some(6), None)?;
            let (a, b) = (ctx.read_rs1()?, ctx.read_rs2()?);
            let cond = alu::lt_unsigned(ctx.checker, ctx.ledger, &a, &b)?;
            let imm = ctx.dec.imm_b;
            ctx.branch(cond, imm)
        }
        (Major::Misc2, 2) => {
            ctx.enc(0x63, Some(7), None)?;
            let (a, b) = (ctx.read_rs1()?, ctx.read_rs2()?);
            let cond = F::one() - alu::lt_unsigned(ctx.checker, ctx.ledger, &a, &b)?;
            let imm = ctx.dec.imm_b;
            ctx.branch(cond, imm)
        }
        (Major::Misc2, 3) => {
            ctx.enc(0x6F, None, None)?;
            let link = ctx.pc_plus_4()?;
            ctx.write_rd(link)?;
            let imm = ctx.dec.imm_j;
            let pc = ctx.pc;
            let (target, _) = alu::add(ctx.checker, ctx.ledger, &pc, &imm)?;
            Ok(InstOutcome {
                new_pc: target,
                new_state: MachineState::Decode,
                new_mode: ctx.mode,
                io: None,
                hash: None,
            })
        }
        (Major::Misc2, 4) => {
            ctx.enc(0x67, Some(0), None)?;
            let a = ctx.read_rs1()?;
            let link = ctx.pc_plus_4()?;
            ctx.write_rd(link)?;
            let imm = ctx.dec.imm_i;
            let (target, _) = alu::add(ctx.checker, ctx.ledger, &a, &imm)?;
            // Clear bit 0 of the target.
            let raw = target.low.as_canonical_u32();
            let b0 = F::from_canonical_u32(raw & 1);
            let rest = F::from_canonical_u32(raw >> 1);
            ctx.checker.assert_bit("jalr_lsb", b0)?;
            ctx.checker
                .assert_eq("jalr_lsb_split", target.low, b0 + F::two() * rest)?;
            ctx.ledger.half(ctx.checker, rest * F::two())?;
            Ok(InstOutcome {
                new_pc: U32Val {
                    low: F::two() * rest,
                    high: target.high,
                },
                new_state: MachineState::Decode,
                new_mode: ctx.mode,
                io: None,
                hash: None,
            })
        }
        (Major::Misc2, 5) => {
            ctx.enc(0x37, None, None)?;
            let imm = ctx.dec.imm_u;
            ctx.seq(imm)
        }
        (Major::Misc2, 6) => {
            ctx.enc(0x17, None, None)?;
            let imm = ctx.dec.imm_u;
            let pc = ctx.pc;
            let (out, _) = alu::add(ctx.checker, ctx.ledger, &pc, &imm)?;
            ctx.seq(out)
        }

        // ---- Mul0 -------------------------------------------------------
        (Major::Mul0, 0..=3) => {
            let (f3, a_signed, b_signed) = match minor {
                0 => (0, false, false),
                1 => (1, true, true),
                2 => (2, true, false),
                _ => (3, false, false),
            };
            ctx.enc(0x33, Some(f3), Some(0x01))?;
            let (a, b) = (ctx.read_rs1()?, ctx.read_rs2()?);
            let ae = expand_u32(ctx.checker, ctx.ledger, &a, a_signed)?;
            let be = expand_u32(ctx.checker, ctx.ledger, &b, b_signed)?;
            let out = multiply_accumulate(ctx.checker, ctx.ledger, &ae, &be, &U32Val::zero())?;
            let rd = if minor == 0 { out.low } else { out.high };
            ctx.seq(rd)
        }
        (Major::Mul0, 4) => {
            ctx.enc(0x33, Some(1), Some(0x00))?;
            let (a, b) = (ctx.read_rs1()?, ctx.read_rs2()?);
            let shamt = shift_amount(ctx.checker, ctx.ledger, b.low)?;
            let out = shift_left(ctx.checker, ctx.ledger, &a, shamt)?;
            ctx.seq(out)
        }
        (Major::Mul0, 5) => {
            ctx.enc(0x13, Some(1), Some(0x00))?;
            let a = ctx.read_rs1()?;
            let out = shift_left(ctx.checker, ctx.ledger, &a, ctx.dec.rs2)?;
            ctx.seq(out)
        }

        // ---- Div0 -------------------------------------------------------
        (Major::Div0, 0..=3) => {
            let (f3, signed, want_rem) = match minor {
                0 => (4, true, false),
                1 => (5, false, false),
                2 => (6, true, true),
                _ => (7, false, true),
            };
            ctx.enc(0x33, Some(f3), Some(0x01))?;
            let (a, b) = (ctx.read_rs1()?, ctx.read_rs2()?);
            let out = do_div(ctx.checker, ctx.ledger, ctx.oracle, &a, &b, signed)?;
            let rd = if want_rem { out.rem } else { out.quot };
            ctx.seq(rd)
        }
        (Major::Div0, 4) => {
            ctx.enc(0x33, Some(5), Some(0x00))?;
            let (a, b) = (ctx.read_rs1()?, ctx.read_rs2()?);
            let shamt = shift_amount(ctx.checker, ctx.ledger, b.low)?;
            let out = shift_right_logical(ctx.checker, ctx.ledger, &a, shamt)?;
            ctx.seq(out)
        }
        (Major::Div0, 5) => {
            ctx.enc(0x33, Some(5), Some(0x20))?;
            let (a, b) = (ctx.read_rs1()?, ctx.read_rs2()?);
            let shamt = shift_amount(ctx.checker, ctx.ledger, b.low)?;
            let out = shift_right_arith(ctx.checker, ctx.ledger, &a, shamt)?;
            ctx.seq(out)
        }
        (Major::Div0, 6) => {
            ctx.enc(0x13, Some(5), Some(0x00))?;
            let a = ctx.read_rs1()?;
            let out = shift_right_logical(ctx.checker, ctx.ledger, &a, ctx.dec.rs2)?;
            ctx.seq(out)
        }
        (Major::Div0, 7) => {
            ctx.enc(0x13, Some(5), Some(0x20))?;
            let a = ctx.read_rs1()?;
            let out = shift_right_arith(ctx.checker, ctx.ledger, &a, ctx.dec.rs2)?;
            ctx.seq(out)
        }

        // ---- Mem0 (loads) ----------------------------------------------
        (Major::Mem0, m @ 0..=4) => exec_load(ctx, m),

        // ---- Mem1 (stores) ---------------------------------------------
        (Major::Mem1, m @ 0..=2) => exec_store(ctx, m),

        // ---- Control0 ---------------------------------------------------
        (Major::Control0, CTRL_MRET) => {
            ctx.enc(0x73, Some(0), Some(0x18))?;
            ctx.checker.assert_eq("mret_rs2", ctx.dec.rs2, F::two())?;
            let (new_pc, new_mode, new_state) =
                control_mret(ctx.checker, ctx.ledger, ctx.oracle, ctx.mode)?;
            Ok(InstOutcome {
                new_pc,
                new_state,
                new_mode,
                io: None,
                hash: None,
            })
        }

        // ---- Ecall0 -----------------------------------------------------
        (Major::Ecall0, m) => {
            ctx.enc(0x73, Some(0), Some(0x00))?;
            ctx.checker.assert_zero("ecall_rd", ctx.dec.rd)?;
            ctx.checker.assert_zero("ecall_rs1", ctx.dec.rs1)?;
            ctx.checker.assert_zero("ecall_rs2", ctx.dec.rs2)?;
            let out = ecall_dispatch(ctx.checker, ctx.ledger, ctx.oracle, m)?;
            let new_pc = ctx.pc_plus_4()?;
            Ok(InstOutcome {
                new_pc,
                new_state: out.new_state,
                new_mode: ctx.mode,
                io: out.io,
                hash: out.hash,
            })
        }

        _ => Err(StepError::IllegalDispatch {
            cycle: ctx.checker.cycle(),
            major: major.index(),
            minor,
        }),
    }
}

fn exec_load<O: Oracle>(ctx: &mut InstCtx<'_, O>, minor: u8) -> Result<InstOutcome, StepError> {
    let f3 = [0, 1, 2, 4, 5][minor as usize];
    ctx.enc(0x03, Some(f3), None)?;
    let base = ctx.read_rs1()?;
    let imm = ctx.dec.imm_i;
    let (addr, _) = alu::add(ctx.checker, ctx.ledger, &base, &imm)?;
    let split = split_addr(ctx.checker, ctx.ledger, &addr)?;
    let word = memory_read(
        ctx.checker,
        ctx.ledger,
        ctx.oracle,
        split.word.as_canonical_u32(),
    )?;

    let rd = match f3 {
        // LW
        2 => {
            ctx.checker.assert_zero("lw_align_a0", split.a0)?;
            ctx.checker.assert_zero("lw_align_a1", split.a1)?;
            word
        }
        // LB / LBU
        0 | 4 => {
            let we = expand_u32(ctx.checker, ctx.ledger, &word, false)?;
            let (a0, a1) = (split.a0, split.a1);
            let sel = [
                (F::one() - a0) * (F::one() - a1),
                a0 * (F::one() - a1),
                (F::one() - a0) * a1,
                a0 * a1,
            ];
            let mut byte = F::zero();
            for (s, b) in sel.iter().zip(we.bytes) {
                byte += *s * b;
            }
            if f3 == 0 {
                let (top, _) = ctx.byte_sign(byte)?;
                U32Val {
                    low: byte + c(0xFF00) * top,
                    high: c(0xFFFF) * top,
                }
            } else {
                U32Val {
                    low: byte,
                    high: F::zero(),
                }
            }
        }
        // LH / LHU
        _ => {
            ctx.checker.assert_zero("lh_align_a0", split.a0)?;
            let half = select(split.a1, word.high, word.low);
            if f3 == 1 {
                let (top, _) = ctx.half_sign(half)?;
                U32Val {
                    low: half,
                    high: c(0xFFFF) * top,
                }
            } else {
                U32Val {
                    low: half,
                    high: F::zero(),
                }
            }
        }
    };
    ctx.seq(rd)
}

fn exec_store<O: Oracle>(ctx: &mut InstCtx<'_, O>, minor: u8) -> Result<InstOutcome, StepError> {
    let f3 = minor as u32;
    ctx.enc(0x23, Some(f3), None)?;
    let base = ctx.read_rs1()?;
    let value = ctx.read_rs2()?;
    let imm = ctx.dec.imm_s;
    let (addr, _) = alu::add(ctx.checker, ctx.ledger, &base, &imm)?;
    let split = split_addr(ctx.checker, ctx.ledger, &addr)?;
    let word_addr = split.word.as_canonical_u32();

    match minor {
        // SB: replace the selected byte.
        0 => {
            let (a0, a1) = (split.a0, split.a1);
            let raw = value.low.as_canonical_u32();
            let vb = F::from_canonical_u32(raw & 0xFF);
            let v_hi = F::from_canonical_u32(raw >> 8);
            ctx.ledger.byte(ctx.checker, vb)?;
            ctx.ledger.byte(ctx.checker, v_hi)?;
            ctx.checker
                .assert_eq("sb_byte_split", value.low, vb + c(256) * v_hi)?;

            memory_rmw(ctx.checker, ctx.ledger, ctx.oracle, word_addr, |checker, ledger, old| {
                let oe = expand_u32(checker, ledger, old, false)?;
                let sel = [
                    (F::one() - a0) * (F::one() - a1),
                    a0 * (F::one() - a1),
                    (F::one() - a0) * a1,
                    a0 * a1,
                ];
                let nb: Vec<F> = oe
                    .bytes
                    .iter()
                    .zip(sel)
                    .map(|(b, s)| s * vb + (F::one() - s) * *b)
                    .collect();
                Ok(U32Val {
                    low: nb[0] + c(256) * nb[1],
                    high: nb[2] + c(256) * nb[3],
                })
            })?;
        }
        // SH: replace the selected half.
        1 => {
            ctx.checker.assert_zero("sh_align_a0", split.a0)?;
            let a1 = split.a1;
            let low_half = value.low;
            memory_rmw(ctx.checker, ctx.ledger, ctx.oracle, word_addr, |_, _, old| {
                Ok(U32Val {
                    low: select(a1, old.low, low_half),
                    high: select(a1, low_half, old.high),
                })
            })?;
        }
        // SW
        _ => {
            ctx.checker.assert_zero("sw_align_a0", split.a0)?;
            ctx.checker.assert_zero("sw_align_a1", split.a1)?;
            memory_write(ctx.checker, ctx.ledger, ctx.oracle, word_addr, value)?;
        }
    }

    let new_pc = ctx.pc_plus_4()?;
    Ok(InstOutcome {
        new_pc,
        new_state: MachineState::Decode,
        new_mode: ctx.mode,
        io: None,
        hash: None,
    })
}
