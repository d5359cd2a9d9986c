//! Multiply, divide, and shift.
//!
//! Multiplication is byte-sliced: partial products are summed per byte
//! column, grouped at 16-bit boundaries, and each boundary is resolved by
//! a range-checked split. Two's-complement sign handling subtracts the
//! `2^32·(neg_a·B + neg_b·A)` correction with fixed borrow offsets.
//! Division trusts an oracle-supplied quotient/remainder and re-derives
//! the dividend through the multiplier. Shifts reduce to multiply/divide
//! by a power of two selected by a 32-entry one-hot table.

use p3_field::{AbstractField, PrimeField32};

use crate::constraints::alu::{eq, lt_unsigned, sign_bit, sub};
use crate::constraints::bits::onehot;
use crate::constraints::checker::{ConstraintChecker, StepError};
use crate::constraints::lookup::LookupLedger;
use crate::constraints::word::{split_total, split_total_twit, U32Val};
use crate::oracle::Oracle;
use crate::F;

#[inline]
fn c(v: u32) -> F {
    F::from_canonical_u32(v)
}

/// A word split into four byte-checked bytes, with an optional
/// two's-complement sign bit.
#[derive(Clone, Copy, Debug)]
pub struct ExpandedU32 {
    pub bytes: [F; 4],
    /// Sign bit when the operand is declared signed, else zero.
    pub neg: F,
    pub value: U32Val,
}

/// Split a word into bytes; when `signed`, also witness the top bit.
pub fn expand_u32(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    v: &U32Val,
    signed: bool,
) -> Result<ExpandedU32, StepError> {
    let low = v.low.as_canonical_u32();
    let high = v.high.as_canonical_u32();
    let bytes = [
        F::from_canonical_u32(low & 0xFF),
        F::from_canonical_u32(low >> 8),
        F::from_canonical_u32(high & 0xFF),
        F::from_canonical_u32(high >> 8),
    ];
    for b in bytes {
        ledger.byte(checker, b)?;
    }
    checker.assert_eq("expand_low", v.low, bytes[0] + c(256) * bytes[1])?;
    checker.assert_eq("expand_high", v.high, bytes[2] + c(256) * bytes[3])?;

    let neg = if signed {
        let top = bytes[3].as_canonical_u32();
        let neg = F::from_canonical_u32(top >> 7);
        let rest = F::from_canonical_u32(top & 0x7F);
        checker.assert_bit("expand_neg", neg)?;
        checker.assert_eq("expand_neg_split", bytes[3], neg * c(128) + rest)?;
        ledger.byte(checker, rest * F::two())?;
        neg
    } else {
        F::zero()
    };

    Ok(ExpandedU32 {
        bytes,
        neg,
        value: *v,
    })
}

/// The 64-bit result of a multiply-accumulate, as two words.
#[derive(Clone, Copy, Debug)]
pub struct MulOut {
    pub low: U32Val,
    pub high: U32Val,
}

/// `a·b + addend` over 64 bits, where each operand is interpreted
/// signed if its `neg` bit is witnessed, and the addend is unsigned.
pub fn multiply_accumulate(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    a: &ExpandedU32,
    b: &ExpandedU32,
    addend: &U32Val,
) -> Result<MulOut, StepError> {
    let [a0, a1, a2, a3] = a.bytes;
    let [b0, b1, b2, b3] = b.bytes;

    // Byte-column partial sums of the unsigned product.
    let s0 = a0 * b0;
    let s1 = a0 * b1 + a1 * b0;
    let s2 = a0 * b2 + a1 * b1 + a2 * b0;
    let s3 = a0 * b3 + a1 * b2 + a2 * b1 + a3 * b0;
    let s4 = a1 * b3 + a2 * b2 + a3 * b1;
    let s5 = a2 * b3 + a3 * b2;
    let s6 = a3 * b3;

    let (out0, carry0) = split_total(checker, ledger, "mul_split_0", s0 + c(256) * s1 + addend.low)?;
    let (out1, carry1) = split_total(
        checker,
        ledger,
        "mul_split_1",
        s2 + c(256) * s3 + addend.high + carry0,
    )?;
    let (out2, carry2) = split_total(checker, ledger, "mul_split_2", s4 + c(256) * s5 + carry1)?;
    // The top slice of a 64-bit product cannot carry.
    let out3 = s6 + carry2;
    ledger.half(checker, out3)?;

    // Two's-complement correction at the 32-bit boundary:
    // subtract 2^32·(neg_a·B + neg_b·A), sliced into halfwords with
    // borrow-compensating offsets of 2·2^16 per slice.
    let k0 = a.neg * b.value.low + b.neg * a.value.low;
    let k1 = a.neg * b.value.high + b.neg * a.value.high;

    let (res2, w2) = split_total_twit(checker, ledger, "mul_sign_2", out2 - k0 + c(0x20000))?;
    let (res3, _w3) = split_total_twit(
        checker,
        ledger,
        "mul_sign_3",
        out3 - k1 + w2 - F::two() + c(0x20000),
    )?;

    Ok(MulOut {
        low: U32Val {
            low: out0,
            high: out1,
        },
        high: U32Val {
            low: res2,
            high: res3,
        },
    })
}

/// Oracle-backed division, re-checked through the multiplier.
#[derive(Clone, Copy, Debug)]
pub struct DivOutput {
    pub quot: U32Val,
    pub rem: U32Val,
}

/// Verify `numer / denom` under the RV32M rules: the dividend is
/// re-derived as `quot·denom + rem`, the remainder is bounded against
/// the divisor (sign-adjusted), a zero divisor forces quotient −1 and
/// remainder = dividend, and the signed overflow row forces
/// `MIN / −1 = (MIN, 0)`.
pub fn do_div<O: Oracle>(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    oracle: &mut O,
    numer: &U32Val,
    denom: &U32Val,
    signed: bool,
) -> Result<DivOutput, StepError> {
    let hint = oracle.divide(numer.to_u32(), denom.to_u32(), signed);
    let quot = U32Val::register(checker, ledger, hint.quot)?;
    let rem = U32Val::register(checker, ledger, hint.rem)?;

    let qe = expand_u32(checker, ledger, &quot, signed)?;
    let de = expand_u32(checker, ledger, denom, signed)?;
    let mul = multiply_accumulate(checker, ledger, &qe, &de, &rem)?;

    let zero = U32Val::zero();
    let neg_n = if signed {
        sign_bit(checker, ledger, numer)?
    } else {
        F::zero()
    };
    let neg_r = if signed {
        sign_bit(checker, ledger, &rem)?
    } else {
        F::zero()
    };
    let z_d = eq(checker, denom, &zero)?;
    let z_r = eq(checker, &rem, &zero)?;
    let nz_r = F::one() - z_r;

    let ov = if signed {
        let n_min = eq(checker, numer, &U32Val::from_u32(0x8000_0000))?;
        let d_m1 = eq(checker, denom, &U32Val::from_u32(0xFFFF_FFFF))?;
        n_min * d_m1
    } else {
        F::zero()
    };

    // quot·denom + rem reproduces the dividend word...
    checker.assert_eq("div_check_low", mul.low.low, numer.low)?;
    checker.assert_eq("div_check_high", mul.low.high, numer.high)?;
    // ...and the upper word is exactly the dividend's sign extension,
    // cancelled when the remainder is itself negative or on the
    // overflow row.
    let ext_half = c(0xFFFF) * neg_n * (F::one() - neg_r) * (F::one() - ov);
    checker.assert_eq("div_check_ext_low", mul.high.low, ext_half)?;
    checker.assert_eq("div_check_ext_high", mul.high.high, ext_half)?;

    // Remainder sign must follow the dividend (or be zero).
    checker.assert_zero("div_rem_sign_pos", neg_r * (F::one() - neg_n))?;
    checker.assert_zero("div_rem_sign_neg", neg_n * (F::one() - neg_r) * nz_r)?;

    // Remainder magnitude below the divisor, unless dividing by zero.
    let bound_ok = if signed {
        let neg_d = sign_bit(checker, ledger, denom)?;
        let (r_negated, _) = sub(checker, ledger, &zero, &rem)?;
        let (d_negated, _) = sub(checker, ledger, &zero, denom)?;
        let abs_r = U32Val {
            low: neg_r * r_negated.low + (F::one() - neg_r) * rem.low,
            high: neg_r * r_negated.high + (F::one() - neg_r) * rem.high,
        };
        let abs_d = U32Val {
            low: neg_d * d_negated.low + (F::one() - neg_d) * denom.low,
            high: neg_d * d_negated.high + (F::one() - neg_d) * denom.high,
        };
        lt_unsigned(checker, ledger, &abs_r, &abs_d)?
    } else {
        lt_unsigned(checker, ledger, &rem, denom)?
    };
    checker.assert_zero("div_rem_bound", (F::one() - z_d) * (F::one() - bound_ok))?;

    // Zero divisor: quotient all-ones, remainder = dividend.
    checker.assert_zero("div_zero_quot_low", z_d * (quot.low - c(0xFFFF)))?;
    checker.assert_zero("div_zero_quot_high", z_d * (quot.high - c(0xFFFF)))?;
    checker.assert_zero("div_zero_rem_low", z_d * (rem.low - numer.low))?;
    checker.assert_zero("div_zero_rem_high", z_d * (rem.high - numer.high))?;

    // Signed overflow: MIN / −1 = (MIN, 0).
    checker.assert_zero("div_ov_quot_low", ov * quot.low)?;
    checker.assert_zero("div_ov_quot_high", ov * (quot.high - c(0x8000)))?;
    checker.assert_zero("div_ov_rem_low", ov * rem.low)?;
    checker.assert_zero("div_ov_rem_high", ov * rem.high)?;

    Ok(DivOutput { quot, rem })
}

/// Witness the 5-bit shift amount out of a halfword and bind the 11-bit
/// remainder through the shifted halfword lookup.
pub fn shift_amount(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    v_low: F,
) -> Result<F, StepError> {
    let raw = v_low.as_canonical_u32();
    let shamt = F::from_canonical_u32(raw & 0x1F);
    let rest = F::from_canonical_u32(raw >> 5);
    crate::constraints::bits::decompose_bits(checker, "shamt_bits", shamt, 5)?;
    checker.assert_eq("shamt_split", v_low, shamt + rest * c(32))?;
    ledger.half(checker, rest * c(32))?;
    Ok(shamt)
}

/// The dynamically-selected power of two, from a 32-entry one-hot table.
pub fn power_of_two(
    checker: &mut ConstraintChecker,
    shamt: F,
) -> Result<U32Val, StepError> {
    let idx = shamt.as_canonical_u32() as usize;
    let flags = onehot(checker, "po2_onehot", idx.min(31), shamt, 32)?;
    let mut low = F::zero();
    let mut high = F::zero();
    for (i, flag) in flags.iter().enumerate() {
        if i < 16 {
            low += *flag * c(1 << i);
        } else {
            high += *flag * c(1 << (i - 16));
        }
    }
    Ok(U32Val { low, high })
}

/// `value << shamt` (low word of the product by the power of two).
pub fn shift_left(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    value: &U32Val,
    shamt: F,
) -> Result<U32Val, StepError> {
    let po2 = power_of_two(checker, shamt)?;
    let ve = expand_u32(checker, ledger, value, false)?;
    let pe = expand_u32(checker, ledger, &po2, false)?;
    let mul = multiply_accumulate(checker, ledger, &ve, &pe, &U32Val::zero())?;
    Ok(mul.low)
}

/// `value >> shamt`, logical: witnesses the quotient and shifted-out
/// remainder and re-multiplies.
pub fn shift_right_logical(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    value: &U32Val,
    shamt: F,
) -> Result<U32Val, StepError> {
    let s = shamt.as_canonical_u32();
    let po2 = power_of_two(checker, shamt)?;
    let q_raw = value.to_u32() >> s;
    let r_raw = value.to_u32() - (q_raw << s);
    let quot = U32Val::register(checker, ledger, q_raw)?;
    let rem = U32Val::register(checker, ledger, r_raw)?;

    let qe = expand_u32(checker, ledger, &quot, false)?;
    let pe = expand_u32(checker, ledger, &po2, false)?;
    let mul = multiply_accumulate(checker, ledger, &qe, &pe, &rem)?;
    checker.assert_eq("srl_check_low", mul.low.low, value.low)?;
    checker.assert_eq("srl_check_high", mul.low.high, value.high)?;
    checker.assert_zero("srl_check_ext_low", mul.high.low)?;
    checker.assert_zero("srl_check_ext_high", mul.high.high)?;

    let in_range = lt_unsigned(checker, ledger, &rem, &po2)?;
    checker.assert_eq("srl_rem_bound", in_range, F::one())?;
    Ok(quot)
}

/// `value >> shamt`, arithmetic.
pub fn shift_right_arith(
    checker: &mut ConstraintChecker,
    ledger: &mut LookupLedger,
    value: &U32Val,
    shamt: F,
) -> Result<U32Val, StepError> {
    let s = shamt.as_canonical_u32();
    let po2 = power_of_two(checker, shamt)?;
    let q_raw = ((value.to_u32() as i32) >> s) as u32;
    let r_raw = value.to_u32().wrapping_sub(q_raw.wrapping_shl(s));
    let quot = U32Val::register(checker, ledger, q_raw)?;
    let rem = U32Val::register(checker, ledger, r_raw)?;

    let qe = expand_u32(checker, ledger, &quot, true)?;
    let pe = expand_u32(checker, ledger, &po2, false)?;
    let mul = multiply_accumulate(checker, ledger, &qe, &pe, &rem)?;
    checker.assert_eq("sra_check_low", mul.low.low, value.low)?;
    checker.assert_eq("sra_check_high", mul.low.high, value.high)?;
    // The upper word carries the quotient's sign extension.
    let ext_half = c(0xFFFF) * qe.neg;
    checker.assert_eq("sra_check_ext_low", mul.high.low, ext_half)?;
    checker.assert_eq("sra_check_ext_high", mul.high.high, ext_half)?;

    let in_range = lt_unsigned(checker, ledger, &rem, &po2)?;
    checker.assert_eq("sra_rem_bound", in_range, F::one())?;
    Ok(quot)
}
