//! Benchmarks for the step circuit.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use p3_field::AbstractField;

use rv32im_circuit::constraints::checker::ConstraintChecker;
use rv32im_circuit::constraints::lookup::{LookupChallenges, LookupLedger};
use rv32im_circuit::constraints::muldiv::{expand_u32, multiply_accumulate};
use rv32im_circuit::constraints::poseidon::permute;
use rv32im_circuit::constraints::poseidon_consts::CELLS;
use rv32im_circuit::constraints::word::{add_denorm, normalize, U32Val};
use rv32im_circuit::F;

fn bench_normalize(c: &mut Criterion) {
    c.bench_function("normalize_add", |b| {
        let x = U32Val::from_u32(0xFFFF_FFFF);
        b.iter(|| {
            let mut checker = ConstraintChecker::new(0);
            let mut ledger = LookupLedger::new(LookupChallenges::deterministic());
            let d = add_denorm(black_box(&x), black_box(&x));
            normalize(&mut checker, &mut ledger, &d).unwrap()
        });
    });
}

fn bench_multiply(c: &mut Criterion) {
    c.bench_function("multiply_accumulate", |b| {
        let x = U32Val::from_u32(0xDEAD_BEEF);
        let y = U32Val::from_u32(0x1234_5678);
        b.iter(|| {
            let mut checker = ConstraintChecker::new(0);
            let mut ledger = LookupLedger::new(LookupChallenges::deterministic());
            let xe = expand_u32(&mut checker, &mut ledger, black_box(&x), true).unwrap();
            let ye = expand_u32(&mut checker, &mut ledger, black_box(&y), false).unwrap();
            multiply_accumulate(&mut checker, &mut ledger, &xe, &ye, &U32Val::zero()).unwrap()
        });
    });
}

fn bench_permutation(c: &mut Criterion) {
    c.bench_function("sponge_permutation", |b| {
        b.iter(|| {
            let mut cells = [F::from_canonical_u32(7); CELLS];
            permute(black_box(&mut cells));
            cells
        });
    });
}

criterion_group!(benches, bench_normalize, bench_multiply, bench_permutation);
criterion_main!(benches);
