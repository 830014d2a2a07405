//! Generator and evaluator benchmarks

use criterion::{BenchmarkGroup, Criterion, criterion_group, criterion_main, measurement::Measurement};
use fieldgen::{
    FieldParams, Options, emit_module,
    eval::Machine,
    generate,
    params::{CURVE25519, P521_ORDER},
};
use hex_literal::hex;
use std::hint::black_box;

fn p521_order() -> FieldParams {
    FieldParams::from_descriptor(&P521_ORDER).unwrap()
}

fn bench_emit<M: Measurement>(group: &mut BenchmarkGroup<'_, M>) {
    let params = p521_order();
    let options = Options::default();
    group.bench_function("emit P521OrderField", |b| {
        b.iter(|| emit_module(black_box(&params), &options))
    });
}

fn bench_render<M: Measurement>(group: &mut BenchmarkGroup<'_, M>) {
    let params = p521_order();
    let options = Options::default();
    group.bench_function("generate P521OrderField", |b| {
        b.iter(|| generate(black_box(&params), &options))
    });
}

fn bench_eval_mult<M: Measurement>(group: &mut BenchmarkGroup<'_, M>) {
    let params = FieldParams::from_descriptor(&CURVE25519).unwrap();
    let module = emit_module(&params, &Options::default());
    let machine = Machine::new(&module);

    let bytes = hex!("9a3e1f0c77d2b64e5d81a0c3f96b2e4817c05da9e3b46f2d8c1a7e590b3d6f24");
    let limbs: Vec<i64> = bytes
        .chunks(3)
        .take(10)
        .map(|c| c.iter().fold(0i64, |acc, &b| (acc << 8) | i64::from(b)) & ((1 << 25) - 1))
        .collect();

    group.bench_function("eval mult IntegerPolynomial25519", |b| {
        b.iter(|| machine.mult(black_box(&limbs), black_box(&limbs)).unwrap())
    });
}

fn bench_fieldgen(c: &mut Criterion) {
    let mut group = c.benchmark_group("fieldgen");
    bench_emit(&mut group);
    bench_render(&mut group);
    bench_eval_mult(&mut group);
    group.finish();
}

criterion_group!(benches, bench_fieldgen);
criterion_main!(benches);
