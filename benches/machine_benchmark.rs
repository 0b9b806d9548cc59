//! Machine benchmarks
//!
//! Measures step throughput for feedback circuits and subcircuit expansion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use philbrick::prelude::*;

/// Harmonic oscillator: two integrators and an inverting pot
fn oscillator(dt: f64) -> Machine {
    let mut m = Machine::new(dt).unwrap();
    m.add("INT1", Integrator::new(0.0, 1.0)).unwrap();
    m.add("INT2", Integrator::new(1.0, 1.0)).unwrap();
    m.add("COEF", Coefficient::new(-1.0)).unwrap();
    m.connect("INT2.out", "INT1.in").unwrap();
    m.connect("COEF.out", "INT2.in").unwrap();
    m.connect("INT1.out", "COEF.in").unwrap();
    m
}

/// A chain of `n` coefficient pots fed by a sine source
fn chain(n: usize) -> Machine {
    let mut m = Machine::new(0.001).unwrap();
    m.add("SRC", SineSource::new(1.0, 1.0, 0.0).unwrap()).unwrap();
    let mut prev = "SRC".to_string();
    for i in 0..n {
        let name = format!("K{}", i);
        m.add(&name, Coefficient::new(0.999)).unwrap();
        m.connect(&format!("{}.out", prev), &format!("{}.in", name))
            .unwrap();
        prev = name;
    }
    m
}

fn bench_oscillator(c: &mut Criterion) {
    c.bench_function("oscillator 1000 steps", |b| {
        let mut m = oscillator(0.001);
        b.iter(|| {
            m.run(black_box(1000));
            black_box(m.read_port("INT1.out").unwrap());
        });
    });
}

fn bench_chain_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain step");

    for size in [1, 10, 100, 1000].iter() {
        let mut m = chain(*size);
        group.bench_with_input(BenchmarkId::new("components", size), size, |b, _| {
            b.iter(|| m.step());
        });
    }

    group.finish();
}

fn bench_softmax(c: &mut Criterion) {
    c.bench_function("instantiate softmax", |b| {
        b.iter(|| {
            let mut m = Machine::default();
            m.instantiate("Softmax", black_box("S")).unwrap();
            black_box(m.len());
        });
    });

    c.bench_function("softmax 1000 steps", |b| {
        let mut m = Machine::default();
        m.add("A", Constant::new(0.5)).unwrap();
        m.add("B", Constant::new(-0.5)).unwrap();
        m.instantiate("Softmax", "S").unwrap();
        m.connect("A.out", "S.in0").unwrap();
        m.connect("B.out", "S.in1").unwrap();
        b.iter(|| m.run(black_box(1000)));
    });
}

criterion_group!(benches, bench_oscillator, bench_chain_step, bench_softmax);
criterion_main!(benches);
