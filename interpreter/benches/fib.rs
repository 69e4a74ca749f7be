use criterion::{criterion_group, criterion_main, Criterion};
use interpreter::{run, ArrayOrigin};

fn benchmark(c: &mut Criterion) {
    let src = include_str!("../data/fib.dncl");

    c.bench_function("fib 9", |b| {
        b.iter(|| run(src, "", ArrayOrigin::Zero))
    });
}

criterion_group!(benches, benchmark);
criterion_main!(benches);
