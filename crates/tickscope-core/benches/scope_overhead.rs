use criterion::{Criterion, black_box, criterion_group, criterion_main};

fn bench_counter_read(c: &mut Criterion) {
    c.bench_function("counter_read", |b| b.iter(|| black_box(tickscope_core::now())));
}

fn bench_scope_lifecycle(c: &mut Criterion) {
    tickscope_core::set_sink_silent();
    let started = tickscope_core::start();

    let mut group = c.benchmark_group("scope");

    group.bench_function("enter_exit", |b| {
        b.iter(|| {
            tickscope_core::scope!("bench");
        })
    });

    group.bench_function("enter_exit_with_metadata", |b| {
        b.iter(|| {
            tickscope_core::scope!("bench");
            tickscope_core::scope_metadata!("iteration", 1u64);
            tickscope_core::scope_metadata!("bytes", 4096usize);
        })
    });

    group.finish();

    if started {
        tickscope_core::stop();
    }
}

criterion_group!(benches, bench_counter_read, bench_scope_lifecycle);
criterion_main!(benches);
