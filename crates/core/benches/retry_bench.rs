//! RetryPolicy 지연 계산 벤치마크

use std::time::Duration;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use drydock_core::RetryPolicy;

fn bench_delay_for(c: &mut Criterion) {
    let jittered = RetryPolicy::new(10, Duration::from_millis(100));
    let deterministic = RetryPolicy::new(10, Duration::from_millis(100)).with_jitter(0.0);

    c.bench_function("delay_for_jittered", |b| {
        b.iter(|| {
            for attempt in 1..=10u32 {
                black_box(jittered.delay_for(black_box(attempt)));
            }
        })
    });

    c.bench_function("delay_for_deterministic", |b| {
        b.iter(|| {
            for attempt in 1..=10u32 {
                black_box(deterministic.delay_for(black_box(attempt)));
            }
        })
    });
}

criterion_group!(benches, bench_delay_for);
criterion_main!(benches);
