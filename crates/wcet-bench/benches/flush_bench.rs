//! Cache flush cost by region size.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use wcet_core::{CacheFlusher, TouchFlusher};

fn bench_touch_flush(c: &mut Criterion) {
    let hints: &[usize] = &[32 << 10, 256 << 10, 2 << 20, 8 << 20];
    let mut group = c.benchmark_group("touch_flush");

    for &hint in hints {
        group.bench_with_input(BenchmarkId::from_parameter(hint), &hint, |b, &h| {
            let mut flusher = TouchFlusher;
            b.iter(|| flusher.flush(h).ok());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_touch_flush);
criterion_main!(benches);
