use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tile_sheet_core::grouping::group_into_batches;
use tile_sheet_core::layout::GridLayout;

fn generate_sizes(count: usize, min_size: u32, max_size: u32) -> Vec<(u32, u32)> {
    let mut rng = StdRng::seed_from_u64(count as u64);
    (0..count)
        .map(|_| {
            (
                rng.gen_range(min_size..=max_size),
                rng.gen_range(min_size..=max_size),
            )
        })
        .collect()
}

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_layout");
    for count in [9usize, 64, 256, 1024] {
        let sizes = generate_sizes(count, 16, 512);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("compute", count), &sizes, |b, sizes| {
            b.iter(|| black_box(GridLayout::compute(black_box(sizes))))
        });
    }
    group.finish();
}

fn bench_grouping(c: &mut Criterion) {
    let mut group = c.benchmark_group("grouping");
    for (count, per) in [(100usize, 9usize), (1000, 9), (1000, 64)] {
        let sizes = generate_sizes(count, 16, 512);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::new(format!("per_{per}"), count),
            &sizes,
            |b, sizes| b.iter(|| black_box(group_into_batches(sizes.clone(), per))),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_layout, bench_grouping);
criterion_main!(benches);
