use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use preserve_core::{
    geometry::Polygon, run_simulation, Feature, FeatureId, FeatureSet, RunConfig,
};

/// Square grid of unit parcels with the first column preserved.
fn grid(size: u32) -> FeatureSet {
    (0..size * size)
        .map(|idx| {
            let (x, y) = (idx % size, idx / size);
            Feature::new(
                FeatureId(u64::from(idx)),
                Polygon::square([f64::from(x), f64::from(y)], 1.0),
            )
            .with_attribute("Status", i64::from(x == 0))
        })
        .collect()
}

fn bench_round(c: &mut Criterion) {
    let mut group = c.benchmark_group("round");

    for (label, method) in [("greedy", "Greedy"), ("patient", "Patient")] {
        let config = RunConfig {
            method: method.to_string(),
            jump_distance: 0.5,
            ..RunConfig::default()
        };
        for size in [8u32, 16, 32] {
            group.bench_with_input(BenchmarkId::new(label, size), &size, |b, &size| {
                b.iter_batched(
                    || grid(size),
                    |parcels| run_simulation(&parcels, &config),
                    BatchSize::SmallInput,
                )
            });
        }
    }

    group.finish();
}

criterion_group!(round_benches, bench_round);
criterion_main!(round_benches);
