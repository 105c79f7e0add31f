use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::DVec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use fieldtrack::{
    extract, noise, synthesize, Feature, FeatureTracker, Grid, NoiseKind, NoiseSpec, SourceSpec,
    TrackSet, TrackerConfig,
};

fn random_sources(grid: &Grid, count: usize, seed: u64) -> Vec<SourceSpec> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let bounds = grid.bounds();
    (0..count)
        .map(|_| {
            let center = bounds.lerp(DVec2::new(
                rng.random_range(0.05..0.95),
                rng.random_range(0.05..0.95),
            ));
            SourceSpec::gaussian(
                center,
                rng.random_range(0.5..2.0),
                rng.random_range(4.0..40.0),
            )
            .unwrap()
        })
        .collect()
}

fn bench_synthesis(c: &mut Criterion) {
    let mut group = c.benchmark_group("synthesize");
    for size in [128usize, 512] {
        let grid = Grid::from_spacing(size, size, 1.0).unwrap();
        let sources = random_sources(&grid, 16, 1);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(synthesize(&grid, &sources)))
        });
    }
    group.finish();
}

fn bench_noise(c: &mut Criterion) {
    let grid = Grid::from_spacing(512, 512, 1.0).unwrap();
    let field = synthesize(&grid, &random_sources(&grid, 16, 2)).field;
    let spec = NoiseSpec::new(NoiseKind::Gaussian { std_dev: 0.05 }, 7).unwrap();
    c.bench_function("noise_gaussian_512", |b| {
        b.iter(|| black_box(noise::apply(&field, &spec)))
    });
}

fn bench_extraction(c: &mut Criterion) {
    let grid = Grid::from_spacing(512, 512, 1.0).unwrap();
    let field = synthesize(&grid, &random_sources(&grid, 64, 3)).field;
    c.bench_function("extract_512", |b| {
        b.iter(|| black_box(extract(&field, 0.1, 0)))
    });
}

fn bench_tracker_step(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    let previous: Vec<Feature> = (0..200)
        .map(|_| {
            let p = DVec2::new(rng.random_range(0.0..1000.0), rng.random_range(0.0..1000.0));
            Feature::new(p, rng.random_range(0.5..2.0), 2.0, 0)
        })
        .collect();
    let next: Vec<Feature> = previous
        .iter()
        .map(|f| {
            let jitter = DVec2::new(rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0));
            Feature::new(f.position + jitter, f.value, f.spread, 1)
        })
        .collect();

    let tracker = FeatureTracker::new(TrackerConfig::default()).unwrap();
    let mut seeded = TrackSet::new();
    tracker.step(&mut seeded, &previous, 0).unwrap();

    c.bench_function("tracker_step_200", |b| {
        b.iter(|| {
            let mut set = seeded.clone();
            black_box(tracker.step(&mut set, &next, 1).unwrap())
        })
    });
}

criterion_group!(
    benches,
    bench_synthesis,
    bench_noise,
    bench_extraction,
    bench_tracker_step
);
criterion_main!(benches);
