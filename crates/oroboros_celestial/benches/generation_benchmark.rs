//! Benchmark for celestial chunk generation and master lookups.
//!
//! Run with: cargo bench --package oroboros_celestial --bench generation_benchmark

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use oroboros_celestial::{
    CelestialChunkGenerator, CelestialDatabase, CelestialMasterDatabase, CelestialRegion,
    ChunkIndex, GenerationTables, MasterConfig, UniverseSeed,
};

fn benchmark_single_chunk(c: &mut Criterion) {
    let gen =
        CelestialChunkGenerator::new(Arc::new(GenerationTables::default()), UniverseSeed::new(42));

    c.bench_function("celestial_chunk_generation", |b| {
        let mut coord = 0i32;
        b.iter(|| {
            coord = coord.wrapping_add(1);
            black_box(gen.generate(ChunkIndex::new(coord, -coord / 3)))
        });
    });
}

fn benchmark_star_map(c: &mut Criterion) {
    let gen =
        CelestialChunkGenerator::new(Arc::new(GenerationTables::default()), UniverseSeed::new(42));

    let mut group = c.benchmark_group("star_map");
    group.sample_size(10);

    // 8x8 chunks = one zoomed-out star map screen
    group.throughput(Throughput::Elements(8 * 8));
    group.bench_function("8x8_chunks", |b| {
        b.iter(|| {
            for y in 0..8 {
                for x in 0..8 {
                    black_box(gen.generate(ChunkIndex::new(x, y)));
                }
            }
        });
    });

    group.finish();
}

fn benchmark_cached_scan(c: &mut Criterion) {
    let Ok(master) = CelestialMasterDatabase::open(
        Arc::new(GenerationTables::default()),
        UniverseSeed::new(42),
        MasterConfig::default(),
    ) else {
        return;
    };
    let region = CelestialRegion::around(0, 0, 256);
    // Warm the cache so the benchmark measures lookups only.
    let _ = master.scan_systems(region, None);

    c.bench_function("cached_region_scan", |b| {
        b.iter(|| black_box(master.scan_systems(region, None)));
    });
}

criterion_group!(benches, benchmark_single_chunk, benchmark_star_map, benchmark_cached_scan);
criterion_main!(benches);
