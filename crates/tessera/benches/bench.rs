use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::{
    sync::{Arc, Barrier},
    thread::scope,
    time::Instant,
};
use tessera::{
    CodecConfig, GeneratorConfig, GeneratorMode, IdScope, ManualClock, MemoryPublicIdMapRepository,
    MemorySegmentRepository, PublicIdCodec, PublicIdFormat, PublicIdResolver, ResolveKey,
    NodeId, ResolverConfig, ResourceType, SegmentAllocator, SegmentConfig, SnowflakeConfig,
    SnowflakeGenerator, ThreadRandom, Ulid128, UlidGenerator,
};

// Number of IDs generated per benchmark iteration (per-thread for
// multi-threaded).
const TOTAL_IDS: usize = 4096;
const THREADS: usize = 8;

const ORDER: ResourceType = ResourceType::new("ORDER", "ord");

fn generator(mode: GeneratorMode) -> UlidGenerator<ManualClock, ThreadRandom> {
    let config = GeneratorConfig {
        mode,
        ..GeneratorConfig::default()
    };
    UlidGenerator::new(&config, ManualClock::new(1_700_000_000_000), ThreadRandom)
}

fn bench_ulid_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("ulid/sequential");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    for (name, mode) in [
        ("strict", GeneratorMode::Strict),
        ("striped", GeneratorMode::Striped { stripes: THREADS }),
    ] {
        group.bench_function(format!("{name}/elems/{TOTAL_IDS}"), |b| {
            let generator = generator(mode);
            b.iter(|| {
                for _ in 0..TOTAL_IDS {
                    black_box(generator.next().unwrap());
                }
            });
        });
    }

    group.finish();
}

/// Every thread hammers the same generator; measures lane contention.
fn bench_ulid_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("ulid/contended");
    group.throughput(Throughput::Elements((TOTAL_IDS * THREADS) as u64));

    for (name, mode) in [
        ("strict", GeneratorMode::Strict),
        ("striped", GeneratorMode::Striped { stripes: THREADS }),
    ] {
        group.bench_function(format!("{name}/threads/{THREADS}"), |b| {
            b.iter_custom(|iters| {
                let generator = Arc::new(generator(mode));
                let barrier = Arc::new(Barrier::new(THREADS + 1));
                let start = scope(|s| {
                    for _ in 0..THREADS {
                        let generator = Arc::clone(&generator);
                        let barrier = Arc::clone(&barrier);
                        s.spawn(move || {
                            barrier.wait();
                            for _ in 0..iters {
                                for _ in 0..TOTAL_IDS {
                                    black_box(generator.next().unwrap());
                                }
                            }
                        });
                    }
                    barrier.wait();
                    Instant::now()
                });
                start.elapsed()
            });
        });
    }

    group.finish();
}

/// Runs on the system clock; a frozen clock would stall once the 12-bit
/// sequence is spent.
fn bench_snowflake(c: &mut Criterion) {
    let mut group = c.benchmark_group("snowflake");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    let node = NodeId::try_from(1).unwrap();
    group.bench_function(format!("sequential/elems/{TOTAL_IDS}"), |b| {
        let generator = SnowflakeGenerator::system(node, SnowflakeConfig::default());
        b.iter(|| {
            for _ in 0..TOTAL_IDS {
                black_box(generator.next_id().unwrap());
            }
        });
    });

    group.throughput(Throughput::Elements((TOTAL_IDS * THREADS) as u64));
    group.bench_function(format!("contended/threads/{THREADS}"), |b| {
        let generator = SnowflakeGenerator::system(node, SnowflakeConfig::default());
        b.iter(|| {
            scope(|s| {
                for _ in 0..THREADS {
                    s.spawn(|| {
                        for _ in 0..TOTAL_IDS {
                            black_box(generator.next_id().unwrap());
                        }
                    });
                }
            });
        });
    });

    group.finish();
}

fn bench_segment(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    group.bench_function(format!("sequential/elems/{TOTAL_IDS}"), |b| {
        let allocator =
            SegmentAllocator::new(SegmentConfig::default(), MemorySegmentRepository::new())
                .unwrap();
        let orders = IdScope::new("orders").unwrap();
        b.iter(|| {
            for _ in 0..TOTAL_IDS {
                black_box(allocator.next_id(&orders).unwrap());
            }
        });
    });

    group.bench_function(format!("contended/threads/{THREADS}"), |b| {
        b.iter_custom(|iters| {
            let allocator = Arc::new(
                SegmentAllocator::new(SegmentConfig::default(), MemorySegmentRepository::new())
                    .unwrap(),
            );
            let orders = IdScope::new("orders").unwrap();
            let start = Instant::now();
            scope(|s| {
                for _ in 0..THREADS {
                    let allocator = Arc::clone(&allocator);
                    let orders = orders.clone();
                    s.spawn(move || {
                        for _ in 0..iters {
                            for _ in 0..TOTAL_IDS / THREADS {
                                black_box(allocator.next_id(&orders).unwrap());
                            }
                        }
                    });
                }
            });
            start.elapsed()
        });
    });

    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Elements(1));

    for (name, format, checksum) in [
        ("base32", PublicIdFormat::UlidBase32, false),
        ("base32+crc", PublicIdFormat::UlidBase32, true),
        ("base62", PublicIdFormat::Base62, false),
        ("base62+crc", PublicIdFormat::Base62, true),
    ] {
        let codec = PublicIdCodec::new(CodecConfig {
            format,
            checksum,
            ..CodecConfig::default()
        })
        .unwrap();
        let id = Ulid128::from_components(1_700_000_000_000, 0xDEAD_BEEF_CAFE);
        let public_id = codec.encode("ord", id).unwrap();

        group.bench_function(format!("encode/{name}"), |b| {
            b.iter(|| black_box(codec.encode(black_box("ord"), black_box(id)).unwrap()));
        });
        group.bench_function(format!("decode/{name}"), |b| {
            b.iter(|| black_box(codec.decode(black_box(public_id.as_str())).unwrap()));
        });
    }

    group.finish();
}

fn bench_resolve_l1(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    group.throughput(Throughput::Elements(1));

    let codec = PublicIdCodec::new(CodecConfig::default()).unwrap();
    let repository = MemoryPublicIdMapRepository::new();
    let id = Ulid128::from_components(1_700_000_000_000, 1);
    let public_id = codec.encode(ORDER.prefix(), id).unwrap();
    let mut tx = repository.begin();
    let resolver = PublicIdResolver::new(ResolverConfig::default(), codec, repository).unwrap();
    let registration = resolver
        .register(&mut tx, 1, &ORDER, public_id.as_str(), id)
        .unwrap();
    resolver.repository().commit(tx).unwrap();
    resolver.committed(registration);

    let key = ResolveKey::new(1, ORDER, public_id.as_str());
    resolver.resolve(&key).unwrap();
    group.bench_function("hit_l1", |b| {
        b.iter(|| black_box(resolver.resolve(black_box(&key)).unwrap()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_ulid_sequential,
    bench_ulid_contended,
    bench_snowflake,
    bench_segment,
    bench_codec,
    bench_resolve_l1,
);
criterion_main!(benches);
