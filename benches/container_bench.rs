//! Benchmarks for corpus pattern queries and a full clustering run

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use v6scout::{
    AddressContainer, AddressTree, BinaryAddressContainer, ClusterConfig, ClusteringEngine, GenRange,
};

/// Addresses clustered under a few /64s with random interface identifiers
fn synthetic_corpus(count: usize, seed: u64) -> Vec<u128> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let subnet = 0x2600_0000_0001_0000u128 | rng.gen_range(0..8u128);
            let host = rng.gen_range(0..0x1_0000u128);
            (subnet << 64) | host
        })
        .collect()
}

fn loaded(addrs: &[u128]) -> Vec<Box<dyn AddressContainer>> {
    let mut binary = BinaryAddressContainer::new();
    binary.add_addresses(addrs);
    let mut tree = AddressTree::new();
    tree.add_addresses(addrs);
    vec![Box::new(binary), Box::new(tree)]
}

/// Benchmark pattern counting with a wildcard in each half
fn bench_count_in_pattern(c: &mut Criterion) {
    let corpus = synthetic_corpus(20_000, 7);
    let range: GenRange = "2600000000010000000000000000????".parse().unwrap();
    let straddling: GenRange = "260000000001000?00000000000000??".parse().unwrap();

    let mut group = c.benchmark_group("count_in_pattern");
    group.throughput(Throughput::Elements(1));
    for container in loaded(&corpus) {
        group.bench_with_input(BenchmarkId::new("tail", container.name()), &range, |b, r| {
            b.iter(|| container.count_in_pattern(black_box(r)))
        });
        group.bench_with_input(
            BenchmarkId::new("straddling", container.name()),
            &straddling,
            |b, r| b.iter(|| container.count_in_pattern(black_box(r))),
        );
    }
    group.finish();
}

/// Benchmark one end-to-end clustering run
fn bench_clustering(c: &mut Criterion) {
    let corpus = synthetic_corpus(2_000, 11);
    let mut container = BinaryAddressContainer::new();
    container.add_addresses(&corpus);
    let engine = ClusteringEngine::new(ClusterConfig::default());

    c.bench_function("best_cluster_set_from_ips", |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(3);
            engine.best_cluster_set_from_ips(black_box(&container), &mut rng)
        })
    });
}

criterion_group!(benches, bench_count_in_pattern, bench_clustering);
criterion_main!(benches);
