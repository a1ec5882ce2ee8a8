//! Transform Chain Benchmarks
//!
//! Throughput of whole-window obfuscation and its inverse, the work done
//! for every range request and upload chunk.
//!
//! Run with: `cargo bench --bench transform_chain`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use shroud_server::transform::{TransformChain, TransformConfig};

fn chains() -> Vec<(&'static str, TransformChain)> {
    let build = |configs: &[TransformConfig]| TransformChain::from_configs(configs).0;

    vec![
        (
            "xor_base64",
            build(&[
                TransformConfig::new("xor").with_option("key", "bench-key"),
                TransformConfig::new("base64"),
            ]),
        ),
        (
            "aes_base64",
            build(&[
                TransformConfig::new("aes").with_option("key", "bench-passphrase"),
                TransformConfig::new("base64").with_option("alphabet", "url"),
            ]),
        ),
    ]
}

fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_apply");
    group.measurement_time(Duration::from_secs(10));

    for size in [4 * 1024, 256 * 1024, 4 * 1024 * 1024] {
        let window: Vec<u8> = (0..=255u8).cycle().take(size).collect();
        group.throughput(Throughput::Bytes(size as u64));

        for (name, chain) in chains() {
            group.bench_with_input(BenchmarkId::new(name, size), &window, |b, window| {
                b.iter(|| chain.apply(black_box(window)))
            });
        }
    }

    group.finish();
}

fn bench_invert(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_invert");
    group.measurement_time(Duration::from_secs(10));

    let size = 256 * 1024;
    let window: Vec<u8> = (0..=255u8).cycle().take(size).collect();
    group.throughput(Throughput::Bytes(size as u64));

    for (name, chain) in chains() {
        let Ok(obfuscated) = chain.apply(&window) else {
            continue;
        };
        group.bench_function(name, |b| b.iter(|| chain.invert(black_box(&obfuscated))));
    }

    group.finish();
}

criterion_group!(benches, bench_apply, bench_invert);
criterion_main!(benches);
