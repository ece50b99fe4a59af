#![allow(unused)]
extern crate dexscope;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use dexscope::{DexFile, LoaderConfig};
use std::{fs, hint::black_box, path::PathBuf};

/// Benchmark decoding the crafted sample under each loader configuration
///
/// `minimal` only decodes referenced items, `strict` additionally hashes the file twice and
/// sweeps the map list, so the gap between the two is the cost of the integrity checks.
fn bench_decode(c: &mut Criterion) {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/samples/crafted.dex");
    let data = fs::read(&path).expect("Failed to read sample");
    let file_size = data.len();

    let mut group = c.benchmark_group("dexfile_decode");
    group.throughput(Throughput::Bytes(file_size as u64));
    for (name, config) in [
        ("minimal", LoaderConfig::minimal()),
        ("production", LoaderConfig::production()),
        ("strict", LoaderConfig::strict()),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let dex = DexFile::decode_with_config(black_box(&data), config).unwrap();
                black_box(dex)
            });
        });
    }
    group.finish();
}

/// Benchmark memoized method name resolution
fn bench_resolve(c: &mut Criterion) {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/samples/crafted.dex");
    let dex = DexFile::from_path(&path).expect("Failed to decode sample");

    c.bench_function("method_reference_cached", |b| {
        b.iter(|| {
            for idx in 0..dex.methods().len() {
                black_box(dex.method_reference(black_box(idx)).unwrap());
            }
        });
    });
}

criterion_group!(benches, bench_decode, bench_resolve);
criterion_main!(benches);
