//! Benchmarks for single-pass decode throughput
//!
//! Measures bytes per second for each decoder on synthetic logs of growing
//! size, plus the cost of a filtered dataflash pass and of index trimming.
//!
//! Platform: Cross-platform (synthetic buffers, CI-safe)

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use flightlog::test_utils::{sample_dataflash_log, sample_tlog, sample_vendor_log};
use flightlog::{
    DataflashDecoder, DecodeOptions, FormatKind, LogDecoder, MavlinkDecoder, MessageDictionary,
    MessageIndex, VendorDecoder, decode_buffer,
};
use std::hint::black_box;

const SIZES: [usize; 3] = [1_000, 10_000, 100_000];

fn bench_dataflash(c: &mut Criterion) {
    let mut group = c.benchmark_group("dataflash");

    for samples in SIZES {
        let data = sample_dataflash_log(samples);
        group.throughput(Throughput::Bytes(data.len() as u64));

        group.bench_function(BenchmarkId::new("full", samples), |b| {
            b.iter(|| {
                let mut records = Vec::new();
                let stats = DataflashDecoder::default().decode(black_box(&data), &mut records).unwrap();
                black_box((records, stats))
            })
        });

        let options = DecodeOptions::default().with_type_filter(["GPS"]);
        group.bench_function(BenchmarkId::new("filtered", samples), |b| {
            b.iter(|| {
                let mut records = Vec::new();
                let stats = DataflashDecoder::new(&options).decode(black_box(&data), &mut records).unwrap();
                black_box((records, stats))
            })
        });
    }

    group.finish();
}

fn bench_mavlink(c: &mut Criterion) {
    let mut group = c.benchmark_group("mavlink");
    let dictionary = MessageDictionary::builtin().unwrap();

    for samples in SIZES {
        let data = sample_tlog(samples);
        group.throughput(Throughput::Bytes(data.len() as u64));

        group.bench_function(BenchmarkId::new("tlog", samples), |b| {
            b.iter(|| {
                let mut records = Vec::new();
                let mut decoder = MavlinkDecoder::new(dictionary.clone());
                let stats = decoder.decode(black_box(&data), &mut records).unwrap();
                black_box((records, stats))
            })
        });
    }

    group.finish();
}

fn bench_vendor(c: &mut Criterion) {
    let mut group = c.benchmark_group("vendor");

    for samples in SIZES {
        let data = sample_vendor_log(samples);
        group.throughput(Throughput::Bytes(data.len() as u64));

        group.bench_function(BenchmarkId::new("blocks", samples), |b| {
            b.iter(|| {
                let mut records = Vec::new();
                let stats = VendorDecoder::new().decode(black_box(&data), &mut records).unwrap();
                black_box((records, stats))
            })
        });
    }

    group.finish();
}

fn bench_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("index");
    let data = sample_dataflash_log(100_000);

    group.bench_function("decode_into_index", |b| {
        b.iter(|| {
            let mut index = MessageIndex::new("bench.bin", data.len() as u64, FormatKind::Dataflash);
            DataflashDecoder::default().decode(black_box(&data), &mut index).unwrap();
            black_box(index)
        })
    });

    let (index, _) = decode_buffer(&data, "bin", &DecodeOptions::default()).unwrap();
    group.bench_function("trim_to_window", |b| {
        b.iter_batched(
            || index.clone(),
            |mut index| {
                index.trim_to_window(black_box(2_000_000), black_box(6_000_000));
                black_box(index)
            },
            criterion::BatchSize::LargeInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_dataflash, bench_mavlink, bench_vendor, bench_index);
criterion_main!(benches);
