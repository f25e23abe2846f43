//! Benchmarks for the offline resampling pass
//!
//! Run with: cargo bench

use chrono::{NaiveDate, TimeDelta};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use recplay::extract::resample::{decimate, expand_text, upsample};
use recplay::extract::SeriesTable;
use recplay::types::{SampleValue, TextEvent};

fn bench_upsample(c: &mut Criterion) {
    let mut group = c.benchmark_group("upsample");

    for factor in [2usize, 10, 100].iter() {
        let values: Vec<f64> = (0..10_000).map(|i| (i as f64 * 0.01).sin()).collect();
        group.throughput(Throughput::Elements((values.len() * factor) as u64));

        group.bench_with_input(BenchmarkId::from_parameter(factor), factor, |b, &factor| {
            b.iter(|| black_box(upsample(black_box(&values), factor)));
        });
    }

    group.finish();
}

fn bench_expand_text(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand_text");

    for events in [10usize, 1000].iter() {
        let frames = 100_000;
        let sparse: Vec<TextEvent> = (0..*events)
            .map(|i| TextEvent::new(i as f64 * 100.0 / *events as f64, format!("state-{}", i)))
            .collect();
        group.throughput(Throughput::Elements(frames as u64));

        group.bench_with_input(BenchmarkId::from_parameter(events), &sparse, |b, sparse| {
            b.iter(|| black_box(expand_text(sparse, 0.001, frames)));
        });
    }

    group.finish();
}

fn bench_decimate(c: &mut Criterion) {
    let mut group = c.benchmark_group("decimate");
    let values: Vec<SampleValue> = (0..100_000).map(|i| SampleValue::Number(i as f64)).collect();

    for step in [1usize, 10, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(step), step, |b, &step| {
            b.iter(|| black_box(decimate(values.clone(), step)));
        });
    }

    group.finish();
}

fn bench_concat(c: &mut Criterion) {
    let mut group = c.benchmark_group("concat");
    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();

    let make_table = |file: i64, rows: usize, columns: &[&str]| {
        let timestamps = (0..rows)
            .map(|i| start + TimeDelta::seconds(file * 100) + TimeDelta::milliseconds(i as i64))
            .collect();
        let mut table = SeriesTable::new(timestamps);
        for name in columns {
            let values = (0..rows).map(|i| SampleValue::Number(i as f64)).collect();
            let _ = table.insert_column(*name, values);
        }
        table
    };

    for files in [4usize, 32].iter() {
        let tables: Vec<SeriesTable> = (0..*files)
            .map(|f| {
                // Every other file lacks a column
                let columns: &[&str] = if f % 2 == 0 { &["a", "b", "c"] } else { &["a", "b"] };
                make_table(f as i64, 10_000, columns)
            })
            .collect();

        group.throughput(Throughput::Elements((files * 10_000) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(files), &tables, |b, tables| {
            b.iter(|| black_box(SeriesTable::concat(tables.clone())));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_upsample, bench_expand_text, bench_decimate, bench_concat);
criterion_main!(benches);
