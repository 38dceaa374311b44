//! Benchmarks for heatgrid wire schemas

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use heatgrid_core::{Coord, NodeIdentity, Rank};
use heatgrid_wire::{AddressRecord, AlertReport};

fn full_report() -> AlertReport {
    AlertReport {
        detection_timestamp: 1_700_000_000,
        match_count: 3,
        detection_start_clock: 1_700_000_000.25,
        reporter: NodeIdentity::new(Rank(5), Coord::new(1, 1)).with_reading(95),
        neighbors: [(4, 1, 0), (6, 1, 2), (2, 0, 1), (8, 2, 1)]
            .iter()
            .map(|&(r, row, col)| NodeIdentity::new(Rank(r), Coord::new(row, col)).with_reading(93))
            .collect(),
    }
}

fn bench_report_encode(c: &mut Criterion) {
    let report = full_report();
    c.bench_function("report_encode", |b| b.iter(|| black_box(&report).encode()));
}

fn bench_report_decode(c: &mut Criterion) {
    let bytes = full_report().encode().unwrap();
    c.bench_function("report_decode", |b| {
        b.iter(|| {
            let parsed = AlertReport::decode(black_box(&bytes)).unwrap();
            black_box(parsed)
        })
    });
}

fn bench_address_decode(c: &mut Criterion) {
    let bytes = AddressRecord::new("02:42:ac:11:00:05", "172.17.0.5").encode().unwrap();
    c.bench_function("address_decode", |b| {
        b.iter(|| AddressRecord::decode(black_box(&bytes)))
    });
}

criterion_group!(benches, bench_report_encode, bench_report_decode, bench_address_decode);
criterion_main!(benches);
