//! Benchmarks for the per-sample hot path
//!
//! At 1600 Hz a sample must be decoded, scaled and encoded in well under the
//! 625 µs period. Covers:
//! - Little-endian burst decoding into [`RawAxes`]
//! - Scaling and JSON line encoding of a [`SampleRecord`]
//! - Command line framing and parsing

use bytes::BytesMut;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use sensorlink::{Command, CommandCodec, RAW_SAMPLE_LEN, RateSet, RawAxes, Sample};
use std::hint::black_box;
use tokio_util::codec::Decoder;

const BURST: [u8; RAW_SAMPLE_LEN] =
    [0x34, 0x12, 0x00, 0x10, 0xFF, 0x7F, 0x00, 0x80, 0x01, 0x00, 0xFE, 0xFF];

fn bench_raw_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("raw_decoding");
    group.throughput(Throughput::Bytes(RAW_SAMPLE_LEN as u64));

    group.bench_function("from_le_bytes", |b| {
        b.iter(|| RawAxes::from_le_bytes(black_box(&BURST)).unwrap());
    });

    group.finish();
}

fn bench_record_encoding(c: &mut Criterion) {
    let raw = RawAxes::from_le_bytes(&BURST).unwrap();
    let rates = RateSet::default();

    let mut group = c.benchmark_group("record_encoding");

    for hz in [100, 400, 1600] {
        let rate = rates.require(hz).unwrap();
        group.bench_function(format!("to_line_{hz}hz"), |b| {
            b.iter(|| {
                let sample = Sample::new(black_box(raw), black_box(123_456_789));
                sample.to_record(rate).to_line().unwrap()
            });
        });
    }

    group.bench_function("to_record_only", |b| {
        let rate = rates.require(400).unwrap();
        b.iter(|| Sample::new(black_box(raw), 0).to_record(rate));
    });

    group.finish();
}

fn bench_command_framing(c: &mut Criterion) {
    let input = b"PING\r\nSRATE 1600\nSTART\nSTOP\nSRATE 12x\nHELLO\n";

    let mut group = c.benchmark_group("command_framing");
    group.throughput(Throughput::Bytes(input.len() as u64));

    group.bench_function("decode_batch", |b| {
        b.iter(|| {
            let mut codec = CommandCodec::new(256);
            let mut buf = BytesMut::from(&input[..]);
            let mut count = 0;
            while let Some(command) = codec.decode(&mut buf).unwrap() {
                black_box(command);
                count += 1;
            }
            count
        });
    });

    group.bench_function("parse_single", |b| {
        b.iter(|| Command::parse(black_box("SRATE 1600")));
    });

    group.finish();
}

criterion_group!(benches, bench_raw_decoding, bench_record_encoding, bench_command_framing);
criterion_main!(benches);
