//! Criterion benchmarks for the OpenRadar frame codec.
//!
//! Position updates are produced several times per second per aircraft and
//! decoded on every connected display, so encode and decode sit on the hot
//! path of both ends.
//!
//! Run with:
//! ```bash
//! cargo bench --package radar-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use radar_core::geo::LatLng;
use radar_core::protocol::{decode_frame, encode_frame, CallSign, Packet, PacketRegistry, PositionUpdate, Squawk};

// ── Packet fixtures ───────────────────────────────────────────────────────────

fn make_position_update(call_sign: &str) -> Packet {
    Packet::PositionUpdate(PositionUpdate {
        call_sign: CallSign::new(call_sign).unwrap(),
        squawk: Squawk(0x4521),
        frequency_khz: 127_850,
        coords: LatLng::new(33.9416, -118.4085),
        altitude_ft: 24_000.0,
        ground_speed_kt: 420.0,
        ground_track_deg: 250.0,
    })
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_encode(c: &mut Criterion) {
    let registry = PacketRegistry::standard();
    let mut group = c.benchmark_group("encode");

    for call_sign in ["", "N1", "ABCDEFGH"] {
        let packet = make_position_update(call_sign);
        group.bench_with_input(BenchmarkId::new("PositionUpdate", call_sign.len()), &packet, |b, p| {
            b.iter(|| encode_frame(black_box(registry), black_box(p)).unwrap())
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let registry = PacketRegistry::standard();
    let bytes = encode_frame(registry, &make_position_update("DLH400")).unwrap();

    c.bench_function("decode/PositionUpdate", |b| {
        b.iter(|| decode_frame(black_box(registry), black_box(&bytes)).unwrap())
    });
}

fn bench_roundtrip_hot_path(c: &mut Criterion) {
    let registry = PacketRegistry::standard();
    let packet = make_position_update("DLH400");

    c.bench_function("roundtrip/PositionUpdate", |b| {
        b.iter(|| {
            let bytes = encode_frame(black_box(registry), black_box(&packet)).unwrap();
            decode_frame(black_box(registry), black_box(&bytes)).unwrap()
        })
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_roundtrip_hot_path);
criterion_main!(benches);
