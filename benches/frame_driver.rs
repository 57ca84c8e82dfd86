//! Benchmarks for frame driving
//!
//! Tests per-frame cost for:
//! - Rendering a whole scripted race at video frame rates
//! - World updates from single telemetry packets
//! - Snapshot construction for a full grid
//!
//! Platform: Cross-platform (packets are built in memory, CI-safe)

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use replaysync::test_utils::{TelemetryBuilder, car, decode_fixture, scripted_race};
use replaysync::{
    DecodedPacket, FrameDriver, FrameRate, PredecodedQueue, SnapshotRenderer, WorldState,
};
use std::hint::black_box;

fn decoded_race(laps: u8) -> Vec<DecodedPacket> {
    scripted_race(laps).iter().map(|data| decode_fixture(data)).collect()
}

fn bench_render_race(c: &mut Criterion) {
    let packets = decoded_race(5);

    let mut group = c.benchmark_group("render_race");
    group.sample_size(20);
    for fps in [30.0, 60.0] {
        let rate = FrameRate::new(fps).expect("valid frame rate");
        group.bench_with_input(BenchmarkId::from_parameter(fps), &rate, |b, rate| {
            b.iter(|| {
                let queue = PredecodedQueue::new(packets.iter().cloned());
                let mut driver = FrameDriver::new(queue, SnapshotRenderer::new());
                for (_, time) in rate.presentation_times(160.0) {
                    black_box(driver.frame_at(time).expect("frame renders"));
                }
            })
        });
    }
    group.finish();
}

fn bench_world_apply(c: &mut Criterion) {
    let mut builder = TelemetryBuilder::new().participants(56).viewed(0);
    for slot in 0..56u8 {
        builder = builder.slot(slot as usize, car(slot + 1, 2, 2, 31.0));
    }
    let packets: Vec<DecodedPacket> = (0..100)
        .map(|i| decode_fixture(&builder.clone().current_time(i as f32 * 0.1).build()))
        .collect();

    c.bench_function("world_apply_full_grid", |b| {
        b.iter(|| {
            let mut world = WorldState::new();
            for packet in &packets {
                black_box(world.apply(packet));
            }
            world
        })
    });

    let mut world = WorldState::new();
    for packet in &packets {
        world.apply(packet);
    }
    c.bench_function("world_snapshot_full_grid", |b| b.iter(|| black_box(world.snapshot())));
}

criterion_group!(benches, bench_render_race, bench_world_apply);
criterion_main!(benches);
