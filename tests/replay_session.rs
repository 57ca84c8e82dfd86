//! End-to-end replay of a capture directory written packet by packet.

use std::path::Path;

use anyhow::{Context, Result, ensure};
use replaysync::packet::format::{participant, telemetry};
use replaysync::{
    DecodedPacket, PredecodedQueue, Replay, ReplayConfig, ReplayError, SnapshotRenderer,
    StreamState, WorldSnapshot,
};

const LAP_SECTORS: [f32; 3] = [7.0, 7.0, 6.0];

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn participant_packet(names: &[&str]) -> Vec<u8> {
    let mut data = vec![0u8; participant::PACKET_LENGTH];
    data[..2].copy_from_slice(&1000u16.to_le_bytes());
    data[2] = 1;
    let track = b"Donington";
    data[participant::TRACK_LOCATION..][..track.len()].copy_from_slice(track);
    for (i, name) in names.iter().enumerate() {
        let offset = participant::NAMES + i * 64;
        data[offset..offset + name.len()].copy_from_slice(name.as_bytes());
    }
    data
}

/// Two cars in lockstep, car 0 leading and viewed.
fn telemetry_packet(states: u8, race: u8, time: f32, lap: u8, sector: u8, last: f32) -> Vec<u8> {
    let mut data = vec![0u8; telemetry::PACKET_LENGTH];
    data[..2].copy_from_slice(&1000u16.to_le_bytes());
    data[telemetry::GAME_SESSION_STATE] = states;
    data[telemetry::VIEWED_PARTICIPANT_INDEX] = 0;
    data[telemetry::NUM_PARTICIPANTS] = 2;
    data[telemetry::RACE_STATE_FLAGS] = race;
    data[telemetry::CURRENT_TIME..][..4].copy_from_slice(&time.to_le_bytes());
    for slot in 0..2 {
        let base = telemetry::PARTICIPANT_INFO + slot * telemetry::PARTICIPANT_STRIDE;
        let entry = &mut data[base..base + telemetry::PARTICIPANT_STRIDE];
        entry[telemetry::entry::RACE_POSITION] = 0x80 | (slot as u8 + 1);
        entry[telemetry::entry::LAPS_COMPLETED] = lap.saturating_sub(1);
        entry[telemetry::entry::CURRENT_LAP] = lap;
        entry[telemetry::entry::SECTOR] = sector;
        entry[telemetry::entry::LAST_SECTOR_TIME..][..4].copy_from_slice(&last.to_le_bytes());
    }
    data
}

/// Front end, roster, grid, two 20 second laps, then the cool-down.
fn race_capture() -> Vec<Vec<u8>> {
    const RACE: u8 = (5 << 4) | 2;
    let mut packets = vec![
        telemetry_packet(0x01, 0, -1.0, 0, 0, -123.0),
        participant_packet(&["Driver01", "Driver02"]),
        telemetry_packet(RACE, 1, -1.0, 1, 3, -123.0),
    ];
    for lap in 1..=2u8 {
        for step in 0..40 {
            let time = step as f32 * 0.5;
            let sector = if time < 7.0 { 1 } else if time < 14.0 { 2 } else { 3 };
            let last = match (lap, sector) {
                (1, 1) => -123.0,
                (_, 1) => LAP_SECTORS[2],
                (_, s) => LAP_SECTORS[s as usize - 2],
            };
            packets.push(telemetry_packet(RACE, 2, time, lap, sector, last));
        }
    }
    for step in 0..4 {
        packets.push(telemetry_packet(RACE, 3, step as f32 * 0.5, 3, 1, LAP_SECTORS[2]));
    }
    packets
}

fn write_capture(dir: &Path, packets: &[Vec<u8>]) -> Result<()> {
    for (i, data) in packets.iter().enumerate() {
        std::fs::write(dir.join(format!("pdata{}", i)), data)?;
    }
    Ok(())
}

fn config_for(dir: &Path) -> Result<ReplayConfig> {
    let yaml = format!(
        "source_telemetry: {}\n\
         output:\n  fps: 25\n\
         participants:\n  Driver01:\n    display: Jane Doe\n",
        dir.display()
    );
    let path = dir.join("replay.yaml");
    std::fs::write(&path, yaml)?;
    Ok(ReplayConfig::load(&path)?)
}

#[test]
fn replays_a_capture_frame_by_frame() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    write_capture(dir.path(), &race_capture())?;
    let mut session = Replay::open(&config_for(dir.path())?)?;

    let mut frames: Vec<(f64, WorldSnapshot)> = Vec::new();
    session.render_all(|rendered| {
        frames.push((rendered.time, rendered.frame));
        Ok(())
    })?;

    ensure!(dir.path().join("descriptor.yaml").exists(), "descriptor was not cached");
    ensure!(frames.len() > 1000, "only {} frames rendered", frames.len());
    for pair in frames.windows(2) {
        ensure!(pair[0].1.clip_t <= pair[1].1.clip_t, "clip_t went backwards at {}", pair[1].0);
    }
    for (time, frame) in &frames {
        ensure!(frame.clip_t <= *time + 1e-9, "frame at {} shows clip_t {}", time, frame.clip_t);
    }

    let (_, last) = frames.last().context("no frames")?;
    let leader = last.leader().context("no leader in final frame")?;
    assert_eq!(leader.name.as_deref(), Some("Jane Doe"));
    assert_eq!(last.standings[1].name.as_deref(), Some("Driver02"));
    assert_eq!(leader.last_lap_time, Some(20.0));
    assert_eq!(leader.best_lap_time, Some(20.0));
    assert_eq!(last.session.track_location, "Donington");
    // Each lap wrap folds in its last 19.5 s packet, then 1.5 s of cool-down.
    assert!((last.race_elapsed - 40.5).abs() < 1e-6, "race_elapsed {}", last.race_elapsed);
    assert_eq!(session.status().state, StreamState::Exhausted);
    Ok(())
}

#[test]
fn cached_descriptor_is_reused() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_capture(dir.path(), &race_capture())?;
    let config = config_for(dir.path())?;

    let first = Replay::open(&config)?;
    let cached = std::fs::read_to_string(config.descriptor_path())?;
    let second = Replay::open(&config)?;

    assert_eq!(first.descriptor(), second.descriptor());
    assert_eq!(std::fs::read_to_string(config.descriptor_path())?, cached);
    Ok(())
}

#[test]
fn fresh_world_renders_an_empty_first_frame() -> Result<()> {
    let queue = PredecodedQueue::new(Vec::<DecodedPacket>::new());
    let mut driver = replaysync::FrameDriver::new(queue, SnapshotRenderer::new());
    assert_eq!(driver.frame_at(0.0)?, WorldSnapshot::default());
    Ok(())
}

#[test]
fn roster_packet_decodes_from_raw_bytes() -> Result<()> {
    let names = ["Driver01"; 16];
    let data = participant_packet(&names);
    ensure!(data.len() == 1347, "participant packet is {} bytes", data.len());

    match replaysync::packet::decode_bytes(&data)? {
        DecodedPacket::ParticipantInfo(info) => {
            assert_eq!(info.build_version_number, 1000);
            assert_eq!(info.name[0], "Driver01");
            assert_eq!(info.name.len(), 16);
        }
        other => panic!("Expected participant info, got {:?}", other.kind()),
    }
    Ok(())
}

#[test]
fn missing_capture_directory_is_reported() {
    let config = ReplayConfig::new("/nonexistent/capture");
    assert!(matches!(Replay::open(&config), Err(ReplayError::File { .. })));
}
