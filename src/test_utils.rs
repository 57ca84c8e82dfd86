//! Packet builders and capture fixtures for tests and benchmarks
//!
//! Real captures are large and tied to one game build, so tests assemble
//! packets byte by byte with the same layout constants the decoders read.

#![cfg(any(test, feature = "benchmark"))]

use std::path::{Path, PathBuf};

use crate::packet::format::{
    self, MAX_PARTICIPANTS, NAMES_PER_PACKET, PacketKind, TEXT_FIELD_SIZE, additional,
    participant, telemetry,
};
use crate::types::ParticipantTiming;

/// Build version written by the builders unless overridden.
pub const BUILD_VERSION: u16 = 1000;

/// Length of one scripted lap in seconds.
pub const SCRIPTED_LAP_TIME: f32 = 30.0;

/// Time between scripted telemetry packets in seconds.
pub const SCRIPTED_STEP: f32 = 0.5;

fn header(kind: PacketKind, version: u16) -> Vec<u8> {
    let mut data = vec![0u8; kind.packet_length()];
    data[..2].copy_from_slice(&version.to_le_bytes());
    data[2] = kind.discriminant();
    data
}

fn write_text(data: &mut [u8], offset: usize, text: &str) {
    let bytes = text.as_bytes();
    let len = bytes.len().min(TEXT_FIELD_SIZE);
    data[offset..offset + len].copy_from_slice(&bytes[..len]);
}

fn write_names(data: &mut [u8], start: usize, names: &[String]) {
    for (i, name) in names.iter().take(NAMES_PER_PACKET).enumerate() {
        write_text(data, start + i * TEXT_FIELD_SIZE, name);
    }
}

/// Participant info packet with session strings and up to sixteen names.
pub fn build_participant_packet(version: u16, session: [&str; 4], names: &[String]) -> Vec<u8> {
    let mut data = header(PacketKind::ParticipantInfo, version);
    let offsets = [
        participant::CAR_NAME,
        participant::CAR_CLASS_NAME,
        participant::TRACK_LOCATION,
        participant::TRACK_VARIATION,
    ];
    for (offset, text) in offsets.into_iter().zip(session) {
        write_text(&mut data, offset, text);
    }
    write_names(&mut data, participant::NAMES, names);
    data
}

/// Additional participant info packet starting at roster slot `offset`.
pub fn build_additional_participant_packet(version: u16, offset: u8, names: &[String]) -> Vec<u8> {
    let mut data = header(PacketKind::AdditionalParticipantInfo, version);
    data[additional::OFFSET] = offset;
    write_names(&mut data, additional::NAMES, names);
    data
}

/// Fluent builder for telemetry packets.
///
/// Defaults to an empty race in progress with no viewed participant.
#[derive(Debug, Clone)]
pub struct TelemetryBuilder {
    version: u16,
    game_session: u8,
    race_state: u8,
    viewed: i8,
    participants: i8,
    laps_in_event: u8,
    current_time: f32,
    event_time_remaining: f32,
    track_length: f32,
    slots: Vec<(usize, ParticipantTiming)>,
}

impl Default for TelemetryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryBuilder {
    pub fn new() -> Self {
        Self {
            version: BUILD_VERSION,
            game_session: (5 << 4) | 2,
            race_state: 2,
            viewed: -1,
            participants: 0,
            laps_in_event: 0,
            current_time: -1.0,
            event_time_remaining: -1.0,
            track_length: 0.0,
            slots: Vec::new(),
        }
    }

    pub fn build_version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }

    /// Raw game, session and race state codes.
    pub fn states(mut self, game: u8, session: u8, race: u8) -> Self {
        self.game_session = (session << 4) | (game & 0x0F);
        self.race_state = race;
        self
    }

    pub fn viewed(self, index: usize) -> Self {
        self.viewed_raw(index as i8)
    }

    pub fn viewed_raw(mut self, index: i8) -> Self {
        self.viewed = index;
        self
    }

    pub fn participants(self, count: usize) -> Self {
        self.participants_raw(count as i8)
    }

    pub fn participants_raw(mut self, count: i8) -> Self {
        self.participants = count;
        self
    }

    pub fn laps_in_event(mut self, laps: u8) -> Self {
        self.laps_in_event = laps;
        self
    }

    pub fn current_time(mut self, time: f32) -> Self {
        self.current_time = time;
        self
    }

    pub fn event_time_remaining(mut self, time: f32) -> Self {
        self.event_time_remaining = time;
        self
    }

    pub fn track_length(mut self, length: f32) -> Self {
        self.track_length = length;
        self
    }

    pub fn slot(mut self, index: usize, timing: ParticipantTiming) -> Self {
        self.slots.push((index, timing));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut data = header(PacketKind::Telemetry, self.version);
        data[telemetry::GAME_SESSION_STATE] = self.game_session;
        data[telemetry::VIEWED_PARTICIPANT_INDEX] = self.viewed as u8;
        data[telemetry::NUM_PARTICIPANTS] = self.participants as u8;
        data[telemetry::RACE_STATE_FLAGS] = self.race_state;
        data[telemetry::LAPS_IN_EVENT] = self.laps_in_event;
        put_f32(&mut data, telemetry::CURRENT_TIME, self.current_time);
        put_f32(&mut data, telemetry::EVENT_TIME_REMAINING, self.event_time_remaining);
        put_f32(&mut data, telemetry::TRACK_LENGTH, self.track_length);

        for slot in 0..MAX_PARTICIPANTS {
            let base = telemetry::PARTICIPANT_INFO + slot * telemetry::PARTICIPANT_STRIDE;
            put_f32(&mut data, base + telemetry::entry::LAST_SECTOR_TIME, -123.0);
        }
        for (slot, timing) in &self.slots {
            let base = telemetry::PARTICIPANT_INFO + slot * telemetry::PARTICIPANT_STRIDE;
            timing.encode_into(&mut data[base..base + telemetry::PARTICIPANT_STRIDE]);
        }
        data
    }
}

fn put_f32(data: &mut [u8], offset: usize, value: f32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// An active car slot at `position` on lap `lap` (0-based laps completed).
pub fn car(position: u8, lap: u8, sector: u8, last_sector_time: f32) -> ParticipantTiming {
    ParticipantTiming::from_raw([0; 3], 0x80 | position, lap, lap + 1, sector, last_sector_time)
}

/// Names `Driver01`, `Driver02`, ... for a roster of `count` cars.
pub fn roster_names(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("Driver{:02}", i)).collect()
}

/// A complete two-car race: front end, grid, `laps` racing laps, finish.
///
/// The roster packet arrives while the cars sit on an unpopulated grid.
/// Both cars lap in exactly [`SCRIPTED_LAP_TIME`] with three equal sectors,
/// and telemetry is sent every [`SCRIPTED_STEP`] seconds of lap time.
pub fn scripted_race(laps: u8) -> Vec<Vec<u8>> {
    let sector_time = SCRIPTED_LAP_TIME / 3.0;
    let session = ["Formula C", "FC", "Brands Hatch", "Indy"];
    let grid = TelemetryBuilder::new().participants(2).viewed(0).laps_in_event(laps);
    let mut packets = vec![grid.clone().states(1, 0, 0).build()];
    packets.push(grid.clone().states(2, 5, 1).build());
    packets.push(build_participant_packet(BUILD_VERSION, session, &roster_names(2)));
    for _ in 0..2 {
        packets.push(grid.clone().states(2, 5, 1).build());
    }
    packets.push(
        grid.clone()
            .states(2, 5, 1)
            .slot(0, car(1, 0, 3, -123.0))
            .slot(1, car(2, 0, 3, -123.0))
            .build(),
    );

    let steps = (SCRIPTED_LAP_TIME / SCRIPTED_STEP) as u32;
    for lap in 0..laps {
        for step in 0..steps {
            let time = step as f32 * SCRIPTED_STEP;
            let sector = 1 + (time / sector_time) as u8;
            let last = if lap == 0 && sector == 1 { -123.0 } else { sector_time };
            packets.push(
                grid.clone()
                    .states(2, 5, 2)
                    .current_time(time)
                    .slot(0, car(1, lap, sector, last))
                    .slot(1, car(2, lap, sector, last))
                    .build(),
            );
        }
    }

    for step in 0..4 {
        packets.push(
            grid.clone()
                .states(2, 5, 3)
                .current_time(step as f32 * SCRIPTED_STEP)
                .slot(0, car(1, laps, 1, sector_time))
                .slot(1, car(2, laps, 1, sector_time))
                .build(),
        );
    }
    packets
}

/// Writes packets as `pdata<N>` files and returns their paths.
pub fn write_capture<P: AsRef<Path>>(dir: P, packets: &[Vec<u8>]) -> std::io::Result<Vec<PathBuf>> {
    packets
        .iter()
        .enumerate()
        .map(|(i, data)| {
            let path = dir.as_ref().join(format!("pdata{}", i));
            std::fs::write(&path, data)?;
            Ok(path)
        })
        .collect()
}

/// Decodes a builder packet, panicking on builder bugs.
pub fn decode_fixture(data: &[u8]) -> crate::packet::DecodedPacket {
    match crate::packet::decode_bytes(data) {
        Ok(packet) => packet,
        Err(e) => panic!("Fixture packet failed to decode: {}", e),
    }
}

/// Number of telemetry packets [`scripted_race`] emits before the green flag.
pub const SCRIPTED_PRE_RACE_TELEMETRY: usize = 5;
