//! Telemetry data packets (timing, standings and session state)

use serde::{Deserialize, Serialize};

use super::flags::{self, participant as entry_flags};
use super::{GameState, RaceState, SessionState};
use crate::packet::format::{self, MAX_PARTICIPANTS, PacketKind, telemetry};
use crate::{ReplayError, Result};

/// Telemetry data packet (type 0, 1367 bytes).
///
/// Only the timing, standings and session fields are decoded; car physics
/// fields are skipped by offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPacket {
    pub build_version_number: u16,
    pub game_state: GameState,
    pub session_state: SessionState,
    pub race_state: RaceState,
    /// Index of the participant the camera follows, if any.
    pub viewed_participant_index: Option<usize>,
    pub num_participants: usize,
    pub laps_in_event: u8,
    /// Current lap time of the viewed participant; `-1.0` before the clock starts.
    pub current_time: f32,
    pub event_time_remaining: f32,
    pub participants: Vec<ParticipantTiming>,
    pub track_length: f32,
}

/// One participant slot of a telemetry packet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticipantTiming {
    pub world_position: [i16; 3],
    pub lap_distance: u16,
    race_position: u8,
    laps_completed: u8,
    pub current_lap: u8,
    sector: u8,
    pub last_sector_time: f32,
}

impl ParticipantTiming {
    fn decode(data: &[u8], base: usize) -> Result<Self> {
        use telemetry::entry;

        let mut world_position = [0i16; 3];
        for (axis, value) in world_position.iter_mut().enumerate() {
            *value = format::parse_i16_le(data, base + entry::WORLD_POSITION + axis * 2)?;
        }

        Ok(Self {
            world_position,
            lap_distance: format::parse_u16_le(data, base + entry::LAP_DISTANCE)?,
            race_position: format::parse_u8(data, base + entry::RACE_POSITION)?,
            laps_completed: format::parse_u8(data, base + entry::LAPS_COMPLETED)?,
            current_lap: format::parse_u8(data, base + entry::CURRENT_LAP)?,
            sector: format::parse_u8(data, base + entry::SECTOR)?,
            last_sector_time: format::parse_f32_le(data, base + entry::LAST_SECTOR_TIME)?,
        })
    }

    pub fn is_active(&self) -> bool {
        self.race_position & entry_flags::ACTIVE != 0
    }

    pub fn race_position(&self) -> u8 {
        self.race_position & entry_flags::POSITION_MASK
    }

    pub fn laps_completed(&self) -> u8 {
        self.laps_completed & entry_flags::LAPS_MASK
    }

    /// Current sector, 1 to 3 (0 when unknown).
    pub fn sector(&self) -> u8 {
        self.sector & entry_flags::SECTOR_MASK
    }

    /// Whether the current lap has been invalidated.
    ///
    /// The game flags the run to the line before the first lap proper as
    /// invalid (sector 3 with no previous sector time); that is not reported.
    pub fn invalid_lap(&self) -> bool {
        let flagged = self.laps_completed & entry_flags::INVALID_LAP != 0;
        let grid_run = self.sector() == 3 && self.last_sector_time == entry_flags::NO_SECTOR_TIME;
        flagged && !grid_run
    }

    /// Last completed sector time, if one has been set.
    pub fn sector_time(&self) -> Option<f32> {
        (self.last_sector_time > 0.0).then_some(self.last_sector_time)
    }

    /// World position with the quarter-metre x/z refinement from the sector byte.
    pub fn precise_world_position(&self) -> [f32; 3] {
        let x_fraction =
            ((self.sector & entry_flags::X_FRACTION_MASK) >> entry_flags::X_FRACTION_SHIFT) as f32;
        let z_fraction =
            ((self.sector & entry_flags::Z_FRACTION_MASK) >> entry_flags::Z_FRACTION_SHIFT) as f32;
        [
            self.world_position[0] as f32 + x_fraction / 4.0,
            self.world_position[1] as f32,
            self.world_position[2] as f32 + z_fraction / 4.0,
        ]
    }

    /// Builds a slot from its packed wire bytes.
    pub fn from_raw(
        world_position: [i16; 3],
        race_position: u8,
        laps_completed: u8,
        current_lap: u8,
        sector: u8,
        last_sector_time: f32,
    ) -> Self {
        Self {
            world_position,
            lap_distance: 0,
            race_position,
            laps_completed,
            current_lap,
            sector,
            last_sector_time,
        }
    }

    #[cfg(any(test, feature = "benchmark"))]
    pub(crate) fn encode_into(&self, entry_bytes: &mut [u8]) {
        use telemetry::entry;

        for (axis, value) in self.world_position.iter().enumerate() {
            let at = entry::WORLD_POSITION + axis * 2;
            entry_bytes[at..at + 2].copy_from_slice(&value.to_le_bytes());
        }
        entry_bytes[entry::LAP_DISTANCE..entry::LAP_DISTANCE + 2]
            .copy_from_slice(&self.lap_distance.to_le_bytes());
        entry_bytes[entry::RACE_POSITION] = self.race_position;
        entry_bytes[entry::LAPS_COMPLETED] = self.laps_completed;
        entry_bytes[entry::CURRENT_LAP] = self.current_lap;
        entry_bytes[entry::SECTOR] = self.sector;
        entry_bytes[entry::LAST_SECTOR_TIME..entry::LAST_SECTOR_TIME + 4]
            .copy_from_slice(&self.last_sector_time.to_le_bytes());
    }
}

impl TelemetryPacket {
    pub const KIND: PacketKind = PacketKind::Telemetry;

    pub fn decode(data: &[u8]) -> Result<Self> {
        format::expect_length(data, Self::KIND)?;
        let build_version_number = format::build_version(data)?;
        format::expect_packet_type(data, Self::KIND)?;

        let game_session = format::parse_u8(data, telemetry::GAME_SESSION_STATE)?;
        let viewed = format::parse_i8(data, telemetry::VIEWED_PARTICIPANT_INDEX)?;
        let viewed_participant_index = match viewed {
            -1 => None,
            index if (0..MAX_PARTICIPANTS as i8).contains(&index) => Some(index as usize),
            index => {
                return Err(ReplayError::invalid_value(
                    "viewed_participant_index",
                    format!("{} is outside -1..{}", index, MAX_PARTICIPANTS),
                ));
            }
        };

        let count = format::parse_i8(data, telemetry::NUM_PARTICIPANTS)?;
        if !(0..=MAX_PARTICIPANTS as i8).contains(&count) {
            return Err(ReplayError::invalid_value(
                "num_participants",
                format!("{} is outside 0..={}", count, MAX_PARTICIPANTS),
            ));
        }

        let current_time = format::parse_f32_le(data, telemetry::CURRENT_TIME)?;
        if !current_time.is_finite() {
            return Err(ReplayError::invalid_value(
                "current_time",
                format!("{} is not a finite time", current_time),
            ));
        }

        let participants = (0..MAX_PARTICIPANTS)
            .map(|slot| {
                let base = telemetry::PARTICIPANT_INFO + slot * telemetry::PARTICIPANT_STRIDE;
                ParticipantTiming::decode(data, base)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            build_version_number,
            game_state: GameState::from_byte(game_session),
            session_state: SessionState::from_byte(game_session),
            race_state: RaceState::from_byte(format::parse_u8(data, telemetry::RACE_STATE_FLAGS)?),
            viewed_participant_index,
            num_participants: count as usize,
            laps_in_event: format::parse_u8(data, telemetry::LAPS_IN_EVENT)?,
            current_time,
            event_time_remaining: format::parse_f32_le(data, telemetry::EVENT_TIME_REMAINING)?,
            participants,
            track_length: format::parse_f32_le(data, telemetry::TRACK_LENGTH)?,
        })
    }

    /// Whether the session clock has started.
    pub fn has_time(&self) -> bool {
        self.current_time != flags::UNSET_TIME
    }

    /// Active participant slots, limited to the reported participant count.
    pub fn active_participants(&self) -> impl Iterator<Item = (usize, &ParticipantTiming)> {
        self.participants
            .iter()
            .enumerate()
            .take(self.num_participants)
            .filter(|(_, p)| p.is_active())
    }

    /// Whether any counted participant has been assigned a race position.
    pub fn positions_populated(&self) -> bool {
        self.participants.iter().take(self.num_participants).any(|p| p.race_position() != 0)
    }

    pub fn viewed_participant(&self) -> Option<&ParticipantTiming> {
        self.viewed_participant_index.and_then(|index| self.participants.get(index))
    }
}
