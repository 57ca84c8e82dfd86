//! Simulation model built by applying decoded packets in stream order.
//!
//! [`WorldState`] owns the world clock `clip_t`. The clock follows the race
//! elapsed time derived from the viewed car's lap clock:
//!
//! - race elapsed = accumulated completed-lap time + `current_time`
//! - a drop in `current_time` while the viewed car is on a different lap than
//!   the one the lap clock started on is a lap wrap and folds the previous
//!   `current_time` into the accumulator
//! - a drop on the same lap is a late packet, and so is any packet from an
//!   earlier lap: its facts are applied as a correction but the clock does
//!   not move
//! - `current_time == -1` restarts race elapsed time at zero
//!
//! `clip_t` only ever grows by the amount race elapsed time exceeds its
//! previous peak, so it never decreases and late packets never count twice.

mod history;

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, trace};

use crate::packet::format::MAX_PARTICIPANTS;
use crate::packet::{DecodedPacket, PacketKind};
use crate::types::{
    AdditionalParticipantPacket, GameState, ParticipantInfoPacket, ParticipantTiming, RaceState,
    SessionState, TelemetryPacket,
};
pub use history::{SectorTime, TimingHistory};

/// Session-wide facts from the most recent packets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionFacts {
    pub build_version_number: u16,
    pub car_name: String,
    pub car_class_name: String,
    pub track_location: String,
    pub track_variation: String,
    pub game_state: GameState,
    pub session_state: SessionState,
    pub race_state: RaceState,
    pub laps_in_event: u8,
    pub event_time_remaining: f32,
    pub track_length: f32,
}

/// One row of the standings table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandingEntry {
    pub index: usize,
    pub name: Option<String>,
    pub race_position: u8,
    pub laps_completed: u8,
    pub current_lap: u8,
    pub sector: u8,
    pub invalid_lap: bool,
    pub world_position: [f32; 3],
    pub last_sector_time: Option<f32>,
    pub last_lap_time: Option<f32>,
    pub best_lap_time: Option<f32>,
    pub best_sector_times: [Option<f32>; 3],
    pub race_time: f32,
}

/// A car's slot on the grid, as first reported with race positions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartingGridEntry {
    pub position: u8,
    pub index: usize,
    pub name: Option<String>,
}

/// Read-only view of the world handed to renderers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorldSnapshot {
    pub clip_t: f64,
    pub race_elapsed: f64,
    pub session: SessionFacts,
    pub viewed_participant_index: Option<usize>,
    pub standings: Vec<StandingEntry>,
    /// Empty until a telemetry packet reports race positions.
    pub starting_grid: Vec<StartingGridEntry>,
}

impl WorldSnapshot {
    pub fn is_empty(&self) -> bool {
        self.standings.is_empty()
    }

    pub fn leader(&self) -> Option<&StandingEntry> {
        self.standings.first()
    }
}

/// What applying one packet changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Applied {
    pub kind: PacketKind,
    /// Seconds `clip_t` moved forward.
    pub advanced: f64,
    pub sectors_recorded: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct RaceClock {
    add_time: f64,
    last_time: Option<f32>,
    /// Viewed lap when the current lap clock started.
    start_lap: Option<u8>,
    elapsed: f64,
    peak: f64,
}

impl RaceClock {
    /// Clock after `packet`, and how far `clip_t` moves with it.
    ///
    /// The lap counter may tick a packet before or after the lap clock
    /// resets, so a drop in `current_time` is compared with the lap the clock
    /// started on rather than the previous packet's lap.
    fn step(&self, packet: &TelemetryPacket) -> (RaceClock, f64) {
        let lap = packet.viewed_participant().map(|p| p.current_lap);
        if !packet.has_time() {
            return (RaceClock { start_lap: lap, ..RaceClock::default() }, 0.0);
        }

        let current = packet.current_time;
        let mut next = *self;
        let stale = matches!((lap, self.start_lap), (Some(l), Some(start)) if l < start);
        match self.last_time {
            None => {
                next.last_time = Some(current);
                next.start_lap = lap;
            }
            // From a lap already folded into the clock.
            Some(_) if stale => {}
            Some(last) if current < last => {
                if lap.is_none() || lap != self.start_lap {
                    next.add_time += f64::from(last);
                    next.last_time = Some(current);
                    next.start_lap = lap;
                }
            }
            Some(_) => next.last_time = Some(current),
        }
        if !stale {
            next.elapsed = next.add_time + f64::from(current);
        }

        let advanced = (next.elapsed - self.peak).max(0.0);
        next.peak = self.peak.max(next.elapsed);
        (next, advanced)
    }
}

#[derive(Debug, Clone, Default)]
struct ParticipantRecord {
    timing: Option<ParticipantTiming>,
    history: TimingHistory,
}

/// The mutable simulation model.
#[derive(Debug, Clone)]
pub struct WorldState {
    roster: BTreeMap<usize, String>,
    session: SessionFacts,
    participants: Vec<ParticipantRecord>,
    num_participants: usize,
    viewed: Option<usize>,
    clock: RaceClock,
    clip_t: f64,
    /// `(position, index)` pairs, fixed by the first populated telemetry.
    starting_grid: Vec<(u8, usize)>,
    applied: u64,
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldState {
    pub fn new() -> Self {
        Self {
            roster: BTreeMap::new(),
            session: SessionFacts::default(),
            participants: vec![ParticipantRecord::default(); MAX_PARTICIPANTS],
            num_participants: 0,
            viewed: None,
            clock: RaceClock::default(),
            clip_t: 0.0,
            starting_grid: Vec::new(),
            applied: 0,
        }
    }

    /// World clock in seconds. Never decreases.
    pub fn clip_t(&self) -> f64 {
        self.clip_t
    }

    pub fn race_elapsed(&self) -> f64 {
        self.clock.elapsed
    }

    pub fn packets_applied(&self) -> u64 {
        self.applied
    }

    pub fn session(&self) -> &SessionFacts {
        &self.session
    }

    pub fn participant_name(&self, index: usize) -> Option<&str> {
        self.roster.get(&index).map(String::as_str).filter(|name| !name.is_empty())
    }

    pub fn timing_history(&self, index: usize) -> Option<&TimingHistory> {
        self.participants.get(index).map(|p| &p.history)
    }

    /// Grid order with names resolved against the current roster.
    pub fn starting_grid(&self) -> Vec<StartingGridEntry> {
        self.starting_grid
            .iter()
            .map(|&(position, index)| StartingGridEntry {
                position,
                index,
                name: self.participant_name(index).map(str::to_owned),
            })
            .collect()
    }

    /// The `clip_t` that applying `packet` would produce.
    ///
    /// `None` for packets that carry no time event.
    pub fn event_time(&self, packet: &DecodedPacket) -> Option<f64> {
        let telemetry = packet.as_telemetry()?;
        let (_, advanced) = self.clock.step(telemetry);
        Some(self.clip_t + advanced)
    }

    /// Applies one packet in stream order.
    pub fn apply(&mut self, packet: &DecodedPacket) -> Applied {
        self.applied += 1;
        match packet {
            DecodedPacket::Telemetry(telemetry) => self.apply_telemetry(telemetry),
            DecodedPacket::ParticipantInfo(info) => self.apply_participants(info),
            DecodedPacket::AdditionalParticipantInfo(extra) => self.apply_additional(extra),
        }
    }

    fn apply_participants(&mut self, info: &ParticipantInfoPacket) -> Applied {
        self.session.build_version_number = info.build_version_number;
        self.session.car_name.clone_from(&info.car_name);
        self.session.car_class_name.clone_from(&info.car_class_name);
        self.session.track_location.clone_from(&info.track_location);
        self.session.track_variation.clone_from(&info.track_variation);
        for (index, name) in info.name.iter().enumerate() {
            self.roster.insert(index, name.clone());
        }
        debug!(track = %info.track_location, car = %info.car_name, "Roster updated");
        Applied { kind: PacketKind::ParticipantInfo, advanced: 0.0, sectors_recorded: 0 }
    }

    fn apply_additional(&mut self, extra: &AdditionalParticipantPacket) -> Applied {
        for (index, name) in extra.indexed_names() {
            self.roster.insert(index, name.to_string());
        }
        debug!(offset = extra.offset, "Additional roster names applied");
        Applied { kind: PacketKind::AdditionalParticipantInfo, advanced: 0.0, sectors_recorded: 0 }
    }

    fn apply_telemetry(&mut self, packet: &TelemetryPacket) -> Applied {
        let (clock, advanced) = self.clock.step(packet);
        if clock.elapsed < self.clock.elapsed && clock.add_time == self.clock.add_time {
            trace!(
                current_time = packet.current_time,
                "Late telemetry packet applied as a correction"
            );
        }
        self.clock = clock;
        self.clip_t += advanced;

        if self.session.race_state != packet.race_state {
            debug!(from = ?self.session.race_state, to = ?packet.race_state, "Race state changed");
        }
        self.session.build_version_number = packet.build_version_number;
        self.session.game_state = packet.game_state;
        self.session.session_state = packet.session_state;
        self.session.race_state = packet.race_state;
        self.session.laps_in_event = packet.laps_in_event;
        self.session.event_time_remaining = packet.event_time_remaining;
        self.session.track_length = packet.track_length;
        self.num_participants = packet.num_participants;
        self.viewed = packet.viewed_participant_index;

        if self.starting_grid.is_empty() && packet.positions_populated() {
            self.record_starting_grid(packet);
        }

        let mut sectors_recorded = 0;
        for (record, timing) in self.participants.iter_mut().zip(&packet.participants) {
            record.timing = Some(*timing);
            if timing.is_active() && record.history.observe(timing).is_some() {
                sectors_recorded += 1;
            }
        }

        trace!(clip_t = self.clip_t, advanced, "Telemetry applied");
        Applied { kind: PacketKind::Telemetry, advanced, sectors_recorded }
    }

    fn record_starting_grid(&mut self, packet: &TelemetryPacket) {
        self.starting_grid = packet
            .participants
            .iter()
            .enumerate()
            .take(packet.num_participants)
            .filter(|(_, timing)| timing.is_active() && timing.race_position() > 0)
            .map(|(index, timing)| (timing.race_position(), index))
            .collect();
        self.starting_grid.sort_unstable();
        debug!(cars = self.starting_grid.len(), "Starting grid recorded");
    }

    /// Builds the render view. Pure and repeatable.
    pub fn snapshot(&self) -> WorldSnapshot {
        let mut standings: Vec<StandingEntry> = self
            .participants
            .iter()
            .enumerate()
            .take(self.num_participants)
            .filter_map(|(index, record)| {
                let timing = record.timing.filter(|t| t.is_active())?;
                Some(self.standing(index, &timing, &record.history))
            })
            .collect();
        standings.sort_by_key(|entry| (entry.race_position == 0, entry.race_position, entry.index));

        WorldSnapshot {
            clip_t: self.clip_t,
            race_elapsed: self.clock.elapsed,
            session: self.session.clone(),
            viewed_participant_index: self.viewed,
            standings,
            starting_grid: self.starting_grid(),
        }
    }

    fn standing(
        &self,
        index: usize,
        timing: &ParticipantTiming,
        history: &TimingHistory,
    ) -> StandingEntry {
        StandingEntry {
            index,
            name: self.participant_name(index).map(str::to_owned),
            race_position: timing.race_position(),
            laps_completed: timing.laps_completed(),
            current_lap: timing.current_lap,
            sector: timing.sector(),
            invalid_lap: timing.invalid_lap(),
            world_position: timing.precise_world_position(),
            last_sector_time: timing.sector_time(),
            last_lap_time: history.last_lap(),
            best_lap_time: history.best_lap(),
            best_sector_times: [1, 2, 3].map(|sector| history.best_sector(sector)),
            race_time: history.race_time(),
        }
    }
}
