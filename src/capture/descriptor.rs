//! Race descriptor: the packets marking where the race in a capture begins and ends
//!
//! Captures usually hold far more than the race itself (menus, the formation
//! lap, the cool-down lap). The descriptor is found once by scanning the
//! capture backwards and stored next to it as YAML:
//!
//! ```yaml
//! race_start: 3f1c...
//! race_finish: 9a02...
//! race_end: 77be...
//! ```
//!
//! Each value is the blake3 hash of one packet's bytes.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::packet::{self, DecodedPacket, RawPacket};
use crate::types::{GameState, RaceState, SessionState, TelemetryPacket};
use crate::{ReplayError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceDescriptor {
    /// First packet of the uninterrupted race session run leading to the green flag.
    pub race_start: String,
    /// Last telemetry packet while the viewed car was racing.
    pub race_finish: String,
    /// Last telemetry packet with the viewed car finished.
    pub race_end: String,
}

impl RaceDescriptor {
    /// Scans `packets` backwards for the last finished race.
    pub fn build(packets: &[RawPacket]) -> Result<Self> {
        let telemetry = |raw: &RawPacket| -> Option<TelemetryPacket> {
            match packet::decode(raw) {
                Ok(DecodedPacket::Telemetry(t)) => Some(t),
                _ => None,
            }
        };
        let not_found = |what: &str| {
            ReplayError::parse_error("Race descriptor", format!("No {} found in capture", what))
        };

        let mut scan = packets.iter().enumerate().rev();

        let (end, _) = scan
            .by_ref()
            .find(|(_, raw)| telemetry(raw).is_some_and(|t| t.race_state == RaceState::Finished))
            .ok_or_else(|| not_found("finished race"))?;
        let (finish, _) = scan
            .by_ref()
            .find(|(_, raw)| telemetry(raw).is_some_and(|t| t.race_state == RaceState::Racing))
            .ok_or_else(|| not_found("racing packet"))?;
        let (grid, _) = scan
            .by_ref()
            .find(|(_, raw)| telemetry(raw).is_some_and(|t| t.race_state.is_pre_race()))
            .ok_or_else(|| not_found("pre-race packet"))?;

        // Walk back to the earliest packet of the race session run.
        let mut start = grid;
        for (index, raw) in scan {
            let left_session = telemetry(raw).is_some_and(|t| {
                t.session_state != SessionState::Race || t.game_state != GameState::Playing
            });
            if left_session {
                break;
            }
            start = index;
        }

        debug!(start, finish, end, "Race descriptor built");
        Ok(Self {
            race_start: packets[start].data_hash(),
            race_finish: packets[finish].data_hash(),
            race_end: packets[end].data_hash(),
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| ReplayError::file_error(path.to_path_buf(), e))?;
        serde_yaml_ng::from_str(&yaml).map_err(|e| {
            ReplayError::parse_error(
                "Race descriptor",
                format!("{}: YAML parsing failed: {}", path.display(), e),
            )
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml_ng::to_string(self)
            .map_err(|e| ReplayError::parse_error("Race descriptor", e.to_string()))?;
        std::fs::write(path, yaml).map_err(|e| ReplayError::file_error(path.to_path_buf(), e))
    }

    /// Loads the descriptor at `path`, rebuilding and saving it when it is
    /// missing or unreadable.
    ///
    /// Failing to save the rebuilt descriptor is logged, not returned.
    pub fn load_or_build<P: AsRef<Path>>(path: P, packets: &[RawPacket]) -> Result<Self> {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(descriptor) => {
                debug!(path = %path.display(), "Loaded race descriptor");
                return Ok(descriptor);
            }
            Err(e) => info!("Building race descriptor ({})", e),
        }

        let descriptor = Self::build(packets)?;
        if let Err(e) = descriptor.save(path) {
            warn!("Could not save race descriptor: {}", e);
        }
        Ok(descriptor)
    }

    /// Positions of the three marker packets within `packets`.
    pub fn locate(&self, packets: &[RawPacket]) -> RaceBounds {
        let find = |hash: &str| packets.iter().position(|p| p.data_hash() == hash);
        RaceBounds {
            start: find(&self.race_start),
            finish: find(&self.race_finish),
            end: find(&self.race_end),
        }
    }
}

/// Packet indices of the descriptor markers, where present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaceBounds {
    pub start: Option<usize>,
    pub finish: Option<usize>,
    pub end: Option<usize>,
}
