//! Project CARS UDP packet layouts and low-level field extraction
//!
//! Every packet kind has a fixed total length and a fixed internal layout.
//! Framing is purely size based: there are no length prefixes or delimiters,
//! so the length check must happen before any field is read.
//!
//! ## Common header
//!
//! ```text
//! offset 0  u16  build version number (little-endian)
//! offset 2  u8   packet type (low 2 bits) | sequence counter (high 6 bits)
//! ```
//!
//! Multi-byte values are little-endian and naturally aligned, matching the C
//! structures the game writes to the socket.

use crate::{ReplayError, Result};
use serde::{Deserialize, Serialize};

/// Size of the header shared by every packet kind.
pub const HEADER_SIZE: usize = 3;
/// Width of every fixed-width text field.
pub const TEXT_FIELD_SIZE: usize = 64;
/// Number of name fields carried by participant packets.
pub const NAMES_PER_PACKET: usize = 16;
/// Number of participant slots in a telemetry packet.
pub const MAX_PARTICIPANTS: usize = 56;
/// Highest roster index (exclusive) addressable by participant packets.
pub const MAX_ROSTER_INDEX: usize = 64;

const PACKET_TYPE_OFFSET: usize = 2;
const PACKET_TYPE_MASK: u8 = 0b0000_0011;

/// Participant info packet layout.
pub mod participant {
    pub const PACKET_LENGTH: usize = 1347;
    pub const CAR_NAME: usize = 3;
    pub const CAR_CLASS_NAME: usize = 67;
    pub const TRACK_LOCATION: usize = 131;
    pub const TRACK_VARIATION: usize = 195;
    pub const NAMES: usize = 259;
}

/// Additional participant info packet layout.
pub mod additional {
    pub const PACKET_LENGTH: usize = 1028;
    pub const OFFSET: usize = 3;
    pub const NAMES: usize = 4;
}

/// Telemetry packet layout, restricted to the fields the world model reads.
pub mod telemetry {
    pub const PACKET_LENGTH: usize = 1367;
    pub const GAME_SESSION_STATE: usize = 3;
    pub const VIEWED_PARTICIPANT_INDEX: usize = 4;
    pub const NUM_PARTICIPANTS: usize = 5;
    pub const RACE_STATE_FLAGS: usize = 10;
    pub const LAPS_IN_EVENT: usize = 11;
    pub const CURRENT_TIME: usize = 20;
    pub const EVENT_TIME_REMAINING: usize = 36;
    pub const PARTICIPANT_INFO: usize = 464;
    pub const PARTICIPANT_STRIDE: usize = 16;
    pub const TRACK_LENGTH: usize = 1360;

    /// Offsets inside one participant info entry.
    pub mod entry {
        pub const WORLD_POSITION: usize = 0;
        pub const LAP_DISTANCE: usize = 6;
        pub const RACE_POSITION: usize = 8;
        pub const LAPS_COMPLETED: usize = 9;
        pub const CURRENT_LAP: usize = 10;
        pub const SECTOR: usize = 11;
        pub const LAST_SECTOR_TIME: usize = 12;
    }
}

/// Packet kinds of the supported protocol family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketKind {
    Telemetry,
    ParticipantInfo,
    AdditionalParticipantInfo,
}

impl PacketKind {
    /// All known kinds, in discriminant order.
    pub const ALL: [PacketKind; 3] =
        [PacketKind::Telemetry, PacketKind::ParticipantInfo, PacketKind::AdditionalParticipantInfo];

    /// Discriminant carried in the low bits of the packet type byte.
    pub const fn discriminant(self) -> u8 {
        match self {
            PacketKind::Telemetry => 0,
            PacketKind::ParticipantInfo => 1,
            PacketKind::AdditionalParticipantInfo => 2,
        }
    }

    /// Fixed byte length of this kind.
    pub const fn packet_length(self) -> usize {
        match self {
            PacketKind::Telemetry => telemetry::PACKET_LENGTH,
            PacketKind::ParticipantInfo => participant::PACKET_LENGTH,
            PacketKind::AdditionalParticipantInfo => additional::PACKET_LENGTH,
        }
    }

    pub fn from_discriminant(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.discriminant() == value)
    }

    /// Reads the kind from a raw buffer's packet type byte.
    pub fn detect(data: &[u8]) -> Result<Self> {
        let found = packet_type(data)?;
        Self::from_discriminant(found).ok_or(ReplayError::UnknownPacketType { found })
    }
}

/// Checks the buffer length against a kind's fixed length.
pub fn expect_length(data: &[u8], kind: PacketKind) -> Result<()> {
    let expected = kind.packet_length();
    if data.len() != expected {
        return Err(ReplayError::size_mismatch(expected, data.len()));
    }
    Ok(())
}

/// Checks the packet type byte against a kind's discriminant.
pub fn expect_packet_type(data: &[u8], kind: PacketKind) -> Result<()> {
    let found = packet_type(data)?;
    if found != kind.discriminant() {
        return Err(ReplayError::TypeMismatch { expected: kind.discriminant(), found });
    }
    Ok(())
}

/// Packet type discriminant with the sequence bits masked off.
pub fn packet_type(data: &[u8]) -> Result<u8> {
    let byte = data
        .get(PACKET_TYPE_OFFSET)
        .ok_or_else(|| ReplayError::size_mismatch(HEADER_SIZE, data.len()))?;
    Ok(byte & PACKET_TYPE_MASK)
}

/// Build version number from the common header.
pub fn build_version(data: &[u8]) -> Result<u16> {
    parse_u16_le(data, 0)
}

pub fn parse_u8(data: &[u8], offset: usize) -> Result<u8> {
    data.get(offset).copied().ok_or_else(|| out_of_bounds("u8", offset, 1, data.len()))
}

pub fn parse_i8(data: &[u8], offset: usize) -> Result<i8> {
    parse_u8(data, offset).map(|v| v as i8)
}

pub fn parse_u16_le(data: &[u8], offset: usize) -> Result<u16> {
    Ok(u16::from_le_bytes(read_array(data, offset, "u16")?))
}

pub fn parse_i16_le(data: &[u8], offset: usize) -> Result<i16> {
    Ok(i16::from_le_bytes(read_array(data, offset, "i16")?))
}

pub fn parse_f32_le(data: &[u8], offset: usize) -> Result<f32> {
    Ok(f32::from_le_bytes(read_array(data, offset, "f32")?))
}

fn read_array<const N: usize>(data: &[u8], offset: usize, what: &str) -> Result<[u8; N]> {
    let bytes = offset
        .checked_add(N)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| out_of_bounds(what, offset, N, data.len()))?;
    let mut array = [0u8; N];
    array.copy_from_slice(bytes);
    Ok(array)
}

fn out_of_bounds(what: &str, offset: usize, width: usize, len: usize) -> ReplayError {
    ReplayError::Parse {
        context: "Field extraction".to_string(),
        details: format!(
            "Insufficient data for {} at offset {} (need {} bytes, have {})",
            what,
            offset,
            width,
            len.saturating_sub(offset)
        ),
    }
}

/// Decodes a fixed-width text field.
///
/// Only the trailing run of `\0` padding is removed; NUL bytes before that
/// run are kept. The remaining bytes must be strict UTF-8.
pub fn parse_text(
    data: &[u8],
    offset: usize,
    field_index: usize,
    field: &'static str,
) -> Result<String> {
    let bytes = offset
        .checked_add(TEXT_FIELD_SIZE)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| out_of_bounds("text field", offset, TEXT_FIELD_SIZE, data.len()))?;
    let trimmed = strip_trailing_nulls(bytes);
    std::str::from_utf8(trimmed)
        .map(str::to_owned)
        .map_err(|source| ReplayError::Encoding { field_index, field, source })
}

fn strip_trailing_nulls(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |last| last + 1);
    &bytes[..end]
}
