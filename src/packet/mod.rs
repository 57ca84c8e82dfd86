//! Raw packet buffers and the decoding dispatcher.
//!
//! [`decode`] reads the packet type discriminant first and then hands the
//! buffer to the matching record decoder. Decoding is pure, so batches can be
//! decoded on several threads with [`decode_parallel`]; results always come
//! back in input order.

pub mod format;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::Result;
use crate::types::{AdditionalParticipantPacket, ParticipantInfoPacket, TelemetryPacket};
pub use format::PacketKind;

/// One datagram as captured, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    /// Arrival order assigned by the source.
    pub sequence: u64,
    pub data: Vec<u8>,
}

impl RawPacket {
    pub fn new(sequence: u64, data: Vec<u8>) -> Self {
        Self { sequence, data }
    }

    /// Content hash used to identify this packet across runs.
    pub fn data_hash(&self) -> String {
        blake3::hash(&self.data).to_hex().to_string()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A successfully decoded packet of any supported kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DecodedPacket {
    Telemetry(TelemetryPacket),
    ParticipantInfo(ParticipantInfoPacket),
    AdditionalParticipantInfo(AdditionalParticipantPacket),
}

impl DecodedPacket {
    pub fn kind(&self) -> PacketKind {
        match self {
            DecodedPacket::Telemetry(_) => PacketKind::Telemetry,
            DecodedPacket::ParticipantInfo(_) => PacketKind::ParticipantInfo,
            DecodedPacket::AdditionalParticipantInfo(_) => PacketKind::AdditionalParticipantInfo,
        }
    }

    pub fn build_version_number(&self) -> u16 {
        match self {
            DecodedPacket::Telemetry(p) => p.build_version_number,
            DecodedPacket::ParticipantInfo(p) => p.build_version_number,
            DecodedPacket::AdditionalParticipantInfo(p) => p.build_version_number,
        }
    }

    pub fn as_telemetry(&self) -> Option<&TelemetryPacket> {
        match self {
            DecodedPacket::Telemetry(p) => Some(p),
            _ => None,
        }
    }
}

/// Decodes a raw buffer of any supported kind.
pub fn decode(raw: &RawPacket) -> Result<DecodedPacket> {
    decode_bytes(&raw.data)
}

/// Decodes a byte slice of any supported kind.
pub fn decode_bytes(data: &[u8]) -> Result<DecodedPacket> {
    let kind = PacketKind::detect(data)?;
    trace!(?kind, len = data.len(), "Decoding packet");
    Ok(match kind {
        PacketKind::Telemetry => DecodedPacket::Telemetry(TelemetryPacket::decode(data)?),
        PacketKind::ParticipantInfo => {
            DecodedPacket::ParticipantInfo(ParticipantInfoPacket::decode(data)?)
        }
        PacketKind::AdditionalParticipantInfo => {
            DecodedPacket::AdditionalParticipantInfo(AdditionalParticipantPacket::decode(data)?)
        }
    })
}

/// Decodes a batch on scoped worker threads.
///
/// The output has one entry per input, in input order, each carrying its own
/// decode result.
pub fn decode_parallel(packets: &[RawPacket]) -> Vec<Result<DecodedPacket>> {
    let workers = std::thread::available_parallelism().map_or(1, |n| n.get());
    if workers <= 1 || packets.len() < workers * 2 {
        return packets.iter().map(decode).collect();
    }

    let chunk_size = packets.len().div_ceil(workers);
    std::thread::scope(|scope| {
        let handles: Vec<_> = packets
            .chunks(chunk_size)
            .map(|chunk| scope.spawn(move || chunk.iter().map(decode).collect::<Vec<_>>()))
            .collect();

        // Joined in spawn order, so chunk order is input order.
        handles
            .into_iter()
            .zip(packets.chunks(chunk_size))
            .flat_map(|(handle, chunk)| {
                handle.join().unwrap_or_else(|_| chunk.iter().map(decode).collect())
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReplayError;
    use crate::test_utils::{TelemetryBuilder, build_participant_packet};

    fn driver_names() -> Vec<String> {
        vec!["Driver01".to_string(); 16]
    }

    #[test]
    fn dispatches_participant_info() {
        let data = build_participant_packet(1000, ["", "", "", ""], &driver_names());
        let raw = RawPacket::new(0, data);
        let decoded = decode(&raw).unwrap();
        assert_eq!(decoded.kind(), PacketKind::ParticipantInfo);
        assert_eq!(decoded.build_version_number(), 1000);
        match decoded {
            DecodedPacket::ParticipantInfo(p) => assert_eq!(p.name[0], "Driver01"),
            other => panic!("Expected participant info, got {:?}", other.kind()),
        }
    }

    #[test]
    fn dispatches_telemetry() {
        let raw = RawPacket::new(3, TelemetryBuilder::new().current_time(12.0).build());
        let decoded = decode(&raw).unwrap();
        assert_eq!(decoded.kind(), PacketKind::Telemetry);
        assert_eq!(decoded.as_telemetry().map(|t| t.current_time), Some(12.0));
    }

    #[test]
    fn discriminant_three_is_unknown() {
        let mut data = vec![0u8; 1367];
        data[2] = 0b0101_0011;
        assert!(matches!(
            decode(&RawPacket::new(0, data)),
            Err(ReplayError::UnknownPacketType { found: 3 })
        ));
    }

    #[test]
    fn truncated_packets_fail_without_partial_records() {
        let mut data = build_participant_packet(1000, ["", "", "", ""], &driver_names());
        data.pop();
        assert!(matches!(
            decode(&RawPacket::new(0, data)),
            Err(ReplayError::SizeMismatch { expected: 1347, actual: 1346 })
        ));
        assert!(matches!(
            decode(&RawPacket::new(0, vec![1, 2])),
            Err(ReplayError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn parallel_decode_preserves_order() {
        let packets: Vec<_> = (0..200u64)
            .map(|i| {
                let data = if i % 7 == 0 {
                    vec![0u8; 10]
                } else {
                    TelemetryBuilder::new().current_time(i as f32).build()
                };
                RawPacket::new(i, data)
            })
            .collect();

        let decoded = decode_parallel(&packets);
        assert_eq!(decoded.len(), packets.len());
        for (i, result) in decoded.iter().enumerate() {
            if i % 7 == 0 {
                assert!(result.is_err());
            } else {
                let telemetry = result.as_ref().ok().and_then(|p| p.as_telemetry());
                let time = telemetry.map(|t| t.current_time);
                assert_eq!(time, Some(i as f32));
            }
        }
    }

    #[test]
    fn data_hash_is_stable_and_content_based() {
        let a = RawPacket::new(0, vec![1, 2, 3]);
        let b = RawPacket::new(9, vec![1, 2, 3]);
        assert_eq!(a.data_hash(), b.data_hash());
        assert_eq!(a.data_hash().len(), 64);
        assert_ne!(a.data_hash(), RawPacket::new(0, vec![1, 2, 4]).data_hash());
    }
}
