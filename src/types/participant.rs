//! Participant info packets (roster names and session strings)

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::packet::format::{
    self, MAX_ROSTER_INDEX, NAMES_PER_PACKET, PacketKind, TEXT_FIELD_SIZE, additional, participant,
};

/// Participant info packet (type 1, 1347 bytes).
///
/// Carries the session strings plus the names of roster slots 0 to 15.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantInfoPacket {
    pub build_version_number: u16,
    pub car_name: String,
    pub car_class_name: String,
    pub track_location: String,
    pub track_variation: String,
    pub name: Vec<String>,
}

/// Additional participant info packet (type 2, 1028 bytes).
///
/// Carries sixteen names starting at roster slot `offset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalParticipantPacket {
    pub build_version_number: u16,
    pub offset: u8,
    pub name: Vec<String>,
}

// Session strings occupy text field indices 0..4; names follow.
const SESSION_FIELD_COUNT: usize = 4;

impl ParticipantInfoPacket {
    pub const KIND: PacketKind = PacketKind::ParticipantInfo;

    pub fn decode(data: &[u8]) -> Result<Self> {
        format::expect_length(data, Self::KIND)?;
        let build_version_number = format::build_version(data)?;
        format::expect_packet_type(data, Self::KIND)?;

        let car_name = format::parse_text(data, participant::CAR_NAME, 0, "car_name")?;
        let car_class_name =
            format::parse_text(data, participant::CAR_CLASS_NAME, 1, "car_class_name")?;
        let track_location =
            format::parse_text(data, participant::TRACK_LOCATION, 2, "track_location")?;
        let track_variation =
            format::parse_text(data, participant::TRACK_VARIATION, 3, "track_variation")?;
        let name = decode_names(data, participant::NAMES, SESSION_FIELD_COUNT)?;

        Ok(Self {
            build_version_number,
            car_name,
            car_class_name,
            track_location,
            track_variation,
            name,
        })
    }
}

impl AdditionalParticipantPacket {
    pub const KIND: PacketKind = PacketKind::AdditionalParticipantInfo;

    pub fn decode(data: &[u8]) -> Result<Self> {
        format::expect_length(data, Self::KIND)?;
        let build_version_number = format::build_version(data)?;
        format::expect_packet_type(data, Self::KIND)?;

        let offset = format::parse_u8(data, additional::OFFSET)?;
        if offset as usize + NAMES_PER_PACKET > MAX_ROSTER_INDEX {
            return Err(crate::ReplayError::invalid_value(
                "offset",
                format!(
                    "names {}..{} exceed the {} roster slots",
                    offset,
                    offset as usize + NAMES_PER_PACKET,
                    MAX_ROSTER_INDEX
                ),
            ));
        }
        let name = decode_names(data, additional::NAMES, 0)?;

        Ok(Self { build_version_number, offset, name })
    }

    /// Roster indices paired with the names they carry.
    pub fn indexed_names(&self) -> impl Iterator<Item = (usize, &str)> {
        let base = self.offset as usize;
        self.name.iter().enumerate().map(move |(i, name)| (base + i, name.as_str()))
    }
}

fn decode_names(data: &[u8], start: usize, first_field_index: usize) -> Result<Vec<String>> {
    (0..NAMES_PER_PACKET)
        .map(|i| {
            let offset = start + i * TEXT_FIELD_SIZE;
            format::parse_text(data, offset, first_field_index + i, "name")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReplayError;
    use crate::test_utils::{build_additional_participant_packet, build_participant_packet};
    use proptest::prelude::*;

    fn sixteen(name: &str) -> Vec<String> {
        vec![name.to_string(); NAMES_PER_PACKET]
    }

    #[test]
    fn decodes_sixteen_padded_names() {
        let data = build_participant_packet(1000, ["", "", "", ""], &sixteen("Driver01"));
        assert_eq!(data.len(), 1347);

        let packet = ParticipantInfoPacket::decode(&data).unwrap();
        assert_eq!(packet.build_version_number, 1000);
        assert_eq!(packet.name.len(), 16);
        assert_eq!(packet.name[0], "Driver01");
        assert!(packet.name.iter().all(|n| !n.contains('\0')));
    }

    #[test]
    fn decodes_session_strings() {
        let data = build_participant_packet(
            1122,
            ["Formula C", "FC", "Brands Hatch", "Indy"],
            &sixteen("A"),
        );
        let packet = ParticipantInfoPacket::decode(&data).unwrap();
        assert_eq!(packet.car_name, "Formula C");
        assert_eq!(packet.car_class_name, "FC");
        assert_eq!(packet.track_location, "Brands Hatch");
        assert_eq!(packet.track_variation, "Indy");
    }

    #[test]
    fn names_report_their_layout_index_on_bad_utf8() {
        let mut data = build_participant_packet(1, ["", "", "", ""], &sixteen("Ok"));
        data[participant::NAMES + 2 * TEXT_FIELD_SIZE] = 0xFF;
        match ParticipantInfoPacket::decode(&data) {
            Err(ReplayError::Encoding { field_index: 6, field: "name", .. }) => {}
            other => panic!("Expected Encoding error for field 6, got {:?}", other),
        }
    }

    #[test]
    fn wrong_type_byte_is_a_type_mismatch() {
        let mut data = build_participant_packet(1, ["", "", "", ""], &sixteen("x"));
        data[2] = 2;
        assert!(matches!(
            ParticipantInfoPacket::decode(&data),
            Err(ReplayError::TypeMismatch { expected: 1, found: 2 })
        ));
    }

    #[test]
    fn additional_packet_maps_names_from_offset() {
        let data = build_additional_participant_packet(1000, 16, &sixteen("Late Entry"));
        let packet = AdditionalParticipantPacket::decode(&data).unwrap();
        let indexed: Vec<_> = packet.indexed_names().collect();
        assert_eq!(indexed.first(), Some(&(16, "Late Entry")));
        assert_eq!(indexed.last(), Some(&(31, "Late Entry")));
    }

    #[test]
    fn additional_packet_rejects_offsets_past_the_roster() {
        let data = build_additional_participant_packet(1000, 49, &sixteen("x"));
        assert!(matches!(
            AdditionalParticipantPacket::decode(&data),
            Err(ReplayError::Value { field: "offset", .. })
        ));
    }

    proptest! {
        #[test]
        fn decoded_names_never_keep_trailing_nulls(
            names in prop::collection::vec("[a-zA-Z0-9 ]{0,64}", NAMES_PER_PACKET),
            version in any::<u16>(),
        ) {
            let data = build_participant_packet(version, ["", "", "", ""], &names);
            let packet = ParticipantInfoPacket::decode(&data).unwrap();
            prop_assert_eq!(packet.build_version_number, version);
            for (decoded, expected) in packet.name.iter().zip(&names) {
                prop_assert!(!decoded.ends_with('\0'));
                prop_assert_eq!(decoded.as_str(), expected.trim_end_matches('\0'));
            }
        }

        #[test]
        fn wrong_lengths_never_decode(len in 0usize..2048) {
            prop_assume!(len != participant::PACKET_LENGTH);
            let mut data = vec![0u8; len];
            if len > 2 {
                data[2] = 1;
            }
            let result = ParticipantInfoPacket::decode(&data);
            let is_size_mismatch = matches!(result, Err(ReplayError::SizeMismatch { .. }));
            prop_assert!(is_size_mismatch);
        }
    }
}
