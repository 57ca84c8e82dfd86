//! Typed records for the Project CARS UDP packet family.
//!
//! Each packet kind has a record with a `decode` constructor that validates
//! the buffer length, the packet type byte and every field domain before
//! returning. Records are plain owned data: cloning is cheap enough for the
//! world model and they are `Send + Sync` so batches can be decoded on worker
//! threads.
//!
//! ## Packed fields
//!
//! Several bytes carry more than one value:
//! - the game/session byte splits into [`GameState`] and [`SessionState`]
//! - race position and laps completed carry active / invalid-lap flags in bit 7
//! - the sector byte carries quarter-unit position refinements above the sector
//!
//! The masks live in [`flags`]; [`ParticipantTiming`] exposes the unpacked values.
//!
//! ## Usage Example
//!
//! ```rust
//! use replaysync::types::{GameState, SessionState};
//!
//! let byte = (5 << 4) | 2;
//! assert_eq!(GameState::from_byte(byte), GameState::Playing);
//! assert_eq!(SessionState::from_byte(byte), SessionState::Race);
//! ```

pub mod flags;
mod participant;
mod state;
mod telemetry;

pub use participant::{AdditionalParticipantPacket, ParticipantInfoPacket};
pub use state::{GameState, RaceState, SessionState};
pub use telemetry::{ParticipantTiming, TelemetryPacket};
