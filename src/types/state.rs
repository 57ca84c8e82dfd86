//! Game, session and race state classification

use serde::{Deserialize, Serialize};

use super::flags::{game_session, race_state};

/// Game state from the low nibble of the game/session byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GameState {
    #[default]
    Exited,
    FrontEnd,
    Playing,
    Paused,
    Unknown(u8),
}

/// Session state from the high nibble of the game/session byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Invalid,
    Practice,
    Test,
    Qualify,
    FormationLap,
    Race,
    TimeAttack,
    Unknown(u8),
}

/// Race state from the low 3 bits of the race state byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RaceState {
    #[default]
    Invalid,
    NotStarted,
    Racing,
    Finished,
    Disqualified,
    Retired,
    DidNotFinish,
    Unknown(u8),
}

impl GameState {
    pub fn from_byte(byte: u8) -> Self {
        match byte & game_session::GAME_MASK {
            0 => GameState::Exited,
            1 => GameState::FrontEnd,
            2 => GameState::Playing,
            3 => GameState::Paused,
            other => GameState::Unknown(other),
        }
    }
}

impl SessionState {
    pub fn from_byte(byte: u8) -> Self {
        match (byte & game_session::SESSION_MASK) >> game_session::SESSION_SHIFT {
            0 => SessionState::Invalid,
            1 => SessionState::Practice,
            2 => SessionState::Test,
            3 => SessionState::Qualify,
            4 => SessionState::FormationLap,
            5 => SessionState::Race,
            6 => SessionState::TimeAttack,
            other => SessionState::Unknown(other),
        }
    }
}

impl RaceState {
    pub fn from_byte(byte: u8) -> Self {
        match byte & race_state::MASK {
            0 => RaceState::Invalid,
            1 => RaceState::NotStarted,
            2 => RaceState::Racing,
            3 => RaceState::Finished,
            4 => RaceState::Disqualified,
            5 => RaceState::Retired,
            6 => RaceState::DidNotFinish,
            other => RaceState::Unknown(other),
        }
    }

    /// Whether the green flag has not yet dropped.
    pub fn is_pre_race(self) -> bool {
        matches!(self, RaceState::Invalid | RaceState::NotStarted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_and_session_share_one_byte() {
        let byte = (5 << 4) | 2;
        assert_eq!(GameState::from_byte(byte), GameState::Playing);
        assert_eq!(SessionState::from_byte(byte), SessionState::Race);
    }

    #[test]
    fn unknown_codes_are_preserved() {
        assert_eq!(GameState::from_byte(0x0F), GameState::Unknown(15));
        assert_eq!(SessionState::from_byte(0xF0), SessionState::Unknown(15));
        assert_eq!(RaceState::from_byte(0b1111_1111), RaceState::Unknown(7));
    }

    #[test]
    fn race_state_ignores_upper_flag_bits() {
        assert_eq!(RaceState::from_byte(0b1000_0011), RaceState::Finished);
        assert!(RaceState::from_byte(0b0100_0001).is_pre_race());
        assert!(!RaceState::Racing.is_pre_race());
    }
}
