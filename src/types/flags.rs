//! Bit masks for the packed fields of Project CARS packets

// Game/session byte: game state (low nibble) + session state (high nibble)
pub mod game_session {
    pub const GAME_MASK: u8 = 0b0000_1111;
    pub const SESSION_MASK: u8 = 0b1111_0000;
    pub const SESSION_SHIFT: u8 = 4;
}

// Race state byte (low 3 bits); the remaining bits are lap/DRS flags we ignore
pub mod race_state {
    pub const MASK: u8 = 0b0000_0111;
}

// Participant info entry bytes
pub mod participant {
    pub const ACTIVE: u8 = 0b1000_0000;
    pub const POSITION_MASK: u8 = 0b0111_1111;
    pub const INVALID_LAP: u8 = 0b1000_0000;
    pub const LAPS_MASK: u8 = 0b0111_1111;
    pub const SECTOR_MASK: u8 = 0b0000_0111;
    pub const X_FRACTION_MASK: u8 = 0b0001_1000;
    pub const X_FRACTION_SHIFT: u8 = 3;
    pub const Z_FRACTION_MASK: u8 = 0b0110_0000;
    pub const Z_FRACTION_SHIFT: u8 = 5;

    // Sector time reported before a participant has completed any sector
    pub const NO_SECTOR_TIME: f32 = -123.0;
}

// Current time reported before the session clock starts
pub const UNSET_TIME: f32 = -1.0;
