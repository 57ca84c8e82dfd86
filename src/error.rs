//! Error types for packet decoding and replay synchronization.
//!
//! Every failure in the crate is reported through [`ReplayError`]. Decode
//! errors are distinct, inspectable variants so that an orchestrating caller
//! can decide between skipping a packet and aborting a render session; the
//! decoder itself never makes that choice.
//!
//! ## Error Categories
//!
//! - **Decode Errors**: size, type, encoding and value violations in a raw packet
//! - **Driver Errors**: frame requests that break the monotonic time contract
//! - **File Errors**: problems reading capture directories or descriptors
//! - **Parse Errors**: configuration and descriptor YAML failures
//! - **Capture Errors**: live UDP socket failures
//!
//! ```rust
//! use replaysync::ReplayError;
//!
//! let error = ReplayError::size_mismatch(1347, 1346);
//! assert!(error.is_decode_error());
//! assert!(error.is_recoverable());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for replay operations.
pub type Result<T, E = ReplayError> = std::result::Result<T, E>;

/// Main error type for replay operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ReplayError {
    #[error("Packet size mismatch: expected {expected} bytes, found {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Packet type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: u8, found: u8 },

    #[error("Unknown packet type {found}")]
    UnknownPacketType { found: u8 },

    #[error("Text field {field_index} ({field}) is not valid UTF-8")]
    Encoding {
        field_index: usize,
        field: &'static str,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("Invalid value for {field}: {details}")]
    Value { field: &'static str, details: String },

    #[error("Frame requested at {requested}s after a frame at {previous}s")]
    OutOfOrderRequest { previous: f64, requested: f64 },

    #[error("Capture file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Live capture failed: {reason}")]
    Capture {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ReplayError {
    /// Returns whether this error came from decoding a single packet.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            ReplayError::SizeMismatch { .. }
                | ReplayError::TypeMismatch { .. }
                | ReplayError::UnknownPacketType { .. }
                | ReplayError::Encoding { .. }
                | ReplayError::Value { .. }
        )
    }

    /// Returns whether a render session can continue after this error.
    ///
    /// Decode errors only invalidate one packet. An out-of-order frame request
    /// is a caller contract violation and ends the session.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ReplayError::SizeMismatch { .. } => true,
            ReplayError::TypeMismatch { .. } => true,
            ReplayError::UnknownPacketType { .. } => true,
            ReplayError::Encoding { .. } => true,
            ReplayError::Value { .. } => true,
            ReplayError::OutOfOrderRequest { .. } => false,
            ReplayError::File { .. } => false,
            ReplayError::Parse { .. } => false,
            ReplayError::Capture { .. } => true,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            ReplayError::SizeMismatch { .. } | ReplayError::UnknownPacketType { .. } => vec![
                "Check the capture was recorded from a Project CARS UDP stream",
                "Verify the in-game UDP protocol setting is the Project CARS 1 format",
                "Skip the packet and continue with the stream",
            ],
            ReplayError::TypeMismatch { .. } => vec![
                "Route the packet through the dispatching decoder",
                "Skip the packet and continue with the stream",
            ],
            ReplayError::Encoding { .. } | ReplayError::Value { .. } => vec![
                "Check the capture file for corruption",
                "Skip the packet and continue with the stream",
            ],
            ReplayError::OutOfOrderRequest { .. } => vec![
                "Request frames with non-decreasing presentation times",
                "Start a new render session to render an earlier time",
            ],
            ReplayError::File { .. } => vec![
                "Check the capture directory exists and is readable",
                "Check file permissions",
                "Ensure sufficient disk space when recording",
            ],
            ReplayError::Parse { .. } => vec![
                "Check the YAML syntax of the configuration file",
                "Delete a stale descriptor file so it is rebuilt",
            ],
            ReplayError::Capture { .. } => vec![
                "Ensure no other process is bound to the telemetry port",
                "Enable UDP output in the game settings",
                "Check firewall rules for the telemetry port",
            ],
        }
    }

    /// Helper constructor for size mismatches.
    pub fn size_mismatch(expected: usize, actual: usize) -> Self {
        ReplayError::SizeMismatch { expected, actual }
    }

    /// Helper constructor for value errors.
    pub fn invalid_value(field: &'static str, details: impl Into<String>) -> Self {
        ReplayError::Value { field, details: details.into() }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        ReplayError::File { path, source }
    }

    /// Helper constructor for parse errors.
    pub fn parse_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        ReplayError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for live capture errors with source.
    pub fn capture_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        ReplayError::Capture { reason: reason.into(), source: Some(source) }
    }
}

impl From<std::io::Error> for ReplayError {
    fn from(err: std::io::Error) -> Self {
        ReplayError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}
