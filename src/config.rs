//! Replay configuration loaded from YAML
//!
//! ```yaml
//! source_telemetry: captures/brands-hatch
//! on_decode_error: skip
//! output:
//!   fps: 30
//!   sync_offset: 2.5
//! participants:
//!   Driver01:
//!     display: Jane Doe
//!     short_display: J. Doe
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::source::DecodePolicy;
use crate::{ReplayError, Result};

/// Port the game sends UDP telemetry to.
pub const DEFAULT_TELEMETRY_PORT: u16 = 5606;

/// Top-level replay configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Capture directory holding `pdata<N>` files.
    pub source_telemetry: PathBuf,

    #[serde(default = "default_descriptor_filename")]
    pub descriptor_filename: String,

    /// Trim the capture to the race found by the descriptor scan.
    #[serde(default = "default_true")]
    pub use_descriptor: bool,

    #[serde(default)]
    pub on_decode_error: DecodePolicy,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    /// Display details keyed by in-game telemetry name.
    #[serde(default)]
    pub participants: HashMap<String, ParticipantDisplay>,
}

/// Output video cadence and alignment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub fps: f64,
    /// Length of the output in seconds; the whole capture when unset.
    pub duration: Option<f64>,
    /// Seconds added to presentation time to get world time.
    pub sync_offset: f64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { fps: 30.0, duration: None, sync_offset: 0.0 }
    }
}

/// Live capture settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub bind_address: String,
    /// Where to record received packets, if anywhere.
    pub directory: Option<PathBuf>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { bind_address: format!("0.0.0.0:{}", DEFAULT_TELEMETRY_PORT), directory: None }
    }
}

/// How one participant is shown on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantDisplay {
    pub display: String,
    #[serde(default)]
    pub short_display: Option<String>,
    #[serde(default)]
    pub car: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
}

fn default_descriptor_filename() -> String {
    "descriptor.yaml".to_string()
}

fn default_true() -> bool {
    true
}

impl ReplayConfig {
    /// Minimal configuration for a capture directory.
    pub fn new<P: Into<PathBuf>>(source_telemetry: P) -> Self {
        Self {
            source_telemetry: source_telemetry.into(),
            descriptor_filename: default_descriptor_filename(),
            use_descriptor: true,
            on_decode_error: DecodePolicy::default(),
            output: OutputConfig::default(),
            capture: CaptureConfig::default(),
            participants: HashMap::new(),
        }
    }

    /// Reads and validates a YAML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| ReplayError::file_error(path.to_path_buf(), e))?;
        let config = Self::from_yaml_str(&yaml)?;
        debug!(path = %path.display(), "Loaded replay configuration");
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: ReplayConfig = serde_yaml_ng::from_str(yaml).map_err(|e| {
            ReplayError::parse_error("Replay configuration", format!("YAML parsing failed: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml_ng::to_string(self)
            .map_err(|e| ReplayError::parse_error("Replay configuration", e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        let invalid =
            |details: String| ReplayError::parse_error("Configuration validation", details);

        if !(self.output.fps.is_finite() && self.output.fps > 0.0) {
            return Err(invalid(format!("output fps must be positive, got {}", self.output.fps)));
        }
        if !self.output.sync_offset.is_finite() {
            return Err(invalid("output sync_offset must be finite".to_string()));
        }
        if let Some(duration) = self.output.duration {
            if !(duration.is_finite() && duration >= 0.0) {
                return Err(invalid(format!("output duration must be >= 0, got {}", duration)));
            }
        }
        if self.descriptor_filename.trim().is_empty() {
            return Err(invalid("descriptor_filename is empty".to_string()));
        }
        Ok(())
    }

    /// Path of the race descriptor inside the capture directory.
    pub fn descriptor_path(&self) -> PathBuf {
        self.source_telemetry.join(&self.descriptor_filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_yaml_takes_defaults() {
        let config = ReplayConfig::from_yaml_str("source_telemetry: captures/race1\n").unwrap();
        assert_eq!(config.source_telemetry, PathBuf::from("captures/race1"));
        assert_eq!(config.descriptor_filename, "descriptor.yaml");
        assert!(config.use_descriptor);
        assert_eq!(config.on_decode_error, DecodePolicy::Skip);
        assert_eq!(config.output.fps, 30.0);
        assert_eq!(config.capture.bind_address, "0.0.0.0:5606");
        assert_eq!(config.descriptor_path(), PathBuf::from("captures/race1/descriptor.yaml"));
    }

    #[test]
    fn full_yaml_parses() {
        let yaml = r#"
source_telemetry: /data/pdata
use_descriptor: false
on_decode_error: abort
output:
  fps: 60
  duration: 120.5
  sync_offset: -3.0
capture:
  bind_address: 127.0.0.1:5606
  directory: /data/new
participants:
  Driver01:
    display: Jane Doe
    short_display: J. Doe
    team: Team Blue
"#;
        let config = ReplayConfig::from_yaml_str(yaml).unwrap();
        assert!(!config.use_descriptor);
        assert_eq!(config.on_decode_error, DecodePolicy::Abort);
        assert_eq!(config.output.duration, Some(120.5));
        assert_eq!(config.capture.directory, Some(PathBuf::from("/data/new")));
        let driver = &config.participants["Driver01"];
        assert_eq!(driver.short_display.as_deref(), Some("J. Doe"));
        assert_eq!(driver.car, None);
    }

    #[test]
    fn rejects_non_positive_fps() {
        let result = ReplayConfig::from_yaml_str("source_telemetry: x\noutput:\n  fps: 0\n");
        assert!(matches!(result, Err(ReplayError::Parse { .. })));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let result = ReplayConfig::from_yaml_str("source_telemetry: [unterminated");
        assert!(matches!(result, Err(ReplayError::Parse { .. })));
    }

    #[test]
    fn round_trips_through_a_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.yaml");
        let mut config = ReplayConfig::new(dir.path());
        config.output.sync_offset = 1.25;
        std::fs::write(&path, config.to_yaml_string()?)?;

        assert_eq!(ReplayConfig::load(&path)?, config);
        Ok(())
    }

    #[test]
    fn missing_file_reports_its_path() {
        match ReplayConfig::load("/nonexistent/replay.yaml") {
            Err(ReplayError::File { path, .. }) => {
                assert_eq!(path, PathBuf::from("/nonexistent/replay.yaml"))
            }
            other => panic!("Expected File error, got {:?}", other),
        }
    }
}
