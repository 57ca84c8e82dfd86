//! Output frame cadence

use serde::{Deserialize, Serialize};

use crate::{ReplayError, Result};

/// Fixed frame rate of the output video track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameRate(f64);

impl FrameRate {
    pub fn new(fps: f64) -> Result<Self> {
        if fps.is_finite() && fps > 0.0 {
            Ok(Self(fps))
        } else {
            Err(ReplayError::invalid_value("fps", format!("{} is not a positive frame rate", fps)))
        }
    }

    pub fn fps(self) -> f64 {
        self.0
    }

    /// Time between consecutive frames.
    pub fn frame_interval(self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.0)
    }

    /// Presentation time of frame `index` in seconds.
    pub fn presentation_time(self, index: u64) -> f64 {
        index as f64 / self.0
    }

    /// Number of frames needed to cover `duration` seconds.
    pub fn frame_count(self, duration: f64) -> u64 {
        if duration <= 0.0 { 0 } else { (duration * self.0).ceil() as u64 }
    }

    /// Presentation times of every frame covering `duration` seconds.
    pub fn presentation_times(self, duration: f64) -> impl Iterator<Item = (u64, f64)> {
        (0..self.frame_count(duration)).map(move |i| (i, self.presentation_time(i)))
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self(30.0)
    }
}
