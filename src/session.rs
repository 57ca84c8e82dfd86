//! Render session over a recorded capture
//!
//! A [`ReplaySession`] is everything one overlay render needs: the capture
//! trimmed to its race, decoded up front, behind a [`FrameDriver`] stepped at
//! the output frame rate.
//!
//! ```rust,no_run
//! use replaysync::{ReplayConfig, ReplaySession};
//!
//! fn render() -> replaysync::Result<()> {
//!     let config = ReplayConfig::load("replay.yaml")?;
//!     let mut session = ReplaySession::open(&config)?;
//!     while let Some(rendered) = session.next_frame()? {
//!         println!("{:>6} {:8.3}s {} cars", rendered.index, rendered.time,
//!             rendered.frame.standings.len());
//!     }
//!     Ok(())
//! }
//! ```

use tracing::{debug, info, warn};

use crate::Result;
use crate::capture::{CaptureReader, RaceDescriptor};
use crate::config::ReplayConfig;
use crate::driver::{DriverStatus, FrameDriver, Renderer, SnapshotRenderer, StreamState};
use crate::source::PredecodedQueue;
use crate::timing::FrameRate;

/// One output frame and where it sits on the video timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFrame<F> {
    pub index: u64,
    /// Presentation time in seconds.
    pub time: f64,
    pub frame: F,
}

pub struct ReplaySession<R: Renderer = SnapshotRenderer> {
    driver: FrameDriver<PredecodedQueue, R>,
    rate: FrameRate,
    frame_limit: Option<u64>,
    next_index: u64,
    descriptor: Option<RaceDescriptor>,
}

impl ReplaySession<SnapshotRenderer> {
    /// Opens the configured capture with the snapshot renderer.
    pub fn open(config: &ReplayConfig) -> Result<Self> {
        let renderer = SnapshotRenderer::with_participants(config.participants.clone());
        Self::with_renderer(config, renderer)
    }
}

impl<R: Renderer> ReplaySession<R> {
    pub fn with_renderer(config: &ReplayConfig, renderer: R) -> Result<Self> {
        config.validate()?;
        let rate = FrameRate::new(config.output.fps)?;
        let mut reader = CaptureReader::open(&config.source_telemetry)?;

        let descriptor = if config.use_descriptor {
            match trim_to_race(&mut reader, config) {
                Ok(descriptor) => Some(descriptor),
                Err(e) => {
                    warn!("No race found, replaying the whole capture: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let queue = PredecodedQueue::decode_all(reader.remaining(), config.on_decode_error);
        let driver =
            FrameDriver::new(queue, renderer).with_sync_offset(config.output.sync_offset);
        let frame_limit = config.output.duration.map(|duration| rate.frame_count(duration));

        info!(
            packets = reader.remaining().len(),
            fps = rate.fps(),
            frames = ?frame_limit,
            "Replay session ready"
        );
        Ok(Self { driver, rate, frame_limit, next_index: 0, descriptor })
    }

    /// Renders the next frame.
    ///
    /// Ends after the configured duration, or without one, right after the
    /// frame on which the capture ran out.
    pub fn next_frame(&mut self) -> Result<Option<RenderedFrame<R::Frame>>> {
        let done = match self.frame_limit {
            Some(limit) => self.next_index >= limit,
            None => self.driver.state() == StreamState::Exhausted,
        };
        if done {
            return Ok(None);
        }

        let index = self.next_index;
        let time = self.rate.presentation_time(index);
        let frame = self.driver.frame_at(time)?;
        self.next_index += 1;
        Ok(Some(RenderedFrame { index, time, frame }))
    }

    /// Renders every remaining frame, handing each to `sink`.
    ///
    /// Returns the number of frames rendered.
    pub fn render_all<F>(&mut self, mut sink: F) -> Result<u64>
    where
        F: FnMut(RenderedFrame<R::Frame>) -> Result<()>,
    {
        let mut count = 0;
        while let Some(rendered) = self.next_frame()? {
            sink(rendered)?;
            count += 1;
        }
        debug!(frames = count, status = ?self.driver.status(), "Render finished");
        Ok(count)
    }

    pub fn frame_rate(&self) -> FrameRate {
        self.rate
    }

    /// The race descriptor used to trim the capture, if any.
    pub fn descriptor(&self) -> Option<&RaceDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn status(&self) -> DriverStatus {
        self.driver.status()
    }

    pub fn driver(&self) -> &FrameDriver<PredecodedQueue, R> {
        &self.driver
    }
}

fn trim_to_race(reader: &mut CaptureReader, config: &ReplayConfig) -> Result<RaceDescriptor> {
    let descriptor = RaceDescriptor::load_or_build(config.descriptor_path(), reader.packets())?;
    let dropped = reader.trim_to_race(&descriptor)?;
    debug!(dropped, "Capture trimmed to race");
    Ok(descriptor)
}
