//! Project CARS UDP telemetry decoding and clock-synchronized overlay frames.
//!
//! replaysync turns a recorded (or live) stream of Project CARS telemetry
//! packets into a sequence of world snapshots, one per output video frame, so
//! that a race overlay can be composited over a recording of the same race.
//!
//! # Features
//!
//! - **Strict decoding**: the three UDP packet kinds are decoded by fixed
//!   offset and rejected on any size, type, text or value error
//! - **World clock**: race time rebuilt from the viewed car's lap clock,
//!   immune to lap wraps and late packets
//! - **Causal frames**: a frame never reflects a packet from its future
//! - **Race trimming**: captures are cut to the race via a cached descriptor
//! - **Live capture**: UDP reception with optional recording to disk
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use replaysync::{Replay, ReplayConfig};
//!
//! fn main() -> replaysync::Result<()> {
//!     let config = ReplayConfig::load("replay.yaml")?;
//!     let mut session = Replay::open(&config)?;
//!
//!     session.render_all(|rendered| {
//!         if let Some(leader) = rendered.frame.leader() {
//!             println!("{:8.3}s leader: {:?}", rendered.time, leader.name);
//!         }
//!         Ok(())
//!     })?;
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Decoding and packet sources
pub mod capture;
pub mod packet;
pub mod source;

// Simulation and frame driving
pub mod config;
pub mod driver;
pub mod session;
pub mod timing;
pub mod world;

// Core exports
pub use error::*;
pub use types::*;

pub use capture::{CaptureReader, DirectorySink, LiveCapture, RaceDescriptor};
pub use config::{ParticipantDisplay, ReplayConfig};
pub use driver::{FrameDriver, Renderer, SnapshotRenderer, StreamState};
pub use packet::{DecodedPacket, PacketKind, RawPacket, decode};
pub use session::{RenderedFrame, ReplaySession};
pub use source::{DecodePolicy, Next, PacketSource, PacketStream, PredecodedQueue};
pub use timing::FrameRate;
pub use world::{StartingGridEntry, WorldSnapshot, WorldState};

/// Entry point for replay sessions and live captures.
///
/// # Examples
///
/// ## Capture replay
/// ```rust,no_run
/// use replaysync::{Replay, ReplayConfig};
///
/// fn main() -> replaysync::Result<()> {
///     let session = Replay::open(&ReplayConfig::new("captures/brands-hatch"))?;
///     println!("{} fps", session.frame_rate().fps());
///     Ok(())
/// }
/// ```
///
/// ## Live capture
/// ```rust,no_run
/// use replaysync::{Replay, ReplayConfig};
/// use futures::StreamExt;
///
/// #[tokio::main]
/// async fn main() -> replaysync::Result<()> {
///     let mut capture = Replay::capture(&ReplayConfig::new("captures/new")).await?;
///     while let Some(packet) = capture.next().await {
///         println!("packet {} ({} bytes)", packet.sequence, packet.len());
///     }
///     Ok(())
/// }
/// ```
pub struct Replay;

impl Replay {
    /// Open the configured capture for rendering.
    ///
    /// Loads every packet of `config.source_telemetry`, trims it to the race
    /// when `use_descriptor` is set, and decodes it up front.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid
    /// - The capture directory cannot be read
    pub fn open(config: &ReplayConfig) -> Result<ReplaySession> {
        ReplaySession::open(config)
    }

    /// Start a live UDP capture on `config.capture.bind_address`.
    ///
    /// When `config.capture.directory` is set every packet is also recorded
    /// there as a replayable capture.
    pub async fn capture(config: &ReplayConfig) -> Result<LiveCapture> {
        let address = &config.capture.bind_address;
        match &config.capture.directory {
            Some(directory) => {
                let sink = DirectorySink::create(directory).await?;
                LiveCapture::bind_recording(address, sink).await
            }
            None => LiveCapture::bind(address).await,
        }
    }
}
