//! Frame driver pulling world state forward to each requested presentation time

use std::collections::HashMap;

use tracing::{debug, info, trace};

use crate::config::ParticipantDisplay;
use crate::source::{Next, PendingPackets};
use crate::world::{WorldSnapshot, WorldState};
use crate::{ReplayError, Result};

/// Converts a world view into an output frame.
///
/// Implemented by the overlay drawing layer; closures taking a snapshot work
/// too.
pub trait Renderer {
    type Frame;

    fn render(&mut self, snapshot: &WorldSnapshot) -> Result<Self::Frame>;
}

impl<F, T> Renderer for F
where
    F: FnMut(&WorldSnapshot) -> Result<T>,
{
    type Frame = T;

    fn render(&mut self, snapshot: &WorldSnapshot) -> Result<T> {
        self(snapshot)
    }
}

/// Whether more packets can still arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Streaming,
    /// The source ended; every later frame repeats the final world state.
    Exhausted,
}

/// Progress counters for a render session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverStatus {
    pub state: StreamState,
    pub clip_t: f64,
    pub last_request: Option<f64>,
    pub frames_rendered: u64,
    pub packets_applied: u64,
}

/// Drives world state from the packet queue on demand of the video encoder.
///
/// Each [`frame_at`](Self::frame_at) call advances the world until its clock
/// reaches the requested time, stopping early rather than applying a packet
/// whose time lies beyond it, then renders the result.
pub struct FrameDriver<P, R> {
    packets: P,
    renderer: R,
    world: WorldState,
    state: StreamState,
    last_request: Option<f64>,
    sync_offset: f64,
    frames_rendered: u64,
}

impl<P: PendingPackets, R: Renderer> FrameDriver<P, R> {
    pub fn new(packets: P, renderer: R) -> Self {
        Self {
            packets,
            renderer,
            world: WorldState::new(),
            state: StreamState::Streaming,
            last_request: None,
            sync_offset: 0.0,
            frames_rendered: 0,
        }
    }

    /// Maps presentation time `t` to world time `t + offset`.
    pub fn with_sync_offset(mut self, offset: f64) -> Self {
        self.sync_offset = offset;
        self
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn status(&self) -> DriverStatus {
        DriverStatus {
            state: self.state,
            clip_t: self.world.clip_t(),
            last_request: self.last_request,
            frames_rendered: self.frames_rendered,
            packets_applied: self.world.packets_applied(),
        }
    }

    /// Renders the frame for presentation time `target_time` in seconds.
    ///
    /// Requests must be non-decreasing; an earlier request fails with
    /// [`ReplayError::OutOfOrderRequest`] and leaves the world untouched.
    pub fn frame_at(&mut self, target_time: f64) -> Result<R::Frame> {
        if !target_time.is_finite() {
            return Err(ReplayError::invalid_value(
                "target_time",
                format!("{} is not a finite time", target_time),
            ));
        }
        if let Some(previous) = self.last_request {
            if target_time < previous {
                return Err(ReplayError::OutOfOrderRequest { previous, requested: target_time });
            }
        }
        self.last_request = Some(target_time);

        self.advance_to(target_time + self.sync_offset)?;
        self.frames_rendered += 1;
        self.renderer.render(&self.world.snapshot())
    }

    fn advance_to(&mut self, target: f64) -> Result<()> {
        while self.state == StreamState::Streaming && self.world.clip_t() < target {
            let event_time = match self.packets.peek()? {
                Next::Packet(packet) => self.world.event_time(packet),
                Next::Pending => break,
                Next::Exhausted => {
                    info!(
                        clip_t = self.world.clip_t(),
                        packets = self.world.packets_applied(),
                        "Packet stream exhausted, holding final frame"
                    );
                    self.state = StreamState::Exhausted;
                    break;
                }
            };

            if let Some(time) = event_time {
                if time > target {
                    trace!(time, target, "Next packet lies beyond the requested frame");
                    break;
                }
            }
            if let Some(packet) = self.packets.take() {
                self.world.apply(&packet);
            }
        }
        Ok(())
    }

    pub fn into_parts(self) -> (P, R, WorldState) {
        (self.packets, self.renderer, self.world)
    }
}

/// Renderer producing the snapshot itself, with configured display names.
#[derive(Debug, Clone, Default)]
pub struct SnapshotRenderer {
    names: HashMap<String, ParticipantDisplay>,
}

impl SnapshotRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_participants(names: HashMap<String, ParticipantDisplay>) -> Self {
        debug!(count = names.len(), "Display names configured");
        Self { names }
    }
}

impl Renderer for SnapshotRenderer {
    type Frame = WorldSnapshot;

    fn render(&mut self, snapshot: &WorldSnapshot) -> Result<WorldSnapshot> {
        let mut frame = snapshot.clone();
        let names = frame
            .standings
            .iter_mut()
            .map(|entry| &mut entry.name)
            .chain(frame.starting_grid.iter_mut().map(|entry| &mut entry.name));
        for name in names {
            let display = name.as_ref().and_then(|n| self.names.get(n));
            if let Some(display) = display {
                *name = Some(display.display.clone());
            }
        }
        Ok(frame)
    }
}
