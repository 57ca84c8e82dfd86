//! Packet sources and the decoded look-ahead queue the frame driver pulls from

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::packet::{self, DecodedPacket, RawPacket};
use crate::{ReplayError, Result};

/// Outcome of asking a source for its next item.
#[derive(Debug, Clone, PartialEq)]
pub enum Next<T> {
    /// The next item in stream order.
    Packet(T),
    /// Nothing buffered yet; a live source may produce more later.
    Pending,
    /// The source will never produce another item.
    Exhausted,
}

impl<T> Next<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Next<U> {
        match self {
            Next::Packet(item) => Next::Packet(f(item)),
            Next::Pending => Next::Pending,
            Next::Exhausted => Next::Exhausted,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Next::Exhausted)
    }
}

/// Trait for raw packet sources
///
/// Sources abstract over capture directories and live sockets. Polling never
/// blocks: a source with nothing ready returns [`Next::Pending`].
pub trait PacketSource {
    /// Get the next raw packet in arrival order.
    ///
    /// Returns:
    /// - `Ok(Next::Packet(raw))` - next packet available
    /// - `Ok(Next::Pending)` - nothing ready yet
    /// - `Ok(Next::Exhausted)` - stream ended (normal termination)
    /// - `Err(e)` - the source itself failed
    fn poll_packet(&mut self) -> Result<Next<RawPacket>>;
}

impl<S: PacketSource + ?Sized> PacketSource for Box<S> {
    fn poll_packet(&mut self) -> Result<Next<RawPacket>> {
        (**self).poll_packet()
    }
}

/// What to do with a packet that fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodePolicy {
    /// Log the failure and continue with the next packet.
    #[default]
    Skip,
    /// Return the failure to the caller.
    Abort,
}

impl DecodePolicy {
    /// Applies the policy to a decode failure: `Ok(())` means skip it.
    fn handle(self, sequence: Option<u64>, error: ReplayError) -> Result<()> {
        match self {
            DecodePolicy::Skip if error.is_decode_error() => {
                warn!(?sequence, "Skipping undecodable packet: {}", error);
                Ok(())
            }
            _ => Err(error),
        }
    }
}

/// Decoded packets in stream order with one packet of look-ahead.
///
/// The frame driver peeks at the next packet to decide whether applying it
/// would overshoot the requested time, and only takes it when it would not.
pub trait PendingPackets {
    /// Look at the next decoded packet without consuming it.
    fn peek(&mut self) -> Result<Next<&DecodedPacket>>;

    /// Consume the packet returned by the last successful [`peek`](Self::peek).
    fn take(&mut self) -> Option<DecodedPacket>;
}

/// Decodes packets from a [`PacketSource`] on demand.
pub struct PacketStream<S> {
    source: S,
    policy: DecodePolicy,
    buffered: Option<DecodedPacket>,
    skipped: u64,
}

impl<S: PacketSource> PacketStream<S> {
    pub fn new(source: S, policy: DecodePolicy) -> Self {
        Self { source, policy, buffered: None, skipped: 0 }
    }

    /// Number of packets dropped under [`DecodePolicy::Skip`].
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }

    fn fill(&mut self) -> Result<Next<()>> {
        while self.buffered.is_none() {
            match self.source.poll_packet()? {
                Next::Packet(raw) => match packet::decode(&raw) {
                    Ok(decoded) => self.buffered = Some(decoded),
                    Err(e) => {
                        self.policy.handle(Some(raw.sequence), e)?;
                        self.skipped += 1;
                    }
                },
                Next::Pending => return Ok(Next::Pending),
                Next::Exhausted => return Ok(Next::Exhausted),
            }
        }
        Ok(Next::Packet(()))
    }
}

impl<S: PacketSource> PendingPackets for PacketStream<S> {
    fn peek(&mut self) -> Result<Next<&DecodedPacket>> {
        Ok(match self.fill()? {
            Next::Packet(()) => self.buffered.as_ref().map_or(Next::Exhausted, Next::Packet),
            Next::Pending => Next::Pending,
            Next::Exhausted => Next::Exhausted,
        })
    }

    fn take(&mut self) -> Option<DecodedPacket> {
        self.buffered.take()
    }
}

/// A fully decoded, in-memory packet queue.
///
/// Built by decoding a whole capture up front, optionally in parallel.
/// Failures stay at their stream position and the policy is applied when
/// the queue reaches them.
pub struct PredecodedQueue {
    entries: VecDeque<(u64, Result<DecodedPacket>)>,
    policy: DecodePolicy,
}

impl PredecodedQueue {
    pub fn new(packets: impl IntoIterator<Item = DecodedPacket>) -> Self {
        let entries = packets.into_iter().enumerate().map(|(i, p)| (i as u64, Ok(p))).collect();
        Self { entries, policy: DecodePolicy::Skip }
    }

    /// Decodes every packet of `raw` across worker threads.
    pub fn decode_all(raw: &[RawPacket], policy: DecodePolicy) -> Self {
        let entries: VecDeque<_> = raw
            .iter()
            .map(|r| r.sequence)
            .zip(packet::decode_parallel(raw))
            .collect();
        debug!(packets = entries.len(), "Decoded capture up front");
        Self { entries, policy }
    }

    /// Drains a source until it is exhausted or pending, then decodes the lot.
    pub fn from_source<S: PacketSource>(source: &mut S, policy: DecodePolicy) -> Result<Self> {
        let mut raw = Vec::new();
        while let Next::Packet(packet) = source.poll_packet()? {
            raw.push(packet);
        }
        Ok(Self::decode_all(&raw, policy))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PendingPackets for PredecodedQueue {
    fn peek(&mut self) -> Result<Next<&DecodedPacket>> {
        while let Some((sequence, Err(_))) = self.entries.front() {
            let sequence = *sequence;
            if let Some((_, Err(e))) = self.entries.pop_front() {
                self.policy.handle(Some(sequence), e)?;
            }
        }
        Ok(match self.entries.front() {
            Some((_, Ok(packet))) => Next::Packet(packet),
            _ => Next::Exhausted,
        })
    }

    fn take(&mut self) -> Option<DecodedPacket> {
        match self.entries.pop_front() {
            Some((_, Ok(packet))) => Some(packet),
            _ => None,
        }
    }
}
