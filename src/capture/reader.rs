//! Capture directory reader
//!
//! A capture is a directory of `pdata<N>` files, one datagram per file,
//! numbered in arrival order. The whole directory is loaded into memory when
//! opened so that polling never touches the disk.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use replaysync::capture::CaptureReader;
//! use replaysync::source::{Next, PacketSource};
//!
//! fn count_packets() -> replaysync::Result<()> {
//!     let mut reader = CaptureReader::open("captures/brands-hatch")?;
//!     println!("Capture contains {} packets", reader.packet_count());
//!
//!     while let Next::Packet(raw) = reader.poll_packet()? {
//!         println!("Packet {} ({} bytes)", raw.sequence, raw.len());
//!     }
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::descriptor::RaceDescriptor;
use crate::packet::{self, DecodedPacket, RawPacket};
use crate::source::{Next, PacketSource};
use crate::{ReplayError, Result};

/// File name prefix of captured packets.
pub const CAPTURE_FILE_PREFIX: &str = "pdata";

/// In-memory reader over a capture directory.
pub struct CaptureReader {
    packets: Vec<RawPacket>,
    position: usize,
    directory: PathBuf,
}

/// Capture files in a directory, sorted by their numeric suffix.
pub fn capture_files<P: AsRef<Path>>(directory: P) -> Result<Vec<(u64, PathBuf)>> {
    let directory = directory.as_ref();
    let entries =
        std::fs::read_dir(directory).map_err(|e| ReplayError::file_error(directory.into(), e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ReplayError::file_error(directory.into(), e))?.path();
        let index = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_prefix(CAPTURE_FILE_PREFIX))
            .and_then(|suffix| suffix.parse::<u64>().ok());
        if let Some(index) = index {
            files.push((index, path));
        }
    }
    files.sort_by_key(|(index, _)| *index);
    Ok(files)
}

impl CaptureReader {
    /// Loads every `pdata<N>` file of a capture directory.
    pub fn open<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let directory = directory.as_ref();
        let files = capture_files(directory)?;

        let mut packets = Vec::with_capacity(files.len());
        for (sequence, path) in files {
            let data = std::fs::read(&path).map_err(|e| ReplayError::file_error(path, e))?;
            packets.push(RawPacket::new(sequence, data));
        }

        info!(directory = %directory.display(), packets = packets.len(), "Opened capture");
        Ok(Self { packets, position: 0, directory: directory.to_path_buf() })
    }

    /// Builds a reader over packets already in memory.
    pub fn from_packets(packets: Vec<Vec<u8>>) -> Self {
        let packets = packets
            .into_iter()
            .enumerate()
            .map(|(i, data)| RawPacket::new(i as u64, data))
            .collect();
        Self { packets, position: 0, directory: PathBuf::from("<memory>") }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Total number of packets, including those already read.
    pub fn packet_count(&self) -> usize {
        self.packets.len()
    }

    /// Index of the next packet to be read.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn packets(&self) -> &[RawPacket] {
        &self.packets
    }

    /// Packets not yet read.
    pub fn remaining(&self) -> &[RawPacket] {
        &self.packets[self.position..]
    }

    pub fn seek(&mut self, index: usize) -> Result<()> {
        if index > self.packets.len() {
            return Err(ReplayError::parse_error(
                "Capture seek",
                format!("Packet {} out of range (0..={})", index, self.packets.len()),
            ));
        }
        self.position = index;
        Ok(())
    }

    /// Cuts the capture down to the race described by `descriptor`.
    ///
    /// Reading restarts at the race start packet and stops after the race end
    /// packet when the capture still holds it. Between the start and the
    /// first telemetry packet reporting a race position for any participant,
    /// other telemetry is dropped so the first frame shows a populated grid.
    /// Participant packets and undecodable packets in that span are kept; the
    /// decode policy decides about the latter. Returns the number of packets
    /// dropped.
    pub fn trim_to_race(&mut self, descriptor: &RaceDescriptor) -> Result<usize> {
        let bounds = descriptor.locate(&self.packets);
        let start = bounds.start.ok_or_else(|| {
            ReplayError::parse_error(
                "Race descriptor",
                format!("Race start packet not found in {}", self.directory.display()),
            )
        })?;
        let end = bounds.end.filter(|&end| end >= start).unwrap_or(self.packets.len() - 1);

        let before = self.packets.len();
        let mut populated = false;
        let kept: Vec<RawPacket> = self
            .packets
            .drain(..)
            .take(end + 1)
            .skip(start)
            .filter(|raw| {
                if populated {
                    return true;
                }
                match packet::decode(raw) {
                    Ok(DecodedPacket::Telemetry(telemetry)) => {
                        populated = telemetry.positions_populated();
                        populated
                    }
                    Ok(_) | Err(_) => true,
                }
            })
            .collect();

        self.packets = kept;
        self.position = 0;
        let dropped = before - self.packets.len();
        debug!(start, end, dropped, "Trimmed capture to race");
        Ok(dropped)
    }
}

impl PacketSource for CaptureReader {
    fn poll_packet(&mut self) -> Result<Next<RawPacket>> {
        match self.packets.get(self.position) {
            Some(raw) => {
                self.position += 1;
                Ok(Next::Packet(raw.clone()))
            }
            None => Ok(Next::Exhausted),
        }
    }
}
