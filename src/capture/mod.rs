//! Packet capture: recorded capture directories, their race descriptors, and
//! live UDP reception.

pub mod descriptor;
pub mod live;
pub mod reader;

pub use descriptor::{RaceBounds, RaceDescriptor};
pub use live::{DirectorySink, LiveCapture, MAX_DATAGRAM_SIZE, PacketSink};
pub use reader::{CAPTURE_FILE_PREFIX, CaptureReader, capture_files};
