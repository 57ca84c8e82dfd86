//! Live UDP capture
//!
//! The game broadcasts one datagram per packet to port 5606. [`LiveCapture`]
//! binds that port and spawns a receive task which forwards every datagram,
//! in arrival order, over an unbounded channel. The frame loop polls the
//! channel without blocking; async consumers can use the capture as a
//! [`Stream`] instead.
//!
//! Received packets can also be written to disk as they arrive, producing a
//! capture directory [`CaptureReader`](super::CaptureReader) can replay later.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::reader::{CAPTURE_FILE_PREFIX, capture_files};
use crate::packet::RawPacket;
use crate::source::{Next, PacketSource};
use crate::{ReplayError, Result};

/// Largest datagram accepted; every known packet fits comfortably.
pub const MAX_DATAGRAM_SIZE: usize = 2048;

/// Destination for packets recorded during a live capture.
#[async_trait]
pub trait PacketSink: Send {
    async fn record(&mut self, packet: &RawPacket) -> Result<()>;
}

/// Writes each packet to its own `pdata<N>` file.
///
/// Numbering continues after any capture files already in the directory.
#[derive(Debug)]
pub struct DirectorySink {
    directory: PathBuf,
    next_index: u64,
}

impl DirectorySink {
    pub async fn create<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|e| ReplayError::file_error(directory.clone(), e))?;

        let next_index = capture_files(&directory)?.last().map_or(0, |(index, _)| index + 1);
        debug!(directory = %directory.display(), next_index, "Recording packets");
        Ok(Self { directory, next_index })
    }

    /// Index the next recorded packet will be written under.
    pub fn next_index(&self) -> u64 {
        self.next_index
    }
}

#[async_trait]
impl PacketSink for DirectorySink {
    async fn record(&mut self, packet: &RawPacket) -> Result<()> {
        let path = self.directory.join(format!("{}{}", CAPTURE_FILE_PREFIX, self.next_index));
        tokio::fs::write(&path, &packet.data)
            .await
            .map_err(|e| ReplayError::file_error(path, e))?;
        self.next_index += 1;
        Ok(())
    }
}

/// Handle to a running UDP capture.
///
/// Dropping the handle cancels the receive task.
pub struct LiveCapture {
    packets: UnboundedReceiverStream<RawPacket>,
    local_addr: SocketAddr,
    cancel: CancellationToken,
}

impl LiveCapture {
    /// Binds `address` and starts receiving.
    pub async fn bind(address: &str) -> Result<Self> {
        Self::start(address, None).await
    }

    /// Binds `address` and records every received packet to `sink`.
    pub async fn bind_recording<K>(address: &str, sink: K) -> Result<Self>
    where
        K: PacketSink + 'static,
    {
        Self::start(address, Some(Box::new(sink))).await
    }

    async fn start(address: &str, sink: Option<Box<dyn PacketSink>>) -> Result<Self> {
        let socket = UdpSocket::bind(address).await.map_err(|e| {
            ReplayError::capture_failed_with_source(format!("Failed to bind {}", address), e.into())
        })?;
        let local_addr = socket.local_addr().map_err(|e| {
            ReplayError::capture_failed_with_source("Failed to read bound address", e.into())
        })?;
        info!(%local_addr, recording = sink.is_some(), "Live capture bound");

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();
        tokio::spawn(async move {
            Self::receive_task(socket, tx, sink, cancel_task).await;
        });

        Ok(Self { packets: UnboundedReceiverStream::new(rx), local_addr, cancel })
    }

    async fn receive_task(
        socket: UdpSocket,
        tx: mpsc::UnboundedSender<RawPacket>,
        mut sink: Option<Box<dyn PacketSink>>,
        cancel: CancellationToken,
    ) {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let mut sequence = 0u64;

        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => {
                    info!(packets = sequence, "Live capture cancelled");
                    break;
                }
                received = socket.recv_from(&mut buf) => received,
            };

            let (len, peer) = match received {
                Ok(received) => received,
                Err(e) => {
                    warn!(error = %e, "UDP receive error");
                    continue;
                }
            };

            let packet = RawPacket::new(sequence, buf[..len].to_vec());
            sequence += 1;
            trace!(sequence = packet.sequence, len, %peer, "Datagram received");

            if let Some(sink) = sink.as_mut() {
                if let Err(e) = sink.record(&packet).await {
                    warn!("Failed to record packet {}: {}", packet.sequence, e);
                }
            }
            if tx.send(packet).is_err() {
                debug!("Live capture receiver dropped");
                break;
            }
        }
    }

    /// Address the socket is bound to; useful with port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits for the next packet. `None` once the receive task has stopped.
    pub async fn recv(&mut self) -> Option<RawPacket> {
        self.packets.as_mut().recv().await
    }

    /// Stops the receive task; packets already received can still be read.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl PacketSource for LiveCapture {
    fn poll_packet(&mut self) -> Result<Next<RawPacket>> {
        Ok(match self.packets.as_mut().try_recv() {
            Ok(packet) => Next::Packet(packet),
            Err(TryRecvError::Empty) => Next::Pending,
            Err(TryRecvError::Disconnected) => Next::Exhausted,
        })
    }
}

impl Stream for LiveCapture {
    type Item = RawPacket;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<RawPacket>> {
        Pin::new(&mut self.packets).poll_next(cx)
    }
}

impl Drop for LiveCapture {
    fn drop(&mut self) {
        debug!("Dropping live capture");
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureReader;
    use crate::test_utils::TelemetryBuilder;
    use anyhow::{Context as _, Result};
    use futures::StreamExt;
    use std::time::Duration;

    async fn sender(to: SocketAddr, datagrams: &[Vec<u8>]) -> Result<()> {
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        for data in datagrams {
            socket.send_to(data, to).await?;
        }
        Ok(())
    }

    async fn next_packet(capture: &mut LiveCapture) -> Result<RawPacket> {
        tokio::time::timeout(Duration::from_secs(5), capture.recv())
            .await
            .context("timed out waiting for a datagram")?
            .context("capture stopped")
    }

    #[tokio::test]
    async fn forwards_datagrams_in_order() -> Result<()> {
        let mut capture = LiveCapture::bind("127.0.0.1:0").await?;
        let first = TelemetryBuilder::new().current_time(1.0).build();
        let second = TelemetryBuilder::new().current_time(2.0).build();
        sender(capture.local_addr(), &[first.clone(), second.clone()]).await?;

        let a = next_packet(&mut capture).await?;
        let b = next_packet(&mut capture).await?;
        assert_eq!((a.sequence, a.data), (0, first));
        assert_eq!((b.sequence, b.data), (1, second));
        Ok(())
    }

    #[tokio::test]
    async fn polling_an_idle_socket_is_pending() -> Result<()> {
        let mut capture = LiveCapture::bind("127.0.0.1:0").await?;
        assert_eq!(capture.poll_packet()?, Next::Pending);
        Ok(())
    }

    #[tokio::test]
    async fn stopped_capture_drains_then_exhausts() -> Result<()> {
        let mut capture = LiveCapture::bind("127.0.0.1:0").await?;
        sender(capture.local_addr(), &[vec![1, 2, 3]]).await?;
        let packet = capture.next().await.context("stream ended early")?;
        assert_eq!(packet.data, [1, 2, 3]);

        capture.stop();
        let end = tokio::time::timeout(Duration::from_secs(5), capture.next()).await?;
        assert!(end.is_none());
        assert!(capture.poll_packet()?.is_exhausted());
        Ok(())
    }

    #[tokio::test]
    async fn recording_writes_a_replayable_capture() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("pdata0"), [0u8])?;
        let sink = DirectorySink::create(dir.path()).await?;
        assert_eq!(sink.next_index(), 1);

        let mut capture = LiveCapture::bind_recording("127.0.0.1:0", sink).await?;
        sender(capture.local_addr(), &[vec![7; 10], vec![8; 20]]).await?;
        next_packet(&mut capture).await?;
        next_packet(&mut capture).await?;

        let reader = CaptureReader::open(dir.path())?;
        let sizes: Vec<_> = reader.packets().iter().map(RawPacket::len).collect();
        assert_eq!(sizes, [1, 10, 20]);
        Ok(())
    }

    #[tokio::test]
    async fn binding_an_invalid_address_fails() {
        match LiveCapture::bind("not an address").await {
            Err(ReplayError::Capture { reason, .. }) => assert!(reason.contains("not an address")),
            Err(other) => panic!("Expected Capture error, got {:?}", other),
            Ok(_) => panic!("Expected bind failure"),
        }
    }
}
