//! NDN face implementation over QUIC transport.
//!
//! A face carries opaque `Packet` values (§6.2: the ICN layer treats face
//! identifiers as opaque integers and never inspects transport bytes).

use anyhow::{anyhow, Result};
use bytes::{Bytes, BytesMut};
use log::{debug, warn};
use quinn::{Connection, RecvStream, SendStream};
use rust_udcn_common::{metrics::UdcnMetrics, ndn::Packet, types::FaceId};
use std::{collections::VecDeque, sync::Arc};
use tokio::sync::{mpsc, Mutex};

use crate::fragmentation::{assemble_fragments, fragment_packet};
use crate::DEFAULT_FRAGMENT_SIZE;

/// Events emitted by a face as it observes its connection.
#[derive(Debug, Clone)]
pub enum FaceEvent {
    /// A packet arrived and was decoded successfully.
    PacketReceived(Packet),
    /// The underlying connection closed.
    Closed,
    /// A decode or I/O error occurred while reading a stream.
    Error(String),
}

/// A single NDN face over a QUIC connection.
#[derive(Debug)]
pub struct Face {
    id: FaceId,
    remote: std::net::SocketAddr,
    connection: Connection,
    closed: Arc<Mutex<bool>>,
    event_receiver: Arc<Mutex<Option<mpsc::Receiver<FaceEvent>>>>,
    event_sender: mpsc::Sender<FaceEvent>,
    metrics: Arc<UdcnMetrics>,
}

impl Face {
    /// Wraps an established QUIC connection as a face and starts reading its
    /// incoming streams in the background.
    pub fn new_from_connection(id: FaceId, connection: Connection, metrics: Arc<UdcnMetrics>) -> Self {
        let remote = connection.remote_address();
        let (event_sender, event_receiver) = mpsc::channel(100);

        let face = Self {
            id,
            remote,
            connection,
            closed: Arc::new(Mutex::new(false)),
            event_receiver: Arc::new(Mutex::new(Some(event_receiver))),
            event_sender,
            metrics,
        };

        face.process_incoming_streams();
        face
    }

    pub fn id(&self) -> FaceId {
        self.id
    }

    pub fn remote_addr(&self) -> std::net::SocketAddr {
        self.remote
    }

    /// Sends a packet over a fresh bi-directional stream, fragmenting if it
    /// exceeds the configured fragment size.
    pub async fn send_packet(&self, packet: &Packet) -> Result<()> {
        if *self.closed.lock().await {
            return Err(anyhow!("face {} is closed", self.id));
        }

        let bytes = packet.encode()?;
        self.metrics.bytes_sent.add(bytes.len() as u64);

        let (mut send, _recv) = self.connection.open_bi().await?;

        if bytes.len() > DEFAULT_FRAGMENT_SIZE {
            debug!(
                "[face {}] fragmenting {} byte packet into {} byte chunks",
                self.id,
                bytes.len(),
                DEFAULT_FRAGMENT_SIZE
            );
            for fragment in fragment_packet(&bytes, DEFAULT_FRAGMENT_SIZE) {
                send.write_all(&fragment).await?;
            }
        } else {
            send.write_all(&bytes).await?;
        }

        send.finish().await?;
        Ok(())
    }

    /// Receives the next event from this face (new packet, close, error).
    pub async fn next_event(&self) -> Option<FaceEvent> {
        let mut guard = self.event_receiver.lock().await;
        let receiver = guard.as_mut()?;
        receiver.recv().await
    }

    pub async fn close(&self) {
        let mut closed = self.closed.lock().await;
        if *closed {
            return;
        }
        *closed = true;
        debug!("[face {}] closing", self.id);
        self.connection.close(0u32.into(), b"face closed");
        let _ = self.event_sender.send(FaceEvent::Closed).await;
    }

    pub async fn is_closed(&self) -> bool {
        *self.closed.lock().await
    }

    fn process_incoming_streams(&self) {
        let connection = self.connection.clone();
        let closed = Arc::clone(&self.closed);
        let event_sender = self.event_sender.clone();
        let metrics = Arc::clone(&self.metrics);
        let id = self.id;

        tokio::spawn(async move {
            debug!("[face {id}] accepting incoming streams");

            while let Ok(Some((send, recv))) = connection.accept_bi().await {
                if *closed.lock().await {
                    break;
                }
                let stream_id = send.id();
                let event_sender = event_sender.clone();
                let metrics = Arc::clone(&metrics);

                tokio::spawn(async move {
                    if let Err(e) = process_stream(id, stream_id, recv, &event_sender, &metrics).await {
                        warn!("[face {id}] error processing stream {stream_id}: {e}");
                        let _ = event_sender.send(FaceEvent::Error(e.to_string())).await;
                    }
                });
            }

            debug!("[face {id}] stopped accepting streams");
            let mut closed_guard = closed.lock().await;
            if !*closed_guard {
                *closed_guard = true;
                let _ = event_sender.send(FaceEvent::Closed).await;
            }
        });
    }
}

async fn process_stream(
    face_id: FaceId,
    stream_id: quinn::StreamId,
    mut recv: RecvStream,
    event_sender: &mpsc::Sender<FaceEvent>,
    metrics: &Arc<UdcnMetrics>,
) -> Result<()> {
    let mut fragments: VecDeque<Bytes> = VecDeque::new();

    while let Some(chunk) = recv.read_chunk(1024, false).await? {
        metrics.bytes_received.add(chunk.bytes.len() as u64);
        fragments.push_back(chunk.bytes);
    }

    let packet_bytes = assemble_fragments(fragments)?;
    let packet = Packet::decode(&packet_bytes)
        .map_err(|e| anyhow!("failed to decode packet on stream {stream_id}: {e}"))?;

    debug!("[face {face_id}] received {:?} on stream {stream_id}", packet.name());
    event_sender.send(FaceEvent::PacketReceived(packet)).await?;
    Ok(())
}

/// Send and receive ends wired directly together, bypassing any network
/// transport. Used to exercise two forwarders in a single test process, or
/// to hand an application its own in-process face.
pub struct SimulatedFacePair;

impl SimulatedFacePair {
    /// Returns two linked halves: writing a packet into one's sender makes
    /// it available from the other's receiver, and vice versa.
    pub fn new() -> ((mpsc::Sender<Packet>, mpsc::Receiver<Packet>), (mpsc::Sender<Packet>, mpsc::Receiver<Packet>)) {
        let (tx_a, rx_b) = mpsc::channel(256);
        let (tx_b, rx_a) = mpsc::channel(256);
        ((tx_a, rx_a), (tx_b, rx_b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simulated_pair_delivers_packets_both_ways() {
        let ((tx_a, mut rx_a), (tx_b, mut rx_b)) = SimulatedFacePair::new();

        let interest = rust_udcn_common::ndn::Interest::new(rust_udcn_common::ndn::Name::from_string("/a/b"));
        tx_a.send(Packet::Interest(interest.clone())).await.unwrap();
        let got = rx_b.recv().await.unwrap();
        assert_eq!(got.name(), &interest.name);

        let content = rust_udcn_common::ndn::Content::new(rust_udcn_common::ndn::Name::from_string("/a/b"), "v");
        tx_b.send(Packet::Content(content.clone())).await.unwrap();
        let got = rx_a.recv().await.unwrap();
        assert_eq!(got.name(), &content.name);
    }
}
