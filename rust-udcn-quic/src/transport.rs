//! High-level NDN transport over QUIC: owns the face table, drives the ICN
//! engine from incoming packets, and routes its outbound packets back onto
//! faces or the local application queue.

use anyhow::{anyhow, Result};
use log::{debug, error, warn};
use std::{net::ToSocketAddrs, sync::Arc};
use tokio::sync::{mpsc, RwLock};

use rust_udcn_common::{metrics::UdcnMetrics, ndn::Packet, types::FaceId};
use rust_udcn_core::{engine::Outbound, IcnEngine};

use crate::{
    face::{Face, FaceEvent},
    face_table::FaceTable,
    ClientOptions, NdnQuicClient, NdnQuicServer, ServerOptions,
};

/// NDN QUIC transport modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Client,
    Server,
    Dual,
}

/// Configuration for the NDN QUIC transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub mode: TransportMode,
    pub server_options: Option<ServerOptions>,
    pub client_options: ClientOptions,
    pub face_table_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mode: TransportMode::Client,
            server_options: None,
            client_options: ClientOptions::default(),
            face_table_capacity: rust_udcn_common::types::MAX_FACE_TABLE_ENTRIES,
        }
    }
}

/// Wires QUIC connectivity to an [`IcnEngine`]: every face's incoming
/// packets are fed to `engine.handle_packet`, and the resulting outbound
/// `(face_id, packet)` pairs are routed back onto the matching face, or onto
/// `local_app_sender` when addressed to [`FaceId::LOCAL_APP`].
pub struct NdnQuicTransport {
    config: TransportConfig,
    client: Option<Arc<NdnQuicClient>>,
    server: Option<Arc<NdnQuicServer>>,
    face_table: Arc<FaceTable>,
    engine: Arc<IcnEngine>,
    local_app_sender: mpsc::UnboundedSender<Packet>,
    local_app_receiver: Arc<RwLock<Option<mpsc::UnboundedReceiver<Packet>>>>,
    metrics: Arc<UdcnMetrics>,
}

impl NdnQuicTransport {
    pub async fn new(config: TransportConfig, engine: Arc<IcnEngine>) -> Result<Self> {
        let metrics = engine.metrics();
        let face_table = Arc::new(FaceTable::new(config.face_table_capacity));

        let client = match config.mode {
            TransportMode::Client | TransportMode::Dual => {
                Some(Arc::new(NdnQuicClient::new(config.client_options.clone(), Arc::clone(&face_table), Arc::clone(&metrics)).await?))
            }
            TransportMode::Server => None,
        };

        let server = match config.mode {
            TransportMode::Server | TransportMode::Dual => {
                let server_options = config
                    .server_options
                    .clone()
                    .ok_or_else(|| anyhow!("server options required in Server or Dual mode"))?;
                Some(Arc::new(
                    NdnQuicServer::new(server_options, Arc::clone(&face_table), Arc::clone(&metrics)).await?,
                ))
            }
            TransportMode::Client => None,
        };

        let (local_app_sender, local_app_receiver) = mpsc::unbounded_channel();

        let transport = Self {
            config,
            client,
            server,
            face_table,
            engine,
            local_app_sender,
            local_app_receiver: Arc::new(RwLock::new(Some(local_app_receiver))),
            metrics,
        };

        if let Some(server) = &transport.server {
            server.run(Arc::clone(&transport.face_table), Arc::clone(&transport.engine), transport.local_app_sender.clone())
                .await?;
        }

        Ok(transport)
    }

    /// Connects to a remote forwarder, registers the resulting face, and
    /// spawns its packet-processing loop against the shared engine.
    pub async fn connect<T: ToSocketAddrs + std::fmt::Debug>(&self, addr: T) -> Result<FaceId> {
        let client = self
            .client
            .clone()
            .ok_or_else(|| anyhow!("client not initialized (transport is not in Client or Dual mode)"))?;

        let face = client.connect(addr).await?;
        let face_id = face.id();
        spawn_face_loop(face, Arc::clone(&self.face_table), Arc::clone(&self.engine), self.local_app_sender.clone());
        Ok(face_id)
    }

    /// Delivers a packet originating from the local application into the
    /// engine as if it arrived on [`FaceId::LOCAL_APP`].
    pub async fn submit_local(&self, packet: Packet) -> Vec<Outbound> {
        let out = self.engine.handle_packet(FaceId::LOCAL_APP, packet, true).await;
        route_outbound(out.clone(), &self.face_table, &self.local_app_sender).await;
        out
    }

    /// Takes the receiving half of the local application queue. Only one
    /// caller may hold it; subsequent calls return `None`.
    pub async fn take_local_app_receiver(&self) -> Option<mpsc::UnboundedReceiver<Packet>> {
        self.local_app_receiver.write().await.take()
    }

    pub fn face_table(&self) -> Arc<FaceTable> {
        Arc::clone(&self.face_table)
    }

    pub fn engine(&self) -> Arc<IcnEngine> {
        Arc::clone(&self.engine)
    }

    pub fn metrics(&self) -> Arc<UdcnMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Routes packets produced outside the normal face/local-submit paths —
    /// namely the ageing task's retransmissions and timeout Nacks — onto
    /// their destination face or the local application queue.
    pub async fn route_outbound(&self, out: Vec<Outbound>) {
        route_outbound(out, &self.face_table, &self.local_app_sender).await;
    }

    pub async fn close(&self) -> Result<()> {
        for face in self.face_table.faces().await {
            face.close().await;
        }
        if let Some(client) = &self.client {
            client.close().await?;
        }
        if let Some(server) = &self.server {
            server.stop().await?;
        }
        Ok(())
    }
}

/// Spawns the task that reads a face's events and drives the engine.
pub(crate) fn spawn_face_loop(
    face: Arc<Face>,
    face_table: Arc<FaceTable>,
    engine: Arc<IcnEngine>,
    local_app_sender: mpsc::UnboundedSender<Packet>,
) {
    tokio::spawn(async move {
        let face_id = face.id();
        loop {
            match face.next_event().await {
                Some(FaceEvent::PacketReceived(packet)) => {
                    let out = engine.handle_packet(face_id, packet, false).await;
                    route_outbound(out, &face_table, &local_app_sender).await;
                }
                Some(FaceEvent::Closed) => {
                    debug!("[face {face_id}] closed, removing from face table");
                    face_table.remove(face_id).await;
                    break;
                }
                Some(FaceEvent::Error(e)) => {
                    warn!("[face {face_id}] error: {e}");
                }
                None => break,
            }
        }
    });
}

async fn route_outbound(out: Vec<Outbound>, face_table: &Arc<FaceTable>, local_app_sender: &mpsc::UnboundedSender<Packet>) {
    for (face_id, packet) in out {
        if face_id.is_local_app() {
            let _ = local_app_sender.send(packet);
            continue;
        }
        match face_table.get(face_id).await {
            Some(face) => {
                if let Err(e) = face.send_packet(&packet).await {
                    warn!("[face {face_id}] failed to send outbound packet: {e}");
                }
            }
            None => error!("no face {face_id} in face table for outbound packet"),
        }
    }
}
