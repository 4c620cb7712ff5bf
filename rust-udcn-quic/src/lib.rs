//! QUIC-based link layer for the ICN forwarding engine.
//!
//! This crate owns the face table and the QUIC connections backing it
//! (RFC8999/RFC9000/RFC9001/RFC9002), encapsulating `Interest`/`Content`/
//! `Nack` packets for transport with support for fragmentation and a
//! textual management surface.

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use quinn::Endpoint;
use rust_udcn_common::metrics::UdcnMetrics;
use std::{
    fmt::Debug,
    net::{SocketAddr, ToSocketAddrs},
    sync::Arc,
};

use rust_udcn_core::IcnEngine;

mod config;
mod face;
mod face_table;
mod fragmentation;
pub mod mgmt;
mod transport;

pub use config::{ClientOptions, ServerOptions};
pub use face::{Face, FaceEvent, SimulatedFacePair};
pub use face_table::FaceTable;
pub use mgmt::ManagementServer;
pub use transport::{NdnQuicTransport, TransportConfig, TransportMode};

/// Default QUIC port for NDN.
pub const NDN_QUIC_PORT: u16 = 6367;
/// Default ALPN protocol string for NDN over QUIC.
pub const NDN_QUIC_ALPN: &[u8] = b"ndn1";
/// Maximum NDN packet size (RFC 8609).
pub const MAX_PACKET_SIZE: usize = 8800;
/// Fragment size for packets exceeding a single stream write.
pub const DEFAULT_FRAGMENT_SIZE: usize = 1000;

/// QUIC-accepting side of the link layer.
pub struct NdnQuicServer {
    endpoint: Endpoint,
    address: SocketAddr,
    metrics: Arc<UdcnMetrics>,
}

impl NdnQuicServer {
    pub async fn new(options: ServerOptions, _face_table: Arc<FaceTable>, metrics: Arc<UdcnMetrics>) -> Result<Self> {
        let server_config = config::configure_server(&options).await?;
        let endpoint = Endpoint::server(
            server_config,
            options.listen_addr.parse().context("invalid listen address")?,
        )?;
        let address = endpoint.local_addr()?;
        info!("NDN QUIC server listening on {address}");

        Ok(Self { endpoint, address, metrics })
    }

    /// Accepts connections in the background, registering each as a face
    /// and handing its packet stream to the engine.
    pub async fn run(
        &self,
        face_table: Arc<FaceTable>,
        engine: Arc<IcnEngine>,
        local_app_sender: tokio::sync::mpsc::UnboundedSender<rust_udcn_common::ndn::Packet>,
    ) -> Result<()> {
        let endpoint = self.endpoint.clone();
        let metrics = Arc::clone(&self.metrics);

        tokio::spawn(async move {
            info!("QUIC server accepting connections");
            while let Some(incoming) = endpoint.accept().await {
                let face_table = Arc::clone(&face_table);
                let engine = Arc::clone(&engine);
                let metrics = Arc::clone(&metrics);
                let local_app_sender = local_app_sender.clone();

                tokio::spawn(async move {
                    match incoming.await {
                        Ok(connection) => {
                            let remote = connection.remote_address();
                            info!("connection established from {remote}");
                            let face_id = face_table.allocate_id();
                            let face = Arc::new(face::Face::new_from_connection(face_id, connection, metrics));
                            face_table.insert(remote, Arc::clone(&face)).await;
                            transport::spawn_face_loop(face, face_table, engine, local_app_sender);
                        }
                        Err(e) => warn!("incoming connection failed: {e}"),
                    }
                });
            }
            info!("QUIC server stopped accepting connections");
        });

        Ok(())
    }

    pub fn metrics(&self) -> Arc<UdcnMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub async fn stop(&self) -> Result<()> {
        self.endpoint.close(0u32.into(), b"server shutting down");
        Ok(())
    }
}

/// QUIC-dialing side of the link layer.
pub struct NdnQuicClient {
    endpoint: Endpoint,
    face_table: Arc<FaceTable>,
    metrics: Arc<UdcnMetrics>,
}

impl NdnQuicClient {
    pub async fn new(options: ClientOptions, face_table: Arc<FaceTable>, metrics: Arc<UdcnMetrics>) -> Result<Self> {
        let client_config = config::configure_client(&options).await?;
        let mut endpoint = Endpoint::client("0.0.0.0:0".parse()?)?;
        endpoint.set_default_client_config(client_config);

        Ok(Self { endpoint, face_table, metrics })
    }

    /// Dials `addr`, registering a new face for the resulting connection.
    /// Returns an existing face for the address instead of dialing again.
    pub async fn connect<T: ToSocketAddrs + Debug>(&self, addr: T) -> Result<Arc<Face>> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| anyhow!("failed to resolve address {addr:?}"))?;

        if let Some(existing) = self.face_table.face_for_addr(&addr).await {
            if let Some(face) = self.face_table.get(existing).await {
                return Ok(face);
            }
        }

        debug!("connecting to {addr}");
        let connection = self
            .endpoint
            .connect(addr, "localhost")?
            .await
            .map_err(|e| anyhow!("failed to connect to {addr}: {e}"))?;
        info!("connected to {addr}");

        let face_id = self.face_table.allocate_id();
        let face = Arc::new(Face::new_from_connection(face_id, connection, Arc::clone(&self.metrics)));
        self.face_table.insert(addr, Arc::clone(&face)).await;

        Ok(face)
    }

    pub fn metrics(&self) -> Arc<UdcnMetrics> {
        Arc::clone(&self.metrics)
    }

    pub async fn close(&self) -> Result<()> {
        for face in self.face_table.faces().await {
            face.close().await;
        }
        self.endpoint.close(0u32.into(), b"client shutting down");
        Ok(())
    }
}
