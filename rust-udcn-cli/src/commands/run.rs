//! `run` command: launches a full forwarding node — engine, ageing task, QUIC
//! transport and management surface — and blocks until shut down.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::info;
use rust_udcn_common::config::NodeConfig;
use rust_udcn_common::metrics::UdcnMetrics;
use rust_udcn_core::aging::AgingTask;
use rust_udcn_core::IcnEngine;
use rust_udcn_quic::{ManagementServer, NdnQuicTransport, ServerOptions, TransportConfig, TransportMode};
use tokio::sync::mpsc;

use crate::utils::generate_test_certificates;

pub async fn run_node(
    config_path: Option<String>,
    listen: String,
    management: String,
    cert: Option<PathBuf>,
    key: Option<PathBuf>,
) -> Result<()> {
    let mut config = NodeConfig::load(config_path.as_deref()).context("loading node configuration")?;
    config.management_listen_addr = management.clone();

    info!("starting node '{}' (listen={listen}, management={management})", config.node_name);

    let metrics = Arc::new(UdcnMetrics::new());
    let engine = Arc::new(IcnEngine::new(&config, Arc::clone(&metrics)));

    let (cert_path, key_path) = match (cert, key) {
        (Some(cert), Some(key)) => (cert, key),
        _ => {
            let dir = std::env::temp_dir().join("udcn-cli-certs");
            println!("No certificate supplied; generating a self-signed one under {}", dir.display());
            generate_test_certificates(&dir).await?
        }
    };

    let transport_config = TransportConfig {
        mode: TransportMode::Dual,
        server_options: Some(ServerOptions {
            listen_addr: listen.clone(),
            cert_path,
            key_path,
            ..Default::default()
        }),
        ..Default::default()
    };

    let transport = Arc::new(
        NdnQuicTransport::new(transport_config, Arc::clone(&engine))
            .await
            .context("failed to start QUIC transport")?,
    );
    println!("Listening for NDN-over-QUIC connections on {listen}");

    let (aging_tx, mut aging_rx) = mpsc::unbounded_channel();
    let aging_task = AgingTask::new(Arc::clone(&engine), &config).spawn(aging_tx);
    let aging_router = {
        let transport = Arc::clone(&transport);
        tokio::spawn(async move {
            while let Some(outbound) = aging_rx.recv().await {
                transport.route_outbound(vec![outbound]).await;
            }
        })
    };

    let mgmt = ManagementServer::bind(&management, Arc::clone(&transport))
        .await
        .context("failed to start management surface")?;
    println!("Management surface listening on {}", mgmt.local_addr());
    println!("Press Ctrl-C to stop, or GET /shutdown on the management surface.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl-C, shutting down");
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(200)) => {
                if mgmt.is_finished() {
                    info!("management surface stopped remotely");
                    break;
                }
            }
        }
    }

    mgmt.shutdown().await;
    aging_task.abort();
    aging_router.abort();
    transport.close().await?;

    Ok(())
}
