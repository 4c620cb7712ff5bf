//! Interest sending command implementation for µDCN CLI

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::info;
use rust_udcn_common::config::NodeConfig;
use rust_udcn_common::metrics::UdcnMetrics;
use rust_udcn_common::ndn::{Interest, Name, Packet};
use rust_udcn_core::fib::FibEntry;
use rust_udcn_core::IcnEngine;
use rust_udcn_quic::{ClientOptions, NdnQuicTransport, TransportConfig, TransportMode};
use tokio::time::timeout;

/// Send an Interest against `server` and print whatever comes back.
///
/// There's no routing protocol, so this stands up a one-node engine of its
/// own, connects to `server`, and installs a FIB route for exactly the name
/// being requested before expressing the Interest — the same shape a real
/// forwarder would use if it only had one static route to offer.
pub async fn send_interest(name_str: String, server: String, timeout_ms: u64) -> Result<()> {
    info!("Sending Interest: name={}, server={}, timeout={}ms", name_str, server, timeout_ms);

    let name = Name::from_string(&name_str);
    let interest = Interest::new(name.clone()).with_lifetime(timeout_ms as u32);

    let mut config = NodeConfig::default();
    config.node_name = "cli-interest".to_string();
    let engine = Arc::new(IcnEngine::new(&config, Arc::new(UdcnMetrics::new())));

    let transport_config = TransportConfig {
        mode: TransportMode::Client,
        client_options: ClientOptions {
            verify_certificate: false,
            ..Default::default()
        },
        ..Default::default()
    };
    let transport = Arc::new(
        NdnQuicTransport::new(transport_config, Arc::clone(&engine))
            .await
            .context("failed to create QUIC transport")?,
    );

    println!("Connecting to {server}...");
    let face_id = transport
        .connect(server.as_str())
        .await
        .context("failed to connect to forwarder")?;
    println!("Connected on {face_id}. Installing route and sending Interest for {name_str}...");

    engine
        .fib()
        .write()
        .await
        .add(FibEntry::new(name.clone(), vec![face_id]).static_entry());

    let mut local_app = transport
        .take_local_app_receiver()
        .await
        .context("local application queue already taken")?;

    transport.submit_local(Packet::Interest(interest)).await;

    match timeout(Duration::from_millis(timeout_ms), async {
        loop {
            match local_app.recv().await {
                Some(packet) if *packet.name() == name => return Some(packet),
                Some(_) => continue,
                None => return None,
            }
        }
    })
    .await
    {
        Ok(Some(Packet::Content(content))) => {
            println!("\nReceived Content:");
            println!("  Name: {}", content.name);
            println!("  TTL: {} ms", content.ttl_ms);
            if content.payload.len() <= 100 {
                if let Ok(text) = String::from_utf8(content.payload.to_vec()) {
                    println!("  Content: {text}");
                } else {
                    println!("  Content: {:?}", content.payload);
                }
            } else {
                println!("  Content: {} bytes", content.payload.len());
            }
        }
        Ok(Some(Packet::Nack(nack))) => {
            println!("\nReceived Nack: {}", nack.reason);
        }
        Ok(Some(Packet::Interest(_))) => {
            println!("\nUnexpected Interest echoed back, ignoring.");
        }
        Ok(None) => println!("\nLocal application queue closed before an answer arrived."),
        Err(_) => println!("\nTimeout after {timeout_ms}ms"),
    }

    transport.close().await?;
    Ok(())
}
