//! Benchmarking command implementation for µDCN CLI

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::info;
use rust_udcn_common::config::NodeConfig;
use rust_udcn_common::metrics::UdcnMetrics;
use rust_udcn_common::ndn::{Interest, Name, Packet};
use rust_udcn_core::fib::FibEntry;
use rust_udcn_core::IcnEngine;
use rust_udcn_quic::{ClientOptions, NdnQuicTransport, TransportConfig, TransportMode};
use tokio::sync::Mutex;
use tokio::time::timeout;

const REQUEST_TIMEOUT_MS: u64 = 4000;

/// Run the benchmark with the specified parameters
pub async fn run_benchmark(count: usize, prefix: String, concurrent: usize, server: String) -> Result<()> {
    info!(
        "Running benchmark: count={}, prefix={}, concurrent={}, server={}",
        count, prefix, concurrent, server
    );

    println!("Starting µDCN benchmark");
    println!("======================");
    println!("Parameters:");
    println!("  Interest count: {count}");
    println!("  Name prefix: {prefix}");
    println!("  Concurrent requests: {concurrent}");
    println!("  Server: {server}");
    println!();

    let mut config = NodeConfig::default();
    config.node_name = "cli-benchmark".to_string();
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
    println!("Connected on {face_id}.");

    engine
        .fib()
        .write()
        .await
        .add(FibEntry::new(Name::from_string(&prefix), vec![face_id]).static_entry());

    let mut local_app = transport
        .take_local_app_receiver()
        .await
        .context("local application queue already taken")?;

    let results = Arc::new(Mutex::new(BenchmarkResults::new(count)));
    let pending: Arc<Mutex<std::collections::HashMap<Name, Instant>>> = Arc::new(Mutex::new(std::collections::HashMap::new()));

    // Single task drains answers as they arrive and matches them against the
    // pending map by name, since the engine's local-app queue is shared
    // across every outstanding Interest.
    let answer_task = {
        let results = Arc::clone(&results);
        let pending = Arc::clone(&pending);
        tokio::spawn(async move {
            while let Some(packet) = local_app.recv().await {
                let name = packet.name().clone();
                let Some(sent_at) = pending.lock().await.remove(&name) else {
                    continue;
                };
                let rtt_ms = sent_at.elapsed().as_millis() as u64;
                let mut results = results.lock().await;
                match packet {
                    Packet::Content(_) => results.record_success(rtt_ms),
                    Packet::Nack(_) => results.failed_requests += 1,
                    Packet::Interest(_) => {}
                }
            }
        })
    };

    println!("\nRunning benchmark...");
    let start_time = Instant::now();

    let batch_size = std::cmp::max(1, count / concurrent);
    let mut tasks = Vec::new();
    for batch_index in 0..concurrent {
        let start_index = batch_index * batch_size;
        let end_index = if batch_index == concurrent - 1 { count } else { start_index + batch_size };
        if start_index >= count {
            break;
        }

        let transport = Arc::clone(&transport);
        let prefix = prefix.clone();
        let pending = Arc::clone(&pending);
        let results = Arc::clone(&results);

        tasks.push(tokio::spawn(async move {
            for i in start_index..end_index {
                let name = Name::from_string(&format!("{prefix}/{i}"));
                let interest = Interest::new(name.clone()).with_lifetime(REQUEST_TIMEOUT_MS as u32);

                pending.lock().await.insert(name.clone(), Instant::now());
                transport.submit_local(Packet::Interest(interest)).await;
            }

            // Give the last-sent Interest in this batch the full per-request
            // timeout to come back before declaring whatever's left stale.
            tokio::time::sleep(Duration::from_millis(REQUEST_TIMEOUT_MS)).await;
            let stale: Vec<Name> = (start_index..end_index)
                .map(|i| Name::from_string(&format!("{prefix}/{i}")))
                .collect();
            let mut pending = pending.lock().await;
            let mut results = results.lock().await;
            for name in stale {
                if pending.remove(&name).is_some() {
                    results.timeouts += 1;
                }
            }
        }));
    }

    for task in tasks {
        let _ = timeout(Duration::from_millis(REQUEST_TIMEOUT_MS * 2), task).await;
    }
    answer_task.abort();

    let total_time_ms = start_time.elapsed().as_millis() as u64;
    {
        let mut results = results.lock().await;
        results.total_time_ms = total_time_ms;
    }

    print_benchmark_results(results.lock().await.clone());

    transport.close().await?;
    Ok(())
}

#[derive(Debug, Clone)]
struct BenchmarkResults {
    total_interests: usize,
    successful_requests: usize,
    failed_requests: usize,
    timeouts: usize,
    total_time_ms: u64,
    min_rtt_ms: u64,
    max_rtt_ms: u64,
    total_rtt_ms: u64,
}

impl BenchmarkResults {
    fn new(total_interests: usize) -> Self {
        Self {
            total_interests,
            successful_requests: 0,
            failed_requests: 0,
            timeouts: 0,
            total_time_ms: 0,
            min_rtt_ms: u64::MAX,
            max_rtt_ms: 0,
            total_rtt_ms: 0,
        }
    }

    fn record_success(&mut self, rtt_ms: u64) {
        self.successful_requests += 1;
        self.min_rtt_ms = self.min_rtt_ms.min(rtt_ms);
        self.max_rtt_ms = self.max_rtt_ms.max(rtt_ms);
        self.total_rtt_ms += rtt_ms;
    }
}

fn print_benchmark_results(results: BenchmarkResults) {
    println!("\n\nBenchmark Results");
    println!("=================");
    println!(
        "Total Interests Sent: {}",
        results.total_interests
    );
    println!(
        "Successful Requests: {} ({:.2}%)",
        results.successful_requests,
        (results.successful_requests as f64 / results.total_interests as f64) * 100.0
    );
    println!(
        "Failed Requests: {} ({:.2}%)",
        results.failed_requests,
        (results.failed_requests as f64 / results.total_interests as f64) * 100.0
    );
    println!(
        "Timeouts: {} ({:.2}%)",
        results.timeouts,
        (results.timeouts as f64 / results.total_interests as f64) * 100.0
    );

    println!("\nTiming:");
    println!("Total Time: {:.2} seconds", results.total_time_ms as f64 / 1000.0);

    if results.successful_requests > 0 {
        println!(
            "Throughput: {:.2} interests/second",
            results.total_interests as f64 / (results.total_time_ms as f64 / 1000.0)
        );
        println!("Min RTT: {} ms", results.min_rtt_ms);
        println!("Max RTT: {} ms", results.max_rtt_ms);
        println!(
            "Avg RTT: {:.2} ms",
            results.total_rtt_ms as f64 / results.successful_requests as f64
        );
    }
}
