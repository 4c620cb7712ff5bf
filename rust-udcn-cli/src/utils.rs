//! Utility functions for the µDCN CLI

use anyhow::{Context, Result};
use log::info;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Percent-encodes the handful of characters that would otherwise break the
/// management grammar's `:`/`,`/`;`-delimited fields (§6.4).
pub fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

/// Issues a single `GET /<path>` request against a node's management
/// surface and returns the response body (the line after the blank line
/// separating headers from content, per §6.4's response grammar).
pub async fn mgmt_request(addr: &str, path: &str) -> Result<String> {
    let mut stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("connecting to management surface at {addr}"))?;
    stream
        .write_all(format!("GET /{path}\r\n").as_bytes())
        .await
        .context("sending management request")?;

    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .context("reading management response")?;

    let body = response
        .split("\r\n\r\n")
        .nth(1)
        .unwrap_or(response.as_str())
        .trim_end();

    if body.starts_with("ERROR") {
        anyhow::bail!("management surface returned: {body}");
    }

    Ok(body.to_string())
}

/// Generates a self-signed certificate/key pair for a locally run node when
/// no certificate was supplied. Not suitable for production use.
pub async fn generate_test_certificates(dir: &Path) -> Result<(std::path::PathBuf, std::path::PathBuf)> {
    use rcgen::{Certificate, CertificateParams, DnType, KeyPair, KeyUsagePurpose, SanType};
    use std::fs::File;
    use std::io::Write;

    std::fs::create_dir_all(dir)?;

    let key_pair = KeyPair::generate()?;

    let mut params = CertificateParams::default();
    params.key_pair = Some(key_pair);
    params.distinguished_name.push(DnType::CommonName, "localhost");
    params.subject_alt_names = vec![
        SanType::DnsName("localhost".to_string()),
        SanType::IpAddress(std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1))),
    ];
    params.is_ca = rcgen::IsCa::SelfSignedOnly;
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
        KeyUsagePurpose::KeyAgreement,
    ];

    let cert = Certificate::from_params(params)?;
    let cert_pem = cert.serialize_pem()?;
    let key_pem = cert.serialize_private_key_pem();

    let cert_path = dir.join("cert.pem");
    let key_path = dir.join("key.pem");

    File::create(&cert_path)?.write_all(cert_pem.as_bytes())?;
    File::create(&key_path)?.write_all(key_pem.as_bytes())?;

    Ok((cert_path, key_path))
}

/// Format a duration as a human-readable string
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    
    if total_secs < 60 {
        format!("{}.{:03}s", total_secs, duration.subsec_millis())
    } else if total_secs < 3600 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        format!("{}m {}s", mins, secs)
    } else {
        let hours = total_secs / 3600;
        let mins = (total_secs % 3600) / 60;
        let secs = total_secs % 60;
        format!("{}h {}m {}s", hours, mins, secs)
    }
}

/// Format a byte size as a human-readable string
pub fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;
    const GB: usize = MB * 1024;
    
    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    }
}

/// Simple timer for measuring operations
pub struct Timer {
    start: Instant,
    operation: String,
}

impl Timer {
    /// Create a new timer for the specified operation
    pub fn new(operation: &str) -> Self {
        info!("Starting operation: {}", operation);
        Self {
            start: Instant::now(),
            operation: operation.to_string(),
        }
    }
    
    /// Measure the elapsed time and print a log message
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
    
    /// Get the elapsed time as a formatted string
    pub fn elapsed_str(&self) -> String {
        format_duration(self.elapsed())
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!(
            "Operation '{}' completed in {}",
            self.operation,
            format_duration(self.elapsed())
        );
    }
}

/// Print a section header in the CLI output
pub fn print_header(title: &str) {
    let separator = "=".repeat(title.len());
    println!("\n{}", title);
    println!("{}", separator);
}
