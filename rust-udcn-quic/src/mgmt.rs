//! Textual management surface (§6.4): a hand-rolled, HTTP/1.1-lookalike TCP
//! server for configuring faces, FIB routes, and seeded content. Deliberately
//! not built on an HTTP framework — the grammar is a handful of fixed `GET`
//! paths, not general request routing.

use std::sync::Arc;

use log::{info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use rust_udcn_common::ndn::{Content, Name};
use rust_udcn_common::types::FaceId;
use rust_udcn_core::FibEntry;

use crate::transport::NdnQuicTransport;

/// Runs the management listener until `GET /shutdown` is received or the
/// returned handle's [`ManagementHandle::shutdown`] is called.
pub struct ManagementServer {
    local_addr: std::net::SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl ManagementServer {
    /// Binds `listen_addr` and starts accepting management connections in
    /// the background.
    pub async fn bind(listen_addr: &str, transport: Arc<NdnQuicTransport>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(listen_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("management surface listening on {local_addr}");

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let mut stop_tx = Some(stop_tx);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        info!("management surface shutting down");
                        break;
                    }
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((stream, peer)) => {
                                let transport = Arc::clone(&transport);
                                let stop_signal = stop_tx.take();
                                tokio::spawn(async move {
                                    match handle_connection(stream, &transport).await {
                                        Ok(ShutdownRequested(true)) => {
                                            if let Some(tx) = stop_signal {
                                                let _ = tx.send(());
                                            }
                                        }
                                        Ok(ShutdownRequested(false)) => {}
                                        Err(e) => warn!("[mgmt {peer}] request failed: {e:#}"),
                                    }
                                });
                            }
                            Err(e) => warn!("management accept failed: {e}"),
                        }
                    }
                    _ = &mut stop_rx => {
                        info!("management surface received /shutdown");
                        break;
                    }
                }
            }
        });

        Ok(Self { local_addr, shutdown_tx: Some(shutdown_tx), task })
    }

    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }

    /// True once the listener loop has exited, whether from an explicit
    /// [`ManagementServer::shutdown`] call or a remote `GET /shutdown`.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the listener without waiting for a `/shutdown` request.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.task.await;
    }
}

struct ShutdownRequested(bool);

async fn handle_connection(
    mut stream: tokio::net::TcpStream,
    transport: &Arc<NdnQuicTransport>,
) -> anyhow::Result<ShutdownRequested> {
    let (reader, mut writer) = stream.split();
    let mut lines = BufReader::new(reader).lines();

    let Some(request_line) = lines.next_line().await? else {
        return Ok(ShutdownRequested(false));
    };

    let (verb, response) = match dispatch(&request_line, transport).await {
        Ok((verb, value)) => (verb, ok_response(&verb, value.as_deref())),
        Err(e) => {
            warn!("mgmt request '{request_line}' failed: {e:#}");
            ("ERROR".to_string(), error_response(&e.to_string()))
        }
    };

    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;

    Ok(ShutdownRequested(verb == "SHUTDOWN"))
}

/// Parses and executes a single request line, returning a verb tag (used only
/// to detect `/shutdown`) and an optional response value.
async fn dispatch(request_line: &str, transport: &Arc<NdnQuicTransport>) -> anyhow::Result<(String, Option<String>)> {
    let mut parts = request_line.trim_end().splitn(3, ' ');
    let method = parts.next().unwrap_or_default();
    let path = parts.next().unwrap_or_default();
    if method != "GET" {
        anyhow::bail!("unsupported method {method}");
    }
    let path = path.trim_start_matches('/');

    if let Some(rest) = path.strip_prefix("linklayer/newface/") {
        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| anyhow::anyhow!("malformed newface target {rest}"))?;
        let face_id = transport.connect((host, port.parse::<u16>()?)).await?;
        return Ok(("NEWFACE".to_string(), Some(face_id.0.to_string())));
    }

    if let Some(rest) = path.strip_prefix("icnlayer/newforwardingrule/") {
        let (name_part, faces_part) = rest
            .split_once(':')
            .ok_or_else(|| anyhow::anyhow!("malformed newforwardingrule target {rest}"))?;
        let name = Name::from_string(&percent_decode(name_part));
        // `<fid>[,<fid>…]` per spec.md §6.4, with an additive `;cost=<n>`
        // suffix the grammar doesn't forbid (§10: the CLI's `--cost` needs a
        // wire slot, and the base `name:faces` syntax is unchanged).
        let (faces_part, cost) = match faces_part.split_once(";cost=") {
            Some((faces, cost)) => (faces, cost.parse::<u8>().unwrap_or(0)),
            None => (faces_part, 0),
        };
        let upstreams: Vec<FaceId> = faces_part
            .split(',')
            .map(|f| f.parse::<u32>().map(FaceId))
            .collect::<Result<_, _>>()?;
        transport
            .engine()
            .fib()
            .write()
            .await
            .add(FibEntry::new(name, upstreams).static_entry().with_cost(cost));
        return Ok(("NEWFORWARDINGRULE".to_string(), None));
    }

    if let Some(rest) = path.strip_prefix("icnlayer/newcontent/") {
        let (name_part, payload_part) = rest
            .rsplit_once(':')
            .ok_or_else(|| anyhow::anyhow!("malformed newcontent target {rest}"))?;
        let name = Name::from_string(&percent_decode(name_part));
        let payload = percent_decode(payload_part);
        transport
            .engine()
            .cs()
            .write()
            .await
            .insert_static(Content::new(name, payload.into_bytes()));
        return Ok(("NEWCONTENT".to_string(), None));
    }

    if let Some(rest) = path.strip_prefix("icnlayer/removeforwardingrule/") {
        let name = Name::from_string(&percent_decode(rest));
        transport.engine().fib().write().await.remove(&name);
        return Ok(("REMOVEFORWARDINGRULE".to_string(), None));
    }

    // Not named in spec.md §6.4's grammar, but added in the same style: the
    // grammar gives no way to list what `newforwardingrule` has installed,
    // and a usable CLI needs one (§10 "CLI `fib show`").
    if path == "icnlayer/fib" {
        let fib = transport.engine().fib().read().await;
        let dump = fib
            .entries()
            .map(|e| {
                let faces = e
                    .upstreams
                    .iter()
                    .map(|f| f.0.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{}:{}:{}", e.name, faces, e.cost)
            })
            .collect::<Vec<_>>()
            .join(";");
        return Ok(("FIB".to_string(), Some(dump)));
    }

    if path == "shutdown" {
        return Ok(("SHUTDOWN".to_string(), None));
    }

    anyhow::bail!("unknown management path /{path}")
}

fn ok_response(verb: &str, value: Option<&str>) -> String {
    let body = match value {
        Some(v) => format!("{verb} OK:{v}"),
        None => format!("{verb} OK"),
    };
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n{body}\r\n"
    )
}

fn error_response(message: &str) -> String {
    format!(
        "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\n\r\nERROR {message}\r\n"
    )
}

/// Minimal percent-decoder for the name/payload components of a management
/// request (§6.4 `<urlencoded-name>`); no crate pulled in for a handful of
/// `%XX` escapes.
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(hex) = std::str::from_utf8(&bytes[i + 1..i + 3]) {
                if let Ok(byte) = u8::from_str_radix(hex, 16) {
                    out.push(byte);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_decode_handles_escaped_slash() {
        assert_eq!(percent_decode("u%2Fs1"), "u/s1");
    }

    #[test]
    fn percent_decode_passes_through_plain_text() {
        assert_eq!(percent_decode("plain"), "plain");
    }

    #[test]
    fn ok_response_matches_grammar_with_value() {
        let resp = ok_response("NEWFACE", Some("3"));
        assert!(resp.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(resp.ends_with("NEWFACE OK:3\r\n"));
    }

    #[test]
    fn ok_response_matches_grammar_without_value() {
        let resp = ok_response("NEWFORWARDINGRULE", None);
        assert!(resp.ends_with("NEWFORWARDINGRULE OK\r\n"));
    }
}
