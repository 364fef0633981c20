//! UDP serve loop answering availability queries against the registry.
//!
//! One datagram in, one datagram out; no session, no ordering across
//! requests. The loop never terminates on bad input: undecodable payloads
//! get a NACK carrying an error message and socket errors are logged.

use crate::wire::{QueryRequest, QueryResponse};
use anyhow::{Context, Result};
use filebeacon_registry::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// Default bind address of the query server.
pub const DEFAULT_BIND: &str = "0.0.0.0:50000";

/// Receive buffer size; the protocol assumes payloads of at most 8 KiB.
pub const MAX_DATAGRAM: usize = 8192;

/// Stateless availability query server over UDP.
///
/// Reads the registry only; all mutation belongs to the scanner.
pub struct QueryServer {
    registry: Arc<Registry>,
    bind: SocketAddr,
}

impl QueryServer {
    pub fn new(registry: Arc<Registry>, bind: SocketAddr) -> Self {
        Self { registry, bind }
    }

    /// Handle one datagram payload; always produces a reply.
    pub fn handle_datagram(registry: &Registry, payload: &[u8]) -> QueryResponse {
        match QueryRequest::decode(payload) {
            Ok(request) => Self::resolve(registry, request),
            Err(err) => QueryResponse::Error(err),
        }
    }

    /// Resolve one classified request against the registry.
    fn resolve(registry: &Registry, request: QueryRequest) -> QueryResponse {
        match request {
            QueryRequest::CanonicalSplit {
                filename,
                extension,
            }
            | QueryRequest::LegacyDotted {
                filename,
                extension,
            } => match registry.get_by_name_and_ext(&filename, &extension) {
                Some(record) if record.publish => QueryResponse::Ack {
                    filename: record.filename,
                    extension: record.extension,
                    ttl: record.ttl,
                },
                _ => QueryResponse::Nack {
                    filename,
                    extension,
                },
            },
            QueryRequest::LegacyFullName(name) => match registry.get_by_full_name(&name) {
                Some(record) if record.publish => QueryResponse::Ack {
                    filename: record.filename,
                    extension: record.extension,
                    ttl: record.ttl,
                },
                _ => QueryResponse::Nack {
                    filename: name,
                    extension: String::new(),
                },
            },
        }
    }

    /// Bind the configured address and serve until the task is aborted.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let socket = UdpSocket::bind(self.bind)
            .await
            .with_context(|| format!("failed to bind {}", self.bind))?;
        info!(addr = %self.bind, "udp query server listening");
        Self::serve(Arc::clone(&self.registry), socket).await
    }

    async fn serve(registry: Arc<Registry>, socket: UdpSocket) -> Result<()> {
        let mut buffer = vec![0u8; MAX_DATAGRAM];
        loop {
            let (received, source) = match socket.recv_from(&mut buffer).await {
                Ok(result) => result,
                Err(err) => {
                    warn!("udp recv error: {err}");
                    continue;
                }
            };

            let response = Self::handle_datagram(&registry, &buffer[..received]);
            match &response {
                QueryResponse::Error(err) => {
                    warn!(%source, "rejected malformed query: {err}");
                }
                _ => debug!(%source, bytes = received, "query answered"),
            }
            if let Err(err) = socket.send_to(&response.to_payload(), source).await {
                warn!(%source, "udp send error: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tempfile::TempDir;

    fn seeded_registry(dir: &TempDir) -> Arc<Registry> {
        let registry = Arc::new(Registry::new(dir.path().join("registry.json")));
        registry.upsert("report.pdf", "report", "pdf", true, 600);
        registry.upsert("draft.txt", "draft", "txt", false, 300);
        registry.upsert("README", "README", "", true, 120);
        registry
    }

    fn response_value(registry: &Registry, payload: &[u8]) -> Value {
        let payload = QueryServer::handle_datagram(registry, payload).to_payload();
        serde_json::from_slice(&payload).unwrap()
    }

    #[test]
    fn published_file_acks_with_stored_ttl() {
        let dir = TempDir::new().unwrap();
        let registry = seeded_registry(&dir);
        assert_eq!(
            response_value(&registry, br#"{"filename": "report", "extension": "pdf"}"#),
            json!({"status": "ACK", "filename": "report", "extension": "pdf", "ttl": 600})
        );
    }

    #[test]
    fn dotted_legacy_shape_resolves_like_the_pair() {
        let dir = TempDir::new().unwrap();
        let registry = seeded_registry(&dir);
        assert_eq!(
            response_value(&registry, br#"{"filename": "report.pdf"}"#),
            json!({"status": "ACK", "filename": "report", "extension": "pdf", "ttl": 600})
        );
    }

    #[test]
    fn bare_legacy_name_resolves_by_full_name_key() {
        let dir = TempDir::new().unwrap();
        let registry = seeded_registry(&dir);
        assert_eq!(
            response_value(&registry, br#"{"filename": "README"}"#),
            json!({"status": "ACK", "filename": "README", "extension": "", "ttl": 120})
        );
    }

    #[test]
    fn unpublished_file_nacks_with_echoed_identity() {
        let dir = TempDir::new().unwrap();
        let registry = seeded_registry(&dir);
        assert_eq!(
            response_value(&registry, br#"{"filename": "draft", "extension": "txt"}"#),
            json!({"status": "NACK", "filename": "draft", "extension": "txt"})
        );
    }

    #[test]
    fn unknown_file_nacks() {
        let dir = TempDir::new().unwrap();
        let registry = seeded_registry(&dir);
        assert_eq!(
            response_value(&registry, br#"{"filename": "ghost", "extension": "bin"}"#),
            json!({"status": "NACK", "filename": "ghost", "extension": "bin"})
        );
        assert_eq!(
            response_value(&registry, br#"{"filename": "ghost"}"#),
            json!({"status": "NACK", "filename": "ghost", "extension": ""})
        );
    }

    #[test]
    fn removed_file_nacks_after_acking() {
        let dir = TempDir::new().unwrap();
        let registry = seeded_registry(&dir);
        let query = br#"{"filename": "report", "extension": "pdf"}"#;
        assert_eq!(response_value(&registry, query)["status"], "ACK");

        registry.remove("report.pdf");
        assert_eq!(response_value(&registry, query)["status"], "NACK");
    }

    #[test]
    fn malformed_payload_nacks_with_error() {
        let dir = TempDir::new().unwrap();
        let registry = seeded_registry(&dir);
        assert_eq!(
            response_value(&registry, b"{truncated"),
            json!({"status": "NACK", "error": "bad request"})
        );
        assert_eq!(
            response_value(&registry, br#"{"extension": "pdf"}"#),
            json!({"status": "NACK", "error": "invalid filename"})
        );
    }

    #[tokio::test]
    async fn loop_survives_bad_input_and_keeps_serving() {
        let dir = TempDir::new().unwrap();
        let registry = seeded_registry(&dir);

        let server_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server_socket.local_addr().unwrap();
        let server_registry = Arc::clone(&registry);
        let server_task =
            tokio::spawn(
                async move { QueryServer::serve(server_registry, server_socket).await },
            );

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut buffer = vec![0u8; MAX_DATAGRAM];

        client.send_to(b"{truncated", server_addr).await.unwrap();
        let (received, _) = tokio::time::timeout(
            Duration::from_secs(5),
            client.recv_from(&mut buffer),
        )
        .await
        .unwrap()
        .unwrap();
        let reply: Value = serde_json::from_slice(&buffer[..received]).unwrap();
        assert_eq!(reply, json!({"status": "NACK", "error": "bad request"}));

        client
            .send_to(
                br#"{"filename": "report", "extension": "pdf"}"#,
                server_addr,
            )
            .await
            .unwrap();
        let (received, _) = tokio::time::timeout(
            Duration::from_secs(5),
            client.recv_from(&mut buffer),
        )
        .await
        .unwrap()
        .unwrap();
        let reply: Value = serde_json::from_slice(&buffer[..received]).unwrap();
        assert_eq!(reply["status"], "ACK");
        assert_eq!(reply["ttl"], 600);

        server_task.abort();
    }
}
