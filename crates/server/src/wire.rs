//! Wire shapes of the availability protocol.
//!
//! Requests arrive in three JSON shapes that evolved from an older schema.
//! Classification into explicit variants keeps the resolution order fixed:
//! the canonical split pair wins, then a dotted single name, then a bare
//! legacy full-name key. Each variant resolves through exactly one lookup
//! strategy; the strategies are never merged for a single request.

use filebeacon_registry::split_full_name;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

/// Why a datagram could not be turned into a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The payload was not a decodable JSON request object.
    #[error("bad request")]
    BadRequest,

    /// The payload decoded but carried no usable file name.
    #[error("invalid filename")]
    InvalidFilename,
}

/// Untyped view of an inbound payload, before shape classification.
#[derive(Debug, Deserialize)]
struct RawQuery {
    #[serde(default)]
    filename: Option<Value>,
    #[serde(default)]
    extension: Option<String>,
}

/// One classified availability request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryRequest {
    /// Canonical `{filename, extension}` pair; looked up by the pair.
    CanonicalSplit { filename: String, extension: String },

    /// Single dotted name; base and extension derive from its last dot and
    /// the lookup also goes by the pair.
    LegacyDotted { filename: String, extension: String },

    /// Bare name with no extension part, looked up directly as the
    /// registry's full-name key.
    LegacyFullName(String),
}

impl QueryRequest {
    /// Decode and classify one datagram payload.
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let raw: RawQuery =
            serde_json::from_slice(payload).map_err(|_| ProtocolError::BadRequest)?;
        let filename = match raw.filename {
            Some(Value::String(name)) if !name.is_empty() => name,
            _ => return Err(ProtocolError::InvalidFilename),
        };

        if let Some(extension) = raw.extension.filter(|ext| !ext.is_empty()) {
            return Ok(QueryRequest::CanonicalSplit {
                filename,
                extension,
            });
        }

        let (base, ext) = split_full_name(&filename);
        if ext.is_empty() {
            Ok(QueryRequest::LegacyFullName(filename))
        } else {
            Ok(QueryRequest::LegacyDotted {
                filename: base,
                extension: ext,
            })
        }
    }
}

/// Reply to an availability query; one datagram in, one of these out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResponse {
    /// The file is known and published.
    Ack {
        filename: String,
        extension: String,
        ttl: u64,
    },

    /// Unknown identity, or known but not published; echoes the requested
    /// identity back.
    Nack { filename: String, extension: String },

    /// The datagram was not a usable request.
    Error(ProtocolError),
}

impl QueryResponse {
    /// Serialize to the wire form.
    pub fn to_payload(&self) -> Vec<u8> {
        let value = match self {
            QueryResponse::Ack {
                filename,
                extension,
                ttl,
            } => json!({
                "status": "ACK",
                "filename": filename,
                "extension": extension,
                "ttl": ttl,
            }),
            QueryResponse::Nack {
                filename,
                extension,
            } => json!({
                "status": "NACK",
                "filename": filename,
                "extension": extension,
            }),
            QueryResponse::Error(err) => json!({
                "status": "NACK",
                "error": err.to_string(),
            }),
        };
        value.to_string().into_bytes()
    }
}
