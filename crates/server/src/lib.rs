//! UDP request/response protocol answering file availability queries
//! against the registry.

pub mod server;
pub mod wire;

pub use server::{QueryServer, DEFAULT_BIND, MAX_DATAGRAM};
pub use wire::{ProtocolError, QueryRequest, QueryResponse};
