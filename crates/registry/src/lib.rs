//! Persisted publish/TTL registry for files in a watched folder.
//!
//! The registry maps on-disk file names to publication policy and is the
//! single piece of shared mutable state between the folder scanner and the
//! query server. All access goes through [`Registry`]'s locked accessors;
//! the underlying map is never handed out by reference.

pub mod errors;
pub mod registry;
pub mod types;

pub use errors::{RegistryError, Result};
pub use registry::Registry;
pub use types::{split_full_name, FileRecord};
