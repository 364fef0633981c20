//! Folder reconciliation for the file availability registry.
//!
//! The scanner compares the watched folder against the registry on a fixed
//! interval: newly discovered files are onboarded through an injected
//! [`PublishDecider`] and vanished files are dropped, with the registry
//! persisted once per pass.

pub mod onboarding;
pub mod scanner;

pub use onboarding::{PublishDecider, PublishDecision, StaticDecider};
pub use scanner::{FolderScanner, PassOutcome, MIN_SCAN_INTERVAL};
