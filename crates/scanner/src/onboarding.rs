//! Publish/TTL decision sources for newly discovered files.

/// Decision taken for one newly discovered file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishDecision {
    /// Whether availability queries for the file should succeed.
    pub publish: bool,

    /// Advisory validity in seconds, must be positive.
    pub ttl: u64,
}

/// Source of publish/TTL decisions for files the scanner has not seen
/// before.
///
/// Implementations may block: the interactive prompt waits on human input,
/// and the scanner deliberately stalls its pass until the decision is made.
pub trait PublishDecider: Send + Sync {
    /// Decide policy for the file stored on disk under `full_name`.
    fn decide(&self, full_name: &str) -> PublishDecision;
}

/// Decider applying the same decision to every file.
///
/// Used for headless runs where prompting is impossible.
pub struct StaticDecider {
    decision: PublishDecision,
}

impl StaticDecider {
    /// A zero TTL is raised to one second to keep records valid.
    pub fn new(publish: bool, ttl: u64) -> Self {
        Self {
            decision: PublishDecision {
                publish,
                ttl: ttl.max(1),
            },
        }
    }
}

impl PublishDecider for StaticDecider {
    fn decide(&self, _full_name: &str) -> PublishDecision {
        self.decision
    }
}
