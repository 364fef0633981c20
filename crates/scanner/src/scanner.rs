//! Reconciliation between the watched folder and the registry.

use crate::onboarding::PublishDecider;
use anyhow::{Context, Result};
use filebeacon_registry::{split_full_name, Registry};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Floor for the scan interval, keeping a misconfigured interval from
/// turning the loop into a busy spin.
pub const MIN_SCAN_INTERVAL: Duration = Duration::from_secs(5);

/// What one reconciliation pass changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassOutcome {
    pub added: usize,
    pub removed: usize,
}

impl PassOutcome {
    pub fn changed(&self) -> bool {
        self.added > 0 || self.removed > 0
    }
}

/// Keeps the registry equal to the set of files physically present in the
/// watched folder, onboarding new files through a [`PublishDecider`].
pub struct FolderScanner {
    registry: Arc<Registry>,
    decider: Arc<dyn PublishDecider>,
}

impl FolderScanner {
    pub fn new(registry: Arc<Registry>, decider: Arc<dyn PublishDecider>) -> Self {
        Self { registry, decider }
    }

    /// List regular files directly inside `folder`, keyed by on-disk name
    /// with the split base/extension as value.
    ///
    /// A listing failure is logged and yields an empty set: the pass then
    /// treats every known file as vanished rather than crashing.
    fn list_folder(folder: &Path) -> BTreeMap<String, (String, String)> {
        let mut entries = BTreeMap::new();
        let read_dir = match fs::read_dir(folder) {
            Ok(read_dir) => read_dir,
            Err(err) => {
                error!(folder = %folder.display(), "failed to list watched folder: {err}");
                return entries;
            }
        };
        for entry in read_dir {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(folder = %folder.display(), "unreadable directory entry: {err}");
                    continue;
                }
            };
            let is_file = fs::metadata(entry.path())
                .map(|meta| meta.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                debug!("skipping entry with non-UTF-8 name");
                continue;
            };
            let (base, ext) = split_full_name(&name);
            entries.insert(name, (base, ext));
        }
        entries
    }

    /// Run one reconciliation pass and persist the result.
    ///
    /// New files are onboarded in lexicographic order of their on-disk
    /// name; files no longer present are removed. The registry is saved
    /// exactly once, after the pass.
    pub fn reconcile(&self) -> Result<PassOutcome> {
        let folder = self
            .registry
            .folder()
            .context("no watched folder configured")?;
        let current = Self::list_folder(&folder);
        let known = self.registry.list_all();

        let mut outcome = PassOutcome::default();
        for (full_name, (base, ext)) in &current {
            if known.contains_key(full_name) {
                continue;
            }
            let decision = self.decider.decide(full_name);
            self.registry
                .upsert(full_name, base, ext, decision.publish, decision.ttl);
            info!(
                file = %full_name,
                publish = decision.publish,
                ttl = decision.ttl,
                "registered new file"
            );
            outcome.added += 1;
        }
        for full_name in known.keys() {
            if !current.contains_key(full_name) {
                self.registry.remove(full_name);
                info!(file = %full_name, "file no longer on disk, removed");
                outcome.removed += 1;
            }
        }

        self.registry
            .save()
            .context("failed to persist registry after pass")?;
        Ok(outcome)
    }

    /// Periodic reconciliation loop; runs until the owning task is aborted.
    ///
    /// A failing pass is logged and the loop continues on the next tick.
    pub async fn run(self: Arc<Self>, interval: Duration) {
        let interval = interval.max(MIN_SCAN_INTERVAL);
        info!(seconds = interval.as_secs(), "scan loop started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick fires immediately and the supervisor has already
        // run the initial pass, so consume it up front
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match self.reconcile() {
                Ok(outcome) if outcome.changed() => {
                    info!(
                        added = outcome.added,
                        removed = outcome.removed,
                        "scan pass applied changes"
                    );
                }
                Ok(_) => debug!("scan pass found no changes"),
                Err(err) => error!("scan pass failed: {err:#}"),
            }
        }
    }
}
