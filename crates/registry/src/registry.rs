//! Durable, concurrently-accessed registry of file publication policy.
//!
//! One `parking_lot::Mutex` guards both the watched folder path and the
//! file map, since load and save always read or write them together.
//! `save` serializes the state while holding that same lock, so it can
//! never observe a half-applied mutation from a concurrent `upsert` or
//! `remove`.

use crate::errors::Result;
use crate::types::{DocumentIn, DocumentOut, FileRecord, RawRecord};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

#[derive(Debug, Default)]
struct RegistryState {
    folder: Option<PathBuf>,
    files: BTreeMap<String, FileRecord>,
}

/// Locked store mapping on-disk file names to [`FileRecord`]s, persisted as
/// a single JSON document.
#[derive(Debug)]
pub struct Registry {
    path: PathBuf,
    state: Mutex<RegistryState>,
}

impl Registry {
    /// Create an empty registry backed by the document at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Path of the persisted document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hydrate state from the persisted document.
    ///
    /// A missing document leaves the state at its empty default. A document
    /// that cannot be read or parsed at the top level is logged and treated
    /// the same way. Individual entries that fail validation are skipped
    /// with a warning; one bad entry never aborts the load.
    pub fn load(&self) -> Result<()> {
        let mut state = self.state.lock();
        if !self.path.is_file() {
            info!(
                path = %self.path.display(),
                "no registry document yet, starting empty"
            );
            return Ok(());
        }

        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) => {
                error!(path = %self.path.display(), "failed to read registry document: {err}");
                return Ok(());
            }
        };
        let document: DocumentIn = match serde_json::from_str(&raw) {
            Ok(document) => document,
            Err(err) => {
                error!(
                    path = %self.path.display(),
                    "malformed registry document, starting empty: {err}"
                );
                return Ok(());
            }
        };

        state.folder = document.folder;
        state.files.clear();
        for (full_name, value) in document.files {
            match parse_entry(value) {
                Ok(raw_record) => match raw_record.into_record(&full_name) {
                    Ok(record) => {
                        state.files.insert(full_name, record);
                    }
                    Err(reason) => {
                        warn!(entry = %full_name, %reason, "skipping invalid registry entry");
                    }
                },
                Err(reason) => {
                    warn!(entry = %full_name, %reason, "skipping unreadable registry entry");
                }
            }
        }
        info!(entries = state.files.len(), "registry loaded");
        Ok(())
    }

    /// Write the current state as one JSON document.
    ///
    /// The document is written to a sibling temporary path and renamed over
    /// the real one, so a reader never sees a partial document and a crash
    /// mid-write leaves the previous document intact.
    pub fn save(&self) -> Result<()> {
        let state = self.state.lock();
        let document = DocumentOut {
            folder: &state.folder,
            files: &state.files,
        };
        let payload = serde_json::to_string_pretty(&document)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp_path = {
            let mut os = self.path.clone().into_os_string();
            os.push(".tmp");
            PathBuf::from(os)
        };
        fs::write(&tmp_path, payload)?;
        fs::rename(&tmp_path, &self.path)?;
        debug!(path = %self.path.display(), entries = state.files.len(), "registry saved");
        Ok(())
    }

    /// Watched folder, if one has been configured.
    pub fn folder(&self) -> Option<PathBuf> {
        self.state.lock().folder.clone()
    }

    pub fn set_folder(&self, folder: impl Into<PathBuf>) {
        self.state.lock().folder = Some(folder.into());
    }

    /// Exact lookup by the on-disk name the record is keyed under.
    pub fn get_by_full_name(&self, full_name: &str) -> Option<FileRecord> {
        self.state.lock().files.get(full_name).cloned()
    }

    /// Lookup by split base name and extension.
    ///
    /// Linear scan; the identity invariant guarantees at most one match.
    pub fn get_by_name_and_ext(&self, filename: &str, extension: &str) -> Option<FileRecord> {
        let state = self.state.lock();
        state
            .files
            .values()
            .find(|record| record.filename == filename && record.extension == extension)
            .cloned()
    }

    /// Insert or replace the record stored under `full_name`.
    pub fn upsert(
        &self,
        full_name: &str,
        filename: &str,
        extension: &str,
        publish: bool,
        ttl: u64,
    ) {
        let mut state = self.state.lock();
        state.files.insert(
            full_name.to_string(),
            FileRecord::new(filename, extension, publish, ttl),
        );
    }

    /// Delete the record stored under `full_name`, if any.
    ///
    /// Returns whether an entry was actually removed.
    pub fn remove(&self, full_name: &str) -> bool {
        self.state.lock().files.remove(full_name).is_some()
    }

    /// Owned snapshot of the whole file map.
    ///
    /// Callers iterate the copy without holding the lock and without racing
    /// later mutations.
    pub fn list_all(&self) -> BTreeMap<String, FileRecord> {
        self.state.lock().files.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().files.is_empty()
    }
}

fn parse_entry(value: Value) -> std::result::Result<RawRecord, String> {
    serde_json::from_value(value).map_err(|err| err.to_string())
}
