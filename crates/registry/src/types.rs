//! Record and document types for the file registry

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Fallback TTL applied when repairing an entry persisted without one.
pub const DEFAULT_TTL_SECONDS: u64 = 300;

/// Publication policy for one file in the watched folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Base name without extension
    pub filename: String,

    /// Extension without the leading dot (empty when the file has none)
    pub extension: String,

    /// Whether availability queries for this file succeed
    pub publish: bool,

    /// Advisory validity in seconds returned to queriers
    pub ttl: u64,
}

impl FileRecord {
    pub fn new(
        filename: impl Into<String>,
        extension: impl Into<String>,
        publish: bool,
        ttl: u64,
    ) -> Self {
        Self {
            filename: filename.into(),
            extension: extension.into(),
            publish,
            ttl,
        }
    }

    /// Reconstruct the on-disk name this record describes.
    pub fn full_name(&self) -> String {
        if self.extension.is_empty() {
            self.filename.clone()
        } else {
            format!("{}.{}", self.filename, self.extension)
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.filename.is_empty() {
            return Err("filename must not be empty".to_string());
        }
        if self.ttl == 0 {
            return Err("ttl must be a positive number of seconds".to_string());
        }
        Ok(())
    }
}

/// Split an on-disk name into base name and extension at the last dot.
///
/// A name with nothing before the dot (`.bashrc`) counts as having no
/// extension, as does a name without any dot at all.
pub fn split_full_name(name: &str) -> (String, String) {
    match name.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() => (base.to_string(), ext.to_string()),
        _ => (name.to_string(), String::new()),
    }
}

/// Serialized form of the registry document, write side.
#[derive(Debug, Serialize)]
pub(crate) struct DocumentOut<'a> {
    pub folder: &'a Option<PathBuf>,
    pub files: &'a BTreeMap<String, FileRecord>,
}

/// Read side of the document. Per-file entries stay untyped here so one
/// malformed entry can be skipped without aborting the whole load.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct DocumentIn {
    #[serde(default)]
    pub folder: Option<PathBuf>,
    #[serde(default)]
    pub files: BTreeMap<String, Value>,
}

/// Tolerant per-entry shape. Older documents stored neither `filename` nor
/// `extension`; both are repaired from the map key on load.
#[derive(Debug, Deserialize)]
pub(crate) struct RawRecord {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default)]
    pub publish: bool,
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl RawRecord {
    /// Repair and validate against the full name the entry is keyed under.
    pub fn into_record(self, full_name: &str) -> std::result::Result<FileRecord, String> {
        let (base, ext) = split_full_name(full_name);
        let record = FileRecord {
            filename: self.filename.filter(|f| !f.is_empty()).unwrap_or(base),
            extension: self.extension.unwrap_or(ext),
            publish: self.publish,
            ttl: self.ttl.unwrap_or(DEFAULT_TTL_SECONDS),
        };
        record.validate()?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_plain_name() {
        assert_eq!(
            split_full_name("report.pdf"),
            ("report".to_string(), "pdf".to_string())
        );
    }

    #[test]
    fn split_keeps_inner_dots_in_base() {
        assert_eq!(
            split_full_name("archive.tar.gz"),
            ("archive.tar".to_string(), "gz".to_string())
        );
    }

    #[test]
    fn split_without_dot_has_empty_extension() {
        assert_eq!(split_full_name("README"), ("README".to_string(), String::new()));
    }

    #[test]
    fn split_leading_dot_is_not_an_extension() {
        assert_eq!(
            split_full_name(".bashrc"),
            (".bashrc".to_string(), String::new())
        );
    }

    #[test]
    fn full_name_round_trips_the_split() {
        let (base, ext) = split_full_name("notes.txt");
        let record = FileRecord::new(base, ext, true, 60);
        assert_eq!(record.full_name(), "notes.txt");

        let record = FileRecord::new("README", "", false, 60);
        assert_eq!(record.full_name(), "README");
    }

    #[test]
    fn validate_rejects_zero_ttl_and_empty_filename() {
        assert!(FileRecord::new("a", "txt", true, 0).validate().is_err());
        assert!(FileRecord::new("", "txt", true, 10).validate().is_err());
        assert!(FileRecord::new("a", "", true, 10).validate().is_ok());
    }

    #[test]
    fn raw_record_repairs_legacy_entry_from_key() {
        let raw = RawRecord {
            filename: None,
            extension: None,
            publish: true,
            ttl: Some(120),
        };
        let record = raw.into_record("report.pdf").unwrap();
        assert_eq!(record.filename, "report");
        assert_eq!(record.extension, "pdf");
        assert!(record.publish);
        assert_eq!(record.ttl, 120);
    }

    #[test]
    fn raw_record_defaults_publish_and_ttl() {
        let raw = RawRecord {
            filename: Some("data".to_string()),
            extension: Some("csv".to_string()),
            publish: false,
            ttl: None,
        };
        let record = raw.into_record("data.csv").unwrap();
        assert!(!record.publish);
        assert_eq!(record.ttl, DEFAULT_TTL_SECONDS);
    }

    #[test]
    fn raw_record_rejects_zero_ttl() {
        let raw = RawRecord {
            filename: Some("data".to_string()),
            extension: Some("csv".to_string()),
            publish: true,
            ttl: Some(0),
        };
        assert!(raw.into_record("data.csv").is_err());
    }
}
