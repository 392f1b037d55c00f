use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::Result;
use crate::processing::compute_cryptographic;

/// Full-content digest of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }

    /// First eight hex characters, as used in group ids
    pub fn short(&self) -> String {
        self.to_hex()[..8].to_string()
    }
}

impl From<blake3::Hash> for ContentHash {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Representation of one scanned file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Full path to the file
    pub path: PathBuf,

    /// File size in bytes
    pub size: u64,

    /// Creation timestamp (falls back to the modification time where unsupported)
    pub created: SystemTime,

    /// Last modified timestamp
    pub modified: SystemTime,

    /// Content digest, written at most once
    content_hash: Option<ContentHash>,
}

impl FileRecord {
    pub fn new(path: impl Into<PathBuf>, size: u64, created: SystemTime, modified: SystemTime) -> Self {
        Self {
            path: path.into(),
            size,
            created,
            modified,
            content_hash: None,
        }
    }

    pub fn content_hash(&self) -> Option<&ContentHash> {
        self.content_hash.as_ref()
    }

    pub fn is_hashed(&self) -> bool {
        self.content_hash.is_some()
    }

    /// Return a copy of this record carrying its content hash.
    ///
    /// A record that is already hashed is returned unchanged without touching the
    /// disk, so the digest is computed at most once and never replaced.
    pub fn ensure_hashed(&self) -> Result<FileRecord> {
        if self.content_hash.is_some() {
            return Ok(self.clone());
        }
        let hash = compute_cryptographic(&self.path)?;
        Ok(self.clone().with_hash(hash.into()))
    }

    /// Attach a precomputed hash. An existing hash is kept.
    pub fn with_hash(mut self, hash: ContentHash) -> Self {
        if self.content_hash.is_none() {
            self.content_hash = Some(hash);
        }
        self
    }

    /// Parent directory, or the empty path for bare file names
    pub fn parent(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Extension including its leading dot, or an empty string
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default()
    }
}

/// Classification output the renamer and sorter need for one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentContext {
    /// Free-text category label
    pub category: String,

    /// Date the document refers to
    pub date: NaiveDate,

    /// Extension including the leading dot, or empty
    pub extension: String,
}

/// How a file relates to the exact-duplicate groups of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicateRole {
    Unique,
    Canonical,
    Duplicate,
}

impl DuplicateRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unique => "unique",
            Self::Canonical | Self::Duplicate => "exact_dup",
        }
    }
}

/// Run mode as recorded in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    DryRun,
    Commit,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DryRun => "dry-run",
            Self::Commit => "commit",
        }
    }
}
