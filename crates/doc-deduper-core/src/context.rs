use chrono::{DateTime, Local};
use log::debug;
use std::fs::File;
use std::io::Read;

use crate::config::Config;
use crate::types::{DocumentContext, FileRecord};

/// Extensions read as plain text by [`MetadataContextProvider`]
pub const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "csv", "log", "json"];

/// Upper bound on bytes read per file for fingerprinting
pub const MAX_TEXT_BYTES: u64 = 4 * 1024 * 1024;

/// Supplies extracted text and rename context for each file.
///
/// Text extraction and classification live outside the core; the pipeline only
/// sees them through this trait.
pub trait ContextProvider: Sync {
    /// Extracted text, or `None` when the file has no usable text
    fn text(&self, record: &FileRecord) -> Option<String>;

    /// Category, document date and extension for renaming and sorting
    fn context(&self, record: &FileRecord) -> DocumentContext;
}

/// Context from file metadata alone: the configured default category and the
/// modification date. Text is read only for plain-text formats.
#[derive(Debug, Clone)]
pub struct MetadataContextProvider {
    default_category: String,
}

impl MetadataContextProvider {
    pub fn new(default_category: impl Into<String>) -> Self {
        Self {
            default_category: default_category.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.default_category.clone())
    }

    fn is_text(record: &FileRecord) -> bool {
        record
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| TEXT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }
}

impl ContextProvider for MetadataContextProvider {
    fn text(&self, record: &FileRecord) -> Option<String> {
        if !Self::is_text(record) {
            return None;
        }

        let mut buffer = Vec::new();
        let read = File::open(&record.path)
            .and_then(|file| file.take(MAX_TEXT_BYTES).read_to_end(&mut buffer));
        match read {
            Ok(_) => Some(String::from_utf8_lossy(&buffer).into_owned()),
            Err(e) => {
                debug!("No text for {}: {}", record.path.display(), e);
                None
            }
        }
    }

    fn context(&self, record: &FileRecord) -> DocumentContext {
        let modified: DateTime<Local> = record.modified.into();
        DocumentContext {
            category: self.default_category.clone(),
            date: modified.date_naive(),
            extension: record.extension(),
        }
    }
}
