use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Custom error types for the doc-deduper library
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found error
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Invalid configuration error
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Safety check failure
    #[error("Safety check failed: {0}")]
    SafetyCheck(String),

    /// A lifecycle transition that would move a file backwards or out of a terminal state
    #[error("Invalid lifecycle transition for {path}: {from} -> {attempted}")]
    InvalidTransition {
        path: PathBuf,
        from: String,
        attempted: String,
    },

    /// Report or config (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The platform trash refused the file
    #[error("Trash error: {0}")]
    Trash(String),

    /// Unknown error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl Error {
    /// Whether the error comes from an OS rename across storage devices
    pub fn is_cross_device(&self) -> bool {
        match self {
            Self::Io(err) => is_cross_device_io(err),
            _ => false,
        }
    }
}

pub(crate) fn is_cross_device_io(err: &std::io::Error) -> bool {
    match err.raw_os_error() {
        Some(18) => cfg!(unix),     // EXDEV
        Some(17) => cfg!(windows), // ERROR_NOT_SAME_DEVICE
        _ => false,
    }
}
