use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Smallest stem budget that still leaves room for a date, a category letter and a suffix
pub const MIN_STEM_LEN: usize = 8;

/// What happens to the non-canonical members of an exact-duplicate group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicatePolicy {
    /// Move into a per-group folder under the quarantine root
    Quarantine,

    /// Send to a recoverable trash, never a permanent unlink
    Delete,
}

/// Subfolder scheme used when physically sorting the surviving files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortStrategy {
    ByCategory,
    ByDate,
    ByType,
}

impl SortStrategy {
    /// Folder name under the sort root
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ByCategory => "by_category",
            Self::ByDate => "by_date",
            Self::ByType => "by_type",
        }
    }
}

/// Log level for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Configuration for a deduplication and renaming run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Whether to run without making changes
    pub dry_run: bool,

    /// Whether to look for byte-identical files
    pub detect_exact: bool,

    /// Whether to compare text fingerprints for near-duplicates
    pub detect_near: bool,

    /// Fingerprint similarity at or above which two documents are reported (0.0-1.0)
    pub near_threshold: f64,

    /// Maximum filename stem length, extension excluded
    pub max_stem_len: usize,

    /// Use `YYMMDD` instead of `YYYYMMDD` in generated names
    pub use_short_date: bool,

    /// Ceiling on disambiguation attempts per file
    pub max_name_attempts: usize,

    /// What to do with non-canonical duplicates
    pub duplicate_policy: DuplicatePolicy,

    /// Quarantine root, relative to the scanned root
    pub quarantine_dir: String,

    /// Sort root, relative to the scanned root
    pub sorted_dir: String,

    /// Optional physical sort applied after renaming
    pub sort_strategy: Option<SortStrategy>,

    /// Relocate "deleted" files here instead of the platform trash
    pub trash_dir: Option<PathBuf>,

    /// Category used when the classifier supplies none
    pub default_category: String,

    /// Maximum directory depth for scanning
    pub max_depth: Option<usize>,

    /// Number of threads to use for hashing (0 = auto)
    pub threads: usize,

    /// Where to write the JSON inventory, if anywhere
    pub report_dir: Option<PathBuf>,

    /// Show a progress bar while hashing
    pub show_progress: bool,

    /// Log level
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dry_run: true,
            detect_exact: true,
            detect_near: false,
            near_threshold: 0.85,
            max_stem_len: 20,
            use_short_date: false,
            max_name_attempts: 1000,
            duplicate_policy: DuplicatePolicy::Quarantine,
            quarantine_dir: "_duplicates".to_string(),
            sorted_dir: "_sorted".to_string(),
            sort_strategy: None,
            trash_dir: None,
            default_category: "document".to_string(),
            max_depth: None,
            threads: 0, // Auto
            report_dir: None,
            show_progress: false,
            log_level: LogLevel::Info,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Configuration(format!("Failed to open config file: {}", e)))?;

        let config: Config = serde_json::from_reader(file)
            .map_err(|e| Error::Configuration(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .map_err(|e| Error::Configuration(format!("Failed to create config file: {}", e)))?;

        serde_json::to_writer_pretty(file, self)
            .map_err(|e| Error::Configuration(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.near_threshold) {
            return Err(Error::Configuration(
                "Near-duplicate threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.max_stem_len < MIN_STEM_LEN {
            return Err(Error::Configuration(format!(
                "Stem length budget must be at least {} characters",
                MIN_STEM_LEN
            )));
        }

        if self.max_name_attempts == 0 {
            return Err(Error::Configuration(
                "At least one naming attempt is required".to_string(),
            ));
        }

        for (label, name) in [
            ("quarantine", &self.quarantine_dir),
            ("sorted", &self.sorted_dir),
        ] {
            if !is_single_component(name) {
                return Err(Error::Configuration(format!(
                    "The {} directory must be a plain folder name, got '{}'",
                    label, name
                )));
            }
        }

        if self.quarantine_dir == self.sorted_dir {
            return Err(Error::Configuration(
                "Quarantine and sorted directories must differ".to_string(),
            ));
        }

        Ok(())
    }

    /// Worker count for hashing, resolving 0 to the number of CPUs
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.dry_run);
        assert_eq!(config.max_stem_len, 20);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Quarantine);
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let config = Config {
            near_threshold: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_validate_rejects_tiny_budget() {
        let config = Config {
            max_stem_len: 3,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_nested_dir_names() {
        let config = Config {
            quarantine_dir: "a/b".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            sorted_dir: "..".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            sorted_dir: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc-deduper.json");

        let config = Config {
            dry_run: false,
            duplicate_policy: DuplicatePolicy::Delete,
            sort_strategy: Some(SortStrategy::ByDate),
            max_stem_len: 24,
            ..Default::default()
        };
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert!(!loaded.dry_run);
        assert_eq!(loaded.duplicate_policy, DuplicatePolicy::Delete);
        assert_eq!(loaded.sort_strategy, Some(SortStrategy::ByDate));
        assert_eq!(loaded.max_stem_len, 24);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{ "use_short_date": true }"#).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert!(loaded.use_short_date);
        assert_eq!(loaded.quarantine_dir, "_duplicates");
        assert_eq!(loaded.near_threshold, 0.85);
    }
}
