//! Helpers shared by unit tests: scratch files with chosen content and mtimes.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::discovery::file_record;
use crate::types::FileRecord;

/// 2023-11-14 12:00 UTC; small offsets stay on the same local date everywhere
pub const BASE_EPOCH_SECS: u64 = 1_699_963_200;

pub fn at(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(BASE_EPOCH_SECS + secs)
}

/// Write `content` to `dir/name` and set its modification time to `at(mtime_secs)`
pub fn write_file(dir: &Path, name: &str, content: &[u8], mtime_secs: u64) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    let file = File::options().write(true).open(&path).unwrap();
    file.set_modified(at(mtime_secs)).unwrap();
    path
}

/// Unhashed record read back from disk
pub fn record_for(path: &Path) -> FileRecord {
    file_record(path).unwrap()
}
