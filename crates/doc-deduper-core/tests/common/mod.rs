#![allow(dead_code)]

use chrono::{DateTime, Local};
use doc_deduper_core::Config;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// 2023-11-14 12:00 UTC
pub const BASE_EPOCH_SECS: u64 = 1_699_963_200;

pub fn at(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(BASE_EPOCH_SECS + secs)
}

/// Create `dir/name` with `content` and a modification time of `at(mtime_secs)`
pub fn write_file(dir: &Path, name: &str, content: &[u8], mtime_secs: u64) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(at(mtime_secs))
        .unwrap();
    path
}

/// `YYYYMMDD` as the metadata provider derives it from `at(mtime_secs)`
pub fn doc_date(mtime_secs: u64) -> String {
    let local: DateTime<Local> = at(mtime_secs).into();
    local.format("%Y%m%d").to_string()
}

pub fn dry_run_config() -> Config {
    Config {
        threads: 2,
        ..Config::default()
    }
}

pub fn commit_config() -> Config {
    Config {
        dry_run: false,
        ..dry_run_config()
    }
}

/// Sorted names of the regular files directly inside `dir`
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
