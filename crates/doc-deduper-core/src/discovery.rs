use log::{debug, warn};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::safety::normalize;
use crate::types::FileRecord;

/// Discover every regular file under `root`, sorted by path.
///
/// The quarantine and sort roots, plus a trash or report directory placed inside
/// the tree, are never descended into.
pub fn discover_files(root: &Path, config: &Config) -> Result<Vec<FileRecord>> {
    if !root.is_dir() {
        return Err(Error::FileNotFound(root.to_path_buf()));
    }

    let excluded = excluded_dirs(root, config);
    let max_depth = config.max_depth.unwrap_or(usize::MAX);

    let mut records = Vec::new();
    let walker = WalkDir::new(root)
        .max_depth(max_depth)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && excluded.contains(&resolve(e.path()))));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        match file_record(entry.path()) {
            Ok(record) => records.push(record),
            Err(e) => warn!("Error reading metadata for {}: {}", entry.path().display(), e),
        }
    }

    records.sort_by(|a, b| a.path.cmp(&b.path));
    debug!("Discovered {} files under {}", records.len(), root.display());
    Ok(records)
}

fn excluded_dirs(root: &Path, config: &Config) -> Vec<PathBuf> {
    let mut dirs = vec![
        root.join(&config.quarantine_dir),
        root.join(&config.sorted_dir),
    ];
    dirs.extend(config.trash_dir.iter().cloned());
    dirs.extend(config.report_dir.iter().cloned());
    dirs.iter().map(|d| resolve(d)).collect()
}

/// Absolute, `.`/`..`-free form so differently spelled paths compare equal.
/// Relative paths are taken from the working directory, as the moves that use them do.
fn resolve(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return normalize(path);
    }
    match env::current_dir() {
        Ok(cwd) => normalize(&cwd.join(path)),
        Err(_) => normalize(path),
    }
}

/// Build an unhashed record from file metadata
pub fn file_record(path: &Path) -> io::Result<FileRecord> {
    let metadata = fs::metadata(path)?;
    let modified = metadata.modified()?;
    // Not every platform/filesystem records a birth time
    let created: SystemTime = metadata.created().unwrap_or(modified);
    Ok(FileRecord::new(path, metadata.len(), created, modified))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::write_file;
    use tempfile::tempdir;

    #[test]
    fn test_discovers_nested_files_in_order() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        write_file(dir.path(), "b.txt", b"b", 10);
        write_file(dir.path(), "a.txt", b"a", 10);
        write_file(&dir.path().join("sub"), "c.md", b"ccc", 10);

        let records = discover_files(dir.path(), &Config::default()).unwrap();
        let names: Vec<_> = records.iter().map(|r| r.file_name()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "c.md"]);
        assert_eq!(records[2].size, 3);
        assert!(records.iter().all(|r| !r.is_hashed()));
    }

    #[test]
    fn test_skips_managed_directories() {
        let dir = tempdir().unwrap();
        let config = Config::default();
        let quarantine = dir.path().join(&config.quarantine_dir);
        let sorted = dir.path().join(&config.sorted_dir);
        fs::create_dir_all(&quarantine).unwrap();
        fs::create_dir_all(&sorted).unwrap();
        write_file(&quarantine, "old.txt", b"q", 10);
        write_file(&sorted, "kept.txt", b"s", 10);
        write_file(dir.path(), "live.txt", b"l", 10);

        let records = discover_files(dir.path(), &config).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_name(), "live.txt");
    }

    #[test]
    fn test_skips_trash_dir_spelled_differently() {
        let dir = tempdir().unwrap();
        let trash = dir.path().join("trash");
        fs::create_dir_all(&trash).unwrap();
        write_file(&trash, "old.txt", b"t", 10);
        write_file(dir.path(), "live.txt", b"l", 10);

        let config = Config {
            trash_dir: Some(dir.path().join("sub").join("..").join(".").join("trash")),
            report_dir: Some(dir.path().join("./reports")),
            ..Config::default()
        };
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::create_dir_all(dir.path().join("reports")).unwrap();
        write_file(&dir.path().join("reports"), "inventory.json", b"[]", 10);

        let records = discover_files(&dir.path().join("."), &config).unwrap();
        let names: Vec<_> = records.iter().map(|r| r.file_name()).collect();
        assert_eq!(names, vec!["live.txt"]);
    }

    #[test]
    fn test_depth_limit() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        write_file(dir.path(), "top.txt", b"t", 10);
        write_file(&dir.path().join("sub"), "deep.txt", b"d", 10);

        let config = Config {
            max_depth: Some(1),
            ..Config::default()
        };
        let records = discover_files(dir.path(), &config).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_name(), "top.txt");
    }

    #[test]
    fn test_missing_root() {
        let dir = tempdir().unwrap();
        let result = discover_files(&dir.path().join("nope"), &Config::default());
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }

    #[test]
    fn test_record_carries_modification_time() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "a.txt", b"a", 500);
        let record = file_record(&path).unwrap();
        assert_eq!(record.modified, crate::test_utils::at(500));
    }
}
