use indicatif::ProgressBar;
use log::{debug, info};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::logging::log_hash_error;
use crate::types::{ContentHash, FileRecord};

/// Files sharing one content hash, and therefore one size
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    group_id: String,
    hash: ContentHash,
    files: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// Members are kept sorted by path. Fewer than two members is a bug in the caller.
    pub(crate) fn new(group_id: String, hash: ContentHash, mut files: Vec<FileRecord>) -> Self {
        debug_assert!(
            files.len() >= 2,
            "duplicate group {} has {} member(s)",
            group_id,
            files.len()
        );
        files.sort_by(|a, b| a.path.as_os_str().cmp(b.path.as_os_str()));
        Self {
            group_id,
            hash,
            files,
        }
    }

    pub fn id(&self) -> &str {
        &self.group_id
    }

    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Bytes that would be reclaimed by keeping a single copy
    pub fn wasted_bytes(&self) -> u64 {
        self.files
            .first()
            .map(|f| f.size * (self.files.len() as u64 - 1))
            .unwrap_or(0)
    }
}

/// A file that could not be read while hashing
#[derive(Debug, Clone, Serialize)]
pub struct HashFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of exact-duplicate detection
#[derive(Debug, Clone)]
pub struct IdentityReport {
    /// Every input record, hashed where hashing was needed and succeeded
    pub records: Vec<FileRecord>,

    /// Groups with two or more byte-identical members, ordered by size then hash
    pub groups: Vec<DuplicateGroup>,

    /// Records left unhashed because they could not be read
    pub unreadable: Vec<HashFailure>,
}

/// Groups records by size, then by content hash
pub struct IdentityIndex {
    threads: usize,
    progress: ProgressBar,
}

impl IdentityIndex {
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
            progress: ProgressBar::hidden(),
        }
    }

    /// Report each hashed file on the given bar
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Find every set of byte-identical files among `records`.
    ///
    /// Only files that share their size with another file are hashed. Hashing runs
    /// on a dedicated worker pool; grouping starts once every hash is in, so the
    /// result does not depend on scheduling.
    pub fn find_exact_duplicates(&self, mut records: Vec<FileRecord>) -> Result<IdentityReport> {
        let buckets = group_by_size(&records);
        let candidates: Vec<usize> = buckets
            .values()
            .filter(|indices| indices.len() >= 2)
            .flatten()
            .copied()
            .collect();

        info!(
            "Hashing {} of {} files ({} distinct sizes)",
            candidates.len(),
            records.len(),
            buckets.len()
        );
        self.progress.set_length(candidates.len() as u64);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|e| Error::Unknown(format!("Failed to build hashing pool: {}", e)))?;

        let hashed: Vec<(usize, Result<FileRecord>)> = pool.install(|| {
            candidates
                .par_iter()
                .map(|&idx| {
                    let outcome = records[idx].ensure_hashed();
                    self.progress.inc(1);
                    (idx, outcome)
                })
                .collect()
        });
        self.progress.finish_and_clear();

        let mut unreadable = Vec::new();
        for (idx, outcome) in hashed {
            match outcome {
                Ok(updated) => records[idx] = updated,
                Err(e) => {
                    log_hash_error(&records[idx].path, &e);
                    unreadable.push(HashFailure {
                        path: records[idx].path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        unreadable.sort_by(|a, b| a.path.cmp(&b.path));

        let mut groups = Vec::new();
        for (size, indices) in &buckets {
            if indices.len() < 2 {
                continue;
            }

            let mut by_hash: BTreeMap<ContentHash, Vec<FileRecord>> = BTreeMap::new();
            for &idx in indices {
                if let Some(hash) = records[idx].content_hash() {
                    by_hash.entry(*hash).or_default().push(records[idx].clone());
                }
            }

            for (seq, (hash, files)) in by_hash.into_iter().enumerate() {
                if files.len() < 2 {
                    continue;
                }
                let group_id = format!("dup_{}_{}", hash.short(), seq + 1);
                debug!(
                    "Group {}: {} files of {} bytes",
                    group_id,
                    files.len(),
                    size
                );
                groups.push(DuplicateGroup::new(group_id, hash, files));
            }
        }

        info!(
            "Found {} duplicate groups ({} unreadable files)",
            groups.len(),
            unreadable.len()
        );

        Ok(IdentityReport {
            records,
            groups,
            unreadable,
        })
    }
}

/// Indices of `records` keyed by byte size
pub fn group_by_size(records: &[FileRecord]) -> BTreeMap<u64, Vec<usize>> {
    let mut buckets: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
    for (idx, record) in records.iter().enumerate() {
        buckets.entry(record.size).or_default().push(idx);
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{record_for, write_file};
    use tempfile::tempdir;

    #[test]
    fn test_identical_files_form_one_group() {
        let dir = tempdir().unwrap();
        let a = write_file(dir.path(), "a.txt", b"same bytes", 100);
        let b = write_file(dir.path(), "b.txt", b"same bytes", 200);
        let c = write_file(dir.path(), "c.txt", b"other data", 300);

        let records = vec![record_for(&c), record_for(&b), record_for(&a)];
        let report = IdentityIndex::new(2).find_exact_duplicates(records).unwrap();

        assert_eq!(report.groups.len(), 1);
        let group = &report.groups[0];
        assert_eq!(group.len(), 2);
        assert_eq!(group.files()[0].path, a);
        assert_eq!(group.files()[1].path, b);
        assert!(group.id().starts_with(&format!("dup_{}_", group.hash().short())));
        assert_eq!(group.wasted_bytes(), 10);
        assert!(report.unreadable.is_empty());
    }

    #[test]
    fn test_unique_sizes_are_never_hashed() {
        let dir = tempdir().unwrap();
        let a = write_file(dir.path(), "a.txt", b"short", 100);
        let b = write_file(dir.path(), "b.txt", b"much longer", 100);

        let report = IdentityIndex::new(1)
            .find_exact_duplicates(vec![record_for(&a), record_for(&b)])
            .unwrap();

        assert!(report.groups.is_empty());
        assert!(report.records.iter().all(|r| !r.is_hashed()));
    }

    #[test]
    fn test_same_size_different_content_is_not_a_group() {
        let dir = tempdir().unwrap();
        let a = write_file(dir.path(), "a.txt", b"abcd", 100);
        let b = write_file(dir.path(), "b.txt", b"wxyz", 100);

        let report = IdentityIndex::new(1)
            .find_exact_duplicates(vec![record_for(&a), record_for(&b)])
            .unwrap();

        assert!(report.groups.is_empty());
        assert!(report.records.iter().all(|r| r.is_hashed()));
    }

    #[test]
    fn test_unreadable_file_is_excluded_not_fatal() {
        let dir = tempdir().unwrap();
        let a = write_file(dir.path(), "a.txt", b"same", 100);
        let b = write_file(dir.path(), "b.txt", b"same", 100);
        let gone = write_file(dir.path(), "gone.txt", b"same", 100);
        let gone_record = record_for(&gone);
        std::fs::remove_file(&gone).unwrap();

        let report = IdentityIndex::new(2)
            .find_exact_duplicates(vec![record_for(&a), record_for(&b), gone_record])
            .unwrap();

        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].len(), 2);
        assert_eq!(report.unreadable.len(), 1);
        assert_eq!(report.unreadable[0].path, gone);
        let stale = report.records.iter().find(|r| r.path == gone).unwrap();
        assert!(!stale.is_hashed());
    }

    #[test]
    fn test_group_ids_are_reproducible() {
        let dir = tempdir().unwrap();
        let paths: Vec<_> = ["a", "b", "c", "d"]
            .iter()
            .map(|n| write_file(dir.path(), &format!("{}.txt", n), b"dup", 100))
            .collect();

        let forward: Vec<_> = paths.iter().map(|p| record_for(p)).collect();
        let backward: Vec<_> = paths.iter().rev().map(|p| record_for(p)).collect();

        let first = IdentityIndex::new(4).find_exact_duplicates(forward).unwrap();
        let second = IdentityIndex::new(1).find_exact_duplicates(backward).unwrap();

        assert_eq!(first.groups[0].id(), second.groups[0].id());
        assert_eq!(first.groups[0].files(), second.groups[0].files());
    }

    #[test]
    fn test_group_by_size() {
        let now = std::time::SystemTime::now();
        let records = vec![
            FileRecord::new("/x/a", 10, now, now),
            FileRecord::new("/x/b", 20, now, now),
            FileRecord::new("/x/c", 10, now, now),
        ];
        let buckets = group_by_size(&records);
        assert_eq!(buckets[&10], vec![0, 2]);
        assert_eq!(buckets[&20], vec![1]);
    }
}
