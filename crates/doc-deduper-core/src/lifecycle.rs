//! Per-file lifecycle across one run.
//!
//! ```text
//! Present ──rename──> Renamed(Ok | Failed | Skipped)
//!    │                     │
//!    ├──resolve dup──> Quarantined | Deleted        (non-canonical duplicates only)
//!    └──────sort───────────┴──> Sorted              (Present, Renamed(Ok|Skipped))
//! ```
//!
//! Every transition is keyed by the file's original path. A transition that would
//! leave a terminal state or move a file backwards is rejected with
//! [`Error::InvalidTransition`]. Failed operations leave the state where it was and
//! only record the error message.

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{DocumentContext, DuplicateRole, FileRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenameOutcome {
    /// Renamed on disk, or the rename was simulated in a dry run
    Ok,
    /// The OS refused the rename; the original name is kept
    Failed,
    /// The file already carried its planned name
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    Present,
    Renamed(RenameOutcome),
    Quarantined,
    Deleted,
    Sorted,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Renamed(RenameOutcome::Ok) => "renamed_ok",
            Self::Renamed(RenameOutcome::Failed) => "renamed_failed",
            Self::Renamed(RenameOutcome::Skipped) => "renamed_skipped",
            Self::Quarantined => "quarantined",
            Self::Deleted => "deleted",
            Self::Sorted => "sorted",
        }
    }

    /// No further transition is allowed out of these
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Quarantined | Self::Deleted | Self::Sorted)
    }

    /// Whether physical sorting may still pick the file up
    pub fn is_sortable(&self) -> bool {
        matches!(
            self,
            Self::Present | Self::Renamed(RenameOutcome::Ok) | Self::Renamed(RenameOutcome::Skipped)
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the run learned about one original file
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleEntry {
    pub record: FileRecord,
    pub role: DuplicateRole,
    pub group_id: Option<String>,
    pub rank: Option<usize>,
    pub master: Option<PathBuf>,
    pub context: Option<DocumentContext>,
    pub near_score: Option<f64>,
    pub collision: bool,
    state: LifecycleState,
    rename: Option<RenameOutcome>,
    current_path: PathBuf,
    renamed_to: Option<PathBuf>,
    moved_to: Option<PathBuf>,
    deleted_at: Option<DateTime<Utc>>,
    errors: Vec<String>,
}

impl LifecycleEntry {
    fn new(record: FileRecord) -> Self {
        Self {
            current_path: record.path.clone(),
            record,
            role: DuplicateRole::Unique,
            group_id: None,
            rank: None,
            master: None,
            context: None,
            near_score: None,
            collision: false,
            state: LifecycleState::Present,
            rename: None,
            renamed_to: None,
            moved_to: None,
            deleted_at: None,
            errors: Vec::new(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn rename_outcome(&self) -> Option<RenameOutcome> {
        self.rename
    }

    /// Where the file lives right now (before deletion, the last known location)
    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    /// Name after the rename stage, whether or not it ran
    pub fn renamed_path(&self) -> &Path {
        self.renamed_to.as_deref().unwrap_or(&self.record.path)
    }

    /// Quarantine or sort destination
    pub fn moved_to(&self) -> Option<&Path> {
        self.moved_to.as_deref()
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    /// Final location; `None` once the file has been deleted
    pub fn path_final(&self) -> Option<&Path> {
        match self.state {
            LifecycleState::Deleted => None,
            _ => Some(&self.current_path),
        }
    }

    /// All recorded errors joined into one message, empty when there were none
    pub fn error_message(&self) -> String {
        self.errors.join("; ")
    }

    pub fn has_error(&self) -> bool {
        !self.errors.is_empty()
    }

    fn reject(&self, attempted: &str) -> Error {
        Error::InvalidTransition {
            path: self.record.path.clone(),
            from: self.state.to_string(),
            attempted: attempted.to_string(),
        }
    }
}

/// Folds rename, duplicate resolution and sort outcomes into one record per file
#[derive(Debug, Default)]
pub struct LifecycleTracker {
    entries: Vec<LifecycleEntry>,
    index: HashMap<PathBuf, usize>,
}

impl LifecycleTracker {
    /// Start every record as `Present`
    pub fn new<I: IntoIterator<Item = FileRecord>>(records: I) -> Self {
        let mut tracker = Self::default();
        for record in records {
            if tracker.index.contains_key(&record.path) {
                continue;
            }
            tracker.index.insert(record.path.clone(), tracker.entries.len());
            tracker.entries.push(LifecycleEntry::new(record));
        }
        tracker
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LifecycleEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<LifecycleEntry> {
        self.entries
    }

    pub fn get(&self, path: &Path) -> Option<&LifecycleEntry> {
        self.index.get(path).map(|&idx| &self.entries[idx])
    }

    fn entry_mut(&mut self, path: &Path) -> Result<&mut LifecycleEntry> {
        match self.index.get(path) {
            Some(&idx) => Ok(&mut self.entries[idx]),
            None => Err(Error::FileNotFound(path.to_path_buf())),
        }
    }

    /// Record group membership; rank 1 is the canonical file
    pub fn mark_duplicate(
        &mut self,
        path: &Path,
        group_id: &str,
        rank: usize,
        master: &Path,
    ) -> Result<()> {
        let entry = self.entry_mut(path)?;
        if entry.state != LifecycleState::Present {
            return Err(entry.reject("mark_duplicate"));
        }
        entry.role = if rank == 1 {
            DuplicateRole::Canonical
        } else {
            DuplicateRole::Duplicate
        };
        entry.group_id = Some(group_id.to_string());
        entry.rank = Some(rank);
        entry.master = Some(master.to_path_buf());
        Ok(())
    }

    pub fn set_context(&mut self, path: &Path, context: DocumentContext) -> Result<()> {
        self.entry_mut(path)?.context = Some(context);
        Ok(())
    }

    /// Keep the best near-duplicate score seen for the file
    pub fn note_near_duplicate(&mut self, path: &Path, similarity: f64) -> Result<()> {
        let entry = self.entry_mut(path)?;
        entry.near_score = Some(entry.near_score.map_or(similarity, |s| s.max(similarity)));
        Ok(())
    }

    /// Renamed on disk (or simulated) to `target`
    pub fn record_renamed(&mut self, path: &Path, target: &Path, collision: bool) -> Result<()> {
        let entry = self.rename_candidate(path)?;
        entry.state = LifecycleState::Renamed(RenameOutcome::Ok);
        entry.rename = Some(RenameOutcome::Ok);
        entry.renamed_to = Some(target.to_path_buf());
        entry.current_path = target.to_path_buf();
        entry.collision = collision;
        Ok(())
    }

    /// Already carried the planned name
    pub fn record_rename_skipped(&mut self, path: &Path, collision: bool) -> Result<()> {
        let entry = self.rename_candidate(path)?;
        entry.state = LifecycleState::Renamed(RenameOutcome::Skipped);
        entry.rename = Some(RenameOutcome::Skipped);
        entry.collision = collision;
        Ok(())
    }

    /// The OS rename failed; the original name stays
    pub fn record_rename_failed(
        &mut self,
        path: &Path,
        message: impl Into<String>,
        collision: bool,
    ) -> Result<()> {
        let entry = self.rename_candidate(path)?;
        entry.state = LifecycleState::Renamed(RenameOutcome::Failed);
        entry.rename = Some(RenameOutcome::Failed);
        entry.collision = collision;
        entry.errors.push(format!("rename: {}", message.into()));
        Ok(())
    }

    fn rename_candidate(&mut self, path: &Path) -> Result<&mut LifecycleEntry> {
        let entry = self.entry_mut(path)?;
        if entry.state != LifecycleState::Present || entry.role == DuplicateRole::Duplicate {
            return Err(entry.reject("rename"));
        }
        Ok(entry)
    }

    /// Moved into the quarantine area
    pub fn record_quarantined(&mut self, path: &Path, target: &Path) -> Result<()> {
        let entry = self.duplicate_candidate(path, "quarantine")?;
        entry.state = LifecycleState::Quarantined;
        entry.moved_to = Some(target.to_path_buf());
        entry.current_path = target.to_path_buf();
        Ok(())
    }

    /// Sent to the recoverable trash
    pub fn record_deleted(&mut self, path: &Path, at: DateTime<Utc>) -> Result<()> {
        let entry = self.duplicate_candidate(path, "delete")?;
        entry.state = LifecycleState::Deleted;
        entry.deleted_at = Some(at);
        Ok(())
    }

    fn duplicate_candidate(&mut self, path: &Path, attempted: &str) -> Result<&mut LifecycleEntry> {
        let entry = self.entry_mut(path)?;
        if entry.state != LifecycleState::Present || entry.role != DuplicateRole::Duplicate {
            return Err(entry.reject(attempted));
        }
        Ok(entry)
    }

    /// Moved under the sort root
    pub fn record_sorted(&mut self, path: &Path, target: &Path) -> Result<()> {
        let entry = self.entry_mut(path)?;
        if !entry.state.is_sortable() || entry.role == DuplicateRole::Duplicate {
            return Err(entry.reject("sort"));
        }
        entry.state = LifecycleState::Sorted;
        entry.moved_to = Some(target.to_path_buf());
        entry.current_path = target.to_path_buf();
        Ok(())
    }

    /// A stage failed for this file; its state does not advance
    pub fn record_failure(&mut self, path: &Path, stage: &str, message: impl Into<String>) -> Result<()> {
        let entry = self.entry_mut(path)?;
        let message = message.into();
        error!("{} failed for {}: {}", stage, path.display(), message);
        entry.errors.push(format!("{}: {}", stage, message));
        Ok(())
    }

    /// Original paths of files physical sorting may still move, in path order
    pub fn sortable_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .entries
            .iter()
            .filter(|e| e.state.is_sortable() && e.role != DuplicateRole::Duplicate)
            .map(|e| e.record.path.clone())
            .collect();
        paths.sort();
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn tracker(paths: &[&str]) -> LifecycleTracker {
        let now = SystemTime::now();
        LifecycleTracker::new(paths.iter().map(|p| FileRecord::new(*p, 1, now, now)))
    }

    fn p(path: &str) -> &Path {
        Path::new(path)
    }

    #[test]
    fn test_new_entries_are_present() {
        let t = tracker(&["/d/a.txt", "/d/b.txt"]);
        assert_eq!(t.len(), 2);
        let a = t.get(p("/d/a.txt")).unwrap();
        assert_eq!(a.state(), LifecycleState::Present);
        assert_eq!(a.path_final(), Some(p("/d/a.txt")));
        assert_eq!(a.role, DuplicateRole::Unique);
    }

    #[test]
    fn test_rename_then_sort() {
        let mut t = tracker(&["/d/a.txt"]);
        t.record_renamed(p("/d/a.txt"), p("/d/20241107_memo_a.txt"), false)
            .unwrap();
        assert_eq!(
            t.get(p("/d/a.txt")).unwrap().path_final(),
            Some(p("/d/20241107_memo_a.txt"))
        );

        t.record_sorted(p("/d/a.txt"), p("/d/_sorted/by_type/txt/20241107_memo_a.txt"))
            .unwrap();
        let entry = t.get(p("/d/a.txt")).unwrap();
        assert_eq!(entry.state(), LifecycleState::Sorted);
        assert_eq!(entry.rename_outcome(), Some(RenameOutcome::Ok));
        assert_eq!(entry.renamed_path(), p("/d/20241107_memo_a.txt"));
        assert_eq!(
            entry.path_final(),
            Some(p("/d/_sorted/by_type/txt/20241107_memo_a.txt"))
        );
    }

    #[test]
    fn test_failed_rename_keeps_original_name() {
        let mut t = tracker(&["/d/a.txt"]);
        t.record_rename_failed(p("/d/a.txt"), "Permission denied", false)
            .unwrap();

        let entry = t.get(p("/d/a.txt")).unwrap();
        assert_eq!(entry.state(), LifecycleState::Renamed(RenameOutcome::Failed));
        assert_eq!(entry.path_final(), Some(p("/d/a.txt")));
        assert!(entry.error_message().contains("Permission denied"));
        assert!(!entry.state().is_sortable());
    }

    #[test]
    fn test_duplicates_cannot_be_renamed() {
        let mut t = tracker(&["/d/a.txt", "/d/b.txt"]);
        t.mark_duplicate(p("/d/a.txt"), "dup_1", 1, p("/d/a.txt")).unwrap();
        t.mark_duplicate(p("/d/b.txt"), "dup_1", 2, p("/d/a.txt")).unwrap();

        assert!(matches!(
            t.record_renamed(p("/d/b.txt"), p("/d/x.txt"), false),
            Err(Error::InvalidTransition { .. })
        ));
        assert!(t.record_renamed(p("/d/a.txt"), p("/d/x.txt"), false).is_ok());
    }

    #[test]
    fn test_canonical_cannot_be_quarantined() {
        let mut t = tracker(&["/d/a.txt", "/d/b.txt"]);
        t.mark_duplicate(p("/d/a.txt"), "dup_1", 1, p("/d/a.txt")).unwrap();
        assert!(t.record_quarantined(p("/d/a.txt"), p("/q/a.txt")).is_err());
        assert!(t.record_deleted(p("/d/b.txt"), Utc::now()).is_err());
    }

    #[test]
    fn test_quarantine_and_delete_are_exclusive() {
        let mut t = tracker(&["/d/a.txt", "/d/b.txt"]);
        t.mark_duplicate(p("/d/b.txt"), "dup_1", 2, p("/d/a.txt")).unwrap();
        t.record_quarantined(p("/d/b.txt"), p("/d/_duplicates/dup_1/b_dupV02.txt"))
            .unwrap();
        assert!(t.record_deleted(p("/d/b.txt"), Utc::now()).is_err());

        let entry = t.get(p("/d/b.txt")).unwrap();
        assert_eq!(entry.state(), LifecycleState::Quarantined);
        assert_eq!(
            entry.path_final(),
            Some(p("/d/_duplicates/dup_1/b_dupV02.txt"))
        );
    }

    #[test]
    fn test_deleted_is_terminal() {
        let mut t = tracker(&["/d/a.txt", "/d/b.txt"]);
        t.mark_duplicate(p("/d/b.txt"), "dup_1", 2, p("/d/a.txt")).unwrap();
        t.record_deleted(p("/d/b.txt"), Utc::now()).unwrap();

        let entry = t.get(p("/d/b.txt")).unwrap();
        assert_eq!(entry.path_final(), None);
        assert!(entry.deleted_at().is_some());

        assert!(t.record_sorted(p("/d/b.txt"), p("/d/_sorted/x")).is_err());
        assert!(t.record_quarantined(p("/d/b.txt"), p("/q")).is_err());
        assert!(t
            .mark_duplicate(p("/d/b.txt"), "dup_1", 2, p("/d/a.txt"))
            .is_err());
        assert_eq!(t.get(p("/d/b.txt")).unwrap().state(), LifecycleState::Deleted);
    }

    #[test]
    fn test_sorted_is_terminal() {
        let mut t = tracker(&["/d/a.txt"]);
        t.record_sorted(p("/d/a.txt"), p("/d/_sorted/by_type/txt/a.txt"))
            .unwrap();
        assert!(t.record_sorted(p("/d/a.txt"), p("/elsewhere")).is_err());
        assert!(t.record_renamed(p("/d/a.txt"), p("/d/b.txt"), false).is_err());
        assert_eq!(t.get(p("/d/a.txt")).unwrap().state(), LifecycleState::Sorted);
    }

    #[test]
    fn test_rename_happens_once() {
        let mut t = tracker(&["/d/a.txt"]);
        t.record_rename_skipped(p("/d/a.txt"), false).unwrap();
        assert!(t.record_renamed(p("/d/a.txt"), p("/d/b.txt"), false).is_err());
        assert!(t.get(p("/d/a.txt")).unwrap().state().is_sortable());
    }

    #[test]
    fn test_failure_does_not_advance_state() {
        let mut t = tracker(&["/d/a.txt", "/d/b.txt"]);
        t.mark_duplicate(p("/d/b.txt"), "dup_1", 2, p("/d/a.txt")).unwrap();
        t.record_failure(p("/d/b.txt"), "quarantine", "disk full").unwrap();

        let entry = t.get(p("/d/b.txt")).unwrap();
        assert_eq!(entry.state(), LifecycleState::Present);
        assert_eq!(entry.error_message(), "quarantine: disk full");
        assert!(t.sortable_paths().iter().all(|path| path != p("/d/b.txt")));
    }

    #[test]
    fn test_unknown_path() {
        let mut t = tracker(&["/d/a.txt"]);
        assert!(matches!(
            t.record_renamed(p("/nope"), p("/x"), false),
            Err(Error::FileNotFound(_))
        ));
    }

    #[test]
    fn test_near_score_keeps_maximum() {
        let mut t = tracker(&["/d/a.txt"]);
        t.note_near_duplicate(p("/d/a.txt"), 0.9).unwrap();
        t.note_near_duplicate(p("/d/a.txt"), 0.87).unwrap();
        assert_eq!(t.get(p("/d/a.txt")).unwrap().near_score, Some(0.9));
    }
}
