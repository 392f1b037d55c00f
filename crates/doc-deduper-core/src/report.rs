use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::config::{DuplicatePolicy, SortStrategy};
use crate::deduplication::{HashFailure, NearDuplicatePair, ResolvedGroup};
use crate::error::Result;
use crate::lifecycle::{LifecycleEntry, LifecycleState, RenameOutcome};
use crate::naming::RenamePlan;
use crate::types::RunMode;

pub const INVENTORY_FILE: &str = "inventory.json";
pub const SUMMARY_FILE: &str = "summary.json";

/// One line of the per-file inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRow {
    pub path_old: PathBuf,
    pub path_new: Option<PathBuf>,
    pub path_final: Option<PathBuf>,
    pub size: u64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub category: Option<String>,
    pub doc_date: Option<NaiveDate>,
    pub content_hash: Option<String>,
    pub duplicate_type: String,
    pub duplicate_group_id: Option<String>,
    pub duplicate_rank: Option<String>,
    pub duplicate_master: Option<PathBuf>,
    pub near_dup_score: Option<f64>,
    pub lifecycle_state: String,
    pub deleted_at: Option<DateTime<Utc>>,
    pub rename_status: String,
    pub error_msg: String,
    pub collision: bool,
    pub sorted: bool,
    pub sort_strategy: Option<String>,
    pub sorted_subfolder: Option<PathBuf>,
    pub mode: String,
}

impl InventoryRow {
    /// Flatten a lifecycle entry. `sort_root` is the absolute sort root, used to
    /// express the sort folder relative to it.
    pub fn from_entry(
        entry: &LifecycleEntry,
        mode: RunMode,
        strategy: Option<SortStrategy>,
        sort_root: &Path,
    ) -> Self {
        let sorted = entry.state() == LifecycleState::Sorted;
        let sorted_subfolder = if sorted {
            entry
                .moved_to()
                .and_then(|p| p.parent())
                .and_then(|p| p.strip_prefix(sort_root).ok())
                .map(Path::to_path_buf)
        } else {
            None
        };

        Self {
            path_old: entry.record.path.clone(),
            path_new: match entry.rename_outcome() {
                Some(RenameOutcome::Ok) => Some(entry.renamed_path().to_path_buf()),
                _ => None,
            },
            path_final: entry.path_final().map(Path::to_path_buf),
            size: entry.record.size,
            created: entry.record.created.into(),
            modified: entry.record.modified.into(),
            category: entry.context.as_ref().map(|c| c.category.clone()),
            doc_date: entry.context.as_ref().map(|c| c.date),
            content_hash: entry.record.content_hash().map(|h| h.to_hex()),
            duplicate_type: entry.role.as_str().to_string(),
            duplicate_group_id: entry.group_id.clone(),
            duplicate_rank: entry.rank.map(|r| format!("V{}", r)),
            duplicate_master: entry.master.clone(),
            near_dup_score: entry.near_score,
            lifecycle_state: entry.state().to_string(),
            deleted_at: entry.deleted_at(),
            rename_status: rename_status(entry.rename_outcome()).to_string(),
            error_msg: entry.error_message(),
            collision: entry.collision,
            sorted,
            sort_strategy: if sorted {
                strategy.map(|s| s.as_str().to_string())
            } else {
                None
            },
            sorted_subfolder,
            mode: mode.as_str().to_string(),
        }
    }
}

fn rename_status(outcome: Option<RenameOutcome>) -> &'static str {
    match outcome {
        Some(RenameOutcome::Ok) => "success",
        Some(RenameOutcome::Failed) => "failed",
        Some(RenameOutcome::Skipped) => "skipped",
        None => "not_planned",
    }
}

/// Totals for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub mode: String,
    pub files_scanned: usize,
    pub renamed: usize,
    pub rename_failed: usize,
    pub rename_skipped: usize,
    pub duplicate_groups: usize,
    pub duplicate_files: usize,
    pub near_pairs: usize,
    pub quarantined: usize,
    pub deleted: usize,
    pub sorted: usize,
    pub collisions: usize,
    pub naming_exhausted: usize,
    pub unreadable: usize,
    pub errors: usize,
    pub interrupted: bool,
    pub duration_secs: f64,
    pub duplicate_policy: Option<DuplicatePolicy>,
    pub sort_strategy: Option<String>,
}

impl RunSummary {
    /// Per-file counts; group, pair and timing fields are left for the caller
    pub fn from_entries(mode: RunMode, entries: &[LifecycleEntry]) -> Self {
        let mut summary = Self {
            mode: mode.as_str().to_string(),
            files_scanned: entries.len(),
            ..Self::default()
        };

        for entry in entries {
            match entry.rename_outcome() {
                Some(RenameOutcome::Ok) => summary.renamed += 1,
                Some(RenameOutcome::Failed) => summary.rename_failed += 1,
                Some(RenameOutcome::Skipped) => summary.rename_skipped += 1,
                None => {}
            }
            match entry.state() {
                LifecycleState::Quarantined => summary.quarantined += 1,
                LifecycleState::Deleted => summary.deleted += 1,
                LifecycleState::Sorted => summary.sorted += 1,
                _ => {}
            }
            if entry.collision {
                summary.collisions += 1;
            }
            if entry.has_error() {
                summary.errors += 1;
            }
        }

        summary
    }
}

/// Everything a run produced, in memory
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,
    pub rows: Vec<InventoryRow>,
    pub groups: Vec<ResolvedGroup>,
    pub near_pairs: Vec<NearDuplicatePair>,
    pub plans: Vec<RenamePlan>,
    pub unreadable: Vec<HashFailure>,
}

impl RunReport {
    pub fn row(&self, original: &Path) -> Option<&InventoryRow> {
        self.rows.iter().find(|r| r.path_old == original)
    }
}

/// Write `inventory.json` and `summary.json` into `dir`
pub fn write_report(dir: &Path, rows: &[InventoryRow], summary: &RunSummary) -> Result<()> {
    fs::create_dir_all(dir)?;

    let inventory = dir.join(INVENTORY_FILE);
    serde_json::to_writer_pretty(BufWriter::new(File::create(&inventory)?), rows)?;

    let totals = dir.join(SUMMARY_FILE);
    serde_json::to_writer_pretty(BufWriter::new(File::create(&totals)?), summary)?;

    info!("Report written to {}", dir.display());
    Ok(())
}
