//! Core of a document deduplication and renaming tool.
//!
//! The library provides:
//! - File discovery and metadata collection
//! - Exact duplicate detection by content hash and near-duplicate detection by
//!   text fingerprint
//! - Canonical file selection and version ranking
//! - Collision-free short file names under a length budget
//! - A per-file lifecycle covering rename, quarantine, trash and sort
//! - Safe filesystem actions and a JSON inventory of every run

// -- External Dependencies --

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

// -- Internal Modules --
mod error;

// -- Public Re-exports --
pub use config::*;
pub use context::{ContextProvider, MetadataContextProvider};
pub use error::{Error, Result};
pub use lifecycle::{LifecycleEntry, LifecycleState, LifecycleTracker, RenameOutcome};
pub use report::{InventoryRow, RunReport, RunSummary};
pub use types::*;

// -- Public Modules --
pub mod action;
pub mod config;
pub mod context;
pub mod deduplication;
pub mod discovery;
pub mod lifecycle;
pub mod logging;
pub mod naming;
pub mod processing;
pub mod report;
pub mod safety;
pub mod types;

// -- Test Modules --
#[cfg(test)]
pub mod test_utils;

use deduplication::{
    resolve_group, FingerprintIndex, HashFailure, IdentityIndex, NearDuplicatePair, ResolvedGroup,
};
use naming::{reserved_names, PlannerOptions, RenamePlan, RenamePlanner};
use safety::SafetyManager;

/// Main entry point for a deduplication and renaming run
pub struct DocDeduper {
    config: Config,
    shutdown_requested: Arc<AtomicBool>,
}

impl DocDeduper {
    /// Create a new DocDeduper with the provided configuration
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            shutdown_requested: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Flag that stops the run between files once set
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown_requested)
    }

    fn interrupted(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    fn mode(&self) -> RunMode {
        if self.config.dry_run {
            RunMode::DryRun
        } else {
            RunMode::Commit
        }
    }

    /// Discover all files under `root`
    pub fn discover(&self, root: &Path) -> Result<Vec<FileRecord>> {
        discovery::discover_files(root, &self.config)
    }

    /// Run the full pipeline over `root`.
    ///
    /// Per-file failures end up in the report and never abort the run. In a dry run
    /// every stage still executes and records where each file would end up.
    pub fn run(&self, root: &Path, provider: &dyn ContextProvider) -> Result<RunReport> {
        let start = Instant::now();
        let mode = self.mode();
        info!("Starting {} run over {}", mode.as_str(), root.display());

        let records = self.discover(root)?;
        info!("Found {} files", records.len());

        let (records, groups, unreadable) = self.find_exact(records)?;
        let mut tracker = LifecycleTracker::new(records.iter().cloned());

        for group in &groups {
            let master = group.canonical().path.clone();
            for member in &group.members {
                expect_transition(tracker.mark_duplicate(
                    &member.record.path,
                    &group.group_id,
                    member.rank,
                    &master,
                ));
            }
        }

        for record in &records {
            expect_transition(tracker.set_context(&record.path, provider.context(record)));
        }

        let near_pairs = self.find_near(&records, &tracker, provider);
        for pair in &near_pairs {
            expect_transition(tracker.note_near_duplicate(&pair.first.path, pair.similarity));
            expect_transition(tracker.note_near_duplicate(&pair.second.path, pair.similarity));
        }

        let plans = self.plan_renames(&records, &tracker);
        let safety = SafetyManager::new(root, &self.config);

        let mut interrupted = !self.execute_renames(&plans, &mut tracker, &safety);
        if !interrupted {
            interrupted = !self.resolve_duplicates(root, &groups, &mut tracker, &safety);
        }
        if !interrupted {
            if let Some(strategy) = self.config.sort_strategy {
                interrupted = !self.sort_files(root, strategy, &mut tracker, &safety);
            }
        }
        if interrupted {
            warn!("Run interrupted; remaining files were left in place");
        }

        let sort_root = root.join(&self.config.sorted_dir);
        let rows: Vec<InventoryRow> = tracker
            .entries()
            .iter()
            .map(|e| InventoryRow::from_entry(e, mode, self.config.sort_strategy, &sort_root))
            .collect();

        let mut summary = RunSummary::from_entries(mode, tracker.entries());
        summary.duplicate_groups = groups.len();
        summary.duplicate_files = groups.iter().map(|g| g.duplicates().count()).sum();
        summary.near_pairs = near_pairs.len();
        summary.naming_exhausted = plans.iter().filter(|p| p.exhausted).count();
        summary.unreadable = unreadable.len();
        summary.interrupted = interrupted;
        summary.duration_secs = start.elapsed().as_secs_f64();
        summary.duplicate_policy = Some(self.config.duplicate_policy);
        summary.sort_strategy = self.config.sort_strategy.map(|s| s.as_str().to_string());

        if let Some(dir) = &self.config.report_dir {
            report::write_report(dir, &rows, &summary)?;
        }

        info!(
            "Run finished in {:.2}s: {} renamed, {} duplicate groups, {} quarantined, {} deleted, {} sorted",
            summary.duration_secs,
            summary.renamed,
            summary.duplicate_groups,
            summary.quarantined,
            summary.deleted,
            summary.sorted
        );

        Ok(RunReport {
            summary,
            rows,
            groups,
            near_pairs,
            plans,
            unreadable,
        })
    }

    fn progress_bar(&self, message: &'static str) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{eta}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("##-"));
        }
        bar.set_message(message);
        bar
    }

    fn find_exact(
        &self,
        records: Vec<FileRecord>,
    ) -> Result<(Vec<FileRecord>, Vec<ResolvedGroup>, Vec<HashFailure>)> {
        if !self.config.detect_exact {
            return Ok((records, Vec::new(), Vec::new()));
        }

        let index = IdentityIndex::new(self.config.effective_threads())
            .with_progress(self.progress_bar("Hashing files..."));
        let report = index.find_exact_duplicates(records)?;
        let groups = report.groups.iter().map(resolve_group).collect();
        Ok((report.records, groups, report.unreadable))
    }

    /// Near-duplicates among files that survive deduplication
    fn find_near(
        &self,
        records: &[FileRecord],
        tracker: &LifecycleTracker,
        provider: &dyn ContextProvider,
    ) -> Vec<NearDuplicatePair> {
        if !self.config.detect_near {
            return Vec::new();
        }

        let documents: Vec<(FileRecord, String)> = records
            .iter()
            .filter(|r| !is_duplicate(tracker, &r.path))
            .filter_map(|r| provider.text(r).map(|text| (r.clone(), text)))
            .collect();
        debug!("Fingerprinting {} documents", documents.len());

        FingerprintIndex::new(self.config.near_threshold).find_near_duplicates(documents)
    }

    /// Canonical and unique files get a plan; current names of the rest are reserved
    fn plan_renames(&self, records: &[FileRecord], tracker: &LifecycleTracker) -> Vec<RenamePlan> {
        let (duplicates, candidates): (Vec<&FileRecord>, Vec<&FileRecord>) = records
            .iter()
            .partition(|r| is_duplicate(tracker, &r.path));

        let reserved = reserved_names(duplicates.iter().copied());
        let candidates: Vec<(FileRecord, DocumentContext)> = candidates
            .into_iter()
            .filter_map(|r| {
                let context = tracker.get(&r.path)?.context.clone()?;
                Some((r.clone(), context))
            })
            .collect();

        let planner = RenamePlanner::new(PlannerOptions::from(&self.config));
        let plans = planner.plan(candidates, &reserved);
        info!("Planned {} renames", plans.iter().filter(|p| !p.is_noop()).count());
        plans
    }

    /// Returns false when interrupted
    fn execute_renames(
        &self,
        plans: &[RenamePlan],
        tracker: &mut LifecycleTracker,
        safety: &SafetyManager,
    ) -> bool {
        let mut pending: Vec<&RenamePlan> = Vec::new();
        for plan in plans {
            if self.interrupted() {
                return false;
            }
            if plan.is_noop() {
                expect_transition(tracker.record_rename_skipped(&plan.record.path, plan.collision));
            } else if safety.is_dry_run() {
                expect_transition(tracker.record_renamed(
                    &plan.record.path,
                    &plan.target(),
                    plan.collision,
                ));
            } else {
                pending.push(plan);
            }
        }

        // A target may still be held by another file waiting for its own rename.
        // Those are retried until no pass makes progress.
        let mut waiting: HashSet<PathBuf> = pending.iter().map(|p| p.record.path.clone()).collect();
        loop {
            let mut deferred = Vec::new();
            let mut progressed = false;

            for plan in pending {
                if self.interrupted() {
                    return false;
                }
                if waiting.contains(&plan.target()) {
                    deferred.push(plan);
                    continue;
                }

                match action::rename_in_place(&plan.record.path, &plan.new_name) {
                    Ok(target) => {
                        expect_transition(tracker.record_renamed(
                            &plan.record.path,
                            &target,
                            plan.collision,
                        ));
                    }
                    Err(e) => {
                        expect_transition(tracker.record_rename_failed(
                            &plan.record.path,
                            e.to_string(),
                            plan.collision,
                        ));
                    }
                }
                waiting.remove(&plan.record.path);
                progressed = true;
            }

            if deferred.is_empty() {
                return true;
            }
            if !progressed {
                for plan in deferred {
                    expect_transition(tracker.record_rename_failed(
                        &plan.record.path,
                        format!("target {} is held by another file", plan.new_name),
                        plan.collision,
                    ));
                }
                return true;
            }
            pending = deferred;
        }
    }

    /// Quarantine or trash every non-canonical member. Returns false when interrupted.
    fn resolve_duplicates(
        &self,
        root: &Path,
        groups: &[ResolvedGroup],
        tracker: &mut LifecycleTracker,
        safety: &SafetyManager,
    ) -> bool {
        for group in groups {
            for member in group.duplicates() {
                if self.interrupted() {
                    return false;
                }
                let path = &member.record.path;

                let outcome = match self.config.duplicate_policy {
                    DuplicatePolicy::Quarantine => {
                        let target = action::quarantine_target(
                            root,
                            &self.config.quarantine_dir,
                            &group.group_id,
                            path,
                            member.rank,
                        );
                        let moved = if safety.is_dry_run() {
                            Ok(())
                        } else {
                            safety
                                .check_move_target(&target)
                                .and_then(|_| action::relocate(path, &target))
                        };
                        moved.map(|_| tracker.record_quarantined(path, &target))
                    }
                    DuplicatePolicy::Delete => {
                        let trashed = if safety.is_dry_run() {
                            Ok(None)
                        } else {
                            action::send_to_trash(path, self.config.trash_dir.as_deref())
                        };
                        trashed.map(|_| tracker.record_deleted(path, Utc::now()))
                    }
                };

                match outcome {
                    Ok(transition) => expect_transition(transition),
                    Err(e) => expect_transition(tracker.record_failure(
                        path,
                        "duplicate resolution",
                        e.to_string(),
                    )),
                }
            }
        }
        true
    }

    /// Move every sortable file under the sort root. Returns false when interrupted.
    fn sort_files(
        &self,
        root: &Path,
        strategy: SortStrategy,
        tracker: &mut LifecycleTracker,
        safety: &SafetyManager,
    ) -> bool {
        let mut claimed: HashSet<PathBuf> = HashSet::new();

        for original in tracker.sortable_paths() {
            if self.interrupted() {
                return false;
            }
            let (current, context) = match tracker.get(&original) {
                Some(entry) => match &entry.context {
                    Some(context) => (entry.current_path().to_path_buf(), context.clone()),
                    None => continue,
                },
                None => continue,
            };

            let target = action::sort_target(
                root,
                &self.config.sorted_dir,
                strategy,
                &current,
                &context,
                &claimed,
            );
            let moved = if safety.is_dry_run() {
                safety.ensure_within_root(&target)
            } else {
                safety
                    .check_move_target(&target)
                    .and_then(|_| action::relocate(&current, &target))
            };

            match moved {
                Ok(()) => {
                    claimed.insert(target.clone());
                    expect_transition(tracker.record_sorted(&original, &target));
                }
                Err(e) => expect_transition(tracker.record_failure(&original, "sort", e.to_string())),
            }
        }
        true
    }
}

fn is_duplicate(tracker: &LifecycleTracker, path: &Path) -> bool {
    tracker
        .get(path)
        .map(|e| e.role == DuplicateRole::Duplicate)
        .unwrap_or(false)
}

/// The pipeline only requests transitions it has checked; a rejection is a bug
fn expect_transition(result: Result<()>) {
    if let Err(err) = result {
        error!("Lifecycle invariant violated: {}", err);
        debug_assert!(false, "lifecycle invariant violated: {}", err);
    }
}
