use log::{debug, warn};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::builder::{NameBuilder, DEFAULT_MAX_STEM_LEN, LETTER_SUFFIXES};
use crate::config::Config;
use crate::types::{DocumentContext, FileRecord};

/// Default ceiling on disambiguation attempts for one file
pub const DEFAULT_MAX_ATTEMPTS: usize = 1000;

/// Proposed new name for one file
#[derive(Debug, Clone, Serialize)]
pub struct RenamePlan {
    pub record: FileRecord,
    pub new_name: String,

    /// Set when the letter suffixes ran out or the first candidate tried was taken
    pub collision: bool,

    /// Set when the attempt ceiling was hit; `new_name` may then clash
    pub exhausted: bool,
}

impl RenamePlan {
    /// Where the file ends up after the rename
    pub fn target(&self) -> PathBuf {
        self.record.parent().join(&self.new_name)
    }

    /// The file already carries its planned name
    pub fn is_noop(&self) -> bool {
        self.record.file_name() == self.new_name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerOptions {
    pub max_stem_len: usize,
    pub use_short_date: bool,
    pub max_attempts: usize,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            max_stem_len: DEFAULT_MAX_STEM_LEN,
            use_short_date: false,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl From<&Config> for PlannerOptions {
    fn from(config: &Config) -> Self {
        Self {
            max_stem_len: config.max_stem_len,
            use_short_date: config.use_short_date,
            max_attempts: config.max_name_attempts,
        }
    }
}

/// Names already handed out in one directory.
///
/// Names are compared case-insensitively so plans stay distinct on
/// case-insensitive filesystems too. `next_index` remembers, per base name, where
/// the previous allocation stopped so a long run of same-category files does not
/// rescan the suffixes from `a` every time.
#[derive(Debug, Default)]
struct DirectoryNames {
    used: HashSet<String>,
    next_index: HashMap<String, usize>,
}

/// Result of one allocation
#[derive(Debug)]
struct Allocation {
    name: String,
    index: usize,
    attempts: usize,
    exhausted: bool,
}

/// Assigns every candidate a name that is unique within its directory
pub struct RenamePlanner {
    builder: NameBuilder,
    options: PlannerOptions,
}

impl RenamePlanner {
    pub fn new(options: PlannerOptions) -> Self {
        Self {
            builder: NameBuilder::new(options.max_stem_len),
            options: PlannerOptions {
                max_attempts: options.max_attempts.max(1),
                ..options
            },
        }
    }

    pub fn format_date(&self, context: &DocumentContext) -> String {
        let format = if self.options.use_short_date {
            "%y%m%d"
        } else {
            "%Y%m%d"
        };
        context.date.format(format).to_string()
    }

    /// Plan a name for each candidate.
    ///
    /// Candidates are processed in path order, so the result does not depend on the
    /// order they arrive in. `reserved` lists, per directory, names that must not be
    /// handed out (typically files that stay where they are and are not renamed).
    pub fn plan(
        &self,
        mut candidates: Vec<(FileRecord, DocumentContext)>,
        reserved: &HashMap<PathBuf, HashSet<String>>,
    ) -> Vec<RenamePlan> {
        candidates.sort_by(|a, b| a.0.path.as_os_str().cmp(b.0.path.as_os_str()));

        let mut directories: HashMap<PathBuf, DirectoryNames> = HashMap::new();
        let mut plans = Vec::with_capacity(candidates.len());

        for (record, context) in candidates {
            let parent = record.parent().to_path_buf();
            let names = directories.entry(parent.clone()).or_insert_with(|| {
                seeded_names(reserved.get(&parent).map(|set| set.iter()))
            });

            let allocation = self.allocate(names, &context);
            if allocation.exhausted {
                warn!(
                    "Naming attempts exhausted for {} after {} tries, using {}",
                    record.path.display(),
                    allocation.attempts,
                    allocation.name
                );
            }

            let collision =
                allocation.exhausted || allocation.attempts > 1 || allocation.index >= LETTER_SUFFIXES;
            debug!(
                "Planned {} -> {} (index {}, collision {})",
                record.path.display(),
                allocation.name,
                allocation.index,
                collision
            );

            plans.push(RenamePlan {
                record,
                new_name: allocation.name,
                collision,
                exhausted: allocation.exhausted,
            });
        }

        plans
    }

    fn allocate(&self, names: &mut DirectoryNames, context: &DocumentContext) -> Allocation {
        let date = self.format_date(context);
        let base = self
            .builder
            .build(&date, &context.category, 0, &context.extension)
            .to_lowercase();
        let start = names.next_index.get(&base).copied().unwrap_or(0);

        let mut index = start;
        let mut attempts = 0;
        let (name, exhausted) = loop {
            let candidate = self
                .builder
                .build(&date, &context.category, index, &context.extension);
            attempts += 1;
            if !names.used.contains(&candidate.to_lowercase()) {
                break (candidate, false);
            }
            if attempts >= self.options.max_attempts {
                break (candidate, true);
            }
            index += 1;
        };

        names.used.insert(name.to_lowercase());
        names.next_index.insert(base, index + 1);

        Allocation {
            name,
            index,
            attempts,
            exhausted,
        }
    }
}

fn seeded_names<'a>(reserved: Option<impl Iterator<Item = &'a String>>) -> DirectoryNames {
    let mut names = DirectoryNames::default();
    if let Some(reserved) = reserved {
        names.used.extend(reserved.map(|n| n.to_lowercase()));
    }
    names
}

/// Directory-keyed current names of files that will keep their name
pub fn reserved_names<'a, I>(records: I) -> HashMap<PathBuf, HashSet<String>>
where
    I: IntoIterator<Item = &'a FileRecord>,
{
    let mut reserved: HashMap<PathBuf, HashSet<String>> = HashMap::new();
    for record in records {
        reserved
            .entry(record.parent().to_path_buf())
            .or_default()
            .insert(record.file_name());
    }
    reserved
}

/// True when no two plans share a lowercase name inside one directory
pub fn plans_are_distinct(plans: &[RenamePlan]) -> bool {
    let mut seen: HashSet<(&Path, String)> = HashSet::new();
    plans
        .iter()
        .all(|p| seen.insert((p.record.parent(), p.new_name.to_lowercase())))
}
