use serde::Serialize;
use std::cmp::Ordering;

use super::identity::DuplicateGroup;
use crate::types::{ContentHash, FileRecord};

/// A group member with its version rank; rank 1 is the canonical file
#[derive(Debug, Clone, Serialize)]
pub struct RankedMember {
    pub record: FileRecord,
    pub rank: usize,
}

impl RankedMember {
    /// `V1`, `V2`, ...
    pub fn label(&self) -> String {
        format!("V{}", self.rank)
    }

    pub fn is_canonical(&self) -> bool {
        self.rank == 1
    }
}

/// A duplicate group with its canonical file chosen and the rest ranked
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedGroup {
    pub group_id: String,
    pub hash: ContentHash,
    pub members: Vec<RankedMember>,
}

impl ResolvedGroup {
    pub fn canonical(&self) -> &FileRecord {
        &self.members[0].record
    }

    /// Every member except the canonical one, in rank order
    pub fn duplicates(&self) -> impl Iterator<Item = &RankedMember> {
        self.members.iter().skip(1)
    }
}

/// Earliest modification time wins; ties go to the shorter path, then the
/// lexicographically smaller one.
fn canonical_order(a: &FileRecord, b: &FileRecord) -> Ordering {
    a.modified
        .cmp(&b.modified)
        .then_with(|| a.path.as_os_str().len().cmp(&b.path.as_os_str().len()))
        .then_with(|| a.path.as_os_str().cmp(b.path.as_os_str()))
}

/// Pick the canonical member. Independent of input order.
pub fn select_canonical(files: &[FileRecord]) -> Option<&FileRecord> {
    files.iter().min_by(|a, b| canonical_order(a, b))
}

/// Rank a group: the canonical file is `V1`, the rest follow in path order
pub fn resolve_group(group: &DuplicateGroup) -> ResolvedGroup {
    let canonical = select_canonical(group.files()).map(|c| c.path.clone());

    let mut ordered: Vec<&FileRecord> = group.files().iter().collect();
    ordered.sort_by(|a, b| {
        let a_dup = Some(&a.path) != canonical.as_ref();
        let b_dup = Some(&b.path) != canonical.as_ref();
        a_dup
            .cmp(&b_dup)
            .then_with(|| a.path.as_os_str().cmp(b.path.as_os_str()))
    });

    let members = ordered
        .into_iter()
        .enumerate()
        .map(|(idx, record)| RankedMember {
            record: record.clone(),
            rank: idx + 1,
        })
        .collect();

    ResolvedGroup {
        group_id: group.id().to_string(),
        hash: *group.hash(),
        members,
    }
}
