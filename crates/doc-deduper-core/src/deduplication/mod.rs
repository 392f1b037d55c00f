//! Duplicate detection: exact groups by content hash, near-duplicates by text
//! fingerprint, and the canonical-file rule applied to exact groups.

mod canonical;
mod identity;
mod near;

pub use canonical::{resolve_group, select_canonical, RankedMember, ResolvedGroup};
pub use identity::{group_by_size, DuplicateGroup, HashFailure, IdentityIndex, IdentityReport};
pub use near::{FingerprintIndex, NearDuplicatePair, DEFAULT_NEAR_THRESHOLD};
