//! Deterministic short file names and per-directory collision avoidance.

mod builder;
mod planner;

pub use builder::{
    disambiguation_suffix, normalize_extension, sanitize_component, sanitize_date, NameBuilder,
    DEFAULT_MAX_STEM_LEN, LETTER_SUFFIXES, PLACEHOLDER,
};
pub use planner::{
    plans_are_distinct, reserved_names, PlannerOptions, RenamePlan, RenamePlanner,
    DEFAULT_MAX_ATTEMPTS,
};
