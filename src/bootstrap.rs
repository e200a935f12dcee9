//! Bootstrap State - lifecycle status derived from meta entries
//!
//! Whether the default profile pack has ever been applied is never
//! stored as its own object: it is derived from three meta keys every
//! time it is asked for. Completion writes deterministic meta upserts,
//! so marking the same version twice is a logical no-op.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::entry::{Entry, EntryBody};
use crate::fold::MaterializedBrain;
use crate::ids::deterministic_id;

pub const META_COMPLETED: &str = "bootstrap.completed";
pub const META_VERSION: &str = "bootstrap.version";
pub const META_COMPLETED_AT: &str = "bootstrap.completedAt";

/// Lifecycle status of the bootstrap subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStatus {
    NotStarted,
    Partial,
    Completed,
}

impl std::fmt::Display for BootstrapStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BootstrapStatus::NotStarted => write!(f, "not_started"),
            BootstrapStatus::Partial => write!(f, "partial"),
            BootstrapStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Derived bootstrap state. Version and timestamp are set only when
/// the status is `Completed`.
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapState {
    pub status: BootstrapStatus,
    pub version: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Derive the bootstrap state from the materialized meta entries.
///
/// Completed requires the full triple to validate: `completed == true`,
/// a non-empty version string, and a parseable RFC 3339 timestamp.
/// Anything short of that with at least one key present is `Partial`.
pub fn state(brain: &MaterializedBrain) -> BootstrapState {
    let completed = brain.meta_value(META_COMPLETED);
    let version = brain.meta_value(META_VERSION);
    let completed_at = brain.meta_value(META_COMPLETED_AT);

    let version_str = version.and_then(Value::as_str).filter(|v| !v.trim().is_empty());
    let completed_at_ts = completed_at
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<DateTime<Utc>>().ok());

    if completed == Some(&Value::Bool(true)) {
        if let (Some(v), Some(at)) = (version_str, completed_at_ts) {
            return BootstrapState {
                status: BootstrapStatus::Completed,
                version: Some(v.to_string()),
                completed_at: Some(at),
            };
        }
    }

    if completed.is_some() || version.is_some() || completed_at.is_some() {
        BootstrapState {
            status: BootstrapStatus::Partial,
            version: None,
            completed_at: None,
        }
    } else {
        BootstrapState {
            status: BootstrapStatus::NotStarted,
            version: None,
            completed_at: None,
        }
    }
}

/// The three meta upserts that mark bootstrap as completed. Each id is
/// derived from its meta key, so replaying the entries only adds
/// physical lines; the folded state is unchanged.
pub fn completion_entries(version: &str, now: DateTime<Utc>) -> Vec<Entry> {
    let meta = |key: &str, value: Value| {
        Entry::with_id(
            deterministic_id("meta", key),
            EntryBody::Meta {
                key: key.to_string(),
                value,
            },
            now,
        )
    };

    vec![
        meta(META_COMPLETED, Value::Bool(true)),
        meta(META_VERSION, Value::String(version.to_string())),
        meta(META_COMPLETED_AT, Value::String(now.to_rfc3339())),
    ]
}
