//! Migration Engine - one-time import of the legacy multi-file format
//!
//! Older installs kept per-type files of loose JSON records. `run`
//! converts them into unified entries, skipping anything already
//! present in the log, and leaves a meta marker behind so the import
//! never happens twice. Legacy files are read-only to this engine.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::entry::{Entry, EntryBody};
use crate::ids::deterministic_id;
use crate::store::LogStore;

/// Meta key marking a completed legacy import.
pub const MARKER_KEY: &str = "migration.legacy_files";

/// What `detect` found.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationStatus {
    /// Legacy files that exist on disk.
    pub legacy_files: Vec<PathBuf>,
    /// Whether the import marker is already in the log.
    pub marker_done: bool,
}

impl MigrationStatus {
    /// Whether a `run` would do any work.
    pub fn needed(&self) -> bool {
        !self.legacy_files.is_empty() && !self.marker_done
    }
}

/// Outcome of a migration run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationStats {
    /// Legacy files processed.
    pub files: usize,
    /// Entries appended to the unified log.
    pub imported: usize,
    /// Records skipped as duplicates of existing entries.
    pub duplicates: usize,
    /// Records that could not be converted.
    pub malformed: usize,
}

/// A record in the legacy format: one object, many optional fields.
#[derive(Debug, Deserialize)]
struct LegacyRecord {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    created: Option<String>,
}

/// Report whether legacy files exist and whether the import already ran.
pub fn detect(paths: &[PathBuf], log: &[Entry]) -> MigrationStatus {
    MigrationStatus {
        legacy_files: paths.iter().filter(|p| p.exists()).cloned().collect(),
        marker_done: marker_present(log),
    }
}

/// Import every legacy file into the unified log, then append the
/// marker. Idempotent: the marker short-circuits a second run, and the
/// per-record duplicate check skips anything a partial first run
/// already wrote.
pub fn run(store: &LogStore, paths: &[PathBuf], now: DateTime<Utc>) -> Result<MigrationStats> {
    let log = store
        .read_all()
        .context("Failed to read unified log before migration")?
        .entries;

    if marker_present(&log) {
        debug!("migration marker present, nothing to import");
        return Ok(MigrationStats::default());
    }

    // Duplicate detection is against the raw log: a tombstoned learning
    // still blocks re-import of the same text.
    let mut known_ids: HashSet<String> = log.iter().map(|e| e.id.clone()).collect();
    let mut known_learning_texts: HashSet<String> = log
        .iter()
        .filter_map(|e| match &e.body {
            EntryBody::Learning { text, .. } => Some(normalize(text)),
            _ => None,
        })
        .collect();

    let mut stats = MigrationStats::default();
    for path in paths {
        if !path.exists() {
            continue;
        }
        stats.files += 1;
        let records = read_legacy_file(path)
            .with_context(|| format!("Failed to read legacy file {}", path.display()))?;

        for record in records {
            let entry = match convert(record, now) {
                Some(entry) => entry,
                None => {
                    stats.malformed += 1;
                    continue;
                }
            };

            let duplicate = match &entry.body {
                EntryBody::Learning { text, .. } => !known_learning_texts.insert(normalize(text)),
                _ => known_ids.contains(&entry.id),
            };
            if duplicate {
                debug!(id = %entry.id, "skipping duplicate legacy record");
                stats.duplicates += 1;
                continue;
            }

            store
                .append(&entry)
                .with_context(|| format!("Failed to import legacy record {}", entry.id))?;
            known_ids.insert(entry.id.clone());
            stats.imported += 1;
        }
    }

    let marker = Entry::with_id(
        deterministic_id("meta", MARKER_KEY),
        EntryBody::Meta {
            key: MARKER_KEY.into(),
            value: Value::String("done".into()),
        },
        now,
    );
    store.append(&marker).context("Failed to append migration marker")?;

    info!(
        files = stats.files,
        imported = stats.imported,
        duplicates = stats.duplicates,
        malformed = stats.malformed,
        "legacy migration complete"
    );
    Ok(stats)
}

fn marker_present(log: &[Entry]) -> bool {
    log.iter().any(|e| {
        matches!(&e.body, EntryBody::Meta { key, value } if key == MARKER_KEY && value.as_str() == Some("done"))
    })
}

/// Parse a legacy file as a JSON array or, failing that, as NDJSON.
fn read_legacy_file(path: &Path) -> Result<Vec<LegacyRecord>> {
    let content = std::fs::read_to_string(path)?;

    if let Ok(values) = serde_json::from_str::<Vec<Value>>(&content) {
        return Ok(values
            .into_iter()
            .filter_map(|v| decode_record(v, path))
            .collect());
    }

    let mut records = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(v) => {
                if let Some(record) = decode_record(v, path) {
                    records.push(record);
                }
            }
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unparseable legacy line"),
        }
    }
    Ok(records)
}

fn decode_record(value: Value, path: &Path) -> Option<LegacyRecord> {
    match serde_json::from_value::<LegacyRecord>(value) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping unrecognized legacy record");
            None
        }
    }
}

/// Convert a legacy record to the unified schema.
fn convert(record: LegacyRecord, now: DateTime<Utc>) -> Option<Entry> {
    let keyed = |key: &Option<String>, value: &Option<Value>| -> Option<(String, String)> {
        let key = key.clone()?;
        let value = match value.clone()? {
            Value::String(s) => s,
            other => other.to_string(),
        };
        Some((key, value))
    };

    let body = match record.kind.as_str() {
        "identity" => {
            let (key, value) = keyed(&record.key, &record.value)?;
            EntryBody::Identity { key, value }
        }
        "user" => {
            let (key, value) = keyed(&record.key, &record.value)?;
            EntryBody::User { key, value }
        }
        "behavior" => EntryBody::Behavior { text: record.text? },
        "learning" => EntryBody::Learning {
            text: record.text?,
            reinforcement_count: 0,
            last_used: None,
        },
        "preference" => EntryBody::Preference { text: record.text? },
        "context" => EntryBody::Context { text: record.text? },
        "task" => EntryBody::Task { text: record.text? },
        "reminder" => EntryBody::Reminder { text: record.text? },
        other => {
            debug!(kind = other, "legacy record kind has no unified counterpart");
            return None;
        }
    };

    let created = record
        .created
        .as_deref()
        .and_then(|s| s.parse::<DateTime<Utc>>().ok())
        .unwrap_or(now);

    let entry = match record.id {
        Some(id) if !id.trim().is_empty() => Entry::with_id(id, body, created),
        _ => Entry::new(body, created),
    };
    entry.validate().ok()?;
    Some(entry)
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}
