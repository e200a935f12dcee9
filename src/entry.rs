//! Entry model - the immutable records that make up the brain log
//!
//! Every record in the log is an `Entry`: an opaque id, a creation
//! timestamp, and a closed tagged union of type-specific fields.
//! Entries are never mutated in place: a logical update is a new entry
//! with the same id, a logical delete is a `tombstone` pointing at the
//! target id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of entry kinds. Adding a kind forces every `match` in the
/// fold, validation, and merge paths to be updated at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Identity,
    User,
    Behavior,
    Learning,
    Preference,
    Context,
    Task,
    Reminder,
    Tombstone,
    Meta,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Identity => write!(f, "identity"),
            EntryKind::User => write!(f, "user"),
            EntryKind::Behavior => write!(f, "behavior"),
            EntryKind::Learning => write!(f, "learning"),
            EntryKind::Preference => write!(f, "preference"),
            EntryKind::Context => write!(f, "context"),
            EntryKind::Task => write!(f, "task"),
            EntryKind::Reminder => write!(f, "reminder"),
            EntryKind::Tombstone => write!(f, "tombstone"),
            EntryKind::Meta => write!(f, "meta"),
        }
    }
}

/// Type-specific payload of an entry. Serialized with the `type` tag
/// inline so each log line reads as one flat-ish JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EntryBody {
    /// A fact about the agent itself (keyed, e.g. `name`).
    Identity { key: String, value: String },
    /// A fact about the user (keyed, e.g. `timezone`).
    User { key: String, value: String },
    /// A standing behavioral directive.
    Behavior { text: String },
    /// A learned insight; earns score through reinforcement.
    Learning {
        text: String,
        #[serde(default)]
        reinforcement_count: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_used: Option<DateTime<Utc>>,
    },
    /// A user preference.
    Preference { text: String },
    /// Ambient context worth carrying across sessions.
    Context { text: String },
    /// An open task.
    Task { text: String },
    /// A reminder.
    Reminder { text: String },
    /// Logical delete of the entry with id `target`.
    Tombstone { target: String, reason: String },
    /// Internal bookkeeping (bootstrap lifecycle, migration markers).
    Meta { key: String, value: Value },
}

impl EntryBody {
    /// The kind tag for this body.
    pub fn kind(&self) -> EntryKind {
        match self {
            EntryBody::Identity { .. } => EntryKind::Identity,
            EntryBody::User { .. } => EntryKind::User,
            EntryBody::Behavior { .. } => EntryKind::Behavior,
            EntryBody::Learning { .. } => EntryKind::Learning,
            EntryBody::Preference { .. } => EntryKind::Preference,
            EntryBody::Context { .. } => EntryKind::Context,
            EntryBody::Task { .. } => EntryKind::Task,
            EntryBody::Reminder { .. } => EntryKind::Reminder,
            EntryBody::Tombstone { .. } => EntryKind::Tombstone,
            EntryBody::Meta { .. } => EntryKind::Meta,
        }
    }

    /// Natural key for keyed kinds (identity, user). A later entry with
    /// the same natural key supersedes the earlier one in the fold.
    pub fn natural_key(&self) -> Option<(EntryKind, &str)> {
        match self {
            EntryBody::Identity { key, .. } => Some((EntryKind::Identity, key)),
            EntryBody::User { key, .. } => Some((EntryKind::User, key)),
            EntryBody::Behavior { .. }
            | EntryBody::Learning { .. }
            | EntryBody::Preference { .. }
            | EntryBody::Context { .. }
            | EntryBody::Task { .. }
            | EntryBody::Reminder { .. }
            | EntryBody::Tombstone { .. }
            | EntryBody::Meta { .. } => None,
        }
    }

    /// The free text of the body, where it has one.
    pub fn text(&self) -> Option<&str> {
        match self {
            EntryBody::Behavior { text }
            | EntryBody::Learning { text, .. }
            | EntryBody::Preference { text }
            | EntryBody::Context { text }
            | EntryBody::Task { text }
            | EntryBody::Reminder { text } => Some(text),
            EntryBody::Identity { .. }
            | EntryBody::User { .. }
            | EntryBody::Tombstone { .. }
            | EntryBody::Meta { .. } => None,
        }
    }

    /// Validate type-specific required fields.
    pub fn validate(&self) -> Result<(), String> {
        let require = |field: &str, value: &str| -> Result<(), String> {
            if value.trim().is_empty() {
                Err(format!("{} entry requires non-empty '{}'", self.kind(), field))
            } else {
                Ok(())
            }
        };

        match self {
            EntryBody::Identity { key, value } | EntryBody::User { key, value } => {
                require("key", key)?;
                require("value", value)
            }
            EntryBody::Behavior { text }
            | EntryBody::Learning { text, .. }
            | EntryBody::Preference { text }
            | EntryBody::Context { text }
            | EntryBody::Task { text }
            | EntryBody::Reminder { text } => require("text", text),
            EntryBody::Tombstone { target, reason } => {
                require("target", target)?;
                require("reason", reason)
            }
            EntryBody::Meta { key, value } => {
                require("key", key)?;
                if value.is_null() {
                    Err("meta entry requires non-null 'value'".to_string())
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Provenance mark carried by entries the merge engine wrote from a
/// profile pack. `provenance` is the value hash of the body the engine
/// itself last wrote for this slot; a later mismatch between the
/// entry's current value hash and `provenance` means the user edited
/// the entry directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedMark {
    /// Id of the profile pack that owns this slot.
    pub pack: String,
    /// Semantic key within the pack (e.g. `identity.name`).
    pub semantic_key: String,
    /// Hex hash of the body value the engine last wrote here.
    pub provenance: String,
}

/// One immutable log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Opaque identifier. Shared across entries that logically update
    /// the same record.
    pub id: String,
    /// Creation timestamp. Advisory only: fold order is append order,
    /// never `created` (clock skew across writers is expected).
    pub created: DateTime<Utc>,
    #[serde(flatten)]
    pub body: EntryBody,
    /// Present only on entries generated by the merge engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed: Option<ManagedMark>,
}

impl Entry {
    /// Build a freshly authored entry with a random id.
    pub fn new(body: EntryBody, created: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created,
            body,
            managed: None,
        }
    }

    /// Build an entry with a caller-chosen id (logical updates and
    /// deterministic slots).
    pub fn with_id(id: impl Into<String>, body: EntryBody, created: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            created,
            body,
            managed: None,
        }
    }

    pub fn kind(&self) -> EntryKind {
        self.body.kind()
    }

    /// Validate the whole record: required common fields plus the
    /// body's type-specific fields.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("entry requires non-empty 'id'".to_string());
        }
        if let Some(mark) = &self.managed {
            if mark.pack.trim().is_empty()
                || mark.semantic_key.trim().is_empty()
                || mark.provenance.trim().is_empty()
            {
                return Err("managed mark requires pack, semantic_key, and provenance".to_string());
            }
        }
        self.body.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> DateTime<Utc> {
        "2026-08-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_kind_display_matches_wire_tag() {
        let entry = Entry::new(
            EntryBody::Identity {
                key: "name".into(),
                value: "Mikey".into(),
            },
            ts(),
        );
        let line = serde_json::to_string(&entry).unwrap();
        assert!(line.contains("\"type\":\"identity\""));
        assert_eq!(entry.kind().to_string(), "identity");
    }

    #[test]
    fn test_round_trip_learning() {
        let entry = Entry::new(
            EntryBody::Learning {
                text: "prefers short answers".into(),
                reinforcement_count: 3,
                last_used: Some(ts()),
            },
            ts(),
        );
        let line = serde_json::to_string(&entry).unwrap();
        let back: Entry = serde_json::from_str(&line).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_learning_defaults_on_read() {
        let line = r#"{"id":"a1","created":"2026-08-01T12:00:00Z","type":"learning","text":"x"}"#;
        let entry: Entry = serde_json::from_str(line).unwrap();
        match entry.body {
            EntryBody::Learning {
                reinforcement_count,
                last_used,
                ..
            } => {
                assert_eq!(reinforcement_count, 0);
                assert!(last_used.is_none());
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        let entry = Entry::new(
            EntryBody::Identity {
                key: "".into(),
                value: "Mikey".into(),
            },
            ts(),
        );
        assert!(entry.validate().is_err());

        let mut entry = Entry::new(
            EntryBody::Behavior {
                text: "be concise".into(),
            },
            ts(),
        );
        entry.id = " ".into();
        assert!(entry.validate().is_err());
    }

    #[test]
    fn test_natural_key_only_for_keyed_kinds() {
        let identity = EntryBody::Identity {
            key: "name".into(),
            value: "Mikey".into(),
        };
        assert_eq!(identity.natural_key(), Some((EntryKind::Identity, "name")));

        let behavior = EntryBody::Behavior {
            text: "be concise".into(),
        };
        assert!(behavior.natural_key().is_none());
    }

    #[test]
    fn test_managed_mark_round_trip() {
        let mut entry = Entry::new(
            EntryBody::User {
                key: "timezone".into(),
                value: "UTC".into(),
            },
            ts(),
        );
        entry.managed = Some(ManagedMark {
            pack: "core-v1".into(),
            semantic_key: "user.timezone".into(),
            provenance: "abc123".into(),
        });
        let line = serde_json::to_string(&entry).unwrap();
        let back: Entry = serde_json::from_str(&line).unwrap();
        assert_eq!(back.managed, entry.managed);

        // Absent mark stays absent on the wire
        let plain = Entry::new(
            EntryBody::Context {
                text: "working on the parser".into(),
            },
            ts(),
        );
        assert!(!serde_json::to_string(&plain).unwrap().contains("managed"));
    }
}
