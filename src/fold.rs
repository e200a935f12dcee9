//! Folder - pure reduction of the log into current state
//!
//! Replays the entry sequence in append order and keeps only the
//! active view: tombstoned ids disappear, re-appended ids take their
//! newest value, and keyed kinds (identity, user) keep exactly one
//! entry per key. No clock reads, no randomness, no I/O: the same
//! sequence always folds to the same snapshot.

use std::collections::HashMap;

use crate::entry::{Entry, EntryBody, EntryKind};

/// The folded, de-duplicated snapshot of the log. Derived, never
/// stored; rebuild it from a fresh read before depending on it again.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterializedBrain {
    entries: Vec<Entry>,
}

impl MaterializedBrain {
    /// All active entries in first-seen append order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Active entries of one kind, preserving append order.
    pub fn of_kind(&self, kind: EntryKind) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(move |e| e.kind() == kind)
    }

    /// Look up an active entry by id.
    pub fn get(&self, id: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Active keyed entry (identity/user) for a natural key.
    pub fn by_natural_key(&self, kind: EntryKind, key: &str) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|e| e.body.natural_key() == Some((kind, key)))
    }

    /// Value of the last active meta entry with the given key.
    pub fn meta_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.entries.iter().rev().find_map(|e| match &e.body {
            EntryBody::Meta { key: k, value } if k == key => Some(value),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fold an ordered entry sequence into the materialized snapshot.
pub fn fold(entries: &[Entry]) -> MaterializedBrain {
    // Slot per first-seen id; a logical update overwrites its slot, a
    // tombstone empties the target's slot. Slot order is append order.
    let mut slots: Vec<Option<Entry>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut keyed: HashMap<(EntryKind, String), String> = HashMap::new();

    for entry in entries {
        match &entry.body {
            EntryBody::Tombstone { target, .. } => {
                if let Some(&slot) = index.get(target) {
                    slots[slot] = None;
                }
            }
            body => {
                if let Some((kind, key)) = body.natural_key() {
                    let prev = keyed.insert((kind, key.to_string()), entry.id.clone());
                    if let Some(prev_id) = prev {
                        if prev_id != entry.id {
                            if let Some(&slot) = index.get(&prev_id) {
                                // The mapping may be stale: a same-id
                                // update can move an entry to another
                                // key. Only evict a slot that still
                                // holds this key.
                                let holds_key = slots[slot]
                                    .as_ref()
                                    .is_some_and(|e| e.body.natural_key() == Some((kind, key)));
                                if holds_key {
                                    slots[slot] = None;
                                }
                            }
                        }
                    }
                }
                match index.get(&entry.id) {
                    Some(&slot) => slots[slot] = Some(entry.clone()),
                    None => {
                        index.insert(entry.id.clone(), slots.len());
                        slots.push(Some(entry.clone()));
                    }
                }
            }
        }
    }

    MaterializedBrain {
        entries: slots.into_iter().flatten().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn identity(id: &str, key: &str, value: &str) -> Entry {
        Entry::with_id(
            id,
            EntryBody::Identity {
                key: key.into(),
                value: value.into(),
            },
            Utc::now(),
        )
    }

    fn learning(id: &str, text: &str) -> Entry {
        Entry::with_id(
            id,
            EntryBody::Learning {
                text: text.into(),
                reinforcement_count: 0,
                last_used: None,
            },
            Utc::now(),
        )
    }

    fn tombstone(target: &str) -> Entry {
        Entry::new(
            EntryBody::Tombstone {
                target: target.into(),
                reason: "removed".into(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_fold_is_deterministic() {
        let log = vec![
            identity("i1", "name", "Mikey"),
            learning("l1", "first"),
            tombstone("l1"),
            learning("l2", "second"),
        ];
        assert_eq!(fold(&log), fold(&log));
    }

    #[test]
    fn test_tombstone_removes_target_only() {
        let log = vec![learning("l1", "gone"), learning("l2", "kept"), tombstone("l1")];
        let brain = fold(&log);
        assert!(brain.get("l1").is_none());
        assert!(brain.get("l2").is_some());
        assert_eq!(brain.len(), 1);
    }

    #[test]
    fn test_tombstone_before_target_is_inert() {
        let log = vec![tombstone("l1"), learning("l1", "alive")];
        let brain = fold(&log);
        assert!(brain.get("l1").is_some());
    }

    #[test]
    fn test_same_id_update_keeps_latest_value() {
        let log = vec![learning("l1", "v1"), learning("l1", "v2")];
        let brain = fold(&log);
        assert_eq!(brain.len(), 1);
        assert_eq!(brain.get("l1").unwrap().body.text(), Some("v2"));
    }

    #[test]
    fn test_keyed_supersession_keeps_last_value_per_key() {
        let log = vec![
            identity("i1", "name", "Mikey"),
            identity("i2", "name", "Ada"),
            identity("i3", "role", "assistant"),
        ];
        let brain = fold(&log);
        assert!(brain.get("i1").is_none());
        let name = brain.by_natural_key(EntryKind::Identity, "name").unwrap();
        assert_eq!(name.id, "i2");
        assert!(brain.by_natural_key(EntryKind::Identity, "role").is_some());
        assert_eq!(brain.of_kind(EntryKind::Identity).count(), 2);
    }

    #[test]
    fn test_rekeyed_entry_survives_later_writer_for_old_key() {
        let log = vec![
            identity("i1", "name", "Mikey"),
            // Same id moves to a different key
            identity("i1", "role", "assistant"),
            // A new occupant of the old key must not evict i1
            identity("i2", "name", "Ada"),
        ];
        let brain = fold(&log);
        assert_eq!(brain.len(), 2);
        let role = brain.by_natural_key(EntryKind::Identity, "role").unwrap();
        assert_eq!(role.id, "i1");
        let name = brain.by_natural_key(EntryKind::Identity, "name").unwrap();
        assert_eq!(name.id, "i2");
    }

    #[test]
    fn test_identity_and_user_keys_are_separate_spaces() {
        let log = vec![
            identity("i1", "name", "Mikey"),
            Entry::with_id(
                "u1",
                EntryBody::User {
                    key: "name".into(),
                    value: "Sam".into(),
                },
                Utc::now(),
            ),
        ];
        let brain = fold(&log);
        assert_eq!(brain.len(), 2);
    }

    #[test]
    fn test_disjoint_reorder_has_same_result() {
        let a = vec![learning("l1", "one"), identity("i1", "name", "Mikey")];
        let b = vec![identity("i1", "name", "Mikey"), learning("l1", "one")];
        let fa = fold(&a);
        let fb = fold(&b);
        // Same active set, independent of relative order of unrelated entries
        assert_eq!(fa.len(), fb.len());
        assert_eq!(
            fa.get("l1").map(|e| &e.body),
            fb.get("l1").map(|e| &e.body)
        );
        assert_eq!(
            fa.get("i1").map(|e| &e.body),
            fb.get("i1").map(|e| &e.body)
        );
    }

    #[test]
    fn test_meta_value_takes_last_active() {
        let log = vec![
            Entry::with_id(
                "m1",
                EntryBody::Meta {
                    key: "bootstrap.version".into(),
                    value: "v1".into(),
                },
                Utc::now(),
            ),
            Entry::with_id(
                "m1",
                EntryBody::Meta {
                    key: "bootstrap.version".into(),
                    value: "v2".into(),
                },
                Utc::now(),
            ),
        ];
        let brain = fold(&log);
        assert_eq!(brain.meta_value("bootstrap.version").unwrap(), "v2");
        assert!(brain.meta_value("missing").is_none());
    }
}
