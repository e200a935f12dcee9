//! Merge Policy Engine - provenance-aware diff between state and pack
//!
//! `plan` is a pure diff: for every slot a pack declares it compares
//! the current managed entry's value hash against both the pack target
//! and the provenance snapshot (the hash the engine itself last wrote
//! there). Anything the user touched is never overwritten: a direct
//! edit plans as SKIP_USER_EDITED, a user-authored entry on the same
//! natural key plans as SKIP_CONFLICT. `apply` turns the plan into log
//! appends, one checkpointed write at a time.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::entry::{Entry, EntryBody, ManagedMark};
use crate::error::PartialApplyError;
use crate::fold::MaterializedBrain;
use crate::ids::{deterministic_id, value_hash};
use crate::pack::ProfilePack;
use crate::store::LogStore;

/// Decision for one semantic slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    /// No entry at the slot and the natural key is free.
    Add,
    /// The slot is already at the target value.
    Noop,
    /// The engine's own value is stale against the pack target.
    Update,
    /// A user-authored entry occupies the natural key.
    SkipConflict,
    /// The user edited the managed entry after the engine wrote it.
    SkipUserEdited,
    /// The pack no longer declares a slot the engine once wrote.
    Deprecate,
}

impl std::fmt::Display for MergeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeAction::Add => write!(f, "add"),
            MergeAction::Noop => write!(f, "noop"),
            MergeAction::Update => write!(f, "update"),
            MergeAction::SkipConflict => write!(f, "skip_conflict"),
            MergeAction::SkipUserEdited => write!(f, "skip_user_edited"),
            MergeAction::Deprecate => write!(f, "deprecate"),
        }
    }
}

/// One planned slot: the decision plus, for write actions, the exact
/// entry `apply` will append.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedItem {
    pub semantic_key: String,
    pub managed_id: String,
    pub action: MergeAction,
    /// Present for Add, Update, and Deprecate; absent for the rest.
    pub entry: Option<Entry>,
}

/// Ordered merge plan for one pack. Item order is the pack's declared
/// order, with deprecations appended at the end.
#[derive(Debug, Clone, PartialEq)]
pub struct MergePlan {
    pub pack_id: String,
    pub pack_version: String,
    pub items: Vec<PlannedItem>,
}

impl MergePlan {
    /// Items that would write to the log.
    pub fn writes(&self) -> impl Iterator<Item = &PlannedItem> {
        self.items.iter().filter(|i| i.entry.is_some())
    }

    /// Whether the plan changes anything at all.
    pub fn is_noop(&self) -> bool {
        self.items
            .iter()
            .all(|i| matches!(i.action, MergeAction::Noop))
    }
}

/// Outcome of a fully applied plan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    pub added: usize,
    pub updated: usize,
    pub deprecated: usize,
    pub noop: usize,
    pub skipped_conflict: usize,
    pub skipped_user_edited: usize,
    /// Semantic keys actually written, in plan order.
    pub committed_keys: Vec<String>,
}

/// Compute the merge plan for a pack against the materialized state.
/// Pure: `now` only stamps the entries a later `apply` would append.
pub fn plan(brain: &MaterializedBrain, pack: &ProfilePack, now: DateTime<Utc>) -> MergePlan {
    let mut items = Vec::with_capacity(pack.items.len());

    for item in &pack.items {
        let managed_id = deterministic_id(&pack.id, &item.semantic_key);
        let target_hash = value_hash(&item.body);

        let planned = match brain.get(&managed_id) {
            None => {
                // The natural key may be occupied by an entry the
                // engine never wrote (or one superseding ours).
                let occupant = item
                    .body
                    .natural_key()
                    .and_then(|(kind, key)| brain.by_natural_key(kind, key))
                    .filter(|e| e.id != managed_id);
                if occupant.is_some() {
                    PlannedItem {
                        semantic_key: item.semantic_key.clone(),
                        managed_id,
                        action: MergeAction::SkipConflict,
                        entry: None,
                    }
                } else {
                    let entry = managed_entry(&managed_id, item.body.clone(), pack, &item.semantic_key, &target_hash, now);
                    PlannedItem {
                        semantic_key: item.semantic_key.clone(),
                        managed_id,
                        action: MergeAction::Add,
                        entry: Some(entry),
                    }
                }
            }
            Some(current) => {
                let current_hash = value_hash(&current.body);
                if current_hash == target_hash {
                    PlannedItem {
                        semantic_key: item.semantic_key.clone(),
                        managed_id,
                        action: MergeAction::Noop,
                        entry: None,
                    }
                } else {
                    // Untouched since the engine wrote it iff the
                    // current value still matches the provenance
                    // snapshot. A missing mark means the user wrote
                    // over the slot directly.
                    let untouched = current
                        .managed
                        .as_ref()
                        .is_some_and(|mark| mark.provenance == current_hash);
                    if untouched {
                        let entry = managed_entry(&managed_id, item.body.clone(), pack, &item.semantic_key, &target_hash, now);
                        PlannedItem {
                            semantic_key: item.semantic_key.clone(),
                            managed_id,
                            action: MergeAction::Update,
                            entry: Some(entry),
                        }
                    } else {
                        PlannedItem {
                            semantic_key: item.semantic_key.clone(),
                            managed_id,
                            action: MergeAction::SkipUserEdited,
                            entry: None,
                        }
                    }
                }
            }
        };
        debug!(key = %planned.semantic_key, action = %planned.action, "planned slot");
        items.push(planned);
    }

    // Slots this pack once wrote but no longer declares get tombstoned.
    for entry in brain.entries() {
        let Some(mark) = &entry.managed else { continue };
        if mark.pack != pack.id || pack.declares(&mark.semantic_key) {
            continue;
        }
        debug!(key = %mark.semantic_key, "planned deprecation");
        items.push(PlannedItem {
            semantic_key: mark.semantic_key.clone(),
            managed_id: entry.id.clone(),
            action: MergeAction::Deprecate,
            entry: Some(Entry::new(
                EntryBody::Tombstone {
                    target: entry.id.clone(),
                    reason: "deprecated".into(),
                },
                now,
            )),
        });
    }

    MergePlan {
        pack_id: pack.id.clone(),
        pack_version: pack.version.clone(),
        items,
    }
}

/// Execute a plan's write actions in plan order, one append per entry.
///
/// The log is append-only so nothing rolls back on failure; instead
/// the error lists exactly which semantic keys were committed and
/// which remain pending. Re-planning after a partial apply shows Noop
/// for the committed keys, so retrying the pending subset is safe.
///
/// A plan with write actions also upserts the `bootstrap.version`
/// meta, written first: until `mark_completed` runs, the lifecycle
/// reads as partial rather than not started.
pub fn apply(store: &LogStore, plan: &MergePlan) -> Result<ApplyReport, PartialApplyError> {
    let mut report = ApplyReport::default();

    let write_keys: Vec<&str> = plan.writes().map(|i| i.semantic_key.as_str()).collect();

    if !write_keys.is_empty() {
        let version_meta = Entry::with_id(
            deterministic_id("meta", crate::bootstrap::META_VERSION),
            EntryBody::Meta {
                key: crate::bootstrap::META_VERSION.into(),
                value: serde_json::Value::String(plan.pack_version.clone()),
            },
            plan.items
                .iter()
                .find_map(|i| i.entry.as_ref())
                .map(|e| e.created)
                .unwrap_or_else(Utc::now),
        );
        if let Err(e) = store.append(&version_meta) {
            return Err(PartialApplyError {
                committed: Vec::new(),
                pending: write_keys.iter().map(|k| k.to_string()).collect(),
                source: e,
            });
        }
    }

    for item in &plan.items {
        match item.action {
            MergeAction::Noop => report.noop += 1,
            MergeAction::SkipConflict => report.skipped_conflict += 1,
            MergeAction::SkipUserEdited => report.skipped_user_edited += 1,
            MergeAction::Add | MergeAction::Update | MergeAction::Deprecate => {
                let entry = item
                    .entry
                    .as_ref()
                    .expect("write action always carries its entry");
                if let Err(e) = store.append(entry) {
                    let committed = report.committed_keys.clone();
                    let pending = write_keys
                        .iter()
                        .filter(|k| !committed.iter().any(|c| c == *k))
                        .map(|k| k.to_string())
                        .collect();
                    return Err(PartialApplyError {
                        committed,
                        pending,
                        source: e,
                    });
                }
                report.committed_keys.push(item.semantic_key.clone());
                match item.action {
                    MergeAction::Add => report.added += 1,
                    MergeAction::Update => report.updated += 1,
                    MergeAction::Deprecate => report.deprecated += 1,
                    _ => unreachable!(),
                }
            }
        }
    }

    info!(
        pack = %plan.pack_id,
        version = %plan.pack_version,
        added = report.added,
        updated = report.updated,
        deprecated = report.deprecated,
        skipped = report.skipped_conflict + report.skipped_user_edited,
        "merge plan applied"
    );
    Ok(report)
}

fn managed_entry(
    managed_id: &str,
    body: EntryBody,
    pack: &ProfilePack,
    semantic_key: &str,
    target_hash: &str,
    now: DateTime<Utc>,
) -> Entry {
    let mut entry = Entry::with_id(managed_id, body, now);
    entry.managed = Some(ManagedMark {
        pack: pack.id.clone(),
        semantic_key: semantic_key.to_string(),
        provenance: target_hash.to_string(),
    });
    entry
}
