//! Decay Engine - tombstones stale, unreinforced learnings
//!
//! A learning decays only when it is still active, scores below the
//! threshold, and has gone unused past the cutoff. All other kinds are
//! permanently exempt. Repeated runs converge: a tombstoned learning
//! is no longer active, so it is never a candidate twice.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::entry::{Entry, EntryBody, EntryKind};
use crate::fold::MaterializedBrain;
use crate::rank::score_entry;

/// Days a learning may go unused before it is considered for decay.
pub const DEFAULT_AFTER_DAYS: f64 = 90.0;

/// Score below which an unused learning decays.
pub const DEFAULT_MIN_SCORE: f64 = 3.0;

/// Compute the tombstones a decay pass would append. Pure: the caller
/// appends them through the log store, one at a time.
pub fn decay_candidates(
    brain: &MaterializedBrain,
    now: DateTime<Utc>,
    after_days: f64,
    min_score: f64,
) -> Vec<Entry> {
    let mut tombstones = Vec::new();

    for entry in brain.of_kind(EntryKind::Learning) {
        let last_used = match &entry.body {
            EntryBody::Learning { last_used, .. } => last_used.unwrap_or(entry.created),
            _ => continue,
        };
        let unused_days = (now - last_used).num_milliseconds() as f64 / 86_400_000.0;
        if unused_days <= after_days {
            continue;
        }
        let score = match score_entry(entry, now) {
            Some(s) => s,
            None => continue,
        };
        if score >= min_score {
            continue;
        }
        debug!(id = %entry.id, score, unused_days, "learning decayed");
        tombstones.push(Entry::new(
            EntryBody::Tombstone {
                target: entry.id.clone(),
                reason: "decayed".into(),
            },
            now,
        ));
    }

    tombstones
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fold::fold;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        "2026-08-29T00:00:00Z".parse().unwrap()
    }

    fn stale_learning(id: &str, days_ago: i64, reinforced: u32) -> Entry {
        let t = now() - Duration::days(days_ago);
        Entry::with_id(
            id,
            EntryBody::Learning {
                text: format!("learning {}", id),
                reinforcement_count: reinforced,
                last_used: Some(t),
            },
            t,
        )
    }

    #[test]
    fn test_stale_low_score_learning_decays() {
        // 100 days unused and unreinforced: score is the age bonus
        // alone, 100/30 = 3.33
        let brain = fold(&[stale_learning("l1", 100, 0)]);
        let tombs = decay_candidates(&brain, now(), 90.0, 4.0);
        assert_eq!(tombs.len(), 1);
        match &tombs[0].body {
            EntryBody::Tombstone { target, reason } => {
                assert_eq!(target, "l1");
                assert_eq!(reason, "decayed");
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn test_recent_or_reinforced_learnings_survive() {
        let recent = stale_learning("recent", 10, 0);
        let reinforced = stale_learning("reinforced", 120, 8);
        let brain = fold(&[recent, reinforced]);
        assert!(decay_candidates(&brain, now(), DEFAULT_AFTER_DAYS, DEFAULT_MIN_SCORE).is_empty());
    }

    #[test]
    fn test_exempt_kinds_never_decay() {
        let old = now() - Duration::days(1000);
        let log = vec![
            Entry::with_id(
                "p1",
                EntryBody::Preference {
                    text: "dark mode".into(),
                },
                old,
            ),
            Entry::with_id(
                "i1",
                EntryBody::Identity {
                    key: "name".into(),
                    value: "Mikey".into(),
                },
                old,
            ),
            Entry::with_id(
                "t1",
                EntryBody::Task {
                    text: "ship it".into(),
                },
                old,
            ),
        ];
        let brain = fold(&log);
        assert!(decay_candidates(&brain, now(), DEFAULT_AFTER_DAYS, DEFAULT_MIN_SCORE).is_empty());
    }

    #[test]
    fn test_decay_is_idempotent() {
        // 200 days out the age bonus is capped at 5.0
        let mut log = vec![stale_learning("l1", 200, 0)];
        let first = decay_candidates(&fold(&log), now(), 90.0, 6.0);
        assert_eq!(first.len(), 1);

        log.extend(first);
        let second = decay_candidates(&fold(&log), now(), 90.0, 6.0);
        assert!(second.is_empty());
    }
}
