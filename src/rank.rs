//! Ranker - scores learnings and selects them under a token budget
//!
//! Reinforced, recently used learnings outrank stale ones; a small age
//! bonus keeps long-lived learnings from vanishing entirely. The same
//! score drives both prompt selection and the decay engine.

use chrono::{DateTime, Utc};

use crate::entry::{Entry, EntryBody};

const MS_PER_DAY: f64 = 86_400_000.0;

/// Score a learning from its raw fields:
/// `2 * reinforcement_count + max(0, 30 - days_since_last_use) * 0.5
///  + min(5, days_since_created / 30)`.
/// A learning that was never used scores as if last used at creation.
pub fn learning_score(
    reinforcement_count: u32,
    created: DateTime<Utc>,
    last_used: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> f64 {
    let days_since_created = days_between(created, now);
    let days_since_last_use = days_between(last_used.unwrap_or(created), now);

    2.0 * f64::from(reinforcement_count)
        + (30.0 - days_since_last_use).max(0.0) * 0.5
        + (days_since_created / 30.0).min(5.0)
}

/// Score an entry if it is a learning.
pub fn score_entry(entry: &Entry, now: DateTime<Utc>) -> Option<f64> {
    match entry.body {
        EntryBody::Learning {
            reinforcement_count,
            last_used,
            ..
        } => Some(learning_score(
            reinforcement_count,
            entry.created,
            last_used,
            now,
        )),
        _ => None,
    }
}

/// Rough token cost of a text (four characters per token).
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / 4
}

/// Select learnings for prompt inclusion: best score first, ties broken
/// by earliest `created` then id, accepted greedily while the running
/// token cost stays within budget. Selection stops at the first
/// learning that would exceed the budget.
pub fn select_learnings<'a>(
    learnings: impl IntoIterator<Item = &'a Entry>,
    now: DateTime<Utc>,
    budget_tokens: usize,
) -> Vec<&'a Entry> {
    let mut scored: Vec<(f64, &Entry)> = learnings
        .into_iter()
        .filter_map(|e| score_entry(e, now).map(|s| (s, e)))
        .collect();

    scored.sort_by(|(sa, ea), (sb, eb)| {
        sb.partial_cmp(sa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| ea.created.cmp(&eb.created))
            .then_with(|| ea.id.cmp(&eb.id))
    });

    let mut selected = Vec::new();
    let mut used = 0usize;
    for (_, entry) in scored {
        let cost = estimate_tokens(entry.body.text().unwrap_or_default());
        if used + cost > budget_tokens {
            break;
        }
        used += cost;
        selected.push(entry);
    }
    selected
}

fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    // Full nanosecond precision: millisecond truncation made score ties
    // (and thus selection order) depend on the sub-millisecond phase of
    // `now`, breaking prompt stability for a fixed log.
    let delta = to - from;
    match delta.num_nanoseconds() {
        Some(ns) => ns as f64 / (MS_PER_DAY * 1_000_000.0),
        None => delta.num_milliseconds() as f64 / MS_PER_DAY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(now: DateTime<Utc>, days_ago: i64) -> DateTime<Utc> {
        now - Duration::days(days_ago)
    }

    fn learning(id: &str, text: &str, reinforced: u32, created: DateTime<Utc>) -> Entry {
        Entry::with_id(
            id,
            EntryBody::Learning {
                text: text.into(),
                reinforcement_count: reinforced,
                last_used: None,
            },
            created,
        )
    }

    fn now() -> DateTime<Utc> {
        "2026-08-29T00:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_score_formula_exact_values() {
        let now = now();
        // Fresh, unreinforced: recency term only
        assert_eq!(learning_score(0, now, None, now), 15.0);
        // Reinforcement dominates
        assert_eq!(learning_score(4, now, Some(now), now), 8.0 + 15.0);
        // 30+ days unused: recency term gone; age bonus 1.0 at 30 days
        let old = at(now, 30);
        assert_eq!(learning_score(0, old, Some(old), now), 1.0);
        // Age bonus caps at 5
        let ancient = at(now, 3650);
        let score = learning_score(0, ancient, Some(ancient), now);
        assert_eq!(score, 5.0);
    }

    #[test]
    fn test_never_used_scores_from_created() {
        let now = now();
        let created = at(now, 10);
        assert_eq!(
            learning_score(1, created, None, now),
            learning_score(1, created, Some(created), now)
        );
    }

    #[test]
    fn test_selection_orders_by_score_then_created() {
        let now = now();
        let strong = learning("a", "strong one", 5, at(now, 1));
        let older = learning("b", "older twin", 1, at(now, 2));
        let newer = learning("c", "newer twin", 1, at(now, 2));

        let picked = select_learnings([&newer, &strong, &older], now, 1000);
        assert_eq!(
            picked.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn test_selection_is_deterministic() {
        let now = now();
        let entries: Vec<Entry> = (0..20u32)
            .map(|i| learning(&format!("l{}", i), "same text either way", i % 3, at(now, i64::from(i))))
            .collect();
        let first: Vec<&str> = select_learnings(&entries, now, 40)
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        let second: Vec<&str> = select_learnings(&entries, now, 40)
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_budget_stops_at_first_overflow() {
        let now = now();
        // 40 chars => 10 tokens each
        let text = "x".repeat(40);
        let a = learning("a", &text, 9, at(now, 0));
        let b = learning("b", &text, 5, at(now, 0));
        let c = learning("c", &text, 1, at(now, 0));

        // Budget fits two; the third would exceed and stops selection
        let picked = select_learnings([&a, &b, &c], now, 25);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].id, "a");
        assert_eq!(picked[1].id, "b");

        // Zero budget selects nothing
        assert!(select_learnings([&a], now, 0).is_empty());
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens(&"x".repeat(41)), 10);
    }
}
