//! Prompt builder - renders the materialized brain as a bounded
//! markdown fragment
//!
//! Non-learning sections are included in full; learnings go through
//! the ranker and a token budget. The fragment is injected verbatim
//! into the agent runtime's context, so it stays plain markdown with
//! no decoration beyond section headers.

use chrono::{DateTime, Utc};

use crate::entry::{EntryBody, EntryKind};
use crate::fold::MaterializedBrain;
use crate::rank::select_learnings;

/// Render the prompt fragment. Empty sections are omitted; an empty
/// brain renders as an empty string.
pub fn render(brain: &MaterializedBrain, now: DateTime<Utc>, budget_tokens: usize) -> String {
    let mut out = String::with_capacity(4096);

    keyed_section(&mut out, brain, EntryKind::Identity, "Identity");
    keyed_section(&mut out, brain, EntryKind::User, "About the User");
    text_section(&mut out, brain, EntryKind::Behavior, "Behaviors");
    text_section(&mut out, brain, EntryKind::Preference, "Preferences");
    text_section(&mut out, brain, EntryKind::Context, "Context");
    text_section(&mut out, brain, EntryKind::Task, "Open Tasks");
    text_section(&mut out, brain, EntryKind::Reminder, "Reminders");

    let learnings = select_learnings(brain.of_kind(EntryKind::Learning), now, budget_tokens);
    if !learnings.is_empty() {
        out.push_str("## Learnings\n\n");
        for entry in learnings {
            if let Some(text) = entry.body.text() {
                out.push_str(&format!("- {}\n", text));
            }
        }
        out.push('\n');
    }

    out.trim_end().to_string()
}

fn keyed_section(out: &mut String, brain: &MaterializedBrain, kind: EntryKind, title: &str) {
    let mut lines = Vec::new();
    for entry in brain.of_kind(kind) {
        match &entry.body {
            EntryBody::Identity { key, value } | EntryBody::User { key, value } => {
                lines.push(format!("- {}: {}\n", key, value));
            }
            _ => {}
        }
    }
    push_section(out, title, lines);
}

fn text_section(out: &mut String, brain: &MaterializedBrain, kind: EntryKind, title: &str) {
    let lines: Vec<String> = brain
        .of_kind(kind)
        .filter_map(|e| e.body.text().map(|t| format!("- {}\n", t)))
        .collect();
    push_section(out, title, lines);
}

fn push_section(out: &mut String, title: &str, lines: Vec<String>) {
    if lines.is_empty() {
        return;
    }
    out.push_str(&format!("## {}\n\n", title));
    for line in lines {
        out.push_str(&line);
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Entry;
    use crate::fold::fold;

    fn now() -> DateTime<Utc> {
        "2026-08-29T00:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_empty_brain_renders_empty() {
        assert_eq!(render(&fold(&[]), now(), 500), "");
    }

    #[test]
    fn test_sections_render_in_fixed_order() {
        let log = vec![
            Entry::new(
                EntryBody::Learning {
                    text: "user prefers terse replies".into(),
                    reinforcement_count: 2,
                    last_used: Some(now()),
                },
                now(),
            ),
            Entry::new(
                EntryBody::Identity {
                    key: "name".into(),
                    value: "Mikey".into(),
                },
                now(),
            ),
            Entry::new(
                EntryBody::Behavior {
                    text: "Confirm before destructive operations".into(),
                },
                now(),
            ),
        ];
        let fragment = render(&fold(&log), now(), 500);

        let identity = fragment.find("## Identity").unwrap();
        let behaviors = fragment.find("## Behaviors").unwrap();
        let learnings = fragment.find("## Learnings").unwrap();
        assert!(identity < behaviors && behaviors < learnings);
        assert!(fragment.contains("- name: Mikey"));
        assert!(fragment.contains("- user prefers terse replies"));
        // No empty sections for kinds with no entries
        assert!(!fragment.contains("## Reminders"));
    }

    #[test]
    fn test_budget_only_limits_learnings() {
        let long_learning = "x".repeat(400); // 100 tokens
        let log = vec![
            Entry::new(
                EntryBody::Preference {
                    text: "always included even with a zero budget".into(),
                },
                now(),
            ),
            Entry::new(
                EntryBody::Learning {
                    text: long_learning.clone(),
                    reinforcement_count: 0,
                    last_used: Some(now()),
                },
                now(),
            ),
        ];
        let fragment = render(&fold(&log), now(), 10);
        assert!(fragment.contains("always included"));
        assert!(!fragment.contains(&long_learning));
    }
}
