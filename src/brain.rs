//! Brain facade - the collaborator-facing surface of the memory core
//!
//! Everything else in the agent (tool calls, auto-extraction, the
//! bootstrap command, maintenance jobs) goes through this type. Each
//! read-path operation folds a fresh read of the log: a materialized
//! snapshot is a point-in-time view, never a cache.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::info;

use crate::bootstrap::{self, BootstrapState};
use crate::config::BrainConfig;
use crate::decay::decay_candidates;
use crate::entry::{Entry, EntryBody};
use crate::error::PartialApplyError;
use crate::fold::{fold, MaterializedBrain};
use crate::merge::{self, ApplyReport, MergePlan};
use crate::migrate::{self, MigrationStats, MigrationStatus};
use crate::pack::ProfilePack;
use crate::store::LogStore;

/// Log health counters.
#[derive(Debug, Clone, PartialEq)]
pub struct BrainStats {
    /// Physical entries in the log.
    pub total_entries: usize,
    /// Entries alive after folding.
    pub active_entries: usize,
    /// Lines skipped as malformed on the last read.
    pub skipped_lines: usize,
}

/// Durable, cross-session memory for one agent.
pub struct Brain {
    store: LogStore,
    config: BrainConfig,
}

impl Brain {
    /// Open a brain over the configured log path.
    pub fn open(config: BrainConfig) -> Result<Self> {
        let store = LogStore::open(&config.log_path, config.lock_timeout())
            .context("Failed to open brain log")?;
        Ok(Self { store, config })
    }

    /// Open with the on-disk configuration (written with defaults on
    /// first run).
    pub fn open_default() -> Result<Self> {
        Self::open(BrainConfig::load()?)
    }

    /// Direct access to the underlying log store.
    pub fn store(&self) -> &LogStore {
        &self.store
    }

    /// Record a new fact, preference, task, or any other entry body.
    pub fn remember(&self, body: EntryBody) -> Result<Entry> {
        let entry = Entry::new(body, Utc::now());
        self.store.append(&entry)?;
        Ok(entry)
    }

    /// Append a caller-built entry (logical updates, managed slots).
    pub fn append(&self, entry: &Entry) -> Result<()> {
        self.store.append(entry)?;
        Ok(())
    }

    /// Logically delete an entry by appending a tombstone.
    pub fn forget(&self, target: &str, reason: &str) -> Result<Entry> {
        let tombstone = Entry::new(
            EntryBody::Tombstone {
                target: target.to_string(),
                reason: reason.to_string(),
            },
            Utc::now(),
        );
        self.store.append(&tombstone)?;
        Ok(tombstone)
    }

    /// Reinforce a learning: a logical update with the count bumped
    /// and `last_used` refreshed, so it ranks higher and resists decay.
    pub fn reinforce(&self, id: &str) -> Result<Entry> {
        let brain = self.materialize()?;
        let current = match brain.get(id) {
            Some(entry) => entry,
            None => bail!("no active entry with id {}", id),
        };
        let (text, reinforcement_count) = match &current.body {
            EntryBody::Learning {
                text,
                reinforcement_count,
                ..
            } => (text.clone(), *reinforcement_count),
            other => bail!("entry {} is a {}, not a learning", id, other.kind()),
        };

        let mut updated = Entry::with_id(
            id,
            EntryBody::Learning {
                text,
                reinforcement_count: reinforcement_count + 1,
                last_used: Some(Utc::now()),
            },
            current.created,
        );
        updated.managed = current.managed.clone();
        self.store.append(&updated)?;
        Ok(updated)
    }

    /// Fold a fresh read of the log.
    pub fn materialize(&self) -> Result<MaterializedBrain> {
        let outcome = self.store.read_all()?;
        Ok(fold(&outcome.entries))
    }

    /// Read, fold, rank, and render the prompt fragment. The budget
    /// bounds the learnings section only.
    pub fn build_prompt(&self, budget_tokens: usize) -> Result<String> {
        let brain = self.materialize()?;
        Ok(crate::prompt::render(&brain, Utc::now(), budget_tokens))
    }

    /// Prompt fragment with the configured default budget.
    pub fn build_default_prompt(&self) -> Result<String> {
        self.build_prompt(self.config.prompt_budget_tokens)
    }

    /// Bootstrap lifecycle status, derived from meta entries.
    pub fn bootstrap_state(&self) -> Result<BootstrapState> {
        Ok(bootstrap::state(&self.materialize()?))
    }

    /// Compute a merge plan for a pack against the current state.
    pub fn plan(&self, pack: &ProfilePack) -> Result<MergePlan> {
        pack.validate()?;
        Ok(merge::plan(&self.materialize()?, pack, Utc::now()))
    }

    /// Apply a merge plan. On interruption the typed error lists the
    /// committed and pending semantic keys; re-plan and retry.
    pub fn apply(&self, plan: &MergePlan) -> Result<ApplyReport, PartialApplyError> {
        merge::apply(&self.store, plan)
    }

    /// Mark bootstrap as completed at a version. Logically idempotent.
    pub fn mark_completed(&self, version: &str) -> Result<BootstrapState> {
        for entry in bootstrap::completion_entries(version, Utc::now()) {
            self.store.append(&entry)?;
        }
        info!(version, "bootstrap marked completed");
        self.bootstrap_state()
    }

    /// Tombstone stale learnings; returns how many were appended.
    /// Appends checkpoint one at a time, so an interrupted run leaves
    /// a consistent log and a later run finishes the rest.
    pub fn decay(&self) -> Result<usize> {
        let brain = self.materialize()?;
        let tombstones = decay_candidates(
            &brain,
            Utc::now(),
            self.config.decay_after_days,
            self.config.decay_min_score,
        );
        for tombstone in &tombstones {
            self.store.append(tombstone)?;
        }
        if !tombstones.is_empty() {
            info!(count = tombstones.len(), "decayed stale learnings");
        }
        Ok(tombstones.len())
    }

    /// Whether legacy files exist and whether they were imported.
    pub fn migration_status(&self, paths: &[PathBuf]) -> Result<MigrationStatus> {
        let log = self.store.read_all()?.entries;
        Ok(migrate::detect(paths, &log))
    }

    /// One-time import of legacy per-type files.
    pub fn run_migration(&self, paths: &[PathBuf]) -> Result<MigrationStats> {
        migrate::run(&self.store, paths, Utc::now())
    }

    /// Log health counters.
    pub fn stats(&self) -> Result<BrainStats> {
        let outcome = self.store.read_all()?;
        let active = fold(&outcome.entries).len();
        Ok(BrainStats {
            total_entries: outcome.entries.len(),
            active_entries: active,
            skipped_lines: outcome.skipped,
        })
    }
}
