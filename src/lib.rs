//! Agent Brain - durable cross-session memory core
//!
//! An append-only event log of everything the agent should remember:
//! - Facts, preferences, identity, tasks, and behavioral directives
//! - A pure fold into the current materialized state
//! - Score-ranked, token-budgeted prompt assembly
//! - Decay of stale, unreinforced learnings
//! - A bootstrap merge engine that applies versioned profile packs
//!   without ever clobbering user-edited content
//! - One-time migration from the legacy multi-file format
//!
//! # Example
//!
//! ```ignore
//! use agent_brain::{Brain, BrainConfig, EntryBody};
//!
//! fn main() -> anyhow::Result<()> {
//!     let brain = Brain::open(BrainConfig::load()?)?;
//!     brain.remember(EntryBody::Preference {
//!         text: "prefers metric units".into(),
//!     })?;
//!     let fragment = brain.build_default_prompt()?;
//!     println!("{}", fragment);
//!     Ok(())
//! }
//! ```

// Core modules (order matters for cross-module dependencies)
pub mod entry;
pub mod ids;
pub mod error;
pub mod store;
pub mod fold;
pub mod rank;
pub mod decay;
pub mod prompt;
pub mod bootstrap;
pub mod pack;
pub mod merge;
pub mod migrate;
pub mod config;
pub mod brain;

// Re-export commonly used types for convenience
pub use brain::{Brain, BrainStats};

pub use config::BrainConfig;

pub use entry::{Entry, EntryBody, EntryKind, ManagedMark};

pub use error::{PartialApplyError, StoreError};

pub use fold::{fold, MaterializedBrain};

pub use bootstrap::{BootstrapState, BootstrapStatus};

pub use merge::{ApplyReport, MergeAction, MergePlan};

pub use migrate::{MigrationStats, MigrationStatus};

pub use pack::{PackItem, ProfilePack};

pub use store::{LogStore, ReadOutcome};

pub use ids::deterministic_id;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library info
pub fn info() -> String {
    format!("{} v{} - Durable agent memory core", NAME, VERSION)
}
