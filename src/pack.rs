//! Profile packs - versioned bundles of default entries
//!
//! A pack declares the desired default state for one pack version:
//! an ordered list of target bodies keyed by semantic key (e.g.
//! `identity.name`, `behavior.do.3`). The merge engine diffs a pack
//! against the current materialized state; packs themselves are plain
//! JSON documents.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::entry::{EntryBody, EntryKind};

/// One target slot in a pack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackItem {
    /// Stable semantic key for the slot, unique within the pack.
    pub semantic_key: String,
    /// The body the slot should hold at this pack version.
    #[serde(flatten)]
    pub body: EntryBody,
}

/// A versioned, ordered bundle of default entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilePack {
    /// Pack identity; the namespace of every managed id it produces.
    pub id: String,
    /// Human-facing pack version (e.g. `v1`).
    pub version: String,
    /// Target items in declared order; the merge plan keeps this order.
    pub items: Vec<PackItem>,
}

impl ProfilePack {
    /// Parse a pack from JSON and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let pack: ProfilePack =
            serde_json::from_str(json).context("Failed to parse profile pack")?;
        pack.validate()?;
        Ok(pack)
    }

    /// Load a pack from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pack file {}", path.display()))?;
        Self::from_json(&contents)
    }

    /// Structural validation: non-empty id/version, unique non-empty
    /// semantic keys, and no bookkeeping kinds as targets.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            bail!("profile pack requires a non-empty id");
        }
        if self.version.trim().is_empty() {
            bail!("profile pack requires a non-empty version");
        }
        let mut seen = std::collections::HashSet::new();
        for item in &self.items {
            if item.semantic_key.trim().is_empty() {
                bail!("pack {} has an item with an empty semantic key", self.id);
            }
            if !seen.insert(item.semantic_key.as_str()) {
                bail!(
                    "pack {} declares semantic key '{}' more than once",
                    self.id,
                    item.semantic_key
                );
            }
            match item.body.kind() {
                EntryKind::Tombstone | EntryKind::Meta => bail!(
                    "pack {} item '{}' targets bookkeeping kind '{}'",
                    self.id,
                    item.semantic_key,
                    item.body.kind()
                ),
                _ => {}
            }
            item.body
                .validate()
                .map_err(|e| anyhow::anyhow!("pack {} item '{}': {}", self.id, item.semantic_key, e))?;
        }
        Ok(())
    }

    /// Whether the pack declares a semantic key.
    pub fn declares(&self, semantic_key: &str) -> bool {
        self.items.iter().any(|i| i.semantic_key == semantic_key)
    }
}
