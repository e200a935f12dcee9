//! Deterministic identifiers and value hashes
//!
//! The merge engine and the bootstrap lifecycle need ids that are
//! reproducible across runs and machines: the same semantic slot must
//! always map to the same log id. Both functions here are versioned;
//! changing the salt, the algorithm, or the truncation is a breaking
//! schema change and requires bumping the `d1-` prefix.

use sha2::{Digest, Sha256};

use crate::entry::EntryBody;

/// Domain-separation salt for id scheme version 1.
const ID_SALT_V1: &[u8] = b"agent-brain/id/v1";

/// Stable id for a semantic slot: `deterministic_id(namespace, key)`
/// always yields the same id for the same inputs. The namespace is the
/// pack id for managed entries, or `"meta"` for lifecycle keys.
pub fn deterministic_id(namespace: &str, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ID_SALT_V1);
    hasher.update([0u8]);
    hasher.update(namespace.as_bytes());
    hasher.update([0u8]);
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();
    format!("d1-{}", &hex::encode(digest)[..32])
}

/// Content hash of an entry body, used for merge decisions and as the
/// provenance snapshot on managed entries. Hashes the canonical JSON
/// serialization of the body (field order is fixed by the type).
pub fn value_hash(body: &EntryBody) -> String {
    let canonical =
        serde_json::to_string(body).unwrap_or_else(|_| format!("{:?}", body));
    let mut hasher = Sha256::new();
    hasher.update(ID_SALT_V1);
    hasher.update([1u8]);
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_id_is_stable() {
        let a = deterministic_id("core-v1", "identity.name");
        let b = deterministic_id("core-v1", "identity.name");
        assert_eq!(a, b);
        assert!(a.starts_with("d1-"));
        assert_eq!(a.len(), 3 + 32);
    }

    #[test]
    fn test_deterministic_id_separates_namespace_and_key() {
        // "ab"/"c" must not collide with "a"/"bc"
        assert_ne!(deterministic_id("ab", "c"), deterministic_id("a", "bc"));
        assert_ne!(
            deterministic_id("core-v1", "identity.name"),
            deterministic_id("core-v2", "identity.name")
        );
    }

    #[test]
    fn test_value_hash_tracks_content() {
        let a = EntryBody::Identity {
            key: "name".into(),
            value: "Mikey".into(),
        };
        let b = EntryBody::Identity {
            key: "name".into(),
            value: "Ada".into(),
        };
        assert_eq!(value_hash(&a), value_hash(&a.clone()));
        assert_ne!(value_hash(&a), value_hash(&b));
    }
}
