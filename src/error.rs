//! Error taxonomy for the brain core
//!
//! Write-side failures are always fatal to the triggering call and
//! never partially corrupt the log; read-side problems degrade
//! gracefully (bad lines are skipped and counted, never fatal).

use std::time::Duration;

use thiserror::Error;

/// Errors from the log store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The entry failed schema validation; nothing was written.
    #[error("entry failed schema validation: {0}")]
    SchemaViolation(String),

    /// A live process held the write lock past the timeout. The log is
    /// unchanged and the caller may retry.
    #[error("write lock held by pid {holder} past {timeout:?}")]
    LockTimeout { holder: u32, timeout: Duration },

    #[error("log I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("entry serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// A merge-apply batch was interrupted partway. The log is append-only
/// so nothing is rolled back; instead the error enumerates exactly
/// which semantic keys were committed and which remain pending, so the
/// caller can re-plan and retry only the pending subset (committed
/// keys plan as NOOP on the next pass).
#[derive(Debug, Error)]
#[error(
    "merge apply interrupted after {} of {} writes: {source}",
    .committed.len(),
    .committed.len() + .pending.len()
)]
pub struct PartialApplyError {
    /// Semantic keys whose appends reached the log.
    pub committed: Vec<String>,
    /// Semantic keys whose appends never happened.
    pub pending: Vec<String>,
    #[source]
    pub source: StoreError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_apply_display_counts_writes() {
        let err = PartialApplyError {
            committed: vec!["identity.name".into(), "user.timezone".into()],
            pending: vec!["behavior.do.1".into()],
            source: StoreError::SchemaViolation("bad".into()),
        };
        let text = err.to_string();
        assert!(text.contains("2 of 3"), "unexpected message: {}", text);
    }
}
