//! Outcomes of multi-environment operations.
//!
//! Batch operations run every item through its own error boundary and fold
//! the results here instead of stopping at the first failure.

use envseal_core::{Algorithm, Fingerprint};
use envseal_perms::GrantOutcome;

use crate::error::EngineError;

/// One item that failed inside a batch.
#[derive(Debug)]
pub struct ItemFailure {
    pub name: String,
    pub error: EngineError,
}

/// Per-item outcomes of a batch operation.
#[derive(Debug)]
pub struct BatchSummary<T = ()> {
    pub succeeded: Vec<(String, T)>,
    pub failed: Vec<ItemFailure>,
}

impl<T> Default for BatchSummary<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> BatchSummary<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one item's result.
    pub fn record(&mut self, name: impl Into<String>, result: Result<T, EngineError>) {
        let name = name.into();
        match result {
            Ok(value) => self.succeeded.push((name, value)),
            Err(error) => {
                tracing::warn!(item = %name, error = %error, "batch item failed");
                self.failed.push(ItemFailure { name, error });
            }
        }
    }

    /// True if no item failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn succeeded_names(&self) -> Vec<&str> {
        self.succeeded.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn failed_names(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> FromIterator<(String, Result<T, EngineError>)> for BatchSummary<T> {
    fn from_iter<I: IntoIterator<Item = (String, Result<T, EngineError>)>>(iter: I) -> Self {
        let mut summary = Self::new();
        for (name, result) in iter {
            summary.record(name, result);
        }
        summary
    }
}

/// What purging a key would do, computed without writing anything.
#[derive(Debug, Default)]
pub struct PurgePlan {
    pub key: String,
    /// Environments where the key will be revoked.
    pub revoke: Vec<String>,
    /// Environments where the key is the sole recipient; left untouched.
    pub skip: Vec<String>,
    /// Environments the key has no grant on.
    pub unaffected: Vec<String>,
    /// Environments that could not be read.
    pub unreadable: Vec<ItemFailure>,
}

/// What a purge did.
#[derive(Debug, Default)]
pub struct PurgeReport {
    pub key: String,
    pub revoked: BatchSummary,
    pub skipped: Vec<String>,
    pub unreadable: Vec<ItemFailure>,
    /// Whether a public key record was deleted.
    pub key_removed: bool,
}

impl PurgeReport {
    /// True if every revocation succeeded and every file was readable.
    pub fn is_clean(&self) -> bool {
        self.revoked.is_success() && self.unreadable.is_empty()
    }
}

/// Result of a combined content edit and recipient change.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EditReport {
    pub granted: Vec<(String, GrantOutcome)>,
    pub revoked: Vec<String>,
}

/// One of the caller's keys, and whether the project knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// File name or override label.
    pub name: String,
    pub algorithm: Algorithm,
    pub fingerprint: Fingerprint,
    /// Name of the matching public key record, if registered.
    pub registered_as: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_summary_folds_results() {
        let summary: BatchSummary<u32> = vec![
            ("a".to_string(), Ok(1)),
            (
                "b".to_string(),
                Err(EngineError::EnvironmentNotFound("b".into())),
            ),
            ("c".to_string(), Ok(3)),
        ]
        .into_iter()
        .collect();

        assert_eq!(summary.len(), 3);
        assert!(!summary.is_success());
        assert_eq!(summary.succeeded_names(), vec!["a", "c"]);
        assert_eq!(summary.failed_names(), vec!["b"]);
    }

    #[test]
    fn test_empty_summary_is_success() {
        let summary: BatchSummary = BatchSummary::new();
        assert!(summary.is_success());
        assert!(summary.is_empty());
    }
}
