//! Store trait: the abstract interface for environment and key persistence.
//!
//! The engine is storage-agnostic. Implementations are the project
//! directory on disk ([`FsStore`](crate::FsStore)) and in-memory
//! ([`MemoryStore`](crate::MemoryStore), for tests).

use std::collections::HashMap;

use envseal_core::{Fingerprint, PublicKeyEntry};
use envseal_perms::Envelope;

use crate::error::Result;

/// The Store trait: synchronous interface for project persistence.
///
/// # Design Notes
///
/// - **Atomic writes**: a write either fully replaces the record or leaves
///   the previous bytes untouched.
/// - **Names are validated**: every method rejects names that fail
///   [`envseal_core::validate_name`] before touching storage.
/// - **Sorted listings**: list methods return names in lexical order.
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Environment Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Load an environment's envelope, or `None` if it does not exist.
    fn load_environment(&self, name: &str) -> Result<Option<Envelope>>;

    /// Write a new environment. Fails with `AlreadyExists` if present.
    fn create_environment(&self, name: &str, envelope: &Envelope) -> Result<()>;

    /// Replace an environment's envelope atomically.
    fn save_environment(&self, name: &str, envelope: &Envelope) -> Result<()>;

    /// Delete an environment. Returns whether it existed.
    fn delete_environment(&self, name: &str) -> Result<bool>;

    /// Names of all environments.
    fn list_environments(&self) -> Result<Vec<String>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Public Key Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Load a public key record, or `None` if it does not exist.
    fn load_public_key(&self, name: &str) -> Result<Option<PublicKeyEntry>>;

    /// Write a new public key record. Fails with `AlreadyExists` if present.
    fn create_public_key(&self, entry: &PublicKeyEntry) -> Result<()>;

    /// Delete a public key record. Returns whether it existed.
    fn delete_public_key(&self, name: &str) -> Result<bool>;

    /// All readable public key records, sorted by name.
    fn list_public_keys(&self) -> Result<Vec<PublicKeyEntry>>;
}

/// Extension trait for common store patterns.
pub trait StoreExt: Store {
    /// The public key record with this fingerprint, if any.
    fn find_public_key(&self, fingerprint: &Fingerprint) -> Result<Option<PublicKeyEntry>> {
        Ok(self
            .list_public_keys()?
            .into_iter()
            .find(|entry| entry.fingerprint == *fingerprint))
    }

    /// Every readable public key record, keyed by fingerprint.
    ///
    /// When two records share a fingerprint the first by name wins.
    fn public_keys_by_fingerprint(&self) -> Result<HashMap<Fingerprint, PublicKeyEntry>> {
        let mut index = HashMap::new();
        for entry in self.list_public_keys()? {
            index.entry(entry.fingerprint).or_insert(entry);
        }
        Ok(index)
    }
}

impl<S: Store + ?Sized> StoreExt for S {}
