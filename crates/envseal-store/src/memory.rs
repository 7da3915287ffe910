//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as the
//! filesystem store but keeps everything in memory with no persistence.
//! Environments are held as their serialized JSON so tests can assert on
//! exact bytes.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use envseal_core::{validate_name, PublicKeyEntry};
use envseal_perms::Envelope;

use crate::error::{Result, StoreError};
use crate::traits::Store;

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Serialized envelopes by environment name.
    environments: BTreeMap<String, Vec<u8>>,

    /// Public key records by name.
    public_keys: BTreeMap<String, PublicKeyEntry>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored bytes of an environment.
    pub fn environment_bytes(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.read()?.environments.get(name).cloned())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }
}

fn serialize(envelope: &Envelope) -> Result<Vec<u8>> {
    envelope
        .to_json()
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

impl Store for MemoryStore {
    fn load_environment(&self, name: &str) -> Result<Option<Envelope>> {
        validate_name(name)?;
        let inner = self.read()?;
        inner
            .environments
            .get(name)
            .map(|bytes| {
                Envelope::from_json(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
            })
            .transpose()
    }

    fn create_environment(&self, name: &str, envelope: &Envelope) -> Result<()> {
        validate_name(name)?;
        let bytes = serialize(envelope)?;
        let mut inner = self.write()?;
        if inner.environments.contains_key(name) {
            return Err(StoreError::AlreadyExists(format!("environment {name:?}")));
        }
        inner.environments.insert(name.to_string(), bytes);
        Ok(())
    }

    fn save_environment(&self, name: &str, envelope: &Envelope) -> Result<()> {
        validate_name(name)?;
        let bytes = serialize(envelope)?;
        self.write()?.environments.insert(name.to_string(), bytes);
        Ok(())
    }

    fn delete_environment(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        Ok(self.write()?.environments.remove(name).is_some())
    }

    fn list_environments(&self) -> Result<Vec<String>> {
        Ok(self.read()?.environments.keys().cloned().collect())
    }

    fn load_public_key(&self, name: &str) -> Result<Option<PublicKeyEntry>> {
        validate_name(name)?;
        Ok(self.read()?.public_keys.get(name).cloned())
    }

    fn create_public_key(&self, entry: &PublicKeyEntry) -> Result<()> {
        validate_name(&entry.name)?;
        let mut inner = self.write()?;
        if inner.public_keys.contains_key(&entry.name) {
            return Err(StoreError::AlreadyExists(format!(
                "public key {:?}",
                entry.name
            )));
        }
        inner.public_keys.insert(entry.name.clone(), entry.clone());
        Ok(())
    }

    fn delete_public_key(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        Ok(self.write()?.public_keys.remove(name).is_some())
    }

    fn list_public_keys(&self) -> Result<Vec<PublicKeyEntry>> {
        Ok(self.read()?.public_keys.values().cloned().collect())
    }
}
