//! The Engine: access control over encrypted environment files.
//!
//! Every change to an environment goes through the same rewrite: load the
//! envelope, decrypt it with one of the caller's keys, recompute the
//! recipient set, wrap a fresh data key for every recipient, re-encrypt the
//! content and persist the result in a single atomic write. A failure at any
//! step before the write leaves the file as it was.

use std::collections::HashMap;

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use envseal_core::{parse_public_key, validate_name, validate_rsa_bits, PublicKeyEntry};
use envseal_perms::{
    classify_purge, Envelope, EnvelopeBuilder, GrantOutcome, PurgeAction, RecipientSet,
};
use envseal_store::{FsStore, Store, StoreExt};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::identity::CallerKeys;
use crate::summary::{BatchSummary, EditReport, Identity, ItemFailure, PurgePlan, PurgeReport};

/// Recipient changes applied together with a content edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditOptions {
    /// Public key names to grant, applied first.
    pub grant: Vec<String>,
    /// Recipient names to revoke, applied after grants.
    pub revoke: Vec<String>,
}

impl EditOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, name: impl Into<String>) -> Self {
        self.grant.push(name.into());
        self
    }

    pub fn revoke(mut self, name: impl Into<String>) -> Self {
        self.revoke.push(name.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.grant.is_empty() && self.revoke.is_empty()
    }
}

/// What a rewrite does to the content.
enum Content<'a> {
    /// Keep the decrypted content.
    Keep,
    /// Replace it.
    Replace(&'a [u8]),
}

/// The main Engine struct.
///
/// Holds the project store, the configuration and the caller's private keys.
pub struct Engine<S: Store> {
    store: S,
    config: EngineConfig,
    caller: CallerKeys,
}

impl Engine<FsStore> {
    /// Open the project at `config.project_root` and load the caller's keys.
    pub fn open(config: EngineConfig) -> Result<Self> {
        let store = FsStore::with_layout(config.project_root.clone(), config.layout.clone());
        let caller = CallerKeys::load(&config)?;
        for skipped in caller.skipped() {
            warn!(
                path = %skipped.path.display(),
                reason = %skipped.reason,
                "private key not usable"
            );
        }
        Ok(Self::new(store, config, caller))
    }
}

impl<S: Store> Engine<S> {
    /// Create a new engine instance.
    pub fn new(store: S, config: EngineConfig, caller: CallerKeys) -> Self {
        Self {
            store,
            config,
            caller,
        }
    }

    /// Replace the caller's keys.
    pub fn with_caller_keys(mut self, caller: CallerKeys) -> Self {
        self.caller = caller;
        self
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn caller_keys(&self) -> &CallerKeys {
        &self.caller
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Public Key Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a public key (SPKI PEM or OpenSSH public line) under `name`.
    ///
    /// Refuses a name already in use and a key already registered under
    /// another name.
    pub fn add_public_key(&self, name: &str, key_bytes: &[u8]) -> Result<PublicKeyEntry> {
        validate_name(name)?;
        let key = parse_public_key(key_bytes)?;
        validate_rsa_bits(&key, self.config.min_rsa_bits)?;
        let entry = PublicKeyEntry::new(name, key)?;

        if self.store.load_public_key(name)?.is_some() {
            return Err(EngineError::KeyExists(name.to_string()));
        }
        if let Some(existing) = self.store.find_public_key(&entry.fingerprint)? {
            return Err(EngineError::DuplicateKey {
                existing: existing.name,
            });
        }

        self.store.create_public_key(&entry)?;
        info!(
            key = name,
            algorithm = %entry.algorithm(),
            fingerprint = %entry.fingerprint.short(),
            "public key added"
        );
        Ok(entry)
    }

    /// Delete a public key record. Existing grants are not touched.
    pub fn remove_public_key(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        if !self.store.delete_public_key(name)? {
            return Err(EngineError::KeyNotFound(name.to_string()));
        }
        info!(key = name, "public key removed");
        Ok(())
    }

    pub fn list_public_keys(&self) -> Result<Vec<PublicKeyEntry>> {
        Ok(self.store.list_public_keys()?)
    }

    /// The caller's keys and the project records they correspond to.
    pub fn whoami(&self) -> Result<Vec<Identity>> {
        let records = self.store.list_public_keys()?;
        Ok(self
            .caller
            .keys()
            .iter()
            .map(|key| Identity {
                name: key.name.clone(),
                algorithm: key.algorithm(),
                fingerprint: key.fingerprint,
                registered_as: records
                    .iter()
                    .find(|r| r.fingerprint == key.fingerprint)
                    .map(|r| r.name.clone()),
            })
            .collect())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Environment Operations
    // ─────────────────────────────────────────────────────────────────────────

    pub fn list_environments(&self) -> Result<Vec<String>> {
        Ok(self.store.list_environments()?)
    }

    /// Names of an environment's recipients, in grant order. No key needed.
    pub fn list_recipients(&self, name: &str) -> Result<Vec<String>> {
        self.load(name)
            .map(|envelope| envelope.recipient_names())
            .map_err(|e| e.in_environment(name))
    }

    /// Encrypt `plaintext` for the named public keys as a new environment.
    pub fn create_environment(
        &self,
        name: &str,
        recipients: &[&str],
        plaintext: &[u8],
    ) -> Result<Envelope> {
        self.create_inner(name, recipients, plaintext)
            .map_err(|e| e.in_environment(name))
    }

    fn create_inner(&self, name: &str, recipients: &[&str], plaintext: &[u8]) -> Result<Envelope> {
        validate_name(name)?;
        if self.store.load_environment(name)?.is_some() {
            return Err(EngineError::EnvironmentExists(name.to_string()));
        }

        let entries = recipients
            .iter()
            .map(|key_name| self.public_key(key_name))
            .collect::<Result<Vec<_>>>()?;

        let envelope = EnvelopeBuilder::new(plaintext.to_vec())
            .recipients(entries)
            .build()?;
        self.store.create_environment(name, &envelope)?;

        info!(
            environment = name,
            recipients = envelope.keys.len(),
            "environment created"
        );
        Ok(envelope)
    }

    /// Delete an environment file.
    pub fn delete_environment(&self, name: &str) -> Result<()> {
        validate_name(name).map_err(|e| EngineError::from(e).in_environment(name))?;
        if !self.store.delete_environment(name)? {
            return Err(EngineError::EnvironmentNotFound(name.to_string()));
        }
        info!(environment = name, "environment deleted");
        Ok(())
    }

    /// Decrypt an environment with the first matching caller key.
    pub fn decrypt_environment(&self, name: &str) -> Result<Zeroizing<Vec<u8>>> {
        self.decrypt_inner(name).map_err(|e| e.in_environment(name))
    }

    fn decrypt_inner(&self, name: &str) -> Result<Zeroizing<Vec<u8>>> {
        let envelope = self.load(name)?;
        let key = self.caller.resolve(name, &envelope)?;
        debug!(environment = name, key = %key.name, "decrypting");
        Ok(envelope.decrypt(key)?)
    }

    /// Decrypt every environment. One failure does not stop the others.
    pub fn decrypt_all(&self) -> Result<BatchSummary<Zeroizing<Vec<u8>>>> {
        Ok(self
            .store
            .list_environments()?
            .into_iter()
            .map(|name| {
                let result = self.decrypt_environment(&name);
                (name, result)
            })
            .collect())
    }

    /// Replace an environment's content, applying `options` in the same
    /// rewrite.
    pub fn encrypt_environment(
        &self,
        name: &str,
        plaintext: &[u8],
        options: &EditOptions,
    ) -> Result<EditReport> {
        self.rewrite(name, Content::Replace(plaintext), options)
            .map_err(|e| e.in_environment(name))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Permission Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Grant the public key `key_name` access to an environment.
    ///
    /// An existing grant for the same key and name is left alone without
    /// rewriting the file.
    pub fn grant(&self, name: &str, key_name: &str) -> Result<GrantOutcome> {
        let mut report = self
            .rewrite(name, Content::Keep, &EditOptions::new().grant(key_name))
            .map_err(|e| e.in_environment(name))?;
        let outcome = report
            .granted
            .pop()
            .map(|(_, outcome)| outcome)
            .unwrap_or(GrantOutcome::AlreadyGranted);
        info!(environment = name, key = key_name, outcome = ?outcome, "grant");
        Ok(outcome)
    }

    /// Revoke the recipient called `key_name`.
    ///
    /// Revoking the last recipient fails with `NoRecipients` and leaves the
    /// file untouched.
    pub fn revoke(&self, name: &str, key_name: &str) -> Result<()> {
        self.rewrite(name, Content::Keep, &EditOptions::new().revoke(key_name))
            .map_err(|e| e.in_environment(name))?;
        info!(environment = name, key = key_name, "revoked");
        Ok(())
    }

    /// Re-encrypt under a fresh data key for the same recipients.
    pub fn rotate(&self, name: &str) -> Result<()> {
        self.rewrite(name, Content::Keep, &EditOptions::new())
            .map_err(|e| e.in_environment(name))?;
        info!(environment = name, "rotated");
        Ok(())
    }

    /// Rotate every environment independently.
    pub fn rotate_all(&self) -> Result<BatchSummary> {
        let summary: BatchSummary = self
            .store
            .list_environments()?
            .into_iter()
            .map(|name| {
                let result = self.rotate(&name);
                (name, result)
            })
            .collect();
        info!(
            rotated = summary.succeeded.len(),
            failed = summary.failed.len(),
            "rotate all"
        );
        Ok(summary)
    }

    /// Classify every environment for a purge of `key_name`, writing nothing.
    pub fn plan_purge(&self, key_name: &str) -> Result<PurgePlan> {
        validate_name(key_name)?;
        let mut plan = PurgePlan {
            key: key_name.to_string(),
            ..PurgePlan::default()
        };

        for name in self.store.list_environments()? {
            let envelope = match self.load(&name) {
                Ok(envelope) => envelope,
                Err(error) => {
                    plan.unreadable.push(ItemFailure {
                        error: error.in_environment(&name),
                        name,
                    });
                    continue;
                }
            };
            match classify_purge(&envelope, key_name) {
                PurgeAction::Revoke => plan.revoke.push(name),
                PurgeAction::Skip => plan.skip.push(name),
                PurgeAction::Unaffected => plan.unaffected.push(name),
            }
        }
        Ok(plan)
    }

    /// Revoke `key_name` everywhere it is not the sole recipient, then delete
    /// its public key record.
    pub fn purge(&self, key_name: &str) -> Result<PurgeReport> {
        let plan = self.plan_purge(key_name)?;

        for name in &plan.skip {
            warn!(
                environment = %name,
                key = key_name,
                "sole recipient, not revoking"
            );
        }

        let revoked = plan
            .revoke
            .iter()
            .map(|name| (name.clone(), self.revoke(name, key_name)))
            .collect();

        let key_removed = self.store.delete_public_key(key_name)?;
        info!(key = key_name, key_removed, "purge complete");

        Ok(PurgeReport {
            key: plan.key,
            revoked,
            skipped: plan.skip,
            unreadable: plan.unreadable,
            key_removed,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal
    // ─────────────────────────────────────────────────────────────────────────

    fn load(&self, name: &str) -> Result<Envelope> {
        validate_name(name)?;
        self.store
            .load_environment(name)?
            .ok_or_else(|| EngineError::EnvironmentNotFound(name.to_string()))
    }

    /// A public key record that is acceptable as a recipient.
    fn public_key(&self, key_name: &str) -> Result<PublicKeyEntry> {
        validate_name(key_name)?;
        let entry = self
            .store
            .load_public_key(key_name)?
            .ok_or_else(|| EngineError::KeyNotFound(key_name.to_string()))?;
        validate_rsa_bits(&entry.key, self.config.min_rsa_bits)?;
        Ok(entry)
    }

    /// The shared mutation protocol.
    fn rewrite(&self, name: &str, content: Content<'_>, options: &EditOptions) -> Result<EditReport> {
        let envelope = self.load(name)?;

        let key = self.caller.resolve(name, &envelope)?;
        let mut plaintext = envelope.decrypt(key)?;

        let mut set = RecipientSet::from_envelope(&envelope);
        let mut report = EditReport::default();
        let mut granted = Vec::with_capacity(options.grant.len());
        for key_name in &options.grant {
            let entry = self.public_key(key_name)?;
            let outcome = set.grant(&entry.name, entry.fingerprint);
            report.granted.push((key_name.clone(), outcome));
            granted.push(entry);
        }
        for key_name in &options.revoke {
            set.revoke(key_name).map_err(|_| EngineError::NotARecipient {
                key: key_name.clone(),
            })?;
            report.revoked.push(key_name.clone());
        }
        set.ensure_not_empty()?;

        let unchanged = matches!(content, Content::Keep)
            && report.revoked.is_empty()
            && !options.grant.is_empty()
            && report.granted.iter().all(|(_, outcome)| !outcome.is_change());
        if unchanged {
            debug!(environment = name, "recipients unchanged, not rewriting");
            return Ok(report);
        }

        let recipients = self.rewrap_targets(&set, granted)?;
        let plaintext = match content {
            Content::Keep => std::mem::take(&mut *plaintext),
            Content::Replace(bytes) => bytes.to_vec(),
        };
        let rewritten = EnvelopeBuilder::new(plaintext)
            .recipients(recipients)
            .build()?;

        self.store.save_environment(name, &rewritten)?;
        debug!(
            environment = name,
            recipients = rewritten.keys.len(),
            "environment rewritten"
        );
        Ok(report)
    }

    /// Public keys for every member of `set`, under the set's names.
    ///
    /// Newly granted keys are already loaded. Everyone else is looked up by
    /// fingerprint, since a record's file name need not match its grant name.
    fn rewrap_targets(
        &self,
        set: &RecipientSet,
        granted: Vec<PublicKeyEntry>,
    ) -> Result<Vec<PublicKeyEntry>> {
        let needs_lookup = set
            .iter()
            .any(|r| !granted.iter().any(|g| g.fingerprint == r.fingerprint));
        let records = if needs_lookup {
            self.store.public_keys_by_fingerprint()?
        } else {
            HashMap::new()
        };

        set.iter()
            .map(|recipient| {
                let record = granted
                    .iter()
                    .find(|g| g.fingerprint == recipient.fingerprint)
                    .or_else(|| records.get(&recipient.fingerprint))
                    .ok_or_else(|| EngineError::MissingRecipientKey {
                        name: recipient.name.clone(),
                        fingerprint: recipient.fingerprint,
                    })?;
                Ok(PublicKeyEntry {
                    name: recipient.name.clone(),
                    key: record.key.clone(),
                    fingerprint: record.fingerprint,
                })
            })
            .collect()
    }
}
