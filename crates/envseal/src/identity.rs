//! Caller identity: which private keys the caller holds, and which of them
//! opens a given envelope.

use tracing::debug;

use envseal_core::codec::parse_private_key_with_min_bits;
use envseal_core::{Fingerprint, PrivateKeyEntry, PublicKey};
use envseal_perms::Envelope;
use envseal_store::{scan_key_dir, SkippedKey};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

/// The private keys available to the caller, in match priority order.
#[derive(Debug, Clone, Default)]
pub struct CallerKeys {
    keys: Vec<PrivateKeyEntry>,
    skipped: Vec<SkippedKey>,
}

impl CallerKeys {
    /// Load the override key (if configured) and scan the key directory.
    ///
    /// A broken override key is an error. Broken files in the key directory
    /// are only recorded as skipped.
    pub fn load(config: &EngineConfig) -> Result<Self> {
        let mut caller = Self::default();

        if let Some(override_key) = &config.override_key {
            let pem = override_key.pem.as_bytes();
            let key = parse_private_key_with_min_bits(pem, config.min_rsa_bits)
                .and_then(|key| PrivateKeyEntry::new(override_key.label.clone(), key))
                .map_err(|source| EngineError::OverrideKey {
                    label: override_key.label.clone(),
                    source,
                })?;
            debug!(label = %key.name, fingerprint = %key.fingerprint.short(), "using override key");
            caller.keys.push(key);
        }

        if let Some(dir) = &config.key_dir {
            let scan = scan_key_dir(dir, config.min_rsa_bits)?;
            for key in scan.keys {
                caller.push(key);
            }
            caller.skipped = scan.skipped;
        }

        Ok(caller)
    }

    /// Use exactly these keys, first match wins.
    pub fn from_keys(keys: impl IntoIterator<Item = PrivateKeyEntry>) -> Self {
        let mut caller = Self::default();
        for key in keys {
            caller.push(key);
        }
        caller
    }

    fn push(&mut self, key: PrivateKeyEntry) {
        if self.keys.iter().any(|k| k.fingerprint == key.fingerprint) {
            debug!(name = %key.name, "key already loaded under another name");
            return;
        }
        self.keys.push(key);
    }

    pub fn keys(&self) -> &[PrivateKeyEntry] {
        &self.keys
    }

    /// Key files that were found but could not be used.
    pub fn skipped(&self) -> &[SkippedKey] {
        &self.skipped
    }

    pub fn names(&self) -> Vec<String> {
        self.keys.iter().map(|k| k.name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The first caller key with a grant on `envelope`.
    pub fn match_envelope(&self, envelope: &Envelope) -> Option<&PrivateKeyEntry> {
        self.keys
            .iter()
            .find(|key| envelope.grant_for(&key.fingerprint).is_some())
    }

    /// Like [`CallerKeys::match_envelope`], failing with
    /// [`EngineError::AccessDenied`] when nothing matches.
    pub fn resolve(&self, environment: &str, envelope: &Envelope) -> Result<&PrivateKeyEntry> {
        self.match_envelope(envelope)
            .ok_or_else(|| EngineError::AccessDenied {
                environment: environment.to_string(),
                caller_keys: self.names(),
                recipients: envelope.recipient_names(),
            })
    }
}

/// SHA-256 of the key's SubjectPublicKeyInfo DER.
pub fn fingerprint(key: &PublicKey) -> Result<Fingerprint> {
    Ok(key.fingerprint()?)
}
