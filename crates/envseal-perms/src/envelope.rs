//! Environment envelopes.
//!
//! An [`Envelope`] is the on-disk JSON form of one encrypted environment:
//!
//! ```json
//! {
//!   "version": 2,
//!   "keys": [ { "name": "...", "fingerprint": "...", "algorithm": "ed25519",
//!               "encryptedDataKey": "..." } ],
//!   "encryptedContent": "base64(IV ‖ ciphertext ‖ tag)"
//! }
//! ```
//!
//! Envelopes are immutable once built. Every change goes through
//! [`EnvelopeBuilder`], which draws a fresh data key and re-wraps it for
//! every recipient.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use envseal_core::{Fingerprint, PrivateKeyEntry, PublicKeyEntry};

use crate::crypto::DataKey;
use crate::error::{PermsError, Result};
use crate::grant::{base64_bytes, RecipientGrant};

/// Version written by this build.
pub const CURRENT_VERSION: u32 = 2;

/// Associated data bound into version 2 content.
pub const V2_CONTENT_AAD: &[u8] = b"envseal:v2";

/// Envelope format, decided by the `version` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    /// `version` absent or 1: content has no AAD, RSA wraps may be PKCS#1 v1.5.
    Legacy,
    /// `version` 2: content AAD is [`V2_CONTENT_AAD`], RSA wraps are OAEP only.
    V2,
}

impl FormatVersion {
    /// Interpret an envelope's `version` field.
    pub fn from_field(version: Option<u32>) -> Result<Self> {
        match version {
            None | Some(1) => Ok(FormatVersion::Legacy),
            Some(CURRENT_VERSION) => Ok(FormatVersion::V2),
            Some(other) => Err(PermsError::UnsupportedVersion(other)),
        }
    }

    /// Associated data for content encryption.
    pub const fn content_aad(&self) -> &'static [u8] {
        match self {
            FormatVersion::Legacy => b"",
            FormatVersion::V2 => V2_CONTENT_AAD,
        }
    }
}

/// An encrypted environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Absent (or 1) for legacy files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,

    /// Recipient grants, in grant order.
    pub keys: Vec<RecipientGrant>,

    /// `IV(12) ‖ ciphertext ‖ tag(16)`.
    #[serde(with = "base64_bytes")]
    pub encrypted_content: Vec<u8>,
}

impl Envelope {
    /// Parse the envelope file format.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| PermsError::SerializationError(e.to_string()))
    }

    /// Pretty-printed JSON with a trailing newline.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let mut out = serde_json::to_vec_pretty(self)
            .map_err(|e| PermsError::SerializationError(e.to_string()))?;
        out.push(b'\n');
        Ok(out)
    }

    /// The format this envelope was written in.
    pub fn format_version(&self) -> Result<FormatVersion> {
        FormatVersion::from_field(self.version)
    }

    /// Recipient names, in grant order.
    pub fn recipient_names(&self) -> Vec<String> {
        self.keys.iter().map(|grant| grant.name.clone()).collect()
    }

    /// The grant for a fingerprint, if any.
    pub fn grant_for(&self, fingerprint: &Fingerprint) -> Option<&RecipientGrant> {
        self.keys.iter().find(|grant| grant.fingerprint == *fingerprint)
    }

    /// The grant with a given name, if any.
    pub fn grant_named(&self, name: &str) -> Option<&RecipientGrant> {
        self.keys.iter().find(|grant| grant.name == name)
    }

    /// Unwrap the data key with `key`, which must be a recipient.
    pub fn open_data_key(&self, key: &PrivateKeyEntry) -> Result<DataKey> {
        let version = self.format_version()?;
        let grant = self
            .grant_for(&key.fingerprint)
            .ok_or(PermsError::NotARecipient(key.fingerprint))?;
        grant.open(&key.key, version)
    }

    /// Decrypt the content with `key`, which must be a recipient.
    pub fn decrypt(&self, key: &PrivateKeyEntry) -> Result<Zeroizing<Vec<u8>>> {
        let version = self.format_version()?;
        let data_key = self.open_data_key(key)?;
        data_key.decrypt(&self.encrypted_content, version.content_aad())
    }
}

/// Builds a fresh version 2 envelope.
///
/// A new data key is drawn when the builder is created and wrapped for every
/// recipient added. Building with no recipients fails.
pub struct EnvelopeBuilder {
    plaintext: Zeroizing<Vec<u8>>,
    data_key: DataKey,
    recipients: Vec<PublicKeyEntry>,
}

impl EnvelopeBuilder {
    /// Start building an envelope around `plaintext`.
    pub fn new(plaintext: impl Into<Vec<u8>>) -> Self {
        Self {
            plaintext: Zeroizing::new(plaintext.into()),
            data_key: DataKey::generate(),
            recipients: Vec::new(),
        }
    }

    /// Add a recipient. Adding the same fingerprint twice keeps the first.
    pub fn recipient(mut self, recipient: PublicKeyEntry) -> Self {
        if !self
            .recipients
            .iter()
            .any(|existing| existing.fingerprint == recipient.fingerprint)
        {
            self.recipients.push(recipient);
        }
        self
    }

    /// Add several recipients, in order.
    pub fn recipients(self, recipients: impl IntoIterator<Item = PublicKeyEntry>) -> Self {
        recipients.into_iter().fold(self, Self::recipient)
    }

    /// The data key this envelope will be sealed with.
    pub fn data_key(&self) -> &DataKey {
        &self.data_key
    }

    /// Seal the content and wrap the data key for every recipient.
    pub fn build(self) -> Result<Envelope> {
        if self.recipients.is_empty() {
            return Err(PermsError::NoRecipients);
        }

        let keys = self
            .recipients
            .iter()
            .map(|recipient| RecipientGrant::seal(recipient, &self.data_key))
            .collect::<Result<Vec<_>>>()?;

        let encrypted_content = self
            .data_key
            .encrypt(&self.plaintext, FormatVersion::V2.content_aad())?;

        Ok(Envelope {
            version: Some(CURRENT_VERSION),
            keys,
            encrypted_content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use envseal_core::PrivateKey;
    use proptest::prelude::*;

    fn identity(name: &str, seed: u8) -> (PrivateKeyEntry, PublicKeyEntry) {
        let private = PrivateKey::from(SigningKey::from_bytes(&[seed; 32]));
        let public = PublicKeyEntry::new(name, private.public_key()).unwrap();
        (PrivateKeyEntry::new(name, private).unwrap(), public)
    }

    #[test]
    fn test_build_and_decrypt() {
        let (alice, alice_pub) = identity("alice", 1);
        let (bob, bob_pub) = identity("bob", 2);

        let envelope = EnvelopeBuilder::new(b"A=1".to_vec())
            .recipients([alice_pub, bob_pub])
            .build()
            .unwrap();

        assert_eq!(envelope.version, Some(CURRENT_VERSION));
        assert_eq!(envelope.recipient_names(), vec!["alice", "bob"]);
        assert_eq!(envelope.decrypt(&alice).unwrap().as_slice(), b"A=1");
        assert_eq!(envelope.decrypt(&bob).unwrap().as_slice(), b"A=1");
    }

    #[test]
    fn test_no_recipients() {
        assert!(matches!(
            EnvelopeBuilder::new(b"A=1".to_vec()).build(),
            Err(PermsError::NoRecipients)
        ));
    }

    #[test]
    fn test_duplicate_fingerprint_kept_once() {
        let (_, alice_pub) = identity("alice", 1);
        let (_, alias) = identity("alias", 1);
        let envelope = EnvelopeBuilder::new(b"x".to_vec())
            .recipient(alice_pub)
            .recipient(alias)
            .build()
            .unwrap();
        assert_eq!(envelope.recipient_names(), vec!["alice"]);
    }

    #[test]
    fn test_non_recipient_rejected() {
        let (_, alice_pub) = identity("alice", 1);
        let (mallory, _) = identity("mallory", 3);
        let envelope = EnvelopeBuilder::new(b"x".to_vec())
            .recipient(alice_pub)
            .build()
            .unwrap();
        assert!(matches!(
            envelope.decrypt(&mallory),
            Err(PermsError::NotARecipient(_))
        ));
    }

    #[test]
    fn test_json_roundtrip_and_shape() {
        let (_, alice_pub) = identity("alice", 1);
        let envelope = EnvelopeBuilder::new(b"x".to_vec())
            .recipient(alice_pub)
            .build()
            .unwrap();

        let json = envelope.to_json().unwrap();
        assert_eq!(json.last(), Some(&b'\n'));
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(value["version"], 2);
        assert!(value["encryptedContent"].is_string());
        assert!(value["keys"].is_array());

        assert_eq!(Envelope::from_json(&json).unwrap(), envelope);
    }

    #[test]
    fn test_legacy_version_field() {
        assert_eq!(FormatVersion::from_field(None).unwrap(), FormatVersion::Legacy);
        assert_eq!(FormatVersion::from_field(Some(1)).unwrap(), FormatVersion::Legacy);
        assert_eq!(FormatVersion::from_field(Some(2)).unwrap(), FormatVersion::V2);
        assert!(matches!(
            FormatVersion::from_field(Some(3)),
            Err(PermsError::UnsupportedVersion(3))
        ));
    }

    #[test]
    fn test_legacy_envelope_without_version_decrypts() {
        let (alice, alice_pub) = identity("alice", 1);
        let data_key = DataKey::generate();
        let envelope = Envelope {
            version: None,
            keys: vec![RecipientGrant::seal(&alice_pub, &data_key).unwrap()],
            encrypted_content: data_key.encrypt(b"legacy", b"").unwrap(),
        };

        let json = envelope.to_json().unwrap();
        assert!(!String::from_utf8_lossy(&json).contains("version"));
        let parsed = Envelope::from_json(&json).unwrap();
        assert_eq!(parsed.decrypt(&alice).unwrap().as_slice(), b"legacy");
    }

    #[test]
    fn test_relabelling_version_breaks_authentication() {
        let (alice, alice_pub) = identity("alice", 1);
        let mut envelope = EnvelopeBuilder::new(b"x".to_vec())
            .recipient(alice_pub)
            .build()
            .unwrap();
        envelope.version = None;
        assert!(matches!(
            envelope.decrypt(&alice),
            Err(PermsError::DecryptionFailed(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_any_plaintext_roundtrips(plaintext in proptest::collection::vec(any::<u8>(), 0..512)) {
            let (alice, alice_pub) = identity("alice", 1);
            let envelope = EnvelopeBuilder::new(plaintext.clone())
                .recipient(alice_pub)
                .build()
                .unwrap();
            let decrypted = envelope.decrypt(&alice).unwrap();
            prop_assert_eq!(decrypted.as_slice(), plaintext.as_slice());
        }

        #[test]
        fn prop_any_bit_flip_is_detected(byte in 0usize..40, bit in 0u8..8) {
            let (alice, alice_pub) = identity("alice", 1);
            let mut envelope = EnvelopeBuilder::new(b"SECRET=hunter2".to_vec())
                .recipient(alice_pub)
                .build()
                .unwrap();
            let index = byte % envelope.encrypted_content.len();
            envelope.encrypted_content[index] ^= 1 << bit;
            prop_assert!(matches!(
                envelope.decrypt(&alice),
                Err(PermsError::DecryptionFailed(_))
            ));
        }
    }
}
