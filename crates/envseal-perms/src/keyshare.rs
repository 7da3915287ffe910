//! Data-key wrapping for a single recipient.
//!
//! The algorithm comes from the key itself:
//! - RSA: OAEP with SHA-256.
//! - Ed25519: ECIES over the key's X25519 (Montgomery) form, see
//!   [`EciesPayload`].
//!
//! Legacy envelopes additionally accept RSA PKCS#1 v1.5 wraps.

use rsa::{Oaep, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use envseal_core::{PrivateKey, PublicKey};

use crate::crypto::{
    DataKey, EncryptionNonce, EphemeralKeyPair, X25519PublicKey, X25519StaticSecret, DATA_KEY_LEN,
    NONCE_LEN, TAG_LEN,
};
use crate::envelope::FormatVersion;
use crate::error::{PermsError, Result};

/// Wire size of an ECIES-wrapped data key.
pub const ECIES_WRAPPED_LEN: usize = 32 + NONCE_LEN + DATA_KEY_LEN + TAG_LEN;

/// Wrap `data_key` for `recipient`.
pub fn wrap(recipient: &PublicKey, data_key: &DataKey) -> Result<Vec<u8>> {
    match recipient {
        PublicKey::Rsa(key) => wrap_rsa(key, data_key),
        PublicKey::Ed25519(key) => {
            EciesPayload::create(data_key, &X25519PublicKey::from_ed25519(key))
                .map(|payload| payload.to_bytes())
        }
    }
}

/// Unwrap a data key with the caller's private key.
///
/// Every failure is reported as [`PermsError::DecryptionFailed`] so callers
/// cannot distinguish padding errors from wrong keys.
pub fn unwrap(key: &PrivateKey, wrapped: &[u8], version: FormatVersion) -> Result<DataKey> {
    match key {
        PrivateKey::Rsa(key) => unwrap_rsa(key, wrapped, version),
        PrivateKey::Ed25519(key) => {
            let secret = X25519StaticSecret::from_ed25519(key);
            EciesPayload::from_bytes(wrapped)?.decrypt(&secret)
        }
    }
}

fn wrap_rsa(key: &RsaPublicKey, data_key: &DataKey) -> Result<Vec<u8>> {
    key.encrypt(
        &mut rand::thread_rng(),
        Oaep::new::<Sha256>(),
        data_key.as_bytes(),
    )
    .map_err(|e| PermsError::EncryptionError(format!("rsa-oaep: {e}")))
}

fn unwrap_rsa(key: &RsaPrivateKey, wrapped: &[u8], version: FormatVersion) -> Result<DataKey> {
    let oaep = key.decrypt(Oaep::new::<Sha256>(), wrapped).map(Zeroizing::new);

    let plain = match (oaep, version) {
        (Ok(plain), _) => plain,
        (Err(_), FormatVersion::Legacy) => key
            .decrypt(Pkcs1v15Encrypt, wrapped)
            .map(Zeroizing::new)
            .map_err(|_| PermsError::DecryptionFailed("rsa unwrap failed".into()))?,
        (Err(_), FormatVersion::V2) => {
            return Err(PermsError::DecryptionFailed("rsa-oaep unwrap failed".into()))
        }
    };
    DataKey::from_slice(&plain)
}

/// An ECIES-wrapped data key.
///
/// Wire form: `ephemeral_public(32) ‖ nonce(12) ‖ sealed(32 + 16)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EciesPayload {
    /// Ephemeral X25519 public key (sender's side of ECDH).
    pub ephemeral_public: X25519PublicKey,

    /// Nonce used for sealing.
    pub nonce: EncryptionNonce,

    /// The data key, sealed with ChaCha20-Poly1305.
    pub sealed: Vec<u8>,
}

impl EciesPayload {
    /// Seal a data key for a recipient's X25519 public key.
    pub fn create(data_key: &DataKey, recipient_public: &X25519PublicKey) -> Result<Self> {
        let ephemeral = EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public_key();

        let shared = ephemeral.diffie_hellman(recipient_public)?;
        let wrap_key = shared.derive_wrap_key(&ephemeral_public, recipient_public);

        let nonce = EncryptionNonce::generate();
        let sealed = wrap_key.encrypt(data_key.as_bytes(), &nonce)?;

        Ok(Self {
            ephemeral_public,
            nonce,
            sealed,
        })
    }

    /// Recover the data key with the recipient's secret.
    pub fn decrypt(&self, recipient_secret: &X25519StaticSecret) -> Result<DataKey> {
        let shared = recipient_secret
            .diffie_hellman(&self.ephemeral_public)
            .map_err(|e| PermsError::DecryptionFailed(e.to_string()))?;
        let wrap_key = shared.derive_wrap_key(&self.ephemeral_public, &recipient_secret.public_key());

        let key_bytes = wrap_key.decrypt(&self.sealed, &self.nonce)?;
        DataKey::from_slice(&key_bytes)
    }

    /// Serialize to the fixed wire layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32 + NONCE_LEN + self.sealed.len());
        buf.extend_from_slice(self.ephemeral_public.as_bytes());
        buf.extend_from_slice(self.nonce.as_bytes());
        buf.extend_from_slice(&self.sealed);
        buf
    }

    /// Deserialize from the fixed wire layout.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ECIES_WRAPPED_LEN {
            return Err(PermsError::DecryptionFailed(format!(
                "wrapped key is {} bytes, expected {ECIES_WRAPPED_LEN}",
                bytes.len()
            )));
        }
        let (ephemeral, rest) = bytes.split_at(32);
        let (nonce, sealed) = rest.split_at(NONCE_LEN);

        let mut ephemeral_public = [0u8; 32];
        ephemeral_public.copy_from_slice(ephemeral);
        let mut nonce_bytes = [0u8; NONCE_LEN];
        nonce_bytes.copy_from_slice(nonce);

        Ok(Self {
            ephemeral_public: X25519PublicKey::from_bytes(ephemeral_public),
            nonce: EncryptionNonce::from_bytes(nonce_bytes),
            sealed: sealed.to_vec(),
        })
    }
}
