//! Cryptographic utilities for envelope encryption.
//!
//! Two layers:
//! - [`DataKey`]: the per-environment AES-256-GCM content key.
//! - X25519 key agreement plus ChaCha20-Poly1305, used to wrap a data key
//!   for an Ed25519 recipient (ECIES).

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm,
};
use chacha20poly1305::ChaCha20Poly1305;
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::RngCore;
use std::fmt;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{PermsError, Result};

/// Size of a data key in bytes.
pub const DATA_KEY_LEN: usize = 32;

/// Size of an AEAD nonce (both AES-GCM and ChaCha20-Poly1305).
pub const NONCE_LEN: usize = 12;

/// Size of an AEAD tag.
pub const TAG_LEN: usize = 16;

/// A 256-bit content key. Regenerated on every envelope mutation.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DataKey([u8; DATA_KEY_LEN]);

impl DataKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; DATA_KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; DATA_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a slice; the slice must be exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; DATA_KEY_LEN] = bytes.try_into().map_err(|_| {
            PermsError::DecryptionFailed(format!(
                "data key is {} bytes, expected {DATA_KEY_LEN}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; DATA_KEY_LEN] {
        &self.0
    }

    /// AES-256-GCM encrypt with a fresh random IV.
    ///
    /// Output layout: `IV(12) ‖ ciphertext ‖ tag(16)`.
    pub fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new_from_slice(&self.0)
            .map_err(|e| PermsError::EncryptionError(e.to_string()))?;

        let nonce = EncryptionNonce::generate();
        let sealed = cipher
            .encrypt(
                aes_gcm::Nonce::from_slice(nonce.as_bytes()),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|e| PermsError::EncryptionError(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(nonce.as_bytes());
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Reverse of [`DataKey::encrypt`].
    ///
    /// Any failure (short input, wrong key, flipped bit, wrong `aad`) is a
    /// [`PermsError::DecryptionFailed`].
    pub fn decrypt(&self, blob: &[u8], aad: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(PermsError::DecryptionFailed(format!(
                "ciphertext is {} bytes, shorter than IV and tag",
                blob.len()
            )));
        }
        let (iv, sealed) = blob.split_at(NONCE_LEN);

        let cipher = Aes256Gcm::new_from_slice(&self.0)
            .map_err(|e| PermsError::DecryptionFailed(e.to_string()))?;
        cipher
            .decrypt(aes_gcm::Nonce::from_slice(iv), Payload { msg: sealed, aad })
            .map(Zeroizing::new)
            .map_err(|_| {
                PermsError::DecryptionFailed("wrong key, corrupted, or tampered file".into())
            })
    }
}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DataKey(<redacted>)")
    }
}

/// An X25519 public key (32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct X25519PublicKey(pub [u8; 32]);

impl X25519PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Birational map of an Ed25519 public key to its Montgomery form.
    pub fn from_ed25519(key: &VerifyingKey) -> Self {
        Self(key.to_montgomery().to_bytes())
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to x25519-dalek PublicKey.
    pub fn to_dalek(&self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

impl From<PublicKey> for X25519PublicKey {
    fn from(pk: PublicKey) -> Self {
        Self(*pk.as_bytes())
    }
}

/// An X25519 static secret, derived from an Ed25519 signing key.
pub struct X25519StaticSecret(StaticSecret);

impl X25519StaticSecret {
    /// The X25519 scalar matching an Ed25519 key's Montgomery public point.
    pub fn from_ed25519(key: &SigningKey) -> Self {
        let scalar = Zeroizing::new(key.to_scalar_bytes());
        Self(StaticSecret::from(*scalar))
    }

    /// Create from raw scalar bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    /// Derive the public key.
    pub fn public_key(&self) -> X25519PublicKey {
        X25519PublicKey::from(PublicKey::from(&self.0))
    }

    /// Perform key agreement with a peer's public key.
    pub fn diffie_hellman(&self, peer_public: &X25519PublicKey) -> Result<SharedKey> {
        let shared = self.0.diffie_hellman(&peer_public.to_dalek());
        SharedKey::contributory(shared)
    }
}

/// Ephemeral key pair for one-time key agreement.
pub struct EphemeralKeyPair {
    secret: EphemeralSecret,
    public: X25519PublicKey,
}

impl EphemeralKeyPair {
    /// Generate a new ephemeral key pair.
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(rand::thread_rng());
        let public = X25519PublicKey::from(PublicKey::from(&secret));
        Self { secret, public }
    }

    /// Get the public key.
    pub fn public_key(&self) -> X25519PublicKey {
        self.public
    }

    /// Perform key agreement with a peer's public key.
    ///
    /// Consumes the ephemeral secret (can only be used once).
    pub fn diffie_hellman(self, peer_public: &X25519PublicKey) -> Result<SharedKey> {
        let shared = self.secret.diffie_hellman(&peer_public.to_dalek());
        SharedKey::contributory(shared)
    }
}

/// A shared secret derived from X25519 key agreement.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedKey([u8; 32]);

impl SharedKey {
    fn contributory(shared: x25519_dalek::SharedSecret) -> Result<Self> {
        if !shared.was_contributory() {
            return Err(PermsError::KeyAgreementFailed(
                "peer public key has low order".into(),
            ));
        }
        Ok(Self(*shared.as_bytes()))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive the key-wrapping key for one ephemeral/recipient pair.
    ///
    /// BLAKE3 derive-key mode; both public keys are bound into the context.
    pub fn derive_wrap_key(
        &self,
        ephemeral_public: &X25519PublicKey,
        recipient_public: &X25519PublicKey,
    ) -> WrapKey {
        let mut hasher = blake3::Hasher::new_derive_key("envseal 2024 ecies data-key wrap v2");
        hasher.update(&self.0);
        hasher.update(ephemeral_public.as_bytes());
        hasher.update(recipient_public.as_bytes());
        WrapKey(*hasher.finalize().as_bytes())
    }
}

/// A 256-bit ChaCha20-Poly1305 key that seals one data key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct WrapKey([u8; 32]);

impl WrapKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Encrypt data with this key.
    pub fn encrypt(&self, plaintext: &[u8], nonce: &EncryptionNonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| PermsError::EncryptionError(e.to_string()))?;

        cipher
            .encrypt(chacha20poly1305::Nonce::from_slice(&nonce.0), plaintext)
            .map_err(|e| PermsError::EncryptionError(e.to_string()))
    }

    /// Decrypt data with this key.
    pub fn decrypt(&self, ciphertext: &[u8], nonce: &EncryptionNonce) -> Result<Zeroizing<Vec<u8>>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| PermsError::DecryptionFailed(e.to_string()))?;

        cipher
            .decrypt(chacha20poly1305::Nonce::from_slice(&nonce.0), ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| PermsError::DecryptionFailed("wrapped data key did not authenticate".into()))
    }
}

/// A 96-bit AEAD nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionNonce(pub [u8; NONCE_LEN]);

impl EncryptionNonce {
    /// Generate a new random nonce.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_roundtrip() {
        let key = DataKey::generate();
        let blob = key.encrypt(b"A=1\nB=2\n", b"aad").unwrap();
        assert_eq!(blob.len(), NONCE_LEN + 8 + TAG_LEN);

        let plaintext = key.decrypt(&blob, b"aad").unwrap();
        assert_eq!(plaintext.as_slice(), b"A=1\nB=2\n");
    }

    #[test]
    fn test_content_fresh_iv_per_call() {
        let key = DataKey::generate();
        let a = key.encrypt(b"same", b"").unwrap();
        let b = key.encrypt(b"same", b"").unwrap();
        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
    }

    #[test]
    fn test_content_wrong_key_fails() {
        let blob = DataKey::generate().encrypt(b"secret", b"").unwrap();
        assert!(matches!(
            DataKey::generate().decrypt(&blob, b""),
            Err(PermsError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_content_aad_mismatch_fails() {
        let key = DataKey::generate();
        let blob = key.encrypt(b"secret", b"envseal:v2").unwrap();
        assert!(key.decrypt(&blob, b"").is_err());
    }

    #[test]
    fn test_content_short_input() {
        let key = DataKey::generate();
        for len in 0..NONCE_LEN + TAG_LEN {
            assert!(matches!(
                key.decrypt(&vec![0u8; len], b""),
                Err(PermsError::DecryptionFailed(_))
            ));
        }
    }

    #[test]
    fn test_data_key_debug_redacted() {
        let key = DataKey::from_bytes([0x42; 32]);
        assert_eq!(format!("{:?}", key), "DataKey(<redacted>)");
    }

    #[test]
    fn test_ed25519_to_x25519_agreement() {
        let signing = SigningKey::from_bytes(&[7u8; 32]);
        let secret = X25519StaticSecret::from_ed25519(&signing);

        // The scalar's public point is the Montgomery form of the Ed25519 key.
        assert_eq!(
            secret.public_key(),
            X25519PublicKey::from_ed25519(&signing.verifying_key())
        );

        let ephemeral = EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public_key();
        let sender = ephemeral.diffie_hellman(&secret.public_key()).unwrap();
        let receiver = secret.diffie_hellman(&ephemeral_public).unwrap();
        assert_eq!(sender.as_bytes(), receiver.as_bytes());
    }

    #[test]
    fn test_low_order_point_rejected() {
        let secret = X25519StaticSecret::from_bytes([9u8; 32]);
        let identity = X25519PublicKey::from_bytes([0u8; 32]);
        assert!(matches!(
            secret.diffie_hellman(&identity),
            Err(PermsError::KeyAgreementFailed(_))
        ));
    }

    #[test]
    fn test_wrap_key_binds_both_publics() {
        let shared = SharedKey([0x42; 32]);
        let a = X25519PublicKey::from_bytes([1; 32]);
        let b = X25519PublicKey::from_bytes([2; 32]);

        let k1 = shared.derive_wrap_key(&a, &b);
        let k2 = shared.derive_wrap_key(&a, &b);
        let k3 = shared.derive_wrap_key(&b, &a);
        assert_eq!(k1.0, k2.0);
        assert_ne!(k1.0, k3.0);
    }

    #[test]
    fn test_wrap_key_roundtrip() {
        let key = WrapKey::from_bytes([3; 32]);
        let nonce = EncryptionNonce::generate();
        let sealed = key.encrypt(&[5u8; 32], &nonce).unwrap();
        assert_eq!(sealed.len(), 32 + TAG_LEN);
        assert_eq!(key.decrypt(&sealed, &nonce).unwrap().as_slice(), &[5u8; 32]);
        assert!(WrapKey::from_bytes([4; 32]).decrypt(&sealed, &nonce).is_err());
    }
}
