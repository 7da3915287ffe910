//! # envseal permissions
//!
//! Envelope encryption and recipient grants.
//!
//! ## Overview
//!
//! Each environment is sealed under its own random 32-byte data key
//! (AES-256-GCM). The data key is then wrapped separately for every
//! recipient's public key. Access changes never redistribute plaintext: the
//! envelope is rebuilt with a fresh data key wrapped for the new recipient
//! set.
//!
//! ## Key Concepts
//!
//! - **DataKey**: per-envelope content key, regenerated on every rewrite
//! - **RecipientGrant**: a fingerprint plus that recipient's wrapped data key
//! - **Envelope**: grants plus the encrypted content; the on-disk JSON form
//! - **RecipientSet**: grant/revoke arithmetic over an envelope's recipients
//!
//! ## Wrapping
//!
//! RSA recipients get RSA-OAEP(SHA-256). Ed25519 recipients get ECIES:
//! ephemeral X25519 agreement against the key's Montgomery form, a BLAKE3
//! derived wrap key, and ChaCha20-Poly1305.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use envseal_core::{PrivateKeyEntry, PublicKeyEntry};
//! use envseal_perms::{EnvelopeBuilder, Envelope};
//!
//! # fn demo(alice: PublicKeyEntry, alice_private: PrivateKeyEntry) -> envseal_perms::Result<()> {
//! let envelope = EnvelopeBuilder::new(b"A=1".to_vec())
//!     .recipient(alice)
//!     .build()?;
//!
//! let json = envelope.to_json()?;
//! let plaintext = Envelope::from_json(&json)?.decrypt(&alice_private)?;
//! assert_eq!(plaintext.as_slice(), b"A=1");
//! # Ok(())
//! # }
//! ```

pub mod crypto;
pub mod envelope;
pub mod error;
pub mod grant;
pub mod keyshare;
pub mod state;

pub use crypto::{
    DataKey, EncryptionNonce, EphemeralKeyPair, SharedKey, WrapKey, X25519PublicKey,
    X25519StaticSecret,
};
pub use envelope::{Envelope, EnvelopeBuilder, FormatVersion, CURRENT_VERSION, V2_CONTENT_AAD};
pub use error::{PermsError, Result};
pub use grant::RecipientGrant;
pub use keyshare::EciesPayload;
pub use state::{classify_purge, GrantOutcome, PurgeAction, Recipient, RecipientSet};
