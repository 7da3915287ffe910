//! # envseal core
//!
//! Pure primitives for envseal: key parsing, fingerprints, and validation.
//!
//! This crate contains no I/O and no storage. It turns bytes into typed keys
//! and decides whether names and keys are acceptable.
//!
//! ## Key Types
//!
//! - [`PublicKey`] / [`PrivateKey`] - algorithm sum types (RSA, Ed25519)
//! - [`Fingerprint`] - SHA-256 of a public key's SPKI DER; the only identity
//! - [`PublicKeyEntry`] / [`PrivateKeyEntry`] - named keys with fingerprints
//!
//! ## Key Formats
//!
//! Private keys load from OpenSSH containers (see [`openssh`]), PKCS#8, or
//! PKCS#1 PEM. Passphrase-protected keys are detected up front by
//! [`passphrase`] and rejected.

pub mod codec;
pub mod error;
pub mod keys;
pub mod openssh;
pub mod passphrase;
pub mod types;
pub mod validation;

pub use codec::{contains_private_key_marker, parse_private_key, parse_public_key};
pub use error::{CoreError, Result, ValidationError};
pub use keys::{PrivateKey, PrivateKeyEntry, PublicKey, PublicKeyEntry};
pub use passphrase::KeyFormat;
pub use types::{Algorithm, Fingerprint};
pub use validation::{
    validate_name, validate_public_key_strength, validate_rsa_bits, MAX_NAME_LEN, MAX_RSA_BITS,
    MIN_RSA_BITS,
};
