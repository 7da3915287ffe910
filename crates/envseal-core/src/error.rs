//! Error types for envseal core.

use thiserror::Error;

use crate::passphrase::KeyFormat;

/// Errors raised while decoding or encoding key material.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input is structurally invalid: truncated, corrupted, or inconsistent.
    #[error("malformed key: {0}")]
    Malformed(String),

    /// Key is encrypted with a passphrase; envseal never decrypts these.
    #[error(
        "private key is passphrase-protected ({format}); remove the passphrase with \
         `ssh-keygen -p -N \"\" -f <key>` or supply an unencrypted key"
    )]
    PassphraseProtected { format: KeyFormat },

    /// Key type outside rsa/ed25519, or an RSA key of unsupported size.
    #[error("unsupported key algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Re-encoding a key failed.
    #[error("encoding error: {0}")]
    EncodingError(String),
}

/// Errors from name and key-strength validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("name is {len} bytes, maximum is {max}")]
    NameTooLong { len: usize, max: usize },

    #[error("name contains invalid character {0:?} (allowed: letters, digits, '.', '_', '-')")]
    InvalidCharacter(char),

    #[error("name must not start with {0:?}")]
    InvalidLeadingCharacter(char),

    #[error("RSA key is {bits} bits, minimum is {min}")]
    WeakRsaKey { bits: usize, min: usize },

    #[error("RSA key is {bits} bits, maximum is {max}")]
    OversizedRsaKey { bits: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, CoreError>;
