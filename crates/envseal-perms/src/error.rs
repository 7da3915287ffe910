//! Error types for envelope and grant operations.

use thiserror::Error;

use envseal_core::Fingerprint;

/// Errors that can occur while sealing or opening envelopes.
#[derive(Debug, Error)]
pub enum PermsError {
    /// An envelope would end up with no one able to open it.
    #[error("refusing to leave the environment with no recipients")]
    NoRecipients,

    /// Named recipient is not on the envelope.
    #[error("no recipient named {0:?}")]
    UnknownRecipient(String),

    /// The key used to open an envelope is not among its grants.
    #[error("key {0:?} is not a recipient")]
    NotARecipient(Fingerprint),

    /// Content or data-key decryption failed.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// Encryption error.
    #[error("encryption error: {0}")]
    EncryptionError(String),

    /// X25519 agreement produced a non-contributory secret.
    #[error("key agreement failed: {0}")]
    KeyAgreementFailed(String),

    /// Envelope `version` field this build does not understand.
    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(u32),

    /// A grant entry is internally inconsistent.
    #[error("invalid grant: {0}")]
    InvalidGrant(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Core error.
    #[error(transparent)]
    Core(#[from] envseal_core::CoreError),
}

/// Result type for envelope operations.
pub type Result<T> = std::result::Result<T, PermsError>;
