//! Error types for the engine.

use thiserror::Error;

use envseal_core::{CoreError, Fingerprint, ValidationError};
use envseal_perms::PermsError;
use envseal_store::StoreError;

/// Coarse classification of an [`EngineError`], stable across wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Malformed,
    PassphraseProtected,
    UnsupportedAlgorithm,
    AccessDenied,
    DecryptionFailed,
    NoRecipients,
    NotFound,
    InvalidName,
    AlreadyExists,
    Io,
    Serialization,
}

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Name or key strength validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Key material error.
    #[error(transparent)]
    Key(#[from] CoreError),

    /// Envelope or wrapping error.
    #[error(transparent)]
    Perms(#[from] PermsError),

    /// Storage error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// None of the caller's keys is a recipient.
    #[error(
        "access denied to {environment:?}: none of your keys [{}] is a recipient [{}]",
        .caller_keys.join(", "),
        .recipients.join(", ")
    )]
    AccessDenied {
        environment: String,
        caller_keys: Vec<String>,
        recipients: Vec<String>,
    },

    /// Environment not found.
    #[error("environment {0:?} not found")]
    EnvironmentNotFound(String),

    /// Environment already exists.
    #[error("environment {0:?} already exists")]
    EnvironmentExists(String),

    /// Public key record not found.
    #[error("public key {0:?} not found")]
    KeyNotFound(String),

    /// Public key name already taken.
    #[error("public key {0:?} already exists")]
    KeyExists(String),

    /// The same key is already registered under another name.
    #[error("key is already registered as {existing:?}")]
    DuplicateKey { existing: String },

    /// Revoking a name that is not on the envelope.
    #[error("{key:?} is not a recipient")]
    NotARecipient { key: String },

    /// A recipient's public key record is gone, so it cannot be re-wrapped.
    #[error("no public key record for recipient {name:?} ({fingerprint}); add it back or revoke it")]
    MissingRecipientKey {
        name: String,
        fingerprint: Fingerprint,
    },

    /// The caller-supplied override key is unusable.
    #[error("private key from {label}: {source}")]
    OverrideKey {
        label: String,
        #[source]
        source: CoreError,
    },

    /// An error scoped to one environment.
    #[error("{name}: {source}")]
    Environment {
        name: String,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    /// Attach an environment name, unless one is already attached.
    pub fn in_environment(self, name: &str) -> Self {
        match self {
            already @ EngineError::Environment { .. } => already,
            other => EngineError::Environment {
                name: name.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The environment this error is scoped to, if any.
    pub fn environment(&self) -> Option<&str> {
        match self {
            EngineError::Environment { name, .. } => Some(name),
            EngineError::AccessDenied { environment, .. } => Some(environment),
            _ => None,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(e) => validation_kind(e),
            EngineError::Key(e) | EngineError::OverrideKey { source: e, .. } => core_kind(e),
            EngineError::Perms(e) => perms_kind(e),
            EngineError::Store(e) => store_kind(e),
            EngineError::AccessDenied { .. } => ErrorKind::AccessDenied,
            EngineError::EnvironmentNotFound(_)
            | EngineError::KeyNotFound(_)
            | EngineError::NotARecipient { .. }
            | EngineError::MissingRecipientKey { .. } => ErrorKind::NotFound,
            EngineError::EnvironmentExists(_)
            | EngineError::KeyExists(_)
            | EngineError::DuplicateKey { .. } => ErrorKind::AlreadyExists,
            EngineError::Environment { source, .. } => source.kind(),
        }
    }
}

fn validation_kind(e: &ValidationError) -> ErrorKind {
    match e {
        ValidationError::WeakRsaKey { .. } | ValidationError::OversizedRsaKey { .. } => {
            ErrorKind::UnsupportedAlgorithm
        }
        _ => ErrorKind::InvalidName,
    }
}

fn core_kind(e: &CoreError) -> ErrorKind {
    match e {
        CoreError::Malformed(_) | CoreError::EncodingError(_) => ErrorKind::Malformed,
        CoreError::PassphraseProtected { .. } => ErrorKind::PassphraseProtected,
        CoreError::UnsupportedAlgorithm(_) => ErrorKind::UnsupportedAlgorithm,
    }
}

fn perms_kind(e: &PermsError) -> ErrorKind {
    match e {
        PermsError::NoRecipients => ErrorKind::NoRecipients,
        PermsError::UnknownRecipient(_) => ErrorKind::NotFound,
        PermsError::NotARecipient(_) => ErrorKind::AccessDenied,
        PermsError::DecryptionFailed(_) | PermsError::KeyAgreementFailed(_) => {
            ErrorKind::DecryptionFailed
        }
        PermsError::EncryptionError(_)
        | PermsError::UnsupportedVersion(_)
        | PermsError::InvalidGrant(_) => ErrorKind::Malformed,
        PermsError::SerializationError(_) => ErrorKind::Serialization,
        PermsError::Core(e) => core_kind(e),
    }
}

fn store_kind(e: &StoreError) -> ErrorKind {
    match e {
        StoreError::Io(_) | StoreError::LockPoisoned => ErrorKind::Io,
        StoreError::Serialization(_) => ErrorKind::Serialization,
        StoreError::NotFound(_) => ErrorKind::NotFound,
        StoreError::AlreadyExists(_) => ErrorKind::AlreadyExists,
        StoreError::InvalidName(e) => validation_kind(e),
        StoreError::Key(e) => core_kind(e),
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use envseal_core::KeyFormat;

    #[test]
    fn test_kind_survives_environment_context() {
        let err = EngineError::from(PermsError::NoRecipients).in_environment("staging");
        assert_eq!(err.kind(), ErrorKind::NoRecipients);
        assert_eq!(err.environment(), Some("staging"));
        assert!(err.to_string().starts_with("staging: "));
    }

    #[test]
    fn test_context_is_not_doubled() {
        let err = EngineError::EnvironmentNotFound("a".into())
            .in_environment("a")
            .in_environment("a");
        assert_eq!(err.to_string(), "a: environment \"a\" not found");
    }

    #[test]
    fn test_access_denied_lists_names() {
        let err = EngineError::AccessDenied {
            environment: "prod".into(),
            caller_keys: vec!["id_ed25519".into(), "id_rsa".into()],
            recipients: vec!["bob".into()],
        };
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
        let msg = err.to_string();
        assert!(msg.contains("[id_ed25519, id_rsa]"));
        assert!(msg.contains("[bob]"));
    }

    #[test]
    fn test_nested_kinds() {
        let cases = [
            (
                EngineError::from(StoreError::Key(CoreError::PassphraseProtected {
                    format: KeyFormat::OpenSsh,
                })),
                ErrorKind::PassphraseProtected,
            ),
            (
                EngineError::from(PermsError::DecryptionFailed("x".into())),
                ErrorKind::DecryptionFailed,
            ),
            (
                EngineError::from(ValidationError::EmptyName),
                ErrorKind::InvalidName,
            ),
            (
                EngineError::from(ValidationError::WeakRsaKey {
                    bits: 1024,
                    min: 2048,
                }),
                ErrorKind::UnsupportedAlgorithm,
            ),
            (
                EngineError::OverrideKey {
                    label: "ENVSEAL_PRIVATE_KEY".into(),
                    source: CoreError::UnsupportedAlgorithm("ecdsa".into()),
                },
                ErrorKind::UnsupportedAlgorithm,
            ),
        ];
        for (err, kind) in cases {
            assert_eq!(err.kind(), kind, "{err}");
        }
    }
}
