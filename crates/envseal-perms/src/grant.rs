//! Recipient grants.
//!
//! A grant binds a named identity's fingerprint to its own wrapped copy of
//! the envelope's data key. Identity is the fingerprint; the name is a label.

use serde::{Deserialize, Serialize};

use envseal_core::{Algorithm, Fingerprint, PrivateKey, PublicKeyEntry};

use crate::crypto::DataKey;
use crate::envelope::FormatVersion;
use crate::error::{PermsError, Result};
use crate::keyshare;

/// One entry of an envelope's `keys` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientGrant {
    /// Display name of the recipient's key.
    pub name: String,

    /// SHA-256 of the recipient's SPKI DER, lowercase hex on disk.
    pub fingerprint: Fingerprint,

    /// Algorithm used to wrap the data key.
    pub algorithm: Algorithm,

    /// The data key, wrapped for this recipient.
    #[serde(with = "base64_bytes")]
    pub encrypted_data_key: Vec<u8>,
}

impl RecipientGrant {
    /// Wrap `data_key` for a recipient.
    pub fn seal(recipient: &PublicKeyEntry, data_key: &DataKey) -> Result<Self> {
        Ok(Self {
            name: recipient.name.clone(),
            fingerprint: recipient.fingerprint,
            algorithm: recipient.algorithm(),
            encrypted_data_key: keyshare::wrap(&recipient.key, data_key)?,
        })
    }

    /// Unwrap this grant's data key with the matching private key.
    pub fn open(&self, key: &PrivateKey, version: FormatVersion) -> Result<DataKey> {
        if key.algorithm() != self.algorithm {
            return Err(PermsError::InvalidGrant(format!(
                "grant {:?} is {} but the key is {}",
                self.name,
                self.algorithm,
                key.algorithm()
            )));
        }
        keyshare::unwrap(key, &self.encrypted_data_key, version)
    }
}

/// Serde adapter for standard padded base64.
pub(crate) mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s.trim()).map_err(serde::de::Error::custom)
    }
}
