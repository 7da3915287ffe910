//! Asymmetric key handles.
//!
//! Keys are a closed sum over the two supported algorithms. Everything that
//! dispatches on algorithm (fingerprinting, wrapping, strength checks)
//! matches on these enums rather than on strings.

use ed25519_dalek::{SigningKey, VerifyingKey};
use pkcs8::spki::SubjectPublicKeyInfoRef;
use pkcs8::{
    DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding,
    ObjectIdentifier, PrivateKeyInfo,
};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fmt;
use zeroize::Zeroizing;

use crate::codec;
use crate::error::{CoreError, Result};
use crate::types::{Algorithm, Fingerprint};

/// rsaEncryption (PKCS#1).
pub const RSA_ENCRYPTION_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

/// id-Ed25519 (RFC 8410).
pub const ED25519_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");

/// A recipient's public key.
#[derive(Clone, PartialEq, Eq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    Ed25519(VerifyingKey),
}

impl PublicKey {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            PublicKey::Rsa(_) => Algorithm::Rsa,
            PublicKey::Ed25519(_) => Algorithm::Ed25519,
        }
    }

    /// Modulus size in bits for RSA keys.
    pub fn rsa_bits(&self) -> Option<usize> {
        match self {
            PublicKey::Rsa(key) => Some(key.n().bits()),
            PublicKey::Ed25519(_) => None,
        }
    }

    /// DER-encoded SubjectPublicKeyInfo.
    pub fn to_spki_der(&self) -> Result<Vec<u8>> {
        let doc = match self {
            PublicKey::Rsa(key) => key.to_public_key_der(),
            PublicKey::Ed25519(key) => key.to_public_key_der(),
        }
        .map_err(|e| CoreError::EncodingError(e.to_string()))?;
        Ok(doc.to_vec())
    }

    /// PEM `PUBLIC KEY` encoding, the on-disk form of a key record.
    pub fn to_spki_pem(&self) -> Result<String> {
        match self {
            PublicKey::Rsa(key) => key.to_public_key_pem(LineEnding::LF),
            PublicKey::Ed25519(key) => key.to_public_key_pem(LineEnding::LF),
        }
        .map_err(|e| CoreError::EncodingError(e.to_string()))
    }

    /// SHA-256 of the SPKI DER encoding.
    pub fn fingerprint(&self) -> Result<Fingerprint> {
        Ok(Fingerprint::of_spki_der(&self.to_spki_der()?))
    }

    /// Decode SPKI DER, dispatching on the algorithm OID.
    pub fn from_spki_der(der: &[u8]) -> Result<Self> {
        let spki = SubjectPublicKeyInfoRef::try_from(der)
            .map_err(|e| CoreError::Malformed(format!("invalid SubjectPublicKeyInfo: {e}")))?;

        let oid = spki.algorithm.oid;
        if oid == RSA_ENCRYPTION_OID {
            RsaPublicKey::from_public_key_der(der)
                .map(PublicKey::Rsa)
                .map_err(|e| CoreError::Malformed(format!("invalid RSA public key: {e}")))
        } else if oid == ED25519_OID {
            VerifyingKey::from_public_key_der(der)
                .map(PublicKey::Ed25519)
                .map_err(|e| CoreError::Malformed(format!("invalid Ed25519 public key: {e}")))
        } else {
            Err(CoreError::UnsupportedAlgorithm(format!("public key OID {oid}")))
        }
    }

    /// Decode a `-----BEGIN PUBLIC KEY-----` document.
    pub fn from_spki_pem(text: &str) -> Result<Self> {
        let armor = codec::decode_armor(text)?;
        if armor.label != "PUBLIC KEY" {
            return Err(CoreError::Malformed(format!(
                "expected PUBLIC KEY, found {:?}",
                armor.label
            )));
        }
        Self::from_spki_der(&armor.der)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublicKey::Rsa(key) => write!(f, "PublicKey::Rsa({} bits)", key.n().bits()),
            PublicKey::Ed25519(key) => {
                write!(f, "PublicKey::Ed25519({})", &hex::encode(key.as_bytes())[..16])
            }
        }
    }
}

/// A caller's private key.
///
/// Debug output never includes key material.
#[derive(Clone)]
pub enum PrivateKey {
    Rsa(Box<RsaPrivateKey>),
    Ed25519(SigningKey),
}

impl PrivateKey {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            PrivateKey::Rsa(_) => Algorithm::Rsa,
            PrivateKey::Ed25519(_) => Algorithm::Ed25519,
        }
    }

    /// The matching public key.
    pub fn public_key(&self) -> PublicKey {
        match self {
            PrivateKey::Rsa(key) => PublicKey::Rsa(key.to_public_key()),
            PrivateKey::Ed25519(key) => PublicKey::Ed25519(key.verifying_key()),
        }
    }

    /// Fingerprint of the public half.
    pub fn fingerprint(&self) -> Result<Fingerprint> {
        self.public_key().fingerprint()
    }

    /// Decode an unencrypted PKCS#8 `PrivateKeyInfo`.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let info = PrivateKeyInfo::try_from(der)
            .map_err(|e| CoreError::Malformed(format!("invalid PKCS#8 document: {e}")))?;

        let oid = info.algorithm.oid;
        if oid == RSA_ENCRYPTION_OID {
            RsaPrivateKey::from_pkcs8_der(der)
                .map(|key| PrivateKey::Rsa(Box::new(key)))
                .map_err(|e| CoreError::Malformed(format!("invalid RSA private key: {e}")))
        } else if oid == ED25519_OID {
            SigningKey::from_pkcs8_der(der)
                .map(PrivateKey::Ed25519)
                .map_err(|e| CoreError::Malformed(format!("invalid Ed25519 private key: {e}")))
        } else {
            Err(CoreError::UnsupportedAlgorithm(format!("private key OID {oid}")))
        }
    }

    /// Decode a PKCS#1 `RSAPrivateKey`.
    pub fn from_pkcs1_der(der: &[u8]) -> Result<Self> {
        RsaPrivateKey::from_pkcs1_der(der)
            .map(|key| PrivateKey::Rsa(Box::new(key)))
            .map_err(|e| CoreError::Malformed(format!("invalid PKCS#1 RSA key: {e}")))
    }

    /// Unencrypted PKCS#8 PEM encoding.
    pub fn to_pkcs8_pem(&self) -> Result<Zeroizing<String>> {
        match self {
            PrivateKey::Rsa(key) => key.to_pkcs8_pem(LineEnding::LF),
            PrivateKey::Ed25519(key) => key.to_pkcs8_pem(LineEnding::LF),
        }
        .map_err(|e| CoreError::EncodingError(e.to_string()))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey::{}(<redacted>)", self.algorithm())
    }
}

impl From<SigningKey> for PrivateKey {
    fn from(key: SigningKey) -> Self {
        PrivateKey::Ed25519(key)
    }
}

impl From<RsaPrivateKey> for PrivateKey {
    fn from(key: RsaPrivateKey) -> Self {
        PrivateKey::Rsa(Box::new(key))
    }
}

/// A named public key record, as stored in the project's key directory.
#[derive(Debug, Clone)]
pub struct PublicKeyEntry {
    pub name: String,
    pub key: PublicKey,
    pub fingerprint: Fingerprint,
}

impl PublicKeyEntry {
    pub fn new(name: impl Into<String>, key: PublicKey) -> Result<Self> {
        let fingerprint = key.fingerprint()?;
        Ok(Self {
            name: name.into(),
            key,
            fingerprint,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.key.algorithm()
    }
}

/// A named private key the caller holds.
#[derive(Debug, Clone)]
pub struct PrivateKeyEntry {
    pub name: String,
    pub key: PrivateKey,
    pub fingerprint: Fingerprint,
}

impl PrivateKeyEntry {
    pub fn new(name: impl Into<String>, key: PrivateKey) -> Result<Self> {
        let fingerprint = key.fingerprint()?;
        Ok(Self {
            name: name.into(),
            key,
            fingerprint,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.key.algorithm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE_SPKI: &str = include_str!("../../envseal-testkit/fixtures/alice_ed25519.spki.pem");
    const ALICE_PKCS8: &str =
        include_str!("../../envseal-testkit/fixtures/alice_ed25519.pkcs8.pem");
    const BOB_SPKI: &str = include_str!("../../envseal-testkit/fixtures/bob_rsa.spki.pem");
    const BOB_PKCS8: &str = include_str!("../../envseal-testkit/fixtures/bob_rsa.pkcs8.pem");
    const DAVE_SPKI: &str = include_str!("../../envseal-testkit/fixtures/dave_ecdsa.spki.pem");

    const ALICE_FP: &str = "dfb7778650f4bc48bb464d8f0d4f72684cc4028b000fe4e523a0180581475229";
    const BOB_FP: &str = "7c939c3a728b64f50c0a19391a05d226969c2032b9384c1daedb7d61ad948479";

    #[test]
    fn test_ed25519_spki_fingerprint() {
        let key = PublicKey::from_spki_pem(ALICE_SPKI).unwrap();
        assert_eq!(key.algorithm(), Algorithm::Ed25519);
        assert_eq!(key.fingerprint().unwrap().to_hex(), ALICE_FP);
    }

    #[test]
    fn test_rsa_spki_fingerprint() {
        let key = PublicKey::from_spki_pem(BOB_SPKI).unwrap();
        assert_eq!(key.algorithm(), Algorithm::Rsa);
        assert_eq!(key.rsa_bits(), Some(2048));
        assert_eq!(key.fingerprint().unwrap().to_hex(), BOB_FP);
    }

    #[test]
    fn test_private_fingerprint_matches_public() {
        let alice = PrivateKey::from_pkcs8_der(&codec::decode_armor(ALICE_PKCS8).unwrap().der)
            .unwrap();
        assert_eq!(alice.fingerprint().unwrap().to_hex(), ALICE_FP);

        let bob =
            PrivateKey::from_pkcs8_der(&codec::decode_armor(BOB_PKCS8).unwrap().der).unwrap();
        assert_eq!(bob.fingerprint().unwrap().to_hex(), BOB_FP);
    }

    #[test]
    fn test_spki_pem_roundtrip() {
        let key = PublicKey::from_spki_pem(BOB_SPKI).unwrap();
        let pem = key.to_spki_pem().unwrap();
        assert_eq!(PublicKey::from_spki_pem(&pem).unwrap(), key);
    }

    #[test]
    fn test_unsupported_spki_algorithm() {
        let err = PublicKey::from_spki_pem(DAVE_SPKI).unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedAlgorithm(_)));
    }

    #[test]
    fn test_wrong_pem_label() {
        let err = PublicKey::from_spki_pem(ALICE_PKCS8).unwrap_err();
        assert!(matches!(err, CoreError::Malformed(_)));
    }

    #[test]
    fn test_private_debug_is_redacted() {
        let key = PrivateKey::from(SigningKey::from_bytes(&[7u8; 32]));
        assert_eq!(format!("{:?}", key), "PrivateKey::ed25519(<redacted>)");
    }

    #[test]
    fn test_pkcs8_pem_roundtrip() {
        let key = PrivateKey::from(SigningKey::from_bytes(&[9u8; 32]));
        let pem = key.to_pkcs8_pem().unwrap();
        let back = PrivateKey::from_pkcs8_der(&codec::decode_armor(&pem).unwrap().der).unwrap();
        assert_eq!(back.fingerprint().unwrap(), key.fingerprint().unwrap());
    }
}
