//! Key loading front door.
//!
//! Turns bytes read from disk into [`PrivateKey`] / [`PublicKey`] values,
//! whatever armor they arrive in. The passphrase detector always runs first,
//! so an encrypted key is reported as such rather than as garbage.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use zeroize::Zeroizing;

use crate::error::{CoreError, Result};
use crate::keys::{PrivateKey, PublicKey};
use crate::openssh;
use crate::passphrase;
use crate::validation::{validate_rsa_bits, MIN_RSA_BITS};

/// Substring every private key PEM file contains.
pub const PRIVATE_KEY_MARKER: &str = "PRIVATE KEY-----";

/// A decoded PEM block: its label and binary body.
pub struct Armor {
    pub label: String,
    pub der: Zeroizing<Vec<u8>>,
}

/// Decode the first PEM block in `text`.
///
/// Lenient about line width (OpenSSH wraps at 70 columns) and CRLF line
/// endings. RFC 1421 header lines (`Proc-Type:` etc.) are skipped.
pub fn decode_armor(text: &str) -> Result<Armor> {
    let mut lines = text.lines().map(str::trim);

    let label = lines
        .by_ref()
        .find_map(|line| {
            line.strip_prefix("-----BEGIN ")
                .and_then(|rest| rest.strip_suffix("-----"))
        })
        .ok_or_else(|| CoreError::Malformed("missing PEM BEGIN line".into()))?
        .to_string();

    let end = format!("-----END {label}-----");
    let mut body = Zeroizing::new(String::new());
    let mut closed = false;
    for line in lines {
        if line == end {
            closed = true;
            break;
        }
        if line.contains(':') {
            continue;
        }
        body.push_str(line);
    }
    if !closed {
        return Err(CoreError::Malformed(format!("missing PEM END line for {label}")));
    }

    let der = STANDARD
        .decode(body.as_bytes())
        .map_err(|e| CoreError::Malformed(format!("invalid base64 in {label}: {e}")))?;

    Ok(Armor {
        label,
        der: Zeroizing::new(der),
    })
}

/// True if `bytes` look like a private key file.
pub fn contains_private_key_marker(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes)
        .map(|text| text.contains(PRIVATE_KEY_MARKER))
        .unwrap_or(false)
}

/// Parse a private key, rejecting RSA keys below [`MIN_RSA_BITS`].
///
/// Accepted forms, tried by PEM label:
/// - `OPENSSH PRIVATE KEY` (openssh-key-v1 container)
/// - `PRIVATE KEY` (unencrypted PKCS#8, RSA or Ed25519)
/// - `RSA PRIVATE KEY` (PKCS#1)
pub fn parse_private_key(bytes: &[u8]) -> Result<PrivateKey> {
    parse_private_key_with_min_bits(bytes, MIN_RSA_BITS)
}

/// [`parse_private_key`] with a caller-chosen RSA floor.
pub fn parse_private_key_with_min_bits(bytes: &[u8], min_rsa_bits: usize) -> Result<PrivateKey> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| CoreError::Malformed("private key is not PEM text".into()))?;

    passphrase::ensure_unencrypted(text)?;

    let armor = decode_armor(text)?;
    let key = match armor.label.as_str() {
        openssh::PEM_LABEL => openssh::parse(&armor.der)?.key,
        "PRIVATE KEY" => PrivateKey::from_pkcs8_der(&armor.der)?,
        "RSA PRIVATE KEY" => PrivateKey::from_pkcs1_der(&armor.der)?,
        other => {
            return Err(CoreError::Malformed(format!(
                "unexpected PEM label {other:?} for a private key"
            )))
        }
    };

    validate_rsa_bits(&key.public_key(), min_rsa_bits)
        .map_err(|e| CoreError::UnsupportedAlgorithm(e.to_string()))?;

    Ok(key)
}

/// Parse a public key from SPKI PEM or an OpenSSH `authorized_keys` line.
///
/// No strength check is applied here; see
/// [`validate_public_key_strength`](crate::validate_public_key_strength).
pub fn parse_public_key(bytes: &[u8]) -> Result<PublicKey> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| CoreError::Malformed("public key is not text".into()))?
        .trim();

    if text.starts_with("-----BEGIN ") {
        PublicKey::from_spki_pem(text)
    } else {
        openssh::parse_public_line(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passphrase::KeyFormat;
    use crate::types::Algorithm;

    macro_rules! fixture {
        ($name:literal) => {
            include_bytes!(concat!("../../envseal-testkit/fixtures/", $name))
        };
    }

    const ALICE_FP: &str = "dfb7778650f4bc48bb464d8f0d4f72684cc4028b000fe4e523a0180581475229";
    const BOB_FP: &str = "7c939c3a728b64f50c0a19391a05d226969c2032b9384c1daedb7d61ad948479";

    #[test]
    fn test_all_private_forms_agree_on_fingerprint() {
        for bytes in [
            &fixture!("alice_ed25519")[..],
            &fixture!("alice_ed25519.pkcs8.pem")[..],
        ] {
            let key = parse_private_key(bytes).unwrap();
            assert_eq!(key.algorithm(), Algorithm::Ed25519);
            assert_eq!(key.fingerprint().unwrap().to_hex(), ALICE_FP);
        }

        for bytes in [
            &fixture!("bob_rsa")[..],
            &fixture!("bob_rsa.pkcs8.pem")[..],
            &fixture!("bob_rsa.pkcs1.pem")[..],
        ] {
            let key = parse_private_key(bytes).unwrap();
            assert_eq!(key.algorithm(), Algorithm::Rsa);
            assert_eq!(key.fingerprint().unwrap().to_hex(), BOB_FP);
        }
    }

    #[test]
    fn test_openssh_and_pkcs8_keys_sign_identically() {
        use ed25519_dalek::{Signer, Verifier};
        use rsa::Pkcs1v15Sign;
        use sha2::{Digest, Sha256};

        let message = b"DB_URL=postgres://staging";

        let from_openssh = parse_private_key(fixture!("alice_ed25519")).unwrap();
        let from_pkcs8 = parse_private_key(fixture!("alice_ed25519.pkcs8.pem")).unwrap();
        let (PrivateKey::Ed25519(openssh), PrivateKey::Ed25519(pkcs8)) = (&from_openssh, &from_pkcs8)
        else {
            panic!("alice fixtures are not ed25519");
        };
        let signature = openssh.sign(message);
        assert_eq!(signature, pkcs8.sign(message));
        pkcs8.verifying_key().verify(message, &signature).unwrap();

        let from_openssh = parse_private_key(fixture!("bob_rsa")).unwrap();
        let from_pkcs8 = parse_private_key(fixture!("bob_rsa.pkcs8.pem")).unwrap();
        let (PrivateKey::Rsa(openssh), PrivateKey::Rsa(pkcs8)) = (&from_openssh, &from_pkcs8) else {
            panic!("bob fixtures are not rsa");
        };
        let digest = Sha256::digest(message);
        let signature = openssh.sign(Pkcs1v15Sign::new::<Sha256>(), &digest).unwrap();
        assert_eq!(
            signature,
            pkcs8.sign(Pkcs1v15Sign::new::<Sha256>(), &digest).unwrap()
        );
        pkcs8
            .to_public_key()
            .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, &signature)
            .unwrap();
    }

    #[test]
    fn test_public_forms_agree_on_fingerprint() {
        let spki = parse_public_key(fixture!("alice_ed25519.spki.pem")).unwrap();
        let line = parse_public_key(fixture!("alice_ed25519.pub")).unwrap();
        assert_eq!(spki, line);
        assert_eq!(line.fingerprint().unwrap().to_hex(), ALICE_FP);

        let spki = parse_public_key(fixture!("bob_rsa.spki.pem")).unwrap();
        let line = parse_public_key(fixture!("bob_rsa.pub")).unwrap();
        assert_eq!(spki, line);
        assert_eq!(line.fingerprint().unwrap().to_hex(), BOB_FP);
    }

    #[test]
    fn test_passphrase_protected_forms() {
        let cases: [(&[u8], KeyFormat); 3] = [
            (fixture!("carol_ed25519_protected"), KeyFormat::OpenSsh),
            (fixture!("encrypted_pkcs8.pem"), KeyFormat::Pkcs8),
            (fixture!("legacy_encrypted_rsa.pem"), KeyFormat::LegacyPem),
        ];
        for (bytes, expected) in cases {
            match parse_private_key(bytes) {
                Err(CoreError::PassphraseProtected { format }) => assert_eq!(format, expected),
                other => panic!("expected PassphraseProtected, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_weak_rsa_rejected() {
        let err = parse_private_key(fixture!("weak_rsa1024")).unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedAlgorithm(_)));

        // A lower floor admits it.
        let key = parse_private_key_with_min_bits(fixture!("weak_rsa1024"), 1024).unwrap();
        assert_eq!(key.public_key().rsa_bits(), Some(1024));
    }

    #[test]
    fn test_ecdsa_rejected() {
        let err = parse_private_key(fixture!("dave_ecdsa")).unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedAlgorithm(_)));
        let err = parse_public_key(fixture!("dave_ecdsa.pub")).unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedAlgorithm(_)));
    }

    #[test]
    fn test_not_a_key() {
        assert!(matches!(
            parse_private_key(b"hello world"),
            Err(CoreError::Malformed(_))
        ));
        assert!(matches!(
            parse_private_key(&[0xff, 0xfe, 0x00]),
            Err(CoreError::Malformed(_))
        ));
        assert!(matches!(
            parse_private_key(fixture!("alice_ed25519.spki.pem")),
            Err(CoreError::Malformed(_))
        ));
    }

    #[test]
    fn test_armor_missing_end() {
        let err = decode_armor("-----BEGIN PUBLIC KEY-----\nAAAA\n").err().unwrap();
        assert!(matches!(err, CoreError::Malformed(_)));
    }

    #[test]
    fn test_armor_crlf() {
        let text = "-----BEGIN TEST-----\r\naGVs\r\nbG8=\r\n-----END TEST-----\r\n";
        let armor = decode_armor(text).unwrap();
        assert_eq!(armor.label, "TEST");
        assert_eq!(armor.der.as_slice(), b"hello");
    }

    #[test]
    fn test_private_key_marker() {
        assert!(contains_private_key_marker(fixture!("alice_ed25519")));
        assert!(contains_private_key_marker(fixture!("bob_rsa.pkcs1.pem")));
        assert!(!contains_private_key_marker(fixture!("alice_ed25519.pub")));
        assert!(!contains_private_key_marker(&[0xff, 0xfe]));
    }
}
