//! Writes `openssh-key-v1` containers, so tests can feed generated keys
//! through the same parser as real `ssh-keygen` output.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ed25519_dalek::{SigningKey, VerifyingKey};

use envseal_core::openssh::{AUTH_MAGIC, KEY_TYPE_ED25519, KEY_TYPE_RSA, PEM_LABEL};

/// Line width `ssh-keygen` wraps the base64 body at.
const LINE_WIDTH: usize = 70;

/// Cipher block size used for padding an unencrypted private section.
const BLOCK_SIZE: usize = 8;

/// Knobs for building deliberately broken containers.
#[derive(Debug, Clone)]
pub struct Container {
    pub ciphername: String,
    pub kdfname: String,
    pub check1: u32,
    pub check2: u32,
    pub comment: String,
}

impl Default for Container {
    fn default() -> Self {
        Self {
            ciphername: "none".into(),
            kdfname: "none".into(),
            check1: 0x5EA1_5EA1,
            check2: 0x5EA1_5EA1,
            comment: String::new(),
        }
    }
}

impl Container {
    /// The container body for an ed25519 key, before armoring.
    pub fn ed25519_body(&self, key: &SigningKey) -> Vec<u8> {
        let public = key.verifying_key();

        let mut private = Vec::new();
        put_u32(&mut private, self.check1);
        put_u32(&mut private, self.check2);
        put_string(&mut private, KEY_TYPE_ED25519.as_bytes());
        put_string(&mut private, public.as_bytes());
        let mut keypair = key.to_bytes().to_vec();
        keypair.extend_from_slice(public.as_bytes());
        put_string(&mut private, &keypair);
        put_string(&mut private, self.comment.as_bytes());
        let mut pad = 1u8;
        while private.len() % BLOCK_SIZE != 0 {
            private.push(pad);
            pad += 1;
        }

        let mut out = AUTH_MAGIC.to_vec();
        put_string(&mut out, self.ciphername.as_bytes());
        put_string(&mut out, self.kdfname.as_bytes());
        put_string(&mut out, b"");
        put_u32(&mut out, 1);
        put_string(&mut out, &ed25519_public_blob(&public));
        put_string(&mut out, &private);
        out
    }

    /// The armored container for an ed25519 key.
    pub fn ed25519_pem(&self, key: &SigningKey) -> String {
        armor(&self.ed25519_body(key))
    }
}

/// Encode an unencrypted ed25519 key the way `ssh-keygen` does.
pub fn encode_ed25519(key: &SigningKey, comment: &str) -> String {
    Container {
        comment: comment.into(),
        ..Container::default()
    }
    .ed25519_pem(key)
}

/// A container that claims to be passphrase-protected.
pub fn encode_ed25519_protected(key: &SigningKey) -> String {
    Container {
        ciphername: "aes256-ctr".into(),
        kdfname: "bcrypt".into(),
        ..Container::default()
    }
    .ed25519_pem(key)
}

/// An `authorized_keys` line for an ed25519 key.
pub fn ed25519_public_line(key: &VerifyingKey, comment: &str) -> String {
    format!(
        "{KEY_TYPE_ED25519} {} {comment}",
        STANDARD.encode(ed25519_public_blob(key))
    )
}

/// An `authorized_keys` line for an RSA key given as big-endian magnitudes.
///
/// Nothing checks that `modulus` is a product of primes; this is for
/// exercising size limits.
pub fn rsa_public_line(modulus: &[u8], exponent: &[u8], comment: &str) -> String {
    let mut blob = Vec::new();
    put_string(&mut blob, KEY_TYPE_RSA.as_bytes());
    put_mpint(&mut blob, exponent);
    put_mpint(&mut blob, modulus);
    format!("{KEY_TYPE_RSA} {} {comment}", STANDARD.encode(blob))
}

/// Wrap a container body in `OPENSSH PRIVATE KEY` armor.
pub fn armor(body: &[u8]) -> String {
    let encoded = STANDARD.encode(body);
    let mut out = format!("-----BEGIN {PEM_LABEL}-----\n");
    for chunk in encoded.as_bytes().chunks(LINE_WIDTH) {
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }
    out.push_str(&format!("-----END {PEM_LABEL}-----\n"));
    out
}

fn ed25519_public_blob(key: &VerifyingKey) -> Vec<u8> {
    let mut blob = Vec::new();
    put_string(&mut blob, KEY_TYPE_ED25519.as_bytes());
    put_string(&mut blob, key.as_bytes());
    blob
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_string(out: &mut Vec<u8>, bytes: &[u8]) {
    put_u32(out, bytes.len() as u32);
    out.extend_from_slice(bytes);
}

fn put_mpint(out: &mut Vec<u8>, magnitude: &[u8]) {
    if magnitude.first().is_some_and(|&b| b & 0x80 != 0) {
        put_u32(out, magnitude.len() as u32 + 1);
        out.push(0);
        out.extend_from_slice(magnitude);
    } else {
        put_string(out, magnitude);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envseal_core::{parse_private_key, parse_public_key, CoreError, KeyFormat, PrivateKey};

    fn key() -> SigningKey {
        SigningKey::from_bytes(&[7; 32])
    }

    #[test]
    fn test_encoded_key_parses() {
        let pem = encode_ed25519(&key(), "test@example");
        let parsed = parse_private_key(pem.as_bytes()).unwrap();
        let expected = PrivateKey::from(key());
        assert_eq!(parsed.fingerprint().unwrap(), expected.fingerprint().unwrap());
    }

    #[test]
    fn test_protected_container_detected() {
        let pem = encode_ed25519_protected(&key());
        assert!(matches!(
            parse_private_key(pem.as_bytes()),
            Err(CoreError::PassphraseProtected {
                format: KeyFormat::OpenSsh
            })
        ));
    }

    #[test]
    fn test_check_mismatch_rejected() {
        let pem = Container {
            check2: 1,
            ..Container::default()
        }
        .ed25519_pem(&key());
        assert!(matches!(
            parse_private_key(pem.as_bytes()),
            Err(CoreError::Malformed(_))
        ));
    }

    #[test]
    fn test_public_line_parses() {
        let line = ed25519_public_line(&key().verifying_key(), "test");
        let parsed = parse_public_key(line.as_bytes()).unwrap();
        assert_eq!(
            parsed.fingerprint().unwrap(),
            PrivateKey::from(key()).public_key().fingerprint().unwrap()
        );
    }

    #[test]
    fn test_armor_wraps_lines() {
        let pem = armor(&[0u8; 200]);
        assert!(pem.lines().all(|line| line.len() <= LINE_WIDTH || line.starts_with("-----")));
    }
}
