//! OpenSSH `openssh-key-v1` private key containers.
//!
//! Layout of the decoded container:
//!
//! ```text
//! "openssh-key-v1\0"
//! string  ciphername
//! string  kdfname
//! string  kdfoptions
//! uint32  number of keys (must be 1)
//! string  public key blob
//! string  private section
//!
//! private section:
//! uint32  check1
//! uint32  check2 (must equal check1)
//! string  key type
//! ...     type-specific fields
//! string  comment
//! byte[]  padding 1, 2, 3, ...
//! ```
//!
//! Every read is bounds-checked; corrupted input produces
//! [`CoreError::Malformed`] and never panics.

use ed25519_dalek::{SigningKey, VerifyingKey};
use pkcs8::DecodePrivateKey;
use rsa::traits::PrivateKeyParts;
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::{CoreError, Result};
use crate::keys::{PrivateKey, PublicKey};
use crate::passphrase::KeyFormat;
use crate::validation::MAX_RSA_BITS;

/// PEM label of an OpenSSH private key.
pub const PEM_LABEL: &str = "OPENSSH PRIVATE KEY";

/// Leading magic of the binary container.
pub const AUTH_MAGIC: &[u8] = b"openssh-key-v1\0";

pub const KEY_TYPE_ED25519: &str = "ssh-ed25519";
pub const KEY_TYPE_RSA: &str = "ssh-rsa";

/// PKCS#8 v1 prefix for an Ed25519 seed (RFC 8410); the 32-byte seed follows.
pub const ED25519_PKCS8_HEADER: [u8; 16] = [
    0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x04, 0x22, 0x04, 0x20,
];

/// A private key decoded from an OpenSSH container.
#[derive(Debug)]
pub struct OpensshKey {
    pub key: PrivateKey,
    pub comment: String,
}

/// Parse a decoded (binary) `openssh-key-v1` container.
pub fn parse(container: &[u8]) -> Result<OpensshKey> {
    let mut r = Reader::new(container);
    read_magic(&mut r)?;

    let ciphername = r.utf8("ciphername")?;
    r.string("kdfname")?;
    r.string("kdfoptions")?;
    if ciphername != "none" {
        return Err(CoreError::PassphraseProtected {
            format: KeyFormat::OpenSsh,
        });
    }

    let count = r.u32("key count")?;
    if count != 1 {
        return Err(CoreError::Malformed(format!(
            "expected exactly one key, container holds {count}"
        )));
    }

    let public_blob = r.string("public key blob")?;
    let private_section = r.string("private section")?;

    let mut p = Reader::new(private_section);
    let check1 = p.u32("check1")?;
    let check2 = p.u32("check2")?;
    if check1 != check2 {
        return Err(CoreError::Malformed(
            "check integers differ (corrupted key or wrong passphrase)".into(),
        ));
    }

    let key_type = p.utf8("key type")?;
    let key = match key_type {
        KEY_TYPE_ED25519 => read_ed25519(&mut p)?,
        KEY_TYPE_RSA => read_rsa(&mut p)?,
        other => return Err(CoreError::UnsupportedAlgorithm(other.to_string())),
    };
    let comment = String::from_utf8_lossy(p.string("comment")?).into_owned();
    check_padding(p.rest())?;

    let public_type = Reader::new(public_blob).utf8("public key type")?;
    if public_type != key_type {
        return Err(CoreError::Malformed(format!(
            "public key type {public_type:?} does not match private key type {key_type:?}"
        )));
    }

    Ok(OpensshKey { key, comment })
}

/// Cipher name of a container, read without touching the key sections.
pub fn ciphername(container: &[u8]) -> Result<&str> {
    let mut r = Reader::new(container);
    read_magic(&mut r)?;
    r.utf8("ciphername")
}

/// Parse an `authorized_keys`-style line: `<type> <base64 blob> [comment]`.
pub fn parse_public_line(line: &str) -> Result<PublicKey> {
    let mut fields = line.split_whitespace();
    let declared = fields
        .next()
        .ok_or_else(|| CoreError::Malformed("empty public key".into()))?;
    let encoded = fields
        .next()
        .ok_or_else(|| CoreError::Malformed("public key line has no key data".into()))?;
    let blob = STANDARD
        .decode(encoded)
        .map_err(|e| CoreError::Malformed(format!("invalid base64 in public key: {e}")))?;

    let key = parse_public_blob(&blob)?;
    let actual = match key {
        PublicKey::Rsa(_) => KEY_TYPE_RSA,
        PublicKey::Ed25519(_) => KEY_TYPE_ED25519,
    };
    if declared != actual {
        return Err(CoreError::Malformed(format!(
            "public key line declares {declared:?} but holds {actual:?}"
        )));
    }
    Ok(key)
}

/// Parse an SSH wire-format public key blob.
pub fn parse_public_blob(blob: &[u8]) -> Result<PublicKey> {
    let mut r = Reader::new(blob);
    let key = match r.utf8("key type")? {
        KEY_TYPE_ED25519 => {
            let bytes: [u8; 32] = r
                .string("ed25519 public key")?
                .try_into()
                .map_err(|_| CoreError::Malformed("ed25519 public key must be 32 bytes".into()))?;
            let key = VerifyingKey::from_bytes(&bytes)
                .map_err(|e| CoreError::Malformed(format!("invalid ed25519 public key: {e}")))?;
            PublicKey::Ed25519(key)
        }
        KEY_TYPE_RSA => {
            let e = r.mpint("rsa e")?;
            let n = r.mpint("rsa n")?;
            let bits = n.bits();
            if bits > MAX_RSA_BITS {
                return Err(CoreError::UnsupportedAlgorithm(format!(
                    "{bits}-bit rsa key, maximum is {MAX_RSA_BITS}"
                )));
            }
            let key = RsaPublicKey::new_with_max_size(n, e, MAX_RSA_BITS)
                .map_err(|e| CoreError::Malformed(format!("invalid rsa public key: {e}")))?;
            PublicKey::Rsa(key)
        }
        other => return Err(CoreError::UnsupportedAlgorithm(other.to_string())),
    };
    if !r.rest().is_empty() {
        return Err(CoreError::Malformed("trailing bytes after public key".into()));
    }
    Ok(key)
}

fn read_magic(r: &mut Reader<'_>) -> Result<()> {
    if r.take(AUTH_MAGIC.len(), "magic")? != AUTH_MAGIC {
        return Err(CoreError::Malformed("missing openssh-key-v1 magic".into()));
    }
    Ok(())
}

fn read_ed25519(p: &mut Reader<'_>) -> Result<PrivateKey> {
    let public = p.string("ed25519 public key")?;
    let secret = p.string("ed25519 private key")?;
    if public.len() != 32 {
        return Err(CoreError::Malformed(format!(
            "ed25519 public key is {} bytes, expected 32",
            public.len()
        )));
    }
    if secret.len() != 64 {
        return Err(CoreError::Malformed(format!(
            "ed25519 private key is {} bytes, expected 64",
            secret.len()
        )));
    }

    let mut der = Zeroizing::new(Vec::with_capacity(ED25519_PKCS8_HEADER.len() + 32));
    der.extend_from_slice(&ED25519_PKCS8_HEADER);
    der.extend_from_slice(&secret[..32]);
    let signing = SigningKey::from_pkcs8_der(&der)
        .map_err(|e| CoreError::Malformed(format!("invalid ed25519 seed: {e}")))?;

    let derived = signing.verifying_key();
    if derived.as_bytes()[..] != public[..] || derived.as_bytes()[..] != secret[32..] {
        return Err(CoreError::Malformed(
            "ed25519 public key does not match the seed".into(),
        ));
    }
    Ok(PrivateKey::Ed25519(signing))
}

fn read_rsa(p: &mut Reader<'_>) -> Result<PrivateKey> {
    let n = p.mpint("rsa n")?;
    let e = p.mpint("rsa e")?;
    let d = p.mpint("rsa d")?;
    let iqmp = p.mpint("rsa iqmp")?;
    let prime_p = p.mpint("rsa p")?;
    let prime_q = p.mpint("rsa q")?;

    let one = BigUint::from(1u8);
    if prime_p <= one || prime_q <= one {
        return Err(CoreError::Malformed("rsa prime out of range".into()));
    }
    let dp = &d % (&prime_p - &one);
    let dq = &d % (&prime_q - &one);

    let key = RsaPrivateKey::from_components(n, e, d, vec![prime_p, prime_q])
        .map_err(|e| CoreError::Malformed(format!("inconsistent rsa key: {e}")))?;

    if key.dp() != Some(&dp) || key.dq() != Some(&dq) {
        return Err(CoreError::Malformed(
            "rsa CRT exponents do not match the key".into(),
        ));
    }
    if key.crt_coefficient().as_ref() != Some(&iqmp) {
        return Err(CoreError::Malformed(
            "rsa iqmp does not match the primes".into(),
        ));
    }
    Ok(PrivateKey::Rsa(Box::new(key)))
}

fn check_padding(padding: &[u8]) -> Result<()> {
    let valid = padding
        .iter()
        .enumerate()
        .all(|(i, &b)| usize::from(b) == i + 1);
    if !valid {
        return Err(CoreError::Malformed("invalid private section padding".into()));
    }
    Ok(())
}

/// Cursor over SSH wire-format data.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| CoreError::Malformed(format!("truncated {what}")))?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        let bytes = self.take(4, what)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn string(&mut self, what: &str) -> Result<&'a [u8]> {
        let len = self.u32(what)? as usize;
        self.take(len, what)
    }

    fn utf8(&mut self, what: &str) -> Result<&'a str> {
        std::str::from_utf8(self.string(what)?)
            .map_err(|_| CoreError::Malformed(format!("{what} is not valid UTF-8")))
    }

    /// Unsigned mpint; at most one leading zero sign byte is dropped.
    fn mpint(&mut self, what: &str) -> Result<BigUint> {
        let raw = self.string(what)?;
        let magnitude = match raw {
            [0, rest @ ..] => rest,
            [first, ..] if first & 0x80 != 0 => {
                return Err(CoreError::Malformed(format!("{what} is negative")));
            }
            _ => raw,
        };
        Ok(BigUint::from_bytes_be(magnitude))
    }
}
