//! Private key directory scanning.
//!
//! The caller's identities come from a directory such as `~/.ssh`. Well-known
//! key files are tried first, then every other regular file that looks like a
//! private key. Files that fail to load are recorded as skipped and never
//! abort the scan.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use envseal_core::codec::parse_private_key_with_min_bits;
use envseal_core::{contains_private_key_marker, CoreError, PrivateKeyEntry};

use crate::error::Result;

/// Key files tried before anything else, in order.
pub const WELL_KNOWN_KEYS: &[&str] = &["id_ed25519", "id_rsa"];

/// Files larger than this are not considered keys.
pub const MAX_KEY_FILE_LEN: u64 = 64 * 1024;

/// A key file that was found but could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedKey {
    pub path: PathBuf,
    pub reason: String,
    pub passphrase_protected: bool,
}

/// Result of scanning a key directory.
#[derive(Debug, Default)]
pub struct KeyScan {
    /// Usable keys, well-known names first.
    pub keys: Vec<PrivateKeyEntry>,

    /// Key files that failed to load.
    pub skipped: Vec<SkippedKey>,
}

/// Scan `dir` for private keys. A missing directory yields an empty scan.
pub fn scan_key_dir(dir: &Path, min_rsa_bits: usize) -> Result<KeyScan> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "key directory does not exist");
            return Ok(KeyScan::default());
        }
        Err(e) => return Err(e.into()),
    };

    let mut others: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            !WELL_KNOWN_KEYS.contains(&name) && !name.ends_with(".pub")
        })
        .collect();
    others.sort();

    let candidates = WELL_KNOWN_KEYS
        .iter()
        .map(|name| dir.join(name))
        .chain(others);

    let mut scan = KeyScan::default();
    for path in candidates {
        let Some(bytes) = read_key_file(&path) else {
            continue;
        };
        if !contains_private_key_marker(&bytes) {
            continue;
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match parse_private_key_with_min_bits(&bytes, min_rsa_bits)
            .and_then(|key| PrivateKeyEntry::new(name, key))
        {
            Ok(entry) => {
                if scan.keys.iter().any(|k| k.fingerprint == entry.fingerprint) {
                    debug!(path = %path.display(), "duplicate key skipped");
                    continue;
                }
                debug!(
                    path = %path.display(),
                    algorithm = %entry.algorithm(),
                    fingerprint = %entry.fingerprint.short(),
                    "loaded private key"
                );
                scan.keys.push(entry);
            }
            Err(e) => {
                warn!(path = %path.display(), reason = %e, "skipping private key");
                scan.skipped.push(SkippedKey {
                    path,
                    reason: e.to_string(),
                    passphrase_protected: matches!(e, CoreError::PassphraseProtected { .. }),
                });
            }
        }
    }

    Ok(scan)
}

/// Contents of a plausible key file, or `None` for anything unreadable.
fn read_key_file(path: &Path) -> Option<Vec<u8>> {
    let metadata = fs::metadata(path).ok()?;
    if !metadata.is_file() || metadata.len() > MAX_KEY_FILE_LEN {
        return None;
    }
    fs::read(path).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use envseal_core::Algorithm;
    use tempfile::TempDir;

    macro_rules! fixture {
        ($name:literal) => {
            include_bytes!(concat!("../../envseal-testkit/fixtures/", $name))
        };
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let scan = scan_key_dir(&dir.path().join("nope"), 2048).unwrap();
        assert!(scan.keys.is_empty());
        assert!(scan.skipped.is_empty());
    }

    #[test]
    fn test_well_known_keys_first() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("aaa_work"), fixture!("bob_rsa.pkcs8.pem")).unwrap();
        fs::write(dir.path().join("id_rsa"), fixture!("bob_rsa")).unwrap();
        fs::write(dir.path().join("id_ed25519"), fixture!("alice_ed25519")).unwrap();
        fs::write(dir.path().join("id_ed25519.pub"), fixture!("alice_ed25519.pub")).unwrap();
        fs::write(dir.path().join("known_hosts"), "github.com ssh-ed25519 AAAA").unwrap();

        let scan = scan_key_dir(dir.path(), 2048).unwrap();
        let names: Vec<_> = scan.keys.iter().map(|k| k.name.as_str()).collect();
        // aaa_work is the same key as id_rsa and is dropped as a duplicate.
        assert_eq!(names, vec!["id_ed25519", "id_rsa"]);
        assert_eq!(scan.keys[0].algorithm(), Algorithm::Ed25519);
        assert!(scan.skipped.is_empty());
    }

    #[test]
    fn test_unusable_keys_are_skipped_with_reason() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("id_ed25519"), fixture!("alice_ed25519")).unwrap();
        fs::write(dir.path().join("carol"), fixture!("carol_ed25519_protected")).unwrap();
        fs::write(dir.path().join("dave"), fixture!("dave_ecdsa")).unwrap();
        fs::write(dir.path().join("weak"), fixture!("weak_rsa1024")).unwrap();

        let scan = scan_key_dir(dir.path(), 2048).unwrap();
        assert_eq!(scan.keys.len(), 1);
        assert_eq!(scan.skipped.len(), 3);

        let carol = scan
            .skipped
            .iter()
            .find(|s| s.path.ends_with("carol"))
            .unwrap();
        assert!(carol.passphrase_protected);
        assert!(carol.reason.contains("passphrase"));
        assert!(scan.skipped.iter().filter(|s| s.passphrase_protected).count() == 1);
    }

    #[test]
    fn test_min_bits_is_respected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("weak"), fixture!("weak_rsa1024")).unwrap();

        assert_eq!(scan_key_dir(dir.path(), 2048).unwrap().keys.len(), 0);
        assert_eq!(scan_key_dir(dir.path(), 1024).unwrap().keys.len(), 1);
    }
}
