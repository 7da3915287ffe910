//! Filesystem implementation of the Store trait.
//!
//! Layout under the project root (directory names configurable through
//! [`ProjectLayout`]):
//!
//! ```text
//! <root>/envs/<name>.json   envelope, pretty JSON
//! <root>/keys/<name>.pub    public key, SPKI PEM
//! ```
//!
//! Every write goes to a temporary file in the target directory and is then
//! renamed over the destination, so readers see either the old or the new
//! file and never a partial one.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use envseal_core::{parse_public_key, validate_name, PublicKeyEntry};
use envseal_perms::Envelope;

use crate::error::{Result, StoreError};
use crate::traits::Store;

/// File extension of environment files.
pub const ENVIRONMENT_EXTENSION: &str = "json";

/// File extension of public key records.
pub const PUBLIC_KEY_EXTENSION: &str = "pub";

/// Directory names inside a project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    /// Public key records, relative to the root.
    pub keys_dir: PathBuf,

    /// Environment files, relative to the root.
    pub envs_dir: PathBuf,
}

impl Default for ProjectLayout {
    fn default() -> Self {
        Self {
            keys_dir: PathBuf::from("keys"),
            envs_dir: PathBuf::from("envs"),
        }
    }
}

/// Whether a write may replace an existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    CreateNew,
    Overwrite,
}

/// Project-directory store.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
    layout: ProjectLayout,
}

impl FsStore {
    /// Open a project rooted at `root` with the default layout.
    ///
    /// Directories are created lazily on first write.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self::with_layout(root, ProjectLayout::default())
    }

    /// Open a project with a custom layout.
    pub fn with_layout(root: impl Into<PathBuf>, layout: ProjectLayout) -> Self {
        Self {
            root: root.into(),
            layout,
        }
    }

    /// The project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The layout in use.
    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Path of an environment file.
    pub fn environment_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self
            .envs_dir()
            .join(format!("{name}.{ENVIRONMENT_EXTENSION}")))
    }

    /// Path of a public key record.
    pub fn public_key_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.keys_dir().join(format!("{name}.{PUBLIC_KEY_EXTENSION}")))
    }

    fn envs_dir(&self) -> PathBuf {
        self.root.join(&self.layout.envs_dir)
    }

    fn keys_dir(&self) -> PathBuf {
        self.root.join(&self.layout.keys_dir)
    }

    fn write_environment(&self, name: &str, envelope: &Envelope, mode: WriteMode) -> Result<()> {
        let path = self.environment_path(name)?;
        let bytes = envelope
            .to_json()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        write_atomic(&path, &bytes, mode).map_err(|e| match e {
            StoreError::AlreadyExists(_) => {
                StoreError::AlreadyExists(format!("environment {name:?}"))
            }
            other => other,
        })?;
        debug!(environment = name, recipients = envelope.keys.len(), "environment written");
        Ok(())
    }
}

impl Store for FsStore {
    // ─────────────────────────────────────────────────────────────────────────
    // Environment Operations
    // ─────────────────────────────────────────────────────────────────────────

    fn load_environment(&self, name: &str) -> Result<Option<Envelope>> {
        let path = self.environment_path(name)?;
        let Some(bytes) = read_optional(&path)? else {
            return Ok(None);
        };
        Envelope::from_json(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Serialization(format!("{}: {e}", path.display())))
    }

    fn create_environment(&self, name: &str, envelope: &Envelope) -> Result<()> {
        self.write_environment(name, envelope, WriteMode::CreateNew)
    }

    fn save_environment(&self, name: &str, envelope: &Envelope) -> Result<()> {
        self.write_environment(name, envelope, WriteMode::Overwrite)
    }

    fn delete_environment(&self, name: &str) -> Result<bool> {
        let removed = remove_optional(&self.environment_path(name)?)?;
        if removed {
            debug!(environment = name, "environment deleted");
        }
        Ok(removed)
    }

    fn list_environments(&self) -> Result<Vec<String>> {
        list_names(&self.envs_dir(), ENVIRONMENT_EXTENSION)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Public Key Operations
    // ─────────────────────────────────────────────────────────────────────────

    fn load_public_key(&self, name: &str) -> Result<Option<PublicKeyEntry>> {
        let Some(bytes) = read_optional(&self.public_key_path(name)?)? else {
            return Ok(None);
        };
        let key = parse_public_key(&bytes)?;
        Ok(Some(PublicKeyEntry::new(name, key)?))
    }

    fn create_public_key(&self, entry: &PublicKeyEntry) -> Result<()> {
        let path = self.public_key_path(&entry.name)?;
        let pem = entry.key.to_spki_pem()?;
        write_atomic(&path, pem.as_bytes(), WriteMode::CreateNew).map_err(|e| match e {
            StoreError::AlreadyExists(_) => {
                StoreError::AlreadyExists(format!("public key {:?}", entry.name))
            }
            other => other,
        })?;
        debug!(key = %entry.name, fingerprint = %entry.fingerprint.short(), "public key written");
        Ok(())
    }

    fn delete_public_key(&self, name: &str) -> Result<bool> {
        let removed = remove_optional(&self.public_key_path(name)?)?;
        if removed {
            debug!(key = name, "public key deleted");
        }
        Ok(removed)
    }

    fn list_public_keys(&self) -> Result<Vec<PublicKeyEntry>> {
        let mut entries = Vec::new();
        for name in list_names(&self.keys_dir(), PUBLIC_KEY_EXTENSION)? {
            match self.load_public_key(&name) {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(e) => warn!(key = %name, error = %e, "skipping unreadable public key"),
            }
        }
        Ok(entries)
    }
}

/// Write `bytes` to `path` through a temporary file and a rename.
fn write_atomic(path: &Path, bytes: &[u8], mode: WriteMode) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| StoreError::NotFound(format!("parent of {}", path.display())))?;
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    match mode {
        WriteMode::Overwrite => {
            tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
        }
        WriteMode::CreateNew => {
            tmp.persist_noclobber(path).map_err(|e| {
                if e.error.kind() == io::ErrorKind::AlreadyExists {
                    StoreError::AlreadyExists(path.display().to_string())
                } else {
                    StoreError::Io(e.error)
                }
            })?;
        }
    }
    Ok(())
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn remove_optional(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Valid record names in `dir` with the given extension, sorted.
fn list_names(dir: &Path, extension: &str) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if validate_name(stem).is_ok() {
            names.push(stem.to_string());
        }
    }
    names.sort();
    Ok(names)
}
