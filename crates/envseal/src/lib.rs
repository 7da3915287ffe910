//! # envseal
//!
//! Encrypted environment files shared through a repository, readable only by
//! the holders of granted SSH keys.
//!
//! ## Overview
//!
//! - **Environment**: a JSON envelope under `envs/` holding content encrypted
//!   with a random data key, plus that data key wrapped for every recipient
//! - **Public key record**: an SPKI PEM under `keys/`, the unit of granting
//! - **Caller keys**: the private keys the caller holds, read from `~/.ssh`
//!   or supplied directly
//!
//! Every grant, revoke, rotation and content edit re-encrypts the whole file
//! under a fresh data key, so a revoked key cannot read anything written
//! after its revocation.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use envseal::{EditOptions, Engine, EngineConfig};
//!
//! fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::open(EngineConfig::from_env().with_project_root("."))?;
//!
//!     engine.add_public_key("alice", &std::fs::read("alice.pub")?)?;
//!     engine.create_environment("staging", &["alice"], b"API_KEY=secret\n")?;
//!
//!     let plaintext = engine.decrypt_environment("staging")?;
//!     engine.encrypt_environment("staging", &plaintext, &EditOptions::new().grant("bob"))?;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `envseal::core` - key parsing, fingerprints, validation
//! - `envseal::perms` - envelopes, key wrapping, recipient sets
//! - `envseal::store` - storage abstraction, filesystem layout, key scanning

pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod summary;

pub use config::{default_key_dir, EngineConfig, OverrideKey, KEY_DIR_ENV, PRIVATE_KEY_ENV};
pub use engine::{EditOptions, Engine};
pub use error::{EngineError, ErrorKind, Result};
pub use identity::{fingerprint, CallerKeys};
pub use summary::{BatchSummary, EditReport, Identity, ItemFailure, PurgePlan, PurgeReport};

pub use envseal_core::{validate_name, validate_public_key_strength, Fingerprint};
pub use envseal_perms::GrantOutcome;

/// Re-export component crates.
pub use envseal_core as core;
pub use envseal_perms as perms;
pub use envseal_store as store;
