//! # envseal testkit
//!
//! Testing utilities for envseal.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: real `ssh-keygen` key files and a temp-dir project helper
//! - **OpenSSH encoder**: `openssh-key-v1` output for generated keys
//! - **Generators**: Proptest strategies for names, keys and content
//! - **Vectors**: malformed key and envelope corpora with expected error kinds
//!
//! ## Test Fixtures
//!
//! ```rust
//! use envseal_testkit::fixtures::{team, TestProject};
//!
//! let project = TestProject::new();
//! let (alice, bob, _) = team();
//! project.register(&[&alice, &bob]);
//!
//! let engine = project.engine_as(&[&alice]);
//! engine.create_environment("staging", &["alice", "bob"], b"A=1\n").unwrap();
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use envseal_testkit::generators::{content, name};
//!
//! proptest! {
//!     #[test]
//!     fn any_content_roundtrips(env in name(), body in content(512)) {
//!         // ...
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod openssh;
pub mod vectors;

pub use fixtures::{fixture, fixtures_dir, team, TestKey, TestProject};
pub use vectors::{malformed_envelopes, malformed_private_keys, EnvelopeVector, KeyVector};
