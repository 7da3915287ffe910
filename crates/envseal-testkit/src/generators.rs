//! Proptest generators for property-based testing.

use ed25519_dalek::SigningKey;
use proptest::prelude::*;

use envseal_core::{PrivateKey, PrivateKeyEntry, MAX_NAME_LEN};

/// A valid environment or key name.
pub fn name() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_][A-Za-z0-9._-]{0,63}".prop_map(String::from)
}

/// A name that validation must reject.
pub fn invalid_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just(".".to_string()),
        Just("..".to_string()),
        "[a-z]{1,8}/[a-z]{1,8}".prop_map(String::from),
        "[a-z]{1,8}\\\\[a-z]{1,8}".prop_map(String::from),
        "\\.[a-z]{1,8}".prop_map(String::from),
        "-[a-z]{1,8}".prop_map(String::from),
        "[a-z ]{0,4} [a-z]{0,4}".prop_map(String::from),
        "[a-z]{65,80}".prop_map(String::from),
    ]
}

/// Longest name validation accepts.
pub fn longest_name() -> String {
    "n".repeat(MAX_NAME_LEN)
}

/// A deterministic ed25519 caller key with a generated name.
pub fn ed25519_key() -> impl Strategy<Value = PrivateKeyEntry> {
    (name(), any::<[u8; 32]>()).prop_map(|(name, seed)| {
        PrivateKeyEntry::new(name, PrivateKey::from(SigningKey::from_bytes(&seed)))
            .expect("ed25519 fingerprint")
    })
}

/// Arbitrary environment content.
pub fn content(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// `KEY=value` lines, as typically found in a `.env` file.
pub fn dotenv(max_lines: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(("[A-Z][A-Z0-9_]{0,15}", "[ -~]{0,40}"), 0..=max_lines).prop_map(
        |pairs| {
            pairs
                .into_iter()
                .map(|(key, value)| format!("{key}={value}\n"))
                .collect()
        },
    )
}

/// Distinct seeds for a team of `1..=max` ed25519 members.
pub fn team_seeds(max: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::btree_set(any::<u8>(), 1..=max).prop_map(|set| set.into_iter().collect())
}
