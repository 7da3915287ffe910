//! Recipient-set computation.
//!
//! Grant and revoke requests are applied to a [`RecipientSet`] taken from
//! the current envelope. The resulting set, not the old envelope, decides
//! who the rewritten envelope is wrapped for.

use envseal_core::Fingerprint;

use crate::envelope::Envelope;
use crate::error::{PermsError, Result};

/// One member of a recipient set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub name: String,
    pub fingerprint: Fingerprint,
}

/// What a grant request did to the set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantOutcome {
    /// Appended as a new recipient.
    Added,

    /// Fingerprint already present under the same name; nothing changed.
    AlreadyGranted,

    /// Fingerprint already present under another name; the grant was renamed.
    Renamed { from: String, to: String },

    /// Name already present with a different fingerprint; the old key was
    /// replaced in place.
    Replaced { name: String },
}

impl GrantOutcome {
    /// True if the set changed.
    pub fn is_change(&self) -> bool {
        !matches!(self, GrantOutcome::AlreadyGranted)
    }
}

/// Ordered, fingerprint-unique set of recipients.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientSet {
    entries: Vec<Recipient>,
}

impl RecipientSet {
    /// Create a new empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The recipients of an existing envelope, in grant order.
    pub fn from_envelope(envelope: &Envelope) -> Self {
        let mut set = Self::new();
        for grant in &envelope.keys {
            set.grant(&grant.name, grant.fingerprint);
        }
        set
    }

    /// Grant access to `fingerprint` under `name`.
    pub fn grant(&mut self, name: &str, fingerprint: Fingerprint) -> GrantOutcome {
        if let Some(existing) = self.entries.iter_mut().find(|r| r.fingerprint == fingerprint) {
            if existing.name == name {
                return GrantOutcome::AlreadyGranted;
            }
            let from = std::mem::replace(&mut existing.name, name.to_string());
            return GrantOutcome::Renamed {
                from,
                to: name.to_string(),
            };
        }

        if let Some(existing) = self.entries.iter_mut().find(|r| r.name == name) {
            existing.fingerprint = fingerprint;
            return GrantOutcome::Replaced {
                name: name.to_string(),
            };
        }

        self.entries.push(Recipient {
            name: name.to_string(),
            fingerprint,
        });
        GrantOutcome::Added
    }

    /// Remove the recipient called `name`.
    pub fn revoke(&mut self, name: &str) -> Result<Recipient> {
        let index = self
            .entries
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| PermsError::UnknownRecipient(name.to_string()))?;
        Ok(self.entries.remove(index))
    }

    /// Fail with [`PermsError::NoRecipients`] if the set is empty.
    pub fn ensure_not_empty(&self) -> Result<()> {
        if self.entries.is_empty() {
            return Err(PermsError::NoRecipients);
        }
        Ok(())
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.entries.iter().any(|r| r.name == name)
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.iter().any(|r| r.fingerprint == *fingerprint)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|r| r.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Recipient> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How purging a key affects one environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeAction {
    /// Key is a recipient alongside others; it will be revoked.
    Revoke,
    /// Key is the sole recipient; revoking would lock everyone out.
    Skip,
    /// Key is not a recipient.
    Unaffected,
}

/// Classify an envelope for purging the key called `key_name`.
pub fn classify_purge(envelope: &Envelope, key_name: &str) -> PurgeAction {
    match envelope.grant_named(key_name) {
        None => PurgeAction::Unaffected,
        Some(_) if envelope.keys.len() < 2 => PurgeAction::Skip,
        Some(_) => PurgeAction::Revoke,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::RecipientGrant;
    use envseal_core::Algorithm;

    fn fp(byte: u8) -> Fingerprint {
        Fingerprint::from_bytes([byte; 32])
    }

    fn envelope(recipients: &[(&str, u8)]) -> Envelope {
        Envelope {
            version: Some(2),
            keys: recipients
                .iter()
                .map(|(name, byte)| RecipientGrant {
                    name: name.to_string(),
                    fingerprint: fp(*byte),
                    algorithm: Algorithm::Ed25519,
                    encrypted_data_key: vec![0; 92],
                })
                .collect(),
            encrypted_content: vec![0; 28],
        }
    }

    #[test]
    fn test_grant_appends_in_order() {
        let mut set = RecipientSet::new();
        assert_eq!(set.grant("alice", fp(1)), GrantOutcome::Added);
        assert_eq!(set.grant("bob", fp(2)), GrantOutcome::Added);
        assert_eq!(set.names(), vec!["alice", "bob"]);
    }

    #[test]
    fn test_grant_same_fingerprint_same_name() {
        let mut set = RecipientSet::from_envelope(&envelope(&[("alice", 1)]));
        let outcome = set.grant("alice", fp(1));
        assert_eq!(outcome, GrantOutcome::AlreadyGranted);
        assert!(!outcome.is_change());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_grant_same_fingerprint_new_name_renames_in_place() {
        let mut set = RecipientSet::from_envelope(&envelope(&[("alice", 1), ("bob", 2)]));
        assert_eq!(
            set.grant("alice-laptop", fp(1)),
            GrantOutcome::Renamed {
                from: "alice".into(),
                to: "alice-laptop".into()
            }
        );
        assert_eq!(set.names(), vec!["alice-laptop", "bob"]);
    }

    #[test]
    fn test_grant_same_name_new_fingerprint_replaces() {
        let mut set = RecipientSet::from_envelope(&envelope(&[("alice", 1), ("bob", 2)]));
        assert_eq!(
            set.grant("alice", fp(9)),
            GrantOutcome::Replaced {
                name: "alice".into()
            }
        );
        assert!(set.contains(&fp(9)));
        assert!(!set.contains(&fp(1)));
        assert_eq!(set.names(), vec!["alice", "bob"]);
    }

    #[test]
    fn test_revoke() {
        let mut set = RecipientSet::from_envelope(&envelope(&[("alice", 1), ("bob", 2)]));
        let removed = set.revoke("alice").unwrap();
        assert_eq!(removed.fingerprint, fp(1));
        assert_eq!(set.names(), vec!["bob"]);
        assert!(set.ensure_not_empty().is_ok());

        assert!(matches!(
            set.revoke("alice"),
            Err(PermsError::UnknownRecipient(_))
        ));

        set.revoke("bob").unwrap();
        assert!(matches!(set.ensure_not_empty(), Err(PermsError::NoRecipients)));
    }

    #[test]
    fn test_classify_purge() {
        assert_eq!(
            classify_purge(&envelope(&[("alice", 1), ("bob", 2)]), "alice"),
            PurgeAction::Revoke
        );
        assert_eq!(
            classify_purge(&envelope(&[("alice", 1)]), "alice"),
            PurgeAction::Skip
        );
        assert_eq!(
            classify_purge(&envelope(&[("bob", 2)]), "alice"),
            PurgeAction::Unaffected
        );
    }
}
