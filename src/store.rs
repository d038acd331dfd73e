//! # In-memory credential stores
//!
//! Both stores here are deliberately the simplest thing that satisfies the
//! access pattern each agent needs: a `HashMap` behind a mutex. Swapping in a
//! persistent backend is an exercise for the embedding application — nothing
//! in the agent layer assumes the in-memory shape, but nothing is provided
//! for persistence either.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::vc::VerifiableCredential;

/// An issuer's record of one credential it has issued.
#[derive(Clone, Debug)]
pub struct IssuedCredentialEntry {
    /// `= vc.id`.
    pub vc_id: String,
    /// This credential's position in its time period's revocation list.
    pub status_list_index: usize,
    /// The credential's primary type tag (e.g. `"EmployeeIDCredential"`).
    pub credential_type: String,
    /// The time period the revocation index was allocated from.
    pub time_period: String,
    /// `= vc.valid_from`.
    pub issuance_date: DateTime<Utc>,
    /// `= vc.valid_until`.
    pub expiration_date: Option<DateTime<Utc>>,
    /// Set by [`IssuerCredentialStore::revoke`].
    pub revoked: bool,
}

/// An issuer's in-memory record of every credential it has issued, keyed by
/// `vc.id`.
#[derive(Default)]
pub struct IssuerCredentialStore {
    entries: HashMap<String, IssuedCredentialEntry>,
}

impl IssuerCredentialStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a newly issued credential. Overwrites any prior entry with
    /// the same `vc_id` (re-issuance is the caller's decision to make).
    pub fn insert(&mut self, entry: IssuedCredentialEntry) {
        self.entries.insert(entry.vc_id.clone(), entry);
    }

    /// Look up an entry by `vc.id`.
    #[must_use]
    pub fn get(&self, vc_id: &str) -> Option<&IssuedCredentialEntry> {
        self.entries.get(vc_id)
    }

    /// Marks the entry for `vc_id` revoked. Returns `false` if no such entry
    /// exists.
    pub fn revoke(&mut self, vc_id: &str) -> bool {
        match self.entries.get_mut(vc_id) {
            Some(entry) => {
                entry.revoked = true;
                true
            }
            None => false,
        }
    }

    /// All entries issued within `time_period`.
    pub fn by_period<'a>(
        &'a self, time_period: &'a str,
    ) -> impl Iterator<Item = &'a IssuedCredentialEntry> {
        self.entries.values().filter(move |e| e.time_period == time_period)
    }
}

/// An opaque, named byte attachment bundled alongside a stored credential
/// (e.g. a photo referenced by, but not embedded in, the credential itself).
#[derive(Clone, Debug)]
pub struct Attachment {
    /// The attachment's name, as supplied by the issuer's data provider.
    pub name: String,
    /// The attachment's raw bytes.
    pub bytes: Vec<u8>,
}

/// A holder's record of one verified, stored credential.
#[derive(Clone, Debug)]
pub struct StoredCredentialEntry {
    /// The raw compact VC-JWS, as received from the issuer.
    pub vc_jws: String,
    /// The decoded credential.
    pub vc: VerifiableCredential,
    /// Opaque attachments bundled with this credential at issuance.
    pub attachments: Vec<Attachment>,
}

/// A holder's in-memory record of stored credentials, keyed by `vc.id`.
/// Entries are immutable once stored — revocation is resolved at read time
/// against whatever revocation lists the holder's validator currently has
/// loaded, not cached on the entry.
#[derive(Default)]
pub struct SubjectCredentialStore {
    entries: HashMap<String, StoredCredentialEntry>,
}

impl SubjectCredentialStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `entry`, keyed by its credential's `id`. Returns `false` (and
    /// stores nothing) if the credential has no `id`.
    pub fn insert(&mut self, entry: StoredCredentialEntry) -> bool {
        let Some(vc_id) = entry.vc.id.clone() else { return false };
        self.entries.insert(vc_id, entry);
        true
    }

    /// All stored entries.
    pub fn all(&self) -> impl Iterator<Item = &StoredCredentialEntry> {
        self.entries.values()
    }

    /// Stored entries whose credential matches any of `types`, or all
    /// entries when `types` is empty.
    pub fn matching<'a>(
        &'a self, types: &'a [String],
    ) -> impl Iterator<Item = &'a StoredCredentialEntry> {
        self.entries.values().filter(move |e| types.is_empty() || e.vc.matches_any_type(types))
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if no credentials are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OneMany;
    use crate::vc::VerifiableCredential;

    fn entry(id: &str, types: Vec<String>) -> StoredCredentialEntry {
        let mut vc = VerifiableCredential::new();
        vc.id = Some(id.to_string());
        vc.type_ = OneMany::Many(types);
        StoredCredentialEntry { vc_jws: "h.p.s".to_string(), vc, attachments: vec![] }
    }

    #[test]
    fn insert_requires_vc_id() {
        let mut store = SubjectCredentialStore::new();
        let mut vc = VerifiableCredential::new();
        vc.id = None;
        assert!(!store.insert(StoredCredentialEntry { vc_jws: String::new(), vc, attachments: vec![] }));
        assert!(store.is_empty());
    }

    #[test]
    fn matching_filters_by_any_overlap() {
        let mut store = SubjectCredentialStore::new();
        store.insert(entry("a", vec!["VerifiableCredential".into(), "EmployeeIDCredential".into()]));
        store.insert(entry("b", vec!["VerifiableCredential".into(), "DriversLicense".into()]));

        let matched: Vec<_> =
            store.matching(&["EmployeeIDCredential".to_string()]).map(|e| e.vc.id.clone()).collect();
        assert_eq!(matched, vec![Some("a".to_string())]);

        assert_eq!(store.matching(&[]).count(), 2);
    }

    #[test]
    fn issuer_store_revoke() {
        let mut store = IssuerCredentialStore::new();
        store.insert(IssuedCredentialEntry {
            vc_id: "urn:uuid:1".into(),
            status_list_index: 0,
            credential_type: "EmployeeIDCredential".into(),
            time_period: "2024-Q1".into(),
            issuance_date: Utc::now(),
            expiration_date: None,
            revoked: false,
        });
        assert!(!store.get("urn:uuid:1").unwrap().revoked);
        assert!(store.revoke("urn:uuid:1"));
        assert!(store.get("urn:uuid:1").unwrap().revoked);
        assert!(!store.revoke("urn:uuid:missing"));
    }
}
