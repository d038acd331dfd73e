//! # Bitstring Status List
//!
//! Maintains a sparse bitstring of revoked credential indices for one
//! issuance period, and serializes it as the subject of a signed
//! `RevocationList2020Credential`, following
//! [Bitstring Status List v1.0](https://www.w3.org/TR/vc-bitstring-status-list/).

use std::collections::HashMap;
use std::io::Write;

use anyhow::{Result, anyhow, bail};
use base64ct::{Base64UrlUnpadded, Encoding};
use bitvec::prelude::*;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::{Map, Value};

use crate::core::{Kind, OneMany};
use crate::crypto::Signer;
use crate::jws;
use crate::vc::{CredentialSubject, ExtensionSubject, Issuer, VerifiableCredential};

/// Minimum bitstring length per the Bitstring Status List spec: 16 KiB, i.e.
/// 131,072 bits.
pub const MIN_ENTRIES: usize = 131_072;

/// Default time-to-live, in milliseconds, for a published revocation list
/// credential.
pub const DEFAULT_TTL_MS: u64 = 300_000;

/// A sparse, pseudorandomly-allocated bitstring of revoked indices for a
/// single time period.
///
/// Indices are drawn via a lazily-materialized Fisher-Yates shuffle of
/// `0..N`: memory use is proportional to credentials issued, not to `N`,
/// while allocation order still does not reveal issuance order.
pub struct RevocationList {
    time_period: String,
    size: usize,
    revoked: HashMap<usize, bool>,
    permutation: HashMap<usize, usize>,
    remaining: usize,
}

impl RevocationList {
    /// A new, empty list for `time_period`, sized to at least
    /// [`MIN_ENTRIES`].
    #[must_use]
    pub fn new(time_period: impl Into<String>) -> Self {
        Self::with_size(time_period, MIN_ENTRIES)
    }

    /// A new, empty list sized to `size` bits (clamped up to
    /// [`MIN_ENTRIES`]).
    #[must_use]
    pub fn with_size(time_period: impl Into<String>, size: usize) -> Self {
        let size = size.max(MIN_ENTRIES);
        Self {
            time_period: time_period.into(),
            size,
            revoked: HashMap::new(),
            permutation: HashMap::new(),
            remaining: size,
        }
    }

    /// This list's time period identifier.
    #[must_use]
    pub fn time_period(&self) -> &str {
        &self.time_period
    }

    /// A new, empty list of exactly `size` bits, bypassing the
    /// [`MIN_ENTRIES`] floor. Exists so tests can exercise exhaustion
    /// without drawing 131,072 indices; real callers go through
    /// [`Self::new`]/[`Self::with_size`].
    #[cfg(test)]
    fn with_size_unclamped(time_period: impl Into<String>, size: usize) -> Self {
        Self {
            time_period: time_period.into(),
            size,
            revoked: HashMap::new(),
            permutation: HashMap::new(),
            remaining: size,
        }
    }

    /// Draw the next pseudorandom, unused index in `[0, size)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is exhausted.
    pub fn allocate_index(&mut self) -> Result<usize> {
        if self.remaining == 0 {
            bail!("revocation list for period '{}' is exhausted", self.time_period);
        }
        let draw = fastrand::usize(0..self.remaining);
        let last = self.remaining - 1;

        let drawn_value = self.permutation.remove(&draw).unwrap_or(draw);
        if draw != last {
            let last_value = self.permutation.remove(&last).unwrap_or(last);
            self.permutation.insert(draw, last_value);
        }
        self.remaining -= 1;
        Ok(drawn_value)
    }

    /// Marks `index` as revoked. Idempotent.
    pub fn revoke(&mut self, index: usize) {
        self.revoked.insert(index, true);
    }

    /// `true` if `index` has been revoked.
    #[must_use]
    pub fn is_revoked(&self, index: usize) -> bool {
        self.revoked.get(&index).copied().unwrap_or(false)
    }

    /// Encode the bitstring: gzip-compressed, then base64url (unpadded).
    ///
    /// # Errors
    ///
    /// Returns an error if compression fails.
    pub fn encode(&self) -> Result<String> {
        let mut bits = bitvec![u8, Msb0; 0; self.size];
        for (&index, &revoked) in &self.revoked {
            if revoked && index < self.size {
                bits.set(index, true);
            }
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bits.as_raw_slice())?;
        let compressed = encoder.finish()?;
        Ok(Base64UrlUnpadded::encode_string(&compressed))
    }

    /// Decode an `encode`d bitstring, replacing this list's revocation set.
    /// Allocation state (which indices have been drawn) is unaffected —
    /// `decode` is for consumers (holder/verifier) that only ever check
    /// status, never allocate.
    ///
    /// # Errors
    ///
    /// Returns an error if `encoded` is not valid base64url/gzip.
    pub fn decode(&mut self, encoded: &str) -> Result<()> {
        let compressed =
            Base64UrlUnpadded::decode_vec(encoded).map_err(|e| anyhow!("bad base64url: {e}"))?;
        let mut decoder = flate2::read::GzDecoder::new(compressed.as_slice());
        let mut raw = Vec::new();
        std::io::Read::read_to_end(&mut decoder, &mut raw)?;

        let bits = raw.view_bits::<Msb0>();
        self.size = bits.len();
        self.revoked.clear();
        for (index, bit) in bits.iter().enumerate() {
            if *bit {
                self.revoked.insert(index, true);
            }
        }
        Ok(())
    }

    /// Build and sign a `RevocationList2020Credential` whose subject carries
    /// this list's current (encoded) state.
    ///
    /// Always emits the credential, even with zero revocations: a previously
    /// published list must never be silently withdrawn.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or signing fails.
    pub async fn to_credential(
        &self, list_url: &str, issuer: &impl Signer,
    ) -> Result<String> {
        tracing::debug!("status::to_credential");
        let encoded_list = self.encode()?;
        let mut claims = Map::new();
        claims.insert("encodedList".to_string(), Value::String(encoded_list));
        claims.insert("statusPurpose".to_string(), Value::String("revocation".to_string()));

        let subject = ExtensionSubject {
            id: Some(list_url.to_string()),
            type_name: "RevocationList2020".to_string(),
            claims,
        };

        let issuer_id = issuer.identifier().await?;
        let vc = VerifiableCredential {
            context: vec![Kind::String("https://www.w3.org/2018/credentials/v1".to_string())],
            id: Some(list_url.to_string()),
            type_: OneMany::Many(vec![
                "VerifiableCredential".to_string(),
                "RevocationList2020Credential".to_string(),
            ]),
            issuer: Kind::Object(Issuer::from(issuer_id)),
            credential_subject: OneMany::One(CredentialSubject::Extension(subject)),
            valid_from: Some(chrono::Utc::now()),
            valid_until: None,
            credential_status: None,
        };

        let claims = crate::vc::VcClaims::from_vc(vc);
        jws::encode(jws::Type::Jwt, &claims, issuer).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Ed25519Signer;

    #[test]
    fn allocation_is_unique_and_exhaustible() {
        let mut list = RevocationList::with_size_unclamped("2024-Q1", 4);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..4 {
            let idx = list.allocate_index().unwrap();
            assert!(seen.insert(idx), "index {idx} drawn twice");
        }
        assert!(list.allocate_index().is_err());
    }

    #[test]
    fn with_size_clamps_up_to_min_entries() {
        let list = RevocationList::with_size("2024-Q1", 4);
        assert_eq!(list.size, MIN_ENTRIES);
    }

    #[test]
    fn revoke_and_check() {
        let mut list = RevocationList::with_size("2024-Q1", MIN_ENTRIES);
        let idx = list.allocate_index().unwrap();
        assert!(!list.is_revoked(idx));
        list.revoke(idx);
        assert!(list.is_revoked(idx));
    }

    #[test]
    fn encode_decode_round_trips() {
        let mut list = RevocationList::new("2024-Q1");
        let a = list.allocate_index().unwrap();
        let b = list.allocate_index().unwrap();
        list.revoke(a);

        let encoded = list.encode().unwrap();

        let mut reader = RevocationList::new("2024-Q1");
        reader.decode(&encoded).unwrap();
        assert!(reader.is_revoked(a));
        assert!(!reader.is_revoked(b));
    }

    #[tokio::test]
    async fn to_credential_is_well_formed() {
        let signer = Ed25519Signer::generate();
        let list = RevocationList::new("2024-Q1");
        let jws = list.to_credential("https://issuer.example/status/1", &signer).await.unwrap();
        assert_eq!(jws.split('.').count(), 3);

        // The subject must round-trip as `type: "RevocationList2020"`, not
        // the Rust field name `type_name` — this is what lets
        // `Validator::set_revocation_list` and any other spec-conformant
        // consumer parse the credential.
        let payload_b64 = jws.split('.').nth(1).unwrap();
        let payload = Base64UrlUnpadded::decode_vec(payload_b64).unwrap();
        let claims: Value = serde_json::from_slice(&payload).unwrap();
        let subject = &claims["vc"]["credentialSubject"];
        assert_eq!(subject["type"], Value::String("RevocationList2020".to_string()));
        assert!(subject.get("type_name").is_none());
        assert_eq!(subject["id"], Value::String("https://issuer.example/status/1".to_string()));
        assert!(subject["encodedList"].is_string());
    }
}
