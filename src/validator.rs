//! # Validator
//!
//! Verifies VC-JWS and VP-JWS payloads against cryptographic, temporal and
//! revocation predicates. A `Validator` holds whatever revocation lists it
//! has been told about (there is no implicit fetching); status checks
//! against an unknown list resolve to [`RevocationStatus::Unknown`] rather
//! than failing.

use std::collections::HashMap;

use chrono::Utc;

use crate::crypto::{KeyResolver, VerifierCrypto};
use crate::jws::{self, JwsError};
use crate::status::RevocationList;
use crate::vc::{VcClaims, VerifiableCredential};
use crate::vp::{VerifiablePresentation, VpClaims};

/// Outcome of verifying a VC-JWS.
#[derive(Debug)]
pub enum VerifyCredentialResult {
    /// The credential verified and is currently valid.
    Success(VerifiableCredential),
    /// The JWS could not be parsed or its signature did not verify.
    InvalidStructure(String),
    /// The credential verified but has been revoked.
    Revoked(VerifiableCredential),
    /// The credential's `sub` did not match the caller's expectation.
    SubjectMismatch,
    /// `now > vc.valid_until`.
    Expired,
    /// `now < vc.valid_from`.
    NotYetValid,
}

/// Outcome of verifying a VP-JWS.
#[derive(Debug)]
pub struct VerifyPresentationResult {
    /// The presentation itself.
    pub vp: VerifiablePresentation,
    /// Contained credentials that verified and are currently valid.
    pub verifiable_credentials: Vec<VerifiableCredential>,
    /// Contained credentials that verified but are revoked.
    pub revoked_verifiable_credentials: Vec<VerifiableCredential>,
}

/// Failure modes specific to presentation verification.
#[derive(Debug, thiserror::Error)]
pub enum VerifyPresentationError {
    /// The JWS could not be parsed or its signature did not verify.
    #[error("invalid structure: {0}")]
    InvalidStructure(String),
    /// `aud` did not match the expected verifier identifier.
    #[error("audience mismatch")]
    AudienceMismatch,
    /// `nonce` did not match the expected challenge.
    #[error("nonce mismatch")]
    NonceMismatch,
    /// `now` fell outside `[nbf, exp]`.
    #[error("presentation is not currently valid")]
    NotCurrentlyValid,
}

/// A credential's status, as resolved at the moment of checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationStatus {
    /// Not found in any known revocation list, or carries no status entry.
    Unknown,
    /// Present and unrevoked.
    Valid,
    /// Present and revoked.
    Revoked,
}

/// Verifies VC-JWS and VP-JWS payloads.
pub struct Validator<C, R> {
    crypto: C,
    resolver: R,
    lists: HashMap<String, RevocationList>,
}

impl<C: VerifierCrypto, R: KeyResolver> Validator<C, R> {
    /// A validator with no revocation lists loaded.
    pub fn new(crypto: C, resolver: R) -> Self {
        Self { crypto, resolver, lists: HashMap::new() }
    }

    /// Verify and decode an arbitrary compact JWS using this validator's
    /// crypto and key resolver, without any VC/VP-specific checks. Used by
    /// the SIOP layer to verify a self-issued `id_token` against the same
    /// trust root as the `vp_token` it accompanies.
    pub async fn decode_jwt<T: serde::de::DeserializeOwned>(
        &self, compact: &str,
    ) -> Result<jws::Jwt<T>, JwsError> {
        jws::decode(compact, &self.crypto, &self.resolver).await
    }

    /// Verify and decode a compact VC-JWS, checking that `sub` equals
    /// `expected_subject`, if given.
    pub async fn verify_vc_jws(
        &self, compact: &str, expected_subject: Option<&str>,
    ) -> VerifyCredentialResult {
        tracing::debug!("validator::verify_vc_jws");
        let jwt: jws::Jwt<VcClaims> = match jws::decode(compact, &self.crypto, &self.resolver).await
        {
            Ok(jwt) => jwt,
            Err(JwsError::InvalidStructure(msg)) => return VerifyCredentialResult::InvalidStructure(msg),
            Err(JwsError::InvalidSignature) => {
                return VerifyCredentialResult::InvalidStructure("signature did not verify".to_string());
            }
        };
        let claims = jwt.claims;

        if let Some(expected) = expected_subject {
            if claims.sub != expected {
                return VerifyCredentialResult::SubjectMismatch;
            }
        }

        let now = Utc::now();
        if now < claims.nbf {
            return VerifyCredentialResult::NotYetValid;
        }
        if let Some(exp) = claims.exp {
            if now > exp {
                return VerifyCredentialResult::Expired;
            }
        }

        match self.check_revocation_status(&claims.vc) {
            RevocationStatus::Revoked => VerifyCredentialResult::Revoked(claims.vc),
            RevocationStatus::Valid | RevocationStatus::Unknown => {
                VerifyCredentialResult::Success(claims.vc)
            }
        }
    }

    /// Verify and decode a compact VP-JWS, checking `aud`/`nonce`/temporal
    /// bounds, then verifying every contained VC-JWS against `vp.iss` as the
    /// expected subject.
    pub async fn verify_vp_jws(
        &self, compact: &str, expected_challenge: &str, expected_audience: &str,
    ) -> Result<VerifyPresentationResult, VerifyPresentationError> {
        tracing::debug!("validator::verify_vp_jws");
        let jwt: jws::Jwt<VpClaims> = jws::decode(compact, &self.crypto, &self.resolver)
            .await
            .map_err(|e| match e {
                JwsError::InvalidStructure(msg) => VerifyPresentationError::InvalidStructure(msg),
                JwsError::InvalidSignature => {
                    VerifyPresentationError::InvalidStructure("signature did not verify".to_string())
                }
            })?;
        let claims = jwt.claims;

        if claims.aud != expected_audience {
            return Err(VerifyPresentationError::AudienceMismatch);
        }
        if claims.nonce != expected_challenge {
            return Err(VerifyPresentationError::NonceMismatch);
        }
        let now = Utc::now();
        if now < claims.nbf || now > claims.exp {
            return Err(VerifyPresentationError::NotCurrentlyValid);
        }

        let mut valid = Vec::new();
        let mut revoked = Vec::new();
        if let Some(wrapped) = &claims.vp.verifiable_credential {
            for vc_jws in wrapped {
                match self.verify_vc_jws(vc_jws, Some(&claims.iss)).await {
                    VerifyCredentialResult::Success(vc) => valid.push(vc),
                    VerifyCredentialResult::Revoked(vc) => revoked.push(vc),
                    _ => {}
                }
            }
        }

        Ok(VerifyPresentationResult {
            vp: claims.vp,
            verifiable_credentials: valid,
            revoked_verifiable_credentials: revoked,
        })
    }

    /// Verify `jws` as a `RevocationList2020Credential` and, if it verifies,
    /// replace the list keyed by its `statusListCredential`/`id` URL.
    ///
    /// Returns `false` on any verification or decoding failure, leaving
    /// previously-set lists untouched.
    pub async fn set_revocation_list(&mut self, jws: &str) -> bool {
        tracing::debug!("validator::set_revocation_list");
        let Ok(jwt) = jws::decode::<VcClaims>(jws, &self.crypto, &self.resolver).await else {
            return false;
        };
        let vc = jwt.claims.vc;
        if !vc.matches_any_type(&["RevocationList2020Credential".to_string()]) {
            return false;
        }
        let Some(list_url) = vc.id.clone() else { return false };

        let encoded = match &vc.credential_subject {
            crate::core::OneMany::One(crate::vc::CredentialSubject::Extension(ext)) => {
                ext.claims.get("encodedList").and_then(|v| v.as_str()).map(str::to_string)
            }
            _ => None,
        };
        let Some(encoded) = encoded else { return false };

        let mut list = RevocationList::new(&list_url);
        if list.decode(&encoded).is_err() {
            return false;
        }
        self.lists.insert(list_url, list);
        true
    }

    /// Resolve a credential's current revocation status against loaded
    /// lists. Returns [`RevocationStatus::Unknown`] when the credential
    /// carries no status entry, or points to a list this validator has not
    /// loaded.
    #[must_use]
    pub fn check_revocation_status(&self, vc: &VerifiableCredential) -> RevocationStatus {
        let Some(status) = &vc.credential_status else { return RevocationStatus::Unknown };
        let Some(list) = self.lists.get(&status.status_list_credential) else {
            return RevocationStatus::Unknown;
        };
        if list.is_revoked(status.status_list_index) {
            RevocationStatus::Revoked
        } else {
            RevocationStatus::Valid
        }
    }
}
