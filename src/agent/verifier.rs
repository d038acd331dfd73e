//! # Verifier Agent

use tracing::instrument;

use crate::crypto::{KeyResolver, Signer, VerifierCrypto};
use crate::validator::{Validator, VerifyCredentialResult, VerifyPresentationError, VerifyPresentationResult};
use crate::vc::{CredentialSubject, VerifiableCredential};

/// Verifies Verifiable Presentations and individual Verifiable Credentials,
/// delegating all cryptographic and revocation checks to a [`Validator`].
///
/// Unlike [`crate::agent::IssuerAgent`] and [`crate::agent::HolderAgent`],
/// the verifier owns no mutable store beyond the validator's revocation
/// lists: verification never persists anything.
pub struct VerifierAgent<S, C, R> {
    signer: S,
    validator: Validator<C, R>,
}

impl<S: Signer, C: VerifierCrypto, R: KeyResolver> VerifierAgent<S, C, R> {
    /// A new verifier agent identified by `signer` (used only for its
    /// `identifier`, i.e. this verifier's own `kid`/audience value — the
    /// verifier never signs anything itself).
    pub fn new(signer: S, validator: Validator<C, R>) -> Self {
        Self { signer, validator }
    }

    /// This verifier's key identifier, used as the expected `aud` of any
    /// presentation it verifies.
    pub async fn identifier(&self) -> anyhow::Result<String> {
        self.signer.identifier().await
    }

    /// Replace the validator's revocation list.
    pub async fn set_revocation_list(&mut self, jws: &str) -> bool {
        self.validator.set_revocation_list(jws).await
    }

    /// Verify a VP-JWS, requiring `aud == self.identifier()` and
    /// `nonce == challenge`.
    #[instrument(level = "debug", skip(self, vp_jws))]
    pub async fn verify_presentation(
        &self, vp_jws: &str, challenge: &str,
    ) -> Result<VerifyPresentationResult, VerifyPresentationError> {
        tracing::debug!("verifier_agent::verify_presentation");
        let audience = self.signer.identifier().await.map_err(|e| {
            VerifyPresentationError::InvalidStructure(format!("no verifier identifier: {e}"))
        })?;
        self.validator.verify_vp_jws(vp_jws, challenge, &audience).await
    }

    /// Verify a standalone VC-JWS.
    ///
    /// `expect_self_as_subject` binds `sub` to this verifier's own
    /// identifier (the verifier is itself the credential's holder);
    /// otherwise subject binding is not checked, since this verifier is
    /// only inspecting a credential someone else holds.
    #[instrument(level = "debug", skip(self, vc_jws))]
    pub async fn verify_vc_jws(
        &self, vc_jws: &str, expect_self_as_subject: bool,
    ) -> VerifyCredentialResult {
        tracing::debug!("verifier_agent::verify_vc_jws");
        let expected_subject =
            if expect_self_as_subject { self.signer.identifier().await.ok() } else { None };
        self.validator.verify_vc_jws(vc_jws, expected_subject.as_deref()).await
    }

    /// `true` iff the ordered atomic attribute names across `credentials`
    /// (in presentation order) exactly equal `names`.
    #[must_use]
    pub fn verify_presentation_contains_attributes(
        credentials: &[VerifiableCredential], names: &[String],
    ) -> bool {
        let found: Vec<&str> = credentials
            .iter()
            .flat_map(|vc| match &vc.credential_subject {
                crate::core::OneMany::One(s) => vec![s],
                crate::core::OneMany::Many(s) => s.iter().collect(),
            })
            .filter_map(|s| match s {
                CredentialSubject::Atomic(a) => Some(a.name.as_str()),
                CredentialSubject::Extension(_) => None,
            })
            .collect();
        found.len() == names.len() && found.iter().zip(names).all(|(f, n)| *f == n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Kind, OneMany};
    use crate::crypto::DidKeyResolver;
    use crate::jws::{self, Type};
    use crate::test_support::{Ed25519Signer, Ed25519Verifier};
    use crate::vc::{AtomicAttribute, Issuer, VcClaims, VerifiableCredential};
    use crate::vp::{VerifiablePresentation, VpClaims};

    async fn issue_sample(issuer: &Ed25519Signer, subject_id: &str) -> String {
        let mut vc = VerifiableCredential::new();
        vc.id = Some(format!("urn:uuid:{}", uuid::Uuid::new_v4()));
        vc.type_ = OneMany::Many(vec!["VerifiableCredential".into(), "EmployeeIDCredential".into()]);
        vc.issuer = Kind::Object(Issuer::from(issuer.identifier().await.unwrap()));
        vc.credential_subject = OneMany::One(CredentialSubject::Atomic(AtomicAttribute {
            id: Some(subject_id.to_string()),
            name: "employeeId".into(),
            value: serde_json::json!("1234567890"),
            mime_type: None,
        }));
        vc.valid_from = Some(chrono::Utc::now());
        vc.valid_until = Some(chrono::Utc::now() + chrono::Duration::hours(1));
        let claims = VcClaims::from_vc(vc);
        jws::encode(Type::Jwt, &claims, issuer).await.unwrap()
    }

    #[tokio::test]
    async fn verifies_a_presentation_bound_to_this_verifier() {
        let issuer = Ed25519Signer::generate();
        let holder = Ed25519Signer::generate();
        let holder_id = holder.identifier().await.unwrap();
        let vc_jws = issue_sample(&issuer, &holder_id).await;

        let verifier_signer = Ed25519Signer::generate();
        let verifier_id = verifier_signer.identifier().await.unwrap();

        let vp = VerifiablePresentation::builder().holder(holder_id).add_credential(vc_jws).build().unwrap();
        let claims = VpClaims::new(vp, verifier_id, "c1");
        let vp_jws = jws::encode(Type::Jwt, &claims, &holder).await.unwrap();

        let validator = Validator::new(Ed25519Verifier, DidKeyResolver);
        let verifier = VerifierAgent::new(verifier_signer, validator);
        let result = verifier.verify_presentation(&vp_jws, "c1").await.unwrap();
        assert_eq!(result.verifiable_credentials.len(), 1);
        assert!(result.revoked_verifiable_credentials.is_empty());
    }

    #[tokio::test]
    async fn rejects_wrong_audience() {
        let issuer = Ed25519Signer::generate();
        let holder = Ed25519Signer::generate();
        let holder_id = holder.identifier().await.unwrap();
        let vc_jws = issue_sample(&issuer, &holder_id).await;

        let vp = VerifiablePresentation::builder().holder(holder_id).add_credential(vc_jws).build().unwrap();
        let claims = VpClaims::new(vp, issuer.identifier().await.unwrap(), "c1");
        let vp_jws = jws::encode(Type::Jwt, &claims, &holder).await.unwrap();

        let validator = Validator::new(Ed25519Verifier, DidKeyResolver);
        let verifier = VerifierAgent::new(Ed25519Signer::generate(), validator);
        let result = verifier.verify_presentation(&vp_jws, "c1").await;
        assert!(matches!(result, Err(VerifyPresentationError::AudienceMismatch)));
    }

    #[test]
    fn attribute_name_list_must_match_order_and_length() {
        let mut vc = VerifiableCredential::new();
        vc.credential_subject = OneMany::One(CredentialSubject::Atomic(AtomicAttribute {
            id: None,
            name: "employeeId".into(),
            value: serde_json::json!("1"),
            mime_type: None,
        }));
        assert!(VerifierAgent::<Ed25519Signer, Ed25519Verifier, DidKeyResolver>::verify_presentation_contains_attributes(
            &[vc.clone()],
            &["employeeId".to_string()],
        ));
        assert!(!VerifierAgent::<Ed25519Signer, Ed25519Verifier, DidKeyResolver>::verify_presentation_contains_attributes(
            &[vc],
            &["otherAttribute".to_string()],
        ));
    }
}
