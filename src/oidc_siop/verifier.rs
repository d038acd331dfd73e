//! # SIOPv2 / OpenID4VP — verifier side
//!
//! Builds authorization request URLs and validates the wallet's
//! authorization response. Holds no signing identity of its own: a SIOP
//! relying party is identified by its `client_id`/`redirect_uri`, not a
//! `did:key`.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::instrument;
use uuid::Uuid;

use crate::crypto::{KeyResolver, VerifierCrypto};
use crate::oidc_siop::error::SiopError;
use crate::oidc_siop::types::{
    AlgorithmSet, AuthorizationResponsePayload, PresentationDefinition, RequestObject,
    ResponseMode, ResponseType, VerifierMetadata, VpFormats, JWK_THUMBPRINT_SUBJECT_SYNTAX,
};
use crate::validator::{Validator, VerifyPresentationError, VerifyPresentationResult};

/// Builds SIOP authorization requests and validates responses against a
/// relying party identified by `relying_party_url`.
pub struct OidcSiopVerifier<C, R> {
    relying_party_url: String,
    supported_algorithms: Vec<String>,
    validator: Validator<C, R>,
    pending: Mutex<HashMap<String, String>>,
}

impl<C: VerifierCrypto, R: KeyResolver> OidcSiopVerifier<C, R> {
    /// A new verifier identified by `relying_party_url` (used as both
    /// `client_id` and `redirect_uri`), declaring `supported_algorithms` in
    /// `client_metadata.vp_formats.jwt_vp.algorithms`.
    pub fn new(
        relying_party_url: impl Into<String>, supported_algorithms: Vec<String>,
        validator: Validator<C, R>,
    ) -> Self {
        Self {
            relying_party_url: relying_party_url.into(),
            supported_algorithms,
            validator,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the validator's revocation list.
    pub async fn set_revocation_list(&mut self, jws: &str) -> bool {
        self.validator.set_revocation_list(jws).await
    }

    /// Build an authorization request URL asking for `attribute_types`, to
    /// be opened at `wallet_url`. Returns the full URL and the `state` value
    /// the subsequent response will be correlated by.
    ///
    /// # Errors
    ///
    /// Returns an error if the request object fails to serialize.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_authn_request_url(
        &self, wallet_url: &str, attribute_types: &[String], response_mode: ResponseMode,
    ) -> anyhow::Result<(String, String)> {
        tracing::debug!("oidc_siop_verifier::create_authn_request_url");
        let state = Uuid::new_v4().to_string();
        let nonce = Uuid::new_v4().to_string();
        self.pending.lock().await.insert(state.clone(), nonce.clone());

        let input_descriptors = attribute_types
            .iter()
            .map(|t| crate::oidc_siop::types::InputDescriptor {
                id: t.clone(),
                attribute_types: vec![t.clone()],
            })
            .collect();

        let request = RequestObject {
            response_type: Some(ResponseType::IdTokenVpToken),
            client_id: self.relying_party_url.clone(),
            nonce,
            state: state.clone(),
            scope: None,
            response_mode,
            presentation_definition: Some(PresentationDefinition {
                id: Uuid::new_v4().to_string(),
                input_descriptors,
            }),
            client_metadata: Some(VerifierMetadata {
                vp_formats: VpFormats {
                    jwt_vp: AlgorithmSet { algorithms: self.supported_algorithms.clone() },
                },
                subject_syntax_types_supported: vec![JWK_THUMBPRINT_SUBJECT_SYNTAX.to_string()],
                jwks: None,
            }),
        };

        let qs = crate::core::urlencode::to_string(&request)?;
        Ok((format!("{wallet_url}?{qs}"), state))
    }

    /// Verify the wallet's `id_token` and `vp_token`, checking that both are
    /// bound to the nonce stored under `payload.state` and to this relying
    /// party as audience.
    ///
    /// # Errors
    ///
    /// Returns a [`VerifyPresentationError`] if either token fails structural,
    /// cryptographic, or binding checks.
    #[instrument(level = "debug", skip(self, payload))]
    pub async fn validate_authn_response(
        &self, payload: &AuthorizationResponsePayload,
    ) -> Result<VerifyPresentationResult, VerifyPresentationError> {
        tracing::debug!("oidc_siop_verifier::validate_authn_response");
        let nonce = self
            .pending
            .lock()
            .await
            .remove(&payload.state)
            .ok_or_else(|| VerifyPresentationError::InvalidStructure("unknown state".to_string()))?;

        let id_token: crate::jws::Jwt<crate::oidc_siop::types::IdTokenClaims> = self
            .validator
            .decode_jwt(&payload.id_token)
            .await
            .map_err(|e| VerifyPresentationError::InvalidStructure(e.to_string()))?;
        let claims = id_token.claims;

        if claims.aud != self.relying_party_url {
            return Err(VerifyPresentationError::AudienceMismatch);
        }
        if claims.nonce != nonce {
            return Err(VerifyPresentationError::NonceMismatch);
        }
        let now = chrono::Utc::now();
        if now < claims.iat || now > claims.exp {
            return Err(VerifyPresentationError::NotCurrentlyValid);
        }
        if claims.iss != claims.sub {
            return Err(VerifyPresentationError::InvalidStructure(
                "id_token is not self-issued (iss != sub)".to_string(),
            ));
        }

        self.validator.verify_vp_jws(&payload.vp_token, &nonce, &self.relying_party_url).await
    }
}

/// Convenience constructor errors surfaced from request-building helpers
/// that validate verifier-declared metadata before use.
impl<C, R> OidcSiopVerifier<C, R> {
    /// Validate that `algorithm` is one this relying party declares support
    /// for, returning a typed [`SiopError`] otherwise.
    pub fn require_supported_algorithm(&self, algorithm: &str) -> Result<(), SiopError> {
        if self.supported_algorithms.iter().any(|a| a == algorithm) {
            Ok(())
        } else {
            Err(SiopError::RegistrationValueNotSupported(format!(
                "algorithm '{algorithm}' is not supported by this relying party"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Kind, OneMany};
    use crate::crypto::{DidKeyResolver, Signer};
    use crate::jws::{self, Type};
    use crate::oidc_siop::types::{DescriptorMap, PathNested, PresentationSubmission};
    use crate::test_support::{Ed25519Signer, Ed25519Verifier};
    use crate::vc::{AtomicAttribute, CredentialSubject, Issuer, VcClaims, VerifiableCredential};
    use crate::vp::{VerifiablePresentation, VpClaims};

    async fn issue_sample(issuer: &Ed25519Signer, subject_id: &str) -> String {
        let mut vc = VerifiableCredential::new();
        vc.id = Some(format!("urn:uuid:{}", Uuid::new_v4()));
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
    async fn builds_a_request_url_and_records_state() {
        let validator = Validator::new(Ed25519Verifier, DidKeyResolver);
        let verifier =
            OidcSiopVerifier::new("https://rp.example", vec!["EdDSA".to_string()], validator);
        let (url, state) = verifier
            .create_authn_request_url(
                "openid-vc://",
                &["EmployeeIDCredential".to_string()],
                ResponseMode::Fragment { redirect_uri: "https://rp.example".to_string() },
            )
            .await
            .unwrap();
        assert!(url.starts_with("openid-vc://?"));
        assert!(url.contains("client_id=https"));
        assert!(verifier.pending.lock().await.contains_key(&state));
    }

    #[tokio::test]
    async fn validates_a_matching_response() {
        let issuer = Ed25519Signer::generate();
        let holder = Ed25519Signer::generate();
        let holder_id = holder.identifier().await.unwrap();
        let vc_jws = issue_sample(&issuer, &holder_id).await;

        let validator = Validator::new(Ed25519Verifier, DidKeyResolver);
        let verifier =
            OidcSiopVerifier::new("https://rp.example", vec!["EdDSA".to_string()], validator);
        let (_, state) = verifier
            .create_authn_request_url(
                "openid-vc://",
                &["EmployeeIDCredential".to_string()],
                ResponseMode::Fragment { redirect_uri: "https://rp.example".to_string() },
            )
            .await
            .unwrap();
        let nonce = verifier.pending.lock().await.get(&state).cloned().unwrap();

        let vp = VerifiablePresentation::builder()
            .holder(holder_id.clone())
            .add_credential(vc_jws)
            .build()
            .unwrap();
        let vp_claims = VpClaims::new(vp, "https://rp.example", nonce.clone());
        let vp_token = jws::encode(Type::Jwt, &vp_claims, &holder).await.unwrap();

        let now = chrono::Utc::now();
        let id_claims = crate::oidc_siop::types::IdTokenClaims {
            iss: holder_id.clone(),
            sub: holder_id.clone(),
            aud: "https://rp.example".to_string(),
            iat: now,
            exp: now + chrono::Duration::seconds(60),
            nonce,
            sub_jwk: holder.verifying_key().await.unwrap(),
        };
        let id_token = jws::encode(Type::Jwt, &id_claims, &holder).await.unwrap();

        let payload = AuthorizationResponsePayload {
            id_token,
            vp_token,
            presentation_submission: PresentationSubmission {
                id: "sub-1".to_string(),
                definition_id: "def-1".to_string(),
                descriptor_map: vec![DescriptorMap {
                    id: "EmployeeIDCredential".to_string(),
                    format: "jwt_vp".to_string(),
                    path: "$".to_string(),
                    path_nested: PathNested {
                        format: "jwt_vc".to_string(),
                        path: "$.verifiableCredential[0]".to_string(),
                    },
                }],
            },
            state,
        };

        let result = verifier.validate_authn_response(&payload).await.unwrap();
        assert_eq!(result.verifiable_credentials.len(), 1);
    }

    #[tokio::test]
    async fn rejects_unknown_state() {
        let validator = Validator::new(Ed25519Verifier, DidKeyResolver);
        let verifier =
            OidcSiopVerifier::new("https://rp.example", vec!["EdDSA".to_string()], validator);
        let payload = AuthorizationResponsePayload { state: "no-such-state".to_string(), ..Default::default() };
        let result = verifier.validate_authn_response(&payload).await;
        assert!(matches!(result, Err(VerifyPresentationError::InvalidStructure(_))));
    }
}
