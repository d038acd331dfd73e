//! # SIOPv2 / OpenID4VP — wallet side
//!
//! Parses an authorization request URL, validates it against the required
//! SIOP shape, asks a [`HolderAgent`] to build a presentation, and returns
//! the signed authorization response in whatever shape the request's
//! `response_mode` calls for.

use chrono::{Duration, Utc};
use tracing::instrument;
use uuid::Uuid;

use crate::agent::HolderAgent;
use crate::core::urlencode;
use crate::crypto::{KeyResolver, Signer, VerifierCrypto};
use crate::jws::{self, Type};
use crate::oidc_siop::error::SiopError;
use crate::oidc_siop::types::{
    AuthorizationResponse, AuthorizationResponsePayload, DescriptorMap, IdTokenClaims, PathNested,
    PresentationSubmission, RequestObject, ResponseMode, JWK_THUMBPRINT_SUBJECT_SYNTAX,
};

/// Builds a SIOPv2 authorization response on behalf of a holder.
pub struct OidcSiopWallet<'a, S, C, R> {
    holder: &'a HolderAgent<S, C, R>,
}

impl<'a, S: Signer, C: VerifierCrypto, R: KeyResolver> OidcSiopWallet<'a, S, C, R> {
    /// A new wallet wrapping `holder`, the agent whose stored credentials
    /// and signing key answer authorization requests.
    #[must_use]
    pub const fn new(holder: &'a HolderAgent<S, C, R>) -> Self {
        Self { holder }
    }

    /// Parse `request_url`'s query string into a [`RequestObject`], run the
    /// structural checks every request must pass, then build and sign the
    /// authorization response.
    ///
    /// # Errors
    ///
    /// Returns a [`SiopError`] if the request is malformed or declares
    /// capabilities this wallet does not support, or any other error if
    /// presentation building or signing fails.
    #[instrument(level = "debug", skip(self, request_url))]
    pub async fn create_authn_response(
        &self, request_url: &str,
    ) -> anyhow::Result<AuthorizationResponse> {
        tracing::debug!("oidc_siop_wallet::create_authn_response");
        let query = request_url.split_once('?').map_or("", |(_, q)| q);
        let request: RequestObject = urlencode::from_string(query)
            .map_err(|e| SiopError::InvalidRequest(format!("malformed request: {e}")))?;

        self.validate(&request)?;

        let audience = self.audience_from_metadata(&request)?;
        let attribute_types = request.requested_attribute_types();

        let vp_jws = self
            .holder
            .create_presentation(&request.nonce, &audience, &attribute_types)
            .await?
            .ok_or_else(|| SiopError::InvalidRequest("no matching credentials to present".to_string()))?;

        let holder_id = self.holder_identifier().await?;
        let now = Utc::now();
        let id_token_claims = IdTokenClaims {
            iss: holder_id.clone(),
            sub: holder_id,
            aud: audience,
            iat: now,
            exp: now + Duration::seconds(60),
            nonce: request.nonce.clone(),
            sub_jwk: self.holder_signer_key().await?,
        };
        let id_token = jws::encode(Type::Jwt, &id_token_claims, self.signer()).await?;

        let descriptor_map = request
            .presentation_definition
            .as_ref()
            .map(|definition| {
                definition
                    .input_descriptors
                    .iter()
                    .map(|descriptor| DescriptorMap {
                        id: descriptor.id.clone(),
                        format: "jwt_vp".to_string(),
                        path: "$".to_string(),
                        path_nested: PathNested {
                            format: "jwt_vc".to_string(),
                            path: "$.verifiableCredential[0]".to_string(),
                        },
                    })
                    .collect()
            })
            .unwrap_or_default();

        let payload = AuthorizationResponsePayload {
            id_token,
            vp_token: vp_jws,
            presentation_submission: PresentationSubmission {
                id: Uuid::new_v4().to_string(),
                definition_id: request
                    .presentation_definition
                    .as_ref()
                    .map_or_else(|| Uuid::new_v4().to_string(), |d| d.id.clone()),
                descriptor_map,
            },
            state: request.state.clone(),
        };

        match &request.response_mode {
            ResponseMode::Fragment { redirect_uri } => {
                let fragment = urlencode::to_string(&payload)?;
                Ok(AuthorizationResponse::Redirect(format!("{redirect_uri}#{fragment}")))
            }
            ResponseMode::Query { redirect_uri } => {
                let qs = urlencode::to_string(&payload)?;
                Ok(AuthorizationResponse::Redirect(format!("{redirect_uri}?{qs}")))
            }
            ResponseMode::Post { response_uri } | ResponseMode::DirectPost { response_uri } => {
                let body = urlencode::to_string(&payload)?;
                Ok(AuthorizationResponse::Post { url: response_uri.clone(), body })
            }
        }
    }

    fn validate(&self, request: &RequestObject) -> Result<(), SiopError> {
        if request.state.is_empty() {
            return Err(SiopError::InvalidRequest("missing state".to_string()));
        }
        if request.nonce.is_empty() {
            return Err(SiopError::InvalidRequest("missing nonce".to_string()));
        }
        let Some(redirect_uri) = request.redirect_uri() else {
            return Err(SiopError::InvalidRequest(
                "post/direct_post response modes are not yet parsed from a redirect_uri".to_string(),
            ));
        };
        if request.client_id != redirect_uri {
            return Err(SiopError::InvalidRequest("client_id must equal redirect_uri".to_string()));
        }
        let Some(response_type) = request.response_type else {
            return Err(SiopError::InvalidRequest("missing response_type".to_string()));
        };
        if !response_type.contains_id_token() {
            return Err(SiopError::InvalidRequest("response_type must include id_token".to_string()));
        }
        if !response_type.contains_vp_token() && request.presentation_definition.is_none() {
            return Err(SiopError::InvalidRequest(
                "response_type must include vp_token, or presentation_definition must be set".to_string(),
            ));
        }

        if let Some(metadata) = &request.client_metadata {
            if !metadata.vp_formats.jwt_vp.algorithms.iter().any(|a| a == "EdDSA" || a == "ES256") {
                return Err(SiopError::RegistrationValueNotSupported(
                    "no vp_formats.jwt_vp algorithm this wallet can produce".to_string(),
                ));
            }
            if !metadata
                .subject_syntax_types_supported
                .iter()
                .any(|t| t == JWK_THUMBPRINT_SUBJECT_SYNTAX || t.starts_with("did:"))
            {
                return Err(SiopError::SubjectSyntaxTypesNotSupported(
                    "no subject syntax type this wallet can present as".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// The audience the presentation is bound to: the verifier's key, if
    /// declared in `client_metadata.jwks`, otherwise the request's
    /// `client_id`.
    fn audience_from_metadata(&self, request: &RequestObject) -> anyhow::Result<String> {
        if let Some(jwks) = request.client_metadata.as_ref().and_then(|m| m.jwks.as_ref()) {
            if let Some(key) = jwks.keys.first() {
                return Ok(key.to_did_key().unwrap_or_else(|_| key.thumbprint()));
            }
        }
        Ok(request.client_id.clone())
    }

    async fn holder_identifier(&self) -> anyhow::Result<String> {
        self.signer().identifier().await
    }

    async fn holder_signer_key(&self) -> anyhow::Result<crate::crypto::PublicKeyJwk> {
        self.signer().verifying_key().await
    }

    fn signer(&self) -> &S {
        self.holder.signer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::DidKeyResolver;
    use crate::oidc_siop::types::{AlgorithmSet, InputDescriptor, PresentationDefinition, VerifierMetadata, VpFormats};
    use crate::test_support::{Ed25519Signer, Ed25519Verifier};
    use crate::validator::Validator;

    async fn issue_sample(issuer: &Ed25519Signer, subject_id: &str) -> String {
        use crate::core::{Kind, OneMany};
        use crate::vc::{AtomicAttribute, CredentialSubject, Issuer, VcClaims, VerifiableCredential};

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
        vc.valid_from = Some(Utc::now());
        vc.valid_until = Some(Utc::now() + Duration::hours(1));
        let claims = VcClaims::from_vc(vc);
        jws::encode(Type::Jwt, &claims, issuer).await.unwrap()
    }

    async fn request_url(holder_redirect: &str, nonce: &str, state: &str) -> String {
        let request = RequestObject {
            response_type: Some(crate::oidc_siop::types::ResponseType::IdTokenVpToken),
            client_id: "https://rp.example".to_string(),
            nonce: nonce.to_string(),
            state: state.to_string(),
            scope: None,
            response_mode: ResponseMode::Fragment { redirect_uri: "https://rp.example".to_string() },
            presentation_definition: Some(PresentationDefinition {
                id: "def-1".to_string(),
                input_descriptors: vec![InputDescriptor {
                    id: "EmployeeIDCredential".to_string(),
                    attribute_types: vec!["EmployeeIDCredential".to_string()],
                }],
            }),
            client_metadata: Some(VerifierMetadata {
                vp_formats: VpFormats { jwt_vp: AlgorithmSet { algorithms: vec!["EdDSA".to_string()] } },
                subject_syntax_types_supported: vec![JWK_THUMBPRINT_SUBJECT_SYNTAX.to_string()],
                jwks: None,
            }),
        };
        let qs = urlencode::to_string(&request).unwrap();
        format!("openid-vc://?{qs}")
    }

    #[tokio::test]
    async fn builds_a_fragment_response() {
        let issuer = Ed25519Signer::generate();
        let holder_signer = Ed25519Signer::generate();
        let holder_id = holder_signer.identifier().await.unwrap();
        let vc_jws = issue_sample(&issuer, &holder_id).await;

        let validator = Validator::new(Ed25519Verifier, DidKeyResolver);
        let holder = HolderAgent::new(holder_signer, validator);
        holder
            .store_credentials(vec![crate::agent::holder::CredentialToStore { vc_jws, attachments: vec![] }])
            .await
            .unwrap();

        let url = request_url("https://rp.example", "nonce-1", "state-1").await;
        let wallet = OidcSiopWallet::new(&holder);
        let response = wallet.create_authn_response(&url).await.unwrap();
        match response {
            AuthorizationResponse::Redirect(url) => {
                assert!(url.starts_with("https://rp.example#"));
                assert!(url.contains("id_token="));
                assert!(url.contains("vp_token="));
            }
            AuthorizationResponse::Post { .. } => panic!("expected a redirect"),
        }
    }

    #[tokio::test]
    async fn rejects_mismatched_client_id_and_redirect_uri() {
        let holder_signer = Ed25519Signer::generate();
        let validator = Validator::new(Ed25519Verifier, DidKeyResolver);
        let holder = HolderAgent::new(holder_signer, validator);

        let mut request = RequestObject {
            response_type: Some(crate::oidc_siop::types::ResponseType::IdTokenVpToken),
            client_id: "https://rp.example".to_string(),
            nonce: "n".to_string(),
            state: "s".to_string(),
            scope: None,
            response_mode: ResponseMode::Fragment { redirect_uri: "https://other.example".to_string() },
            presentation_definition: None,
            client_metadata: None,
        };
        request.scope = Some("EmployeeIDCredential".to_string());
        let qs = urlencode::to_string(&request).unwrap();
        let url = format!("openid-vc://?{qs}");

        let wallet = OidcSiopWallet::new(&holder);
        let err = wallet.create_authn_response(&url).await.unwrap_err();
        assert!(err.to_string().contains("client_id"));
    }
}
