//! # Issuer Agent

use std::collections::HashMap;

use base64ct::{Base64UrlUnpadded, Encoding as _};
use chrono::{TimeDelta, Utc};
use serde_json::Map;
use tokio::sync::Mutex;

use tracing::instrument;

use crate::core::{Kind, OneMany};
use crate::crypto::Signer;
use crate::jws;
use crate::status::RevocationList;
use crate::store::{IssuedCredentialEntry, IssuerCredentialStore};
use crate::vc::{AtomicAttribute, CredentialStatus, CredentialSubject, Issuer, StatusPurpose, VcClaims, VerifiableCredential};

/// Supplies the claims (and optional byte attachments) for a credential of a
/// given type about a given subject. Implemented by the embedding
/// application; this crate never invents claim data itself.
pub trait DataProvider: Send + Sync {
    /// Look up the claims for `credential_type` about `subject_id`.
    /// `Ok(None)` means the subject is not eligible for that type.
    fn get_credential(
        &self, subject_id: &str, credential_type: &str,
    ) -> impl Future<Output = anyhow::Result<Option<CredentialClaims>>> + Send;
}

/// The claims and optional attachments a [`DataProvider`] returns for one
/// credential.
pub struct CredentialClaims {
    /// The subject's single named attribute, or an extension subject's
    /// claims if `attribute_name`/`attribute_value` are left default and
    /// `extension` is set instead.
    pub attribute_name: String,
    /// The attribute's value.
    pub attribute_value: serde_json::Value,
    /// Opaque byte attachments (e.g. a photo) to bundle with the issued
    /// credential, named for the holder's store.
    pub attachments: Vec<(String, Vec<u8>)>,
    /// How long the issued credential remains valid.
    pub validity: TimeDelta,
}

/// One successfully issued credential.
pub struct IssuedCredential {
    /// The signed VC-JWS.
    pub vc_jws: String,
    /// The credential type issued.
    pub credential_type: String,
    /// Attachments bundled alongside the credential, to be passed to the
    /// holder's store alongside `vc_jws`.
    pub attachments: Vec<(String, Vec<u8>)>,
}

/// Why a requested credential type could not be issued.
pub struct FailureReason {
    /// The credential type that failed.
    pub credential_type: String,
    /// A human-readable explanation.
    pub reason: String,
}

/// Aggregate result of [`IssuerAgent::issue_credential_with_types`].
#[derive(Default)]
pub struct IssuedCredentialResult {
    /// Credentials issued successfully.
    pub successful: Vec<IssuedCredential>,
    /// Credential types that could not be issued.
    pub failed: Vec<FailureReason>,
}

/// Issues credentials, revokes them, and publishes the revocation list.
///
/// Internally serializes mutating operations (issue/revoke) behind a single
/// mutex, matching the single-outstanding-call concurrency model: a
/// cancelled issuance never leaks a reserved revocation index, because the
/// index is only written into the list once the store insert (guarded by
/// the same lock) has succeeded.
pub struct IssuerAgent<S, D> {
    signer: S,
    data_provider: D,
    status_list_base_url: String,
    state: Mutex<IssuerState>,
}

#[derive(Default)]
struct IssuerState {
    store: IssuerCredentialStore,
    lists: HashMap<String, RevocationList>,
}

impl<S: Signer, D: DataProvider> IssuerAgent<S, D> {
    /// A new issuer agent. `status_list_base_url` is the base URL under
    /// which revocation list credentials for each time period are
    /// published, e.g. `https://issuer.example/status`.
    pub fn new(signer: S, data_provider: D, status_list_base_url: impl Into<String>) -> Self {
        Self {
            signer,
            data_provider,
            status_list_base_url: status_list_base_url.into(),
            state: Mutex::new(IssuerState::default()),
        }
    }

    /// Issue one credential per entry in `types`, about `subject_id`, for
    /// time period `time_period` (the revocation list bucket this issuance
    /// allocates its status index from — e.g. a quarter or a release
    /// train).
    #[instrument(level = "debug", skip(self))]
    pub async fn issue_credential_with_types(
        &self, subject_id: &str, types: &[String], time_period: &str,
    ) -> anyhow::Result<IssuedCredentialResult> {
        tracing::debug!("issuer_agent::issue_credential_with_types");
        let mut result = IssuedCredentialResult::default();

        for credential_type in types {
            match self.issue_one(subject_id, credential_type, time_period).await {
                Ok(issued) => result.successful.push(issued),
                Err(e) => result.failed.push(FailureReason {
                    credential_type: credential_type.clone(),
                    reason: e.to_string(),
                }),
            }
        }
        Ok(result)
    }

    async fn issue_one(
        &self, subject_id: &str, credential_type: &str, time_period: &str,
    ) -> anyhow::Result<IssuedCredential> {
        let Some(claims) = self.data_provider.get_credential(subject_id, credential_type).await?
        else {
            anyhow::bail!("subject is not eligible for '{credential_type}'");
        };

        let mut state = self.state.lock().await;
        let index = state
            .lists
            .entry(time_period.to_string())
            .or_insert_with(|| RevocationList::new(time_period))
            .allocate_index()?;

        let issuer_id = self.signer.identifier().await?;
        let issuance_date = Utc::now();
        let expiration_date = issuance_date.checked_add_signed(claims.validity);

        let status_list_credential =
            format!("{}/{time_period}", self.status_list_base_url.trim_end_matches('/'));

        let vc_id = format!("urn:uuid:{}", uuid::Uuid::new_v4());
        let vc = VerifiableCredential {
            context: vec![Kind::String("https://www.w3.org/2018/credentials/v1".to_string())],
            id: Some(vc_id.clone()),
            type_: OneMany::Many(vec!["VerifiableCredential".to_string(), credential_type.to_string()]),
            issuer: Kind::Object(Issuer::from(issuer_id)),
            credential_subject: OneMany::One(CredentialSubject::Atomic(AtomicAttribute {
                id: Some(subject_id.to_string()),
                name: claims.attribute_name.clone(),
                value: claims.attribute_value.clone(),
                mime_type: None,
            })),
            valid_from: Some(issuance_date),
            valid_until: expiration_date,
            credential_status: Some(CredentialStatus {
                status_list_index: index,
                status_list_credential,
                status_purpose: StatusPurpose::Revocation,
            }),
        };

        let vc_claims = VcClaims::from_vc(vc);
        let vc_jws = jws::encode(jws::Type::Jwt, &vc_claims, &self.signer).await?;

        state.store.insert(IssuedCredentialEntry {
            vc_id,
            status_list_index: index,
            credential_type: credential_type.to_string(),
            time_period: time_period.to_string(),
            issuance_date,
            expiration_date,
            revoked: false,
        });

        Ok(IssuedCredential {
            vc_jws,
            credential_type: credential_type.to_string(),
            attachments: claims.attachments,
        })
    }

    /// Revoke each credential named by `jti` in `vc_jws_list`. Returns
    /// `true` iff every listed credential was found in this issuer's store
    /// and revoked.
    #[instrument(level = "debug", skip(self, vc_jws_list))]
    pub async fn revoke_credentials(&self, vc_jws_list: &[String]) -> bool {
        tracing::debug!("issuer_agent::revoke_credentials");
        let mut state = self.state.lock().await;
        let mut all_found = true;

        for compact in vc_jws_list {
            let Some((_, payload)) = compact.split_once('.').and_then(|(h, rest)| {
                rest.split_once('.').map(|(p, _)| (h, p))
            }) else {
                all_found = false;
                continue;
            };
            let Ok(payload_bytes) = base64ct::Base64UrlUnpadded::decode_vec(payload) else {
                all_found = false;
                continue;
            };
            let Ok(claims) = serde_json::from_slice::<Map<String, serde_json::Value>>(&payload_bytes)
            else {
                all_found = false;
                continue;
            };
            let Some(jti) = claims.get("jti").and_then(|v| v.as_str()) else {
                all_found = false;
                continue;
            };

            let Some(entry) = state.store.get(jti).cloned() else {
                all_found = false;
                continue;
            };
            state.store.revoke(jti);
            state
                .lists
                .entry(entry.time_period.clone())
                .or_insert_with(|| RevocationList::new(&entry.time_period))
                .revoke(entry.status_list_index);
        }
        all_found
    }

    /// Build and sign the current revocation list credential for
    /// `time_period`. Always produced, even with zero revocations.
    #[instrument(level = "debug", skip(self))]
    pub async fn issue_revocation_list_credential(
        &self, time_period: &str,
    ) -> anyhow::Result<String> {
        tracing::debug!("issuer_agent::issue_revocation_list_credential");
        let mut state = self.state.lock().await;
        let list = state
            .lists
            .entry(time_period.to_string())
            .or_insert_with(|| RevocationList::new(time_period));
        let url = format!("{}/{time_period}", self.status_list_base_url.trim_end_matches('/'));
        list.to_credential(&url, &self.signer).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Ed25519Signer;

    struct StaticProvider;

    impl DataProvider for StaticProvider {
        async fn get_credential(
            &self, _subject_id: &str, credential_type: &str,
        ) -> anyhow::Result<Option<CredentialClaims>> {
            if credential_type == "Unknown" {
                return Ok(None);
            }
            Ok(Some(CredentialClaims {
                attribute_name: "employeeId".to_string(),
                attribute_value: serde_json::json!("1234567890"),
                attachments: vec![],
                validity: TimeDelta::days(365),
            }))
        }
    }

    #[tokio::test]
    async fn issues_and_revokes() {
        let signer = Ed25519Signer::generate();
        let agent = IssuerAgent::new(signer, StaticProvider, "https://issuer.example/status");
        let subject = "did:key:z6Mksubject";

        let result = agent
            .issue_credential_with_types(subject, &["EmployeeIDCredential".to_string()], "2024-Q1")
            .await
            .unwrap();
        assert_eq!(result.successful.len(), 1);
        assert!(result.failed.is_empty());

        let jws = result.successful[0].vc_jws.clone();
        assert!(agent.revoke_credentials(&[jws]).await);

        let list_jws = agent.issue_revocation_list_credential("2024-Q1").await.unwrap();
        assert_eq!(list_jws.split('.').count(), 3);
    }

    #[tokio::test]
    async fn reports_failure_for_unknown_type() {
        let signer = Ed25519Signer::generate();
        let agent = IssuerAgent::new(signer, StaticProvider, "https://issuer.example/status");
        let result = agent
            .issue_credential_with_types("did:key:zSub", &["Unknown".to_string()], "2024-Q1")
            .await
            .unwrap();
        assert!(result.successful.is_empty());
        assert_eq!(result.failed.len(), 1);
    }
}
