//! # Holder Agent

use tokio::sync::Mutex;
use tracing::instrument;

use crate::crypto::{KeyResolver, Signer, VerifierCrypto};
use crate::jws;
use crate::store::{Attachment, StoredCredentialEntry, SubjectCredentialStore};
use crate::validator::{RevocationStatus, Validator, VerifyCredentialResult};
use crate::vp::{VerifiablePresentation, VpClaims};

/// One input to [`HolderAgent::store_credentials`].
pub struct CredentialToStore {
    /// The raw VC-JWS as received from the issuer.
    pub vc_jws: String,
    /// Opaque attachments bundled by the issuer alongside this credential.
    pub attachments: Vec<Attachment>,
}

/// Aggregate result of [`HolderAgent::store_credentials`]. Every input is
/// classified into exactly one bucket.
#[derive(Default)]
pub struct StoredCredentialsResult {
    /// Verified, unrevoked, and persisted.
    pub accepted: Vec<String>,
    /// Verified but already revoked — not persisted.
    pub rejected: Vec<String>,
    /// Failed structural or temporal verification — not persisted.
    pub not_verified: Vec<String>,
}

/// One entry as reported by [`HolderAgent::get_credentials`].
pub struct CredentialView<'a> {
    /// The raw VC-JWS.
    pub vc_jws: &'a str,
    /// The decoded credential.
    pub vc: &'a crate::vc::VerifiableCredential,
    /// Current revocation status, resolved at call time.
    pub status: RevocationStatus,
}

/// Stores credentials, enforces revocation at both store and present time,
/// and builds Verifiable Presentations.
pub struct HolderAgent<S, C, R> {
    signer: S,
    validator: Mutex<Validator<C, R>>,
    store: Mutex<SubjectCredentialStore>,
}

impl<S: Signer, C: VerifierCrypto, R: KeyResolver> HolderAgent<S, C, R> {
    /// A new holder agent with an empty store.
    pub fn new(signer: S, validator: Validator<C, R>) -> Self {
        Self { signer, validator: Mutex::new(validator), store: Mutex::new(SubjectCredentialStore::new()) }
    }

    /// This holder's signer, for collaborators (such as the SIOP wallet)
    /// that need to sign something other than a presentation directly.
    pub const fn signer(&self) -> &S {
        &self.signer
    }

    /// Replace the validator's revocation list. A subsequent
    /// `store_credentials` call observes the new list, so a credential
    /// revoked before it is ever stored is rejected rather than accepted.
    #[instrument(level = "debug", skip(self, jws))]
    pub async fn set_revocation_list(&self, jws: &str) -> bool {
        tracing::debug!("holder_agent::set_revocation_list");
        self.validator.lock().await.set_revocation_list(jws).await
    }

    /// Verify and store each input; accept only credentials that verify,
    /// are bound to this holder, and are not currently revoked.
    #[instrument(level = "debug", skip(self, inputs))]
    pub async fn store_credentials(
        &self, inputs: Vec<CredentialToStore>,
    ) -> anyhow::Result<StoredCredentialsResult> {
        tracing::debug!("holder_agent::store_credentials");
        let my_id = self.signer.identifier().await?;
        let validator = self.validator.lock().await;
        let mut store = self.store.lock().await;
        let mut result = StoredCredentialsResult::default();

        for input in inputs {
            match validator.verify_vc_jws(&input.vc_jws, Some(&my_id)).await {
                VerifyCredentialResult::Success(vc) => {
                    store.insert(StoredCredentialEntry {
                        vc_jws: input.vc_jws.clone(),
                        vc,
                        attachments: input.attachments,
                    });
                    result.accepted.push(input.vc_jws);
                }
                VerifyCredentialResult::Revoked(_) => result.rejected.push(input.vc_jws),
                _ => result.not_verified.push(input.vc_jws),
            }
        }
        Ok(result)
    }

    /// Store credentials the caller has already verified, bypassing
    /// re-verification. Each input's `vc` payload is decoded from its
    /// (unverified) JWS purely to key the store entry; callers are
    /// trusting the signature, temporal bounds, and subject binding
    /// themselves.
    #[instrument(level = "debug", skip(self, inputs))]
    pub async fn store_validated_credentials(&self, inputs: Vec<CredentialToStore>) -> bool {
        tracing::debug!("holder_agent::store_validated_credentials");
        let mut store = self.store.lock().await;
        let mut all_stored = true;
        for input in inputs {
            let Some(vc) = decode_unverified_vc(&input.vc_jws) else {
                all_stored = false;
                continue;
            };
            if !store.insert(StoredCredentialEntry { vc_jws: input.vc_jws, vc, attachments: input.attachments }) {
                all_stored = false;
            }
        }
        all_stored
    }

    /// Stored credentials matching any of `attribute_types`, or all
    /// credentials when `attribute_types` is empty, annotated with their
    /// current revocation status.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_credentials(&self, attribute_types: &[String]) -> Vec<(String, crate::vc::VerifiableCredential, RevocationStatus)> {
        tracing::debug!("holder_agent::get_credentials");
        let validator = self.validator.lock().await;
        let store = self.store.lock().await;
        store
            .matching(attribute_types)
            .map(|entry| {
                let status = validator.check_revocation_status(&entry.vc);
                (entry.vc_jws.clone(), entry.vc.clone(), status)
            })
            .collect()
    }

    /// Build and sign a Verifiable Presentation over every currently
    /// unrevoked stored credential matching `attribute_types` (or all
    /// stored credentials, if empty). Returns `None` if no credential
    /// qualifies.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_presentation(
        &self, challenge: &str, audience: &str, attribute_types: &[String],
    ) -> anyhow::Result<Option<String>> {
        tracing::debug!("holder_agent::create_presentation");
        let selected: Vec<String> = self
            .get_credentials(attribute_types)
            .await
            .into_iter()
            .filter(|(_, _, status)| !matches!(status, RevocationStatus::Revoked))
            .map(|(vc_jws, _, _)| vc_jws)
            .collect();

        if selected.is_empty() {
            return Ok(None);
        }
        self.create_presentation_from(&selected, challenge, audience).await.map(Some)
    }

    /// Build and sign a Verifiable Presentation over exactly
    /// `verified_credentials`, trusting the caller to have pre-filtered
    /// them.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_presentation_from(
        &self, verified_credentials: &[String], challenge: &str, audience: &str,
    ) -> anyhow::Result<String> {
        tracing::debug!("holder_agent::create_presentation_from");
        let holder_id = self.signer.identifier().await?;
        let mut builder = VerifiablePresentation::builder().holder(holder_id);
        for vc_jws in verified_credentials {
            builder = builder.add_credential(vc_jws.clone());
        }
        let vp = builder.build()?;
        let claims = VpClaims::new(vp, audience, challenge);
        jws::encode(jws::Type::Jwt, &claims, &self.signer).await
    }
}

/// Decode the `vc` payload out of a compact JWS without checking its
/// signature, for callers who assert validity out-of-band.
fn decode_unverified_vc(compact: &str) -> Option<crate::vc::VerifiableCredential> {
    let payload_b64 = compact.split('.').nth(1)?;
    let payload = base64ct::Base64UrlUnpadded::decode_vec(payload_b64).ok()?;
    let claims: crate::vc::VcClaims = serde_json::from_slice(&payload).ok()?;
    Some(claims.vc)
}
