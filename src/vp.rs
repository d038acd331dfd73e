//! # W3C Verifiable Presentations

use chrono::serde::ts_seconds;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::core::{Kind, OneMany};
use crate::vc::VerifiableCredential;

/// A holder-signed wrapper around one or more VC-JWS strings, scoped to a
/// verifier and a challenge.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifiablePresentation {
    /// The @context property, as on [`VerifiableCredential`].
    #[serde(rename = "@context")]
    pub context: Vec<Kind<Value>>,

    /// A unique identifier for this presentation.
    pub id: Option<String>,

    /// Type tags; the first entry is always `VerifiablePresentation`.
    #[serde(rename = "type")]
    pub type_: OneMany<String>,

    /// The wrapped credentials, each a raw compact VC-JWS string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifiable_credential: Option<Vec<String>>,

    /// The holder's key identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder: Option<String>,
}

impl VerifiablePresentation {
    /// Returns a new [`VpBuilder`].
    #[must_use]
    pub fn builder() -> VpBuilder {
        VpBuilder::new()
    }
}

/// Builds a [`VerifiablePresentation`].
#[derive(Clone, Default)]
pub struct VpBuilder {
    vp: VerifiablePresentation,
}

impl VpBuilder {
    /// A new builder, pre-populated with the default `@context`/`type`.
    #[must_use]
    pub fn new() -> Self {
        let mut builder = Self::default();
        builder.vp.id = Some(format!("urn:uuid:{}", Uuid::new_v4()));
        builder.vp.context.push(Kind::String("https://www.w3.org/2018/credentials/v1".to_string()));
        builder.vp.type_ = OneMany::One("VerifiablePresentation".to_string());
        builder
    }

    /// Appends an `@context` entry.
    #[must_use]
    pub fn add_context(mut self, context: Kind<Value>) -> Self {
        self.vp.context.push(context);
        self
    }

    /// Appends a type tag.
    #[must_use]
    pub fn add_type(mut self, type_: impl Into<String>) -> Self {
        let mut types = match self.vp.type_ {
            OneMany::One(t) => vec![t],
            OneMany::Many(t) => t,
        };
        types.push(type_.into());
        self.vp.type_ = OneMany::Many(types);
        self
    }

    /// Appends a wrapped VC-JWS string.
    #[must_use]
    pub fn add_credential(mut self, vc_jws: impl Into<String>) -> Self {
        self.vp.verifiable_credential.get_or_insert_with(Vec::new).push(vc_jws.into());
        self
    }

    /// Sets the holder's key identifier.
    #[must_use]
    pub fn holder(mut self, holder: impl Into<String>) -> Self {
        self.vp.holder = Some(holder.into());
        self
    }

    /// Builds the presentation.
    ///
    /// # Errors
    ///
    /// Returns an error if `holder` was never set.
    pub fn build(self) -> anyhow::Result<VerifiablePresentation> {
        if self.vp.holder.is_none() {
            anyhow::bail!("holder is required");
        }
        Ok(self.vp)
    }
}

/// VP-JWS claims: the JWT envelope around a [`VerifiablePresentation`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct VpClaims {
    /// The holder's key identifier (= `vp.holder`).
    pub iss: String,

    /// `= vp.id`.
    pub jti: String,

    /// The verifier's key identifier.
    pub aud: String,

    /// The verifier-chosen challenge this presentation answers.
    pub nonce: String,

    /// The time this presentation was created, as a UNIX timestamp.
    #[serde(with = "ts_seconds")]
    pub nbf: DateTime<Utc>,

    /// `= nbf`.
    #[serde(with = "ts_seconds")]
    pub iat: DateTime<Utc>,

    /// The time this presentation expires, as a UNIX timestamp. Defaults to
    /// one hour after `iat`.
    #[serde(with = "ts_seconds")]
    pub exp: DateTime<Utc>,

    /// The presentation itself.
    pub vp: VerifiablePresentation,
}

impl VpClaims {
    /// Derive VP-JWS claims for `vp`, challenged by `nonce` for `audience`.
    #[must_use]
    pub fn new(vp: VerifiablePresentation, audience: impl Into<String>, nonce: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            iss: vp.holder.clone().unwrap_or_default(),
            jti: vp.id.clone().unwrap_or_default(),
            aud: audience.into(),
            nonce: nonce.into(),
            nbf: now,
            iat: now,
            exp: now.checked_add_signed(TimeDelta::hours(1)).unwrap_or(now),
            vp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_holder() {
        let err = VerifiablePresentation::builder().build().unwrap_err();
        assert!(err.to_string().contains("holder"));
    }

    #[test]
    fn builder_builds_with_holder() {
        let vp = VerifiablePresentation::builder()
            .holder("did:key:z6Mkholder")
            .add_credential("header.payload.sig")
            .build()
            .unwrap();
        assert_eq!(vp.holder.as_deref(), Some("did:key:z6Mkholder"));
        assert_eq!(vp.verifiable_credential.unwrap().len(), 1);
    }

    #[test]
    fn claims_default_one_hour_expiry() {
        let vp = VerifiablePresentation::builder().holder("did:key:z6Mk").build().unwrap();
        let claims = VpClaims::new(vp, "did:key:verifier", "n-123");
        assert_eq!((claims.exp - claims.iat).num_seconds(), 3600);
        assert_eq!(claims.nonce, "n-123");
    }
}
