//! # W3C Verifiable Credentials
//!
//! A pared-down rendition of the W3C Verifiable Credential Data Model
//! (<https://www.w3.org/TR/vc-data-model>), scoped to what the JWS-enveloping
//! issuance and presentation pipeline in this crate actually needs. Embedded
//! Data Integrity proofs, credential schemas, refresh services and terms of
//! use are not modeled: the only proof mechanism this crate produces or
//! consumes is the enveloping VC-JWS (see [`crate::jws`]).

use std::collections::HashMap;
use std::fmt;
use std::fmt::Display;

use chrono::serde::{ts_seconds, ts_seconds_option};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::{Kind, OneMany};
use crate::registry::subject_registry;

/// A Verifiable Credential: an issuer's signed assertion about a subject.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifiableCredential {
    /// The @context property maps property URIs into short-form aliases. The
    /// first entry is always `https://www.w3.org/2018/credentials/v1`.
    #[serde(rename = "@context")]
    pub context: Vec<Kind<Value>>,

    /// A URN uniquely identifying this credential, e.g.
    /// `urn:uuid:3978344f-8596-4c3a-a978-8fcaba3903c5`.
    pub id: Option<String>,

    /// The credential's type tags. The first entry is always
    /// `VerifiableCredential`; subsequent entries narrow to a concrete type,
    /// e.g. `EmployeeIDCredential`.
    #[serde(rename = "type")]
    pub type_: OneMany<String>,

    /// The entity making the assertion.
    pub issuer: Kind<Issuer>,

    /// Claims about the subject(s) of this credential.
    pub credential_subject: OneMany<CredentialSubject>,

    /// The point in time the credential becomes valid.
    pub valid_from: Option<DateTime<Utc>>,

    /// The point in time the credential ceases to be valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,

    /// Revocation/suspension status, resolved against a published
    /// [`crate::status::RevocationList`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_status: Option<CredentialStatus>,
}

impl VerifiableCredential {
    /// A new credential with sensible `@context`/`type` defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            context: vec![Kind::String("https://www.w3.org/2018/credentials/v1".to_string())],
            type_: OneMany::One("VerifiableCredential".to_string()),
            ..Self::default()
        }
    }

    /// The credential's ordered type tags, flattened to a slice regardless of
    /// whether `type_` holds one or many.
    #[must_use]
    pub fn types(&self) -> Vec<&str> {
        match &self.type_ {
            OneMany::One(t) => vec![t.as_str()],
            OneMany::Many(ts) => ts.iter().map(String::as_str).collect(),
        }
    }

    /// `true` if any of `wanted` appears in this credential's type tags.
    #[must_use]
    pub fn matches_any_type(&self, wanted: &[String]) -> bool {
        let types = self.types();
        wanted.iter().any(|w| types.contains(&w.as_str()))
    }
}

/// Identifies the issuer of a credential.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Issuer {
    /// The issuer's key identifier (JWK thumbprint or `did:key`).
    pub id: String,

    /// Issuer-specific fields flattened alongside `id`.
    #[serde(flatten)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<HashMap<String, Value>>,
}

impl From<String> for Issuer {
    fn from(id: String) -> Self {
        Self { id, extra: None }
    }
}

/// Claims about a subject of a credential.
///
/// Subject shapes are a closed set identified by `credential_subject.type`
/// (absent for the common [`AtomicAttribute`](CredentialSubject::Atomic)
/// case): new shapes are added by registering them with
/// [`crate::registry::LibraryInitializer`] before first use, rather than by
/// widening this enum.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum CredentialSubject {
    /// A single named attribute with a value and MIME type — the common case
    /// for simple attestations ("name", "employeeId", "dateOfBirth", ...).
    Atomic(AtomicAttribute),

    /// Any other JSON object shape, keyed by a type name registered at
    /// process start. Carries the subject `id` plus arbitrary claims.
    Extension(ExtensionSubject),
}

impl Default for CredentialSubject {
    fn default() -> Self {
        Self::Atomic(AtomicAttribute::default())
    }
}

impl CredentialSubject {
    /// The subject's identifier (JWK thumbprint or `did:key`), if present.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Atomic(a) => a.id.as_deref(),
            Self::Extension(e) => e.id.as_deref(),
        }
    }
}

/// A single named attribute about a subject.
///
/// `name` and `value` are required fields (no container-level `default`):
/// that is what lets the untagged [`CredentialSubject`] enum tell an atomic
/// subject apart from an [`ExtensionSubject`] during deserialization — an
/// object missing either field simply fails this variant and falls through.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AtomicAttribute {
    /// The subject's identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The attribute's name, e.g. `"employeeId"`.
    pub name: String,

    /// The attribute's value, as a JSON scalar.
    pub value: Value,

    /// The value's media type, e.g. `"text/plain"`. Defaults to
    /// `"application/json"` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// A registered extension subject shape: opaque claims keyed by a type name
/// [`crate::registry::LibraryInitializer`] has validated at process start.
///
/// `type_name` is required for the same reason [`AtomicAttribute::name`] is:
/// it is the field that lets the untagged enum pick this variant instead of
/// `Atomic` when decoding a `RevocationList2020` or other registered subject.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionSubject {
    /// The subject's identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The registered subject type name.
    #[serde(rename = "type")]
    pub type_name: String,

    /// Arbitrary claims about the subject.
    #[serde(flatten)]
    pub claims: Map<String, Value>,
}

impl ExtensionSubject {
    /// Construct an extension subject, requiring `type_name` to have been
    /// registered via [`crate::registry::LibraryInitializer`].
    ///
    /// # Errors
    ///
    /// Returns an error if `type_name` was never registered.
    pub fn new(
        id: Option<String>, type_name: impl Into<String>, claims: Map<String, Value>,
    ) -> anyhow::Result<Self> {
        let type_name = type_name.into();
        if !subject_registry().contains(&type_name) {
            anyhow::bail!("subject type '{type_name}' is not registered");
        }
        Ok(Self { id, type_name, claims })
    }
}

/// Points to the [`crate::status::RevocationList`] entry backing this
/// credential's revocation status.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatus {
    /// The position of this credential's status flag in the bitstring.
    pub status_list_index: usize,

    /// The URL of the `RevocationList2020Credential` that carries the
    /// bitstring this index is checked against.
    pub status_list_credential: String,

    /// What a set bit means for this entry.
    pub status_purpose: StatusPurpose,
}

/// The purpose of a status list entry.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StatusPurpose {
    /// Permanently invalidates the credential.
    #[default]
    Revocation,

    /// Temporarily invalidates the credential.
    Suspension,
}

impl Display for StatusPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Revocation => write!(f, "revocation"),
            Self::Suspension => write!(f, "suspension"),
        }
    }
}

/// VC-JWS claims: the JWT envelope around a [`VerifiableCredential`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct VcClaims {
    /// The issuer's key identifier.
    pub iss: String,

    /// The subject's key identifier.
    pub sub: String,

    /// `= vc.id`.
    pub jti: String,

    /// `= vc.valid_from`, as a UNIX timestamp.
    #[serde(with = "ts_seconds")]
    pub nbf: DateTime<Utc>,

    /// `= vc.valid_until`, as a UNIX timestamp, when present.
    #[serde(with = "ts_seconds_option")]
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub exp: Option<DateTime<Utc>>,

    /// The credential itself.
    pub vc: VerifiableCredential,
}

impl VcClaims {
    /// Derive VC-JWS claims from a credential. `sub` is read from the first
    /// credential subject; callers with multiple subjects should construct
    /// claims manually.
    #[must_use]
    pub fn from_vc(vc: VerifiableCredential) -> Self {
        let subject = match &vc.credential_subject {
            OneMany::One(s) => s,
            OneMany::Many(s) => &s[0],
        };
        let issuer_id = match &vc.issuer {
            Kind::String(id) => id.clone(),
            Kind::Object(issuer) => issuer.id.clone(),
        };
        Self {
            iss: issuer_id,
            sub: subject.id().unwrap_or_default().to_string(),
            jti: vc.id.clone().unwrap_or_default(),
            nbf: vc.valid_from.unwrap_or_else(Utc::now),
            exp: vc.valid_until,
            vc,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn sample_vc() -> VerifiableCredential {
        let mut vc = VerifiableCredential::new();
        vc.context.push(Kind::String("https://www.w3.org/2018/credentials/examples/v1".into()));
        vc.id = Some("urn:uuid:3978344f-8596-4c3a-a978-8fcaba3903c5".into());
        vc.type_ = OneMany::Many(vec![
            "VerifiableCredential".into(),
            "EmployeeIDCredential".into(),
        ]);
        vc.issuer = Kind::String("did:key:z6Mkissuer".into());
        vc.credential_subject = OneMany::One(CredentialSubject::Atomic(AtomicAttribute {
            id: Some("did:key:z6Mksubject".into()),
            name: "employeeId".into(),
            value: json!("1234567890"),
            mime_type: None,
        }));
        vc.valid_from = Some(Utc.with_ymd_and_hms(2023, 11, 20, 23, 21, 55).unwrap());
        vc.valid_until = Some(Utc.with_ymd_and_hms(2033, 12, 20, 23, 21, 55).unwrap());
        vc
    }

    #[test]
    fn round_trips_through_json() {
        let vc = sample_vc();
        let json = serde_json::to_value(&vc).unwrap();
        assert_eq!(json["type"], json!(["VerifiableCredential", "EmployeeIDCredential"]));
        let back: VerifiableCredential = serde_json::from_value(json).unwrap();
        assert_eq!(back, vc);
    }

    #[test]
    fn atomic_subject_flattens_claims() {
        let vc = sample_vc();
        let json = serde_json::to_value(&vc).unwrap();
        assert_eq!(json["credentialSubject"]["name"], json!("employeeId"));
        assert_eq!(json["credentialSubject"]["value"], json!("1234567890"));
    }

    #[test]
    fn matches_any_type_is_an_overlap_check() {
        let vc = sample_vc();
        assert!(vc.matches_any_type(&["EmployeeIDCredential".to_string()]));
        assert!(vc.matches_any_type(&["Unrelated".to_string(), "EmployeeIDCredential".to_string()]));
        assert!(!vc.matches_any_type(&["Unrelated".to_string()]));
    }

    #[test]
    fn extension_subject_survives_a_json_round_trip() {
        // Regression test: the untagged `CredentialSubject` enum must not
        // let `Atomic` swallow an extension-shaped object (it would, if
        // either variant tolerated missing discriminating fields via a
        // container-level `default`).
        let mut claims = Map::new();
        claims.insert("encodedList".to_string(), json!("H4sIA"));
        let subject = ExtensionSubject {
            id: Some("https://issuer.example/status/1".into()),
            type_name: "RevocationList2020".into(),
            claims,
        };
        let mut vc = VerifiableCredential::new();
        vc.credential_subject = OneMany::One(CredentialSubject::Extension(subject));

        let json = serde_json::to_value(&vc).unwrap();
        let back: VerifiableCredential = serde_json::from_value(json).unwrap();
        match back.credential_subject {
            OneMany::One(CredentialSubject::Extension(ext)) => {
                assert_eq!(ext.type_name, "RevocationList2020");
                assert_eq!(ext.claims.get("encodedList"), Some(&json!("H4sIA")));
            }
            other => panic!("expected an extension subject, got {other:?}"),
        }
    }

    #[test]
    fn claims_derive_sub_and_iss_from_vc() {
        let vc = sample_vc();
        let claims = VcClaims::from_vc(vc.clone());
        assert_eq!(claims.sub, "did:key:z6Mksubject");
        assert_eq!(claims.iss, "did:key:z6Mkissuer");
        assert_eq!(claims.jti, vc.id.unwrap());
    }
}
