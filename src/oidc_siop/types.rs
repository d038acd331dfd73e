//! Wire types for the SIOPv2 / OpenID for Verifiable Presentations request
//! and response envelope. These are named interfaces only: the crate builds
//! and parses them, but never fetches a `request_uri` or posts a response
//! over HTTP itself.

use chrono::serde::ts_seconds;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::PublicKeyJwk;

/// The `response_type` parameter. SIOPv2 always asks for both an
/// authentication assertion and a presentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseType {
    /// `id_token`.
    IdToken,
    /// `vp_token`.
    VpToken,
    /// `id_token vp_token`.
    IdTokenVpToken,
}

impl ResponseType {
    /// `true` if this value includes `id_token`.
    #[must_use]
    pub const fn contains_id_token(self) -> bool {
        matches!(self, Self::IdToken | Self::IdTokenVpToken)
    }

    /// `true` if this value includes `vp_token`.
    #[must_use]
    pub const fn contains_vp_token(self) -> bool {
        matches!(self, Self::VpToken | Self::IdTokenVpToken)
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::IdToken => "id_token",
            Self::VpToken => "vp_token",
            Self::IdTokenVpToken => "id_token vp_token",
        }
    }
}

impl Serialize for ResponseType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ResponseType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let tokens: std::collections::HashSet<&str> = s.split_whitespace().collect();
        match (tokens.contains("id_token"), tokens.contains("vp_token")) {
            (true, true) => Ok(Self::IdTokenVpToken),
            (true, false) => Ok(Self::IdToken),
            (false, true) => Ok(Self::VpToken),
            (false, false) => Err(serde::de::Error::custom(format!("unsupported response_type: {s}"))),
        }
    }
}

/// Inform the wallet of the mechanism to use when returning the
/// authorization response.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "response_mode")]
pub enum ResponseMode {
    /// The response is appended to `redirect_uri` as a URI fragment.
    #[serde(rename = "fragment")]
    Fragment {
        /// The verifier's redirection endpoint.
        redirect_uri: String,
    },

    /// The response is appended to `redirect_uri` as a query string.
    #[serde(rename = "query")]
    Query {
        /// The verifier's redirection endpoint.
        redirect_uri: String,
    },

    /// The response is sent as an HTTPS POST to `response_uri`.
    #[serde(rename = "post")]
    Post {
        /// The URI the wallet posts the response to.
        response_uri: String,
    },

    /// Same as `post`, named distinctly per the OpenID4VP response mode
    /// registry.
    #[serde(rename = "direct_post")]
    DirectPost {
        /// The URI the wallet posts the response to.
        response_uri: String,
    },
}

impl Default for ResponseMode {
    fn default() -> Self {
        Self::Fragment { redirect_uri: String::new() }
    }
}

/// One input descriptor from a request's presentation definition, naming a
/// credential type the verifier wants presented.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct InputDescriptor {
    /// Identifies this descriptor within the presentation definition.
    pub id: String,

    /// The credential type(s) this descriptor is satisfied by, used to
    /// select which stored credentials to present.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attribute_types: Vec<String>,
}

/// A minimal presentation definition: a named set of input descriptors.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct PresentationDefinition {
    /// Identifies this presentation definition.
    pub id: String,

    /// The credential types being requested.
    pub input_descriptors: Vec<InputDescriptor>,
}

/// The verifier's supported algorithms and subject syntax types, as declared
/// in `client_metadata`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct VerifierMetadata {
    /// Supported presentation formats and their algorithms.
    pub vp_formats: VpFormats,

    /// Subject syntax types the verifier can resolve (e.g.
    /// `urn:ietf:params:oauth:jwk-thumbprint`, `did:key`).
    pub subject_syntax_types_supported: Vec<String>,

    /// The verifier's public keys, used to derive the audience the wallet
    /// binds its presentation to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks: Option<Jwks>,
}

/// The algorithms supported for a `jwt_vp`-formatted presentation.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct VpFormats {
    /// Signature algorithms the wallet may use to sign the `vp_token`.
    pub jwt_vp: AlgorithmSet,
}

/// A set of JWS algorithm names.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AlgorithmSet {
    /// Supported algorithm names (e.g. `"EdDSA"`, `"ES256"`).
    pub algorithms: Vec<String>,
}

/// A JSON Web Key Set, as embedded in `client_metadata.jwks`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Jwks {
    /// The verifier's public keys.
    pub keys: Vec<PublicKeyJwk>,
}

/// The subject syntax type this crate's reference wallet/holder supports.
pub const JWK_THUMBPRINT_SUBJECT_SYNTAX: &str = "urn:ietf:params:oauth:jwk-thumbprint";

/// An authorization request, after parsing (and optionally verifying) the
/// request URL or request object JWS.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct RequestObject {
    /// What the wallet is being asked to return.
    pub response_type: Option<ResponseType>,

    /// The verifier's client identifier.
    pub client_id: String,

    /// The verifier-chosen nonce, bound into both the `id_token` and the
    /// `vp_token`.
    pub nonce: String,

    /// Opaque state the verifier correlates its stored nonce by.
    pub state: String,

    /// A scope value naming the attribute types being requested (space
    /// separated), as an alternative to `presentation_definition`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// How the wallet should return its response.
    #[serde(flatten)]
    pub response_mode: ResponseMode,

    /// The credential types being requested, as input descriptors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation_definition: Option<PresentationDefinition>,

    /// The verifier's declared capabilities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_metadata: Option<VerifierMetadata>,
}

impl RequestObject {
    /// The `redirect_uri` this request expects for `client_id == redirect_uri`
    /// validation, and the URI a fragment/query response is appended to.
    #[must_use]
    pub fn redirect_uri(&self) -> Option<&str> {
        match &self.response_mode {
            ResponseMode::Fragment { redirect_uri } | ResponseMode::Query { redirect_uri } => {
                Some(redirect_uri)
            }
            ResponseMode::Post { .. } | ResponseMode::DirectPost { .. } => None,
        }
    }

    /// The attribute types requested, collected from `presentation_definition`
    /// input descriptors, or from `scope` if no presentation definition was
    /// given.
    #[must_use]
    pub fn requested_attribute_types(&self) -> Vec<String> {
        if let Some(definition) = &self.presentation_definition {
            return definition.input_descriptors.iter().flat_map(|d| d.attribute_types.clone()).collect();
        }
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// Claims of the SIOPv2 self-issued `id_token`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct IdTokenClaims {
    /// The holder's own identifier (self-issued: `iss == sub`).
    pub iss: String,

    /// `= iss`.
    pub sub: String,

    /// The verifier's `redirect_uri`.
    pub aud: String,

    /// Issued-at, as a UNIX timestamp.
    #[serde(with = "ts_seconds")]
    pub iat: DateTime<Utc>,

    /// Expiry, as a UNIX timestamp. Fixed at 60 seconds after `iat`.
    #[serde(with = "ts_seconds")]
    pub exp: DateTime<Utc>,

    /// The request's nonce, echoed back.
    pub nonce: String,

    /// The holder's public key, so the verifier can confirm `sub` without a
    /// separate resolution step.
    pub sub_jwk: PublicKeyJwk,
}

/// Maps one submitted credential back to the input descriptor it satisfies.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct DescriptorMap {
    /// The input descriptor id this entry satisfies.
    pub id: String,

    /// The format of the submitted presentation (`"jwt_vp"`).
    pub format: String,

    /// `JSONPath` into the `vp_token` locating the presentation (`"$"` for a
    /// single, unwrapped presentation).
    pub path: String,

    /// Locates the credential within the presentation.
    pub path_nested: PathNested,
}

/// The nested path describing where, inside a `jwt_vp`, a credential lives.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct PathNested {
    /// The format of the nested credential (`"jwt_vc"`).
    pub format: String,

    /// `JSONPath` locating the credential within the presentation.
    pub path: String,
}

/// Describes how the submitted `vp_token` answers the request's
/// presentation definition.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct PresentationSubmission {
    /// Identifies this submission.
    pub id: String,

    /// The presentation definition this submission answers.
    pub definition_id: String,

    /// One entry per submitted credential.
    pub descriptor_map: Vec<DescriptorMap>,
}

/// The wallet's authorization response, in the shape the request's
/// `response_mode` calls for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthorizationResponse {
    /// `fragment` / `query` modes: the verifier's `redirect_uri` with the
    /// response appended.
    Redirect(String),

    /// `post` / `direct_post` modes: the verifier's `response_uri` and the
    /// `application/x-www-form-urlencoded` response body to post to it.
    Post {
        /// The URI to post the body to.
        url: String,
        /// The form-encoded response body.
        body: String,
    },
}

/// The `id_token`/`vp_token`/`presentation_submission` fields the wallet
/// returns, before being folded into an [`AuthorizationResponse`].
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AuthorizationResponsePayload {
    /// The signed SIOPv2 `id_token`.
    pub id_token: String,

    /// The signed `vp_token` (a VP-JWS).
    pub vp_token: String,

    /// How the `vp_token` answers the request's presentation definition.
    pub presentation_submission: PresentationSubmission,

    /// Echoed back from the request.
    pub state: String,
}
