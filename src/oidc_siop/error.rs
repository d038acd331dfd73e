//! Typed SIOPv2 / OpenID4VP error codes, serialized the same
//! `{"error": ..., "error_description": ...}` shape used by the rest of the
//! crate's `OpenID`-flavoured error responses.

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::core::urlencode;

/// Failure modes surfaced by [`super::wallet::OidcSiopWallet`] and
/// [`super::verifier::OidcSiopVerifier`].
#[derive(Error, Debug, Deserialize)]
pub enum SiopError {
    /// The request URL is missing a required parameter, repeats one, or is
    /// otherwise malformed.
    #[error(r#"{{"error": "invalid_request", "error_description": "{0}"}}"#)]
    InvalidRequest(String),

    /// The end user declined to respond to the request.
    #[error(r#"{{"error": "user_cancelled", "error_description": "{0}"}}"#)]
    UserCancelled(String),

    /// A value the verifier declared in `client_metadata` is not one this
    /// wallet supports (e.g. an unsupported signing algorithm).
    #[error(r#"{{"error": "registration_value_not_supported", "error_description": "{0}"}}"#)]
    RegistrationValueNotSupported(String),

    /// None of the verifier's declared `subject_syntax_types_supported`
    /// match a syntax this wallet can present as.
    #[error(r#"{{"error": "subject_syntax_types_not_supported", "error_description": "{0}"}}"#)]
    SubjectSyntaxTypesNotSupported(String),
}

/// The serialized shape of a [`SiopError`].
#[derive(Deserialize, Serialize)]
struct OidError {
    error: String,
    error_description: String,
}

impl Serialize for SiopError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::Error as SerdeError;
        let Ok(error) = serde_json::from_str::<OidError>(&self.to_string()) else {
            return Err(SerdeError::custom("issue serializing SiopError"));
        };
        error.serialize(serializer)
    }
}

impl SiopError {
    /// This error as a JSON value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.to_string()).unwrap_or_default()
    }

    /// This error as a `application/x-www-form-urlencoded` query string.
    #[must_use]
    pub fn to_querystring(&self) -> String {
        urlencode::to_string(&self).unwrap_or_default()
    }
}
