//! # Compact JWS codec
//!
//! Parses, signs and verifies the three-part compact JWS serialization
//! (`base64url(header).base64url(payload).base64url(signature)`) used for
//! every signed artifact in this crate: VC-JWS, VP-JWS, the SIOP `id_token`,
//! and the optional signed SIOP request object.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::crypto::{Algorithm, KeyResolver, PublicKeyJwk, Signer, VerifierCrypto};

/// The JWS `typ` header parameter.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum Type {
    /// General purpose JWT.
    #[default]
    #[serde(rename = "JWT")]
    Jwt,

    /// SIOPv2 authorization request object.
    #[serde(rename = "oauth-authz-req+jwt")]
    OauthAuthzReqJwt,
}

/// Decoded and verified JWS, carrying the typed payload `T`.
#[derive(Clone, Debug)]
pub struct Jwt<T> {
    /// The protected header.
    pub header: Header,

    /// The deserialized payload.
    pub claims: T,
}

/// The JWS protected header.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Header {
    /// Signature algorithm.
    pub alg: Algorithm,

    /// Payload media type.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub typ: Option<Type>,

    /// Key identifier: a JWK thumbprint or `did:key` value (plus optional
    /// `#fragment`), resolvable without the embedded `jwk` below.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub kid: Option<String>,

    /// The signer's public key, embedded directly.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub jwk: Option<PublicKeyJwk>,
}

/// Failure modes for parsing and verifying a compact JWS.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum JwsError {
    /// The string is not a well-formed three-part compact JWS, or one of its
    /// segments does not decode to the expected shape.
    #[error("invalid JWS structure: {0}")]
    InvalidStructure(String),

    /// The structure was valid but the signature did not verify, or no
    /// verification key could be resolved.
    #[error("invalid JWS signature")]
    InvalidSignature,
}

/// Sign `payload` with `signer`, embedding `signer`'s identifier as `kid`.
///
/// # Errors
///
/// Returns an error if serialization or signing fails.
pub async fn encode<T: Serialize>(
    typ: Type, payload: &T, signer: &impl Signer,
) -> anyhow::Result<String> {
    tracing::debug!("jws::encode");
    let header = Header {
        alg: signer.algorithm(),
        typ: Some(typ),
        kid: Some(signer.identifier().await?),
        jwk: None,
    };
    let header_b64 = Base64UrlUnpadded::encode_string(&serde_json::to_vec(&header)?);
    let payload_b64 = Base64UrlUnpadded::encode_string(&serde_json::to_vec(payload)?);
    let signing_input = format!("{header_b64}.{payload_b64}");
    let signature = signer.try_sign(signing_input.as_bytes()).await?;
    let sig_b64 = Base64UrlUnpadded::encode_string(&signature);
    Ok(format!("{signing_input}.{sig_b64}"))
}

/// Parse, resolve a verification key, and verify a compact JWS, returning
/// its typed claims.
///
/// Key resolution order: `header.jwk` (embedded key) then `header.kid`
/// (resolved via `resolver`).
pub async fn decode<T: DeserializeOwned>(
    compact: &str, crypto: &impl VerifierCrypto, resolver: &impl KeyResolver,
) -> Result<Jwt<T>, JwsError> {
    tracing::debug!("jws::decode");
    let parts: Vec<&str> = compact.split('.').collect();
    let [header_b64, payload_b64, sig_b64] = parts.as_slice() else {
        return Err(JwsError::InvalidStructure("expected 3 '.'-separated segments".to_string()));
    };

    let header_bytes = Base64UrlUnpadded::decode_vec(header_b64)
        .map_err(|e| JwsError::InvalidStructure(format!("bad header encoding: {e}")))?;
    let header: Header = serde_json::from_slice(&header_bytes)
        .map_err(|e| JwsError::InvalidStructure(format!("bad header json: {e}")))?;

    let payload_bytes = Base64UrlUnpadded::decode_vec(payload_b64)
        .map_err(|e| JwsError::InvalidStructure(format!("bad payload encoding: {e}")))?;
    let claims: T = serde_json::from_slice(&payload_bytes)
        .map_err(|e| JwsError::InvalidStructure(format!("bad payload json: {e}")))?;

    let signature = Base64UrlUnpadded::decode_vec(sig_b64)
        .map_err(|e| JwsError::InvalidStructure(format!("bad signature encoding: {e}")))?;

    let key = if let Some(jwk) = &header.jwk {
        jwk.clone()
    } else if let Some(kid) = &header.kid {
        resolver.resolve(kid).await.map_err(|_| JwsError::InvalidSignature)?
    } else {
        return Err(JwsError::InvalidStructure("no key material in header".to_string()));
    };

    let signing_input = format!("{header_b64}.{payload_b64}");
    let verified = crypto
        .verify(signing_input.as_bytes(), &signature, header.alg, &key)
        .await
        .map_err(|_| JwsError::InvalidSignature)?;
    if !verified {
        return Err(JwsError::InvalidSignature);
    }

    Ok(Jwt { header, claims })
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::test_support::Ed25519Signer;

    #[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
    struct Claims {
        sub: String,
    }

    #[tokio::test]
    async fn round_trips() {
        let signer = Ed25519Signer::generate();
        let jws = encode(Type::Jwt, &Claims { sub: "alice".into() }, &signer).await.unwrap();

        let jwt: Jwt<Claims> =
            decode(&jws, &signer, &crate::crypto::DidKeyResolver).await.unwrap();
        assert_eq!(jwt.claims, Claims { sub: "alice".into() });
    }

    #[tokio::test]
    async fn rejects_tampered_signature() {
        let signer = Ed25519Signer::generate();
        let jws = encode(Type::Jwt, &Claims { sub: "alice".into() }, &signer).await.unwrap();
        let mut tampered = jws.clone();
        tampered.push('a');

        let result: Result<Jwt<Claims>, JwsError> =
            decode(&tampered, &signer, &crate::crypto::DidKeyResolver).await;
        assert!(matches!(result, Err(JwsError::InvalidSignature)));
    }

    #[test]
    fn rejects_malformed_structure() {
        assert!(matches!(
            "not-a-jws".split('.').collect::<Vec<_>>().as_slice(),
            [_]
        ));
    }
}
