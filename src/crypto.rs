//! # Cryptographic Collaborators
//!
//! The credential and presentation pipelines do not perform elliptic-curve
//! math themselves: they depend on a [`Signer`] to produce signatures and a
//! [`VerifierCrypto`] to check them. Both traits are intentionally thin —
//! implementations may dispatch to a platform keystore, an HSM, or (as
//! provided here for tests and examples) a plain in-memory Ed25519 key pair.
//!
//! A signer's [`Signer::identifier`] doubles as the JWS `kid` and as the
//! agent's routing identifier: it is always derived from the public key,
//! never independently assigned.

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Signature algorithms named in the wire format. `Es256` is named for
/// interop but has no implementation in this crate; `EdDsa` is the algorithm
/// the reference [`Signer`] actually produces.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum Algorithm {
    /// ECDSA using P-256 and SHA-256, per RFC 7518. Named only: no signing
    /// or verification path in this crate implements the underlying curve
    /// arithmetic.
    #[serde(rename = "ES256")]
    Es256,

    /// EdDSA using Curve25519, per RFC 8037.
    #[default]
    #[serde(rename = "EdDSA")]
    EdDsa,
}

impl Algorithm {
    /// The JWS `alg` header value.
    #[must_use]
    pub const fn to_jws(self) -> &'static str {
        match self {
            Self::Es256 => "ES256",
            Self::EdDsa => "EdDSA",
        }
    }

    /// Parse a JWS `alg` header value.
    pub fn from_jws(s: &str) -> Result<Self> {
        match s {
            "ES256" => Ok(Self::Es256),
            "EdDSA" => Ok(Self::EdDsa),
            other => Err(anyhow!("unsupported alg: {other}")),
        }
    }
}

/// A public key in JWK form, restricted to the curves this crate
/// understands (`OKP`/`Ed25519` for the reference signer, `EC`/`P-256`
/// named for interop).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct PublicKeyJwk {
    /// Key type: `"OKP"` or `"EC"`.
    pub kty: String,

    /// Curve: `"Ed25519"` or `"P-256"`.
    pub crv: String,

    /// Base64url (unpadded) x-coordinate / public key bytes.
    pub x: String,

    /// Base64url (unpadded) y-coordinate. `EC` keys only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

impl PublicKeyJwk {
    /// Build an `OKP`/`Ed25519` JWK from raw public key bytes.
    #[must_use]
    pub fn ed25519(public_bytes: &[u8]) -> Self {
        use base64ct::{Base64UrlUnpadded, Encoding};
        Self {
            kty: "OKP".to_string(),
            crv: "Ed25519".to_string(),
            x: Base64UrlUnpadded::encode_string(public_bytes),
            y: None,
        }
    }

    /// RFC 7638 JWK thumbprint: SHA-256 over the canonical JSON member
    /// ordering required by the RFC (`crv`, `kty`, `x` [, `y`]).
    #[must_use]
    pub fn thumbprint(&self) -> String {
        use base64ct::{Base64UrlUnpadded, Encoding};

        let canonical = if let Some(y) = &self.y {
            format!(
                r#"{{"crv":"{}","kty":"{}","x":"{}","y":"{y}"}}"#,
                self.crv, self.kty, self.x
            )
        } else {
            format!(r#"{{"crv":"{}","kty":"{}","x":"{}"}}"#, self.crv, self.kty, self.x)
        };
        let digest = Sha256::digest(canonical.as_bytes());
        Base64UrlUnpadded::encode_string(&digest)
    }

    /// Encode this key as a `did:key` identifier (Ed25519 only).
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not an Ed25519 `OKP` key, or if `x` is
    /// not valid base64url.
    pub fn to_did_key(&self) -> Result<String> {
        if self.kty != "OKP" || self.crv != "Ed25519" {
            bail!("did:key encoding only supports Ed25519 keys");
        }
        use base64ct::{Base64UrlUnpadded, Encoding};
        let raw = Base64UrlUnpadded::decode_vec(&self.x).map_err(|e| anyhow!("bad x: {e}"))?;

        // multicodec prefix for ed25519-pub (0xed, 0x01) followed by the
        // 32-byte public key, multibase-encoded with the `z` (base58btc) base.
        let mut prefixed = vec![0xed_u8, 0x01];
        prefixed.extend_from_slice(&raw);
        let encoded = multibase::encode(multibase::Base::Base58Btc, prefixed);
        Ok(format!("did:key:{encoded}"))
    }

    /// Decode a `did:key` identifier back into its public key.
    ///
    /// # Errors
    ///
    /// Returns an error if `did` is not a `did:key:z...` Ed25519 identifier.
    pub fn from_did_key(did: &str) -> Result<Self> {
        let multibase_value =
            did.strip_prefix("did:key:").ok_or_else(|| anyhow!("not a did:key identifier"))?;
        let (_base, bytes) =
            multibase::decode(multibase_value).map_err(|e| anyhow!("bad multibase: {e}"))?;
        let [0xed, 0x01, key @ ..] = bytes.as_slice() else {
            bail!("unsupported did:key multicodec");
        };
        Ok(Self::ed25519(key))
    }
}

/// Cryptographic signing collaborator. Implementations may be backed by a
/// software key, an HSM, or a remote signing service; the crate never
/// inspects private key material directly.
pub trait Signer: Send + Sync {
    /// Sign `msg`, returning the raw signature bytes (not base64-encoded).
    fn try_sign(&self, msg: &[u8]) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// This signer's public key.
    fn verifying_key(&self) -> impl Future<Output = Result<PublicKeyJwk>> + Send;

    /// The algorithm this signer produces signatures for.
    fn algorithm(&self) -> Algorithm;

    /// This signer's stable identifier: a JWK thumbprint or `did:key` value,
    /// used both as JWS `kid` and as the agent's routing identifier.
    fn identifier(&self) -> impl Future<Output = Result<String>> + Send;
}

/// Cryptographic verification collaborator.
pub trait VerifierCrypto: Send + Sync {
    /// Verify `sig` over `msg` under `key`, using `alg`.
    fn verify(
        &self, msg: &[u8], sig: &[u8], alg: Algorithm, key: &PublicKeyJwk,
    ) -> impl Future<Output = Result<bool>> + Send;
}

/// Resolves a JWS `kid` to the public key it names. For `did:key` and JWK
/// thumbprint identifiers the key material is present in the identifier
/// itself, so most implementations need no network access.
pub trait KeyResolver: Send + Sync {
    /// Resolve `kid` to a public key.
    fn resolve(&self, kid: &str) -> impl Future<Output = Result<PublicKeyJwk>> + Send;
}

/// Resolves `did:key:...` identifiers locally, without any external lookup.
#[derive(Clone, Copy, Debug, Default)]
pub struct DidKeyResolver;

impl KeyResolver for DidKeyResolver {
    async fn resolve(&self, kid: &str) -> Result<PublicKeyJwk> {
        let did = kid.split('#').next().unwrap_or(kid);
        PublicKeyJwk::from_did_key(did)
    }
}
