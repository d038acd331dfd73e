//! Reference Ed25519 `Signer`/`VerifierCrypto` pair used by this crate's own
//! test suite and doc examples. Not the only implementation of either trait —
//! any keystore-backed type works equally well against the rest of the
//! crate.

use anyhow::{Result, anyhow, bail};
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};

use crate::crypto::{Algorithm, PublicKeyJwk, Signer, VerifierCrypto};

/// An in-memory Ed25519 key pair, identified by its `did:key` value.
pub struct Ed25519Signer {
    signing_key: SigningKey,
}

impl Ed25519Signer {
    /// Generate a fresh random key pair.
    #[must_use]
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand_core::OsRng);
        Self { signing_key }
    }

    /// Build from raw 32-byte seed bytes (useful for deterministic tests).
    #[must_use]
    pub fn from_bytes(seed: &[u8; 32]) -> Self {
        Self { signing_key: SigningKey::from_bytes(seed) }
    }
}

impl Signer for Ed25519Signer {
    async fn try_sign(&self, msg: &[u8]) -> Result<Vec<u8>> {
        Ok(self.signing_key.sign(msg).to_bytes().to_vec())
    }

    async fn verifying_key(&self) -> Result<PublicKeyJwk> {
        Ok(PublicKeyJwk::ed25519(self.signing_key.verifying_key().as_bytes()))
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::EdDsa
    }

    async fn identifier(&self) -> Result<String> {
        self.verifying_key().await?.to_did_key()
    }
}

impl VerifierCrypto for Ed25519Signer {
    async fn verify(&self, msg: &[u8], sig: &[u8], alg: Algorithm, key: &PublicKeyJwk) -> Result<bool> {
        verify_ed25519(msg, sig, alg, key)
    }
}

/// A stateless verifier usable by any party, not only the signer itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519Verifier;

impl VerifierCrypto for Ed25519Verifier {
    async fn verify(&self, msg: &[u8], sig: &[u8], alg: Algorithm, key: &PublicKeyJwk) -> Result<bool> {
        verify_ed25519(msg, sig, alg, key)
    }
}

fn verify_ed25519(msg: &[u8], sig: &[u8], alg: Algorithm, key: &PublicKeyJwk) -> Result<bool> {
    if alg != Algorithm::EdDsa {
        bail!("unsupported algorithm for reference verifier: {alg:?}");
    }
    if key.kty != "OKP" || key.crv != "Ed25519" {
        bail!("not an Ed25519 key");
    }
    use base64ct::{Base64UrlUnpadded, Encoding};
    let raw = Base64UrlUnpadded::decode_vec(&key.x).map_err(|e| anyhow!("bad key encoding: {e}"))?;
    let bytes: [u8; 32] = raw.try_into().map_err(|_| anyhow!("key is not 32 bytes"))?;
    let verifying_key = VerifyingKey::from_bytes(&bytes).map_err(|e| anyhow!("bad key: {e}"))?;
    let sig_bytes: [u8; 64] = sig.try_into().map_err(|_| anyhow!("signature is not 64 bytes"))?;
    Ok(verifying_key.verify(msg, &Signature::from_bytes(&sig_bytes)).is_ok())
}
