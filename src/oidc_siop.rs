//! # SIOPv2 / OpenID4VP authentication
//!
//! A Verifiable Presentation exchanged as the `vp_token` of a Self-Issued
//! OpenID Provider v2 authorization response, alongside a self-issued
//! `id_token`. [`wallet::OidcSiopWallet`] answers an authorization request on
//! behalf of a [`crate::agent::HolderAgent`]; [`verifier::OidcSiopVerifier`]
//! issues the request and validates the response.

pub mod error;
pub mod types;
pub mod verifier;
pub mod wallet;

pub use error::SiopError;
pub use verifier::OidcSiopVerifier;
pub use wallet::OidcSiopWallet;
