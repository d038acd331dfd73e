//! A library for issuing, holding, presenting and verifying W3C Verifiable
//! Credentials, bound together with compact JWS, revoked via a bitstring
//! status list, and exchanged through a SIOPv2 / OpenID for Verifiable
//! Presentations authentication response.
//!
//! # Layout
//!
//! * [`crypto`] — the `Signer`/`VerifierCrypto`/`KeyResolver` contracts this
//!   crate signs and verifies against, plus a reference Ed25519
//!   implementation.
//! * [`jws`] — the compact JWS codec every signed artifact in this crate is
//!   enveloped in.
//! * [`vc`] / [`vp`] — the W3C Verifiable Credential / Presentation data
//!   model.
//! * [`status`] — the bitstring revocation list an issuer publishes and a
//!   holder/verifier consults.
//! * [`validator`] — verifies VC-JWS/VP-JWS against cryptographic, temporal
//!   and revocation predicates.
//! * [`store`] — the issuer's and holder's in-memory credential records.
//! * [`agent`] — the three roles (`IssuerAgent`, `HolderAgent`,
//!   `VerifierAgent`) built on the above.
//! * [`oidc_siop`] — the SIOPv2/OID4VP authentication-response envelope
//!   wrapping a Verifiable Presentation.
//! * [`registry`] — the write-once-at-init registry of extension credential
//!   subject type names.

pub mod agent;
pub mod core;
pub mod crypto;
pub mod jws;
pub mod oidc_siop;
pub mod registry;
pub mod status;
pub mod store;
pub mod validator;
pub mod vc;
pub mod vp;

pub mod test_support;

/// Re-export of the two structural helpers ([`Kind`], [`OneMany`]) used
/// throughout the data model.
pub use crate::core::{Kind, OneMany};
