//! # Agents
//!
//! The three roles in a credential exchange, each owning its own store and
//! crypto service. Nothing here is shared state: an `IssuerAgent` and a
//! `HolderAgent` communicate only by passing VC-JWS/VP-JWS strings, never by
//! sharing a store or validator instance.

pub mod holder;
pub mod issuer;
pub mod verifier;

pub use holder::HolderAgent;
pub use issuer::IssuerAgent;
pub use verifier::VerifierAgent;
