//! # Credential Subject Type Registry
//!
//! [`CredentialSubject::Extension`](crate::vc::CredentialSubject::Extension)
//! accepts any JSON object shape, but only for type names an application has
//! registered up front via [`LibraryInitializer`]. Registration happens once,
//! before any credential of that type is built or parsed; the registry is
//! read-only for the remainder of the process.

use std::collections::HashSet;
use std::sync::OnceLock;

static SUBJECT_TYPES: OnceLock<HashSet<String>> = OnceLock::new();

/// One-time, process-wide setup for the subject type registry.
///
/// Call [`LibraryInitializer::register_subject_types`] exactly once, before
/// issuing or parsing any extension-subject credential; subsequent calls, or
/// any use of the registry before it is called, fall back to an empty
/// registry (only [`crate::vc::AtomicAttribute`] subjects are then
/// accepted).
pub struct LibraryInitializer;

impl LibraryInitializer {
    /// Register the set of extension subject type names this process will
    /// accept. Has no effect if called more than once.
    pub fn register_subject_types(types: impl IntoIterator<Item = impl Into<String>>) {
        let set: HashSet<String> = types.into_iter().map(Into::into).collect();
        let _ = SUBJECT_TYPES.set(set);
    }
}

/// The current subject type registry, empty if
/// [`LibraryInitializer::register_subject_types`] has not yet run.
pub(crate) fn subject_registry() -> &'static HashSet<String> {
    SUBJECT_TYPES.get_or_init(HashSet::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_type_is_absent() {
        assert!(!subject_registry().contains("NeverRegistered"));
    }
}
