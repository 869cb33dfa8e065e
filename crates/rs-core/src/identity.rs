//! # Identity Resolver
//!
//! Turns (optional authenticated user, raw client address, target) into the
//! canonical [`VoterIdentity`]. The raw address goes into the hasher and is
//! dropped; it is never stored or logged.

use std::sync::Arc;

use crate::models::{TargetId, VoterIdentity};
use crate::traits::IdentityHasher;

#[derive(Clone)]
pub struct IdentityResolver {
    hasher: Arc<dyn IdentityHasher>,
}

impl IdentityResolver {
    pub fn new(hasher: Arc<dyn IdentityHasher>) -> Self {
        Self { hasher }
    }

    /// A logged-in user keeps one identity across devices and targets.
    /// Anonymous visitors get a per-target fingerprint so they cannot be
    /// correlated across unrelated targets. A blank user id counts as absent.
    pub fn resolve(
        &self,
        auth_user_id: Option<&str>,
        client_address: &str,
        target_id: TargetId,
    ) -> VoterIdentity {
        match auth_user_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(user_id) => VoterIdentity::Authenticated { user_id: user_id.to_string() },
            None => VoterIdentity::Anonymous {
                fingerprint: self.hasher.fingerprint(client_address, target_id),
            },
        }
    }
}
