//! # rs-identity-simple
//!
//! SHA-256 implementation of `IdentityHasher`.
//! Produces the per-target anonymous fingerprints used as vote and like keys.

use rs_core::models::TargetId;
use rs_core::traits::IdentityHasher;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

/// Separates the address from the target id inside the digest input, so
/// `("1.2.3.4", 42)` and `("1.2.3.44", 2)` hash differently.
const FIELD_SEPARATOR: u8 = 0x1f;

pub struct Sha256Fingerprinter {
    /// Server-side secret mixed into every digest. Must stay stable across
    /// restarts: fingerprints are persisted as uniqueness keys.
    pepper: SecretString,
}

impl Sha256Fingerprinter {
    /// Accepts a pepper (e.g., from `identity.fingerprint_pepper`).
    pub fn new(pepper: SecretString) -> Self {
        Self { pepper }
    }

    /// No pepper: the digest covers address and target only.
    pub fn unpeppered() -> Self {
        Self::new(SecretString::from(String::new()))
    }
}

impl Default for Sha256Fingerprinter {
    fn default() -> Self {
        Self::unpeppered()
    }
}

impl IdentityHasher for Sha256Fingerprinter {
    /// Full 64-char hex digest. Unlike a display tag, this is a uniqueness
    /// key, so it is never truncated.
    fn fingerprint(&self, client_address: &str, target_id: TargetId) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.pepper.expose_secret().as_bytes());
        hasher.update(client_address.as_bytes());
        hasher.update([FIELD_SEPARATOR]);
        hasher.update(target_id.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_deterministic() {
        let h = Sha256Fingerprinter::unpeppered();
        let a = h.fingerprint("1.2.3.4", 42);
        assert_eq!(a, h.fingerprint("1.2.3.4", 42));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_is_salted_per_target() {
        let h = Sha256Fingerprinter::unpeppered();
        assert_ne!(h.fingerprint("1.2.3.4", 42), h.fingerprint("1.2.3.4", 43));
        assert_ne!(h.fingerprint("1.2.3.4", 42), h.fingerprint("1.2.3.5", 42));
    }

    #[test]
    fn test_concatenation_is_unambiguous() {
        let h = Sha256Fingerprinter::unpeppered();
        assert_ne!(h.fingerprint("1.2.3.4", 42), h.fingerprint("1.2.3.44", 2));
    }

    #[test]
    fn test_pepper_changes_digest() {
        let plain = Sha256Fingerprinter::unpeppered();
        let peppered = Sha256Fingerprinter::new(SecretString::from("s3cret".to_string()));
        assert_ne!(plain.fingerprint("1.2.3.4", 42), peppered.fingerprint("1.2.3.4", 42));
    }
}
