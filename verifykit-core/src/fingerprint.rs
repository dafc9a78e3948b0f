//! Device fingerprint derivation.
//!
//! Every request to the service carries a fingerprint header derived from a
//! per-installation UUID. The UUID itself is persisted by the host (it must
//! survive restarts); the digest applied to it lives here so every host
//! produces the same shape.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::storage::DeviceFingerprintProvider;

/// Lowercase hex SHA-256 digest of a persisted installation id.
#[must_use]
pub fn derive_fingerprint(installation_id: &str) -> String {
    hex::encode(Sha256::digest(installation_id.as_bytes()))
}

/// [`DeviceFingerprintProvider`] over a fresh random installation id.
///
/// Suitable for tests and for hosts that have not wired persistence yet; a
/// production host should persist the UUID and use [`derive_fingerprint`]
/// so the fingerprint is stable across launches.
pub struct RandomFingerprint {
    fingerprint: String,
}

impl RandomFingerprint {
    /// Generates a random installation id and derives its fingerprint.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fingerprint: derive_fingerprint(&Uuid::new_v4().to_string()),
        }
    }
}

impl Default for RandomFingerprint {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceFingerprintProvider for RandomFingerprint {
    fn fingerprint(&self) -> String {
        self.fingerprint.clone()
    }
}
