//! Host collaborator traits.
//!
//! The core treats every store as a set of atomic single-key operations and
//! never assumes read-modify-write atomicity across two different keys;
//! association removal plus PIN-cache clearing is best-effort, not
//! transactional. Hosts back these traits with their platform's secure
//! storage; [`memory`] ships reference implementations used by the test
//! suite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use thiserror::Error;

use crate::error::VerifyKitError;
use crate::types::DeviceAssociation;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Opaque failure raised by a host-provided store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("store error: {0}")]
pub struct StoreError(
    /// Host-side failure description.
    pub String,
);

impl From<StoreError> for VerifyKitError {
    fn from(error: StoreError) -> Self {
        Self::Unknown {
            detail: error.to_string(),
        }
    }
}

/// Persisted device-association record.
///
/// Single logical slot: at most one association exists per installation.
#[async_trait]
pub trait AssociationStore: Send + Sync {
    /// Persists the association, replacing any previous one.
    async fn save(&self, association: &DeviceAssociation) -> StoreResult<()>;

    /// Reads the current association, if any.
    async fn read(&self) -> StoreResult<Option<DeviceAssociation>>;

    /// Removes the association.
    async fn clear(&self) -> StoreResult<()>;
}

/// Biometric PIN cache.
///
/// The PIN handed to [`PinStore::save_pin`] must be encrypted at rest by a
/// platform secure-storage primitive; that primitive is the host's concern.
/// Implementations must couple the PIN and the biometric flag: a cached PIN
/// is only ever stored or returned while biometrics are enabled.
#[async_trait]
pub trait PinStore: Send + Sync {
    /// Stores the PIN and the biometric flag together. With
    /// `enable_biometric` false the cached PIN is removed instead.
    async fn save_pin(&self, pin: &SecretString, enable_biometric: bool) -> StoreResult<()>;

    /// Returns the cached PIN, or `None` when absent or biometrics are
    /// disabled.
    async fn cached_pin(&self) -> StoreResult<Option<SecretString>>;

    /// Whether biometric PIN unlock is enabled.
    async fn biometric_enabled(&self) -> StoreResult<bool>;

    /// Records the instant of the last successful biometric-assisted use.
    async fn set_last_biometric_usage(&self, at: DateTime<Utc>) -> StoreResult<()>;

    /// Instant of the last successful biometric-assisted use, if recorded.
    async fn last_biometric_usage(&self) -> StoreResult<Option<DateTime<Utc>>>;

    /// Deletes the cached PIN and disables biometric unlock.
    async fn clear(&self) -> StoreResult<()>;
}

/// Connectivity probe checked before every network call.
pub trait Connectivity: Send + Sync {
    /// Whether the device currently has a usable network path.
    fn is_online(&self) -> bool;
}

/// Capability probe for strong (class 3) biometric authentication.
pub trait BiometricCapability: Send + Sync {
    /// Whether the device can perform strong biometric authentication
    /// right now.
    fn strong_biometrics_available(&self) -> bool;
}

/// Source of the per-installation device fingerprint attached to every
/// request. See [`crate::fingerprint`] for the digest helper.
pub trait DeviceFingerprintProvider: Send + Sync {
    /// Stable fingerprint for this installation.
    fn fingerprint(&self) -> String;
}

pub mod memory {
    //! In-memory reference implementations.
    //!
    //! Used by the test suite; hosts can treat them as the contract template
    //! for their platform-backed stores. Nothing here encrypts anything.

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use secrecy::{ExposeSecret, SecretString};
    use tokio::sync::Mutex;
    use zeroize::Zeroize;

    use super::{
        AssociationStore, BiometricCapability, Connectivity, PinStore, StoreResult,
    };
    use crate::types::DeviceAssociation;

    /// [`AssociationStore`] holding the record in process memory.
    #[derive(Default)]
    pub struct MemoryAssociationStore {
        slot: Mutex<Option<DeviceAssociation>>,
    }

    impl MemoryAssociationStore {
        /// Creates an empty store.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl AssociationStore for MemoryAssociationStore {
        async fn save(&self, association: &DeviceAssociation) -> StoreResult<()> {
            *self.slot.lock().await = Some(association.clone());
            Ok(())
        }

        async fn read(&self) -> StoreResult<Option<DeviceAssociation>> {
            Ok(self.slot.lock().await.clone())
        }

        async fn clear(&self) -> StoreResult<()> {
            *self.slot.lock().await = None;
            Ok(())
        }
    }

    #[derive(Default)]
    struct PinRecord {
        pin: Option<String>,
        biometric_enabled: bool,
        last_biometric_usage: Option<DateTime<Utc>>,
    }

    /// [`PinStore`] holding the cache in process memory.
    #[derive(Default)]
    pub struct MemoryPinStore {
        record: Mutex<PinRecord>,
    }

    impl MemoryPinStore {
        /// Creates an empty store.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl PinStore for MemoryPinStore {
        async fn save_pin(&self, pin: &SecretString, enable_biometric: bool) -> StoreResult<()> {
            let mut record = self.record.lock().await;
            if enable_biometric {
                record.pin = Some(pin.expose_secret().to_string());
                record.biometric_enabled = true;
            } else {
                if let Some(mut previous) = record.pin.take() {
                    previous.zeroize();
                }
                record.biometric_enabled = false;
            }
            Ok(())
        }

        async fn cached_pin(&self) -> StoreResult<Option<SecretString>> {
            let record = self.record.lock().await;
            if !record.biometric_enabled {
                return Ok(None);
            }
            Ok(record.pin.clone().map(SecretString::from))
        }

        async fn biometric_enabled(&self) -> StoreResult<bool> {
            Ok(self.record.lock().await.biometric_enabled)
        }

        async fn set_last_biometric_usage(&self, at: DateTime<Utc>) -> StoreResult<()> {
            self.record.lock().await.last_biometric_usage = Some(at);
            Ok(())
        }

        async fn last_biometric_usage(&self) -> StoreResult<Option<DateTime<Utc>>> {
            Ok(self.record.lock().await.last_biometric_usage)
        }

        async fn clear(&self) -> StoreResult<()> {
            let mut record = self.record.lock().await;
            if let Some(mut previous) = record.pin.take() {
                previous.zeroize();
            }
            record.biometric_enabled = false;
            record.last_biometric_usage = None;
            Ok(())
        }
    }

    /// [`Connectivity`] that always reports online.
    pub struct AlwaysOnline;

    impl Connectivity for AlwaysOnline {
        fn is_online(&self) -> bool {
            true
        }
    }

    /// [`Connectivity`] that always reports offline.
    pub struct AlwaysOffline;

    impl Connectivity for AlwaysOffline {
        fn is_online(&self) -> bool {
            false
        }
    }

    /// [`BiometricCapability`] with a fixed answer.
    pub struct FixedBiometrics(
        /// The answer the probe always returns.
        pub bool,
    );

    impl BiometricCapability for FixedBiometrics {
        fn strong_biometrics_available(&self) -> bool {
            self.0
        }
    }
}
