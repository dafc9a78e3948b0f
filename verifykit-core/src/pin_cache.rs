//! Biometric PIN cache policy.
//!
//! Decides whether a previously cached PIN may be offered through biometric
//! unlock, and whether the server's record of a PIN change invalidates the
//! cache. Persistence is explicit: the guard writes a new cached PIN or a
//! usage timestamp only when told to, never as a side effect of a check.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use secrecy::SecretString;

use crate::error::VerifyKitError;
use crate::storage::{BiometricCapability, PinStore};

/// Gatekeeper for the biometric PIN cache.
#[derive(Clone)]
pub struct PinCacheGuard {
    pins: Arc<dyn PinStore>,
    biometrics: Arc<dyn BiometricCapability>,
}

impl PinCacheGuard {
    /// Creates a guard over the host's PIN store and biometric probe.
    #[must_use]
    pub fn new(pins: Arc<dyn PinStore>, biometrics: Arc<dyn BiometricCapability>) -> Self {
        Self { pins, biometrics }
    }

    /// Whether the UI may offer biometric unlock of the cached PIN.
    ///
    /// True only when biometric caching is enabled, this is not a
    /// new-PIN-creation flow, no validation error is currently being
    /// retried, and the device can perform strong biometric authentication.
    ///
    /// # Errors
    ///
    /// Propagates PIN store failures.
    pub async fn may_offer_biometric_unlock(
        &self,
        creating_new_pin: bool,
        retrying_after_error: bool,
    ) -> Result<bool, VerifyKitError> {
        if creating_new_pin || retrying_after_error {
            return Ok(false);
        }
        if !self.biometrics.strong_biometrics_available() {
            return Ok(false);
        }
        Ok(self.pins.biometric_enabled().await?)
    }

    /// Reads the cached PIN for biometric-assisted entry.
    ///
    /// Returns `None` unless biometric caching is enabled; the encrypted PIN
    /// is never read with biometrics disabled.
    ///
    /// # Errors
    ///
    /// Propagates PIN store failures.
    pub async fn cached_pin(&self) -> Result<Option<SecretString>, VerifyKitError> {
        if !self.pins.biometric_enabled().await? {
            return Ok(None);
        }
        Ok(self.pins.cached_pin().await?)
    }

    /// Whether the server reports a PIN change more recent than the last
    /// confirmed biometric use, meaning the cached PIN must not be trusted
    /// and manual entry is forced once.
    ///
    /// True iff both instants are present and the server one is strictly
    /// after the local one. Absence of either yields false — no signal to
    /// distrust the cache.
    ///
    /// # Errors
    ///
    /// Propagates PIN store failures.
    pub async fn pin_recently_changed(
        &self,
        server_pin_last_changed: Option<DateTime<Utc>>,
    ) -> Result<bool, VerifyKitError> {
        let local_last_usage = self.pins.last_biometric_usage().await?;
        Ok(Self::compare(server_pin_last_changed, local_last_usage))
    }

    /// The comparison behind [`Self::pin_recently_changed`].
    #[must_use]
    pub fn compare(
        server_pin_last_changed: Option<DateTime<Utc>>,
        local_last_usage: Option<DateTime<Utc>>,
    ) -> bool {
        match (server_pin_last_changed, local_last_usage) {
            (Some(server), Some(local)) => server > local,
            _ => false,
        }
    }

    /// Persists the PIN and enables biometric caching. Only ever called on
    /// explicit user opt-in after a successful manual validation.
    ///
    /// # Errors
    ///
    /// Propagates PIN store failures.
    pub async fn persist_cached_pin(&self, pin: &SecretString) -> Result<(), VerifyKitError> {
        self.pins.save_pin(pin, true).await?;
        Ok(())
    }

    /// Stamps the last successful biometric-assisted use with the current
    /// instant.
    ///
    /// # Errors
    ///
    /// Propagates PIN store failures.
    pub async fn record_biometric_usage(&self) -> Result<(), VerifyKitError> {
        self.pins.set_last_biometric_usage(Utc::now()).await?;
        Ok(())
    }

    /// Clears the cache: deletes the PIN and disables biometric unlock.
    /// Run whenever the device association is removed.
    ///
    /// # Errors
    ///
    /// Propagates PIN store failures.
    pub async fn clear(&self) -> Result<(), VerifyKitError> {
        self.pins.clear().await?;
        Ok(())
    }
}
