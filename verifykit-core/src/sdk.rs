//! SDK entry object.
//!
//! A [`VerifyKit`] instance is constructed explicitly by the host
//! application from a [`Config`] and its platform collaborators; there is no
//! process-wide singleton. Each verification flow is handed back as a
//! [`SessionOrchestrator`] the host drives and observes.

use std::sync::Arc;
use std::time::Duration;

use crate::client::{AssociationClient, LivenessClient, PinClient};
use crate::error::VerifyKitError;
use crate::pin_cache::PinCacheGuard;
use crate::request::Request;
use crate::session::{SessionOrchestrator, SessionTarget};
use crate::storage::{
    AssociationStore, BiometricCapability, Connectivity, DeviceFingerprintProvider, PinStore,
};
use crate::types::{ChallengeType, Document};
use crate::Environment;

/// SDK configuration, fixed per instance.
#[derive(Debug, Clone)]
pub struct Config {
    /// Deployment environment selecting the service base URL.
    pub environment: Environment,
    /// Api key issued to the host application.
    pub api_key: String,
    /// Base URL override for self-hosted deployments and tests.
    pub base_url: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Config {
    /// Creates a configuration with the default timeout.
    #[must_use]
    pub fn new(environment: Environment, api_key: impl Into<String>) -> Self {
        Self {
            environment,
            api_key: api_key.into(),
            base_url: None,
            timeout: Duration::from_secs(5),
        }
    }

    /// Overrides the service base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Overrides the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn resolved_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.environment.base_url().to_string())
    }
}

/// Platform collaborators the host must provide.
pub struct Collaborators {
    /// Device-association persistence.
    pub association_store: Arc<dyn AssociationStore>,
    /// Biometric PIN cache persistence (encrypting at rest).
    pub pin_store: Arc<dyn PinStore>,
    /// Connectivity probe.
    pub connectivity: Arc<dyn Connectivity>,
    /// Strong-biometrics capability probe.
    pub biometrics: Arc<dyn BiometricCapability>,
    /// Per-installation device fingerprint source.
    pub fingerprint: Arc<dyn DeviceFingerprintProvider>,
}

/// Entry point to the identity-verification SDK.
pub struct VerifyKit {
    liveness: Arc<LivenessClient>,
    pin: Arc<PinClient>,
    association: Arc<AssociationClient>,
    associations: Arc<dyn AssociationStore>,
    pin_cache: PinCacheGuard,
}

impl VerifyKit {
    /// Builds an SDK instance from configuration and host collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyKitError::NotInitialized`] when the api key is empty.
    pub fn new(config: &Config, collaborators: Collaborators) -> Result<Self, VerifyKitError> {
        if config.api_key.trim().is_empty() {
            return Err(VerifyKitError::NotInitialized {
                reason: "api key is empty".to_string(),
            });
        }

        let base_url = config.resolved_base_url();
        let request = Arc::new(Request::new(
            config.api_key.clone(),
            collaborators.fingerprint.fingerprint(),
            Arc::clone(&collaborators.association_store),
            config.timeout,
        ));

        let liveness = Arc::new(LivenessClient::new(
            base_url.clone(),
            Arc::clone(&request),
            Arc::clone(&collaborators.connectivity),
        ));
        let pin = Arc::new(PinClient::new(
            base_url.clone(),
            Arc::clone(&request),
            Arc::clone(&collaborators.connectivity),
        ));
        let association = Arc::new(AssociationClient::new(
            base_url,
            request,
            Arc::clone(&collaborators.connectivity),
        ));

        let pin_cache = PinCacheGuard::new(
            Arc::clone(&collaborators.pin_store),
            Arc::clone(&collaborators.biometrics),
        );

        Ok(Self {
            liveness,
            pin,
            association,
            associations: collaborators.association_store,
            pin_cache,
        })
    }

    /// Pre-flight association eligibility check. Mutates nothing.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyKitError::InvalidDocument`] for an unusable document,
    /// or a classified network error.
    pub async fn can_associate(&self, document: &Document) -> Result<bool, VerifyKitError> {
        document.validate()?;
        self.association.check_can_associate(document).await
    }

    /// Begins a device-association session for the document.
    ///
    /// The returned orchestrator has not contacted the server yet; drive it
    /// with [`SessionOrchestrator::start`].
    #[must_use]
    pub fn start_association(&self, document: Document) -> SessionOrchestrator {
        self.orchestrator(SessionTarget::Association { document })
    }

    /// Begins a standalone validation session for an associated device.
    #[must_use]
    pub fn start_session(&self, challenge_type: ChallengeType) -> SessionOrchestrator {
        self.orchestrator(SessionTarget::Standalone { challenge_type })
    }

    /// Whether a device association is currently stored.
    ///
    /// # Errors
    ///
    /// Propagates association store failures.
    pub async fn is_associated(&self) -> Result<bool, VerifyKitError> {
        Ok(self.associations.read().await?.is_some())
    }

    /// Removes the device association.
    ///
    /// Local state — the association record and the biometric PIN cache —
    /// is cleared even when the server-side removal fails; the two are never
    /// allowed to diverge. The server error, if any, is still reported.
    ///
    /// # Errors
    ///
    /// Returns the classified server error, or a store failure when local
    /// clearing failed.
    pub async fn remove_association(&self) -> Result<(), VerifyKitError> {
        let server_result = self.association.remove_association().await;
        if let Err(error) = &server_result {
            log::warn!("server-side association removal failed: {error}");
        }

        let mut store_failure = None;
        if let Err(error) = self.associations.clear().await {
            log::error!("failed to clear association store: {error}");
            store_failure = Some(error.into());
        }
        if let Err(error) = self.pin_cache.clear().await {
            log::error!("failed to clear pin cache: {error}");
            store_failure.get_or_insert(error);
        }

        server_result?;
        match store_failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// The biometric PIN cache policy, for the host's PIN entry UI.
    #[must_use]
    pub fn pin_cache(&self) -> &PinCacheGuard {
        &self.pin_cache
    }

    fn orchestrator(&self, target: SessionTarget) -> SessionOrchestrator {
        SessionOrchestrator::new(
            Arc::clone(&self.liveness),
            Arc::clone(&self.pin),
            Arc::clone(&self.association),
            Arc::clone(&self.associations),
            self.pin_cache.clone(),
            target,
        )
    }
}
