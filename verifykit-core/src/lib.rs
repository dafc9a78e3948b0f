//! Core orchestration for the remote identity-verification service.
//!
//! The SDK drives device-association and standalone validation sessions
//! composed of liveness and PIN challenges. Each challenge follows the
//! create → execute → validate protocol against the service; the
//! [`session::SessionOrchestrator`] chains challenges strictly in order,
//! enforces the local attempt limit, and keeps the device-association
//! record and the biometric PIN cache consistent.
//!
//! Host-runtime concerns — UI, camera capture, secure storage, biometric
//! prompts, connectivity probing — sit behind the traits in [`storage`];
//! the host implements them once and hands them to [`sdk::VerifyKit`].
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

use strum::EnumString;

/// Deployment environment the SDK talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Environment {
    /// Staging deployment.
    Staging,
    /// Production deployment.
    Production,
}

impl Environment {
    /// Fixed service base URL for this environment.
    #[must_use]
    pub const fn base_url(&self) -> &'static str {
        match self {
            Self::Staging => "https://auth.identificaciondigital.com.uy/api/v2/sdk",
            Self::Production => "https://auth.identidaddigital.com.uy/api/v2/sdk",
        }
    }
}

pub mod attempts;
pub mod client;
pub mod error;
pub mod fingerprint;
pub mod logger;
pub mod pin_cache;
pub mod sdk;
pub mod session;
pub mod storage;
pub mod types;

// private modules
mod request;

pub use error::VerifyKitError;
pub use sdk::{Collaborators, Config, VerifyKit};
pub use session::{
    CaptureFailure, ChallengeEvidence, ChallengeExecution, SessionOrchestrator, SessionState,
    SessionTarget,
};
pub use types::{Challenge, ChallengeType, DeviceAssociation, Document, ValidationSession};
