//! Error taxonomy and classification for the verification service.
//!
//! Transport and HTTP outcomes are classified exactly once, at the client
//! boundary, into the closed [`VerifyKitError`] taxonomy. Structured backend
//! error codes embedded in a JSON body take precedence over raw status-code
//! buckets.

use thiserror::Error;

/// Errors surfaced by `VerifyKit`.
///
/// Variants carry owned data only, so the whole taxonomy is `Clone` and can
/// be embedded in broadcast session states.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyKitError {
    /// The device reports no internet connection, or the connection was
    /// refused before reaching the service.
    #[error("no internet connection")]
    NoConnectivity,

    /// The request timed out at the transport layer.
    #[error("connection timed out: {detail}")]
    Timeout {
        /// Transport-level failure description.
        detail: String,
    },

    /// The service host could not be resolved.
    #[error("could not resolve host: {detail}")]
    UnknownHost {
        /// Transport-level failure description.
        detail: String,
    },

    /// The service answered with a 5xx status.
    #[error("service unavailable (status {status})")]
    ServiceUnavailable {
        /// HTTP status code.
        status: u16,
        /// Raw response body, for diagnostics.
        body: String,
    },

    /// The service rejected the request with a 400 or 404.
    #[error("invalid server response (status {status})")]
    BadResponse {
        /// HTTP status code.
        status: u16,
        /// Raw response body, for diagnostics.
        body: String,
    },

    /// The service answered with any other non-2xx status.
    #[error("unexpected server response (status {status})")]
    UnexpectedResponse {
        /// HTTP status code.
        status: u16,
        /// Raw response body, for diagnostics.
        body: String,
    },

    /// The supplied document is not acceptable for the requested operation.
    #[error("invalid document: {reason}")]
    InvalidDocument {
        /// Why the document was rejected.
        reason: String,
    },

    /// The SDK was constructed with unusable configuration.
    #[error("sdk not initialized: {reason}")]
    NotInitialized {
        /// Why the configuration was rejected.
        reason: String,
    },

    /// The server reported too many validation attempts for a challenge.
    /// Always terminal, regardless of the local attempt counter.
    #[error("too many attempts")]
    TooManyAttempts,

    /// A standalone validation session was requested without a stored
    /// device association.
    #[error("device is not associated")]
    DeviceNotAssociated,

    /// The server refused to associate this user.
    #[error("user cannot be associated")]
    UserCannotBeAssociated,

    /// The host reported that camera permission was denied during capture.
    #[error("camera permission denied")]
    CameraPermissionDenied,

    /// The user abandoned the capture flow.
    #[error("cancelled by user")]
    UserCancelled,

    /// The server issued a challenge with a type tag this SDK does not know.
    #[error("unknown challenge type: {tag}")]
    UnknownChallengeType {
        /// The unrecognized type tag, verbatim.
        tag: String,
    },

    /// Three consecutive validations of the same challenge failed.
    #[error("challenge validation attempts exhausted")]
    ChallengeValidationExhausted,

    /// Anything that does not fit the taxonomy above.
    #[error("unknown error: {detail}")]
    Unknown {
        /// Failure description.
        detail: String,
    },
}

impl VerifyKitError {
    /// Whether this error means the service could not be reached at all, as
    /// opposed to the service having produced an answer.
    ///
    /// Reachability failures terminate a session instead of consuming a
    /// validation attempt.
    #[must_use]
    pub const fn is_reachability(&self) -> bool {
        matches!(
            self,
            Self::NoConnectivity | Self::Timeout { .. } | Self::UnknownHost { .. }
        )
    }
}

/// Structured error body the backend attaches to rejected requests.
#[derive(Debug, serde::Deserialize)]
struct BackendErrorBody {
    code: Option<String>,
}

/// Extracts the structured backend error code from a response body, if any.
#[must_use]
pub(crate) fn backend_error_code(body: &str) -> Option<String> {
    serde_json::from_str::<BackendErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.code)
}

/// Backend code for a wrong PIN. A normal negative result, never an error.
pub(crate) const CODE_INVALID_PIN: &str = "invalid-pin";
/// Backend code terminating a session regardless of the local counter.
pub(crate) const CODE_TOO_MANY_ATTEMPTS: &str = "too-many-attempts";
/// Backend code refusing association for this user.
pub(crate) const CODE_CANNOT_ASSOCIATE: &str = "cannot-associate";

/// Classifies a non-2xx response into the taxonomy.
///
/// Recognized structured backend codes win over the status-code buckets.
pub(crate) fn classify_response(status: u16, body: &str) -> VerifyKitError {
    match backend_error_code(body).as_deref() {
        Some(CODE_TOO_MANY_ATTEMPTS) => return VerifyKitError::TooManyAttempts,
        Some(CODE_CANNOT_ASSOCIATE) => return VerifyKitError::UserCannotBeAssociated,
        _ => {}
    }

    match status {
        500..=599 => VerifyKitError::ServiceUnavailable {
            status,
            body: body.to_string(),
        },
        400 | 404 => VerifyKitError::BadResponse {
            status,
            body: body.to_string(),
        },
        _ => VerifyKitError::UnexpectedResponse {
            status,
            body: body.to_string(),
        },
    }
}

/// Classifies a transport-layer failure into the taxonomy.
pub(crate) fn classify_transport(error: &reqwest::Error) -> VerifyKitError {
    if error.is_timeout() {
        return VerifyKitError::Timeout {
            detail: error.to_string(),
        };
    }
    // reqwest reports dns failures as connect errors; the source chain is the
    // only place the distinction survives.
    if source_chain_mentions_dns(error) {
        return VerifyKitError::UnknownHost {
            detail: error.to_string(),
        };
    }
    if error.is_connect() {
        return VerifyKitError::NoConnectivity;
    }
    VerifyKitError::Unknown {
        detail: error.to_string(),
    }
}

fn source_chain_mentions_dns(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = error.source();
    while let Some(cause) = source {
        if cause.to_string().contains("dns error") {
            return true;
        }
        source = cause.source();
    }
    false
}
