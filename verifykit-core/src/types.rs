//! Domain models shared across the SDK.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::VerifyKitError;

/// Document type assumed when the host does not supply one.
pub const DEFAULT_DOCUMENT_TYPE: &str = "ci";
/// Document country assumed when the host does not supply one.
pub const DEFAULT_DOCUMENT_COUNTRY: &str = "UY";

/// Identity document reference supplied by the host app at session start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Document number. Required.
    pub number: String,
    /// Document type code. Defaults to [`DEFAULT_DOCUMENT_TYPE`] on the wire.
    #[serde(rename = "type")]
    pub doc_type: Option<String>,
    /// ISO country code. Defaults to [`DEFAULT_DOCUMENT_COUNTRY`] on the wire.
    pub country: Option<String>,
}

impl Document {
    /// Creates a document reference with default type and country.
    #[must_use]
    pub fn new(number: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            doc_type: None,
            country: None,
        }
    }

    /// Document type to put on the wire.
    #[must_use]
    pub fn doc_type_or_default(&self) -> &str {
        self.doc_type.as_deref().unwrap_or(DEFAULT_DOCUMENT_TYPE)
    }

    /// Country code to put on the wire.
    #[must_use]
    pub fn country_or_default(&self) -> &str {
        self.country.as_deref().unwrap_or(DEFAULT_DOCUMENT_COUNTRY)
    }

    /// Rejects documents that cannot be sent to the service.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyKitError::InvalidDocument`] when the number is empty.
    pub fn validate(&self) -> Result<(), VerifyKitError> {
        if self.number.trim().is_empty() {
            return Err(VerifyKitError::InvalidDocument {
                reason: "document number is empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Kind of verification challenge the service can issue.
///
/// Parsed from the lowercase string tag the server returns. Unrecognized tags
/// are a hard error at the orchestrator boundary, never silently defaulted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChallengeType {
    /// Camera-based face liveness detection, captured by an external
    /// detector component against a server-issued session.
    Liveness,
    /// Numeric PIN entry, optionally unlocked through platform biometrics.
    Pin,
}

impl ChallengeType {
    /// Parses a server-issued type tag, case-insensitively.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::from_str(&tag.to_lowercase()).ok()
    }
}

/// One verification step issued by the server.
///
/// Immutable once received; referenced by `id` in execute/validate calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    /// Opaque server-issued challenge id.
    pub id: String,
    /// Raw challenge type tag, resolved via [`ChallengeType::from_tag`].
    #[serde(rename = "type")]
    pub challenge_type: String,
    /// Server-reported challenge status.
    pub status: String,
    /// Server-reported expiration instant, opaque to the SDK.
    pub expiration_date: String,
}

/// An ordered list of challenges a device must complete, either as part of
/// association or as standalone re-verification.
///
/// Challenges are processed strictly in list order; the session completes
/// only when every challenge validated successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSession {
    /// Opaque server-issued session id.
    pub id: String,
    /// Session type tag.
    #[serde(rename = "type")]
    pub session_type: String,
    /// Server-reported session status.
    pub status: String,
    /// Creation instant, opaque to the SDK.
    pub created_at: String,
    /// Expiration instant, opaque to the SDK.
    pub expiration_date: String,
    /// Challenges to satisfy, in order.
    pub challenges: Vec<Challenge>,
    /// Opaque session payload forwarded to the host.
    #[serde(default)]
    pub payload: HashMap<String, serde_json::Value>,
}

/// Persisted result of a successful device association.
///
/// Read on every subsequent authenticated request and attached upstream as a
/// bearer credential. Removal always clears the cached PIN state with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAssociation {
    /// Bearer credential for subsequent authenticated calls.
    pub token: String,
    /// The document this device was associated with.
    pub document: Document,
    /// Creation instant, opaque to the SDK.
    pub created_at: String,
    /// Optional OpenID token returned on completion.
    #[serde(default)]
    pub id_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_type_roundtrip() {
        for variant in [ChallengeType::Liveness, ChallengeType::Pin] {
            let tag = variant.to_string();
            assert_eq!(ChallengeType::from_tag(&tag), Some(variant));
        }
    }

    #[test]
    fn test_challenge_type_tags_are_lowercase() {
        assert_eq!(ChallengeType::Liveness.to_string(), "liveness");
        assert_eq!(ChallengeType::Pin.to_string(), "pin");
    }

    #[test]
    fn test_challenge_type_unknown_tag_is_none() {
        assert_eq!(ChallengeType::from_tag("fingerprint"), None);
        assert_eq!(ChallengeType::from_tag(""), None);
    }

    #[test]
    fn test_challenge_type_parse_is_case_insensitive() {
        assert_eq!(ChallengeType::from_tag("Liveness"), Some(ChallengeType::Liveness));
        assert_eq!(ChallengeType::from_tag("PIN"), Some(ChallengeType::Pin));
    }

    #[test]
    fn test_document_defaults() {
        let document = Document::new("12345678");
        assert_eq!(document.doc_type_or_default(), "ci");
        assert_eq!(document.country_or_default(), "UY");

        let document = Document {
            number: "12345678".to_string(),
            doc_type: Some("passport".to_string()),
            country: Some("AR".to_string()),
        };
        assert_eq!(document.doc_type_or_default(), "passport");
        assert_eq!(document.country_or_default(), "AR");
    }

    #[test]
    fn test_document_validation() {
        assert!(Document::new("12345678").validate().is_ok());
        assert!(matches!(
            Document::new("  ").validate(),
            Err(VerifyKitError::InvalidDocument { .. })
        ));
    }

    #[test]
    fn test_validation_session_deserializes_wire_shape() {
        let body = r#"{
            "id": "vs-1",
            "type": "association",
            "status": "pending",
            "createdAt": "2024-05-01T12:00:00Z",
            "expirationDate": "2024-05-01T12:10:00Z",
            "challenges": [
                {
                    "id": "c1",
                    "type": "liveness",
                    "status": "pending",
                    "expirationDate": "2024-05-01T12:10:00Z"
                }
            ],
            "payload": {"flow": "onboarding"}
        }"#;

        let session: ValidationSession = serde_json::from_str(body).unwrap();
        assert_eq!(session.id, "vs-1");
        assert_eq!(session.challenges.len(), 1);
        assert_eq!(session.challenges[0].challenge_type, "liveness");
        assert_eq!(
            session.payload.get("flow").and_then(|value| value.as_str()),
            Some("onboarding")
        );
    }

    #[test]
    fn test_device_association_id_token_is_optional() {
        let body = r#"{
            "token": "bearer-token",
            "document": {"number": "123", "type": "ci", "country": "UY"},
            "createdAt": "2024-05-01T12:00:00Z"
        }"#;
        let association: DeviceAssociation = serde_json::from_str(body).unwrap();
        assert_eq!(association.token, "bearer-token");
        assert_eq!(association.id_token, None);
    }
}
