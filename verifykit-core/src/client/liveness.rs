//! Liveness challenge client.

use std::sync::Arc;

use serde::Deserialize;

use super::response;
use super::{ensure_online, ChallengeDocumentBody};
use crate::error::VerifyKitError;
use crate::request::Request;
use crate::storage::Connectivity;
use crate::types::Document;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedChallenge {
    challenge_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecutedLiveness {
    session_id: String,
}

/// Client for the liveness challenge endpoints.
///
/// Validation is evidence-free: the external face detector writes its result
/// server-side against the session id returned by `execute_challenge`, and
/// `validate_challenge` only asks the server for the verdict.
pub struct LivenessClient {
    base_url: String,
    request: Arc<Request>,
    connectivity: Arc<dyn Connectivity>,
}

impl LivenessClient {
    pub(crate) fn new(
        base_url: String,
        request: Arc<Request>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            base_url,
            request,
            connectivity,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }

    /// Creates a liveness challenge for the document.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyKitError::NoConnectivity`] offline, or a classified
    /// server error.
    pub async fn create_challenge(&self, document: &Document) -> Result<String, VerifyKitError> {
        ensure_online(self.connectivity.as_ref(), "create_challenge")?;

        let url = self.url("challenges/liveness/");
        let builder = self
            .request
            .post(&url)
            .await?
            .json(&ChallengeDocumentBody::from_document(document));
        let response = self.request.handle(builder).await?;

        let created: CreatedChallenge = response::parse_data(response).await?;
        Ok(created.challenge_id)
    }

    /// Executes the challenge, returning the session id the external face
    /// detector consumes.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyKitError::NoConnectivity`] offline, or a classified
    /// server error.
    pub async fn execute_challenge(&self, challenge_id: &str) -> Result<String, VerifyKitError> {
        ensure_online(self.connectivity.as_ref(), "execute_challenge")?;

        let url = self.url(&format!("challenges/{challenge_id}/execute/"));
        let builder = self.request.post(&url).await?.json(&serde_json::json!({}));
        let response = self.request.handle(builder).await?;

        let executed: ExecutedLiveness = response::parse_data(response).await?;
        Ok(executed.session_id)
    }

    /// Asks the server for the liveness verdict.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyKitError::NoConnectivity`] offline,
    /// [`VerifyKitError::TooManyAttempts`] on the structured backend signal,
    /// or a classified server error.
    pub async fn validate_challenge(&self, challenge_id: &str) -> Result<bool, VerifyKitError> {
        ensure_online(self.connectivity.as_ref(), "validate_challenge")?;

        let url = self.url(&format!("challenges/{challenge_id}/validate/"));
        let builder = self.request.post(&url).await?.json(&serde_json::json!({}));
        let response = self.request.handle(builder).await?;

        response::interpret_validation(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::{AlwaysOffline, AlwaysOnline, MemoryAssociationStore};
    use std::time::Duration;

    fn client(base_url: &str) -> LivenessClient {
        let request = Arc::new(Request::new(
            "key".to_string(),
            "fp".to_string(),
            Arc::new(MemoryAssociationStore::new()),
            Duration::from_secs(5),
        ));
        LivenessClient::new(base_url.to_string(), request, Arc::new(AlwaysOnline))
    }

    #[tokio::test]
    async fn test_create_challenge_posts_document_and_returns_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/challenges/liveness/")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "documentNumber": "12345678",
                "documentType": "ci",
                "documentCountry": "UY"
            })))
            .with_status(200)
            .with_body(r#"{"data":{"challengeId":"ch-1"}}"#)
            .create_async()
            .await;

        let challenge_id = client(&server.url())
            .create_challenge(&Document::new("12345678"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(challenge_id, "ch-1");
    }

    #[tokio::test]
    async fn test_execute_challenge_returns_detector_session_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/challenges/ch-1/execute/")
            .with_status(200)
            .with_body(r#"{"data":{"sessionId":"detector-session"}}"#)
            .create_async()
            .await;

        let session_id = client(&server.url()).execute_challenge("ch-1").await.unwrap();

        mock.assert_async().await;
        assert_eq!(session_id, "detector-session");
    }

    #[tokio::test]
    async fn test_validate_challenge_true_on_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/challenges/ch-1/validate/")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let valid = client(&server.url()).validate_challenge("ch-1").await.unwrap();

        mock.assert_async().await;
        assert!(valid);
    }

    #[tokio::test]
    async fn test_create_challenge_classifies_server_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/challenges/liveness/")
            .with_status(503)
            .with_body("down")
            .create_async()
            .await;

        let error = client(&server.url())
            .create_challenge(&Document::new("12345678"))
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            VerifyKitError::ServiceUnavailable { status: 503, .. }
        ));
    }

    #[tokio::test]
    async fn test_offline_short_circuits_without_network() {
        let request = Arc::new(Request::new(
            "key".to_string(),
            "fp".to_string(),
            Arc::new(MemoryAssociationStore::new()),
            Duration::from_secs(5),
        ));
        let client = LivenessClient::new(
            "http://unreachable.invalid".to_string(),
            request,
            Arc::new(AlwaysOffline),
        );

        let error = client.execute_challenge("ch-1").await.unwrap_err();
        assert_eq!(error, VerifyKitError::NoConnectivity);
    }
}
