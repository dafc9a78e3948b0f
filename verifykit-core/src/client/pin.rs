//! PIN challenge client.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
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
struct ExecutedPin {
    /// Instant of the last server-side PIN change. Absent when the server
    /// has no record of one.
    #[serde(default)]
    pin_last_updated: Option<DateTime<Utc>>,
}

/// Client for the PIN challenge endpoints.
pub struct PinClient {
    base_url: String,
    request: Arc<Request>,
    connectivity: Arc<dyn Connectivity>,
}

impl PinClient {
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

    /// Creates a PIN challenge for the document.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyKitError::NoConnectivity`] offline,
    /// [`VerifyKitError::UserCannotBeAssociated`] on the structured backend
    /// refusal, or a classified server error.
    pub async fn create_challenge(&self, document: &Document) -> Result<String, VerifyKitError> {
        ensure_online(self.connectivity.as_ref(), "create_challenge")?;

        let url = self.url("challenges/pin/");
        let builder = self
            .request
            .post(&url)
            .await?
            .json(&ChallengeDocumentBody::from_document(document));
        let response = self.request.handle(builder).await?;

        let created: CreatedChallenge = response::parse_data(response).await?;
        Ok(created.challenge_id)
    }

    /// Executes the challenge, returning the server-reported instant of the
    /// last PIN change, if the server has one.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyKitError::NoConnectivity`] offline, or a classified
    /// server error.
    pub async fn execute_challenge(
        &self,
        challenge_id: &str,
    ) -> Result<Option<DateTime<Utc>>, VerifyKitError> {
        ensure_online(self.connectivity.as_ref(), "execute_challenge")?;

        let url = self.url(&format!("challenges/{challenge_id}/execute/"));
        let builder = self.request.post(&url).await?.json(&serde_json::json!({}));
        let response = self.request.handle(builder).await?;

        let executed: ExecutedPin = response::parse_data(response).await?;
        Ok(executed.pin_last_updated)
    }

    /// Validates the entered PIN digits.
    ///
    /// A wrong PIN is the normal negative result, `Ok(false)`, never an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyKitError::NoConnectivity`] offline,
    /// [`VerifyKitError::TooManyAttempts`] on the structured backend signal,
    /// or a classified server error.
    pub async fn validate_challenge(
        &self,
        challenge_id: &str,
        pin: &SecretString,
    ) -> Result<bool, VerifyKitError> {
        ensure_online(self.connectivity.as_ref(), "validate_challenge")?;

        let url = self.url(&format!("challenges/{challenge_id}/validate/"));
        let builder = self
            .request
            .post(&url)
            .await?
            .json(&serde_json::json!({ "pin": pin.expose_secret() }));
        let response = self.request.handle(builder).await?;

        response::interpret_validation(response).await
    }
}
