//! Device-association and validation-session client.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{ensure_online, response};
use crate::error::VerifyKitError;
use crate::request::Request;
use crate::storage::Connectivity;
use crate::types::{ChallengeType, DeviceAssociation, Document, ValidationSession};

/// Document payload for the association endpoints. Snake_case spelling; the
/// challenge-creation endpoints use the camelCase variant in `mod.rs`.
#[derive(Serialize)]
struct AssociationDocumentBody<'a> {
    document_number: &'a str,
    document_type: &'a str,
    document_country: &'a str,
}

impl<'a> AssociationDocumentBody<'a> {
    fn from_document(document: &'a Document) -> Self {
        Self {
            document_number: &document.number,
            document_type: document.doc_type_or_default(),
            document_country: document.country_or_default(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CanAssociate {
    can_associate: bool,
}

#[derive(Serialize)]
struct CreateValidationSessionBody {
    challenges_types: Vec<String>,
}

/// Client for the association and validation-session endpoints.
pub struct AssociationClient {
    base_url: String,
    request: Arc<Request>,
    connectivity: Arc<dyn Connectivity>,
}

impl AssociationClient {
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

    /// Pre-flight eligibility check. Does not mutate server state.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyKitError::NoConnectivity`] offline, or a classified
    /// server error.
    pub async fn check_can_associate(&self, document: &Document) -> Result<bool, VerifyKitError> {
        ensure_online(self.connectivity.as_ref(), "check_can_associate")?;

        let url = self.url("can-associate/");
        let builder = self
            .request
            .post(&url)
            .await?
            .json(&AssociationDocumentBody::from_document(document));
        let response = self.request.handle(builder).await?;

        let answer: CanAssociate = response::parse_data(response).await?;
        Ok(answer.can_associate)
    }

    /// Begins an association, returning the challenge list to satisfy.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyKitError::NoConnectivity`] offline, or a classified
    /// server error.
    pub async fn create_device_association(
        &self,
        document: &Document,
    ) -> Result<ValidationSession, VerifyKitError> {
        ensure_online(self.connectivity.as_ref(), "create_device_association")?;

        let url = self.url("associations/");
        let builder = self
            .request
            .post(&url)
            .await?
            .json(&AssociationDocumentBody::from_document(document));
        let response = self.request.handle(builder).await?;

        response::parse_data(response).await
    }

    /// Completes an association once every challenge validated.
    ///
    /// Persists nothing itself; the caller hands the returned record to the
    /// association store.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyKitError::NoConnectivity`] offline, or a classified
    /// server error.
    pub async fn complete_device_association(
        &self,
        session_id: &str,
    ) -> Result<DeviceAssociation, VerifyKitError> {
        ensure_online(self.connectivity.as_ref(), "complete_device_association")?;

        let url = self.url(&format!("associations/{session_id}/"));
        let builder = self.request.post(&url).await?.json(&serde_json::json!({}));
        let response = self.request.handle(builder).await?;

        response::parse_data(response).await
    }

    /// Begins a standalone validation session for an already-associated
    /// device. The caller must verify the association exists upstream.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyKitError::NoConnectivity`] offline, or a classified
    /// server error.
    pub async fn create_validation_session(
        &self,
        challenge_type: ChallengeType,
    ) -> Result<ValidationSession, VerifyKitError> {
        ensure_online(self.connectivity.as_ref(), "create_validation_session")?;

        let url = self.url("validations/");
        let builder = self
            .request
            .post(&url)
            .await?
            .json(&CreateValidationSessionBody {
                challenges_types: vec![challenge_type.to_string()],
            });
        let response = self.request.handle(builder).await?;

        response::parse_data(response).await
    }

    /// Server-side association teardown.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyKitError::NoConnectivity`] offline, or a classified
    /// server error. The caller clears local state regardless.
    pub async fn remove_association(&self) -> Result<(), VerifyKitError> {
        ensure_online(self.connectivity.as_ref(), "remove_association")?;

        let url = self.url("associations/");
        let builder = self.request.delete(&url).await?;
        let response = self.request.handle(builder).await?;

        response::expect_success(response).await
    }
}
