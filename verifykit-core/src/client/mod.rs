//! API clients for the verification service.
//!
//! One client per server resource: [`LivenessClient`] and [`PinClient`] run
//! the create → execute → validate protocol for their challenge kind;
//! [`AssociationClient`] manages device associations and validation
//! sessions. Call ordering is the orchestrator's responsibility; clients
//! enforce nothing beyond the wire contract.

mod association;
mod liveness;
mod pin;
mod response;

pub use association::AssociationClient;
pub use liveness::LivenessClient;
pub use pin::PinClient;

use serde::Serialize;

use crate::error::VerifyKitError;
use crate::storage::Connectivity;
use crate::types::Document;

/// Pre-flight connectivity guard run before every request.
fn ensure_online(connectivity: &dyn Connectivity, context: &str) -> Result<(), VerifyKitError> {
    if connectivity.is_online() {
        Ok(())
    } else {
        log::debug!("{context} - no internet connection");
        Err(VerifyKitError::NoConnectivity)
    }
}

/// Document payload for challenge creation. CamelCase spelling; the
/// association endpoints use the snake_case variant in `association.rs`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChallengeDocumentBody<'a> {
    document_number: &'a str,
    document_type: &'a str,
    document_country: &'a str,
}

impl<'a> ChallengeDocumentBody<'a> {
    fn from_document(document: &'a Document) -> Self {
        Self {
            document_number: &document.number,
            document_type: document.doc_type_or_default(),
            document_country: document.country_or_default(),
        }
    }
}
