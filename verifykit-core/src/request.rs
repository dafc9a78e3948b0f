//! HTTP wrapper for calls to the verification service.
//!
//! Applies timeouts, user-agent, the per-installation fingerprint and api-key
//! headers, and the bearer credential of the stored device association.
//! Transient transport failures (timeout, connection refused) are retried
//! with exponential backoff; a response the server actually produced is
//! never replayed, so classification always sees the first authoritative
//! answer.

use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Method, RequestBuilder, Response};

use crate::error::{classify_transport, VerifyKitError};
use crate::storage::AssociationStore;

/// Header carrying the configured api key on every request.
const API_KEY_HEADER: &str = "x-api-key";
/// Header carrying the hashed installation id on every request.
const FINGERPRINT_HEADER: &str = "x-device-fingerprint";

pub(crate) struct Request {
    client: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
    api_key: String,
    fingerprint: String,
    associations: Arc<dyn AssociationStore>,
}

impl Request {
    pub(crate) fn new(
        api_key: String,
        fingerprint: String,
        associations: Arc<dyn AssociationStore>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::new();
        let max_retries = 2; // total attempts = 3
        Self {
            client,
            timeout,
            max_retries,
            api_key,
            fingerprint,
            associations,
        }
    }

    /// Creates a request builder with defaults and auth headers applied.
    ///
    /// The bearer credential is read from the association store on every
    /// call; an unassociated device simply sends no Authorization header.
    async fn req(&self, method: Method, url: &str) -> Result<RequestBuilder, VerifyKitError> {
        #[cfg(not(test))]
        assert!(url.starts_with("https"));

        let mut builder = self
            .client
            .request(method, url)
            .timeout(self.timeout)
            .header(
                "User-Agent",
                format!("verifykit-core/{}", env!("CARGO_PKG_VERSION")),
            )
            .header(API_KEY_HEADER, &self.api_key)
            .header(FINGERPRINT_HEADER, &self.fingerprint);

        if let Some(association) = self.associations.read().await? {
            builder = builder.header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", association.token),
            );
        }

        Ok(builder)
    }

    /// Creates a POST request builder with defaults applied.
    pub(crate) async fn post(&self, url: &str) -> Result<RequestBuilder, VerifyKitError> {
        self.req(Method::POST, url).await
    }

    /// Creates a DELETE request builder with defaults applied.
    pub(crate) async fn delete(&self, url: &str) -> Result<RequestBuilder, VerifyKitError> {
        self.req(Method::DELETE, url).await
    }

    /// Sends a request built by `post`/`delete`, retrying transient
    /// transport failures.
    pub(crate) async fn handle(
        &self,
        request_builder: RequestBuilder,
    ) -> Result<Response, VerifyKitError> {
        let Some(template) = request_builder.try_clone() else {
            return execute_request_builder(request_builder)
                .await
                .map_err(Into::into);
        };

        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(self.max_retries as usize);

        (|| async {
            let request_builder = template.try_clone().ok_or_else(|| {
                TransportFailure::permanent(VerifyKitError::Unknown {
                    detail: "request cannot be retried because it is not cloneable".to_string(),
                })
            })?;
            execute_request_builder(request_builder).await
        })
        .retry(backoff)
        .when(TransportFailure::is_retryable)
        .await
        .map_err(Into::into)
    }
}

#[derive(Debug)]
struct TransportFailure {
    error: VerifyKitError,
    retryable: bool,
}

impl TransportFailure {
    const fn retryable(error: VerifyKitError) -> Self {
        Self {
            error,
            retryable: true,
        }
    }

    const fn permanent(error: VerifyKitError) -> Self {
        Self {
            error,
            retryable: false,
        }
    }

    const fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl From<TransportFailure> for VerifyKitError {
    fn from(value: TransportFailure) -> Self {
        value.error
    }
}

async fn execute_request_builder(
    request_builder: RequestBuilder,
) -> Result<Response, TransportFailure> {
    let (client, request) = request_builder.build_split();
    let request = request.map_err(|err| {
        TransportFailure::permanent(VerifyKitError::Unknown {
            detail: format!("request build failed: {err}"),
        })
    })?;

    match client.execute(request).await {
        Ok(resp) => Ok(resp),
        Err(err) => {
            let classified = classify_transport(&err);
            match classified {
                VerifyKitError::Timeout { .. } | VerifyKitError::NoConnectivity => {
                    Err(TransportFailure::retryable(classified))
                }
                _ => Err(TransportFailure::permanent(classified)),
            }
        }
    }
}
