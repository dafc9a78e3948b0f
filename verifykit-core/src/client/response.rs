//! Response envelope parsing shared by the API clients.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{
    backend_error_code, classify_response, VerifyKitError, CODE_INVALID_PIN,
    CODE_TOO_MANY_ATTEMPTS,
};

/// Success envelope every endpoint wraps its payload in.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub data: T,
}

/// Reads the status and full body of a response.
pub(crate) async fn read_parts(
    response: reqwest::Response,
) -> Result<(u16, String), VerifyKitError> {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|err| VerifyKitError::Unknown {
            detail: format!("failed to read response body: {err}"),
        })?;
    Ok((status, body))
}

/// Parses the `{data: T}` envelope of a successful response, classifying
/// non-2xx statuses first.
pub(crate) async fn parse_data<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, VerifyKitError> {
    let (status, body) = read_parts(response).await?;
    if !(200..300).contains(&status) {
        return Err(classify_response(status, &body));
    }

    serde_json::from_str::<ApiResponse<T>>(&body)
        .map(|envelope| envelope.data)
        .map_err(|err| VerifyKitError::Unknown {
            detail: format!("failed to parse response body: {err}"),
        })
}

/// Accepts any 2xx response, discarding the body.
pub(crate) async fn expect_success(response: reqwest::Response) -> Result<(), VerifyKitError> {
    let (status, body) = read_parts(response).await?;
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(classify_response(status, &body))
    }
}

/// Interprets a validate-challenge response.
///
/// A structured `invalid-pin` body is the normal negative result, `Ok(false)`
/// — never an error. A structured `too-many-attempts` body is the fatal
/// [`VerifyKitError::TooManyAttempts`]. Anything else non-2xx classifies
/// through the regular buckets.
pub(crate) async fn interpret_validation(
    response: reqwest::Response,
) -> Result<bool, VerifyKitError> {
    let (status, body) = read_parts(response).await?;
    if (200..300).contains(&status) {
        return Ok(true);
    }

    match backend_error_code(&body).as_deref() {
        Some(CODE_INVALID_PIN) => {
            log::debug!("validate_challenge - invalid credential reported by backend");
            Ok(false)
        }
        Some(CODE_TOO_MANY_ATTEMPTS) => Err(VerifyKitError::TooManyAttempts),
        _ => Err(classify_response(status, &body)),
    }
}
