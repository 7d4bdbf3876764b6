use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::{api::wire::ErrorBody, domain::errors::SourceError};

const API_REQUEST_REJECTED: &str = "API_REQUEST_REJECTED";
const API_TRANSPORT_FAILED: &str = "API_TRANSPORT_FAILED";
const API_BODY_INVALID: &str = "API_BODY_INVALID";

/// Sends the request and decodes a success body as `T`.
pub async fn fetch_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, SourceError> {
    let body = execute(request).await?;

    serde_json::from_str(&body).map_err(|error| {
        tracing::warn!(code = API_BODY_INVALID, error = %error, "response body did not decode");
        SourceError::InvalidData(error.to_string())
    })
}

/// Sends the request and discards a success body.
pub async fn fetch_empty(request: RequestBuilder) -> Result<(), SourceError> {
    execute(request).await.map(|_| ())
}

async fn execute(request: RequestBuilder) -> Result<String, SourceError> {
    let response = request.send().await.map_err(map_transport)?;
    let status = response.status();
    let body = response.text().await.map_err(map_transport)?;

    if status.is_success() {
        return Ok(body);
    }

    let error = map_status(status, &body);
    tracing::debug!(
        code = API_REQUEST_REJECTED,
        status = status.as_u16(),
        "server rejected request"
    );
    Err(error)
}

pub fn map_status(status: StatusCode, body: &str) -> SourceError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.message)
        .map(|message| message.trim().to_owned())
        .filter(|message| !message.is_empty());

    SourceError::Rejected {
        status: status.as_u16(),
        message,
    }
}

pub fn map_transport(error: reqwest::Error) -> SourceError {
    let kind = if error.is_timeout() {
        "timeout"
    } else if error.is_connect() {
        "connect"
    } else if error.is_decode() || error.is_body() {
        "body"
    } else {
        "request"
    };
    tracing::debug!(code = API_TRANSPORT_FAILED, kind, error = %error, "transport failure");

    SourceError::Network(format!("{kind} failed"))
}
