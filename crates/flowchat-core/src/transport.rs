use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{0} is not configured")]
    MissingConfig(&'static str),

    #[error("request failed with status {status}")]
    Http { status: StatusCode, body: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected response shape: {0}")]
    MalformedResponse(String),

    #[error("request aborted: {0}")]
    Aborted(String),
}

/// One outbound call per message: no retry, no timeout.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;

    /// Report missing settings before any request goes out
    fn check_config(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send(&self, message: &str) -> Result<String, TransportError>;
}

/// Fail on non-2xx, then decode the body as `T`.
pub(crate) async fn decode_response<T: DeserializeOwned>(
    response: Response,
) -> Result<T, TransportError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(TransportError::Http { status, body });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| TransportError::MalformedResponse(e.to_string()))
}

pub(crate) fn require(value: &str, name: &'static str) -> Result<(), TransportError> {
    if value.trim().is_empty() {
        Err(TransportError::MissingConfig(name))
    } else {
        Ok(())
    }
}
