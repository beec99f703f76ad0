//! Hearth backend HTTP client

pub mod auth;
pub mod error;
pub mod rbac;
pub mod typed;

pub use error::ClientError;
pub use typed::{AuthenticatedClient, ClientBuilder, PublicClient};

/// Send a request, mapping non-success statuses to [`ClientError`]
async fn send(request: reqwest::RequestBuilder) -> Result<reqwest::Response, ClientError> {
    let response = request.send().await?;
    let status = response.status();

    if status.is_success() {
        Ok(response)
    } else {
        let message = response.text().await.unwrap_or_else(|_| status.to_string());
        tracing::debug!(status = status.as_u16(), "backend returned an error status");
        Err(ClientError::from_status(status, message))
    }
}

/// Execute a request and decode the JSON body
pub(crate) async fn execute<T: serde::de::DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, ClientError> {
    let response = send(request).await?;
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

/// Execute a request and drop the response body
pub(crate) async fn execute_empty(request: reqwest::RequestBuilder) -> Result<(), ClientError> {
    send(request).await.map(drop)
}
