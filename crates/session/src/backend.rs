//! Backend seam used by the refresh coordinator.

use async_trait::async_trait;
use hearth_core::AuthTokens;
use hearth_http::types::{
    LoginRequest, LoginResponse, MeResponse, PasskeyOptionsRequest, PasskeyVerifyRequest,
    SessionResponse, TwoFactorRequest, TwoFactorValidation,
};
use hearth_http::{ClientBuilder, ClientError, PublicClient};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::config::SessionConfig;

#[cfg(not(target_arch = "wasm32"))]
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Credentials rejected")]
    Unauthorized,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<ClientError> for BackendError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::AuthenticationFailed(_) => Self::Unauthorized,
            ClientError::Request(e) => Self::Transport(e.to_string()),
            ClientError::Serialization(e) => Self::InvalidResponse(e.to_string()),
            ClientError::Configuration(message) => Self::Transport(message),
            other => Self::Rejected {
                status: other.status().unwrap_or_default(),
                message: other.to_string(),
            },
        }
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

#[async_trait]
pub trait AuthBackend: Send + Sync {
    // Session lifecycle
    async fn refresh(&self, refresh_token: &str) -> BackendResult<AuthTokens>;
    async fn fetch_profile(&self, access_token: &str) -> BackendResult<MeResponse>;
    async fn login(&self, request: &LoginRequest) -> BackendResult<LoginResponse>;
    async fn logout(&self, access_token: &str) -> BackendResult<()>;

    // Second factor
    async fn validate_two_factor(&self, request: &TwoFactorRequest) -> BackendResult<TwoFactorValidation>;
    async fn complete_two_factor_login(&self, request: &TwoFactorRequest) -> BackendResult<SessionResponse>;

    // Passkeys
    async fn passkey_options(&self, request: &PasskeyOptionsRequest) -> BackendResult<JsonValue>;
    async fn verify_passkey(&self, request: &PasskeyVerifyRequest) -> BackendResult<SessionResponse>;
}

/// [`AuthBackend`] over the HTTP API
#[derive(Debug, Clone)]
pub struct HttpAuthBackend {
    client: PublicClient,
}

impl HttpAuthBackend {
    pub const fn new(client: PublicClient) -> Self {
        Self { client }
    }

    /// Build a client for `config.api_base_url`
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is empty or the HTTP client cannot be built
    pub fn from_config(config: &SessionConfig) -> BackendResult<Self> {
        let builder = ClientBuilder::new().base_url(config.api_base_url.clone());
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(REQUEST_TIMEOUT);
        Ok(Self::new(builder.build_public()?))
    }

    pub const fn client(&self) -> &PublicClient {
        &self.client
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn refresh(&self, refresh_token: &str) -> BackendResult<AuthTokens> {
        Ok(self.client.refresh(refresh_token).await?.tokens)
    }

    async fn fetch_profile(&self, access_token: &str) -> BackendResult<MeResponse> {
        Ok(self.client.authenticate(access_token).me().await?)
    }

    async fn login(&self, request: &LoginRequest) -> BackendResult<LoginResponse> {
        Ok(self.client.login(request).await?)
    }

    async fn logout(&self, access_token: &str) -> BackendResult<()> {
        Ok(self.client.authenticate(access_token).logout().await?)
    }

    async fn validate_two_factor(&self, request: &TwoFactorRequest) -> BackendResult<TwoFactorValidation> {
        Ok(self.client.validate_two_factor(request).await?)
    }

    async fn complete_two_factor_login(&self, request: &TwoFactorRequest) -> BackendResult<SessionResponse> {
        Ok(self.client.complete_two_factor_login(request).await?)
    }

    async fn passkey_options(&self, request: &PasskeyOptionsRequest) -> BackendResult<JsonValue> {
        Ok(self.client.passkey_verify_options(request).await?)
    }

    async fn verify_passkey(&self, request: &PasskeyVerifyRequest) -> BackendResult<SessionResponse> {
        Ok(self.client.passkey_process_verify(request).await?)
    }
}
