//! Authentication API client methods

use super::{AuthenticatedClient, ClientError, PublicClient};
use crate::types::{
    LoginRequest, LoginResponse, MeResponse, PasskeyOptionsRequest, PasskeyVerifyRequest,
    RefreshRequest, RefreshResponse, SessionResponse, TwoFactorRequest, TwoFactorValidation,
};
use reqwest::Method;
use serde_json::Value as JsonValue;

/// Public authentication endpoints
impl PublicClient {
    /// Log in with email and password
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ClientError> {
        let req = self.request(Method::POST, "/auth/login").json(request);
        self.execute(req).await
    }

    /// Exchange a refresh token for a new token pair
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ClientError> {
        let req = self
            .request(Method::POST, "/auth/refresh")
            .json(&RefreshRequest {
                refresh_token: refresh_token.to_string(),
            });
        self.execute(req).await
    }

    /// Check a TOTP or recovery code without completing the login
    pub async fn validate_two_factor(
        &self,
        request: &TwoFactorRequest,
    ) -> Result<TwoFactorValidation, ClientError> {
        let req = self.request(Method::POST, "/auth/2fa/validate").json(request);
        self.execute(req).await
    }

    /// Complete a pending login with a TOTP or recovery code
    pub async fn complete_two_factor_login(
        &self,
        request: &TwoFactorRequest,
    ) -> Result<SessionResponse, ClientError> {
        let req = self
            .request(Method::POST, "/auth/2fa/complete/login")
            .json(request);
        self.execute(req).await
    }

    /// Fetch WebAuthn assertion options for a passkey login
    pub async fn passkey_verify_options(
        &self,
        request: &PasskeyOptionsRequest,
    ) -> Result<JsonValue, ClientError> {
        let req = self
            .request(Method::POST, "/auth/passkey/verify/options")
            .json(request);
        self.execute(req).await
    }

    /// Submit the signed assertion and receive a session
    pub async fn passkey_process_verify(
        &self,
        request: &PasskeyVerifyRequest,
    ) -> Result<SessionResponse, ClientError> {
        let req = self
            .request(Method::POST, "/auth/passkey/process/verify")
            .json(request);
        self.execute(req).await
    }
}

/// Endpoints that require the caller's access token
impl AuthenticatedClient {
    /// Get the current user and their role/member/organization context
    pub async fn me(&self) -> Result<MeResponse, ClientError> {
        let req = self.request(Method::GET, "/auth/me");
        self.execute(req).await
    }

    /// Invalidate the session server-side
    pub async fn logout(&self) -> Result<(), ClientError> {
        let req = self.request(Method::POST, "/auth/logout");
        self.execute_empty(req).await
    }
}
