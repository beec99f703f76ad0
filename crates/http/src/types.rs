//! Request and response bodies of the backend auth and RBAC API

use hearth_core::{AuthTokens, User, UserContext};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Email/password login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response.
///
/// Accounts with two-factor enabled get a challenge instead of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LoginResponse {
    /// Session issued immediately
    Authenticated(SessionResponse),
    /// A second factor must be supplied for this user
    TwoFactorRequired(TwoFactorChallenge),
}

/// Second-factor challenge returned by login
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorChallenge {
    pub requires_two_factor: bool,
    pub user_id: String,
}

/// A user together with a freshly issued token pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user: User,
    pub tokens: AuthTokens,
}

/// Refresh request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Refresh response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub tokens: AuthTokens,
}

/// Response of `GET /auth/me`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: User,
    #[serde(default)]
    pub context: UserContext,
}

/// TOTP code or recovery code submitted for a pending login
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorRequest {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_code: Option<String>,
}

/// Result of `POST /auth/2fa/validate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwoFactorValidation {
    pub valid: bool,
}

/// Request for passkey assertion options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PasskeyOptionsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Signed assertion produced by the authenticator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasskeyVerifyRequest {
    /// WebAuthn assertion response (as JSON)
    pub response: JsonValue,
}

/// RBAC role as listed by the admin API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// Permission gating a resource/action pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: String,
    pub resource: String,
    pub action: String,
}

/// Create or update a role
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_ids: Option<Vec<String>>,
}

/// Assign a role to a user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignmentRequest {
    pub role_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_login_response_with_session() {
        let response: LoginResponse = serde_json::from_value(json!({
            "user": { "id": "u1", "role": "tenant" },
            "tokens": { "access_token": "a.b.c", "refresh_token": "r1" }
        }))
        .unwrap();

        match response {
            LoginResponse::Authenticated(session) => {
                assert_eq!(session.user.id, "u1");
                assert_eq!(session.tokens.refresh_token, "r1");
            }
            LoginResponse::TwoFactorRequired(_) => panic!("Expected a session"),
        }
    }

    #[test]
    fn test_login_response_with_two_factor() {
        let response: LoginResponse = serde_json::from_value(json!({
            "requiresTwoFactor": true,
            "userId": "u2"
        }))
        .unwrap();

        assert!(matches!(
            response,
            LoginResponse::TwoFactorRequired(TwoFactorChallenge { ref user_id, .. }) if user_id == "u2"
        ));
    }

    #[test]
    fn test_two_factor_request_omits_missing_codes() {
        let request = TwoFactorRequest {
            user_id: "u2".to_string(),
            code: None,
            recovery_code: Some("ABCD-EFGH".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "userId": "u2", "recoveryCode": "ABCD-EFGH" })
        );
    }

    #[test]
    fn test_me_response_without_context() {
        let response: MeResponse =
            serde_json::from_value(json!({ "user": { "id": "u1", "role": "admin" } })).unwrap();
        assert_eq!(response.context, UserContext::default());
    }
}
