//! Request/response types and the error taxonomy for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::role::Role;

/// Error codes returned in response bodies.
///
/// Login-time failures are deliberately collapsed: unknown account, missing
/// credentials, and factor mismatch are all `invalid_credentials` so the
/// response never reveals which part failed.
pub mod error_code {
    pub const INVALID_FORMAT: &str = "invalid_format";
    pub const INVALID_CREDENTIALS: &str = "invalid_credentials";
    pub const INVALID_REFRESH: &str = "invalid_refresh";
    pub const INVALID_TOKEN: &str = "invalid_token";
    pub const DATABASE_ERROR: &str = "database_error";
    pub const SERVER_ERROR: &str = "server_error";
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(code: &str) -> Self {
        Self {
            error: code.to_string(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    /// Exactly three secret factors; all must verify.
    pub factors: [String; 3],
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    pub account_id: String,
    pub email: String,
    pub role: Role,
    /// Landing area for the role, used by the frontend after login.
    pub landing: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct BootstrapRequest {
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_request_requires_exactly_three_factors() {
        let three = serde_json::json!({
            "email": "alice@example.com",
            "factors": ["one", "two", "three"],
        });
        assert!(serde_json::from_value::<LoginRequest>(three).is_ok());

        let two = serde_json::json!({
            "email": "alice@example.com",
            "factors": ["one", "two"],
        });
        assert!(serde_json::from_value::<LoginRequest>(two).is_err());

        let four = serde_json::json!({
            "email": "alice@example.com",
            "factors": ["one", "two", "three", "four"],
        });
        assert!(serde_json::from_value::<LoginRequest>(four).is_err());
    }

    #[test]
    fn session_response_serializes_role_as_snake_case() {
        let response = SessionResponse {
            account_id: "id".to_string(),
            email: "alice@example.com".to_string(),
            role: Role::HeadOfMarketing,
            landing: "/marketing".to_string(),
        };
        let value = serde_json::to_value(&response).expect("serialize");
        assert_eq!(value["role"], "head_of_marketing");
    }

    #[test]
    fn error_response_carries_code() {
        let response = ErrorResponse::new(error_code::INVALID_REFRESH);
        assert_eq!(response.error, "invalid_refresh");
    }
}
