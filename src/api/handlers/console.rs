//! Landing endpoints for the guarded console areas.
//!
//! These sit behind the route guard; by the time a request arrives here the
//! guard has already resolved a fresh `AuthContext` and enforced the path's
//! role set, so the handlers only render what the caller is.

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

use super::auth::Role;
use super::auth::guard::AuthContext;

#[derive(Debug, Serialize, ToSchema)]
pub struct ConsoleContext {
    pub area: String,
    pub account_id: String,
    pub email: String,
    pub role: Role,
}

fn console_response(area: &str, context: &AuthContext) -> axum::response::Response {
    let body = ConsoleContext {
        area: area.to_string(),
        account_id: context.account_id.to_string(),
        email: context.email.clone(),
        role: context.role,
    };
    (StatusCode::OK, Json(body)).into_response()
}

/// Elevated-privilege console: owners and admins only.
pub async fn admin_home(Extension(context): Extension<AuthContext>) -> impl IntoResponse {
    console_response("admin", &context)
}

/// Marketing console: owners, admins, and head of marketing.
pub async fn marketing_home(Extension(context): Extension<AuthContext>) -> impl IntoResponse {
    console_response("marketing", &context)
}

/// Client portal: any authenticated account.
pub async fn portal_home(Extension(context): Extension<AuthContext>) -> impl IntoResponse {
    console_response("portal", &context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn console_context_serializes_area_and_role() {
        let context = AuthContext {
            account_id: Uuid::nil(),
            email: "ops@example.com".to_string(),
            role: Role::Admin,
        };
        let response = console_response("admin", &context);
        assert_eq!(response.status(), StatusCode::OK);
    }
}
