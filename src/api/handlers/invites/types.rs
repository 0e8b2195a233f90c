//! Request/response types for invitation endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::handlers::auth::Role;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct InviteCreateRequest {
    pub email: String,
    pub role: Role,
    pub message: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct InviteCreateResponse {
    pub invite_id: String,
    /// Short human-enterable key included in the invitation email.
    pub invite_key: String,
    pub accept_url: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct InviteSummary {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub invite_key: String,
    pub status: String,
    pub created_at: String,
    pub expires_at: String,
    pub accepted_at: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ProfileInput {
    pub full_name: String,
    /// The three secret factors the new account will log in with.
    pub factors: [String; 3],
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RedeemRequest {
    pub token: String,
    pub profile: ProfileInput,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RedeemResponse {
    /// Single-use login link for the freshly onboarded account.
    pub bootstrap_url: String,
}
