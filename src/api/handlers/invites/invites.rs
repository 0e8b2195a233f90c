//! Invitation endpoints: create, list, redeem, and bootstrap login.
//!
//! Flow Overview:
//! 1) An elevated user creates an invite; the row, its 4-digit key, and the
//!    outbox email commit in one transaction.
//! 2) The invitee redeems the signed capability token with a profile; the
//!    account upsert, credential hashes, the one-way `pending -> accepted`
//!    transition, and a single-use bootstrap token commit in one transaction.
//! 3) The bootstrap token is exchanged exactly once for a normal session.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info};

use super::storage;
use super::types::{
    InviteCreateRequest, InviteCreateResponse, InviteSummary, RedeemRequest, RedeemResponse,
};
use crate::api::handlers::auth::credentials::hash_factor;
use crate::api::handlers::auth::guard::AuthContext;
use crate::api::handlers::auth::session::{error_response, issue_session, session_cookies};
use crate::api::handlers::auth::storage as auth_storage;
use crate::api::handlers::auth::token::InviteClaims;
use crate::api::handlers::auth::types::{
    BootstrapRequest, ErrorResponse, SessionResponse, error_code,
};
use crate::api::handlers::auth::utils::{
    extract_client_ip, extract_user_agent, generate_invite_key, hash_token, normalize_email,
};
use crate::api::handlers::auth::AuthState;
use crate::api::handlers::valid_email;

#[utoipa::path(
    post,
    path = "/admin/invites",
    request_body = InviteCreateRequest,
    responses(
        (status = 201, description = "Invite created and email queued", body = InviteCreateResponse),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 500, description = "Store unavailable", body = ErrorResponse)
    ),
    tag = "invites"
)]
pub async fn create(
    Extension(context): Extension<AuthContext>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Json(payload): Json<InviteCreateRequest>,
) -> impl IntoResponse {
    let email = normalize_email(&payload.email);
    if !valid_email(&email) {
        return error_response(StatusCode::BAD_REQUEST, error_code::INVALID_FORMAT);
    }

    let invite_key = generate_invite_key();
    let ttl_seconds = auth_state.config().invite_ttl_seconds();

    let result = async {
        let mut tx = pool.begin().await?;
        let invite_id = storage::insert_invite(
            &mut tx,
            &email,
            payload.role,
            payload.message.as_deref(),
            &invite_key,
            ttl_seconds,
        )
        .await?;

        let claims = InviteClaims::new(invite_id, &email, payload.role, ttl_seconds);
        let token = auth_state.invite_codec().sign(&claims)?;
        let accept_url = build_accept_url(auth_state.config().base_url(), &token);

        // The email row commits with the invite; actual delivery is the
        // outbox worker's problem and cannot fail this call.
        storage::enqueue_invite_email(
            &mut tx,
            &email,
            &invite_key,
            &accept_url,
            payload.message.as_deref(),
        )
        .await?;
        tx.commit().await?;

        anyhow::Ok((invite_id, accept_url))
    }
    .await;

    match result {
        Ok((invite_id, accept_url)) => {
            info!(
                invite_id = %invite_id,
                inviter = %context.account_id,
                role = %payload.role,
                "invite created"
            );
            let body = InviteCreateResponse {
                invite_id: invite_id.to_string(),
                invite_key,
                accept_url,
            };
            (StatusCode::CREATED, Json(body)).into_response()
        }
        Err(err) => {
            error!("failed to create invite: {err}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                error_code::DATABASE_ERROR,
            )
        }
    }
}

#[utoipa::path(
    get,
    path = "/admin/invites",
    responses(
        (status = 200, description = "Recent invites, newest first", body = [InviteSummary]),
        (status = 500, description = "Store unavailable", body = ErrorResponse)
    ),
    tag = "invites"
)]
pub async fn list(pool: Extension<PgPool>) -> impl IntoResponse {
    match storage::list_invites(&pool).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(err) => {
            error!("failed to list invites: {err}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                error_code::DATABASE_ERROR,
            )
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/invites/redeem",
    request_body = RedeemRequest,
    responses(
        (status = 200, description = "Invite redeemed; bootstrap link issued", body = RedeemResponse),
        (status = 400, description = "Malformed profile", body = ErrorResponse),
        (status = 401, description = "Invalid or expired invitation token", body = ErrorResponse),
        (status = 409, description = "Invite already accepted", body = ErrorResponse),
        (status = 500, description = "Store unavailable", body = ErrorResponse)
    ),
    tag = "invites"
)]
pub async fn redeem(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Json(payload): Json<RedeemRequest>,
) -> impl IntoResponse {
    // Signature and expiry first; nothing below runs on a forged token.
    let Ok(claims) = auth_state
        .invite_codec()
        .verify::<InviteClaims>(&payload.token)
    else {
        return error_response(StatusCode::UNAUTHORIZED, error_code::INVALID_TOKEN);
    };

    let full_name = payload.profile.full_name.trim();
    let factors_ok = payload.profile.factors.iter().all(|f| !f.is_empty());
    if full_name.is_empty() || !factors_ok {
        return error_response(StatusCode::BAD_REQUEST, error_code::INVALID_FORMAT);
    }

    let factor_hashes = match hash_profile_factors(&payload.profile.factors) {
        Ok(hashes) => hashes,
        Err(err) => {
            error!("failed to hash onboarding factors: {err}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, error_code::SERVER_ERROR);
        }
    };

    let email = normalize_email(&claims.email);
    let result = async {
        let mut tx = pool.begin().await?;
        let account = storage::upsert_account(&mut tx, &email, full_name, claims.role).await?;
        storage::upsert_credentials(&mut tx, account.id, &factor_hashes).await?;

        if !storage::accept_invite(&mut tx, claims.invite_id).await? {
            tx.rollback().await?;
            return anyhow::Ok(None);
        }

        let bootstrap = auth_storage::insert_bootstrap_token(
            &mut tx,
            account.id,
            auth_state.config().bootstrap_ttl_seconds(),
        )
        .await?;
        tx.commit().await?;
        anyhow::Ok(Some((account, bootstrap)))
    }
    .await;

    match result {
        Ok(Some((account, bootstrap))) => {
            info!(invite_id = %claims.invite_id, account_id = %account.id, "invite redeemed");
            let body = RedeemResponse {
                bootstrap_url: build_bootstrap_url(auth_state.config().base_url(), &bootstrap),
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        // Already accepted, or the row expired: the transition is single-use.
        Ok(None) => error_response(StatusCode::CONFLICT, error_code::INVALID_TOKEN),
        Err(err) => {
            error!("failed to redeem invite: {err}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                error_code::DATABASE_ERROR,
            )
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/bootstrap",
    request_body = BootstrapRequest,
    responses(
        (status = 200, description = "Session issued; cookies set", body = SessionResponse),
        (status = 401, description = "Unknown, consumed, or expired bootstrap token", body = ErrorResponse),
        (status = 500, description = "Store unavailable", body = ErrorResponse)
    ),
    tag = "invites"
)]
pub async fn bootstrap(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Json(payload): Json<BootstrapRequest>,
) -> impl IntoResponse {
    let token_hash = hash_token(payload.token.trim());
    let account_id = match auth_storage::consume_bootstrap_token(&pool, &token_hash).await {
        Ok(Some(account_id)) => account_id,
        Ok(None) => {
            return error_response(StatusCode::UNAUTHORIZED, error_code::INVALID_TOKEN);
        }
        Err(err) => {
            error!("failed to consume bootstrap token: {err}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                error_code::DATABASE_ERROR,
            );
        }
    };

    let account = match load_account(&pool, account_id).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            return error_response(StatusCode::UNAUTHORIZED, error_code::INVALID_TOKEN);
        }
        Err(err) => {
            error!("failed to load account for bootstrap: {err}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                error_code::DATABASE_ERROR,
            );
        }
    };

    let user_agent = extract_user_agent(&headers);
    let ip = extract_client_ip(&headers);
    let issued = match issue_session(
        &pool,
        &auth_state,
        &account,
        user_agent.as_deref(),
        ip.as_deref(),
    )
    .await
    {
        Ok(issued) => issued,
        Err(err) => {
            error!("bootstrap session issuance failed: {err}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                error_code::DATABASE_ERROR,
            );
        }
    };

    let mut response_headers = HeaderMap::new();
    match session_cookies(&auth_state, &issued) {
        Ok([access_cookie, refresh_cookie]) => {
            response_headers.append(SET_COOKIE, access_cookie);
            response_headers.append(SET_COOKIE, refresh_cookie);
        }
        Err(err) => {
            error!("failed to build bootstrap session cookies: {err}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, error_code::SERVER_ERROR);
        }
    }

    let body = SessionResponse {
        account_id: account.id.to_string(),
        email: account.email,
        role: account.role,
        landing: account.role.landing_path().to_string(),
    };
    (StatusCode::OK, response_headers, Json(body)).into_response()
}

async fn load_account(
    pool: &PgPool,
    account_id: uuid::Uuid,
) -> anyhow::Result<Option<auth_storage::AccountRecord>> {
    let mut conn = pool.acquire().await?;
    auth_storage::lookup_account_by_id(&mut conn, account_id).await
}

fn hash_profile_factors(factors: &[String; 3]) -> anyhow::Result<[String; 3]> {
    Ok([
        hash_factor(&factors[0])?,
        hash_factor(&factors[1])?,
        hash_factor(&factors[2])?,
    ])
}

/// Frontend link carrying the signed invitation token.
fn build_accept_url(base_url: &str, token: &str) -> String {
    let base = base_url.trim_end_matches('/');
    format!("{base}/invite#token={token}")
}

/// Frontend link carrying the single-use bootstrap token.
fn build_bootstrap_url(base_url: &str, token: &str) -> String {
    let base = base_url.trim_end_matches('/');
    format!("{base}/welcome#token={token}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_url_trims_trailing_slash() {
        let url = build_accept_url("https://example.com/", "tok");
        assert_eq!(url, "https://example.com/invite#token=tok");
    }

    #[test]
    fn bootstrap_url_carries_token_in_fragment() {
        let url = build_bootstrap_url("https://example.com", "tok");
        assert_eq!(url, "https://example.com/welcome#token=tok");
    }

    #[test]
    fn profile_factor_hashes_verify_independently() {
        let factors = [
            "alpha".to_string(),
            "beta".to_string(),
            "gamma".to_string(),
        ];
        let hashes = hash_profile_factors(&factors).expect("hash");
        assert_eq!(hashes.len(), 3);
        assert_ne!(hashes[0], hashes[1]);
        assert_ne!(hashes[1], hashes[2]);
    }
}
