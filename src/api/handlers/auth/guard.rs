//! Route guard: per-request session validation and role/path authorization.
//!
//! Runs as router-wide middleware. Public paths pass through untouched;
//! privileged paths resolve a fresh `{account, role}` context or get
//! redirected. The guard never lets a half-valid session reach a handler
//! and never lets an exception escape: any malformed or tampered credential
//! resolves to a full cookie sweep plus a redirect to the same URL, so the
//! next request starts clean.

use axum::{
    extract::{Extension, Request},
    http::header::SET_COOKIE,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::role::{LOGIN_PATH, PathPolicy, Role, policy_for_path};
use super::rotation::{self, RotationOutcome};
use super::session::{
    ACCESS_COOKIE, IssuedSession, REFRESH_COOKIE, cookie_value, purge_cookies, session_cookies,
};
use super::state::AuthState;
use super::storage;
use super::token::{AccessClaims, TokenError};
use super::utils::{extract_client_ip, extract_user_agent};

/// Authenticated request context; inserted into request extensions for
/// downstream handlers once the guard admits a privileged request.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub account_id: Uuid,
    pub email: String,
    pub role: Role,
}

/// What the presented access credential allows, before any store lookup.
#[derive(Debug)]
pub enum AccessDisposition {
    /// Signature and expiry check out; the claims still need a fresh role
    /// read before they authorize anything.
    Valid(AccessClaims),
    /// Absent or expired: recoverable through the refresh token.
    NeedsRotation,
    /// Malformed or tampered: terminal for the presented session.
    Corrupted,
}

/// Classify the access cookie without touching the store.
#[must_use]
pub fn classify_access(auth_state: &AuthState, access: Option<&str>) -> AccessDisposition {
    match access {
        None => AccessDisposition::NeedsRotation,
        Some(token) => match auth_state.session_codec().verify::<AccessClaims>(token) {
            Ok(claims) => AccessDisposition::Valid(claims),
            Err(TokenError::Expired) => AccessDisposition::NeedsRotation,
            Err(TokenError::Invalid) => AccessDisposition::Corrupted,
        },
    }
}

/// Router-wide guard middleware.
pub async fn guard(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let original_url = request
        .uri()
        .path_and_query()
        .map_or_else(|| path.clone(), |pq| pq.as_str().to_string());
    let headers = request.headers().clone();

    let access = cookie_value(&headers, ACCESS_COOKIE);
    let refresh = cookie_value(&headers, REFRESH_COOKIE);

    // An authenticated user asking for the login form is forwarded to their
    // landing area; the form is only for the unauthenticated.
    if path == LOGIN_PATH {
        if let AccessDisposition::Valid(claims) = classify_access(&auth_state, access.as_deref()) {
            if let Ok(Some(account)) = load_account(&pool, claims.sub).await {
                return Redirect::to(account.role.landing_path()).into_response();
            }
        }
        return next.run(request).await;
    }

    let required = match policy_for_path(&path) {
        PathPolicy::Public => return next.run(request).await,
        PathPolicy::Protected(roles) => roles,
    };

    if access.is_none() && refresh.is_none() {
        return Redirect::to(LOGIN_PATH).into_response();
    }

    let mut fresh_cookies = None;
    let context = match classify_access(&auth_state, access.as_deref()) {
        AccessDisposition::Valid(claims) => {
            // The claim's role is display-only; authorization uses a fresh read.
            match load_account(&pool, claims.sub).await {
                Ok(Some(account)) => AuthContext {
                    account_id: account.id,
                    email: account.email,
                    role: account.role,
                },
                Ok(None) => {
                    warn!(account_id = %claims.sub, "access token for a missing account");
                    return corrupted_session_response(&headers, &auth_state, &original_url);
                }
                Err(err) => {
                    // Fail closed: an unreachable store never grants the old role.
                    error!("guard role lookup failed: {err}");
                    return Redirect::to(LOGIN_PATH).into_response();
                }
            }
        }
        AccessDisposition::Corrupted => {
            debug!("corrupted access token presented");
            return corrupted_session_response(&headers, &auth_state, &original_url);
        }
        AccessDisposition::NeedsRotation => {
            let Some(presented) = refresh else {
                return Redirect::to(LOGIN_PATH).into_response();
            };
            let user_agent = extract_user_agent(&headers);
            let ip = extract_client_ip(&headers);
            match rotation::rotate(
                &pool,
                &auth_state,
                &presented,
                user_agent.as_deref(),
                ip.as_deref(),
            )
            .await
            {
                Ok(RotationOutcome::Rotated(rotated)) => {
                    let issued = IssuedSession {
                        access: rotated.access,
                        refresh: rotated.refresh,
                    };
                    match session_cookies(&auth_state, &issued) {
                        Ok(cookies) => fresh_cookies = Some(cookies),
                        Err(err) => {
                            error!("failed to build rotated session cookies: {err}");
                            return Redirect::to(LOGIN_PATH).into_response();
                        }
                    }
                    AuthContext {
                        account_id: rotated.account.id,
                        email: rotated.account.email,
                        role: rotated.account.role,
                    }
                }
                Ok(RotationOutcome::InvalidRefresh) => {
                    debug!("refresh token rejected during silent rotation");
                    return corrupted_session_response(&headers, &auth_state, &original_url);
                }
                Err(err) => {
                    error!("rotation failed in guard: {err}");
                    return Redirect::to(LOGIN_PATH).into_response();
                }
            }
        }
    };

    if !required.contains(&context.role) {
        // Authenticated but not authorized: send to the role's landing
        // area, never back to login and never to an error page.
        return Redirect::to(context.role.landing_path()).into_response();
    }

    request.extensions_mut().insert(context);
    let mut response = next.run(request).await;

    if let Some([access_cookie, refresh_cookie]) = fresh_cookies {
        let headers = response.headers_mut();
        headers.append(SET_COOKIE, access_cookie);
        headers.append(SET_COOKIE, refresh_cookie);
    }

    response
}

async fn load_account(
    pool: &PgPool,
    account_id: Uuid,
) -> anyhow::Result<Option<storage::AccountRecord>> {
    let mut conn = pool.acquire().await?;
    storage::lookup_account_by_id(&mut conn, account_id).await
}

/// Sweep the session cookie namespace and retry the same URL clean.
fn corrupted_session_response(
    request_headers: &axum::http::HeaderMap,
    auth_state: &AuthState,
    original_url: &str,
) -> Response {
    let mut response = Redirect::to(original_url).into_response();
    for cookie in purge_cookies(request_headers, auth_state.config().cookie_secure()) {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
    response
}
