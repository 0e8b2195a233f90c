//! Session issuance: login, logout, introspection, and cookie plumbing.
//!
//! A session is two separate transport credentials: the signed access token
//! and the opaque refresh token, each in its own cookie under a shared name
//! prefix. The prefix matters: corrupted-session recovery sweeps every
//! cookie carrying it, including stale names left over from older releases.

use axum::{
    Json,
    extract::Extension,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{InvalidHeaderValue, SET_COOKIE},
    },
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::credentials::{self, CredentialCheck};
use super::rotation::{self, RotationOutcome};
use super::state::AuthState;
use super::storage::{self, AccountRecord};
use super::token::AccessClaims;
use super::types::{ErrorResponse, LoginRequest, SessionResponse, error_code};
use super::utils::{extract_client_ip, extract_user_agent, hash_token, normalize_email};
use crate::api::handlers::valid_email;

/// Namespace shared by every session transport credential.
pub const SESSION_COOKIE_PREFIX: &str = "enirejo_";
pub const ACCESS_COOKIE: &str = "enirejo_access";
pub const REFRESH_COOKIE: &str = "enirejo_refresh";

/// A freshly issued access/refresh pair. Raw values exist only here and in
/// the Set-Cookie headers built from them.
pub(crate) struct IssuedSession {
    pub(crate) access: String,
    pub(crate) refresh: String,
}

/// Issue a new session pair for a verified account.
///
/// The refresh record must be durable before the access token is handed
/// out; a persistence failure fails the whole attempt and no partial
/// session escapes.
pub(crate) async fn issue_session(
    pool: &PgPool,
    auth_state: &AuthState,
    account: &AccountRecord,
    user_agent: Option<&str>,
    ip: Option<&str>,
) -> anyhow::Result<IssuedSession> {
    let mut conn = pool.acquire().await?;
    let refresh = storage::insert_refresh_token(
        &mut *conn,
        account.id,
        auth_state.config().refresh_ttl_seconds(),
        user_agent,
        ip,
    )
    .await?;

    let claims = AccessClaims::new(
        account.id,
        &account.email,
        account.role,
        auth_state.config().access_ttl_seconds(),
    );
    let access = auth_state.session_codec().sign(&claims)?;

    Ok(IssuedSession { access, refresh })
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued; cookies set", body = SessionResponse),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 401, description = "Credentials rejected", body = ErrorResponse),
        (status = 500, description = "Store unavailable", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Json(payload): Json<LoginRequest>,
) -> impl IntoResponse {
    let email = normalize_email(&payload.email);
    if !valid_email(&email) {
        return error_response(StatusCode::BAD_REQUEST, error_code::INVALID_FORMAT);
    }

    let account = match credentials::verify_login(&pool, &email, &payload.factors).await {
        Ok(CredentialCheck::Verified(account)) => account,
        Ok(CredentialCheck::Rejected) => {
            // One opaque rejection regardless of the internal reason.
            return error_response(StatusCode::UNAUTHORIZED, error_code::INVALID_CREDENTIALS);
        }
        Err(err) => {
            error!("login credential check failed: {err}");
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
            error!("session issuance failed: {err}");
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
            error!("failed to build session cookies: {err}");
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

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session cleared; cookies swept")
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    if let Some(refresh) = cookie_value(&headers, REFRESH_COOKIE) {
        let token_hash = hash_token(&refresh);
        if let Err(err) = storage::revoke_refresh_token(&pool, &token_hash).await {
            error!("failed to revoke refresh token at logout: {err}");
        }
    }

    // Always sweep, even if no refresh token was presented.
    let mut response_headers = HeaderMap::new();
    for cookie in purge_cookies(&headers, auth_state.config().cookie_secure()) {
        response_headers.append(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    responses(
        (status = 200, description = "New pair issued; old refresh token revoked", body = SessionResponse),
        (status = 401, description = "Missing, revoked, or expired refresh token", body = ErrorResponse),
        (status = 500, description = "Store unavailable", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn refresh(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let Some(presented) = cookie_value(&headers, REFRESH_COOKIE) else {
        return error_response(StatusCode::UNAUTHORIZED, error_code::INVALID_REFRESH);
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
            let mut response_headers = HeaderMap::new();
            match session_cookies(&auth_state, &issued) {
                Ok([access_cookie, refresh_cookie]) => {
                    response_headers.append(SET_COOKIE, access_cookie);
                    response_headers.append(SET_COOKIE, refresh_cookie);
                }
                Err(err) => {
                    error!("failed to build rotated session cookies: {err}");
                    return error_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        error_code::SERVER_ERROR,
                    );
                }
            }
            let body = SessionResponse {
                account_id: rotated.account.id.to_string(),
                email: rotated.account.email,
                role: rotated.account.role,
                landing: rotated.account.role.landing_path().to_string(),
            };
            (StatusCode::OK, response_headers, Json(body)).into_response()
        }
        Ok(RotationOutcome::InvalidRefresh) => {
            error_response(StatusCode::UNAUTHORIZED, error_code::INVALID_REFRESH)
        }
        Err(err) => {
            error!("refresh rotation failed: {err}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                error_code::DATABASE_ERROR,
            )
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 204, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn session(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    // Introspection only: missing or unusable tokens are "no session",
    // never an error that could leak auth state.
    let Some(access) = cookie_value(&headers, ACCESS_COOKIE) else {
        return StatusCode::NO_CONTENT.into_response();
    };
    match auth_state.session_codec().verify::<AccessClaims>(&access) {
        Ok(claims) => {
            let body = SessionResponse {
                account_id: claims.sub.to_string(),
                email: claims.email,
                role: claims.role,
                landing: claims.role.landing_path().to_string(),
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(_) => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Plain login form placeholder; anonymous requests see this, while the
/// guard forwards authenticated ones to their landing area first.
pub async fn login_form() -> impl IntoResponse {
    (StatusCode::OK, "Sign in with your email and three factors.")
}

pub(crate) fn error_response(status: StatusCode, code: &str) -> axum::response::Response {
    (status, Json(ErrorResponse::new(code))).into_response()
}

/// Build the two Set-Cookie headers for a freshly issued session.
pub(crate) fn session_cookies(
    auth_state: &AuthState,
    issued: &IssuedSession,
) -> Result<[HeaderValue; 2], InvalidHeaderValue> {
    let secure = auth_state.config().cookie_secure();
    let access = build_cookie(
        ACCESS_COOKIE,
        &issued.access,
        auth_state.config().access_ttl_seconds(),
        secure,
    )?;
    let refresh = build_cookie(
        REFRESH_COOKIE,
        &issued.refresh,
        auth_state.config().refresh_ttl_seconds(),
        secure,
    )?;
    Ok([access, refresh])
}

fn build_cookie(
    name: &str,
    value: &str,
    max_age_seconds: i64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie =
        format!("{name}={value}; Path=/; HttpOnly; SameSite=Strict; Max-Age={max_age_seconds}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn expire_cookie(name: &str, secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Expire every cookie in the session namespace.
///
/// Sweeps all presented names carrying the prefix, not just the two known
/// ones, so stale or partially-migrated credential names cannot survive a
/// corrupted-session reset. The two canonical names are always included.
pub(crate) fn purge_cookies(headers: &HeaderMap, secure: bool) -> Vec<HeaderValue> {
    let mut names: Vec<String> = vec![ACCESS_COOKIE.to_string(), REFRESH_COOKIE.to_string()];
    for name in presented_cookie_names(headers) {
        if name.starts_with(SESSION_COOKIE_PREFIX) && !names.contains(&name) {
            names.push(name);
        }
    }
    names
        .iter()
        .filter_map(|name| expire_cookie(name, secure).ok())
        .collect()
}

/// Read one cookie value from the request headers.
pub(crate) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    for (key, value) in cookie_pairs(headers) {
        if key == name {
            return Some(value);
        }
    }
    None
}

fn presented_cookie_names(headers: &HeaderMap) -> Vec<String> {
    cookie_pairs(headers).into_iter().map(|(name, _)| name).collect()
}

fn cookie_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    let Some(header) = headers.get(axum::http::header::COOKIE) else {
        return Vec::new();
    };
    let Ok(value) = header.to_str() else {
        return Vec::new();
    };
    value
        .split(';')
        .filter_map(|pair| {
            let trimmed = pair.trim();
            let mut parts = trimmed.splitn(2, '=');
            let key = parts.next()?.trim();
            let val = parts.next()?.trim();
            if key.is_empty() {
                None
            } else {
                Some((key.to_string(), val.to_string()))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;

    fn headers_with_cookie(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn cookie_value_finds_named_cookie() {
        let headers =
            headers_with_cookie("enirejo_access=abc; enirejo_refresh=def; theme=dark");
        assert_eq!(cookie_value(&headers, ACCESS_COOKIE), Some("abc".to_string()));
        assert_eq!(cookie_value(&headers, REFRESH_COOKIE), Some("def".to_string()));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn build_cookie_sets_transport_attributes() {
        let cookie = build_cookie(ACCESS_COOKIE, "value", 900, true).expect("cookie");
        let text = cookie.to_str().expect("ascii");
        assert!(text.starts_with("enirejo_access=value;"));
        assert!(text.contains("Path=/"));
        assert!(text.contains("HttpOnly"));
        assert!(text.contains("SameSite=Strict"));
        assert!(text.contains("Max-Age=900"));
        assert!(text.contains("Secure"));
    }

    #[test]
    fn insecure_base_url_omits_secure_flag() {
        let cookie = build_cookie(ACCESS_COOKIE, "value", 900, false).expect("cookie");
        assert!(!cookie.to_str().expect("ascii").contains("Secure"));
    }

    #[test]
    fn purge_sweeps_the_whole_namespace() {
        let headers = headers_with_cookie(
            "enirejo_access=a; enirejo_refresh=b; enirejo_session_v0=stale; theme=dark",
        );
        let cookies = purge_cookies(&headers, false);
        let texts: Vec<String> = cookies
            .iter()
            .map(|c| c.to_str().expect("ascii").to_string())
            .collect();

        assert_eq!(texts.len(), 3);
        assert!(texts.iter().any(|c| c.starts_with("enirejo_access=;")));
        assert!(texts.iter().any(|c| c.starts_with("enirejo_refresh=;")));
        assert!(texts.iter().any(|c| c.starts_with("enirejo_session_v0=;")));
        assert!(!texts.iter().any(|c| c.starts_with("theme=")));
        assert!(texts.iter().all(|c| c.contains("Max-Age=0")));
    }

    #[test]
    fn purge_covers_canonical_names_even_without_cookies() {
        let headers = HeaderMap::new();
        let cookies = purge_cookies(&headers, true);
        assert_eq!(cookies.len(), 2);
    }

    #[test]
    fn cookie_pairs_tolerates_malformed_segments() {
        let headers = headers_with_cookie("enirejo_access=ok; malformed; =empty; a=b");
        assert_eq!(cookie_value(&headers, ACCESS_COOKIE), Some("ok".to_string()));
        assert_eq!(cookie_value(&headers, "a"), Some("b".to_string()));
    }
}
