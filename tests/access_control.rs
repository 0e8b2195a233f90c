//! Access-control properties exercised through the crate's public API.
//!
//! These suites cover the pure layers: token signing and classification,
//! role/path policy, and configuration. Flows that need a live Postgres
//! (rotation races, silent rotation round-trips) are specified at the
//! query level in the storage modules and their unit tests.

use enirejo::api::handlers::auth::guard::{AccessDisposition, classify_access};
use enirejo::api::handlers::auth::role::{LOGIN_PATH, PathPolicy, Role, policy_for_path};
use enirejo::api::handlers::auth::token::{AccessClaims, InviteClaims, TokenError};
use enirejo::api::handlers::auth::{AuthConfig, AuthState};
use secrecy::SecretString;
use uuid::Uuid;

fn state() -> AuthState {
    AuthState::new(AuthConfig::new(
        SecretString::from("integration-session-secret".to_string()),
        SecretString::from("integration-invite-secret".to_string()),
        "https://example.com".to_string(),
    ))
}

#[test]
fn access_token_round_trips_with_uniform_lifetime() {
    let state = state();
    let account_id = Uuid::new_v4();

    // Login and rotation both read the same configured lifetime.
    let ttl = state.config().access_ttl_seconds();
    let claims = AccessClaims::new(account_id, "alice@example.com", Role::Owner, ttl);
    assert_eq!(claims.exp - claims.iat, ttl);

    let token = state.session_codec().sign(&claims).expect("sign");
    let decoded: AccessClaims = state.session_codec().verify(&token).expect("verify");
    assert_eq!(decoded.sub, account_id);
    assert_eq!(decoded.role, Role::Owner);
}

#[test]
fn expired_access_token_is_never_accepted() {
    let state = state();
    let mut claims = AccessClaims::new(Uuid::new_v4(), "alice@example.com", Role::Admin, 900);
    claims.iat -= 10_000;
    claims.exp = claims.iat + 900;
    let token = state.session_codec().sign(&claims).expect("sign");

    // Byte-for-byte identical token, just past its expiry.
    assert_eq!(
        state
            .session_codec()
            .verify::<AccessClaims>(&token)
            .unwrap_err(),
        TokenError::Expired
    );
    assert!(matches!(
        classify_access(&state, Some(&token)),
        AccessDisposition::NeedsRotation
    ));
}

#[test]
fn every_single_bit_flip_in_the_signature_fails_verification() {
    let state = state();
    let claims = AccessClaims::new(Uuid::new_v4(), "alice@example.com", Role::Member, 900);
    let token = state.session_codec().sign(&claims).expect("sign");

    // Flip one base64 character at a time across the signature segment.
    let signature_start = token.rfind('.').expect("jwt has three segments") + 1;
    for index in signature_start..token.len() {
        let mut bytes = token.clone().into_bytes();
        bytes[index] = if bytes[index] == b'A' { b'B' } else { b'A' };
        let Ok(tampered) = String::from_utf8(bytes) else {
            continue;
        };
        if tampered == token {
            continue;
        }

        let result = state.session_codec().verify::<AccessClaims>(&tampered);
        assert_eq!(
            result.unwrap_err(),
            TokenError::Invalid,
            "flip at {index} must invalidate the token"
        );
        // And the guard treats it as corruption, never as a rotation candidate.
        assert!(matches!(
            classify_access(&state, Some(&tampered)),
            AccessDisposition::Corrupted
        ));
    }
}

#[test]
fn session_and_invite_secrets_are_not_interchangeable() {
    let state = state();

    let invite = InviteClaims::new(Uuid::new_v4(), "new@example.com", Role::Client, 3600);
    let invite_token = state.invite_codec().sign(&invite).expect("sign");
    assert!(
        state
            .invite_codec()
            .verify::<InviteClaims>(&invite_token)
            .is_ok()
    );
    assert_eq!(
        state
            .session_codec()
            .verify::<InviteClaims>(&invite_token)
            .unwrap_err(),
        TokenError::Invalid
    );

    let access = AccessClaims::new(Uuid::new_v4(), "a@example.com", Role::Member, 900);
    let access_token = state.session_codec().sign(&access).expect("sign");
    assert_eq!(
        state
            .invite_codec()
            .verify::<AccessClaims>(&access_token)
            .unwrap_err(),
        TokenError::Invalid
    );
}

#[test]
fn missing_credentials_need_rotation_and_garbage_is_corrupted() {
    let state = state();
    assert!(matches!(
        classify_access(&state, None),
        AccessDisposition::NeedsRotation
    ));
    assert!(matches!(
        classify_access(&state, Some("")),
        AccessDisposition::Corrupted
    ));
    assert!(matches!(
        classify_access(&state, Some("a.b")),
        AccessDisposition::Corrupted
    ));
}

#[test]
fn path_policy_separates_the_two_consoles() {
    let PathPolicy::Protected(admin) = policy_for_path("/admin/settings") else {
        panic!("/admin must be protected");
    };
    let PathPolicy::Protected(marketing) = policy_for_path("/marketing/campaigns") else {
        panic!("/marketing must be protected");
    };

    // Disjoint requirement sets: marketing is the broader one.
    assert!(admin.contains(&Role::Owner) && admin.contains(&Role::Admin));
    assert!(!admin.contains(&Role::HeadOfMarketing));
    assert!(marketing.contains(&Role::HeadOfMarketing));

    for role in [Role::Member, Role::Client, Role::Guest] {
        assert!(!admin.contains(&role));
        assert!(!marketing.contains(&role));
    }
}

#[test]
fn unauthorized_roles_land_in_an_authenticated_area_not_login() {
    for role in [
        Role::Owner,
        Role::Admin,
        Role::HeadOfMarketing,
        Role::Member,
        Role::Client,
        Role::Guest,
    ] {
        let landing = role.landing_path();
        assert_ne!(landing, LOGIN_PATH);
        assert!(matches!(
            policy_for_path(landing),
            PathPolicy::Protected(_)
        ));
    }
}

#[test]
fn login_and_api_surfaces_are_public() {
    assert_eq!(policy_for_path(LOGIN_PATH), PathPolicy::Public);
    assert_eq!(policy_for_path("/v1/auth/login"), PathPolicy::Public);
    assert_eq!(policy_for_path("/v1/invites/redeem"), PathPolicy::Public);
    assert_eq!(policy_for_path("/v1/auth/bootstrap"), PathPolicy::Public);
    assert_eq!(policy_for_path("/health"), PathPolicy::Public);
}

#[test]
fn cookie_security_follows_deployment_scheme() {
    let https = AuthConfig::new(
        SecretString::from("s".to_string()),
        SecretString::from("i".to_string()),
        "https://example.com".to_string(),
    );
    assert!(https.cookie_secure());

    let dev = AuthConfig::new(
        SecretString::from("s".to_string()),
        SecretString::from("i".to_string()),
        "http://localhost:8080".to_string(),
    );
    assert!(!dev.cookie_secure());
}
