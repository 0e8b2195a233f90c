//! Auth configuration and shared state.
//!
//! All secrets and lifetimes arrive through explicit configuration at
//! startup; there is no compiled-in fallback anywhere. The two signing
//! secrets are independent so a leak of one never affects the other.

use secrecy::SecretString;

use super::token::TokenCodec;

const DEFAULT_ACCESS_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;
const DEFAULT_INVITE_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_BOOTSTRAP_TTL_SECONDS: i64 = 15 * 60;

#[derive(Clone)]
pub struct AuthConfig {
    session_secret: SecretString,
    invite_secret: SecretString,
    base_url: String,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    invite_ttl_seconds: i64,
    bootstrap_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(session_secret: SecretString, invite_secret: SecretString, base_url: String) -> Self {
        Self {
            session_secret,
            invite_secret,
            base_url,
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            invite_ttl_seconds: DEFAULT_INVITE_TTL_SECONDS,
            bootstrap_ttl_seconds: DEFAULT_BOOTSTRAP_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_invite_ttl_seconds(mut self, seconds: i64) -> Self {
        self.invite_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_bootstrap_ttl_seconds(mut self, seconds: i64) -> Self {
        self.bootstrap_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Access tokens use the same lifetime at login and at rotation.
    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    #[must_use]
    pub fn invite_ttl_seconds(&self) -> i64 {
        self.invite_ttl_seconds
    }

    #[must_use]
    pub fn bootstrap_ttl_seconds(&self) -> i64 {
        self.bootstrap_ttl_seconds
    }

    /// Cookies are marked Secure whenever the site is served over HTTPS.
    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    pub(super) fn session_secret(&self) -> &SecretString {
        &self.session_secret
    }

    pub(super) fn invite_secret(&self) -> &SecretString {
        &self.invite_secret
    }
}

pub struct AuthState {
    config: AuthConfig,
    session_codec: TokenCodec,
    invite_codec: TokenCodec,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        let session_codec = TokenCodec::new(config.session_secret());
        let invite_codec = TokenCodec::new(config.invite_secret());
        Self {
            config,
            session_codec,
            invite_codec,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Codec for access tokens (session secret).
    #[must_use]
    pub fn session_codec(&self) -> &TokenCodec {
        &self.session_codec
    }

    /// Codec for invitation capability tokens (invite secret).
    #[must_use]
    pub fn invite_codec(&self) -> &TokenCodec {
        &self.invite_codec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::role::Role;
    use crate::api::handlers::auth::token::{AccessClaims, InviteClaims, TokenError};
    use uuid::Uuid;

    fn test_config() -> AuthConfig {
        AuthConfig::new(
            SecretString::from("session-secret".to_string()),
            SecretString::from("invite-secret".to_string()),
            "https://example.com".to_string(),
        )
    }

    #[test]
    fn config_defaults_and_overrides() {
        let config = test_config();
        assert_eq!(config.access_ttl_seconds(), 900);
        assert_eq!(config.refresh_ttl_seconds(), 2_592_000);
        assert_eq!(config.invite_ttl_seconds(), 604_800);
        assert_eq!(config.bootstrap_ttl_seconds(), 900);

        let config = config
            .with_access_ttl_seconds(60)
            .with_refresh_ttl_seconds(120)
            .with_invite_ttl_seconds(180)
            .with_bootstrap_ttl_seconds(240);
        assert_eq!(config.access_ttl_seconds(), 60);
        assert_eq!(config.refresh_ttl_seconds(), 120);
        assert_eq!(config.invite_ttl_seconds(), 180);
        assert_eq!(config.bootstrap_ttl_seconds(), 240);
    }

    #[test]
    fn cookie_secure_tracks_base_url_scheme() {
        assert!(test_config().cookie_secure());

        let dev = AuthConfig::new(
            SecretString::from("s".to_string()),
            SecretString::from("i".to_string()),
            "http://localhost:8080".to_string(),
        );
        assert!(!dev.cookie_secure());
    }

    #[test]
    fn state_codecs_use_independent_secrets() {
        let state = AuthState::new(test_config());

        let access = AccessClaims::new(Uuid::new_v4(), "a@example.com", Role::Member, 900);
        let token = state.session_codec().sign(&access).expect("sign");
        assert!(state.session_codec().verify::<AccessClaims>(&token).is_ok());
        assert_eq!(
            state
                .invite_codec()
                .verify::<AccessClaims>(&token)
                .unwrap_err(),
            TokenError::Invalid
        );

        let invite = InviteClaims::new(Uuid::new_v4(), "b@example.com", Role::Client, 900);
        let token = state.invite_codec().sign(&invite).expect("sign");
        assert!(state.invite_codec().verify::<InviteClaims>(&token).is_ok());
        assert_eq!(
            state
                .session_codec()
                .verify::<InviteClaims>(&token)
                .unwrap_err(),
            TokenError::Invalid
        );
    }
}
