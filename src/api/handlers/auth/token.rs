//! Signed token codec for access and invitation claims.
//!
//! Two independent codecs are built from two independent secrets (session
//! and invite) so compromise of one never compromises the other. Decode
//! failures are classified: an expired-but-genuine token can be recovered
//! through rotation, while anything malformed or tampered is terminal for
//! the presented session.

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use super::role::Role;
use crate::api::handlers::now_unix_seconds;

/// Why a presented token was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenError {
    /// Signature is genuine but `exp` has passed.
    Expired,
    /// Malformed, tampered, or signed with a different secret.
    Invalid,
}

/// Claims carried by an access token. Never persisted; the token's
/// existence is defined by a valid signature and an unexpired `exp`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl AccessClaims {
    #[must_use]
    pub fn new(account_id: Uuid, email: &str, role: Role, ttl_seconds: i64) -> Self {
        let now = now_unix_seconds();
        Self {
            sub: account_id,
            email: email.to_string(),
            role,
            iat: now,
            exp: now.saturating_add(ttl_seconds),
        }
    }
}

/// Claims carried by an invitation capability token. Possession alone
/// authorizes redeeming the referenced invite, nothing else.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InviteClaims {
    pub invite_id: Uuid,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl InviteClaims {
    #[must_use]
    pub fn new(invite_id: Uuid, email: &str, role: Role, ttl_seconds: i64) -> Self {
        let now = now_unix_seconds();
        Self {
            invite_id,
            email: email.to_string(),
            role,
            iat: now,
            exp: now.saturating_add(ttl_seconds),
        }
    }
}

/// HS256 encode/decode around a single symmetric secret.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenCodec {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        }
    }

    /// Sign a claims struct into a compact token string.
    ///
    /// # Errors
    /// Returns an error if serialization fails; with valid claims this does
    /// not happen in practice.
    pub fn sign<T: Serialize>(&self, claims: &T) -> anyhow::Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|err| anyhow::anyhow!("failed to sign token: {err}"))
    }

    /// Verify signature and expiry, then decode the claims.
    ///
    /// # Errors
    /// `TokenError::Expired` when only the expiry failed, `TokenError::Invalid`
    /// for every other defect. No leeway: an expired token is expired.
    pub fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        match decode::<T>(token, &self.decoding, &validation) {
            Ok(data) => Ok(data.claims),
            Err(err) => match err.kind() {
                ErrorKind::ExpiredSignature => Err(TokenError::Expired),
                _ => Err(TokenError::Invalid),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec(secret: &str) -> TokenCodec {
        TokenCodec::new(&SecretString::from(secret.to_string()))
    }

    #[test]
    fn access_claims_round_trip() {
        let codec = codec("unit-test-session-secret");
        let account_id = Uuid::new_v4();
        let claims = AccessClaims::new(account_id, "alice@example.com", Role::Admin, 900);

        let token = codec.sign(&claims).expect("sign");
        let decoded: AccessClaims = codec.verify(&token).expect("verify");

        assert_eq!(decoded.sub, account_id);
        assert_eq!(decoded.email, "alice@example.com");
        assert_eq!(decoded.role, Role::Admin);
        assert_eq!(decoded.exp, claims.exp);
    }

    #[test]
    fn expired_token_is_classified_as_expired() {
        let codec = codec("unit-test-session-secret");
        let mut claims = AccessClaims::new(Uuid::new_v4(), "alice@example.com", Role::Member, 900);
        claims.iat -= 2000;
        claims.exp = claims.iat + 900;

        let token = codec.sign(&claims).expect("sign");
        let result = codec.verify::<AccessClaims>(&token);

        assert_eq!(result.unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn tampered_token_is_invalid_not_expired() {
        let codec = codec("unit-test-session-secret");
        let claims = AccessClaims::new(Uuid::new_v4(), "alice@example.com", Role::Member, 900);
        let token = codec.sign(&claims).expect("sign");

        // Flip one character in the payload section.
        let mut bytes = token.into_bytes();
        let mid = bytes.len() / 2;
        bytes[mid] = if bytes[mid] == b'a' { b'b' } else { b'a' };
        let tampered = String::from_utf8(bytes).expect("utf8");

        let result = codec.verify::<AccessClaims>(&tampered);
        assert_eq!(result.unwrap_err(), TokenError::Invalid);
    }

    #[test]
    fn garbage_token_is_invalid() {
        let codec = codec("unit-test-session-secret");
        assert_eq!(
            codec.verify::<AccessClaims>("not-a-token").unwrap_err(),
            TokenError::Invalid
        );
        assert_eq!(
            codec.verify::<AccessClaims>("").unwrap_err(),
            TokenError::Invalid
        );
    }

    #[test]
    fn secrets_are_not_interchangeable() {
        let session = codec("session-secret");
        let invite = codec("invite-secret");

        let claims = InviteClaims::new(Uuid::new_v4(), "new@example.com", Role::Client, 3600);
        let token = invite.sign(&claims).expect("sign");

        assert!(invite.verify::<InviteClaims>(&token).is_ok());
        assert_eq!(
            session.verify::<InviteClaims>(&token).unwrap_err(),
            TokenError::Invalid
        );
    }

    #[test]
    fn invite_claims_round_trip() {
        let codec = codec("unit-test-invite-secret");
        let invite_id = Uuid::new_v4();
        let claims = InviteClaims::new(invite_id, "new@example.com", Role::HeadOfMarketing, 3600);

        let token = codec.sign(&claims).expect("sign");
        let decoded: InviteClaims = codec.verify(&token).expect("verify");

        assert_eq!(decoded.invite_id, invite_id);
        assert_eq!(decoded.role, Role::HeadOfMarketing);
    }
}
