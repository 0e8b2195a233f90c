//! Multi-factor credential verification.
//!
//! Login presents exactly three secret factors; all three must verify
//! against the stored argon2 hashes. Every internal failure reason
//! (unknown account, missing credential row, factor mismatch) collapses
//! into one opaque rejection so the response never reveals which part
//! failed. Reasons are logged at debug level only.

use anyhow::Result;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use sqlx::PgPool;
use tracing::debug;

use super::storage::{self, AccountRecord};

/// Outcome of a login check. Pure: no side effects on any store.
pub(super) enum CredentialCheck {
    Verified(AccountRecord),
    Rejected,
}

/// Verify three presented factors for the account behind a normalized email.
pub(super) async fn verify_login(
    pool: &PgPool,
    email_normalized: &str,
    factors: &[String; 3],
) -> Result<CredentialCheck> {
    let Some(account) = storage::lookup_account_by_email(pool, email_normalized).await? else {
        debug!("login rejected: no account for presented email");
        return Ok(CredentialCheck::Rejected);
    };

    let Some(stored) = storage::lookup_credentials(pool, account.id).await? else {
        debug!(account_id = %account.id, "login rejected: account has no credentials");
        return Ok(CredentialCheck::Rejected);
    };

    // All three comparisons always run; a logical AND, not a first-failure exit.
    let checks = [
        verify_factor(&stored.factor1_hash, &factors[0]),
        verify_factor(&stored.factor2_hash, &factors[1]),
        verify_factor(&stored.factor3_hash, &factors[2]),
    ];

    if checks.iter().all(|ok| *ok) {
        Ok(CredentialCheck::Verified(account))
    } else {
        debug!(account_id = %account.id, "login rejected: factor mismatch");
        Ok(CredentialCheck::Rejected)
    }
}

/// Verify one presented factor against one stored hash. A stored hash that
/// fails to parse counts as a mismatch, never a panic.
fn verify_factor(stored_hash: &str, presented: &str) -> bool {
    PasswordHash::new(stored_hash)
        .is_ok_and(|hash| Argon2::default().verify_password(presented.as_bytes(), &hash).is_ok())
}

/// Hash a factor for storage at onboarding completion.
///
/// # Errors
/// Returns an error if hashing fails (effectively never with valid input).
pub(crate) fn hash_factor(factor: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(factor.as_bytes(), &salt)
        .map_err(|err| anyhow::anyhow!("failed to hash factor: {err}"))?;
    Ok(hash.to_string())
}
