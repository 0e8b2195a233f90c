//! Refresh-token rotation: revoke the presented token and mint a
//! replacement pair in one transaction.
//!
//! The revoke is a conditional UPDATE on `revoked_at IS NULL`, so two
//! concurrent rotations of the same token cannot both succeed: the loser
//! observes zero rows and fails closed with `InvalidRefresh`. The role in
//! the new access token is re-read from the accounts table inside the same
//! transaction; whatever role the old token claimed is irrelevant.

use anyhow::Result;
use sqlx::PgPool;
use tracing::debug;

use super::state::AuthState;
use super::storage::{self, AccountRecord};
use super::token::AccessClaims;
use super::utils::hash_token;

pub(crate) enum RotationOutcome {
    Rotated(RotatedSession),
    /// Unknown, revoked, or expired token; also a lost rotation race or a
    /// token whose owning account no longer exists. Callers cannot tell
    /// these apart.
    InvalidRefresh,
}

pub(crate) struct RotatedSession {
    pub(crate) access: String,
    pub(crate) refresh: String,
    pub(crate) account: AccountRecord,
}

/// Rotate a presented raw refresh-token value.
///
/// # Errors
/// Returns an error only for store failures; every auth-shaped rejection is
/// an `InvalidRefresh` outcome.
pub(crate) async fn rotate(
    pool: &PgPool,
    auth_state: &AuthState,
    presented: &str,
    user_agent: Option<&str>,
    ip: Option<&str>,
) -> Result<RotationOutcome> {
    let token_hash = hash_token(presented);

    let mut tx = pool.begin().await?;

    let Some(account_id) = storage::consume_refresh_token(&mut *tx, &token_hash).await? else {
        tx.rollback().await?;
        debug!("rotation rejected: refresh token not usable");
        return Ok(RotationOutcome::InvalidRefresh);
    };

    let Some(account) = storage::lookup_account_by_id(&mut *tx, account_id).await? else {
        // The owner is gone; keep the revocation so the orphaned token
        // cannot be replayed.
        tx.commit().await?;
        debug!(%account_id, "rotation rejected: owning account no longer exists");
        return Ok(RotationOutcome::InvalidRefresh);
    };

    let refresh = storage::insert_refresh_token(
        &mut *tx,
        account.id,
        auth_state.config().refresh_ttl_seconds(),
        user_agent,
        ip,
    )
    .await?;

    tx.commit().await?;

    let claims = AccessClaims::new(
        account.id,
        &account.email,
        account.role,
        auth_state.config().access_ttl_seconds(),
    );
    let access = auth_state.session_codec().sign(&claims)?;

    Ok(RotationOutcome::Rotated(RotatedSession {
        access,
        refresh,
        account,
    }))
}
