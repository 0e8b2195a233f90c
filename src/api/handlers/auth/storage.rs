//! Database helpers for accounts, credentials, and token records.

use anyhow::{Context, Result, anyhow};
use sqlx::{PgConnection, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::role::Role;
use super::utils::{
    generate_bootstrap_token, generate_refresh_token, hash_token, is_unique_violation,
};

/// Account row as read for authorization decisions. `role` here is always
/// fresh from the database, never from a token claim.
#[derive(Clone, Debug)]
pub(crate) struct AccountRecord {
    pub(crate) id: Uuid,
    pub(crate) email: String,
    pub(crate) role: Role,
}

/// The three stored password-hash factors for an account.
pub(super) struct CredentialRow {
    pub(super) factor1_hash: String,
    pub(super) factor2_hash: String,
    pub(super) factor3_hash: String,
}

fn account_from_row(row: &sqlx::postgres::PgRow) -> Result<AccountRecord> {
    let role: String = row.get("role");
    let role = Role::parse(&role).ok_or_else(|| anyhow!("unknown role in accounts row: {role}"))?;
    Ok(AccountRecord {
        id: row.get("id"),
        email: row.get("email"),
        role,
    })
}

/// Case-insensitive account lookup for login.
pub(super) async fn lookup_account_by_email(
    pool: &PgPool,
    email_normalized: &str,
) -> Result<Option<AccountRecord>> {
    let query = "SELECT id, email, role FROM accounts WHERE lower(email) = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email_normalized)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup account by email")?;

    row.as_ref().map(account_from_row).transpose()
}

/// Fresh role re-read for an authenticated subject.
pub(crate) async fn lookup_account_by_id(
    conn: &mut PgConnection,
    account_id: Uuid,
) -> Result<Option<AccountRecord>> {
    let query = "SELECT id, email, role FROM accounts WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(account_id)
        .fetch_optional(&mut *conn)
        .instrument(span)
        .await
        .context("failed to lookup account by id")?;

    row.as_ref().map(account_from_row).transpose()
}

pub(super) async fn lookup_credentials(
    pool: &PgPool,
    account_id: Uuid,
) -> Result<Option<CredentialRow>> {
    let query = r"
        SELECT factor1_hash, factor2_hash, factor3_hash
        FROM account_credentials
        WHERE account_id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(account_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup account credentials")?;

    Ok(row.map(|row| CredentialRow {
        factor1_hash: row.get("factor1_hash"),
        factor2_hash: row.get("factor2_hash"),
        factor3_hash: row.get("factor3_hash"),
    }))
}

/// Persist a new refresh-token record and return the raw value once.
///
/// Only the SHA-256 hash is stored. The caller decides the transaction
/// scope: login uses a plain connection, rotation passes its transaction
/// so revoke-old and insert-new commit together.
pub(super) async fn insert_refresh_token(
    conn: &mut PgConnection,
    account_id: Uuid,
    ttl_seconds: i64,
    user_agent: Option<&str>,
    ip: Option<&str>,
) -> Result<String> {
    let query = r"
        INSERT INTO refresh_tokens (account_id, token_hash, user_agent, ip, expires_at)
        VALUES ($1, $2, $3, $4, NOW() + ($5 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_refresh_token()?;
        let token_hash = hash_token(&token);
        let result = sqlx::query(query)
            .bind(account_id)
            .bind(token_hash)
            .bind(user_agent)
            .bind(ip)
            .bind(ttl_seconds)
            .execute(&mut *conn)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert refresh token"),
        }
    }

    Err(anyhow!("failed to generate unique refresh token"))
}

/// Conditionally revoke a refresh token and return its owner.
///
/// The `revoked_at IS NULL AND expires_at > NOW()` predicate makes this a
/// compare-and-swap: of two concurrent rotations presenting the same token,
/// exactly one sees a row here and the loser gets `None`. Revoked and
/// expired tokens fall out the same way, so the caller cannot distinguish
/// a replayed token from a stale one.
pub(super) async fn consume_refresh_token(
    conn: &mut PgConnection,
    token_hash: &[u8],
) -> Result<Option<Uuid>> {
    let query = r"
        UPDATE refresh_tokens
        SET revoked_at = NOW()
        WHERE token_hash = $1
          AND revoked_at IS NULL
          AND expires_at > NOW()
        RETURNING account_id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(&mut *conn)
        .instrument(span)
        .await
        .context("failed to consume refresh token")?;

    Ok(row.map(|row| row.get("account_id")))
}

/// Revoke a refresh token at logout. Idempotent; returns whether a live
/// record was actually revoked.
pub(super) async fn revoke_refresh_token(pool: &PgPool, token_hash: &[u8]) -> Result<bool> {
    let query = r"
        UPDATE refresh_tokens
        SET revoked_at = NOW()
        WHERE token_hash = $1
          AND revoked_at IS NULL
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to revoke refresh token")?;
    Ok(result.rows_affected() > 0)
}

/// Persist a single-use bootstrap token and return the raw value once.
pub(crate) async fn insert_bootstrap_token(
    conn: &mut PgConnection,
    account_id: Uuid,
    ttl_seconds: i64,
) -> Result<String> {
    let query = r"
        INSERT INTO bootstrap_tokens (account_id, token_hash, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_bootstrap_token()?;
        let token_hash = hash_token(&token);
        let result = sqlx::query(query)
            .bind(account_id)
            .bind(token_hash)
            .bind(ttl_seconds)
            .execute(&mut *conn)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert bootstrap token"),
        }
    }

    Err(anyhow!("failed to generate unique bootstrap token"))
}

/// Consume a bootstrap token; single-use via the conditional UPDATE.
pub(crate) async fn consume_bootstrap_token(
    pool: &PgPool,
    token_hash: &[u8],
) -> Result<Option<Uuid>> {
    let query = r"
        UPDATE bootstrap_tokens
        SET consumed_at = NOW()
        WHERE token_hash = $1
          AND consumed_at IS NULL
          AND expires_at > NOW()
        RETURNING account_id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to consume bootstrap token")?;

    Ok(row.map(|row| row.get("account_id")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_record_holds_values() {
        let record = AccountRecord {
            id: Uuid::nil(),
            email: "alice@example.com".to_string(),
            role: Role::Owner,
        };
        assert_eq!(record.id, Uuid::nil());
        assert_eq!(record.role, Role::Owner);
    }

    #[test]
    fn credential_row_holds_three_factors() {
        let row = CredentialRow {
            factor1_hash: "a".to_string(),
            factor2_hash: "b".to_string(),
            factor3_hash: "c".to_string(),
        };
        assert_ne!(row.factor1_hash, row.factor2_hash);
        assert_ne!(row.factor2_hash, row.factor3_hash);
    }
}
