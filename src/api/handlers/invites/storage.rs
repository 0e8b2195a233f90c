//! Database helpers for invitation state.

use anyhow::{Context, Result, anyhow};
use serde_json::json;
use sqlx::{PgConnection, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::types::InviteSummary;
use crate::api::handlers::auth::Role;
use crate::api::handlers::auth::storage::AccountRecord;

/// Create a pending invite row and return its id.
pub(super) async fn insert_invite(
    conn: &mut PgConnection,
    email: &str,
    role: Role,
    message: Option<&str>,
    invite_key: &str,
    ttl_seconds: i64,
) -> Result<Uuid> {
    let query = r"
        INSERT INTO invites (email, role, message, invite_key, expires_at)
        VALUES ($1, $2, $3, $4, NOW() + ($5 * INTERVAL '1 second'))
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(role.as_str())
        .bind(message)
        .bind(invite_key)
        .bind(ttl_seconds)
        .fetch_one(&mut *conn)
        .instrument(span)
        .await
        .context("failed to insert invite")?;

    Ok(row.get("id"))
}

/// One-way `pending -> accepted` transition.
///
/// The conditional UPDATE makes the transition single-use: an invite that
/// is already accepted or past its expiry matches zero rows, and the caller
/// must reject the redemption.
pub(super) async fn accept_invite(conn: &mut PgConnection, invite_id: Uuid) -> Result<bool> {
    let query = r"
        UPDATE invites
        SET status = 'accepted',
            accepted_at = NOW()
        WHERE id = $1
          AND status = 'pending'
          AND expires_at > NOW()
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(invite_id)
        .execute(&mut *conn)
        .instrument(span)
        .await
        .context("failed to accept invite")?;

    Ok(result.rows_affected() > 0)
}

/// Idempotent find-or-create of the invited account.
///
/// Redeeming twice with the same email never creates two accounts. An
/// existing account keeps its current role; the invite role only seeds
/// brand-new rows.
pub(super) async fn upsert_account(
    conn: &mut PgConnection,
    email: &str,
    full_name: &str,
    invited_role: Role,
) -> Result<AccountRecord> {
    let query = r"
        INSERT INTO accounts (email, full_name, role)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO UPDATE
        SET full_name = EXCLUDED.full_name,
            updated_at = NOW()
        RETURNING id, email, role
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(full_name)
        .bind(invited_role.as_str())
        .fetch_one(&mut *conn)
        .instrument(span)
        .await
        .context("failed to upsert account")?;

    let role: String = row.get("role");
    let role = Role::parse(&role).ok_or_else(|| anyhow!("unknown role in accounts row: {role}"))?;
    Ok(AccountRecord {
        id: row.get("id"),
        email: row.get("email"),
        role,
    })
}

/// Store the three factor hashes at onboarding completion.
pub(super) async fn upsert_credentials(
    conn: &mut PgConnection,
    account_id: Uuid,
    factor_hashes: &[String; 3],
) -> Result<()> {
    let query = r"
        INSERT INTO account_credentials (account_id, factor1_hash, factor2_hash, factor3_hash)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (account_id) DO UPDATE
        SET factor1_hash = EXCLUDED.factor1_hash,
            factor2_hash = EXCLUDED.factor2_hash,
            factor3_hash = EXCLUDED.factor3_hash
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(account_id)
        .bind(&factor_hashes[0])
        .bind(&factor_hashes[1])
        .bind(&factor_hashes[2])
        .execute(&mut *conn)
        .instrument(span)
        .await
        .context("failed to upsert account credentials")?;
    Ok(())
}

/// Enqueue the invitation email in the outbox, inside the caller's
/// transaction so the invite row and its email stay consistent.
pub(super) async fn enqueue_invite_email(
    conn: &mut PgConnection,
    email: &str,
    invite_key: &str,
    accept_url: &str,
    message: Option<&str>,
) -> Result<()> {
    let payload_json = json!({
        "email": email,
        "invite_key": invite_key,
        "accept_url": accept_url,
        "message": message,
    });
    let payload_text =
        serde_json::to_string(&payload_json).context("failed to serialize invite email payload")?;

    let query = r"
        INSERT INTO email_outbox (to_email, template, payload_json)
        VALUES ($1, $2, $3::jsonb)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .bind("invite")
        .bind(payload_text)
        .execute(&mut *conn)
        .instrument(span)
        .await
        .context("failed to insert invite email outbox row")?;
    Ok(())
}

/// Recent invites for the admin console, newest first.
pub(super) async fn list_invites(pool: &PgPool) -> Result<Vec<InviteSummary>> {
    let query = r#"
        SELECT
            id::text AS id,
            email,
            role,
            invite_key,
            status,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
            to_char(expires_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS expires_at,
            CASE
                WHEN accepted_at IS NULL THEN NULL
                ELSE to_char(accepted_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"')
            END AS accepted_at
        FROM invites
        ORDER BY created_at DESC
        LIMIT 100
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list invites")?;

    rows.into_iter()
        .map(|row| {
            let role: String = row.get("role");
            let role =
                Role::parse(&role).ok_or_else(|| anyhow!("unknown role in invites row: {role}"))?;
            Ok(InviteSummary {
                id: row.get("id"),
                email: row.get("email"),
                role,
                invite_key: row.get("invite_key"),
                status: row.get("status"),
                created_at: row.get("created_at"),
                expires_at: row.get("expires_at"),
                accepted_at: row.get("accepted_at"),
            })
        })
        .collect()
}
