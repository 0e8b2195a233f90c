//! # Enirejo (Session & Access Control)
//!
//! `enirejo` is the session and access-control authority for the site: it
//! verifies multi-factor credentials, issues short-lived signed access
//! tokens paired with long-lived opaque refresh tokens, rotates refresh
//! tokens with revocation, and gates every privileged request through a
//! role-aware route guard.
//!
//! ## Session model
//!
//! - **Access token**: HS256-signed claims (`sub`, `email`, `role`) with a
//!   15 minute lifetime. Never persisted; its existence is defined entirely
//!   by a valid signature and an unexpired `exp`.
//! - **Refresh token**: 32 bytes of OS randomness, stored server-side only
//!   as a SHA-256 hash, valid for 30 days. Presenting it rotates it: the
//!   old record is revoked and a replacement pair is minted in the same
//!   transaction, so a replayed refresh token always fails closed.
//!
//! Roles are a closed set (`owner`, `admin`, `head_of_marketing`, `member`,
//! `client`, `guest`) and are re-read from the database on every rotation
//! and on every privileged request; the role embedded in a token is never
//! trusted for an authorization decision.
//!
//! ## Invitations
//!
//! New accounts are bootstrapped through single-use, time-boxed invitation
//! tokens signed with an independent secret, redeemed into an idempotent
//! account upsert and a one-shot bootstrap login link.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn git_commit_hash_is_hex_or_unknown() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(GIT_COMMIT_HASH.len() >= 7);
    }

    #[test]
    fn app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
