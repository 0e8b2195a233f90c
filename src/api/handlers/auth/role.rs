//! Closed role set and path-based authorization policy.
//!
//! Roles are a closed enum, never free-form strings: every policy site
//! matches exhaustively, and an unknown role string coming out of the
//! database is a parse error, not a silently-granted permission.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Path of the login form; the only redirect target for unauthenticated users.
pub const LOGIN_PATH: &str = "/login";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    HeadOfMarketing,
    Member,
    Client,
    Guest,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::HeadOfMarketing => "head_of_marketing",
            Self::Member => "member",
            Self::Client => "client",
            Self::Guest => "guest",
        }
    }

    /// Parse a stored role string; `None` for anything outside the closed set.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "owner" => Some(Self::Owner),
            "admin" => Some(Self::Admin),
            "head_of_marketing" => Some(Self::HeadOfMarketing),
            "member" => Some(Self::Member),
            "client" => Some(Self::Client),
            "guest" => Some(Self::Guest),
            _ => None,
        }
    }

    /// Default authenticated landing area for the role.
    ///
    /// Authorization failures redirect here, never to the login form and
    /// never to an error page.
    #[must_use]
    pub const fn landing_path(self) -> &'static str {
        match self {
            Self::Owner | Self::Admin => "/admin",
            Self::HeadOfMarketing => "/marketing",
            Self::Member | Self::Client | Self::Guest => "/portal",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const ADMIN_ROLES: &[Role] = &[Role::Owner, Role::Admin];
const MARKETING_ROLES: &[Role] = &[Role::Owner, Role::Admin, Role::HeadOfMarketing];
const PORTAL_ROLES: &[Role] = &[
    Role::Owner,
    Role::Admin,
    Role::HeadOfMarketing,
    Role::Member,
    Role::Client,
    Role::Guest,
];

/// Authorization requirement for a request path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathPolicy {
    /// No session required; the guard passes the request through untouched.
    Public,
    /// Session required and the account role must be in the set.
    Protected(&'static [Role]),
}

/// Resolve the policy for a request path.
#[must_use]
pub fn policy_for_path(path: &str) -> PathPolicy {
    if prefix_match(path, "/admin") {
        PathPolicy::Protected(ADMIN_ROLES)
    } else if prefix_match(path, "/marketing") {
        PathPolicy::Protected(MARKETING_ROLES)
    } else if prefix_match(path, "/portal") {
        PathPolicy::Protected(PORTAL_ROLES)
    } else {
        PathPolicy::Public
    }
}

/// Match a path against a prefix on whole segments only, so `/adminx`
/// does not inherit `/admin` policy.
fn prefix_match(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}
