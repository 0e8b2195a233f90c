//! API handlers and shared utilities.

pub mod auth;
pub mod console;
pub mod health;
pub mod invites;

use regex::Regex;
use std::time::SystemTime;

/// Lightweight email sanity check used before persisting or matching data.
#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

/// Unix seconds for token lifetimes.
#[must_use]
pub fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
