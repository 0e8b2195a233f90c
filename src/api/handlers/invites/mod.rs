//! Invitation manager: single-use, time-boxed tokens that bootstrap new
//! accounts.
//!
//! Invitation capability tokens are signed with their own secret, distinct
//! from the session secret. Redemption is idempotent on account creation
//! but the `pending -> accepted` status transition is strictly single-use.

mod invites;
mod storage;
pub mod types;

pub use invites::*;
