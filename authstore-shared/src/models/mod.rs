/// Record models for the three provisioned collections
///
/// # Models
///
/// - `user`: Accounts (`users`)
/// - `token`: Refresh tokens with time-to-live expiry (`tokens`)
/// - `access_log`: Append-only login audit trail (`access_logs`)
///
/// All writes return [`crate::error::StoreError`], so callers can tell a
/// validator rejection from a unique-index collision from any other failure.

pub mod access_log;
pub mod token;
pub mod user;
