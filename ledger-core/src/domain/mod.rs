//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
pub mod money;
pub mod result;
mod transfer;

pub use account::{normalize_email, Account, AccountKey, AccountState, NewAccount};
pub use transfer::{Direction, HistoryCursor, TransferRecord, TransferStatus, TransferView};

use chrono::{DateTime, Utc};

/// Current time truncated to the microsecond precision the store keeps
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
}
