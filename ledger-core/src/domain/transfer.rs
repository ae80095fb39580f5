//! Transfer record domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a transfer record.
///
/// Only committed transfers are ever written to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Committed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Committed => "committed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "committed" => Some(TransferStatus::Committed),
            _ => None,
        }
    }
}

/// An immutable entry in the transaction log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: Uuid,
    /// Position in the log, assigned on append (0 until then)
    pub sequence: i64,
    pub source_id: Uuid,
    pub destination_id: Uuid,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub status: TransferStatus,
}

impl TransferRecord {
    /// Create a record for a transfer about to be committed
    pub fn new(source_id: Uuid, destination_id: Uuid, amount: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence: 0,
            source_id,
            destination_id,
            amount,
            created_at: super::now(),
            status: TransferStatus::Committed,
        }
    }

    /// Whether the account is the source or the destination of this transfer
    pub fn involves(&self, account_id: Uuid) -> bool {
        self.source_id == account_id || self.destination_id == account_id
    }

    /// Position of this record in history order
    pub fn cursor(&self) -> HistoryCursor {
        HistoryCursor {
            created_at_us: self.created_at.timestamp_micros(),
            sequence: self.sequence,
        }
    }
}

/// Keyset position within an account's history: records strictly after
/// this (timestamp, sequence) pair come next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HistoryCursor {
    pub created_at_us: i64,
    pub sequence: i64,
}

/// Direction of a transfer relative to the account whose history is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

/// A transfer as seen from one account, with the counterparty filled in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferView {
    pub transfer_id: Uuid,
    pub direction: Direction,
    pub amount: Decimal,
    pub counterparty_id: Uuid,
    pub counterparty_name: String,
    pub counterparty_email: String,
    pub created_at: DateTime<Utc>,
}
