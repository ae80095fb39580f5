//! Result and error types for the core library


use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Core library error type
///
/// Validation failures (`InvalidAmount`, `SelfTransfer`, `AccountNotFound`,
/// `InsufficientFunds`, `DuplicateIdentifier`, `Validation`) are terminal.
/// `VersionConflict` is transient and only escapes the transfer engine as
/// `Retryable`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Cannot transfer from an account to itself")]
    SelfTransfer,

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Insufficient funds in account {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account: Uuid,
        balance: Decimal,
        requested: Decimal,
    },

    #[error("Duplicate identifier: {0}")]
    DuplicateIdentifier(String),

    #[error("Version conflict on account {account} (expected version {expected})")]
    VersionConflict { account: Uuid, expected: i64 },

    #[error("Transfer could not be applied after {attempts} attempts; retry later")]
    Retryable { attempts: u32 },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create an account-not-found error for the given key
    pub fn account_not_found(key: impl ToString) -> Self {
        Self::AccountNotFound(key.to_string())
    }

    /// Create an invalid amount error
    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::InvalidAmount(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Stable machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidAmount(_) => "invalid_amount",
            Error::SelfTransfer => "self_transfer",
            Error::AccountNotFound(_) => "account_not_found",
            Error::InsufficientFunds { .. } => "insufficient_funds",
            Error::DuplicateIdentifier(_) => "duplicate_identifier",
            Error::VersionConflict { .. } => "version_conflict",
            Error::Retryable { .. } => "retryable",
            Error::Storage(_) => "storage_error",
            Error::Validation(_) => "validation",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
        }
    }

    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::VersionConflict { .. } | Error::Retryable { .. })
    }
}

impl From<duckdb::Error> for Error {
    fn from(err: duckdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Operation result envelope (for JSON output)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl<T> OperationResult<T> {
    /// Create a successful result
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
        }
    }

    /// Create a failed result from a core error
    pub fn fail(error: &Error) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind().to_string()),
        }
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::fail(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_result_ok() {
        let result: OperationResult<i32> = OperationResult::ok(42);
        assert!(result.success);
        assert_eq!(result.data, Some(42));
        assert!(result.error.is_none());
        assert!(result.error_kind.is_none());
    }

    #[test]
    fn test_from_result_carries_kind() {
        let err: Result<i32> = Err(Error::SelfTransfer);
        let result: OperationResult<i32> = err.into();
        assert!(!result.success);
        assert_eq!(result.error_kind.as_deref(), Some("self_transfer"));
        assert!(result.error.unwrap().contains("itself"));
    }

    #[test]
    fn test_retryable_classification() {
        let conflict = Error::VersionConflict {
            account: Uuid::new_v4(),
            expected: 3,
        };
        assert!(conflict.is_retryable());
        assert!(Error::Retryable { attempts: 3 }.is_retryable());
        assert!(!Error::SelfTransfer.is_retryable());
        assert!(!Error::storage("disk full").is_retryable());
    }

    #[test]
    fn test_failed_result_serializes_kind() {
        let result: OperationResult<()> =
            OperationResult::fail(&Error::account_not_found("ghost"));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error_kind"], "account_not_found");
    }
}
