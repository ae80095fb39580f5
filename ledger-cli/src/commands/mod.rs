//! CLI command implementations

pub mod accounts;
pub mod audit;
pub mod history;
pub mod logs;
pub mod register;
pub mod show;
pub mod transfer;

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use rust_decimal::Decimal;
use serde::Serialize;

use ledger_core::domain::result::Result as LedgerResult;
use ledger_core::{EntryPoint, Error, LedgerContext, LogEvent, LoggingService, OperationResult};

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    let ledger_dir = get_ledger_dir().ok()?;
    std::fs::create_dir_all(&ledger_dir).ok()?;
    match LoggingService::new(&ledger_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")) {
        Ok(logger) => Some(logger),
        Err(e) => {
            tracing::debug!(error = %e, "event log unavailable");
            None
        }
    }
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        if let Err(e) = l.log(event) {
            tracing::debug!(error = %e, "failed to record event");
        }
    }
}

/// Log a command invocation, ignoring any errors
pub fn log_command(logger: &Option<LoggingService>, command: &str) {
    if let Some(l) = logger {
        if let Err(e) = l.log_command(command) {
            tracing::debug!(error = %e, "failed to record command");
        }
    }
}

/// Log a failed operation, ignoring any errors
pub fn log_error(logger: &Option<LoggingService>, event: &str, error: &Error) {
    if let Some(l) = logger {
        if let Err(e) = l.log_error(event, error) {
            tracing::debug!(error = %e, "failed to record error");
        }
    }
}

/// Get the ledger directory from `LEDGER_DIR` or default to `~/.ledger`
pub fn get_ledger_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("LEDGER_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".ledger"))
        .ok_or_else(|| anyhow!("Could not find home directory; set LEDGER_DIR"))
}

/// Open the ledger context
pub fn get_context() -> Result<LedgerContext> {
    let ledger_dir = get_ledger_dir()?;
    LedgerContext::open(&ledger_dir)
        .with_context(|| format!("Failed to open ledger in {}", ledger_dir.display()))
}

/// Parse a user-supplied amount
pub fn parse_amount(input: &str) -> LedgerResult<Decimal> {
    input
        .trim()
        .parse::<Decimal>()
        .map_err(|_| Error::invalid_amount(format!("'{}' is not a number", input.trim())))
}

/// Print the outcome of a ledger operation.
///
/// With `json` the result is printed as an `OperationResult` envelope,
/// otherwise `render` prints the success case. Failures are returned so the
/// process exits non-zero.
pub fn report<T: Serialize>(
    result: LedgerResult<T>,
    json: bool,
    render: impl FnOnce(&T),
) -> Result<()> {
    match result {
        Ok(data) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&OperationResult::ok(data))?);
            } else {
                render(&data);
            }
            Ok(())
        }
        Err(err) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&OperationResult::<T>::fail(&err))?);
            }
            Err(err.into())
        }
    }
}
