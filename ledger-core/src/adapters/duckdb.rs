//! DuckDB ledger store

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use duckdb::{params, Connection, OptionalExt};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{now, Account, AccountState, HistoryCursor, TransferRecord, TransferStatus};
use crate::migrations::MIGRATIONS;
use crate::ports::{LedgerScope, LedgerStore};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of attempts when the database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

const ACCOUNT_COLUMNS: &str = "account_id, name, email, balance::VARCHAR, opening_balance::VARCHAR,
     version, created_at_us, updated_at_us";

const TRANSFER_COLUMNS: &str = "transfer_id, sequence, source_id, destination_id, amount::VARCHAR,
     created_at_us, status";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("could not set lock on file")
}

fn is_constraint_violation(err: &duckdb::Error) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains("duplicate key") || msg.contains("unique constraint") || msg.contains("primary key")
}

fn is_write_conflict(err: &duckdb::Error) -> bool {
    err.to_string().to_lowercase().contains("conflict")
}

/// DuckDB implementation of `LedgerStore`
///
/// One connection guarded by a mutex; an atomic scope is a DuckDB
/// transaction held for the duration of the closure.
pub struct DuckDbStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbStore {
    /// Open (or create) the ledger database at `db_path`
    ///
    /// Retries with exponential backoff while another process holds the
    /// file lock.
    pub fn open(db_path: &Path) -> Result<Self> {
        let mut attempt = 0;
        loop {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    })
                }
                Err(e) if attempt + 1 < MAX_RETRIES && is_retryable_error(&e.to_string()) => {
                    let delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                    tracing::warn!(
                        attempt = attempt + 1,
                        max = MAX_RETRIES,
                        delay_ms = delay.as_millis() as u64,
                        "ledger database busy, retrying: {}",
                        e
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Open a throwaway in-memory database (tests, dry runs)
    pub fn open_in_memory() -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_in_memory_with_flags(config)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    fn try_open_connection(db_path: &Path) -> duckdb::Result<Connection> {
        // Extension autoloading stays off; nothing here needs extensions
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Connection::open_with_flags(db_path, config)
    }

    /// Path of the database file, `None` for in-memory stores
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::storage(format!("Lock poisoned: {}", e)))
    }

    /// Run any pending schema migrations
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.conn()?;
        MigrationService::new(&conn, MIGRATIONS).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        let result = self.run_migrations()?;
        if !result.applied.is_empty() {
            tracing::info!(applied = ?result.applied, "ledger schema migrated");
        }
        Ok(())
    }

    fn row_to_account(row: &duckdb::Row) -> duckdb::Result<RawAccount> {
        Ok(RawAccount {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            balance: row.get(3)?,
            opening_balance: row.get(4)?,
            version: row.get(5)?,
            created_at_us: row.get(6)?,
            updated_at_us: row.get(7)?,
        })
    }

    fn row_to_transfer(row: &duckdb::Row) -> duckdb::Result<RawTransfer> {
        Ok(RawTransfer {
            id: row.get(0)?,
            sequence: row.get(1)?,
            source_id: row.get(2)?,
            destination_id: row.get(3)?,
            amount: row.get(4)?,
            created_at_us: row.get(5)?,
            status: row.get(6)?,
        })
    }

    fn query_one_account(&self, filter: &str, key: &str) -> Result<Option<Account>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM ledger_accounts WHERE {} = ?", ACCOUNT_COLUMNS, filter);
        let raw = conn
            .query_row(&sql, params![key], Self::row_to_account)
            .optional()?;
        raw.map(RawAccount::into_account).transpose()
    }
}

/// Account row as read from DuckDB, before parsing ids and decimals
struct RawAccount {
    id: String,
    name: String,
    email: String,
    balance: String,
    opening_balance: String,
    version: i64,
    created_at_us: i64,
    updated_at_us: i64,
}

impl RawAccount {
    fn into_account(self) -> Result<Account> {
        Ok(Account {
            id: parse_uuid(&self.id)?,
            name: self.name,
            email: self.email,
            balance: parse_decimal(&self.balance)?,
            opening_balance: parse_decimal(&self.opening_balance)?,
            version: self.version,
            created_at: parse_micros(self.created_at_us)?,
            updated_at: parse_micros(self.updated_at_us)?,
        })
    }
}

/// Transfer row as read from DuckDB
struct RawTransfer {
    id: String,
    sequence: i64,
    source_id: String,
    destination_id: String,
    amount: String,
    created_at_us: i64,
    status: String,
}

impl RawTransfer {
    fn into_record(self) -> Result<TransferRecord> {
        let status = TransferStatus::parse(&self.status)
            .ok_or_else(|| Error::storage(format!("unknown transfer status {:?}", self.status)))?;
        Ok(TransferRecord {
            id: parse_uuid(&self.id)?,
            sequence: self.sequence,
            source_id: parse_uuid(&self.source_id)?,
            destination_id: parse_uuid(&self.destination_id)?,
            amount: parse_decimal(&self.amount)?,
            created_at: parse_micros(self.created_at_us)?,
            status,
        })
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::storage(format!("corrupt id {:?}: {}", s, e)))
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str(s).map_err(|e| Error::storage(format!("corrupt amount {:?}: {}", s, e)))
}

fn parse_micros(us: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(us)
        .ok_or_else(|| Error::storage(format!("timestamp out of range: {}", us)))
}

/// Scope over an open DuckDB transaction
struct DuckDbScope<'a> {
    conn: &'a Connection,
}

impl LedgerScope for DuckDbScope<'_> {
    fn read_account(&self, id: Uuid) -> Result<Option<AccountState>> {
        let row = self
            .conn
            .query_row(
                "SELECT balance::VARCHAR, version FROM ledger_accounts WHERE account_id = ?",
                params![id.to_string()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;
        row.map(|(balance, version)| {
            Ok(AccountState {
                id,
                balance: parse_decimal(&balance)?,
                version,
            })
        })
        .transpose()
    }

    fn write_account_if_version(
        &self,
        id: Uuid,
        expected_version: i64,
        new_balance: Decimal,
    ) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE ledger_accounts
                 SET balance = CAST(? AS DECIMAL(18, 2)), version = version + 1, updated_at_us = ?
                 WHERE account_id = ? AND version = ?",
                params![
                    new_balance.to_string(),
                    now().timestamp_micros(),
                    id.to_string(),
                    expected_version
                ],
            )
            .map_err(|e| {
                if is_write_conflict(&e) {
                    Error::VersionConflict {
                        account: id,
                        expected: expected_version,
                    }
                } else {
                    e.into()
                }
            })?;

        if changed == 1 {
            return Ok(());
        }
        match self.read_account(id)? {
            Some(_) => Err(Error::VersionConflict {
                account: id,
                expected: expected_version,
            }),
            None => Err(Error::account_not_found(id)),
        }
    }

    fn append_transfer(&self, record: &TransferRecord) -> Result<TransferRecord> {
        let (sequence, latest_us): (i64, Option<i64>) = self.conn.query_row(
            "SELECT COALESCE(MAX(sequence), 0) + 1, MAX(created_at_us) FROM ledger_transfers",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let created_at_us = record
            .created_at
            .timestamp_micros()
            .max(latest_us.unwrap_or(i64::MIN));
        self.conn.execute(
            "INSERT INTO ledger_transfers (transfer_id, sequence, source_id, destination_id,
                                           amount, created_at_us, status)
             VALUES (?, ?, ?, ?, CAST(? AS DECIMAL(18, 2)), ?, ?)",
            params![
                record.id.to_string(),
                sequence,
                record.source_id.to_string(),
                record.destination_id.to_string(),
                record.amount.to_string(),
                created_at_us,
                record.status.as_str(),
            ],
        )?;
        Ok(TransferRecord {
            sequence,
            created_at: parse_micros(created_at_us)?,
            ..record.clone()
        })
    }
}

impl LedgerStore for DuckDbStore {
    fn run_atomically<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn LedgerScope) -> Result<T>,
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let outcome = f(&DuckDbScope { conn: &tx });
        match outcome {
            Ok(value) => {
                tx.commit().map_err(|e| {
                    if is_write_conflict(&e) {
                        Error::storage(format!("commit aborted by concurrent writer: {}", e))
                    } else {
                        e.into()
                    }
                })?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    tracing::warn!("rollback after failed scope also failed: {}", rollback_err);
                }
                Err(err)
            }
        }
    }

    fn create_account(&self, account: &Account) -> Result<()> {
        let conn = self.conn()?;
        let taken: i64 = conn.query_row(
            "SELECT COUNT(*) FROM ledger_accounts WHERE account_id = ? OR email = ?",
            params![account.id.to_string(), account.email],
            |row| row.get(0),
        )?;
        if taken > 0 {
            return Err(Error::DuplicateIdentifier(account.email.clone()));
        }
        conn.execute(
            "INSERT INTO ledger_accounts (account_id, name, email, balance, opening_balance,
                                          version, created_at_us, updated_at_us)
             VALUES (?, ?, ?, CAST(? AS DECIMAL(18, 2)), CAST(? AS DECIMAL(18, 2)), ?, ?, ?)",
            params![
                account.id.to_string(),
                account.name,
                account.email,
                account.balance.to_string(),
                account.opening_balance.to_string(),
                account.version,
                account.created_at.timestamp_micros(),
                account.updated_at.timestamp_micros(),
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                Error::DuplicateIdentifier(account.email.clone())
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    fn get_account(&self, id: Uuid) -> Result<Option<Account>> {
        self.query_one_account("account_id", &id.to_string())
    }

    fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        self.query_one_account("email", email)
    }

    fn list_accounts(&self) -> Result<Vec<Account>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM ledger_accounts ORDER BY created_at_us, account_id",
            ACCOUNT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], Self::row_to_account)?
            .collect::<duckdb::Result<Vec<RawAccount>>>()?;
        rows.into_iter().map(RawAccount::into_account).collect()
    }

    fn total_balance(&self) -> Result<Decimal> {
        let conn = self.conn()?;
        let total: String = conn.query_row(
            "SELECT COALESCE(SUM(balance), 0)::VARCHAR FROM ledger_accounts",
            [],
            |row| row.get(0),
        )?;
        parse_decimal(&total)
    }

    fn read_account(&self, id: Uuid) -> Result<Option<AccountState>> {
        let conn = self.conn()?;
        DuckDbScope { conn: &conn }.read_account(id)
    }

    fn transfers_page(
        &self,
        account_id: Uuid,
        after: Option<HistoryCursor>,
        limit: usize,
    ) -> Result<Vec<TransferRecord>> {
        let cursor = after.unwrap_or(HistoryCursor {
            created_at_us: i64::MIN,
            sequence: i64::MIN,
        });
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM ledger_transfers
             WHERE (source_id = ? OR destination_id = ?)
               AND (created_at_us > ? OR (created_at_us = ? AND sequence > ?))
             ORDER BY created_at_us, sequence
             LIMIT ?",
            TRANSFER_COLUMNS
        );
        let limit = i64::try_from(limit)
            .map_err(|_| Error::Config(format!("history page size {} is too large", limit)))?;
        let id = account_id.to_string();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![
                    id,
                    id,
                    cursor.created_at_us,
                    cursor.created_at_us,
                    cursor.sequence,
                    limit
                ],
                Self::row_to_transfer,
            )?
            .collect::<duckdb::Result<Vec<RawTransfer>>>()?;
        rows.into_iter().map(RawTransfer::into_record).collect()
    }

    fn transfer_count(&self) -> Result<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM ledger_transfers", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
