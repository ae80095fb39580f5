//! Ledger store port - account store and transaction log abstraction

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{Account, AccountState, HistoryCursor, TransferRecord};

/// Operations available inside one atomic scope.
///
/// Everything done through a scope becomes visible together when the scope
/// commits, or not at all.
pub trait LedgerScope {
    /// Read an account's balance and version as seen by this scope
    fn read_account(&self, id: Uuid) -> Result<Option<AccountState>>;

    /// Set an account's balance if its version still equals `expected_version`.
    ///
    /// Fails with `VersionConflict` when another writer got there first and
    /// with `AccountNotFound` when the account does not exist. On success the
    /// stored version becomes `expected_version + 1`.
    fn write_account_if_version(
        &self,
        id: Uuid,
        expected_version: i64,
        new_balance: Decimal,
    ) -> Result<()>;

    /// Append a committed transfer to the log and return it as stored.
    ///
    /// The stored record carries the next sequence number. Its timestamp is
    /// raised to the latest one already in the log if the clock went
    /// backwards, so timestamp order and sequence order never disagree.
    fn append_transfer(&self, record: &TransferRecord) -> Result<TransferRecord>;
}

/// Durable ledger storage: the account store plus the transaction log.
///
/// Implementations must be safe to share between threads; all methods are
/// blocking.
pub trait LedgerStore: Send + Sync {
    /// Run `f` so that all of its scope calls commit together or not at all.
    ///
    /// An `Err` from `f` aborts the scope and is returned unchanged.
    fn run_atomically<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn LedgerScope) -> Result<T>;

    // === Accounts ===

    /// Insert a new account; `DuplicateIdentifier` if the id or email is taken
    fn create_account(&self, account: &Account) -> Result<()>;

    /// Get account by ID
    fn get_account(&self, id: Uuid) -> Result<Option<Account>>;

    /// Get account by its (normalized) email
    fn find_account_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// All accounts, oldest first
    fn list_accounts(&self) -> Result<Vec<Account>>;

    /// Sum of all account balances
    fn total_balance(&self) -> Result<Decimal>;

    /// Current balance and version, outside of any scope
    fn read_account(&self, id: Uuid) -> Result<Option<AccountState>> {
        Ok(self.get_account(id)?.map(|account| account.state()))
    }

    // === Transfers ===

    /// Up to `limit` transfers involving `account_id`, ordered by
    /// (timestamp, sequence), starting strictly after `after`.
    fn transfers_page(
        &self,
        account_id: Uuid,
        after: Option<HistoryCursor>,
        limit: usize,
    ) -> Result<Vec<TransferRecord>>;

    /// Total number of records in the log
    fn transfer_count(&self) -> Result<u64>;
}
