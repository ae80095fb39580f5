//! Ledger Core - accounts, transfers and transfer history
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core entities (Account, TransferRecord) and money rules
//! - **ports**: The `LedgerStore` trait the services are written against
//! - **services**: Account registration, the transfer engine and history queries
//! - **adapters**: Concrete stores (DuckDB, in-memory)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;

use adapters::DuckDbStore;
use config::Config;
use ports::LedgerStore;
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, OperationResult};
pub use domain::{
    Account, AccountKey, Direction, HistoryCursor, NewAccount, TransferRecord, TransferStatus,
    TransferView,
};
pub use services::{
    AuditReport, EntryPoint, LedgerTotals, LogEntry, LogEvent, LoggingService, TransferHistory,
};

/// File name of the ledger database inside the ledger directory
pub const DB_FILENAME: &str = "ledger.duckdb";

/// Main context for ledger operations
///
/// This is the primary entry point for all business logic. It holds
/// the store, configuration, and all services.
pub struct LedgerContext<S: LedgerStore = DuckDbStore> {
    pub config: Config,
    pub store: Arc<S>,
    pub account_service: AccountService<S>,
    pub transfer_service: TransferService<S>,
    pub history_service: HistoryService<S>,
}

impl LedgerContext<DuckDbStore> {
    /// Open (or create) the ledger in `ledger_dir`
    pub fn open(ledger_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(ledger_dir)?;
        let config = Config::load(ledger_dir)?;

        let store = DuckDbStore::open(&ledger_dir.join(DB_FILENAME))?;
        store.ensure_schema()?;

        Ok(Self::with_store(Arc::new(store), config))
    }
}

impl<S: LedgerStore> LedgerContext<S> {
    /// Wire the services around an existing store
    pub fn with_store(store: Arc<S>, config: Config) -> Self {
        let account_service = AccountService::new(Arc::clone(&store));
        let transfer_service = TransferService::new(Arc::clone(&store), config.max_retries);
        let history_service = HistoryService::new(
            Arc::clone(&store),
            config.history_page_size,
            config.max_retries,
        );

        Self {
            config,
            store,
            account_service,
            transfer_service,
            history_service,
        }
    }

    /// Register a new account with an opening balance
    pub fn register(
        &self,
        name: &str,
        email: &str,
        initial_balance: Decimal,
    ) -> domain::result::Result<Account> {
        self.account_service.register(name, email, initial_balance)
    }

    /// Move `amount` between two accounts
    pub fn transfer(
        &self,
        source: &AccountKey,
        destination: &AccountKey,
        amount: Decimal,
    ) -> domain::result::Result<TransferRecord> {
        self.transfer_service.transfer(source, destination, amount)
    }

    /// Committed transfers involving the account, oldest first
    pub fn history(&self, key: &AccountKey) -> domain::result::Result<TransferHistory<S>> {
        self.history_service.history(key)
    }
}
