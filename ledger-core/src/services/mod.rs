//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod account;
mod history;
pub mod logging;
pub mod migration;
mod transfer;

pub use account::{AccountService, LedgerTotals};
pub use history::{AuditReport, HistoryIter, HistoryService, TransferHistory, DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use transfer::{TransferService, DEFAULT_MAX_ATTEMPTS};
