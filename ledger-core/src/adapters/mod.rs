//! Adapter implementations
//!
//! Concrete implementations of the ledger store port.

pub mod duckdb;
pub mod memory;

pub use self::duckdb::DuckDbStore;
pub use self::memory::MemoryStore;
