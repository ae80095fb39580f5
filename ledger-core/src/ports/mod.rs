//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The ledger
//! services depend only on these traits, not on a concrete database.

mod store;

pub use store::{LedgerScope, LedgerStore};
