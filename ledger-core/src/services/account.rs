//! Account service - registration and lookups

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, AccountKey, NewAccount};
use crate::ports::LedgerStore;

/// Registers accounts and resolves account keys
pub struct AccountService<S> {
    store: Arc<S>,
}

/// Ledger-wide totals
#[derive(Debug, Clone, Serialize)]
pub struct LedgerTotals {
    pub accounts: usize,
    pub transfers: u64,
    pub total_balance: Decimal,
    pub total_opening_balance: Decimal,
}

impl<S: LedgerStore> AccountService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Register a new account with an opening balance
    pub fn register(&self, name: &str, email: &str, initial_balance: Decimal) -> Result<Account> {
        let new = NewAccount::new(name, email, initial_balance)?;
        let account = Account::open(&new);
        self.store.create_account(&account)?;
        tracing::info!(account_id = %account.id, "account registered");
        Ok(account)
    }

    /// Look an account up by id or email, `None` if it does not exist
    pub fn find(&self, key: &AccountKey) -> Result<Option<Account>> {
        match key {
            AccountKey::Id(id) => self.store.get_account(*id),
            AccountKey::Email(email) => self.store.find_account_by_email(email),
        }
    }

    /// Look an account up by id or email
    pub fn get(&self, key: &AccountKey) -> Result<Account> {
        self.find(key)?.ok_or_else(|| Error::account_not_found(key))
    }

    /// All accounts, oldest first
    pub fn list(&self) -> Result<Vec<Account>> {
        self.store.list_accounts()
    }

    /// Sum of all balances
    pub fn total_balance(&self) -> Result<Decimal> {
        self.store.total_balance()
    }

    /// Totals across the whole ledger.
    ///
    /// Transfers conserve money, so `total_balance` always equals
    /// `total_opening_balance`.
    pub fn totals(&self) -> Result<LedgerTotals> {
        let accounts = self.store.list_accounts()?;
        Ok(LedgerTotals {
            accounts: accounts.len(),
            transfers: self.store.transfer_count()?,
            total_balance: self.store.total_balance()?,
            total_opening_balance: accounts.iter().map(|a| a.opening_balance).sum(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;

    fn service() -> AccountService<MemoryStore> {
        AccountService::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_register_and_lookup() {
        let service = service();
        let account = service
            .register("Alice", "alice@example.com", Decimal::new(100, 0))
            .unwrap();

        assert_eq!(service.get(&AccountKey::Id(account.id)).unwrap().email, "alice@example.com");
        assert_eq!(
            service.get(&AccountKey::parse("ALICE@example.com")).unwrap().id,
            account.id
        );
    }

    #[test]
    fn test_register_duplicate_email() {
        let service = service();
        service.register("Alice", "alice@example.com", Decimal::ZERO).unwrap();
        let err = service
            .register("Alice Two", "Alice@Example.com", Decimal::ZERO)
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateIdentifier(_)));
        assert_eq!(service.list().unwrap().len(), 1);
    }

    #[test]
    fn test_get_missing_account() {
        let err = service().get(&AccountKey::parse("ghost")).unwrap_err();
        assert!(matches!(err, Error::AccountNotFound(ref key) if key == "ghost"));
    }

    #[test]
    fn test_totals() {
        let service = service();
        service.register("A", "a@example.com", Decimal::new(100, 0)).unwrap();
        service.register("B", "b@example.com", Decimal::new(2550, 2)).unwrap();

        let totals = service.totals().unwrap();
        assert_eq!(totals.accounts, 2);
        assert_eq!(totals.transfers, 0);
        assert_eq!(totals.total_balance, Decimal::new(12550, 2));
        assert_eq!(totals.total_balance, totals.total_opening_balance);
    }
}
