//! In-memory ledger store
//!
//! Keeps accounts and the transaction log in process memory. An atomic scope
//! holds the state lock, stages its writes, and applies them only when the
//! closure returns `Ok`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{now, Account, AccountState, HistoryCursor, TransferRecord};
use crate::ports::{LedgerScope, LedgerStore};

#[derive(Debug, Default)]
struct MemoryState {
    accounts: HashMap<Uuid, Account>,
    emails: HashMap<String, Uuid>,
    transfers: Vec<TransferRecord>,
    last_sequence: i64,
}

/// Process-local `LedgerStore`
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| Error::storage(format!("Lock poisoned: {}", e)))
    }
}

/// Writes staged by one scope
#[derive(Default)]
struct Staged {
    balances: HashMap<Uuid, AccountState>,
    transfers: Vec<TransferRecord>,
}

struct MemoryScope<'a> {
    state: &'a MemoryState,
    staged: RefCell<Staged>,
}

impl MemoryScope<'_> {
    fn current(&self, id: Uuid) -> Option<AccountState> {
        if let Some(state) = self.staged.borrow().balances.get(&id) {
            return Some(*state);
        }
        self.state.accounts.get(&id).map(Account::state)
    }
}

impl LedgerScope for MemoryScope<'_> {
    fn read_account(&self, id: Uuid) -> Result<Option<AccountState>> {
        Ok(self.current(id))
    }

    fn write_account_if_version(
        &self,
        id: Uuid,
        expected_version: i64,
        new_balance: Decimal,
    ) -> Result<()> {
        let current = self.current(id).ok_or_else(|| Error::account_not_found(id))?;
        if current.version != expected_version {
            return Err(Error::VersionConflict {
                account: id,
                expected: expected_version,
            });
        }
        if new_balance < Decimal::ZERO {
            return Err(Error::storage(format!(
                "balance of account {} would become negative",
                id
            )));
        }
        self.staged.borrow_mut().balances.insert(
            id,
            AccountState {
                id,
                balance: new_balance,
                version: expected_version + 1,
            },
        );
        Ok(())
    }

    fn append_transfer(&self, record: &TransferRecord) -> Result<TransferRecord> {
        let mut staged = self.staged.borrow_mut();
        if self.state.transfers.iter().any(|t| t.id == record.id)
            || staged.transfers.iter().any(|t| t.id == record.id)
        {
            return Err(Error::storage(format!(
                "transfer {} is already in the log",
                record.id
            )));
        }
        let latest = staged
            .transfers
            .last()
            .or_else(|| self.state.transfers.last())
            .map(|t| t.created_at);
        let mut stored = record.clone();
        stored.sequence = self.state.last_sequence + staged.transfers.len() as i64 + 1;
        if let Some(latest) = latest {
            stored.created_at = stored.created_at.max(latest);
        }
        staged.transfers.push(stored.clone());
        Ok(stored)
    }
}

impl LedgerStore for MemoryStore {
    fn run_atomically<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn LedgerScope) -> Result<T>,
    {
        let mut state = self.state()?;
        let scope = MemoryScope {
            state: &state,
            staged: RefCell::new(Staged::default()),
        };
        let value = f(&scope)?;
        let staged = scope.staged.into_inner();

        let updated_at = now();
        for (id, account_state) in staged.balances {
            if let Some(account) = state.accounts.get_mut(&id) {
                account.balance = account_state.balance;
                account.version = account_state.version;
                account.updated_at = updated_at;
            }
        }
        for record in staged.transfers {
            state.last_sequence = record.sequence;
            state.transfers.push(record);
        }
        Ok(value)
    }

    fn create_account(&self, account: &Account) -> Result<()> {
        let mut state = self.state()?;
        if state.accounts.contains_key(&account.id) {
            return Err(Error::DuplicateIdentifier(account.id.to_string()));
        }
        if state.emails.contains_key(&account.email) {
            return Err(Error::DuplicateIdentifier(account.email.clone()));
        }
        state.emails.insert(account.email.clone(), account.id);
        state.accounts.insert(account.id, account.clone());
        Ok(())
    }

    fn get_account(&self, id: Uuid) -> Result<Option<Account>> {
        Ok(self.state()?.accounts.get(&id).cloned())
    }

    fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let state = self.state()?;
        Ok(state
            .emails
            .get(email)
            .and_then(|id| state.accounts.get(id))
            .cloned())
    }

    fn list_accounts(&self) -> Result<Vec<Account>> {
        let mut accounts: Vec<Account> = self.state()?.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(accounts)
    }

    fn total_balance(&self) -> Result<Decimal> {
        Ok(self.state()?.accounts.values().map(|a| a.balance).sum())
    }

    fn transfers_page(
        &self,
        account_id: Uuid,
        after: Option<HistoryCursor>,
        limit: usize,
    ) -> Result<Vec<TransferRecord>> {
        let state = self.state()?;
        let mut page: Vec<TransferRecord> = state
            .transfers
            .iter()
            .filter(|t| t.involves(account_id))
            .filter(|t| after.map_or(true, |cursor| t.cursor() > cursor))
            .cloned()
            .collect();
        page.sort_by_key(TransferRecord::cursor);
        page.truncate(limit);
        Ok(page)
    }

    fn transfer_count(&self) -> Result<u64> {
        Ok(self.state()?.transfers.len() as u64)
    }
}
