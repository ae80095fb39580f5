//! History service - read side of the ledger
//!
//! `history` hands out a lazy, restartable sequence of transfer records for
//! one account. Records are fetched from the store a page at a time using a
//! (timestamp, sequence) keyset cursor, so long histories never have to be
//! loaded at once.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, AccountKey, Direction, HistoryCursor, TransferRecord, TransferView};
use crate::ports::LedgerStore;

/// Records fetched per store round-trip unless configured otherwise
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Largest page a single store round-trip may fetch
pub const MAX_PAGE_SIZE: usize = 10_000;

/// Read-side façade over accounts and the transaction log
pub struct HistoryService<S> {
    store: Arc<S>,
    page_size: usize,
    max_attempts: u32,
}

/// All committed transfers involving one account, in timestamp order.
///
/// Iterating does not consume the history: every call to [`iter`] starts
/// again from the oldest record.
///
/// [`iter`]: TransferHistory::iter
pub struct TransferHistory<S> {
    store: Arc<S>,
    account_id: Uuid,
    page_size: usize,
}

impl<S: LedgerStore> TransferHistory<S> {
    /// Iterate from the oldest record
    pub fn iter(&self) -> HistoryIter<'_, S> {
        HistoryIter {
            history: self,
            buffer: VecDeque::new(),
            cursor: None,
            exhausted: false,
        }
    }
}

impl<'a, S: LedgerStore> IntoIterator for &'a TransferHistory<S> {
    type Item = Result<TransferRecord>;
    type IntoIter = HistoryIter<'a, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazily pages through a [`TransferHistory`]
pub struct HistoryIter<'a, S> {
    history: &'a TransferHistory<S>,
    buffer: VecDeque<TransferRecord>,
    cursor: Option<HistoryCursor>,
    exhausted: bool,
}

impl<S: LedgerStore> HistoryIter<'_, S> {
    fn fill(&mut self) -> Result<()> {
        let page = self.history.store.transfers_page(
            self.history.account_id,
            self.cursor,
            self.history.page_size,
        )?;
        if page.len() < self.history.page_size {
            self.exhausted = true;
        }
        if let Some(last) = page.last() {
            self.cursor = Some(last.cursor());
        }
        self.buffer.extend(page);
        Ok(())
    }
}

impl<S: LedgerStore> Iterator for HistoryIter<'_, S> {
    type Item = Result<TransferRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(err) = self.fill() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

/// Result of replaying an account's history against its balance
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub account_id: Uuid,
    pub opening_balance: Decimal,
    pub total_received: Decimal,
    pub total_sent: Decimal,
    pub expected_balance: Decimal,
    pub actual_balance: Decimal,
    pub transfers: usize,
    pub consistent: bool,
}

impl<S: LedgerStore> HistoryService<S> {
    pub fn new(store: Arc<S>, page_size: usize, max_attempts: u32) -> Self {
        Self {
            store,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            max_attempts: max_attempts.max(1),
        }
    }

    fn account(&self, key: &AccountKey) -> Result<Account> {
        let account = match key {
            AccountKey::Id(id) => self.store.get_account(*id)?,
            AccountKey::Email(email) => self.store.find_account_by_email(email)?,
        };
        account.ok_or_else(|| Error::account_not_found(key))
    }

    /// Transfers where the account is source or destination, oldest first.
    ///
    /// Fails with `AccountNotFound` up front; the returned sequence is lazy.
    pub fn history(&self, key: &AccountKey) -> Result<TransferHistory<S>> {
        let account = self.account(key)?;
        Ok(TransferHistory {
            store: Arc::clone(&self.store),
            account_id: account.id,
            page_size: self.page_size,
        })
    }

    /// History with the counterparty of each transfer resolved
    pub fn statement(&self, key: &AccountKey) -> Result<Vec<TransferView>> {
        let account = self.account(key)?;
        let history = self.history(&AccountKey::Id(account.id))?;
        let mut counterparties: HashMap<Uuid, Account> = HashMap::new();
        let mut views = Vec::new();

        for record in &history {
            let record = record?;
            let (direction, other) = if record.source_id == account.id {
                (Direction::Sent, record.destination_id)
            } else {
                (Direction::Received, record.source_id)
            };
            if !counterparties.contains_key(&other) {
                let found = self
                    .store
                    .get_account(other)?
                    .ok_or_else(|| Error::storage(format!("transfer {} references missing account {}", record.id, other)))?;
                counterparties.insert(other, found);
            }
            let counterparty = &counterparties[&other];
            views.push(TransferView {
                transfer_id: record.id,
                direction,
                amount: record.amount,
                counterparty_id: other,
                counterparty_name: counterparty.name.clone(),
                counterparty_email: counterparty.email.clone(),
                created_at: record.created_at,
            });
        }

        Ok(views)
    }

    /// Replay the account's history and compare with its stored balance.
    ///
    /// The replay is only trusted if the account's version is unchanged
    /// afterwards; a transfer committing in between restarts it. Gives up
    /// with `Retryable` after the configured number of attempts.
    pub fn verify(&self, key: &AccountKey) -> Result<AuditReport> {
        let id = self.account(key)?.id;

        for attempt in 1..=self.max_attempts {
            let account = self
                .store
                .get_account(id)?
                .ok_or_else(|| Error::account_not_found(id))?;
            let report = self.replay(&account)?;

            let after = self
                .store
                .read_account(id)?
                .ok_or_else(|| Error::account_not_found(id))?;
            if after.version == account.version {
                return Ok(report);
            }
            tracing::debug!(attempt, account_id = %id, "account changed during audit, replaying");
        }

        Err(Error::Retryable {
            attempts: self.max_attempts,
        })
    }

    fn replay(&self, account: &Account) -> Result<AuditReport> {
        let mut total_received = Decimal::ZERO;
        let mut total_sent = Decimal::ZERO;
        let mut transfers = 0;

        for record in &self.history(&AccountKey::Id(account.id))? {
            let record = record?;
            if record.source_id == account.id {
                total_sent += record.amount;
            } else {
                total_received += record.amount;
            }
            transfers += 1;
        }

        let expected_balance = account.opening_balance + total_received - total_sent;
        Ok(AuditReport {
            account_id: account.id,
            opening_balance: account.opening_balance,
            total_received,
            total_sent,
            expected_balance,
            actual_balance: account.balance,
            transfers,
            consistent: expected_balance == account.balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::adapters::MemoryStore;
    use crate::ports::LedgerScope;
    use crate::services::{AccountService, TransferService};

    struct Fixture {
        accounts: AccountService<MemoryStore>,
        transfers: TransferService<MemoryStore>,
        history: HistoryService<MemoryStore>,
    }

    fn fixture(page_size: usize) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        Fixture {
            accounts: AccountService::new(Arc::clone(&store)),
            transfers: TransferService::new(Arc::clone(&store), 3),
            history: HistoryService::new(store, page_size, 3),
        }
    }

    #[test]
    fn test_history_pages_lazily_and_restarts() {
        let f = fixture(2);
        let a = f.accounts.register("A", "a@example.com", Decimal::new(100, 0)).unwrap();
        let b = f.accounts.register("B", "b@example.com", Decimal::ZERO).unwrap();
        let c = f.accounts.register("C", "c@example.com", Decimal::ZERO).unwrap();

        for _ in 0..3 {
            f.transfers.transfer(&a.id.into(), &b.id.into(), Decimal::ONE).unwrap();
        }
        f.transfers.transfer(&b.id.into(), &c.id.into(), Decimal::ONE).unwrap();
        f.transfers.transfer(&c.id.into(), &a.id.into(), Decimal::ONE).unwrap();

        let history = f.history.history(&a.id.into()).unwrap();
        let first: Vec<TransferRecord> = history.iter().collect::<Result<_>>().unwrap();
        let second: Vec<TransferRecord> = history.iter().collect::<Result<_>>().unwrap();

        assert_eq!(first.len(), 4);
        assert_eq!(first, second);
        assert!(first.windows(2).all(|w| w[0].cursor() < w[1].cursor()));
        assert!(first.iter().all(|t| t.involves(a.id)));
    }

    #[test]
    fn test_history_unknown_account() {
        let f = fixture(10);
        assert!(matches!(
            f.history.history(&AccountKey::parse("ghost@example.com")),
            Err(Error::AccountNotFound(_))
        ));
    }

    #[test]
    fn test_history_empty_account() {
        let f = fixture(10);
        let a = f.accounts.register("A", "a@example.com", Decimal::ZERO).unwrap();
        let history = f.history.history(&a.id.into()).unwrap();
        assert_eq!(history.iter().count(), 0);
    }

    #[test]
    fn test_statement_resolves_counterparties() {
        let f = fixture(10);
        let a = f.accounts.register("Alice", "alice@example.com", Decimal::new(100, 0)).unwrap();
        let b = f.accounts.register("Bob", "bob@example.com", Decimal::ZERO).unwrap();
        f.transfers.transfer(&a.id.into(), &b.id.into(), Decimal::new(40, 0)).unwrap();
        f.transfers.transfer(&b.id.into(), &a.id.into(), Decimal::new(15, 0)).unwrap();

        let statement = f.history.statement(&AccountKey::parse("bob@example.com")).unwrap();

        assert_eq!(statement.len(), 2);
        assert_eq!(statement[0].direction, Direction::Received);
        assert_eq!(statement[0].counterparty_name, "Alice");
        assert_eq!(statement[1].direction, Direction::Sent);
        assert_eq!(statement[1].amount, Decimal::new(15, 0));
    }

    #[test]
    fn test_verify_replays_balance() {
        let f = fixture(1);
        let a = f.accounts.register("A", "a@example.com", Decimal::new(100, 0)).unwrap();
        let b = f.accounts.register("B", "b@example.com", Decimal::new(5, 0)).unwrap();
        f.transfers.transfer(&a.id.into(), &b.id.into(), Decimal::new(40, 0)).unwrap();
        f.transfers.transfer(&b.id.into(), &a.id.into(), Decimal::new(10, 0)).unwrap();

        let report = f.history.verify(&a.id.into()).unwrap();
        assert!(report.consistent);
        assert_eq!(report.transfers, 2);
        assert_eq!(report.total_sent, Decimal::new(40, 0));
        assert_eq!(report.total_received, Decimal::new(10, 0));
        assert_eq!(report.actual_balance, Decimal::new(70, 0));
    }

    #[test]
    fn test_oversized_page_is_clamped() {
        let store = Arc::new(MemoryStore::new());
        let accounts = AccountService::new(Arc::clone(&store));
        let transfers = TransferService::new(Arc::clone(&store), 3);
        let history = HistoryService::new(Arc::clone(&store), usize::MAX, 3);
        let a = accounts.register("A", "a@example.com", Decimal::new(10, 0)).unwrap();
        let b = accounts.register("B", "b@example.com", Decimal::ZERO).unwrap();
        transfers.transfer(&a.id.into(), &b.id.into(), Decimal::ONE).unwrap();

        let records: Vec<TransferRecord> =
            history.history(&a.id.into()).unwrap().iter().collect::<Result<_>>().unwrap();
        assert_eq!(records.len(), 1);
        assert!(history.verify(&a.id.into()).unwrap().consistent);
    }

    /// Store wrapper that commits a transfer from `a` to `b` in the middle
    /// of the first `commits` history reads, like a writer racing an audit.
    struct BusyStore {
        inner: Arc<MemoryStore>,
        a: Uuid,
        b: Uuid,
        commits: AtomicU32,
    }

    impl LedgerStore for BusyStore {
        fn run_atomically<T, F>(&self, f: F) -> Result<T>
        where
            F: FnOnce(&dyn LedgerScope) -> Result<T>,
        {
            self.inner.run_atomically(f)
        }

        fn create_account(&self, account: &Account) -> Result<()> {
            self.inner.create_account(account)
        }

        fn get_account(&self, id: Uuid) -> Result<Option<Account>> {
            self.inner.get_account(id)
        }

        fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
            self.inner.find_account_by_email(email)
        }

        fn list_accounts(&self) -> Result<Vec<Account>> {
            self.inner.list_accounts()
        }

        fn total_balance(&self) -> Result<Decimal> {
            self.inner.total_balance()
        }

        fn transfers_page(
            &self,
            account_id: Uuid,
            after: Option<HistoryCursor>,
            limit: usize,
        ) -> Result<Vec<TransferRecord>> {
            if after.is_none() && self.commits.load(Ordering::SeqCst) > 0 {
                self.commits.fetch_sub(1, Ordering::SeqCst);
                TransferService::new(Arc::clone(&self.inner), 1).transfer(
                    &self.a.into(),
                    &self.b.into(),
                    Decimal::new(40, 0),
                )?;
            }
            self.inner.transfers_page(account_id, after, limit)
        }

        fn transfer_count(&self) -> Result<u64> {
            self.inner.transfer_count()
        }
    }

    fn busy(commits: u32) -> (BusyStore, Uuid) {
        let inner = Arc::new(MemoryStore::new());
        let accounts = AccountService::new(Arc::clone(&inner));
        let a = accounts.register("A", "a@example.com", Decimal::new(100, 0)).unwrap();
        let b = accounts.register("B", "b@example.com", Decimal::ZERO).unwrap();
        let store = BusyStore {
            inner,
            a: a.id,
            b: b.id,
            commits: AtomicU32::new(commits),
        };
        (store, a.id)
    }

    #[test]
    fn test_verify_replays_when_transfer_commits_midway() {
        let (store, a) = busy(1);
        let history = HistoryService::new(Arc::new(store), 10, 3);

        let report = history.verify(&a.into()).unwrap();

        assert!(report.consistent, "{:?}", report);
        assert_eq!(report.transfers, 1);
        assert_eq!(report.actual_balance, Decimal::new(60, 0));
    }

    #[test]
    fn test_verify_gives_up_under_constant_writes() {
        let (store, a) = busy(2);
        let history = HistoryService::new(Arc::new(store), 10, 2);

        let err = history.verify(&a.into()).unwrap_err();
        assert!(matches!(err, Error::Retryable { attempts: 2 }));
    }
}
