//! Concurrent transfer tests
//!
//! Many threads hammer the same accounts at once. Whatever interleaving
//! happens, money must be conserved, no balance may go negative, and every
//! successful transfer must appear in the log exactly once.
//!
//! Run with: cargo test --test concurrent_access_test -- --nocapture

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use rust_decimal::Decimal;
use tempfile::TempDir;
use uuid::Uuid;

use ledger_core::adapters::{DuckDbStore, MemoryStore};
use ledger_core::config::Config;
use ledger_core::ports::LedgerStore;
use ledger_core::{AccountKey, Error, LedgerContext, TransferRecord};

/// Number of concurrent threads for stress tests
const THREAD_COUNT: usize = 8;

/// Transfers attempted per thread in the throughput test
const ITERATIONS_PER_THREAD: usize = 5;

fn duckdb_context(temp_dir: &TempDir, max_retries: u32) -> Arc<LedgerContext<DuckDbStore>> {
    let store = DuckDbStore::open(&temp_dir.path().join("ledger.duckdb")).unwrap();
    store.ensure_schema().unwrap();
    let config = Config {
        max_retries,
        ..Config::default()
    };
    Arc::new(LedgerContext::with_store(Arc::new(store), config))
}

fn memory_context(max_retries: u32) -> Arc<LedgerContext<MemoryStore>> {
    let config = Config {
        max_retries,
        ..Config::default()
    };
    Arc::new(LedgerContext::with_store(Arc::new(MemoryStore::new()), config))
}

fn all_transfers<S: LedgerStore>(ctx: &LedgerContext<S>, account: Uuid) -> Vec<TransferRecord> {
    ctx.history(&AccountKey::Id(account))
        .unwrap()
        .iter()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

/// Everyone tries to spend the same 100 at once; at most five 20s can win.
fn overdraft_race<S: LedgerStore + 'static>(ctx: Arc<LedgerContext<S>>) {
    let a = ctx.register("A", "a@example.com", Decimal::new(100, 0)).unwrap().id;
    let b = ctx.register("B", "b@example.com", Decimal::ZERO).unwrap().id;

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let successes = Arc::new(AtomicUsize::new(0));
    let mut handles = vec![];

    for thread_id in 0..THREAD_COUNT {
        let ctx = Arc::clone(&ctx);
        let barrier = Arc::clone(&barrier);
        let successes = Arc::clone(&successes);

        handles.push(thread::spawn(move || {
            barrier.wait();
            match ctx.transfer(&AccountKey::Id(a), &AccountKey::Id(b), Decimal::new(20, 0)) {
                Ok(_) => {
                    successes.fetch_add(1, Ordering::SeqCst);
                }
                Err(Error::InsufficientFunds { .. }) | Err(Error::Retryable { .. }) => {}
                Err(e) => panic!("Thread {}: unexpected error: {}", thread_id, e),
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let won = successes.load(Ordering::SeqCst);
    let a_balance = ctx.account_service.get(&AccountKey::Id(a)).unwrap().balance;
    let b_balance = ctx.account_service.get(&AccountKey::Id(b)).unwrap().balance;
    println!("{} of {} transfers won, A = {}, B = {}", won, THREAD_COUNT, a_balance, b_balance);

    assert!((1..=5).contains(&won), "won = {}", won);
    assert!(a_balance >= Decimal::ZERO);
    assert_eq!(a_balance, Decimal::new(100 - 20 * won as i64, 0));
    assert_eq!(a_balance + b_balance, Decimal::new(100, 0));
    assert_eq!(all_transfers(&ctx, a).len(), won);
    assert!(ctx.history_service.verify(&AccountKey::Id(a)).unwrap().consistent);
    assert!(ctx.history_service.verify(&AccountKey::Id(b)).unwrap().consistent);
}

/// Plenty of funds and retries: every transfer lands, each sequence once.
fn throughput<S: LedgerStore + 'static>(ctx: Arc<LedgerContext<S>>) {
    let accounts: Vec<Uuid> = (0..4)
        .map(|i| {
            ctx.register(&format!("Account {}", i), &format!("acct{}@example.com", i), Decimal::new(1000, 0))
                .unwrap()
                .id
        })
        .collect();
    let accounts = Arc::new(accounts);

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let mut handles = vec![];

    for thread_id in 0..THREAD_COUNT {
        let ctx = Arc::clone(&ctx);
        let barrier = Arc::clone(&barrier);
        let accounts = Arc::clone(&accounts);

        handles.push(thread::spawn(move || {
            barrier.wait();
            for i in 0..ITERATIONS_PER_THREAD {
                let from = accounts[(thread_id + i) % accounts.len()];
                let to = accounts[(thread_id + i + 1) % accounts.len()];
                ctx.transfer(&AccountKey::Id(from), &AccountKey::Id(to), Decimal::new(150, 2))
                    .unwrap_or_else(|e| panic!("Thread {} iteration {}: {}", thread_id, i, e));
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let expected = THREAD_COUNT * ITERATIONS_PER_THREAD;
    assert_eq!(ctx.store.transfer_count().unwrap(), expected as u64);

    let mut sequences = HashSet::new();
    for id in accounts.iter() {
        for record in all_transfers(&ctx, *id) {
            sequences.insert(record.sequence);
        }
        let account = ctx.account_service.get(&AccountKey::Id(*id)).unwrap();
        assert!(account.balance >= Decimal::ZERO);
        assert!(ctx.history_service.verify(&AccountKey::Id(*id)).unwrap().consistent);
    }
    let expected_sequences: HashSet<i64> = (1..=expected as i64).collect();
    assert_eq!(sequences, expected_sequences);

    let totals = ctx.account_service.totals().unwrap();
    assert_eq!(totals.total_balance, Decimal::new(4000, 0));
}

#[test]
fn test_overdraft_race_memory_store() {
    overdraft_race(memory_context(3));
}

#[test]
fn test_overdraft_race_duckdb_store() {
    let temp_dir = TempDir::new().unwrap();
    overdraft_race(duckdb_context(&temp_dir, 3));
}

#[test]
fn test_concurrent_throughput_memory_store() {
    throughput(memory_context(1000));
}

#[test]
fn test_concurrent_throughput_duckdb_store() {
    let temp_dir = TempDir::new().unwrap();
    throughput(duckdb_context(&temp_dir, 1000));
}

/// A retry budget of one surfaces lost races as `Retryable` instead of
/// retrying, and never corrupts state.
#[test]
fn test_single_attempt_reports_retryable() {
    let ctx = memory_context(1);
    let a = ctx.register("A", "a@example.com", Decimal::new(10_000, 0)).unwrap().id;
    let b = ctx.register("B", "b@example.com", Decimal::ZERO).unwrap().id;

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let mut handles = vec![];
    for _ in 0..THREAD_COUNT {
        let ctx = Arc::clone(&ctx);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            (0..20)
                .filter(|_| {
                    match ctx.transfer(&AccountKey::Id(a), &AccountKey::Id(b), Decimal::ONE) {
                        Ok(_) => true,
                        Err(Error::Retryable { attempts: 1 }) => false,
                        Err(e) => panic!("unexpected error: {}", e),
                    }
                })
                .count()
        }));
    }

    let won: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    let b_balance = ctx.account_service.get(&AccountKey::Id(b)).unwrap().balance;
    assert_eq!(b_balance, Decimal::new(won as i64, 0));
    assert_eq!(ctx.store.transfer_count().unwrap(), won as u64);
}
