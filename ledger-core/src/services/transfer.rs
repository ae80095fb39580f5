//! Transfer engine - atomic, invariant-preserving balance transfers
//!
//! A transfer reads both accounts, checks funds, then inside one atomic scope
//! debits the source, credits the destination and appends the log record.
//! Both balance writes are guarded by the versions read beforehand, so a
//! concurrent transfer touching either account makes this one lose the race
//! and start over instead of writing against a stale balance.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::domain::money::{max_amount, validate_transfer_amount};
use crate::domain::result::{Error, Result};
use crate::domain::{AccountKey, AccountState, TransferRecord};
use crate::ports::LedgerStore;

/// Attempts made before a contended transfer gives up with `Retryable`
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Executes transfers against a ledger store
pub struct TransferService<S> {
    store: Arc<S>,
    max_attempts: u32,
}

impl<S: LedgerStore> TransferService<S> {
    pub fn new(store: Arc<S>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Move `amount` from `source` to `destination`.
    ///
    /// Fails without any visible effect on `InvalidAmount`, `SelfTransfer`,
    /// `AccountNotFound` and `InsufficientFunds`. Lost version races are
    /// retried up to the configured number of attempts, then reported as
    /// `Retryable`.
    pub fn transfer(
        &self,
        source: &AccountKey,
        destination: &AccountKey,
        amount: Decimal,
    ) -> Result<TransferRecord> {
        let amount = validate_transfer_amount(amount)?;
        if source == destination {
            return Err(Error::SelfTransfer);
        }

        for attempt in 1..=self.max_attempts {
            match self.try_transfer(source, destination, amount) {
                Err(Error::VersionConflict { account, expected }) => {
                    tracing::debug!(
                        attempt,
                        account_id = %account,
                        expected_version = expected,
                        "transfer lost version race"
                    );
                }
                Ok(record) => {
                    tracing::info!(
                        transfer_id = %record.id,
                        sequence = record.sequence,
                        attempt,
                        "transfer committed"
                    );
                    return Ok(record);
                }
                Err(err) => return Err(err),
            }
        }

        tracing::warn!(attempts = self.max_attempts, "transfer abandoned after repeated conflicts");
        Err(Error::Retryable {
            attempts: self.max_attempts,
        })
    }

    fn try_transfer(
        &self,
        source: &AccountKey,
        destination: &AccountKey,
        amount: Decimal,
    ) -> Result<TransferRecord> {
        let src = self.read(source)?;
        let dst = self.read(destination)?;
        if src.id == dst.id {
            return Err(Error::SelfTransfer);
        }
        if src.balance < amount {
            return Err(Error::InsufficientFunds {
                account: src.id,
                balance: src.balance,
                requested: amount,
            });
        }
        let credited = dst.balance + amount;
        if credited > max_amount() {
            return Err(Error::invalid_amount(format!(
                "{} would push account {} over the maximum balance",
                amount, dst.id
            )));
        }

        self.store.run_atomically(|scope| {
            scope.write_account_if_version(src.id, src.version, src.balance - amount)?;
            scope.write_account_if_version(dst.id, dst.version, credited)?;
            scope.append_transfer(&TransferRecord::new(src.id, dst.id, amount))
        })
    }

    fn read(&self, key: &AccountKey) -> Result<AccountState> {
        let state = match key {
            AccountKey::Id(id) => self.store.read_account(*id)?,
            AccountKey::Email(email) => self
                .store
                .find_account_by_email(email)?
                .map(|account| account.state()),
        };
        state.ok_or_else(|| Error::account_not_found(key))
    }
}
