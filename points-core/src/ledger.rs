//! Points ledger
//!
//! Balance mutations go through the store actor as one atomic conditional write each:
//! the entry is appended and the balance updated together, and a write that would take the
//! balance below zero is rejected without touching anything.
//!
//! # Example
//!
//! ```no_run
//! use points_core::{Config, PointsCore, UserId};
//!
//! #[tokio::main]
//! async fn main() -> points_core::Result<()> {
//!     let core = PointsCore::open(Config::default()).await?;
//!     let user = UserId::new("user-1");
//!
//!     core.ledger()
//!         .credit(&user, 100, "Monthly subscription: 100 points", None)
//!         .await?;
//!     assert_eq!(core.ledger().get_balance(&user)?, 100);
//!
//!     Ok(())
//! }
//! ```

use crate::{
    actor::StoreHandle,
    config::HistoryConfig,
    metrics::Metrics,
    types::{AccountBalance, LedgerEntry, Points, Posting, UserId},
    Error, Result,
};
use chrono::Utc;

/// Ledger store: balances plus append-only history
#[derive(Clone)]
pub struct Ledger {
    store: StoreHandle,
    metrics: Metrics,
    history: HistoryConfig,
}

impl Ledger {
    /// Create ledger over a store handle
    pub fn new(store: StoreHandle, metrics: Metrics, history: HistoryConfig) -> Self {
        Self {
            store,
            metrics,
            history,
        }
    }

    /// Create a zero balance for a new user; existing balances are left alone
    pub async fn open_account(&self, user_id: &UserId) -> Result<AccountBalance> {
        self.store.open_account(user_id.clone()).await
    }

    /// Add `amount` points (EARNED)
    pub async fn credit(
        &self,
        user_id: &UserId,
        amount: Points,
        description: &str,
        reference_id: Option<String>,
    ) -> Result<AccountBalance> {
        if amount == 0 {
            return Err(Error::InvalidAmount("credit amount must be positive".to_string()));
        }
        let entry = LedgerEntry::earned(user_id.clone(), amount, description, reference_id)?;
        self.post(Posting { entry, audit: None }).await
    }

    /// Remove `amount` points (SPENT). Fails with `InsufficientFunds` if the balance is lower.
    pub async fn debit(
        &self,
        user_id: &UserId,
        amount: Points,
        description: &str,
        reference_id: Option<String>,
    ) -> Result<AccountBalance> {
        if amount == 0 {
            return Err(Error::InvalidAmount("debit amount must be positive".to_string()));
        }
        let entry = LedgerEntry::spent(user_id.clone(), amount, description, reference_id)?;
        self.post(Posting { entry, audit: None }).await
    }

    /// Signed correction (ADJUSTED). A negative amount larger than the balance is rejected.
    pub async fn adjust(
        &self,
        user_id: &UserId,
        amount: i64,
        description: &str,
        reference_id: Option<String>,
    ) -> Result<AccountBalance> {
        if amount == 0 {
            return Err(Error::InvalidAmount("adjustment must be non-zero".to_string()));
        }
        let entry = LedgerEntry::adjusted(user_id.clone(), amount, description, reference_id);
        self.post(Posting { entry, audit: None }).await
    }

    /// Submit a prepared posting (entry plus optional audit record)
    pub(crate) async fn post(&self, posting: Posting) -> Result<AccountBalance> {
        let amount = posting.entry.amount;
        let kind = posting.entry.kind;
        let user_id = posting.entry.user_id.clone();

        let account = self.store.post_entry(posting).await?;
        self.metrics.record_movement(amount);

        tracing::debug!(
            user_id = %user_id,
            kind = %kind,
            amount,
            balance = account.balance,
            "Ledger entry posted"
        );

        Ok(account)
    }

    /// Current balance; 0 for users without an account
    pub fn get_balance(&self, user_id: &UserId) -> Result<Points> {
        Ok(self
            .store
            .reader()
            .account(user_id)?
            .map(|account| account.balance)
            .unwrap_or(0))
    }

    /// Full balance record; a zero record for users without an account
    pub fn get_account(&self, user_id: &UserId) -> Result<AccountBalance> {
        Ok(self
            .store
            .reader()
            .account(user_id)?
            .unwrap_or_else(|| AccountBalance::empty(user_id.clone(), Utc::now())))
    }

    /// Entries newest first. `None` uses the configured default; larger limits are capped.
    pub fn history(&self, user_id: &UserId, limit: Option<usize>) -> Result<Vec<LedgerEntry>> {
        self.store
            .reader()
            .entries(user_id, Some(self.history.resolve(limit)))
    }

    /// Replay every entry and check it against the stored balance.
    ///
    /// Deterministic replay: the same entries always give the same balance.
    pub fn verify_account(&self, user_id: &UserId) -> Result<AccountBalance> {
        let stored = self.get_account(user_id)?;
        let mut entries = self.store.reader().entries(user_id, None)?;
        entries.reverse();

        let mut replayed = AccountBalance::empty(user_id.clone(), stored.last_updated);
        for entry in &entries {
            replayed.apply(entry).map_err(|e| {
                Error::InvariantViolation(format!(
                    "replay of {} failed at entry {}: {}",
                    user_id, entry.entry_id, e
                ))
            })?;
        }

        let sum: i128 = entries.iter().map(|e| i128::from(e.amount)).sum();
        if replayed.balance != stored.balance
            || replayed.total_earned != stored.total_earned
            || replayed.total_spent != stored.total_spent
            || sum != i128::from(stored.balance)
            || !stored.is_consistent()
        {
            tracing::error!(
                user_id = %user_id,
                stored_balance = stored.balance,
                replayed_balance = replayed.balance,
                "Ledger replay mismatch"
            );
            return Err(Error::InvariantViolation(format!(
                "balance of {} is {} but entries sum to {}",
                user_id, stored.balance, sum
            )));
        }

        Ok(stored)
    }
}
