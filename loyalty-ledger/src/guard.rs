//! Concurrency guards for the transaction lifecycle
//!
//! - [`BalanceLocks`] serializes balance-changing workflows per
//!   (user, token), so a check against the settled balance stays valid until
//!   the workflow's own record is terminal.
//! - [`PendingSettlement`] owns a freshly created `pending` transaction and
//!   guarantees it reaches a terminal status. If the guard is dropped
//!   without being resolved (early return, panic, cancelled future, failed
//!   store write) the transaction is marked `failed`.

use crate::{
    storage::EntityStore,
    types::{NewTransaction, TokenId, Transaction, TransactionStatus, UserId},
    Result,
};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type PairKey = (UserId, TokenId);

/// Per-(user, token) async mutexes.
///
/// Entries exist only while a pair is held or awaited.
#[derive(Debug, Default)]
pub struct BalanceLocks {
    locks: Arc<DashMap<PairKey, Arc<Mutex<()>>>>,
}

impl BalanceLocks {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a (user, token) pair
    pub async fn acquire(&self, user_id: UserId, token_id: TokenId) -> PairGuard {
        let key = (user_id, token_id);
        let lock = self.locks.entry(key).or_default().value().clone();
        let guard = lock.lock_owned().await;
        PairGuard {
            key,
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }

    /// Pairs currently held or awaited
    pub fn tracked_pairs(&self) -> usize {
        self.locks.len()
    }
}

/// Exclusive hold on one (user, token) pair
#[derive(Debug)]
pub struct PairGuard {
    key: PairKey,
    locks: Arc<DashMap<PairKey, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PairGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold a clone, so a count of one means the table owns the
        // last reference. New acquirers go through the same shard lock.
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Scoped owner of a `pending` transaction
pub struct PendingSettlement {
    store: Arc<dyn EntityStore>,
    transaction: Transaction,
    resolved: bool,
}

impl PendingSettlement {
    /// Record `tx` as pending and take ownership of its resolution
    pub fn begin(store: Arc<dyn EntityStore>, tx: NewTransaction) -> Result<Self> {
        let transaction = store.create_transaction(tx)?;
        Ok(Self {
            store,
            transaction,
            resolved: false,
        })
    }

    /// The pending record
    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    /// Settlement succeeded
    pub fn complete(self) -> Result<Transaction> {
        self.resolve(TransactionStatus::Completed)
    }

    /// Settlement failed
    pub fn fail(self) -> Result<Transaction> {
        self.resolve(TransactionStatus::Failed)
    }

    fn resolve(mut self, status: TransactionStatus) -> Result<Transaction> {
        // On error the guard stays unresolved and Drop retries as `failed`
        let updated = self
            .store
            .update_transaction_status(self.transaction.id, status)?;
        self.resolved = true;
        Ok(updated)
    }
}

impl Drop for PendingSettlement {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        tracing::warn!(
            transaction_id = %self.transaction.id,
            "Pending transaction abandoned; marking failed"
        );
        if let Err(e) = self
            .store
            .update_transaction_status(self.transaction.id, TransactionStatus::Failed)
        {
            tracing::error!(
                transaction_id = %self.transaction.id,
                "Could not mark abandoned transaction failed: {}",
                e
            );
        }
    }
}

impl std::fmt::Debug for PendingSettlement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingSettlement")
            .field("transaction_id", &self.transaction.id)
            .field("resolved", &self.resolved)
            .finish()
    }
}
