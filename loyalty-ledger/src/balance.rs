//! Balance derivation
//!
//! A balance is never stored. It is the sum of `amount` over a user's
//! completed transactions with the business that owns the token. The
//! optional cache only memoizes that fold. Each entry remembers the store's
//! settlement revision for the user and is ignored once the revision moves,
//! so a transition made through any path is observed by the next read.

use crate::{
    error::Error,
    storage::EntityStore,
    types::{BusinessId, TokenId, Transaction, UserId},
    Result,
};
use dashmap::DashMap;
use std::sync::Arc;

/// Fold completed amounts for one (user, business) pair
pub fn fold_balance(txs: &[Transaction], user_id: UserId, business_id: BusinessId) -> Result<i64> {
    txs.iter()
        .filter(|t| t.user_id == Some(user_id) && t.business_id == business_id && t.is_settled())
        .try_fold(0i64, |acc, t| {
            acc.checked_add(t.amount).ok_or_else(|| {
                Error::Validation(format!(
                    "balance of user {user_id} with business {business_id} overflows"
                ))
            })
        })
}

/// Memoized fold, valid while the user's settlement revision is unchanged
#[derive(Debug, Clone, Copy)]
struct CachedBalance {
    revision: u64,
    balance: i64,
}

/// Derives balances from the entity store, optionally memoized
pub struct BalanceBook {
    store: Arc<dyn EntityStore>,
    cache: Option<DashMap<(UserId, TokenId), CachedBalance>>,
}

impl BalanceBook {
    /// Create a balance book over `store`
    pub fn new(store: Arc<dyn EntityStore>, cache_enabled: bool) -> Self {
        Self {
            store,
            cache: cache_enabled.then(DashMap::new),
        }
    }

    /// Current balance of `user_id` in `token_id`. Zero when nothing settled.
    pub fn balance_of(&self, user_id: UserId, token_id: TokenId) -> Result<i64> {
        let key = (user_id, token_id);

        // Read before folding: a transition racing the fold bumps the
        // revision past the one stored with the result.
        let revision = match self.cache {
            Some(_) => self.store.settlement_revision(user_id)?,
            None => 0,
        };
        if let Some(ref cache) = self.cache {
            if let Some(hit) = cache.get(&key) {
                if hit.revision == revision {
                    tracing::debug!(%user_id, %token_id, balance = hit.balance, "Balance cache hit");
                    return Ok(hit.balance);
                }
            }
        }

        let token = self.store.get_token(token_id)?;
        let txs = self.store.list_transactions_by_user(user_id)?;
        let balance = fold_balance(&txs, user_id, token.business_id)?;

        if let Some(ref cache) = self.cache {
            cache
                .entry(key)
                .and_modify(|cached| {
                    if cached.revision <= revision {
                        *cached = CachedBalance { revision, balance };
                    }
                })
                .or_insert(CachedBalance { revision, balance });
        }

        Ok(balance)
    }

    /// Drop the memoized balance for a pair
    pub fn invalidate(&self, user_id: UserId, token_id: TokenId) {
        if let Some(ref cache) = self.cache {
            cache.remove(&(user_id, token_id));
            tracing::debug!(%user_id, %token_id, "Balance cache invalidated");
        }
    }

    /// Number of memoized entries
    pub fn cached_entries(&self) -> usize {
        self.cache.as_ref().map_or(0, DashMap::len)
    }
}

impl std::fmt::Debug for BalanceBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalanceBook")
            .field("cache_enabled", &self.cache.is_some())
            .field("cached_entries", &self.cached_entries())
            .finish()
    }
}
