//! Entity store
//!
//! # Tables
//!
//! - `users` - Customer accounts (key: user id; indices: username, wallet)
//! - `businesses` - Token issuers (key: business id; index: wallet)
//! - `tokens` - Loyalty tokens (key: token id; index: owning business)
//! - `rewards` - Redeemable rewards (key: reward id)
//! - `transactions` - Append-only ledger records (key: transaction id)
//!
//! Each table sits behind its own lock, so id assignment and the unique
//! index check for a kind happen inside one critical section. Nothing is
//! ever deleted, which lets cross-table reference checks run outside the
//! target table's lock.

use crate::{
    error::{Error, Result},
    types::{
        Business, BusinessId, NewBusiness, NewReward, NewToken, NewTransaction, NewUser, Reward,
        RewardId, RewardUpdate, Token, TokenId, Transaction, TransactionId, TransactionStatus, User,
        UserId,
    },
};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// Storage backend contract.
///
/// The lifecycle manager only talks to this trait, so a persistent backend
/// can replace [`MemoryStore`] without touching the workflows.
pub trait EntityStore: Send + Sync {
    /// Insert a user; duplicate username or wallet is a conflict
    fn create_user(&self, user: NewUser) -> Result<User>;
    /// User by id
    fn get_user(&self, id: UserId) -> Result<User>;
    /// User by unique username
    fn get_user_by_username(&self, username: &str) -> Result<User>;
    /// User by linked wallet
    fn get_user_by_wallet_address(&self, address: &str) -> Result<User>;

    /// Insert a business; duplicate wallet is a conflict
    fn create_business(&self, business: NewBusiness) -> Result<Business>;
    /// Business by id
    fn get_business(&self, id: BusinessId) -> Result<Business>;
    /// Business by wallet
    fn get_business_by_wallet_address(&self, address: &str) -> Result<Business>;
    /// All businesses in id order
    fn list_businesses(&self) -> Result<Vec<Business>>;

    /// Insert a token; at most one per business
    fn create_token(&self, token: NewToken) -> Result<Token>;
    /// Token by id
    fn get_token(&self, id: TokenId) -> Result<Token>;
    /// The token owned by a business, if it has issued one
    fn get_token_by_business(&self, business_id: BusinessId) -> Result<Option<Token>>;
    /// Raise the declared supply atomically
    fn increase_token_supply(&self, id: TokenId, amount: u64) -> Result<Token>;

    /// Insert a reward
    fn create_reward(&self, reward: NewReward) -> Result<Reward>;
    /// Reward by id
    fn get_reward(&self, id: RewardId) -> Result<Reward>;
    /// Rewards of one business in id order
    fn list_rewards_by_business(&self, business_id: BusinessId) -> Result<Vec<Reward>>;
    /// Merge a patch into a reward
    fn update_reward(&self, id: RewardId, update: &RewardUpdate) -> Result<Reward>;

    /// Insert a transaction in `pending` state
    fn create_transaction(&self, tx: NewTransaction) -> Result<Transaction>;
    /// Transaction by id
    fn get_transaction(&self, id: TransactionId) -> Result<Transaction>;
    /// Transactions of one business, most recent first
    fn list_transactions_by_business(&self, business_id: BusinessId) -> Result<Vec<Transaction>>;
    /// Transactions of one user, most recent first
    fn list_transactions_by_user(&self, user_id: UserId) -> Result<Vec<Transaction>>;
    /// Move a pending transaction to a terminal status
    fn update_transaction_status(
        &self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<Transaction>;
    /// Counter bumped whenever one of the user's transactions changes
    /// status. Zero for a user with no transitions.
    fn settlement_revision(&self, user_id: UserId) -> Result<u64>;

    /// Row counts per table
    fn stats(&self) -> StoreStats;
}

/// Row counts per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Users
    pub users: usize,
    /// Businesses
    pub businesses: usize,
    /// Tokens
    pub tokens: usize,
    /// Rewards
    pub rewards: usize,
    /// Transactions
    pub transactions: usize,
}

/// One entity kind: rows plus the next identifier
#[derive(Debug)]
struct Table<T, I = ()> {
    next_id: u64,
    rows: BTreeMap<u64, T>,
    index: I,
}

impl<T, I: Default> Default for Table<T, I> {
    fn default() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
            index: I::default(),
        }
    }
}

impl<T, I> Table<T, I> {
    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

#[derive(Debug, Default)]
struct UserIndex {
    by_username: HashMap<String, u64>,
    by_wallet: HashMap<String, u64>,
}

#[derive(Debug, Default)]
struct BusinessIndex {
    by_wallet: HashMap<String, u64>,
}

#[derive(Debug, Default)]
struct TokenIndex {
    by_business: HashMap<BusinessId, u64>,
}

#[derive(Debug, Default)]
struct TransactionIndex {
    revision_by_user: HashMap<UserId, u64>,
}

/// Volatile in-memory store. State is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<Table<User, UserIndex>>,
    businesses: RwLock<Table<Business, BusinessIndex>>,
    tokens: RwLock<Table<Token, TokenIndex>>,
    rewards: RwLock<Table<Reward>>,
    transactions: RwLock<Table<Transaction, TransactionIndex>>,
}

/// Wallet of the seeded business
pub const SAMPLE_BUSINESS_WALLET: &str = "9xJ4rK...2VnM";
/// Gateway address of the seeded token
pub const SAMPLE_TOKEN_ADDRESS: &str = "So1sloy0001";

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with one business, its token and three rewards
    pub fn with_sample_data() -> Result<Self> {
        let store = Self::new();

        let business = store.create_business(NewBusiness {
            name: "Coffee Shop".to_string(),
            wallet_address: SAMPLE_BUSINESS_WALLET.to_string(),
            token_symbol: Some("SLOY".to_string()),
            token_name: Some("SolLoyalty Token".to_string()),
        })?;

        store.create_token(NewToken {
            business_id: business.id,
            name: "SolLoyalty Token".to_string(),
            symbol: "SLOY".to_string(),
            supply: 1_000_000,
            decimals: 6,
            mintable: true,
            freezable: false,
            mint_authority: business.wallet_address.clone(),
            address: SAMPLE_TOKEN_ADDRESS.to_string(),
        })?;

        let rewards = [
            (
                "$10 Discount",
                "Use your tokens for a discount on your next purchase.",
                200,
            ),
            (
                "Free Coffee",
                "Redeem for a free coffee at any participating location.",
                150,
            ),
            (
                "Priority Service",
                "Skip the line with priority service at partner locations.",
                100,
            ),
        ];
        for (name, description, token_cost) in rewards {
            store.create_reward(NewReward {
                business_id: business.id,
                name: name.to_string(),
                description: description.to_string(),
                token_cost,
                is_active: true,
            })?;
        }

        tracing::info!(
            business_id = %business.id,
            "Seeded sample business, token and rewards"
        );

        Ok(store)
    }

    fn require_business(&self, id: BusinessId) -> Result<()> {
        if self.businesses.read().rows.contains_key(&id.0) {
            Ok(())
        } else {
            Err(Error::not_found("business", id))
        }
    }

    fn require_user(&self, id: UserId) -> Result<()> {
        if self.users.read().rows.contains_key(&id.0) {
            Ok(())
        } else {
            Err(Error::not_found("user", id))
        }
    }

    fn sorted_recent_first(mut txs: Vec<Transaction>) -> Vec<Transaction> {
        txs.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        txs
    }
}

fn require_non_blank(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

impl EntityStore for MemoryStore {
    // User operations

    fn create_user(&self, user: NewUser) -> Result<User> {
        require_non_blank("username", &user.username)?;

        let mut table = self.users.write();
        if table.index.by_username.contains_key(&user.username) {
            return Err(Error::Conflict(format!(
                "username already taken: {}",
                user.username
            )));
        }
        if let Some(ref wallet) = user.wallet_address {
            if table.index.by_wallet.contains_key(wallet) {
                return Err(Error::Conflict(format!(
                    "wallet already linked to a user: {wallet}"
                )));
            }
        }

        let id = table.allocate();
        let stored = User {
            id: UserId(id),
            username: user.username,
            password: user.password,
            wallet_address: user.wallet_address,
        };
        table.index.by_username.insert(stored.username.clone(), id);
        if let Some(ref wallet) = stored.wallet_address {
            table.index.by_wallet.insert(wallet.clone(), id);
        }
        table.rows.insert(id, stored.clone());

        tracing::debug!(user_id = id, "User created");
        Ok(stored)
    }

    fn get_user(&self, id: UserId) -> Result<User> {
        self.users
            .read()
            .rows
            .get(&id.0)
            .cloned()
            .ok_or_else(|| Error::not_found("user", id))
    }

    fn get_user_by_username(&self, username: &str) -> Result<User> {
        let table = self.users.read();
        table
            .index
            .by_username
            .get(username)
            .and_then(|id| table.rows.get(id))
            .cloned()
            .ok_or_else(|| Error::not_found("user", username))
    }

    fn get_user_by_wallet_address(&self, address: &str) -> Result<User> {
        let table = self.users.read();
        table
            .index
            .by_wallet
            .get(address)
            .and_then(|id| table.rows.get(id))
            .cloned()
            .ok_or_else(|| Error::not_found("user", address))
    }

    // Business operations

    fn create_business(&self, business: NewBusiness) -> Result<Business> {
        require_non_blank("business name", &business.name)?;
        require_non_blank("wallet address", &business.wallet_address)?;

        let mut table = self.businesses.write();
        if table.index.by_wallet.contains_key(&business.wallet_address) {
            return Err(Error::Conflict(format!(
                "wallet already registered to a business: {}",
                business.wallet_address
            )));
        }

        let id = table.allocate();
        let stored = Business {
            id: BusinessId(id),
            name: business.name,
            wallet_address: business.wallet_address,
            token_symbol: business.token_symbol,
            token_name: business.token_name,
        };
        table
            .index
            .by_wallet
            .insert(stored.wallet_address.clone(), id);
        table.rows.insert(id, stored.clone());

        tracing::debug!(business_id = id, "Business created");
        Ok(stored)
    }

    fn get_business(&self, id: BusinessId) -> Result<Business> {
        self.businesses
            .read()
            .rows
            .get(&id.0)
            .cloned()
            .ok_or_else(|| Error::not_found("business", id))
    }

    fn get_business_by_wallet_address(&self, address: &str) -> Result<Business> {
        let table = self.businesses.read();
        table
            .index
            .by_wallet
            .get(address)
            .and_then(|id| table.rows.get(id))
            .cloned()
            .ok_or_else(|| Error::not_found("business", address))
    }

    fn list_businesses(&self) -> Result<Vec<Business>> {
        Ok(self.businesses.read().rows.values().cloned().collect())
    }

    // Token operations

    fn create_token(&self, token: NewToken) -> Result<Token> {
        self.require_business(token.business_id)?;

        let mut table = self.tokens.write();
        if let Some(existing) = table.index.by_business.get(&token.business_id) {
            return Err(Error::Conflict(format!(
                "business {} already issued token {}",
                token.business_id, existing
            )));
        }

        let id = table.allocate();
        let stored = Token {
            id: TokenId(id),
            business_id: token.business_id,
            name: token.name,
            symbol: token.symbol,
            supply: token.supply,
            decimals: token.decimals,
            mintable: token.mintable,
            freezable: token.freezable,
            mint_authority: token.mint_authority,
            address: token.address,
            created_at: Utc::now(),
        };
        table.index.by_business.insert(stored.business_id, id);
        table.rows.insert(id, stored.clone());

        tracing::debug!(token_id = id, business_id = %stored.business_id, "Token created");
        Ok(stored)
    }

    fn get_token(&self, id: TokenId) -> Result<Token> {
        self.tokens
            .read()
            .rows
            .get(&id.0)
            .cloned()
            .ok_or_else(|| Error::not_found("token", id))
    }

    fn get_token_by_business(&self, business_id: BusinessId) -> Result<Option<Token>> {
        let table = self.tokens.read();
        Ok(table
            .index
            .by_business
            .get(&business_id)
            .and_then(|id| table.rows.get(id))
            .cloned())
    }

    fn increase_token_supply(&self, id: TokenId, amount: u64) -> Result<Token> {
        let mut table = self.tokens.write();
        let token = table
            .rows
            .get_mut(&id.0)
            .ok_or_else(|| Error::not_found("token", id))?;

        if !token.mintable {
            return Err(Error::NotMintable(id.0));
        }
        token.supply = token
            .supply
            .checked_add(amount)
            .ok_or_else(|| Error::Validation(format!("supply overflow minting {amount}")))?;

        Ok(token.clone())
    }

    // Reward operations

    fn create_reward(&self, reward: NewReward) -> Result<Reward> {
        require_non_blank("reward name", &reward.name)?;
        if reward.token_cost <= 0 {
            return Err(Error::Validation(format!(
                "token cost must be positive, got {}",
                reward.token_cost
            )));
        }
        self.require_business(reward.business_id)?;

        let mut table = self.rewards.write();
        let id = table.allocate();
        let stored = Reward {
            id: RewardId(id),
            business_id: reward.business_id,
            name: reward.name,
            description: reward.description,
            token_cost: reward.token_cost,
            is_active: reward.is_active,
        };
        table.rows.insert(id, stored.clone());

        Ok(stored)
    }

    fn get_reward(&self, id: RewardId) -> Result<Reward> {
        self.rewards
            .read()
            .rows
            .get(&id.0)
            .cloned()
            .ok_or_else(|| Error::not_found("reward", id))
    }

    fn list_rewards_by_business(&self, business_id: BusinessId) -> Result<Vec<Reward>> {
        Ok(self
            .rewards
            .read()
            .rows
            .values()
            .filter(|r| r.business_id == business_id)
            .cloned()
            .collect())
    }

    fn update_reward(&self, id: RewardId, update: &RewardUpdate) -> Result<Reward> {
        if let Some(cost) = update.token_cost {
            if cost <= 0 {
                return Err(Error::Validation(format!(
                    "token cost must be positive, got {cost}"
                )));
            }
        }
        if let Some(ref name) = update.name {
            require_non_blank("reward name", name)?;
        }

        let mut table = self.rewards.write();
        let reward = table
            .rows
            .get_mut(&id.0)
            .ok_or_else(|| Error::not_found("reward", id))?;
        update.apply_to(reward);

        Ok(reward.clone())
    }

    // Transaction operations

    fn create_transaction(&self, tx: NewTransaction) -> Result<Transaction> {
        if !tx.tx_type.accepts_amount(tx.amount) {
            return Err(Error::Validation(format!(
                "amount {} has the wrong sign for a {} transaction",
                tx.amount, tx.tx_type
            )));
        }
        self.require_business(tx.business_id)?;
        if let Some(user_id) = tx.user_id {
            self.require_user(user_id)?;
        }

        let mut table = self.transactions.write();
        let id = table.allocate();
        let stored = Transaction {
            id: TransactionId(id),
            user_id: tx.user_id,
            business_id: tx.business_id,
            tx_type: tx.tx_type,
            amount: tx.amount,
            description: tx.description,
            status: TransactionStatus::Pending,
            created_at: tx.created_at.unwrap_or_else(Utc::now),
        };
        table.rows.insert(id, stored.clone());

        tracing::debug!(
            transaction_id = id,
            business_id = %stored.business_id,
            amount = stored.amount,
            "Transaction recorded as pending"
        );
        Ok(stored)
    }

    fn get_transaction(&self, id: TransactionId) -> Result<Transaction> {
        self.transactions
            .read()
            .rows
            .get(&id.0)
            .cloned()
            .ok_or_else(|| Error::not_found("transaction", id))
    }

    fn list_transactions_by_business(&self, business_id: BusinessId) -> Result<Vec<Transaction>> {
        let txs = self
            .transactions
            .read()
            .rows
            .values()
            .filter(|t| t.business_id == business_id)
            .cloned()
            .collect();
        Ok(Self::sorted_recent_first(txs))
    }

    fn list_transactions_by_user(&self, user_id: UserId) -> Result<Vec<Transaction>> {
        let txs = self
            .transactions
            .read()
            .rows
            .values()
            .filter(|t| t.user_id == Some(user_id))
            .cloned()
            .collect();
        Ok(Self::sorted_recent_first(txs))
    }

    fn update_transaction_status(
        &self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<Transaction> {
        let mut table = self.transactions.write();
        let Table { rows, index, .. } = &mut *table;
        let tx = rows
            .get_mut(&id.0)
            .ok_or_else(|| Error::not_found("transaction", id))?;

        if !tx.status.can_transition_to(status) {
            return Err(Error::Validation(format!(
                "transaction {id} cannot move from {} to {status}",
                tx.status
            )));
        }
        tx.status = status;
        if let Some(user_id) = tx.user_id {
            *index.revision_by_user.entry(user_id).or_insert(0) += 1;
        }

        Ok(tx.clone())
    }

    fn settlement_revision(&self, user_id: UserId) -> Result<u64> {
        Ok(self
            .transactions
            .read()
            .index
            .revision_by_user
            .get(&user_id)
            .copied()
            .unwrap_or(0))
    }

    fn stats(&self) -> StoreStats {
        StoreStats {
            users: self.users.read().rows.len(),
            businesses: self.businesses.read().rows.len(),
            tokens: self.tokens.read().rows.len(),
            rewards: self.rewards.read().rows.len(),
            transactions: self.transactions.read().rows.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionType;
    use chrono::Duration;

    fn earn_record(
        user_id: UserId,
        business_id: BusinessId,
        amount: i64,
        description: &str,
    ) -> NewTransaction {
        NewTransaction {
            user_id: Some(user_id),
            business_id,
            tx_type: TransactionType::Earn,
            amount,
            description: Some(description.to_string()),
            created_at: None,
        }
    }

    fn store_with_business() -> (MemoryStore, Business) {
        let store = MemoryStore::new();
        let business = store
            .create_business(NewBusiness {
                name: "Bakery".to_string(),
                wallet_address: "W1".to_string(),
                token_symbol: None,
                token_name: None,
            })
            .unwrap();
        (store, business)
    }

    fn new_user(name: &str, wallet: Option<&str>) -> NewUser {
        NewUser {
            username: name.to_string(),
            password: "secret".to_string(),
            wallet_address: wallet.map(str::to_string),
        }
    }

    #[test]
    fn test_ids_are_monotonic_per_kind() {
        let (store, _) = store_with_business();
        let a = store.create_user(new_user("alice", None)).unwrap();
        let b = store.create_user(new_user("bob", None)).unwrap();
        assert_eq!(a.id, UserId(1));
        assert_eq!(b.id, UserId(2));

        let second = store
            .create_business(NewBusiness {
                name: "Diner".to_string(),
                wallet_address: "W2".to_string(),
                token_symbol: None,
                token_name: None,
            })
            .unwrap();
        assert_eq!(second.id, BusinessId(2));
    }

    #[test]
    fn test_duplicate_username_conflicts() {
        let store = MemoryStore::new();
        store.create_user(new_user("alice", None)).unwrap();
        let err = store.create_user(new_user("alice", None)).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_duplicate_business_wallet_conflicts() {
        let (store, _) = store_with_business();
        let err = store
            .create_business(NewBusiness {
                name: "Copycat".to_string(),
                wallet_address: "W1".to_string(),
                token_symbol: None,
                token_name: None,
            })
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_lookup_by_secondary_keys() {
        let (store, business) = store_with_business();
        let user = store.create_user(new_user("carol", Some("UW1"))).unwrap();

        assert_eq!(store.get_user_by_wallet_address("UW1").unwrap(), user);
        assert_eq!(store.get_user_by_username("carol").unwrap(), user);
        assert_eq!(store.get_business_by_wallet_address("W1").unwrap(), business);
        assert!(matches!(
            store.get_user_by_wallet_address("nope"),
            Err(Error::NotFound { entity: "user", .. })
        ));
    }

    #[test]
    fn test_get_by_id_is_idempotent() {
        let (store, business) = store_with_business();
        assert_eq!(
            store.get_business(business.id).unwrap(),
            store.get_business(business.id).unwrap()
        );
    }

    #[test]
    fn test_one_token_per_business() {
        let (store, business) = store_with_business();
        let token = NewToken {
            business_id: business.id,
            name: "Bread".to_string(),
            symbol: "BRD".to_string(),
            supply: 1000,
            decimals: 6,
            mintable: false,
            freezable: false,
            mint_authority: "W1".to_string(),
            address: "So1bread".to_string(),
        };
        store.create_token(token.clone()).unwrap();
        assert!(matches!(store.create_token(token), Err(Error::Conflict(_))));
    }

    #[test]
    fn test_token_requires_existing_business() {
        let store = MemoryStore::new();
        let err = store
            .create_token(NewToken {
                business_id: BusinessId(99),
                name: "Ghost".to_string(),
                symbol: "GHO".to_string(),
                supply: 1,
                decimals: 0,
                mintable: false,
                freezable: false,
                mint_authority: "X".to_string(),
                address: "So1ghost".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "business", .. }));
    }

    #[test]
    fn test_reward_cost_must_be_positive() {
        let (store, business) = store_with_business();
        let err = store
            .create_reward(NewReward {
                business_id: business.id,
                name: "Free".to_string(),
                description: String::new(),
                token_cost: 0,
                is_active: true,
            })
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_reward_update_keeps_identity() {
        let (store, business) = store_with_business();
        let reward = store
            .create_reward(NewReward {
                business_id: business.id,
                name: "Muffin".to_string(),
                description: "Any muffin".to_string(),
                token_cost: 50,
                is_active: true,
            })
            .unwrap();

        let updated = store
            .update_reward(
                reward.id,
                &RewardUpdate {
                    token_cost: Some(75),
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.id, reward.id);
        assert_eq!(updated.business_id, reward.business_id);
        assert_eq!(updated.token_cost, 75);
        assert!(!updated.is_active);
        assert_eq!(updated.name, "Muffin");
    }

    #[test]
    fn test_transaction_requires_existing_user() {
        let (store, business) = store_with_business();
        let err = store
            .create_transaction(earn_record(UserId(5), business.id, 10, "visit"))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "user", .. }));
    }

    #[test]
    fn test_transaction_starts_pending_and_is_monotone() {
        let (store, business) = store_with_business();
        let user = store.create_user(new_user("dave", None)).unwrap();
        let tx = store
            .create_transaction(earn_record(user.id, business.id, 10, "visit"))
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Pending);

        let done = store
            .update_transaction_status(tx.id, TransactionStatus::Completed)
            .unwrap();
        assert_eq!(done.status, TransactionStatus::Completed);

        for next in [
            TransactionStatus::Failed,
            TransactionStatus::Pending,
            TransactionStatus::Completed,
        ] {
            let err = store.update_transaction_status(tx.id, next).unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }
        assert_eq!(
            store.get_transaction(tx.id).unwrap().status,
            TransactionStatus::Completed
        );
    }

    #[test]
    fn test_settlement_revision_tracks_transitions() {
        let (store, business) = store_with_business();
        let user = store.create_user(new_user("fay", None)).unwrap();
        let other = store.create_user(new_user("gus", None)).unwrap();
        assert_eq!(store.settlement_revision(user.id).unwrap(), 0);

        let tx = store
            .create_transaction(earn_record(user.id, business.id, 10, "visit"))
            .unwrap();
        // Pending records do not move the revision
        assert_eq!(store.settlement_revision(user.id).unwrap(), 0);

        store
            .update_transaction_status(tx.id, TransactionStatus::Completed)
            .unwrap();
        assert_eq!(store.settlement_revision(user.id).unwrap(), 1);
        assert_eq!(store.settlement_revision(other.id).unwrap(), 0);

        // A rejected transition leaves it alone
        assert!(store
            .update_transaction_status(tx.id, TransactionStatus::Failed)
            .is_err());
        assert_eq!(store.settlement_revision(user.id).unwrap(), 1);
    }

    #[test]
    fn test_transactions_listed_most_recent_first() {
        let (store, business) = store_with_business();
        let user = store.create_user(new_user("erin", None)).unwrap();
        let now = Utc::now();

        for offset in [5, 1, 3] {
            let mut record = earn_record(user.id, business.id, offset, "backfill");
            record.created_at = Some(now - Duration::minutes(offset));
            store.create_transaction(record).unwrap();
        }

        let amounts: Vec<i64> = store
            .list_transactions_by_business(business.id)
            .unwrap()
            .iter()
            .map(|t| t.amount)
            .collect();
        assert_eq!(amounts, vec![1, 3, 5]);

        let by_user = store.list_transactions_by_user(user.id).unwrap();
        assert_eq!(by_user.len(), 3);
        assert!(by_user.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[test]
    fn test_sample_data() {
        let store = MemoryStore::with_sample_data().unwrap();
        let stats = store.stats();
        assert_eq!(stats.businesses, 1);
        assert_eq!(stats.tokens, 1);
        assert_eq!(stats.rewards, 3);
        assert_eq!(stats.transactions, 0);

        let business = store
            .get_business_by_wallet_address(SAMPLE_BUSINESS_WALLET)
            .unwrap();
        let token = store.get_token_by_business(business.id).unwrap().unwrap();
        assert_eq!(token.supply, 1_000_000);
        assert_eq!(token.mint_authority, SAMPLE_BUSINESS_WALLET);

        let costs: Vec<i64> = store
            .list_rewards_by_business(business.id)
            .unwrap()
            .iter()
            .map(|r| r.token_cost)
            .collect();
        assert_eq!(costs, vec![200, 150, 100]);
    }
}
