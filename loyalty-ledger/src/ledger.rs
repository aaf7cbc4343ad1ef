//! Main ledger orchestration layer
//!
//! [`Ledger`] is the only component that creates or transitions
//! transactions. It ties together the entity store, balance derivation and
//! the settlement gateway into the earn/redeem workflows.
//!
//! # Example
//!
//! ```no_run
//! use loyalty_ledger::{Config, Ledger, types::NewUser};
//!
//! #[tokio::main]
//! async fn main() -> loyalty_ledger::Result<()> {
//!     let ledger = Ledger::open(Config::default())?;
//!
//!     let user = ledger.register_user(NewUser {
//!         username: "alice".to_string(),
//!         password: "hunter2".to_string(),
//!         wallet_address: Some("AliceWallet".to_string()),
//!     })?;
//!     let business = ledger.list_businesses()?.remove(0);
//!     let token = ledger.get_token_by_business(business.id)?;
//!
//!     ledger
//!         .earn(user.id, business.id, 50, "Latte", &token.token_ref())
//!         .await?;
//!     assert_eq!(ledger.balance_of(user.id, token.id)?, 50);
//!     Ok(())
//! }
//! ```

use crate::{
    balance::BalanceBook,
    gateway::{GatewayError, MockGateway, SettlementGateway, TransferReceipt, TransferRequest},
    guard::{BalanceLocks, PendingSettlement},
    metrics::Metrics,
    storage::{EntityStore, MemoryStore},
    types::{
        Business, BusinessId, NewBusiness, NewReward, NewToken, NewTransaction, NewUser, Reward,
        RewardId, RewardUpdate, Token, TokenId, TokenParams, TokenRef, Transaction,
        TransactionId, TransactionStatus, TransactionType, User, UserId, WalletIdentity,
    },
    Config, Error, ErrorKind, Result,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Largest decimal precision accepted for a token
pub const MAX_DECIMALS: u8 = 9;

/// Main ledger interface
pub struct Ledger {
    /// Authoritative entity storage
    store: Arc<dyn EntityStore>,

    /// External settlement collaborator
    gateway: Arc<dyn SettlementGateway>,

    /// Derived balances
    balances: BalanceBook,

    /// Earn/redeem serialization per (user, token)
    balance_locks: BalanceLocks,

    /// Prometheus metrics
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl Ledger {
    /// Open an in-memory ledger backed by the mock gateway
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let store = if config.storage.seed_sample_data {
            MemoryStore::with_sample_data()?
        } else {
            MemoryStore::new()
        };
        let gateway = MockGateway::new(
            config.settlement.mock_latency_ms,
            config.settlement.mock_success_rate,
        );

        Self::new(config, Arc::new(store), Arc::new(gateway))
    }

    /// Assemble a ledger from explicit collaborators
    pub fn new(
        config: Config,
        store: Arc<dyn EntityStore>,
        gateway: Arc<dyn SettlementGateway>,
    ) -> Result<Self> {
        let balances = BalanceBook::new(store.clone(), config.balance_cache.enabled);
        let metrics = Metrics::new()?;

        info!(
            service = %config.service_name,
            version = %config.service_version,
            "Loyalty ledger ready"
        );

        Ok(Self {
            store,
            gateway,
            balances,
            balance_locks: BalanceLocks::new(),
            metrics,
            config,
        })
    }

    /// Underlying entity store.
    ///
    /// Derived balances stay consistent with transitions made here, but only
    /// the earn and redeem workflows check balances before writing.
    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // Users and businesses

    /// Register a customer
    pub fn register_user(&self, user: NewUser) -> Result<User> {
        let user = self.store.create_user(user)?;
        info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(user)
    }

    /// Register a business
    pub fn register_business(&self, business: NewBusiness) -> Result<Business> {
        let business = self.store.create_business(business)?;
        info!(business_id = %business.id, name = %business.name, "Business registered");
        Ok(business)
    }

    /// Resolve a connecting wallet to a user, then a business
    pub fn connect_wallet(&self, wallet_address: &str) -> Result<WalletIdentity> {
        match self.store.get_user_by_wallet_address(wallet_address) {
            Ok(user) => return Ok(WalletIdentity::User(user)),
            Err(e) if e.kind() != ErrorKind::NotFound => return Err(e),
            Err(_) => {}
        }
        match self.store.get_business_by_wallet_address(wallet_address) {
            Ok(business) => Ok(WalletIdentity::Business(business)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(WalletIdentity::Unregistered {
                wallet_address: wallet_address.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    /// User by id
    pub fn get_user(&self, id: UserId) -> Result<User> {
        self.store.get_user(id)
    }

    /// User by username
    pub fn get_user_by_username(&self, username: &str) -> Result<User> {
        self.store.get_user_by_username(username)
    }

    /// User by wallet
    pub fn get_user_by_wallet_address(&self, address: &str) -> Result<User> {
        self.store.get_user_by_wallet_address(address)
    }

    /// Business by id
    pub fn get_business(&self, id: BusinessId) -> Result<Business> {
        self.store.get_business(id)
    }

    /// Business by wallet
    pub fn get_business_by_wallet_address(&self, address: &str) -> Result<Business> {
        self.store.get_business_by_wallet_address(address)
    }

    /// All businesses
    pub fn list_businesses(&self) -> Result<Vec<Business>> {
        self.store.list_businesses()
    }

    // Tokens

    /// Token by id
    pub fn get_token(&self, id: TokenId) -> Result<Token> {
        self.store.get_token(id)
    }

    /// The token a business issued
    pub fn get_token_by_business(&self, business_id: BusinessId) -> Result<Token> {
        self.store
            .get_token_by_business(business_id)?
            .ok_or_else(|| Error::not_found("token", format!("business {business_id}")))
    }

    /// Issue a business's token through the gateway and record it
    pub async fn create_token(&self, business_id: BusinessId, params: TokenParams) -> Result<Token> {
        validate_token_params(&params)?;

        let business = self.store.get_business(business_id)?;
        if let Some(existing) = self.store.get_token_by_business(business_id)? {
            return Err(Error::Conflict(format!(
                "business {business_id} already issued token {}",
                existing.id
            )));
        }

        let address = tokio::time::timeout(
            self.config.settlement.timeout(),
            self.gateway.create_token(&params),
        )
        .await
        .map_err(|_| Error::Other("token issuance timed out".to_string()))?
        .map_err(|e| Error::Other(format!("token issuance failed: {e}")))?;

        let token = self.store.create_token(NewToken {
            business_id,
            name: params.name,
            symbol: params.symbol,
            supply: params.supply,
            decimals: params.decimals,
            mintable: params.mintable,
            freezable: params.freezable,
            mint_authority: business.wallet_address,
            address,
        })?;

        info!(
            token_id = %token.id,
            business_id = %business_id,
            symbol = %token.symbol,
            supply = token.supply,
            "Token issued"
        );
        Ok(token)
    }

    /// Raise a token's declared supply. Does not create spendable balance.
    pub fn mint_additional_tokens(&self, token_id: TokenId, amount: u64) -> Result<Token> {
        if amount == 0 {
            return Err(Error::Validation("mint amount must be positive".to_string()));
        }

        let token = self.store.increase_token_supply(token_id, amount)?;
        self.metrics.record_minted(amount);
        info!(token_id = %token_id, amount, supply = token.supply, "Additional supply minted");
        Ok(token)
    }

    // Rewards

    /// Reward by id
    pub fn get_reward(&self, id: RewardId) -> Result<Reward> {
        self.store.get_reward(id)
    }

    /// Rewards offered by a business
    pub fn list_rewards(&self, business_id: BusinessId) -> Result<Vec<Reward>> {
        self.store.list_rewards_by_business(business_id)
    }

    /// Offer a new reward
    pub fn create_reward(&self, reward: NewReward) -> Result<Reward> {
        let reward = self.store.create_reward(reward)?;
        info!(reward_id = %reward.id, business_id = %reward.business_id, cost = reward.token_cost, "Reward created");
        Ok(reward)
    }

    /// Patch a reward. Identity and owner never change.
    pub fn update_reward(&self, id: RewardId, update: RewardUpdate) -> Result<Reward> {
        if update.is_empty() {
            return self.store.get_reward(id);
        }
        let reward = self.store.update_reward(id, &update)?;
        info!(reward_id = %id, "Reward updated");
        Ok(reward)
    }

    // Transactions and balances

    /// Transaction by id
    pub fn get_transaction(&self, id: TransactionId) -> Result<Transaction> {
        self.store.get_transaction(id)
    }

    /// A user's transactions, most recent first
    pub fn list_transactions_by_user(&self, user_id: UserId) -> Result<Vec<Transaction>> {
        self.store.list_transactions_by_user(user_id)
    }

    /// A business's transactions, most recent first
    pub fn list_transactions_by_business(&self, business_id: BusinessId) -> Result<Vec<Transaction>> {
        self.store.list_transactions_by_business(business_id)
    }

    /// Move a pending transaction to a terminal status outside the
    /// settlement workflows, e.g. when reconciling with the gateway
    pub fn update_transaction_status(
        &self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<Transaction> {
        let tx = self.store.update_transaction_status(id, status)?;

        if let Some(user_id) = tx.user_id {
            if let Some(token) = self.store.get_token_by_business(tx.business_id)? {
                self.balances.invalidate(user_id, token.id);
            }
        }
        match status {
            TransactionStatus::Completed => self.metrics.record_completed(tx.tx_type),
            TransactionStatus::Failed => self.metrics.record_failed(tx.tx_type),
            TransactionStatus::Pending => {}
        }

        info!(transaction_id = %id, %status, "Transaction status updated");
        Ok(tx)
    }

    /// Authoritative balance derived from completed transactions
    pub fn balance_of(&self, user_id: UserId, token_id: TokenId) -> Result<i64> {
        self.balances.balance_of(user_id, token_id)
    }

    /// Balance reported by the gateway. Informational only.
    pub async fn on_chain_balance(&self, user_id: UserId, token_id: TokenId) -> Result<i64> {
        let wallet = self.user_wallet(&self.store.get_user(user_id)?)?;
        let token = self.store.get_token(token_id)?;

        tokio::time::timeout(
            self.config.settlement.timeout(),
            self.gateway.get_balance(&wallet, &token.token_ref()),
        )
        .await
        .map_err(|_| Error::Other("balance query timed out".to_string()))?
        .map_err(|e| Error::Other(format!("balance query failed: {e}")))
    }

    /// Credit `amount` tokens to a user
    pub async fn earn(
        &self,
        user_id: UserId,
        business_id: BusinessId,
        amount: i64,
        description: impl Into<String>,
        token_ref: &TokenRef,
    ) -> Result<Transaction> {
        if amount <= 0 {
            return Err(Error::Validation(format!(
                "earn amount must be positive, got {amount}"
            )));
        }

        let user = self.store.get_user(user_id)?;
        let user_wallet = self.user_wallet(&user)?;
        let business = self.store.get_business(business_id)?;
        let token = self.resolve_token(business_id, token_ref)?;

        let _lock = self.balance_locks.acquire(user_id, token.id).await;

        let current = self.balances.balance_of(user_id, token.id)?;
        if current.checked_add(amount).is_none() {
            return Err(Error::Validation(format!(
                "earning {amount} would overflow the balance of user {user_id}"
            )));
        }

        let pending = PendingSettlement::begin(
            self.store.clone(),
            NewTransaction {
                user_id: Some(user_id),
                business_id,
                tx_type: TransactionType::Earn,
                amount,
                description: Some(description.into()),
                created_at: None,
            },
        )?;
        self.metrics.record_created(TransactionType::Earn);

        let outcome = self
            .settle(TransferRequest {
                transaction_id: pending.transaction().id,
                from: business.wallet_address,
                to: user_wallet,
                token: token.token_ref(),
                amount: amount.unsigned_abs(),
            })
            .await;

        self.finish(pending, outcome, user_id, token.id)
    }

    /// Exchange tokens for a reward
    pub async fn redeem(
        &self,
        user_id: UserId,
        business_id: BusinessId,
        reward_id: RewardId,
        token_ref: &TokenRef,
    ) -> Result<Transaction> {
        let reward = self.store.get_reward(reward_id)?;
        if reward.business_id != business_id {
            return Err(Error::Validation(format!(
                "reward {reward_id} belongs to business {}, not {business_id}",
                reward.business_id
            )));
        }
        if !reward.is_active {
            return Err(Error::Validation(format!("reward {reward_id} is not active")));
        }

        let user = self.store.get_user(user_id)?;
        let user_wallet = self.user_wallet(&user)?;
        let business = self.store.get_business(business_id)?;
        let token = self.resolve_token(business_id, token_ref)?;

        // Held until the transaction is terminal so a concurrent workflow
        // checks against the settled outcome of this one.
        let _lock = self.balance_locks.acquire(user_id, token.id).await;

        let cost = reward.token_cost;
        let available = self.balances.balance_of(user_id, token.id)?;
        if available < cost {
            self.metrics.record_redemption_rejected();
            warn!(
                user_id = %user_id,
                reward_id = %reward_id,
                required = cost,
                available,
                "Redemption rejected: insufficient balance"
            );
            return Err(Error::InsufficientBalance {
                required: cost,
                available,
            });
        }

        let pending = PendingSettlement::begin(
            self.store.clone(),
            NewTransaction {
                user_id: Some(user_id),
                business_id,
                tx_type: TransactionType::Redeem,
                amount: -cost,
                description: Some(format!("Redeemed: {}", reward.name)),
                created_at: None,
            },
        )?;
        self.metrics.record_created(TransactionType::Redeem);

        let outcome = self
            .settle(TransferRequest {
                transaction_id: pending.transaction().id,
                from: user_wallet,
                to: business.wallet_address,
                token: token.token_ref(),
                amount: cost.unsigned_abs(),
            })
            .await;

        self.finish(pending, outcome, user_id, token.id)
    }

    /// Call the gateway under the configured timeout
    async fn settle(&self, request: TransferRequest) -> std::result::Result<TransferReceipt, String> {
        let started = Instant::now();
        let result = tokio::time::timeout(
            self.config.settlement.timeout(),
            self.gateway.transfer(&request),
        )
        .await;
        self.metrics
            .record_settlement_duration(started.elapsed().as_secs_f64());

        match result {
            Ok(Ok(receipt)) => Ok(receipt),
            Ok(Err(GatewayError::Rejected(reason))) => Err(reason),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "timed out after {}ms",
                self.config.settlement.timeout_ms
            )),
        }
    }

    /// Move a pending transaction to its terminal status
    fn finish(
        &self,
        pending: PendingSettlement,
        outcome: std::result::Result<TransferReceipt, String>,
        user_id: UserId,
        token_id: TokenId,
    ) -> Result<Transaction> {
        let tx_type = pending.transaction().tx_type;
        let transaction_id = pending.transaction().id;

        match outcome {
            Ok(receipt) => {
                let tx = pending.complete()?;
                self.balances.invalidate(user_id, token_id);
                self.metrics.record_completed(tx_type);
                info!(
                    transaction_id = %tx.id,
                    user_id = %user_id,
                    business_id = %tx.business_id,
                    amount = tx.amount,
                    reference = %receipt.reference,
                    "{} settled",
                    tx_type
                );
                Ok(tx)
            }
            Err(reason) => {
                pending.fail()?;
                self.metrics.record_failed(tx_type);
                warn!(
                    transaction_id = %transaction_id,
                    user_id = %user_id,
                    %reason,
                    "{} settlement failed",
                    tx_type
                );
                Err(Error::SettlementFailure {
                    transaction_id: transaction_id.get(),
                    reason,
                })
            }
        }
    }

    fn user_wallet(&self, user: &User) -> Result<String> {
        user.wallet_address.clone().ok_or_else(|| {
            Error::Validation(format!("user {} has no linked wallet", user.id))
        })
    }

    fn resolve_token(&self, business_id: BusinessId, token_ref: &TokenRef) -> Result<Token> {
        let token = self.store.get_token(token_ref.token_id)?;
        if token.business_id != business_id {
            return Err(Error::Validation(format!(
                "token {} is not issued by business {business_id}",
                token.id
            )));
        }
        if token.address != token_ref.address {
            return Err(Error::Validation(format!(
                "token reference address {} does not match token {}",
                token_ref.address, token.id
            )));
        }
        Ok(token)
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("service", &self.config.service_name)
            .field("stats", &self.store.stats())
            .field("balances", &self.balances)
            .finish_non_exhaustive()
    }
}

fn validate_token_params(params: &TokenParams) -> Result<()> {
    if params.name.trim().is_empty() {
        return Err(Error::Validation("token name must not be empty".to_string()));
    }
    if params.symbol.trim().is_empty() {
        return Err(Error::Validation("token symbol must not be empty".to_string()));
    }
    if params.supply == 0 {
        return Err(Error::Validation("token supply must be positive".to_string()));
    }
    if params.decimals > MAX_DECIMALS {
        return Err(Error::Validation(format!(
            "token decimals must be at most {MAX_DECIMALS}, got {}",
            params.decimals
        )));
    }
    Ok(())
}
