//! Loyalty Ledger Engine
//!
//! Token-based loyalty ledger for businesses and their customers.
//!
//! # Architecture
//!
//! - **Derived balances**: A balance is the sum of completed transactions, never a stored counter
//! - **Pending first**: Every earn or redeem is recorded `pending` before settlement is attempted
//! - **Settlement port**: Value moves through a pluggable [`gateway::SettlementGateway`]
//! - **Serialized redemptions**: One in-flight redemption per (user, token)
//!
//! # Invariants
//!
//! - Earn amounts are positive, redeem amounts are negative
//! - Status only moves from `pending` to `completed` or `failed`
//! - A redemption never drives a derived balance below zero

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod balance;
pub mod config;
pub mod error;
pub mod gateway;
pub mod guard;
pub mod ledger;
pub mod metrics;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use gateway::{GatewayError, MockGateway, MockMode, SettlementGateway};
pub use ledger::Ledger;
pub use storage::{EntityStore, MemoryStore};
pub use types::{
    Business, BusinessId, Reward, RewardId, Token, TokenId, TokenRef, Transaction,
    TransactionId, TransactionStatus, TransactionType, User, UserId, WalletIdentity,
};
