//! Settlement gateway port
//!
//! The ledger never moves value itself. It asks a [`SettlementGateway`] to
//! transfer tokens between wallets and records the outcome. The gateway does
//! not guarantee idempotency, so every request carries the ledger
//! transaction id as a deduplication key.

use crate::types::{TokenParams, TokenRef, TransactionId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

/// Gateway-side failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The transfer or issuance was refused
    #[error("rejected: {0}")]
    Rejected(String),

    /// The gateway could not be reached
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Transfer instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Ledger transaction, used as the deduplication key
    pub transaction_id: TransactionId,
    /// Debited wallet
    pub from: String,
    /// Credited wallet
    pub to: String,
    /// Token being moved
    pub token: TokenRef,
    /// Magnitude, always positive
    pub amount: u64,
}

/// Successful transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    /// Gateway-side reference
    pub reference: String,
    /// When the gateway accepted the transfer
    pub settled_at: DateTime<Utc>,
}

/// External settlement collaborator
#[async_trait]
pub trait SettlementGateway: Send + Sync {
    /// Move `amount` of a token between wallets
    async fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt, GatewayError>;

    /// Issue a token and return its external address
    async fn create_token(&self, params: &TokenParams) -> Result<String, GatewayError>;

    /// Informational holder balance; never authoritative for the ledger
    async fn get_balance(&self, wallet: &str, token: &TokenRef) -> Result<i64, GatewayError>;
}

/// Scripted behaviour for [`MockGateway`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MockMode {
    /// Succeed according to the configured success rate
    Normal = 0,
    /// Reject every transfer
    Reject = 1,
    /// Never answer a transfer
    Hang = 2,
}

impl MockMode {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => MockMode::Reject,
            2 => MockMode::Hang,
            _ => MockMode::Normal,
        }
    }
}

/// In-process gateway that simulates latency and failures.
///
/// Keeps its own holder balances so `get_balance` reflects transfers it
/// accepted.
pub struct MockGateway {
    latency_ms: u64,
    success_rate: f64,
    mode: AtomicU8,
    receipts: RwLock<HashMap<TransactionId, TransferReceipt>>,
    holdings: RwLock<HashMap<(String, String), i64>>,
}

impl MockGateway {
    /// Create a mock with fixed latency and a success probability in `[0, 1]`
    pub fn new(latency_ms: u64, success_rate: f64) -> Self {
        Self {
            latency_ms,
            success_rate: success_rate.clamp(0.0, 1.0),
            mode: AtomicU8::new(MockMode::Normal as u8),
            receipts: RwLock::new(HashMap::new()),
            holdings: RwLock::new(HashMap::new()),
        }
    }

    /// Instant, always-successful mock
    pub fn reliable() -> Self {
        Self::new(0, 1.0)
    }

    /// Change behaviour for subsequent transfers
    pub fn set_mode(&self, mode: MockMode) {
        self.mode.store(mode as u8, Ordering::SeqCst);
    }

    /// Number of distinct transfers accepted
    pub async fn transfer_count(&self) -> usize {
        self.receipts.read().await.len()
    }

    fn should_succeed(&self) -> bool {
        let mut rng = rand::thread_rng();
        rng.gen::<f64>() < self.success_rate || self.success_rate >= 1.0
    }

    async fn simulate_latency(&self) {
        if self.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.latency_ms)).await;
        }
    }
}

impl std::fmt::Debug for MockGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockGateway")
            .field("latency_ms", &self.latency_ms)
            .field("success_rate", &self.success_rate)
            .field("mode", &MockMode::from_u8(self.mode.load(Ordering::SeqCst)))
            .finish()
    }
}

#[async_trait]
impl SettlementGateway for MockGateway {
    async fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt, GatewayError> {
        info!(
            transaction_id = %request.transaction_id,
            amount = request.amount,
            "Mock gateway: transferring {} of {} from {} to {}",
            request.amount, request.token.address, request.from, request.to
        );

        self.simulate_latency().await;

        match MockMode::from_u8(self.mode.load(Ordering::SeqCst)) {
            MockMode::Hang => std::future::pending::<()>().await,
            MockMode::Reject => {
                warn!(transaction_id = %request.transaction_id, "Mock gateway: scripted rejection");
                return Err(GatewayError::Rejected("scripted rejection".to_string()));
            }
            MockMode::Normal => {}
        }

        if let Some(existing) = self.receipts.read().await.get(&request.transaction_id) {
            return Ok(existing.clone());
        }

        if !self.should_succeed() {
            warn!(transaction_id = %request.transaction_id, "Mock gateway: simulated failure");
            return Err(GatewayError::Rejected("simulated transfer failure".to_string()));
        }

        let mut receipts = self.receipts.write().await;
        // Re-check under the write lock so a retried id never settles twice
        if let Some(existing) = receipts.get(&request.transaction_id) {
            return Ok(existing.clone());
        }

        let mut holdings = self.holdings.write().await;
        let amount = i64::try_from(request.amount).map_err(|_| {
            GatewayError::Rejected(format!("amount {} out of range", request.amount))
        })?;
        let from_key = (request.from.clone(), request.token.address.clone());
        let to_key = (request.to.clone(), request.token.address.clone());
        let from_after = holdings
            .get(&from_key)
            .copied()
            .unwrap_or(0)
            .checked_sub(amount)
            .ok_or_else(|| {
                GatewayError::Rejected(format!("holdings of {} overflow", request.from))
            })?;
        let to_after = holdings
            .get(&to_key)
            .copied()
            .unwrap_or(0)
            .checked_add(amount)
            .ok_or_else(|| {
                GatewayError::Rejected(format!("holdings of {} overflow", request.to))
            })?;
        holdings.insert(from_key, from_after);
        holdings.insert(to_key, to_after);

        let receipt = TransferReceipt {
            reference: format!("MOCK-{}", Uuid::new_v4()),
            settled_at: Utc::now(),
        };
        receipts.insert(request.transaction_id, receipt.clone());

        Ok(receipt)
    }

    async fn create_token(&self, params: &TokenParams) -> Result<String, GatewayError> {
        self.simulate_latency().await;

        if MockMode::from_u8(self.mode.load(Ordering::SeqCst)) == MockMode::Reject {
            return Err(GatewayError::Rejected("scripted rejection".to_string()));
        }

        let simple = Uuid::new_v4().simple().to_string();
        let address = format!("So1{}", &simple[..8]);
        info!(symbol = %params.symbol, %address, "Mock gateway: token issued");
        Ok(address)
    }

    async fn get_balance(&self, wallet: &str, token: &TokenRef) -> Result<i64, GatewayError> {
        self.simulate_latency().await;

        Ok(self
            .holdings
            .read()
            .await
            .get(&(wallet.to_string(), token.address.clone()))
            .copied()
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TokenId;

    fn request(id: u64, amount: u64) -> TransferRequest {
        TransferRequest {
            transaction_id: TransactionId(id),
            from: "business".to_string(),
            to: "customer".to_string(),
            token: TokenRef {
                token_id: TokenId(1),
                address: "So1test".to_string(),
            },
            amount,
        }
    }

    #[tokio::test]
    async fn test_transfer_moves_holdings() {
        let gateway = MockGateway::reliable();
        gateway.transfer(&request(1, 40)).await.unwrap();

        let token = request(0, 0).token;
        assert_eq!(gateway.get_balance("customer", &token).await.unwrap(), 40);
        assert_eq!(gateway.get_balance("business", &token).await.unwrap(), -40);
    }

    #[tokio::test]
    async fn test_transfer_deduplicates_by_transaction() {
        let gateway = MockGateway::reliable();
        let first = gateway.transfer(&request(7, 10)).await.unwrap();
        let second = gateway.transfer(&request(7, 10)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(gateway.transfer_count().await, 1);
        let token = request(0, 0).token;
        assert_eq!(gateway.get_balance("customer", &token).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_holdings_overflow_is_rejected() {
        let gateway = MockGateway::reliable();
        gateway.transfer(&request(1, i64::MAX as u64)).await.unwrap();

        let err = gateway.transfer(&request(2, 1)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Rejected(_)));
        assert_eq!(gateway.transfer_count().await, 1);

        let token = request(0, 0).token;
        assert_eq!(gateway.get_balance("customer", &token).await.unwrap(), i64::MAX);
        assert_eq!(gateway.get_balance("business", &token).await.unwrap(), -i64::MAX);
    }

    #[tokio::test]
    async fn test_scripted_rejection() {
        let gateway = MockGateway::reliable();
        gateway.set_mode(MockMode::Reject);
        let err = gateway.transfer(&request(1, 10)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Rejected(_)));
        assert_eq!(gateway.transfer_count().await, 0);
    }

    #[tokio::test]
    async fn test_zero_success_rate_always_fails() {
        let gateway = MockGateway::new(0, 0.0);
        assert!(gateway.transfer(&request(1, 10)).await.is_err());
    }

    #[tokio::test]
    async fn test_create_token_address() {
        let gateway = MockGateway::reliable();
        let address = gateway
            .create_token(&TokenParams {
                name: "Bean".to_string(),
                symbol: "BEAN".to_string(),
                supply: 10,
                decimals: 6,
                mintable: false,
                freezable: false,
            })
            .await
            .unwrap();
        assert!(address.starts_with("So1"));
        assert_eq!(address.len(), 11);
    }
}
