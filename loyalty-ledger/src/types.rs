//! Core types for the loyalty ledger
//!
//! Entity shapes are serialized in camelCase so the transport layer can
//! hand them to clients unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Raw integer value
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

entity_id!(
    /// User identifier
    UserId
);
entity_id!(
    /// Business identifier
    BusinessId
);
entity_id!(
    /// Token identifier
    TokenId
);
entity_id!(
    /// Reward identifier
    RewardId
);
entity_id!(
    /// Transaction identifier
    TransactionId
);

/// Customer account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Assigned by the store
    pub id: UserId,
    /// Unique login name
    pub username: String,
    /// Opaque credential, stored as supplied
    pub password: String,
    /// Wallet used to resolve a connecting client to this user
    pub wallet_address: Option<String>,
}

/// Insert shape for [`User`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewUser {
    /// Unique login name
    pub username: String,
    /// Opaque credential
    pub password: String,
    /// Optional wallet address
    #[serde(default)]
    pub wallet_address: Option<String>,
}

/// A business issuing a loyalty token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Business {
    /// Assigned by the store
    pub id: BusinessId,
    /// Display name
    pub name: String,
    /// Unique among businesses
    pub wallet_address: String,
    /// Ticker the business intends to use
    pub token_symbol: Option<String>,
    /// Token display name the business intends to use
    pub token_name: Option<String>,
}

/// Insert shape for [`Business`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewBusiness {
    /// Display name
    pub name: String,
    /// Wallet address, unique among businesses
    pub wallet_address: String,
    /// Intended ticker
    #[serde(default)]
    pub token_symbol: Option<String>,
    /// Intended token name
    #[serde(default)]
    pub token_name: Option<String>,
}

/// Fungible loyalty token owned by a single business
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// Assigned by the store
    pub id: TokenId,
    /// Owning business
    pub business_id: BusinessId,
    /// Display name
    pub name: String,
    /// Ticker
    pub symbol: String,
    /// Declared total issuance (not a circulating count)
    pub supply: u64,
    /// Decimal places
    pub decimals: u8,
    /// Whether additional issuance is allowed
    pub mintable: bool,
    /// Whether holder accounts can be frozen
    pub freezable: bool,
    /// Wallet holding the mint authority
    pub mint_authority: String,
    /// Address assigned by the settlement gateway
    pub address: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Token {
    /// Reference handed to the settlement gateway
    pub fn token_ref(&self) -> TokenRef {
        TokenRef {
            token_id: self.id,
            address: self.address.clone(),
        }
    }
}

/// Insert shape for [`Token`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewToken {
    /// Owning business
    pub business_id: BusinessId,
    /// Display name
    pub name: String,
    /// Ticker
    pub symbol: String,
    /// Declared issuance
    pub supply: u64,
    /// Decimal places
    pub decimals: u8,
    /// Additional issuance allowed
    pub mintable: bool,
    /// Accounts freezable
    pub freezable: bool,
    /// Mint authority wallet
    pub mint_authority: String,
    /// Gateway-assigned address
    pub address: String,
}

/// Caller-supplied token parameters for issuance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TokenParams {
    /// Display name
    pub name: String,
    /// Ticker
    pub symbol: String,
    /// Initial declared issuance
    pub supply: u64,
    /// Decimal places (at most 9)
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    /// Additional issuance allowed
    #[serde(default)]
    pub mintable: bool,
    /// Accounts freezable
    #[serde(default)]
    pub freezable: bool,
}

fn default_decimals() -> u8 {
    6
}

/// Reference to a token as understood by the settlement gateway
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRef {
    /// Ledger-side token id
    pub token_id: TokenId,
    /// Gateway-side address
    pub address: String,
}

/// Something a customer can redeem tokens for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    /// Assigned by the store
    pub id: RewardId,
    /// Owning business
    pub business_id: BusinessId,
    /// Display name
    pub name: String,
    /// Long description
    pub description: String,
    /// Price in tokens, always positive
    pub token_cost: i64,
    /// Redeemable only while active
    pub is_active: bool,
}

/// Insert shape for [`Reward`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewReward {
    /// Owning business
    pub business_id: BusinessId,
    /// Display name
    pub name: String,
    /// Long description
    pub description: String,
    /// Price in tokens
    pub token_cost: i64,
    /// Defaults to active
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Partial update for a [`Reward`].
///
/// `id` and `businessId` are deliberately absent; patches naming them are
/// rejected at deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RewardUpdate {
    /// New display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New price; applies to future redemptions only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_cost: Option<i64>,
    /// Activate or retire the reward
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl RewardUpdate {
    /// True when the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.token_cost.is_none()
            && self.is_active.is_none()
    }

    /// Merge into a stored reward
    pub fn apply_to(&self, reward: &mut Reward) {
        if let Some(ref name) = self.name {
            reward.name = name.clone();
        }
        if let Some(ref description) = self.description {
            reward.description = description.clone();
        }
        if let Some(cost) = self.token_cost {
            reward.token_cost = cost;
        }
        if let Some(active) = self.is_active {
            reward.is_active = active;
        }
    }
}

/// Direction of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Tokens credited to a user
    Earn,
    /// Tokens debited in exchange for a reward
    Redeem,
}

impl TransactionType {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Earn => "earn",
            TransactionType::Redeem => "redeem",
        }
    }

    /// Whether `amount` carries the sign this type requires
    pub fn accepts_amount(&self, amount: i64) -> bool {
        match self {
            TransactionType::Earn => amount > 0,
            TransactionType::Redeem => amount < 0,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "earn" => Ok(TransactionType::Earn),
            "redeem" => Ok(TransactionType::Redeem),
            other => Err(crate::Error::Validation(format!(
                "invalid transaction type: {other}"
            ))),
        }
    }
}

/// Settlement status of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Created, awaiting settlement
    Pending,
    /// Settled; counts toward balance (terminal)
    Completed,
    /// Settlement did not succeed; kept for audit (terminal)
    Failed,
}

impl TransactionStatus {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    /// Completed or failed
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Completed | TransactionStatus::Failed)
    }

    /// Only `pending -> completed` and `pending -> failed` are legal
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        *self == TransactionStatus::Pending && next.is_terminal()
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(crate::Error::Validation(format!(
                "invalid transaction status: {other}"
            ))),
        }
    }
}

/// Append-only ledger record. Only `status` ever changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Assigned by the store
    pub id: TransactionId,
    /// Absent for flows not attributed to a user
    pub user_id: Option<UserId>,
    /// Business whose token moved
    pub business_id: BusinessId,
    /// Earn or redeem
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    /// Signed amount: positive for earn, negative for redeem
    pub amount: i64,
    /// Human-readable memo
    pub description: Option<String>,
    /// Settlement status
    pub status: TransactionStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Whether this record counts toward a balance
    pub fn is_settled(&self) -> bool {
        self.status == TransactionStatus::Completed
    }
}

/// Insert shape for [`Transaction`]. New records always start `pending`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    /// Attributed user, if any
    pub user_id: Option<UserId>,
    /// Business whose token moves
    pub business_id: BusinessId,
    /// Earn or redeem
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    /// Signed amount
    pub amount: i64,
    /// Memo
    pub description: Option<String>,
    /// Backdated creation time for imported records; `None` means now
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Result of resolving a connecting wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WalletIdentity {
    /// Wallet belongs to a registered user
    User(User),
    /// Wallet belongs to a registered business
    Business(Business),
    /// Nobody has registered this wallet yet
    #[serde(rename = "new")]
    Unregistered {
        /// The wallet that connected
        #[serde(rename = "walletAddress")]
        wallet_address: String,
    },
}
