//! Error types for the loyalty ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Referenced entity (by id, wallet address or username) does not exist
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Entity kind ("user", "business", ...)
        entity: &'static str,
        /// The key that was looked up
        key: String,
    },

    /// Unique constraint violation on create
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed or out-of-range input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Mint requested on a token issued with `mintable` unset
    #[error("Token {0} is not mintable")]
    NotMintable(u64),

    /// Redemption beyond the derived balance
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Token cost of the reward
        required: i64,
        /// Derived balance at the time of the check
        available: i64,
    },

    /// Settlement gateway rejected the transfer or timed out.
    /// The transaction has been recorded as failed.
    #[error("Settlement failed for transaction {transaction_id}: {reason}")]
    SettlementFailure {
        /// Id of the transaction that was marked failed
        transaction_id: u64,
        /// Gateway-supplied reason
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Coarse error classification for transport collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`Error::NotFound`]
    NotFound,
    /// See [`Error::Conflict`]
    Conflict,
    /// See [`Error::Validation`]
    Validation,
    /// See [`Error::NotMintable`]
    NotMintable,
    /// See [`Error::InsufficientBalance`]
    InsufficientBalance,
    /// See [`Error::SettlementFailure`]
    SettlementFailure,
    /// Configuration, IO and other infrastructure failures
    Internal,
}

impl Error {
    /// Shorthand for a [`Error::NotFound`]
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Error::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Validation(_) => ErrorKind::Validation,
            Error::NotMintable(_) => ErrorKind::NotMintable,
            Error::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            Error::SettlementFailure { .. } => ErrorKind::SettlementFailure,
            Error::Config(_) | Error::Metrics(_) | Error::Io(_) | Error::Other(_) => {
                ErrorKind::Internal
            }
        }
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
