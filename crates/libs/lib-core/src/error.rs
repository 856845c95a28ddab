//! # Centralized Error Handling
//!
//! [`AppError`] is the single error type surfaced by the connection, registry and
//! transaction layers. It follows the `thiserror` pattern.
//!
//! ## Error Categories
//!
//! 1. **Connection** - terminal for the session until the user acts
//!    - [`WalletNotFound`](AppError::WalletNotFound), [`NotConnected`](AppError::NotConnected),
//!      [`WrongNetwork`](AppError::WrongNetwork), [`ContractsUnavailable`](AppError::ContractsUnavailable)
//!
//! 2. **Precondition** - rejected locally, nothing was sent to a contract
//!    - [`InvalidInput`](AppError::InvalidInput), [`NotMember`](AppError::NotMember),
//!      [`AlreadyVoted`](AppError::AlreadyVoted), [`AlreadyProcessed`](AppError::AlreadyProcessed)
//!
//! 3. **Transaction** - reported after submission; the chain may or may not have changed
//!    - [`UserRejected`](AppError::UserRejected), [`InsufficientFunds`](AppError::InsufficientFunds),
//!      [`Transaction`](AppError::Transaction)
//!
//! 4. **Internal** - configuration, read transport and decoding failures
//!    - [`Config`](AppError::Config), [`Rpc`](AppError::Rpc), [`Decoding`](AppError::Decoding),
//!      [`Internal`](AppError::Internal)
//!
//! Per-item enumeration faults never become an `AppError`; the aggregator logs and
//! skips them.
//!
//! ## Usage Example
//!
//! ```rust
//! use lib_core::error::{AppError, ErrorKind, Result};
//!
//! fn check_amount(wei: u128) -> Result<u128> {
//!     if wei == 0 {
//!         return Err(AppError::InvalidInput(
//!             "Please enter a valid donation amount".to_string()
//!         ));
//!     }
//!     Ok(wei)
//! }
//!
//! assert_eq!(check_amount(0).unwrap_err().kind(), ErrorKind::InvalidInput);
//! ```

use serde::Serialize;
use thiserror::Error;

/// Convenience type alias for `Result<T, AppError>`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application-wide error type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AppError {
    /// No wallet capability was injected.
    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    /// The wallet is present but no account is connected.
    #[error("Wallet not connected")]
    NotConnected,

    /// The wallet is on another chain and did not switch.
    #[error("Wrong network: expected chain {expected}, wallet is on {actual:?}")]
    WrongNetwork { expected: u64, actual: Option<u64> },

    /// Contract handles could not be built or failed their liveness check.
    #[error("Contracts unavailable: {0}")]
    ContractsUnavailable(String),

    /// Invalid user input. The message is shown as-is.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The viewer is not a DAO member.
    #[error("Not a DAO member")]
    NotMember,

    /// The viewer already voted on this request.
    #[error("Already voted")]
    AlreadyVoted,

    /// The DAO request has already been processed.
    #[error("Project request already processed")]
    AlreadyProcessed,

    /// The user declined the request in the wallet.
    #[error("Transaction rejected by user")]
    UserRejected,

    /// Not enough native currency for value plus gas.
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Any other failed or reverted transaction.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// A read call failed at the transport level.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed configuration artifact or stored data.
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// Unexpected failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Machine-distinguishable error kind, one per [`AppError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    WalletNotFound,
    NotConnected,
    WrongNetwork,
    ContractsUnavailable,
    InvalidInput,
    NotMember,
    AlreadyVoted,
    AlreadyProcessed,
    UserRejected,
    InsufficientFunds,
    Transaction,
    Rpc,
    Config,
    Decoding,
    Internal,
}

/// Coarse grouping used to decide how an error is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCategory {
    Connection,
    Precondition,
    Transaction,
    Internal,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::WalletNotFound(_) => ErrorKind::WalletNotFound,
            AppError::NotConnected => ErrorKind::NotConnected,
            AppError::WrongNetwork { .. } => ErrorKind::WrongNetwork,
            AppError::ContractsUnavailable(_) => ErrorKind::ContractsUnavailable,
            AppError::InvalidInput(_) => ErrorKind::InvalidInput,
            AppError::NotMember => ErrorKind::NotMember,
            AppError::AlreadyVoted => ErrorKind::AlreadyVoted,
            AppError::AlreadyProcessed => ErrorKind::AlreadyProcessed,
            AppError::UserRejected => ErrorKind::UserRejected,
            AppError::InsufficientFunds(_) => ErrorKind::InsufficientFunds,
            AppError::Transaction(_) => ErrorKind::Transaction,
            AppError::Rpc(_) => ErrorKind::Rpc,
            AppError::Config(_) => ErrorKind::Config,
            AppError::Decoding(_) => ErrorKind::Decoding,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::WalletNotFound(_)
            | AppError::NotConnected
            | AppError::WrongNetwork { .. }
            | AppError::ContractsUnavailable(_) => ErrorCategory::Connection,
            AppError::InvalidInput(_)
            | AppError::NotMember
            | AppError::AlreadyVoted
            | AppError::AlreadyProcessed => ErrorCategory::Precondition,
            AppError::UserRejected | AppError::InsufficientFunds(_) | AppError::Transaction(_) => {
                ErrorCategory::Transaction
            }
            AppError::Rpc(_) | AppError::Config(_) | AppError::Decoding(_) | AppError::Internal(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// True when retrying in the same session is pointless until the user acts
    /// (installs a wallet, switches network, reconnects).
    pub fn is_terminal(&self) -> bool {
        matches!(self.category(), ErrorCategory::Connection)
    }

    /// Get a short user-facing message.
    ///
    /// Internal errors return a generic message to avoid leaking details.
    pub fn user_message(&self) -> String {
        match self {
            AppError::WalletNotFound(_) => {
                "No wallet found. Please install a browser wallet to continue.".to_string()
            }
            AppError::NotConnected => "Please connect your wallet to continue".to_string(),
            AppError::WrongNetwork { .. } => "Please switch to the supported network to continue".to_string(),
            AppError::ContractsUnavailable(_) => {
                "Failed to connect to smart contracts. Please check if you are on the correct network."
                    .to_string()
            }
            AppError::InvalidInput(msg) => msg.clone(),
            AppError::NotMember => "You must be a DAO member to vote".to_string(),
            AppError::AlreadyVoted => "You have already voted on this project".to_string(),
            AppError::AlreadyProcessed => "This project request has already been processed".to_string(),
            AppError::UserRejected => "Transaction was rejected. Please try again.".to_string(),
            AppError::InsufficientFunds(_) => {
                "You do not have enough ETH to cover the amount and gas fees.".to_string()
            }
            AppError::Transaction(msg) => msg.clone(),
            AppError::Rpc(_) => "Network temporarily unavailable. Please refresh.".to_string(),
            AppError::Config(_) | AppError::Decoding(_) | AppError::Internal(_) => {
                "An internal error occurred".to_string()
            }
        }
    }
}

/// Convert `anyhow::Error` to `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Convert `serde_json::Error` to `AppError`.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Decoding(format!("JSON error: {}", err))
    }
}

/// Convert `std::io::Error` to `AppError`.
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(format!("I/O error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_follow_taxonomy() {
        assert_eq!(AppError::WalletNotFound("none".into()).category(), ErrorCategory::Connection);
        assert_eq!(
            AppError::WrongNetwork { expected: 421614, actual: Some(1) }.category(),
            ErrorCategory::Connection
        );
        assert_eq!(AppError::AlreadyVoted.category(), ErrorCategory::Precondition);
        assert_eq!(AppError::UserRejected.category(), ErrorCategory::Transaction);
        assert_eq!(AppError::Rpc("timeout".into()).category(), ErrorCategory::Internal);
    }

    #[test]
    fn connection_errors_are_terminal() {
        assert!(AppError::WalletNotFound("none".into()).is_terminal());
        assert!(!AppError::InvalidInput("bad".into()).is_terminal());
        assert!(!AppError::Transaction("reverted".into()).is_terminal());
    }

    #[test]
    fn user_message_hides_internals() {
        let err = AppError::Internal("mutex poisoned at 0xdeadbeef".into());
        assert_eq!(err.user_message(), "An internal error occurred");

        let err = AppError::InvalidInput("Please enter a valid donation amount".into());
        assert_eq!(err.user_message(), "Please enter a valid donation amount");
    }

    #[test]
    fn json_errors_convert_to_decoding() {
        let err: AppError = serde_json::from_str::<u64>("nope").unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::Decoding);
    }
}
