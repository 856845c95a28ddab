//! # Core Library
//!
//! Configuration, error taxonomy, on-chain record models and derived view objects
//! shared by every GreenStake layer.

pub mod config;
pub mod dto;
pub mod error;
pub mod model;

// Re-export commonly used types
pub use config::{Config, ContractEntry, ContractsConfig};
pub use error::{AppError, ErrorCategory, ErrorKind, Result};
pub use model::{Address, DonationRecord, MemberRecord, ProjectId, ProjectRecord, ProjectRequest, Wei};
