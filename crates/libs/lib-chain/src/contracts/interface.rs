//! # Contract Interface
//!
//! The call boundary consumed by the aggregator and the write coordinator. Each
//! logical contract is an async trait so that a browser-wallet binding, an RPC
//! binding and the in-memory sandbox are interchangeable.

use crate::contracts::pending::PendingTx;
use async_trait::async_trait;
use lib_core::{
    Address, AppError, ContractEntry, DonationRecord, MemberRecord, ProjectId, ProjectRecord,
    ProjectRequest, Wei,
};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Failure of a single contract call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// An indexed getter was asked for an index past the end of its array.
    #[error("index out of range")]
    OutOfRange,

    #[error("execution reverted: {0}")]
    Reverted(String),

    #[error("user rejected the request")]
    Rejected,

    #[error("insufficient funds for gas * price + value")]
    InsufficientFunds,

    #[error("network changed")]
    NetworkChanged,

    #[error("transport error: {0}")]
    Transport(String),
}

pub type CallResult<T> = std::result::Result<T, CallError>;

/// Read failures outside the write path surface as RPC errors.
impl From<CallError> for AppError {
    fn from(err: CallError) -> Self {
        AppError::Rpc(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    ProjectListing,
    Dao,
    Donate,
}

impl ContractKind {
    /// Name used in the contract artifact.
    pub fn name(&self) -> &'static str {
        match self {
            ContractKind::ProjectListing => "ProjectListing",
            ContractKind::Dao => "DAO",
            ContractKind::Donate => "Donate",
        }
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Project listing contract.
#[async_trait]
pub trait ProjectListingContract: Send + Sync {
    fn address(&self) -> &Address;

    async fn owner(&self) -> CallResult<Address>;

    /// `projectIds(index)`. 0-based; fails with [`CallError::OutOfRange`] past the end.
    async fn project_id_at(&self, index: u64) -> CallResult<ProjectId>;

    /// `projectCount()`. Ids run from 1 to the count inclusive.
    async fn project_count(&self) -> CallResult<u64>;

    async fn approved_project_ids(&self) -> CallResult<Vec<ProjectId>>;

    async fn get_project(&self, id: ProjectId) -> CallResult<ProjectRecord>;

    /// Payable; `value` must equal the subscription fee.
    async fn list_project(&self, name: &str, description: &str, value: Wei) -> CallResult<PendingTx>;
}

/// DAO governance contract.
#[async_trait]
pub trait DaoContract: Send + Sync {
    fn address(&self) -> &Address;

    async fn owner(&self) -> CallResult<Address>;

    async fn is_member(&self, account: &Address) -> CallResult<bool>;

    /// `members(account)`.
    async fn member(&self, account: &Address) -> CallResult<MemberRecord>;

    async fn member_count(&self) -> CallResult<u64>;

    async fn total_staked(&self) -> CallResult<Wei>;

    async fn quorum(&self) -> CallResult<u64>;

    /// `getDAOMembers()`.
    async fn members(&self) -> CallResult<Vec<Address>>;

    /// Returns a zeroed record (project id 0) when no request exists for `id`.
    async fn project_request(&self, id: ProjectId) -> CallResult<ProjectRequest>;

    async fn has_voted(&self, account: &Address, id: ProjectId) -> CallResult<bool>;

    /// Payable; `value` is the stake.
    async fn join_dao(&self, value: Wei) -> CallResult<PendingTx>;

    async fn vote_on_project(&self, id: ProjectId, in_favor: bool) -> CallResult<PendingTx>;
}

/// Donation ledger contract.
#[async_trait]
pub trait DonateContract: Send + Sync {
    fn address(&self) -> &Address;

    async fn owner(&self) -> CallResult<Address>;

    /// `projectDonations(project_id, index)`. 0-based; fails with
    /// [`CallError::OutOfRange`] past the end.
    async fn donation_at(&self, project_id: ProjectId, index: u64) -> CallResult<DonationRecord>;

    /// Payable; `value` is the donation.
    async fn donate(&self, project_id: ProjectId, value: Wei) -> CallResult<PendingTx>;
}

/// Builds handles bound to a signer from the configured address and interface
/// descriptor of each contract.
pub trait ContractFactory: Send + Sync {
    fn project_listing(&self, entry: &ContractEntry, signer: &Address) -> Arc<dyn ProjectListingContract>;

    fn dao(&self, entry: &ContractEntry, signer: &Address) -> Arc<dyn DaoContract>;

    fn donate(&self, entry: &ContractEntry, signer: &Address) -> Arc<dyn DonateContract>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_core::ErrorKind;

    #[test]
    fn call_errors_surface_as_rpc() {
        let err: AppError = CallError::Transport("connection reset".into()).into();
        assert_eq!(err.kind(), ErrorKind::Rpc);
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn kinds_use_artifact_names() {
        assert_eq!(ContractKind::Dao.to_string(), "DAO");
        assert_eq!(ContractKind::ProjectListing.name(), "ProjectListing");
    }
}
