use super::{Address, ProjectId, Wei};
use serde::{Deserialize, Serialize};

/// A project as stored by the project-listing contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: ProjectId,
    pub name: String,
    pub description: String,
    pub owner: Address,
    pub is_listed: bool,
    /// The listing contract's own approval flag. Only half of the derived approval.
    pub is_approved: bool,
    /// Running total kept by the listing contract.
    pub total_donations: Wei,
    /// Unix seconds.
    pub subscription_end_time: i64,
}

/// A DAO voting record for one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRequest {
    /// Zero when no request has been created for the queried id.
    pub project_id: ProjectId,
    pub name: String,
    pub description: String,
    pub project_owner: Option<Address>,
    pub yes_votes: u64,
    pub no_votes: u64,
    pub is_processed: bool,
    pub is_approved: bool,
}

impl ProjectRequest {
    /// A request exists only when the contract returned a non-zero project id.
    pub fn exists(&self) -> bool {
        self.project_id != 0
    }

    pub fn total_votes(&self) -> u64 {
        self.yes_votes.saturating_add(self.no_votes)
    }
}

/// One donation event from the donation ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationRecord {
    pub donor: Address,
    pub amount: Wei,
    /// Unix seconds.
    pub timestamp: i64,
}

/// DAO membership of one account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub is_member: bool,
    pub staked_amount: Wei,
}
