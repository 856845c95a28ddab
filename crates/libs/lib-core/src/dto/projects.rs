use super::{RequestStatus, VoteTally};
use crate::model::{Address, ProjectId, Wei};
use lib_utils::{format_date, format_ether, format_fixed};
use serde::Serialize;

/// A listed project joined with its DAO request and donation total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedProjectView {
    pub id: ProjectId,
    pub name: String,
    pub description: String,
    pub owner: Address,
    /// Listing flag AND DAO flag. Both contracts must agree.
    pub is_approved: bool,
    pub is_processed: bool,
    pub status: RequestStatus,
    pub yes_votes: u64,
    pub no_votes: u64,
    pub has_voted: bool,
    pub total_donations: Wei,
    /// Unix seconds.
    pub subscription_end_time: i64,
    pub video_url: Option<String>,
}

impl ListedProjectView {
    pub fn approval_label(&self) -> &'static str {
        if self.is_approved {
            "Approved"
        } else {
            "Pending Approval"
        }
    }

    /// Total in ether, e.g. `"0.35"`.
    pub fn total_donations_display(&self) -> String {
        format_ether(self.total_donations)
    }

    /// Total in ether with four decimals, e.g. `"0.3500"`.
    pub fn total_donations_fixed(&self) -> String {
        format_fixed(self.total_donations, 4)
    }

    pub fn subscription_end_date(&self) -> String {
        format_date(self.subscription_end_time)
    }

    /// Only approved projects accept donations.
    pub fn accepts_donations(&self) -> bool {
        self.is_approved
    }
}

/// A project as seen from the DAO screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaoRequestView {
    pub project_id: ProjectId,
    pub name: String,
    pub description: String,
    pub owner: Address,
    pub status: RequestStatus,
    pub tally: VoteTally,
    pub is_processed: bool,
    pub is_approved: bool,
    pub has_voted: bool,
    /// False while the project has no DAO request (sentinel id zero).
    pub in_dao: bool,
    /// Vote-Yes / Vote-No are enabled.
    pub can_vote: bool,
}

/// Membership and governance figures for the viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaoOverview {
    pub viewer: Address,
    pub is_member: bool,
    pub staked_amount: Wei,
    pub member_count: u64,
    pub members: Vec<Address>,
    pub total_staked: Wei,
    pub min_stake_amount: Wei,
    pub quorum: u64,
    pub requests: Vec<DaoRequestView>,
}

impl DaoOverview {
    pub fn pending_requests(&self) -> impl Iterator<Item = &DaoRequestView> {
        self.requests.iter().filter(|r| r.status == RequestStatus::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(total: Wei, approved: bool) -> ListedProjectView {
        ListedProjectView {
            id: 7,
            name: "Mangrove Restoration".into(),
            description: "Replanting coastal mangroves".into(),
            owner: Address::repeat_byte(1),
            is_approved: approved,
            is_processed: approved,
            status: RequestStatus::Pending,
            yes_votes: 0,
            no_votes: 0,
            has_voted: false,
            total_donations: total,
            subscription_end_time: 1_709_251_200,
            video_url: None,
        }
    }

    #[test]
    fn display_helpers() {
        let v = view(350_000_000_000_000_000, true);
        assert_eq!(v.total_donations_display(), "0.35");
        assert_eq!(v.total_donations_fixed(), "0.3500");
        assert_eq!(v.subscription_end_date(), "2024-03-01");
        assert_eq!(v.approval_label(), "Approved");
        assert!(v.accepts_donations());
    }

    #[test]
    fn unapproved_projects_refuse_donations() {
        let v = view(0, false);
        assert_eq!(v.approval_label(), "Pending Approval");
        assert!(!v.accepts_donations());
    }
}
