use crate::model::{Address, ProjectId, Wei};
use lib_utils::{format_ether, format_timestamp};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActivityKind {
    ProjectListed,
    Voted,
    Donation,
}

/// One line of the viewer's activity history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileActivity {
    pub kind: ActivityKind,
    pub project_id: ProjectId,
    pub project_name: String,
    /// Set for donations.
    pub amount: Option<Wei>,
    /// Unix seconds. Listing and voting events carry no on-chain timestamp.
    pub timestamp: Option<i64>,
}

impl ProfileActivity {
    /// Donation amount in ether.
    pub fn amount_display(&self) -> Option<String> {
        self.amount.map(format_ether)
    }

    pub fn timestamp_display(&self) -> Option<String> {
        self.timestamp.map(format_timestamp)
    }
}

/// Per-account statistics across all projects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileSummary {
    pub address: Address,
    pub projects_listed: u64,
    pub total_donated: Wei,
    pub is_dao_member: bool,
    pub votes_cast: u64,
    /// Newest first; untimed entries lead in discovery order.
    pub activities: Vec<ProfileActivity>,
}

impl ProfileSummary {
    pub fn sort_activities(activities: &mut [ProfileActivity]) {
        activities.sort_by_key(|a| std::cmp::Reverse(a.timestamp.unwrap_or(i64::MAX)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(kind: ActivityKind, id: ProjectId, timestamp: Option<i64>) -> ProfileActivity {
        ProfileActivity { kind, project_id: id, project_name: format!("p{id}"), amount: None, timestamp }
    }

    #[test]
    fn untimed_first_then_newest() {
        let mut list = vec![
            activity(ActivityKind::Donation, 1, Some(100)),
            activity(ActivityKind::ProjectListed, 2, None),
            activity(ActivityKind::Donation, 3, Some(300)),
            activity(ActivityKind::Voted, 4, None),
        ];
        ProfileSummary::sort_activities(&mut list);
        let ids: Vec<_> = list.iter().map(|a| a.project_id).collect();
        assert_eq!(ids, vec![2, 4, 3, 1]);
    }

    #[test]
    fn donation_display() {
        let donation = ProfileActivity {
            amount: Some(50_000_000_000_000_000),
            ..activity(ActivityKind::Donation, 7, Some(0))
        };
        assert_eq!(donation.amount_display().as_deref(), Some("0.05"));
        assert_eq!(donation.timestamp_display().as_deref(), Some("1970-01-01T00:00:00+00:00"));
        assert!(activity(ActivityKind::Voted, 7, None).timestamp_display().is_none());
    }
}
