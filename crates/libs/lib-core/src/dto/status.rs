use crate::model::ProjectRequest;
use serde::Serialize;

/// Where a project stands in DAO governance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RequestStatus {
    /// No DAO request exists yet (on-chain project id is zero).
    AwaitingDaoVoting,
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn of(request: Option<&ProjectRequest>) -> Self {
        match request {
            Some(r) if r.exists() => {
                if !r.is_processed {
                    RequestStatus::Pending
                } else if r.is_approved {
                    RequestStatus::Approved
                } else {
                    RequestStatus::Rejected
                }
            }
            _ => RequestStatus::AwaitingDaoVoting,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RequestStatus::AwaitingDaoVoting => "Awaiting DAO Voting",
            RequestStatus::Pending => "Pending",
            RequestStatus::Approved => "Approved",
            RequestStatus::Rejected => "Rejected",
        }
    }
}

/// Vote counts measured against the DAO's quorum.
///
/// Quorum is never reached without a single vote, even in an empty DAO.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    pub yes_votes: u64,
    pub no_votes: u64,
    pub total_votes: u64,
    pub quorum: u64,
    pub quorum_reached: bool,
}

impl VoteTally {
    pub fn new(yes_votes: u64, no_votes: u64, quorum: u64) -> Self {
        let total_votes = yes_votes.saturating_add(no_votes);
        Self {
            yes_votes,
            no_votes,
            total_votes,
            quorum,
            quorum_reached: total_votes > 0 && total_votes >= quorum,
        }
    }

    /// Half the member count rounded up.
    pub fn quorum_for(member_count: u64) -> u64 {
        member_count.div_ceil(2)
    }

    /// Progress towards quorum in percent, capped at 100.
    pub fn progress_percent(&self) -> u64 {
        if self.quorum == 0 {
            return if self.total_votes > 0 { 100 } else { 0 };
        }
        (self.total_votes.saturating_mul(100) / self.quorum).min(100)
    }

    /// `"5 / 3 votes"`
    pub fn progress_label(&self) -> String {
        format!("{} / {} votes", self.total_votes, self.quorum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_request_flags() {
        assert_eq!(RequestStatus::of(None), RequestStatus::AwaitingDaoVoting);
        assert_eq!(
            RequestStatus::of(Some(&ProjectRequest::default())),
            RequestStatus::AwaitingDaoVoting
        );

        let mut request = ProjectRequest { project_id: 3, ..Default::default() };
        assert_eq!(RequestStatus::of(Some(&request)), RequestStatus::Pending);
        request.is_processed = true;
        assert_eq!(RequestStatus::of(Some(&request)), RequestStatus::Rejected);
        request.is_approved = true;
        assert_eq!(RequestStatus::of(Some(&request)), RequestStatus::Approved);
    }

    #[test]
    fn quorum_is_half_rounded_up() {
        assert_eq!(VoteTally::quorum_for(5), 3);
        assert_eq!(VoteTally::quorum_for(4), 2);
        let tally = VoteTally::new(4, 1, VoteTally::quorum_for(5));
        assert_eq!(tally.quorum, 3);
        assert_eq!(tally.total_votes, 5);
        assert!(tally.quorum_reached);
        assert_eq!(tally.progress_label(), "5 / 3 votes");
        assert_eq!(tally.progress_percent(), 100);
    }

    #[test]
    fn quorum_not_reached_below_half() {
        let tally = VoteTally::new(1, 0, 2);
        assert!(!tally.quorum_reached);
        assert_eq!(tally.progress_percent(), 50);
    }

    #[test]
    fn empty_dao_has_no_quorum_without_votes() {
        let tally = VoteTally::new(0, 0, VoteTally::quorum_for(0));
        assert_eq!(tally.quorum, 0);
        assert!(!tally.quorum_reached);
        assert_eq!(tally.progress_percent(), 0);
    }
}
