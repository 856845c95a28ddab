//! # Read Aggregator
//!
//! Rebuilds list-shaped view state from indexed contract storage and joins the
//! listing, DAO and donation-ledger contracts into view objects.
//!
//! One implementation serves every screen; a [`JoinPlan`] picks which ids to walk
//! and which contracts to join. Fields of one project are read in separate round
//! trips, so a snapshot is only eventually consistent across refreshes.

pub mod enumerate;
mod queries;

pub use enumerate::{enumerate_counted, enumerate_indexed, MAX_CONSECUTIVE_FAULTS};
pub use queries::{Aggregation, DaoQuery, DonatableProjectsQuery, ListedProjectsQuery, ProfileQuery};

use crate::contracts::{CallResult, ContractHandleSet};
use lib_core::dto::{
    ActivityKind, DaoOverview, DaoRequestView, ListedProjectView, ProfileActivity, ProfileSummary,
    RequestStatus, VoteTally,
};
use lib_core::{Address, DonationRecord, ProjectId, ProjectRecord, ProjectRequest, Wei};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Where project ids come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSource {
    /// `projectIds(i)` for i = 0, 1, ... until out of range.
    IndexArray,
    /// `projectCount()`, then ids 1..=count.
    Counted,
    /// `getApprovedProjects()`.
    Approved,
}

/// Which ids to walk and which contracts to join for each project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinPlan {
    pub ids: IdSource,
    /// Drop records whose listing flag is off.
    pub listed_only: bool,
    /// Drop projects whose derived approval is false.
    pub approved_only: bool,
    /// Read the DAO request and the viewer's vote.
    pub join_dao: bool,
    /// Sum the donation ledger instead of trusting the listing total.
    pub join_ledger: bool,
}

impl JoinPlan {
    pub const LISTING: JoinPlan = JoinPlan {
        ids: IdSource::IndexArray,
        listed_only: true,
        approved_only: false,
        join_dao: true,
        join_ledger: true,
    };

    pub const DONATE: JoinPlan = JoinPlan {
        ids: IdSource::Approved,
        listed_only: true,
        approved_only: true,
        join_dao: true,
        join_ledger: false,
    };

    pub const DAO: JoinPlan = JoinPlan {
        ids: IdSource::Counted,
        listed_only: false,
        approved_only: false,
        join_dao: true,
        join_ledger: false,
    };

    pub const PROFILE: JoinPlan = JoinPlan {
        ids: IdSource::IndexArray,
        listed_only: false,
        approved_only: false,
        join_dao: true,
        join_ledger: true,
    };
}

/// One project with everything the plan asked to join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedProject {
    pub record: ProjectRecord,
    /// `None` when the DAO was not joined or the request does not exist yet.
    pub request: Option<ProjectRequest>,
    pub has_voted: bool,
    /// `None` when the ledger was not joined.
    pub donations: Option<Vec<DonationRecord>>,
}

impl JoinedProject {
    /// Listing flag AND DAO flag.
    pub fn is_approved(&self) -> bool {
        self.record.is_approved && self.request.as_ref().is_some_and(|r| r.is_approved)
    }

    /// Ledger sum in wei when joined, the listing's running total otherwise.
    pub fn total_donations(&self) -> Wei {
        match &self.donations {
            Some(donations) => donations
                .iter()
                .fold(0u128, |total, d| total.saturating_add(d.amount)),
            None => self.record.total_donations,
        }
    }

    fn into_listed_view(self) -> ListedProjectView {
        let status = RequestStatus::of(self.request.as_ref());
        let is_approved = self.is_approved();
        let total_donations = self.total_donations();
        let request = self.request.unwrap_or_default();
        ListedProjectView {
            id: self.record.id,
            name: self.record.name,
            description: self.record.description,
            owner: self.record.owner,
            is_approved,
            is_processed: request.is_processed,
            status,
            yes_votes: request.yes_votes,
            no_votes: request.no_votes,
            has_voted: self.has_voted,
            total_donations,
            subscription_end_time: self.record.subscription_end_time,
            video_url: None,
        }
    }
}

/// Read aggregation over one published handle set. The viewer is the signer.
#[derive(Debug, Clone)]
pub struct ReadAggregator {
    handles: Arc<ContractHandleSet>,
}

impl ReadAggregator {
    pub fn new(handles: Arc<ContractHandleSet>) -> Self {
        Self { handles }
    }

    pub fn viewer(&self) -> &Address {
        &self.handles.signer
    }

    /// Run `plan` and return joined projects in discovery order.
    #[instrument(skip(self))]
    pub async fn collect(&self, plan: JoinPlan) -> Vec<JoinedProject> {
        let records = self.project_records(plan.ids).await;
        let mut joined = Vec::with_capacity(records.len());

        for record in records {
            if plan.listed_only && !record.is_listed {
                continue;
            }
            let mut project = JoinedProject {
                record,
                request: None,
                has_voted: false,
                donations: None,
            };
            if plan.join_dao {
                self.join_dao(&mut project).await;
            }
            if plan.approved_only && !project.is_approved() {
                continue;
            }
            if plan.join_ledger {
                project.donations = Some(self.donation_history(project.record.id).await);
            }
            joined.push(project);
        }

        debug!(count = joined.len(), "projects joined");
        joined
    }

    /// Listed projects with DAO status and ledger totals.
    pub async fn listed_projects(&self) -> Vec<ListedProjectView> {
        self.collect(JoinPlan::LISTING)
            .await
            .into_iter()
            .map(JoinedProject::into_listed_view)
            .collect()
    }

    /// Projects that accept donations. Totals come from the listing contract.
    pub async fn donatable_projects(&self) -> Vec<ListedProjectView> {
        self.collect(JoinPlan::DONATE)
            .await
            .into_iter()
            .map(JoinedProject::into_listed_view)
            .collect()
    }

    /// Membership figures and every project as a DAO request.
    #[instrument(skip(self))]
    pub async fn dao_overview(&self, min_stake_amount: Wei) -> DaoOverview {
        let dao = &self.handles.dao;
        let viewer = self.viewer();

        let member = or_default("members", dao.member(viewer).await);
        let member_count = or_default("memberCount", dao.member_count().await);
        let total_staked = or_default("totalStaked", dao.total_staked().await);
        let members = or_default("getDAOMembers", dao.members().await);
        let quorum = dao.quorum().await.unwrap_or_else(|e| {
            warn!(error = %e, "quorum read failed, deriving from member count");
            VoteTally::quorum_for(member_count)
        });

        let requests = self
            .collect(JoinPlan::DAO)
            .await
            .into_iter()
            .map(|project| {
                let status = RequestStatus::of(project.request.as_ref());
                let in_dao = project.request.is_some();
                let request = project.request.unwrap_or_default();
                DaoRequestView {
                    project_id: project.record.id,
                    name: project.record.name,
                    description: project.record.description,
                    owner: project.record.owner,
                    status,
                    tally: VoteTally::new(request.yes_votes, request.no_votes, quorum),
                    is_processed: request.is_processed,
                    is_approved: request.is_approved,
                    has_voted: project.has_voted,
                    in_dao,
                    can_vote: member.is_member && in_dao && !project.has_voted && !request.is_processed,
                }
            })
            .collect();

        DaoOverview {
            viewer: *viewer,
            is_member: member.is_member,
            staked_amount: member.staked_amount,
            member_count,
            members,
            total_staked,
            min_stake_amount,
            quorum,
            requests,
        }
    }

    /// The viewer's listings, votes and donations across all projects.
    #[instrument(skip(self))]
    pub async fn profile(&self) -> ProfileSummary {
        let viewer = self.viewer();
        let is_dao_member = or_default("isMember", self.handles.dao.is_member(viewer).await);

        let mut activities = Vec::new();
        let mut projects_listed = 0;
        let mut votes_cast = 0;
        let mut total_donated: Wei = 0;

        for project in self.collect(JoinPlan::PROFILE).await {
            let id = project.record.id;
            let name = &project.record.name;

            if &project.record.owner == viewer {
                projects_listed += 1;
                activities.push(activity(ActivityKind::ProjectListed, id, name, None, None));
            }
            if project.has_voted {
                votes_cast += 1;
                activities.push(activity(ActivityKind::Voted, id, name, None, None));
            }
            for donation in project.donations.iter().flatten().filter(|d| &d.donor == viewer) {
                total_donated = total_donated.saturating_add(donation.amount);
                activities.push(activity(
                    ActivityKind::Donation,
                    id,
                    name,
                    Some(donation.amount),
                    Some(donation.timestamp),
                ));
            }
        }

        ProfileSummary::sort_activities(&mut activities);
        ProfileSummary {
            address: *viewer,
            projects_listed,
            total_donated,
            is_dao_member,
            votes_cast,
            activities,
        }
    }

    /// Every ledger entry for `project_id`, in ledger order.
    pub async fn donation_history(&self, project_id: ProjectId) -> Vec<DonationRecord> {
        let donate = Arc::clone(&self.handles.donate);
        let collection = format!("donations[{project_id}]");
        enumerate_indexed(&collection, move |index| {
            let donate = Arc::clone(&donate);
            async move { donate.donation_at(project_id, index).await }
        })
        .await
    }

    async fn project_records(&self, source: IdSource) -> Vec<ProjectRecord> {
        let listing = Arc::clone(&self.handles.project_listing);

        let ids = match source {
            IdSource::Counted => {
                let count = or_default("projectCount", listing.project_count().await);
                return enumerate_counted("projects", count, move |id| {
                    let listing = Arc::clone(&listing);
                    async move { listing.get_project(id).await }
                })
                .await;
            }
            IdSource::IndexArray => {
                let source = Arc::clone(&listing);
                enumerate_indexed("projectIds", move |index| {
                    let source = Arc::clone(&source);
                    async move { source.project_id_at(index).await }
                })
                .await
            }
            IdSource::Approved => or_default("getApprovedProjects", listing.approved_project_ids().await),
        };

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            match listing.get_project(id).await {
                Ok(record) => records.push(record),
                Err(e) => warn!(project_id = id, error = %e, "skipping unreadable project"),
            }
        }
        records
    }

    async fn join_dao(&self, project: &mut JoinedProject) {
        let id = project.record.id;
        let request = match self.handles.dao.project_request(id).await {
            Ok(request) if request.exists() => request,
            Ok(_) => return,
            Err(e) => {
                warn!(project_id = id, error = %e, "DAO request read failed, treating as awaiting voting");
                return;
            }
        };
        project.has_voted = match self.handles.dao.has_voted(self.viewer(), id).await {
            Ok(voted) => voted,
            Err(e) => {
                warn!(project_id = id, error = %e, "hasVoted read failed");
                false
            }
        };
        project.request = Some(request);
    }
}

fn or_default<T: Default>(call: &str, result: CallResult<T>) -> T {
    result.unwrap_or_else(|e| {
        warn!(call, error = %e, "read failed, using default");
        T::default()
    })
}

fn activity(
    kind: ActivityKind,
    project_id: ProjectId,
    project_name: &str,
    amount: Option<Wei>,
    timestamp: Option<i64>,
) -> ProfileActivity {
    ProfileActivity {
        kind,
        project_id,
        project_name: project_name.to_string(),
        amount,
        timestamp,
    }
}
