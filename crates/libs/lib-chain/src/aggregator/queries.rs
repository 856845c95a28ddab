//! Per-screen aggregations driven by the refresh scheduler.

use super::ReadAggregator;
use crate::video::VideoStore;
use async_trait::async_trait;
use lib_core::dto::{DaoOverview, ListedProjectView, ProfileSummary};
use lib_core::{Result, Wei};
use std::sync::Arc;

/// One full aggregation pass producing a screen's snapshot.
#[async_trait]
pub trait Aggregation: Send + Sync + 'static {
    type Output: Clone + Send + Sync + 'static;

    fn name(&self) -> &'static str;

    async fn run(&self, aggregator: &ReadAggregator) -> Result<Self::Output>;
}

/// Projects screen.
#[derive(Clone, Default)]
pub struct ListedProjectsQuery {
    pub videos: Option<Arc<VideoStore>>,
}

#[async_trait]
impl Aggregation for ListedProjectsQuery {
    type Output = Vec<ListedProjectView>;

    fn name(&self) -> &'static str {
        "listed_projects"
    }

    async fn run(&self, aggregator: &ReadAggregator) -> Result<Self::Output> {
        let mut views = aggregator.listed_projects().await;
        if let Some(videos) = &self.videos {
            videos.decorate(&mut views).await;
        }
        Ok(views)
    }
}

/// Donate screen.
#[derive(Clone, Default)]
pub struct DonatableProjectsQuery {
    pub videos: Option<Arc<VideoStore>>,
}

#[async_trait]
impl Aggregation for DonatableProjectsQuery {
    type Output = Vec<ListedProjectView>;

    fn name(&self) -> &'static str {
        "donatable_projects"
    }

    async fn run(&self, aggregator: &ReadAggregator) -> Result<Self::Output> {
        let mut views = aggregator.donatable_projects().await;
        if let Some(videos) = &self.videos {
            videos.decorate(&mut views).await;
        }
        Ok(views)
    }
}

/// DAO screen.
#[derive(Debug, Clone, Copy)]
pub struct DaoQuery {
    pub min_stake_amount: Wei,
}

#[async_trait]
impl Aggregation for DaoQuery {
    type Output = DaoOverview;

    fn name(&self) -> &'static str {
        "dao_overview"
    }

    async fn run(&self, aggregator: &ReadAggregator) -> Result<Self::Output> {
        Ok(aggregator.dao_overview(self.min_stake_amount).await)
    }
}

/// Profile screen.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileQuery;

#[async_trait]
impl Aggregation for ProfileQuery {
    type Output = ProfileSummary;

    fn name(&self) -> &'static str {
        "profile"
    }

    async fn run(&self, aggregator: &ReadAggregator) -> Result<Self::Output> {
        Ok(aggregator.profile().await)
    }
}
