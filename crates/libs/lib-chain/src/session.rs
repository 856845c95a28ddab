//! # Session
//!
//! Wires the connection, the contract registry, the refresh drivers and the write
//! coordinator together. Every connection, account or chain change withdraws the
//! handles, invalidates all drivers, rebuilds and refreshes. Those resyncs run one
//! at a time.

use crate::aggregator::{
    Aggregation, DaoQuery, DonatableProjectsQuery, ListedProjectsQuery, ProfileQuery, ReadAggregator,
};
use crate::contracts::{ContractFactory, ContractRegistry};
use crate::coordinator::WriteCoordinator;
use crate::refresh::{PollHandle, RefreshDriver, RefreshTrigger};
use crate::video::VideoStore;
use crate::wallet::{ConnectionProvider, ConnectionState, WalletProvider};
use lib_core::{Address, Config, DonationRecord, ProjectId, Result, Wei};
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

pub struct GreenStakeSession {
    config: Config,
    min_stake: Wei,
    connection: Arc<ConnectionProvider>,
    registry: Arc<ContractRegistry>,
    coordinator: WriteCoordinator,
    videos: Arc<VideoStore>,
    triggers: Mutex<Vec<Weak<dyn RefreshTrigger>>>,
    syncing: Mutex<()>,
}

impl GreenStakeSession {
    pub async fn new(
        config: Config,
        wallet: Option<Arc<dyn WalletProvider>>,
        factory: Arc<dyn ContractFactory>,
    ) -> Result<Self> {
        let connection = Arc::new(ConnectionProvider::new(wallet, config.chain_id));
        let registry = Arc::new(
            ContractRegistry::new(factory, config.contracts.clone()).tracking(connection.subscribe()),
        );
        let coordinator = WriteCoordinator::new(Arc::clone(&connection), Arc::clone(&registry), &config)?;
        let videos = Arc::new(VideoStore::load(&config.video_store_path).await);

        Ok(Self {
            min_stake: config.min_stake_wei()?,
            config,
            connection,
            registry,
            coordinator,
            videos,
            triggers: Mutex::new(Vec::new()),
            syncing: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn connection(&self) -> &ConnectionProvider {
        &self.connection
    }

    pub fn coordinator(&self) -> &WriteCoordinator {
        &self.coordinator
    }

    pub fn videos(&self) -> &Arc<VideoStore> {
        &self.videos
    }

    pub fn viewer(&self) -> Option<Address> {
        self.connection.state().address
    }

    // region:    --- Connection events

    #[instrument(skip(self))]
    pub async fn connect(&self) -> Result<ConnectionState> {
        let connected = self.connection.connect().await;
        let synced = self.sync().await;
        let state = connected?;
        synced?;
        Ok(state)
    }

    pub async fn switch_network(&self) -> Result<ConnectionState> {
        let switched = self
            .connection
            .request_network_switch(self.connection.required_chain_id())
            .await;
        let synced = self.sync().await;
        switched?;
        synced?;
        Ok(self.connection.state())
    }

    pub async fn accounts_changed(&self, accounts: Vec<Address>) -> Result<ConnectionState> {
        let state = self.connection.accounts_changed(accounts);
        self.sync().await?;
        Ok(state)
    }

    pub async fn chain_changed(&self, chain_id: u64) -> Result<ConnectionState> {
        let state = self.connection.chain_changed(chain_id).await;
        self.sync().await?;
        Ok(state)
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.connection.disconnect();
        self.sync().await
    }

    /// Bring the handles and every driver in line with the connection state.
    async fn sync(&self) -> Result<()> {
        let _syncing = self.syncing.lock().await;
        let triggers = self.live_triggers().await;
        for trigger in &triggers {
            trigger.invalidate();
        }
        self.registry.clear().await;

        let Ok(account) = self.connection.ensure_ready() else {
            info!("connection not ready, contract handles withdrawn");
            return Ok(());
        };
        if self.registry.rebuild(&account, self.config.chain_id).await?.is_none() {
            debug!("connection moved on during rebuild, leaving it to the next sync");
            return Ok(());
        }

        for trigger in &triggers {
            trigger.refresh().await;
        }
        Ok(())
    }

    async fn live_triggers(&self) -> Vec<Arc<dyn RefreshTrigger>> {
        let mut triggers = self.triggers.lock().await;
        triggers.retain(|t| t.strong_count() > 0);
        triggers.iter().filter_map(Weak::upgrade).collect()
    }

    // endregion: --- Connection events

    // region:    --- Views

    pub async fn listed_projects(&self) -> Arc<RefreshDriver<ListedProjectsQuery>> {
        self.driver(ListedProjectsQuery { videos: Some(Arc::clone(&self.videos)) }).await
    }

    pub async fn donatable_projects(&self) -> Arc<RefreshDriver<DonatableProjectsQuery>> {
        self.driver(DonatableProjectsQuery { videos: Some(Arc::clone(&self.videos)) }).await
    }

    pub async fn dao(&self) -> Arc<RefreshDriver<DaoQuery>> {
        self.driver(DaoQuery { min_stake_amount: self.min_stake }).await
    }

    pub async fn profile(&self) -> Arc<RefreshDriver<ProfileQuery>> {
        self.driver(ProfileQuery).await
    }

    /// Start the configured polling interval for `driver`.
    pub fn poll<A: Aggregation>(&self, driver: &Arc<RefreshDriver<A>>) -> PollHandle {
        driver.start_polling(self.config.poll_interval)
    }

    /// One-off read of a project's donation ledger.
    pub async fn donation_history(&self, project_id: ProjectId) -> Result<Vec<DonationRecord>> {
        let handles = self.registry.require().await?;
        Ok(ReadAggregator::new(handles).donation_history(project_id).await)
    }

    /// New driver, registered for connection changes and confirmed writes.
    async fn driver<A: Aggregation>(&self, query: A) -> Arc<RefreshDriver<A>> {
        let driver = RefreshDriver::new(query, Arc::clone(&self.registry));
        let trigger: Arc<dyn RefreshTrigger> = driver.clone();
        self.coordinator.on_success(Arc::downgrade(&trigger)).await;
        self.triggers.lock().await.push(Arc::downgrade(&trigger));
        driver
    }

    // endregion: --- Views
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refresh::RefreshOutcome;
    use crate::sandbox::InMemoryChain;
    use lib_core::config::DEFAULT_CHAIN_ID;
    use lib_core::ErrorKind;

    async fn session(chain: &InMemoryChain) -> GreenStakeSession {
        let mut config = Config::from_artifact_str(
            &serde_json::json!({
                "contracts": {
                    "ProjectListing": {"address": InMemoryChain::account(0xa1), "subscriptionFee": "0.01"},
                    "DAO": {"address": InMemoryChain::account(0xa2), "minStakeAmount": "0.01"},
                    "Donate": {"address": InMemoryChain::account(0xa3)}
                }
            })
            .to_string(),
        )
        .unwrap();
        config.video_store_path = std::env::temp_dir()
            .join(format!("greenstake-{}", uuid::Uuid::new_v4()))
            .join("videos.json");
        GreenStakeSession::new(config, Some(chain.wallet()), chain.factory()).await.unwrap()
    }

    #[tokio::test]
    async fn account_change_rebinds_handles_and_refreshes() {
        let chain = InMemoryChain::new(DEFAULT_CHAIN_ID);
        chain.set_accounts(vec![InMemoryChain::account(1)]).await;
        let session = session(&chain).await;
        let profile = session.profile().await;

        session.connect().await.unwrap();
        assert_eq!(profile.latest().unwrap().address, InMemoryChain::account(1));

        session.accounts_changed(vec![InMemoryChain::account(2)]).await.unwrap();
        assert_eq!(profile.latest().unwrap().address, InMemoryChain::account(2));
    }

    #[tokio::test]
    async fn wrong_chain_withdraws_handles() {
        let chain = InMemoryChain::new(DEFAULT_CHAIN_ID);
        chain.set_accounts(vec![InMemoryChain::account(1)]).await;
        let session = session(&chain).await;
        let projects = session.listed_projects().await;
        session.connect().await.unwrap();
        assert!(projects.latest().is_some());
        chain.decline_network_switch(true).await;

        session.chain_changed(1).await.unwrap();

        assert!(projects.latest().is_none());
        match projects.refresh().await {
            RefreshOutcome::Failed(e) => assert_eq!(e.kind(), ErrorKind::ContractsUnavailable),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(
            session.coordinator().join_dao().await.unwrap_err().kind(),
            ErrorKind::WrongNetwork
        );
        assert_eq!(chain.switch_requests().await, 2);
        assert_eq!(chain.submissions(), 0);
    }

    #[tokio::test]
    async fn write_on_wrong_chain_switches_then_submits() {
        let chain = InMemoryChain::new(DEFAULT_CHAIN_ID);
        chain.set_accounts(vec![InMemoryChain::account(1)]).await;
        let session = session(&chain).await;
        let dao = session.dao().await;
        session.connect().await.unwrap();
        chain.decline_network_switch(true).await;
        chain.set_wallet_chain(1).await;
        session.chain_changed(1).await.unwrap();
        assert!(!session.connection().state().is_correct_network);

        chain.decline_network_switch(false).await;
        let status = session.coordinator().join_dao().await.unwrap();

        assert!(status.is_confirmed());
        assert_eq!(chain.wallet_chain().await, DEFAULT_CHAIN_ID);
        assert!(session.connection().state().is_correct_network);
        assert!(chain.is_member(&InMemoryChain::account(1)).await);
        assert!(dao.latest().unwrap().is_member);
    }

    #[tokio::test]
    async fn overlapping_account_changes_settle_on_the_last_account() {
        let chain = InMemoryChain::new(DEFAULT_CHAIN_ID);
        chain.set_accounts(vec![InMemoryChain::account(1)]).await;
        let session = Arc::new(session(&chain).await);
        let profile = session.profile().await;
        session.connect().await.unwrap();
        chain.hold_reads(true);

        let reads = chain.read_calls();
        let first = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.accounts_changed(vec![InMemoryChain::account(2)]).await }
        });
        while chain.read_calls() < reads + 3 {
            tokio::task::yield_now().await;
        }
        let second = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.accounts_changed(vec![InMemoryChain::account(3)]).await }
        });
        while session.viewer() != Some(InMemoryChain::account(3)) {
            tokio::task::yield_now().await;
        }
        chain.hold_reads(false);

        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();
        assert_eq!(profile.latest().unwrap().address, InMemoryChain::account(3));
        assert_eq!(session.viewer(), Some(InMemoryChain::account(3)));
    }

    #[tokio::test]
    async fn account_change_during_refresh_still_publishes() {
        let chain = InMemoryChain::new(DEFAULT_CHAIN_ID);
        chain.set_accounts(vec![InMemoryChain::account(1)]).await;
        let session = Arc::new(session(&chain).await);
        let profile = session.profile().await;
        session.connect().await.unwrap();
        chain.hold_reads(true);

        let stale = tokio::spawn({
            let profile = Arc::clone(&profile);
            async move { profile.refresh().await }
        });
        while !profile.is_in_flight() {
            tokio::task::yield_now().await;
        }
        let changed = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.accounts_changed(vec![InMemoryChain::account(2)]).await }
        });
        while session.viewer() != Some(InMemoryChain::account(2)) {
            tokio::task::yield_now().await;
        }
        chain.hold_reads(false);

        assert_eq!(stale.await.unwrap(), RefreshOutcome::Discarded);
        changed.await.unwrap().unwrap();
        assert_eq!(profile.latest().unwrap().address, InMemoryChain::account(2));
    }

    #[tokio::test]
    async fn confirmed_write_refreshes_views() {
        let chain = InMemoryChain::new(DEFAULT_CHAIN_ID);
        chain.set_accounts(vec![InMemoryChain::account(1)]).await;
        let session = session(&chain).await;
        let dao = session.dao().await;
        session.connect().await.unwrap();
        assert!(!dao.latest().unwrap().is_member);

        let status = session.coordinator().join_dao().await.unwrap();

        assert!(status.is_confirmed());
        let overview = dao.latest().unwrap();
        assert!(overview.is_member);
        assert_eq!(overview.member_count, 1);
        assert_eq!(overview.staked_amount, 10_000_000_000_000_000);
    }
}
