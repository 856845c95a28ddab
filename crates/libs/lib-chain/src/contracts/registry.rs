//! # Contract Registry
//!
//! Builds the handle set for the current signer and publishes it only after every
//! contract answered a liveness check. Partial availability is never published.
//!
//! A registry that tracks a connection only hands out a set whose signer and chain
//! still match that connection. A set built for an account the wallet has since
//! left is dropped instead of published.

use crate::contracts::interface::{
    ContractFactory, ContractKind, DaoContract, DonateContract, ProjectListingContract,
};
use crate::wallet::ConnectionState;
use lib_core::{Address, AppError, ContractsConfig, Result};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, instrument, warn};

/// Handles for the three contracts, bound to one signer on one chain.
///
/// Read-only after construction; shared by every concurrent read.
#[derive(Clone)]
pub struct ContractHandleSet {
    pub project_listing: Arc<dyn ProjectListingContract>,
    pub dao: Arc<dyn DaoContract>,
    pub donate: Arc<dyn DonateContract>,
    pub signer: Address,
    pub chain_id: u64,
}

impl fmt::Debug for ContractHandleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractHandleSet")
            .field("project_listing", self.project_listing.address())
            .field("dao", self.dao.address())
            .field("donate", self.donate.address())
            .field("signer", &self.signer)
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

impl ContractHandleSet {
    /// Whether this set was built for the account and chain `state` reports.
    pub fn matches(&self, state: &ConnectionState) -> bool {
        state.address == Some(self.signer) && state.chain_id == Some(self.chain_id)
    }
}

/// Contract handle registry
pub struct ContractRegistry {
    factory: Arc<dyn ContractFactory>,
    contracts: ContractsConfig,
    handles: Arc<RwLock<Option<Arc<ContractHandleSet>>>>,
    connection: Option<watch::Receiver<ConnectionState>>,
}

impl ContractRegistry {
    pub fn new(factory: Arc<dyn ContractFactory>, contracts: ContractsConfig) -> Self {
        Self {
            factory,
            contracts,
            handles: Arc::new(RwLock::new(None)),
            connection: None,
        }
    }

    /// Only hand out sets that match the latest state on `connection`.
    pub fn tracking(mut self, connection: watch::Receiver<ConnectionState>) -> Self {
        self.connection = Some(connection);
        self
    }

    fn is_live(&self, set: &ContractHandleSet) -> bool {
        match &self.connection {
            Some(connection) => set.matches(&connection.borrow()),
            None => true,
        }
    }

    /// Rebuild the handle set for `signer` on `chain_id`.
    ///
    /// The previous set is withdrawn before checking. On any failed check the new
    /// set is discarded and a single aggregated error is returned. `Ok(None)` means
    /// the tracked connection moved to another account or chain while checking, so
    /// nothing was published.
    #[instrument(skip(self), fields(signer = %signer))]
    pub async fn rebuild(
        &self,
        signer: &Address,
        chain_id: u64,
    ) -> Result<Option<Arc<ContractHandleSet>>> {
        self.clear().await;

        let set = ContractHandleSet {
            project_listing: self.factory.project_listing(&self.contracts.project_listing, signer),
            dao: self.factory.dao(&self.contracts.dao, signer),
            donate: self.factory.donate(&self.contracts.donate, signer),
            signer: *signer,
            chain_id,
        };

        let (listing, dao, donate) = tokio::join!(
            set.project_listing.owner(),
            set.dao.owner(),
            set.donate.owner()
        );

        let failures: Vec<String> = [
            (ContractKind::ProjectListing, listing.err()),
            (ContractKind::Dao, dao.err()),
            (ContractKind::Donate, donate.err()),
        ]
        .into_iter()
        .filter_map(|(kind, err)| err.map(|e| format!("{kind}: {e}")))
        .collect();

        if !failures.is_empty() {
            warn!(failures = ?failures, "contract liveness check failed, discarding handles");
            return Err(AppError::ContractsUnavailable(format!(
                "Failed to connect to contracts ({})",
                failures.join("; ")
            )));
        }

        let mut handles = self.handles.write().await;
        if !self.is_live(&set) {
            debug!("connection changed while binding contracts, dropping handles");
            return Ok(None);
        }
        let set = Arc::new(set);
        *handles = Some(Arc::clone(&set));
        info!(chain_id, "contract handles published");
        Ok(Some(set))
    }

    /// The published handle set, if it still matches the connection.
    pub async fn current(&self) -> Option<Arc<ContractHandleSet>> {
        self.handles
            .read()
            .await
            .as_ref()
            .filter(|set| self.is_live(set))
            .cloned()
    }

    /// Whether `set` is the published set and still matches the connection.
    pub async fn is_current(&self, set: &Arc<ContractHandleSet>) -> bool {
        self.current()
            .await
            .is_some_and(|current| Arc::ptr_eq(&current, set))
    }

    pub async fn require(&self) -> Result<Arc<ContractHandleSet>> {
        self.current()
            .await
            .ok_or_else(|| AppError::ContractsUnavailable("Contracts not initialized".to_string()))
    }

    pub async fn clear(&self) {
        self.handles.write().await.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::InMemoryChain;
    use crate::wallet::ConnectionProvider;
    use lib_core::ErrorKind;

    fn registry(chain: &InMemoryChain) -> ContractRegistry {
        ContractRegistry::new(chain.factory(), chain.contracts_config())
    }

    #[tokio::test]
    async fn publishes_after_every_contract_answers() {
        let chain = InMemoryChain::new(421_614);
        let registry = registry(&chain);
        let signer = InMemoryChain::account(1);

        let set = registry.rebuild(&signer, 421_614).await.unwrap().unwrap();

        assert_eq!(set.signer, signer);
        assert!(registry.current().await.is_some());
        assert_eq!(chain.read_calls(), 3);
    }

    #[tokio::test]
    async fn one_failed_check_discards_the_whole_set() {
        let chain = InMemoryChain::new(421_614);
        let registry = registry(&chain);
        let signer = InMemoryChain::account(1);
        registry.rebuild(&signer, 421_614).await.unwrap();

        chain.fail_liveness_check(Some(ContractKind::Donate)).await;
        let err = registry.rebuild(&signer, 421_614).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ContractsUnavailable);
        assert!(err.to_string().contains("Donate"));
        assert!(registry.current().await.is_none());
        assert_eq!(registry.require().await.unwrap_err().kind(), ErrorKind::ContractsUnavailable);
    }

    #[tokio::test]
    async fn set_built_for_a_departed_account_is_dropped() {
        let chain = InMemoryChain::new(421_614);
        chain.set_accounts(vec![InMemoryChain::account(1)]).await;
        let connection = Arc::new(ConnectionProvider::new(Some(chain.wallet()), 421_614));
        connection.connect().await.unwrap();
        let registry = Arc::new(registry(&chain).tracking(connection.subscribe()));
        chain.hold_reads(true);

        let rebuild = tokio::spawn({
            let registry = Arc::clone(&registry);
            async move { registry.rebuild(&InMemoryChain::account(1), 421_614).await }
        });
        while chain.read_calls() < 5 {
            tokio::task::yield_now().await;
        }
        connection.accounts_changed(vec![InMemoryChain::account(2)]);
        chain.hold_reads(false);

        assert!(rebuild.await.unwrap().unwrap().is_none());
        assert!(registry.current().await.is_none());
    }

    #[tokio::test]
    async fn published_set_is_hidden_once_the_account_changes() {
        let chain = InMemoryChain::new(421_614);
        chain.set_accounts(vec![InMemoryChain::account(1)]).await;
        let connection = ConnectionProvider::new(Some(chain.wallet()), 421_614);
        connection.connect().await.unwrap();
        let registry = registry(&chain).tracking(connection.subscribe());
        let set = registry
            .rebuild(&InMemoryChain::account(1), 421_614)
            .await
            .unwrap()
            .unwrap();
        assert!(registry.is_current(&set).await);

        connection.accounts_changed(vec![InMemoryChain::account(2)]);

        assert!(!registry.is_current(&set).await);
        assert!(registry.require().await.is_err());
    }
}
