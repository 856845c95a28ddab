//! # In-Memory Chain
//!
//! A wallet and the three contracts held in memory, following the deployed
//! contracts' rules. Used by tests and local demos. Every call is counted, and
//! faults can be injected per index, per project or per contract.

use crate::contracts::{
    CallError, CallResult, ContractFactory, ContractKind, DaoContract, DonateContract,
    PendingTx, ProjectListingContract, TxReceipt,
};
use crate::wallet::WalletProvider;
use async_trait::async_trait;
use lib_core::{
    Address, ContractEntry, ContractsConfig, DonationRecord, MemberRecord, ProjectId,
    ProjectRecord, ProjectRequest, Wei,
};
use lib_core::dto::VoteTally;
use lib_utils::now_unix;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, watch, Mutex};

/// 0.01 ether.
pub const DEFAULT_FEE: Wei = 10_000_000_000_000_000;
const SUBSCRIPTION_SECS: i64 = 30 * 24 * 60 * 60;

struct ChainState {
    accounts: Vec<Address>,
    wallet_chain_id: u64,
    decline_switch: bool,
    switch_requests: usize,
    quorum_override: Option<u64>,

    owner: Address,
    subscription_fee: Wei,
    min_stake: Wei,
    now: i64,
    block_number: u64,
    tx_count: u64,

    projects: BTreeMap<ProjectId, ProjectRecord>,
    project_ids: Vec<ProjectId>,
    requests: BTreeMap<ProjectId, ProjectRequest>,
    votes: HashSet<(Address, ProjectId)>,
    members: Vec<Address>,
    stakes: HashMap<Address, Wei>,
    donations: BTreeMap<ProjectId, Vec<DonationRecord>>,

    failing_indexes: HashSet<u64>,
    failing_donations: HashSet<(ProjectId, u64)>,
    failing_projects: HashSet<ProjectId>,
    liveness_failure: Option<ContractKind>,
    reject_next: bool,
    stall_confirmations: bool,
    stalled: Vec<(oneshot::Sender<CallResult<TxReceipt>>, TxReceipt)>,
}

struct Inner {
    chain_id: u64,
    state: Mutex<ChainState>,
    reads: AtomicUsize,
    submissions: AtomicUsize,
    gate: watch::Sender<bool>,
}

/// Shared in-memory chain. Clones see the same state.
#[derive(Clone)]
pub struct InMemoryChain {
    inner: Arc<Inner>,
}

impl InMemoryChain {
    pub fn new(chain_id: u64) -> Self {
        let (gate, _) = watch::channel(false);
        let state = ChainState {
            accounts: Vec::new(),
            wallet_chain_id: chain_id,
            decline_switch: false,
            switch_requests: 0,
            quorum_override: None,
            owner: Self::account(0xff),
            subscription_fee: DEFAULT_FEE,
            min_stake: DEFAULT_FEE,
            now: now_unix(),
            block_number: 1,
            tx_count: 0,
            projects: BTreeMap::new(),
            project_ids: Vec::new(),
            requests: BTreeMap::new(),
            votes: HashSet::new(),
            members: Vec::new(),
            stakes: HashMap::new(),
            donations: BTreeMap::new(),
            failing_indexes: HashSet::new(),
            failing_donations: HashSet::new(),
            failing_projects: HashSet::new(),
            liveness_failure: None,
            reject_next: false,
            stall_confirmations: false,
            stalled: Vec::new(),
        };
        Self {
            inner: Arc::new(Inner {
                chain_id,
                state: Mutex::new(state),
                reads: AtomicUsize::new(0),
                submissions: AtomicUsize::new(0),
                gate,
            }),
        }
    }

    /// Deterministic test account.
    pub fn account(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    pub fn chain_id(&self) -> u64 {
        self.inner.chain_id
    }

    pub fn wallet(&self) -> Arc<dyn WalletProvider> {
        Arc::new(SandboxWallet { chain: self.clone() })
    }

    pub fn factory(&self) -> Arc<dyn ContractFactory> {
        Arc::new(SandboxFactory { chain: self.clone() })
    }

    /// Addresses the factory binds to.
    pub fn contracts_config(&self) -> ContractsConfig {
        let entry = |byte| ContractEntry {
            address: Self::account(byte),
            abi: serde_json::Value::Array(Vec::new()),
        };
        ContractsConfig {
            project_listing: entry(0xa1),
            dao: entry(0xa2),
            donate: entry(0xa3),
        }
    }

    // region:    --- Wallet

    pub async fn set_accounts(&self, accounts: Vec<Address>) {
        self.inner.state.lock().await.accounts = accounts;
    }

    pub async fn set_wallet_chain(&self, chain_id: u64) {
        self.inner.state.lock().await.wallet_chain_id = chain_id;
    }

    pub async fn decline_network_switch(&self, decline: bool) {
        self.inner.state.lock().await.decline_switch = decline;
    }

    // endregion: --- Wallet

    // region:    --- Seeding

    /// List a project directly. Listed, not approved, no DAO request.
    pub async fn seed_project(&self, owner: &Address, name: &str, description: &str) -> ProjectId {
        let mut state = self.inner.state.lock().await;
        state.insert_project(owner, name, description)
    }

    /// Set the listing contract's own approval flag.
    pub async fn set_project_approval(&self, id: ProjectId, approved: bool) {
        if let Some(project) = self.inner.state.lock().await.projects.get_mut(&id) {
            project.is_approved = approved;
        }
    }

    pub async fn set_project_listed(&self, id: ProjectId, listed: bool) {
        if let Some(project) = self.inner.state.lock().await.projects.get_mut(&id) {
            project.is_listed = listed;
        }
    }

    /// Create or overwrite the DAO request for `id`.
    pub async fn seed_request(&self, id: ProjectId, yes: u64, no: u64, processed: bool, approved: bool) {
        let mut state = self.inner.state.lock().await;
        let (name, description, owner) = state
            .projects
            .get(&id)
            .map(|p| (p.name.clone(), p.description.clone(), Some(p.owner)))
            .unwrap_or_default();
        state.requests.insert(
            id,
            ProjectRequest {
                project_id: id,
                name,
                description,
                project_owner: owner,
                yes_votes: yes,
                no_votes: no,
                is_processed: processed,
                is_approved: approved,
            },
        );
    }

    /// Open an empty DAO request for `id`.
    pub async fn open_request(&self, id: ProjectId) {
        self.seed_request(id, 0, 0, false, false).await;
    }

    pub async fn seed_member(&self, account: &Address, stake: Wei) {
        let mut state = self.inner.state.lock().await;
        if !state.members.contains(account) {
            state.members.push(*account);
        }
        state.stakes.insert(*account, stake);
    }

    /// Mark `account` as having voted on `id` without touching the tally.
    pub async fn seed_vote(&self, account: &Address, id: ProjectId) {
        self.inner.state.lock().await.votes.insert((*account, id));
    }

    /// Append a ledger entry. The listing total is kept in step.
    pub async fn seed_donation(&self, id: ProjectId, donor: &Address, amount: Wei, timestamp: i64) {
        let mut state = self.inner.state.lock().await;
        state.record_donation(id, donor, amount, timestamp);
    }

    /// Answer `quorum()` with a fixed value instead of half the members.
    pub async fn set_quorum(&self, quorum: Option<u64>) {
        self.inner.state.lock().await.quorum_override = quorum;
    }

    pub async fn set_time(&self, unix_secs: i64) {
        self.inner.state.lock().await.now = unix_secs;
    }

    // endregion: --- Seeding

    // region:    --- Faults

    /// `projectIds(index)` fails with a transport error.
    pub async fn fail_project_index(&self, index: u64) {
        self.inner.state.lock().await.failing_indexes.insert(index);
    }

    pub async fn fail_donation_index(&self, id: ProjectId, index: u64) {
        self.inner.state.lock().await.failing_donations.insert((id, index));
    }

    /// `getProject(id)` fails with a transport error.
    pub async fn fail_project(&self, id: ProjectId) {
        self.inner.state.lock().await.failing_projects.insert(id);
    }

    /// Make the `owner()` liveness check of one contract fail.
    pub async fn fail_liveness_check(&self, kind: Option<ContractKind>) {
        self.inner.state.lock().await.liveness_failure = kind;
    }

    /// The wallet rejects the next submission.
    pub async fn reject_next_transaction(&self) {
        self.inner.state.lock().await.reject_next = true;
    }

    /// Accepted transactions apply immediately but their confirmation is held back.
    pub async fn stall_confirmations(&self, stall: bool) {
        self.inner.state.lock().await.stall_confirmations = stall;
    }

    /// Release held confirmations. Returns how many were released.
    pub async fn confirm_stalled(&self) -> usize {
        let stalled = std::mem::take(&mut self.inner.state.lock().await.stalled);
        let count = stalled.len();
        for (sender, receipt) in stalled {
            let _ = sender.send(Ok(receipt));
        }
        count
    }

    /// While held, every read waits until released.
    pub fn hold_reads(&self, hold: bool) {
        self.inner.gate.send_replace(hold);
    }

    // endregion: --- Faults

    // region:    --- Inspection

    pub fn read_calls(&self) -> usize {
        self.inner.reads.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> usize {
        self.inner.submissions.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.read_calls() + self.submissions()
    }

    pub async fn project(&self, id: ProjectId) -> Option<ProjectRecord> {
        self.inner.state.lock().await.projects.get(&id).cloned()
    }

    pub async fn request(&self, id: ProjectId) -> Option<ProjectRequest> {
        self.inner.state.lock().await.requests.get(&id).cloned()
    }

    pub async fn donations(&self, id: ProjectId) -> Vec<DonationRecord> {
        self.inner.state.lock().await.donations.get(&id).cloned().unwrap_or_default()
    }

    pub async fn is_member(&self, account: &Address) -> bool {
        self.inner.state.lock().await.members.contains(account)
    }

    pub async fn wallet_chain(&self) -> u64 {
        self.inner.state.lock().await.wallet_chain_id
    }

    /// How many times the wallet was asked to switch chains.
    pub async fn switch_requests(&self) -> usize {
        self.inner.state.lock().await.switch_requests
    }

    // endregion: --- Inspection

    async fn read(&self) -> tokio::sync::MutexGuard<'_, ChainState> {
        self.inner.reads.fetch_add(1, Ordering::SeqCst);
        let mut gate = self.inner.gate.subscribe();
        let _ = gate.wait_for(|held| !held).await;
        self.inner.state.lock().await
    }

    /// Run a state-changing call: count it, honour wallet rejection, apply
    /// `effect` and hand back the pending confirmation.
    async fn submit<F>(&self, effect: F) -> CallResult<PendingTx>
    where
        F: FnOnce(&mut ChainState) -> CallResult<()>,
    {
        self.inner.submissions.fetch_add(1, Ordering::SeqCst);
        let mut state = self.inner.state.lock().await;
        if std::mem::take(&mut state.reject_next) {
            return Err(CallError::Rejected);
        }
        effect(&mut *state)?;

        state.tx_count += 1;
        state.block_number += 1;
        let receipt = TxReceipt {
            hash: format!("0x{:064x}", state.tx_count),
            block_number: state.block_number,
        };
        let (pending, sender) = PendingTx::new(receipt.hash.clone());
        if state.stall_confirmations {
            state.stalled.push((sender, receipt));
        } else {
            let _ = sender.send(Ok(receipt));
        }
        Ok(pending)
    }
}

impl ChainState {
    fn insert_project(&mut self, owner: &Address, name: &str, description: &str) -> ProjectId {
        let id = self.project_ids.len() as u64 + 1;
        self.projects.insert(
            id,
            ProjectRecord {
                id,
                name: name.to_string(),
                description: description.to_string(),
                owner: *owner,
                is_listed: true,
                is_approved: false,
                total_donations: 0,
                subscription_end_time: self.now + SUBSCRIPTION_SECS,
            },
        );
        self.project_ids.push(id);
        id
    }

    fn record_donation(&mut self, id: ProjectId, donor: &Address, amount: Wei, timestamp: i64) {
        self.donations.entry(id).or_default().push(DonationRecord {
            donor: *donor,
            amount,
            timestamp,
        });
        if let Some(project) = self.projects.get_mut(&id) {
            project.total_donations = project.total_donations.saturating_add(amount);
        }
    }

    fn liveness(&self, kind: ContractKind) -> CallResult<Address> {
        if self.liveness_failure == Some(kind) {
            return Err(CallError::Transport(format!("{kind} did not respond")));
        }
        Ok(self.owner)
    }

    fn project(&self, id: ProjectId) -> CallResult<ProjectRecord> {
        if self.failing_projects.contains(&id) {
            return Err(CallError::Transport(format!("malformed project {id}")));
        }
        self.projects
            .get(&id)
            .cloned()
            .ok_or_else(|| CallError::Reverted("Project does not exist".to_string()))
    }

    /// Settle a request once half the members have voted.
    fn settle(&mut self, id: ProjectId) {
        let member_count = self.members.len() as u64;
        let Some(request) = self.requests.get_mut(&id) else {
            return;
        };
        if request.total_votes().saturating_mul(2) < member_count {
            return;
        }
        request.is_processed = true;
        request.is_approved = request.yes_votes > request.no_votes;
        let approved = request.is_approved;
        if let Some(project) = self.projects.get_mut(&id) {
            project.is_approved = approved;
        }
    }
}

// region:    --- Wallet

struct SandboxWallet {
    chain: InMemoryChain,
}

#[async_trait]
impl WalletProvider for SandboxWallet {
    async fn request_accounts(&self) -> CallResult<Vec<Address>> {
        Ok(self.chain.read().await.accounts.clone())
    }

    async fn chain_id(&self) -> CallResult<u64> {
        Ok(self.chain.read().await.wallet_chain_id)
    }

    async fn switch_chain(&self, chain_id: u64) -> CallResult<()> {
        let mut state = self.chain.inner.state.lock().await;
        state.switch_requests += 1;
        if state.decline_switch {
            return Err(CallError::Rejected);
        }
        state.wallet_chain_id = chain_id;
        Ok(())
    }
}

// endregion: --- Wallet

// region:    --- Contracts

struct SandboxFactory {
    chain: InMemoryChain,
}

impl ContractFactory for SandboxFactory {
    fn project_listing(&self, entry: &ContractEntry, signer: &Address) -> Arc<dyn ProjectListingContract> {
        Arc::new(SandboxContract::new(&self.chain, entry, signer))
    }

    fn dao(&self, entry: &ContractEntry, signer: &Address) -> Arc<dyn DaoContract> {
        Arc::new(SandboxContract::new(&self.chain, entry, signer))
    }

    fn donate(&self, entry: &ContractEntry, signer: &Address) -> Arc<dyn DonateContract> {
        Arc::new(SandboxContract::new(&self.chain, entry, signer))
    }
}

struct SandboxContract {
    chain: InMemoryChain,
    address: Address,
    signer: Address,
}

impl SandboxContract {
    fn new(chain: &InMemoryChain, entry: &ContractEntry, signer: &Address) -> Self {
        Self {
            chain: chain.clone(),
            address: entry.address,
            signer: *signer,
        }
    }
}

#[async_trait]
impl ProjectListingContract for SandboxContract {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn owner(&self) -> CallResult<Address> {
        self.chain.read().await.liveness(ContractKind::ProjectListing)
    }

    async fn project_id_at(&self, index: u64) -> CallResult<ProjectId> {
        let state = self.chain.read().await;
        if state.failing_indexes.contains(&index) {
            return Err(CallError::Transport(format!("malformed entry at {index}")));
        }
        usize::try_from(index)
            .ok()
            .and_then(|i| state.project_ids.get(i).copied())
            .ok_or(CallError::OutOfRange)
    }

    async fn project_count(&self) -> CallResult<u64> {
        Ok(self.chain.read().await.project_ids.len() as u64)
    }

    async fn approved_project_ids(&self) -> CallResult<Vec<ProjectId>> {
        let state = self.chain.read().await;
        Ok(state
            .project_ids
            .iter()
            .copied()
            .filter(|id| state.projects.get(id).is_some_and(|p| p.is_approved))
            .collect())
    }

    async fn get_project(&self, id: ProjectId) -> CallResult<ProjectRecord> {
        self.chain.read().await.project(id)
    }

    async fn list_project(&self, name: &str, description: &str, value: Wei) -> CallResult<PendingTx> {
        let owner = self.signer;
        self.chain
            .submit(move |state| {
                if value != state.subscription_fee {
                    return Err(CallError::Reverted("Incorrect subscription fee".to_string()));
                }
                state.insert_project(&owner, name, description);
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl DaoContract for SandboxContract {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn owner(&self) -> CallResult<Address> {
        self.chain.read().await.liveness(ContractKind::Dao)
    }

    async fn is_member(&self, account: &Address) -> CallResult<bool> {
        Ok(self.chain.read().await.members.contains(account))
    }

    async fn member(&self, account: &Address) -> CallResult<MemberRecord> {
        let state = self.chain.read().await;
        Ok(MemberRecord {
            is_member: state.members.contains(account),
            staked_amount: state.stakes.get(account).copied().unwrap_or_default(),
        })
    }

    async fn member_count(&self) -> CallResult<u64> {
        Ok(self.chain.read().await.members.len() as u64)
    }

    async fn total_staked(&self) -> CallResult<Wei> {
        Ok(self.chain.read().await.stakes.values().sum())
    }

    async fn quorum(&self) -> CallResult<u64> {
        let state = self.chain.read().await;
        Ok(state
            .quorum_override
            .unwrap_or_else(|| VoteTally::quorum_for(state.members.len() as u64)))
    }

    async fn members(&self) -> CallResult<Vec<Address>> {
        Ok(self.chain.read().await.members.clone())
    }

    async fn project_request(&self, id: ProjectId) -> CallResult<ProjectRequest> {
        Ok(self.chain.read().await.requests.get(&id).cloned().unwrap_or_default())
    }

    async fn has_voted(&self, account: &Address, id: ProjectId) -> CallResult<bool> {
        Ok(self.chain.read().await.votes.contains(&(*account, id)))
    }

    async fn join_dao(&self, value: Wei) -> CallResult<PendingTx> {
        let account = self.signer;
        self.chain
            .submit(move |state| {
                if state.members.contains(&account) {
                    return Err(CallError::Reverted("Already a DAO member".to_string()));
                }
                if value < state.min_stake {
                    return Err(CallError::Reverted("Insufficient stake amount".to_string()));
                }
                state.members.push(account);
                state.stakes.insert(account, value);
                Ok(())
            })
            .await
    }

    async fn vote_on_project(&self, id: ProjectId, in_favor: bool) -> CallResult<PendingTx> {
        let account = self.signer;
        self.chain
            .submit(move |state| {
                if !state.members.contains(&account) {
                    return Err(CallError::Reverted("Not a DAO member".to_string()));
                }
                if state.votes.contains(&(account, id)) {
                    return Err(CallError::Reverted("Already voted".to_string()));
                }
                let request = state
                    .requests
                    .get_mut(&id)
                    .ok_or_else(|| CallError::Reverted("Project request does not exist".to_string()))?;
                if request.is_processed {
                    return Err(CallError::Reverted("Project request already processed".to_string()));
                }
                if in_favor {
                    request.yes_votes += 1;
                } else {
                    request.no_votes += 1;
                }
                state.votes.insert((account, id));
                state.settle(id);
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl DonateContract for SandboxContract {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn owner(&self) -> CallResult<Address> {
        self.chain.read().await.liveness(ContractKind::Donate)
    }

    async fn donation_at(&self, project_id: ProjectId, index: u64) -> CallResult<DonationRecord> {
        let state = self.chain.read().await;
        if state.failing_donations.contains(&(project_id, index)) {
            return Err(CallError::Transport(format!("malformed donation {project_id}/{index}")));
        }
        state
            .donations
            .get(&project_id)
            .and_then(|list| usize::try_from(index).ok().and_then(|i| list.get(i)))
            .cloned()
            .ok_or(CallError::OutOfRange)
    }

    async fn donate(&self, project_id: ProjectId, value: Wei) -> CallResult<PendingTx> {
        let donor = self.signer;
        self.chain
            .submit(move |state| {
                if value == 0 {
                    return Err(CallError::Reverted("Donation must be greater than 0".to_string()));
                }
                if !state.projects.get(&project_id).is_some_and(|p| p.is_listed && p.is_approved) {
                    return Err(CallError::Reverted("Project not approved".to_string()));
                }
                let now = state.now;
                state.record_donation(project_id, &donor, value, now);
                Ok(())
            })
            .await
    }
}

// endregion: --- Contracts

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn vote_settles_once_half_the_members_voted() {
        let chain = InMemoryChain::new(421_614);
        let owner = InMemoryChain::account(9);
        let id = chain.seed_project(&owner, "Reef", "Coral nursery").await;
        chain.open_request(id).await;
        for byte in 1..=4 {
            chain.seed_member(&InMemoryChain::account(byte), DEFAULT_FEE).await;
        }
        let factory = chain.factory();
        let config = chain.contracts_config();

        for byte in 1..=2 {
            let dao = factory.dao(&config.dao, &InMemoryChain::account(byte));
            dao.vote_on_project(id, true).await.unwrap().wait().await.unwrap();
        }

        let request = chain.request(id).await.unwrap();
        assert!(request.is_processed);
        assert!(request.is_approved);
        assert!(chain.project(id).await.unwrap().is_approved);
        assert_eq!(chain.submissions(), 2);
    }

    #[tokio::test]
    async fn wrong_fee_reverts_without_state_change() {
        let chain = InMemoryChain::new(421_614);
        let listing = chain
            .factory()
            .project_listing(&chain.contracts_config().project_listing, &InMemoryChain::account(1));

        let err = listing.list_project("Reef", "Coral nursery", 1).await.unwrap_err();

        assert_eq!(err, CallError::Reverted("Incorrect subscription fee".to_string()));
        assert_eq!(listing.project_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn stalled_confirmations_are_released_on_demand() {
        let chain = InMemoryChain::new(421_614);
        chain.stall_confirmations(true).await;
        let dao = chain.factory().dao(&chain.contracts_config().dao, &InMemoryChain::account(1));

        let pending = dao.join_dao(DEFAULT_FEE).await.unwrap();
        assert!(chain.is_member(&InMemoryChain::account(1)).await);

        assert_eq!(chain.confirm_stalled().await, 1);
        assert_eq!(pending.wait().await.unwrap().block_number, 2);
    }
}
