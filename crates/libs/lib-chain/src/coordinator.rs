//! # Write Coordinator
//!
//! Runs the four state-changing calls. Local preconditions are checked before
//! anything is submitted, confirmation is awaited with a bounded timeout and
//! failures are classified into the user-facing error kinds. Nothing is retried.

use crate::contracts::{CallError, ContractHandleSet, ContractRegistry, PendingTx, TxReceipt};
use crate::refresh::RefreshTrigger;
use crate::wallet::ConnectionProvider;
use lib_core::{Address, AppError, Config, ProjectId, Result, Wei};
use lib_utils::{format_ether, parse_ether, validate_length};
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

pub const NAME_LENGTH: (usize, usize) = (3, 50);
pub const DESCRIPTION_LENGTH: (usize, usize) = (50, 500);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TxStatus {
    Confirmed(TxReceipt),
    /// Submitted but not confirmed within the timeout. It may still land; the
    /// next refresh will show it.
    Unconfirmed { hash: String },
}

impl TxStatus {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, TxStatus::Confirmed(_))
    }

    pub fn hash(&self) -> &str {
        match self {
            TxStatus::Confirmed(receipt) => &receipt.hash,
            TxStatus::Unconfirmed { hash } => hash,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            TxStatus::Confirmed(_) => "Transaction confirmed",
            TxStatus::Unconfirmed { .. } => {
                "Transaction is taking longer than expected. Please check back shortly."
            }
        }
    }
}

pub struct WriteCoordinator {
    connection: Arc<ConnectionProvider>,
    registry: Arc<ContractRegistry>,
    subscription_fee: Wei,
    min_stake: Wei,
    confirmation_timeout: Duration,
    listeners: Mutex<Vec<Weak<dyn RefreshTrigger>>>,
}

impl WriteCoordinator {
    pub fn new(
        connection: Arc<ConnectionProvider>,
        registry: Arc<ContractRegistry>,
        config: &Config,
    ) -> Result<Self> {
        Ok(Self {
            connection,
            registry,
            subscription_fee: config.subscription_fee_wei()?,
            min_stake: config.min_stake_wei()?,
            confirmation_timeout: config.confirmation_timeout,
            listeners: Mutex::new(Vec::new()),
        })
    }

    /// Refresh `listener` after every confirmed write, for as long as it lives.
    pub async fn on_success(&self, listener: Weak<dyn RefreshTrigger>) {
        self.listeners.lock().await.push(listener);
    }

    /// List a project, paying the subscription fee.
    #[instrument(skip(self, description))]
    pub async fn list_project(&self, name: &str, description: &str) -> Result<TxStatus> {
        validate_length(name, NAME_LENGTH.0, NAME_LENGTH.1, "Project name").map_err(AppError::InvalidInput)?;
        validate_length(description, DESCRIPTION_LENGTH.0, DESCRIPTION_LENGTH.1, "Description")
            .map_err(AppError::InvalidInput)?;
        let (_, handles) = self.ready().await?;

        info!(fee = %format_ether(self.subscription_fee), "listing project");
        let pending = handles
            .project_listing
            .list_project(name.trim(), description.trim(), self.subscription_fee)
            .await
            .map_err(|e| self.classify(e))?;
        self.confirm(pending).await
    }

    /// Join the DAO, staking the minimum amount.
    #[instrument(skip(self))]
    pub async fn join_dao(&self) -> Result<TxStatus> {
        let (account, handles) = self.ready().await?;

        if handles.dao.is_member(&account).await? {
            return Err(AppError::InvalidInput("You are already a DAO member".to_string()));
        }

        info!(stake = %format_ether(self.min_stake), "joining DAO");
        let pending = handles
            .dao
            .join_dao(self.min_stake)
            .await
            .map_err(|e| self.classify(e))?;
        self.confirm(pending).await
    }

    /// Vote on a DAO request. Membership, prior vote and request state are read
    /// first; any failed check returns before submission.
    #[instrument(skip(self))]
    pub async fn vote_on_project(&self, project_id: ProjectId, in_favor: bool) -> Result<TxStatus> {
        if project_id == 0 {
            return Err(AppError::InvalidInput("Invalid project id".to_string()));
        }
        let (account, handles) = self.ready().await?;
        let dao = &handles.dao;

        if !dao.is_member(&account).await? {
            return Err(AppError::NotMember);
        }
        if dao.has_voted(&account, project_id).await? {
            return Err(AppError::AlreadyVoted);
        }
        let request = dao.project_request(project_id).await?;
        if !request.exists() {
            return Err(AppError::InvalidInput(
                "This project is not open for DAO voting yet".to_string(),
            ));
        }
        if request.is_processed {
            return Err(AppError::AlreadyProcessed);
        }

        let pending = dao
            .vote_on_project(project_id, in_favor)
            .await
            .map_err(|e| self.classify(e))?;
        self.confirm(pending).await
    }

    /// Donate `amount` ether to a project.
    #[instrument(skip(self))]
    pub async fn donate(&self, project_id: ProjectId, amount: &str) -> Result<TxStatus> {
        let value = match parse_ether(amount) {
            Ok(value) if value > 0 => value,
            _ => {
                return Err(AppError::InvalidInput(
                    "Please enter a valid donation amount".to_string(),
                ))
            }
        };
        let (_, handles) = self.ready().await?;

        let pending = handles
            .donate
            .donate(project_id, value)
            .await
            .map_err(|e| self.classify(e))?;
        self.confirm(pending).await
    }

    /// The connected account and its handles. A wallet on the wrong chain is asked
    /// to switch first, and the handles are rebound once it has.
    async fn ready(&self) -> Result<(Address, Arc<ContractHandleSet>)> {
        let required = self.connection.required_chain_id();
        let (account, switched) = match self.connection.ensure_ready() {
            Ok(account) => (account, false),
            Err(AppError::WrongNetwork { actual, .. }) => {
                info!(?actual, required, "wrong network, requesting a switch before writing");
                self.connection.request_network_switch(required).await?;
                (self.connection.ensure_ready()?, true)
            }
            Err(e) => return Err(e),
        };

        let handles = match self.registry.current().await {
            Some(handles) => handles,
            None if switched => self
                .registry
                .rebuild(&account, required)
                .await?
                .ok_or_else(|| {
                    AppError::ContractsUnavailable("Connection changed while binding contracts".to_string())
                })?,
            None => self.registry.require().await?,
        };
        if handles.signer != account {
            return Err(AppError::ContractsUnavailable(
                "Contract handles are bound to another account".to_string(),
            ));
        }
        Ok((account, handles))
    }

    async fn confirm(&self, pending: PendingTx) -> Result<TxStatus> {
        let hash = pending.hash().to_string();
        info!(hash = %hash, "transaction submitted");

        match tokio::time::timeout(self.confirmation_timeout, pending.wait()).await {
            Err(_) => {
                warn!(hash = %hash, timeout_secs = self.confirmation_timeout.as_secs(), "confirmation timed out");
                Ok(TxStatus::Unconfirmed { hash })
            }
            Ok(Err(e)) => {
                let err = self.classify(e);
                error!(hash = %hash, error = %err, "transaction failed");
                Err(err)
            }
            Ok(Ok(receipt)) => {
                info!(hash = %hash, block = receipt.block_number, "transaction confirmed");
                self.notify_listeners().await;
                Ok(TxStatus::Confirmed(receipt))
            }
        }
    }

    async fn notify_listeners(&self) {
        let live: Vec<Arc<dyn RefreshTrigger>> = {
            let mut listeners = self.listeners.lock().await;
            listeners.retain(|l| l.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        for listener in live {
            listener.refresh().await;
        }
    }

    fn classify(&self, err: CallError) -> AppError {
        classify(err, self.connection.required_chain_id())
    }
}

/// Map a failed submission or confirmation to a user-facing error.
pub fn classify(err: CallError, expected_chain: u64) -> AppError {
    let text = match err {
        CallError::Rejected => return AppError::UserRejected,
        CallError::InsufficientFunds => {
            return AppError::InsufficientFunds("insufficient funds for gas * price + value".to_string())
        }
        CallError::NetworkChanged => {
            return AppError::WrongNetwork { expected: expected_chain, actual: None }
        }
        CallError::OutOfRange => return AppError::Transaction("Transaction reverted".to_string()),
        CallError::Reverted(reason) => reason,
        CallError::Transport(message) => message,
    };

    let lower = text.to_lowercase();
    if lower.contains("user rejected") || lower.contains("user denied") {
        AppError::UserRejected
    } else if lower.contains("already voted") {
        AppError::AlreadyVoted
    } else if lower.contains("not a dao member") {
        AppError::NotMember
    } else if lower.contains("already processed") {
        AppError::AlreadyProcessed
    } else if lower.contains("insufficient funds") {
        AppError::InsufficientFunds(text)
    } else if lower.contains("network changed") {
        AppError::WrongNetwork { expected: expected_chain, actual: None }
    } else {
        AppError::Transaction(format!("Transaction failed: {text}"))
    }
}
