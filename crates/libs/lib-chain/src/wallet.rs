//! # Chain Connection
//!
//! Wallet-backed connection state. The wallet is an injected capability; passing
//! `None` models a browser without a wallet extension.

use crate::contracts::{CallError, CallResult};
use async_trait::async_trait;
use lib_core::{Address, AppError, Result};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

/// Request/response surface of an injected wallet.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// `eth_requestAccounts`. May prompt the user.
    async fn request_accounts(&self) -> CallResult<Vec<Address>>;

    /// `eth_chainId`.
    async fn chain_id(&self) -> CallResult<u64>;

    /// `wallet_switchEthereumChain`. Fails with [`CallError::Rejected`] when the
    /// user declines.
    async fn switch_chain(&self, chain_id: u64) -> CallResult<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionState {
    pub address: Option<Address>,
    pub chain_id: Option<u64>,
    pub is_connected: bool,
    pub is_correct_network: bool,
}

/// Owns the connection state and publishes every change.
pub struct ConnectionProvider {
    wallet: Option<Arc<dyn WalletProvider>>,
    required_chain_id: u64,
    state_tx: watch::Sender<ConnectionState>,
}

impl ConnectionProvider {
    pub fn new(wallet: Option<Arc<dyn WalletProvider>>, required_chain_id: u64) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::default());
        Self {
            wallet,
            required_chain_id,
            state_tx,
        }
    }

    pub fn required_chain_id(&self) -> u64 {
        self.required_chain_id
    }

    fn wallet(&self) -> Result<&Arc<dyn WalletProvider>> {
        self.wallet.as_ref().ok_or_else(|| {
            AppError::WalletNotFound("no injected wallet provider".to_string())
        })
    }

    /// Request accounts, read the chain id and switch networks if needed.
    ///
    /// When the user declines the switch the connection is kept but marked as on
    /// the wrong network, and `WrongNetwork` is returned.
    #[instrument(skip(self))]
    pub async fn connect(&self) -> Result<ConnectionState> {
        let wallet = self.wallet()?;

        let accounts = wallet.request_accounts().await.map_err(wallet_error)?;
        let address = accounts.into_iter().next().ok_or(AppError::NotConnected)?;
        let chain_id = wallet.chain_id().await.map_err(wallet_error)?;

        self.publish(Some(address), Some(chain_id));
        info!(address = %address, chain_id, "wallet connected");

        if chain_id != self.required_chain_id {
            self.request_network_switch(self.required_chain_id).await?;
        }
        Ok(self.state())
    }

    /// Ask the wallet to switch to `target`.
    #[instrument(skip(self))]
    pub async fn request_network_switch(&self, target: u64) -> Result<()> {
        let wallet = self.wallet()?;
        match wallet.switch_chain(target).await {
            Ok(()) => {
                let address = self.state().address;
                self.publish(address, Some(target));
                info!(chain_id = target, "network switched");
                Ok(())
            }
            Err(CallError::Rejected) => {
                warn!(chain_id = target, "network switch declined");
                Err(AppError::WrongNetwork {
                    expected: self.required_chain_id,
                    actual: self.state().chain_id,
                })
            }
            Err(e) => Err(wallet_error(e)),
        }
    }

    pub fn disconnect(&self) {
        self.state_tx.send_replace(ConnectionState::default());
        info!("wallet disconnected");
    }

    /// Wallet `accountsChanged` event. An empty list means the wallet locked or
    /// revoked access.
    pub fn accounts_changed(&self, accounts: Vec<Address>) -> ConnectionState {
        match accounts.into_iter().next() {
            Some(address) => {
                let chain_id = self.state().chain_id;
                self.publish(Some(address), chain_id);
            }
            None => self.disconnect(),
        }
        self.state()
    }

    /// Wallet `chainChanged` event. A connected wallet that moved off the required
    /// chain is asked to switch back; if the user declines, the state stays on the
    /// wrong network.
    #[instrument(skip(self))]
    pub async fn chain_changed(&self, chain_id: u64) -> ConnectionState {
        let address = self.state().address;
        self.publish(address, Some(chain_id));

        let state = self.state();
        if state.is_connected && !state.is_correct_network {
            if let Err(e) = self.request_network_switch(self.required_chain_id).await {
                warn!(error = %e, "wallet left on the wrong network");
            }
        }
        self.state()
    }

    pub fn state(&self) -> ConnectionState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// The connected account, provided the wallet is on the required chain.
    pub fn ensure_ready(&self) -> Result<Address> {
        let state = self.state();
        let address = match (state.is_connected, state.address) {
            (true, Some(address)) => address,
            _ => return Err(AppError::NotConnected),
        };
        if !state.is_correct_network {
            return Err(AppError::WrongNetwork {
                expected: self.required_chain_id,
                actual: state.chain_id,
            });
        }
        Ok(address)
    }

    fn publish(&self, address: Option<Address>, chain_id: Option<u64>) {
        let is_connected = address.is_some();
        self.state_tx.send_replace(ConnectionState {
            address,
            chain_id,
            is_connected,
            is_correct_network: is_connected && chain_id == Some(self.required_chain_id),
        });
    }
}

fn wallet_error(err: CallError) -> AppError {
    match err {
        CallError::Rejected => AppError::UserRejected,
        other => AppError::Rpc(other.to_string()),
    }
}
