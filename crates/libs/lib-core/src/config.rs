//! # Application Configuration
//!
//! Configuration comes from two places:
//!
//! - the static contract artifact (addresses, interface descriptors, subscription fee,
//!   minimum stake), a JSON file produced by the contract deployment;
//! - `GREENSTAKE_*` environment variables for the chain and timing settings.
//!
//! ```rust,no_run
//! use lib_core::config::Config;
//!
//! # fn main() -> lib_core::Result<()> {
//! let config = Config::load()?;
//! println!("listing contract at {}", config.contracts.project_listing.address);
//! # Ok(())
//! # }
//! ```

use crate::error::{AppError, Result};
use crate::model::{Address, Wei};
use lib_utils::{get_env, get_env_opt, get_env_parse_or, parse_ether};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Arbitrum Sepolia.
pub const DEFAULT_CHAIN_ID: u64 = 421_614;
pub const DEFAULT_CHAIN_NAME: &str = "Arbitrum Sepolia";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_VIDEO_STORE: &str = "data/project_videos.json";

/// Address and interface descriptor of one deployed contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractEntry {
    pub address: Address,
    #[serde(default)]
    pub abi: serde_json::Value,
}

/// The three logical contracts.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractsConfig {
    pub project_listing: ContractEntry,
    pub dao: ContractEntry,
    pub donate: ContractEntry,
}

// region:    --- Artifact
#[derive(Deserialize)]
struct Artifact {
    contracts: ArtifactContracts,
}

#[derive(Deserialize)]
struct ArtifactContracts {
    #[serde(rename = "ProjectListing")]
    project_listing: ListingArtifact,
    #[serde(rename = "DAO")]
    dao: DaoArtifact,
    #[serde(rename = "Donate")]
    donate: ContractEntry,
}

#[derive(Deserialize)]
struct ListingArtifact {
    #[serde(flatten)]
    entry: ContractEntry,
    #[serde(rename = "subscriptionFee")]
    subscription_fee: String,
}

#[derive(Deserialize)]
struct DaoArtifact {
    #[serde(flatten)]
    entry: ContractEntry,
    #[serde(rename = "minStakeAmount")]
    min_stake_amount: String,
}
// endregion: --- Artifact

/// Application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// The single chain the contracts are deployed on.
    pub chain_id: u64,
    pub chain_name: String,
    pub contracts: ContractsConfig,
    /// Listing fee in ether, e.g. `"0.01"`.
    pub subscription_fee: String,
    /// DAO stake in ether, e.g. `"0.01"`.
    pub min_stake_amount: String,
    pub provider_api_key: Option<String>,
    /// Interval of the refresh driver.
    pub poll_interval: Duration,
    /// How long a write waits for confirmation before reporting it as unconfirmed.
    pub confirmation_timeout: Duration,
    /// JSON map of project name to video URL.
    pub video_store_path: PathBuf,
}

impl Config {
    /// Load `.env`, read the environment and validate.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_env()?;
        config.validate()?;
        info!(
            chain_id = config.chain_id,
            poll_secs = config.poll_interval.as_secs(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Build the configuration from `GREENSTAKE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let artifact_path = get_env("GREENSTAKE_CONTRACT_CONFIG").map_err(env_error)?;
        let json = std::fs::read_to_string(&artifact_path)
            .map_err(|e| AppError::Config(format!("cannot read contract config {artifact_path}: {e}")))?;

        let mut config = Self::from_artifact_str(&json)?;
        config.chain_id = get_env_parse_or("GREENSTAKE_CHAIN_ID", DEFAULT_CHAIN_ID).map_err(env_error)?;
        if let Some(name) = get_env_opt("GREENSTAKE_CHAIN_NAME") {
            config.chain_name = name;
        }
        config.provider_api_key = get_env_opt("GREENSTAKE_PROVIDER_API_KEY");
        config.poll_interval = Duration::from_secs(
            get_env_parse_or("GREENSTAKE_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS).map_err(env_error)?,
        );
        config.confirmation_timeout = Duration::from_secs(
            get_env_parse_or("GREENSTAKE_CONFIRMATION_TIMEOUT_SECS", DEFAULT_CONFIRMATION_TIMEOUT_SECS)
                .map_err(env_error)?,
        );
        if let Some(path) = get_env_opt("GREENSTAKE_VIDEO_STORE") {
            config.video_store_path = PathBuf::from(path);
        }
        Ok(config)
    }

    /// Build a configuration from the contract artifact alone, with defaults for
    /// everything else.
    pub fn from_artifact_str(json: &str) -> Result<Self> {
        let artifact: Artifact = serde_json::from_str(json)?;
        let ArtifactContracts { project_listing, dao, donate } = artifact.contracts;

        Ok(Self {
            chain_id: DEFAULT_CHAIN_ID,
            chain_name: DEFAULT_CHAIN_NAME.to_string(),
            contracts: ContractsConfig {
                project_listing: project_listing.entry,
                dao: dao.entry,
                donate,
            },
            subscription_fee: project_listing.subscription_fee,
            min_stake_amount: dao.min_stake_amount,
            provider_api_key: None,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            confirmation_timeout: Duration::from_secs(DEFAULT_CONFIRMATION_TIMEOUT_SECS),
            video_store_path: PathBuf::from(DEFAULT_VIDEO_STORE),
        })
    }

    /// Validate values that the rest of the system assumes.
    pub fn validate(&self) -> Result<()> {
        if self.chain_id == 0 {
            return Err(AppError::Config("GREENSTAKE_CHAIN_ID must be non-zero".to_string()));
        }
        if self.subscription_fee_wei()? == 0 {
            return Err(AppError::Config("subscriptionFee must be greater than zero".to_string()));
        }
        if self.min_stake_wei()? == 0 {
            return Err(AppError::Config("minStakeAmount must be greater than zero".to_string()));
        }
        if self.poll_interval.is_zero() {
            return Err(AppError::Config("GREENSTAKE_POLL_INTERVAL_SECS must be at least 1".to_string()));
        }
        if self.confirmation_timeout.is_zero() {
            return Err(AppError::Config(
                "GREENSTAKE_CONFIRMATION_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn subscription_fee_wei(&self) -> Result<Wei> {
        parse_ether(&self.subscription_fee)
            .map_err(|e| AppError::Config(format!("subscriptionFee: {e}")))
    }

    pub fn min_stake_wei(&self) -> Result<Wei> {
        parse_ether(&self.min_stake_amount)
            .map_err(|e| AppError::Config(format!("minStakeAmount: {e}")))
    }
}

fn env_error(err: lib_utils::envs::Error) -> AppError {
    AppError::Config(err.to_string())
}
