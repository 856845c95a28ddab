//! # Chain Library
//!
//! The on-chain aggregation and synchronization layer of GreenStake: wallet
//! connection, contract bindings, read aggregation, write coordination and
//! scheduled refresh.

// Declare all modules
pub mod aggregator;
pub mod contracts;
pub mod coordinator;
pub mod refresh;
#[cfg(any(test, feature = "sandbox"))]
pub mod sandbox;
pub mod session;
pub mod video;
pub mod wallet;

// Re-export commonly used types from root for convenience
pub use aggregator::{
    Aggregation, DaoQuery, DonatableProjectsQuery, IdSource, JoinPlan, ListedProjectsQuery,
    ProfileQuery, ReadAggregator,
};
pub use contracts::{
    CallError, CallResult, ContractFactory, ContractHandleSet, ContractKind, ContractRegistry,
    DaoContract, DonateContract, PendingTx, ProjectListingContract, TxReceipt,
};
pub use coordinator::{TxStatus, WriteCoordinator};
pub use refresh::{PollHandle, RefreshDriver, RefreshOutcome, RefreshTrigger};
pub use session::GreenStakeSession;
pub use video::{VideoStore, VideoUpload};
pub use wallet::{ConnectionProvider, ConnectionState, WalletProvider};
