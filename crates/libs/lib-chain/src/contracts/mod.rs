//! # Contract Bindings
//!
//! Callable handles for the three logical contracts and the registry that
//! publishes them once every handle has answered a liveness check.

pub mod interface;
pub mod pending;
pub mod registry;

pub use interface::{
    CallError, CallResult, ContractFactory, ContractKind, DaoContract, DonateContract,
    ProjectListingContract,
};
pub use pending::{PendingTx, TxReceipt};
pub use registry::{ContractHandleSet, ContractRegistry};
