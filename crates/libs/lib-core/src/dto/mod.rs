//! # View Objects
//!
//! Pure projections of the on-chain records. They are rebuilt on every aggregation
//! pass and never persisted.

pub mod profile;
pub mod projects;
pub mod status;

pub use profile::{ActivityKind, ProfileActivity, ProfileSummary};
pub use projects::{DaoOverview, DaoRequestView, ListedProjectView};
pub use status::{RequestStatus, VoteTally};
