//! # Utilities Library
//!
//! Shared helpers for environment variables, currency units, time formatting and validation.

pub mod envs;
pub mod time;
pub mod units;
pub mod validation;

// Re-export commonly used functions
pub use envs::{get_env, get_env_opt, get_env_parse_or};
pub use time::{format_date, format_timestamp, now_unix};
pub use units::{format_ether, format_fixed, format_units, parse_ether, parse_units, ETHER_DECIMALS};
pub use validation::{validate_length, validate_not_empty};
