//! # On-Chain Records
//!
//! Read-through copies of contract storage. None of these are owned by this
//! application; every value can be dropped and re-read at any time.

pub mod records;

/// 20-byte account identifier. Parsing accepts any hex case, so owners and donors
/// compare equal to the viewer whatever checksum casing the wallet reports.
pub use alloy_primitives::Address;
pub use records::{DonationRecord, MemberRecord, ProjectRecord, ProjectRequest};

/// Amount in the native currency's smallest unit (wei).
pub type Wei = u128;

/// Contract-assigned project id. Positive for real projects; zero is the
/// "no DAO request" sentinel.
pub type ProjectId = u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_equality_ignores_checksum_case() {
        let mixed: Address = "0x01D0CfEb9ecDc082839503Ae92BE26E16cA1d1dd".parse().unwrap();
        let lower: Address = "0x01d0cfeb9ecdc082839503ae92be26e16ca1d1dd".parse().unwrap();
        assert_eq!(mixed, lower);
        assert!("0x1234".parse::<Address>().is_err());
    }
}
