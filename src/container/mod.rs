use crate::errors::Result;
use crate::net::Ipv6Cidr;
use crate::pattern::GenRange;

pub mod binary;
pub mod tree;

pub use binary::BinaryAddressContainer;
pub use tree::AddressTree;

/// Capability contract shared by every corpus representation.
///
/// Loading (`add_address`, `add_addresses`) needs exclusive access and is
/// serialized by the caller. Once loaded, a container is only read, and all
/// read methods are safe to call from many threads at once.
pub trait AddressContainer: Send + Sync {
    /// Insert one address; `false` when it was already present
    fn add_address(&mut self, addr: u128) -> bool;

    /// Insert many addresses, returning (added, skipped as duplicates)
    fn add_addresses(&mut self, addrs: &[u128]) -> (usize, usize) {
        let added = addrs.iter().filter(|&&a| self.add_address(a)).count();
        (added, addrs.len() - added)
    }

    fn contains_address(&self, addr: u128) -> bool;

    /// Every stored address
    fn all_addresses(&self) -> Result<Vec<u128>>;

    /// Addresses at the given positions of the ascending address order.
    ///
    /// Results follow `positions` once sorted; positions past the end are
    /// skipped.
    fn addresses_at(&self, positions: &[u64]) -> Result<Vec<u128>>;

    fn addresses_in_cidr(&self, network: &Ipv6Cidr) -> Result<Vec<u128>>;

    fn count_in_cidr(&self, network: &Ipv6Cidr) -> Result<u64>;

    fn addresses_in_pattern(&self, range: &GenRange) -> Result<Vec<u128>>;

    fn count_in_pattern(&self, range: &GenRange) -> Result<u64>;

    /// Number of distinct addresses stored
    fn size(&self) -> u64;

    /// Return a human-readable name for this representation
    fn name(&self) -> &'static str;
}
