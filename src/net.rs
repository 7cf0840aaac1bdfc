use crate::constants::{NYBBLE_COUNT, NYBBLES_PER_HALF};
use crate::errors::{AddressSpaceError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

/// Nybble and half-word decomposition of 128-bit addresses
pub mod nybble {
    use super::*;

    /// Split an address into its 32 nybbles, most significant first
    pub fn to_nybbles(addr: u128) -> [u8; NYBBLE_COUNT] {
        let mut out = [0u8; NYBBLE_COUNT];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = nybble_at(addr, i);
        }
        out
    }

    /// Rebuild an address from 32 nybbles, most significant first
    pub fn from_nybbles(nybbles: &[u8; NYBBLE_COUNT]) -> u128 {
        nybbles
            .iter()
            .fold(0u128, |acc, &n| (acc << 4) | u128::from(n & 0xF))
    }

    /// Value of the nybble at `index` (0 is the most significant)
    #[inline]
    pub fn nybble_at(addr: u128, index: usize) -> u8 {
        ((addr >> (124 - 4 * index)) & 0xF) as u8
    }

    /// Replace the nybble at `index` with `value`
    #[inline]
    pub fn with_nybble(addr: u128, index: usize, value: u8) -> u128 {
        let shift = 124 - 4 * index;
        (addr & !(0xFu128 << shift)) | (u128::from(value & 0xF) << shift)
    }

    /// Split into (first, second) 64-bit halves
    #[inline]
    pub fn split_halves(addr: u128) -> (u64, u64) {
        ((addr >> 64) as u64, addr as u64)
    }

    #[inline]
    pub fn join_halves(first: u64, second: u64) -> u128 {
        (u128::from(first) << 64) | u128::from(second)
    }

    /// Shift of nybble `index` (0..16) inside its 64-bit half
    #[inline]
    pub fn half_shift(index: usize) -> u32 {
        (4 * (NYBBLES_PER_HALF - 1 - (index % NYBBLES_PER_HALF))) as u32
    }

    /// Count positions where two nybble sequences differ
    pub fn hamming_distance(a: &[u8], b: &[u8]) -> Result<usize> {
        if a.len() != b.len() {
            return Err(AddressSpaceError::LengthMismatch {
                left: a.len(),
                right: b.len(),
            });
        }
        Ok(a.iter().zip(b).filter(|(x, y)| x != y).count())
    }
}

/// IPv6 networks in CIDR form
pub mod cidr {
    use super::*;

    /// An IPv6 network: a base address and a contiguous prefix mask
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Ipv6Cidr {
        addr: u128,
        prefix_len: u8,
    }

    impl Ipv6Cidr {
        pub fn new(addr: impl Into<u128>, prefix_len: u8) -> Result<Self> {
            if prefix_len > 128 {
                return Err(AddressSpaceError::InvalidMask(format!(
                    "prefix length /{} exceeds 128",
                    prefix_len
                )));
            }
            Ok(Self {
                addr: addr.into(),
                prefix_len,
            })
        }

        /// Build a network from an explicit 128-bit mask, which must be a run of leading ones
        pub fn from_mask(addr: impl Into<u128>, mask: u128) -> Result<Self> {
            let ones = mask.leading_ones();
            if mask.count_ones() != ones {
                return Err(AddressSpaceError::InvalidMask(format!(
                    "mask {:#034x} is not contiguous",
                    mask
                )));
            }
            Self::new(addr, ones as u8)
        }

        pub fn prefix_len(&self) -> u8 {
            self.prefix_len
        }

        pub fn mask(&self) -> u128 {
            prefix_mask(self.prefix_len)
        }

        /// Base address with all host bits cleared
        pub fn network(&self) -> u128 {
            self.addr & self.mask()
        }

        pub fn contains(&self, addr: u128) -> bool {
            addr & self.mask() == self.network()
        }

        pub fn is_nybble_aligned(&self) -> bool {
            self.prefix_len % 4 == 0
        }
    }

    impl FromStr for Ipv6Cidr {
        type Err = AddressSpaceError;

        /// Parse CIDR notation (e.g., "2600:0:1::/64")
        fn from_str(s: &str) -> Result<Self> {
            let (ip, len) = s.split_once('/').ok_or_else(|| {
                AddressSpaceError::InvalidMask(format!("'{}' is not in CIDR format", s))
            })?;
            let ip = Ipv6Addr::from_str(ip.trim()).map_err(|e| {
                AddressSpaceError::InvalidMask(format!("invalid address '{}': {}", ip, e))
            })?;
            let len = len.trim().parse::<u8>().map_err(|e| {
                AddressSpaceError::InvalidMask(format!("invalid prefix length '{}': {}", len, e))
            })?;
            Self::new(ip, len)
        }
    }

    impl fmt::Display for Ipv6Cidr {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}/{}", Ipv6Addr::from(self.network()), self.prefix_len)
        }
    }

    /// A 128-bit mask with the top `prefix_len` bits set
    pub fn prefix_mask(prefix_len: u8) -> u128 {
        match prefix_len {
            0 => 0,
            len if len >= 128 => u128::MAX,
            len => !(u128::MAX >> len),
        }
    }
}

pub use cidr::Ipv6Cidr;
