use crate::constants::{NYBBLE_COUNT, NYBBLES_PER_HALF, NYBBLE_VALUES};
use crate::errors::{AddressSpaceError, Result};
use crate::net::cidr::{prefix_mask, Ipv6Cidr};
use crate::net::nybble;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A hyper-rectangle of the address space: 32 nybbles, some of them wild.
///
/// Fixed positions must match exactly for an address to belong to the
/// pattern; wild positions match any value. Wild positions hold 0 in
/// `nybbles` so that equal patterns compare and hash equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "StoredRange")]
pub struct GenRange {
    nybbles: [u8; NYBBLE_COUNT],
    wild: u32,
}

/// Persisted field layout of a `GenRange`, checked before use
#[derive(Deserialize)]
struct StoredRange {
    nybbles: [u8; NYBBLE_COUNT],
    wild: u32,
}

impl TryFrom<StoredRange> for GenRange {
    type Error = AddressSpaceError;

    fn try_from(stored: StoredRange) -> Result<Self> {
        for (i, &value) in stored.nybbles.iter().enumerate() {
            if value >= NYBBLE_VALUES {
                return Err(AddressSpaceError::InvalidPattern(format!(
                    "nybble {} holds {}",
                    i, value
                )));
            }
            if stored.wild & (1 << i) != 0 && value != 0 {
                return Err(AddressSpaceError::InvalidPattern(format!(
                    "wild nybble {} holds {}",
                    i, value
                )));
            }
        }
        Ok(Self {
            nybbles: stored.nybbles,
            wild: stored.wild,
        })
    }
}

/// Bit-level view of one 64-bit half of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HalfMask {
    /// 0xF over every fixed nybble
    pub mask: u64,
    /// Fixed nybble values, zero elsewhere
    pub expected: u64,
    /// Smallest value matching the half (wild nybbles at 0)
    pub min: u64,
    /// Largest value matching the half (wild nybbles at 0xF)
    pub max: u64,
}

impl HalfMask {
    #[inline]
    pub fn matches(&self, value: u64) -> bool {
        value & self.mask == self.expected
    }

    pub fn is_exact(&self) -> bool {
        self.mask == u64::MAX
    }
}

/// Per-half masks derived from a `GenRange`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeMask {
    pub first: HalfMask,
    pub second: HalfMask,
}

impl GenRange {
    /// Zero-wildcard pattern matching exactly `addr`
    pub fn from_address(addr: u128) -> Self {
        Self {
            nybbles: nybble::to_nybbles(addr),
            wild: 0,
        }
    }

    /// Smallest pattern covering every address in `addrs`
    pub fn from_addresses(addrs: &[u128]) -> Option<Self> {
        let (first, rest) = addrs.split_first()?;
        let mut range = Self::from_address(*first);
        for &addr in rest {
            range.widen(addr);
        }
        Some(range)
    }

    /// Mark wild every fixed position where `addr` disagrees with the pattern
    pub fn widen(&mut self, addr: u128) {
        for i in 0..NYBBLE_COUNT {
            if !self.is_wild(i) && nybble::nybble_at(addr, i) != self.nybbles[i] {
                self.set_wild(i);
            }
        }
    }

    /// Copy of this pattern with `indices` additionally wild
    pub fn copy_with_wildened(&self, indices: &[usize]) -> Self {
        let mut copy = self.clone();
        for &i in indices {
            if i < NYBBLE_COUNT {
                copy.set_wild(i);
            }
        }
        copy
    }

    fn set_wild(&mut self, index: usize) {
        self.wild |= 1 << index;
        self.nybbles[index] = 0;
    }

    #[inline]
    pub fn is_wild(&self, index: usize) -> bool {
        self.wild & (1 << index) != 0
    }

    pub fn wildcard_count(&self) -> usize {
        self.wild.count_ones() as usize
    }

    pub fn wild_indices(&self) -> Vec<usize> {
        (0..NYBBLE_COUNT).filter(|&i| self.is_wild(i)).collect()
    }

    pub fn fixed_indices(&self) -> Vec<usize> {
        (0..NYBBLE_COUNT).filter(|&i| !self.is_wild(i)).collect()
    }

    pub fn is_fully_wild(&self) -> bool {
        self.wildcard_count() == NYBBLE_COUNT
    }

    /// Fixed value at `index`, `None` when wild
    pub fn nybble(&self, index: usize) -> Option<u8> {
        if self.is_wild(index) {
            None
        } else {
            self.nybbles.get(index).copied()
        }
    }

    /// Number of addresses the pattern spans: 16^wildcards
    pub fn size(&self) -> f64 {
        f64::from(NYBBLE_VALUES).powi(self.wildcard_count() as i32)
    }

    /// The pattern's center with wild positions at zero
    pub fn base_address(&self) -> u128 {
        nybble::from_nybbles(&self.nybbles)
    }

    /// Canonical dedup key: hex digit per fixed nybble, `?` per wild one
    pub fn signature(&self) -> String {
        (0..NYBBLE_COUNT)
            .map(|i| match self.nybble(i) {
                Some(n) => char::from_digit(u32::from(n), 16).unwrap_or('0'),
                None => '?',
            })
            .collect()
    }

    pub fn get_mask(&self) -> RangeMask {
        RangeMask {
            first: self.half_mask(0),
            second: self.half_mask(NYBBLES_PER_HALF),
        }
    }

    fn half_mask(&self, offset: usize) -> HalfMask {
        let mut mask = 0u64;
        let mut expected = 0u64;
        for i in offset..offset + NYBBLES_PER_HALF {
            let shift = nybble::half_shift(i);
            if !self.is_wild(i) {
                mask |= 0xF << shift;
                expected |= u64::from(self.nybbles[i]) << shift;
            }
        }
        HalfMask {
            mask,
            expected,
            min: expected,
            max: expected | !mask,
        }
    }

    pub fn contains(&self, addr: u128) -> bool {
        let (first, second) = nybble::split_halves(addr);
        let masks = self.get_mask();
        masks.first.matches(first) && masks.second.matches(second)
    }

    /// Draw an address from the pattern.
    ///
    /// Wild nybbles are uniform; each fixed nybble is independently replaced
    /// by a uniform value with probability `jitter`.
    pub fn random_address<R: Rng + ?Sized>(&self, rng: &mut R, jitter: f64) -> u128 {
        let jitter = jitter.clamp(0.0, 1.0);
        let mut addr = 0u128;
        for i in 0..NYBBLE_COUNT {
            let value = if self.is_wild(i) || (jitter > 0.0 && rng.gen_bool(jitter)) {
                rng.gen_range(0..NYBBLE_VALUES)
            } else {
                self.nybbles[i]
            };
            addr = (addr << 4) | u128::from(value);
        }
        addr
    }

    /// Whether any address of this pattern lies inside `network`
    pub fn is_compatible_with(&self, network: &Ipv6Cidr) -> bool {
        let both = self.fixed_mask() & network.mask();
        self.base_address() & both == network.network() & both
    }

    /// Whether some address matches both patterns
    pub fn overlaps(&self, other: &GenRange) -> bool {
        let shared = self.fixed_mask() & other.fixed_mask();
        self.base_address() & shared == other.base_address() & shared
    }

    /// 0xF over every fixed nybble of the full address
    fn fixed_mask(&self) -> u128 {
        let masks = self.get_mask();
        nybble::join_halves(masks.first.mask, masks.second.mask)
    }

    /// Narrow the pattern to the part lying inside `network`.
    ///
    /// Nybbles wholly covered by the prefix become fixed to the network's
    /// value. A nybble only partly covered stays wild; callers overwrite its
    /// prefix bits when drawing addresses.
    pub fn restrict_to(&self, network: &Ipv6Cidr) -> Result<Self> {
        if !self.is_compatible_with(network) {
            return Err(AddressSpaceError::IncompatibleNetwork(format!(
                "pattern {} lies outside {}",
                self, network
            )));
        }
        let mut restricted = self.clone();
        let whole = usize::from(network.prefix_len() / 4);
        let base = network.network();
        for i in 0..whole {
            restricted.nybbles[i] = nybble::nybble_at(base, i);
            restricted.wild &= !(1 << i);
        }
        Ok(restricted)
    }

    /// Overwrite the prefix bits of `addr` with those of `network`
    pub fn clamp_to_network(addr: u128, network: &Ipv6Cidr) -> u128 {
        let mask = prefix_mask(network.prefix_len());
        (network.network() & mask) | (addr & !mask)
    }
}

impl fmt::Display for GenRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sig = self.signature();
        for (i, chunk) in sig.as_bytes().chunks(4).enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            f.write_str(&String::from_utf8_lossy(chunk))?;
        }
        Ok(())
    }
}

impl FromStr for GenRange {
    type Err = AddressSpaceError;

    /// Parse either the grouped form (`2600:0000:...:000?`) or a bare signature
    fn from_str(s: &str) -> Result<Self> {
        let digits: Vec<char> = s.trim().chars().filter(|&c| c != ':').collect();
        if digits.len() != NYBBLE_COUNT {
            return Err(AddressSpaceError::InvalidPattern(format!(
                "'{}' has {} nybbles, expected {}",
                s,
                digits.len(),
                NYBBLE_COUNT
            )));
        }

        let mut range = Self {
            nybbles: [0; NYBBLE_COUNT],
            wild: 0,
        };
        for (i, c) in digits.into_iter().enumerate() {
            match c {
                '?' => range.set_wild(i),
                c => {
                    let value = c.to_digit(16).ok_or_else(|| {
                        AddressSpaceError::InvalidPattern(format!(
                            "'{}' is not a hex digit or '?'",
                            c
                        ))
                    })?;
                    range.nybbles[i] = value as u8;
                }
            }
        }
        Ok(range)
    }
}
