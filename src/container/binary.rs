use super::AddressContainer;
use crate::errors::Result;
use crate::net::nybble::{join_halves, split_halves};
use crate::net::Ipv6Cidr;
use crate::pattern::{GenRange, HalfMask};
use std::collections::HashMap;

/// Corpus stored as sorted 64-bit half pairs.
///
/// Each first half maps to an ascending, duplicate-free list of the second
/// halves seen with it; `sorted_high_keys` lists the first halves in
/// ascending order. Range and pattern queries become binary searches over
/// these lists.
#[derive(Debug, Clone, Default)]
pub struct BinaryAddressContainer {
    halves: HashMap<u64, Vec<u64>>,
    sorted_high_keys: Vec<u64>,
    count: u64,
}

/// Lower-bound search: index of the first element `>= value`, and whether it equals `value`
pub fn seek(seq: &[u64], value: u64) -> (usize, bool) {
    let idx = seq.partition_point(|&v| v < value);
    (idx, seq.get(idx) == Some(&value))
}

/// Insert `value` keeping `seq` ascending and duplicate-free; `false` if already present
pub fn insert(seq: &mut Vec<u64>, value: u64) -> bool {
    let (idx, found) = seek(seq, value);
    if found {
        return false;
    }
    seq.insert(idx, value);
    true
}

/// Contiguous slice of `seq` whose values lie in `[lo, hi]`
pub fn seek_range(seq: &[u64], lo: u64, hi: u64) -> &[u64] {
    if seq.is_empty() || lo > hi {
        return &[];
    }
    let (start, _) = seek(seq, lo);
    let (end, found) = seek(seq, hi);
    let end = if found { end + 1 } else { end };
    if end <= start {
        return &[];
    }
    &seq[start..end]
}

/// Values of `seq` within the half-mask's bounds that also match its fixed bits
fn masked_range<'a>(seq: &'a [u64], half: HalfMask) -> impl Iterator<Item = u64> + 'a {
    seek_range(seq, half.min, half.max)
        .iter()
        .copied()
        .filter(move |&v| half.matches(v))
}

/// Inclusive bounds on one 64-bit half covered by a `bits`-long prefix of it
fn half_bounds(value: u64, bits: u8) -> (u64, u64) {
    let mask = match bits {
        0 => 0,
        b if b >= 64 => u64::MAX,
        b => u64::MAX << (64 - b),
    };
    let lo = value & mask;
    (lo, lo | !mask)
}

impl BinaryAddressContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// First halves currently present, ascending
    pub fn sorted_high_keys(&self) -> &[u64] {
        &self.sorted_high_keys
    }

    /// Second halves stored under `first`, ascending
    pub fn seconds_for(&self, first: u64) -> &[u64] {
        self.halves.get(&first).map(Vec::as_slice).unwrap_or(&[])
    }

    fn high_keys_in(&self, lo: u64, hi: u64) -> &[u64] {
        seek_range(&self.sorted_high_keys, lo, hi)
    }

    fn cidr_pairs(&self, network: &Ipv6Cidr) -> Vec<(u64, &[u64])> {
        let (first, second) = split_halves(network.network());
        let len = network.prefix_len();

        if len <= 64 {
            let (lo, hi) = half_bounds(first, len);
            self.high_keys_in(lo, hi)
                .iter()
                .map(|&key| (key, self.seconds_for(key)))
                .collect()
        } else {
            let (lo, hi) = half_bounds(second, len - 64);
            vec![(first, seek_range(self.seconds_for(first), lo, hi))]
        }
    }
}

impl AddressContainer for BinaryAddressContainer {
    fn add_address(&mut self, addr: u128) -> bool {
        let (first, second) = split_halves(addr);
        let seconds = self.halves.entry(first).or_default();
        if seconds.is_empty() {
            insert(&mut self.sorted_high_keys, first);
        }
        let added = insert(seconds, second);
        if added {
            self.count += 1;
        }
        added
    }

    fn contains_address(&self, addr: u128) -> bool {
        let (first, second) = split_halves(addr);
        self.halves
            .get(&first)
            .map_or(false, |seconds| seek(seconds, second).1)
    }

    fn all_addresses(&self) -> Result<Vec<u128>> {
        let mut out = Vec::with_capacity(self.count as usize);
        for &first in &self.sorted_high_keys {
            out.extend(self.seconds_for(first).iter().map(|&s| join_halves(first, s)));
        }
        Ok(out)
    }

    fn addresses_at(&self, positions: &[u64]) -> Result<Vec<u128>> {
        let mut positions = positions.to_vec();
        positions.sort_unstable();

        let mut out = Vec::with_capacity(positions.len());
        let mut wanted = positions.into_iter().peekable();
        let mut offset = 0u64;
        for &first in &self.sorted_high_keys {
            let seconds = self.seconds_for(first);
            let end = offset + seconds.len() as u64;
            while let Some(pos) = wanted.next_if(|&p| p < end) {
                out.push(join_halves(first, seconds[(pos - offset) as usize]));
            }
            if wanted.peek().is_none() {
                break;
            }
            offset = end;
        }
        Ok(out)
    }

    fn addresses_in_cidr(&self, network: &Ipv6Cidr) -> Result<Vec<u128>> {
        match network.prefix_len() {
            0 => self.all_addresses(),
            128 => {
                let addr = network.network();
                Ok(if self.contains_address(addr) { vec![addr] } else { Vec::new() })
            }
            _ => Ok(self
                .cidr_pairs(network)
                .into_iter()
                .flat_map(|(first, seconds)| seconds.iter().map(move |&s| join_halves(first, s)))
                .collect()),
        }
    }

    fn count_in_cidr(&self, network: &Ipv6Cidr) -> Result<u64> {
        Ok(match network.prefix_len() {
            0 => self.count,
            128 => u64::from(self.contains_address(network.network())),
            _ => self
                .cidr_pairs(network)
                .iter()
                .map(|(_, seconds)| seconds.len() as u64)
                .sum(),
        })
    }

    fn addresses_in_pattern(&self, range: &GenRange) -> Result<Vec<u128>> {
        if range.wildcard_count() == 0 {
            let addr = range.base_address();
            return Ok(if self.contains_address(addr) { vec![addr] } else { Vec::new() });
        }

        let masks = range.get_mask();
        let mut out = Vec::new();
        for first in masked_range(&self.sorted_high_keys, masks.first) {
            out.extend(
                masked_range(self.seconds_for(first), masks.second).map(|s| join_halves(first, s)),
            );
        }
        Ok(out)
    }

    fn count_in_pattern(&self, range: &GenRange) -> Result<u64> {
        if range.wildcard_count() == 0 {
            return Ok(u64::from(self.contains_address(range.base_address())));
        }

        let masks = range.get_mask();
        let total = masked_range(&self.sorted_high_keys, masks.first)
            .map(|first| {
                let seconds = self.seconds_for(first);
                if masks.second.mask == 0 {
                    seconds.len()
                } else {
                    masked_range(seconds, masks.second).count()
                }
            })
            .sum::<usize>();
        Ok(total as u64)
    }

    fn size(&self) -> u64 {
        self.count
    }

    fn name(&self) -> &'static str {
        "sorted half-pair container"
    }
}
