use super::AddressContainer;
use crate::constants::{NYBBLE_COUNT, NYBBLE_VALUES};
use crate::errors::{AddressSpaceError, Result};
use crate::net::nybble::nybble_at;
use crate::net::Ipv6Cidr;
use crate::pattern::GenRange;
use serde::{Deserialize, Serialize};

/// Arena slot that marks an absent child; the root lives at 0 and is never a child
const NO_CHILD: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct TreeNode {
    depth: u8,
    /// Distinct addresses stored below (and including) this node
    children_count: u64,
    children: [u32; NYBBLE_VALUES as usize],
}

impl TreeNode {
    fn new(depth: u8) -> Self {
        Self {
            depth,
            children_count: 0,
            children: [NO_CHILD; NYBBLE_VALUES as usize],
        }
    }

    fn child(&self, value: u8) -> Option<usize> {
        match self.children[usize::from(value & 0xF)] {
            NO_CHILD => None,
            idx => Some(idx as usize),
        }
    }

    fn occupied(&self) -> impl Iterator<Item = (u8, usize)> + '_ {
        self.children
            .iter()
            .enumerate()
            .filter(|(_, &c)| c != NO_CHILD)
            .map(|(n, &c)| (n as u8, c as usize))
    }

    fn is_leaf(&self) -> bool {
        usize::from(self.depth) == NYBBLE_COUNT
    }
}

/// Corpus stored as a 32-level radix trie over nybbles.
///
/// Nodes live in an arena and refer to their children by index, so
/// enumeration carries the address prefix as a plain value per branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressTree {
    nodes: Vec<TreeNode>,
}

impl Default for AddressTree {
    fn default() -> Self {
        Self {
            nodes: vec![TreeNode::new(0)],
        }
    }
}

impl AddressTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of trie nodes, root included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn node(&self, idx: usize) -> Result<&TreeNode> {
        self.nodes.get(idx).ok_or_else(|| {
            AddressSpaceError::CorruptedTree(format!("node index {} out of range", idx))
        })
    }

    /// Follow `nybbles` leading nybbles of `addr` from the root
    fn descend(&self, addr: u128, nybbles: usize) -> Result<Option<usize>> {
        let mut idx = 0;
        for depth in 0..nybbles {
            match self.node(idx)?.child(nybble_at(addr, depth)) {
                Some(next) => idx = next,
                None => return Ok(None),
            }
        }
        Ok(Some(idx))
    }

    fn collect_subtree(
        &self,
        idx: usize,
        depth: usize,
        prefix: u128,
        out: &mut Vec<u128>,
    ) -> Result<()> {
        let node = self.node(idx)?;
        if node.is_leaf() || depth == NYBBLE_COUNT {
            if depth != NYBBLE_COUNT || !node.is_leaf() {
                return Err(AddressSpaceError::CorruptedTree(format!(
                    "leaf recorded at depth {} reached at depth {}",
                    node.depth, depth
                )));
            }
            out.push(prefix);
            return Ok(());
        }

        let mut children = node.occupied().peekable();
        if children.peek().is_none() {
            return Err(AddressSpaceError::CorruptedTree(format!(
                "interior node at depth {} has no children",
                depth
            )));
        }
        for (value, child) in children {
            self.collect_subtree(child, depth + 1, (prefix << 4) | u128::from(value), out)?;
        }
        Ok(())
    }

    fn collect_pattern(
        &self,
        idx: usize,
        depth: usize,
        prefix: u128,
        range: &GenRange,
        out: &mut Vec<u128>,
    ) -> Result<()> {
        if depth == NYBBLE_COUNT {
            out.push(prefix);
            return Ok(());
        }
        let node = self.node(idx)?;
        match range.nybble(depth) {
            Some(value) => match node.child(value) {
                Some(child) => self.collect_pattern(
                    child,
                    depth + 1,
                    (prefix << 4) | u128::from(value),
                    range,
                    out,
                ),
                None => Ok(()),
            },
            None => {
                self.check_fan_out(idx, node)?;
                for (value, child) in node.occupied() {
                    self.collect_pattern(
                        child,
                        depth + 1,
                        (prefix << 4) | u128::from(value),
                        range,
                        out,
                    )?;
                }
                Ok(())
            }
        }
    }

    /// `wild_tail`: first depth from which every remaining position is wild
    fn count_pattern(
        &self,
        idx: usize,
        depth: usize,
        range: &GenRange,
        wild_tail: usize,
    ) -> Result<u64> {
        let node = self.node(idx)?;
        if depth >= wild_tail {
            return Ok(node.children_count);
        }
        match range.nybble(depth) {
            Some(value) => match node.child(value) {
                Some(child) => self.count_pattern(child, depth + 1, range, wild_tail),
                None => Ok(0),
            },
            None => {
                self.check_fan_out(idx, node)?;
                node.occupied()
                    .map(|(_, child)| self.count_pattern(child, depth + 1, range, wild_tail))
                    .sum()
            }
        }
    }

    /// A node reached short of full depth must have children, unless it is the root of an empty tree
    fn check_fan_out(&self, idx: usize, node: &TreeNode) -> Result<()> {
        if node.occupied().next().is_none() && (idx != 0 || node.children_count != 0) {
            return Err(AddressSpaceError::CorruptedTree(format!(
                "interior node at depth {} has no children",
                node.depth
            )));
        }
        Ok(())
    }

    /// Address at `position` of the ascending order, steering by subtree counts
    fn address_at(&self, mut position: u64) -> Result<Option<u128>> {
        if position >= self.size() {
            return Ok(None);
        }
        let mut idx = 0;
        let mut addr = 0u128;
        for _ in 0..NYBBLE_COUNT {
            let node = self.node(idx)?;
            let mut next = None;
            for (value, child) in node.occupied() {
                let count = self.node(child)?.children_count;
                if position < count {
                    next = Some((value, child));
                    break;
                }
                position -= count;
            }
            let (value, child) = next.ok_or_else(|| {
                AddressSpaceError::CorruptedTree(format!(
                    "subtree counts at depth {} do not cover the stored addresses",
                    node.depth
                ))
            })?;
            addr = (addr << 4) | u128::from(value);
            idx = child;
        }
        Ok(Some(addr))
    }

    /// Check the arena's structural invariants, used after loading from disk
    pub fn validate(&self) -> Result<()> {
        let corrupt = |msg: String| -> Result<()> { Err(AddressSpaceError::CorruptedTree(msg)) };

        let root = self.node(0)?;
        if root.depth != 0 {
            return corrupt(format!("root has depth {}", root.depth));
        }

        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![0usize];
        seen[0] = true;
        while let Some(idx) = stack.pop() {
            let node = self.node(idx)?;
            if node.is_leaf() {
                if node.occupied().next().is_some() || node.children_count != 1 {
                    return corrupt(format!("leaf {} has children or count {}", idx, node.children_count));
                }
                continue;
            }
            if usize::from(node.depth) > NYBBLE_COUNT {
                return corrupt(format!("node {} has depth {}", idx, node.depth));
            }

            let mut sum = 0u64;
            for (_, child) in node.occupied() {
                let child_node = self.node(child)?;
                if seen[child] {
                    return corrupt(format!("node {} is reachable twice", child));
                }
                if child_node.depth != node.depth + 1 {
                    return corrupt(format!(
                        "node {} at depth {} under depth {}",
                        child, child_node.depth, node.depth
                    ));
                }
                seen[child] = true;
                sum += child_node.children_count;
                stack.push(child);
            }
            if sum != node.children_count {
                return corrupt(format!(
                    "node {} counts {} but children hold {}",
                    idx, node.children_count, sum
                ));
            }
            if sum == 0 && idx != 0 {
                return corrupt(format!("interior node {} has no children", idx));
            }
        }

        if seen.iter().any(|&s| !s) {
            return corrupt("unreachable nodes in arena".to_string());
        }
        Ok(())
    }
}

impl AddressContainer for AddressTree {
    fn add_address(&mut self, addr: u128) -> bool {
        if self.contains_address(addr) {
            return false;
        }

        let mut idx = 0;
        self.nodes[idx].children_count += 1;
        for depth in 0..NYBBLE_COUNT {
            let value = nybble_at(addr, depth);
            let next = match self.nodes[idx].child(value) {
                Some(next) => next,
                None => {
                    let next = self.nodes.len();
                    self.nodes.push(TreeNode::new(depth as u8 + 1));
                    self.nodes[idx].children[usize::from(value)] = next as u32;
                    next
                }
            };
            self.nodes[next].children_count += 1;
            idx = next;
        }
        true
    }

    fn contains_address(&self, addr: u128) -> bool {
        matches!(self.descend(addr, NYBBLE_COUNT), Ok(Some(_)))
    }

    fn all_addresses(&self) -> Result<Vec<u128>> {
        let mut out = Vec::with_capacity(self.size() as usize);
        if self.size() > 0 {
            self.collect_subtree(0, 0, 0, &mut out)?;
        }
        Ok(out)
    }

    fn addresses_at(&self, positions: &[u64]) -> Result<Vec<u128>> {
        let mut positions = positions.to_vec();
        positions.sort_unstable();
        let mut out = Vec::with_capacity(positions.len());
        for pos in positions {
            if let Some(addr) = self.address_at(pos)? {
                out.push(addr);
            }
        }
        Ok(out)
    }

    fn addresses_in_cidr(&self, network: &Ipv6Cidr) -> Result<Vec<u128>> {
        if !network.is_nybble_aligned() {
            return Err(AddressSpaceError::UnalignedMask(network.prefix_len()));
        }
        let depth = usize::from(network.prefix_len() / 4);
        let base = network.network();

        let mut out = Vec::new();
        if let Some(idx) = self.descend(base, depth)? {
            if self.node(idx)?.children_count > 0 {
                let prefix = base.checked_shr((128 - 4 * depth) as u32).unwrap_or(0);
                self.collect_subtree(idx, depth, prefix, &mut out)?;
            }
        }
        Ok(out)
    }

    fn count_in_cidr(&self, network: &Ipv6Cidr) -> Result<u64> {
        if !network.is_nybble_aligned() {
            return Err(AddressSpaceError::UnalignedMask(network.prefix_len()));
        }
        let depth = usize::from(network.prefix_len() / 4);
        match self.descend(network.network(), depth)? {
            Some(idx) => Ok(self.node(idx)?.children_count),
            None => Ok(0),
        }
    }

    fn addresses_in_pattern(&self, range: &GenRange) -> Result<Vec<u128>> {
        let mut out = Vec::new();
        self.collect_pattern(0, 0, 0, range, &mut out)?;
        Ok(out)
    }

    fn count_in_pattern(&self, range: &GenRange) -> Result<u64> {
        let wild_tail = (0..NYBBLE_COUNT)
            .rev()
            .take_while(|&i| range.is_wild(i))
            .last()
            .unwrap_or(NYBBLE_COUNT);
        self.count_pattern(0, 0, range, wild_tail)
    }

    fn size(&self) -> u64 {
        self.nodes.first().map_or(0, |root| root.children_count)
    }

    fn name(&self) -> &'static str {
        "nybble trie"
    }
}
