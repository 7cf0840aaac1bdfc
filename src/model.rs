use crate::cluster::ClusterSet;
use std::time::Duration;

/// Outcome of loading addresses into a container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub added: usize,
    /// Duplicates of addresses already present
    pub skipped: usize,
    /// Input records that could not be decoded
    pub malformed: usize,
}

impl LoadStats {
    pub fn merge(&mut self, other: LoadStats) {
        self.added += other.added;
        self.skipped += other.skipped;
        self.malformed += other.malformed;
    }
}

/// Best single-nybble generalizations of a cluster
#[derive(Debug, Clone, PartialEq)]
pub struct UpgradeOptions {
    pub best_density: f64,
    pub best_count: u64,
    /// Every fixed position whose wildcarding reaches `best_density`
    pub positions: Vec<usize>,
}

/// Result of driving the clustering loop to a fixed point
#[derive(Debug, Clone)]
pub struct ClusteringOutcome {
    pub cluster_set: ClusterSet,
    /// Accepted upgrade steps
    pub iterations: usize,
    /// `false` when the iteration ceiling stopped the loop first
    pub converged: bool,
    pub elapsed: Duration,
}

/// Corpus representation to load addresses into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContainerKind {
    #[default]
    Binary,
    Tree,
}

/// On-disk encoding of a corpus file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    HexText,
    FixedBinary,
    AddressTree,
}
