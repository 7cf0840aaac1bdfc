//! v6scout - IPv6 address-space clustering and candidate generation
//!
//! This library provides the core of an IPv6 host-discovery pipeline:
//! - Corpus containers answering membership, CIDR and wildcard-pattern queries
//! - Iterative clustering of a corpus into a compact set of nybble patterns
//! - Synthesis of new candidate addresses from the learned patterns
//! - Model persistence and corpus ingestion

pub mod cluster;
pub mod config;
pub mod constants;
pub mod container;
pub mod db;
pub mod engine;
pub mod errors;
pub mod ingest;
pub mod model;
pub mod net;
pub mod pattern;
pub mod table;

// Re-export commonly used types for convenience
pub use cluster::{ClusterSet, GenCluster};
pub use config::ClusterConfig;
pub use container::{AddressContainer, AddressTree, BinaryAddressContainer};
pub use engine::ClusteringEngine;
pub use errors::{AddressSpaceError, Result};
pub use ingest::{CorpusReader, FixedBinaryReader, HexTextReader, TreeFileReader};
pub use model::{ClusteringOutcome, ContainerKind, InputFormat, LoadStats, UpgradeOptions};
pub use net::Ipv6Cidr;
pub use pattern::GenRange;
