/// Number of 4-bit groups in an IPv6 address
pub const NYBBLE_COUNT: usize = 32;

/// Nybbles held by each 64-bit half of an address
pub const NYBBLES_PER_HALF: usize = 16;

/// Distinct values a single nybble can take
pub const NYBBLE_VALUES: u8 = 16;

/// Header written in front of every persisted model file
pub const MODEL_MAGIC: &[u8; 8] = b"V6SCOUT\0";

/// Kind byte for a persisted `ClusterSet`
pub const MODEL_KIND_CLUSTER_SET: u8 = 1;

/// Kind byte for a persisted `AddressTree`
pub const MODEL_KIND_ADDRESS_TREE: u8 = 2;

/// Size of one record in fixed-width binary corpus files
pub const BINARY_RECORD_LEN: usize = 16;

/// Draws without a new distinct address before generation gives up
pub const GENERATION_STALL_LIMIT: usize = 100_000;
