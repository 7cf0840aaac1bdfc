use thiserror::Error;

/// Error types for address-space container, clustering and model operations
#[derive(Error, Debug)]
pub enum AddressSpaceError {
    #[error("Unaligned Mask: prefix length /{0} is not a multiple of 4")]
    UnalignedMask(u8),

    #[error("Invalid Mask: {0}")]
    InvalidMask(String),

    #[error("Length Mismatch: {left} vs {right} nybbles")]
    LengthMismatch { left: usize, right: usize },

    #[error("Serialization Error: {0}")]
    Serialization(String),

    #[error("Incompatible Network: {0}")]
    IncompatibleNetwork(String),

    #[error("Invalid Pattern: {0}")]
    InvalidPattern(String),

    #[error("Corrupted Tree: {0}")]
    CorruptedTree(String),

    #[error("Generation Exhausted: produced {produced} of {requested} addresses")]
    GenerationExhausted { produced: usize, requested: usize },

    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, AddressSpaceError>;
