use super::{CorpusReader, ParsedBatch};
use crate::constants::BINARY_RECORD_LEN;
use crate::errors::{AddressSpaceError, Result};
use async_trait::async_trait;
use std::path::Path;

/// Consecutive 16-byte big-endian address records
pub struct FixedBinaryReader;

/// Decode a buffer of fixed-width records; a trailing partial record is an error
pub fn decode_records(bytes: &[u8]) -> Result<Vec<u128>> {
    if bytes.len() % BINARY_RECORD_LEN != 0 {
        return Err(AddressSpaceError::Serialization(format!(
            "{} bytes is not a whole number of {}-byte records",
            bytes.len(),
            BINARY_RECORD_LEN
        )));
    }
    Ok(bytes
        .chunks_exact(BINARY_RECORD_LEN)
        .map(|chunk| {
            let mut record = [0u8; BINARY_RECORD_LEN];
            record.copy_from_slice(chunk);
            u128::from_be_bytes(record)
        })
        .collect())
}

#[async_trait]
impl CorpusReader for FixedBinaryReader {
    async fn read(&self, path: &Path) -> Result<ParsedBatch> {
        let bytes = tokio::fs::read(path).await?;
        Ok(ParsedBatch {
            addresses: decode_records(&bytes)?,
            malformed: 0,
        })
    }

    fn name(&self) -> &'static str {
        "fixed 16-byte binary"
    }
}
