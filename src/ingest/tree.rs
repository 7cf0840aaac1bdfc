use super::{CorpusReader, ParsedBatch};
use crate::container::AddressContainer;
use crate::db::models::decode_address_tree;
use crate::errors::Result;
use async_trait::async_trait;
use std::path::Path;

/// A previously persisted `AddressTree` model file
pub struct TreeFileReader;

#[async_trait]
impl CorpusReader for TreeFileReader {
    async fn read(&self, path: &Path) -> Result<ParsedBatch> {
        let bytes = tokio::fs::read(path).await?;
        let tree = decode_address_tree(&bytes)?;
        Ok(ParsedBatch {
            addresses: tree.all_addresses()?,
            malformed: 0,
        })
    }

    fn name(&self) -> &'static str {
        "persisted address tree"
    }
}
