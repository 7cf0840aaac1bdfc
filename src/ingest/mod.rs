use crate::container::AddressContainer;
use crate::errors::Result;
use crate::model::{InputFormat, LoadStats};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tracing::info;

pub mod binary;
pub mod hex;
pub mod tree;

pub use binary::FixedBinaryReader;
pub use hex::HexTextReader;
pub use tree::TreeFileReader;

/// Addresses decoded from one corpus file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBatch {
    pub addresses: Vec<u128>,
    /// Records that could not be decoded and were skipped
    pub malformed: usize,
}

/// Corpus file decoding strategy trait
///
/// Each reader understands one on-disk encoding and turns a file into
/// already-decoded 128-bit addresses.
#[async_trait]
pub trait CorpusReader: Send + Sync {
    /// Decode every address in the file at `path`
    async fn read(&self, path: &Path) -> Result<ParsedBatch>;

    /// Return a human-readable name for this reader
    fn name(&self) -> &'static str;
}

/// Reader for the given input format
pub fn reader_for(format: InputFormat) -> Box<dyn CorpusReader> {
    match format {
        InputFormat::HexText => Box::new(HexTextReader),
        InputFormat::FixedBinary => Box::new(FixedBinaryReader),
        InputFormat::AddressTree => Box::new(TreeFileReader),
    }
}

/// Parse up to `jobs` files at once and insert their addresses one batch at a time
pub async fn load_corpus(
    paths: &[PathBuf],
    reader: &dyn CorpusReader,
    container: &mut dyn AddressContainer,
    jobs: usize,
) -> Result<LoadStats> {
    let mut batches = stream::iter(paths)
        .map(|path| reader.read(path))
        .buffer_unordered(jobs.max(1));

    let mut stats = LoadStats::default();
    while let Some(batch) = batches.next().await {
        let batch = batch?;
        let (added, skipped) = container.add_addresses(&batch.addresses);
        stats.merge(LoadStats {
            added,
            skipped,
            malformed: batch.malformed,
        });
    }

    info!(
        reader = reader.name(),
        container = container.name(),
        files = paths.len(),
        added = stats.added,
        skipped = stats.skipped,
        malformed = stats.malformed,
        "corpus loaded"
    );
    Ok(stats)
}
