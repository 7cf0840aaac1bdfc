use super::{CorpusReader, ParsedBatch};
use crate::errors::Result;
use async_trait::async_trait;
use std::net::Ipv6Addr;
use std::path::Path;
use std::str::FromStr;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

/// One address per line: IPv6 text (`2600::1`) or 32 bare hex digits
pub struct HexTextReader;

/// Decode a single address in either textual form
pub fn parse_address(text: &str) -> Option<u128> {
    let text = text.trim();
    if text.contains(':') {
        return Ipv6Addr::from_str(text).ok().map(u128::from);
    }
    if text.len() == 32 && text.chars().all(|c| c.is_ascii_hexdigit()) {
        return u128::from_str_radix(text, 16).ok();
    }
    None
}

#[async_trait]
impl CorpusReader for HexTextReader {
    async fn read(&self, path: &Path) -> Result<ParsedBatch> {
        let file = File::open(path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut batch = ParsedBatch::default();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_address(line) {
                Some(addr) => batch.addresses.push(addr),
                None => batch.malformed += 1,
            }
        }

        if batch.malformed > 0 {
            warn!(path = %path.display(), malformed = batch.malformed, "skipped malformed lines");
        }
        Ok(batch)
    }

    fn name(&self) -> &'static str {
        "hex text"
    }
}
