use crate::cluster::ClusterSet;
use crate::constants::{MODEL_KIND_ADDRESS_TREE, MODEL_KIND_CLUSTER_SET, MODEL_MAGIC};
use crate::container::AddressTree;
use crate::errors::{AddressSpaceError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Model files: one framed, serialized model per file
pub mod models {
    use super::*;

    const HEADER_LEN: usize = MODEL_MAGIC.len() + 1 + 8;

    fn frame<T: Serialize>(kind: u8, model: &T) -> Result<Vec<u8>> {
        let payload = serde_json::to_vec(model)?;
        let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
        buf.extend_from_slice(MODEL_MAGIC);
        buf.push(kind);
        buf.extend_from_slice(&(payload.len() as u64).to_be_bytes());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    fn unframe<T: DeserializeOwned>(kind: u8, bytes: &[u8]) -> Result<T> {
        let corrupt = |msg: String| AddressSpaceError::Serialization(msg);

        if bytes.len() < HEADER_LEN {
            return Err(corrupt(format!("file too short: {} bytes", bytes.len())));
        }
        let (magic, rest) = bytes.split_at(MODEL_MAGIC.len());
        if magic != MODEL_MAGIC {
            return Err(corrupt("not a model file".to_string()));
        }
        if rest[0] != kind {
            return Err(corrupt(format!("model kind {} where {} was expected", rest[0], kind)));
        }

        let mut len = [0u8; 8];
        len.copy_from_slice(&rest[1..9]);
        let len = u64::from_be_bytes(len);
        let payload = &rest[9..];
        if payload.len() as u64 != len {
            return Err(corrupt(format!(
                "payload holds {} bytes, header declares {}",
                payload.len(),
                len
            )));
        }

        serde_json::from_slice(payload).map_err(|e| corrupt(format!("undecodable payload: {}", e)))
    }

    pub fn encode_cluster_set(set: &ClusterSet) -> Result<Vec<u8>> {
        frame(MODEL_KIND_CLUSTER_SET, set)
    }

    pub fn decode_cluster_set(bytes: &[u8]) -> Result<ClusterSet> {
        let set: ClusterSet = unframe(MODEL_KIND_CLUSTER_SET, bytes)?;
        let valid = set.density().is_finite()
            && set
                .clusters()
                .iter()
                .all(|c| (0.0..=1.0).contains(&c.density));
        if !valid {
            return Err(AddressSpaceError::Serialization(
                "cluster densities out of range".to_string(),
            ));
        }
        Ok(set)
    }

    pub fn encode_address_tree(tree: &AddressTree) -> Result<Vec<u8>> {
        frame(MODEL_KIND_ADDRESS_TREE, tree)
    }

    /// Decode and structurally validate a persisted trie
    pub fn decode_address_tree(bytes: &[u8]) -> Result<AddressTree> {
        let tree: AddressTree = unframe(MODEL_KIND_ADDRESS_TREE, bytes)?;
        tree.validate()
            .map_err(|e| AddressSpaceError::Serialization(format!("invalid tree: {}", e)))?;
        Ok(tree)
    }

    pub fn save_cluster_set(path: &Path, set: &ClusterSet) -> Result<()> {
        fs::write(path, encode_cluster_set(set)?)?;
        Ok(())
    }

    pub fn load_cluster_set(path: &Path) -> Result<ClusterSet> {
        decode_cluster_set(&fs::read(path)?)
    }

    pub fn save_address_tree(path: &Path, tree: &AddressTree) -> Result<()> {
        fs::write(path, encode_address_tree(tree)?)?;
        Ok(())
    }

    pub fn load_address_tree(path: &Path) -> Result<AddressTree> {
        decode_address_tree(&fs::read(path)?)
    }
}
