//! The JSON time index of a store directory.
//!
//! `index.json` lists every entry in append order together with the store
//! configuration and the table of persisted mesh blobs. It is rewritten
//! atomically after the blobs an entry points to are fully on disk, so an
//! index entry never dangles.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::data::field_id::FieldId;
use crate::data::value_type::{FieldType, ValueType};
use crate::io::write_atomic;
use crate::mesh_error::MeshFieldError;
use crate::store::cache::TimeKey;
use crate::store::config::StoreConfig;
use crate::units::Quantity;

pub const INDEX_FILE: &str = "index.json";
pub const INDEX_VERSION: u32 = 1;

/// Blob paths of one entry, relative to the store root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobLocation {
    pub field: String,
    pub mesh: String,
}

/// Metadata the store derives from the field itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemMetadata {
    pub field_id: FieldId,
    pub value_type: ValueType,
    pub field_type: FieldType,
    pub unit: String,
    pub record_count: usize,
    /// Hex content digest of the mesh.
    pub mesh_digest: String,
}

/// Everything recorded for one stored time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub time: Quantity,
    pub location: BlobLocation,
    pub system: SystemMetadata,
    /// Caller-supplied metadata, stored verbatim.
    pub user: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct StoreIndex {
    version: u32,
    config: StoreConfig,
    entries: Vec<EntryMetadata>,
    /// Mesh digest (hex) to blob path.
    meshes: BTreeMap<String, String>,
    #[serde(skip)]
    by_time: HashMap<TimeKey, usize>,
}

impl StoreIndex {
    pub(crate) fn new(config: StoreConfig) -> Self {
        Self {
            version: INDEX_VERSION,
            config,
            entries: Vec::new(),
            meshes: BTreeMap::new(),
            by_time: HashMap::new(),
        }
    }

    pub(crate) fn load(root: &Path) -> Result<Self, MeshFieldError> {
        let bytes = fs::read(root.join(INDEX_FILE))?;
        let mut index: StoreIndex = serde_json::from_slice(&bytes)?;
        if index.version != INDEX_VERSION {
            return Err(MeshFieldError::Serialization(format!(
                "unsupported store index version {} (expected {INDEX_VERSION})",
                index.version
            )));
        }
        index.config.validate()?;
        for (i, entry) in index.entries.iter().enumerate() {
            if index.by_time.insert(TimeKey::of(&entry.time)?, i).is_some() {
                return Err(MeshFieldError::DuplicateTime(entry.time.to_string()));
            }
        }
        Ok(index)
    }

    pub(crate) fn save(&self, root: &Path) -> Result<(), MeshFieldError> {
        let bytes = serde_json::to_vec_pretty(self)?;
        write_atomic(&root.join(INDEX_FILE), &bytes)
    }

    pub(crate) fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn entries(&self) -> &[EntryMetadata] {
        &self.entries
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn position(&self, key: TimeKey) -> Option<usize> {
        self.by_time.get(&key).copied()
    }

    pub(crate) fn last_time(&self) -> Option<&Quantity> {
        self.entries.last().map(|e| &e.time)
    }

    pub(crate) fn mesh_blob(&self, digest_hex: &str) -> Option<&str> {
        self.meshes.get(digest_hex).map(String::as_str)
    }

    #[cfg(test)]
    pub(crate) fn mesh_blobs(&self) -> usize {
        self.meshes.len()
    }

    /// Append an entry; `new_mesh` registers a freshly written mesh blob.
    pub(crate) fn push(&mut self, key: TimeKey, entry: EntryMetadata, new_mesh: bool) {
        if new_mesh {
            self.meshes
                .insert(entry.system.mesh_digest.clone(), entry.location.mesh.clone());
        }
        self.by_time.insert(key, self.entries.len());
        self.entries.push(entry);
    }

    /// Undo the last [`push`](Self::push).
    pub(crate) fn pop(&mut self, key: TimeKey, new_mesh: bool) {
        if let Some(entry) = self.entries.pop() {
            if new_mesh {
                self.meshes.remove(&entry.system.mesh_digest);
            }
        }
        self.by_time.remove(&key);
    }
}
