//! Append-only, time-indexed field store backed by a directory.
//!
//! Layout under the root:
//!
//! ```text
//! index.json               time index, config and mesh table
//! mesh/<digest>.mfc        one container per distinct mesh (group "mesh")
//! field/<seq>-<digest>.mfc one container per entry (group "field")
//! ```
//!
//! A mesh whose content digest is already in the table is not written again;
//! the new entry points at the existing blob.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, info, warn};
use serde_json::{Map, Value};

use crate::data::field::{Field, FieldValues, Position};
use crate::heavy::{HeavyRef, Lazy};
use crate::io::container::{Container, MeshPlacement};
use crate::io::xdmf::XdmfWriter;
use crate::io::FieldWriter;
use crate::mesh::Mesh;
use crate::mesh_error::MeshFieldError;
use crate::stable_hash::digest_hex;
use crate::store::cache::{FieldCache, TimeKey};
use crate::store::config::StoreConfig;
use crate::store::index::{BlobLocation, EntryMetadata, INDEX_FILE, StoreIndex, SystemMetadata};
use crate::units::Quantity;

pub const MESH_DIR: &str = "mesh";
pub const FIELD_DIR: &str = "field";
pub const MESH_GROUP: &str = "mesh";
pub const FIELD_GROUP: &str = "field";
const BLOB_EXTENSION: &str = "mfc";

/// A directory of field snapshots indexed by time.
#[derive(Debug)]
pub struct TemporalField {
    root: PathBuf,
    index: StoreIndex,
    cache: FieldCache,
    /// Heavy mesh handles shared by every field read from the same blob.
    meshes: DashMap<String, Arc<Mesh>>,
}

impl TemporalField {
    /// Create an empty store at `root`. Fails if a store already exists there.
    pub fn create(root: impl AsRef<Path>, config: StoreConfig) -> Result<Self, MeshFieldError> {
        config.validate()?;
        let root = root.as_ref().to_path_buf();
        if root.join(INDEX_FILE).exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("a store already exists at {}", root.display()),
            )
            .into());
        }
        fs::create_dir_all(root.join(MESH_DIR))?;
        fs::create_dir_all(root.join(FIELD_DIR))?;
        let index = StoreIndex::new(config);
        index.save(&root)?;
        info!("created field store at {}", root.display());
        Ok(Self::from_index(root, index))
    }

    /// Open an existing store.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, MeshFieldError> {
        let root = root.as_ref().to_path_buf();
        let index = StoreIndex::load(&root)?;
        info!(
            "opened field store at {} ({} entries)",
            root.display(),
            index.len()
        );
        Ok(Self::from_index(root, index))
    }

    fn from_index(root: PathBuf, index: StoreIndex) -> Self {
        Self {
            cache: FieldCache::new(index.config().cache_policy),
            root,
            index,
            meshes: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &StoreConfig {
        self.index.config()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.len() == 0
    }

    /// Persist `field` as a new entry at its own time.
    ///
    /// Blobs are written first and the index last; on failure every blob
    /// written by this call is removed and the store is left as it was.
    pub fn add_field(
        &mut self,
        field: &Field,
        user_metadata: Map<String, Value>,
    ) -> Result<(), MeshFieldError> {
        let time = field.time().clone();
        let key = TimeKey::of(&time)?;
        if self.index.position(key).is_some() {
            return Err(MeshFieldError::DuplicateTime(time.to_string()));
        }
        if let Some(last) = self.index.last_time() {
            if TimeKey::of(last)?.seconds() > key.seconds() {
                return Err(MeshFieldError::TimeNotIncreasing {
                    time: time.to_string(),
                    last: last.to_string(),
                });
            }
        }

        let mesh_digest = digest_hex(field.mesh().digest()?);
        let (mesh_location, new_mesh) = match self.index.mesh_blob(&mesh_digest) {
            Some(existing) => {
                debug!("mesh {mesh_digest} already stored at {existing}; linking");
                (existing.to_string(), false)
            }
            None => {
                let location = format!("{MESH_DIR}/{mesh_digest}.{BLOB_EXTENSION}");
                let path = self.root.join(&location);
                remove_orphan(&path)?;
                Container::new(&path).write_mesh(MESH_GROUP, field.mesh())?;
                debug!("stored new mesh blob {location}");
                (location, true)
            }
        };

        let pending = PendingEntry {
            key,
            time,
            mesh_digest,
            mesh_location: &mesh_location,
            new_mesh,
        };
        let result = self.append_entry(field, pending, user_metadata);
        if result.is_err() && new_mesh {
            self.discard(&mesh_location);
        }
        result
    }

    fn append_entry(
        &mut self,
        field: &Field,
        pending: PendingEntry<'_>,
        user_metadata: Map<String, Value>,
    ) -> Result<(), MeshFieldError> {
        let PendingEntry {
            key,
            time,
            mesh_digest,
            mesh_location,
            new_mesh,
        } = pending;
        let field_location = format!(
            "{FIELD_DIR}/{:06}-{}.{BLOB_EXTENSION}",
            self.index.len(),
            digest_hex(field.digest()?)
        );
        let path = self.root.join(&field_location);
        remove_orphan(&path)?;
        Container::new(&path).write_field(FIELD_GROUP, field, MeshPlacement::External)?;

        let entry = EntryMetadata {
            time,
            location: BlobLocation {
                field: field_location.clone(),
                mesh: mesh_location.to_string(),
            },
            system: SystemMetadata {
                field_id: field.field_id(),
                value_type: field.value_type(),
                field_type: field.field_type(),
                unit: field.unit().name().to_string(),
                record_count: field.record_count()?,
                mesh_digest,
            },
            user: user_metadata,
        };
        let time_text = entry.time.to_string();
        self.index.push(key, entry, new_mesh);
        if let Err(err) = self.index.save(&self.root) {
            self.index.pop(key, new_mesh);
            self.discard(&field_location);
            return Err(err);
        }
        info!(
            "appended {} at t = {time_text} ({} entries)",
            field.field_id(),
            self.index.len()
        );
        Ok(())
    }

    fn discard(&self, location: &str) {
        let path = self.root.join(location);
        if let Err(err) = fs::remove_file(&path) {
            warn!("could not remove orphaned blob {}: {err}", path.display());
        }
    }

    /// Stored times in append order (which is ascending).
    pub fn time_list(&self) -> Vec<Quantity> {
        self.index.entries().iter().map(|e| e.time.clone()).collect()
    }

    /// Metadata of the entry at exactly `time`.
    pub fn time_metadata(&self, time: &Quantity) -> Result<&EntryMetadata, MeshFieldError> {
        let i = self.lookup(time)?;
        Ok(&self.index.entries()[i])
    }

    fn lookup(&self, time: &Quantity) -> Result<usize, MeshFieldError> {
        self.index
            .position(TimeKey::of(time)?)
            .ok_or_else(|| MeshFieldError::UnknownTime(time.to_string()))
    }

    /// A heavy, read-only field bound to the blobs stored at exactly `time`.
    ///
    /// Fields of entries that share a mesh blob share one mesh handle, so the
    /// geometry is loaded at most once.
    pub fn get_field(&self, time: &Quantity) -> Result<Field, MeshFieldError> {
        let entry = &self.index.entries()[self.lookup(time)?];
        let field_ref =
            HeavyRef::new(self.root.join(&entry.location.field), FIELD_GROUP).read_only(true);
        let (header, _) = Container::new(&field_ref.path).read_field_header(FIELD_GROUP)?;
        let mesh = self.mesh_handle(&entry.location.mesh, &entry.system.mesh_digest)?;
        Field::from_header(header, mesh, Lazy::deferred(field_ref))
    }

    fn mesh_handle(&self, location: &str, digest: &str) -> Result<Arc<Mesh>, MeshFieldError> {
        if let Some(mesh) = self.meshes.get(location) {
            return Ok(Arc::clone(mesh.value()));
        }
        let digest = u64::from_str_radix(digest, 16).map_err(|_| {
            MeshFieldError::Serialization(format!("invalid mesh digest `{digest}` in store index"))
        })?;
        let source = HeavyRef::new(self.root.join(location), MESH_GROUP).read_only(true);
        let mesh = self
            .meshes
            .entry(location.to_string())
            .or_insert_with(|| Arc::new(Mesh::from_heavy_with_digest(source, digest)));
        Ok(Arc::clone(mesh.value()))
    }

    /// Evaluate the field stored at exactly `time` at every position.
    ///
    /// `eps` defaults to the configured tolerance. The materialized field is
    /// cached only when every position evaluates.
    pub fn evaluate(
        &self,
        time: &Quantity,
        positions: &[Position],
        eps: Option<f64>,
    ) -> Result<Vec<Quantity<Vec<f64>>>, MeshFieldError> {
        let key = TimeKey::of(time)?;
        let eps = eps.unwrap_or(self.config().default_eps);
        if let Some(field) = self.cache.get(key) {
            return field.evaluate_many(positions, eps);
        }
        let field = Arc::new(self.get_field(time)?);
        let values = field.evaluate_many(positions, eps)?;
        self.cache.insert(key, field);
        Ok(values)
    }

    /// Times whose fields are currently cached, in ascending order.
    pub fn cached_times(&self) -> Vec<Quantity> {
        self.index
            .entries()
            .iter()
            .filter(|e| TimeKey::of(&e.time).is_ok_and(|k| self.cache.contains(k)))
            .map(|e| e.time.clone())
            .collect()
    }

    pub fn clear_cache(&self) {
        debug!("clearing {} cached fields", self.cache.len());
        self.cache.clear();
    }

    /// Number of mesh blobs on disk.
    pub fn mesh_blob_count(&self) -> Result<usize, MeshFieldError> {
        count_blobs(&self.root.join(MESH_DIR))
    }

    /// Number of field blobs on disk.
    pub fn field_blob_count(&self) -> Result<usize, MeshFieldError> {
        count_blobs(&self.root.join(FIELD_DIR))
    }

    /// Write every entry as one XDMF temporal collection, with times in the
    /// configured time unit.
    pub fn write_xdmf(&self, path: impl AsRef<Path>) -> Result<(), MeshFieldError> {
        let time_unit = self.config().time_unit()?;
        let fields = self
            .index
            .entries()
            .iter()
            .map(|entry| {
                let field = self.get_field(&entry.time)?;
                let mut header = field.header()?;
                header.time = header.time.convert_to(&time_unit)?;
                let values = FieldValues(field.values()?.to_vec());
                Field::from_header(header, Arc::clone(field.mesh()), Lazy::resident(values))
            })
            .collect::<Result<Vec<_>, MeshFieldError>>()?;
        let refs: Vec<&Field> = fields.iter().collect();
        XdmfWriter::default().write_path(path.as_ref(), &refs)?;
        info!(
            "wrote {} store entries to {}",
            fields.len(),
            path.as_ref().display()
        );
        Ok(())
    }
}

/// Blob paths are derived from the entry count, so a file left behind by a
/// failed append is not referenced by the index.
fn remove_orphan(path: &Path) -> Result<(), MeshFieldError> {
    if path.exists() {
        warn!("replacing orphaned blob {}", path.display());
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Where a new entry goes, resolved before its field blob is written.
struct PendingEntry<'a> {
    key: TimeKey,
    time: Quantity,
    mesh_digest: String,
    mesh_location: &'a str,
    new_mesh: bool,
}

fn count_blobs(dir: &Path) -> Result<usize, MeshFieldError> {
    let mut count = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == BLOB_EXTENSION) {
            count += 1;
        }
    }
    Ok(count)
}
