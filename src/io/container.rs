//! Container files: many named mesh/field groups in one file.
//!
//! Layout: `MFCF` magic, a little-endian `u32` format version, a
//! little-endian `u64` directory length, the bincode-encoded directory, then
//! the concatenated group payloads. The directory maps group names to their
//! kind (a field's header lives in the directory so it can be read without
//! touching the values) and payload byte range.
//!
//! Adding groups rewrites the file through a temporary sibling and a rename;
//! existing payloads are copied byte-for-byte.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::data::field::{Field, FieldHeader, FieldValues};
use crate::heavy::Lazy;
use crate::io::write_atomic;
use crate::mesh::{Mesh, MeshKind};
use crate::mesh_error::MeshFieldError;

const MAGIC: &[u8; 4] = b"MFCF";
const CONTAINER_VERSION: u32 = 1;
const PREAMBLE_LEN: u64 = 16;

/// Where the mesh of a field group lives.
#[derive(Clone, Copy, Debug)]
pub enum MeshPlacement<'a> {
    /// Write the mesh next to the field, as group `<field group>/mesh`.
    Inline,
    /// Link an existing mesh group of the same file.
    Group(&'a str),
    /// The caller tracks the mesh elsewhere; only field data is written.
    External,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
enum GroupKind {
    Mesh,
    Field {
        header: FieldHeader,
        mesh_group: Option<String>,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct GroupEntry {
    kind: GroupKind,
    offset: u64,
    len: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Directory {
    groups: BTreeMap<String, GroupEntry>,
}

/// Handle to a container file on disk. Cheap to create; every call opens
/// the file anew.
#[derive(Clone, Debug)]
pub struct Container {
    path: PathBuf,
}

impl Container {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Group names in lexical order; a missing file has no groups.
    pub fn groups(&self) -> Result<Vec<String>, MeshFieldError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let (directory, _) = self.read_directory()?;
        Ok(directory.groups.into_keys().collect())
    }

    pub fn contains(&self, group: &str) -> Result<bool, MeshFieldError> {
        Ok(self.groups()?.iter().any(|g| g == group))
    }

    /// Store `mesh` under a new group name.
    pub fn write_mesh(&self, group: &str, mesh: &Mesh) -> Result<(), MeshFieldError> {
        let payload = bincode::serialize(mesh.kind()?)?;
        self.insert(vec![(group.to_string(), GroupKind::Mesh, payload)])
    }

    /// Store `field` under a new group name.
    pub fn write_field(
        &self,
        group: &str,
        field: &Field,
        placement: MeshPlacement<'_>,
    ) -> Result<(), MeshFieldError> {
        let mut pending = Vec::with_capacity(2);
        let mesh_group = match placement {
            MeshPlacement::Inline => {
                let name = format!("{group}/mesh");
                pending.push((
                    name.clone(),
                    GroupKind::Mesh,
                    bincode::serialize(field.mesh().kind()?)?,
                ));
                Some(name)
            }
            MeshPlacement::Group(name) => {
                let (directory, _) = self.read_directory_or_empty()?;
                match directory.groups.get(name) {
                    Some(GroupEntry {
                        kind: GroupKind::Mesh,
                        ..
                    }) => Some(name.to_string()),
                    _ => return Err(self.unknown(name)),
                }
            }
            MeshPlacement::External => None,
        };
        let header = field.header()?;
        pending.push((
            group.to_string(),
            GroupKind::Field { header, mesh_group },
            bincode::serialize(field.values()?)?,
        ));
        self.insert(pending)
    }

    pub fn read_mesh(&self, group: &str) -> Result<MeshKind, MeshFieldError> {
        let (entry, payload) = self.read_group(group)?;
        if !matches!(entry.kind, GroupKind::Mesh) {
            return Err(MeshFieldError::MeshIoParse(format!(
                "group `{group}` in {} is not a mesh",
                self.path.display()
            )));
        }
        match bincode::deserialize::<MeshKind>(&payload)? {
            MeshKind::Unstructured(m) => Ok(MeshKind::Unstructured(m.validated()?)),
            MeshKind::Uniform(g) => Ok(MeshKind::Uniform(g.validated()?)),
        }
    }

    /// Field header and linked mesh group, without reading the values.
    pub fn read_field_header(
        &self,
        group: &str,
    ) -> Result<(FieldHeader, Option<String>), MeshFieldError> {
        let (directory, _) = self.read_directory()?;
        match directory.groups.get(group) {
            Some(GroupEntry {
                kind: GroupKind::Field { header, mesh_group },
                ..
            }) => Ok((header.clone(), mesh_group.clone())),
            Some(_) => Err(MeshFieldError::MeshIoParse(format!(
                "group `{group}` in {} is not a field",
                self.path.display()
            ))),
            None => Err(self.unknown(group)),
        }
    }

    pub fn read_field_values(&self, group: &str) -> Result<Vec<f64>, MeshFieldError> {
        let (entry, payload) = self.read_group(group)?;
        let GroupKind::Field { header, .. } = entry.kind else {
            return Err(MeshFieldError::MeshIoParse(format!(
                "group `{group}` in {} is not a field",
                self.path.display()
            )));
        };
        let values: Vec<f64> = bincode::deserialize(&payload)?;
        let expected = header.record_count * header.value_type.record_size();
        if values.len() != expected {
            return Err(MeshFieldError::Serialization(format!(
                "group `{group}` holds {} values, header announces {expected}",
                values.len()
            )));
        }
        Ok(values)
    }

    /// Fully resident field, including its mesh group.
    pub fn read_field(&self, group: &str) -> Result<Field, MeshFieldError> {
        let (header, mesh_group) = self.read_field_header(group)?;
        let mesh_group = mesh_group.ok_or_else(|| self.unknown(&format!("{group}/<mesh>")))?;
        let mesh = Arc::new(Mesh::from(self.read_mesh(&mesh_group)?));
        let values = self.read_field_values(group)?;
        Field::from_header(header, mesh, Lazy::resident(FieldValues(values)))
    }

    fn insert(&self, pending: Vec<(String, GroupKind, Vec<u8>)>) -> Result<(), MeshFieldError> {
        let (mut directory, mut blobs) = if self.path.exists() {
            let (directory, data_start) = self.read_directory()?;
            let mut file = File::open(&self.path)?;
            file.seek(SeekFrom::Start(data_start))?;
            let mut blobs = Vec::new();
            file.read_to_end(&mut blobs)?;
            (directory, blobs)
        } else {
            (Directory::default(), Vec::new())
        };
        for (name, _, _) in &pending {
            if directory.groups.contains_key(name) {
                return Err(MeshFieldError::GroupExists {
                    path: self.path.display().to_string(),
                    group: name.clone(),
                });
            }
        }
        for (name, kind, payload) in pending {
            debug!(
                "container {}: adding group `{name}` ({} bytes)",
                self.path.display(),
                payload.len()
            );
            let entry = GroupEntry {
                kind,
                offset: blobs.len() as u64,
                len: payload.len() as u64,
            };
            blobs.extend_from_slice(&payload);
            directory.groups.insert(name, entry);
        }
        let encoded = bincode::serialize(&directory)?;
        let mut bytes = Vec::with_capacity(PREAMBLE_LEN as usize + encoded.len() + blobs.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&CONTAINER_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(encoded.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&encoded);
        bytes.extend_from_slice(&blobs);
        write_atomic(&self.path, &bytes)
    }

    fn read_directory_or_empty(&self) -> Result<(Directory, u64), MeshFieldError> {
        if self.path.exists() {
            self.read_directory()
        } else {
            Ok((Directory::default(), PREAMBLE_LEN))
        }
    }

    fn read_directory(&self) -> Result<(Directory, u64), MeshFieldError> {
        let file = File::open(&self.path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let mut preamble = [0u8; PREAMBLE_LEN as usize];
        reader.read_exact(&mut preamble)?;
        if &preamble[..4] != MAGIC {
            return Err(MeshFieldError::MeshIoParse(format!(
                "{} is not a container file",
                self.path.display()
            )));
        }
        let version = u32::from_le_bytes([preamble[4], preamble[5], preamble[6], preamble[7]]);
        if version != CONTAINER_VERSION {
            return Err(MeshFieldError::MeshIoParse(format!(
                "unsupported container version {version}"
            )));
        }
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&preamble[8..16]);
        let dir_len = u64::from_le_bytes(len_bytes);
        let mut encoded = vec![0u8; self.region_len(file_len, PREAMBLE_LEN, dir_len, "directory")?];
        reader.read_exact(&mut encoded)?;
        let directory: Directory = bincode::deserialize(&encoded)?;
        Ok((directory, PREAMBLE_LEN + dir_len))
    }

    fn read_group(&self, group: &str) -> Result<(GroupEntry, Vec<u8>), MeshFieldError> {
        if !self.path.exists() {
            return Err(self.unknown(group));
        }
        let (mut directory, data_start) = self.read_directory()?;
        let entry = directory
            .groups
            .remove(group)
            .ok_or_else(|| self.unknown(group))?;
        let mut file = File::open(&self.path)?;
        let file_len = file.metadata()?.len();
        let start = data_start.checked_add(entry.offset).ok_or_else(|| {
            MeshFieldError::MeshIoParse(format!("group `{group}` offset overflows"))
        })?;
        let len = self.region_len(file_len, start, entry.len, group)?;
        file.seek(SeekFrom::Start(start))?;
        let mut payload = vec![0u8; len];
        file.read_exact(&mut payload)?;
        Ok((entry, payload))
    }

    /// `len` as a buffer size, if `start..start + len` lies inside the file.
    fn region_len(
        &self,
        file_len: u64,
        start: u64,
        len: u64,
        what: &str,
    ) -> Result<usize, MeshFieldError> {
        start
            .checked_add(len)
            .filter(|&end| end <= file_len)
            .and_then(|_| usize::try_from(len).ok())
            .ok_or_else(|| {
                MeshFieldError::MeshIoParse(format!(
                    "{what} of {len} bytes at {start} exceeds {} ({file_len} bytes)",
                    self.path.display()
                ))
            })
    }

    fn unknown(&self, group: &str) -> MeshFieldError {
        MeshFieldError::UnknownGroup {
            path: self.path.display().to_string(),
            group: group.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::field_id::FieldId;
    use crate::data::value_type::{FieldType, ValueType};
    use crate::heavy::HeavyRef;
    use crate::mesh::UniformGrid;
    use crate::units::{Quantity, Unit};

    fn field(time: f64) -> Field {
        let mesh: Mesh = UniformGrid::new_2d([3, 2], [1.0, 1.0], [0.0, 0.0], None)
            .unwrap()
            .into();
        Field::new(
            Arc::new(mesh),
            FieldId::Pressure,
            ValueType::Scalar,
            Unit::parse("Pa").unwrap(),
            Quantity::new(time, Unit::second()),
            Some(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            FieldType::VertexBased,
        )
        .unwrap()
    }

    #[test]
    fn groups_accumulate_without_disturbing_others() {
        let dir = tempfile::tempdir().unwrap();
        let container = Container::new(dir.path().join("data.mfc"));
        assert!(container.groups().unwrap().is_empty());
        container
            .write_field("a", &field(1.0), MeshPlacement::Inline)
            .unwrap();
        let before = container.read_field("a").unwrap();
        container.write_mesh("shared", field(2.0).mesh()).unwrap();
        container
            .write_field("b", &field(2.0), MeshPlacement::Group("shared"))
            .unwrap();
        assert_eq!(container.groups().unwrap(), vec!["a", "a/mesh", "b", "shared"]);
        let after = container.read_field("a").unwrap();
        assert_eq!(before.values().unwrap(), after.values().unwrap());
        assert_eq!(after.time().value, 1.0);
        let b = container.read_field("b").unwrap();
        assert_eq!(b.time().value, 2.0);
    }

    #[test]
    fn duplicate_and_missing_groups() {
        let dir = tempfile::tempdir().unwrap();
        let container = Container::new(dir.path().join("data.mfc"));
        container
            .write_field("a", &field(1.0), MeshPlacement::Inline)
            .unwrap();
        assert!(matches!(
            container.write_field("a", &field(1.0), MeshPlacement::External),
            Err(MeshFieldError::GroupExists { .. })
        ));
        assert!(container.read_field("nope").unwrap_err().is_lookup());
        assert!(
            container
                .write_field("c", &field(1.0), MeshPlacement::Group("nope"))
                .unwrap_err()
                .is_lookup()
        );
        assert!(matches!(
            container.read_mesh("a"),
            Err(MeshFieldError::MeshIoParse(_))
        ));
    }

    #[test]
    fn deferred_field_is_checked_against_its_mesh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.mfc");
        let container = Container::new(&path);
        container
            .write_field("a", &field(1.0), MeshPlacement::Inline)
            .unwrap();
        let coarse: Mesh = UniformGrid::new_2d([2, 2], [1.0, 1.0], [0.0, 0.0], None)
            .unwrap()
            .into();
        container.write_mesh("coarse", &coarse).unwrap();

        let heavy = Field::from_heavy(
            HeavyRef::new(&path, "a"),
            Some(HeavyRef::new(&path, "coarse")),
        )
        .unwrap();
        assert!(matches!(heavy.values(), Err(MeshFieldError::Serialization(_))));
        assert!(heavy.evaluate([0.5, 0.5]).is_err());

        let good = Field::from_heavy(HeavyRef::new(&path, "a"), None).unwrap();
        assert_eq!(good.values().unwrap().len(), 6);
    }

    #[test]
    fn lengths_past_end_of_file_are_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.mfc");
        let container = Container::new(&path);
        container
            .write_field("a", &field(1.0), MeshPlacement::Inline)
            .unwrap();
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[8..16].copy_from_slice(&(u64::MAX / 2).to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(container.groups(), Err(MeshFieldError::MeshIoParse(_))));

        let mut directory = Directory::default();
        directory.groups.insert(
            "m".into(),
            GroupEntry {
                kind: GroupKind::Mesh,
                offset: 0,
                len: u64::MAX / 2,
            },
        );
        let encoded = bincode::serialize(&directory).unwrap();
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&CONTAINER_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(encoded.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&encoded);
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(container.read_mesh("m"), Err(MeshFieldError::MeshIoParse(_))));
    }
}

