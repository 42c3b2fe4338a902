//! Local snapshot: a single field (header, mesh and values) in one bincode blob.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::data::field::{Field, FieldHeader, FieldValues};
use crate::heavy::Lazy;
use crate::io::write_atomic;
use crate::mesh::{Mesh, MeshKind};
use crate::mesh_error::MeshFieldError;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct FieldRecordRef<'a> {
    version: u32,
    header: FieldHeader,
    mesh: &'a MeshKind,
    values: &'a [f64],
}

#[derive(Deserialize)]
struct FieldRecord {
    version: u32,
    header: FieldHeader,
    mesh: MeshKind,
    values: Vec<f64>,
}

/// Encode `field` (loading heavy data if needed).
pub fn to_bytes(field: &Field) -> Result<Vec<u8>, MeshFieldError> {
    let record = FieldRecordRef {
        version: SNAPSHOT_VERSION,
        header: field.header()?,
        mesh: field.mesh().kind()?,
        values: field.values()?,
    };
    Ok(bincode::serialize(&record)?)
}

/// Decode a resident field.
pub fn from_bytes(bytes: &[u8]) -> Result<Field, MeshFieldError> {
    let record: FieldRecord = bincode::deserialize(bytes)?;
    if record.version != SNAPSHOT_VERSION {
        return Err(MeshFieldError::MeshIoParse(format!(
            "unsupported snapshot version {}",
            record.version
        )));
    }
    let mesh = match record.mesh {
        MeshKind::Unstructured(m) => MeshKind::Unstructured(m.validated()?),
        MeshKind::Uniform(g) => MeshKind::Uniform(g.validated()?),
    };
    Field::from_header(
        record.header,
        Arc::new(Mesh::from(mesh)),
        Lazy::resident(FieldValues(record.values)),
    )
}

pub fn dump(field: &Field, path: impl AsRef<Path>) -> Result<(), MeshFieldError> {
    write_atomic(path.as_ref(), &to_bytes(field)?)
}

pub fn load(path: impl AsRef<Path>) -> Result<Field, MeshFieldError> {
    from_bytes(&fs::read(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::field_id::FieldId;
    use crate::data::value_type::{FieldType, ValueType};
    use crate::mesh::UniformGrid;
    use crate::units::{Quantity, Unit};

    fn encode(record_count: usize, values: &[f64]) -> Vec<u8> {
        let grid = UniformGrid::new_2d([3, 2], [1.0, 1.0], [0.0, 0.0], None).unwrap();
        let record = FieldRecordRef {
            version: SNAPSHOT_VERSION,
            header: FieldHeader {
                field_id: FieldId::Pressure,
                value_type: ValueType::Scalar,
                field_type: FieldType::VertexBased,
                unit: Unit::parse("Pa").unwrap(),
                time: Quantity::new(0.0, Unit::second()),
                record_count,
            },
            mesh: &MeshKind::Uniform(grid),
            values,
        };
        bincode::serialize(&record).unwrap()
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            from_bytes(&[1, 2, 3]),
            Err(MeshFieldError::Serialization(_))
        ));
    }

    #[test]
    fn consistent_record_loads() {
        let field = from_bytes(&encode(6, &[1.0; 6])).unwrap();
        assert_eq!(field.record_count().unwrap(), 6);
    }

    #[test]
    fn truncated_record_array_is_rejected() {
        assert!(matches!(
            from_bytes(&encode(6, &[1.0; 5])),
            Err(MeshFieldError::Serialization(_))
        ));
    }

    #[test]
    fn record_count_must_match_mesh() {
        assert!(matches!(
            from_bytes(&encode(4, &[1.0; 4])),
            Err(MeshFieldError::Serialization(_))
        ));
    }
}
