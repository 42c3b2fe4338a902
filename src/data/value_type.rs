//! Record layout tags: value type (record width) and field type (record owner).

use serde::{Deserialize, Serialize};

use crate::mesh_error::MeshFieldError;

/// Shape of one field record.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum ValueType {
    Scalar,
    Vector,
    /// 3x3, stored row-major.
    Tensor,
}

impl ValueType {
    /// Number of components per record: 1, 3 or 9.
    pub fn record_size(self) -> usize {
        match self {
            ValueType::Scalar => 1,
            ValueType::Vector => 3,
            ValueType::Tensor => 9,
        }
    }

    pub fn from_record_size(size: usize) -> Result<Self, MeshFieldError> {
        match size {
            1 => Ok(ValueType::Scalar),
            3 => Ok(ValueType::Vector),
            9 => Ok(ValueType::Tensor),
            _ => Err(MeshFieldError::RecordSizeMismatch {
                expected: 1,
                found: size,
            }),
        }
    }
}

/// Whether records belong to mesh vertices or mesh cells.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum FieldType {
    VertexBased,
    CellBased,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::VertexBased => "vertex",
            FieldType::CellBased => "cell",
        }
    }
}
