//! MeshFieldError: Unified error type for mesh-field public APIs
//!
//! Every fallible operation in the crate (geometry, unit conversion, record
//! access, persistence) reports through this enum so callers can match on the
//! failure class instead of parsing messages.

use thiserror::Error;

/// Unified error type for mesh-field operations.
#[derive(Debug, Error)]
pub enum MeshFieldError {
    /// Degenerate or malformed cell (wrong vertex count, zero Jacobian, ...).
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
    /// A cell references a vertex number that does not exist in its mesh.
    #[error("Cell {cell} references vertex {vertex}, but the mesh has {vertex_count} vertices")]
    InvalidConnectivity {
        cell: usize,
        vertex: usize,
        vertex_count: usize,
    },
    /// No cell of the mesh contains the position within the given tolerance.
    #[error("Position {position:?} is outside the mesh domain (eps = {eps})")]
    OutOfDomain { position: Vec<f64>, eps: f64 },
    /// Malformed unit expression or unit-related usage error.
    #[error("Unit error: {0}")]
    Unit(String),
    /// Conversion between units of different physical dimension.
    #[error("Cannot convert `{from}` to `{to}`: incompatible dimensions")]
    IncompatibleUnits { from: String, to: String },
    /// A unit-tagged position was passed, but the mesh has no unit to convert against.
    #[error("Position given in `{0}`, but the mesh has no unit defined")]
    UnitOnUnitlessMesh(String),
    /// Vertex/cell/record index out of bounds.
    #[error("{kind} index {index} out of range (len = {len})")]
    IndexOutOfRange {
        kind: &'static str,
        index: usize,
        len: usize,
    },
    /// Record width does not match the field's value type.
    #[error("Record size mismatch: expected {expected}, found {found}")]
    RecordSizeMismatch { expected: usize, found: usize },
    /// Operation not valid for the field's storage kind (vertex vs. cell based).
    #[error("Field type mismatch: {0}")]
    FieldTypeMismatch(String),
    /// A store entry already exists at this time.
    #[error("A field is already stored at time {0}")]
    DuplicateTime(String),
    /// Appended time is earlier than the last stored one.
    #[error("Time {time} precedes the last stored time {last}")]
    TimeNotIncreasing { time: String, last: String },
    /// No store entry exists at exactly this time.
    #[error("No field stored at time {0}")]
    UnknownTime(String),
    /// Named group is missing from a container file.
    #[error("Group `{group}` not found in {path}")]
    UnknownGroup { path: String, group: String },
    /// Named group already exists in a container file.
    #[error("Group `{group}` already exists in {path}")]
    GroupExists { path: String, group: String },
    /// Mutation attempted on data bound read-only to a backing container.
    #[error("Read-only heavy data: {0}")]
    ReadOnly(String),
    /// Store configuration the store cannot honor.
    #[error("Invalid configuration: {0}")]
    Config(String),
    /// Parse failure while reading an interchange format.
    #[error("Mesh I/O parse error: {0}")]
    MeshIoParse(String),
    /// Binary/JSON encoding failure.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Underlying filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MeshFieldError {
    /// True for the lookup failures (unknown time or group).
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            MeshFieldError::UnknownTime(_) | MeshFieldError::UnknownGroup { .. }
        )
    }

    /// True for any unit-related failure.
    pub fn is_unit_error(&self) -> bool {
        matches!(
            self,
            MeshFieldError::Unit(_)
                | MeshFieldError::IncompatibleUnits { .. }
                | MeshFieldError::UnitOnUnitlessMesh(_)
        )
    }
}

impl From<bincode::Error> for MeshFieldError {
    fn from(err: bincode::Error) -> Self {
        MeshFieldError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for MeshFieldError {
    fn from(err: serde_json::Error) -> Self {
        MeshFieldError::Serialization(err.to_string())
    }
}
