//! Fields: per-vertex or per-cell records over a shared mesh.

use std::sync::Arc;

use log::debug;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::field_id::FieldId;
use crate::data::value_type::{FieldType, ValueType};
use crate::geometry::metrics::{self, DEFAULT_EPS};
use crate::heavy::{HeavyLoad, HeavyRef, Lazy};
use crate::io::container::Container;
use crate::mesh::Mesh;
use crate::mesh_error::MeshFieldError;
use crate::stable_hash::StableHasher;
use crate::units::{Quantity, Unit};

/// Flat record buffer: `record_count * record_size` values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldValues(pub Vec<f64>);

impl HeavyLoad for FieldValues {
    fn load(source: &HeavyRef) -> Result<Self, MeshFieldError> {
        Container::new(&source.path)
            .read_field_values(&source.group)
            .map(FieldValues)
    }
}

/// Everything about a field except its mesh and values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldHeader {
    pub field_id: FieldId,
    pub value_type: ValueType,
    pub field_type: FieldType,
    pub unit: Unit,
    pub time: Quantity,
    pub record_count: usize,
}

/// Evaluation position: bare coordinates in the mesh's implicit unit, or a
/// unit-tagged coordinate tuple converted to the mesh unit.
#[derive(Clone, Debug, PartialEq)]
pub enum Position {
    Bare(Vec<f64>),
    Tagged(Quantity<Vec<f64>>),
}

impl From<Vec<f64>> for Position {
    fn from(coords: Vec<f64>) -> Self {
        Position::Bare(coords)
    }
}

impl From<&[f64]> for Position {
    fn from(coords: &[f64]) -> Self {
        Position::Bare(coords.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for Position {
    fn from(coords: [f64; N]) -> Self {
        Position::Bare(coords.to_vec())
    }
}

impl From<Quantity<Vec<f64>>> for Position {
    fn from(q: Quantity<Vec<f64>>) -> Self {
        Position::Tagged(q)
    }
}

/// A discretized field over a shared [`Mesh`].
///
/// Invariant: the value buffer holds exactly one record of
/// `value_type.record_size()` components per mesh vertex (vertex-based) or
/// per mesh cell (cell-based). Values may be resident or a heavy reference
/// that loads on first access.
///
/// `set_record` and `merge` mutate in place and need exclusive access; there
/// is no internal synchronization for them.
#[derive(Clone, Debug)]
pub struct Field {
    mesh: Arc<Mesh>,
    field_id: FieldId,
    value_type: ValueType,
    field_type: FieldType,
    unit: Unit,
    time: Quantity,
    record_count: usize,
    values: Lazy<FieldValues>,
}

impl Field {
    /// Build a resident field. `values: None` zero-fills every record.
    pub fn new(
        mesh: Arc<Mesh>,
        field_id: FieldId,
        value_type: ValueType,
        unit: Unit,
        time: Quantity,
        values: Option<Vec<f64>>,
        field_type: FieldType,
    ) -> Result<Self, MeshFieldError> {
        check_time(&time)?;
        let records = mesh_records(&mesh, field_type)?;
        let expected = records * value_type.record_size();
        let values = values.unwrap_or_else(|| vec![0.0; expected]);
        if values.len() != expected {
            return Err(MeshFieldError::RecordSizeMismatch {
                expected,
                found: values.len(),
            });
        }
        Ok(Self {
            mesh,
            field_id,
            value_type,
            field_type,
            unit,
            time,
            record_count: records,
            values: Lazy::resident(FieldValues(values)),
        })
    }

    /// Bind to field data in a container group.
    ///
    /// The header is read now; values load on first access. When `mesh_ref`
    /// is `None` the mesh group recorded in the header (same file) is used.
    pub fn from_heavy(
        field_ref: HeavyRef,
        mesh_ref: Option<HeavyRef>,
    ) -> Result<Self, MeshFieldError> {
        let container = Container::new(&field_ref.path);
        let (header, mesh_group) = container.read_field_header(&field_ref.group)?;
        let mesh_ref = match (mesh_ref, mesh_group) {
            (Some(mesh_ref), _) => mesh_ref,
            (None, Some(group)) => {
                HeavyRef::new(field_ref.path.clone(), group).read_only(field_ref.read_only)
            }
            (None, None) => {
                return Err(MeshFieldError::UnknownGroup {
                    path: field_ref.path.display().to_string(),
                    group: format!("{}/<mesh>", field_ref.group),
                });
            }
        };
        let mesh = Arc::new(Mesh::from_heavy(mesh_ref));
        Self::from_header(header, mesh, Lazy::deferred(field_ref))
    }

    pub(crate) fn from_header(
        header: FieldHeader,
        mesh: Arc<Mesh>,
        values: Lazy<FieldValues>,
    ) -> Result<Self, MeshFieldError> {
        check_time(&header.time)?;
        let field = Self {
            mesh,
            field_id: header.field_id,
            value_type: header.value_type,
            field_type: header.field_type,
            unit: header.unit,
            time: header.time,
            record_count: header.record_count,
            values,
        };
        // Deferred parts are checked on first access in `values`.
        if field.mesh.is_loaded() {
            field.check_mesh_records()?;
        }
        if field.values.is_loaded() {
            field.check_value_count(&field.values.get()?.0)?;
        }
        Ok(field)
    }

    pub fn header(&self) -> Result<FieldHeader, MeshFieldError> {
        Ok(FieldHeader {
            field_id: self.field_id,
            value_type: self.value_type,
            field_type: self.field_type,
            unit: self.unit.clone(),
            time: self.time.clone(),
            record_count: self.record_count()?,
        })
    }

    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    pub fn field_id(&self) -> FieldId {
        self.field_id
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn time(&self) -> &Quantity {
        &self.time
    }

    /// 1 for scalars, 3 for vectors, 9 for tensors.
    pub fn record_size(&self) -> usize {
        self.value_type.record_size()
    }

    /// All values, flattened record by record.
    ///
    /// Loads deferred values and fails with `Serialization` when the stored
    /// record count disagrees with the buffer or the mesh.
    pub fn values(&self) -> Result<&[f64], MeshFieldError> {
        let values = &self.values.get()?.0;
        self.check_value_count(values)?;
        self.check_mesh_records()?;
        Ok(values)
    }

    fn check_value_count(&self, values: &[f64]) -> Result<(), MeshFieldError> {
        let expected = self.record_count * self.record_size();
        if values.len() != expected {
            return Err(MeshFieldError::Serialization(format!(
                "{} field holds {} values, expected {} records of {}",
                self.field_id,
                values.len(),
                self.record_count,
                self.record_size()
            )));
        }
        Ok(())
    }

    fn check_mesh_records(&self) -> Result<(), MeshFieldError> {
        let records = mesh_records(&self.mesh, self.field_type)?;
        if records != self.record_count {
            return Err(MeshFieldError::Serialization(format!(
                "{}-based {} field has {} records, but its mesh has {records}",
                self.field_type.as_str(),
                self.field_id,
                self.record_count
            )));
        }
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.values.is_loaded()
    }

    pub fn heavy_source(&self) -> Option<&HeavyRef> {
        self.values.source()
    }

    pub fn record_count(&self) -> Result<usize, MeshFieldError> {
        Ok(self.values()?.len() / self.record_size())
    }

    /// Raw record `i` regardless of field type.
    pub fn record(&self, i: usize) -> Result<&[f64], MeshFieldError> {
        let size = self.record_size();
        let values = self.values()?;
        let len = values.len() / size;
        if i >= len {
            return Err(MeshFieldError::IndexOutOfRange {
                kind: "record",
                index: i,
                len,
            });
        }
        Ok(&values[i * size..(i + 1) * size])
    }

    /// Stored value at vertex `i` of a vertex-based field.
    pub fn get_vertex_value(&self, i: usize) -> Result<Quantity<Vec<f64>>, MeshFieldError> {
        if self.field_type != FieldType::VertexBased {
            return Err(MeshFieldError::FieldTypeMismatch(
                "vertex value requested from a cell-based field".into(),
            ));
        }
        Ok(Quantity::new(self.record(i)?.to_vec(), self.unit.clone()))
    }

    /// Stored value at cell `i` of a cell-based field.
    pub fn get_cell_value(&self, i: usize) -> Result<Quantity<Vec<f64>>, MeshFieldError> {
        if self.field_type != FieldType::CellBased {
            return Err(MeshFieldError::FieldTypeMismatch(
                "cell value requested from a vertex-based field".into(),
            ));
        }
        Ok(Quantity::new(self.record(i)?.to_vec(), self.unit.clone()))
    }

    /// Replace record `i` in place.
    pub fn set_record(&mut self, i: usize, record: &[f64]) -> Result<(), MeshFieldError> {
        let size = self.record_size();
        if record.len() != size {
            return Err(MeshFieldError::RecordSizeMismatch {
                expected: size,
                found: record.len(),
            });
        }
        self.values()?;
        let values = &mut self.values.get_mut()?.0;
        let len = values.len() / size;
        let slot = values
            .get_mut(i * size..(i + 1) * size)
            .ok_or(MeshFieldError::IndexOutOfRange {
                kind: "record",
                index: i,
                len,
            })?;
        slot.copy_from_slice(record);
        Ok(())
    }

    /// Evaluate at `position` with the default location tolerance.
    pub fn evaluate(
        &self,
        position: impl Into<Position>,
    ) -> Result<Quantity<Vec<f64>>, MeshFieldError> {
        self.evaluate_with_eps(position, DEFAULT_EPS)
    }

    /// Evaluate at `position`.
    ///
    /// Vertex-based fields interpolate the enclosing cell's vertex records
    /// with its shape functions; cell-based fields return the enclosing
    /// cell's record. A point on a shared boundary belongs to the first
    /// containing cell in mesh order.
    pub fn evaluate_with_eps(
        &self,
        position: impl Into<Position>,
        eps: f64,
    ) -> Result<Quantity<Vec<f64>>, MeshFieldError> {
        let point = self.mesh_point(position.into())?;
        let (cell_index, natural) = self.mesh.locate(&point, eps)?;
        let value = match self.field_type {
            FieldType::CellBased => self.record(cell_index)?.to_vec(),
            FieldType::VertexBased => {
                let cell = self.mesh.cell(cell_index)?;
                let records = cell
                    .vertices()
                    .iter()
                    .map(|&v| self.record(v))
                    .collect::<Result<Vec<_>, _>>()?;
                metrics::interpolate(cell.geometry(), &natural, &records, self.record_size())?
            }
        };
        Ok(Quantity::new(value, self.unit.clone()))
    }

    /// Evaluate at many positions; parallel with the `rayon` feature.
    pub fn evaluate_many(
        &self,
        positions: &[Position],
        eps: f64,
    ) -> Result<Vec<Quantity<Vec<f64>>>, MeshFieldError> {
        #[cfg(feature = "rayon")]
        {
            positions
                .par_iter()
                .map(|p| self.evaluate_with_eps(p.clone(), eps))
                .collect()
        }
        #[cfg(not(feature = "rayon"))]
        {
            positions
                .iter()
                .map(|p| self.evaluate_with_eps(p.clone(), eps))
                .collect()
        }
    }

    /// Append `other`'s mesh and records after this field's own.
    ///
    /// The merged mesh is a new mesh (other fields sharing the old one are
    /// unaffected). `other`'s values are converted to this field's unit.
    pub fn merge(&mut self, other: &Field) -> Result<(), MeshFieldError> {
        if self.field_type != other.field_type {
            return Err(MeshFieldError::FieldTypeMismatch(format!(
                "cannot merge a {}-based field into a {}-based field",
                other.field_type.as_str(),
                self.field_type.as_str()
            )));
        }
        if self.value_type != other.value_type {
            return Err(MeshFieldError::RecordSizeMismatch {
                expected: self.record_size(),
                found: other.record_size(),
            });
        }
        let factor = other.unit.conversion_factor(&self.unit)?;
        let mut mesh = Mesh::from(self.mesh.kind()?.clone());
        mesh.merge(&other.mesh)?;
        let theirs = other.values()?;
        self.values()?;
        let values = &mut self.values.get_mut()?.0;
        values.extend(theirs.iter().map(|v| v * factor));
        self.mesh = Arc::new(mesh);
        self.record_count += other.record_count;
        debug!(
            "merged {} field: {} values",
            self.field_id,
            values.len()
        );
        Ok(())
    }

    /// Stable content digest of header, mesh and values.
    pub fn digest(&self) -> Result<u64, MeshFieldError> {
        let mut hasher = StableHasher::new();
        hasher
            .write_str(self.field_id.name())
            .write_u64(self.record_size() as u64)
            .write_str(self.field_type.as_str())
            .write_str(self.unit.name())
            .write_f64s(&[self.time.si_value()])
            .write_u64(self.mesh.digest()?)
            .write_f64s(self.values()?);
        Ok(hasher.finish())
    }

    fn mesh_point(&self, position: Position) -> Result<[f64; 3], MeshFieldError> {
        let coords = match position {
            Position::Bare(coords) => coords,
            Position::Tagged(q) => match self.mesh.unit()? {
                None => {
                    return Err(MeshFieldError::UnitOnUnitlessMesh(q.unit.name().to_string()));
                }
                Some(mesh_unit) => q.convert_to(mesh_unit)?.value,
            },
        };
        if coords.is_empty() || coords.len() > 3 {
            return Err(MeshFieldError::InvalidGeometry(format!(
                "position must have 1 to 3 coordinates, got {}",
                coords.len()
            )));
        }
        let mut point = [0.0; 3];
        point[..coords.len()].copy_from_slice(&coords);
        Ok(point)
    }
}

fn mesh_records(mesh: &Mesh, field_type: FieldType) -> Result<usize, MeshFieldError> {
    match field_type {
        FieldType::VertexBased => mesh.number_of_vertices(),
        FieldType::CellBased => mesh.number_of_cells(),
    }
}

fn check_time(time: &Quantity) -> Result<(), MeshFieldError> {
    if !time.unit.is_time() {
        return Err(MeshFieldError::Unit(format!(
            "field time must be a time quantity, got unit `{}`",
            time.unit
        )));
    }
    Ok(())
}
