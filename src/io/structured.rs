//! Structured-points VTK import: one field per mapped point-data array, all
//! sharing a single uniform-grid mesh.

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use log::debug;

use crate::data::field::Field;
use crate::data::field_id::FieldId;
use crate::data::value_type::{FieldType, ValueType};
use crate::io::FieldReader;
use crate::io::vtk::{DataArray, Scanner, array_len, read_attribute, read_header};
use crate::mesh::{Mesh, UniformGrid};
use crate::mesh_error::MeshFieldError;
use crate::units::{Quantity, Unit};

/// Reads `DATASET STRUCTURED_POINTS` files.
///
/// Only arrays named in the mapping are turned into fields; the mapping
/// supplies the field id and value unit each array is interpreted with.
#[derive(Clone, Debug)]
pub struct StructuredPointsReader {
    mapping: HashMap<String, (FieldId, Unit)>,
    mesh_unit: Option<Unit>,
    time: Quantity,
}

impl StructuredPointsReader {
    pub fn new(time: Quantity) -> Self {
        Self {
            mapping: HashMap::new(),
            mesh_unit: None,
            time,
        }
    }

    pub fn with_array(mut self, name: impl Into<String>, field_id: FieldId, unit: Unit) -> Self {
        self.mapping.insert(name.into(), (field_id, unit));
        self
    }

    pub fn with_mesh_unit(mut self, unit: Unit) -> Self {
        self.mesh_unit = Some(unit);
        self
    }
}

impl FieldReader for StructuredPointsReader {
    fn read<R: Read>(&self, mut reader: R) -> Result<Vec<Field>, MeshFieldError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let mut scanner = Scanner::new(&bytes);
        let (binary, dataset) = read_header(&mut scanner)?;
        if dataset != "STRUCTURED_POINTS" {
            return Err(MeshFieldError::MeshIoParse(format!(
                "expected STRUCTURED_POINTS, found {dataset}"
            )));
        }

        let mut dims = None;
        let mut origin = [0.0; 3];
        let mut spacing = [1.0; 3];
        let mut point_count = None;
        let mut arrays: Vec<DataArray> = Vec::new();
        while let Some(token) = scanner.token()? {
            match token {
                "DIMENSIONS" => {
                    dims = Some([
                        scanner.parse::<usize>("nx")?,
                        scanner.parse::<usize>("ny")?,
                        scanner.parse::<usize>("nz")?,
                    ]);
                }
                "ORIGIN" => {
                    for o in &mut origin {
                        *o = scanner.parse("origin")?;
                    }
                }
                "SPACING" | "ASPECT_RATIO" => {
                    for h in &mut spacing {
                        *h = scanner.parse("spacing")?;
                    }
                }
                "POINT_DATA" => point_count = Some(scanner.parse::<usize>("point count")?),
                "SCALARS" | "VECTORS" | "TENSORS" => {
                    let n = point_count.ok_or_else(|| {
                        MeshFieldError::MeshIoParse(format!("{token} before POINT_DATA"))
                    })?;
                    arrays.push(read_attribute(&mut scanner, token, n, binary)?);
                }
                "FIELD" => {
                    scanner.expect("field name")?;
                    let count: usize = scanner.parse("field array count")?;
                    for _ in 0..count {
                        let name = scanner.expect("field array name")?.to_string();
                        let components: usize = scanner.parse("field components")?;
                        let tuples: usize = scanner.parse("field tuples")?;
                        let data_type = scanner.expect("field data type")?;
                        let len = array_len(components, tuples, &name)?;
                        let values = scanner.values(len, data_type, binary)?;
                        arrays.push(DataArray {
                            name,
                            components,
                            values,
                        });
                    }
                }
                other => {
                    return Err(MeshFieldError::MeshIoParse(format!(
                        "unexpected token {other}"
                    )));
                }
            }
        }

        let dims = dims.ok_or_else(|| MeshFieldError::MeshIoParse("missing DIMENSIONS".into()))?;
        let grid = UniformGrid::new(dims, spacing, origin, self.mesh_unit.clone())?;
        if let Some(n) = point_count {
            if n != grid.number_of_vertices() {
                return Err(MeshFieldError::MeshIoParse(format!(
                    "POINT_DATA {n} does not match {dims:?} grid"
                )));
            }
        }
        let mesh = Arc::new(Mesh::from(grid));

        let mut fields = Vec::new();
        for array in arrays {
            let Some((field_id, unit)) = self.mapping.get(&array.name) else {
                debug!("skipping unmapped array `{}`", array.name);
                continue;
            };
            fields.push(Field::new(
                mesh.clone(),
                *field_id,
                ValueType::from_record_size(array.components)?,
                unit.clone(),
                self.time.clone(),
                Some(array.values),
                FieldType::VertexBased,
            )?);
        }
        Ok(fields)
    }
}
