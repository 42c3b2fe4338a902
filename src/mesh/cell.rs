//! Mesh cells.

use serde::{Deserialize, Serialize};

use crate::geometry::cell_type::CellGeometry;
use crate::mesh_error::MeshFieldError;

/// A mesh cell: local `number`, `label`, geometry tag and connectivity.
///
/// Connectivity lists vertex numbers of the owning mesh in reference-element
/// order (see [`crate::geometry::metrics`]).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    number: usize,
    label: i64,
    geometry: CellGeometry,
    vertices: Vec<usize>,
}

impl Cell {
    pub fn new(
        number: usize,
        label: i64,
        geometry: CellGeometry,
        vertices: Vec<usize>,
    ) -> Result<Self, MeshFieldError> {
        if vertices.len() != geometry.vertex_count() {
            return Err(MeshFieldError::InvalidGeometry(format!(
                "cell {number}: {geometry:?} needs {} vertices, got {}",
                geometry.vertex_count(),
                vertices.len()
            )));
        }
        Ok(Self {
            number,
            label,
            geometry,
            vertices,
        })
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub fn label(&self) -> i64 {
        self.label
    }

    pub fn geometry(&self) -> CellGeometry {
        self.geometry
    }

    /// Vertex numbers in reference-element order.
    pub fn vertices(&self) -> &[usize] {
        &self.vertices
    }

    pub(crate) fn shifted(&self, number: usize, vertex_offset: usize) -> Self {
        Self {
            number,
            label: self.label,
            geometry: self.geometry,
            vertices: self.vertices.iter().map(|v| v + vertex_offset).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_count_checked() {
        assert!(Cell::new(0, 0, CellGeometry::TriangleLinear, vec![0, 1]).is_err());
        let cell = Cell::new(0, 7, CellGeometry::QuadrilateralLinear, vec![0, 1, 2, 3]).unwrap();
        let shifted = cell.shifted(4, 10);
        assert_eq!(shifted.vertices(), &[10, 11, 12, 13]);
        assert_eq!(shifted.label(), 7);
        assert_eq!(shifted.number(), 4);
    }
}
