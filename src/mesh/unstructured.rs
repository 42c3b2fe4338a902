//! In-memory unstructured mesh.

use log::debug;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::geometry::bbox::BBox;
use crate::mesh::cell::Cell;
use crate::mesh::localizer::CellLocalizer;
use crate::mesh::vertex::Vertex;
use crate::mesh_error::MeshFieldError;
use crate::stable_hash::StableHasher;
use crate::units::Unit;

/// Vertices and cells held directly in memory.
///
/// Construction via [`UnstructuredMesh::setup`] validates that vertex and
/// cell numbers match their positions and that every connectivity entry is a
/// valid vertex number. The cell localizer is built on the first geometric
/// query and kept until the mesh is mutated by [`UnstructuredMesh::merge`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnstructuredMesh {
    vertices: Vec<Vertex>,
    cells: Vec<Cell>,
    unit: Option<Unit>,
    #[serde(skip)]
    localizer: OnceCell<CellLocalizer>,
}

impl UnstructuredMesh {
    pub fn setup(
        vertices: Vec<Vertex>,
        cells: Vec<Cell>,
        unit: Option<Unit>,
    ) -> Result<Self, MeshFieldError> {
        if let Some(unit) = &unit {
            if !unit.is_length() {
                return Err(MeshFieldError::Unit(format!(
                    "mesh unit `{unit}` is not a length"
                )));
            }
        }
        for (i, v) in vertices.iter().enumerate() {
            if v.number() != i {
                return Err(MeshFieldError::InvalidGeometry(format!(
                    "vertex at position {i} carries number {}",
                    v.number()
                )));
            }
        }
        for (i, c) in cells.iter().enumerate() {
            if c.number() != i {
                return Err(MeshFieldError::InvalidGeometry(format!(
                    "cell at position {i} carries number {}",
                    c.number()
                )));
            }
            if let Some(&bad) = c.vertices().iter().find(|&&v| v >= vertices.len()) {
                return Err(MeshFieldError::InvalidConnectivity {
                    cell: i,
                    vertex: bad,
                    vertex_count: vertices.len(),
                });
            }
        }
        Ok(Self {
            vertices,
            cells,
            unit,
            localizer: OnceCell::new(),
        })
    }

    /// Re-run construction checks, e.g. on a deserialized mesh.
    pub(crate) fn validated(self) -> Result<Self, MeshFieldError> {
        Self::setup(self.vertices, self.cells, self.unit)
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn unit(&self) -> Option<&Unit> {
        self.unit.as_ref()
    }

    pub fn number_of_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn number_of_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn vertex(&self, i: usize) -> Result<&Vertex, MeshFieldError> {
        self.vertices.get(i).ok_or(MeshFieldError::IndexOutOfRange {
            kind: "vertex",
            index: i,
            len: self.vertices.len(),
        })
    }

    pub fn cell(&self, i: usize) -> Result<&Cell, MeshFieldError> {
        self.cells.get(i).ok_or(MeshFieldError::IndexOutOfRange {
            kind: "cell",
            index: i,
            len: self.cells.len(),
        })
    }

    /// Padded coordinates of the vertices of cell `i`, in connectivity order.
    pub fn cell_coordinates(&self, i: usize) -> Result<Vec<[f64; 3]>, MeshFieldError> {
        let cell = self.cell(i)?;
        cell.vertices()
            .iter()
            .map(|&v| self.vertex(v).map(Vertex::position))
            .collect()
    }

    /// Largest coordinate count among the vertices.
    pub fn dimension(&self) -> usize {
        self.vertices.iter().map(Vertex::dimension).max().unwrap_or(0)
    }

    pub fn localizer(&self) -> &CellLocalizer {
        self.localizer.get_or_init(|| CellLocalizer::build(self))
    }

    pub fn bbox(&self) -> BBox {
        BBox::from_points(self.vertices.iter().map(Vertex::position))
    }

    /// First cell (in index order) containing `point`, with its natural coordinate.
    pub fn locate(&self, point: &[f64; 3], eps: f64) -> Result<(usize, Vec<f64>), MeshFieldError> {
        self.localizer().locate(self, point, eps)
    }

    /// Number of the first vertex carrying `label`.
    pub fn vertex_label_to_number(&self, label: i64) -> Option<usize> {
        self.vertices.iter().position(|v| v.label() == label)
    }

    /// Number of the first cell carrying `label`.
    pub fn cell_label_to_number(&self, label: i64) -> Option<usize> {
        self.cells.iter().position(|c| c.label() == label)
    }

    /// Append `other`'s vertices and cells after this mesh's own.
    ///
    /// `other`'s numbers and connectivity are shifted by this mesh's prior
    /// vertex/cell counts; labels are copied unchanged and coincident
    /// vertices are not merged. Coordinates of `other` are converted to this
    /// mesh's unit when both define one.
    pub fn merge(&mut self, other: &UnstructuredMesh) -> Result<(), MeshFieldError> {
        let factor = match (&self.unit, &other.unit) {
            (Some(mine), Some(theirs)) => theirs.conversion_factor(mine)?,
            (None, None) => 1.0,
            (Some(unit), None) | (None, Some(unit)) => {
                return Err(MeshFieldError::Unit(format!(
                    "cannot merge a mesh in `{unit}` with a unitless mesh"
                )));
            }
        };
        let vertex_offset = self.vertices.len();
        let cell_offset = self.cells.len();
        self.vertices.reserve(other.vertices.len());
        for v in &other.vertices {
            let v = v.renumbered(v.number() + vertex_offset);
            self.vertices
                .push(if factor == 1.0 { v } else { v.scaled(factor) });
        }
        self.cells.reserve(other.cells.len());
        for c in &other.cells {
            self.cells.push(c.shifted(c.number() + cell_offset, vertex_offset));
        }
        self.localizer = OnceCell::new();
        debug!(
            "merged mesh: {} vertices, {} cells",
            self.vertices.len(),
            self.cells.len()
        );
        Ok(())
    }

    pub(crate) fn hash_into(&self, hasher: &mut StableHasher) {
        let coords: Vec<f64> = self
            .vertices
            .iter()
            .flat_map(|v| v.position())
            .collect();
        let vertex_meta: Vec<u64> = self
            .vertices
            .iter()
            .flat_map(|v| [v.label() as u64, v.dimension() as u64])
            .collect();
        let mut cell_words = Vec::with_capacity(self.cells.len() * 6);
        for c in &self.cells {
            cell_words.push(u64::from(c.geometry().tag()));
            cell_words.push(c.label() as u64);
            cell_words.extend(c.vertices().iter().map(|&v| v as u64));
        }
        hasher
            .write_str("unstructured")
            .write_f64s(&coords)
            .write_u64s(&vertex_meta)
            .write_u64s(&cell_words)
            .write_str(self.unit.as_ref().map(Unit::name).unwrap_or(""));
    }
}

impl PartialEq for UnstructuredMesh {
    fn eq(&self, other: &Self) -> bool {
        self.vertices == other.vertices && self.cells == other.cells && self.unit == other.unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::cell_type::CellGeometry;

    fn two_triangles() -> UnstructuredMesh {
        let coords = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        let vertices = coords
            .iter()
            .enumerate()
            .map(|(i, c)| Vertex::new(i, 10 + i as i64, c).unwrap())
            .collect();
        let cells = vec![
            Cell::new(0, 100, CellGeometry::TriangleLinear, vec![0, 1, 2]).unwrap(),
            Cell::new(1, 101, CellGeometry::TriangleLinear, vec![0, 2, 3]).unwrap(),
        ];
        UnstructuredMesh::setup(vertices, cells, None).unwrap()
    }

    #[test]
    fn setup_rejects_bad_connectivity() {
        let vertices = vec![Vertex::new(0, 0, &[0.0, 0.0]).unwrap()];
        let cells = vec![Cell::new(0, 0, CellGeometry::TriangleLinear, vec![0, 1, 2]).unwrap()];
        let err = UnstructuredMesh::setup(vertices, cells, None).unwrap_err();
        assert!(matches!(
            err,
            MeshFieldError::InvalidConnectivity {
                cell: 0,
                vertex: 1,
                vertex_count: 1
            }
        ));
    }

    #[test]
    fn setup_rejects_time_unit() {
        let err = UnstructuredMesh::setup(vec![], vec![], Some(Unit::second())).unwrap_err();
        assert!(err.is_unit_error());
    }

    #[test]
    fn shared_edge_goes_to_first_cell() {
        let mesh = two_triangles();
        let (cell, _) = mesh.locate(&[0.5, 0.5, 0.0], 1e-9).unwrap();
        assert_eq!(cell, 0);
        let (cell, _) = mesh.locate(&[0.2, 0.7, 0.0], 1e-9).unwrap();
        assert_eq!(cell, 1);
        assert!(matches!(
            mesh.locate(&[1.5, 0.5, 0.0], 1e-9),
            Err(MeshFieldError::OutOfDomain { .. })
        ));
    }

    #[test]
    fn merge_concatenates() {
        let mut a = two_triangles();
        let b = two_triangles();
        a.merge(&b).unwrap();
        assert_eq!(a.number_of_vertices(), 8);
        assert_eq!(a.number_of_cells(), 4);
        assert_eq!(a.cell(3).unwrap().vertices(), &[4, 6, 7]);
        assert_eq!(a.cell(3).unwrap().label(), 101);
        assert_eq!(a.vertex_label_to_number(12), Some(2));
        assert_eq!(a.cell_label_to_number(101), Some(1));
        // relocating after merge sees the new cells
        assert_eq!(a.locate(&[0.2, 0.7, 0.0], 1e-9).unwrap().0, 1);
    }
}
