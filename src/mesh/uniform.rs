//! Structured uniform grids with computed geometry.

use serde::{Deserialize, Serialize};

use crate::geometry::bbox::BBox;
use crate::geometry::cell_type::CellGeometry;
use crate::mesh::cell::Cell;
use crate::mesh::localizer::out_of_domain;
use crate::mesh::unstructured::UnstructuredMesh;
use crate::mesh::vertex::Vertex;
use crate::mesh_error::MeshFieldError;
use crate::stable_hash::StableHasher;
use crate::units::Unit;

/// Regular grid of `nx * ny * nz` vertices; `nz == 1` makes it 2D.
///
/// Vertex `i` sits at grid index `(ix, iy, iz)` with
/// `i = ix + nx * (iy + ny * iz)`; cells are numbered the same way over the
/// `(nx - 1) * (ny - 1) * (nz - 1)` cell grid. Cells are quadrilaterals in 2D
/// and hexahedra in 3D, with connectivity in reference-element order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UniformGrid {
    dims: [usize; 3],
    spacing: [f64; 3],
    origin: [f64; 3],
    unit: Option<Unit>,
}

impl UniformGrid {
    pub fn new(
        dims: [usize; 3],
        spacing: [f64; 3],
        origin: [f64; 3],
        unit: Option<Unit>,
    ) -> Result<Self, MeshFieldError> {
        if dims[0] < 2 || dims[1] < 2 || dims[2] == 0 {
            return Err(MeshFieldError::InvalidGeometry(format!(
                "uniform grid needs at least 2x2x1 vertices, got {dims:?}"
            )));
        }
        if dims.iter().try_fold(1usize, |n, &d| n.checked_mul(d)).is_none() {
            return Err(MeshFieldError::InvalidGeometry(format!(
                "uniform grid {dims:?} has too many vertices"
            )));
        }
        let axes = if dims[2] > 1 { 3 } else { 2 };
        if spacing[..axes].iter().any(|h| !(h.is_finite() && *h > 0.0)) {
            return Err(MeshFieldError::InvalidGeometry(format!(
                "uniform grid spacing must be positive, got {spacing:?}"
            )));
        }
        if let Some(unit) = &unit {
            if !unit.is_length() {
                return Err(MeshFieldError::Unit(format!(
                    "mesh unit `{unit}` is not a length"
                )));
            }
        }
        Ok(Self {
            dims,
            spacing,
            origin,
            unit,
        })
    }

    pub fn new_2d(
        dims: [usize; 2],
        spacing: [f64; 2],
        origin: [f64; 2],
        unit: Option<Unit>,
    ) -> Result<Self, MeshFieldError> {
        Self::new(
            [dims[0], dims[1], 1],
            [spacing[0], spacing[1], 1.0],
            [origin[0], origin[1], 0.0],
            unit,
        )
    }

    /// Re-run construction checks, e.g. on a deserialized grid.
    pub(crate) fn validated(self) -> Result<Self, MeshFieldError> {
        Self::new(self.dims, self.spacing, self.origin, self.unit)
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    pub fn unit(&self) -> Option<&Unit> {
        self.unit.as_ref()
    }

    pub fn dimension(&self) -> usize {
        if self.dims[2] > 1 { 3 } else { 2 }
    }

    pub fn cell_geometry(&self) -> CellGeometry {
        if self.dimension() == 3 {
            CellGeometry::HexahedronLinear
        } else {
            CellGeometry::QuadrilateralLinear
        }
    }

    pub fn number_of_vertices(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn number_of_cells(&self) -> usize {
        self.cell_dims().iter().product()
    }

    fn cell_dims(&self) -> [usize; 3] {
        [
            self.dims[0] - 1,
            self.dims[1] - 1,
            if self.dims[2] > 1 { self.dims[2] - 1 } else { 1 },
        ]
    }

    pub fn vertex_index(&self, ijk: [usize; 3]) -> usize {
        ijk[0] + self.dims[0] * (ijk[1] + self.dims[1] * ijk[2])
    }

    pub fn vertex_ijk(&self, i: usize) -> [usize; 3] {
        let nx = self.dims[0];
        let ny = self.dims[1];
        [i % nx, (i / nx) % ny, i / (nx * ny)]
    }

    pub fn vertex(&self, i: usize) -> Result<Vertex, MeshFieldError> {
        let len = self.number_of_vertices();
        if i >= len {
            return Err(MeshFieldError::IndexOutOfRange {
                kind: "vertex",
                index: i,
                len,
            });
        }
        let ijk = self.vertex_ijk(i);
        let mut position = [0.0; 3];
        for k in 0..3 {
            position[k] = self.origin[k] + ijk[k] as f64 * self.spacing[k];
        }
        if self.dimension() == 2 {
            position[2] = self.origin[2];
        }
        Ok(Vertex::from_padded(
            i,
            i as i64,
            position,
            self.dimension() as u8,
        ))
    }

    pub fn cell(&self, i: usize) -> Result<Cell, MeshFieldError> {
        let len = self.number_of_cells();
        if i >= len {
            return Err(MeshFieldError::IndexOutOfRange {
                kind: "cell",
                index: i,
                len,
            });
        }
        let [cx, cy, _] = self.cell_dims();
        let ijk = [i % cx, (i / cx) % cy, i / (cx * cy)];
        let nx = self.dims[0];
        let base = self.vertex_index(ijk);
        let mut vertices = vec![base, base + 1, base + nx + 1, base + nx];
        if self.dimension() == 3 {
            let layer = nx * self.dims[1];
            vertices.extend([base + layer, base + layer + 1, base + layer + nx + 1, base + layer + nx]);
        }
        Cell::new(i, i as i64, self.cell_geometry(), vertices)
    }

    pub fn bbox(&self) -> BBox {
        let mut max = self.origin;
        for k in 0..self.dimension() {
            max[k] += (self.dims[k] - 1) as f64 * self.spacing[k];
        }
        BBox {
            min: self.origin,
            max,
        }
    }

    /// Locate by index arithmetic; no cell search.
    ///
    /// A point on a face shared by two cells goes to the lower-numbered one,
    /// matching the first-in-order rule of unstructured meshes.
    pub fn locate(&self, point: &[f64; 3], eps: f64) -> Result<(usize, Vec<f64>), MeshFieldError> {
        let dim = self.dimension();
        let cell_dims = self.cell_dims();
        if dim == 2 {
            let h = self.spacing[0].max(self.spacing[1]);
            if (point[2] - self.origin[2]).abs() > eps.max(1e-12) * h {
                return Err(out_of_domain(point, eps));
            }
        }
        let mut ijk = [0usize; 3];
        let mut natural = Vec::with_capacity(dim);
        for k in 0..dim {
            let t = (point[k] - self.origin[k]) / self.spacing[k];
            let n = cell_dims[k] as f64;
            if !t.is_finite() || t < -eps || t > n + eps {
                return Err(out_of_domain(point, eps));
            }
            let mut c = (t.floor().max(0.0) as usize).min(cell_dims[k] - 1);
            let mut local = t - c as f64;
            if c > 0 && local <= eps {
                c -= 1;
                local += 1.0;
            }
            ijk[k] = c;
            natural.push(local);
        }
        let index = ijk[0] + cell_dims[0] * (ijk[1] + cell_dims[1] * ijk[2]);
        Ok((index, natural))
    }

    /// Explicit vertex/cell representation of the same grid.
    pub fn to_unstructured(&self) -> Result<UnstructuredMesh, MeshFieldError> {
        let vertices = (0..self.number_of_vertices())
            .map(|i| self.vertex(i))
            .collect::<Result<Vec<_>, _>>()?;
        let cells = (0..self.number_of_cells())
            .map(|i| self.cell(i))
            .collect::<Result<Vec<_>, _>>()?;
        UnstructuredMesh::setup(vertices, cells, self.unit.clone())
    }

    pub(crate) fn hash_into(&self, hasher: &mut StableHasher) {
        let dims: Vec<u64> = self.dims.iter().map(|&d| d as u64).collect();
        hasher
            .write_str("uniform")
            .write_u64s(&dims)
            .write_f64s(&self.spacing)
            .write_f64s(&self.origin)
            .write_str(self.unit.as_ref().map(Unit::name).unwrap_or(""));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbering_and_connectivity() {
        let grid = UniformGrid::new([3, 2, 2], [1.0, 2.0, 3.0], [0.0; 3], None).unwrap();
        assert_eq!(grid.number_of_vertices(), 12);
        assert_eq!(grid.number_of_cells(), 2);
        assert_eq!(grid.vertex_ijk(grid.vertex_index([2, 1, 1])), [2, 1, 1]);
        let v = grid.vertex(11).unwrap();
        assert_eq!(v.coords(), &[2.0, 2.0, 3.0]);
        let c = grid.cell(1).unwrap();
        assert_eq!(c.vertices(), &[1, 2, 5, 4, 7, 8, 11, 10]);
        assert_eq!(c.geometry(), CellGeometry::HexahedronLinear);
    }

    #[test]
    fn locate_by_index_arithmetic() {
        let grid = UniformGrid::new_2d([3, 3], [1.0, 1.0], [0.0, 0.0], None).unwrap();
        let (cell, natural) = grid.locate(&[1.5, 0.25, 0.0], 1e-9).unwrap();
        assert_eq!(cell, 1);
        assert!((natural[0] - 0.5).abs() < 1e-12);
        assert!((natural[1] - 0.25).abs() < 1e-12);
        // shared edge x = 1 goes to the lower cell
        let (cell, natural) = grid.locate(&[1.0, 0.5, 0.0], 1e-9).unwrap();
        assert_eq!(cell, 0);
        assert!((natural[0] - 1.0).abs() < 1e-12);
        assert!(grid.locate(&[2.5, 0.5, 0.0], 1e-9).is_err());
        assert!(grid.locate(&[0.5, 0.5, 1.0], 1e-9).is_err());
    }

    #[test]
    fn unstructured_conversion_agrees() {
        let grid = UniformGrid::new([3, 3, 3], [0.5; 3], [1.0, 1.0, 1.0], None).unwrap();
        let mesh = grid.to_unstructured().unwrap();
        let p = [1.7, 1.2, 1.9];
        let (a, _) = grid.locate(&p, 1e-9).unwrap();
        let (b, _) = mesh.locate(&p, 1e-9).unwrap();
        assert_eq!(a, b);
    }
}
