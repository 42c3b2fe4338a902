//! Geometry type tags for mesh cells.

use serde::{Deserialize, Serialize};

/// Closed set of supported cell geometries (all with linear/multilinear shape functions).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum CellGeometry {
    /// 2D simplex, 3 vertices, barycentric natural coordinates.
    TriangleLinear,
    /// 2D tensor-product cell, 4 vertices, bilinear.
    QuadrilateralLinear,
    /// 3D simplex, 4 vertices, barycentric natural coordinates.
    TetrahedronLinear,
    /// 3D tensor-product cell (brick), 8 vertices, trilinear.
    HexahedronLinear,
}

impl CellGeometry {
    /// Topological (and reference-element) dimension of the cell.
    pub fn dimension(self) -> usize {
        match self {
            CellGeometry::TriangleLinear | CellGeometry::QuadrilateralLinear => 2,
            CellGeometry::TetrahedronLinear | CellGeometry::HexahedronLinear => 3,
        }
    }

    /// Number of vertices the connectivity of this cell must list.
    pub fn vertex_count(self) -> usize {
        match self {
            CellGeometry::TriangleLinear => 3,
            CellGeometry::QuadrilateralLinear => 4,
            CellGeometry::TetrahedronLinear => 4,
            CellGeometry::HexahedronLinear => 8,
        }
    }

    /// True for simplices, whose inverse mapping is a direct linear solve.
    pub fn is_simplex(self) -> bool {
        matches!(
            self,
            CellGeometry::TriangleLinear | CellGeometry::TetrahedronLinear
        )
    }

    /// Legacy VTK cell type code.
    pub fn vtk_code(self) -> i32 {
        match self {
            CellGeometry::TriangleLinear => 5,
            CellGeometry::QuadrilateralLinear => 9,
            CellGeometry::TetrahedronLinear => 10,
            CellGeometry::HexahedronLinear => 12,
        }
    }

    pub fn from_vtk_code(code: i32) -> Option<Self> {
        match code {
            5 => Some(CellGeometry::TriangleLinear),
            9 => Some(CellGeometry::QuadrilateralLinear),
            10 => Some(CellGeometry::TetrahedronLinear),
            12 => Some(CellGeometry::HexahedronLinear),
            _ => None,
        }
    }

    /// XDMF mixed-topology cell code.
    pub fn xdmf_code(self) -> i64 {
        match self {
            CellGeometry::TriangleLinear => 4,
            CellGeometry::QuadrilateralLinear => 5,
            CellGeometry::TetrahedronLinear => 6,
            CellGeometry::HexahedronLinear => 9,
        }
    }

    pub fn from_xdmf_code(code: i64) -> Option<Self> {
        match code {
            4 => Some(CellGeometry::TriangleLinear),
            5 => Some(CellGeometry::QuadrilateralLinear),
            6 => Some(CellGeometry::TetrahedronLinear),
            9 => Some(CellGeometry::HexahedronLinear),
            _ => None,
        }
    }

    /// Stable one-byte tag used in digests.
    pub(crate) fn tag(self) -> u8 {
        match self {
            CellGeometry::TriangleLinear => 1,
            CellGeometry::QuadrilateralLinear => 2,
            CellGeometry::TetrahedronLinear => 3,
            CellGeometry::HexahedronLinear => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for g in [
            CellGeometry::TriangleLinear,
            CellGeometry::QuadrilateralLinear,
            CellGeometry::TetrahedronLinear,
            CellGeometry::HexahedronLinear,
        ] {
            assert_eq!(CellGeometry::from_vtk_code(g.vtk_code()), Some(g));
            assert_eq!(CellGeometry::from_xdmf_code(g.xdmf_code()), Some(g));
        }
        assert_eq!(CellGeometry::from_vtk_code(3), None);
    }
}
