//! Meshes: unstructured vertex/cell containers and uniform grids, optionally
//! backed by a heavy reference into a container file.

pub mod cell;
pub mod localizer;
pub mod uniform;
pub mod unstructured;
pub mod vertex;

use log::debug;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::geometry::bbox::BBox;
use crate::heavy::{HeavyLoad, HeavyRef, Lazy};
use crate::io::container::Container;
use crate::mesh_error::MeshFieldError;
use crate::stable_hash::StableHasher;
use crate::units::Unit;

pub use cell::Cell;
pub use uniform::UniformGrid;
pub use unstructured::UnstructuredMesh;
pub use vertex::Vertex;

/// The two in-memory mesh representations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MeshKind {
    Unstructured(UnstructuredMesh),
    Uniform(UniformGrid),
}

impl MeshKind {
    pub fn number_of_vertices(&self) -> usize {
        match self {
            MeshKind::Unstructured(m) => m.number_of_vertices(),
            MeshKind::Uniform(g) => g.number_of_vertices(),
        }
    }

    pub fn number_of_cells(&self) -> usize {
        match self {
            MeshKind::Unstructured(m) => m.number_of_cells(),
            MeshKind::Uniform(g) => g.number_of_cells(),
        }
    }

    pub fn vertex(&self, i: usize) -> Result<Vertex, MeshFieldError> {
        match self {
            MeshKind::Unstructured(m) => m.vertex(i).cloned(),
            MeshKind::Uniform(g) => g.vertex(i),
        }
    }

    pub fn cell(&self, i: usize) -> Result<Cell, MeshFieldError> {
        match self {
            MeshKind::Unstructured(m) => m.cell(i).cloned(),
            MeshKind::Uniform(g) => g.cell(i),
        }
    }

    pub fn unit(&self) -> Option<&Unit> {
        match self {
            MeshKind::Unstructured(m) => m.unit(),
            MeshKind::Uniform(g) => g.unit(),
        }
    }

    pub fn dimension(&self) -> usize {
        match self {
            MeshKind::Unstructured(m) => m.dimension(),
            MeshKind::Uniform(g) => g.dimension(),
        }
    }

    pub fn bbox(&self) -> BBox {
        match self {
            MeshKind::Unstructured(m) => m.bbox(),
            MeshKind::Uniform(g) => g.bbox(),
        }
    }

    pub fn locate(&self, point: &[f64; 3], eps: f64) -> Result<(usize, Vec<f64>), MeshFieldError> {
        match self {
            MeshKind::Unstructured(m) => m.locate(point, eps),
            MeshKind::Uniform(g) => g.locate(point, eps),
        }
    }

    pub fn to_unstructured(&self) -> Result<UnstructuredMesh, MeshFieldError> {
        match self {
            MeshKind::Unstructured(m) => Ok(m.clone()),
            MeshKind::Uniform(g) => g.to_unstructured(),
        }
    }

    /// Stable FNV-1a content digest of geometry, connectivity, labels and unit.
    pub fn content_digest(&self) -> u64 {
        let mut hasher = StableHasher::new();
        match self {
            MeshKind::Unstructured(m) => m.hash_into(&mut hasher),
            MeshKind::Uniform(g) => g.hash_into(&mut hasher),
        }
        hasher.finish()
    }
}

impl HeavyLoad for MeshKind {
    fn load(source: &HeavyRef) -> Result<Self, MeshFieldError> {
        Container::new(&source.path).read_mesh(&source.group)
    }
}

/// A mesh shared by fields: resident or lazily loaded from a container group.
///
/// Construction is the only mutation besides [`Mesh::merge`]; geometry
/// queries on a heavy mesh load it once and keep the copy. The content digest
/// is memoized per instance.
#[derive(Clone, Debug)]
pub struct Mesh {
    data: Lazy<MeshKind>,
    digest: OnceCell<u64>,
}

impl Mesh {
    /// Build and validate an unstructured mesh.
    pub fn unstructured(
        vertices: Vec<Vertex>,
        cells: Vec<Cell>,
        unit: Option<Unit>,
    ) -> Result<Self, MeshFieldError> {
        Ok(UnstructuredMesh::setup(vertices, cells, unit)?.into())
    }

    pub fn from_heavy(source: HeavyRef) -> Self {
        Self {
            data: Lazy::deferred(source),
            digest: OnceCell::new(),
        }
    }

    /// Heavy mesh whose digest is already known, so deduplication does not
    /// force a load.
    pub(crate) fn from_heavy_with_digest(source: HeavyRef, digest: u64) -> Self {
        Self {
            data: Lazy::deferred(source),
            digest: OnceCell::with_value(digest),
        }
    }

    /// The materialized representation, loading a heavy mesh on first call.
    pub fn kind(&self) -> Result<&MeshKind, MeshFieldError> {
        self.data.get()
    }

    pub fn is_loaded(&self) -> bool {
        self.data.is_loaded()
    }

    pub fn heavy_source(&self) -> Option<&HeavyRef> {
        self.data.source()
    }

    pub fn number_of_vertices(&self) -> Result<usize, MeshFieldError> {
        Ok(self.kind()?.number_of_vertices())
    }

    pub fn number_of_cells(&self) -> Result<usize, MeshFieldError> {
        Ok(self.kind()?.number_of_cells())
    }

    pub fn vertex(&self, i: usize) -> Result<Vertex, MeshFieldError> {
        self.kind()?.vertex(i)
    }

    pub fn cell(&self, i: usize) -> Result<Cell, MeshFieldError> {
        self.kind()?.cell(i)
    }

    /// All cells in index order.
    pub fn cells(&self) -> Result<impl Iterator<Item = Cell> + '_, MeshFieldError> {
        let kind = self.kind()?;
        Ok((0..kind.number_of_cells()).filter_map(move |i| kind.cell(i).ok()))
    }

    /// All vertices in index order.
    pub fn vertices(&self) -> Result<impl Iterator<Item = Vertex> + '_, MeshFieldError> {
        let kind = self.kind()?;
        Ok((0..kind.number_of_vertices()).filter_map(move |i| kind.vertex(i).ok()))
    }

    pub fn unit(&self) -> Result<Option<&Unit>, MeshFieldError> {
        Ok(self.kind()?.unit())
    }

    pub fn dimension(&self) -> Result<usize, MeshFieldError> {
        Ok(self.kind()?.dimension())
    }

    pub fn bbox(&self) -> Result<BBox, MeshFieldError> {
        Ok(self.kind()?.bbox())
    }

    /// First cell containing `point` within `eps`, and the natural coordinate.
    pub fn locate(&self, point: &[f64; 3], eps: f64) -> Result<(usize, Vec<f64>), MeshFieldError> {
        self.kind()?.locate(point, eps)
    }

    pub fn vertex_label_to_number(&self, label: i64) -> Result<Option<usize>, MeshFieldError> {
        Ok(match self.kind()? {
            MeshKind::Unstructured(m) => m.vertex_label_to_number(label),
            MeshKind::Uniform(g) => {
                usize::try_from(label).ok().filter(|&i| i < g.number_of_vertices())
            }
        })
    }

    pub fn cell_label_to_number(&self, label: i64) -> Result<Option<usize>, MeshFieldError> {
        Ok(match self.kind()? {
            MeshKind::Unstructured(m) => m.cell_label_to_number(label),
            MeshKind::Uniform(g) => usize::try_from(label).ok().filter(|&i| i < g.number_of_cells()),
        })
    }

    pub fn to_unstructured(&self) -> Result<UnstructuredMesh, MeshFieldError> {
        self.kind()?.to_unstructured()
    }

    /// Memoized content digest.
    pub fn digest(&self) -> Result<u64, MeshFieldError> {
        self.digest
            .get_or_try_init(|| -> Result<u64, MeshFieldError> {
                Ok(self.kind()?.content_digest())
            })
            .copied()
    }

    /// Append `other` after this mesh (see [`UnstructuredMesh::merge`]).
    ///
    /// A uniform grid is converted to its unstructured form first.
    pub fn merge(&mut self, other: &Mesh) -> Result<(), MeshFieldError> {
        let theirs = other.to_unstructured()?;
        let data = self.data.get_mut()?;
        if let MeshKind::Uniform(grid) = data {
            debug!("converting uniform grid to unstructured for merge");
            let converted = grid.to_unstructured()?;
            *data = MeshKind::Unstructured(converted);
        }
        if let MeshKind::Unstructured(mine) = data {
            mine.merge(&theirs)?;
        }
        self.digest = OnceCell::new();
        Ok(())
    }
}

impl From<MeshKind> for Mesh {
    fn from(kind: MeshKind) -> Self {
        Self {
            data: Lazy::resident(kind),
            digest: OnceCell::new(),
        }
    }
}

impl From<UnstructuredMesh> for Mesh {
    fn from(mesh: UnstructuredMesh) -> Self {
        MeshKind::Unstructured(mesh).into()
    }
}

impl From<UniformGrid> for Mesh {
    fn from(grid: UniformGrid) -> Self {
        MeshKind::Uniform(grid).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::cell_type::CellGeometry;

    fn triangle(offset: f64) -> Mesh {
        let vertices = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]
            .iter()
            .enumerate()
            .map(|(i, c)| Vertex::new(i, i as i64, &[c[0] + offset, c[1]]).unwrap())
            .collect();
        let cells = vec![Cell::new(0, 0, CellGeometry::TriangleLinear, vec![0, 1, 2]).unwrap()];
        Mesh::unstructured(vertices, cells, None).unwrap()
    }

    #[test]
    fn digest_tracks_content() {
        let a = triangle(0.0);
        let b = triangle(0.0);
        let c = triangle(1.0);
        assert_eq!(a.digest().unwrap(), b.digest().unwrap());
        assert_ne!(a.digest().unwrap(), c.digest().unwrap());
    }

    #[test]
    fn merge_resets_digest_and_converts_grids() {
        let grid = UniformGrid::new_2d([2, 2], [1.0, 1.0], [5.0, 0.0], None).unwrap();
        let mut mesh: Mesh = grid.into();
        let before = mesh.digest().unwrap();
        mesh.merge(&triangle(0.0)).unwrap();
        assert_ne!(mesh.digest().unwrap(), before);
        assert_eq!(mesh.number_of_vertices().unwrap(), 7);
        assert_eq!(mesh.number_of_cells().unwrap(), 2);
        assert!(matches!(mesh.kind().unwrap(), MeshKind::Unstructured(_)));
        assert_eq!(mesh.locate(&[0.2, 0.2, 0.0], 1e-9).unwrap().0, 1);
    }

    #[test]
    fn uniform_labels_are_numbers() {
        let mesh: Mesh = UniformGrid::new_2d([3, 3], [1.0, 1.0], [0.0, 0.0], None)
            .unwrap()
            .into();
        assert_eq!(mesh.vertex_label_to_number(8).unwrap(), Some(8));
        assert_eq!(mesh.vertex_label_to_number(9).unwrap(), None);
        assert_eq!(mesh.cell_label_to_number(-1).unwrap(), None);
        assert_eq!(mesh.cells().unwrap().count(), 4);
    }
}
