//! Bounding-box prefilter for point location in unstructured meshes.

use log::debug;

use crate::geometry::bbox::BBox;
use crate::geometry::metrics;
use crate::mesh::unstructured::UnstructuredMesh;
use crate::mesh_error::MeshFieldError;

/// Per-cell bounding boxes plus the global box.
///
/// Candidates are always visited in cell index order, so the first cell that
/// contains a point (within `eps`) wins when several share a face or edge.
#[derive(Clone, Debug)]
pub struct CellLocalizer {
    cell_boxes: Vec<BBox>,
    bounds: BBox,
}

impl CellLocalizer {
    pub fn build(mesh: &UnstructuredMesh) -> Self {
        let cell_boxes: Vec<BBox> = mesh
            .cells()
            .iter()
            .map(|cell| {
                BBox::from_points(
                    cell.vertices()
                        .iter()
                        .map(|&v| mesh.vertices()[v].position()),
                )
            })
            .collect();
        let bounds = cell_boxes
            .iter()
            .fold(BBox::empty(), |acc, b| acc.merge(b));
        debug!("built cell localizer over {} cells", cell_boxes.len());
        Self { cell_boxes, bounds }
    }

    pub fn bounds(&self) -> &BBox {
        &self.bounds
    }

    /// Indices of cells whose padded box contains `point`, ascending.
    pub fn candidates<'a>(
        &'a self,
        point: &'a [f64; 3],
        eps: f64,
    ) -> impl Iterator<Item = usize> + 'a {
        let floor = 1e-12 * self.bounds.extent();
        self.cell_boxes
            .iter()
            .enumerate()
            .filter(move |(_, b)| b.contains_point(point, eps * b.extent() + floor))
            .map(|(i, _)| i)
    }

    /// Find the first cell containing `point` and its natural coordinate.
    pub fn locate(
        &self,
        mesh: &UnstructuredMesh,
        point: &[f64; 3],
        eps: f64,
    ) -> Result<(usize, Vec<f64>), MeshFieldError> {
        let pad = eps * self.bounds.extent() + 1e-12 * self.bounds.extent();
        if self.bounds.is_empty() || !self.bounds.contains_point(point, pad) {
            return Err(out_of_domain(point, eps));
        }
        for index in self.candidates(point, eps) {
            let cell = &mesh.cells()[index];
            let coords = mesh.cell_coordinates(index)?;
            if let Some(natural) =
                metrics::physical_to_reference(cell.geometry(), &coords, point, eps)?
            {
                if metrics::contains(cell.geometry(), &natural, eps) {
                    return Ok((index, natural));
                }
            }
        }
        Err(out_of_domain(point, eps))
    }
}

pub(crate) fn out_of_domain(point: &[f64; 3], eps: f64) -> MeshFieldError {
    MeshFieldError::OutOfDomain {
        position: point.to_vec(),
        eps,
    }
}
