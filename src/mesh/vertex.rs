//! Mesh vertices.

use serde::{Deserialize, Serialize};

use crate::mesh_error::MeshFieldError;

/// A mesh vertex: local `number`, a free-form `label` and 1 to 3 coordinates.
///
/// Coordinates are stored padded to three components; [`Vertex::coords`]
/// returns only the significant ones.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    number: usize,
    label: i64,
    position: [f64; 3],
    dim: u8,
}

impl Vertex {
    pub fn new(number: usize, label: i64, coords: &[f64]) -> Result<Self, MeshFieldError> {
        if coords.is_empty() || coords.len() > 3 {
            return Err(MeshFieldError::InvalidGeometry(format!(
                "vertex {number} has {} coordinates; expected 1 to 3",
                coords.len()
            )));
        }
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(MeshFieldError::InvalidGeometry(format!(
                "vertex {number} has non-finite coordinates {coords:?}"
            )));
        }
        let mut position = [0.0; 3];
        position[..coords.len()].copy_from_slice(coords);
        Ok(Self {
            number,
            label,
            position,
            dim: coords.len() as u8,
        })
    }

    pub(crate) fn from_padded(number: usize, label: i64, position: [f64; 3], dim: u8) -> Self {
        Self {
            number,
            label,
            position,
            dim,
        }
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub fn label(&self) -> i64 {
        self.label
    }

    /// Significant coordinates (length 1 to 3).
    pub fn coords(&self) -> &[f64] {
        &self.position[..self.dim as usize]
    }

    /// Coordinates padded with zeros to 3D.
    pub fn position(&self) -> [f64; 3] {
        self.position
    }

    pub fn dimension(&self) -> usize {
        self.dim as usize
    }

    pub(crate) fn renumbered(&self, number: usize) -> Self {
        Self { number, ..self.clone() }
    }

    pub(crate) fn scaled(&self, factor: f64) -> Self {
        let mut out = self.clone();
        for c in &mut out.position {
            *c *= factor;
        }
        out
    }
}
