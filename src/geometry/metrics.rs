//! Shape functions, Jacobians and inverse mappings for mesh cells.
//!
//! The reference elements use the following vertex ordering:
//! - Triangle: `[v0, v1, v2]` with `(r, s)` in the unit right triangle.
//! - Quadrilateral: `[v0, v1, v2, v3]` with `(r, s)` in `[0, 1]^2`.
//! - Tetrahedron: `[v0, v1, v2, v3]` with `(r, s, t)` in the unit tetrahedron.
//! - Hexahedron: `[v0, v1, v2, v3, v4, v5, v6, v7]` with `(r, s, t)` in `[0, 1]^3`.
//!
//! Physical coordinates are always handled as `[f64; 3]`; 1D/2D vertices are
//! padded with zeros. 2D cells may be embedded in 3D, in which case the
//! inverse mapping also checks that the point lies in the cell's plane.

use crate::geometry::cell_type::CellGeometry;
use crate::mesh_error::MeshFieldError;

/// Relative tolerance for degeneracy checks.
const EPS: f64 = 1e-12;
/// Newton iteration cap for multilinear inverse mappings.
const MAX_NEWTON_ITERATIONS: usize = 25;

/// Default natural-coordinate tolerance for point location.
pub const DEFAULT_EPS: f64 = 1e-9;

/// Shape-function values and reference gradients at a natural coordinate.
///
/// Returns `(N_i, dN_i/dξ_j)` with one gradient row per vertex.
pub fn shape_functions(
    geometry: CellGeometry,
    natural: &[f64],
) -> Result<(Vec<f64>, Vec<Vec<f64>>), MeshFieldError> {
    if natural.len() != geometry.dimension() {
        return Err(MeshFieldError::InvalidGeometry(format!(
            "{geometry:?} natural coordinate must have {} components, got {}",
            geometry.dimension(),
            natural.len()
        )));
    }
    match geometry {
        CellGeometry::TriangleLinear => {
            let r = natural[0];
            let s = natural[1];
            let weights = vec![1.0 - r - s, r, s];
            let grads = vec![vec![-1.0, -1.0], vec![1.0, 0.0], vec![0.0, 1.0]];
            Ok((weights, grads))
        }
        CellGeometry::QuadrilateralLinear => {
            let r = natural[0];
            let s = natural[1];
            let weights = vec![(1.0 - r) * (1.0 - s), r * (1.0 - s), r * s, (1.0 - r) * s];
            let grads = vec![
                vec![-(1.0 - s), -(1.0 - r)],
                vec![1.0 - s, -r],
                vec![s, r],
                vec![-s, 1.0 - r],
            ];
            Ok((weights, grads))
        }
        CellGeometry::TetrahedronLinear => {
            let r = natural[0];
            let s = natural[1];
            let t = natural[2];
            let weights = vec![1.0 - r - s - t, r, s, t];
            let grads = vec![
                vec![-1.0, -1.0, -1.0],
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.0, 0.0, 1.0],
            ];
            Ok((weights, grads))
        }
        CellGeometry::HexahedronLinear => {
            let r = natural[0];
            let s = natural[1];
            let t = natural[2];
            let rm = 1.0 - r;
            let sm = 1.0 - s;
            let tm = 1.0 - t;
            let weights = vec![
                rm * sm * tm,
                r * sm * tm,
                r * s * tm,
                rm * s * tm,
                rm * sm * t,
                r * sm * t,
                r * s * t,
                rm * s * t,
            ];
            let grads = vec![
                vec![-sm * tm, -rm * tm, -rm * sm],
                vec![sm * tm, -r * tm, -r * sm],
                vec![s * tm, r * tm, -r * s],
                vec![-s * tm, rm * tm, -rm * s],
                vec![-sm * t, -rm * t, rm * sm],
                vec![sm * t, -r * t, r * sm],
                vec![s * t, r * t, r * s],
                vec![-s * t, rm * t, rm * s],
            ];
            Ok((weights, grads))
        }
    }
}

/// Natural coordinate of the reference-element centroid.
pub fn reference_centroid(geometry: CellGeometry) -> Vec<f64> {
    match geometry {
        CellGeometry::TriangleLinear => vec![1.0 / 3.0; 2],
        CellGeometry::TetrahedronLinear => vec![0.25; 3],
        CellGeometry::QuadrilateralLinear => vec![0.5; 2],
        CellGeometry::HexahedronLinear => vec![0.5; 3],
    }
}

/// Map a natural coordinate to physical coordinates.
pub fn reference_to_physical(
    geometry: CellGeometry,
    vertices: &[[f64; 3]],
    natural: &[f64],
) -> Result<[f64; 3], MeshFieldError> {
    check_vertex_count(geometry, vertices)?;
    let (weights, _) = shape_functions(geometry, natural)?;
    let mut out = [0.0; 3];
    for (weight, vertex) in weights.iter().zip(vertices.iter()) {
        out[0] += weight * vertex[0];
        out[1] += weight * vertex[1];
        out[2] += weight * vertex[2];
    }
    Ok(out)
}

/// Compute the Jacobian matrix `dx/dξ` at a natural coordinate.
///
/// The returned matrix is stored row-major with shape `(3, cell_dim)`.
pub fn jacobian(
    geometry: CellGeometry,
    vertices: &[[f64; 3]],
    natural: &[f64],
) -> Result<Vec<f64>, MeshFieldError> {
    check_vertex_count(geometry, vertices)?;
    let (_, grads) = shape_functions(geometry, natural)?;
    let dim = geometry.dimension();
    let mut out = vec![0.0; 3 * dim];
    for (vertex, grad) in vertices.iter().zip(grads.iter()) {
        for ref_dim in 0..dim {
            out[ref_dim] += vertex[0] * grad[ref_dim];
            out[dim + ref_dim] += vertex[1] * grad[ref_dim];
            out[2 * dim + ref_dim] += vertex[2] * grad[ref_dim];
        }
    }
    Ok(out)
}

/// Determinant of the isoparametric mapping at a natural coordinate.
///
/// Volume cells return the signed 3x3 determinant. Planar cells lying in the
/// `xy` plane return the signed 2x2 determinant; planar cells embedded in 3D
/// return the (unsigned) surface measure `|J_r x J_s|`.
pub fn jacobian_det(
    geometry: CellGeometry,
    vertices: &[[f64; 3]],
    natural: &[f64],
) -> Result<f64, MeshFieldError> {
    let jac = jacobian(geometry, vertices, natural)?;
    let dim = geometry.dimension();
    let cols = jacobian_columns(&jac, dim);
    match dim {
        2 => {
            if cols[0][2] == 0.0 && cols[1][2] == 0.0 {
                Ok(cols[0][0] * cols[1][1] - cols[1][0] * cols[0][1])
            } else {
                Ok(norm(cross(cols[0], cols[1])))
            }
        }
        _ => Ok(dot(cols[0], cross(cols[1], cols[2]))),
    }
}

/// Signed-independent cell measure (area or volume).
pub fn cell_volume(geometry: CellGeometry, vertices: &[[f64; 3]]) -> Result<f64, MeshFieldError> {
    check_vertex_count(geometry, vertices)?;
    match geometry {
        CellGeometry::TriangleLinear => Ok(0.5
            * norm(cross(
                sub(vertices[1], vertices[0]),
                sub(vertices[2], vertices[0]),
            ))),
        CellGeometry::QuadrilateralLinear => Ok(0.5
            * norm(cross(
                sub(vertices[1], vertices[0]),
                sub(vertices[2], vertices[0]),
            ))
            + 0.5
                * norm(cross(
                    sub(vertices[2], vertices[0]),
                    sub(vertices[3], vertices[0]),
                ))),
        CellGeometry::TetrahedronLinear => {
            Ok(signed_volume(vertices[0], vertices[1], vertices[2], vertices[3]).abs())
        }
        CellGeometry::HexahedronLinear => Ok(hex_volume(vertices).abs()),
    }
}

/// Reject cells with the wrong vertex count or a vanishing Jacobian at the centroid.
pub fn validate_cell(geometry: CellGeometry, vertices: &[[f64; 3]]) -> Result<(), MeshFieldError> {
    check_vertex_count(geometry, vertices)?;
    let scale = characteristic_length(vertices);
    if scale <= 0.0 {
        return Err(MeshFieldError::InvalidGeometry(format!(
            "{geometry:?} collapses to a point"
        )));
    }
    let det = jacobian_det(geometry, vertices, &reference_centroid(geometry))?;
    if det.abs() <= EPS * scale.powi(geometry.dimension() as i32) {
        return Err(MeshFieldError::InvalidGeometry(format!(
            "degenerate {geometry:?}: zero Jacobian determinant"
        )));
    }
    Ok(())
}

/// Map a physical point back to natural coordinates.
///
/// Simplices are inverted with a direct linear (least-squares for embedded
/// triangles) solve. Quadrilaterals and hexahedra use Newton iteration from
/// the reference centroid. Returns `Ok(None)` when the iteration does not
/// converge or the point is off the plane of an embedded 2D cell; callers
/// treat that as "outside". Degenerate cells are reported as errors.
pub fn physical_to_reference(
    geometry: CellGeometry,
    vertices: &[[f64; 3]],
    point: &[f64; 3],
    eps: f64,
) -> Result<Option<Vec<f64>>, MeshFieldError> {
    validate_cell(geometry, vertices)?;
    let scale = characteristic_length(vertices);
    let tolerance = eps.max(1e-10) * scale;
    let natural = if geometry.is_simplex() {
        let origin = vertices[0];
        let edges: Vec<[f64; 3]> = vertices[1..].iter().map(|v| sub(*v, origin)).collect();
        Some(least_squares(&edges, sub(*point, origin))?)
    } else {
        newton_inverse(geometry, vertices, point, scale)?
    };
    let Some(natural) = natural else {
        return Ok(None);
    };
    let mapped = reference_to_physical(geometry, vertices, &natural)?;
    if norm(sub(mapped, *point)) > tolerance {
        return Ok(None);
    }
    Ok(Some(natural))
}

/// True when a natural coordinate lies inside the reference element, within `eps`.
pub fn contains(geometry: CellGeometry, natural: &[f64], eps: f64) -> bool {
    if geometry.is_simplex() {
        let sum: f64 = natural.iter().sum();
        natural.iter().all(|c| *c >= -eps) && sum <= 1.0 + eps
    } else {
        natural.iter().all(|c| *c >= -eps && *c <= 1.0 + eps)
    }
}

/// Weighted sum of per-vertex records at a natural coordinate.
///
/// `records` holds one record of width `record_size` per cell vertex.
pub fn interpolate(
    geometry: CellGeometry,
    natural: &[f64],
    records: &[&[f64]],
    record_size: usize,
) -> Result<Vec<f64>, MeshFieldError> {
    let (weights, _) = shape_functions(geometry, natural)?;
    if records.len() != weights.len() {
        return Err(MeshFieldError::InvalidGeometry(format!(
            "{geometry:?} interpolation needs {} vertex records, got {}",
            weights.len(),
            records.len()
        )));
    }
    let mut out = vec![0.0; record_size];
    for (weight, record) in weights.iter().zip(records) {
        if record.len() != record_size {
            return Err(MeshFieldError::RecordSizeMismatch {
                expected: record_size,
                found: record.len(),
            });
        }
        for (acc, value) in out.iter_mut().zip(record.iter()) {
            *acc += weight * value;
        }
    }
    Ok(out)
}

fn newton_inverse(
    geometry: CellGeometry,
    vertices: &[[f64; 3]],
    point: &[f64; 3],
    scale: f64,
) -> Result<Option<Vec<f64>>, MeshFieldError> {
    let dim = geometry.dimension();
    let mut natural = reference_centroid(geometry);
    for _ in 0..MAX_NEWTON_ITERATIONS {
        let mapped = reference_to_physical(geometry, vertices, &natural)?;
        let residual = sub(mapped, *point);
        let jac = jacobian(geometry, vertices, &natural)?;
        let cols = jacobian_columns(&jac, dim);
        // A singular Jacobian away from the centroid only happens far outside
        // a valid cell.
        let Ok(correction) = least_squares(&cols, residual) else {
            return Ok(None);
        };
        for (r, c) in natural.iter_mut().zip(correction.iter()) {
            *r -= c;
        }
        if natural.iter().any(|c| !c.is_finite()) {
            return Ok(None);
        }
        let step: f64 = correction.iter().map(|c| c * c).sum::<f64>().sqrt();
        if step <= 1e-14 || norm(residual) <= 1e-14 * scale {
            return Ok(Some(natural));
        }
    }
    Ok(Some(natural))
}

/// Solve `sum_j x_j * cols[j] = rhs` in the least-squares sense via normal equations.
fn least_squares(cols: &[[f64; 3]], rhs: [f64; 3]) -> Result<Vec<f64>, MeshFieldError> {
    let scale = cols.iter().map(|c| dot(*c, *c)).fold(0.0, f64::max);
    match cols.len() {
        2 => {
            let a = dot(cols[0], cols[0]);
            let b = dot(cols[0], cols[1]);
            let c = dot(cols[1], cols[1]);
            let det = a * c - b * b;
            if det.abs() <= EPS * scale * scale {
                return Err(MeshFieldError::InvalidGeometry("degenerate jacobian".into()));
            }
            let rhs0 = dot(cols[0], rhs);
            let rhs1 = dot(cols[1], rhs);
            let inv_det = 1.0 / det;
            Ok(vec![
                (c * rhs0 - b * rhs1) * inv_det,
                (-b * rhs0 + a * rhs1) * inv_det,
            ])
        }
        3 => {
            // Square system: invert J directly instead of forming J^T J.
            let mat = [
                cols[0][0], cols[1][0], cols[2][0], //
                cols[0][1], cols[1][1], cols[2][1], //
                cols[0][2], cols[1][2], cols[2][2],
            ];
            let inv = invert_3x3(mat, EPS * scale.powf(1.5))?;
            Ok(vec![
                inv[0] * rhs[0] + inv[1] * rhs[1] + inv[2] * rhs[2],
                inv[3] * rhs[0] + inv[4] * rhs[1] + inv[5] * rhs[2],
                inv[6] * rhs[0] + inv[7] * rhs[1] + inv[8] * rhs[2],
            ])
        }
        n => Err(MeshFieldError::InvalidGeometry(format!(
            "unsupported reference dimension: {n}"
        ))),
    }
}

fn check_vertex_count(geometry: CellGeometry, vertices: &[[f64; 3]]) -> Result<(), MeshFieldError> {
    let expected = geometry.vertex_count();
    if vertices.len() != expected {
        return Err(MeshFieldError::InvalidGeometry(format!(
            "{geometry:?} vertex count mismatch: expected {expected}, got {}",
            vertices.len()
        )));
    }
    Ok(())
}

/// Largest bounding-box extent of a vertex set.
pub(crate) fn characteristic_length(vertices: &[[f64; 3]]) -> f64 {
    let mut lo = [f64::INFINITY; 3];
    let mut hi = [f64::NEG_INFINITY; 3];
    for v in vertices {
        for k in 0..3 {
            lo[k] = lo[k].min(v[k]);
            hi[k] = hi[k].max(v[k]);
        }
    }
    (0..3).map(|k| hi[k] - lo[k]).fold(0.0, f64::max)
}

fn signed_volume(a: [f64; 3], b: [f64; 3], c: [f64; 3], d: [f64; 3]) -> f64 {
    let ab = sub(b, a);
    let ac = sub(c, a);
    let ad = sub(d, a);
    dot(ab, cross(ac, ad)) / 6.0
}

fn hex_volume(vertices: &[[f64; 3]]) -> f64 {
    signed_volume(vertices[0], vertices[1], vertices[3], vertices[4])
        + signed_volume(vertices[1], vertices[2], vertices[3], vertices[6])
        + signed_volume(vertices[1], vertices[3], vertices[4], vertices[6])
        + signed_volume(vertices[1], vertices[4], vertices[5], vertices[6])
        + signed_volume(vertices[3], vertices[4], vertices[6], vertices[7])
}

pub(crate) fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub(crate) fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

fn jacobian_columns(jac: &[f64], dim: usize) -> Vec<[f64; 3]> {
    let mut cols = Vec::with_capacity(dim);
    for ref_dim in 0..dim {
        cols.push([jac[ref_dim], jac[dim + ref_dim], jac[2 * dim + ref_dim]]);
    }
    cols
}

fn invert_3x3(mat: [f64; 9], tolerance: f64) -> Result<[f64; 9], MeshFieldError> {
    let det = mat[0] * (mat[4] * mat[8] - mat[5] * mat[7])
        - mat[1] * (mat[3] * mat[8] - mat[5] * mat[6])
        + mat[2] * (mat[3] * mat[7] - mat[4] * mat[6]);
    if det.abs() <= tolerance {
        return Err(MeshFieldError::InvalidGeometry("degenerate jacobian".into()));
    }
    let inv_det = 1.0 / det;
    Ok([
        (mat[4] * mat[8] - mat[5] * mat[7]) * inv_det,
        (mat[2] * mat[7] - mat[1] * mat[8]) * inv_det,
        (mat[1] * mat[5] - mat[2] * mat[4]) * inv_det,
        (mat[5] * mat[6] - mat[3] * mat[8]) * inv_det,
        (mat[0] * mat[8] - mat[2] * mat[6]) * inv_det,
        (mat[2] * mat[3] - mat[0] * mat[5]) * inv_det,
        (mat[3] * mat[7] - mat[4] * mat[6]) * inv_det,
        (mat[1] * mat[6] - mat[0] * mat[7]) * inv_det,
        (mat[0] * mat[4] - mat[1] * mat[3]) * inv_det,
    ])
}
