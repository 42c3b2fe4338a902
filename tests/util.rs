#![allow(dead_code)]
use std::sync::Arc;

use mesh_field::prelude::*;

pub fn mesh(coords: &[&[f64]], cells: &[(CellGeometry, &[usize])], unit: Option<Unit>) -> Arc<Mesh> {
    let vertices = coords
        .iter()
        .enumerate()
        .map(|(i, c)| Vertex::new(i, i as i64, c).unwrap())
        .collect();
    let cells = cells
        .iter()
        .enumerate()
        .map(|(i, (g, v))| Cell::new(i, i as i64 + 1, *g, v.to_vec()).unwrap())
        .collect();
    Arc::new(Mesh::unstructured(vertices, cells, unit).unwrap())
}

/// Two triangles sharing the edge (2,0)-(0,5).
pub fn two_triangles() -> Arc<Mesh> {
    mesh(
        &[&[0.0, 0.0], &[2.0, 0.0], &[0.0, 5.0], &[4.0, 2.0]],
        &[
            (CellGeometry::TriangleLinear, &[0, 1, 2]),
            (CellGeometry::TriangleLinear, &[1, 2, 3]),
        ],
        None,
    )
}

/// Two tetrahedra sharing the face (1,2,3).
pub fn two_tets() -> Arc<Mesh> {
    mesh(
        &[
            &[0.0, 0.0, 0.0],
            &[2.0, 0.0, 2.0],
            &[0.0, 5.0, 3.0],
            &[3.0, 3.0, 2.0],
            &[8.0, 15.0, 0.0],
        ],
        &[
            (CellGeometry::TetrahedronLinear, &[0, 1, 2, 3]),
            (CellGeometry::TetrahedronLinear, &[1, 2, 3, 4]),
        ],
        None,
    )
}

pub fn scalar(mesh: Arc<Mesh>, values: Vec<f64>, t: f64) -> Field {
    Field::new(
        mesh,
        FieldId::Displacement,
        ValueType::Scalar,
        Unit::meter(),
        Quantity::new(t, Unit::second()),
        Some(values),
        FieldType::VertexBased,
    )
    .unwrap()
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * (1.0 + a.abs().max(b.abs()))
}
