mod util;

use std::sync::Arc;

use mesh_field::io::snapshot;
use mesh_field::prelude::*;
use util::{approx, scalar, two_tets, two_triangles};

fn stress(mesh: Arc<Mesh>) -> Field {
    let cells = mesh.number_of_cells().unwrap();
    Field::new(
        mesh,
        FieldId::Stress,
        ValueType::Tensor,
        Unit::parse("MPa").unwrap(),
        Quantity::parse(2.5, "ms").unwrap(),
        Some((0..cells * 9).map(|v| v as f64 * 0.5).collect()),
        FieldType::CellBased,
    )
    .unwrap()
}

fn assert_same(a: &Field, b: &Field) {
    assert_eq!(a.field_id(), b.field_id());
    assert_eq!(a.value_type(), b.value_type());
    assert_eq!(a.field_type(), b.field_type());
    assert_eq!(a.unit().name(), b.unit().name());
    assert!(approx(a.time().si_value(), b.time().si_value()));
    assert_eq!(a.values().unwrap(), b.values().unwrap());
    assert_eq!(
        a.mesh().number_of_vertices().unwrap(),
        b.mesh().number_of_vertices().unwrap()
    );
    assert_eq!(
        a.mesh().number_of_cells().unwrap(),
        b.mesh().number_of_cells().unwrap()
    );
}

#[test]
fn snapshot_dump_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("f.dump");
    let f = scalar(two_tets(), vec![6.0, 16.0, 36.0, 33.0, 32.0], 16.0);
    snapshot::dump(&f, &path).unwrap();
    let back = snapshot::load(&path).unwrap();
    assert_same(&f, &back);
    assert_eq!(back.mesh().digest().unwrap(), f.mesh().digest().unwrap());
    assert_eq!(back.get_vertex_value(3).unwrap().value, vec![33.0]);
}

#[test]
fn container_groups_and_heavy_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.mfc");
    let container = Container::new(&path);
    assert!(container.groups().unwrap().is_empty());

    let mesh = two_triangles();
    container.write_mesh("shared", &mesh).unwrap();
    let a = scalar(mesh.clone(), vec![1.0, 2.0, 3.0, 4.0], 0.0);
    let b = scalar(mesh.clone(), vec![5.0, 6.0, 7.0, 8.0], 1.0);
    container
        .write_field("a", &a, MeshPlacement::Group("shared"))
        .unwrap();
    container.write_field("b", &b, MeshPlacement::Inline).unwrap();
    assert_eq!(container.groups().unwrap(), vec!["a", "b", "b/mesh", "shared"]);

    assert!(matches!(
        container.write_field("a", &a, MeshPlacement::Inline),
        Err(MeshFieldError::GroupExists { .. })
    ));
    assert!(matches!(
        container.write_field("c", &a, MeshPlacement::Group("missing")),
        Err(MeshFieldError::UnknownGroup { .. })
    ));
    assert_eq!(container.groups().unwrap().len(), 4);

    let resident = container.read_field("b").unwrap();
    assert_same(&b, &resident);

    let heavy = Field::from_heavy(HeavyRef::new(&path, "a"), None).unwrap();
    assert!(!heavy.is_loaded());
    assert_eq!(heavy.field_id(), FieldId::Displacement);
    assert!(!heavy.mesh().is_loaded());
    assert!(approx(heavy.evaluate([0.5, 0.5]).unwrap().value[0], a.evaluate([0.5, 0.5]).unwrap().value[0]));
    assert!(heavy.is_loaded());
    assert!(heavy.mesh().is_loaded());

    let mut read_only = Field::from_heavy(HeavyRef::new(&path, "a").read_only(true), None).unwrap();
    assert!(matches!(
        read_only.set_record(0, &[9.0]),
        Err(MeshFieldError::ReadOnly(_))
    ));
    let mut writable = Field::from_heavy(HeavyRef::new(&path, "a"), None).unwrap();
    writable.set_record(0, &[9.0]).unwrap();
    // The backing container is never written through.
    assert_eq!(container.read_field("a").unwrap().values().unwrap()[0], 1.0);
}

#[test]
fn vtk_ascii_and_binary_round_trip() {
    let mesh = two_triangles();
    let temperature = Field::new(
        mesh.clone(),
        FieldId::Temperature,
        ValueType::Scalar,
        Unit::parse("W/m K").unwrap(),
        Quantity::new(3.0, Unit::second()),
        Some(vec![1.0, 2.0, 3.0, 4.0]),
        FieldType::VertexBased,
    )
    .unwrap();
    let velocity = Field::new(
        mesh.clone(),
        FieldId::Velocity,
        ValueType::Vector,
        Unit::parse("m/s").unwrap(),
        Quantity::new(3.0, Unit::second()),
        Some((0..12).map(f64::from).collect()),
        FieldType::VertexBased,
    )
    .unwrap();
    let stress = stress(mesh.clone());

    for writer in [VtkWriter::ascii(), VtkWriter::binary()] {
        let mut bytes = Vec::new();
        writer
            .write(&mut bytes, &[&temperature, &velocity, &stress])
            .unwrap();
        let fields = VtkReader.read(bytes.as_slice()).unwrap();
        assert_eq!(fields.len(), 3);
        let by_id = |id: FieldId| fields.iter().find(|f| f.field_id() == id).unwrap();
        assert_same(&temperature, by_id(FieldId::Temperature));
        assert_same(&velocity, by_id(FieldId::Velocity));
        assert_same(&stress, by_id(FieldId::Stress));
        assert_eq!(by_id(FieldId::Temperature).unit().name(), "W/m K");
        assert_eq!(by_id(FieldId::Stress).time().unit.name(), "ms");
        let read_mesh = by_id(FieldId::Temperature).mesh();
        assert_eq!(read_mesh.dimension().unwrap(), 2);
        assert_eq!(read_mesh.cell(1).unwrap().label(), 2);
    }
}

#[test]
fn vtk_rejects_fields_on_different_meshes() {
    let a = scalar(two_triangles(), vec![0.0; 4], 0.0);
    let b = scalar(two_tets(), vec![0.0; 5], 0.0);
    let mut bytes = Vec::new();
    assert!(VtkWriter::ascii().write(&mut bytes, &[&a, &b]).is_err());
}

#[test]
fn xdmf_round_trip_groups_steps() {
    let mesh = two_tets();
    let f0 = scalar(mesh.clone(), vec![0.0, 12.0, 39.0, 33.0, 114.0], 0.0);
    let s0 = Field::new(
        mesh.clone(),
        FieldId::Stress,
        ValueType::Tensor,
        Unit::parse("MPa").unwrap(),
        Quantity::new(0.0, Unit::second()),
        Some((0..18).map(f64::from).collect()),
        FieldType::CellBased,
    )
    .unwrap();
    let f1 = scalar(mesh.clone(), vec![1.0; 5], 1.0);

    let mut bytes = Vec::new();
    XdmfWriter::default()
        .with_collection_name("run")
        .write(&mut bytes, &[&f0, &s0, &f1])
        .unwrap();
    let text = String::from_utf8(bytes.clone()).unwrap();
    assert_eq!(text.matches("GridType=\"Uniform\"").count(), 2);
    assert!(text.contains("CollectionType=\"Temporal\""));

    let fields = XdmfReader.read(bytes.as_slice()).unwrap();
    assert_eq!(fields.len(), 3);
    assert_same(&f0, &fields[0]);
    assert_same(&s0, &fields[1]);
    assert_same(&f1, &fields[2]);
    assert!(Arc::ptr_eq(fields[0].mesh(), fields[1].mesh()));
    assert!(approx(fields[0].evaluate([2.0, 2.0, 2.0]).unwrap().value[0], 24.0));
}

#[test]
fn structured_points_share_one_grid() {
    let text = "# vtk DataFile Version 3.0
voxels
ASCII
DATASET STRUCTURED_POINTS
DIMENSIONS 3 2 1
ORIGIN 0 0 0
SPACING 0.5 1 1
POINT_DATA 6
SCALARS T double 1
LOOKUP_TABLE default
0 1 2 3 4 5
VECTORS v double
0 0 0 1 0 0 2 0 0
0 1 0 1 1 0 2 1 0
";
    let reader = StructuredPointsReader::new(Quantity::new(5.0, Unit::second()))
        .with_mesh_unit(Unit::parse("mm").unwrap())
        .with_array("T", FieldId::Temperature, Unit::parse("K").unwrap())
        .with_array("v", FieldId::Velocity, Unit::parse("m/s").unwrap());
    let fields = reader.read(text.as_bytes()).unwrap();
    assert_eq!(fields.len(), 2);
    assert!(Arc::ptr_eq(fields[0].mesh(), fields[1].mesh()));
    let t = fields.iter().find(|f| f.field_id() == FieldId::Temperature).unwrap();
    assert!(approx(t.evaluate([0.75, 0.5]).unwrap().value[0], 3.0));
    let v = fields.iter().find(|f| f.field_id() == FieldId::Velocity).unwrap();
    assert_eq!(v.value_type(), ValueType::Vector);
    let at = Position::from(Quantity::new(vec![0.00075, 0.0005], Unit::meter()));
    let value = v.evaluate(at).unwrap().value;
    assert!(approx(value[0], 1.5) && approx(value[1], 0.5));
}
