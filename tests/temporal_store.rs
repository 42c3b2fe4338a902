mod util;

use mesh_field::prelude::*;
use serde_json::{Map, Value, json};
use util::{approx, scalar, two_tets, two_triangles};

fn seconds(t: f64) -> Quantity {
    Quantity::new(t, Unit::second())
}

fn user(step: u64) -> Map<String, Value> {
    let mut m = Map::new();
    m.insert("step".into(), json!(step));
    m
}

#[test]
fn shared_mesh_is_written_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = TemporalField::create(dir.path(), StoreConfig::default()).unwrap();
    let mesh = two_triangles();
    for step in 0..4 {
        let t = step as f64;
        let f = scalar(mesh.clone(), vec![t, t + 1.0, t + 2.0, t + 3.0], t);
        store.add_field(&f, user(step)).unwrap();
    }
    assert_eq!(store.len(), 4);
    assert_eq!(store.mesh_blob_count().unwrap(), 1);
    assert_eq!(store.field_blob_count().unwrap(), 4);

    // A structurally identical mesh built separately is deduplicated too.
    let f = scalar(two_triangles(), vec![0.0; 4], 10.0);
    store.add_field(&f, Map::new()).unwrap();
    assert_eq!(store.mesh_blob_count().unwrap(), 1);

    let g = scalar(two_tets(), vec![0.0; 5], 11.0);
    store.add_field(&g, Map::new()).unwrap();
    assert_eq!(store.mesh_blob_count().unwrap(), 2);
}

#[test]
fn duplicate_time_leaves_store_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = TemporalField::create(dir.path(), StoreConfig::default()).unwrap();
    let mesh = two_triangles();
    store
        .add_field(&scalar(mesh.clone(), vec![1.0; 4], 1.0), user(1))
        .unwrap();
    let before = store.time_list();

    let err = store
        .add_field(&scalar(mesh.clone(), vec![2.0; 4], 1.0), user(2))
        .unwrap_err();
    assert!(matches!(err, MeshFieldError::DuplicateTime(_)));
    // Same instant in other units is the same time.
    let millis = Field::new(
        mesh.clone(),
        FieldId::Displacement,
        ValueType::Scalar,
        Unit::meter(),
        Quantity::parse(1000.0, "ms").unwrap(),
        None,
        FieldType::VertexBased,
    )
    .unwrap();
    assert!(store.add_field(&millis, Map::new()).is_err());

    assert_eq!(store.time_list(), before);
    assert_eq!(store.field_blob_count().unwrap(), 1);
    assert_eq!(store.time_metadata(&seconds(1.0)).unwrap().user, user(1));

    let earlier = store.add_field(&scalar(mesh, vec![0.0; 4], 0.5), Map::new());
    assert!(matches!(earlier, Err(MeshFieldError::TimeNotIncreasing { .. })));
    assert_eq!(store.len(), 1);
}

#[test]
fn lookups_are_exact() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = TemporalField::create(dir.path(), StoreConfig::default()).unwrap();
    store
        .add_field(&scalar(two_triangles(), vec![0.0; 4], 2.0), Map::new())
        .unwrap();
    assert!(store.time_metadata(&seconds(2.0)).is_ok());
    assert!(store.get_field(&seconds(2.0 + 1e-9)).unwrap_err().is_lookup());
    assert!(store.time_metadata(&seconds(3.0)).unwrap_err().is_lookup());
    // Unit-aware: 2 s expressed in milliseconds.
    let ms = Quantity::parse(2000.0, "ms").unwrap();
    assert!(store.get_field(&ms).is_ok());
}

#[test]
fn evaluate_matches_in_memory_field_and_caches() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = TemporalField::create(dir.path(), StoreConfig::default()).unwrap();
    let original = scalar(two_triangles(), vec![0.0, 12.0, 175.0, 94.0], 13.0);
    store.add_field(&original, Map::new()).unwrap();
    store
        .add_field(&scalar(two_triangles(), vec![1.0; 4], 14.0), Map::new())
        .unwrap();
    assert!(store.cached_times().is_empty());

    let points: Vec<Position> = vec![[1.0, 2.5].into(), [3.0, 1.0].into()];
    let got = store.evaluate(&seconds(13.0), &points, None).unwrap();
    for (p, v) in points.iter().zip(&got) {
        let want = original.evaluate(p.clone()).unwrap();
        assert!(approx(v.value[0], want.value[0]));
        assert_eq!(v.unit.name(), "m");
    }
    assert_eq!(store.cached_times(), vec![seconds(13.0)]);

    // A failed evaluation does not populate the cache.
    let outside: Vec<Position> = vec![[100.0, 100.0].into()];
    assert!(store.evaluate(&seconds(14.0), &outside, None).is_err());
    assert_eq!(store.cached_times(), vec![seconds(13.0)]);

    store.clear_cache();
    assert!(store.cached_times().is_empty());
}

#[test]
fn bounded_cache_keeps_most_recent() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::default().with_cache_policy(CachePolicy::Bounded { max_entries: 1 });
    let mut store = TemporalField::create(dir.path(), config).unwrap();
    for t in [1.0, 2.0] {
        store
            .add_field(&scalar(two_triangles(), vec![t; 4], t), Map::new())
            .unwrap();
    }
    let p: Vec<Position> = vec![[0.5, 0.5].into()];
    store.evaluate(&seconds(1.0), &p, None).unwrap();
    store.evaluate(&seconds(2.0), &p, None).unwrap();
    assert_eq!(store.cached_times(), vec![seconds(2.0)]);
}

#[test]
fn heavy_fields_share_one_mesh_handle() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = TemporalField::create(dir.path(), StoreConfig::default()).unwrap();
    let mesh = two_triangles();
    for t in [0.0, 1.0] {
        store
            .add_field(&scalar(mesh.clone(), vec![t; 4], t), Map::new())
            .unwrap();
    }
    let a = store.get_field(&seconds(0.0)).unwrap();
    let b = store.get_field(&seconds(1.0)).unwrap();
    assert!(!a.is_loaded());
    assert!(std::sync::Arc::ptr_eq(a.mesh(), b.mesh()));
    assert_eq!(a.mesh().digest().unwrap(), mesh.digest().unwrap());
    assert!(!a.mesh().is_loaded());
    assert_eq!(b.values().unwrap(), &[1.0; 4]);
    assert!(a.heavy_source().unwrap().read_only);
}

#[test]
fn reopen_restores_index_and_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::default().with_time_unit("min");
    {
        let mut store = TemporalField::create(dir.path(), config.clone()).unwrap();
        store
            .add_field(&scalar(two_triangles(), vec![3.0; 4], 60.0), user(7))
            .unwrap();
    }
    assert!(TemporalField::create(dir.path(), StoreConfig::default()).is_err());

    let store = TemporalField::open(dir.path()).unwrap();
    assert_eq!(store.config(), &config);
    assert_eq!(store.time_list(), vec![seconds(60.0)]);
    let meta = store.time_metadata(&seconds(60.0)).unwrap();
    assert_eq!(meta.user, user(7));
    assert_eq!(meta.system.field_id, FieldId::Displacement);
    assert_eq!(meta.system.record_count, 4);
    assert!(meta.location.mesh.starts_with("mesh/"));

    let p: Vec<Position> = vec![[1.0, 1.0].into()];
    let v = store.evaluate(&seconds(60.0), &p, None).unwrap();
    assert!(approx(v[0].value[0], 3.0));
}

#[test]
fn xdmf_export_uses_configured_time_unit() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::default().with_time_unit("min");
    let mut store = TemporalField::create(dir.path().join("store"), config).unwrap();
    for t in [60.0, 120.0] {
        store
            .add_field(&scalar(two_triangles(), vec![t; 4], t), Map::new())
            .unwrap();
    }
    let path = dir.path().join("series.xmf");
    store.write_xdmf(&path).unwrap();

    let fields = XdmfReader.read_path(&path).unwrap();
    assert_eq!(fields.len(), 2);
    assert!(approx(fields[1].time().value, 2.0));
    assert_eq!(fields[1].time().unit.name(), "min");
    assert!(approx(fields[1].evaluate([0.5, 0.5]).unwrap().value[0], 120.0));
    // Both steps share one reconstructed mesh.
    assert!(std::sync::Arc::ptr_eq(fields[0].mesh(), fields[1].mesh()));
}

#[test]
fn user_metadata_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let mut meta = Map::new();
    meta.insert("solver".into(), json!({"name": "cg", "tol": 1e-8}));
    meta.insert("tags".into(), json!(["warm", "restart"]));
    {
        let mut store = TemporalField::create(dir.path(), StoreConfig::default()).unwrap();
        store
            .add_field(&scalar(two_triangles(), vec![1.0; 4], 0.5), meta.clone())
            .unwrap();
        store
            .add_field(&scalar(two_triangles(), vec![2.0; 4], 1.5), Map::new())
            .unwrap();
    }
    let store = TemporalField::open(dir.path()).unwrap();
    assert_eq!(store.time_metadata(&seconds(0.5)).unwrap().user, meta);
    assert!(store.time_metadata(&seconds(1.5)).unwrap().user.is_empty());
}
