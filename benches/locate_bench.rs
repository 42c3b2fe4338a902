use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use mesh_field::prelude::*;

fn grid(n: usize) -> UniformGrid {
    let h = 1.0 / (n - 1) as f64;
    UniformGrid::new([n, n, n], [h; 3], [0.0; 3], None).expect("valid grid")
}

fn probes(count: usize) -> Vec<[f64; 3]> {
    // Deterministic low-discrepancy sample of the unit cube.
    (0..count)
        .map(|i| {
            let i = i as f64;
            [
                (i * 0.618_033_988_75).fract(),
                (i * 0.754_877_666_25).fract(),
                (i * 0.569_840_290_99).fract(),
            ]
        })
        .collect()
}

fn bench_locate(c: &mut Criterion) {
    let mut group = c.benchmark_group("locate");
    let points = probes(256);

    for &n in &[6usize, 11] {
        let structured = grid(n);
        let unstructured = structured.to_unstructured().expect("conversion");
        // Build the bounding-box prefilter outside the timed loop.
        unstructured.localizer();

        group.bench_with_input(BenchmarkId::new("uniform_grid", n), &n, |b, _| {
            b.iter(|| {
                for p in &points {
                    black_box(structured.locate(p, DEFAULT_EPS).expect("inside"));
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("unstructured_hex", n), &n, |b, _| {
            b.iter(|| {
                for p in &points {
                    black_box(unstructured.locate(p, DEFAULT_EPS).expect("inside"));
                }
            });
        });
    }
    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let mesh = std::sync::Arc::new(Mesh::from(grid(11)));
    let values: Vec<f64> = (0..mesh.number_of_vertices().expect("resident"))
        .map(|i| i as f64)
        .collect();
    let field = Field::new(
        mesh,
        FieldId::Temperature,
        ValueType::Scalar,
        Unit::parse("K").expect("unit"),
        Quantity::new(0.0, Unit::second()),
        Some(values),
        FieldType::VertexBased,
    )
    .expect("field");
    let points: Vec<Position> = probes(256).into_iter().map(Position::from).collect();

    c.bench_function("evaluate_many_uniform_11", |b| {
        b.iter(|| black_box(field.evaluate_many(&points, DEFAULT_EPS).expect("inside")));
    });
}

criterion_group!(benches, bench_locate, bench_evaluate);
criterion_main!(benches);
