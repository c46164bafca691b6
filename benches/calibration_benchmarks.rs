//! Benchmarks for the chessboard calibration solver

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::{Point2, Rotation3, Vector3};
use visual_acuity::calibration::{solver, PatternGeometry};

fn project_views(object_points: &[Point2<f64>], count: usize) -> Vec<Vec<Point2<f64>>> {
    (0..count)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let phase = i as f64;
            let rotation = Rotation3::new(Vector3::new(0.3 * phase.cos(), 0.3 * phase.sin(), 0.05 * phase));
            let translation = Vector3::new(-0.1, -0.06, 0.5 + 0.03 * phase);
            object_points
                .iter()
                .map(|p| {
                    let c = rotation * Vector3::new(p.x, p.y, 0.0) + translation;
                    Point2::new(800.0 * c.x / c.z + 320.0, 820.0 * c.y / c.z + 240.0)
                })
                .collect()
        })
        .collect()
}

fn benchmark_calibration(c: &mut Criterion) {
    let mut group = c.benchmark_group("calibration");
    group.sample_size(20);

    let geometry = PatternGeometry::default();
    let object_points = geometry.object_points();

    for views in [3usize, 8, 15] {
        let observed = project_views(&object_points, views);
        group.bench_with_input(BenchmarkId::new("solve_views", views), &observed, |b, observed| {
            b.iter(|| black_box(solver::calibrate(&object_points, observed)));
        });
    }

    let observed = project_views(&object_points, 1);
    group.bench_function("homography", |b| {
        b.iter(|| black_box(solver::estimate_homography(&object_points, &observed[0])));
    });

    group.finish();
}

criterion_group!(benches, benchmark_calibration);
criterion_main!(benches);
