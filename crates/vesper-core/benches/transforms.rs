//! Benchmarks for the 2D transform helpers used during tessellation.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use vesper_core::math::{Mat4, Vec3, approximate_scale, is_affine_2d};

fn bench_approximate_scale(c: &mut Criterion) {
    let m = Mat4::from_rotation_z(0.3) * Mat4::from_scale(Vec3::new(2.0, 3.0, 1.0));
    c.bench_function("approximate_scale", |b| b.iter(|| approximate_scale(black_box(&m))));
}

fn bench_is_affine(c: &mut Criterion) {
    let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 0.0));
    c.bench_function("is_affine_2d", |b| b.iter(|| is_affine_2d(black_box(&m))));
}

criterion_group!(benches, bench_approximate_scale, bench_is_affine);
criterion_main!(benches);
