//! Benchmarks for shape batching and polyline tessellation

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use glam::Vec2;
use vesper_graphics::polyline::{Join, PolylineStyle, tessellate};
use vesper_graphics::{DrawMode, Graphics, GraphicsConfig};
use vesper_test_utils::MockBackend;

fn setup() -> (Graphics<MockBackend>, MockBackend) {
    let backend = MockBackend::new();
    let graphics = Graphics::new(backend.clone(), GraphicsConfig::default()).unwrap();
    (graphics, backend)
}

fn bench_rectangles(c: &mut Criterion) {
    let mut group = c.benchmark_group("batched_rectangles");

    for count in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let (mut graphics, backend) = setup();
            b.iter(|| {
                for i in 0..count {
                    let x = (i % 100) as f32 * 8.0;
                    let y = (i / 100) as f32 * 8.0;
                    graphics.rectangle(DrawMode::Fill, x, y, 6.0, 6.0).unwrap();
                }
                graphics.present().unwrap();
                backend.clear_calls();
            });
        });
    }

    group.finish();
}

fn bench_circles(c: &mut Criterion) {
    let mut group = c.benchmark_group("batched_circles");

    for count in [100, 1_000] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let (mut graphics, backend) = setup();
            b.iter(|| {
                for i in 0..count {
                    graphics
                        .circle(DrawMode::Fill, (i % 40) as f32 * 20.0, (i / 40) as f32 * 20.0, 8.0)
                        .unwrap();
                }
                graphics.present().unwrap();
                backend.clear_calls();
            });
        });
    }

    group.finish();
}

fn bench_points(c: &mut Criterion) {
    let points: Vec<Vec2> = (0..50_000).map(|i| Vec2::new((i % 800) as f32, (i / 800) as f32)).collect();

    c.bench_function("points_50k", |b| {
        let (mut graphics, backend) = setup();
        b.iter(|| {
            graphics.points(black_box(&points), None).unwrap();
            graphics.present().unwrap();
            backend.clear_calls();
        });
    });
}

fn bench_tessellation(c: &mut Criterion) {
    let mut group = c.benchmark_group("polyline_tessellation");
    let zigzag: Vec<Vec2> = (0..1_000)
        .map(|i| Vec2::new(i as f32 * 4.0, if i % 2 == 0 { 0.0 } else { 12.0 }))
        .collect();

    for (name, join) in [("none", Join::None), ("miter", Join::Miter), ("bevel", Join::Bevel)] {
        for smooth in [false, true] {
            let style = PolylineStyle {
                half_width: 2.0,
                pixel_size: 1.0,
                join,
                smooth,
            };
            let id = format!("{}{}", name, if smooth { "_smooth" } else { "" });
            group.bench_function(id, |b| {
                b.iter(|| black_box(tessellate(black_box(&zigzag), &style)));
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_rectangles, bench_circles, bench_points, bench_tessellation);
criterion_main!(benches);
