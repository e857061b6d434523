//! Automatic batching tests (no GPU required).
//!
//! Shapes are recorded by the mock backend once the batch is flushed, which
//! happens at the latest on `present`.

mod common;

use common::{image, mock_graphics, mock_graphics_with};
use glam::Vec2;
use vesper_core::color::Color;
use vesper_core::geometry::Rect;
use vesper_graphics::batched::MAX_BATCH_VERTICES;
use vesper_graphics::resource::ShaderBinding;
use vesper_graphics::types::{CommonFormat, PrimitiveType, StandardShader};
use vesper_graphics::{DrawMode, GraphicsConfig, GraphicsError};
use vesper_test_utils::MockBackend;

fn square(size: f32) -> Rect<f32> {
    Rect::new(0.0, 0.0, size, size)
}

#[test]
fn test_shapes_share_one_draw() {
    let (mut graphics, backend) = mock_graphics();

    graphics.rectangle(DrawMode::Fill, 10.0, 10.0, 50.0, 50.0).unwrap();
    graphics
        .rounded_rectangle(DrawMode::Fill, 100.0, 100.0, 80.0, 40.0, 8.0, 8.0)
        .unwrap();

    // Nothing reaches the backend until the batch is flushed.
    assert_eq!(backend.count_draws(), 0);
    let stats = graphics.stats();
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.draw_calls_batched, 1);

    graphics.present().unwrap();

    let draws = backend.draws();
    assert_eq!(draws.len(), 1);
    let draw = &draws[0];
    assert_eq!(draw.primitive, PrimitiveType::Triangles);
    assert_eq!(draw.vertex_format, [CommonFormat::Xy, CommonFormat::Rgba8]);
    assert_eq!(draw.shader, ShaderBinding::Standard(StandardShader::Default));
    assert!(draw.vertex_count > 4);
    assert_eq!(draw.index_count as usize, draw.indices.len());
    assert!(draw.indices.iter().all(|&i| u32::from(i) < draw.vertex_count));
}

#[test]
fn test_points_are_one_draw() {
    let (mut graphics, backend) = mock_graphics();
    let points: Vec<Vec2> = (0..100).map(|i| Vec2::new(i as f32, (i * 2) as f32)).collect();

    graphics.points(&points, None).unwrap();
    graphics.present().unwrap();

    let draws = backend.draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].primitive, PrimitiveType::Points);
    assert_eq!(draws[0].vertex_count, 100);
    assert!(!draws[0].is_indexed());
    assert_eq!(draws[0].shader, ShaderBinding::Standard(StandardShader::Points));
    assert_eq!(draws[0].positions_xy()[99], [99.0, 198.0]);
}

#[test]
fn test_fan_indices_are_rebased() {
    let (mut graphics, backend) = mock_graphics();
    let pentagon = [
        Vec2::new(0.0, 0.0),
        Vec2::new(10.0, 0.0),
        Vec2::new(15.0, 8.0),
        Vec2::new(5.0, 14.0),
        Vec2::new(-5.0, 8.0),
    ];

    graphics.polygon(DrawMode::Fill, &pentagon).unwrap();
    graphics.rectangle(DrawMode::Fill, 20.0, 20.0, 4.0, 4.0).unwrap();
    graphics.present().unwrap();

    let draw = backend.last_draw().unwrap();
    assert_eq!(draw.vertex_count, 9);
    assert_eq!(draw.indices, vec![0, 1, 2, 0, 2, 3, 0, 3, 4, 5, 6, 7, 5, 7, 8]);
}

#[test]
fn test_quad_indices_and_texture() {
    let (mut graphics, backend) = mock_graphics();
    let texture = image(&mut graphics, 16, 16);

    graphics.draw_quad(&texture, square(16.0), square(1.0)).unwrap();
    graphics
        .draw_quad(&texture, Rect::new(32.0, 0.0, 16.0, 16.0), square(1.0))
        .unwrap();
    graphics.present().unwrap();

    let draws = backend.draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].vertex_format, [CommonFormat::XyStRgba8, CommonFormat::None]);
    assert_eq!(draws[0].texture, Some(texture.id()));
    assert_eq!(draws[0].indices, vec![0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4]);
    assert_eq!(draws[0].positions_xy()[4], [32.0, 0.0]);
}

#[test]
fn test_texture_change_flushes() {
    let (mut graphics, backend) = mock_graphics();
    let first = image(&mut graphics, 8, 8);
    let second = image(&mut graphics, 8, 8);

    graphics.draw_quad(&first, square(8.0), square(1.0)).unwrap();
    graphics.draw_quad(&first, square(8.0), square(1.0)).unwrap();
    graphics.draw_quad(&second, square(8.0), square(1.0)).unwrap();
    graphics.present().unwrap();

    let draws = backend.draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].texture, Some(first.id()));
    assert_eq!(draws[0].vertex_count, 8);
    assert_eq!(draws[1].texture, Some(second.id()));
    assert_eq!(draws[1].vertex_count, 4);
}

#[test]
fn test_format_change_flushes() {
    let (mut graphics, backend) = mock_graphics();
    let texture = image(&mut graphics, 8, 8);

    graphics.rectangle(DrawMode::Fill, 0.0, 0.0, 8.0, 8.0).unwrap();
    graphics.draw_quad(&texture, square(8.0), square(1.0)).unwrap();
    graphics.rectangle(DrawMode::Fill, 0.0, 0.0, 8.0, 8.0).unwrap();
    graphics.present().unwrap();

    assert_eq!(backend.count_draws(), 3);
}

#[test]
fn test_color_changes_stay_in_batch() {
    let (mut graphics, backend) = mock_graphics();

    graphics.set_color(Color::new(1.0, 0.0, 0.0, 1.0)).unwrap();
    graphics.rectangle(DrawMode::Fill, 0.0, 0.0, 8.0, 8.0).unwrap();
    graphics.set_color(Color::new(0.0, 0.0, 1.0, 1.0)).unwrap();
    graphics.rectangle(DrawMode::Fill, 10.0, 0.0, 8.0, 8.0).unwrap();
    graphics.present().unwrap();

    let draws = backend.draws();
    assert_eq!(draws.len(), 1);
    let colors = &draws[0].vertex_data[1];
    assert_eq!(colors.len(), 8 * 4);
    assert_eq!(&colors[..4], &[255, 0, 0, 255]);
    assert_eq!(&colors[28..], &[0, 0, 255, 255]);
    // Vertex colors carry the tint, so the constant color is neutral.
    assert_eq!(draws[0].state.constant_color, Color::WHITE);
}

#[test]
fn test_vertices_are_transformed_on_cpu() {
    let (mut graphics, backend) = mock_graphics();

    graphics.translate(10.0, 20.0);
    graphics.scale(2.0, 2.0);
    graphics.rectangle(DrawMode::Fill, 0.0, 0.0, 5.0, 5.0).unwrap();
    graphics.present().unwrap();

    let draw = backend.last_draw().unwrap();
    assert_eq!(draw.state.transform, glam::Mat4::IDENTITY);
    let positions = draw.positions_xy();
    assert_eq!(positions[0], [10.0, 20.0]);
    assert_eq!(positions[2], [20.0, 30.0]);
}

#[test]
fn test_index_limit_splits_batches() {
    let (mut graphics, backend) = mock_graphics();
    let polygon: Vec<Vec2> = (0..40_000)
        .map(|i| {
            let angle = i as f32 / 40_000.0 * std::f32::consts::TAU;
            Vec2::new(angle.cos() * 100.0, angle.sin() * 100.0)
        })
        .collect();

    graphics.polygon(DrawMode::Fill, &polygon).unwrap();
    graphics.polygon(DrawMode::Fill, &polygon).unwrap();
    graphics.present().unwrap();

    let draws = backend.draws();
    assert_eq!(draws.len(), 2);
    for draw in &draws {
        assert_eq!(draw.vertex_count, 40_000);
        assert!(draw.indices.iter().all(|&i| i < 40_000));
    }
}

#[test]
fn test_largest_indexed_shape_fits() {
    let (mut graphics, backend) = mock_graphics();
    let polygon: Vec<Vec2> = (0..MAX_BATCH_VERTICES).map(|i| Vec2::new(i as f32, (i % 7) as f32)).collect();

    graphics.polygon(DrawMode::Fill, &polygon).unwrap();
    graphics.present().unwrap();

    let draw = backend.last_draw().unwrap();
    assert_eq!(draw.vertex_count, MAX_BATCH_VERTICES);
    assert_eq!(draw.indices.iter().copied().max(), Some(u16::MAX - 1));
}

#[test]
fn test_too_many_indexed_vertices() {
    let (mut graphics, backend) = mock_graphics();
    let polygon: Vec<Vec2> = (0..MAX_BATCH_VERTICES + 1).map(|i| Vec2::new(i as f32, 0.0)).collect();

    let err = graphics.polygon(DrawMode::Fill, &polygon).unwrap_err();
    assert!(matches!(err, GraphicsError::Usage(_)));

    graphics.present().unwrap();
    assert_eq!(backend.count_draws(), 0);
}

#[test]
fn test_stream_growth_recreates_buffers() {
    let (mut graphics, backend) = mock_graphics();
    let polygon: Vec<Vec2> = (0..20_000).map(|i| Vec2::new(i as f32, 0.0)).collect();

    // 20k fan vertices need far more than the default index stream holds.
    graphics.polygon(DrawMode::Fill, &polygon).unwrap();
    graphics.present().unwrap();

    let grown = backend
        .calls()
        .iter()
        .filter(|call| matches!(call, vesper_test_utils::BackendCall::CreateStreamBuffer { .. }))
        .count();
    assert!(grown >= 1);
    assert!(!backend.released().is_empty());
    assert_eq!(backend.count_draws(), 1);
}

#[test]
fn test_shader_change_flushes() {
    let (mut graphics, backend) = mock_graphics();
    let shader = graphics
        .new_shader(
            &vesper_graphics::ShaderSources::graphics(None, Some("custom pixel")),
            &Default::default(),
        )
        .unwrap();

    graphics.rectangle(DrawMode::Fill, 0.0, 0.0, 4.0, 4.0).unwrap();
    graphics.set_shader(Some(shader.clone())).unwrap();
    graphics.rectangle(DrawMode::Fill, 0.0, 0.0, 4.0, 4.0).unwrap();
    graphics.set_shader(None).unwrap();
    graphics.present().unwrap();

    let draws = backend.draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[1].shader, ShaderBinding::Custom(shader.id()));
    assert_eq!(graphics.stats().shader_switches, 2);
}

#[test]
fn test_line_needs_two_points() {
    let (mut graphics, _backend) = mock_graphics();

    let err = graphics.line(&[Vec2::ZERO]).unwrap_err();
    assert_eq!(err.to_string(), "Need at least two vertices to draw a line.");

    graphics.line(&[Vec2::ZERO, Vec2::new(10.0, 0.0)]).unwrap();
    assert_eq!(graphics.stats().draw_calls, 1);
}

#[test]
fn test_format_change_after_full_stream() {
    let config = GraphicsConfig::default()
        .frames_in_flight(1)
        .stream_buffer_sizes(1024, 1024);
    let (mut graphics, backend) = mock_graphics_with(config, MockBackend::new());
    let texture = image(&mut graphics, 8, 8);

    // 12 quads fill 960 of 1024 bytes; the points no longer fit behind them.
    for i in 0..12 {
        graphics
            .draw_quad(&texture, Rect::new(i as f32 * 8.0, 0.0, 8.0, 8.0), square(1.0))
            .unwrap();
    }
    let points: Vec<Vec2> = (0..10).map(|i| Vec2::new(i as f32, 50.0)).collect();
    graphics.points(&points, None).unwrap();
    graphics.present().unwrap();

    let draws = backend.draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].vertex_count, 48);
    assert_eq!(draws[1].primitive, PrimitiveType::Points);
    assert_eq!(draws[1].vertex_count, 10);
    assert_eq!(draws[1].positions_xy()[9], [9.0, 50.0]);
}

#[test]
fn test_short_fan_then_triangle_list() {
    let (mut graphics, backend) = mock_graphics();

    // Two fan vertices make no triangle, so the batch has nothing to index.
    let mut data = graphics
        .request_batched_draw(&vesper_graphics::BatchedDrawCommand {
            formats: [CommonFormat::Xy, CommonFormat::Rgba8],
            index_mode: vesper_graphics::types::TriangleIndexMode::Fan,
            vertex_count: 2,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(data.cast::<Vec2>(0).len(), 2);

    let mut data = graphics
        .request_batched_draw(&vesper_graphics::BatchedDrawCommand {
            formats: [CommonFormat::Xy, CommonFormat::Rgba8],
            vertex_count: 3,
            ..Default::default()
        })
        .unwrap();
    data.cast::<Vec2>(0).copy_from_slice(&[Vec2::ZERO, Vec2::X, Vec2::Y]);
    graphics.present().unwrap();

    let draws = backend.draws();
    assert_eq!(draws.len(), 1);
    assert!(!draws[0].is_indexed());
    assert_eq!(draws[0].positions_xy(), vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]);
}
