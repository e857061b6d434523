//! State and transform stack tests (no GPU required).

mod common;

use common::{canvas, mock_graphics, mock_graphics_with};
use glam::{Mat4, Vec2};
use vesper_core::color::Color;
use vesper_core::geometry::Rect;
use vesper_graphics::capability::{Feature, SystemLimit};
use vesper_graphics::types::{CompareMode, LineJoin, StackType, StencilAction, TextureType};
use vesper_graphics::{
    BlendAlpha, BlendMode, Capabilities, DisplayState, DrawMode, GraphicsConfig, GraphicsError, RenderTargets,
};
use vesper_test_utils::MockBackend;

#[test]
fn test_pop_without_push() {
    let (mut graphics, _backend) = mock_graphics();

    let err = graphics.pop().unwrap_err();
    assert!(matches!(err, GraphicsError::Usage(_)));
    assert_eq!(err.to_string(), "Minimum stack depth reached (more pops than pushes?)");
}

#[test]
fn test_push_past_max_depth() {
    let config = GraphicsConfig::default().max_stack_depth(3);
    let (mut graphics, _backend) = mock_graphics_with(config, MockBackend::new());

    for _ in 0..3 {
        graphics.push(StackType::All).unwrap();
    }
    let err = graphics.push(StackType::Transform).unwrap_err();
    assert_eq!(err.to_string(), "Maximum stack depth reached (more pushes than pops?)");
    assert_eq!(graphics.stack_depth(), 3);

    for _ in 0..3 {
        graphics.pop().unwrap();
    }
    assert_eq!(graphics.stack_depth(), 0);
    assert!(graphics.pop().is_err());
}

#[test]
fn test_push_all_round_trip() {
    let (mut graphics, _backend) = mock_graphics();
    let before = graphics.display_state();

    graphics.push(StackType::All).unwrap();
    graphics.set_color(Color::new(0.5, 0.25, 1.0, 1.0)).unwrap();
    graphics.set_line_width(4.0);
    graphics.set_line_join(LineJoin::Bevel);
    graphics.set_point_size(3.0).unwrap();
    graphics.set_scissor(Rect::new(10, 10, 100, 50)).unwrap();
    graphics.set_blend_mode(BlendMode::Add, BlendAlpha::Multiply).unwrap();
    graphics.set_stencil_mode(StencilAction::Replace, CompareMode::Always, 1).unwrap();
    graphics.set_wireframe(true).unwrap();
    graphics.translate(50.0, 50.0);
    graphics.rotate(1.0);
    graphics.pop().unwrap();

    assert_eq!(graphics.display_state(), before);
    assert_eq!(graphics.transform(), Mat4::IDENTITY);
    assert_eq!(graphics.pixel_scale(), 1.0);
}

#[test]
fn test_transform_push_keeps_state_changes() {
    let (mut graphics, _backend) = mock_graphics();

    graphics.push(StackType::Transform).unwrap();
    graphics.set_color(Color::new(1.0, 0.0, 0.0, 1.0)).unwrap();
    graphics.translate(5.0, 5.0);
    graphics.pop().unwrap();

    assert_eq!(graphics.color(), Color::new(1.0, 0.0, 0.0, 1.0));
    assert_eq!(graphics.transform(), Mat4::IDENTITY);
}

#[test]
fn test_pop_restores_render_targets() {
    let (mut graphics, backend) = mock_graphics();
    let target = canvas(&mut graphics, 64, 64);

    graphics.push(StackType::All).unwrap();
    graphics.set_render_targets(RenderTargets::color(target.clone())).unwrap();
    assert_eq!(graphics.dimensions(), (64, 64));
    graphics.rectangle(DrawMode::Fill, 0.0, 0.0, 8.0, 8.0).unwrap();
    graphics.pop().unwrap();

    assert!(!graphics.is_render_target_active());
    assert!(backend.bound_targets().unwrap().is_screen());
    assert_eq!(graphics.dimensions(), (800, 600));
    // The rectangle was drawn into the canvas before switching back.
    assert_eq!(backend.count_draws(), 1);
}

#[test]
fn test_pop_only_reapplies_changed_state() {
    let (mut graphics, backend) = mock_graphics();

    graphics.push(StackType::All).unwrap();
    graphics.set_line_width(2.0);
    graphics.pop().unwrap();

    assert_eq!(backend.count_render_target_switches(), 0);
    assert_eq!(backend.count_draws(), 0);
}

#[test]
fn test_transform_points() {
    let (mut graphics, _backend) = mock_graphics();

    graphics.translate(100.0, 0.0);
    graphics.scale(2.0, 2.0);

    let screen = graphics.transform_point(Vec2::new(10.0, 10.0));
    assert_eq!(screen, Vec2::new(120.0, 20.0));
    let local = graphics.inverse_transform_point(screen);
    assert!((local - Vec2::new(10.0, 10.0)).length() < 1e-4);
    assert_eq!(graphics.pixel_scale(), 2.0);

    graphics.origin();
    assert_eq!(graphics.transform(), Mat4::IDENTITY);
}

#[test]
fn test_reset_restores_defaults() {
    let (mut graphics, _backend) = mock_graphics();

    graphics.set_color(Color::new(0.1, 0.2, 0.3, 1.0)).unwrap();
    graphics.set_scissor(Rect::new(0, 0, 10, 10)).unwrap();
    graphics.translate(3.0, 4.0);
    graphics.reset().unwrap();

    assert_eq!(graphics.display_state(), DisplayState::default());
    assert_eq!(graphics.transform(), Mat4::IDENTITY);
}

#[test]
fn test_negative_scissor_rejected() {
    let (mut graphics, _backend) = mock_graphics();

    let err = graphics.set_scissor(Rect::new(0, 0, -5, 10)).unwrap_err();
    assert!(matches!(err, GraphicsError::Usage(_)));
    assert_eq!(graphics.scissor(), None);
}

#[test]
fn test_intersect_scissor() {
    let (mut graphics, _backend) = mock_graphics();

    graphics.set_scissor(Rect::new(0, 0, 100, 100)).unwrap();
    graphics.intersect_scissor(Rect::new(50, 25, 100, 100)).unwrap();

    assert_eq!(graphics.scissor(), Some(Rect::new(50, 25, 50, 75)));
}

#[test]
fn test_blend_modes_check_capabilities() {
    let caps = Capabilities::builder()
        .texture_type(TextureType::D2, true)
        .limit(SystemLimit::TextureSize, 4096.0)
        .limit(SystemLimit::RenderTargets, 1.0)
        .build();
    let (mut graphics, _backend) = mock_graphics_with(GraphicsConfig::default(), MockBackend::new().with_capabilities(caps));

    assert!(!graphics.has_feature(Feature::Lighten));
    let err = graphics.set_blend_mode(BlendMode::Lighten, BlendAlpha::Premultiplied).unwrap_err();
    assert!(matches!(err, GraphicsError::Unsupported(_)));

    let err = graphics.set_blend_mode(BlendMode::Multiply, BlendAlpha::Multiply).unwrap_err();
    assert!(matches!(err, GraphicsError::Usage(_)));

    graphics.set_blend_mode(BlendMode::Add, BlendAlpha::Premultiplied).unwrap();
    assert_eq!(graphics.blend_mode(), Some((BlendMode::Add, BlendAlpha::Premultiplied)));
}

#[test]
fn test_stencil_needs_stencil_attachment() {
    let (mut graphics, _backend) = mock_graphics();
    let target = canvas(&mut graphics, 32, 32);

    graphics.set_render_targets(RenderTargets::color(target)).unwrap();
    let err = graphics
        .set_stencil_mode(StencilAction::Replace, CompareMode::Always, 1)
        .unwrap_err();
    assert!(matches!(err, GraphicsError::Usage(_)));

    // The screen has a stencil buffer by default.
    graphics.set_render_targets(RenderTargets::screen()).unwrap();
    graphics
        .set_stencil_mode(StencilAction::Replace, CompareMode::Always, 1)
        .unwrap();
}

#[test]
fn test_projection_validation() {
    let (mut graphics, _backend) = mock_graphics();

    assert!(graphics.set_ortho_projection(100.0, 100.0, 5.0, 1.0).is_err());
    assert!(graphics.set_perspective_projection(1.0, 1.0, 0.0, 10.0).is_err());

    let custom = Mat4::from_scale(glam::Vec3::splat(0.5));
    graphics.set_custom_projection(custom).unwrap();
    assert_eq!(graphics.projection(), custom);

    graphics.reset_projection().unwrap();
    assert_ne!(graphics.projection(), custom);
    assert_eq!(graphics.display_state().custom_projection, None);
}

#[test]
fn test_pop_reapplies_custom_projection_after_target_switch() {
    let (mut graphics, _backend) = mock_graphics();
    let target = canvas(&mut graphics, 64, 64);
    let custom = Mat4::from_scale(glam::Vec3::new(0.5, 0.25, 1.0));

    graphics.set_render_targets(RenderTargets::color(target)).unwrap();
    graphics.set_custom_projection(custom).unwrap();
    graphics.push(StackType::All).unwrap();
    graphics.set_render_targets(RenderTargets::screen()).unwrap();
    graphics.set_custom_projection(custom).unwrap();
    graphics.pop().unwrap();

    // Rebinding the canvas resets the projection; the saved one must come back.
    assert_eq!(graphics.dimensions(), (64, 64));
    assert_eq!(graphics.display_state().custom_projection, Some(custom));
    assert_eq!(graphics.projection(), custom);
}

#[test]
fn test_pop_restores_default_projection() {
    let (mut graphics, _backend) = mock_graphics();
    let default_projection = graphics.projection();

    graphics.push(StackType::All).unwrap();
    graphics.set_custom_projection(Mat4::from_scale(glam::Vec3::splat(2.0))).unwrap();
    graphics.pop().unwrap();

    assert_eq!(graphics.display_state().custom_projection, None);
    assert_eq!(graphics.projection(), default_projection);
}

#[test]
fn test_failed_pop_changes_nothing() {
    let (mut graphics, backend) = mock_graphics();
    let target = canvas(&mut graphics, 32, 32);
    let red = Color::new(1.0, 0.0, 0.0, 1.0);

    graphics.push(StackType::All).unwrap();
    graphics.set_color(red).unwrap();
    graphics.set_render_targets(RenderTargets::color(target)).unwrap();
    let before = graphics.display_state();

    backend.fail_calls("set_render_targets");
    assert!(matches!(graphics.pop().unwrap_err(), GraphicsError::Backend(_)));
    assert_eq!(graphics.stack_depth(), 1);
    assert_eq!(graphics.display_state(), before);
    assert_eq!(graphics.color(), red);
    assert!(graphics.is_render_target_active());

    backend.stop_failing();
    graphics.pop().unwrap();
    assert_eq!(graphics.stack_depth(), 0);
    assert_eq!(graphics.color(), Color::WHITE);
    assert!(!graphics.is_render_target_active());
}
