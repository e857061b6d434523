//! Headless rendering on a real device.

use vesper_core::color::Color;
use vesper_graphics::pixel_format::PixelFormat;
use vesper_graphics::{
    BackendKind, DrawMode, Graphics, GraphicsConfig, RenderTargets, TextureRegion, TextureSettings,
};

fn headless(kind: BackendKind) -> Option<Graphics<vesper_graphics::Backend>> {
    let config = GraphicsConfig::default().backends([kind]);
    match Graphics::headless(config, 64, 64) {
        Ok(graphics) => Some(graphics),
        Err(e) => {
            println!("GPU not available: {}", e);
            None
        }
    }
}

fn render_red_square(graphics: &mut Graphics<vesper_graphics::Backend>) -> Vec<u8> {
    let target = graphics
        .new_texture(TextureSettings::render_target(PixelFormat::Rgba8Unorm, 16, 16), None)
        .unwrap();

    graphics.set_render_targets(RenderTargets::color(target.clone())).unwrap();
    graphics.clear_all(Color::BLACK).unwrap();
    graphics.set_color(Color::new(1.0, 0.0, 0.0, 1.0)).unwrap();
    graphics.rectangle(DrawMode::Fill, 0.0, 0.0, 8.0, 16.0).unwrap();
    graphics.set_render_targets(RenderTargets::screen()).unwrap();

    graphics
        .readback_texture_immediate(TextureRegion::base(&target))
        .unwrap()
        .to_vec()
}

fn assert_left_half_red(pixels: &[u8]) {
    assert_eq!(pixels.len(), 16 * 16 * 4);
    let pixel = |x: usize, y: usize| &pixels[(y * 16 + x) * 4..(y * 16 + x) * 4 + 4];
    assert_eq!(pixel(2, 8), &[255, 0, 0, 255]);
    assert_eq!(pixel(12, 8), &[0, 0, 0, 255]);
}

#[test]
#[ignore] // Requires GPU - run with: cargo test --test gpu -- --ignored
fn test_wgpu_draws_into_render_target() {
    if let Some(mut graphics) = headless(BackendKind::Wgpu) {
        let pixels = render_red_square(&mut graphics);
        assert_left_half_red(&pixels);
        graphics.present().unwrap();
    }
}

#[test]
#[ignore] // Requires GPU
fn test_opengl_draws_into_render_target() {
    if let Some(mut graphics) = headless(BackendKind::OpenGl) {
        let pixels = render_red_square(&mut graphics);
        assert_left_half_red(&pixels);
        graphics.present().unwrap();
    }
}

#[test]
#[ignore] // Requires GPU
fn test_reports_renderer() {
    if let Some(graphics) = headless(BackendKind::Wgpu) {
        assert_eq!(graphics.backend_kind(), BackendKind::Wgpu);
        assert!(!graphics.renderer_info().name.is_empty());
        assert!(graphics.limit(vesper_graphics::SystemLimit::TextureSize) >= 2048.0);
    }
}
