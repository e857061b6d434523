//! Shared setup for the mock-backed graphics tests.

#![allow(dead_code)]

use vesper_graphics::pixel_format::PixelFormat;
use vesper_graphics::{Graphics, GraphicsConfig, Texture, TextureSettings};
use vesper_test_utils::MockBackend;

/// A graphics module on an 800x600 mock screen, plus a handle to inspect its calls.
pub fn mock_graphics() -> (Graphics<MockBackend>, MockBackend) {
    mock_graphics_with(GraphicsConfig::default(), MockBackend::new())
}

pub fn mock_graphics_with(config: GraphicsConfig, backend: MockBackend) -> (Graphics<MockBackend>, MockBackend) {
    let graphics = Graphics::new(backend.clone(), config).expect("mock backend never fails to initialize");
    backend.clear_calls();
    (graphics, backend)
}

pub fn canvas(graphics: &mut Graphics<MockBackend>, width: u32, height: u32) -> Texture {
    graphics
        .new_texture(TextureSettings::render_target(PixelFormat::Rgba8Unorm, width, height), None)
        .unwrap()
}

pub fn image(graphics: &mut Graphics<MockBackend>, width: u32, height: u32) -> Texture {
    let settings = TextureSettings {
        width,
        height,
        ..Default::default()
    };
    graphics.new_texture(settings, None).unwrap()
}
