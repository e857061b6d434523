//! Custom-shader draws without vertex attributes, and screenshot capture (no GPU required).

mod common;

use common::{image, mock_graphics, mock_graphics_with};
use glam::{Mat4, Vec3};
use vesper_graphics::capability::{Feature, SystemLimit};
use vesper_graphics::readback::ReadbackSource;
use vesper_graphics::resource::ShaderBinding;
use vesper_graphics::types::{BufferDataUsage, BufferUsage, CullMode, IndexFormat, PrimitiveType, TextureType};
use vesper_graphics::{
    BufferSettings, Capabilities, DrawMode, Graphics, GraphicsConfig, GraphicsError, ReadbackStatus, Shader, ShaderCompileOptions,
    ShaderSources,
};
use vesper_test_utils::{BackendCall, MockBackend};

fn custom_shader(graphics: &mut Graphics<MockBackend>) -> Shader {
    let shader = graphics
        .new_shader(&ShaderSources::graphics(Some("generated vertices"), None), &ShaderCompileOptions::default())
        .unwrap();
    graphics.set_shader(Some(shader.clone())).unwrap();
    shader
}

fn index_buffer(count: u64) -> BufferSettings {
    BufferSettings {
        index_format: Some(IndexFormat::U16),
        ..BufferSettings::new(count * 2, BufferUsage::INDEX, BufferDataUsage::Static)
    }
}

#[test]
fn test_requires_custom_shader() {
    let (mut graphics, backend) = mock_graphics();

    let err = graphics
        .draw_shader_vertices(PrimitiveType::Triangles, 3, 1, None)
        .unwrap_err();
    assert!(matches!(err, GraphicsError::Usage(_)));
    assert_eq!(err.to_string(), "draw_shader_vertices can only be used with a custom shader.");
    assert_eq!(backend.count_draws(), 0);
}

#[test]
fn test_requires_glsl3() {
    let caps = Capabilities::builder()
        .texture_type(TextureType::D2, true)
        .limit(SystemLimit::TextureSize, 4096.0)
        .build();
    let (mut graphics, _backend) = mock_graphics_with(GraphicsConfig::default(), MockBackend::new().with_capabilities(caps));

    let err = graphics.draw_instanced(3, 1, None).unwrap_err();
    assert!(matches!(err, GraphicsError::Unsupported(_)));
}

#[test]
fn test_pending_batch_is_drawn_first() {
    let (mut graphics, backend) = mock_graphics();
    graphics.rectangle(DrawMode::Fill, 0.0, 0.0, 10.0, 10.0).unwrap();
    let shader = custom_shader(&mut graphics);

    graphics.draw_shader_vertices(PrimitiveType::Triangles, 6, 1, None).unwrap();

    let draws = backend.draws();
    assert_eq!(draws.len(), 2);
    assert!(matches!(draws[0].shader, ShaderBinding::Standard(_)));

    let direct = &draws[1];
    assert_eq!(direct.shader, ShaderBinding::Custom(shader.id()));
    assert_eq!(direct.vertex_count, 6);
    assert!(!direct.is_indexed());
    assert!(direct.vertex_data.iter().all(Vec::is_empty));
    assert_eq!(graphics.stats().draw_calls, 2);
}

#[test]
fn test_instances_and_state_reach_backend() {
    let (mut graphics, backend) = mock_graphics();
    custom_shader(&mut graphics);
    graphics.translate(5.0, 7.0);
    graphics.set_mesh_cull_mode(CullMode::Back);
    let texture = image(&mut graphics, 4, 4);

    graphics.draw_instanced(3, 40, Some(&texture)).unwrap();

    let draw = backend.last_draw().unwrap();
    assert_eq!(draw.primitive, PrimitiveType::Triangles);
    assert_eq!(draw.instance_count, 40);
    assert_eq!(draw.texture, Some(texture.id()));
    assert_eq!(draw.state.cull_mode, CullMode::Back);
    assert_eq!(draw.state.transform, Mat4::from_translation(Vec3::new(5.0, 7.0, 0.0)));

    graphics.draw_shader_vertices(PrimitiveType::Points, 1, 0, None).unwrap();
    assert_eq!(backend.last_draw().unwrap().instance_count, 1);
}

#[test]
fn test_instancing_needs_feature() {
    let mut builder = Capabilities::builder()
        .texture_type(TextureType::D2, true)
        .limit(SystemLimit::TextureSize, 4096.0);
    for feature in Feature::ALL {
        builder = builder.feature(*feature, *feature != Feature::Instancing);
    }
    let caps = builder.build();
    let (mut graphics, backend) = mock_graphics_with(GraphicsConfig::default(), MockBackend::new().with_capabilities(caps));
    custom_shader(&mut graphics);

    assert!(matches!(
        graphics.draw_instanced(3, 2, None),
        Err(GraphicsError::Unsupported(_))
    ));
    graphics.draw_instanced(3, 1, None).unwrap();
    assert_eq!(backend.count_draws(), 1);
}

#[test]
fn test_fan_uses_generated_indices() {
    let (mut graphics, backend) = mock_graphics();
    custom_shader(&mut graphics);

    graphics.draw_shader_vertices(PrimitiveType::TriangleFan, 5, 1, None).unwrap();

    let draw = backend.last_draw().unwrap();
    assert_eq!(draw.primitive, PrimitiveType::Triangles);
    assert_eq!(draw.indices, vec![0, 1, 2, 0, 2, 3, 0, 3, 4]);
    assert_eq!(draw.vertex_count, 5);

    let err = graphics
        .draw_shader_vertices(PrimitiveType::TriangleFan, 70_000, 1, None)
        .unwrap_err();
    assert!(matches!(err, GraphicsError::Usage(_)));
}

#[test]
fn test_indexed_draw_validates_buffer() {
    let (mut graphics, backend) = mock_graphics();
    custom_shader(&mut graphics);

    let storage = BufferSettings::new(64, BufferUsage::SHADER_STORAGE, BufferDataUsage::Dynamic);
    let storage = graphics.new_buffer(storage, None).unwrap();
    let err = graphics
        .draw_shader_vertices_indexed(&storage, 3, 1, 0, None)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "The buffer passed to draw_shader_vertices must be an index buffer."
    );

    let indices = graphics.new_buffer(index_buffer(12), None).unwrap();
    assert!(matches!(
        graphics.draw_shader_vertices_indexed(&indices, 6, 1, 7, None),
        Err(GraphicsError::Usage(_))
    ));
    assert_eq!(backend.count_draws(), 0);

    graphics.draw_shader_vertices_indexed(&indices, 6, 3, 6, None).unwrap();
    let draw = backend.last_draw().unwrap();
    assert_eq!(draw.index_buffer, Some((indices.id(), IndexFormat::U16, 6)));
    assert_eq!(draw.index_count, 6);
    assert_eq!(draw.instance_count, 3);
}

#[test]
fn test_screenshot_resolves_at_present() {
    let (mut graphics, backend) = mock_graphics();
    graphics.rectangle(DrawMode::Fill, 0.0, 0.0, 10.0, 10.0).unwrap();

    let screenshot = graphics.capture_screenshot();
    assert_eq!(screenshot.source(), ReadbackSource::Screen { width: 800, height: 600 });
    assert_eq!(screenshot.status(), ReadbackStatus::Pending);
    assert!(screenshot.wait().is_err());
    assert_eq!(backend.count_draws(), 0);

    graphics.present().unwrap();

    assert_eq!(screenshot.status(), ReadbackStatus::Complete);
    assert_eq!(screenshot.data().unwrap().len(), 800 * 600 * 4);
    assert_eq!(graphics.pending_readbacks(), 0);

    // The batch was drawn before the copy, and the copy before the present.
    let calls = backend.calls();
    let position = |wanted: fn(&BackendCall) -> bool| calls.iter().position(wanted).unwrap();
    let draw = position(|call| matches!(call, BackendCall::Draw(_)));
    let readback = position(|call| matches!(call, BackendCall::Readback { .. }));
    let present = position(|call| matches!(call, BackendCall::Present));
    assert!(draw < readback && readback < present);
}

#[test]
fn test_screenshot_fails_after_resize() {
    let (mut graphics, _backend) = mock_graphics();
    let screenshot = graphics.capture_screenshot();
    graphics.resize(320, 200).unwrap();
    graphics.present().unwrap();

    assert!(screenshot.has_error());
    let fresh = graphics.capture_screenshot();
    graphics.present().unwrap();
    assert_eq!(fresh.data().unwrap().len(), 320 * 200 * 4);
}

#[test]
fn test_screenshot_backend_failure() {
    let (mut graphics, backend) = mock_graphics();
    let screenshot = graphics.capture_screenshot();
    backend.fail_calls("readback");
    graphics.present().unwrap();

    assert_eq!(
        screenshot.status(),
        ReadbackStatus::Failed("Graphics backend error: mock readback failure".to_string())
    );
}
