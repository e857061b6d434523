//! Resource creation, copies, compute dispatch and readback tests (no GPU required).

mod common;

use common::{canvas, image, mock_graphics, mock_graphics_with};
use vesper_core::geometry::Rect;
use vesper_graphics::capability::{Feature, SystemLimit};
use vesper_graphics::pixel_format::{PixelFormat, PixelFormatUsage};
use vesper_graphics::resource::ReleasedResource;
use vesper_graphics::types::{BufferDataUsage, BufferUsage, IndexFormat, TextureType};
use vesper_graphics::{
    BufferSettings, Capabilities, ComputeBindings, GraphicsConfig, GraphicsError, ReadbackStatus, RenderTargets,
    ShaderCompileOptions, ShaderSources, TextureRegion, TextureSettings,
};
use vesper_test_utils::{BackendCall, MockBackend};

fn storage(size: u64) -> BufferSettings {
    BufferSettings::new(
        size,
        BufferUsage::SHADER_STORAGE | BufferUsage::COPY_SOURCE | BufferUsage::COPY_DEST,
        BufferDataUsage::Dynamic,
    )
}

#[test]
fn test_texture_stats() {
    let (mut graphics, _backend) = mock_graphics();

    let texture = image(&mut graphics, 16, 16);
    let stats = graphics.stats();
    assert_eq!(stats.textures, 1);
    assert_eq!(stats.texture_memory, 16 * 16 * 4);

    drop(texture);
    graphics.present().unwrap();
    assert_eq!(graphics.stats().textures, 0);
    assert_eq!(graphics.stats().texture_memory, 0);
}

#[test]
fn test_dropped_resources_are_released_at_present() {
    let (mut graphics, backend) = mock_graphics();
    let texture = image(&mut graphics, 4, 4);
    let buffer = graphics.new_buffer(storage(64), None).unwrap();
    let (texture_id, buffer_id) = (texture.id(), buffer.id());

    drop(texture);
    drop(buffer);
    assert!(backend.released().is_empty());

    graphics.present().unwrap();
    let released = backend.released();
    assert!(released.contains(&ReleasedResource::Texture {
        id: texture_id,
        memory: 4 * 4 * 4
    }));
    assert!(released.contains(&ReleasedResource::Buffer { id: buffer_id }));
}

#[test]
fn test_texture_validation() {
    let (mut graphics, _backend) = mock_graphics();

    let zero = TextureSettings {
        width: 0,
        ..Default::default()
    };
    assert!(matches!(graphics.new_texture(zero, None), Err(GraphicsError::Usage(_))));

    let huge = TextureSettings {
        width: 100_000,
        ..Default::default()
    };
    assert!(matches!(graphics.new_texture(huge, None), Err(GraphicsError::Unsupported(_))));

    let compressed_target = TextureSettings::render_target(PixelFormat::Dxt1Unorm, 64, 64);
    assert!(graphics.new_texture(compressed_target, None).is_err());

    let msaa_mips = TextureSettings {
        msaa: 4,
        mipmaps: 2,
        ..TextureSettings::render_target(PixelFormat::Rgba8Unorm, 64, 64)
    };
    assert_eq!(
        graphics.new_texture(msaa_mips, None).unwrap_err().to_string(),
        "MSAA textures cannot have mipmaps."
    );

    let short = TextureSettings {
        width: 4,
        height: 4,
        ..Default::default()
    };
    let err = graphics.new_texture(short, Some(&[0; 10])).unwrap_err();
    assert!(matches!(err, GraphicsError::Usage(_)));
}

#[test]
fn test_texture_type_and_format_support() {
    let caps = Capabilities::builder()
        .texture_type(TextureType::D2, true)
        .limit(SystemLimit::TextureSize, 4096.0)
        .build();
    let backend = MockBackend::new()
        .with_capabilities(caps)
        .with_format_usage(|format| {
            if format == PixelFormat::Rgba16Float {
                PixelFormatUsage::SAMPLE
            } else {
                PixelFormatUsage::all()
            }
        });
    let (mut graphics, _backend) = mock_graphics_with(GraphicsConfig::default(), backend);

    let cube = TextureSettings {
        texture_type: TextureType::Cube,
        layers: 6,
        ..Default::default()
    };
    assert!(matches!(graphics.new_texture(cube, None), Err(GraphicsError::Unsupported(_))));

    assert!(graphics.is_pixel_format_supported(PixelFormat::Rgba16Float, PixelFormatUsage::SAMPLE));
    assert!(!graphics.is_pixel_format_supported(PixelFormat::Rgba16Float, PixelFormatUsage::RENDERTARGET));
    let hdr_target = TextureSettings::render_target(PixelFormat::Rgba16Float, 64, 64);
    assert!(matches!(graphics.new_texture(hdr_target, None), Err(GraphicsError::Unsupported(_))));
}

#[test]
fn test_write_texture_flushes_batch_using_it() {
    let (mut graphics, backend) = mock_graphics();
    let texture = image(&mut graphics, 8, 8);
    let full = Rect::new(0.0, 0.0, 8.0, 8.0);

    graphics.draw_quad(&texture, full, Rect::new(0.0, 0.0, 1.0, 1.0)).unwrap();
    graphics.write_texture(&texture, 0, 0, Rect::new(0, 0, 2, 2), &[255; 16]).unwrap();

    let calls = backend.calls();
    let draw = calls.iter().position(|c| matches!(c, BackendCall::Draw(_))).unwrap();
    let write = calls
        .iter()
        .position(|c| matches!(c, BackendCall::WriteTexture { size: 16, .. }))
        .unwrap();
    assert!(draw < write);

    let err = graphics
        .write_texture(&texture, 0, 0, Rect::new(6, 6, 4, 4), &[0; 64])
        .unwrap_err();
    assert_eq!(err.to_string(), "Rectangle is outside the bounds of the texture.");
}

#[test]
fn test_buffer_validation() {
    let (mut graphics, _backend) = mock_graphics();

    assert!(graphics.new_buffer(storage(0), None).is_err());

    let index = BufferSettings::new(64, BufferUsage::INDEX, BufferDataUsage::Static);
    assert_eq!(
        graphics.new_buffer(index.clone(), None).unwrap_err().to_string(),
        "Index buffers need an index format."
    );
    let index = BufferSettings {
        index_format: Some(IndexFormat::U32),
        ..index
    };
    let buffer = graphics.new_buffer(index, None).unwrap();
    assert_eq!(buffer.index_count(), 16);

    let immutable = BufferSettings {
        immutable: true,
        ..storage(16)
    };
    assert!(graphics.new_buffer(immutable.clone(), None).is_err());
    let buffer = graphics.new_buffer(immutable, Some(&[1; 16])).unwrap();
    assert_eq!(
        graphics.write_buffer(&buffer, 0, &[0; 4]).unwrap_err().to_string(),
        "Cannot modify an immutable buffer."
    );
}

#[test]
fn test_copy_buffer() {
    let (mut graphics, backend) = mock_graphics();
    let source = graphics.new_buffer(storage(16), Some(&[7; 16])).unwrap();
    let dest = graphics.new_buffer(storage(16), None).unwrap();

    graphics.copy_buffer(&source, &dest, 4, 8, 8).unwrap();
    assert_eq!(
        backend.buffer_contents(dest.id()).unwrap(),
        vec![0, 0, 0, 0, 0, 0, 0, 0, 7, 7, 7, 7, 7, 7, 7, 7]
    );

    let err = graphics.copy_buffer(&source, &dest, 12, 0, 8).unwrap_err();
    assert!(matches!(err, GraphicsError::Usage(_)));

    let err = graphics.copy_buffer(&dest, &dest, 0, 4, 8).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Copying a portion of a buffer to the same buffer requires non-overlapping ranges."
    );
    graphics.copy_buffer(&dest, &dest, 0, 8, 8).unwrap();
}

#[test]
fn test_copy_buffer_requires_feature() {
    let caps = Capabilities::builder()
        .texture_type(TextureType::D2, true)
        .limit(SystemLimit::TextureSize, 4096.0)
        .build();
    let (mut graphics, _backend) = mock_graphics_with(GraphicsConfig::default(), MockBackend::new().with_capabilities(caps));
    let a = graphics.new_buffer(storage(16), None).unwrap();
    let b = graphics.new_buffer(storage(16), None).unwrap();

    assert!(!graphics.has_feature(Feature::CopyBuffer));
    let err = graphics.copy_buffer(&a, &b, 0, 0, 16).unwrap_err();
    assert!(matches!(err, GraphicsError::Unsupported(_)));
}

#[test]
fn test_texture_buffer_copies() {
    let (mut graphics, backend) = mock_graphics();
    let target = canvas(&mut graphics, 16, 16);
    let buffer = graphics.new_buffer(storage(16 * 16 * 4), None).unwrap();

    graphics
        .copy_texture_to_buffer(TextureRegion::base(&target), &buffer, 0, 0)
        .unwrap();
    let region = TextureRegion {
        rect: Rect::new(4, 4, 4, 4),
        ..TextureRegion::base(&target)
    };
    graphics.copy_buffer_to_texture(&buffer, 0, 16, region).unwrap();

    let copies: Vec<_> = backend
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            BackendCall::CopyTextureToBuffer(copy) | BackendCall::CopyBufferToTexture(copy) => Some(copy),
            _ => None,
        })
        .collect();
    assert_eq!(copies.len(), 2);
    assert_eq!(copies[0].buffer_width, 16);
    assert_eq!(copies[1].rect, Rect::new(4, 4, 4, 4));

    // A 4 pixel wide row pitch cannot hold the 16 pixel source rows.
    assert!(
        graphics
            .copy_texture_to_buffer(TextureRegion::base(&target), &buffer, 0, 4)
            .is_err()
    );

    graphics.set_render_targets(RenderTargets::color(target.clone())).unwrap();
    let err = graphics
        .copy_texture_to_buffer(TextureRegion::base(&target), &buffer, 0, 0)
        .unwrap_err();
    assert_eq!(err.to_string(), "Cannot copy from an active render target.");
}

#[test]
fn test_dispatch_threadgroups() {
    let (mut graphics, backend) = mock_graphics();
    let compute = graphics
        .new_shader(&ShaderSources::compute("mock kernel"), &ShaderCompileOptions::default())
        .unwrap();
    let buffer = graphics.new_buffer(storage(256), None).unwrap();
    let bindings = ComputeBindings::default().with_buffer(0, &buffer);

    graphics.dispatch_threadgroups(&compute, [8, 1, 1], &bindings).unwrap();
    assert_eq!(backend.count_dispatches(), 1);

    let err = graphics.dispatch_threadgroups(&compute, [0, 1, 1], &bindings).unwrap_err();
    assert_eq!(err.to_string(), "Threadgroup dispatch size must be positive.");

    let err = graphics
        .dispatch_threadgroups(&compute, [1, 1, 100_000], &bindings)
        .unwrap_err();
    assert!(err.to_string().starts_with("Too many threadgroups dispatched"));

    let drawing = graphics
        .new_shader(&ShaderSources::graphics(None, None), &ShaderCompileOptions::default())
        .unwrap();
    let err = graphics.dispatch_threadgroups(&drawing, [1, 1, 1], &bindings).unwrap_err();
    assert_eq!(err.to_string(), "Only compute shaders can have threadgroups dispatched.");

    let err = graphics.set_shader(Some(compute)).unwrap_err();
    assert!(matches!(err, GraphicsError::Usage(_)));
}

#[test]
fn test_shader_stages_are_shared() {
    let (mut graphics, backend) = mock_graphics();

    let first = graphics
        .new_shader(&ShaderSources::graphics(None, Some("pixel a")), &ShaderCompileOptions::default())
        .unwrap();
    let second = graphics
        .new_shader(&ShaderSources::graphics(None, Some("pixel a")), &ShaderCompileOptions::default())
        .unwrap();
    // Default vertex stage plus one pixel stage.
    assert_eq!(backend.count_stage_compiles(), 2);
    assert_ne!(first.id(), second.id());
    assert_eq!(first.stages().ids(), second.stages().ids());

    let defines = ShaderCompileOptions {
        defines: vec![("USE_FOG".to_string(), "1".to_string())],
    };
    graphics
        .new_shader(&ShaderSources::graphics(None, Some("pixel a")), &defines)
        .unwrap();
    assert_eq!(backend.count_stage_compiles(), 4);
}

#[test]
fn test_released_stages_leave_cache() {
    let (mut graphics, backend) = mock_graphics();
    let sources = ShaderSources::graphics(None, Some("pixel b"));

    let shader = graphics.new_shader(&sources, &ShaderCompileOptions::default()).unwrap();
    drop(shader);
    graphics.present().unwrap();
    assert!(
        backend
            .released()
            .iter()
            .any(|r| matches!(r, ReleasedResource::ShaderStage { .. }))
    );

    graphics.new_shader(&sources, &ShaderCompileOptions::default()).unwrap();
    assert_eq!(backend.count_stage_compiles(), 4);
}

#[test]
fn test_compute_cannot_mix_stages() {
    let (mut graphics, _backend) = mock_graphics();
    let sources = ShaderSources {
        vertex: Some("v"),
        ..ShaderSources::compute("k")
    };

    let err = graphics.new_shader(&sources, &ShaderCompileOptions::default()).unwrap_err();
    assert!(matches!(err, GraphicsError::Usage(_)));
}

#[test]
fn test_shader_compile_error_surfaces() {
    let (mut graphics, _backend) = mock_graphics();
    let sources = ShaderSources::graphics(None, Some("syntax error here"));

    let err = graphics.new_shader(&sources, &ShaderCompileOptions::default()).unwrap_err();
    assert!(matches!(err, GraphicsError::Backend(_)));
}

#[test]
fn test_async_readback_completes_on_present() {
    let (mut graphics, _backend) = mock_graphics();
    let buffer = graphics.new_buffer(storage(8), Some(&[1, 2, 3, 4, 5, 6, 7, 8])).unwrap();

    let readback = graphics.readback_buffer(&buffer, 2, 4).unwrap();
    assert_eq!(graphics.pending_readbacks(), 1);
    assert_eq!(readback.status(), ReadbackStatus::Pending);

    graphics.present().unwrap();
    assert_eq!(graphics.pending_readbacks(), 0);
    assert!(readback.is_complete());
    assert_eq!(&*readback.data().unwrap(), &[3, 4, 5, 6]);
}

#[test]
fn test_immediate_readbacks() {
    let (mut graphics, _backend) = mock_graphics();
    let buffer = graphics.new_buffer(storage(4), Some(&[9, 8, 7, 6])).unwrap();
    let data = graphics.readback_buffer_immediate(&buffer, 0, 4).unwrap();
    assert_eq!(&*data, &[9, 8, 7, 6]);
    assert_eq!(graphics.pending_readbacks(), 0);

    let texture = image(&mut graphics, 4, 2);
    let pixels = graphics.readback_texture_immediate(TextureRegion::base(&texture)).unwrap();
    assert_eq!(pixels.len(), 4 * 2 * 4);

    assert!(graphics.readback_buffer_immediate(&buffer, 2, 4).is_err());

    let depth = graphics
        .new_texture(TextureSettings::render_target(PixelFormat::Depth16Unorm, 4, 4), None)
        .unwrap();
    assert!(graphics.readback_texture(TextureRegion::base(&depth)).is_err());
}

#[test]
fn test_temporary_buffers() {
    let (mut graphics, backend) = mock_graphics();

    let first = graphics
        .acquire_temporary_buffer(64, BufferUsage::VERTEX, BufferDataUsage::Stream, None)
        .unwrap();
    let second = graphics
        .acquire_temporary_buffer(64, BufferUsage::VERTEX, BufferDataUsage::Stream, None)
        .unwrap();
    assert_ne!(first.id(), second.id());

    graphics.release_temporary_buffer(&first);
    let third = graphics
        .acquire_temporary_buffer(64, BufferUsage::VERTEX, BufferDataUsage::Stream, None)
        .unwrap();
    assert_eq!(third.id(), first.id());
    assert_eq!(backend.count_buffer_creates(), 2);
}
