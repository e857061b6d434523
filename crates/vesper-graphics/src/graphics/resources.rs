//! Texture, buffer and shader creation, and the temporary pools.

use tracing::{debug, trace};
use vesper_core::geometry::Rect;
use vesper_core::profiling::profile_function;

use super::Graphics;
use crate::backend::GraphicsBackend;
use crate::capability::SystemLimit;
use crate::error::{GraphicsError, GraphicsResult};
use crate::pixel_format::{PixelFormat, PixelFormatUsage};
use crate::resource::{Buffer, BufferSettings, Shader, ShaderStage, ShaderStages, Texture, TextureSettings};
use crate::shader_cache::{ShaderCompileOptions, is_cacheable, source_key};
use crate::temporary::{BufferShape, TextureShape};
use crate::types::{BufferDataUsage, BufferUsage, IndexFormat, ShaderStageType, TextureType};

/// Source text for each stage of a shader.
///
/// A graphics shader with a missing vertex or pixel stage gets the
/// backend's standard code for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShaderSources<'a> {
    pub vertex: Option<&'a str>,
    pub pixel: Option<&'a str>,
    pub compute: Option<&'a str>,
}

impl<'a> ShaderSources<'a> {
    pub fn graphics(vertex: Option<&'a str>, pixel: Option<&'a str>) -> Self {
        Self {
            vertex,
            pixel,
            compute: None,
        }
    }

    pub fn compute(source: &'a str) -> Self {
        Self {
            compute: Some(source),
            ..Default::default()
        }
    }
}

fn size_limit(ty: TextureType) -> SystemLimit {
    match ty {
        TextureType::D2 | TextureType::Array => SystemLimit::TextureSize,
        TextureType::Volume => SystemLimit::VolumeTextureSize,
        TextureType::Cube => SystemLimit::CubeTextureSize,
    }
}

/// Usage bits a texture created with `settings` depends on.
fn required_usage(settings: &TextureSettings) -> PixelFormatUsage {
    let mut usage = PixelFormatUsage::empty();
    if settings.readable {
        usage |= PixelFormatUsage::SAMPLE;
    }
    if settings.render_target {
        usage |= PixelFormatUsage::RENDERTARGET;
    }
    if settings.msaa > 1 {
        usage |= PixelFormatUsage::MSAA;
    }
    if settings.compute_write {
        usage |= PixelFormatUsage::COMPUTEWRITE;
    }
    usage
}

impl<B: GraphicsBackend> Graphics<B> {
    /// Creates a texture, optionally filled with the base level of every slice.
    pub fn new_texture(&mut self, settings: TextureSettings, data: Option<&[u8]>) -> GraphicsResult<Texture> {
        profile_function!();
        let caps = self.backend.capabilities();

        if settings.width == 0 || settings.height == 0 || settings.layers == 0 {
            return Err(GraphicsError::usage("Texture dimensions must be greater than 0."));
        }
        if settings.mipmaps == 0 || settings.msaa == 0 {
            return Err(GraphicsError::usage("Texture mipmap and MSAA counts must be at least 1."));
        }
        if !caps.supports_texture_type(settings.texture_type) {
            return Err(GraphicsError::unsupported(format!(
                "{} textures are not supported on this system.",
                settings.texture_type
            )));
        }

        let max_size = caps.limit(size_limit(settings.texture_type));
        if settings.width as f64 > max_size || settings.height as f64 > max_size {
            return Err(GraphicsError::unsupported(format!(
                "Cannot create texture: size of {}x{} is larger than the system maximum of {}.",
                settings.width, settings.height, max_size
            )));
        }
        if settings.texture_type == TextureType::Array && settings.layers as f64 > caps.limit(SystemLimit::TextureLayers)
        {
            return Err(GraphicsError::unsupported(format!(
                "Cannot create array texture: {} layers exceeds the system maximum of {}.",
                settings.layers,
                caps.limit(SystemLimit::TextureLayers)
            )));
        }
        if settings.msaa > 1 && settings.msaa as f64 > caps.limit(SystemLimit::TextureMsaa) {
            return Err(GraphicsError::unsupported(format!(
                "This system does not support {}x MSAA textures.",
                settings.msaa
            )));
        }
        if settings.render_target && settings.format.is_compressed() {
            return Err(GraphicsError::usage("Compressed textures cannot be render targets."));
        }
        if settings.msaa > 1 && settings.mipmaps > 1 {
            return Err(GraphicsError::usage("MSAA textures cannot have mipmaps."));
        }

        let required = required_usage(&settings);
        let supported = self.backend.pixel_format_usage(settings.format);
        if !supported.contains(required) {
            return Err(GraphicsError::unsupported(format!(
                "The {} pixel format is not supported for the requested texture usage ({:?}) on this system.",
                settings.format,
                required.difference(supported)
            )));
        }

        if let Some(data) = data {
            if settings.msaa > 1 {
                return Err(GraphicsError::usage("MSAA textures cannot be created with initial data."));
            }
            let slices = settings.slice_count(0) as u64;
            let expected = settings.format.slice_size(settings.width, settings.height) * slices;
            if (data.len() as u64) < expected {
                return Err(GraphicsError::usage(format!(
                    "Texture data is {} bytes, but {} bytes are needed for a {}x{} {} texture with {} slice(s).",
                    data.len(),
                    expected,
                    settings.width,
                    settings.height,
                    settings.format,
                    slices
                )));
            }
        }

        let texture = Texture::new(settings, self.releases.clone());
        self.backend.create_texture(texture.id(), texture.settings(), data)?;
        self.texture_count += 1;
        self.texture_memory += texture.settings().memory_size();
        trace!(
            "Created texture {} ({}x{} {})",
            texture.id(),
            texture.pixel_width(0),
            texture.pixel_height(0),
            texture.format()
        );
        Ok(texture)
    }

    /// Replaces the pixels of `rect` in one slice and mipmap level.
    pub fn write_texture(
        &mut self,
        texture: &Texture,
        slice: u32,
        mipmap: u32,
        rect: Rect<i32>,
        data: &[u8],
    ) -> GraphicsResult<()> {
        if texture.msaa() > 1 {
            return Err(GraphicsError::usage("MSAA textures cannot be written to directly."));
        }
        if mipmap >= texture.mipmap_count() {
            return Err(GraphicsError::usage(format!("Invalid mipmap level {}.", mipmap + 1)));
        }
        if !texture.is_valid_slice(slice, mipmap) {
            return Err(GraphicsError::usage(format!("Invalid slice index: {}.", slice + 1)));
        }

        let (width, height) = (texture.pixel_width(mipmap) as i32, texture.pixel_height(mipmap) as i32);
        if rect.width <= 0 || rect.height <= 0 || !Rect::new(0, 0, width, height).contains_rect(&rect) {
            return Err(GraphicsError::usage("Rectangle is outside the bounds of the texture."));
        }

        let format = texture.format();
        if format.is_compressed() {
            let info = format.info();
            let (bw, bh) = (info.block_width as i32, info.block_height as i32);
            if rect.x % bw != 0 || rect.y % bh != 0 {
                return Err(GraphicsError::usage(
                    "Compressed texture regions must start on a block boundary.",
                ));
            }
        }

        let expected = format.slice_size(rect.width as u32, rect.height as u32);
        if (data.len() as u64) < expected {
            return Err(GraphicsError::usage(format!(
                "Texture data is {} bytes, but the region needs {} bytes.",
                data.len(),
                expected
            )));
        }

        // A pending batch sampling this texture must see the old contents.
        if self.batch.texture() == Some(texture) {
            self.flush_batched_draws()?;
        }
        self.backend
            .write_texture(texture.id(), slice, mipmap, rect, &data[..expected as usize])
    }

    pub fn new_buffer(&mut self, settings: BufferSettings, data: Option<&[u8]>) -> GraphicsResult<Buffer> {
        profile_function!();

        if settings.size == 0 {
            return Err(GraphicsError::usage("Buffer size must be greater than 0."));
        }
        if settings.usage.is_empty() && settings.data_usage != BufferDataUsage::Readback {
            return Err(GraphicsError::usage("A buffer needs at least one usage flag."));
        }
        if settings.usage.contains(BufferUsage::INDEX) && settings.index_format.is_none() {
            return Err(GraphicsError::usage("Index buffers need an index format."));
        }
        if settings.index_format == Some(IndexFormat::U32)
            && !self.has_feature(crate::capability::Feature::IndexBuffer32Bit)
        {
            return Err(GraphicsError::unsupported("32-bit index buffers are not supported on this system."));
        }
        if settings.immutable && data.is_none() {
            return Err(GraphicsError::usage("Immutable buffers must be created with initial data."));
        }
        if let Some(data) = data {
            if data.len() as u64 != settings.size {
                return Err(GraphicsError::usage(format!(
                    "Buffer data is {} bytes, but the buffer is {} bytes.",
                    data.len(),
                    settings.size
                )));
            }
        }

        let buffer = Buffer::new(settings, self.releases.clone());
        self.backend.create_buffer(buffer.id(), buffer.settings(), data)?;
        Ok(buffer)
    }

    pub fn write_buffer(&mut self, buffer: &Buffer, offset: u64, data: &[u8]) -> GraphicsResult<()> {
        if buffer.is_immutable() {
            return Err(GraphicsError::usage("Cannot modify an immutable buffer."));
        }
        if buffer.data_usage() == BufferDataUsage::Readback {
            return Err(GraphicsError::usage("Readback buffers cannot be written to from the CPU."));
        }
        let end = offset.checked_add(data.len() as u64);
        if end.is_none_or(|end| end > buffer.size()) {
            return Err(GraphicsError::usage(format!(
                "Write of {} bytes at offset {} is outside the buffer's {} bytes.",
                data.len(),
                offset,
                buffer.size()
            )));
        }
        self.backend.write_buffer(buffer.id(), offset, data)
    }

    /// Compiles and links a shader. Identical stage sources share one compiled stage.
    pub fn new_shader(&mut self, sources: &ShaderSources<'_>, options: &ShaderCompileOptions) -> GraphicsResult<Shader> {
        profile_function!();

        let stages = match sources.compute {
            Some(compute) => {
                if sources.vertex.is_some() || sources.pixel.is_some() {
                    return Err(GraphicsError::usage(
                        "Compute shaders cannot be combined with vertex or pixel stages.",
                    ));
                }
                ShaderStages {
                    compute: Some(self.shader_stage(ShaderStageType::Compute, compute, options)?),
                    ..Default::default()
                }
            }
            None => {
                let vertex = sources
                    .vertex
                    .unwrap_or_else(|| self.backend.default_shader_source(ShaderStageType::Vertex));
                let pixel = sources
                    .pixel
                    .unwrap_or_else(|| self.backend.default_shader_source(ShaderStageType::Pixel));
                ShaderStages {
                    vertex: Some(self.shader_stage(ShaderStageType::Vertex, vertex, options)?),
                    pixel: Some(self.shader_stage(ShaderStageType::Pixel, pixel, options)?),
                    compute: None,
                }
            }
        };

        let ids = stages.ids();
        let shader = Shader::new(stages, self.releases.clone());
        self.backend.link_shader(shader.id(), ids)?;
        Ok(shader)
    }

    fn shader_stage(
        &mut self,
        stage: ShaderStageType,
        source: &str,
        options: &ShaderCompileOptions,
    ) -> GraphicsResult<ShaderStage> {
        let key = source_key(source);
        let cacheable = is_cacheable(stage, source, options);
        if cacheable {
            if let Some(cached) = self.shader_stages.get(stage, key) {
                trace!("Reusing cached {} stage {}", stage, cached.id());
                return Ok(cached);
            }
        }

        let compiled = ShaderStage::new(stage, key, self.releases.clone());
        self.backend.compile_shader_stage(compiled.id(), stage, source, options)?;
        if cacheable {
            self.shader_stages.insert(&compiled);
        }
        Ok(compiled)
    }

    /// Checks out a pooled render target texture of the given shape.
    ///
    /// Hand it back with [`release_temporary_texture`](Self::release_temporary_texture);
    /// it is destroyed after sitting unused for `temporary_idle_frames`.
    pub fn acquire_temporary_texture(
        &mut self,
        format: PixelFormat,
        width: u32,
        height: u32,
        msaa: u32,
    ) -> GraphicsResult<Texture> {
        let shape = TextureShape {
            format,
            width,
            height,
            msaa,
        };
        let Self {
            temporary_textures,
            backend,
            releases,
            texture_count,
            texture_memory,
            ..
        } = self;

        temporary_textures.acquire_with(&shape, |shape| {
            let settings = TextureSettings {
                msaa: shape.msaa,
                label: Some("temporary".to_string()),
                ..TextureSettings::render_target(shape.format, shape.width, shape.height)
            };
            let texture = Texture::new(settings, releases.clone());
            backend.create_texture(texture.id(), texture.settings(), None)?;
            *texture_count += 1;
            *texture_memory += texture.settings().memory_size();
            debug!(
                "Created temporary {}x{} {} texture {}",
                shape.width,
                shape.height,
                shape.format,
                texture.id()
            );
            Ok(texture)
        })
    }

    pub fn release_temporary_texture(&mut self, texture: &Texture) {
        self.temporary_textures.release(texture);
    }

    pub fn acquire_temporary_buffer(
        &mut self,
        size: u64,
        usage: BufferUsage,
        data_usage: BufferDataUsage,
        index_format: Option<IndexFormat>,
    ) -> GraphicsResult<Buffer> {
        let shape = BufferShape {
            size,
            usage,
            data_usage,
            index_format,
        };
        let Self {
            temporary_buffers,
            backend,
            releases,
            ..
        } = self;

        temporary_buffers.acquire_with(&shape, |shape| {
            let settings = BufferSettings {
                index_format: shape.index_format,
                label: Some("temporary".to_string()),
                ..BufferSettings::new(shape.size, shape.usage, shape.data_usage)
            };
            let buffer = Buffer::new(settings, releases.clone());
            backend.create_buffer(buffer.id(), buffer.settings(), None)?;
            debug!("Created temporary {} byte buffer {}", shape.size, buffer.id());
            Ok(buffer)
        })
    }

    pub fn release_temporary_buffer(&mut self, buffer: &Buffer) {
        self.temporary_buffers.release(buffer);
    }
}
