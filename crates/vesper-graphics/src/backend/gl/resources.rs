//! Texture, buffer and shader object creation.

use glow::HasContext;
use tracing::debug;
use vesper_core::geometry::Rect;

use crate::backend::sampler_compare;
use crate::capability::SystemLimit;
use crate::error::{GraphicsError, GraphicsResult};
use crate::pixel_format::PixelFormat;
use crate::resource::{ResourceId, TextureSettings};
use crate::shader_cache::ShaderCompileOptions;
use crate::types::{MipmapFilterMode, SamplerState, ShaderStageType, StandardShader, TextureType};

use super::formats::{GlFormat, convert_pixel_format};
use super::{GlBackend, RawBuffer, RawProgram, RawShader, RawTexture, RawUniform, caps, enums, shaders};

const TEXTURE_MAX_ANISOTROPY: u32 = 0x84FE;

#[derive(Debug, Clone)]
pub struct GlTexture {
    pub raw: RawTexture,
    pub target: u32,
    pub ty: TextureType,
    pub pixel_format: PixelFormat,
    pub format: GlFormat,
    pub width: u32,
    pub height: u32,
    pub msaa: u32,
}

impl GlTexture {
    pub fn mip_size(&self, mipmap: u32) -> (u32, u32) {
        ((self.width >> mipmap).max(1), (self.height >> mipmap).max(1))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GlBuffer {
    pub raw: RawBuffer,
    /// Binding point matching the buffer's primary usage.
    pub target: u32,
    pub size: u64,
}

/// Uniform locations of the standard interface. Custom shaders may omit any of them.
#[derive(Debug, Clone, Default)]
pub struct ProgramUniforms {
    pub transform: Option<RawUniform>,
    pub projection: Option<RawUniform>,
    pub color: Option<RawUniform>,
    pub point_size: Option<RawUniform>,
}

#[derive(Debug, Clone)]
pub struct GlProgram {
    pub raw: RawProgram,
    pub uniforms: ProgramUniforms,
}

pub unsafe fn compile_stage(
    gl: &glow::Context,
    features: &super::GlFeatureSet,
    stage: ShaderStageType,
    source: &str,
    options: &ShaderCompileOptions,
) -> GraphicsResult<RawShader> {
    let source = shaders::compose_source(stage, source, options, features);
    unsafe {
        let shader = gl.create_shader(enums::shader_stage(stage)).map_err(GraphicsError::Backend)?;
        gl.shader_source(shader, &source);
        gl.compile_shader(shader);

        let log = gl.get_shader_info_log(shader);
        if !gl.get_shader_compile_status(shader) {
            gl.delete_shader(shader);
            return Err(GraphicsError::Backend(format!("Cannot compile {} shader code:\n{}", stage, log)));
        }
        if !log.trim().is_empty() {
            debug!("{} shader compiled with warnings:\n{}", stage, log);
        }
        Ok(shader)
    }
}

pub unsafe fn link_program(gl: &glow::Context, stages: &[RawShader], compute: bool) -> GraphicsResult<GlProgram> {
    unsafe {
        let program = gl.create_program().map_err(GraphicsError::Backend)?;
        for &shader in stages {
            gl.attach_shader(program, shader);
        }
        if !compute {
            for (location, name) in shaders::ATTRIBUTE_NAMES.iter().enumerate() {
                gl.bind_attrib_location(program, location as u32, name);
            }
        }
        gl.link_program(program);

        for &shader in stages {
            gl.detach_shader(program, shader);
        }

        if !gl.get_program_link_status(program) {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            return Err(GraphicsError::Backend(format!("Cannot link shader program object:\n{}", log)));
        }

        let uniforms = ProgramUniforms {
            transform: gl.get_uniform_location(program, shaders::UNIFORM_TRANSFORM),
            projection: gl.get_uniform_location(program, shaders::UNIFORM_PROJECTION),
            color: gl.get_uniform_location(program, shaders::UNIFORM_COLOR),
            point_size: gl.get_uniform_location(program, shaders::UNIFORM_POINT_SIZE),
        };
        if let Some(sampler) = gl.get_uniform_location(program, shaders::UNIFORM_TEXTURE) {
            gl.use_program(Some(program));
            gl.uniform_1_i32(Some(&sampler), 0);
        }

        Ok(GlProgram { raw: program, uniforms })
    }
}

pub unsafe fn build_standard_program(
    gl: &glow::Context,
    features: &super::GlFeatureSet,
    shader: StandardShader,
) -> GraphicsResult<GlProgram> {
    let options = ShaderCompileOptions::default();
    let mut compiled = Vec::with_capacity(2);
    for (stage, source) in shaders::standard_sources(shader) {
        match unsafe { compile_stage(gl, features, stage, source, &options) } {
            Ok(s) => compiled.push(s),
            Err(err) => {
                for s in compiled {
                    unsafe { gl.delete_shader(s) };
                }
                return Err(err);
            }
        }
    }
    let program = unsafe { link_program(gl, &compiled, false) };
    for s in compiled {
        unsafe { gl.delete_shader(s) };
    }
    program
}

/// 1x1 opaque white texture sampled by untextured draws.
pub unsafe fn create_white_texture(gl: &glow::Context) -> GraphicsResult<RawTexture> {
    unsafe {
        let texture = gl.create_texture().map_err(GraphicsError::Backend)?;
        gl.bind_texture(glow::TEXTURE_2D, Some(texture));
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::NEAREST as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::NEAREST as i32);
        gl.tex_image_2d(
            glow::TEXTURE_2D,
            0,
            glow::RGBA as i32,
            1,
            1,
            0,
            glow::RGBA,
            glow::UNSIGNED_BYTE,
            glow::PixelUnpackData::Slice(Some(&[255u8; 4])),
        );
        gl.bind_texture(glow::TEXTURE_2D, None);
        Ok(texture)
    }
}

/// Uploads `data` into one slice of one mipmap level. The texture must be bound.
pub unsafe fn upload_region(
    gl: &glow::Context,
    texture: &GlTexture,
    slice: u32,
    mipmap: u32,
    rect: Rect<i32>,
    data: &[u8],
) {
    let level = mipmap as i32;
    unsafe {
        if texture.pixel_format.is_compressed() {
            gl.compressed_tex_sub_image_2d(
                enums::slice_target(texture.ty, texture.msaa, slice),
                level,
                rect.x,
                rect.y,
                rect.width,
                rect.height,
                texture.format.internal,
                glow::CompressedPixelUnpackData::Slice(data),
            );
        } else if enums::is_layered(texture.ty) {
            gl.tex_sub_image_3d(
                texture.target,
                level,
                rect.x,
                rect.y,
                slice as i32,
                rect.width,
                rect.height,
                1,
                texture.format.external,
                texture.format.ty,
                glow::PixelUnpackData::Slice(Some(data)),
            );
        } else {
            gl.tex_sub_image_2d(
                enums::slice_target(texture.ty, texture.msaa, slice),
                level,
                rect.x,
                rect.y,
                rect.width,
                rect.height,
                texture.format.external,
                texture.format.ty,
                glow::PixelUnpackData::Slice(Some(data)),
            );
        }
    }
}

impl GlBackend {
    pub(super) fn create_texture_object(
        &mut self,
        id: ResourceId,
        settings: &TextureSettings,
        data: Option<&[u8]>,
    ) -> GraphicsResult<()> {
        let format = convert_pixel_format(settings.format, false, false, &self.features, self.bugs).ok_or_else(|| {
            GraphicsError::unsupported(format!(
                "The pixel format '{}' is not supported by this system.",
                settings.format
            ))
        })?;

        if settings.msaa > 1 && !(self.features.gl(4, 3) || self.features.gles_at_least(3, 1)) {
            return Err(GraphicsError::unsupported("Multisampled textures are not supported on this system."));
        }
        if settings.format.is_compressed() && enums::is_layered(settings.texture_type) {
            return Err(GraphicsError::unsupported(format!(
                "Compressed {} textures are not supported by the OpenGL backend.",
                settings.texture_type
            )));
        }

        let gl = std::rc::Rc::clone(&self.gl);
        let target = enums::texture_target(settings.texture_type, settings.msaa);
        let raw = unsafe { gl.create_texture().map_err(GraphicsError::Backend)? };
        let texture = GlTexture {
            raw,
            target,
            ty: settings.texture_type,
            pixel_format: settings.format,
            format,
            width: settings.width,
            height: settings.height,
            msaa: settings.msaa,
        };
        self.bind_texture(0, target, Some(raw));

        unsafe {
            if settings.msaa > 1 {
                gl.tex_storage_2d_multisample(
                    target,
                    settings.msaa as i32,
                    format.internal,
                    settings.width as i32,
                    settings.height as i32,
                    true,
                );
            } else if settings.format.is_compressed() {
                allocate_compressed(&gl, &texture, settings, data);
            } else {
                self.allocate_storage(&texture, settings);
                if let Some(data) = data {
                    let slice_size = settings.format.slice_size(settings.width, settings.height) as usize;
                    let rect = Rect::new(0, 0, settings.width as i32, settings.height as i32);
                    for slice in 0..settings.slice_count(0) {
                        let start = slice as usize * slice_size;
                        let Some(bytes) = data.get(start..start + slice_size) else {
                            break;
                        };
                        upload_region(&gl, &texture, slice, 0, rect, bytes);
                    }
                }
            }

            if settings.msaa <= 1 {
                self.apply_sampler(&texture, &settings.sampler, settings.mipmaps);
                if let Some(swizzle) = format.swizzle {
                    for (param, value) in [
                        glow::TEXTURE_SWIZZLE_R,
                        glow::TEXTURE_SWIZZLE_G,
                        glow::TEXTURE_SWIZZLE_B,
                        glow::TEXTURE_SWIZZLE_A,
                    ]
                    .into_iter()
                    .zip(swizzle)
                    {
                        gl.tex_parameter_i32(target, param, value as i32);
                    }
                }
                if data.is_some() && settings.mipmaps > 1 && !settings.format.is_compressed() {
                    gl.generate_mipmap(target);
                }
            }
        }

        debug!(
            "Created {} texture {} ({}x{}, {})",
            settings.texture_type, id, settings.width, settings.height, settings.format
        );
        self.textures.insert(id, texture);
        Ok(())
    }

    unsafe fn allocate_storage(&self, texture: &GlTexture, settings: &TextureSettings) {
        let gl = &self.gl;
        let levels = settings.mipmaps.max(1) as i32;
        let (w, h) = (settings.width as i32, settings.height as i32);
        let layered = enums::is_layered(settings.texture_type);
        let internal = texture.format.internal;

        unsafe {
            match self.functions.texture_alloc {
                super::functions::TextureAlloc::Storage if layered => {
                    gl.tex_storage_3d(texture.target, levels, internal, w, h, settings.layers.max(1) as i32)
                }
                super::functions::TextureAlloc::Storage => gl.tex_storage_2d(texture.target, levels, internal, w, h),
                super::functions::TextureAlloc::Image => {
                    for mip in 0..settings.mipmaps.max(1) {
                        let (mw, mh) = (settings.pixel_width(mip) as i32, settings.pixel_height(mip) as i32);
                        if layered {
                            let depth = match settings.texture_type {
                                TextureType::Volume => (settings.layers >> mip).max(1),
                                _ => settings.layers.max(1),
                            };
                            gl.tex_image_3d(
                                texture.target,
                                mip as i32,
                                internal as i32,
                                mw,
                                mh,
                                depth as i32,
                                0,
                                texture.format.external,
                                texture.format.ty,
                                glow::PixelUnpackData::Slice(None),
                            );
                        } else {
                            for face in 0..settings.slice_count(mip) {
                                gl.tex_image_2d(
                                    enums::slice_target(texture.ty, 1, face),
                                    mip as i32,
                                    internal as i32,
                                    mw,
                                    mh,
                                    0,
                                    texture.format.external,
                                    texture.format.ty,
                                    glow::PixelUnpackData::Slice(None),
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    unsafe fn apply_sampler(&self, texture: &GlTexture, sampler: &SamplerState, mipmaps: u32) {
        let gl = &self.gl;
        let target = texture.target;
        let mipmap_filter = if mipmaps > 1 { sampler.mipmap_filter } else { MipmapFilterMode::None };
        let border_clamp = caps::border_clamp(&self.features);

        unsafe {
            gl.tex_parameter_i32(
                target,
                glow::TEXTURE_MIN_FILTER,
                enums::min_filter(sampler.min_filter, mipmap_filter) as i32,
            );
            gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, enums::mag_filter(sampler.mag_filter) as i32);

            let mut border = None;
            for (param, mode) in [
                (glow::TEXTURE_WRAP_S, sampler.wrap_u),
                (glow::TEXTURE_WRAP_T, sampler.wrap_v),
                (glow::TEXTURE_WRAP_R, sampler.wrap_w),
            ] {
                let (wrap, color) = enums::wrap(mode, border_clamp);
                gl.tex_parameter_i32(target, param, wrap as i32);
                border = border.or(color);
            }
            if let Some(color) = border {
                gl.tex_parameter_f32_slice(target, glow::TEXTURE_BORDER_COLOR, &color);
            }

            if self.features.gl3_class() {
                gl.tex_parameter_i32(target, glow::TEXTURE_MAX_LEVEL, mipmaps.max(1) as i32 - 1);
                gl.tex_parameter_f32(target, glow::TEXTURE_MIN_LOD, sampler.min_lod);
                gl.tex_parameter_f32(target, glow::TEXTURE_MAX_LOD, sampler.max_lod);
            }
            if !self.features.es {
                gl.tex_parameter_f32(target, glow::TEXTURE_LOD_BIAS, sampler.lod_bias);
            }

            let max_anisotropy = self.caps.limit(SystemLimit::Anisotropy) as f32;
            if max_anisotropy > 1.0 {
                let anisotropy = (sampler.max_anisotropy.max(1) as f32).min(max_anisotropy);
                gl.tex_parameter_f32(target, TEXTURE_MAX_ANISOTROPY, anisotropy);
            }

            if texture.pixel_format.is_depth() && self.features.gl3_class() {
                match sampler_compare(sampler) {
                    Some(compare) => {
                        gl.tex_parameter_i32(target, glow::TEXTURE_COMPARE_MODE, glow::COMPARE_REF_TO_TEXTURE as i32);
                        gl.tex_parameter_i32(target, glow::TEXTURE_COMPARE_FUNC, enums::compare(compare) as i32);
                    }
                    None => gl.tex_parameter_i32(target, glow::TEXTURE_COMPARE_MODE, glow::NONE as i32),
                }
            }
        }
    }

    pub(super) fn create_buffer_object(
        &mut self,
        id: ResourceId,
        target: u32,
        usage: u32,
        size: u64,
        data: Option<&[u8]>,
    ) -> GraphicsResult<()> {
        let raw = unsafe { self.gl.create_buffer().map_err(GraphicsError::Backend)? };
        let bound = self.bind_scratch_buffer(raw, target);
        unsafe {
            match data {
                Some(bytes) if bytes.len() as u64 == size => self.gl.buffer_data_u8_slice(bound, bytes, usage),
                Some(bytes) => {
                    self.gl.buffer_data_size(bound, size as i32, usage);
                    self.gl.buffer_sub_data_u8_slice(bound, 0, bytes);
                }
                None => self.gl.buffer_data_size(bound, size as i32, usage),
            }
        }
        self.buffers.insert(id, GlBuffer { raw, target, size });
        Ok(())
    }

    /// Binds `raw` somewhere it can be written without disturbing draw state.
    ///
    /// Returns the binding point used.
    pub(super) fn bind_scratch_buffer(&mut self, raw: RawBuffer, natural_target: u32) -> u32 {
        let target = if self.features.copy_buffer() {
            glow::COPY_WRITE_BUFFER
        } else {
            match natural_target {
                glow::ARRAY_BUFFER => self.state.array_buffer.invalidate(),
                glow::ELEMENT_ARRAY_BUFFER => self.state.element_buffer.invalidate(),
                _ => {}
            }
            natural_target
        };
        unsafe { self.gl.bind_buffer(target, Some(raw)) };
        target
    }
}

unsafe fn allocate_compressed(gl: &glow::Context, texture: &GlTexture, settings: &TextureSettings, data: Option<&[u8]>) {
    let mut offset = 0usize;
    for mip in 0..settings.mipmaps.max(1) {
        let (w, h) = (settings.pixel_width(mip), settings.pixel_height(mip));
        let size = settings.format.slice_size(w, h) as usize;
        for slice in 0..settings.slice_count(mip) {
            let provided = data.and_then(|d| d.get(offset..offset + size));
            let zeros;
            let bytes = match provided {
                Some(bytes) if mip == 0 => bytes,
                _ => {
                    zeros = vec![0u8; size];
                    &zeros[..]
                }
            };
            if mip == 0 {
                offset += size;
            }
            unsafe {
                gl.compressed_tex_image_2d(
                    enums::slice_target(texture.ty, 1, slice),
                    mip as i32,
                    texture.format.internal as i32,
                    w as i32,
                    h as i32,
                    0,
                    size as i32,
                    bytes,
                );
            }
        }
    }
}
