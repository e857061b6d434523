//! Capability table for a GL context.

use glow::HasContext;

use crate::capability::{Capabilities, Feature, SystemLimit};
use crate::types::TextureType;

use super::features::GlFeatureSet;
use super::functions::{BufferCopy, GlFunctions};

const MAX_TEXTURE_MAX_ANISOTROPY: u32 = 0x84FF;

/// Numeric limits queried from the driver.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GlLimits {
    pub point_size: f32,
    pub texture_size: i32,
    pub texture_layers: i32,
    pub volume_texture_size: i32,
    pub cube_texture_size: i32,
    pub texel_buffer_size: i32,
    pub storage_buffer_size: i32,
    pub threadgroups: [i32; 3],
    pub draw_buffers: i32,
    pub color_attachments: i32,
    pub samples: i32,
    pub anisotropy: f32,
    pub texture_units: i32,
}

impl GlLimits {
    /// Reads every limit the context exposes. Unavailable ones stay zero.
    ///
    /// # Safety
    ///
    /// `gl` must be current on the calling thread.
    pub unsafe fn query(gl: &glow::Context, features: &GlFeatureSet) -> Self {
        unsafe {
            let mut limits = GlLimits {
                texture_size: gl.get_parameter_i32(glow::MAX_TEXTURE_SIZE),
                cube_texture_size: gl.get_parameter_i32(glow::MAX_CUBE_MAP_TEXTURE_SIZE),
                texture_units: gl.get_parameter_i32(glow::MAX_COMBINED_TEXTURE_IMAGE_UNITS),
                draw_buffers: 1,
                color_attachments: 1,
                samples: 1,
                anisotropy: 1.0,
                ..Default::default()
            };

            let mut range = [1.0f32; 2];
            gl.get_parameter_f32_slice(glow::ALIASED_POINT_SIZE_RANGE, &mut range);
            limits.point_size = range[1];

            if features.gl(2, 0) || features.gles_at_least(3, 0) {
                limits.volume_texture_size = gl.get_parameter_i32(glow::MAX_3D_TEXTURE_SIZE);
            }
            if features.gl3_class() {
                limits.texture_layers = gl.get_parameter_i32(glow::MAX_ARRAY_TEXTURE_LAYERS);
                limits.draw_buffers = gl.get_parameter_i32(glow::MAX_DRAW_BUFFERS);
                limits.color_attachments = gl.get_parameter_i32(glow::MAX_COLOR_ATTACHMENTS);
                limits.samples = gl.get_parameter_i32(glow::MAX_SAMPLES);
            }
            if texel_buffers(features) {
                limits.texel_buffer_size = gl.get_parameter_i32(glow::MAX_TEXTURE_BUFFER_SIZE);
            }
            if features.compute() {
                limits.storage_buffer_size = gl.get_parameter_i32(glow::MAX_SHADER_STORAGE_BLOCK_SIZE);
                for (axis, count) in limits.threadgroups.iter_mut().enumerate() {
                    *count = gl.get_parameter_indexed_i32(glow::MAX_COMPUTE_WORK_GROUP_COUNT, axis as u32);
                }
            }
            if anisotropic_filtering(features) {
                limits.anisotropy = gl.get_parameter_f32(MAX_TEXTURE_MAX_ANISOTROPY);
            }
            limits
        }
    }
}

fn texel_buffers(features: &GlFeatureSet) -> bool {
    features.gl(3, 1) || features.gles_at_least(3, 2)
}

fn anisotropic_filtering(features: &GlFeatureSet) -> bool {
    features.gl(4, 6) || features.has_any(&["GL_EXT_texture_filter_anisotropic", "GL_ARB_texture_filter_anisotropic"])
}

/// Whether `CLAMP_TO_BORDER` is available.
pub fn border_clamp(features: &GlFeatureSet) -> bool {
    !features.es
        || features.gles_at_least(3, 2)
        || features.has_any(&["GL_EXT_texture_border_clamp", "GL_OES_texture_border_clamp"])
}

pub fn build_capabilities(features: &GlFeatureSet, functions: &GlFunctions, limits: &GlLimits) -> Capabilities {
    let min_max = !features.es || features.gles_at_least(3, 0) || features.has("GL_EXT_blend_minmax");
    let pbo = features.pixel_buffer_objects();
    let clamp = border_clamp(features);

    Capabilities::builder()
        .feature(Feature::MultiRenderTargetFormats, features.gl3_class())
        .feature(Feature::ClampZero, clamp)
        .feature(Feature::ClampOne, clamp)
        .feature(Feature::BlendMinMax, min_max)
        .feature(Feature::Lighten, min_max)
        .feature(
            Feature::FullNpot,
            features.gl(2, 0) || features.gles_at_least(3, 0) || features.has("GL_OES_texture_npot"),
        )
        .feature(Feature::PixelShaderHighp, !features.es || features.gles_at_least(3, 0))
        .feature(
            Feature::ShaderDerivatives,
            !features.es || features.gles_at_least(3, 0) || features.has("GL_OES_standard_derivatives"),
        )
        .feature(Feature::Glsl3, features.glsl3())
        .feature(Feature::Glsl4, features.glsl4())
        .feature(Feature::Instancing, functions.instancing)
        .feature(Feature::TexelBuffer, texel_buffers(features))
        .feature(
            Feature::IndexBuffer32Bit,
            !features.es || features.gles_at_least(3, 0) || features.has("GL_OES_element_index_uint"),
        )
        .feature(Feature::CopyBuffer, functions.buffer_copy == BufferCopy::CopySubData)
        .feature(Feature::CopyBufferToTexture, pbo)
        .feature(Feature::CopyTextureToBuffer, pbo)
        .feature(Feature::CopyRenderTargetToBuffer, pbo)
        .limit(SystemLimit::PointSize, limits.point_size as f64)
        .limit(SystemLimit::TextureSize, limits.texture_size as f64)
        .limit(SystemLimit::TextureLayers, limits.texture_layers as f64)
        .limit(SystemLimit::VolumeTextureSize, limits.volume_texture_size as f64)
        .limit(SystemLimit::CubeTextureSize, limits.cube_texture_size as f64)
        .limit(SystemLimit::TexelBufferSize, limits.texel_buffer_size as f64)
        .limit(SystemLimit::ShaderStorageBufferSize, limits.storage_buffer_size as f64)
        .limit(SystemLimit::ThreadgroupsX, limits.threadgroups[0] as f64)
        .limit(SystemLimit::ThreadgroupsY, limits.threadgroups[1] as f64)
        .limit(SystemLimit::ThreadgroupsZ, limits.threadgroups[2] as f64)
        .limit(
            SystemLimit::RenderTargets,
            limits.draw_buffers.min(limits.color_attachments).max(1) as f64,
        )
        .limit(SystemLimit::TextureMsaa, limits.samples.max(1) as f64)
        .limit(SystemLimit::Anisotropy, limits.anisotropy.max(1.0) as f64)
        .texture_type(TextureType::D2, true)
        .texture_type(TextureType::Volume, features.gl(2, 0) || features.gles_at_least(3, 0))
        .texture_type(TextureType::Array, features.gl3_class() || features.has("GL_EXT_texture_array"))
        .texture_type(TextureType::Cube, true)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::gl::vendor::DriverBugs;

    fn limits() -> GlLimits {
        GlLimits {
            point_size: 64.0,
            texture_size: 16384,
            draw_buffers: 8,
            color_attachments: 4,
            samples: 0,
            ..Default::default()
        }
    }

    #[test]
    fn test_modern_desktop_capabilities() {
        let features = GlFeatureSet::desktop(4, 6);
        let functions = GlFunctions::resolve(&features, DriverBugs::empty());
        let caps = build_capabilities(&features, &functions, &limits());
        assert!(caps.has(Feature::CopyBuffer));
        assert!(caps.has(Feature::Glsl4));
        assert!(caps.has(Feature::ClampOne));
        assert_eq!(caps.limit(SystemLimit::RenderTargets), 4.0);
        assert_eq!(caps.limit(SystemLimit::TextureMsaa), 1.0);
        assert!(caps.supports_texture_type(TextureType::Array));
    }

    #[test]
    fn test_gles2_capabilities() {
        let features = GlFeatureSet::gles(2, 0);
        let functions = GlFunctions::resolve(&features, DriverBugs::empty());
        let caps = build_capabilities(&features, &functions, &GlLimits::default());
        assert!(!caps.has(Feature::CopyBuffer));
        assert!(!caps.has(Feature::ClampZero));
        assert!(!caps.has(Feature::IndexBuffer32Bit));
        assert!(!caps.supports_texture_type(TextureType::Volume));
        assert_eq!(caps.limit(SystemLimit::RenderTargets), 1.0);
    }
}
