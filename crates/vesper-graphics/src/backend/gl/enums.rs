//! State enums to GL enumerants.

use crate::blend::{BlendFactor, BlendOperation};
use crate::types::{
    BufferDataUsage, BufferUsage, CompareMode, FilterMode, IndexFormat, MipmapFilterMode, PrimitiveType,
    ShaderStageType, StencilAction, TextureType, WrapMode,
};

pub fn primitive(p: PrimitiveType) -> u32 {
    match p {
        PrimitiveType::Triangles => glow::TRIANGLES,
        PrimitiveType::TriangleStrip => glow::TRIANGLE_STRIP,
        PrimitiveType::TriangleFan => glow::TRIANGLE_FAN,
        PrimitiveType::Points => glow::POINTS,
    }
}

pub fn compare(mode: CompareMode) -> u32 {
    match mode {
        CompareMode::Less => glow::LESS,
        CompareMode::LessEqual => glow::LEQUAL,
        CompareMode::Equal => glow::EQUAL,
        CompareMode::GreaterEqual => glow::GEQUAL,
        CompareMode::Greater => glow::GREATER,
        CompareMode::NotEqual => glow::NOTEQUAL,
        CompareMode::Always => glow::ALWAYS,
        CompareMode::Never => glow::NEVER,
    }
}

pub fn stencil_action(action: StencilAction) -> u32 {
    match action {
        StencilAction::Keep => glow::KEEP,
        StencilAction::Zero => glow::ZERO,
        StencilAction::Replace => glow::REPLACE,
        StencilAction::Increment => glow::INCR,
        StencilAction::Decrement => glow::DECR,
        StencilAction::IncrementWrap => glow::INCR_WRAP,
        StencilAction::DecrementWrap => glow::DECR_WRAP,
        StencilAction::Invert => glow::INVERT,
    }
}

pub fn blend_operation(op: BlendOperation) -> u32 {
    match op {
        BlendOperation::Add => glow::FUNC_ADD,
        BlendOperation::Subtract => glow::FUNC_SUBTRACT,
        BlendOperation::ReverseSubtract => glow::FUNC_REVERSE_SUBTRACT,
        BlendOperation::Min => glow::MIN,
        BlendOperation::Max => glow::MAX,
    }
}

pub fn blend_factor(factor: BlendFactor) -> u32 {
    match factor {
        BlendFactor::Zero => glow::ZERO,
        BlendFactor::One => glow::ONE,
        BlendFactor::SrcColor => glow::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => glow::ONE_MINUS_SRC_COLOR,
        BlendFactor::SrcAlpha => glow::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstColor => glow::DST_COLOR,
        BlendFactor::OneMinusDstColor => glow::ONE_MINUS_DST_COLOR,
        BlendFactor::DstAlpha => glow::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => glow::ONE_MINUS_DST_ALPHA,
        BlendFactor::SrcAlphaSaturated => glow::SRC_ALPHA_SATURATE,
    }
}

pub fn index_type(format: IndexFormat) -> u32 {
    match format {
        IndexFormat::U16 => glow::UNSIGNED_SHORT,
        IndexFormat::U32 => glow::UNSIGNED_INT,
    }
}

pub fn shader_stage(stage: ShaderStageType) -> u32 {
    match stage {
        ShaderStageType::Vertex => glow::VERTEX_SHADER,
        ShaderStageType::Pixel => glow::FRAGMENT_SHADER,
        ShaderStageType::Compute => glow::COMPUTE_SHADER,
    }
}

pub fn texture_target(ty: TextureType, msaa: u32) -> u32 {
    match ty {
        TextureType::D2 if msaa > 1 => glow::TEXTURE_2D_MULTISAMPLE,
        TextureType::D2 => glow::TEXTURE_2D,
        TextureType::Volume => glow::TEXTURE_3D,
        TextureType::Array => glow::TEXTURE_2D_ARRAY,
        TextureType::Cube => glow::TEXTURE_CUBE_MAP,
    }
}

/// Target used to address one slice of a texture in `glTexSubImage2D` and
/// framebuffer attachment calls.
pub fn slice_target(ty: TextureType, msaa: u32, slice: u32) -> u32 {
    match ty {
        TextureType::Cube => glow::TEXTURE_CUBE_MAP_POSITIVE_X + slice,
        other => texture_target(other, msaa),
    }
}

/// Whether slices are layers addressed through the z coordinate.
pub fn is_layered(ty: TextureType) -> bool {
    matches!(ty, TextureType::Volume | TextureType::Array)
}

pub fn buffer_target(usage: BufferUsage) -> u32 {
    if usage.contains(BufferUsage::INDEX) {
        glow::ELEMENT_ARRAY_BUFFER
    } else if usage.contains(BufferUsage::VERTEX) {
        glow::ARRAY_BUFFER
    } else if usage.contains(BufferUsage::SHADER_STORAGE) {
        glow::SHADER_STORAGE_BUFFER
    } else if usage.contains(BufferUsage::TEXEL) {
        glow::TEXTURE_BUFFER
    } else if usage.contains(BufferUsage::INDIRECT_ARGUMENTS) {
        glow::DRAW_INDIRECT_BUFFER
    } else {
        glow::COPY_WRITE_BUFFER
    }
}

pub fn buffer_data_usage(usage: BufferDataUsage) -> u32 {
    match usage {
        BufferDataUsage::Static => glow::STATIC_DRAW,
        BufferDataUsage::Dynamic => glow::DYNAMIC_DRAW,
        BufferDataUsage::Stream => glow::STREAM_DRAW,
        BufferDataUsage::Readback => glow::STREAM_READ,
    }
}

pub fn mag_filter(filter: FilterMode) -> u32 {
    match filter {
        FilterMode::Nearest => glow::NEAREST,
        FilterMode::Linear => glow::LINEAR,
    }
}

pub fn min_filter(filter: FilterMode, mipmap: MipmapFilterMode) -> u32 {
    match (filter, mipmap) {
        (FilterMode::Nearest, MipmapFilterMode::None) => glow::NEAREST,
        (FilterMode::Linear, MipmapFilterMode::None) => glow::LINEAR,
        (FilterMode::Nearest, MipmapFilterMode::Nearest) => glow::NEAREST_MIPMAP_NEAREST,
        (FilterMode::Linear, MipmapFilterMode::Nearest) => glow::LINEAR_MIPMAP_NEAREST,
        (FilterMode::Nearest, MipmapFilterMode::Linear) => glow::NEAREST_MIPMAP_LINEAR,
        (FilterMode::Linear, MipmapFilterMode::Linear) => glow::LINEAR_MIPMAP_LINEAR,
    }
}

/// Wrap enumerant plus the border color to set, if any.
///
/// Border clamping falls back to edge clamping when unsupported.
pub fn wrap(mode: WrapMode, border_clamp: bool) -> (u32, Option<[f32; 4]>) {
    match mode {
        WrapMode::Clamp => (glow::CLAMP_TO_EDGE, None),
        WrapMode::ClampZero if border_clamp => (glow::CLAMP_TO_BORDER, Some([0.0; 4])),
        WrapMode::ClampOne if border_clamp => (glow::CLAMP_TO_BORDER, Some([1.0; 4])),
        WrapMode::ClampZero | WrapMode::ClampOne => (glow::CLAMP_TO_EDGE, None),
        WrapMode::Repeat => (glow::REPEAT, None),
        WrapMode::MirroredRepeat => (glow::MIRRORED_REPEAT, None),
    }
}

pub fn framebuffer_status_name(status: u32) -> &'static str {
    match status {
        glow::FRAMEBUFFER_COMPLETE => "complete",
        glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => "incomplete attachment",
        glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => "missing attachment",
        glow::FRAMEBUFFER_INCOMPLETE_MULTISAMPLE => "mismatched sample counts",
        glow::FRAMEBUFFER_UNSUPPORTED => "unsupported attachment combination",
        _ => "unknown status",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_filter_combinations() {
        assert_eq!(min_filter(FilterMode::Linear, MipmapFilterMode::None), glow::LINEAR);
        assert_eq!(
            min_filter(FilterMode::Nearest, MipmapFilterMode::Linear),
            glow::NEAREST_MIPMAP_LINEAR
        );
    }

    #[test]
    fn test_border_clamp_fallback() {
        assert_eq!(wrap(WrapMode::ClampOne, true), (glow::CLAMP_TO_BORDER, Some([1.0; 4])));
        assert_eq!(wrap(WrapMode::ClampOne, false), (glow::CLAMP_TO_EDGE, None));
    }

    #[test]
    fn test_cube_faces_address_separate_targets() {
        assert_eq!(slice_target(TextureType::Cube, 1, 2), glow::TEXTURE_CUBE_MAP_POSITIVE_X + 2);
        assert_eq!(slice_target(TextureType::D2, 4, 0), glow::TEXTURE_2D_MULTISAMPLE);
        assert!(is_layered(TextureType::Array));
        assert!(!is_layered(TextureType::Cube));
    }

    #[test]
    fn test_index_buffers_win_over_vertex_usage() {
        assert_eq!(buffer_target(BufferUsage::INDEX | BufferUsage::VERTEX), glow::ELEMENT_ARRAY_BUFFER);
        assert_eq!(buffer_target(BufferUsage::COPY_DEST), glow::COPY_WRITE_BUFFER);
    }
}
