//! Pixel formats, state enums and capabilities for wgpu.

use crate::blend::{BlendFactor, BlendOperation, BlendState};
use crate::capability::{Capabilities, Feature, SystemLimit};
use crate::pixel_format::{PixelFormat, PixelFormatUsage};
use crate::types::{
    BufferUsage, ColorChannelMask, CommonFormat, CompareMode, CullMode, FilterMode, IndexFormat,
    MipmapFilterMode, PrimitiveType, StencilAction, TextureType, Winding, WrapMode, ATTRIB_COLOR, ATTRIB_POSITION,
    ATTRIB_TEXCOORD,
};

/// Native format for `format`, or `None` when wgpu has no equivalent.
pub fn texture_format(format: PixelFormat) -> Option<wgpu::TextureFormat> {
    use wgpu::TextureFormat as T;
    use PixelFormat::*;

    let native = match format {
        R8Unorm => T::R8Unorm,
        R8Int => T::R8Sint,
        R8Uint => T::R8Uint,
        R16Unorm => T::R16Unorm,
        R16Float => T::R16Float,
        R16Int => T::R16Sint,
        R16Uint => T::R16Uint,
        R32Float => T::R32Float,
        R32Int => T::R32Sint,
        R32Uint => T::R32Uint,

        Rg8Unorm => T::Rg8Unorm,
        Rg8Int => T::Rg8Sint,
        Rg8Uint => T::Rg8Uint,
        Rg16Unorm => T::Rg16Unorm,
        Rg16Float => T::Rg16Float,
        Rg16Int => T::Rg16Sint,
        Rg16Uint => T::Rg16Uint,
        Rg32Float => T::Rg32Float,
        Rg32Int => T::Rg32Sint,
        Rg32Uint => T::Rg32Uint,

        Rgba8Unorm => T::Rgba8Unorm,
        Rgba8UnormSrgb => T::Rgba8UnormSrgb,
        Bgra8Unorm => T::Bgra8Unorm,
        Bgra8UnormSrgb => T::Bgra8UnormSrgb,
        Rgba8Int => T::Rgba8Sint,
        Rgba8Uint => T::Rgba8Uint,
        Rgba16Unorm => T::Rgba16Unorm,
        Rgba16Float => T::Rgba16Float,
        Rgba16Int => T::Rgba16Sint,
        Rgba16Uint => T::Rgba16Uint,
        Rgba32Float => T::Rgba32Float,
        Rgba32Int => T::Rgba32Sint,
        Rgba32Uint => T::Rgba32Uint,

        Rgb10a2Unorm => T::Rgb10a2Unorm,
        Rg11b10Float => T::Rg11b10Ufloat,

        Stencil8 => T::Stencil8,
        Depth16Unorm => T::Depth16Unorm,
        Depth24Unorm => T::Depth24Plus,
        Depth32Float => T::Depth32Float,
        Depth24UnormStencil8 => T::Depth24PlusStencil8,
        Depth32FloatStencil8 => T::Depth32FloatStencil8,

        Dxt1Unorm => T::Bc1RgbaUnorm,
        Dxt3Unorm => T::Bc2RgbaUnorm,
        Dxt5Unorm => T::Bc3RgbaUnorm,
        Bc4Unorm => T::Bc4RUnorm,
        Bc5Unorm => T::Bc5RgUnorm,
        Bc7Unorm => T::Bc7RgbaUnorm,
        Etc2RgbUnorm => T::Etc2Rgb8Unorm,
        Astc4x4Unorm => T::Astc {
            block: wgpu::AstcBlock::B4x4,
            channel: wgpu::AstcChannel::Unorm,
        },

        La8Unorm | Rgba4Unorm | Rgb5a1Unorm | Rgb565Unorm => return None,
    };
    Some(native)
}

/// Reverse lookup used for the surface format.
pub fn pixel_format(format: wgpu::TextureFormat) -> Option<PixelFormat> {
    match format {
        wgpu::TextureFormat::Rgba8Unorm => Some(PixelFormat::Rgba8Unorm),
        wgpu::TextureFormat::Rgba8UnormSrgb => Some(PixelFormat::Rgba8UnormSrgb),
        wgpu::TextureFormat::Bgra8Unorm => Some(PixelFormat::Bgra8Unorm),
        wgpu::TextureFormat::Bgra8UnormSrgb => Some(PixelFormat::Bgra8UnormSrgb),
        wgpu::TextureFormat::Rgb10a2Unorm => Some(PixelFormat::Rgb10a2Unorm),
        wgpu::TextureFormat::Rgba16Float => Some(PixelFormat::Rgba16Float),
        _ => None,
    }
}

/// Usage flags from what the adapter reports for the native format.
pub fn pixel_format_usage(
    format: Option<wgpu::TextureFormat>,
    device_features: wgpu::Features,
    format_features: &wgpu::TextureFormatFeatures,
) -> PixelFormatUsage {
    let Some(format) = format else {
        return PixelFormatUsage::empty();
    };
    if !device_features.contains(format.required_features()) {
        return PixelFormatUsage::empty();
    }

    let usages = format_features.allowed_usages;
    let flags = format_features.flags;
    let mut usage = PixelFormatUsage::empty();

    if usages.contains(wgpu::TextureUsages::TEXTURE_BINDING) {
        usage |= PixelFormatUsage::SAMPLE;
        if flags.contains(wgpu::TextureFormatFeatureFlags::FILTERABLE) {
            usage |= PixelFormatUsage::LINEAR;
        }
    }
    if usages.contains(wgpu::TextureUsages::RENDER_ATTACHMENT) {
        usage |= PixelFormatUsage::RENDERTARGET;
        if flags.contains(wgpu::TextureFormatFeatureFlags::BLENDABLE) {
            usage |= PixelFormatUsage::BLEND;
        }
        if flags.contains(wgpu::TextureFormatFeatureFlags::MULTISAMPLE_X4) {
            usage |= PixelFormatUsage::MSAA;
        }
    }
    if usages.contains(wgpu::TextureUsages::STORAGE_BINDING) {
        usage |= PixelFormatUsage::COMPUTEWRITE;
    }
    usage
}

/// Largest sample count the adapter supports for `format_features`.
pub fn max_sample_count(format_features: &wgpu::TextureFormatFeatures) -> u32 {
    [16, 8, 4, 2]
        .into_iter()
        .find(|&count| format_features.flags.sample_count_supported(count))
        .unwrap_or(1)
}

/// Aspect sampled through a view of `format`.
pub fn sample_aspect(format: PixelFormat) -> wgpu::TextureAspect {
    if format.is_depth() && format.is_stencil() {
        wgpu::TextureAspect::DepthOnly
    } else if format == PixelFormat::Stencil8 {
        wgpu::TextureAspect::StencilOnly
    } else {
        wgpu::TextureAspect::All
    }
}

pub fn texture_dimension(ty: TextureType) -> (wgpu::TextureDimension, wgpu::TextureViewDimension) {
    match ty {
        TextureType::D2 => (wgpu::TextureDimension::D2, wgpu::TextureViewDimension::D2),
        TextureType::Volume => (wgpu::TextureDimension::D3, wgpu::TextureViewDimension::D3),
        TextureType::Array => (wgpu::TextureDimension::D2, wgpu::TextureViewDimension::D2Array),
        TextureType::Cube => (wgpu::TextureDimension::D2, wgpu::TextureViewDimension::Cube),
    }
}

/// Every buffer can be written from the queue and copied out for readbacks.
pub fn buffer_usages(usage: BufferUsage) -> wgpu::BufferUsages {
    let mut native = wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC;
    if usage.contains(BufferUsage::VERTEX) {
        native |= wgpu::BufferUsages::VERTEX;
    }
    if usage.contains(BufferUsage::INDEX) {
        native |= wgpu::BufferUsages::INDEX;
    }
    if usage.intersects(BufferUsage::SHADER_STORAGE | BufferUsage::TEXEL) {
        native |= wgpu::BufferUsages::STORAGE;
    }
    if usage.contains(BufferUsage::INDIRECT_ARGUMENTS) {
        native |= wgpu::BufferUsages::INDIRECT;
    }
    native
}

pub fn compare(mode: CompareMode) -> wgpu::CompareFunction {
    match mode {
        CompareMode::Less => wgpu::CompareFunction::Less,
        CompareMode::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareMode::Equal => wgpu::CompareFunction::Equal,
        CompareMode::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareMode::Greater => wgpu::CompareFunction::Greater,
        CompareMode::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareMode::Always => wgpu::CompareFunction::Always,
        CompareMode::Never => wgpu::CompareFunction::Never,
    }
}

pub fn stencil_operation(action: StencilAction) -> wgpu::StencilOperation {
    match action {
        StencilAction::Keep => wgpu::StencilOperation::Keep,
        StencilAction::Zero => wgpu::StencilOperation::Zero,
        StencilAction::Replace => wgpu::StencilOperation::Replace,
        StencilAction::Increment => wgpu::StencilOperation::IncrementClamp,
        StencilAction::Decrement => wgpu::StencilOperation::DecrementClamp,
        StencilAction::IncrementWrap => wgpu::StencilOperation::IncrementWrap,
        StencilAction::DecrementWrap => wgpu::StencilOperation::DecrementWrap,
        StencilAction::Invert => wgpu::StencilOperation::Invert,
    }
}

fn blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::OneMinusDstColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        BlendFactor::SrcAlphaSaturated => wgpu::BlendFactor::SrcAlphaSaturated,
    }
}

fn blend_component(op: BlendOperation, src: BlendFactor, dst: BlendFactor) -> wgpu::BlendComponent {
    let operation = match op {
        BlendOperation::Add => wgpu::BlendOperation::Add,
        BlendOperation::Subtract => wgpu::BlendOperation::Subtract,
        BlendOperation::ReverseSubtract => wgpu::BlendOperation::ReverseSubtract,
        BlendOperation::Min => wgpu::BlendOperation::Min,
        BlendOperation::Max => wgpu::BlendOperation::Max,
    };
    // Min and max ignore the factors, and wgpu requires them to be one.
    if matches!(op, BlendOperation::Min | BlendOperation::Max) {
        return wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation,
        };
    }
    wgpu::BlendComponent {
        src_factor: blend_factor(src),
        dst_factor: blend_factor(dst),
        operation,
    }
}

pub fn blend_state(blend: &BlendState) -> Option<wgpu::BlendState> {
    blend.enable.then(|| wgpu::BlendState {
        color: blend_component(blend.operation_rgb, blend.src_factor_rgb, blend.dst_factor_rgb),
        alpha: blend_component(blend.operation_a, blend.src_factor_a, blend.dst_factor_a),
    })
}

pub fn color_writes(mask: ColorChannelMask) -> wgpu::ColorWrites {
    let mut writes = wgpu::ColorWrites::empty();
    if mask.contains(ColorChannelMask::RED) {
        writes |= wgpu::ColorWrites::RED;
    }
    if mask.contains(ColorChannelMask::GREEN) {
        writes |= wgpu::ColorWrites::GREEN;
    }
    if mask.contains(ColorChannelMask::BLUE) {
        writes |= wgpu::ColorWrites::BLUE;
    }
    if mask.contains(ColorChannelMask::ALPHA) {
        writes |= wgpu::ColorWrites::ALPHA;
    }
    writes
}

/// wgpu has no triangle fans; callers generate fan indices instead.
pub fn primitive_topology(primitive: PrimitiveType) -> Option<wgpu::PrimitiveTopology> {
    match primitive {
        PrimitiveType::Triangles => Some(wgpu::PrimitiveTopology::TriangleList),
        PrimitiveType::TriangleStrip => Some(wgpu::PrimitiveTopology::TriangleStrip),
        PrimitiveType::Points => Some(wgpu::PrimitiveTopology::PointList),
        PrimitiveType::TriangleFan => None,
    }
}

pub fn cull_face(mode: CullMode) -> Option<wgpu::Face> {
    match mode {
        CullMode::None => None,
        CullMode::Back => Some(wgpu::Face::Back),
        CullMode::Front => Some(wgpu::Face::Front),
    }
}

pub fn front_face(winding: Winding) -> wgpu::FrontFace {
    match winding {
        Winding::Cw => wgpu::FrontFace::Cw,
        Winding::Ccw => wgpu::FrontFace::Ccw,
    }
}

pub fn index_format(format: IndexFormat) -> wgpu::IndexFormat {
    match format {
        IndexFormat::U16 => wgpu::IndexFormat::Uint16,
        IndexFormat::U32 => wgpu::IndexFormat::Uint32,
    }
}

pub fn filter(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

pub fn mipmap_filter(mode: MipmapFilterMode) -> wgpu::FilterMode {
    match mode {
        MipmapFilterMode::None | MipmapFilterMode::Nearest => wgpu::FilterMode::Nearest,
        MipmapFilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

/// Address mode for `mode`, plus the border color it needs.
///
/// Without border clamping, the zero and one variants fall back to edge clamping.
pub fn address_mode(mode: WrapMode, border_clamp: bool) -> (wgpu::AddressMode, Option<wgpu::SamplerBorderColor>) {
    match mode {
        WrapMode::Clamp => (wgpu::AddressMode::ClampToEdge, None),
        WrapMode::Repeat => (wgpu::AddressMode::Repeat, None),
        WrapMode::MirroredRepeat => (wgpu::AddressMode::MirrorRepeat, None),
        WrapMode::ClampZero if border_clamp => (
            wgpu::AddressMode::ClampToBorder,
            Some(wgpu::SamplerBorderColor::TransparentBlack),
        ),
        WrapMode::ClampOne if border_clamp => (
            wgpu::AddressMode::ClampToBorder,
            Some(wgpu::SamplerBorderColor::OpaqueWhite),
        ),
        WrapMode::ClampZero | WrapMode::ClampOne => (wgpu::AddressMode::ClampToEdge, None),
    }
}

/// Vertex attributes for one interleaved stream of `format`.
pub fn vertex_attributes(format: CommonFormat) -> Vec<wgpu::VertexAttribute> {
    let (position, texcoord, color) = format.attribute_offsets();
    let mut attributes = Vec::with_capacity(3);
    if let Some(offset) = position {
        attributes.push(wgpu::VertexAttribute {
            format: if format.position_components() == 3 {
                wgpu::VertexFormat::Float32x3
            } else {
                wgpu::VertexFormat::Float32x2
            },
            offset: offset as u64,
            shader_location: ATTRIB_POSITION,
        });
    }
    if let Some(offset) = texcoord {
        attributes.push(wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: offset as u64,
            shader_location: ATTRIB_TEXCOORD,
        });
    }
    if let Some(offset) = color {
        attributes.push(wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Unorm8x4,
            offset: offset as u64,
            shader_location: ATTRIB_COLOR,
        });
    }
    attributes
}

pub fn build_capabilities(limits: &wgpu::Limits, features: wgpu::Features, max_msaa: u32) -> Capabilities {
    let border = features.contains(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER);
    let storage = limits.max_storage_buffers_per_shader_stage > 0;

    Capabilities::builder()
        .feature(Feature::MultiRenderTargetFormats, true)
        .feature(Feature::ClampZero, border)
        .feature(Feature::ClampOne, border)
        .feature(Feature::BlendMinMax, true)
        .feature(Feature::Lighten, true)
        .feature(Feature::FullNpot, true)
        .feature(Feature::PixelShaderHighp, true)
        .feature(Feature::ShaderDerivatives, true)
        .feature(Feature::Glsl3, false)
        .feature(Feature::Glsl4, false)
        .feature(Feature::Instancing, true)
        .feature(Feature::TexelBuffer, false)
        .feature(Feature::IndexBuffer32Bit, true)
        .feature(Feature::CopyBuffer, true)
        .feature(Feature::CopyBufferToTexture, true)
        .feature(Feature::CopyTextureToBuffer, true)
        .feature(Feature::CopyRenderTargetToBuffer, true)
        // Point sprites are always one pixel wide.
        .limit(SystemLimit::PointSize, 1.0)
        .limit(SystemLimit::TextureSize, limits.max_texture_dimension_2d as f64)
        .limit(SystemLimit::TextureLayers, limits.max_texture_array_layers as f64)
        .limit(SystemLimit::VolumeTextureSize, limits.max_texture_dimension_3d as f64)
        .limit(SystemLimit::CubeTextureSize, limits.max_texture_dimension_2d as f64)
        .limit(SystemLimit::TexelBufferSize, 0.0)
        .limit(
            SystemLimit::ShaderStorageBufferSize,
            if storage { limits.max_storage_buffer_binding_size as f64 } else { 0.0 },
        )
        .limit(SystemLimit::ThreadgroupsX, limits.max_compute_workgroups_per_dimension as f64)
        .limit(SystemLimit::ThreadgroupsY, limits.max_compute_workgroups_per_dimension as f64)
        .limit(SystemLimit::ThreadgroupsZ, limits.max_compute_workgroups_per_dimension as f64)
        .limit(SystemLimit::RenderTargets, limits.max_color_attachments.max(1) as f64)
        .limit(SystemLimit::TextureMsaa, max_msaa.max(1) as f64)
        .limit(SystemLimit::Anisotropy, 16.0)
        .texture_type(TextureType::D2, true)
        .texture_type(TextureType::Volume, true)
        .texture_type(TextureType::Array, true)
        .texture_type(TextureType::Cube, true)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_renderable_color_format_maps() {
        for format in [
            PixelFormat::Rgba8Unorm,
            PixelFormat::Bgra8UnormSrgb,
            PixelFormat::Rgba16Float,
            PixelFormat::Rgba32Float,
            PixelFormat::Rg11b10Float,
        ] {
            let native = texture_format(format).unwrap();
            assert!(!native.is_depth_stencil_format());
        }
        assert_eq!(texture_format(PixelFormat::La8Unorm), None);
        assert_eq!(texture_format(PixelFormat::Rgb565Unorm), None);
    }

    #[test]
    fn test_depth_formats_map_to_depth() {
        for format in [
            PixelFormat::Depth16Unorm,
            PixelFormat::Depth24Unorm,
            PixelFormat::Depth24UnormStencil8,
            PixelFormat::Stencil8,
        ] {
            assert!(texture_format(format).unwrap().is_depth_stencil_format());
        }
        assert_eq!(sample_aspect(PixelFormat::Depth24UnormStencil8), wgpu::TextureAspect::DepthOnly);
        assert_eq!(sample_aspect(PixelFormat::Stencil8), wgpu::TextureAspect::StencilOnly);
    }

    #[test]
    fn test_surface_format_reverse_lookup() {
        for format in [PixelFormat::Bgra8Unorm, PixelFormat::Rgba8UnormSrgb] {
            assert_eq!(pixel_format(texture_format(format).unwrap()), Some(format));
        }
        assert_eq!(pixel_format(wgpu::TextureFormat::R8Unorm), None);
    }

    #[test]
    fn test_usage_from_format_features() {
        let features = wgpu::TextureFormatFeatures {
            allowed_usages: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::RENDER_ATTACHMENT,
            flags: wgpu::TextureFormatFeatureFlags::FILTERABLE | wgpu::TextureFormatFeatureFlags::BLENDABLE,
        };
        let usage = pixel_format_usage(Some(wgpu::TextureFormat::Rgba8Unorm), wgpu::Features::empty(), &features);
        assert_eq!(
            usage,
            PixelFormatUsage::SAMPLE | PixelFormatUsage::LINEAR | PixelFormatUsage::RENDERTARGET | PixelFormatUsage::BLEND
        );

        // BC formats need a device feature before anything is allowed.
        let usage = pixel_format_usage(Some(wgpu::TextureFormat::Bc1RgbaUnorm), wgpu::Features::empty(), &features);
        assert!(usage.is_empty());
        assert!(pixel_format_usage(None, wgpu::Features::all(), &features).is_empty());
    }

    #[test]
    fn test_min_max_blend_uses_unit_factors() {
        let blend = BlendState::new(
            BlendOperation::Max,
            BlendFactor::SrcAlpha,
            BlendFactor::One,
            BlendFactor::OneMinusSrcAlpha,
            BlendFactor::One,
        );
        let native = blend_state(&blend).unwrap();
        assert_eq!(native.color.operation, wgpu::BlendOperation::Max);
        assert_eq!(native.color.src_factor, wgpu::BlendFactor::One);
        assert_eq!(native.color.dst_factor, wgpu::BlendFactor::One);
        assert_eq!(blend_state(&BlendState::DISABLED), None);
    }

    #[test]
    fn test_border_modes_fall_back_to_edge() {
        assert_eq!(
            address_mode(WrapMode::ClampOne, true),
            (wgpu::AddressMode::ClampToBorder, Some(wgpu::SamplerBorderColor::OpaqueWhite))
        );
        assert_eq!(address_mode(WrapMode::ClampZero, false), (wgpu::AddressMode::ClampToEdge, None));
    }

    #[test]
    fn test_vertex_attributes_follow_common_format() {
        let attributes = vertex_attributes(CommonFormat::XyzStRgba8);
        assert_eq!(attributes.len(), 3);
        assert_eq!(attributes[0].format, wgpu::VertexFormat::Float32x3);
        assert_eq!(attributes[1].offset, 12);
        assert_eq!(attributes[2].offset, 20);
        assert_eq!(attributes[2].shader_location, ATTRIB_COLOR);
        assert!(vertex_attributes(CommonFormat::None).is_empty());
    }

    #[test]
    fn test_buffer_usages() {
        let usages = buffer_usages(BufferUsage::VERTEX | BufferUsage::TEXEL);
        assert!(usages.contains(wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC));
        assert!(!usages.contains(wgpu::BufferUsages::MAP_READ));
    }

    #[test]
    fn test_downlevel_capabilities() {
        let caps = build_capabilities(&wgpu::Limits::downlevel_defaults(), wgpu::Features::empty(), 4);
        assert!(!caps.has(Feature::ClampZero));
        assert!(caps.has(Feature::CopyBuffer));
        assert_eq!(caps.limit(SystemLimit::TextureSize), 2048.0);
        assert_eq!(caps.limit(SystemLimit::TextureMsaa), 4.0);
        assert_eq!(caps.limit(SystemLimit::PointSize), 1.0);
    }
}
