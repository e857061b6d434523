//! Pixel format conversion to OpenGL enumerants.
//!
//! Both lookups are pure functions of the format and the probed
//! [`GlFeatureSet`] / [`DriverBugs`], so every fallback branch is covered by
//! unit tests without a live context.

use crate::pixel_format::{PixelFormat, PixelFormatUsage};

use super::features::GlFeatureSet;
use super::vendor::DriverBugs;

/// Enumerants missing from core profiles or only defined by extensions.
pub(crate) mod ext {
    pub const LUMINANCE: u32 = 0x1909;
    pub const LUMINANCE_ALPHA: u32 = 0x190A;
    pub const LUMINANCE8: u32 = 0x8040;
    pub const LUMINANCE8_ALPHA8: u32 = 0x8045;
    pub const SRGB_ALPHA: u32 = 0x8C42;

    pub const COMPRESSED_RGBA_S3TC_DXT1: u32 = 0x83F1;
    pub const COMPRESSED_RGBA_S3TC_DXT3: u32 = 0x83F2;
    pub const COMPRESSED_RGBA_S3TC_DXT5: u32 = 0x83F3;
    pub const COMPRESSED_SRGB_ALPHA_S3TC_DXT1: u32 = 0x8C4D;
    pub const COMPRESSED_SRGB_ALPHA_S3TC_DXT3: u32 = 0x8C4E;
    pub const COMPRESSED_SRGB_ALPHA_S3TC_DXT5: u32 = 0x8C4F;
    pub const COMPRESSED_RED_RGTC1: u32 = 0x8DBB;
    pub const COMPRESSED_RG_RGTC2: u32 = 0x8DBD;
    pub const COMPRESSED_RGBA_BPTC_UNORM: u32 = 0x8E8C;
    pub const COMPRESSED_SRGB_ALPHA_BPTC_UNORM: u32 = 0x8E8D;
    pub const COMPRESSED_RGB8_ETC2: u32 = 0x9274;
    pub const COMPRESSED_SRGB8_ETC2: u32 = 0x9275;
    pub const COMPRESSED_RGBA_ASTC_4X4: u32 = 0x93B0;
    pub const COMPRESSED_SRGB8_ALPHA8_ASTC_4X4: u32 = 0x93D0;
}

/// Native description of a pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GlFormat {
    pub internal: u32,
    pub external: u32,
    pub ty: u32,
    /// Framebuffer attachment points, second is `NONE` unless depth and
    /// stencil must be attached separately.
    pub attachments: [u32; 2],
    /// Channel swizzle applied when a legacy format is emulated.
    pub swizzle: Option<[u32; 4]>,
    /// Whether the texture stores sRGB-encoded data.
    pub srgb: bool,
}

impl GlFormat {
    fn color(internal: u32, external: u32, ty: u32) -> Self {
        Self {
            internal,
            external,
            ty,
            attachments: [glow::COLOR_ATTACHMENT0, glow::NONE],
            swizzle: None,
            srgb: false,
        }
    }

    fn depth_stencil(internal: u32, external: u32, ty: u32, attachments: [u32; 2]) -> Self {
        Self {
            internal,
            external,
            ty,
            attachments,
            swizzle: None,
            srgb: false,
        }
    }

    fn compressed(internal: u32) -> Self {
        Self {
            internal,
            ..Self::color(0, 0, 0)
        }
    }
}

/// Maps `format` (in its sRGB variant when `srgb` is set) to GL enumerants.
///
/// `renderbuffer` selects renderbuffer storage, which is exempt from the
/// ES 2 rule that internal and external formats must match. Returns `None`
/// for formats GL can't represent; the caller treats that as unsupported.
pub fn convert_pixel_format(
    format: PixelFormat,
    srgb: bool,
    renderbuffer: bool,
    features: &GlFeatureSet,
    bugs: DriverBugs,
) -> Option<GlFormat> {
    use PixelFormat::*;

    let format = if srgb { format.srgb_variant() } else { format };
    let fbo_core = features.framebuffer_objects();
    let packed_ds = features.packed_depth_stencil();

    let mut f = match format {
        R8Unorm => {
            if features.texture_rg() && !bugs.contains(DriverBugs::BROKEN_R8_PIXEL_FORMAT) {
                GlFormat::color(glow::R8, glow::RED, glow::UNSIGNED_BYTE)
            } else {
                GlFormat::color(ext::LUMINANCE8, ext::LUMINANCE, glow::UNSIGNED_BYTE)
            }
        }
        Rg8Unorm => GlFormat::color(glow::RG8, glow::RG, glow::UNSIGNED_BYTE),
        Rgba8Unorm => GlFormat::color(glow::RGBA8, glow::RGBA, glow::UNSIGNED_BYTE),
        Rgba8UnormSrgb => {
            let external = if features.es && !features.gles_at_least(3, 0) {
                ext::SRGB_ALPHA
            } else {
                glow::RGBA
            };
            GlFormat {
                srgb: true,
                ..GlFormat::color(glow::SRGB8_ALPHA8, external, glow::UNSIGNED_BYTE)
            }
        }
        // BGRA storage isn't exposed by GL.
        Bgra8Unorm | Bgra8UnormSrgb => GlFormat::default(),

        R16Unorm => GlFormat::color(glow::R16, glow::RED, glow::UNSIGNED_SHORT),
        Rg16Unorm => GlFormat::color(glow::RG16, glow::RG, glow::UNSIGNED_SHORT),
        Rgba16Unorm => GlFormat::color(glow::RGBA16, glow::RGBA, glow::UNSIGNED_SHORT),

        R16Float => GlFormat::color(glow::R16F, glow::RED, glow::HALF_FLOAT),
        Rg16Float => GlFormat::color(glow::RG16F, glow::RG, glow::HALF_FLOAT),
        Rgba16Float => GlFormat::color(glow::RGBA16F, glow::RGBA, glow::HALF_FLOAT),
        R32Float => GlFormat::color(glow::R32F, glow::RED, glow::FLOAT),
        Rg32Float => GlFormat::color(glow::RG32F, glow::RG, glow::FLOAT),
        Rgba32Float => GlFormat::color(glow::RGBA32F, glow::RGBA, glow::FLOAT),

        R8Int => GlFormat::color(glow::R8I, glow::RED_INTEGER, glow::BYTE),
        R8Uint => GlFormat::color(glow::R8UI, glow::RED_INTEGER, glow::UNSIGNED_BYTE),
        Rg8Int => GlFormat::color(glow::RG8I, glow::RG_INTEGER, glow::BYTE),
        Rg8Uint => GlFormat::color(glow::RG8UI, glow::RG_INTEGER, glow::UNSIGNED_BYTE),
        Rgba8Int => GlFormat::color(glow::RGBA8I, glow::RGBA_INTEGER, glow::BYTE),
        Rgba8Uint => GlFormat::color(glow::RGBA8UI, glow::RGBA_INTEGER, glow::UNSIGNED_BYTE),
        R16Int => GlFormat::color(glow::R16I, glow::RED_INTEGER, glow::SHORT),
        R16Uint => GlFormat::color(glow::R16UI, glow::RED_INTEGER, glow::UNSIGNED_SHORT),
        Rg16Int => GlFormat::color(glow::RG16I, glow::RG_INTEGER, glow::SHORT),
        Rg16Uint => GlFormat::color(glow::RG16UI, glow::RG_INTEGER, glow::UNSIGNED_SHORT),
        Rgba16Int => GlFormat::color(glow::RGBA16I, glow::RGBA_INTEGER, glow::SHORT),
        Rgba16Uint => GlFormat::color(glow::RGBA16UI, glow::RGBA_INTEGER, glow::UNSIGNED_SHORT),
        R32Int => GlFormat::color(glow::R32I, glow::RED_INTEGER, glow::INT),
        R32Uint => GlFormat::color(glow::R32UI, glow::RED_INTEGER, glow::UNSIGNED_INT),
        Rg32Int => GlFormat::color(glow::RG32I, glow::RG_INTEGER, glow::INT),
        Rg32Uint => GlFormat::color(glow::RG32UI, glow::RG_INTEGER, glow::UNSIGNED_INT),
        Rgba32Int => GlFormat::color(glow::RGBA32I, glow::RGBA_INTEGER, glow::INT),
        Rgba32Uint => GlFormat::color(glow::RGBA32UI, glow::RGBA_INTEGER, glow::UNSIGNED_INT),

        La8Unorm => {
            if features.core_profile || features.gles_at_least(3, 0) {
                GlFormat {
                    swizzle: Some([glow::RED, glow::RED, glow::RED, glow::GREEN]),
                    ..GlFormat::color(glow::RG8, glow::RG, glow::UNSIGNED_BYTE)
                }
            } else {
                GlFormat::color(ext::LUMINANCE8_ALPHA8, ext::LUMINANCE_ALPHA, glow::UNSIGNED_BYTE)
            }
        }

        Rgba4Unorm => GlFormat::color(glow::RGBA4, glow::RGBA, glow::UNSIGNED_SHORT_4_4_4_4),
        Rgb5a1Unorm => GlFormat::color(glow::RGB5_A1, glow::RGBA, glow::UNSIGNED_SHORT_5_5_5_1),
        Rgb565Unorm => GlFormat::color(glow::RGB565, glow::RGB, glow::UNSIGNED_SHORT_5_6_5),
        Rgb10a2Unorm => GlFormat::color(glow::RGB10_A2, glow::RGBA, glow::UNSIGNED_INT_2_10_10_10_REV),
        Rg11b10Float => GlFormat::color(glow::R11F_G11F_B10F, glow::RGB, glow::UNSIGNED_INT_10F_11F_11F_REV),

        Stencil8 => {
            // A combined depth/stencil buffer is more reliable than stencil-only storage.
            if fbo_core {
                GlFormat::depth_stencil(
                    glow::DEPTH24_STENCIL8,
                    glow::DEPTH_STENCIL,
                    glow::UNSIGNED_INT_24_8,
                    [glow::DEPTH_STENCIL_ATTACHMENT, glow::NONE],
                )
            } else if packed_ds {
                GlFormat::depth_stencil(
                    glow::DEPTH24_STENCIL8,
                    glow::DEPTH_STENCIL,
                    glow::UNSIGNED_INT_24_8,
                    [glow::DEPTH_ATTACHMENT, glow::STENCIL_ATTACHMENT],
                )
            } else {
                GlFormat::depth_stencil(
                    glow::STENCIL_INDEX8,
                    glow::STENCIL,
                    glow::UNSIGNED_BYTE,
                    [glow::STENCIL_ATTACHMENT, glow::NONE],
                )
            }
        }
        Depth16Unorm => GlFormat::depth_stencil(
            glow::DEPTH_COMPONENT16,
            glow::DEPTH_COMPONENT,
            glow::UNSIGNED_SHORT,
            [glow::DEPTH_ATTACHMENT, glow::NONE],
        ),
        Depth24Unorm => {
            if features.es
                && !features.gles_at_least(3, 0)
                && !features.has("GL_OES_depth24")
                && features.has("GL_OES_packed_depth_stencil")
            {
                GlFormat::depth_stencil(
                    glow::DEPTH24_STENCIL8,
                    glow::DEPTH_STENCIL,
                    glow::UNSIGNED_INT_24_8,
                    [glow::DEPTH_ATTACHMENT, glow::STENCIL_ATTACHMENT],
                )
            } else {
                GlFormat::depth_stencil(
                    glow::DEPTH_COMPONENT24,
                    glow::DEPTH_COMPONENT,
                    glow::UNSIGNED_INT,
                    [glow::DEPTH_ATTACHMENT, glow::NONE],
                )
            }
        }
        Depth32Float => GlFormat::depth_stencil(
            glow::DEPTH_COMPONENT32F,
            glow::DEPTH_COMPONENT,
            glow::FLOAT,
            [glow::DEPTH_ATTACHMENT, glow::NONE],
        ),
        Depth24UnormStencil8 => {
            let attachments = if fbo_core {
                [glow::DEPTH_STENCIL_ATTACHMENT, glow::NONE]
            } else if packed_ds {
                [glow::DEPTH_ATTACHMENT, glow::STENCIL_ATTACHMENT]
            } else {
                [glow::COLOR_ATTACHMENT0, glow::NONE]
            };
            GlFormat::depth_stencil(glow::DEPTH24_STENCIL8, glow::DEPTH_STENCIL, glow::UNSIGNED_INT_24_8, attachments)
        }
        Depth32FloatStencil8 => GlFormat::depth_stencil(
            glow::DEPTH32F_STENCIL8,
            glow::DEPTH_STENCIL,
            glow::FLOAT_32_UNSIGNED_INT_24_8_REV,
            [glow::DEPTH_STENCIL_ATTACHMENT, glow::NONE],
        ),

        Dxt1Unorm => GlFormat::compressed(if srgb {
            ext::COMPRESSED_SRGB_ALPHA_S3TC_DXT1
        } else {
            ext::COMPRESSED_RGBA_S3TC_DXT1
        }),
        Dxt3Unorm => GlFormat::compressed(if srgb {
            ext::COMPRESSED_SRGB_ALPHA_S3TC_DXT3
        } else {
            ext::COMPRESSED_RGBA_S3TC_DXT3
        }),
        Dxt5Unorm => GlFormat::compressed(if srgb {
            ext::COMPRESSED_SRGB_ALPHA_S3TC_DXT5
        } else {
            ext::COMPRESSED_RGBA_S3TC_DXT5
        }),
        Bc4Unorm => GlFormat::compressed(ext::COMPRESSED_RED_RGTC1),
        Bc5Unorm => GlFormat::compressed(ext::COMPRESSED_RG_RGTC2),
        Bc7Unorm => GlFormat::compressed(if srgb {
            ext::COMPRESSED_SRGB_ALPHA_BPTC_UNORM
        } else {
            ext::COMPRESSED_RGBA_BPTC_UNORM
        }),
        Etc2RgbUnorm => GlFormat::compressed(if srgb { ext::COMPRESSED_SRGB8_ETC2 } else { ext::COMPRESSED_RGB8_ETC2 }),
        Astc4x4Unorm => GlFormat::compressed(if srgb {
            ext::COMPRESSED_SRGB8_ALPHA8_ASTC_4X4
        } else {
            ext::COMPRESSED_RGBA_ASTC_4X4
        }),
    };

    if f.internal == 0 {
        tracing::warn!("Unhandled pixel format {} when converting to OpenGL enums", format);
        return None;
    }

    if format.is_compressed() {
        f.srgb = srgb && !matches!(format, Bc4Unorm | Bc5Unorm);
    } else if features.es && !features.gles_at_least(3, 0) && !renderbuffer && !features.texture_storage() {
        // ES 2 requires unsized internal formats that match the external one.
        f.internal = f.external;
    }

    Some(f)
}

/// What textures of `format` can be used for on this context.
pub fn pixel_format_usage(format: PixelFormat, features: &GlFeatureSet, bugs: DriverBugs) -> PixelFormatUsage {
    use PixelFormat::*;

    let sample = PixelFormatUsage::COMMON_SAMPLE;
    let render = PixelFormatUsage::COMMON_RENDER;
    let compute = PixelFormatUsage::COMPUTEWRITE;
    let rt_msaa = PixelFormatUsage::RENDERTARGET | PixelFormatUsage::MSAA;
    let gl43 = features.gl(4, 3);
    let es31 = features.gles_at_least(3, 1);

    let mut flags = PixelFormatUsage::empty();

    match format {
        R8Unorm | Rg8Unorm => {
            if features.texture_rg() && !(format == R8Unorm && bugs.contains(DriverBugs::BROKEN_R8_PIXEL_FORMAT)) {
                flags |= sample | render;
            } else if format == R8Unorm {
                // Sampled through the luminance fallback.
                flags |= sample;
            }
            if gl43 {
                flags |= compute;
            }
        }
        Rgba8Unorm => {
            flags |= sample;
            if !features.es || features.gles_at_least(3, 0) || features.has_any(&["GL_OES_rgb8_rgba8", "GL_ARM_rgba8"]) {
                flags |= render;
            }
            if gl43 || es31 {
                flags |= compute;
            }
        }
        Rgba8UnormSrgb => {
            if bugs.contains(DriverBugs::BROKEN_SRGB) {
                return flags;
            }
            if features.gles_at_least(3, 0) || features.gl(2, 1) || features.has("GL_EXT_texture_sRGB") {
                flags |= sample;
            }
            if features.gl3_class()
                || (features.has_any(&["GL_ARB_framebuffer_sRGB", "GL_EXT_framebuffer_sRGB"])
                    && (features.gl(2, 1) || features.has("GL_EXT_texture_sRGB")))
            {
                flags |= render;
            }
            if gl43 || es31 {
                flags |= compute;
            }
        }
        Bgra8Unorm | Bgra8UnormSrgb => {}
        R16Unorm | Rg16Unorm => {
            if features.gl(3, 0)
                || (features.gl(1, 1) && features.has("GL_ARB_texture_rg"))
                || (features.has("GL_EXT_texture_norm16") && features.texture_rg())
            {
                flags |= sample | render;
            }
            if gl43 {
                flags |= compute;
            }
        }
        Rgba16Unorm => {
            if features.gl(1, 1) || features.has("GL_EXT_texture_norm16") {
                flags |= sample | render;
            }
            if gl43 {
                flags |= compute;
            }
        }
        R16Float | Rg16Float | Rgba16Float => {
            if features.gl(3, 0) {
                flags |= sample | render;
            }
            if features.gles_at_least(3, 0) || features.has("GL_OES_texture_half_float") {
                flags |= sample;
            }
            if features.has("GL_EXT_color_buffer_half_float") {
                flags |= render;
            }
            if !(features.gl(1, 1) || features.gles_at_least(3, 0) || features.has("GL_OES_texture_half_float_linear")) {
                flags.remove(PixelFormatUsage::LINEAR);
            }
            if gl43 || (format == Rgba16Float && es31) {
                flags |= compute;
            }
        }
        R32Float | Rg32Float | Rgba32Float => {
            if features.gl(3, 0) {
                flags |= sample | render;
            }
            if features.gles_at_least(3, 0) || features.has("GL_OES_texture_float") {
                flags |= sample;
            }
            if !(features.gl(1, 1) || features.has("GL_OES_texture_float_linear")) {
                flags.remove(PixelFormatUsage::LINEAR);
            }
            if gl43 || (matches!(format, R32Float | Rgba32Float) && es31) {
                flags |= compute;
            }
        }
        R8Int | R8Uint | Rg8Int | Rg8Uint | Rgba8Int | Rgba8Uint | R16Int | R16Uint | Rg16Int | Rg16Uint
        | Rgba16Int | Rgba16Uint | R32Int | R32Uint | Rg32Int | Rg32Uint | Rgba32Int | Rgba32Uint => {
            if features.gl3_class() {
                flags |= PixelFormatUsage::SAMPLE | PixelFormatUsage::RENDERTARGET;
            }
            let es31_writable = matches!(
                format,
                Rgba8Int | Rgba8Uint | Rgba16Int | Rgba16Uint | R32Int | R32Uint | Rgba32Int | Rgba32Uint
            );
            if gl43 || (es31 && es31_writable) {
                flags |= compute;
            }
        }
        La8Unorm => flags |= sample,
        Rgba4Unorm | Rgb5a1Unorm => flags |= sample | render,
        Rgb565Unorm => {
            if features.es || features.gl(4, 2) || features.has("GL_ARB_ES2_compatibility") {
                flags |= sample | render;
            }
        }
        Rgb10a2Unorm => {
            if features.gles_at_least(3, 0) || !features.es {
                flags |= sample | render;
            }
            if gl43 {
                flags |= compute;
            }
        }
        Rg11b10Float => {
            if features.gl(3, 0) || features.has_any(&["GL_EXT_packed_float", "GL_APPLE_texture_packed_float"]) {
                flags |= sample;
            }
            if features.gl(3, 0) || features.has_any(&["GL_EXT_packed_float", "GL_APPLE_color_buffer_packed_float"]) {
                flags |= render;
            }
            if gl43 {
                flags |= compute;
            }
        }
        Stencil8 => flags |= rt_msaa,
        Depth16Unorm => {
            flags |= rt_msaa;
            if features.gl(2, 0) || features.gles_at_least(3, 0) || features.has("GL_OES_depth_texture") {
                flags |= sample;
            }
        }
        Depth24Unorm => {
            if features.gl(2, 0) || features.gles_at_least(3, 0) || features.has_any(&["GL_OES_depth24", "GL_OES_depth_texture"]) {
                flags |= rt_msaa;
            }
            if features.gl(2, 0) || features.gles_at_least(3, 0) || features.has("GL_OES_depth_texture") {
                flags |= sample;
            }
        }
        Depth24UnormStencil8 => {
            if features.gl3_class() || features.packed_depth_stencil() {
                flags |= rt_msaa;
            }
            if features.gl3_class()
                || features.has("GL_EXT_packed_depth_stencil")
                || features.has_all(&["GL_OES_depth_texture", "GL_OES_packed_depth_stencil"])
            {
                flags |= sample;
            }
        }
        Depth32Float | Depth32FloatStencil8 => {
            if features.gl3_class() || features.has("GL_ARB_depth_buffer_float") {
                flags |= sample | rt_msaa;
            }
        }
        Dxt1Unorm => {
            if features.has_any(&["GL_EXT_texture_compression_s3tc", "GL_EXT_texture_compression_dxt1"]) {
                flags |= sample;
            }
        }
        Dxt3Unorm => {
            if features.has_any(&["GL_EXT_texture_compression_s3tc", "GL_ANGLE_texture_compression_dxt3"]) {
                flags |= sample;
            }
        }
        Dxt5Unorm => {
            if features.has_any(&["GL_EXT_texture_compression_s3tc", "GL_ANGLE_texture_compression_dxt5"]) {
                flags |= sample;
            }
        }
        Bc4Unorm | Bc5Unorm => {
            if features.gl(3, 0)
                || features.has_any(&["GL_ARB_texture_compression_rgtc", "GL_EXT_texture_compression_rgtc"])
            {
                flags |= sample;
            }
        }
        Bc7Unorm => {
            if features.gl(4, 2) || features.has_any(&["GL_ARB_texture_compression_bptc", "GL_EXT_texture_compression_bptc"]) {
                flags |= sample;
            }
        }
        Etc2RgbUnorm => {
            if features.gles_at_least(3, 0) || features.gl(4, 3) || features.has("GL_ARB_ES3_compatibility") {
                flags |= sample;
            }
        }
        Astc4x4Unorm => {
            if features.has("GL_KHR_texture_compression_astc_ldr") {
                flags |= sample;
            }
        }
    }

    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(format: PixelFormat, features: &GlFeatureSet) -> Option<GlFormat> {
        convert_pixel_format(format, false, false, features, DriverBugs::empty())
    }

    #[test]
    fn test_r8_falls_back_to_luminance() {
        let modern = GlFeatureSet::desktop(3, 3);
        assert_eq!(convert(PixelFormat::R8Unorm, &modern).unwrap().internal, glow::R8);

        let legacy = GlFeatureSet::desktop(2, 1);
        let f = convert(PixelFormat::R8Unorm, &legacy).unwrap();
        assert_eq!((f.internal, f.external), (ext::LUMINANCE8, ext::LUMINANCE));

        let broken = convert_pixel_format(PixelFormat::R8Unorm, false, false, &modern, DriverBugs::BROKEN_R8_PIXEL_FORMAT);
        assert_eq!(broken.unwrap().external, ext::LUMINANCE);
    }

    #[test]
    fn test_stencil_prefers_combined_depth_stencil() {
        let fbo = GlFeatureSet::desktop(3, 0);
        let f = convert(PixelFormat::Stencil8, &fbo).unwrap();
        assert_eq!(f.internal, glow::DEPTH24_STENCIL8);
        assert_eq!(f.attachments, [glow::DEPTH_STENCIL_ATTACHMENT, glow::NONE]);

        let packed = GlFeatureSet::gles(2, 0).with_extension("GL_OES_packed_depth_stencil");
        let f = convert_pixel_format(PixelFormat::Stencil8, false, true, &packed, DriverBugs::empty()).unwrap();
        assert_eq!(f.attachments, [glow::DEPTH_ATTACHMENT, glow::STENCIL_ATTACHMENT]);

        let bare = GlFeatureSet::gles(2, 0);
        let f = convert_pixel_format(PixelFormat::Stencil8, false, true, &bare, DriverBugs::empty()).unwrap();
        assert_eq!(f.internal, glow::STENCIL_INDEX8);
    }

    #[test]
    fn test_srgb_and_unsupported() {
        let gl = GlFeatureSet::desktop(3, 3);
        let f = convert_pixel_format(PixelFormat::Rgba8Unorm, true, false, &gl, DriverBugs::empty()).unwrap();
        assert_eq!(f.internal, glow::SRGB8_ALPHA8);
        assert!(f.srgb);

        assert!(convert(PixelFormat::Bgra8Unorm, &gl).is_none());
    }

    #[test]
    fn test_lookup_is_pure() {
        let gl = GlFeatureSet::gles(3, 0);
        for format in [PixelFormat::La8Unorm, PixelFormat::Depth24Unorm, PixelFormat::Dxt5Unorm] {
            assert_eq!(convert(format, &gl), convert(format, &gl));
        }
    }

    #[test]
    fn test_es2_uses_unsized_internal_formats() {
        let es2 = GlFeatureSet::gles(2, 0);
        let f = convert(PixelFormat::Rgba8Unorm, &es2).unwrap();
        assert_eq!(f.internal, glow::RGBA);
    }

    #[test]
    fn test_usage_flags() {
        let gl33 = GlFeatureSet::desktop(3, 3);
        let bugs = DriverBugs::empty();
        assert!(pixel_format_usage(PixelFormat::Rgba8Unorm, &gl33, bugs).contains(PixelFormatUsage::RENDERTARGET));
        assert!(!pixel_format_usage(PixelFormat::Rgba8Unorm, &gl33, bugs).contains(PixelFormatUsage::COMPUTEWRITE));
        assert!(pixel_format_usage(PixelFormat::Depth24UnormStencil8, &gl33, bugs).contains(PixelFormatUsage::MSAA));
        assert!(pixel_format_usage(PixelFormat::Rgba8UnormSrgb, &gl33, DriverBugs::BROKEN_SRGB).is_empty());
        assert!(pixel_format_usage(PixelFormat::Dxt1Unorm, &gl33, bugs).is_empty());

        let legacy = GlFeatureSet::desktop(2, 1);
        assert_eq!(pixel_format_usage(PixelFormat::R8Unorm, &legacy, bugs), PixelFormatUsage::COMMON_SAMPLE);

        let es3 = GlFeatureSet::gles(3, 0);
        let half = pixel_format_usage(PixelFormat::Rgba16Float, &es3, bugs);
        assert!(half.contains(PixelFormatUsage::SAMPLE));
        assert!(!half.contains(PixelFormatUsage::RENDERTARGET));
    }
}
