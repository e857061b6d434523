//! Capability tables for tests.

use vesper_graphics::capability::{Capabilities, Feature, SystemLimit};
use vesper_graphics::pixel_format::{PixelFormat, PixelFormatUsage};
use vesper_graphics::types::TextureType;

/// A device that supports every feature and texture type with desktop-class limits.
pub fn desktop_capabilities() -> Capabilities {
    let mut builder = Capabilities::builder()
        .limit(SystemLimit::PointSize, 64.0)
        .limit(SystemLimit::TextureSize, 16384.0)
        .limit(SystemLimit::TextureLayers, 2048.0)
        .limit(SystemLimit::VolumeTextureSize, 2048.0)
        .limit(SystemLimit::CubeTextureSize, 16384.0)
        .limit(SystemLimit::TexelBufferSize, 128.0 * 1024.0 * 1024.0)
        .limit(SystemLimit::ShaderStorageBufferSize, 128.0 * 1024.0 * 1024.0)
        .limit(SystemLimit::ThreadgroupsX, 65535.0)
        .limit(SystemLimit::ThreadgroupsY, 65535.0)
        .limit(SystemLimit::ThreadgroupsZ, 65535.0)
        .limit(SystemLimit::RenderTargets, 8.0)
        .limit(SystemLimit::TextureMsaa, 8.0)
        .limit(SystemLimit::Anisotropy, 16.0);

    for feature in Feature::ALL {
        builder = builder.feature(*feature, true);
    }
    for ty in TextureType::ALL {
        builder = builder.texture_type(*ty, true);
    }
    builder.build()
}

/// Everything a desktop GPU typically allows for `format`.
pub fn full_format_usage(format: PixelFormat) -> PixelFormatUsage {
    if format.is_compressed() {
        PixelFormatUsage::COMMON_SAMPLE
    } else if format.is_depth_stencil() {
        PixelFormatUsage::SAMPLE | PixelFormatUsage::RENDERTARGET | PixelFormatUsage::MSAA
    } else if format.is_integer() {
        PixelFormatUsage::SAMPLE | PixelFormatUsage::RENDERTARGET | PixelFormatUsage::COMPUTEWRITE
    } else {
        PixelFormatUsage::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desktop_capabilities_enable_everything() {
        let caps = desktop_capabilities();
        assert!(caps.features().all(|(_, supported)| supported));
        assert!(caps.supports_texture_type(TextureType::Cube));
        assert_eq!(caps.limit(SystemLimit::RenderTargets), 8.0);
    }

    #[test]
    fn test_depth_formats_are_not_blendable() {
        let usage = full_format_usage(PixelFormat::Depth24Unorm);
        assert!(usage.contains(PixelFormatUsage::RENDERTARGET));
        assert!(!usage.contains(PixelFormatUsage::BLEND));
    }
}
