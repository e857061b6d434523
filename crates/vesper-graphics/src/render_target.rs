//! Render target validation.
//!
//! Everything here is pure: it inspects a requested [`RenderTargets`] set and
//! reports the first broken constraint without touching any state, so a
//! failed `set_render_targets` leaves the previous targets bound.

use crate::capability::{Capabilities, Feature, SystemLimit};
use crate::error::{GraphicsError, GraphicsResult};
use crate::pixel_format::PixelFormat;
use crate::resource::Texture;
use crate::state::{RenderTarget, RenderTargets, TemporaryRtFlags};

/// Dimensions shared by every attachment of a validated target set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetInfo {
    pub width: u32,
    pub height: u32,
    pub msaa: u32,
    pub has_srgb: bool,
}

const NOT_RENDER_TARGET: &str = "Texture must be created as a render target to be used in set_render_targets.";
const DEPTH_AS_COLOR: &str =
    "Depth/stencil format textures must be used with the 'depth_stencil' field of the targets passed into set_render_targets.";

fn check_level(target: &RenderTarget) -> GraphicsResult<()> {
    let texture = &target.texture;
    if target.mipmap >= texture.mipmap_count() {
        return Err(GraphicsError::usage(format!("Invalid mipmap level {}.", target.mipmap + 1)));
    }
    if !texture.is_valid_slice(target.slice, target.mipmap) {
        return Err(GraphicsError::usage(format!("Invalid slice index: {}.", target.slice + 1)));
    }
    Ok(())
}

fn dimensions(texture: &Texture, mipmap: u32) -> (u32, u32) {
    (texture.pixel_width(mipmap), texture.pixel_height(mipmap))
}

/// Checks `targets` against the attachment rules. Returns `None` for the screen.
pub fn validate(targets: &RenderTargets, caps: &Capabilities) -> GraphicsResult<Option<TargetInfo>> {
    let Some(first) = targets.first_target() else {
        return Ok(None);
    };

    let count = targets.colors.len();
    if count as f64 > caps.limit(SystemLimit::RenderTargets) {
        return Err(GraphicsError::unsupported(format!(
            "This system can't simultaneously render to {} textures.",
            count
        )));
    }

    let multi_format = caps.has(Feature::MultiRenderTargetFormats);
    let first_color_format = targets.colors.first().map(|rt| rt.texture.format());
    let first_texture = &first.texture;

    if !first_texture.is_render_target() {
        return Err(GraphicsError::usage(NOT_RENDER_TARGET));
    }
    if first_color_format.is_some_and(PixelFormat::is_depth_stencil) {
        return Err(GraphicsError::usage(DEPTH_AS_COLOR));
    }
    check_level(first)?;

    let (width, height) = dimensions(first_texture, first.mipmap);
    let msaa = first_texture.msaa();
    let mut has_srgb = first_color_format.is_some_and(PixelFormat::is_srgb);

    for target in targets.colors.iter().skip(1) {
        let texture = &target.texture;
        let format = texture.format();

        if !texture.is_render_target() {
            return Err(GraphicsError::usage(NOT_RENDER_TARGET));
        }
        check_level(target)?;
        if dimensions(texture, target.mipmap) != (width, height) {
            return Err(GraphicsError::usage(format!(
                "All textures must have the same pixel dimensions ({}x{} vs {}x{}).",
                texture.pixel_width(target.mipmap),
                texture.pixel_height(target.mipmap),
                width,
                height
            )));
        }
        if !multi_format && Some(format) != first_color_format {
            return Err(GraphicsError::unsupported(
                "This system doesn't support multi-render-target rendering with different texture formats.",
            ));
        }
        if texture.msaa() != msaa {
            return Err(GraphicsError::usage("All textures must have the same MSAA value."));
        }
        if format.is_depth_stencil() {
            return Err(GraphicsError::usage(DEPTH_AS_COLOR));
        }
        has_srgb |= format.is_srgb();
    }

    if let Some(target) = &targets.depth_stencil {
        let texture = &target.texture;

        if !texture.is_render_target() {
            return Err(GraphicsError::usage(NOT_RENDER_TARGET));
        }
        if !texture.format().is_depth_stencil() {
            return Err(GraphicsError::usage(
                "Only depth/stencil format textures can be used with the 'depth_stencil' field of the targets passed into set_render_targets.",
            ));
        }
        if dimensions(texture, target.mipmap) != (width, height) {
            return Err(GraphicsError::usage(format!(
                "All textures must have the same pixel dimensions ({}x{} vs {}x{}).",
                texture.pixel_width(target.mipmap),
                texture.pixel_height(target.mipmap),
                width,
                height
            )));
        }
        if texture.msaa() != msaa {
            return Err(GraphicsError::usage("All textures must have the same MSAA value."));
        }
        check_level(target)?;
    }

    Ok(Some(TargetInfo {
        width,
        height,
        msaa,
        has_srgb,
    }))
}

/// Narrowest format satisfying the requested temporary attachments.
pub fn temporary_depth_stencil_format(flags: TemporaryRtFlags, depth24_renderable: bool) -> Option<PixelFormat> {
    let depth = flags.contains(TemporaryRtFlags::DEPTH);
    let stencil = flags.contains(TemporaryRtFlags::STENCIL);
    match (depth, stencil) {
        (true, true) => Some(PixelFormat::Depth24UnormStencil8),
        (true, false) if depth24_renderable => Some(PixelFormat::Depth24Unorm),
        (true, false) => Some(PixelFormat::Depth16Unorm),
        (false, true) => Some(PixelFormat::Stencil8),
        (false, false) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ReleaseQueue, TextureSettings};
    use crate::types::TextureType;

    fn caps(multi_format: bool) -> Capabilities {
        Capabilities::builder()
            .feature(Feature::MultiRenderTargetFormats, multi_format)
            .limit(SystemLimit::RenderTargets, 4.0)
            .build()
    }

    fn target(format: PixelFormat, w: u32, h: u32) -> Texture {
        Texture::new(TextureSettings::render_target(format, w, h), ReleaseQueue::new())
    }

    #[test]
    fn test_screen_is_valid() {
        assert_eq!(validate(&RenderTargets::screen(), &caps(false)).unwrap(), None);
    }

    #[test]
    fn test_matching_targets() {
        let targets = RenderTargets::color(target(PixelFormat::Rgba8Unorm, 64, 32))
            .with_color(RenderTarget::new(target(PixelFormat::Rgba8UnormSrgb, 64, 32)))
            .with_depth_stencil(RenderTarget::new(target(PixelFormat::Depth24UnormStencil8, 64, 32)));
        let info = validate(&targets, &caps(true)).unwrap().unwrap();
        assert_eq!((info.width, info.height, info.msaa), (64, 32, 1));
        assert!(info.has_srgb);
    }

    #[test]
    fn test_dimension_mismatch() {
        let targets = RenderTargets::color(target(PixelFormat::Rgba8Unorm, 64, 32))
            .with_color(RenderTarget::new(target(PixelFormat::Rgba8Unorm, 32, 32)));
        let err = validate(&targets, &caps(true)).unwrap_err();
        assert!(err.to_string().contains("same pixel dimensions"));
    }

    #[test]
    fn test_multi_format_requires_feature() {
        let targets = RenderTargets::color(target(PixelFormat::Rgba8Unorm, 8, 8))
            .with_color(RenderTarget::new(target(PixelFormat::R8Unorm, 8, 8)));
        assert!(matches!(validate(&targets, &caps(false)), Err(GraphicsError::Unsupported(_))));
        assert!(validate(&targets, &caps(true)).is_ok());
    }

    #[test]
    fn test_depth_slots_are_exclusive() {
        let depth_as_color = RenderTargets::color(target(PixelFormat::Depth16Unorm, 8, 8));
        assert!(validate(&depth_as_color, &caps(true)).is_err());

        let color_as_depth = RenderTargets::color(target(PixelFormat::Rgba8Unorm, 8, 8))
            .with_depth_stencil(RenderTarget::new(target(PixelFormat::Rgba8Unorm, 8, 8)));
        assert!(validate(&color_as_depth, &caps(true)).is_err());
    }

    #[test]
    fn test_non_render_target_rejected() {
        let plain = Texture::new(TextureSettings::default(), ReleaseQueue::new());
        let err = validate(&RenderTargets::color(plain), &caps(true)).unwrap_err();
        assert_eq!(err.to_string(), NOT_RENDER_TARGET);
    }

    #[test]
    fn test_level_indices_are_checked() {
        let texture = target(PixelFormat::Rgba8Unorm, 8, 8);
        let bad_mip = RenderTargets::default().with_color(RenderTarget::new(texture.clone()).with_mipmap(1));
        assert_eq!(validate(&bad_mip, &caps(true)).unwrap_err().to_string(), "Invalid mipmap level 2.");

        let array = Texture::new(
            TextureSettings {
                texture_type: TextureType::Array,
                layers: 3,
                ..TextureSettings::render_target(PixelFormat::Rgba8Unorm, 8, 8)
            },
            ReleaseQueue::new(),
        );
        let ok = RenderTargets::default().with_color(RenderTarget::new(array.clone()).with_slice(2));
        assert!(validate(&ok, &caps(true)).is_ok());
        let bad_slice = RenderTargets::default().with_color(RenderTarget::new(array).with_slice(3));
        assert_eq!(validate(&bad_slice, &caps(true)).unwrap_err().to_string(), "Invalid slice index: 4.");
    }

    #[test]
    fn test_too_many_targets() {
        let mut targets = RenderTargets::default();
        for _ in 0..5 {
            targets = targets.with_color(RenderTarget::new(target(PixelFormat::Rgba8Unorm, 8, 8)));
        }
        assert!(matches!(validate(&targets, &caps(true)), Err(GraphicsError::Unsupported(_))));
    }

    #[test]
    fn test_temporary_format_ladder() {
        let both = TemporaryRtFlags::DEPTH | TemporaryRtFlags::STENCIL;
        assert_eq!(temporary_depth_stencil_format(both, false), Some(PixelFormat::Depth24UnormStencil8));
        assert_eq!(temporary_depth_stencil_format(TemporaryRtFlags::DEPTH, true), Some(PixelFormat::Depth24Unorm));
        assert_eq!(temporary_depth_stencil_format(TemporaryRtFlags::DEPTH, false), Some(PixelFormat::Depth16Unorm));
        assert_eq!(temporary_depth_stencil_format(TemporaryRtFlags::STENCIL, true), Some(PixelFormat::Stencil8));
        assert_eq!(temporary_depth_stencil_format(TemporaryRtFlags::empty(), true), None);
    }
}
