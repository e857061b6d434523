//! The render state captured by `push`/`pop`.

use std::any::Any;
use std::sync::Arc;

use bitflags::bitflags;
use glam::Mat4;
use vesper_core::color::Color;
use vesper_core::geometry::Rect;

use crate::blend::BlendState;
use crate::resource::{Shader, Texture};
use crate::types::{ColorChannelMask, CullMode, DepthState, LineJoin, LineStyle, SamplerState, StencilState, Winding};

/// One attachment of a render target set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTarget {
    pub texture: Texture,
    pub slice: u32,
    pub mipmap: u32,
}

impl RenderTarget {
    pub fn new(texture: Texture) -> Self {
        Self {
            texture,
            slice: 0,
            mipmap: 0,
        }
    }

    pub fn with_slice(mut self, slice: u32) -> Self {
        self.slice = slice;
        self
    }

    pub fn with_mipmap(mut self, mipmap: u32) -> Self {
        self.mipmap = mipmap;
        self
    }
}

bitflags! {
    /// Attachments the graphics module should supply from its temporary pool.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TemporaryRtFlags: u8 {
        const DEPTH = 1 << 0;
        const STENCIL = 1 << 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderTargets {
    pub colors: Vec<RenderTarget>,
    pub depth_stencil: Option<RenderTarget>,
    pub temporary_flags: TemporaryRtFlags,
}

impl RenderTargets {
    /// The default target set, which renders to the screen.
    pub fn screen() -> Self {
        Self::default()
    }

    pub fn color(texture: Texture) -> Self {
        Self {
            colors: vec![RenderTarget::new(texture)],
            ..Default::default()
        }
    }

    pub fn with_color(mut self, target: RenderTarget) -> Self {
        self.colors.push(target);
        self
    }

    pub fn with_depth_stencil(mut self, target: RenderTarget) -> Self {
        self.depth_stencil = Some(target);
        self
    }

    pub fn with_temporary(mut self, flags: TemporaryRtFlags) -> Self {
        self.temporary_flags |= flags;
        self
    }

    pub fn is_screen(&self) -> bool {
        self.colors.is_empty() && self.depth_stencil.is_none()
    }

    /// The attachment whose dimensions define the target size.
    pub fn first_target(&self) -> Option<&RenderTarget> {
        self.colors.first().or(self.depth_stencil.as_ref())
    }

    pub fn references(&self, texture: &Texture) -> bool {
        self.colors.iter().any(|rt| rt.texture == *texture)
            || self.depth_stencil.as_ref().is_some_and(|rt| rt.texture == *texture)
    }
}

/// Opaque handle to the active font. The text subsystem owns the contents.
#[derive(Clone)]
pub struct FontRef(pub Arc<dyn Any + Send + Sync>);

impl PartialEq for FontRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for FontRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FontRef").field(&Arc::as_ptr(&self.0)).finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayState {
    pub color: Color,
    pub background_color: Color,

    pub blend: BlendState,

    pub line_width: f32,
    pub line_style: LineStyle,
    pub line_join: LineJoin,

    pub point_size: f32,

    pub scissor: Option<Rect<i32>>,

    pub mesh_cull_mode: CullMode,
    pub winding: Winding,

    pub font: Option<FontRef>,
    pub shader: Option<Shader>,

    pub render_targets: RenderTargets,

    pub stencil: StencilState,
    pub depth: DepthState,

    pub color_mask: ColorChannelMask,
    pub wireframe: bool,

    pub default_sampler: SamplerState,

    pub custom_projection: Option<Mat4>,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            background_color: Color::BLACK,
            blend: BlendState::default(),
            line_width: 1.0,
            line_style: LineStyle::Smooth,
            line_join: LineJoin::Miter,
            point_size: 1.0,
            scissor: None,
            mesh_cull_mode: CullMode::None,
            winding: Winding::Ccw,
            font: None,
            shader: None,
            render_targets: RenderTargets::screen(),
            stencil: StencilState::default(),
            depth: DepthState::default(),
            color_mask: ColorChannelMask::all(),
            wireframe: false,
            default_sampler: SamplerState::default(),
            custom_projection: None,
        }
    }
}
