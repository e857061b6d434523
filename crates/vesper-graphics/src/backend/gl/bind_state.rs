//! Shadow copy of GL binding state, used to skip redundant calls.
//!
//! Every setter returns whether the value changed and the GL call must be
//! issued. The tracker starts out "unknown" so the first set always goes
//! through.

use vesper_core::geometry::Rect;

use crate::blend::BlendState;
use crate::types::{ColorChannelMask, CullMode, DepthState, StencilState, Winding};

/// One piece of tracked state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tracked<T> {
    value: Option<T>,
}

impl<T> Default for Tracked<T> {
    fn default() -> Self {
        Self { value: None }
    }
}

impl<T: PartialEq + Copy> Tracked<T> {
    /// Records `value`, returning true when it differs from the last one.
    pub fn set(&mut self, value: T) -> bool {
        if self.value == Some(value) {
            return false;
        }
        self.value = Some(value);
        true
    }

    pub fn get(&self) -> Option<T> {
        self.value
    }

    /// Forgets the value, e.g. after an external library touched GL state.
    pub fn invalidate(&mut self) {
        self.value = None;
    }

    /// Forgets the value only if it equals `value`, used when an object is deleted.
    pub fn forget(&mut self, value: T) {
        if self.value == Some(value) {
            self.value = None;
        }
    }
}

/// Texture bound to each unit plus the active unit.
#[derive(Debug, Clone)]
pub struct TextureUnits<T> {
    units: Vec<Option<T>>,
    active: Tracked<u32>,
}

impl<T: PartialEq + Copy> TextureUnits<T> {
    pub fn new(count: usize) -> Self {
        Self {
            units: vec![None; count.max(1)],
            active: Tracked::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Returns `(switch_unit, bind)`: whether the active unit must change and
    /// whether the texture must be bound.
    pub fn bind(&mut self, unit: u32, texture: Option<T>) -> (bool, bool) {
        let Some(slot) = self.units.get_mut(unit as usize) else {
            return (false, false);
        };
        if *slot == texture {
            return (false, false);
        }
        *slot = texture;
        (self.active.set(unit), true)
    }

    pub fn bound(&self, unit: u32) -> Option<T> {
        self.units.get(unit as usize).copied().flatten()
    }

    /// Clears every unit that holds `texture`. Returns the cleared units.
    pub fn forget(&mut self, texture: T) -> Vec<u32> {
        let mut cleared = Vec::new();
        for (i, slot) in self.units.iter_mut().enumerate() {
            if *slot == Some(texture) {
                *slot = None;
                cleared.push(i as u32);
            }
        }
        cleared
    }
}

/// Capabilities toggled with `glEnable`/`glDisable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnableCap {
    Blend,
    DepthTest,
    StencilTest,
    ScissorTest,
    CullFace,
    FramebufferSrgb,
}

impl EnableCap {
    const COUNT: usize = 6;

    pub fn to_gl(self) -> u32 {
        match self {
            EnableCap::Blend => glow::BLEND,
            EnableCap::DepthTest => glow::DEPTH_TEST,
            EnableCap::StencilTest => glow::STENCIL_TEST,
            EnableCap::ScissorTest => glow::SCISSOR_TEST,
            EnableCap::CullFace => glow::CULL_FACE,
            EnableCap::FramebufferSrgb => glow::FRAMEBUFFER_SRGB,
        }
    }
}

/// Fixed-function state of the context, generic over native object handles.
#[derive(Debug, Clone)]
pub struct BindState<Program, VertexArray, Buffer, Framebuffer, Texture> {
    pub program: Tracked<Option<Program>>,
    pub vertex_array: Tracked<Option<VertexArray>>,
    pub array_buffer: Tracked<Option<Buffer>>,
    pub element_buffer: Tracked<Option<Buffer>>,
    pub framebuffer: Tracked<Option<Framebuffer>>,
    pub textures: TextureUnits<Texture>,
    enabled: [Tracked<bool>; EnableCap::COUNT],
    pub viewport: Tracked<Rect<i32>>,
    pub scissor: Tracked<Rect<i32>>,
    pub blend: Tracked<BlendState>,
    pub depth: Tracked<DepthState>,
    pub stencil: Tracked<StencilState>,
    pub color_mask: Tracked<ColorChannelMask>,
    pub cull_mode: Tracked<CullMode>,
    pub winding: Tracked<Winding>,
    pub wireframe: Tracked<bool>,
    pub point_size: Tracked<u32>,
}

impl<P, V, B, F, T> BindState<P, V, B, F, T>
where
    P: PartialEq + Copy,
    V: PartialEq + Copy,
    B: PartialEq + Copy,
    F: PartialEq + Copy,
    T: PartialEq + Copy,
{
    pub fn new(texture_units: usize) -> Self {
        Self {
            program: Tracked::default(),
            vertex_array: Tracked::default(),
            array_buffer: Tracked::default(),
            element_buffer: Tracked::default(),
            framebuffer: Tracked::default(),
            textures: TextureUnits::new(texture_units),
            enabled: [Tracked::default(); EnableCap::COUNT],
            viewport: Tracked::default(),
            scissor: Tracked::default(),
            blend: Tracked::default(),
            depth: Tracked::default(),
            stencil: Tracked::default(),
            color_mask: Tracked::default(),
            cull_mode: Tracked::default(),
            winding: Tracked::default(),
            wireframe: Tracked::default(),
            point_size: Tracked::default(),
        }
    }

    pub fn set_enabled(&mut self, cap: EnableCap, enabled: bool) -> bool {
        self.enabled[cap as usize].set(enabled)
    }

    pub fn is_enabled(&self, cap: EnableCap) -> Option<bool> {
        self.enabled[cap as usize].get()
    }

    /// Forgets everything, e.g. after the context was used by another library.
    pub fn invalidate(&mut self) {
        *self = Self::new(self.textures.len());
    }
}
