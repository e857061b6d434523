use tracing::debug;
use vesper_core::color::Color;
use vesper_core::profiling::profile_function;

use super::Graphics;
use crate::backend::{BoundTargets, ClearRequest, GraphicsBackend, TargetAttachment};
use crate::error::{GraphicsError, GraphicsResult};
use crate::pixel_format::{PixelFormat, PixelFormatUsage};
use crate::render_target::{self, temporary_depth_stencil_format};
use crate::state::{RenderTarget, RenderTargets};

fn attachment(target: &RenderTarget) -> TargetAttachment {
    TargetAttachment {
        texture: target.texture.id(),
        format: target.texture.format(),
        slice: target.slice,
        mipmap: target.mipmap,
    }
}

impl<B: GraphicsBackend> Graphics<B> {
    /// Renders into `targets` from now on. [`RenderTargets::screen`] goes back to the backbuffer.
    ///
    /// Binding the set that is already bound does nothing. A failed
    /// validation leaves the previous targets bound. When `targets` asks for
    /// temporary depth or stencil without supplying an attachment, one is
    /// taken from the temporary pool and cleared.
    pub fn set_render_targets(&mut self, targets: RenderTargets) -> GraphicsResult<()> {
        profile_function!();

        let targets = if targets.is_screen() { RenderTargets::screen() } else { targets };
        if targets == self.state().render_targets {
            return Ok(());
        }

        let info = render_target::validate(&targets, self.backend.capabilities())?;

        self.flush_batched_draws()?;

        let mut bound = match info {
            None => {
                let (width, height) = self.backend.screen_size();
                BoundTargets::screen(width, height, self.config.msaa)
            }
            Some(info) => BoundTargets {
                colors: targets.colors.iter().map(attachment).collect(),
                depth_stencil: targets.depth_stencil.as_ref().map(attachment),
                width: info.width,
                height: info.height,
                msaa: info.msaa,
            },
        };

        let mut temporary = None;
        if info.is_some() && bound.depth_stencil.is_none() {
            let depth24 = self
                .backend
                .pixel_format_usage(PixelFormat::Depth24Unorm)
                .contains(PixelFormatUsage::RENDERTARGET);
            if let Some(format) = temporary_depth_stencil_format(targets.temporary_flags, depth24) {
                let texture = self.acquire_temporary_texture(format, bound.width, bound.height, bound.msaa)?;
                bound.depth_stencil = Some(TargetAttachment {
                    texture: texture.id(),
                    format,
                    slice: 0,
                    mipmap: 0,
                });
                temporary = Some(texture);
            }
        }

        let result = self.backend.set_render_targets(&bound);
        // The pool keeps the attachment alive; checking it back in right away
        // lets the next pass with the same shape share it.
        if let Some(texture) = &temporary {
            self.release_temporary_texture(texture);
        }
        result?;

        debug!(
            "Bound {} render target(s) at {}x{}",
            bound.colors.len(),
            bound.width,
            bound.height
        );

        let clear_temporary = bound.depth_stencil.filter(|_| temporary.is_some());
        self.bound = bound;
        self.bound_temporary = temporary;
        self.target_info = info;
        self.state_mut().render_targets = targets;
        self.render_target_switches += 1;
        self.reset_projection()?;

        if let Some(ds) = clear_temporary {
            self.backend.clear(&ClearRequest {
                colors: vec![None; self.bound.colors.len()],
                stencil: ds.format.is_stencil().then_some(0),
                depth: ds.format.is_depth().then_some(1.0),
            })?;
        }
        Ok(())
    }

    pub fn render_targets(&self) -> RenderTargets {
        self.state().render_targets.clone()
    }

    pub fn is_render_target_active(&self) -> bool {
        self.target_info.is_some()
    }

    /// Whether the sRGB conversion applies to what is being drawn to.
    pub fn is_render_target_srgb(&self) -> bool {
        match self.target_info {
            Some(info) => info.has_srgb,
            None => self.config.gamma_correct,
        }
    }

    pub(super) fn bound_has_stencil(&self) -> bool {
        match &self.bound.depth_stencil {
            Some(ds) => ds.format.is_stencil(),
            None => self.target_info.is_none() && self.config.depth_stencil,
        }
    }

    pub(super) fn bound_has_depth(&self) -> bool {
        match &self.bound.depth_stencil {
            Some(ds) => ds.format.is_depth(),
            None => self.target_info.is_none() && self.config.depth_stencil,
        }
    }

    /// Clears every color attachment to `color`, stencil to 0 and depth to 1.
    pub fn clear_all(&mut self, color: Color) -> GraphicsResult<()> {
        self.clear(&[Some(color)], Some(0), Some(1.0))
    }

    /// Clears the bound attachments.
    ///
    /// A single color applies to every color attachment. Otherwise colors
    /// map to attachments in order and `None` leaves one untouched.
    pub fn clear(&mut self, colors: &[Option<Color>], stencil: Option<i32>, depth: Option<f64>) -> GraphicsResult<()> {
        let attachments = if self.is_render_target_active() { self.bound.colors.len() } else { 1 };
        if colors.len() > 1 && colors.len() > attachments {
            return Err(GraphicsError::usage(format!(
                "Number of clear colors ({}) exceeds the number of active render targets ({}).",
                colors.len(),
                attachments
            )));
        }

        let mut request = ClearRequest {
            colors: vec![None; attachments],
            stencil,
            depth,
        };
        match colors {
            [single] => request.colors.fill(single.map(|c| self.linear_color(c))),
            many => {
                for (slot, color) in request.colors.iter_mut().zip(many) {
                    *slot = color.map(|c| self.linear_color(c));
                }
            }
        }

        if request.is_empty() {
            return Ok(());
        }
        self.flush_batched_draws()?;
        self.backend.clear(&request)
    }
}
