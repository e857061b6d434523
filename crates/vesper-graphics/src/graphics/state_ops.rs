//! Push/pop, state setters, transforms and projections.

use glam::{Mat4, Vec2};
use tracing::trace;
use vesper_core::color::Color;
use vesper_core::geometry::Rect;
use vesper_core::profiling::profile_function;

use super::{DEFAULT_DEPTH_RANGE, Graphics};
use crate::backend::GraphicsBackend;
use crate::blend::{BlendAlpha, BlendMode, BlendState, compute_blend_mode, compute_blend_state};
use crate::capability::Feature;
use crate::error::{GraphicsError, GraphicsResult};
use crate::render_target;
use crate::resource::Shader;
use crate::state::{DisplayState, FontRef};
use crate::transform::{calculate_device_projection, screen_ortho};
use crate::types::{
    ColorChannelMask, CompareMode, CullMode, DepthState, LineJoin, LineStyle, SamplerState, StackType, StencilAction,
    StencilState, Winding,
};

impl<B: GraphicsBackend> Graphics<B> {
    /// Saves the transform, and with [`StackType::All`] the whole display state.
    pub fn push(&mut self, kind: StackType) -> GraphicsResult<()> {
        if self.stack_types.len() >= self.config.max_stack_depth {
            return Err(GraphicsError::usage("Maximum stack depth reached (more pushes than pops?)"));
        }

        self.transforms.push();
        self.stack_types.push(kind);
        if kind == StackType::All {
            let top = self.state().clone();
            self.states.push(top);
        }
        Ok(())
    }

    /// Undoes the matching [`push`](Self::push).
    ///
    /// Only the fields that differ from the saved state are reapplied, so
    /// unchanged state never reaches the backend.
    pub fn pop(&mut self) -> GraphicsResult<()> {
        profile_function!();
        let Some(&kind) = self.stack_types.last() else {
            return Err(GraphicsError::usage("Minimum stack depth reached (more pops than pushes?)"));
        };

        if kind == StackType::All {
            let previous = self.states[self.states.len() - 2].clone();
            self.restore_state(&previous)?;
            self.states.pop();
        }

        self.stack_types.pop();
        self.transforms.pop();
        Ok(())
    }

    /// Number of outstanding pushes.
    pub fn stack_depth(&self) -> usize {
        self.stack_types.len()
    }

    /// Restores the default display state and an identity transform.
    ///
    /// The stack itself is left alone.
    pub fn reset(&mut self) -> GraphicsResult<()> {
        self.restore_state(&DisplayState::default())?;
        self.transforms.origin();
        Ok(())
    }

    /// A copy of the current display state.
    pub fn display_state(&self) -> DisplayState {
        self.state().clone()
    }

    /// Makes `target` the current state.
    ///
    /// Everything that can be rejected is checked before anything changes.
    /// The remaining fields were accepted by their setters when the snapshot
    /// was taken, so they are written back directly after a single flush.
    fn restore_state(&mut self, target: &DisplayState) -> GraphicsResult<()> {
        let current = self.state();
        let targets_changed = current.render_targets != target.render_targets;
        if targets_changed {
            render_target::validate(&target.render_targets, self.backend.capabilities())?;
        }

        let vertex_colors = self.batch.formats().iter().any(|f| f.has_color());
        let affects_batch = (current.color != target.color && !vertex_colors)
            || current.blend != target.blend
            || current.point_size != target.point_size
            || current.scissor != target.scissor
            || current.winding != target.winding
            || current.shader != target.shader
            || current.stencil != target.stencil
            || current.depth != target.depth
            || current.color_mask != target.color_mask
            || current.wireframe != target.wireframe;
        if affects_batch {
            self.flush_batched_draws()?;
        }

        if targets_changed {
            self.set_render_targets(target.render_targets.clone())?;
        }

        // Binding targets resets the projection, so compare against what is applied now.
        let applied_projection = self.state().custom_projection;
        let top = self.state_mut();
        *top = DisplayState {
            render_targets: top.render_targets.clone(),
            custom_projection: applied_projection,
            ..target.clone()
        };

        match target.custom_projection {
            Some(projection) if applied_projection != Some(projection) => self.set_custom_projection(projection),
            None if applied_projection.is_some() => self.reset_projection(),
            _ => Ok(()),
        }
    }

    pub fn set_color(&mut self, color: Color) -> GraphicsResult<()> {
        // Batches without per-vertex color take the draw color as a constant at flush.
        if color != self.state().color && !self.batch.is_empty() && !self.batch.formats().iter().any(|f| f.has_color())
        {
            self.flush_batched_draws()?;
        }
        self.state_mut().color = color;
        Ok(())
    }

    pub fn color(&self) -> Color {
        self.state().color
    }

    pub fn set_background_color(&mut self, color: Color) {
        self.state_mut().background_color = color;
    }

    pub fn background_color(&self) -> Color {
        self.state().background_color
    }

    pub fn set_blend_state(&mut self, blend: BlendState) -> GraphicsResult<()> {
        if blend.uses_min_max() && !self.has_feature(Feature::BlendMinMax) {
            return Err(GraphicsError::unsupported(
                "The 'min' and 'max' blend operations are not supported on this system.",
            ));
        }
        if blend != self.state().blend {
            self.flush_batched_draws()?;
        }
        self.state_mut().blend = blend;
        Ok(())
    }

    pub fn blend_state(&self) -> BlendState {
        self.state().blend
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode, alpha: BlendAlpha) -> GraphicsResult<()> {
        if alpha == BlendAlpha::Multiply && mode.requires_premultiplied() {
            return Err(GraphicsError::usage(format!(
                "The '{}' blend mode must be used with premultiplied alpha.",
                mode
            )));
        }
        if matches!(mode, BlendMode::Lighten | BlendMode::Darken) && !self.has_feature(Feature::Lighten) {
            return Err(GraphicsError::unsupported(format!(
                "The '{}' blend mode is not supported on this system.",
                mode
            )));
        }
        self.set_blend_state(compute_blend_state(mode, alpha))
    }

    /// The named mode matching the current blend state, if there is one.
    pub fn blend_mode(&self) -> Option<(BlendMode, BlendAlpha)> {
        compute_blend_mode(&self.state().blend)
    }

    pub fn set_line_width(&mut self, width: f32) {
        self.state_mut().line_width = width;
    }

    pub fn line_width(&self) -> f32 {
        self.state().line_width
    }

    pub fn set_line_style(&mut self, style: LineStyle) {
        self.state_mut().line_style = style;
    }

    pub fn line_style(&self) -> LineStyle {
        self.state().line_style
    }

    pub fn set_line_join(&mut self, join: LineJoin) {
        self.state_mut().line_join = join;
    }

    pub fn line_join(&self) -> LineJoin {
        self.state().line_join
    }

    pub fn set_point_size(&mut self, size: f32) -> GraphicsResult<()> {
        if size != self.state().point_size {
            self.flush_batched_draws()?;
        }
        self.state_mut().point_size = size;
        Ok(())
    }

    pub fn point_size(&self) -> f32 {
        self.state().point_size
    }

    pub fn set_scissor(&mut self, rect: Rect<i32>) -> GraphicsResult<()> {
        if rect.width < 0 || rect.height < 0 {
            return Err(GraphicsError::usage("Scissor cannot have negative width or height."));
        }
        if self.state().scissor != Some(rect) {
            self.flush_batched_draws()?;
        }
        self.state_mut().scissor = Some(rect);
        Ok(())
    }

    /// Narrows the scissor to its overlap with `rect`.
    pub fn intersect_scissor(&mut self, rect: Rect<i32>) -> GraphicsResult<()> {
        let current = self
            .state()
            .scissor
            .unwrap_or(Rect::new(0, 0, i32::MAX, i32::MAX));
        let width = rect.width.max(0);
        let height = rect.height.max(0);
        self.set_scissor(current.intersect(&Rect::new(rect.x, rect.y, width, height)))
    }

    pub fn clear_scissor(&mut self) -> GraphicsResult<()> {
        if self.state().scissor.is_some() {
            self.flush_batched_draws()?;
        }
        self.state_mut().scissor = None;
        Ok(())
    }

    pub fn scissor(&self) -> Option<Rect<i32>> {
        self.state().scissor
    }

    /// Face culling for meshes. Batched 2D primitives never cull.
    pub fn set_mesh_cull_mode(&mut self, mode: CullMode) {
        self.state_mut().mesh_cull_mode = mode;
    }

    pub fn mesh_cull_mode(&self) -> CullMode {
        self.state().mesh_cull_mode
    }

    pub fn set_front_face_winding(&mut self, winding: Winding) -> GraphicsResult<()> {
        if winding != self.state().winding {
            self.flush_batched_draws()?;
        }
        self.state_mut().winding = winding;
        Ok(())
    }

    pub fn front_face_winding(&self) -> Winding {
        self.state().winding
    }

    pub fn set_font(&mut self, font: Option<FontRef>) {
        self.state_mut().font = font;
    }

    pub fn font(&self) -> Option<FontRef> {
        self.state().font.clone()
    }

    /// Draws with `shader` instead of the standard shaders. `None` goes back to them.
    pub fn set_shader(&mut self, shader: Option<Shader>) -> GraphicsResult<()> {
        if shader.as_ref().is_some_and(Shader::is_compute) {
            return Err(GraphicsError::usage(
                "Cannot use a compute shader for drawing. Use dispatch_threadgroups instead.",
            ));
        }
        if shader != self.state().shader {
            self.flush_batched_draws()?;
        }
        self.state_mut().shader = shader;
        Ok(())
    }

    pub fn shader(&self) -> Option<Shader> {
        self.state().shader.clone()
    }

    /// Sets the stencil test and what passing fragments do to the stencil buffer.
    pub fn set_stencil_mode(&mut self, action: StencilAction, compare: CompareMode, value: i32) -> GraphicsResult<()> {
        let state = StencilState {
            action,
            compare,
            value,
            ..self.state().stencil
        };
        self.set_stencil_state(state)
    }

    pub fn set_stencil_state(&mut self, stencil: StencilState) -> GraphicsResult<()> {
        if stencil.is_active() && self.is_render_target_active() && !self.bound_has_stencil() {
            return Err(GraphicsError::usage(
                "Drawing to the stencil buffer with a render target active requires either stencil=true or a custom \
                 stencil-type texture to be used, in set_render_targets.",
            ));
        }
        if stencil != self.state().stencil {
            self.flush_batched_draws()?;
        }
        self.state_mut().stencil = stencil;
        Ok(())
    }

    pub fn stencil_state(&self) -> StencilState {
        self.state().stencil
    }

    pub fn set_depth_mode(&mut self, compare: CompareMode, write: bool) -> GraphicsResult<()> {
        let depth = DepthState { compare, write };
        if depth.is_active() && self.is_render_target_active() && !self.bound_has_depth() {
            return Err(GraphicsError::usage(
                "Drawing to the depth buffer with a render target active requires either depth=true or a custom \
                 depth-type texture to be used, in set_render_targets.",
            ));
        }
        if depth != self.state().depth {
            self.flush_batched_draws()?;
        }
        self.state_mut().depth = depth;
        Ok(())
    }

    pub fn depth_mode(&self) -> DepthState {
        self.state().depth
    }

    pub fn set_color_mask(&mut self, mask: ColorChannelMask) -> GraphicsResult<()> {
        if mask != self.state().color_mask {
            self.flush_batched_draws()?;
        }
        self.state_mut().color_mask = mask;
        Ok(())
    }

    pub fn color_mask(&self) -> ColorChannelMask {
        self.state().color_mask
    }

    pub fn set_wireframe(&mut self, enable: bool) -> GraphicsResult<()> {
        if enable != self.state().wireframe {
            self.flush_batched_draws()?;
        }
        self.state_mut().wireframe = enable;
        Ok(())
    }

    pub fn is_wireframe(&self) -> bool {
        self.state().wireframe
    }

    /// Sampler given to textures created without explicit sampler settings.
    pub fn set_default_sampler(&mut self, sampler: SamplerState) {
        self.state_mut().default_sampler = sampler;
    }

    pub fn default_sampler(&self) -> SamplerState {
        self.state().default_sampler
    }

    // Transforms are applied on the CPU as vertices are written, so none of
    // these need to flush.

    pub fn translate(&mut self, x: f32, y: f32) {
        self.transforms.translate(x, y);
    }

    pub fn rotate(&mut self, angle: f32) {
        self.transforms.rotate(angle);
    }

    pub fn scale(&mut self, x: f32, y: f32) {
        self.transforms.scale(x, y);
    }

    pub fn shear(&mut self, kx: f32, ky: f32) {
        self.transforms.shear(kx, ky);
    }

    pub fn origin(&mut self) {
        self.transforms.origin();
    }

    pub fn apply_transform(&mut self, transform: &Mat4) {
        self.transforms.apply(transform);
    }

    pub fn replace_transform(&mut self, transform: &Mat4) {
        self.transforms.replace(transform);
    }

    pub fn transform(&self) -> Mat4 {
        self.transforms.current()
    }

    pub fn transform_point(&self, point: Vec2) -> Vec2 {
        self.transforms.transform_point(point)
    }

    pub fn inverse_transform_point(&self, point: Vec2) -> Vec2 {
        self.transforms.inverse_transform_point(point)
    }

    /// Approximate size of one drawing unit in pixels under the current transform.
    pub fn pixel_scale(&self) -> f64 {
        self.transforms.pixel_scale()
    }

    pub fn set_ortho_projection(&mut self, width: f32, height: f32, near: f32, far: f32) -> GraphicsResult<()> {
        if near >= far {
            return Err(GraphicsError::usage("Orthographic near plane must be less than far plane."));
        }
        self.set_custom_projection(screen_ortho(width, height, near, far))
    }

    pub fn set_perspective_projection(
        &mut self,
        vertical_fov: f32,
        aspect: f32,
        near: f32,
        far: f32,
    ) -> GraphicsResult<()> {
        if near <= 0.0 {
            return Err(GraphicsError::usage("Perspective near plane must be greater than 0."));
        }
        if near >= far {
            return Err(GraphicsError::usage("Perspective far plane must be greater than near plane."));
        }
        self.set_custom_projection(Mat4::perspective_rh_gl(vertical_fov, aspect, near, far))
    }

    /// Replaces the projection until the next `reset_projection` or target switch.
    pub fn set_custom_projection(&mut self, projection: Mat4) -> GraphicsResult<()> {
        self.apply_projection(projection)?;
        self.state_mut().custom_projection = Some(projection);
        Ok(())
    }

    /// Back to a pixel-space orthographic projection of the current target.
    pub fn reset_projection(&mut self) -> GraphicsResult<()> {
        let (width, height) = self.dimensions();
        let (near, far) = DEFAULT_DEPTH_RANGE;
        self.apply_projection(screen_ortho(width as f32, height as f32, near, far))?;
        self.state_mut().custom_projection = None;
        Ok(())
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// The projection as the backend expects it for the bound targets.
    pub fn device_projection(&self) -> Mat4 {
        let flags = self.backend.device_projection_flags(self.is_render_target_active());
        calculate_device_projection(&self.projection, flags)
    }

    fn apply_projection(&mut self, projection: Mat4) -> GraphicsResult<()> {
        if projection != self.projection {
            self.flush_batched_draws()?;
            trace!("Projection changed");
        }
        self.projection = projection;
        Ok(())
    }
}
