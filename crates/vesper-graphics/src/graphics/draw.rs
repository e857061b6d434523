use glam::Mat4;
use tracing::debug;
use vesper_core::color::Color;
use vesper_core::profiling::profile_function;

use super::Graphics;
use crate::backend::{DrawCommand, DrawState, GraphicsBackend, IndexSource, StreamSlice};
use crate::batched::{BatchedDrawCommand, MAX_BATCH_VERTICES};
use crate::capability::Feature;
use crate::error::{GraphicsError, GraphicsResult};
use crate::readback::{Readback, ReadbackMethod, ReadbackSource};
use crate::resource::{Buffer, ShaderBinding, Texture};
use crate::types::{BufferUsage, CommonFormat, CullMode, PrimitiveType, TriangleIndexMode};

/// Vertex-less draws with a custom shader, and screenshots.
impl<B: GraphicsBackend> Graphics<B> {
    /// Draws `vertex_count` vertices that the active custom shader generates
    /// from its vertex and instance indices. No vertex attributes are bound.
    ///
    /// Pending batched draws are flushed first. Triangle fans are drawn
    /// through generated indices, so they are limited to 65535 vertices.
    pub fn draw_shader_vertices(
        &mut self,
        primitive: PrimitiveType,
        vertex_count: u32,
        instance_count: u32,
        texture: Option<&Texture>,
    ) -> GraphicsResult<()> {
        profile_function!();

        if primitive == PrimitiveType::TriangleFan && vertex_count > MAX_BATCH_VERTICES {
            return Err(GraphicsError::usage(format!(
                "Too many vertices ({}) for a triangle fan, the limit is {}.",
                vertex_count, MAX_BATCH_VERTICES
            )));
        }
        let shader = self.check_shader_draw(instance_count)?;
        self.flush_batched_draws()?;

        if vertex_count == 0 {
            return Ok(());
        }

        let draw_state = self.direct_draw_state();
        if primitive != PrimitiveType::TriangleFan {
            let cmd = DrawCommand {
                primitive,
                vertex_format: [CommonFormat::None; 2],
                vertex_streams: [None, None],
                index: None,
                vertex_start: 0,
                vertex_count,
                index_count: 0,
                instance_count: instance_count.max(1),
                texture: texture.map(Texture::id),
                shader,
                state: &draw_state,
            };
            self.backend.draw(&cmd)?;
            self.draw_calls += 1;
            return Ok(());
        }

        // Fan indices come from the batch index stream; the batch holds
        // nothing else after the flush above.
        self.request_batched_draw(&BatchedDrawCommand {
            primitive: PrimitiveType::Triangles,
            index_mode: TriangleIndexMode::Fan,
            vertex_count,
            texture: texture.cloned(),
            ..Default::default()
        })?;
        let Some(pending) = self.batch.take_pending() else {
            return Ok(());
        };
        let Some((buffer, region)) = pending.index_region else {
            return Ok(());
        };

        let cmd = DrawCommand {
            primitive: PrimitiveType::Triangles,
            vertex_format: [CommonFormat::None; 2],
            vertex_streams: [None, None],
            index: Some(IndexSource::Stream(StreamSlice {
                buffer,
                offset: region.offset as u64,
                data: self.batch.region_data(buffer, region),
            })),
            vertex_start: 0,
            vertex_count,
            index_count: pending.index_count,
            instance_count: instance_count.max(1),
            texture: texture.map(Texture::id),
            shader,
            state: &draw_state,
        };
        self.backend.draw(&cmd)?;
        self.draw_calls += 1;
        Ok(())
    }

    /// Draws triangles indexed by `index_buffer`, starting at `start_index`,
    /// with vertices generated by the active custom shader.
    pub fn draw_shader_vertices_indexed(
        &mut self,
        index_buffer: &Buffer,
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        texture: Option<&Texture>,
    ) -> GraphicsResult<()> {
        profile_function!();

        let format = match index_buffer.settings().index_format {
            Some(format) if index_buffer.usage().contains(BufferUsage::INDEX) => format,
            _ => {
                return Err(GraphicsError::usage(
                    "The buffer passed to draw_shader_vertices must be an index buffer.",
                ));
            }
        };
        if start_index as u64 + index_count as u64 > index_buffer.index_count() {
            return Err(GraphicsError::usage(
                "draw_shader_vertices start index and index count do not fit in the given index buffer.",
            ));
        }
        let shader = self.check_shader_draw(instance_count)?;
        self.flush_batched_draws()?;

        if index_count == 0 {
            return Ok(());
        }

        let draw_state = self.direct_draw_state();
        let cmd = DrawCommand {
            primitive: PrimitiveType::Triangles,
            vertex_format: [CommonFormat::None; 2],
            vertex_streams: [None, None],
            index: Some(IndexSource::Buffer {
                buffer: index_buffer.id(),
                format,
                start: start_index,
            }),
            vertex_start: 0,
            vertex_count: 0,
            index_count,
            instance_count: instance_count.max(1),
            texture: texture.map(Texture::id),
            shader,
            state: &draw_state,
        };
        self.backend.draw(&cmd)?;
        self.draw_calls += 1;
        Ok(())
    }

    /// Same as [`Graphics::draw_shader_vertices`] with triangles and `instance_count` instances.
    pub fn draw_instanced(&mut self, vertex_count: u32, instance_count: u32, texture: Option<&Texture>) -> GraphicsResult<()> {
        self.draw_shader_vertices(PrimitiveType::Triangles, vertex_count, instance_count, texture)
    }

    /// Queues a copy of the screen as it looks when the frame is presented.
    ///
    /// The readback stays pending until [`Graphics::present`], then holds
    /// tightly packed RGBA8 rows, top row first.
    pub fn capture_screenshot(&mut self) -> Readback {
        let (width, height) = self.backend.screen_size();
        let readback = Readback::deferred(ReadbackMethod::Async, ReadbackSource::Screen { width, height });
        self.screenshots.push(readback.clone());
        readback
    }

    /// Starts the copies for every screenshot captured this frame.
    pub(super) fn take_screenshots(&mut self) {
        if self.screenshots.is_empty() {
            return;
        }
        let (width, height) = self.backend.screen_size();
        for screenshot in std::mem::take(&mut self.screenshots) {
            let source = screenshot.source();
            if source != (ReadbackSource::Screen { width, height }) {
                screenshot.fail("The screen was resized before the screenshot was taken.");
                continue;
            }
            match self.backend.readback(&source, ReadbackMethod::Async) {
                Ok(task) => {
                    screenshot.start(task);
                    self.readbacks.push(screenshot);
                }
                Err(err) => screenshot.fail(err.to_string()),
            }
        }
        debug!("Captured screenshot of {}x{}", width, height);
    }

    fn check_shader_draw(&self, instance_count: u32) -> GraphicsResult<ShaderBinding> {
        if !self.has_feature(Feature::Glsl3) {
            return Err(GraphicsError::unsupported(
                "draw_shader_vertices is not supported on this system (GLSL3 support is required.)",
            ));
        }
        if instance_count > 1 && !self.has_feature(Feature::Instancing) {
            return Err(GraphicsError::unsupported("Instancing is not supported on this system."));
        }
        match &self.state().shader {
            Some(shader) if !shader.is_compute() => Ok(ShaderBinding::Custom(shader.id())),
            _ => Err(GraphicsError::usage(
                "draw_shader_vertices can only be used with a custom shader.",
            )),
        }
    }

    /// State for draws that are not batched: the current transform and mesh culling apply.
    fn direct_draw_state(&self) -> DrawState {
        let state = self.state();
        DrawState {
            transform: self.transforms.current(),
            cull_mode: state.mesh_cull_mode,
            ..self.batch_draw_state(self.linear_color(state.color))
        }
    }

    pub(super) fn batch_draw_state(&self, constant_color: Color) -> DrawState {
        let state = self.state();
        DrawState {
            transform: Mat4::IDENTITY,
            projection: self.device_projection(),
            constant_color,
            blend: state.blend,
            stencil: state.stencil,
            depth: state.depth,
            color_mask: state.color_mask,
            cull_mode: CullMode::None,
            winding: state.winding,
            wireframe: state.wireframe,
            scissor: state.scissor,
            point_size: state.point_size,
        }
    }
}
