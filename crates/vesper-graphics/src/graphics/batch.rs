use vesper_core::color::Color;
use vesper_core::profiling::profile_function;

use super::Graphics;
use crate::backend::{DrawCommand, GraphicsBackend, IndexSource, StreamSlice};
use crate::batched::{BatchedDrawCommand, BatchedVertexData};
use crate::error::GraphicsResult;
use crate::resource::{ReleasedResource, ShaderBinding, Texture};
use crate::stream_buffer::StreamRegion;

impl<B: GraphicsBackend> Graphics<B> {
    /// Reserves room for `cmd` in the current batch and returns its vertex memory.
    ///
    /// The pending batch is drawn first when `cmd` cannot join it. Positions
    /// written into the returned memory must already be transformed; the
    /// batch is drawn with an identity model transform.
    pub fn request_batched_draw(&mut self, cmd: &BatchedDrawCommand) -> GraphicsResult<BatchedVertexData<'_>> {
        profile_function!();

        let plan = self.batch.plan(cmd)?;
        if plan.flush {
            self.flush_batched_draws()?;
        }

        if plan.needs_resize() {
            let partitions = self.config.frames_in_flight.max(1) as usize;
            for id in self.batch.resize(&plan, partitions) {
                self.backend.release(ReleasedResource::StreamBuffer { id });
            }
            let streams = self.batch.streams();
            for (stream, resized) in streams.into_iter().zip(plan.resize) {
                if resized.is_some() {
                    self.backend
                        .create_stream_buffer(stream.id(), stream.usage(), stream.total_size())?;
                }
            }
        }

        if self.batch.is_empty() {
            self.batch.adopt(cmd);
        }
        Ok(self.batch.append(cmd))
    }

    /// Draws everything accumulated since the last flush with a single backend call.
    pub fn flush_batched_draws(&mut self) -> GraphicsResult<()> {
        let Some(pending) = self.batch.take_pending() else {
            return Ok(());
        };
        profile_function!();

        let state = self.state();
        let constant_color = if pending.formats.iter().any(|f| f.has_color()) {
            Color::WHITE
        } else {
            self.linear_color(state.color)
        };
        let shader = match &state.shader {
            Some(shader) => ShaderBinding::Custom(shader.id()),
            None => ShaderBinding::Standard(pending.standard_shader),
        };
        let draw_state = self.batch_draw_state(constant_color);

        let batch = &self.batch;
        let slice = |(buffer, region): (crate::resource::ResourceId, StreamRegion)| StreamSlice {
            buffer,
            offset: region.offset as u64,
            data: batch.region_data(buffer, region),
        };

        let cmd = DrawCommand {
            primitive: pending.primitive,
            vertex_format: pending.formats,
            vertex_streams: pending.vertex_regions.map(|region| region.map(slice)),
            index: pending.index_region.map(|region| IndexSource::Stream(slice(region))),
            vertex_start: 0,
            vertex_count: pending.vertex_count,
            index_count: pending.index_count,
            instance_count: 1,
            texture: pending.texture.as_ref().map(Texture::id),
            shader,
            state: &draw_state,
        };

        self.backend.draw(&cmd)?;
        self.draw_calls += 1;
        Ok(())
    }

    /// `color` in the space vertex colors are blended in.
    pub(super) fn linear_color(&self, color: Color) -> Color {
        if self.config.gamma_correct { color.gamma_to_linear() } else { color }
    }
}
