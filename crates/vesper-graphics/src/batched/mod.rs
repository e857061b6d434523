//! Accumulation of small draws into shared streaming buffers.
//!
//! Consecutive requests that agree on primitive, vertex formats, index usage,
//! texture and standard shader are appended to one batch and drawn with a
//! single backend call. Anything else forces the pending batch out first.
//!
//! The accumulator only manages memory and bookkeeping. Deciding when to
//! flush and issuing the draw happens in [`crate::Graphics`], which owns the
//! state the draw needs.

mod types;

pub use types::*;

use bytemuck::Pod;

use crate::error::{GraphicsError, GraphicsResult};
use crate::resource::{ResourceId, Texture};
use crate::stream_buffer::{StreamBuffer, StreamRegion, StreamUsage};
use crate::types::{CommonFormat, PrimitiveType, StandardShader, TriangleIndexMode};

/// What must happen before a command can be appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchPlan {
    pub flush: bool,
    /// New partition sizes for vertex stream 0, vertex stream 1 and the index stream.
    pub resize: [Option<usize>; 3],
}

impl BatchPlan {
    pub fn needs_resize(&self) -> bool {
        self.resize.iter().any(Option::is_some)
    }
}

/// A batch taken out of the accumulator, ready to be drawn.
#[derive(Debug, Clone)]
pub struct PendingBatch {
    pub primitive: PrimitiveType,
    pub formats: [CommonFormat; 2],
    pub texture: Option<Texture>,
    pub standard_shader: StandardShader,
    pub vertex_count: u32,
    pub index_count: u32,
    pub vertex_regions: [Option<(ResourceId, StreamRegion)>; 2],
    pub index_region: Option<(ResourceId, StreamRegion)>,
}

/// Writable vertex memory for one batched request.
pub struct BatchedVertexData<'a> {
    streams: [Option<&'a mut [u8]>; 2],
}

impl<'a> BatchedVertexData<'a> {
    pub fn stream(&mut self, index: usize) -> Option<&mut [u8]> {
        self.streams.get_mut(index).and_then(|s| s.as_deref_mut())
    }

    /// The stream at `index` viewed as vertices of type `T`.
    pub fn cast<T: Pod>(&mut self, index: usize) -> &mut [T] {
        match self.stream(index) {
            Some(bytes) => bytemuck::cast_slice_mut(bytes),
            None => &mut [],
        }
    }

    /// Both streams at once, for the common position + color layout.
    pub fn split<A: Pod, B: Pod>(&mut self) -> (&mut [A], &mut [B]) {
        let [a, b] = &mut self.streams;
        let a: &mut [A] = match a.as_deref_mut() {
            Some(bytes) => bytemuck::cast_slice_mut(bytes),
            None => &mut [],
        };
        let b: &mut [B] = match b.as_deref_mut() {
            Some(bytes) => bytemuck::cast_slice_mut(bytes),
            None => &mut [],
        };
        (a, b)
    }
}

#[derive(Debug)]
pub struct BatchAccumulator {
    primitive: PrimitiveType,
    formats: [CommonFormat; 2],
    texture: Option<Texture>,
    standard_shader: StandardShader,

    vertex_buffers: [StreamBuffer; 2],
    index_buffer: StreamBuffer,

    indexed: bool,
    vertex_count: u32,
    index_count: u32,
    vertex_written: [usize; 2],
    index_written: usize,

    draw_calls_batched: u32,
}

impl BatchAccumulator {
    pub fn new(vertex_size: usize, index_size: usize, partitions: usize) -> Self {
        Self {
            primitive: PrimitiveType::Triangles,
            formats: [CommonFormat::None; 2],
            texture: None,
            standard_shader: StandardShader::Default,
            vertex_buffers: [
                StreamBuffer::new(StreamUsage::Vertex, vertex_size, partitions),
                StreamBuffer::new(StreamUsage::Vertex, vertex_size, partitions),
            ],
            index_buffer: StreamBuffer::new(StreamUsage::Index, index_size, partitions),
            indexed: false,
            vertex_count: 0,
            index_count: 0,
            vertex_written: [0; 2],
            index_written: 0,
            draw_calls_batched: 0,
        }
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_count == 0 && self.index_count == 0
    }

    pub fn draw_calls_batched(&self) -> u32 {
        self.draw_calls_batched
    }

    pub fn reset_stats(&mut self) {
        self.draw_calls_batched = 0;
    }

    pub fn streams(&self) -> [&StreamBuffer; 3] {
        [&self.vertex_buffers[0], &self.vertex_buffers[1], &self.index_buffer]
    }

    pub fn texture(&self) -> Option<&Texture> {
        self.texture.as_ref()
    }

    /// Vertex formats of the batch being accumulated.
    pub fn formats(&self) -> [CommonFormat; 2] {
        self.formats
    }

    /// Decides whether `cmd` can be appended to the current batch as is.
    pub fn plan(&self, cmd: &BatchedDrawCommand) -> GraphicsResult<BatchPlan> {
        if cmd.index_mode != TriangleIndexMode::None && cmd.vertex_count > MAX_BATCH_VERTICES {
            return Err(GraphicsError::usage(format!(
                "Too many vertices ({}) in a single batched draw with generated indices, the limit is {}.",
                cmd.vertex_count, MAX_BATCH_VERTICES
            )));
        }

        let mut plan = BatchPlan::default();
        let indexed = cmd.index_mode != TriangleIndexMode::None;

        if cmd.primitive != self.primitive
            || cmd.formats != self.formats
            || indexed != self.indexed
            || cmd.texture != self.texture
            || cmd.standard_shader != self.standard_shader
        {
            plan.flush = true;
        }

        let total_vertices = self.vertex_count as usize + cmd.vertex_count as usize;
        if indexed && total_vertices > MAX_BATCH_VERTICES as usize {
            plan.flush = true;
        }

        // Bytes `cmd` needs per stream, and what the pending batch already wrote there.
        let mut needed: [Option<(usize, usize)>; 3] = [None; 3];
        for (i, format) in cmd.formats.iter().enumerate() {
            if *format != CommonFormat::None {
                needed[i] = Some((format.stride() * cmd.vertex_count as usize, self.vertex_written[i]));
            }
        }
        if indexed {
            let bytes = index_count(cmd.index_mode, cmd.vertex_count) as usize * std::mem::size_of::<u16>();
            needed[2] = Some((bytes, self.index_written));
        }

        let buffers = [&self.vertex_buffers[0], &self.vertex_buffers[1], &self.index_buffer];

        // Appending is only possible when the batch continues and every stream has room.
        for (i, need) in needed.iter().enumerate() {
            if let Some((bytes, written)) = *need
                && written + bytes > buffers[i].usable_size()
            {
                plan.flush = true;
            }
        }

        // After a flush the batch's bytes are consumed, rounded up to the stream alignment.
        for (i, need) in needed.iter().enumerate() {
            let Some((bytes, written)) = *need else { continue };
            let buffer = buffers[i];
            let available = if plan.flush {
                buffer.usable_size().saturating_sub(buffer.consumed_size(written))
            } else {
                buffer.usable_size().saturating_sub(written)
            };
            if bytes > available {
                plan.resize[i] = Some(bytes.max(buffer.size() * 2));
            }
        }

        if plan.needs_resize() {
            plan.flush = true;
        }

        Ok(plan)
    }

    /// Replaces the streams named in `plan` with larger ones. Must only be
    /// called on an empty batch. Returns the replaced streams' ids.
    pub fn resize(&mut self, plan: &BatchPlan, partitions: usize) -> Vec<ResourceId> {
        debug_assert!(self.is_empty());
        let mut replaced = Vec::new();
        for (i, size) in plan.resize.iter().enumerate() {
            let Some(size) = *size else { continue };
            let slot = if i < 2 { &mut self.vertex_buffers[i] } else { &mut self.index_buffer };
            tracing::debug!("Growing {:?} stream buffer to {} bytes", slot.usage(), size);
            let grown = StreamBuffer::new(slot.usage(), size, partitions);
            replaced.push(std::mem::replace(slot, grown).id());
        }
        replaced
    }

    /// Takes on the batch-defining parts of `cmd`. Only valid right after a flush.
    pub fn adopt(&mut self, cmd: &BatchedDrawCommand) {
        debug_assert!(self.is_empty());
        self.primitive = cmd.primitive;
        self.formats = cmd.formats;
        self.texture = cmd.texture.clone();
        self.standard_shader = cmd.standard_shader;
        self.indexed = cmd.index_mode != TriangleIndexMode::None;
    }

    /// Reserves space for `cmd`, generates its indices and hands back the
    /// vertex memory for the caller to fill.
    pub fn append(&mut self, cmd: &BatchedDrawCommand) -> BatchedVertexData<'_> {
        if cmd.index_mode != TriangleIndexMode::None {
            let count = index_count(cmd.index_mode, cmd.vertex_count);
            if !self.index_buffer.is_mapped() {
                self.index_buffer.map();
            }
            let bytes = self.index_buffer.mapped_slice(self.index_written, count as usize * 2);
            let indices: &mut [u16] = bytemuck::cast_slice_mut(bytes);
            fill_indices(cmd.index_mode, self.vertex_count as u16, cmd.vertex_count, indices);
            self.index_written += count as usize * 2;
            self.index_count += count;
        }

        if self.vertex_count > 0 {
            self.draw_calls_batched += 1;
        }
        self.vertex_count += cmd.vertex_count;

        let [b0, b1] = &mut self.vertex_buffers;
        let mut streams: [Option<&mut [u8]>; 2] = [None, None];
        for (i, buffer) in [b0, b1].into_iter().enumerate() {
            let format = cmd.formats[i];
            if format == CommonFormat::None {
                continue;
            }
            if !buffer.is_mapped() {
                buffer.map();
            }
            let len = format.stride() * cmd.vertex_count as usize;
            let offset = self.vertex_written[i];
            self.vertex_written[i] += len;
            streams[i] = Some(buffer.mapped_slice(offset, len));
        }

        BatchedVertexData { streams }
    }

    /// Unmaps the streams, marks the written regions as used and resets the
    /// counts. Returns `None` when nothing is pending.
    ///
    /// An indexed batch whose commands were all too short to form a triangle
    /// has vertices but no indices; it is consumed without producing a draw.
    pub fn take_pending(&mut self) -> Option<PendingBatch> {
        if self.is_empty() {
            return None;
        }
        let drawable = !self.indexed || self.index_count > 0;

        let mut vertex_regions = [None, None];
        for (i, buffer) in self.vertex_buffers.iter_mut().enumerate() {
            if buffer.is_mapped() {
                buffer.unmap();
            }
            if self.vertex_written[i] > 0 {
                vertex_regions[i] = Some((buffer.id(), buffer.mark_used(self.vertex_written[i])));
            }
        }

        if self.index_buffer.is_mapped() {
            self.index_buffer.unmap();
        }
        let index_region = (self.index_written > 0)
            .then(|| (self.index_buffer.id(), self.index_buffer.mark_used(self.index_written)));

        let pending = PendingBatch {
            primitive: self.primitive,
            formats: self.formats,
            texture: self.texture.clone(),
            standard_shader: self.standard_shader,
            vertex_count: self.vertex_count,
            index_count: self.index_count,
            vertex_regions,
            index_region,
        };

        self.vertex_count = 0;
        self.index_count = 0;
        self.vertex_written = [0; 2];
        self.index_written = 0;

        drawable.then_some(pending)
    }

    /// Bytes of a flushed region. Valid until the stream's partition comes around again.
    pub fn region_data(&self, id: ResourceId, region: StreamRegion) -> &[u8] {
        let buffer = self
            .vertex_buffers
            .iter()
            .chain(std::iter::once(&self.index_buffer))
            .find(|b| b.id() == id);
        match buffer {
            Some(buffer) => buffer.data(region),
            None => &[],
        }
    }

    pub fn next_frame(&mut self) {
        for buffer in &mut self.vertex_buffers {
            buffer.next_frame();
        }
        self.index_buffer.next_frame();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn command(count: u32, mode: TriangleIndexMode) -> BatchedDrawCommand {
        BatchedDrawCommand {
            formats: [CommonFormat::Xy, CommonFormat::Rgba8],
            index_mode: mode,
            vertex_count: count,
            ..Default::default()
        }
    }

    fn submit(acc: &mut BatchAccumulator, cmd: &BatchedDrawCommand) -> BatchPlan {
        let plan = acc.plan(cmd).unwrap();
        if plan.flush {
            acc.take_pending();
            acc.resize(&plan, 2);
            acc.adopt(cmd);
        }
        acc.append(cmd);
        plan
    }

    #[test]
    fn test_identical_commands_coalesce() {
        let mut acc = BatchAccumulator::new(1024, 1024, 2);
        let cmd = command(4, TriangleIndexMode::Fan);
        assert!(submit(&mut acc, &cmd).flush);
        assert!(!submit(&mut acc, &cmd).flush);
        assert!(!submit(&mut acc, &cmd).flush);
        assert_eq!(acc.vertex_count(), 12);
        assert_eq!(acc.index_count(), 18);
        assert_eq!(acc.draw_calls_batched(), 2);
    }

    #[test]
    fn test_fan_indices_offset_by_running_base() {
        let mut acc = BatchAccumulator::new(1024, 1024, 2);
        let cmd = command(3, TriangleIndexMode::Fan);
        submit(&mut acc, &cmd);
        submit(&mut acc, &cmd);
        let pending = acc.take_pending().unwrap();
        let (id, region) = pending.index_region.unwrap();
        let indices: Vec<u16> = acc
            .region_data(id, region)
            .chunks(2)
            .map(|c| u16::from_ne_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_index_presence_change_flushes() {
        let mut acc = BatchAccumulator::new(1024, 1024, 2);
        submit(&mut acc, &command(4, TriangleIndexMode::Quads));
        assert!(acc.plan(&command(4, TriangleIndexMode::None)).unwrap().flush);
    }

    #[test]
    fn test_index_limit_forces_flush() {
        let mut acc = BatchAccumulator::new(1 << 20, 1 << 20, 1);
        submit(&mut acc, &command(60_000, TriangleIndexMode::Fan));
        assert!(acc.plan(&command(6_000, TriangleIndexMode::Fan)).unwrap().flush);
        assert!(!acc.plan(&command(5_535, TriangleIndexMode::Fan)).unwrap().flush);
    }

    #[test]
    fn test_growth_doubles_and_flushes() {
        let mut acc = BatchAccumulator::new(64, 64, 2);
        let cmd = command(4, TriangleIndexMode::None);
        submit(&mut acc, &cmd);
        let plan = acc.plan(&command(8, TriangleIndexMode::None)).unwrap();
        assert!(plan.flush);
        assert_eq!(plan.resize[0], Some(128));
        assert_eq!(plan.resize[1], None);
    }

    #[test]
    fn test_format_change_counts_flushed_bytes() {
        let mut acc = BatchAccumulator::new(1024, 1024, 1);
        let quad = BatchedDrawCommand {
            formats: [CommonFormat::XyStRgba8, CommonFormat::None],
            index_mode: TriangleIndexMode::Quads,
            vertex_count: 4,
            ..Default::default()
        };
        for _ in 0..12 {
            submit(&mut acc, &quad);
        }

        // 960 bytes of quads leave 64 bytes, too few for 10 points at 8 bytes each.
        let points = BatchedDrawCommand {
            primitive: PrimitiveType::Points,
            vertex_count: 10,
            ..command(10, TriangleIndexMode::None)
        };
        let plan = acc.plan(&points).unwrap();
        assert!(plan.flush);
        assert_eq!(plan.resize[0], Some(2048));
        assert_eq!(plan.resize[1], None);

        submit(&mut acc, &points);
        let pending = acc.take_pending().unwrap();
        let (id, region) = pending.vertex_regions[0].unwrap();
        assert_eq!(region, StreamRegion { offset: 0, len: 80 });
        assert_eq!(acc.streams()[0].id(), id);
        assert_eq!(acc.streams()[0].size(), 2048);
    }

    #[test]
    fn test_flushed_index_bytes_round_up() {
        let mut acc = BatchAccumulator::new(1024, 24, 1);
        // One fan triangle writes 6 index bytes and consumes 8 once flushed.
        submit(&mut acc, &command(3, TriangleIndexMode::Fan));

        let strip = BatchedDrawCommand {
            standard_shader: StandardShader::Points,
            ..command(4, TriangleIndexMode::Strip)
        };
        let plan = acc.plan(&strip).unwrap();
        assert!(plan.flush);
        assert_eq!(plan.resize[2], None);

        // 18 bytes fit behind the raw 6 but not behind the consumed 8.
        let longer = BatchedDrawCommand {
            vertex_count: 5,
            ..strip
        };
        assert_eq!(acc.plan(&longer).unwrap().resize[2], Some(48));
    }

    #[test]
    fn test_short_generated_command_keeps_index_mode() {
        let mut acc = BatchAccumulator::new(1024, 1024, 1);
        // Two fan vertices produce no triangle and no indices.
        submit(&mut acc, &command(2, TriangleIndexMode::Fan));
        assert_eq!(acc.index_count(), 0);

        let list = command(3, TriangleIndexMode::None);
        assert!(acc.plan(&list).unwrap().flush);

        // The index-less batch is dropped instead of drawn without indices.
        assert!(acc.take_pending().is_none());
        assert!(acc.is_empty());
    }

    #[test]
    fn test_oversized_indexed_command_rejected() {
        let acc = BatchAccumulator::new(64, 64, 1);
        assert!(acc.plan(&command(70_000, TriangleIndexMode::Quads)).is_err());
    }

    #[test]
    fn test_vertex_data_is_writable() {
        let mut acc = BatchAccumulator::new(256, 256, 1);
        let cmd = command(2, TriangleIndexMode::None);
        acc.plan(&cmd).unwrap();
        acc.adopt(&cmd);
        let mut data = acc.append(&cmd);
        let (positions, colors) = data.split::<Vec2, vesper_core::color::Color32>();
        assert_eq!(positions.len(), 2);
        assert_eq!(colors.len(), 2);
        positions[1] = Vec2::new(3.0, 4.0);

        let pending = acc.take_pending().unwrap();
        let (id, region) = pending.vertex_regions[0].unwrap();
        let written: &[Vec2] = bytemuck::cast_slice(acc.region_data(id, region));
        assert_eq!(written[1], Vec2::new(3.0, 4.0));
    }
}
