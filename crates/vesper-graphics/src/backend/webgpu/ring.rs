//! Per-draw uniform storage.
//!
//! One buffer is split into a region per frame in flight. Draws take aligned
//! slices from the current frame's region, so data written for a frame the
//! GPU may still be reading is never overwritten.

use vesper_core::profiling::profile_function;

/// Offset bookkeeping for a frame-partitioned ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingCursor {
    frame_size: u64,
    frames: u64,
    frame: u64,
    offset: u64,
}

impl RingCursor {
    pub fn new(frame_size: u64, frames: u32) -> Self {
        Self {
            frame_size,
            frames: frames.max(1) as u64,
            frame: 0,
            offset: 0,
        }
    }

    pub fn frame_size(&self) -> u64 {
        self.frame_size
    }

    pub fn total_size(&self) -> u64 {
        self.frame_size * self.frames
    }

    fn frame_start(&self) -> u64 {
        (self.frame % self.frames) * self.frame_size
    }

    /// Returns the offset of `size` bytes aligned to `alignment`, or `None`
    /// when the current frame's region is full.
    pub fn allocate(&mut self, size: u64, alignment: u64) -> Option<u64> {
        let aligned = self.offset.next_multiple_of(alignment);
        if aligned + size > self.frame_start() + self.frame_size {
            return None;
        }
        self.offset = aligned + size;
        Some(aligned)
    }

    pub fn remaining(&self) -> u64 {
        (self.frame_start() + self.frame_size).saturating_sub(self.offset)
    }

    pub fn next_frame(&mut self) {
        self.frame += 1;
        self.offset = self.frame_start();
    }
}

/// Uniform buffer with a bind group that takes a dynamic offset.
pub struct UniformRing {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    cursor: RingCursor,
    element_size: u64,
    alignment: u64,
}

impl UniformRing {
    pub fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        element_size: u64,
        alignment: u64,
        elements_per_frame: u64,
        frames: u32,
    ) -> Self {
        let frame_size = (element_size.next_multiple_of(alignment) * elements_per_frame.max(1)).max(alignment);
        let cursor = RingCursor::new(frame_size, frames);
        let (buffer, bind_group) = create_buffer(device, layout, cursor.total_size(), element_size);
        Self {
            buffer,
            bind_group,
            cursor,
            element_size,
            alignment,
        }
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    /// Writes `data` into the current frame's region and returns its dynamic offset.
    ///
    /// A full region is replaced by one twice the size. The previous buffer is
    /// returned so the caller can keep it alive until the GPU is done with it.
    pub fn push(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        data: &[u8],
    ) -> (u32, Option<wgpu::Buffer>) {
        profile_function!();
        debug_assert!(data.len() as u64 <= self.element_size);

        let mut replaced = None;
        let offset = match self.cursor.allocate(self.element_size, self.alignment) {
            Some(offset) => offset,
            None => {
                let frames = (self.cursor.total_size() / self.cursor.frame_size()) as u32;
                let grown = RingCursor::new(self.cursor.frame_size() * 2, frames);
                tracing::debug!("Growing uniform ring to {} bytes per frame", grown.frame_size());
                let (buffer, bind_group) = create_buffer(device, layout, grown.total_size(), self.element_size);
                replaced = Some(std::mem::replace(&mut self.buffer, buffer));
                self.bind_group = bind_group;
                self.cursor = grown;
                // An empty region always fits one element.
                self.cursor.allocate(self.element_size, self.alignment).unwrap_or(0)
            }
        };

        queue.write_buffer(&self.buffer, offset, data);
        (offset as u32, replaced)
    }

    pub fn next_frame(&mut self) {
        self.cursor.next_frame();
    }
}

fn create_buffer(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    size: u64,
    binding_size: u64,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Uniform Ring"),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Uniform Ring Bind Group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: wgpu::BufferSize::new(binding_size),
            }),
        }],
    });
    (buffer, bind_group)
}
