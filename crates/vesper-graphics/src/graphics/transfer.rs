//! Copies, compute dispatch and readbacks.

use std::sync::Arc;

use vesper_core::geometry::Rect;
use vesper_core::profiling::profile_function;

use super::Graphics;
use crate::backend::{BufferCopy, ComputeBindings, GraphicsBackend, TextureBufferCopy};
use crate::capability::{Feature, SystemLimit};
use crate::error::{GraphicsError, GraphicsResult};
use crate::readback::{Readback, ReadbackMethod, ReadbackSource};
use crate::resource::{Buffer, Shader, Texture};
use crate::types::BufferDataUsage;

/// One side of a texture/buffer copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureRegion<'a> {
    pub texture: &'a Texture,
    pub slice: u32,
    pub mipmap: u32,
    pub rect: Rect<i32>,
}

impl<'a> TextureRegion<'a> {
    /// The whole base level of the first slice.
    pub fn base(texture: &'a Texture) -> Self {
        Self {
            texture,
            slice: 0,
            mipmap: 0,
            rect: Rect::new(0, 0, texture.pixel_width(0) as i32, texture.pixel_height(0) as i32),
        }
    }
}

fn check_range(buffer: &Buffer, offset: u64, size: u64, what: &str) -> GraphicsResult<()> {
    match offset.checked_add(size) {
        Some(end) if end <= buffer.size() => Ok(()),
        _ => Err(GraphicsError::usage(format!(
            "The {} range (offset {}, size {}) does not fit in the buffer's {} bytes.",
            what,
            offset,
            size,
            buffer.size()
        ))),
    }
}

fn check_region(region: &TextureRegion<'_>) -> GraphicsResult<()> {
    let texture = region.texture;
    if texture.msaa() > 1 {
        return Err(GraphicsError::usage("MSAA textures cannot be copied to or from buffers."));
    }
    if region.mipmap >= texture.mipmap_count() {
        return Err(GraphicsError::usage(format!("Invalid mipmap level {}.", region.mipmap + 1)));
    }
    if !texture.is_valid_slice(region.slice, region.mipmap) {
        return Err(GraphicsError::usage(format!("Invalid slice index: {}.", region.slice + 1)));
    }

    let rect = region.rect;
    let width = texture.pixel_width(region.mipmap) as i32;
    let height = texture.pixel_height(region.mipmap) as i32;
    if rect.width <= 0 || rect.height <= 0 || !Rect::new(0, 0, width, height).contains_rect(&rect) {
        return Err(GraphicsError::usage("Invalid rectangle dimensions."));
    }

    let format = texture.format();
    if format.is_compressed() {
        let info = format.info();
        let (bw, bh) = (info.block_width as i32, info.block_height as i32);
        let x_aligned = rect.x % bw == 0 && (rect.width % bw == 0 || rect.x + rect.width == width);
        let y_aligned = rect.y % bh == 0 && (rect.height % bh == 0 || rect.y + rect.height == height);
        if !x_aligned || !y_aligned {
            return Err(GraphicsError::usage(format!(
                "Compressed texture copies must be aligned to the format's {}x{} pixel blocks.",
                bw, bh
            )));
        }
    }
    Ok(())
}

/// Bytes a copy of `rect` touches in a buffer with rows of `buffer_width` pixels.
fn copy_size(region: &TextureRegion<'_>, buffer_width: u32) -> u64 {
    let format = region.texture.format();
    let (w, h) = (region.rect.width as u32, region.rect.height as u32);
    if format.is_compressed() {
        format.slice_size(w, h)
    } else {
        format.row_size((h - 1) * buffer_width + w)
    }
}

impl<B: GraphicsBackend> Graphics<B> {
    pub fn copy_buffer(
        &mut self,
        source: &Buffer,
        dest: &Buffer,
        source_offset: u64,
        dest_offset: u64,
        size: u64,
    ) -> GraphicsResult<()> {
        if !self.has_feature(Feature::CopyBuffer) {
            return Err(GraphicsError::unsupported("Buffer copying is not supported on this system."));
        }
        if source.data_usage() == BufferDataUsage::Stream || dest.data_usage() == BufferDataUsage::Stream {
            return Err(GraphicsError::usage(
                "Buffers created with the 'stream' data usage cannot be used in copies.",
            ));
        }
        if source.data_usage() == BufferDataUsage::Readback {
            return Err(GraphicsError::usage(
                "Buffers created with the 'readback' data usage cannot be used as a copy source.",
            ));
        }
        if dest.is_immutable() {
            return Err(GraphicsError::usage("Cannot copy to an immutable buffer."));
        }
        if size == 0 {
            return Err(GraphicsError::usage("Copy size must be greater than 0."));
        }
        check_range(source, source_offset, size, "source")?;
        check_range(dest, dest_offset, size, "destination")?;
        if source == dest && source_offset < dest_offset + size && dest_offset < source_offset + size {
            return Err(GraphicsError::usage(
                "Copying a portion of a buffer to the same buffer requires non-overlapping ranges.",
            ));
        }

        self.flush_batched_draws()?;
        self.backend.copy_buffer(&BufferCopy {
            source: source.id(),
            dest: dest.id(),
            source_offset,
            dest_offset,
            size,
        })
    }

    /// Copies texels into `dest`, whose rows are `buffer_width` pixels long (0 means the rect width).
    pub fn copy_texture_to_buffer(
        &mut self,
        source: TextureRegion<'_>,
        dest: &Buffer,
        dest_offset: u64,
        buffer_width: u32,
    ) -> GraphicsResult<()> {
        profile_function!();
        let feature = if source.texture.is_render_target() {
            Feature::CopyRenderTargetToBuffer
        } else {
            Feature::CopyTextureToBuffer
        };
        if !self.has_feature(feature) {
            return Err(GraphicsError::unsupported(if source.texture.is_render_target() {
                "Copying a render target to a buffer is not supported on this system."
            } else {
                "Copying a non-render target texture to a buffer is not supported on this system."
            }));
        }
        if dest.is_immutable() {
            return Err(GraphicsError::usage("Cannot copy to an immutable buffer."));
        }
        if dest.data_usage() == BufferDataUsage::Stream {
            return Err(GraphicsError::usage(
                "Buffers created with the 'stream' data usage cannot be used in copies.",
            ));
        }
        if self.state().render_targets.references(source.texture) {
            return Err(GraphicsError::usage("Cannot copy from an active render target."));
        }

        let copy = self.texture_buffer_copy(&source, dest, dest_offset, buffer_width)?;
        self.flush_batched_draws()?;
        self.backend.copy_texture_to_buffer(&copy)
    }

    pub fn copy_buffer_to_texture(
        &mut self,
        source: &Buffer,
        source_offset: u64,
        buffer_width: u32,
        dest: TextureRegion<'_>,
    ) -> GraphicsResult<()> {
        profile_function!();
        if !self.has_feature(Feature::CopyBufferToTexture) {
            return Err(GraphicsError::unsupported(
                "Copying a buffer to a texture is not supported on this system.",
            ));
        }
        if source.data_usage() == BufferDataUsage::Stream {
            return Err(GraphicsError::usage(
                "Buffers created with the 'stream' data usage cannot be used in copies.",
            ));
        }
        if self.state().render_targets.references(dest.texture) {
            return Err(GraphicsError::usage("Cannot copy to an active render target."));
        }

        let copy = self.texture_buffer_copy(&dest, source, source_offset, buffer_width)?;
        self.flush_batched_draws()?;
        self.backend.copy_buffer_to_texture(&copy)
    }

    fn texture_buffer_copy(
        &self,
        region: &TextureRegion<'_>,
        buffer: &Buffer,
        buffer_offset: u64,
        buffer_width: u32,
    ) -> GraphicsResult<TextureBufferCopy> {
        check_region(region)?;

        let buffer_width = if buffer_width == 0 { region.rect.width as u32 } else { buffer_width };
        if buffer_width < region.rect.width as u32 {
            return Err(GraphicsError::usage(format!(
                "Buffer row width ({}) is smaller than the copy width ({}).",
                buffer_width, region.rect.width
            )));
        }
        let format = region.texture.format();
        if format.is_compressed() && buffer_width % format.info().block_width as u32 != 0 {
            return Err(GraphicsError::usage(
                "Buffer row width must be a multiple of the compressed format's block width.",
            ));
        }

        check_range(buffer, buffer_offset, copy_size(region, buffer_width), "buffer")?;

        Ok(TextureBufferCopy {
            texture: region.texture.id(),
            format,
            slice: region.slice,
            mipmap: region.mipmap,
            rect: region.rect,
            buffer: buffer.id(),
            buffer_offset,
            buffer_width,
        })
    }

    /// Runs a compute shader over `groups` threadgroups.
    pub fn dispatch_threadgroups(
        &mut self,
        shader: &Shader,
        groups: [u32; 3],
        bindings: &ComputeBindings,
    ) -> GraphicsResult<()> {
        profile_function!();
        if !shader.is_compute() {
            return Err(GraphicsError::usage("Only compute shaders can have threadgroups dispatched."));
        }
        if groups.contains(&0) {
            return Err(GraphicsError::usage("Threadgroup dispatch size must be positive."));
        }

        let limits = [SystemLimit::ThreadgroupsX, SystemLimit::ThreadgroupsY, SystemLimit::ThreadgroupsZ];
        for (count, limit) in groups.iter().zip(limits) {
            if *count as f64 > self.limit(limit) {
                return Err(GraphicsError::usage(format!(
                    "Too many threadgroups dispatched ({} exceeds the {} limit of {}).",
                    count,
                    limit,
                    self.limit(limit)
                )));
            }
        }

        self.flush_batched_draws()?;
        self.backend.dispatch(shader.id(), groups, bindings)
    }

    /// Starts copying `size` bytes of `buffer` back to the CPU. Completes on a later frame.
    pub fn readback_buffer(&mut self, buffer: &Buffer, offset: u64, size: u64) -> GraphicsResult<Readback> {
        let source = self.buffer_readback_source(buffer, offset, size)?;
        self.start_readback(source, ReadbackMethod::Async)
    }

    /// Copies `size` bytes of `buffer` back to the CPU, blocking until done.
    pub fn readback_buffer_immediate(&mut self, buffer: &Buffer, offset: u64, size: u64) -> GraphicsResult<Arc<[u8]>> {
        let source = self.buffer_readback_source(buffer, offset, size)?;
        self.start_readback(source, ReadbackMethod::Immediate)?
            .wait()
            .map_err(|_| GraphicsError::backend("readback_buffer failed"))
    }

    pub fn readback_texture(&mut self, region: TextureRegion<'_>) -> GraphicsResult<Readback> {
        let source = self.texture_readback_source(&region)?;
        self.start_readback(source, ReadbackMethod::Async)
    }

    pub fn readback_texture_immediate(&mut self, region: TextureRegion<'_>) -> GraphicsResult<Arc<[u8]>> {
        let source = self.texture_readback_source(&region)?;
        self.start_readback(source, ReadbackMethod::Immediate)?
            .wait()
            .map_err(|_| GraphicsError::backend("readback_texture failed"))
    }

    /// Asynchronous readbacks that have not completed yet.
    pub fn pending_readbacks(&self) -> usize {
        self.readbacks.len()
    }

    /// Blocks until every asynchronous readback has completed.
    pub fn wait_readbacks(&mut self) -> GraphicsResult<()> {
        self.flush_batched_draws()?;
        self.readbacks.wait_all();
        Ok(())
    }

    fn buffer_readback_source(&self, buffer: &Buffer, offset: u64, size: u64) -> GraphicsResult<ReadbackSource> {
        if size == 0 {
            return Err(GraphicsError::usage("Readback size must be greater than 0."));
        }
        check_range(buffer, offset, size, "readback")?;
        Ok(ReadbackSource::Buffer {
            id: buffer.id(),
            offset,
            size,
        })
    }

    fn texture_readback_source(&self, region: &TextureRegion<'_>) -> GraphicsResult<ReadbackSource> {
        let texture = region.texture;
        if !texture.is_readable() {
            return Err(GraphicsError::usage("Texture must be readable to be read back."));
        }
        if texture.format().is_depth_stencil() {
            return Err(GraphicsError::unsupported(
                "Readback of depth/stencil textures is not supported.",
            ));
        }
        if texture.format().is_compressed() {
            return Err(GraphicsError::unsupported("Readback of compressed textures is not supported."));
        }
        check_region(region)?;

        let rect = region.rect;
        Ok(ReadbackSource::Texture {
            id: texture.id(),
            slice: region.slice,
            mipmap: region.mipmap,
            x: rect.x as u32,
            y: rect.y as u32,
            width: rect.width as u32,
            height: rect.height as u32,
            format: texture.format(),
        })
    }

    fn start_readback(&mut self, source: ReadbackSource, method: ReadbackMethod) -> GraphicsResult<Readback> {
        profile_function!();
        self.flush_batched_draws()?;
        let task = self.backend.readback(&source, method)?;
        let readback = Readback::new(method, source, task);
        if method == ReadbackMethod::Async {
            self.readbacks.push(readback.clone());
        }
        Ok(readback)
    }
}
