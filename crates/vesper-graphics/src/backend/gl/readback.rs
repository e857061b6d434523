//! Pixel pack buffer readbacks.
//!
//! An asynchronous readback copies into a staging buffer and inserts a fence.
//! The staging buffer is mapped once the fence has signaled, which the
//! backend checks at every present. The task handed to the caller only
//! observes a shared slot, so it stays `Send` while the GL objects remain on
//! the context thread.

use std::rc::Rc;
use std::sync::Arc;

use glow::HasContext;
use parking_lot::Mutex;
use vesper_core::profiling::profile_function;

use crate::error::{GraphicsError, GraphicsResult};
use crate::readback::{CompletedReadback, ReadbackMethod, ReadbackPoll, ReadbackSource, ReadbackTask};

use super::draw::lookup;
use super::functions::{BufferCopy, PixelReadback};
use super::{GlBackend, RawBuffer, RawFence};

type Slot = Arc<Mutex<Option<ReadbackPoll>>>;

pub struct PendingReadback {
    buffer: RawBuffer,
    fence: Option<RawFence>,
    size: usize,
    slot: Slot,
}

/// Caller side of a fenced readback.
struct SlotReadback {
    slot: Slot,
}

impl ReadbackTask for SlotReadback {
    fn poll(&mut self, _wait: bool) -> ReadbackPoll {
        self.slot.lock().take().unwrap_or(ReadbackPoll::Pending)
    }
}

impl GlBackend {
    pub(super) fn start_readback(
        &mut self,
        source: &ReadbackSource,
        method: ReadbackMethod,
    ) -> GraphicsResult<Box<dyn ReadbackTask>> {
        profile_function!();
        let fenced = method == ReadbackMethod::Async && self.functions.readback == PixelReadback::PackBuffer;
        let gl = Rc::clone(&self.gl);

        match *source {
            ReadbackSource::Buffer { id, offset, size } => {
                let raw = self.buffer(id)?.raw;

                if fenced && self.functions.buffer_copy == BufferCopy::CopySubData {
                    let staging = unsafe {
                        let staging = gl.create_buffer().map_err(GraphicsError::Backend)?;
                        gl.bind_buffer(glow::COPY_WRITE_BUFFER, Some(staging));
                        gl.buffer_data_size(glow::COPY_WRITE_BUFFER, size as i32, glow::STREAM_READ);
                        gl.bind_buffer(glow::COPY_READ_BUFFER, Some(raw));
                        gl.copy_buffer_sub_data(glow::COPY_READ_BUFFER, glow::COPY_WRITE_BUFFER, offset as i32, 0, size as i32);
                        staging
                    };
                    return Ok(self.queue_readback(staging, size as usize));
                }

                let target = if self.features.copy_buffer() {
                    glow::COPY_READ_BUFFER
                } else {
                    self.state.array_buffer.invalidate();
                    glow::ARRAY_BUFFER
                };
                let data = unsafe {
                    gl.bind_buffer(target, Some(raw));
                    read_bound_buffer(&gl, target, offset as usize, size as usize, self.features.es)
                };
                Ok(Box::new(completed(data)))
            }
            ReadbackSource::Texture {
                id,
                slice,
                mipmap,
                x,
                y,
                width,
                height,
                format,
            } => {
                let texture = lookup(&self.textures, id)?.clone();
                let attachment = crate::backend::TargetAttachment {
                    texture: id,
                    format: texture.pixel_format,
                    slice,
                    mipmap,
                };
                let fbo = self.framebuffer_for(vec![attachment], None)?;
                self.bind_framebuffer(Some(fbo));
                let size = format.slice_size(width, height) as usize;

                let task: Box<dyn ReadbackTask> = unsafe {
                    if fenced {
                        let staging = gl.create_buffer().map_err(GraphicsError::Backend)?;
                        gl.bind_buffer(glow::PIXEL_PACK_BUFFER, Some(staging));
                        gl.buffer_data_size(glow::PIXEL_PACK_BUFFER, size as i32, glow::STREAM_READ);
                        gl.read_pixels(
                            x as i32,
                            y as i32,
                            width as i32,
                            height as i32,
                            texture.format.external,
                            texture.format.ty,
                            glow::PixelPackData::BufferOffset(0),
                        );
                        gl.bind_buffer(glow::PIXEL_PACK_BUFFER, None);
                        self.queue_readback(staging, size)
                    } else {
                        let mut data = vec![0u8; size];
                        gl.read_pixels(
                            x as i32,
                            y as i32,
                            width as i32,
                            height as i32,
                            texture.format.external,
                            texture.format.ty,
                            glow::PixelPackData::Slice(Some(&mut data)),
                        );
                        Box::new(CompletedReadback::ready(data))
                    }
                };

                self.bind_framebuffer(self.current_framebuffer);
                Ok(task)
            }
            ReadbackSource::Screen { width, height } => {
                // Read synchronously: the rows have to be flipped before the
                // caller sees them.
                self.bind_framebuffer(None);
                let mut data = vec![0u8; source.size() as usize];
                unsafe {
                    gl.read_pixels(
                        0,
                        0,
                        width as i32,
                        height as i32,
                        glow::RGBA,
                        glow::UNSIGNED_BYTE,
                        glow::PixelPackData::Slice(Some(&mut data)),
                    );
                }
                self.bind_framebuffer(self.current_framebuffer);
                flip_rows(&mut data, width as usize * 4);
                Ok(Box::new(CompletedReadback::ready(data)))
            }
        }
    }

    fn queue_readback(&mut self, buffer: RawBuffer, size: usize) -> Box<dyn ReadbackTask> {
        let fence = unsafe {
            let fence = self.gl.fence_sync(glow::SYNC_GPU_COMMANDS_COMPLETE, 0).ok();
            self.gl.flush();
            fence
        };
        let slot = Slot::default();
        self.readbacks.push(PendingReadback {
            buffer,
            fence,
            size,
            slot: Arc::clone(&slot),
        });
        Box::new(SlotReadback { slot })
    }

    /// Maps every readback whose fence has signaled. With `wait`, blocks on each.
    pub(super) fn resolve_readbacks(&mut self, wait: bool) {
        if self.readbacks.is_empty() {
            return;
        }
        let gl = Rc::clone(&self.gl);
        let es = self.features.es;

        self.readbacks.retain_mut(|pending| unsafe {
            if let Some(fence) = pending.fence {
                let (flags, timeout) = if wait { (glow::SYNC_FLUSH_COMMANDS_BIT, i32::MAX) } else { (0, 0) };
                let status = gl.client_wait_sync(fence, flags, timeout);
                if status == glow::TIMEOUT_EXPIRED {
                    return true;
                }
                gl.delete_sync(fence);
            }

            gl.bind_buffer(glow::PIXEL_PACK_BUFFER, Some(pending.buffer));
            let data = read_bound_buffer(&gl, glow::PIXEL_PACK_BUFFER, 0, pending.size, es);
            gl.bind_buffer(glow::PIXEL_PACK_BUFFER, None);
            gl.delete_buffer(pending.buffer);

            *pending.slot.lock() = Some(match data {
                Some(bytes) => ReadbackPoll::Ready(bytes),
                None => ReadbackPoll::Failed("Could not map the readback buffer".to_string()),
            });
            false
        });
    }

    /// Fails every outstanding readback, used when the context goes away.
    pub(super) fn discard_readbacks(&mut self) {
        for pending in self.readbacks.drain(..) {
            unsafe {
                if let Some(fence) = pending.fence {
                    self.gl.delete_sync(fence);
                }
                self.gl.delete_buffer(pending.buffer);
            }
            *pending.slot.lock() = Some(ReadbackPoll::Failed("The graphics context was destroyed".to_string()));
        }
    }
}

/// Reverses the row order of tightly packed pixel data.
fn flip_rows(data: &mut [u8], row_bytes: usize) {
    if row_bytes == 0 {
        return;
    }
    let rows = data.len() / row_bytes;
    for row in 0..rows / 2 {
        let (top, bottom) = data.split_at_mut((rows - 1 - row) * row_bytes);
        top[row * row_bytes..(row + 1) * row_bytes].swap_with_slice(&mut bottom[..row_bytes]);
    }
}

fn completed(data: Option<Vec<u8>>) -> CompletedReadback {
    match data {
        Some(bytes) => CompletedReadback::ready(bytes),
        None => CompletedReadback::failed("Could not map the buffer for reading"),
    }
}

/// Reads `size` bytes from the buffer bound at `target`.
unsafe fn read_bound_buffer(gl: &glow::Context, target: u32, offset: usize, size: usize, es: bool) -> Option<Vec<u8>> {
    unsafe {
        if !es {
            let mut data = vec![0u8; size];
            gl.get_buffer_sub_data(target, offset as i32, &mut data);
            return Some(data);
        }

        let ptr = gl.map_buffer_range(target, offset as i32, size as i32, glow::MAP_READ_BIT);
        if ptr.is_null() {
            return None;
        }
        let data = std::slice::from_raw_parts(ptr, size).to_vec();
        gl.unmap_buffer(target);
        Some(data)
    }
}
