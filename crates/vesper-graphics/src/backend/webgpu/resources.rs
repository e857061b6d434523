//! Textures, buffers, programs, copies, compute and readbacks.
//!
//! Initial contents go through the queue since nothing can have used a new
//! object yet. Later writes are staged and recorded on the frame encoder so
//! they land between the draws issued before and after them.

use tracing::debug;
use vesper_core::alloc::HashMap;
use vesper_core::geometry::Rect;
use vesper_core::profiling::profile_function;
use wgpu::util::DeviceExt;

use crate::backend::{BufferCopy, ComputeBindings, TextureBufferCopy};
use crate::error::{GraphicsError, GraphicsResult};
use crate::pixel_format::PixelFormat;
use crate::readback::{ReadbackMethod, ReadbackSource, ReadbackTask};
use crate::resource::{BufferSettings, ResourceId, ShaderStageIds, TextureSettings};
use crate::types::{SamplerState, TextureType};

use super::draw::lookup;
use super::pipeline::{self, TextureLayoutKey};
use super::readback::{PaddedRows, StagingReadback};
use super::sampler::{SamplerCache, SamplerKey};
use super::{DeferredResource, TextureBinding, WgpuBackend, WgpuBuffer, WgpuProgram, WgpuTexture, formats};

type TextureLayouts = HashMap<TextureLayoutKey, (wgpu::BindGroupLayout, wgpu::PipelineLayout)>;

pub fn create_init_buffer(device: &wgpu::Device, label: &str, contents: &[u8], usage: wgpu::BufferUsages) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents,
        usage,
    })
}

/// Bind group layout for `key` and the pipeline layout pairing it with the globals.
pub fn texture_layout<'a>(
    device: &wgpu::Device,
    layouts: &'a mut TextureLayouts,
    globals_layout: &wgpu::BindGroupLayout,
    key: TextureLayoutKey,
) -> &'a (wgpu::BindGroupLayout, wgpu::PipelineLayout) {
    layouts.entry(key).or_insert_with(|| {
        let layout = key.create_layout(device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Vesper Pipeline Layout"),
            bind_group_layouts: &[globals_layout, &layout],
            push_constant_ranges: &[],
        });
        (layout, pipeline_layout)
    })
}

pub fn create_white_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    samplers: &mut SamplerCache,
    layouts: &mut TextureLayouts,
    globals_layout: &wgpu::BindGroupLayout,
    border_clamp: bool,
) -> TextureBinding {
    let size = wgpu::Extent3d {
        width: 1,
        height: 1,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("White Texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        texture.as_image_copy(),
        &[255; 4],
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: None,
        },
        size,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let key = TextureLayoutKey::WHITE;
    let sampler = samplers.get_or_create(device, SamplerKey::from_state(&SamplerState::default(), key.sampler, border_clamp));
    let (layout, _) = texture_layout(device, layouts, globals_layout, key);
    TextureBinding {
        layout: key,
        bind_group: texture_bind_group(device, layout, &view, &sampler),
    }
}

fn texture_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Texture Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

/// Bytes per row of blocks and number of block rows covering `width` x `height`.
pub fn block_rows(format: PixelFormat, width: u32, height: u32) -> (u32, u32) {
    let info = format.info();
    let (bw, bh) = (info.block_width.max(1) as u32, info.block_height.max(1) as u32);
    (width.div_ceil(bw) * info.block_size as u32, height.div_ceil(bh))
}

/// Native usages for a texture created with `settings`.
pub fn texture_usages(settings: &TextureSettings) -> wgpu::TextureUsages {
    use wgpu::TextureUsages as U;

    if settings.msaa > 1 || settings.format.is_depth_stencil() {
        return U::RENDER_ATTACHMENT | U::TEXTURE_BINDING;
    }
    let mut usage = U::TEXTURE_BINDING | U::COPY_DST | U::COPY_SRC;
    if settings.render_target && !settings.format.is_compressed() {
        usage |= U::RENDER_ATTACHMENT;
    }
    if settings.compute_write {
        usage |= U::STORAGE_BINDING;
    }
    usage
}

fn texture_size(settings: &TextureSettings) -> wgpu::Extent3d {
    let layers = match settings.texture_type {
        TextureType::D2 => 1,
        TextureType::Cube => 6,
        TextureType::Array | TextureType::Volume => settings.layers.max(1),
    };
    wgpu::Extent3d {
        width: settings.width.max(1),
        height: settings.height.max(1),
        depth_or_array_layers: layers,
    }
}

/// Aspect touched by copies into or out of `format`.
fn copy_aspect(format: PixelFormat) -> wgpu::TextureAspect {
    if format.is_depth() && format.is_stencil() {
        wgpu::TextureAspect::DepthOnly
    } else {
        wgpu::TextureAspect::All
    }
}

fn texel_copy(
    texture: &wgpu::Texture,
    format: PixelFormat,
    mipmap: u32,
    x: u32,
    y: u32,
    slice: u32,
) -> wgpu::TexelCopyTextureInfo<'_> {
    wgpu::TexelCopyTextureInfo {
        texture,
        mip_level: mipmap,
        origin: wgpu::Origin3d { x, y, z: slice },
        aspect: copy_aspect(format),
    }
}

fn copy_extent(rect: Rect<i32>) -> (u32, u32, wgpu::Extent3d) {
    let (x, y) = (rect.x.max(0) as u32, rect.y.max(0) as u32);
    let extent = wgpu::Extent3d {
        width: rect.width.max(0) as u32,
        height: rect.height.max(0) as u32,
        depth_or_array_layers: 1,
    };
    (x, y, extent)
}

fn unaligned(what: &str) -> GraphicsError {
    GraphicsError::unsupported(format!(
        "{} must be aligned to {} bytes on the wgpu backend.",
        what,
        wgpu::COPY_BUFFER_ALIGNMENT
    ))
}

impl WgpuBackend {
    pub(super) fn create_texture_object(
        &mut self,
        id: ResourceId,
        settings: &TextureSettings,
        data: Option<&[u8]>,
    ) -> GraphicsResult<()> {
        profile_function!();
        let format = formats::texture_format(settings.format).ok_or_else(|| {
            GraphicsError::unsupported(format!(
                "The pixel format '{}' is not supported by this system.",
                settings.format
            ))
        })?;
        let (dimension, view_dimension) = formats::texture_dimension(settings.texture_type);
        let size = texture_size(settings);

        let texture = pipeline::validated(&self.device, "Cannot create texture", || {
            self.device.create_texture(&wgpu::TextureDescriptor {
                label: settings.label.as_deref(),
                size,
                mip_level_count: settings.mipmaps.max(1),
                sample_count: settings.msaa.max(1),
                dimension,
                format,
                usage: texture_usages(settings),
                view_formats: &[],
            })
        })?;

        if let Some(data) = data.filter(|_| settings.msaa <= 1 && !settings.format.is_depth_stencil()) {
            let (row_bytes, rows) = block_rows(settings.format, settings.width, settings.height);
            let slice_size = row_bytes as usize * rows as usize;
            for slice in 0..size.depth_or_array_layers {
                let start = slice as usize * slice_size;
                let Some(bytes) = data.get(start..start + slice_size) else {
                    break;
                };
                self.queue.write_texture(
                    texel_copy(&texture, settings.format, 0, 0, 0, slice),
                    bytes,
                    wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(row_bytes),
                        rows_per_image: Some(rows),
                    },
                    wgpu::Extent3d {
                        width: size.width,
                        height: size.height,
                        depth_or_array_layers: 1,
                    },
                );
            }
        }

        let depth_compare = settings.sampler.depth_compare.is_some();
        let binding = match TextureLayoutKey::for_texture(
            settings.format,
            settings.texture_type,
            settings.msaa,
            depth_compare,
            self.device.features(),
        ) {
            Ok(key) => {
                let view = texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("Texture View"),
                    dimension: Some(view_dimension),
                    aspect: formats::sample_aspect(settings.format),
                    ..Default::default()
                });
                let sampler = self.samplers.get_or_create(
                    &self.device,
                    SamplerKey::from_state(&settings.sampler, key.sampler, self.border_clamp),
                );
                let (layout, _) = texture_layout(&self.device, &mut self.texture_layouts, &self.globals_layout, key);
                Some(TextureBinding {
                    layout: key,
                    bind_group: texture_bind_group(&self.device, layout, &view, &sampler),
                })
            }
            Err(err) => {
                debug!("Texture {} is not sampleable: {}", id, err);
                None
            }
        };

        debug!(
            "Created {} texture {} ({}x{}, {})",
            settings.texture_type, id, settings.width, settings.height, settings.format
        );
        self.textures.insert(
            id,
            WgpuTexture {
                texture,
                format: settings.format,
                texture_type: settings.texture_type,
                binding,
            },
        );
        Ok(())
    }

    pub(super) fn upload_texture_region(
        &mut self,
        id: ResourceId,
        slice: u32,
        mipmap: u32,
        rect: Rect<i32>,
        data: &[u8],
    ) -> GraphicsResult<()> {
        profile_function!();
        let format = self.texture(id)?.format;
        let (x, y, extent) = copy_extent(rect);
        let (row_bytes, rows) = block_rows(format, extent.width, extent.height);
        if data.len() < row_bytes as usize * rows as usize {
            return Err(GraphicsError::backend(format!(
                "Texture data is {} bytes, the region needs {}",
                data.len(),
                row_bytes as u64 * rows as u64
            )));
        }

        let layout = PaddedRows::new(row_bytes, rows);
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Texture Upload"),
            size: layout.buffer_size().max(wgpu::COPY_BUFFER_ALIGNMENT),
            usage: wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: true,
        });
        layout.pad_into(data, &mut staging.slice(..).get_mapped_range_mut());
        staging.unmap();

        self.end_pass();
        let texture = &lookup(&self.textures, id, "texture")?.texture;
        self.encoder.copy_buffer_to_texture(
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(layout.padded),
                    rows_per_image: Some(rows),
                },
            },
            texel_copy(texture, format, mipmap, x, y, slice),
            extent,
        );
        self.pacer.defer(DeferredResource::Buffer(staging));
        Ok(())
    }

    pub(super) fn create_buffer_object(
        &mut self,
        id: ResourceId,
        settings: &BufferSettings,
        data: Option<&[u8]>,
    ) -> GraphicsResult<()> {
        let size = settings.size.max(1).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        let buffer = pipeline::validated(&self.device, "Cannot create buffer", || {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: settings.label.as_deref(),
                size,
                usage: formats::buffer_usages(settings.usage),
                mapped_at_creation: data.is_some(),
            })
        })?;

        if let Some(data) = data {
            let len = data.len().min(size as usize);
            buffer.slice(..).get_mapped_range_mut()[..len].copy_from_slice(&data[..len]);
            buffer.unmap();
        }
        self.buffers.insert(id, WgpuBuffer { buffer });
        Ok(())
    }

    pub(super) fn upload_buffer_region(&mut self, id: ResourceId, offset: u64, data: &[u8]) -> GraphicsResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        let len = data.len() as u64;
        if offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(unaligned("Buffer write offsets"));
        }
        if len % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(unaligned("Buffer write sizes"));
        }
        if offset + len > self.buffer(id)?.buffer.size() {
            return Err(GraphicsError::backend("Buffer write exceeds the buffer"));
        }

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Buffer Upload"),
            size: len,
            usage: wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: true,
        });
        staging.slice(..).get_mapped_range_mut().copy_from_slice(data);
        staging.unmap();

        self.end_pass();
        let dest = &lookup(&self.buffers, id, "buffer")?.buffer;
        self.encoder.copy_buffer_to_buffer(&staging, 0, dest, offset, len);
        self.pacer.defer(DeferredResource::Buffer(staging));
        Ok(())
    }

    pub(super) fn link_program(&mut self, id: ResourceId, stages: ShaderStageIds) -> GraphicsResult<()> {
        let program = if let Some(compute) = stages.compute {
            let module = lookup(&self.stages, compute, "shader stage")?;
            let pipeline = pipeline::validated(&self.device, "Cannot link compute shader", || {
                self.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some("Compute Pipeline"),
                    layout: None,
                    module,
                    entry_point: None,
                    compilation_options: Default::default(),
                    cache: None,
                })
            })?;
            WgpuProgram::Compute(pipeline)
        } else {
            let (default_vertex, default_pixel) = self
                .standard
                .first()
                .ok_or_else(|| GraphicsError::backend("Standard shaders are missing"))?;
            let vertex = match stages.vertex {
                Some(stage) => lookup(&self.stages, stage, "shader stage")?,
                None => default_vertex,
            };
            let pixel = match stages.pixel {
                Some(stage) => lookup(&self.stages, stage, "shader stage")?,
                None => default_pixel,
            };
            WgpuProgram::Graphics {
                vertex: vertex.clone(),
                pixel: pixel.clone(),
            }
        };
        self.programs.insert(id, program);
        Ok(())
    }

    pub(super) fn copy_buffer_object(&mut self, copy: &BufferCopy) -> GraphicsResult<()> {
        if copy.source_offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 || copy.dest_offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(unaligned("Buffer copy offsets"));
        }
        if copy.size % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(unaligned("Buffer copy sizes"));
        }
        self.end_pass();
        let source = &lookup(&self.buffers, copy.source, "buffer")?.buffer;
        let dest = &lookup(&self.buffers, copy.dest, "buffer")?.buffer;
        self.encoder
            .copy_buffer_to_buffer(source, copy.source_offset, dest, copy.dest_offset, copy.size);
        Ok(())
    }

    /// Rows of a texture to buffer copy. A single copy is recorded when the
    /// buffer pitch meets the copy alignment, one per block row otherwise.
    fn texel_rows(copy: &TextureBufferCopy) -> (u32, u32, u32, u32, wgpu::Extent3d, bool) {
        let (x, y, extent) = copy_extent(copy.rect);
        let (_, rows) = block_rows(copy.format, extent.width, extent.height);
        let (pitch, _) = block_rows(copy.format, copy.buffer_width.max(extent.width), 1);
        let single = pitch % wgpu::COPY_BYTES_PER_ROW_ALIGNMENT == 0 || rows <= 1;
        (x, y, pitch, rows, extent, single)
    }

    pub(super) fn copy_texture_to_buffer_object(&mut self, copy: &TextureBufferCopy) -> GraphicsResult<()> {
        self.end_pass();
        let texture = &lookup(&self.textures, copy.texture, "texture")?.texture;
        let buffer = &lookup(&self.buffers, copy.buffer, "buffer")?.buffer;
        let (x, y, pitch, rows, extent, single) = Self::texel_rows(copy);
        let block_height = copy.format.info().block_height.max(1) as u32;

        if single {
            self.encoder.copy_texture_to_buffer(
                texel_copy(texture, copy.format, copy.mipmap, x, y, copy.slice),
                wgpu::TexelCopyBufferInfo {
                    buffer,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: copy.buffer_offset,
                        bytes_per_row: (rows > 1).then_some(pitch),
                        rows_per_image: None,
                    },
                },
                extent,
            );
            return Ok(());
        }
        for row in 0..rows {
            let row_y = y + row * block_height;
            self.encoder.copy_texture_to_buffer(
                texel_copy(texture, copy.format, copy.mipmap, x, row_y, copy.slice),
                wgpu::TexelCopyBufferInfo {
                    buffer,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: copy.buffer_offset + row as u64 * pitch as u64,
                        bytes_per_row: None,
                        rows_per_image: None,
                    },
                },
                wgpu::Extent3d {
                    width: extent.width,
                    height: block_height.min(extent.height - row * block_height),
                    depth_or_array_layers: 1,
                },
            );
        }
        Ok(())
    }

    pub(super) fn copy_buffer_to_texture_object(&mut self, copy: &TextureBufferCopy) -> GraphicsResult<()> {
        self.end_pass();
        let texture = &lookup(&self.textures, copy.texture, "texture")?.texture;
        let buffer = &lookup(&self.buffers, copy.buffer, "buffer")?.buffer;
        let (x, y, pitch, rows, extent, single) = Self::texel_rows(copy);
        let block_height = copy.format.info().block_height.max(1) as u32;

        if single {
            self.encoder.copy_buffer_to_texture(
                wgpu::TexelCopyBufferInfo {
                    buffer,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: copy.buffer_offset,
                        bytes_per_row: (rows > 1).then_some(pitch),
                        rows_per_image: None,
                    },
                },
                texel_copy(texture, copy.format, copy.mipmap, x, y, copy.slice),
                extent,
            );
            return Ok(());
        }
        for row in 0..rows {
            let row_y = y + row * block_height;
            self.encoder.copy_buffer_to_texture(
                wgpu::TexelCopyBufferInfo {
                    buffer,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: copy.buffer_offset + row as u64 * pitch as u64,
                        bytes_per_row: None,
                        rows_per_image: None,
                    },
                },
                texel_copy(texture, copy.format, copy.mipmap, x, row_y, copy.slice),
                wgpu::Extent3d {
                    width: extent.width,
                    height: block_height.min(extent.height - row * block_height),
                    depth_or_array_layers: 1,
                },
            );
        }
        Ok(())
    }

    pub(super) fn dispatch_compute(
        &mut self,
        shader: ResourceId,
        groups: [u32; 3],
        bindings: &ComputeBindings,
    ) -> GraphicsResult<()> {
        profile_function!();
        self.end_pass();

        let pipeline = match lookup(&self.programs, shader, "shader")? {
            WgpuProgram::Compute(pipeline) => pipeline,
            WgpuProgram::Graphics { .. } => {
                return Err(GraphicsError::usage("Only compute shaders can be dispatched."));
            }
        };

        let mut views = Vec::with_capacity(bindings.textures.len());
        for &(slot, id) in &bindings.textures {
            let texture = lookup(&self.textures, id, "texture")?;
            let (_, dimension) = formats::texture_dimension(texture.texture_type);
            let view = texture.texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some("Compute Texture View"),
                dimension: Some(dimension),
                mip_level_count: Some(1),
                ..Default::default()
            });
            views.push((slot, view));
        }
        let mut entries = Vec::with_capacity(bindings.buffers.len() + views.len());
        for &(slot, id) in &bindings.buffers {
            let buffer = &lookup(&self.buffers, id, "buffer")?.buffer;
            entries.push(wgpu::BindGroupEntry {
                binding: slot,
                resource: buffer.as_entire_binding(),
            });
        }
        for (slot, view) in &views {
            entries.push(wgpu::BindGroupEntry {
                binding: *slot,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }

        let bind_group = if entries.is_empty() {
            None
        } else {
            Some(pipeline::validated(&self.device, "Cannot bind compute resources", || {
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Compute Bind Group"),
                    layout: &pipeline.get_bind_group_layout(0),
                    entries: &entries,
                })
            })?)
        };

        let mut pass = self.encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Vesper Compute Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        if let Some(bind_group) = &bind_group {
            pass.set_bind_group(0, bind_group, &[]);
        }
        pass.dispatch_workgroups(groups[0], groups[1], groups[2]);
        Ok(())
    }

    pub(super) fn start_readback(
        &mut self,
        source: &ReadbackSource,
        method: ReadbackMethod,
    ) -> GraphicsResult<Box<dyn ReadbackTask>> {
        profile_function!();
        self.end_pass();

        let mut swap_red_blue = false;
        let (staging, range, rows) = match *source {
            ReadbackSource::Buffer { id, offset, size } => {
                let start = offset - offset % wgpu::COPY_BUFFER_ALIGNMENT;
                let len = (offset + size - start).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
                let buffer = &lookup(&self.buffers, id, "buffer")?.buffer;
                if start + len > buffer.size() {
                    return Err(GraphicsError::backend("Readback range exceeds the buffer"));
                }
                let staging = self.staging_buffer(len);
                self.encoder.copy_buffer_to_buffer(buffer, start, &staging, 0, len);
                let skip = offset - start;
                (staging, skip..skip + size, None)
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
                let (row_bytes, row_count) = block_rows(format, width, height);
                let layout = PaddedRows::new(row_bytes, row_count);
                let staging = self.staging_buffer(layout.buffer_size());
                let texture = &lookup(&self.textures, id, "texture")?.texture;
                self.encoder.copy_texture_to_buffer(
                    texel_copy(texture, format, mipmap, x, y, slice),
                    wgpu::TexelCopyBufferInfo {
                        buffer: &staging,
                        layout: wgpu::TexelCopyBufferLayout {
                            offset: 0,
                            bytes_per_row: Some(layout.padded),
                            rows_per_image: Some(row_count),
                        },
                    },
                    wgpu::Extent3d {
                        width,
                        height,
                        depth_or_array_layers: 1,
                    },
                );
                (staging, 0..layout.buffer_size(), Some(layout))
            }
            ReadbackSource::Screen { width, height } => {
                let texture = self.screen.readable_texture(&self.device)?;
                let native = texture.format();
                if !matches!(
                    native,
                    wgpu::TextureFormat::Rgba8Unorm
                        | wgpu::TextureFormat::Rgba8UnormSrgb
                        | wgpu::TextureFormat::Bgra8Unorm
                        | wgpu::TextureFormat::Bgra8UnormSrgb
                ) {
                    return Err(GraphicsError::unsupported(format!(
                        "Screenshots of a {:?} backbuffer are not supported.",
                        native
                    )));
                }
                swap_red_blue = matches!(
                    native,
                    wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb
                );

                let layout = PaddedRows::new(width * 4, height);
                let staging = self.staging_buffer(layout.buffer_size());
                self.encoder.copy_texture_to_buffer(
                    wgpu::TexelCopyTextureInfo {
                        texture: &texture,
                        mip_level: 0,
                        origin: wgpu::Origin3d::ZERO,
                        aspect: wgpu::TextureAspect::All,
                    },
                    wgpu::TexelCopyBufferInfo {
                        buffer: &staging,
                        layout: wgpu::TexelCopyBufferLayout {
                            offset: 0,
                            bytes_per_row: Some(layout.padded),
                            rows_per_image: Some(height),
                        },
                    },
                    wgpu::Extent3d {
                        width,
                        height,
                        depth_or_array_layers: 1,
                    },
                );
                (staging, 0..layout.buffer_size(), Some(layout))
            }
        };

        // Mapping can only start once the copy has been submitted.
        self.submit();
        debug!("Started {:?} readback of {} bytes", method, range.end - range.start);
        Ok(Box::new(
            StagingReadback::start(&self.device, staging, range, rows).with_red_blue_swapped(swap_red_blue),
        ))
    }

    fn staging_buffer(&self, size: u64) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Staging"),
            size: size.max(wgpu::COPY_BUFFER_ALIGNMENT),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_rows_for_plain_and_compressed_formats() {
        assert_eq!(block_rows(PixelFormat::Rgba8Unorm, 10, 3), (40, 3));
        assert_eq!(block_rows(PixelFormat::Dxt1Unorm, 10, 3), (24, 1));
    }

    #[test]
    fn test_render_target_usages() {
        let settings = TextureSettings::render_target(PixelFormat::Rgba8Unorm, 64, 64);
        let usage = texture_usages(&settings);
        assert!(usage.contains(wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC));
        assert!(!usage.contains(wgpu::TextureUsages::STORAGE_BINDING));

        let depth = TextureSettings::render_target(PixelFormat::Depth24UnormStencil8, 64, 64);
        assert_eq!(
            texture_usages(&depth),
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING
        );
    }

    #[test]
    fn test_compressed_textures_never_render() {
        let settings = TextureSettings {
            format: PixelFormat::Dxt1Unorm,
            render_target: true,
            ..Default::default()
        };
        assert!(!texture_usages(&settings).contains(wgpu::TextureUsages::RENDER_ATTACHMENT));
    }

    #[test]
    fn test_cube_textures_have_six_layers() {
        let settings = TextureSettings {
            texture_type: TextureType::Cube,
            width: 16,
            height: 16,
            ..Default::default()
        };
        assert_eq!(texture_size(&settings).depth_or_array_layers, 6);
    }
}
