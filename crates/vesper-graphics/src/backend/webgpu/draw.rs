//! Render passes, clears and draws.

use tracing::warn;
use vesper_core::alloc::HashMap;
use vesper_core::geometry::Rect;
use vesper_core::profiling::profile_function;

use crate::backend::{BoundTargets, ClearRequest, DrawCommand, IndexSource, StreamSlice, TargetAttachment};
use crate::error::{GraphicsError, GraphicsResult};
use crate::resource::{ResourceId, ShaderBinding};
use crate::types::{CommonFormat, StandardShader, TextureType};

use super::pipeline::{self, Globals, PipelineKey, PipelineModules, StencilKey};
use super::swapchain::Screen;
use super::{DeferredResource, PassState, TargetViews, WgpuBackend, WgpuProgram, formats, resources};

pub(super) fn lookup<'a, T>(map: &'a HashMap<ResourceId, T>, id: ResourceId, what: &str) -> GraphicsResult<&'a T> {
    map.get(&id)
        .ok_or_else(|| GraphicsError::backend(format!("Unknown {} {}", what, id)))
}

/// Scissor rectangle clamped to a `width` x `height` target, as x, y, w, h.
pub(super) fn clamp_scissor(rect: Option<Rect<i32>>, width: u32, height: u32) -> [u32; 4] {
    let Some(rect) = rect else {
        return [0, 0, width, height];
    };
    let (w, h) = (width as i64, height as i64);
    let x0 = (rect.x as i64).clamp(0, w);
    let y0 = (rect.y as i64).clamp(0, h);
    let x1 = (rect.x as i64 + rect.width.max(0) as i64).clamp(x0, w);
    let y1 = (rect.y as i64 + rect.height.max(0) as i64).clamp(y0, h);
    [x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32]
}

fn attachment_view(texture: &wgpu::Texture, ty: TextureType, attachment: &TargetAttachment) -> wgpu::TextureView {
    let volume = ty == TextureType::Volume;
    texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some("Render Target View"),
        dimension: Some(if volume {
            wgpu::TextureViewDimension::D3
        } else {
            wgpu::TextureViewDimension::D2
        }),
        base_mip_level: attachment.mipmap,
        mip_level_count: Some(1),
        base_array_layer: if volume { 0 } else { attachment.slice },
        array_layer_count: Some(1),
        ..Default::default()
    })
}

impl WgpuBackend {
    pub(super) fn bind_targets(&mut self, targets: &BoundTargets) -> GraphicsResult<()> {
        if *targets == self.bound {
            return Ok(());
        }
        self.end_pass();
        if !targets.is_screen() {
            self.target_views(targets)?;
        }
        self.bound = targets.clone();
        Ok(())
    }

    fn target_views(&mut self, targets: &BoundTargets) -> GraphicsResult<TargetViews> {
        let textures = &self.textures;
        let key = (targets.colors.clone(), targets.depth_stencil);
        self.views
            .get_or_try_insert_with(key, |(colors, depth)| {
                let mut views = TargetViews {
                    colors: Vec::with_capacity(colors.len()),
                    depth_slices: Vec::with_capacity(colors.len()),
                    depth_stencil: None,
                    color_formats: Vec::with_capacity(colors.len()),
                    depth_format: None,
                };
                for attachment in colors {
                    let texture = lookup(textures, attachment.texture, "texture")?;
                    views
                        .colors
                        .push(attachment_view(&texture.texture, texture.texture_type, attachment));
                    views
                        .depth_slices
                        .push((texture.texture_type == TextureType::Volume).then_some(attachment.slice));
                    views.color_formats.push(texture.texture.format());
                }
                if let Some(attachment) = depth {
                    let texture = lookup(textures, attachment.texture, "texture")?;
                    views.depth_stencil = Some(attachment_view(
                        &texture.texture,
                        TextureType::D2,
                        attachment,
                    ));
                    views.depth_format = Some(texture.texture.format());
                }
                Ok::<_, GraphicsError>(views)
            })
            .cloned()
    }

    /// Attachment formats and sample count of the bound targets.
    fn target_formats(&mut self) -> GraphicsResult<(Vec<wgpu::TextureFormat>, Option<wgpu::TextureFormat>, u32)> {
        if self.bound.is_screen() {
            return Ok((
                vec![self.screen.format()],
                self.screen_attachments.depth_format(),
                self.msaa,
            ));
        }
        let bound = self.bound.clone();
        let views = self.target_views(&bound)?;
        Ok((views.color_formats, views.depth_format, bound.msaa.max(1)))
    }

    /// Opens a render pass on the bound targets if none is open.
    ///
    /// Returns `false` when the backbuffer is unavailable this frame.
    fn open_pass(&mut self) -> GraphicsResult<bool> {
        if self.pass.is_some() {
            return Ok(true);
        }
        let clear = self.pending_clear.take().unwrap_or_default();

        let (colors, depth_slices, resolve, depth_view, depth_format) = if self.bound.is_screen() {
            let view = match &mut self.screen {
                Screen::Surface(swapchain) => match swapchain.acquire(&self.device)? {
                    Some(view) => view.clone(),
                    None => return Ok(false),
                },
                Screen::Offscreen(offscreen) => offscreen.view.clone(),
            };
            let (color, resolve) = match &self.screen_attachments.msaa {
                Some((_, msaa)) => (msaa.clone(), Some(view)),
                None => (view, None),
            };
            (
                vec![color],
                vec![None],
                resolve,
                self.screen_attachments.depth_stencil.as_ref().map(|(_, view)| view.clone()),
                self.screen_attachments.depth_format(),
            )
        } else {
            let bound = self.bound.clone();
            let views = self.target_views(&bound)?;
            (views.colors, views.depth_slices, None, views.depth_stencil, views.depth_format)
        };

        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment<'_>>> = colors
            .iter()
            .enumerate()
            .map(|(i, view)| {
                let load = match clear.colors.get(i).copied().flatten() {
                    Some(c) => wgpu::LoadOp::Clear(wgpu::Color {
                        r: c.r as f64,
                        g: c.g as f64,
                        b: c.b as f64,
                        a: c.a as f64,
                    }),
                    None => wgpu::LoadOp::Load,
                };
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: depth_slices.get(i).copied().flatten(),
                    resolve_target: if i == 0 { resolve.as_ref() } else { None },
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect();

        let depth_stencil_attachment = depth_view.as_ref().zip(depth_format).map(|(view, format)| {
            wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: format.has_depth_aspect().then(|| wgpu::Operations {
                    load: clear
                        .depth
                        .map_or(wgpu::LoadOp::Load, |d| wgpu::LoadOp::Clear(d as f32)),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: format.has_stencil_aspect().then(|| wgpu::Operations {
                    load: clear
                        .stencil
                        .map_or(wgpu::LoadOp::Load, |s| wgpu::LoadOp::Clear(s as u32)),
                    store: wgpu::StoreOp::Store,
                }),
            }
        });

        let descriptor = wgpu::RenderPassDescriptor {
            label: Some("Vesper Render Pass"),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            occlusion_query_set: None,
            timestamp_writes: None,
        };
        let pass = self.encoder.begin_render_pass(&descriptor).forget_lifetime();
        self.pass = Some(pass);
        self.pass_state = PassState::default();
        Ok(true)
    }

    /// Closes the open pass, first applying a clear nothing was drawn after.
    pub(super) fn end_pass(&mut self) {
        if self.pass.take().is_none() && self.pending_clear.is_some() {
            match self.open_pass() {
                Ok(_) => self.pass = None,
                Err(err) => warn!("Dropping pending clear: {}", err),
            }
        }
        self.pass_state = PassState::default();
    }

    pub(super) fn clear_targets(&mut self, clear: &ClearRequest) {
        profile_function!();
        if clear.is_empty() {
            return;
        }
        // Clears are load operations, so they need a fresh pass.
        self.pass = None;
        self.pass_state = PassState::default();

        let pending = self.pending_clear.get_or_insert_with(ClearRequest::default);
        if pending.colors.len() < clear.colors.len() {
            pending.colors.resize(clear.colors.len(), None);
        }
        for (slot, color) in pending.colors.iter_mut().zip(&clear.colors) {
            if color.is_some() {
                *slot = *color;
            }
        }
        if clear.stencil.is_some() {
            pending.stencil = clear.stencil;
        }
        if clear.depth.is_some() {
            pending.depth = clear.depth;
        }
    }

    fn write_stream(&self, slice: &StreamSlice<'_>) -> GraphicsResult<()> {
        if slice.data.is_empty() {
            return Ok(());
        }
        let buffer = &lookup(&self.buffers, slice.buffer, "stream buffer")?.buffer;
        if slice.data.len() % 4 == 0 {
            self.queue.write_buffer(buffer, slice.offset, slice.data);
        } else {
            let mut padded = slice.data.to_vec();
            padded.resize(slice.data.len().next_multiple_of(4), 0);
            self.queue.write_buffer(buffer, slice.offset, &padded);
        }
        Ok(())
    }

    fn pipeline_for(&mut self, key: &PipelineKey) -> GraphicsResult<wgpu::RenderPipeline> {
        let (vertex, pixel) = match key.shader {
            ShaderBinding::Standard(shader) => {
                let index = match shader {
                    StandardShader::Default => 0,
                    StandardShader::Points => 1,
                };
                let (vertex, pixel) = &self.standard[index];
                (vertex, pixel)
            }
            ShaderBinding::Custom(id) => match lookup(&self.programs, id, "shader")? {
                WgpuProgram::Graphics { vertex, pixel } => (vertex, pixel),
                WgpuProgram::Compute(_) => {
                    return Err(GraphicsError::usage("A compute shader cannot be used for drawing."));
                }
            },
        };

        let device = &self.device;
        let (_, layout) = resources::texture_layout(device, &mut self.texture_layouts, &self.globals_layout, key.texture);
        self.pipelines
            .get_or_try_insert_with(key.clone(), |key| {
                pipeline::create_render_pipeline(device, key, PipelineModules { vertex, pixel, layout })
            })
            .cloned()
    }

    pub(super) fn draw_command(&mut self, cmd: &DrawCommand<'_>) -> GraphicsResult<()> {
        profile_function!();
        let topology = formats::primitive_topology(cmd.primitive)
            .ok_or_else(|| GraphicsError::unsupported("Triangle fans are not supported by the wgpu backend."))?;

        for slice in cmd.vertex_streams.iter().flatten() {
            self.write_stream(slice)?;
        }
        if let Some(IndexSource::Stream(slice)) = &cmd.index {
            self.write_stream(slice)?;
        }

        let binding = match cmd.texture {
            Some(id) => lookup(&self.textures, id, "texture")?
                .binding
                .clone()
                .ok_or_else(|| GraphicsError::usage("This texture cannot be sampled while drawing."))?,
            None => self.white.clone(),
        };

        let st = cmd.state;
        let (colors, depth_stencil, samples) = self.target_formats()?;
        let key = PipelineKey {
            shader: cmd.shader,
            vertex_formats: cmd.vertex_format,
            topology,
            texture: binding.layout,
            colors,
            depth_stencil,
            samples,
            blend: st.blend,
            color_mask: st.color_mask,
            stencil: StencilKey {
                action: st.stencil.action,
                compare: st.stencil.compare,
                read_mask: st.stencil.read_mask,
                write_mask: st.stencil.write_mask,
            },
            depth: st.depth,
            cull_mode: st.cull_mode,
            winding: st.winding,
            wireframe: st.wireframe,
        };
        let render_pipeline = self.pipeline_for(&key)?;

        let (offset, replaced) = self.uniforms.push(
            &self.device,
            &self.queue,
            &self.globals_layout,
            bytemuck::bytes_of(&Globals::new(st)),
        );
        if let Some(buffer) = replaced {
            self.pacer.defer(DeferredResource::Buffer(buffer));
        }

        if self.last_shader != Some(cmd.shader) {
            self.last_shader = Some(cmd.shader);
            self.shader_switches += 1;
        }

        if !self.open_pass()? {
            return Ok(());
        }
        let scissor = clamp_scissor(st.scissor, self.bound.width, self.bound.height);
        let Some(pass) = self.pass.as_mut() else {
            return Ok(());
        };

        if self.pass_state.pipeline.as_ref() != Some(&key) {
            pass.set_pipeline(&render_pipeline);
            self.pass_state.pipeline = Some(key);
        }
        pass.set_bind_group(0, self.uniforms.bind_group(), &[offset]);
        if self.pass_state.texture != Some(cmd.texture) {
            pass.set_bind_group(1, &binding.bind_group, &[]);
            self.pass_state.texture = Some(cmd.texture);
        }

        let reference = st.stencil.value.max(0) as u32;
        if self.pass_state.stencil_reference != Some(reference) {
            pass.set_stencil_reference(reference);
            self.pass_state.stencil_reference = Some(reference);
        }
        if self.pass_state.scissor != Some(scissor) {
            pass.set_scissor_rect(scissor[0], scissor[1], scissor[2], scissor[3]);
            self.pass_state.scissor = Some(scissor);
        }

        let mut slot = 0;
        for (format, slice) in cmd.vertex_format.iter().zip(cmd.vertex_streams.iter()) {
            if *format == CommonFormat::None {
                continue;
            }
            let slice = (*slice).ok_or_else(|| GraphicsError::backend("Vertex format without a vertex stream"))?;
            let buffer = &lookup(&self.buffers, slice.buffer, "vertex buffer")?.buffer;
            pass.set_vertex_buffer(slot, buffer.slice(slice.offset..));
            slot += 1;
        }
        if pipeline::needs_defaults(&cmd.vertex_format) {
            pass.set_vertex_buffer(slot, self.vertex_defaults.slice(..));
        }

        let instances = 0..cmd.instance_count.max(1);
        match cmd.index {
            Some(IndexSource::Stream(slice)) => {
                let buffer = &lookup(&self.buffers, slice.buffer, "index buffer")?.buffer;
                pass.set_index_buffer(buffer.slice(slice.offset..), wgpu::IndexFormat::Uint16);
                pass.draw_indexed(0..cmd.index_count, 0, instances);
            }
            Some(IndexSource::Buffer { buffer, format, start }) => {
                let buffer = &lookup(&self.buffers, buffer, "index buffer")?.buffer;
                pass.set_index_buffer(buffer.slice(..), formats::index_format(format));
                pass.draw_indexed(start..start + cmd.index_count, 0, instances);
            }
            None => pass.draw(cmd.vertex_start..cmd.vertex_start + cmd.vertex_count, instances),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scissor_defaults_to_full_target() {
        assert_eq!(clamp_scissor(None, 640, 480), [0, 0, 640, 480]);
    }

    #[test]
    fn test_scissor_is_clamped() {
        assert_eq!(clamp_scissor(Some(Rect::new(-10, 20, 100, 1000)), 640, 480), [0, 20, 90, 460]);
        assert_eq!(clamp_scissor(Some(Rect::new(700, 0, 10, 10)), 640, 480), [640, 0, 0, 10]);
        assert_eq!(clamp_scissor(Some(Rect::new(5, 5, -3, 4)), 640, 480), [5, 5, 0, 4]);
    }
}
