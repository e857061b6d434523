//! Render targets, fixed-function state and draw submission.

use std::rc::Rc;

use glow::HasContext;
use vesper_core::geometry::Rect;
use vesper_core::profiling::profile_function;

use crate::backend::{
    BoundTargets, ClearRequest, ComputeBindings, DrawCommand, DrawState, IndexSource, TargetAttachment,
    TextureBufferCopy,
};
use crate::error::{GraphicsError, GraphicsResult};
use crate::resource::{ResourceId, ShaderBinding};
use crate::types::{
    ATTRIB_COLOR, ATTRIB_POSITION, ATTRIB_TEXCOORD, ColorChannelMask, CommonFormat, CullMode, StandardShader, Winding,
};

use super::bind_state::EnableCap;
use super::resources::{GlTexture, ProgramUniforms};
use super::vendor::DriverBugs;
use super::{GlBackend, RawFramebuffer, RawProgram, enums};

const MAX_ATTRIBUTES: u32 = 3;

impl GlBackend {
    pub(super) fn bind_targets(&mut self, targets: &BoundTargets) -> GraphicsResult<()> {
        profile_function!();

        let fbo = if targets.is_screen() {
            None
        } else {
            Some(self.framebuffer_for(targets.colors.clone(), targets.depth_stencil)?)
        };
        self.bind_framebuffer(fbo);
        self.current_framebuffer = fbo;
        self.bound = targets.clone();
        self.set_viewport(Rect::new(0, 0, targets.width as i32, targets.height as i32));

        if !self.features.es && !self.bugs.contains(DriverBugs::BROKEN_SRGB) {
            let srgb = match targets.colors.first() {
                Some(color) => color.format.is_srgb(),
                None => self.gamma_correct,
            };
            self.set_enabled(EnableCap::FramebufferSrgb, srgb);
        }
        Ok(())
    }

    /// Framebuffer object with the given attachments, created on first use.
    pub(super) fn framebuffer_for(
        &mut self,
        colors: Vec<TargetAttachment>,
        depth_stencil: Option<TargetAttachment>,
    ) -> GraphicsResult<RawFramebuffer> {
        let gl = Rc::clone(&self.gl);
        let textures = &self.textures;
        let single_draw_buffer = !self.features.gl3_class();
        let mut created = false;

        let fbo = *self.framebuffers.get_or_try_insert_with((colors, depth_stencil), |(colors, depth)| {
            created = true;
            unsafe {
                let fbo = gl.create_framebuffer().map_err(GraphicsError::Backend)?;
                gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
                match configure_framebuffer(&gl, textures, colors, depth.as_ref(), single_draw_buffer) {
                    Ok(()) => Ok(fbo),
                    Err(err) => {
                        gl.bind_framebuffer(glow::FRAMEBUFFER, None);
                        gl.delete_framebuffer(fbo);
                        Err(err)
                    }
                }
            }
        })?;

        if created {
            self.state.framebuffer.invalidate();
        }
        Ok(fbo)
    }

    pub(super) fn clear_targets(&mut self, clear: &ClearRequest) {
        profile_function!();
        if clear.is_empty() {
            return;
        }

        let gl = Rc::clone(&self.gl);
        // Clears respect the scissor but not the write masks.
        self.set_color_mask(ColorChannelMask::all());
        let mut mask = 0;

        unsafe {
            if self.bound.colors.len() <= 1 {
                if let Some(Some(color)) = clear.colors.first() {
                    gl.clear_color(color.r, color.g, color.b, color.a);
                    mask |= glow::COLOR_BUFFER_BIT;
                }
            } else {
                for (i, color) in clear.colors.iter().enumerate() {
                    if let Some(color) = color {
                        gl.clear_buffer_f32_slice(glow::COLOR, i as u32, &color.to_array());
                    }
                }
            }

            if let Some(stencil) = clear.stencil {
                self.state.stencil.invalidate();
                gl.stencil_mask(u32::MAX);
                gl.clear_stencil(stencil);
                mask |= glow::STENCIL_BUFFER_BIT;
            }

            if let Some(depth) = clear.depth {
                self.state.depth.invalidate();
                gl.depth_mask(true);
                match self.functions.clear_depth {
                    super::functions::ClearDepth::Float => gl.clear_depth_f32(depth as f32),
                    super::functions::ClearDepth::Double => gl.clear_depth_f64(depth),
                }
                mask |= glow::DEPTH_BUFFER_BIT;
            }

            if mask != 0 {
                gl.clear(mask);
            }

            if self.bugs.contains(DriverBugs::CLEAR_REQUIRES_TEXTURE_STATE_UPDATE) && !self.bound.is_screen() {
                let bound = self.state.textures.bound(0);
                gl.active_texture(glow::TEXTURE0);
                gl.bind_texture(glow::TEXTURE_2D, None);
                gl.bind_texture(glow::TEXTURE_2D, bound);
                self.state.textures = super::bind_state::TextureUnits::new(self.state.textures.len());
            }
        }
    }

    pub(super) fn draw_command(&mut self, cmd: &DrawCommand<'_>) -> GraphicsResult<()> {
        profile_function!();
        let gl = Rc::clone(&self.gl);

        self.apply_state(cmd.state);

        let (program, uniforms) = self.program_for(cmd.shader)?;
        self.use_program(program);
        unsafe { set_uniforms(&gl, &uniforms, cmd.state) };

        let texture = match cmd.texture {
            Some(id) => {
                let texture = lookup(&self.textures, id)?;
                (texture.target, texture.raw)
            }
            None => (glow::TEXTURE_2D, self.white_texture),
        };
        self.bind_texture(0, texture.0, Some(texture.1));

        self.bind_vertex_streams(cmd)?;

        let mode = enums::primitive(cmd.primitive);
        let instances = cmd.instance_count.max(1) as i32;
        let instanced = instances > 1 && self.functions.instancing;

        unsafe {
            match cmd.index {
                Some(IndexSource::Stream(slice)) => {
                    let raw = self.buffer(slice.buffer)?.raw;
                    self.bind_element_buffer(raw);
                    if !slice.data.is_empty() {
                        gl.buffer_sub_data_u8_slice(glow::ELEMENT_ARRAY_BUFFER, slice.offset as i32, slice.data);
                    }
                    let offset = slice.offset as i32;
                    if instanced {
                        gl.draw_elements_instanced(mode, cmd.index_count as i32, glow::UNSIGNED_SHORT, offset, instances);
                    } else {
                        gl.draw_elements(mode, cmd.index_count as i32, glow::UNSIGNED_SHORT, offset);
                    }
                }
                Some(IndexSource::Buffer { buffer, format, start }) => {
                    let raw = self.buffer(buffer)?.raw;
                    self.bind_element_buffer(raw);
                    let ty = enums::index_type(format);
                    let offset = (start as usize * format.size()) as i32;
                    if instanced {
                        gl.draw_elements_instanced(mode, cmd.index_count as i32, ty, offset, instances);
                    } else {
                        gl.draw_elements(mode, cmd.index_count as i32, ty, offset);
                    }
                }
                None => {
                    let first = cmd.vertex_start as i32;
                    if instanced {
                        gl.draw_arrays_instanced(mode, first, cmd.vertex_count as i32, instances);
                    } else {
                        gl.draw_arrays(mode, first, cmd.vertex_count as i32);
                    }
                }
            }
        }
        Ok(())
    }

    fn program_for(&self, binding: ShaderBinding) -> GraphicsResult<(RawProgram, ProgramUniforms)> {
        let program = match binding {
            ShaderBinding::Standard(shader) => {
                let index = match shader {
                    StandardShader::Default => 0,
                    StandardShader::Points => 1,
                };
                &self.standard[index]
            }
            ShaderBinding::Custom(id) => self
                .programs
                .get(&id)
                .ok_or_else(|| GraphicsError::backend(format!("Unknown shader {}", id)))?,
        };
        Ok((program.raw, program.uniforms.clone()))
    }

    fn use_program(&mut self, program: RawProgram) {
        if self.state.program.set(Some(program)) {
            unsafe { self.gl.use_program(Some(program)) };
            self.shader_switches += 1;
        }
    }

    fn bind_vertex_streams(&mut self, cmd: &DrawCommand<'_>) -> GraphicsResult<()> {
        let gl = Rc::clone(&self.gl);
        let mut wanted = 0u32;

        for (format, slice) in cmd.vertex_format.iter().zip(cmd.vertex_streams.iter()) {
            let (Some(slice), true) = (slice, *format != CommonFormat::None) else {
                continue;
            };
            let raw = self.buffer(slice.buffer)?.raw;
            if self.state.array_buffer.set(Some(raw)) {
                unsafe { gl.bind_buffer(glow::ARRAY_BUFFER, Some(raw)) };
            }

            unsafe {
                if !slice.data.is_empty() {
                    gl.buffer_sub_data_u8_slice(glow::ARRAY_BUFFER, slice.offset as i32, slice.data);
                }

                let stride = format.stride() as i32;
                let base = slice.offset as i32;
                let (position, texcoord, color) = format.attribute_offsets();
                if let Some(offset) = position {
                    let components = format.position_components() as i32;
                    gl.vertex_attrib_pointer_f32(ATTRIB_POSITION, components, glow::FLOAT, false, stride, base + offset as i32);
                    wanted |= 1 << ATTRIB_POSITION;
                }
                if let Some(offset) = texcoord {
                    gl.vertex_attrib_pointer_f32(ATTRIB_TEXCOORD, 2, glow::FLOAT, false, stride, base + offset as i32);
                    wanted |= 1 << ATTRIB_TEXCOORD;
                }
                if let Some(offset) = color {
                    gl.vertex_attrib_pointer_f32(
                        ATTRIB_COLOR,
                        4,
                        glow::UNSIGNED_BYTE,
                        true,
                        stride,
                        base + offset as i32,
                    );
                    wanted |= 1 << ATTRIB_COLOR;
                }
            }
        }

        let changed = self.enabled_attributes ^ wanted;
        for location in 0..MAX_ATTRIBUTES {
            if changed & (1 << location) == 0 {
                continue;
            }
            unsafe {
                if wanted & (1 << location) != 0 {
                    gl.enable_vertex_attrib_array(location);
                } else {
                    gl.disable_vertex_attrib_array(location);
                }
            }
        }
        self.enabled_attributes = wanted;
        Ok(())
    }

    fn bind_element_buffer(&mut self, raw: super::RawBuffer) {
        if self.state.element_buffer.set(Some(raw)) {
            unsafe { self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(raw)) };
        }
    }

    fn set_enabled(&mut self, cap: EnableCap, enabled: bool) {
        if self.state.set_enabled(cap, enabled) {
            unsafe {
                if enabled {
                    self.gl.enable(cap.to_gl());
                } else {
                    self.gl.disable(cap.to_gl());
                }
            }
        }
    }

    fn set_color_mask(&mut self, mask: ColorChannelMask) {
        if self.state.color_mask.set(mask) {
            unsafe {
                self.gl.color_mask(
                    mask.contains(ColorChannelMask::RED),
                    mask.contains(ColorChannelMask::GREEN),
                    mask.contains(ColorChannelMask::BLUE),
                    mask.contains(ColorChannelMask::ALPHA),
                );
            }
        }
    }

    fn apply_state(&mut self, st: &DrawState) {
        let gl = Rc::clone(&self.gl);

        self.set_enabled(EnableCap::Blend, st.blend.enable);
        if st.blend.enable && self.state.blend.set(st.blend) {
            unsafe {
                gl.blend_equation_separate(
                    enums::blend_operation(st.blend.operation_rgb),
                    enums::blend_operation(st.blend.operation_a),
                );
                gl.blend_func_separate(
                    enums::blend_factor(st.blend.src_factor_rgb),
                    enums::blend_factor(st.blend.dst_factor_rgb),
                    enums::blend_factor(st.blend.src_factor_a),
                    enums::blend_factor(st.blend.dst_factor_a),
                );
            }
        }

        // Depth writes only happen with the depth test enabled.
        self.set_enabled(EnableCap::DepthTest, st.depth.is_active());
        if self.state.depth.set(st.depth) {
            unsafe {
                gl.depth_func(enums::compare(st.depth.compare));
                gl.depth_mask(st.depth.write);
            }
        }

        self.set_enabled(EnableCap::StencilTest, st.stencil.is_active());
        if self.state.stencil.set(st.stencil) {
            let s = st.stencil;
            unsafe {
                gl.stencil_func(enums::compare(s.compare), s.value, s.read_mask);
                gl.stencil_op(glow::KEEP, glow::KEEP, enums::stencil_action(s.action));
                gl.stencil_mask(s.write_mask);
            }
        }

        self.set_color_mask(st.color_mask);

        let cull = st.cull_mode != CullMode::None;
        self.set_enabled(EnableCap::CullFace, cull);
        if cull && self.state.cull_mode.set(st.cull_mode) {
            let face = if st.cull_mode == CullMode::Back { glow::BACK } else { glow::FRONT };
            unsafe { gl.cull_face(face) };
        }

        // The flipped offscreen projection mirrors the winding too.
        let winding = match (self.bound.is_screen(), st.winding) {
            (true, w) => w,
            (false, Winding::Ccw) => Winding::Cw,
            (false, Winding::Cw) => Winding::Ccw,
        };
        if self.state.winding.set(winding) {
            let mode = if winding == Winding::Ccw { glow::CCW } else { glow::CW };
            unsafe { gl.front_face(mode) };
        }

        if !self.features.es && self.state.wireframe.set(st.wireframe) {
            let mode = if st.wireframe { glow::LINE } else { glow::FILL };
            unsafe { gl.polygon_mode(glow::FRONT_AND_BACK, mode) };
        }

        match st.scissor {
            Some(rect) => {
                self.set_enabled(EnableCap::ScissorTest, true);
                let rect = self.framebuffer_rect(rect);
                if self.state.scissor.set(rect) {
                    unsafe { gl.scissor(rect.x, rect.y, rect.width, rect.height) };
                }
            }
            None => self.set_enabled(EnableCap::ScissorTest, false),
        }
    }

    /// Converts a top-left origin rectangle into framebuffer coordinates.
    fn framebuffer_rect(&self, rect: Rect<i32>) -> Rect<i32> {
        if self.bound.is_screen() {
            let y = self.bound.height as i32 - (rect.y + rect.height);
            Rect::new(rect.x, y, rect.width, rect.height)
        } else {
            rect
        }
    }

    pub(super) fn copy_texture_to_buffer_object(&mut self, copy: &TextureBufferCopy) -> GraphicsResult<()> {
        let texture = lookup(&self.textures, copy.texture)?.clone();
        let buffer = self.buffer(copy.buffer)?.raw;
        let fbo = self.framebuffer_for(vec![read_attachment(&texture, copy)], None)?;
        self.bind_framebuffer(Some(fbo));

        unsafe {
            let gl = &self.gl;
            gl.bind_buffer(glow::PIXEL_PACK_BUFFER, Some(buffer));
            if self.features.gl3_class() {
                gl.pixel_store_i32(glow::PACK_ROW_LENGTH, copy.buffer_width as i32);
            }
            gl.read_pixels(
                copy.rect.x,
                copy.rect.y,
                copy.rect.width,
                copy.rect.height,
                texture.format.external,
                texture.format.ty,
                glow::PixelPackData::BufferOffset(copy.buffer_offset as u32),
            );
            if self.features.gl3_class() {
                gl.pixel_store_i32(glow::PACK_ROW_LENGTH, 0);
            }
            gl.bind_buffer(glow::PIXEL_PACK_BUFFER, None);
        }

        self.bind_framebuffer(self.current_framebuffer);
        Ok(())
    }

    pub(super) fn copy_buffer_to_texture_object(&mut self, copy: &TextureBufferCopy) -> GraphicsResult<()> {
        let texture = lookup(&self.textures, copy.texture)?.clone();
        let buffer = self.buffer(copy.buffer)?.raw;
        self.bind_texture(0, texture.target, Some(texture.raw));

        unsafe {
            let gl = &self.gl;
            gl.bind_buffer(glow::PIXEL_UNPACK_BUFFER, Some(buffer));
            if self.features.gl3_class() {
                gl.pixel_store_i32(glow::UNPACK_ROW_LENGTH, copy.buffer_width as i32);
            }
            let target = enums::slice_target(texture.ty, texture.msaa, copy.slice);
            let pixels = glow::PixelUnpackData::BufferOffset(copy.buffer_offset as u32);
            if enums::is_layered(texture.ty) {
                gl.tex_sub_image_3d(
                    texture.target,
                    copy.mipmap as i32,
                    copy.rect.x,
                    copy.rect.y,
                    copy.slice as i32,
                    copy.rect.width,
                    copy.rect.height,
                    1,
                    texture.format.external,
                    texture.format.ty,
                    pixels,
                );
            } else {
                gl.tex_sub_image_2d(
                    target,
                    copy.mipmap as i32,
                    copy.rect.x,
                    copy.rect.y,
                    copy.rect.width,
                    copy.rect.height,
                    texture.format.external,
                    texture.format.ty,
                    pixels,
                );
            }
            if self.features.gl3_class() {
                gl.pixel_store_i32(glow::UNPACK_ROW_LENGTH, 0);
            }
            gl.bind_buffer(glow::PIXEL_UNPACK_BUFFER, None);
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
        if !self.functions.compute {
            return Err(GraphicsError::unsupported("Compute shaders are not supported on this system."));
        }

        let (program, _) = self.program_for(ShaderBinding::Custom(shader))?;
        self.use_program(program);

        let gl = Rc::clone(&self.gl);
        unsafe {
            for &(slot, id) in &bindings.buffers {
                let raw = self.buffer(id)?.raw;
                gl.bind_buffer_base(glow::SHADER_STORAGE_BUFFER, slot, Some(raw));
            }
            for &(slot, id) in &bindings.textures {
                let texture = lookup(&self.textures, id)?;
                gl.bind_image_texture(
                    slot,
                    Some(texture.raw),
                    0,
                    enums::is_layered(texture.ty),
                    0,
                    glow::READ_WRITE,
                    texture.format.internal,
                );
            }
            gl.dispatch_compute(groups[0], groups[1], groups[2]);
            gl.memory_barrier(glow::ALL_BARRIER_BITS);
        }
        Ok(())
    }
}

pub(super) fn lookup(
    textures: &vesper_core::alloc::HashMap<ResourceId, GlTexture>,
    id: ResourceId,
) -> GraphicsResult<&GlTexture> {
    textures
        .get(&id)
        .ok_or_else(|| GraphicsError::backend(format!("Unknown texture {}", id)))
}

pub(super) fn read_attachment(texture: &GlTexture, copy: &TextureBufferCopy) -> TargetAttachment {
    TargetAttachment {
        texture: copy.texture,
        format: texture.pixel_format,
        slice: copy.slice,
        mipmap: copy.mipmap,
    }
}

/// Attaches textures to the bound framebuffer and checks completeness.
unsafe fn configure_framebuffer(
    gl: &glow::Context,
    textures: &vesper_core::alloc::HashMap<ResourceId, GlTexture>,
    colors: &[TargetAttachment],
    depth: Option<&TargetAttachment>,
    single_draw_buffer: bool,
) -> GraphicsResult<()> {
    let mut draw_buffers = Vec::with_capacity(colors.len());
    unsafe {
        for (i, attachment) in colors.iter().enumerate() {
            let point = glow::COLOR_ATTACHMENT0 + i as u32;
            attach(gl, lookup(textures, attachment.texture)?, point, attachment);
            draw_buffers.push(point);
        }
        if let Some(attachment) = depth {
            let texture = lookup(textures, attachment.texture)?;
            for point in texture.format.attachments.into_iter().filter(|&p| p != glow::NONE) {
                attach(gl, texture, point, attachment);
            }
        }

        if !single_draw_buffer {
            if draw_buffers.is_empty() {
                gl.draw_buffers(&[glow::NONE]);
            } else {
                gl.draw_buffers(&draw_buffers);
            }
        }

        let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
        if status != glow::FRAMEBUFFER_COMPLETE {
            return Err(GraphicsError::Backend(format!(
                "Could not create framebuffer: {}",
                enums::framebuffer_status_name(status)
            )));
        }
    }
    Ok(())
}

unsafe fn attach(gl: &glow::Context, texture: &GlTexture, point: u32, attachment: &TargetAttachment) {
    unsafe {
        if enums::is_layered(texture.ty) {
            gl.framebuffer_texture_layer(
                glow::FRAMEBUFFER,
                point,
                Some(texture.raw),
                attachment.mipmap as i32,
                attachment.slice as i32,
            );
        } else {
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                point,
                enums::slice_target(texture.ty, texture.msaa, attachment.slice),
                Some(texture.raw),
                attachment.mipmap as i32,
            );
        }
    }
}

unsafe fn set_uniforms(gl: &glow::Context, uniforms: &ProgramUniforms, st: &DrawState) {
    unsafe {
        if let Some(loc) = &uniforms.transform {
            gl.uniform_matrix_4_f32_slice(Some(loc), false, &st.transform.to_cols_array());
        }
        if let Some(loc) = &uniforms.projection {
            gl.uniform_matrix_4_f32_slice(Some(loc), false, &st.projection.to_cols_array());
        }
        if let Some(loc) = &uniforms.color {
            let c = st.constant_color;
            gl.uniform_4_f32(Some(loc), c.r, c.g, c.b, c.a);
        }
        if let Some(loc) = &uniforms.point_size {
            gl.uniform_1_f32(Some(loc), st.point_size);
        }
    }
}
