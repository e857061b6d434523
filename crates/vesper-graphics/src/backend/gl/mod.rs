//! Stateful OpenGL backend built on `glow`.
//!
//! The context is probed once at startup: version and extensions become a
//! [`GlFeatureSet`], the vendor string selects [`DriverBugs`] workarounds, and
//! [`GlFunctions`] fixes which entry point each operation uses. Format and
//! capability decisions are pure functions of those three values.
//!
//! All state changes go through a [`bind_state::BindState`] shadow copy so
//! redundant calls never reach the driver. Frames are paced with fence syncs
//! (or `glFinish` where client waits misbehave), and object deletion is
//! deferred until the frame that last used the object has completed.

mod bind_state;
mod caps;
mod draw;
mod enums;
mod features;
mod formats;
mod functions;
mod readback;
mod resources;
mod shaders;
mod vendor;

use std::rc::Rc;

use glow::HasContext;
use tracing::{debug, info, warn};
use vesper_core::alloc::HashMap;
use vesper_core::geometry::Rect;
use vesper_core::profiling::profile_function;

use crate::capability::Capabilities;
use crate::config::GraphicsConfig;
use crate::error::{GraphicsError, GraphicsResult};
use crate::pixel_format::{PixelFormat, PixelFormatUsage};
use crate::readback::{ReadbackMethod, ReadbackSource, ReadbackTask};
use crate::resource::{BufferSettings, ReleasedResource, ResourceId, ShaderStageIds, TextureSettings};
use crate::shader_cache::ShaderCompileOptions;
use crate::stream_buffer::StreamUsage;
use crate::transform::DeviceProjectionFlags;
use crate::types::{ATTRIB_COLOR, ShaderStageType, StandardShader};

use super::cache::ObjectCache;
use super::frame::{Fence, FramePacer};
use super::{
    BackendKind, BoundTargets, BufferCopy, ClearRequest, ComputeBindings, DrawCommand, GraphicsBackend, RendererInfo,
    TargetAttachment, TextureBufferCopy,
};

pub use features::GlFeatureSet;
pub use formats::{GlFormat, convert_pixel_format, pixel_format_usage};
pub use functions::GlFunctions;
pub use vendor::{DriverBugs, Vendor};

use bind_state::BindState;
use caps::{GlLimits, build_capabilities};
use functions::FrameSync;
use readback::PendingReadback;
use resources::{GlBuffer, GlProgram, GlTexture};

type RawTexture = <glow::Context as HasContext>::Texture;
type RawBuffer = <glow::Context as HasContext>::Buffer;
type RawProgram = <glow::Context as HasContext>::Program;
type RawShader = <glow::Context as HasContext>::Shader;
type RawFramebuffer = <glow::Context as HasContext>::Framebuffer;
type RawVertexArray = <glow::Context as HasContext>::VertexArray;
type RawFence = <glow::Context as HasContext>::Fence;
type RawUniform = <glow::Context as HasContext>::UniformLocation;

type FramebufferKey = (Vec<TargetAttachment>, Option<TargetAttachment>);

/// The window system side of a GL context.
pub trait GlSurface {
    fn size(&self) -> (u32, u32);
    fn swap_buffers(&mut self) -> GraphicsResult<()>;

    /// Called after the backend has been told about a new backbuffer size.
    fn resize(&mut self, _width: u32, _height: u32) {}
}

/// Surface for contexts without a window, e.g. offscreen rendering in tests.
#[derive(Debug, Clone, Copy)]
pub struct HeadlessSurface {
    pub width: u32,
    pub height: u32,
}

impl GlSurface for HeadlessSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn swap_buffers(&mut self) -> GraphicsResult<()> {
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }
}

/// Objects whose deletion waits for the frame that used them.
#[derive(Debug)]
enum DeferredDelete {
    Texture(RawTexture),
    Buffer(RawBuffer),
    Program(RawProgram),
    Framebuffer(RawFramebuffer),
}

/// Completion marker for one submitted frame.
struct GlFence {
    gl: Rc<glow::Context>,
    sync: Option<RawFence>,
}

impl GlFence {
    unsafe fn new(gl: &Rc<glow::Context>, mode: FrameSync) -> Self {
        let sync = match mode {
            FrameSync::Fence => match unsafe { gl.fence_sync(glow::SYNC_GPU_COMMANDS_COMPLETE, 0) } {
                Ok(sync) => Some(sync),
                Err(err) => {
                    warn!("glFenceSync failed, finishing instead: {}", err);
                    unsafe { gl.finish() };
                    None
                }
            },
            FrameSync::Finish => {
                unsafe { gl.finish() };
                None
            }
        };
        Self { gl: Rc::clone(gl), sync }
    }
}

impl Fence for GlFence {
    fn wait(&self) -> GraphicsResult<()> {
        let Some(sync) = self.sync else {
            return Ok(());
        };
        loop {
            // SAFETY: the sync object is alive until this fence is dropped.
            let status = unsafe { self.gl.client_wait_sync(sync, glow::SYNC_FLUSH_COMMANDS_BIT, i32::MAX) };
            match status {
                glow::ALREADY_SIGNALED | glow::CONDITION_SATISFIED => return Ok(()),
                glow::TIMEOUT_EXPIRED => continue,
                _ => return Err(GraphicsError::backend("glClientWaitSync failed")),
            }
        }
    }

    fn is_signaled(&self) -> bool {
        let Some(sync) = self.sync else {
            return true;
        };
        let status = unsafe { self.gl.client_wait_sync(sync, 0, 0) };
        matches!(status, glow::ALREADY_SIGNALED | glow::CONDITION_SATISFIED)
    }
}

impl Drop for GlFence {
    fn drop(&mut self) {
        if let Some(sync) = self.sync.take() {
            unsafe { self.gl.delete_sync(sync) };
        }
    }
}

pub struct GlBackend {
    gl: Rc<glow::Context>,
    surface: Box<dyn GlSurface>,
    features: GlFeatureSet,
    bugs: DriverBugs,
    functions: GlFunctions,
    info: RendererInfo,
    caps: Capabilities,
    gamma_correct: bool,
    cache_idle_frames: u32,

    state: BindState<RawProgram, RawVertexArray, RawBuffer, RawFramebuffer, RawTexture>,
    enabled_attributes: u32,
    vertex_array: Option<RawVertexArray>,

    textures: HashMap<ResourceId, GlTexture>,
    buffers: HashMap<ResourceId, GlBuffer>,
    stages: HashMap<ResourceId, RawShader>,
    programs: HashMap<ResourceId, GlProgram>,
    standard: Vec<GlProgram>,
    white_texture: RawTexture,

    framebuffers: ObjectCache<FramebufferKey, RawFramebuffer>,
    bound: BoundTargets,
    current_framebuffer: Option<RawFramebuffer>,

    pacer: FramePacer<GlFence, DeferredDelete>,
    readbacks: Vec<PendingReadback>,
    shader_switches: u32,
}

impl GlBackend {
    /// Wraps a current GL context.
    pub fn new(mut gl: glow::Context, surface: Box<dyn GlSurface>, config: &GraphicsConfig) -> GraphicsResult<Self> {
        profile_function!();

        let (mut features, info) = unsafe { probe(&gl) };
        if !(features.gl(2, 1) || features.gles_at_least(2, 0)) {
            return Err(GraphicsError::unsupported(format!(
                "OpenGL 2.1 or OpenGL ES 2.0 is required, the driver reports '{}'",
                info.version
            )));
        }

        let vendor = Vendor::detect(&info.vendor);
        let bugs = DriverBugs::detect(vendor, &info.device, &features);
        if bugs.contains(DriverBugs::BROKEN_GLES3) {
            warn!("{} reports OpenGL ES 3 but is treated as OpenGL ES 2", info.device);
            features.major = 2;
            features.minor = 0;
        }
        let functions = GlFunctions::resolve(&features, bugs);

        info!("OpenGL renderer: {} ({})", info.device, info.version);
        info!("OpenGL vendor: {} [{}]", info.vendor, vendor.name());
        if !bugs.is_empty() {
            warn!("Driver workarounds active: {:?}", bugs);
        }
        debug!("OpenGL entry points: {:?}", functions);

        if config.debug {
            unsafe { install_debug_callback(&mut gl, &features) };
        }

        let gl = Rc::new(gl);
        let limits = unsafe { GlLimits::query(&gl, &features) };
        let caps = build_capabilities(&features, &functions, &limits);
        debug!("OpenGL limits: {:?}", limits);

        let standard = StandardShader::ALL
            .iter()
            .map(|&shader| unsafe { resources::build_standard_program(&gl, &features, shader) })
            .collect::<GraphicsResult<Vec<_>>>()?;

        let (width, height) = surface.size();
        let mut backend = Self {
            gl: Rc::clone(&gl),
            surface,
            features,
            bugs,
            functions,
            info,
            caps,
            gamma_correct: config.gamma_correct,
            cache_idle_frames: config.cache_idle_frames,
            state: BindState::new(limits.texture_units.max(1) as usize),
            enabled_attributes: 0,
            vertex_array: None,
            textures: HashMap::default(),
            buffers: HashMap::default(),
            stages: HashMap::default(),
            programs: HashMap::default(),
            standard,
            white_texture: unsafe { resources::create_white_texture(&gl)? },
            framebuffers: ObjectCache::new(),
            bound: BoundTargets::screen(width, height, config.msaa),
            current_framebuffer: None,
            pacer: FramePacer::new(config.frames_in_flight),
            readbacks: Vec::new(),
            shader_switches: 0,
        };

        unsafe { backend.init_context_state()? };
        backend.pacer.begin_frame()?;
        Ok(backend)
    }

    pub fn features(&self) -> &GlFeatureSet {
        &self.features
    }

    pub fn driver_bugs(&self) -> DriverBugs {
        self.bugs
    }

    pub fn functions(&self) -> &GlFunctions {
        &self.functions
    }

    /// Forgets all tracked state, after another library issued GL calls.
    pub fn invalidate_state(&mut self) {
        self.state.invalidate();
        self.enabled_attributes = u32::MAX;
        if let Some(vao) = self.vertex_array {
            self.state.vertex_array.set(Some(vao));
            unsafe { self.gl.bind_vertex_array(Some(vao)) };
        }
    }

    unsafe fn init_context_state(&mut self) -> GraphicsResult<()> {
        let gl = Rc::clone(&self.gl);
        unsafe {
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            gl.pixel_store_i32(glow::PACK_ALIGNMENT, 1);

            if self.functions.vertex_arrays {
                let vao = gl.create_vertex_array().map_err(GraphicsError::Backend)?;
                gl.bind_vertex_array(Some(vao));
                self.state.vertex_array.set(Some(vao));
                self.vertex_array = Some(vao);
            }

            if !self.features.es {
                gl.enable(glow::PROGRAM_POINT_SIZE);
            }

            // Disabled color arrays read this constant.
            gl.vertex_attrib_4_f32(ATTRIB_COLOR, 1.0, 1.0, 1.0, 1.0);
        }

        let (width, height) = self.surface.size();
        self.bind_framebuffer(None);
        self.set_viewport(Rect::new(0, 0, width as i32, height as i32));
        Ok(())
    }

    fn bind_framebuffer(&mut self, fbo: Option<RawFramebuffer>) {
        if self.state.framebuffer.set(fbo) {
            unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, fbo) };
        }
    }

    fn set_viewport(&mut self, rect: Rect<i32>) {
        if self.state.viewport.set(rect) {
            unsafe { self.gl.viewport(rect.x, rect.y, rect.width, rect.height) };
        }
    }

    fn bind_texture(&mut self, unit: u32, target: u32, texture: Option<RawTexture>) {
        let (switch_unit, bind) = self.state.textures.bind(unit, texture);
        unsafe {
            if switch_unit {
                self.gl.active_texture(glow::TEXTURE0 + unit);
            }
            if bind {
                self.gl.bind_texture(target, texture);
            }
        }
    }

    fn delete_deferred(&mut self, items: Vec<DeferredDelete>) {
        let gl = &self.gl;
        for item in items {
            unsafe {
                match item {
                    DeferredDelete::Texture(t) => gl.delete_texture(t),
                    DeferredDelete::Buffer(b) => gl.delete_buffer(b),
                    DeferredDelete::Program(p) => gl.delete_program(p),
                    DeferredDelete::Framebuffer(f) => gl.delete_framebuffer(f),
                }
            }
        }
    }

    fn forget_framebuffers_using(&mut self, texture: ResourceId) {
        let stale = self.framebuffers.retain(|(colors, depth), _| {
            !colors.iter().chain(depth.iter()).any(|a| a.texture == texture)
        });
        for fbo in stale {
            if self.current_framebuffer == Some(fbo) {
                self.current_framebuffer = None;
            }
            self.state.framebuffer.forget(Some(fbo));
            self.pacer.defer(DeferredDelete::Framebuffer(fbo));
        }
    }
}

impl GraphicsBackend for GlBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::OpenGl
    }

    fn renderer_info(&self) -> RendererInfo {
        self.info.clone()
    }

    fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    fn pixel_format_usage(&self, format: PixelFormat) -> PixelFormatUsage {
        formats::pixel_format_usage(format, &self.features, self.bugs)
    }

    fn device_projection_flags(&self, render_to_texture: bool) -> DeviceProjectionFlags {
        // Texture row 0 is the bottom row in GL, so offscreen rendering flips.
        if render_to_texture {
            DeviceProjectionFlags::FLIP_Y
        } else {
            DeviceProjectionFlags::empty()
        }
    }

    fn screen_size(&self) -> (u32, u32) {
        self.surface.size()
    }

    fn resize(&mut self, width: u32, height: u32) -> GraphicsResult<()> {
        self.surface.resize(width, height);
        if self.bound.is_screen() {
            self.bound.width = width;
            self.bound.height = height;
            self.set_viewport(Rect::new(0, 0, width as i32, height as i32));
        }
        Ok(())
    }

    fn create_texture(&mut self, id: ResourceId, settings: &TextureSettings, data: Option<&[u8]>) -> GraphicsResult<()> {
        self.create_texture_object(id, settings, data)
    }

    fn write_texture(&mut self, id: ResourceId, slice: u32, mipmap: u32, rect: Rect<i32>, data: &[u8]) -> GraphicsResult<()> {
        let texture = self.texture(id)?.clone();
        self.bind_texture(0, texture.target, Some(texture.raw));
        unsafe { resources::upload_region(&self.gl, &texture, slice, mipmap, rect, data) };
        Ok(())
    }

    fn create_buffer(&mut self, id: ResourceId, settings: &BufferSettings, data: Option<&[u8]>) -> GraphicsResult<()> {
        let target = enums::buffer_target(settings.usage);
        let usage = enums::buffer_data_usage(settings.data_usage);
        self.create_buffer_object(id, target, usage, settings.size, data)
    }

    fn write_buffer(&mut self, id: ResourceId, offset: u64, data: &[u8]) -> GraphicsResult<()> {
        let buffer = self.buffer(id)?;
        let (raw, target) = (buffer.raw, buffer.target);
        let bound = self.bind_scratch_buffer(raw, target);
        unsafe { self.gl.buffer_sub_data_u8_slice(bound, offset as i32, data) };
        Ok(())
    }

    fn create_stream_buffer(&mut self, id: ResourceId, usage: StreamUsage, size: usize) -> GraphicsResult<()> {
        let target = match usage {
            StreamUsage::Vertex => glow::ARRAY_BUFFER,
            StreamUsage::Index => glow::ELEMENT_ARRAY_BUFFER,
        };
        self.create_buffer_object(id, target, glow::STREAM_DRAW, size as u64, None)
    }

    fn default_shader_source(&self, stage: ShaderStageType) -> &'static str {
        shaders::default_source(stage)
    }

    fn compile_shader_stage(
        &mut self,
        id: ResourceId,
        stage: ShaderStageType,
        source: &str,
        options: &ShaderCompileOptions,
    ) -> GraphicsResult<()> {
        if stage == ShaderStageType::Compute && !self.functions.compute {
            return Err(GraphicsError::unsupported("Compute shaders are not supported on this system."));
        }
        let shader = unsafe { resources::compile_stage(&self.gl, &self.features, stage, source, options)? };
        self.stages.insert(id, shader);
        Ok(())
    }

    fn link_shader(&mut self, id: ResourceId, stages: ShaderStageIds) -> GraphicsResult<()> {
        let mut shaders = Vec::with_capacity(3);
        for stage_id in [stages.vertex, stages.pixel, stages.compute].into_iter().flatten() {
            let shader = self
                .stages
                .get(&stage_id)
                .ok_or_else(|| GraphicsError::backend(format!("Unknown shader stage {}", stage_id)))?;
            shaders.push(*shader);
        }
        let program = unsafe { resources::link_program(&self.gl, &shaders, stages.compute.is_some())? };
        // Linking sets sampler uniforms through glUseProgram.
        self.state.program.invalidate();
        self.programs.insert(id, program);
        Ok(())
    }

    fn release(&mut self, resource: ReleasedResource) {
        match resource {
            ReleasedResource::Texture { id, .. } => {
                if let Some(texture) = self.textures.remove(&id) {
                    self.state.textures.forget(texture.raw);
                    self.forget_framebuffers_using(id);
                    self.pacer.defer(DeferredDelete::Texture(texture.raw));
                }
            }
            ReleasedResource::Buffer { id } | ReleasedResource::StreamBuffer { id } => {
                if let Some(buffer) = self.buffers.remove(&id) {
                    self.state.array_buffer.forget(Some(buffer.raw));
                    self.state.element_buffer.forget(Some(buffer.raw));
                    self.pacer.defer(DeferredDelete::Buffer(buffer.raw));
                }
            }
            ReleasedResource::ShaderStage { id, .. } => {
                // Programs keep their own reference to attached shader objects.
                if let Some(shader) = self.stages.remove(&id) {
                    unsafe { self.gl.delete_shader(shader) };
                }
            }
            ReleasedResource::Shader { id } => {
                if let Some(program) = self.programs.remove(&id) {
                    self.state.program.forget(Some(program.raw));
                    self.pacer.defer(DeferredDelete::Program(program.raw));
                }
            }
        }
    }

    fn set_render_targets(&mut self, targets: &BoundTargets) -> GraphicsResult<()> {
        self.bind_targets(targets)
    }

    fn clear(&mut self, clear: &ClearRequest) -> GraphicsResult<()> {
        self.clear_targets(clear);
        Ok(())
    }

    fn draw(&mut self, cmd: &DrawCommand<'_>) -> GraphicsResult<()> {
        self.draw_command(cmd)
    }

    fn copy_buffer(&mut self, copy: &BufferCopy) -> GraphicsResult<()> {
        if self.functions.buffer_copy != functions::BufferCopy::CopySubData {
            return Err(GraphicsError::unsupported("Buffer copies are not supported on this system."));
        }
        let source = self.buffer(copy.source)?.raw;
        let dest = self.buffer(copy.dest)?.raw;
        unsafe {
            self.gl.bind_buffer(glow::COPY_READ_BUFFER, Some(source));
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, Some(dest));
            self.gl.copy_buffer_sub_data(
                glow::COPY_READ_BUFFER,
                glow::COPY_WRITE_BUFFER,
                copy.source_offset as i32,
                copy.dest_offset as i32,
                copy.size as i32,
            );
        }
        Ok(())
    }

    fn copy_texture_to_buffer(&mut self, copy: &TextureBufferCopy) -> GraphicsResult<()> {
        self.copy_texture_to_buffer_object(copy)
    }

    fn copy_buffer_to_texture(&mut self, copy: &TextureBufferCopy) -> GraphicsResult<()> {
        self.copy_buffer_to_texture_object(copy)
    }

    fn dispatch(&mut self, shader: ResourceId, groups: [u32; 3], bindings: &ComputeBindings) -> GraphicsResult<()> {
        self.dispatch_compute(shader, groups, bindings)
    }

    fn readback(&mut self, source: &ReadbackSource, method: ReadbackMethod) -> GraphicsResult<Box<dyn ReadbackTask>> {
        self.start_readback(source, method)
    }

    fn present(&mut self) -> GraphicsResult<()> {
        profile_function!();

        self.surface.swap_buffers()?;

        let fence = unsafe { GlFence::new(&self.gl, self.functions.frame_sync) };
        self.pacer.submit(fence)?;
        let finished = self.pacer.begin_frame()?;
        self.delete_deferred(finished);

        for fbo in self.framebuffers.sweep(self.cache_idle_frames) {
            if self.current_framebuffer == Some(fbo) {
                self.current_framebuffer = None;
            }
            self.state.framebuffer.forget(Some(fbo));
            unsafe { self.gl.delete_framebuffer(fbo) };
        }

        self.resolve_readbacks(false);
        self.shader_switches = 0;
        Ok(())
    }

    fn shader_switches(&self) -> u32 {
        self.shader_switches
    }

    fn wait_idle(&mut self) -> GraphicsResult<()> {
        unsafe { self.gl.finish() };
        let finished = self.pacer.wait_all()?;
        self.delete_deferred(finished);
        self.resolve_readbacks(true);
        Ok(())
    }
}

impl Drop for GlBackend {
    fn drop(&mut self) {
        if let Err(err) = self.wait_idle() {
            warn!("Failed to idle the GL context during shutdown: {}", err);
        }
        self.discard_readbacks();

        let gl = Rc::clone(&self.gl);
        unsafe {
            for fbo in self.framebuffers.clear() {
                gl.delete_framebuffer(fbo);
            }
            for (_, texture) in self.textures.drain() {
                gl.delete_texture(texture.raw);
            }
            for (_, buffer) in self.buffers.drain() {
                gl.delete_buffer(buffer.raw);
            }
            for (_, program) in self.programs.drain() {
                gl.delete_program(program.raw);
            }
            for program in self.standard.drain(..) {
                gl.delete_program(program.raw);
            }
            for (_, shader) in self.stages.drain() {
                gl.delete_shader(shader);
            }
            gl.delete_texture(self.white_texture);
            if let Some(vao) = self.vertex_array.take() {
                gl.delete_vertex_array(vao);
            }
        }
    }
}

/// Reads version, extensions and identification strings.
unsafe fn probe(gl: &glow::Context) -> (GlFeatureSet, RendererInfo) {
    unsafe {
        let version = gl.version();
        let mut features = if version.is_embedded {
            GlFeatureSet::gles(version.major, version.minor)
        } else {
            GlFeatureSet::desktop(version.major, version.minor)
        };
        features = features.with_extensions(gl.supported_extensions().iter().cloned());

        if !features.es && features.gl(3, 2) {
            let mask = gl.get_parameter_i32(glow::CONTEXT_PROFILE_MASK);
            features.core_profile = mask & glow::CONTEXT_CORE_PROFILE_BIT as i32 != 0;
        }

        let info = RendererInfo {
            name: if features.es { "OpenGL ES" } else { "OpenGL" }.to_string(),
            version: gl.get_parameter_string(glow::VERSION),
            vendor: gl.get_parameter_string(glow::VENDOR),
            device: gl.get_parameter_string(glow::RENDERER),
        };
        (features, info)
    }
}

/// Routes driver debug messages into `tracing`.
unsafe fn install_debug_callback(gl: &mut glow::Context, features: &GlFeatureSet) {
    if !(features.gl(4, 3) || features.gles_at_least(3, 2) || features.has("GL_KHR_debug")) {
        debug!("GL debug output requested but not supported");
        return;
    }
    unsafe {
        gl.enable(glow::DEBUG_OUTPUT);
        gl.enable(glow::DEBUG_OUTPUT_SYNCHRONOUS);
        gl.debug_message_callback(|_source, ty, id, severity, message| match severity {
            glow::DEBUG_SEVERITY_HIGH => tracing::error!("GL [{:#x}/{}]: {}", ty, id, message),
            glow::DEBUG_SEVERITY_MEDIUM => warn!("GL [{:#x}/{}]: {}", ty, id, message),
            glow::DEBUG_SEVERITY_LOW => debug!("GL [{:#x}/{}]: {}", ty, id, message),
            _ => tracing::trace!("GL [{:#x}/{}]: {}", ty, id, message),
        });
    }
}

impl GlBackend {
    fn texture(&self, id: ResourceId) -> GraphicsResult<&GlTexture> {
        self.textures
            .get(&id)
            .ok_or_else(|| GraphicsError::backend(format!("Unknown texture {}", id)))
    }

    fn buffer(&self, id: ResourceId) -> GraphicsResult<&GlBuffer> {
        self.buffers
            .get(&id)
            .ok_or_else(|| GraphicsError::backend(format!("Unknown buffer {}", id)))
    }
}
