//! The closed set of native backends and how one is chosen at startup.

use vesper_core::geometry::Rect;

use crate::capability::Capabilities;
use crate::config::GraphicsConfig;
use crate::error::{GraphicsError, GraphicsResult};
use crate::pixel_format::{PixelFormat, PixelFormatUsage};
use crate::readback::{ReadbackMethod, ReadbackSource, ReadbackTask};
use crate::resource::{BufferSettings, ReleasedResource, ResourceId, ShaderStageIds, TextureSettings};
use crate::shader_cache::ShaderCompileOptions;
use crate::stream_buffer::StreamUsage;
use crate::transform::DeviceProjectionFlags;
use crate::types::ShaderStageType;

#[cfg(feature = "opengl")]
use super::gl::{GlBackend, GlSurface};
#[cfg(feature = "wgpu")]
use super::webgpu::WgpuBackend;
use super::{
    BackendKind, BoundTargets, BufferCopy, ClearRequest, ComputeBindings, DrawCommand, GraphicsBackend, RendererInfo,
    TextureBufferCopy, select_backend,
};

/// Supplies the drawable a backend renders to.
///
/// Window system integration is outside this crate; implement this for
/// whatever owns the native window.
pub trait SurfaceProvider {
    /// Drawable size in pixels.
    fn pixel_size(&self) -> (u32, u32);

    /// Makes a GL context current and wraps it.
    #[cfg(feature = "opengl")]
    fn create_gl_context(&self) -> GraphicsResult<(glow::Context, Box<dyn GlSurface>)> {
        Err(GraphicsError::unsupported("This window provider cannot create OpenGL contexts."))
    }

    /// Creates a presentable surface on `instance`.
    #[cfg(feature = "wgpu")]
    fn create_wgpu_surface(&self, instance: &wgpu::Instance) -> GraphicsResult<wgpu::Surface<'static>>;
}

#[cfg(feature = "winit")]
impl SurfaceProvider for std::sync::Arc<winit::window::Window> {
    fn pixel_size(&self) -> (u32, u32) {
        let size = self.inner_size();
        (size.width, size.height)
    }

    fn create_wgpu_surface(&self, instance: &wgpu::Instance) -> GraphicsResult<wgpu::Surface<'static>> {
        instance
            .create_surface(self.clone())
            .map_err(|err| GraphicsError::backend(format!("Could not create a surface for the window: {}", err)))
    }
}

/// One of the native backends, picked at startup.
pub enum Backend {
    #[cfg(feature = "opengl")]
    OpenGl(GlBackend),
    #[cfg(feature = "wgpu")]
    Wgpu(WgpuBackend),
}

macro_rules! dispatch {
    ($self:ident, $b:ident => $body:expr) => {
        match $self {
            #[cfg(feature = "opengl")]
            Backend::OpenGl($b) => $body,
            #[cfg(feature = "wgpu")]
            Backend::Wgpu($b) => $body,
        }
    };
}

impl Backend {
    /// Tries `config.backends` in order against `provider`.
    pub fn create(config: &GraphicsConfig, provider: &dyn SurfaceProvider) -> GraphicsResult<Self> {
        let (_, backend) = select_backend(&config.backends, |kind| match kind {
            BackendKind::OpenGl => Self::create_gl(config, provider),
            BackendKind::Wgpu => Self::create_wgpu(config, provider),
        })?;
        Ok(backend)
    }

    /// A backend without a window. Only the explicit backend can run this way.
    pub fn headless(config: &GraphicsConfig, width: u32, height: u32) -> GraphicsResult<Self> {
        let (_, backend) = select_backend(&config.backends, |kind| match kind {
            BackendKind::OpenGl => Err(GraphicsError::unsupported(
                "OpenGL needs a context from the window system.",
            )),
            BackendKind::Wgpu => Self::create_headless_wgpu(config, width, height),
        })?;
        Ok(backend)
    }

    #[cfg(feature = "opengl")]
    fn create_gl(config: &GraphicsConfig, provider: &dyn SurfaceProvider) -> GraphicsResult<Self> {
        let (gl, surface) = provider.create_gl_context()?;
        Ok(Backend::OpenGl(GlBackend::new(gl, surface, config)?))
    }

    #[cfg(not(feature = "opengl"))]
    fn create_gl(_config: &GraphicsConfig, _provider: &dyn SurfaceProvider) -> GraphicsResult<Self> {
        Err(GraphicsError::unsupported("Built without the 'opengl' feature."))
    }

    #[cfg(feature = "wgpu")]
    fn create_wgpu(config: &GraphicsConfig, provider: &dyn SurfaceProvider) -> GraphicsResult<Self> {
        let instance = super::webgpu::create_instance(config);
        let surface = provider.create_wgpu_surface(&instance)?;
        Ok(Backend::Wgpu(WgpuBackend::with_surface(
            instance,
            surface,
            provider.pixel_size(),
            config,
        )?))
    }

    #[cfg(not(feature = "wgpu"))]
    fn create_wgpu(_config: &GraphicsConfig, _provider: &dyn SurfaceProvider) -> GraphicsResult<Self> {
        Err(GraphicsError::unsupported("Built without the 'wgpu' feature."))
    }

    #[cfg(feature = "wgpu")]
    fn create_headless_wgpu(config: &GraphicsConfig, width: u32, height: u32) -> GraphicsResult<Self> {
        Ok(Backend::Wgpu(WgpuBackend::headless(config, width, height)?))
    }

    #[cfg(not(feature = "wgpu"))]
    fn create_headless_wgpu(_config: &GraphicsConfig, _width: u32, _height: u32) -> GraphicsResult<Self> {
        Err(GraphicsError::unsupported("Built without the 'wgpu' feature."))
    }
}

impl GraphicsBackend for Backend {
    fn kind(&self) -> BackendKind {
        dispatch!(self, b => b.kind())
    }

    fn renderer_info(&self) -> RendererInfo {
        dispatch!(self, b => b.renderer_info())
    }

    fn capabilities(&self) -> &Capabilities {
        dispatch!(self, b => b.capabilities())
    }

    fn pixel_format_usage(&self, format: PixelFormat) -> PixelFormatUsage {
        dispatch!(self, b => b.pixel_format_usage(format))
    }

    fn device_projection_flags(&self, render_to_texture: bool) -> DeviceProjectionFlags {
        dispatch!(self, b => b.device_projection_flags(render_to_texture))
    }

    fn screen_size(&self) -> (u32, u32) {
        dispatch!(self, b => b.screen_size())
    }

    fn resize(&mut self, width: u32, height: u32) -> GraphicsResult<()> {
        dispatch!(self, b => b.resize(width, height))
    }

    fn create_texture(
        &mut self,
        id: ResourceId,
        settings: &TextureSettings,
        data: Option<&[u8]>,
    ) -> GraphicsResult<()> {
        dispatch!(self, b => b.create_texture(id, settings, data))
    }

    fn write_texture(
        &mut self,
        id: ResourceId,
        slice: u32,
        mipmap: u32,
        rect: Rect<i32>,
        data: &[u8],
    ) -> GraphicsResult<()> {
        dispatch!(self, b => b.write_texture(id, slice, mipmap, rect, data))
    }

    fn create_buffer(&mut self, id: ResourceId, settings: &BufferSettings, data: Option<&[u8]>) -> GraphicsResult<()> {
        dispatch!(self, b => b.create_buffer(id, settings, data))
    }

    fn write_buffer(&mut self, id: ResourceId, offset: u64, data: &[u8]) -> GraphicsResult<()> {
        dispatch!(self, b => b.write_buffer(id, offset, data))
    }

    fn create_stream_buffer(&mut self, id: ResourceId, usage: StreamUsage, size: usize) -> GraphicsResult<()> {
        dispatch!(self, b => b.create_stream_buffer(id, usage, size))
    }

    fn default_shader_source(&self, stage: ShaderStageType) -> &'static str {
        dispatch!(self, b => b.default_shader_source(stage))
    }

    fn compile_shader_stage(
        &mut self,
        id: ResourceId,
        stage: ShaderStageType,
        source: &str,
        options: &ShaderCompileOptions,
    ) -> GraphicsResult<()> {
        dispatch!(self, b => b.compile_shader_stage(id, stage, source, options))
    }

    fn link_shader(&mut self, id: ResourceId, stages: ShaderStageIds) -> GraphicsResult<()> {
        dispatch!(self, b => b.link_shader(id, stages))
    }

    fn release(&mut self, resource: ReleasedResource) {
        dispatch!(self, b => b.release(resource))
    }

    fn set_render_targets(&mut self, targets: &BoundTargets) -> GraphicsResult<()> {
        dispatch!(self, b => b.set_render_targets(targets))
    }

    fn clear(&mut self, clear: &ClearRequest) -> GraphicsResult<()> {
        dispatch!(self, b => b.clear(clear))
    }

    fn draw(&mut self, cmd: &DrawCommand<'_>) -> GraphicsResult<()> {
        dispatch!(self, b => b.draw(cmd))
    }

    fn copy_buffer(&mut self, copy: &BufferCopy) -> GraphicsResult<()> {
        dispatch!(self, b => b.copy_buffer(copy))
    }

    fn copy_texture_to_buffer(&mut self, copy: &TextureBufferCopy) -> GraphicsResult<()> {
        dispatch!(self, b => b.copy_texture_to_buffer(copy))
    }

    fn copy_buffer_to_texture(&mut self, copy: &TextureBufferCopy) -> GraphicsResult<()> {
        dispatch!(self, b => b.copy_buffer_to_texture(copy))
    }

    fn dispatch(&mut self, shader: ResourceId, groups: [u32; 3], bindings: &ComputeBindings) -> GraphicsResult<()> {
        dispatch!(self, b => b.dispatch(shader, groups, bindings))
    }

    fn readback(&mut self, source: &ReadbackSource, method: ReadbackMethod) -> GraphicsResult<Box<dyn ReadbackTask>> {
        dispatch!(self, b => b.readback(source, method))
    }

    fn present(&mut self) -> GraphicsResult<()> {
        dispatch!(self, b => b.present())
    }

    fn shader_switches(&self) -> u32 {
        dispatch!(self, b => b.shader_switches())
    }

    fn wait_idle(&mut self) -> GraphicsResult<()> {
        dispatch!(self, b => b.wait_idle())
    }
}
