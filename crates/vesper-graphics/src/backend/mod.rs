//! The interface between the graphics state engine and a GPU API.
//!
//! [`crate::Graphics`] owns exactly one backend behind [`GraphicsBackend`].
//! Resources are identified by [`ResourceId`]; the handles the caller holds
//! live in the state engine, and the backend keeps whatever native objects
//! it needs in its own tables keyed by those ids.
//!
//! Two backends are provided:
//!
//! - [`gl`] (feature `opengl`): a stateful OpenGL backend built on `glow`.
//! - [`webgpu`] (feature `wgpu`): an explicit backend built on `wgpu`.
//!
//! [`Backend`] wraps whichever of them initialized first.

#[cfg(any(feature = "opengl", feature = "wgpu"))]
mod any;
pub mod cache;
pub mod frame;
#[cfg(feature = "opengl")]
pub mod gl;
#[cfg(feature = "wgpu")]
pub mod webgpu;

#[cfg(any(feature = "opengl", feature = "wgpu"))]
pub use any::{Backend, SurfaceProvider};

use glam::Mat4;
use vesper_core::color::Color;
use vesper_core::geometry::Rect;

use crate::blend::BlendState;
use crate::capability::Capabilities;
use crate::error::{GraphicsError, GraphicsResult};
use crate::pixel_format::{PixelFormat, PixelFormatUsage};
use crate::readback::{ReadbackMethod, ReadbackSource, ReadbackTask};
use crate::resource::{BufferSettings, ReleasedResource, ResourceId, ShaderBinding, ShaderStageIds, TextureSettings};
use crate::shader_cache::ShaderCompileOptions;
use crate::stream_buffer::StreamUsage;
use crate::transform::DeviceProjectionFlags;
use crate::types::{
    ColorChannelMask, CommonFormat, CullMode, DepthState, IndexFormat, PrimitiveType, SamplerState, ShaderStageType,
    StencilState, Winding, named_enum,
};

named_enum! {
    /// Available GPU API backends.
    pub enum BackendKind {
        OpenGl => "opengl",
        Wgpu => "wgpu",
    }
}

/// Identification strings reported by the driver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RendererInfo {
    pub name: String,
    pub version: String,
    pub vendor: String,
    pub device: String,
}

/// Bytes of a stream buffer region consumed by a draw.
#[derive(Debug, Clone, Copy)]
pub struct StreamSlice<'a> {
    pub buffer: ResourceId,
    /// Offset of `data` within the whole stream buffer.
    pub offset: u64,
    pub data: &'a [u8],
}

#[derive(Debug, Clone, Copy)]
pub enum IndexSource<'a> {
    /// Generated 16-bit indices from the batch index stream.
    Stream(StreamSlice<'a>),
    /// A caller-owned index buffer.
    Buffer {
        buffer: ResourceId,
        format: IndexFormat,
        /// First index to read.
        start: u32,
    },
}

/// Fixed-function and uniform state for one draw.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawState {
    pub transform: Mat4,
    /// Projection already adjusted for the backend's clip space.
    pub projection: Mat4,
    /// Multiplied with the vertex color; white when vertices carry their own color.
    pub constant_color: Color,
    pub blend: BlendState,
    pub stencil: StencilState,
    pub depth: DepthState,
    pub color_mask: ColorChannelMask,
    pub cull_mode: CullMode,
    pub winding: Winding,
    pub wireframe: bool,
    pub scissor: Option<Rect<i32>>,
    pub point_size: f32,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            transform: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            constant_color: Color::WHITE,
            blend: BlendState::default(),
            stencil: StencilState::default(),
            depth: DepthState::default(),
            color_mask: ColorChannelMask::all(),
            cull_mode: CullMode::None,
            winding: Winding::Ccw,
            wireframe: false,
            scissor: None,
            point_size: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DrawCommand<'a> {
    pub primitive: PrimitiveType,
    pub vertex_format: [CommonFormat; 2],
    pub vertex_streams: [Option<StreamSlice<'a>>; 2],
    pub index: Option<IndexSource<'a>>,
    pub vertex_start: u32,
    pub vertex_count: u32,
    pub index_count: u32,
    pub instance_count: u32,
    /// `None` samples a 1x1 white texture.
    pub texture: Option<ResourceId>,
    pub shader: ShaderBinding,
    pub state: &'a DrawState,
}

impl DrawCommand<'_> {
    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetAttachment {
    pub texture: ResourceId,
    pub format: PixelFormat,
    pub slice: u32,
    pub mipmap: u32,
}

/// The attachments a backend should render into. Empty means the screen.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoundTargets {
    pub colors: Vec<TargetAttachment>,
    pub depth_stencil: Option<TargetAttachment>,
    pub width: u32,
    pub height: u32,
    pub msaa: u32,
}

impl BoundTargets {
    pub fn screen(width: u32, height: u32, msaa: u32) -> Self {
        Self {
            colors: Vec::new(),
            depth_stencil: None,
            width,
            height,
            msaa,
        }
    }

    pub fn is_screen(&self) -> bool {
        self.colors.is_empty() && self.depth_stencil.is_none()
    }
}

/// Values to clear the bound attachments to. `None` leaves an attachment untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClearRequest {
    /// One entry per color attachment (one for the screen).
    pub colors: Vec<Option<Color>>,
    pub stencil: Option<i32>,
    pub depth: Option<f64>,
}

impl ClearRequest {
    pub fn is_empty(&self) -> bool {
        self.colors.iter().all(Option::is_none) && self.stencil.is_none() && self.depth.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCopy {
    pub source: ResourceId,
    pub dest: ResourceId,
    pub source_offset: u64,
    pub dest_offset: u64,
    pub size: u64,
}

/// A texel copy between a texture region and linear buffer memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBufferCopy {
    pub texture: ResourceId,
    pub format: PixelFormat,
    pub slice: u32,
    pub mipmap: u32,
    pub rect: Rect<i32>,
    pub buffer: ResourceId,
    pub buffer_offset: u64,
    /// Row length of the buffer side, in pixels.
    pub buffer_width: u32,
}

/// Resources a compute dispatch reads and writes, by binding slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComputeBindings {
    pub buffers: Vec<(u32, ResourceId)>,
    pub textures: Vec<(u32, ResourceId)>,
}

impl ComputeBindings {
    pub fn with_buffer(mut self, slot: u32, buffer: &crate::resource::Buffer) -> Self {
        self.buffers.push((slot, buffer.id()));
        self
    }

    pub fn with_texture(mut self, slot: u32, texture: &crate::resource::Texture) -> Self {
        self.textures.push((slot, texture.id()));
        self
    }
}

/// A GPU API behind the graphics state engine.
///
/// Calls arrive in program order from a single thread. Every `Usage` and
/// `Unsupported` condition has already been checked by the caller, so a
/// backend only reports what the driver itself rejects.
pub trait GraphicsBackend {
    fn kind(&self) -> BackendKind;
    fn renderer_info(&self) -> RendererInfo;
    fn capabilities(&self) -> &Capabilities;

    /// What `format` can be used for on this device.
    fn pixel_format_usage(&self, format: PixelFormat) -> PixelFormatUsage;

    /// Clip-space adjustments for the current target kind.
    fn device_projection_flags(&self, render_to_texture: bool) -> DeviceProjectionFlags;

    /// Backbuffer size in pixels.
    fn screen_size(&self) -> (u32, u32);
    fn resize(&mut self, width: u32, height: u32) -> GraphicsResult<()>;

    fn create_texture(&mut self, id: ResourceId, settings: &TextureSettings, data: Option<&[u8]>)
    -> GraphicsResult<()>;
    fn write_texture(
        &mut self,
        id: ResourceId,
        slice: u32,
        mipmap: u32,
        rect: Rect<i32>,
        data: &[u8],
    ) -> GraphicsResult<()>;
    fn create_buffer(&mut self, id: ResourceId, settings: &BufferSettings, data: Option<&[u8]>) -> GraphicsResult<()>;
    fn write_buffer(&mut self, id: ResourceId, offset: u64, data: &[u8]) -> GraphicsResult<()>;
    /// Creates the GPU side of a batch stream of `size` total bytes.
    fn create_stream_buffer(&mut self, id: ResourceId, usage: StreamUsage, size: usize) -> GraphicsResult<()>;

    /// Source of the default shader stage, used where a custom shader omits one.
    fn default_shader_source(&self, stage: ShaderStageType) -> &'static str;
    fn compile_shader_stage(
        &mut self,
        id: ResourceId,
        stage: ShaderStageType,
        source: &str,
        options: &ShaderCompileOptions,
    ) -> GraphicsResult<()>;
    fn link_shader(&mut self, id: ResourceId, stages: ShaderStageIds) -> GraphicsResult<()>;

    /// Destroys the native object behind a dropped handle, once the GPU is done with it.
    fn release(&mut self, resource: ReleasedResource);

    fn set_render_targets(&mut self, targets: &BoundTargets) -> GraphicsResult<()>;
    fn clear(&mut self, clear: &ClearRequest) -> GraphicsResult<()>;
    fn draw(&mut self, cmd: &DrawCommand<'_>) -> GraphicsResult<()>;

    fn copy_buffer(&mut self, copy: &BufferCopy) -> GraphicsResult<()>;
    fn copy_texture_to_buffer(&mut self, copy: &TextureBufferCopy) -> GraphicsResult<()>;
    fn copy_buffer_to_texture(&mut self, copy: &TextureBufferCopy) -> GraphicsResult<()>;

    fn dispatch(&mut self, shader: ResourceId, groups: [u32; 3], bindings: &ComputeBindings) -> GraphicsResult<()>;

    /// Starts copying `source` to CPU memory.
    ///
    /// For [`ReadbackMethod::Immediate`] the returned task must resolve on its
    /// first blocking poll. Asynchronous tasks may depend on the backend
    /// reaching a later frame boundary.
    fn readback(&mut self, source: &ReadbackSource, method: ReadbackMethod) -> GraphicsResult<Box<dyn ReadbackTask>>;

    /// Ends the frame and shows the backbuffer.
    fn present(&mut self) -> GraphicsResult<()>;

    /// Program changes since the last present.
    fn shader_switches(&self) -> u32;

    fn wait_idle(&mut self) -> GraphicsResult<()>;
}

/// Tries each backend in `order` and keeps the first that initializes.
pub fn select_backend<B>(
    order: &[BackendKind],
    mut try_create: impl FnMut(BackendKind) -> GraphicsResult<B>,
) -> GraphicsResult<(BackendKind, B)> {
    let mut failures = Vec::new();

    for &kind in order {
        match try_create(kind) {
            Ok(backend) => {
                tracing::info!("Using {} graphics backend", kind);
                return Ok((kind, backend));
            }
            Err(err) => {
                tracing::warn!("Could not initialize {} backend: {}", kind, err);
                failures.push((kind, err.to_string()));
            }
        }
    }

    Err(GraphicsError::NoBackendAvailable(failures))
}

/// Samples a depth texture against `compare` as written by the caller.
///
/// Shadow samplers compare the reference against the stored value, which is
/// the reverse of how callers state the comparison.
pub(crate) fn sampler_compare(sampler: &SamplerState) -> Option<crate::types::CompareMode> {
    sampler.depth_compare.map(|c| c.reversed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_first_working_backend() {
        let (kind, value) = select_backend(&[BackendKind::OpenGl, BackendKind::Wgpu], |kind| match kind {
            BackendKind::OpenGl => Err(GraphicsError::backend("no context")),
            BackendKind::Wgpu => Ok(7),
        })
        .unwrap();
        assert_eq!(kind, BackendKind::Wgpu);
        assert_eq!(value, 7);
    }

    #[test]
    fn test_select_reports_every_failure() {
        let err = select_backend::<()>(&[BackendKind::Wgpu, BackendKind::OpenGl], |_| {
            Err(GraphicsError::unsupported("nope"))
        })
        .unwrap_err();
        match &err {
            GraphicsError::NoBackendAvailable(attempts) => {
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[0].0, BackendKind::Wgpu);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().contains("wgpu: nope"));
    }

    #[test]
    fn test_clear_request_empty() {
        assert!(ClearRequest::default().is_empty());
        let clear = ClearRequest {
            colors: vec![None],
            stencil: Some(0),
            depth: None,
        };
        assert!(!clear.is_empty());
    }
}
