//! Mock graphics backend for testing without a GPU.
//!
//! [`MockBackend`] implements [`GraphicsBackend`] by recording every call in
//! order. Clones share the recording, so a test can keep one handle while the
//! graphics engine owns the other:
//!
//! ```ignore
//! let backend = MockBackend::new();
//! let mut graphics = Graphics::new(backend.clone(), GraphicsConfig::default())?;
//! graphics.points(&points, None)?;
//! graphics.present()?;
//! assert_eq!(backend.draws()[0].vertex_count, 100);
//! ```
//!
//! Buffer writes are stored, so buffer readbacks and copies return real data.
//! Texture readbacks return zeroed bytes.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use vesper_core::geometry::Rect;
use vesper_graphics::backend::{
    BackendKind, BoundTargets, BufferCopy, ClearRequest, ComputeBindings, DrawCommand, DrawState, GraphicsBackend,
    IndexSource, RendererInfo, TextureBufferCopy,
};
use vesper_graphics::capability::Capabilities;
use vesper_graphics::error::{GraphicsError, GraphicsResult};
use vesper_graphics::pixel_format::{PixelFormat, PixelFormatUsage};
use vesper_graphics::readback::{CompletedReadback, ReadbackMethod, ReadbackSource, ReadbackTask};
use vesper_graphics::resource::{
    BufferSettings, ReleasedResource, ResourceId, ShaderBinding, ShaderStageIds, TextureSettings,
};
use vesper_graphics::shader_cache::ShaderCompileOptions;
use vesper_graphics::stream_buffer::StreamUsage;
use vesper_graphics::transform::DeviceProjectionFlags;
use vesper_graphics::types::{CommonFormat, IndexFormat, PrimitiveType, ShaderStageType};

use crate::fixtures::{desktop_capabilities, full_format_usage};

/// A draw as the backend saw it, with stream contents copied out.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub primitive: PrimitiveType,
    pub vertex_format: [CommonFormat; 2],
    pub vertex_count: u32,
    pub index_count: u32,
    pub instance_count: u32,
    pub texture: Option<ResourceId>,
    pub shader: ShaderBinding,
    pub state: DrawState,
    /// Bytes of each vertex stream used by the draw.
    pub vertex_data: [Vec<u8>; 2],
    /// Generated 16-bit indices, when the draw used the index stream.
    pub indices: Vec<u16>,
    /// Caller-owned index buffer and first index, when one was bound.
    pub index_buffer: Option<(ResourceId, IndexFormat, u32)>,
}

impl DrawRecord {
    pub fn is_indexed(&self) -> bool {
        self.index_count > 0
    }

    /// Positions from the first stream, for `Xy` and `XyStRgba8` layouts.
    pub fn positions_xy(&self) -> Vec<[f32; 2]> {
        let stride = self.vertex_format[0].stride();
        if stride == 0 {
            return Vec::new();
        }
        self.vertex_data[0]
            .chunks_exact(stride)
            .map(|vertex| {
                let x = f32::from_le_bytes([vertex[0], vertex[1], vertex[2], vertex[3]]);
                let y = f32::from_le_bytes([vertex[4], vertex[5], vertex[6], vertex[7]]);
                [x, y]
            })
            .collect()
    }
}

/// Recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Resize { width: u32, height: u32 },
    CreateTexture { id: ResourceId, settings: TextureSettings, has_data: bool },
    WriteTexture { id: ResourceId, slice: u32, mipmap: u32, rect: Rect<i32>, size: usize },
    CreateBuffer { id: ResourceId, settings: BufferSettings, has_data: bool },
    WriteBuffer { id: ResourceId, offset: u64, size: usize },
    CreateStreamBuffer { id: ResourceId, usage: StreamUsage, size: usize },
    CompileShaderStage { id: ResourceId, stage: ShaderStageType, source: String },
    LinkShader { id: ResourceId, stages: ShaderStageIds },
    Release(ReleasedResource),
    SetRenderTargets(BoundTargets),
    Clear(ClearRequest),
    Draw(Box<DrawRecord>),
    CopyBuffer(BufferCopy),
    CopyTextureToBuffer(TextureBufferCopy),
    CopyBufferToTexture(TextureBufferCopy),
    Dispatch { shader: ResourceId, groups: [u32; 3], bindings: ComputeBindings },
    Readback { source: ReadbackSource, method: ReadbackMethod },
    Present,
    WaitIdle,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<BackendCall>,
    buffers: HashMap<ResourceId, Vec<u8>>,
    last_shader: Option<ShaderBinding>,
    shader_switches: u32,
    /// Calls of this name fail until reset.
    failing: Option<&'static str>,
}

/// Recording implementation of [`GraphicsBackend`].
#[derive(Clone)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
    capabilities: Arc<Capabilities>,
    screen_size: Arc<Mutex<(u32, u32)>>,
    format_usage: Arc<dyn Fn(PixelFormat) -> PixelFormatUsage + Send + Sync>,
    kind: BackendKind,
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend")
            .field("kind", &self.kind)
            .field("screen_size", &*self.screen_size.lock())
            .field("calls", &self.state.lock().calls.len())
            .finish()
    }
}

impl MockBackend {
    /// An 800x600 screen on a device with [`desktop_capabilities`].
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            capabilities: Arc::new(desktop_capabilities()),
            screen_size: Arc::new(Mutex::new((800, 600))),
            format_usage: Arc::new(full_format_usage),
            kind: BackendKind::OpenGl,
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = Arc::new(capabilities);
        self
    }

    pub fn with_screen_size(self, width: u32, height: u32) -> Self {
        *self.screen_size.lock() = (width, height);
        self
    }

    pub fn with_format_usage(mut self, usage: impl Fn(PixelFormat) -> PixelFormatUsage + Send + Sync + 'static) -> Self {
        self.format_usage = Arc::new(usage);
        self
    }

    pub fn with_kind(mut self, kind: BackendKind) -> Self {
        self.kind = kind;
        self
    }

    /// Makes every call of the given kind fail, e.g. `"draw"` or `"set_render_targets"`.
    pub fn fail_calls(&self, name: &'static str) {
        self.state.lock().failing = Some(name);
    }

    pub fn stop_failing(&self) {
        self.state.lock().failing = None;
    }

    /// Get all recorded calls.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().calls.clone()
    }

    /// Clear all recorded calls.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Get the number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Every draw submitted so far, in order.
    pub fn draws(&self) -> Vec<DrawRecord> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Draw(record) => Some((**record).clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_draw(&self) -> Option<DrawRecord> {
        self.draws().pop()
    }

    pub fn count_draws(&self) -> usize {
        self.count(|call| matches!(call, BackendCall::Draw(_)))
    }

    pub fn count_clears(&self) -> usize {
        self.count(|call| matches!(call, BackendCall::Clear(_)))
    }

    pub fn count_render_target_switches(&self) -> usize {
        self.count(|call| matches!(call, BackendCall::SetRenderTargets(_)))
    }

    pub fn count_texture_creates(&self) -> usize {
        self.count(|call| matches!(call, BackendCall::CreateTexture { .. }))
    }

    pub fn count_buffer_creates(&self) -> usize {
        self.count(|call| matches!(call, BackendCall::CreateBuffer { .. }))
    }

    pub fn count_stage_compiles(&self) -> usize {
        self.count(|call| matches!(call, BackendCall::CompileShaderStage { .. }))
    }

    pub fn count_presents(&self) -> usize {
        self.count(|call| matches!(call, BackendCall::Present))
    }

    pub fn count_dispatches(&self) -> usize {
        self.count(|call| matches!(call, BackendCall::Dispatch { .. }))
    }

    /// Resources handed back for destruction.
    pub fn released(&self) -> Vec<ReleasedResource> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Release(resource) => Some(resource.clone()),
                _ => None,
            })
            .collect()
    }

    /// The most recently bound render target set.
    pub fn bound_targets(&self) -> Option<BoundTargets> {
        self.state.lock().calls.iter().rev().find_map(|call| match call {
            BackendCall::SetRenderTargets(bound) => Some(bound.clone()),
            _ => None,
        })
    }

    /// Current contents of a buffer as seen by the mock.
    pub fn buffer_contents(&self, id: ResourceId) -> Option<Vec<u8>> {
        self.state.lock().buffers.get(&id).cloned()
    }

    fn count(&self, filter: impl Fn(&BackendCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|call| filter(call)).count()
    }

    fn record(&self, name: &'static str, call: BackendCall) -> GraphicsResult<()> {
        let mut state = self.state.lock();
        if state.failing == Some(name) {
            return Err(GraphicsError::Backend(format!("mock {} failure", name)));
        }
        state.calls.push(call);
        Ok(())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn stream_bytes(slice: Option<&vesper_graphics::backend::StreamSlice<'_>>) -> Vec<u8> {
    slice.map(|s| s.data.to_vec()).unwrap_or_default()
}

impl GraphicsBackend for MockBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn renderer_info(&self) -> RendererInfo {
        RendererInfo {
            name: "Mock".to_string(),
            version: "1.0".to_string(),
            vendor: "vesper".to_string(),
            device: "recording".to_string(),
        }
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn pixel_format_usage(&self, format: PixelFormat) -> PixelFormatUsage {
        (self.format_usage)(format)
    }

    fn device_projection_flags(&self, _render_to_texture: bool) -> DeviceProjectionFlags {
        DeviceProjectionFlags::empty()
    }

    fn screen_size(&self) -> (u32, u32) {
        *self.screen_size.lock()
    }

    fn resize(&mut self, width: u32, height: u32) -> GraphicsResult<()> {
        self.record("resize", BackendCall::Resize { width, height })?;
        *self.screen_size.lock() = (width, height);
        Ok(())
    }

    fn create_texture(&mut self, id: ResourceId, settings: &TextureSettings, data: Option<&[u8]>) -> GraphicsResult<()> {
        self.record(
            "create_texture",
            BackendCall::CreateTexture {
                id,
                settings: settings.clone(),
                has_data: data.is_some(),
            },
        )
    }

    fn write_texture(
        &mut self,
        id: ResourceId,
        slice: u32,
        mipmap: u32,
        rect: Rect<i32>,
        data: &[u8],
    ) -> GraphicsResult<()> {
        self.record(
            "write_texture",
            BackendCall::WriteTexture {
                id,
                slice,
                mipmap,
                rect,
                size: data.len(),
            },
        )
    }

    fn create_buffer(&mut self, id: ResourceId, settings: &BufferSettings, data: Option<&[u8]>) -> GraphicsResult<()> {
        self.record(
            "create_buffer",
            BackendCall::CreateBuffer {
                id,
                settings: settings.clone(),
                has_data: data.is_some(),
            },
        )?;
        let mut contents = vec![0; settings.size as usize];
        if let Some(data) = data {
            let len = data.len().min(contents.len());
            contents[..len].copy_from_slice(&data[..len]);
        }
        self.state.lock().buffers.insert(id, contents);
        Ok(())
    }

    fn write_buffer(&mut self, id: ResourceId, offset: u64, data: &[u8]) -> GraphicsResult<()> {
        self.record(
            "write_buffer",
            BackendCall::WriteBuffer {
                id,
                offset,
                size: data.len(),
            },
        )?;
        let mut state = self.state.lock();
        let buffer = state
            .buffers
            .get_mut(&id)
            .ok_or_else(|| GraphicsError::Backend(format!("unknown buffer {}", id)))?;
        let start = offset as usize;
        buffer[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn create_stream_buffer(&mut self, id: ResourceId, usage: StreamUsage, size: usize) -> GraphicsResult<()> {
        self.record("create_stream_buffer", BackendCall::CreateStreamBuffer { id, usage, size })
    }

    fn default_shader_source(&self, stage: ShaderStageType) -> &'static str {
        match stage {
            ShaderStageType::Vertex => "mock vertex",
            ShaderStageType::Pixel => "mock pixel",
            ShaderStageType::Compute => "mock compute",
        }
    }

    fn compile_shader_stage(
        &mut self,
        id: ResourceId,
        stage: ShaderStageType,
        source: &str,
        _options: &ShaderCompileOptions,
    ) -> GraphicsResult<()> {
        if source.contains("syntax error") {
            return Err(GraphicsError::Backend(format!("Could not compile {} shader: syntax error", stage)));
        }
        self.record(
            "compile_shader_stage",
            BackendCall::CompileShaderStage {
                id,
                stage,
                source: source.to_string(),
            },
        )
    }

    fn link_shader(&mut self, id: ResourceId, stages: ShaderStageIds) -> GraphicsResult<()> {
        self.record("link_shader", BackendCall::LinkShader { id, stages })
    }

    fn release(&mut self, resource: ReleasedResource) {
        let mut state = self.state.lock();
        if let ReleasedResource::Buffer { id } = &resource {
            state.buffers.remove(id);
        }
        state.calls.push(BackendCall::Release(resource));
    }

    fn set_render_targets(&mut self, targets: &BoundTargets) -> GraphicsResult<()> {
        self.record("set_render_targets", BackendCall::SetRenderTargets(targets.clone()))
    }

    fn clear(&mut self, clear: &ClearRequest) -> GraphicsResult<()> {
        self.record("clear", BackendCall::Clear(clear.clone()))
    }

    fn draw(&mut self, cmd: &DrawCommand<'_>) -> GraphicsResult<()> {
        let (indices, index_buffer) = match &cmd.index {
            Some(IndexSource::Stream(slice)) => (
                slice
                    .data
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect(),
                None,
            ),
            Some(IndexSource::Buffer { buffer, format, start }) => (Vec::new(), Some((*buffer, *format, *start))),
            None => (Vec::new(), None),
        };
        let record = DrawRecord {
            primitive: cmd.primitive,
            vertex_format: cmd.vertex_format,
            vertex_count: cmd.vertex_count,
            index_count: cmd.index_count,
            instance_count: cmd.instance_count,
            texture: cmd.texture,
            shader: cmd.shader,
            state: cmd.state.clone(),
            vertex_data: [
                stream_bytes(cmd.vertex_streams[0].as_ref()),
                stream_bytes(cmd.vertex_streams[1].as_ref()),
            ],
            indices,
            index_buffer,
        };
        self.record("draw", BackendCall::Draw(Box::new(record)))?;

        let mut state = self.state.lock();
        if state.last_shader != Some(cmd.shader) {
            state.last_shader = Some(cmd.shader);
            state.shader_switches += 1;
        }
        Ok(())
    }

    fn copy_buffer(&mut self, copy: &BufferCopy) -> GraphicsResult<()> {
        self.record("copy_buffer", BackendCall::CopyBuffer(*copy))?;
        let mut state = self.state.lock();
        let source = state
            .buffers
            .get(&copy.source)
            .map(|data| data[copy.source_offset as usize..(copy.source_offset + copy.size) as usize].to_vec());
        if let (Some(bytes), Some(dest)) = (source, state.buffers.get_mut(&copy.dest)) {
            let start = copy.dest_offset as usize;
            dest[start..start + bytes.len()].copy_from_slice(&bytes);
        }
        Ok(())
    }

    fn copy_texture_to_buffer(&mut self, copy: &TextureBufferCopy) -> GraphicsResult<()> {
        self.record("copy_texture_to_buffer", BackendCall::CopyTextureToBuffer(*copy))
    }

    fn copy_buffer_to_texture(&mut self, copy: &TextureBufferCopy) -> GraphicsResult<()> {
        self.record("copy_buffer_to_texture", BackendCall::CopyBufferToTexture(*copy))
    }

    fn dispatch(&mut self, shader: ResourceId, groups: [u32; 3], bindings: &ComputeBindings) -> GraphicsResult<()> {
        self.record(
            "dispatch",
            BackendCall::Dispatch {
                shader,
                groups,
                bindings: bindings.clone(),
            },
        )
    }

    fn readback(&mut self, source: &ReadbackSource, method: ReadbackMethod) -> GraphicsResult<Box<dyn ReadbackTask>> {
        self.record(
            "readback",
            BackendCall::Readback {
                source: *source,
                method,
            },
        )?;

        let bytes = match *source {
            ReadbackSource::Buffer { id, offset, size } => {
                let state = self.state.lock();
                match state.buffers.get(&id) {
                    Some(data) => data[offset as usize..(offset + size) as usize].to_vec(),
                    None => return Ok(Box::new(CompletedReadback::failed(format!("unknown buffer {}", id)))),
                }
            }
            ReadbackSource::Texture { .. } | ReadbackSource::Screen { .. } => vec![0; source.size() as usize],
        };
        Ok(Box::new(CompletedReadback::ready(bytes)))
    }

    fn present(&mut self) -> GraphicsResult<()> {
        self.record("present", BackendCall::Present)
    }

    fn shader_switches(&self) -> u32 {
        self.state.lock().shader_switches
    }

    fn wait_idle(&mut self) -> GraphicsResult<()> {
        self.record("wait_idle", BackendCall::WaitIdle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_recording() {
        let backend = MockBackend::new();
        let mut owned = backend.clone();

        owned.present().unwrap();
        owned.clear(&ClearRequest::default()).unwrap();

        assert_eq!(backend.call_count(), 2);
        assert_eq!(backend.count_presents(), 1);
        assert_eq!(backend.count_clears(), 1);

        backend.clear_calls();
        assert_eq!(owned.call_count(), 0);
    }

    #[test]
    fn test_buffer_readback_returns_written_bytes() {
        let mut backend = MockBackend::new();
        let id = ResourceId::next();
        let settings = BufferSettings::new(
            8,
            vesper_graphics::types::BufferUsage::COPY_SOURCE,
            vesper_graphics::types::BufferDataUsage::Readback,
        );
        backend.create_buffer(id, &settings, None).unwrap();
        backend.write_buffer(id, 2, &[1, 2, 3]).unwrap();

        let source = ReadbackSource::Buffer { id, offset: 0, size: 6 };
        let mut task = backend.readback(&source, ReadbackMethod::Immediate).unwrap();
        assert_eq!(
            task.poll(true),
            vesper_graphics::readback::ReadbackPoll::Ready(vec![0, 0, 1, 2, 3, 0])
        );
    }

    #[test]
    fn test_failing_calls() {
        let mut backend = MockBackend::new();
        backend.fail_calls("present");
        assert!(backend.present().is_err());
        assert_eq!(backend.call_count(), 0);

        backend.stop_failing();
        assert!(backend.present().is_ok());
    }
}
