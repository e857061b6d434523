//! Explicit backend built on `wgpu`.
//!
//! Commands are recorded into one encoder per frame. A render pass is opened
//! lazily by the first draw after a target change and closed by anything
//! that cannot run inside it (copies, dispatches, readbacks, present).
//! Clears become load operations of the next pass; a clear that no draw
//! follows opens an empty pass of its own.
//!
//! Pipelines are built on demand from a [`pipeline::PipelineKey`] and kept in
//! an [`ObjectCache`] that drops entries unused for `cache_idle_frames`.
//! Per-draw uniforms go through a frame-partitioned ring, and native objects
//! of released resources are destroyed once the frame that last used them
//! has completed on the GPU.

mod draw;
mod formats;
mod pipeline;
mod readback;
mod resources;
mod ring;
mod sampler;
mod swapchain;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};
use vesper_core::alloc::HashMap;
use vesper_core::geometry::Rect;
use vesper_core::profiling::profile_function;

use crate::capability::Capabilities;
use crate::config::GraphicsConfig;
use crate::error::{GraphicsError, GraphicsResult};
use crate::pixel_format::{PixelFormat, PixelFormatUsage};
use crate::readback::{ReadbackMethod, ReadbackSource, ReadbackTask};
use crate::resource::{BufferSettings, ReleasedResource, ResourceId, ShaderBinding, ShaderStageIds, TextureSettings};
use crate::shader_cache::ShaderCompileOptions;
use crate::stream_buffer::StreamUsage;
use crate::transform::DeviceProjectionFlags;
use crate::types::{ShaderStageType, StandardShader, TextureType};

use super::cache::ObjectCache;
use super::frame::{Fence, FramePacer};
use super::{
    BackendKind, BoundTargets, BufferCopy, ClearRequest, ComputeBindings, DrawCommand, GraphicsBackend, RendererInfo,
    TargetAttachment, TextureBufferCopy,
};

pub use formats::{pixel_format, texture_format};
pub use swapchain::SCREEN_DEPTH_FORMAT;

use pipeline::{Globals, PipelineKey, TextureLayoutKey};
use ring::UniformRing;
use sampler::SamplerCache;
use swapchain::{Offscreen, Screen, ScreenAttachments, Swapchain};

/// Optional device features used when the adapter has them.
const OPTIONAL_FEATURES: wgpu::Features = wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER
    .union(wgpu::Features::POLYGON_MODE_LINE)
    .union(wgpu::Features::TEXTURE_COMPRESSION_BC)
    .union(wgpu::Features::TEXTURE_COMPRESSION_ETC2)
    .union(wgpu::Features::TEXTURE_COMPRESSION_ASTC)
    .union(wgpu::Features::FLOAT32_FILTERABLE)
    .union(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES);

/// Draws per frame the uniform ring is sized for before it has to grow.
const INITIAL_DRAWS_PER_FRAME: u64 = 1024;

struct WgpuTexture {
    texture: wgpu::Texture,
    format: PixelFormat,
    texture_type: TextureType,
    /// Group 1 bind group, absent for textures that cannot be sampled.
    binding: Option<TextureBinding>,
}

#[derive(Clone)]
struct TextureBinding {
    layout: TextureLayoutKey,
    bind_group: wgpu::BindGroup,
}

struct WgpuBuffer {
    buffer: wgpu::Buffer,
}

enum WgpuProgram {
    Graphics {
        vertex: wgpu::ShaderModule,
        pixel: wgpu::ShaderModule,
    },
    Compute(wgpu::ComputePipeline),
}

/// Views of the attachments in a [`BoundTargets`].
#[derive(Clone)]
struct TargetViews {
    colors: Vec<wgpu::TextureView>,
    /// Slice of each color attachment that is a volume texture.
    depth_slices: Vec<Option<u32>>,
    depth_stencil: Option<wgpu::TextureView>,
    color_formats: Vec<wgpu::TextureFormat>,
    depth_format: Option<wgpu::TextureFormat>,
}

type TargetViewKey = (Vec<TargetAttachment>, Option<TargetAttachment>);

/// Native objects kept alive until the GPU is done with them.
enum DeferredResource {
    Texture(wgpu::Texture),
    Buffer(wgpu::Buffer),
    Pipeline(wgpu::RenderPipeline),
    Views(TargetViews),
}

impl DeferredResource {
    fn destroy(self) {
        match self {
            DeferredResource::Texture(texture) => texture.destroy(),
            DeferredResource::Buffer(buffer) => buffer.destroy(),
            DeferredResource::Pipeline(_) | DeferredResource::Views(_) => {}
        }
    }
}

/// Completion of one queue submission.
struct SubmissionFence {
    device: wgpu::Device,
    index: wgpu::SubmissionIndex,
    done: Arc<AtomicBool>,
}

impl SubmissionFence {
    fn new(device: &wgpu::Device, queue: &wgpu::Queue, index: wgpu::SubmissionIndex) -> Self {
        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);
        queue.on_submitted_work_done(move || flag.store(true, Ordering::Release));
        Self {
            device: device.clone(),
            index,
            done,
        }
    }
}

impl Fence for SubmissionFence {
    fn wait(&self) -> GraphicsResult<()> {
        if self.done.load(Ordering::Acquire) {
            return Ok(());
        }
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: Some(self.index.clone()),
                timeout: None,
            })
            .map(|_| ())
            .map_err(|err| GraphicsError::backend(format!("Waiting for the GPU failed: {}", err)))
    }

    fn is_signaled(&self) -> bool {
        if !self.done.load(Ordering::Acquire) {
            let _ = self.device.poll(wgpu::PollType::Poll);
        }
        self.done.load(Ordering::Acquire)
    }
}

/// Render state already set on the open pass.
#[derive(Default)]
struct PassState {
    pipeline: Option<PipelineKey>,
    texture: Option<Option<ResourceId>>,
    stencil_reference: Option<u32>,
    scissor: Option<[u32; 4]>,
}

pub struct WgpuBackend {
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    info: RendererInfo,
    caps: Capabilities,
    border_clamp: bool,
    depth_stencil: bool,
    msaa: u32,
    cache_idle_frames: u32,

    screen: Screen,
    screen_attachments: ScreenAttachments,

    textures: HashMap<ResourceId, WgpuTexture>,
    buffers: HashMap<ResourceId, WgpuBuffer>,
    stages: HashMap<ResourceId, wgpu::ShaderModule>,
    programs: HashMap<ResourceId, WgpuProgram>,
    standard: Vec<(wgpu::ShaderModule, wgpu::ShaderModule)>,

    samplers: SamplerCache,
    globals_layout: wgpu::BindGroupLayout,
    texture_layouts: HashMap<TextureLayoutKey, (wgpu::BindGroupLayout, wgpu::PipelineLayout)>,
    white: TextureBinding,
    vertex_defaults: wgpu::Buffer,
    uniforms: UniformRing,

    pipelines: ObjectCache<PipelineKey, wgpu::RenderPipeline>,
    views: ObjectCache<TargetViewKey, TargetViews>,
    bound: BoundTargets,

    encoder: wgpu::CommandEncoder,
    pass: Option<wgpu::RenderPass<'static>>,
    pass_state: PassState,
    pending_clear: Option<ClearRequest>,

    pacer: FramePacer<SubmissionFence, DeferredResource>,
    last_shader: Option<ShaderBinding>,
    shader_switches: u32,
}

impl WgpuBackend {
    /// Creates a backend that renders the screen into an offscreen texture.
    pub fn headless(config: &GraphicsConfig, width: u32, height: u32) -> GraphicsResult<Self> {
        let instance = create_instance(config);
        pollster::block_on(Self::create(instance, None, (width, height), config))
    }

    /// Creates a backend presenting to `surface`, which must come from `instance`.
    pub fn with_surface(
        instance: wgpu::Instance,
        surface: wgpu::Surface<'static>,
        size: (u32, u32),
        config: &GraphicsConfig,
    ) -> GraphicsResult<Self> {
        pollster::block_on(Self::create(instance, Some(surface), size, config))
    }

    async fn create(
        instance: wgpu::Instance,
        surface: Option<wgpu::Surface<'static>>,
        (width, height): (u32, u32),
        config: &GraphicsConfig,
    ) -> GraphicsResult<Self> {
        profile_function!();

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                force_fallback_adapter: false,
                compatible_surface: surface.as_ref(),
            })
            .await
            .map_err(|err| GraphicsError::unsupported(format!("No suitable GPU adapter: {}", err)))?;

        let adapter_info = adapter.get_info();
        let features = adapter.features() & OPTIONAL_FEATURES;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Vesper Device"),
                required_features: features,
                required_limits: adapter.limits(),
                ..Default::default()
            })
            .await
            .map_err(|err| GraphicsError::backend(format!("Could not create device: {}", err)))?;

        info!("wgpu adapter: {} ({:?})", adapter_info.name, adapter_info.backend);
        debug!("wgpu device features: {:?}", device.features());

        let screen_features = adapter.get_texture_format_features(wgpu::TextureFormat::Rgba8Unorm);
        let max_msaa = formats::max_sample_count(&screen_features);
        let caps = formats::build_capabilities(&device.limits(), device.features(), max_msaa);

        let msaa = if config.msaa > max_msaa {
            warn!("{}x MSAA is not supported, using {}x", config.msaa, max_msaa);
            max_msaa
        } else {
            config.msaa.max(1)
        };

        let screen = match surface {
            Some(surface) => Screen::Surface(Swapchain::new(
                surface,
                &adapter,
                &device,
                (width, height),
                config.vsync,
                config.gamma_correct,
            )?),
            None => {
                let format = if config.gamma_correct {
                    wgpu::TextureFormat::Rgba8UnormSrgb
                } else {
                    wgpu::TextureFormat::Rgba8Unorm
                };
                Screen::Offscreen(Offscreen::new(&device, format, width, height))
            }
        };
        let screen_size = screen.size();
        let screen_attachments =
            ScreenAttachments::new(&device, screen.format(), screen_size, config.depth_stencil, msaa);

        let standard = StandardShader::ALL
            .iter()
            .map(|&shader| {
                let [(vs_stage, vs), (ps_stage, ps)] = pipeline::standard_sources(shader);
                let options = ShaderCompileOptions::default();
                Ok((
                    pipeline::create_shader_module(&device, vs_stage, vs, &options)?,
                    pipeline::create_shader_module(&device, ps_stage, ps, &options)?,
                ))
            })
            .collect::<GraphicsResult<Vec<_>>>()?;

        let globals_layout = pipeline::globals_layout(&device);
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let uniforms = UniformRing::new(
            &device,
            &globals_layout,
            Globals::SIZE,
            alignment,
            INITIAL_DRAWS_PER_FRAME,
            config.frames_in_flight,
        );

        let vertex_defaults = resources::create_init_buffer(
            &device,
            "Vertex Defaults",
            &pipeline::VERTEX_DEFAULTS,
            wgpu::BufferUsages::VERTEX,
        );
        let encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });

        let mut samplers = SamplerCache::new();
        let mut texture_layouts = HashMap::default();
        let border_clamp = device.features().contains(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER);
        let white = resources::create_white_texture(
            &device,
            &queue,
            &mut samplers,
            &mut texture_layouts,
            &globals_layout,
            border_clamp,
        );

        let mut pacer = FramePacer::new(config.frames_in_flight);
        pacer.begin_frame()?;

        Ok(Self {
            info: RendererInfo {
                name: "wgpu".to_string(),
                version: format!("{:?} {}", adapter_info.backend, adapter_info.driver_info),
                vendor: format!("{} ({:#06x})", adapter_info.driver, adapter_info.vendor),
                device: adapter_info.name.clone(),
            },
            instance,
            adapter,
            device,
            queue,
            caps,
            border_clamp,
            depth_stencil: config.depth_stencil,
            msaa,
            cache_idle_frames: config.cache_idle_frames,
            screen,
            screen_attachments,
            textures: HashMap::default(),
            buffers: HashMap::default(),
            stages: HashMap::default(),
            programs: HashMap::default(),
            standard,
            samplers,
            globals_layout,
            texture_layouts,
            white,
            vertex_defaults,
            uniforms,
            pipelines: ObjectCache::new(),
            views: ObjectCache::new(),
            bound: BoundTargets::screen(screen_size.0, screen_size.1, msaa),
            encoder,
            pass: None,
            pass_state: PassState::default(),
            pending_clear: None,
            pacer,
            last_shader: None,
            shader_switches: 0,
        })
    }

    pub fn instance(&self) -> &wgpu::Instance {
        &self.instance
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// The texture standing in for the backbuffer when running headless.
    pub fn offscreen_backbuffer(&self) -> Option<&wgpu::Texture> {
        match &self.screen {
            Screen::Offscreen(offscreen) => Some(&offscreen.texture),
            Screen::Surface(_) => None,
        }
    }

    /// Submits the frame encoder and starts a new one.
    fn submit(&mut self) -> wgpu::SubmissionIndex {
        self.end_pass();
        let encoder = std::mem::replace(
            &mut self.encoder,
            self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            }),
        );
        self.queue.submit(Some(encoder.finish()))
    }

    fn destroy_deferred(items: Vec<DeferredResource>) {
        for item in items {
            item.destroy();
        }
    }

    fn texture(&self, id: ResourceId) -> GraphicsResult<&WgpuTexture> {
        self.textures
            .get(&id)
            .ok_or_else(|| GraphicsError::backend(format!("Unknown texture {}", id)))
    }

    fn buffer(&self, id: ResourceId) -> GraphicsResult<&WgpuBuffer> {
        self.buffers
            .get(&id)
            .ok_or_else(|| GraphicsError::backend(format!("Unknown buffer {}", id)))
    }

    fn forget_views_using(&mut self, texture: ResourceId) {
        let stale = self
            .views
            .retain(|(colors, depth), _| !colors.iter().chain(depth.iter()).any(|a| a.texture == texture));
        for views in stale {
            self.pacer.defer(DeferredResource::Views(views));
        }
    }
}

impl GraphicsBackend for WgpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Wgpu
    }

    fn renderer_info(&self) -> RendererInfo {
        self.info.clone()
    }

    fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    fn pixel_format_usage(&self, format: PixelFormat) -> PixelFormatUsage {
        let Some(native) = formats::texture_format(format) else {
            return PixelFormatUsage::empty();
        };
        let features = self.adapter.get_texture_format_features(native);
        formats::pixel_format_usage(Some(native), self.device.features(), &features)
    }

    fn device_projection_flags(&self, _render_to_texture: bool) -> DeviceProjectionFlags {
        // Framebuffer and texture rows both start at the top, so only the
        // depth range differs from GL.
        DeviceProjectionFlags::Z_01
    }

    fn screen_size(&self) -> (u32, u32) {
        self.screen.size()
    }

    fn resize(&mut self, width: u32, height: u32) -> GraphicsResult<()> {
        profile_function!();
        if width == 0 || height == 0 {
            return Ok(());
        }
        let on_screen = self.bound.is_screen();
        if on_screen {
            self.end_pass();
        }

        match &mut self.screen {
            Screen::Surface(swapchain) => swapchain.resize(&self.device, width, height),
            Screen::Offscreen(offscreen) => {
                let format = offscreen.texture.format();
                let old = std::mem::replace(offscreen, Offscreen::new(&self.device, format, width, height));
                self.pacer.defer(DeferredResource::Texture(old.texture));
            }
        }

        let attachments = ScreenAttachments::new(
            &self.device,
            self.screen.format(),
            (width, height),
            self.depth_stencil,
            self.msaa,
        );
        let old = std::mem::replace(&mut self.screen_attachments, attachments);
        for (texture, _) in [old.depth_stencil, old.msaa].into_iter().flatten() {
            self.pacer.defer(DeferredResource::Texture(texture));
        }

        if on_screen {
            self.bound.width = width;
            self.bound.height = height;
        }
        debug!("Resized screen to {}x{}", width, height);
        Ok(())
    }

    fn create_texture(&mut self, id: ResourceId, settings: &TextureSettings, data: Option<&[u8]>) -> GraphicsResult<()> {
        self.create_texture_object(id, settings, data)
    }

    fn write_texture(&mut self, id: ResourceId, slice: u32, mipmap: u32, rect: Rect<i32>, data: &[u8]) -> GraphicsResult<()> {
        self.upload_texture_region(id, slice, mipmap, rect, data)
    }

    fn create_buffer(&mut self, id: ResourceId, settings: &BufferSettings, data: Option<&[u8]>) -> GraphicsResult<()> {
        self.create_buffer_object(id, settings, data)
    }

    fn write_buffer(&mut self, id: ResourceId, offset: u64, data: &[u8]) -> GraphicsResult<()> {
        self.upload_buffer_region(id, offset, data)
    }

    fn create_stream_buffer(&mut self, id: ResourceId, usage: StreamUsage, size: usize) -> GraphicsResult<()> {
        let usage = match usage {
            StreamUsage::Vertex => wgpu::BufferUsages::VERTEX,
            StreamUsage::Index => wgpu::BufferUsages::INDEX,
        };
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Stream Buffer"),
            size: (size as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT),
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.buffers.insert(id, WgpuBuffer { buffer });
        Ok(())
    }

    fn default_shader_source(&self, stage: ShaderStageType) -> &'static str {
        pipeline::default_source(stage)
    }

    fn compile_shader_stage(
        &mut self,
        id: ResourceId,
        stage: ShaderStageType,
        source: &str,
        options: &ShaderCompileOptions,
    ) -> GraphicsResult<()> {
        let module = pipeline::create_shader_module(&self.device, stage, source, options)?;
        self.stages.insert(id, module);
        Ok(())
    }

    fn link_shader(&mut self, id: ResourceId, stages: ShaderStageIds) -> GraphicsResult<()> {
        self.link_program(id, stages)
    }

    fn release(&mut self, resource: ReleasedResource) {
        match resource {
            ReleasedResource::Texture { id, .. } => {
                if let Some(texture) = self.textures.remove(&id) {
                    self.forget_views_using(id);
                    self.pacer.defer(DeferredResource::Texture(texture.texture));
                }
            }
            ReleasedResource::Buffer { id } | ReleasedResource::StreamBuffer { id } => {
                if let Some(buffer) = self.buffers.remove(&id) {
                    self.pacer.defer(DeferredResource::Buffer(buffer.buffer));
                }
            }
            ReleasedResource::ShaderStage { id, .. } => {
                self.stages.remove(&id);
            }
            ReleasedResource::Shader { id } => {
                self.programs.remove(&id);
                let binding = ShaderBinding::Custom(id);
                for pipeline in self.pipelines.retain(|key, _| key.shader != binding) {
                    self.pacer.defer(DeferredResource::Pipeline(pipeline));
                }
                if self.last_shader == Some(binding) {
                    self.last_shader = None;
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
        self.copy_buffer_object(copy)
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

        let index = self.submit();
        if let Screen::Surface(swapchain) = &mut self.screen {
            swapchain.present();
        }

        let fence = SubmissionFence::new(&self.device, &self.queue, index);
        self.pacer.submit(fence)?;
        let finished = self.pacer.begin_frame()?;
        Self::destroy_deferred(finished);

        self.uniforms.next_frame();
        for pipeline in self.pipelines.sweep(self.cache_idle_frames) {
            self.pacer.defer(DeferredResource::Pipeline(pipeline));
        }
        for views in self.views.sweep(self.cache_idle_frames) {
            self.pacer.defer(DeferredResource::Views(views));
        }

        self.last_shader = None;
        self.shader_switches = 0;
        Ok(())
    }

    fn shader_switches(&self) -> u32 {
        self.shader_switches
    }

    fn wait_idle(&mut self) -> GraphicsResult<()> {
        let index = self.submit();
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: Some(index),
                timeout: None,
            })
            .map_err(|err| GraphicsError::backend(format!("Waiting for the GPU failed: {}", err)))?;
        let finished = self.pacer.wait_all()?;
        Self::destroy_deferred(finished);
        Ok(())
    }
}

impl Drop for WgpuBackend {
    fn drop(&mut self) {
        if let Err(err) = self.wait_idle() {
            warn!("Failed to idle the device during shutdown: {}", err);
        }
    }
}

/// Instance matching the backend's settings, for creating a surface before the backend.
pub fn create_instance(config: &GraphicsConfig) -> wgpu::Instance {
    let flags = if config.debug {
        wgpu::InstanceFlags::debugging()
    } else {
        wgpu::InstanceFlags::default()
    };
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags,
        ..Default::default()
    })
}
