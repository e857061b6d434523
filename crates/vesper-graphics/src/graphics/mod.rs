//! The graphics state engine.
//!
//! [`Graphics`] sits between drawing calls and the backend. It owns the
//! state and transform stacks, the batch accumulator, render target
//! bookkeeping, the temporary resource pools, the shader stage cache and the
//! readbacks still in flight.
//!
//! The engine is split by concern:
//!
//! - `state_ops`: push/pop, setters, transforms and projections
//! - `batch`: batched draw requests and the flush that turns them into draws
//! - `primitives`: points, lines and shapes built on the batch
//! - `targets`: render targets, temporary attachments and clears
//! - `resources`: texture, buffer and shader creation, temporary pools
//! - `transfer`: copies, compute dispatch and readbacks
//!
//! # Example
//!
//! ```no_run
//! use vesper_core::color::Color;
//! use vesper_graphics::{DrawMode, Graphics, GraphicsConfig, StackType};
//!
//! # fn main() -> vesper_graphics::GraphicsResult<()> {
//! let mut graphics = Graphics::headless(GraphicsConfig::from_env(), 800, 600)?;
//!
//! graphics.push(StackType::All)?;
//! graphics.set_color(Color::new(1.0, 0.5, 0.0, 1.0))?;
//! graphics.translate(100.0, 100.0);
//! graphics.rectangle(DrawMode::Fill, 0.0, 0.0, 64.0, 64.0)?;
//! graphics.circle(DrawMode::Line, 200.0, 50.0, 32.0)?;
//! graphics.pop()?;
//!
//! graphics.present()?;
//! # Ok(())
//! # }
//! ```

mod batch;
mod draw;
mod primitives;
mod resources;
mod state_ops;
mod targets;
mod transfer;

pub use resources::ShaderSources;
pub use transfer::TextureRegion;

use glam::Mat4;
use tracing::{debug, info, warn};
use vesper_core::profiling::profile_function;

use crate::backend::{BackendKind, BoundTargets, GraphicsBackend, RendererInfo};
use crate::batched::BatchAccumulator;
use crate::capability::{Capabilities, Feature, SystemLimit};
use crate::config::GraphicsConfig;
use crate::error::GraphicsResult;
use crate::pixel_format::{PixelFormat, PixelFormatUsage};
use crate::readback::{Readback, ReadbackQueue};
use crate::render_target::TargetInfo;
use crate::resource::{Buffer, ReleaseQueue, ReleasedResource, Texture};
use crate::shader_cache::ShaderStageCache;
use crate::state::DisplayState;
use crate::temporary::{BufferShape, TemporaryPool, TextureShape};
use crate::transform::{TransformStack, screen_ortho};
use crate::types::StackType;

#[cfg(any(feature = "opengl", feature = "wgpu"))]
use crate::backend::{Backend, SurfaceProvider};

/// Near and far planes of the default orthographic projection.
const DEFAULT_DEPTH_RANGE: (f32, f32) = (-10.0, 10.0);

/// Per-frame counters. Reset by [`Graphics::present`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    /// Backend draws issued this frame, counting a pending batch as one.
    pub draw_calls: u32,
    /// Requests that were merged into an existing batch instead of starting one.
    pub draw_calls_batched: u32,
    pub render_target_switches: u32,
    pub shader_switches: u32,
    /// Live textures.
    pub textures: u32,
    /// Estimated bytes held by live textures.
    pub texture_memory: u64,
}

/// The graphics module: one backend plus all the state drawn with it.
pub struct Graphics<B: GraphicsBackend> {
    backend: B,
    config: GraphicsConfig,

    states: Vec<DisplayState>,
    stack_types: Vec<StackType>,
    transforms: TransformStack,
    /// Projection before the backend's clip space adjustment.
    projection: Mat4,

    batch: BatchAccumulator,

    bound: BoundTargets,
    target_info: Option<TargetInfo>,
    /// Pool-owned depth/stencil attachment of the bound targets, kept alive while bound.
    bound_temporary: Option<Texture>,

    temporary_textures: TemporaryPool<TextureShape, Texture>,
    temporary_buffers: TemporaryPool<BufferShape, Buffer>,
    shader_stages: ShaderStageCache,
    readbacks: ReadbackQueue,
    /// Screenshots to take at the next present.
    screenshots: Vec<Readback>,
    releases: ReleaseQueue,

    draw_calls: u32,
    render_target_switches: u32,
    texture_count: u32,
    texture_memory: u64,
    frame: u64,
}

#[cfg(any(feature = "opengl", feature = "wgpu"))]
impl Graphics<Backend> {
    /// Creates a graphics module for a window, trying `config.backends` in order.
    pub fn with_window(config: GraphicsConfig, window: &dyn SurfaceProvider) -> GraphicsResult<Self> {
        let backend = Backend::create(&config, window)?;
        Self::new(backend, config)
    }

    /// Creates a graphics module rendering into an offscreen backbuffer.
    pub fn headless(config: GraphicsConfig, width: u32, height: u32) -> GraphicsResult<Self> {
        let backend = Backend::headless(&config, width, height)?;
        Self::new(backend, config)
    }
}

impl<B: GraphicsBackend> Graphics<B> {
    pub fn new(mut backend: B, config: GraphicsConfig) -> GraphicsResult<Self> {
        profile_function!();

        let batch = BatchAccumulator::new(
            config.vertex_stream_size,
            config.index_stream_size,
            config.frames_in_flight.max(1) as usize,
        );
        for stream in batch.streams() {
            backend.create_stream_buffer(stream.id(), stream.usage(), stream.total_size())?;
        }

        let info = backend.renderer_info();
        info!(
            "Graphics initialized on {} backend: {} {} ({})",
            backend.kind(),
            info.vendor,
            info.device,
            info.version
        );

        let (width, height) = backend.screen_size();
        let (near, far) = DEFAULT_DEPTH_RANGE;

        Ok(Self {
            bound: BoundTargets::screen(width, height, config.msaa),
            temporary_textures: TemporaryPool::new(config.temporary_idle_frames),
            temporary_buffers: TemporaryPool::new(config.temporary_idle_frames),
            backend,
            config,
            states: vec![DisplayState::default()],
            stack_types: Vec::new(),
            transforms: TransformStack::new(),
            projection: screen_ortho(width as f32, height as f32, near, far),
            batch,
            target_info: None,
            bound_temporary: None,
            shader_stages: ShaderStageCache::new(),
            readbacks: ReadbackQueue::new(),
            screenshots: Vec::new(),
            releases: ReleaseQueue::new(),
            draw_calls: 0,
            render_target_switches: 0,
            texture_count: 0,
            texture_memory: 0,
            frame: 0,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn renderer_info(&self) -> RendererInfo {
        self.backend.renderer_info()
    }

    pub fn config(&self) -> &GraphicsConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &Capabilities {
        self.backend.capabilities()
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        self.backend.capabilities().has(feature)
    }

    pub fn limit(&self, limit: SystemLimit) -> f64 {
        self.backend.capabilities().limit(limit)
    }

    /// Whether `format` supports every use in `usage` on this device.
    pub fn is_pixel_format_supported(&self, format: PixelFormat, usage: PixelFormatUsage) -> bool {
        self.backend.pixel_format_usage(format).contains(usage)
    }

    pub fn is_gamma_correct(&self) -> bool {
        self.config.gamma_correct
    }

    /// Frames presented so far.
    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    /// Backbuffer size in pixels.
    pub fn screen_size(&self) -> (u32, u32) {
        self.backend.screen_size()
    }

    /// Size of what is currently drawn to: the render targets, or the screen.
    pub fn dimensions(&self) -> (u32, u32) {
        match self.target_info {
            Some(info) => (info.width, info.height),
            None => self.backend.screen_size(),
        }
    }

    pub fn stats(&self) -> Stats {
        Stats {
            draw_calls: self.draw_calls + u32::from(!self.batch.is_empty()),
            draw_calls_batched: self.batch.draw_calls_batched(),
            render_target_switches: self.render_target_switches,
            shader_switches: self.backend.shader_switches(),
            textures: self.texture_count,
            texture_memory: self.texture_memory,
        }
    }

    /// Informs the backend of a new backbuffer size.
    pub fn resize(&mut self, width: u32, height: u32) -> GraphicsResult<()> {
        self.flush_batched_draws()?;
        self.backend.resize(width, height)?;
        debug!("Backbuffer resized to {}x{}", width, height);

        if self.target_info.is_none() {
            let (width, height) = self.backend.screen_size();
            self.bound.width = width;
            self.bound.height = height;
            if self.state().custom_projection.is_none() {
                self.reset_projection()?;
            }
        }
        Ok(())
    }

    /// Ends the frame.
    ///
    /// Pending batches are drawn, queued screenshots are copied and the
    /// backbuffer is shown. Then released
    /// resources go to the backend, idle temporaries age, readbacks are
    /// polled, the batch streams move to their next partition and the
    /// per-frame stats start over.
    pub fn present(&mut self) -> GraphicsResult<()> {
        profile_function!();

        if self.is_render_target_active() {
            return Err(crate::GraphicsError::usage(
                "present cannot be called while a render target is active.",
            ));
        }

        self.flush_batched_draws()?;
        self.take_screenshots();
        let presented = self.backend.present();
        if let Err(err) = &presented {
            warn!("Present failed: {}", err);
        }

        self.update_temporary_resources();
        self.process_releases();
        self.readbacks.update();
        self.batch.next_frame();

        self.draw_calls = 0;
        self.render_target_switches = 0;
        self.batch.reset_stats();
        self.frame += 1;

        presented
    }

    /// Blocks until every pending readback and all submitted GPU work completes.
    pub fn wait_idle(&mut self) -> GraphicsResult<()> {
        self.flush_batched_draws()?;
        self.readbacks.wait_all();
        self.backend.wait_idle()
    }

    /// Hands the native objects of dropped handles to the backend.
    fn process_releases(&mut self) {
        for released in self.releases.drain() {
            match &released {
                ReleasedResource::Texture { memory, .. } => {
                    self.texture_count = self.texture_count.saturating_sub(1);
                    self.texture_memory = self.texture_memory.saturating_sub(*memory);
                }
                ReleasedResource::ShaderStage { id, stage, hash } => {
                    self.shader_stages.remove(*stage, *hash, *id);
                }
                _ => {}
            }
            self.backend.release(released);
        }
    }

    fn update_temporary_resources(&mut self) {
        let textures = self.temporary_textures.update();
        let buffers = self.temporary_buffers.update();
        if !textures.is_empty() || !buffers.is_empty() {
            debug!(
                "Evicted {} temporary textures and {} temporary buffers",
                textures.len(),
                buffers.len()
            );
        }
    }

    fn state(&self) -> &DisplayState {
        // The stack never shrinks below one entry.
        &self.states[self.states.len() - 1]
    }

    fn state_mut(&mut self) -> &mut DisplayState {
        let last = self.states.len() - 1;
        &mut self.states[last]
    }
}

impl<B: GraphicsBackend> Drop for Graphics<B> {
    fn drop(&mut self) {
        if let Err(err) = self.backend.wait_idle() {
            warn!("Failed to wait for the GPU during shutdown: {}", err);
        }
        self.readbacks.wait_all();
        for screenshot in self.screenshots.drain(..) {
            screenshot.fail("The graphics module was dropped before the frame was presented.");
        }

        self.bound_temporary = None;
        drop(self.temporary_textures.clear());
        drop(self.temporary_buffers.clear());
        self.states.truncate(1);
        *self.state_mut() = DisplayState::default();
        self.shader_stages.clear();
        self.process_releases();
    }
}
