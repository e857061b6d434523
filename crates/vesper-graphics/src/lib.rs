//! Vesper Graphics - backend-agnostic 2D graphics state and batching
//!
//! This crate sits between drawing code and a GPU API:
//! - A state stack (`push`/`pop`) and a transform stack with pixel-scale tracking
//! - Automatic batching of small draws into shared streaming buffers
//! - Render target validation and pooled temporary depth/stencil attachments
//! - Reference-counted resource handles with deferred destruction
//! - Shader stage deduplication and GPU readbacks
//!
//! Two backends are included: a stateful OpenGL backend on `glow` and an
//! explicit backend on `wgpu`. [`Backend::create`] tries them in the order
//! given by [`GraphicsConfig::backends`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vesper_core::color::Color;
//! use vesper_graphics::{DrawMode, Graphics, GraphicsConfig};
//!
//! # fn main() -> vesper_graphics::GraphicsResult<()> {
//! let mut graphics = Graphics::headless(GraphicsConfig::default(), 640, 480)?;
//! graphics.clear_all(Color::BLACK)?;
//! graphics.set_color(Color::new(0.2, 0.6, 1.0, 1.0))?;
//! graphics.circle(DrawMode::Fill, 320.0, 240.0, 100.0)?;
//! graphics.present()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - `wgpu` (default): the explicit backend
//! - `opengl` (default): the stateful backend
//! - `winit`: [`SurfaceProvider`] for `Arc<winit::window::Window>`

pub mod backend;
pub mod batched;
pub mod blend;
pub mod capability;
pub mod config;
pub mod error;
pub mod graphics;
pub mod pixel_format;
pub mod polyline;
pub mod readback;
pub mod render_target;
pub mod resource;
pub mod shader_cache;
pub mod shapes;
pub mod state;
pub mod stream_buffer;
pub mod temporary;
pub mod transform;
pub mod types;

#[cfg(any(feature = "opengl", feature = "wgpu"))]
pub use backend::{Backend, SurfaceProvider};
pub use backend::{BackendKind, ComputeBindings, GraphicsBackend, RendererInfo};
pub use batched::{BatchedDrawCommand, BatchedVertexData, TexturedVertex};
pub use blend::{BlendAlpha, BlendMode, BlendState};
pub use capability::{Capabilities, Feature, SystemLimit};
pub use config::GraphicsConfig;
pub use error::{GraphicsError, GraphicsResult};
pub use graphics::{Graphics, ShaderSources, Stats, TextureRegion};
pub use pixel_format::{PixelFormat, PixelFormatUsage};
pub use readback::{Readback, ReadbackMethod, ReadbackStatus};
pub use resource::{Buffer, BufferSettings, ResourceId, Shader, Texture, TextureSettings};
pub use shader_cache::ShaderCompileOptions;
pub use state::{DisplayState, FontRef, RenderTarget, RenderTargets, TemporaryRtFlags};
pub use types::*;
