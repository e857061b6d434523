//! Startup configuration for [`crate::Graphics`].

use crate::backend::BackendKind;

/// Environment variable holding a comma separated backend preference list.
pub const BACKENDS_ENV: &str = "VESPER_GRAPHICS_BACKENDS";
/// Environment variable that enables backend validation when set to `1` or `true`.
pub const DEBUG_ENV: &str = "VESPER_GRAPHICS_DEBUG";

/// Configuration for creating a graphics module.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsConfig {
    /// Backends to try, in order. The first that initializes is used.
    pub backends: Vec<BackendKind>,
    /// Frames the CPU may record ahead of the GPU.
    pub frames_in_flight: u32,
    pub vsync: bool,
    /// Backbuffer sample count.
    pub msaa: u32,
    /// Use an sRGB backbuffer and linearize vertex colors.
    pub gamma_correct: bool,
    /// Whether the backbuffer has depth and stencil attachments.
    pub depth_stencil: bool,
    /// Upper bound on nested `push` calls.
    pub max_stack_depth: usize,
    /// Frames a checked-in temporary resource survives before it is destroyed.
    pub temporary_idle_frames: u32,
    /// Frames an unused pipeline or framebuffer survives in the backend caches.
    pub cache_idle_frames: u32,
    /// Initial per-frame size of the batched vertex streams, in bytes.
    pub vertex_stream_size: usize,
    /// Initial per-frame size of the batched index stream, in bytes.
    pub index_stream_size: usize,
    /// Request validation layers and debug labels.
    pub debug: bool,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            backends: vec![BackendKind::OpenGl, BackendKind::Wgpu],
            frames_in_flight: 2,
            vsync: true,
            msaa: 1,
            gamma_correct: false,
            depth_stencil: true,
            max_stack_depth: 128,
            temporary_idle_frames: 16,
            cache_idle_frames: 120,
            vertex_stream_size: 1024 * 1024,
            index_stream_size: 64 * 1024,
            debug: false,
        }
    }
}

impl GraphicsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `VESPER_GRAPHICS_BACKENDS` and `VESPER_GRAPHICS_DEBUG`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(list) = lookup(BACKENDS_ENV) {
            let mut backends = Vec::new();
            for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                match BackendKind::from_name(&name.to_ascii_lowercase()) {
                    Some(kind) if !backends.contains(&kind) => backends.push(kind),
                    Some(_) => {}
                    None => tracing::warn!("Ignoring unknown backend '{}' in {}", name, BACKENDS_ENV),
                }
            }
            if !backends.is_empty() {
                config.backends = backends;
            }
        }

        if let Some(value) = lookup(DEBUG_ENV) {
            config.debug = matches!(value.trim(), "1" | "true" | "TRUE" | "yes");
        }

        config
    }

    pub fn backends(mut self, backends: impl Into<Vec<BackendKind>>) -> Self {
        self.backends = backends.into();
        self
    }

    pub fn frames_in_flight(mut self, frames: u32) -> Self {
        self.frames_in_flight = frames.max(1);
        self
    }

    pub fn vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    pub fn msaa(mut self, samples: u32) -> Self {
        self.msaa = samples.max(1);
        self
    }

    pub fn gamma_correct(mut self, enabled: bool) -> Self {
        self.gamma_correct = enabled;
        self
    }

    pub fn depth_stencil(mut self, enabled: bool) -> Self {
        self.depth_stencil = enabled;
        self
    }

    pub fn max_stack_depth(mut self, depth: usize) -> Self {
        self.max_stack_depth = depth.max(1);
        self
    }

    pub fn temporary_idle_frames(mut self, frames: u32) -> Self {
        self.temporary_idle_frames = frames;
        self
    }

    pub fn cache_idle_frames(mut self, frames: u32) -> Self {
        self.cache_idle_frames = frames;
        self
    }

    pub fn stream_buffer_sizes(mut self, vertex: usize, index: usize) -> Self {
        self.vertex_stream_size = vertex;
        self.index_stream_size = index;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GraphicsConfig::default();
        assert_eq!(config.backends, vec![BackendKind::OpenGl, BackendKind::Wgpu]);
        assert_eq!(config.frames_in_flight, 2);
        assert_eq!(config.max_stack_depth, 128);
        assert_eq!(config.temporary_idle_frames, 16);
    }

    #[test]
    fn test_builder_clamps() {
        let config = GraphicsConfig::new().frames_in_flight(0).msaa(0);
        assert_eq!(config.frames_in_flight, 1);
        assert_eq!(config.msaa, 1);
    }

    #[test]
    fn test_env_backend_list() {
        let config = GraphicsConfig::from_lookup(|key| match key {
            BACKENDS_ENV => Some("WGPU, vulkan ,wgpu".to_string()),
            DEBUG_ENV => Some("1".to_string()),
            _ => None,
        });
        assert_eq!(config.backends, vec![BackendKind::Wgpu]);
        assert!(config.debug);

        let fallback = GraphicsConfig::from_lookup(|key| (key == BACKENDS_ENV).then(|| "metal".to_string()));
        assert_eq!(fallback.backends, GraphicsConfig::default().backends);
    }
}
