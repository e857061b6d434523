//! The screen: a configured surface, or an offscreen texture when headless.

use tracing::{debug, warn};

use crate::error::{GraphicsError, GraphicsResult};

pub struct Swapchain {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    current: Option<(wgpu::SurfaceTexture, wgpu::TextureView)>,
    reconfigurations: u32,
}

impl Swapchain {
    pub fn new(
        surface: wgpu::Surface<'static>,
        adapter: &wgpu::Adapter,
        device: &wgpu::Device,
        (width, height): (u32, u32),
        vsync: bool,
        gamma_correct: bool,
    ) -> GraphicsResult<Self> {
        let capabilities = surface.get_capabilities(adapter);
        let mut config = surface
            .get_default_config(adapter, width.max(1), height.max(1))
            .ok_or_else(|| GraphicsError::unsupported("The surface is not compatible with the adapter."))?;

        if let Some(format) = capabilities
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb() == gamma_correct)
        {
            config.format = format;
        } else {
            warn!(
                "No {} surface format available, using {:?}",
                if gamma_correct { "sRGB" } else { "linear" },
                config.format
            );
        }
        config.present_mode = if vsync {
            wgpu::PresentMode::Fifo
        } else {
            wgpu::PresentMode::AutoNoVsync
        };
        config.usage |= wgpu::TextureUsages::COPY_SRC & capabilities.usages;

        surface.configure(device, &config);
        debug!("Configured surface {}x{} {:?}", config.width, config.height, config.format);

        Ok(Self {
            surface,
            config,
            current: None,
            reconfigurations: 0,
        })
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// How often the surface had to be reconfigured after going stale.
    pub fn reconfigurations(&self) -> u32 {
        self.reconfigurations
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.current = None;
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(device, &self.config);
    }

    /// View of this frame's backbuffer, acquiring it on first use.
    ///
    /// `None` means the frame cannot be shown (minimized window or timeout),
    /// and screen draws should be skipped.
    pub fn acquire(&mut self, device: &wgpu::Device) -> GraphicsResult<Option<&wgpu::TextureView>> {
        if self.current.is_none() {
            let Some(texture) = self.next_texture(device)? else {
                return Ok(None);
            };
            let view = texture.texture.create_view(&wgpu::TextureViewDescriptor::default());
            self.current = Some((texture, view));
        }
        Ok(self.current.as_ref().map(|(_, view)| view))
    }

    fn next_texture(&mut self, device: &wgpu::Device) -> GraphicsResult<Option<wgpu::SurfaceTexture>> {
        let mut retried = false;
        loop {
            match self.surface.get_current_texture() {
                Ok(texture) => {
                    if texture.suboptimal && !retried {
                        drop(texture);
                        self.reconfigure(device);
                        retried = true;
                        continue;
                    }
                    return Ok(Some(texture));
                }
                Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) if !retried => {
                    self.reconfigure(device);
                    retried = true;
                }
                Err(wgpu::SurfaceError::Outdated) | Err(wgpu::SurfaceError::Timeout) => {
                    debug!("Skipping frame: backbuffer unavailable");
                    return Ok(None);
                }
                Err(wgpu::SurfaceError::Lost) => {
                    return Err(GraphicsError::SurfaceLost("reconfiguring did not recover it".into()));
                }
                Err(wgpu::SurfaceError::OutOfMemory) => return Err(GraphicsError::OutOfMemory),
                Err(wgpu::SurfaceError::Other) => {
                    return Err(GraphicsError::SurfaceLost("the surface reported an unknown error".into()));
                }
            }
        }
    }

    fn reconfigure(&mut self, device: &wgpu::Device) {
        self.reconfigurations += 1;
        debug!("Reconfiguring surface ({} so far)", self.reconfigurations);
        self.surface.configure(device, &self.config);
    }

    /// This frame's backbuffer texture, acquiring it on first use.
    pub fn texture(&mut self, device: &wgpu::Device) -> GraphicsResult<Option<wgpu::Texture>> {
        if self.acquire(device)?.is_none() {
            return Ok(None);
        }
        Ok(self.current.as_ref().map(|(texture, _)| texture.texture.clone()))
    }

    /// Whether the backbuffer can be copied from.
    pub fn is_readable(&self) -> bool {
        self.config.usage.contains(wgpu::TextureUsages::COPY_SRC)
    }

    pub fn is_acquired(&self) -> bool {
        self.current.is_some()
    }

    /// Queues the acquired backbuffer for display. The encoder that drew to
    /// it must already have been submitted.
    pub fn present(&mut self) {
        if let Some((texture, view)) = self.current.take() {
            drop(view);
            texture.present();
        }
    }
}

/// A texture standing in for the backbuffer.
pub struct Offscreen {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl Offscreen {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen Backbuffer"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.texture.width(), self.texture.height())
    }
}

pub enum Screen {
    Surface(Swapchain),
    Offscreen(Offscreen),
}

impl Screen {
    pub fn format(&self) -> wgpu::TextureFormat {
        match self {
            Screen::Surface(swapchain) => swapchain.format(),
            Screen::Offscreen(offscreen) => offscreen.texture.format(),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        match self {
            Screen::Surface(swapchain) => swapchain.size(),
            Screen::Offscreen(offscreen) => offscreen.size(),
        }
    }

    /// The backbuffer texture to copy a screenshot from.
    pub fn readable_texture(&mut self, device: &wgpu::Device) -> GraphicsResult<wgpu::Texture> {
        match self {
            Screen::Surface(swapchain) => {
                if !swapchain.is_readable() {
                    return Err(GraphicsError::unsupported("The surface does not support reading back its contents."));
                }
                swapchain
                    .texture(device)?
                    .ok_or_else(|| GraphicsError::backend("The backbuffer is unavailable this frame"))
            }
            Screen::Offscreen(offscreen) => Ok(offscreen.texture.clone()),
        }
    }
}

/// Depth/stencil and multisample attachments that accompany the backbuffer.
#[derive(Default)]
pub struct ScreenAttachments {
    pub depth_stencil: Option<(wgpu::Texture, wgpu::TextureView)>,
    pub msaa: Option<(wgpu::Texture, wgpu::TextureView)>,
}

pub const SCREEN_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

impl ScreenAttachments {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        (width, height): (u32, u32),
        depth_stencil: bool,
        samples: u32,
    ) -> Self {
        let create = |label: &str, format: wgpu::TextureFormat| {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: width.max(1),
                    height: height.max(1),
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: samples.max(1),
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            (texture, view)
        };

        Self {
            depth_stencil: depth_stencil.then(|| create("Screen Depth Stencil", SCREEN_DEPTH_FORMAT)),
            msaa: (samples > 1).then(|| create("Screen MSAA", color_format)),
        }
    }

    pub fn depth_format(&self) -> Option<wgpu::TextureFormat> {
        self.depth_stencil.as_ref().map(|_| SCREEN_DEPTH_FORMAT)
    }
}
