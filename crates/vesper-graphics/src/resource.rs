//! Shared-ownership handles for GPU resources.
//!
//! Handles are cheap to clone. When the last clone of a handle is dropped
//! its id is pushed onto the owning [`ReleaseQueue`]; the graphics module
//! forwards queued ids to the backend at the next frame boundary, which in
//! turn defers destruction until the GPU can no longer reference the object.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::pixel_format::PixelFormat;
use crate::types::{BufferDataUsage, BufferUsage, IndexFormat, SamplerState, ShaderStageType, StandardShader, TextureType};

/// Stable identity of a resource for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ResourceId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A resource whose last handle has been dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum ReleasedResource {
    Texture { id: ResourceId, memory: u64 },
    Buffer { id: ResourceId },
    StreamBuffer { id: ResourceId },
    ShaderStage { id: ResourceId, stage: ShaderStageType, hash: u64 },
    Shader { id: ResourceId },
}

impl ReleasedResource {
    pub fn id(&self) -> ResourceId {
        match self {
            ReleasedResource::Texture { id, .. }
            | ReleasedResource::Buffer { id }
            | ReleasedResource::StreamBuffer { id }
            | ReleasedResource::ShaderStage { id, .. }
            | ReleasedResource::Shader { id } => *id,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReleaseQueue(Arc<Mutex<Vec<ReleasedResource>>>);

impl ReleaseQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, resource: ReleasedResource) {
        self.0.lock().push(resource);
    }

    pub fn drain(&self) -> Vec<ReleasedResource> {
        std::mem::take(&mut *self.0.lock())
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureSettings {
    pub texture_type: TextureType,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Depth for volume textures, layer count for arrays, 1 otherwise.
    pub layers: u32,
    pub mipmaps: u32,
    pub msaa: u32,
    pub render_target: bool,
    pub readable: bool,
    pub compute_write: bool,
    pub sampler: SamplerState,
    pub label: Option<String>,
}

impl Default for TextureSettings {
    fn default() -> Self {
        Self {
            texture_type: TextureType::D2,
            format: PixelFormat::Rgba8Unorm,
            width: 1,
            height: 1,
            layers: 1,
            mipmaps: 1,
            msaa: 1,
            render_target: false,
            readable: true,
            compute_write: false,
            sampler: SamplerState::default(),
            label: None,
        }
    }
}

impl TextureSettings {
    pub fn render_target(format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            format,
            width,
            height,
            render_target: true,
            readable: !format.is_depth_stencil(),
            ..Default::default()
        }
    }

    /// Number of slices addressable at `mipmap`.
    pub fn slice_count(&self, mipmap: u32) -> u32 {
        match self.texture_type {
            TextureType::D2 => 1,
            TextureType::Cube => 6,
            TextureType::Array => self.layers,
            TextureType::Volume => (self.layers >> mipmap).max(1),
        }
    }

    pub fn pixel_width(&self, mipmap: u32) -> u32 {
        (self.width >> mipmap).max(1)
    }

    pub fn pixel_height(&self, mipmap: u32) -> u32 {
        (self.height >> mipmap).max(1)
    }

    /// Estimated GPU memory across all mipmaps and slices.
    pub fn memory_size(&self) -> u64 {
        let slices = match self.texture_type {
            TextureType::Cube => 6,
            TextureType::D2 => 1,
            TextureType::Array | TextureType::Volume => self.layers as u64,
        };
        let mut total = 0;
        for mip in 0..self.mipmaps.max(1) {
            total += self.format.slice_size(self.pixel_width(mip), self.pixel_height(mip));
        }
        total * slices * self.msaa.max(1) as u64
    }
}

#[derive(Debug)]
struct TextureInner {
    id: ResourceId,
    settings: TextureSettings,
    release: ReleaseQueue,
}

impl Drop for TextureInner {
    fn drop(&mut self) {
        self.release.push(ReleasedResource::Texture {
            id: self.id,
            memory: self.settings.memory_size(),
        });
    }
}

/// Reference-counted texture handle. Equality is identity.
#[derive(Debug, Clone)]
pub struct Texture(Arc<TextureInner>);

impl Texture {
    pub(crate) fn new(settings: TextureSettings, release: ReleaseQueue) -> Self {
        Texture(Arc::new(TextureInner {
            id: ResourceId::next(),
            settings,
            release,
        }))
    }

    pub fn id(&self) -> ResourceId {
        self.0.id
    }

    pub fn settings(&self) -> &TextureSettings {
        &self.0.settings
    }

    pub fn format(&self) -> PixelFormat {
        self.0.settings.format
    }

    pub fn texture_type(&self) -> TextureType {
        self.0.settings.texture_type
    }

    pub fn pixel_width(&self, mipmap: u32) -> u32 {
        self.0.settings.pixel_width(mipmap)
    }

    pub fn pixel_height(&self, mipmap: u32) -> u32 {
        self.0.settings.pixel_height(mipmap)
    }

    pub fn mipmap_count(&self) -> u32 {
        self.0.settings.mipmaps.max(1)
    }

    pub fn msaa(&self) -> u32 {
        self.0.settings.msaa.max(1)
    }

    pub fn is_render_target(&self) -> bool {
        self.0.settings.render_target
    }

    pub fn is_readable(&self) -> bool {
        self.0.settings.readable
    }

    pub fn is_valid_slice(&self, slice: u32, mipmap: u32) -> bool {
        slice < self.0.settings.slice_count(mipmap)
    }
}

impl PartialEq for Texture {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Texture {}

#[derive(Debug, Clone, PartialEq)]
pub struct BufferSettings {
    pub size: u64,
    pub usage: BufferUsage,
    pub data_usage: BufferDataUsage,
    /// Element format when used as an index buffer.
    pub index_format: Option<IndexFormat>,
    /// Contents can never change after creation.
    pub immutable: bool,
    pub label: Option<String>,
}

impl BufferSettings {
    pub fn new(size: u64, usage: BufferUsage, data_usage: BufferDataUsage) -> Self {
        Self {
            size,
            usage,
            data_usage,
            index_format: None,
            immutable: false,
            label: None,
        }
    }
}

#[derive(Debug)]
struct BufferInner {
    id: ResourceId,
    settings: BufferSettings,
    release: ReleaseQueue,
}

impl Drop for BufferInner {
    fn drop(&mut self) {
        self.release.push(ReleasedResource::Buffer { id: self.id });
    }
}

#[derive(Debug, Clone)]
pub struct Buffer(Arc<BufferInner>);

impl Buffer {
    pub(crate) fn new(settings: BufferSettings, release: ReleaseQueue) -> Self {
        Buffer(Arc::new(BufferInner {
            id: ResourceId::next(),
            settings,
            release,
        }))
    }

    pub fn id(&self) -> ResourceId {
        self.0.id
    }

    pub fn settings(&self) -> &BufferSettings {
        &self.0.settings
    }

    pub fn size(&self) -> u64 {
        self.0.settings.size
    }

    pub fn usage(&self) -> BufferUsage {
        self.0.settings.usage
    }

    pub fn data_usage(&self) -> BufferDataUsage {
        self.0.settings.data_usage
    }

    pub fn is_immutable(&self) -> bool {
        self.0.settings.immutable
    }

    /// Number of indices stored when used as an index buffer.
    pub fn index_count(&self) -> u64 {
        match self.0.settings.index_format {
            Some(format) => self.size() / format.size() as u64,
            None => 0,
        }
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Buffer {}

#[derive(Debug)]
pub(crate) struct ShaderStageInner {
    id: ResourceId,
    stage: ShaderStageType,
    hash: u64,
    release: ReleaseQueue,
}

impl Drop for ShaderStageInner {
    fn drop(&mut self) {
        self.release.push(ReleasedResource::ShaderStage {
            id: self.id,
            stage: self.stage,
            hash: self.hash,
        });
    }
}

/// A compiled shader stage. Identical sources may share one stage object.
#[derive(Debug, Clone)]
pub struct ShaderStage(pub(crate) Arc<ShaderStageInner>);

impl ShaderStage {
    pub(crate) fn new(stage: ShaderStageType, hash: u64, release: ReleaseQueue) -> Self {
        ShaderStage(Arc::new(ShaderStageInner {
            id: ResourceId::next(),
            stage,
            hash,
            release,
        }))
    }

    pub fn id(&self) -> ResourceId {
        self.0.id
    }

    pub fn stage(&self) -> ShaderStageType {
        self.0.stage
    }

    pub fn source_hash(&self) -> u64 {
        self.0.hash
    }

    pub(crate) fn downgrade(&self) -> std::sync::Weak<ShaderStageInner> {
        Arc::downgrade(&self.0)
    }
}

impl PartialEq for ShaderStage {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShaderStages {
    pub vertex: Option<ShaderStage>,
    pub pixel: Option<ShaderStage>,
    pub compute: Option<ShaderStage>,
}

impl ShaderStages {
    pub fn get(&self, stage: ShaderStageType) -> Option<&ShaderStage> {
        match stage {
            ShaderStageType::Vertex => self.vertex.as_ref(),
            ShaderStageType::Pixel => self.pixel.as_ref(),
            ShaderStageType::Compute => self.compute.as_ref(),
        }
    }

    pub fn ids(&self) -> ShaderStageIds {
        ShaderStageIds {
            vertex: self.vertex.as_ref().map(ShaderStage::id),
            pixel: self.pixel.as_ref().map(ShaderStage::id),
            compute: self.compute.as_ref().map(ShaderStage::id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ShaderStageIds {
    pub vertex: Option<ResourceId>,
    pub pixel: Option<ResourceId>,
    pub compute: Option<ResourceId>,
}

#[derive(Debug)]
struct ShaderInner {
    id: ResourceId,
    stages: ShaderStages,
    release: ReleaseQueue,
}

impl Drop for ShaderInner {
    fn drop(&mut self) {
        self.release.push(ReleasedResource::Shader { id: self.id });
    }
}

/// A linked shader program. Keeps its stages alive.
#[derive(Debug, Clone)]
pub struct Shader(Arc<ShaderInner>);

impl Shader {
    pub(crate) fn new(stages: ShaderStages, release: ReleaseQueue) -> Self {
        Shader(Arc::new(ShaderInner {
            id: ResourceId::next(),
            stages,
            release,
        }))
    }

    pub fn id(&self) -> ResourceId {
        self.0.id
    }

    pub fn stages(&self) -> &ShaderStages {
        &self.0.stages
    }

    pub fn has_stage(&self, stage: ShaderStageType) -> bool {
        self.0.stages.get(stage).is_some()
    }

    pub fn is_compute(&self) -> bool {
        self.has_stage(ShaderStageType::Compute)
    }
}

impl PartialEq for Shader {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

/// Which program a draw runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderBinding {
    Standard(StandardShader),
    Custom(ResourceId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_pushes_release() {
        let queue = ReleaseQueue::new();
        let texture = Texture::new(TextureSettings::default(), queue.clone());
        let id = texture.id();
        let clone = texture.clone();

        drop(texture);
        assert!(queue.is_empty());

        drop(clone);
        let released = queue.drain();
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].id(), id);
    }

    #[test]
    fn test_texture_slices_and_mips() {
        let mut settings = TextureSettings::render_target(PixelFormat::Rgba8Unorm, 64, 32);
        settings.mipmaps = 3;
        assert_eq!(settings.pixel_width(2), 16);
        assert_eq!(settings.pixel_height(6), 1);
        assert_eq!(settings.slice_count(0), 1);

        settings.texture_type = TextureType::Volume;
        settings.layers = 8;
        assert_eq!(settings.slice_count(1), 4);
        assert_eq!(settings.memory_size(), (64 * 32 + 32 * 16 + 16 * 8) * 4 * 8);
    }

    #[test]
    fn test_index_count() {
        let mut settings = BufferSettings::new(120, BufferUsage::INDEX, BufferDataUsage::Static);
        settings.index_format = Some(IndexFormat::U16);
        let queue = ReleaseQueue::new();
        assert_eq!(Buffer::new(settings, queue).index_count(), 60);
    }
}
