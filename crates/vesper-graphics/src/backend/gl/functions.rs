//! Per-operation implementation choices, resolved once at startup.
//!
//! Several operations have a preferred entry point that only exists on newer
//! contexts or with an extension, plus an older fallback. Instead of branching
//! on version strings at every call, [`GlFunctions::resolve`] picks one path
//! per operation and the backend matches on the stored choice.

use super::features::GlFeatureSet;
use super::vendor::DriverBugs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureAlloc {
    /// Immutable storage (`glTexStorage*`).
    Storage,
    /// Per-level `glTexImage*`.
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSync {
    /// `glFenceSync` + `glClientWaitSync`.
    Fence,
    /// `glFinish`, for drivers where client waits stall.
    Finish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferCopy {
    /// `glCopyBufferSubData`.
    CopySubData,
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelReadback {
    /// `glReadPixels` into a pixel pack buffer, fenced.
    PackBuffer,
    /// Synchronous `glReadPixels` into client memory.
    Direct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearDepth {
    /// `glClearDepthf`, the only variant on ES.
    Float,
    /// `glClearDepth` with a double.
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlFunctions {
    pub texture_alloc: TextureAlloc,
    pub frame_sync: FrameSync,
    pub buffer_copy: BufferCopy,
    pub readback: PixelReadback,
    pub clear_depth: ClearDepth,
    pub instancing: bool,
    pub vertex_arrays: bool,
    pub compute: bool,
}

impl GlFunctions {
    pub fn resolve(features: &GlFeatureSet, bugs: DriverBugs) -> Self {
        let texture_alloc = if features.texture_storage() && !bugs.contains(DriverBugs::TEX_STORAGE_BREAKS_SUB_IMAGE) {
            TextureAlloc::Storage
        } else {
            TextureAlloc::Image
        };

        let frame_sync = if features.sync_objects() && !bugs.contains(DriverBugs::CLIENT_WAIT_SYNC_STALLS) {
            FrameSync::Fence
        } else {
            FrameSync::Finish
        };

        let buffer_copy = if features.copy_buffer() {
            BufferCopy::CopySubData
        } else {
            BufferCopy::Unsupported
        };

        let readback = if features.pixel_buffer_objects() && features.sync_objects() {
            PixelReadback::PackBuffer
        } else {
            PixelReadback::Direct
        };

        let clear_depth = if features.es || features.gl(4, 1) {
            ClearDepth::Float
        } else {
            ClearDepth::Double
        };

        Self {
            texture_alloc,
            frame_sync,
            buffer_copy,
            readback,
            clear_depth,
            instancing: features.instancing(),
            vertex_arrays: features.gl3_class() || features.has_any(&["GL_ARB_vertex_array_object", "GL_OES_vertex_array_object"]),
            compute: features.compute(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modern_desktop() {
        let f = GlFunctions::resolve(&GlFeatureSet::desktop(4, 5), DriverBugs::empty());
        assert_eq!(f.texture_alloc, TextureAlloc::Storage);
        assert_eq!(f.frame_sync, FrameSync::Fence);
        assert_eq!(f.buffer_copy, BufferCopy::CopySubData);
        assert_eq!(f.readback, PixelReadback::PackBuffer);
        assert_eq!(f.clear_depth, ClearDepth::Float);
        assert!(f.compute);
    }

    #[test]
    fn test_driver_bugs_select_fallbacks() {
        let features = GlFeatureSet::desktop(4, 2);
        let bugs = DriverBugs::CLIENT_WAIT_SYNC_STALLS | DriverBugs::TEX_STORAGE_BREAKS_SUB_IMAGE;
        let f = GlFunctions::resolve(&features, bugs);
        assert_eq!(f.frame_sync, FrameSync::Finish);
        assert_eq!(f.texture_alloc, TextureAlloc::Image);
    }

    #[test]
    fn test_legacy_context() {
        let f = GlFunctions::resolve(&GlFeatureSet::desktop(2, 1), DriverBugs::empty());
        assert_eq!(f.buffer_copy, BufferCopy::Unsupported);
        assert_eq!(f.readback, PixelReadback::Direct);
        assert_eq!(f.clear_depth, ClearDepth::Double);
        assert!(!f.vertex_arrays);
        assert!(!f.instancing);
    }
}
