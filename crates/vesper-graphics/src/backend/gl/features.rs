//! OpenGL version and extension availability.

use vesper_core::alloc::HashSet;

/// What the current context supports, probed once at startup.
///
/// All format and function decisions in the GL backend are pure functions
/// of this set, so they can be tested without a context.
#[derive(Debug, Clone, Default)]
pub struct GlFeatureSet {
    pub major: u32,
    pub minor: u32,
    /// OpenGL ES rather than desktop GL.
    pub es: bool,
    pub core_profile: bool,
    extensions: HashSet<String>,
}

impl GlFeatureSet {
    pub fn desktop(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            es: false,
            core_profile: major > 3 || (major == 3 && minor >= 2),
            extensions: HashSet::default(),
        }
    }

    pub fn gles(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            es: true,
            core_profile: false,
            extensions: HashSet::default(),
        }
    }

    pub fn with_extension(mut self, name: &str) -> Self {
        self.extensions.insert(name.to_string());
        self
    }

    pub fn with_extensions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions.extend(names.into_iter().map(Into::into));
        self
    }

    /// Desktop GL of at least `major.minor`.
    pub fn gl(&self, major: u32, minor: u32) -> bool {
        !self.es && (self.major, self.minor) >= (major, minor)
    }

    /// OpenGL ES of at least `major.minor`.
    pub fn gles_at_least(&self, major: u32, minor: u32) -> bool {
        self.es && (self.major, self.minor) >= (major, minor)
    }

    pub fn has(&self, extension: &str) -> bool {
        self.extensions.contains(extension)
    }

    pub fn has_any(&self, extensions: &[&str]) -> bool {
        extensions.iter().any(|e| self.has(e))
    }

    pub fn has_all(&self, extensions: &[&str]) -> bool {
        extensions.iter().all(|e| self.has(e))
    }

    /// GL 3.0 / ES 3.0 class hardware.
    pub fn gl3_class(&self) -> bool {
        self.gl(3, 0) || self.gles_at_least(3, 0)
    }

    pub fn framebuffer_objects(&self) -> bool {
        self.gl3_class() || self.has("GL_ARB_framebuffer_object")
    }

    pub fn texture_rg(&self) -> bool {
        self.gl3_class() || self.has_any(&["GL_ARB_texture_rg", "GL_EXT_texture_rg"])
    }

    pub fn packed_depth_stencil(&self) -> bool {
        self.has_any(&["GL_EXT_packed_depth_stencil", "GL_OES_packed_depth_stencil"])
    }

    pub fn texture_storage(&self) -> bool {
        self.gl(4, 2) || self.gles_at_least(3, 0) || self.has_any(&["GL_ARB_texture_storage", "GL_EXT_texture_storage"])
    }

    pub fn compute(&self) -> bool {
        self.gl(4, 3) || self.gles_at_least(3, 1)
    }

    pub fn sync_objects(&self) -> bool {
        self.gl(3, 2) || self.gles_at_least(3, 0) || self.has("GL_ARB_sync")
    }

    pub fn copy_buffer(&self) -> bool {
        self.gl(3, 1) || self.gles_at_least(3, 0) || self.has("GL_ARB_copy_buffer")
    }

    pub fn pixel_buffer_objects(&self) -> bool {
        self.gl(2, 1) || self.gles_at_least(3, 0) || self.has("GL_ARB_pixel_buffer_object")
    }

    pub fn instancing(&self) -> bool {
        self.gl(3, 3) || self.gles_at_least(3, 0) || self.has("GL_ARB_instanced_arrays")
    }

    pub fn glsl3(&self) -> bool {
        self.gl3_class()
    }

    pub fn glsl4(&self) -> bool {
        self.gl(4, 3) || self.gles_at_least(3, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_checks_respect_api() {
        let es = GlFeatureSet::gles(3, 1);
        assert!(es.gles_at_least(3, 0));
        assert!(!es.gl(3, 0));
        assert!(es.compute());

        let gl = GlFeatureSet::desktop(3, 3);
        assert!(gl.core_profile);
        assert!(gl.gl(3, 2));
        assert!(!gl.gl(4, 0));
        assert!(!gl.compute());
    }

    #[test]
    fn test_extensions_enable_features() {
        let legacy = GlFeatureSet::desktop(2, 1);
        assert!(!legacy.framebuffer_objects());
        assert!(legacy.with_extension("GL_ARB_framebuffer_object").framebuffer_objects());
    }
}
