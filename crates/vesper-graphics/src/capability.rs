//! Feature flags and numeric limits reported by the active backend.
//!
//! A [`Capabilities`] table is produced once by the backend during startup
//! and never changes afterwards. Callers query it before attempting optional
//! operations (buffer copies, multi-format render targets and so on).

use crate::types::{TextureType, named_enum};

named_enum! {
    pub enum Feature {
        MultiRenderTargetFormats => "multirendertargetformats",
        ClampZero => "clampzero",
        ClampOne => "clampone",
        BlendMinMax => "blendminmax",
        Lighten => "lighten",
        FullNpot => "fullnpot",
        PixelShaderHighp => "pixelshaderhighp",
        ShaderDerivatives => "shaderderivatives",
        Glsl3 => "glsl3",
        Glsl4 => "glsl4",
        Instancing => "instancing",
        TexelBuffer => "texelbuffer",
        IndexBuffer32Bit => "indexbuffer32bit",
        CopyBuffer => "copybuffer",
        CopyBufferToTexture => "copybuffertotexture",
        CopyTextureToBuffer => "copytexturetobuffer",
        CopyRenderTargetToBuffer => "copyrendertargettobuffer",
    }
}

named_enum! {
    pub enum SystemLimit {
        PointSize => "pointsize",
        TextureSize => "texturesize",
        TextureLayers => "texturelayers",
        VolumeTextureSize => "volumetexturesize",
        CubeTextureSize => "cubetexturesize",
        TexelBufferSize => "texelbuffersize",
        ShaderStorageBufferSize => "shaderstoragebuffersize",
        ThreadgroupsX => "threadgroupsx",
        ThreadgroupsY => "threadgroupsy",
        ThreadgroupsZ => "threadgroupsz",
        RenderTargets => "rendertargets",
        TextureMsaa => "texturemsaa",
        Anisotropy => "anisotropy",
    }
}

const FEATURE_COUNT: usize = Feature::ALL.len();
const LIMIT_COUNT: usize = SystemLimit::ALL.len();
const TEXTURE_TYPE_COUNT: usize = TextureType::ALL.len();

fn texture_type_index(ty: TextureType) -> usize {
    match ty {
        TextureType::D2 => 0,
        TextureType::Volume => 1,
        TextureType::Array => 2,
        TextureType::Cube => 3,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Capabilities {
    features: [bool; FEATURE_COUNT],
    limits: [f64; LIMIT_COUNT],
    texture_types: [bool; TEXTURE_TYPE_COUNT],
}

impl Capabilities {
    pub fn builder() -> CapabilitiesBuilder {
        CapabilitiesBuilder {
            caps: Capabilities {
                features: [false; FEATURE_COUNT],
                limits: [0.0; LIMIT_COUNT],
                texture_types: [false; TEXTURE_TYPE_COUNT],
            },
        }
    }

    pub fn has(&self, feature: Feature) -> bool {
        self.features[feature as usize]
    }

    pub fn limit(&self, limit: SystemLimit) -> f64 {
        self.limits[limit as usize]
    }

    pub fn supports_texture_type(&self, ty: TextureType) -> bool {
        self.texture_types[texture_type_index(ty)]
    }

    /// Iterates every feature along with its availability.
    pub fn features(&self) -> impl Iterator<Item = (Feature, bool)> + '_ {
        Feature::ALL.iter().map(|f| (*f, self.has(*f)))
    }

    pub fn limits(&self) -> impl Iterator<Item = (SystemLimit, f64)> + '_ {
        SystemLimit::ALL.iter().map(|l| (*l, self.limit(*l)))
    }
}

/// Write-once construction of a [`Capabilities`] table.
#[derive(Debug, Clone)]
pub struct CapabilitiesBuilder {
    caps: Capabilities,
}

impl CapabilitiesBuilder {
    pub fn feature(mut self, feature: Feature, supported: bool) -> Self {
        self.caps.features[feature as usize] = supported;
        self
    }

    pub fn limit(mut self, limit: SystemLimit, value: f64) -> Self {
        self.caps.limits[limit as usize] = value;
        self
    }

    pub fn texture_type(mut self, ty: TextureType, supported: bool) -> Self {
        self.caps.texture_types[texture_type_index(ty)] = supported;
        self
    }

    pub fn build(self) -> Capabilities {
        self.caps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_only_requested_entries() {
        let caps = Capabilities::builder()
            .feature(Feature::CopyBuffer, true)
            .limit(SystemLimit::RenderTargets, 8.0)
            .texture_type(TextureType::D2, true)
            .build();

        assert!(caps.has(Feature::CopyBuffer));
        assert!(!caps.has(Feature::Glsl4));
        assert_eq!(caps.limit(SystemLimit::RenderTargets), 8.0);
        assert_eq!(caps.limit(SystemLimit::TextureSize), 0.0);
        assert!(caps.supports_texture_type(TextureType::D2));
        assert!(!caps.supports_texture_type(TextureType::Cube));
    }

    #[test]
    fn test_feature_names() {
        assert_eq!(Feature::from_name("copytexturetobuffer"), Some(Feature::CopyTextureToBuffer));
        assert_eq!(SystemLimit::ThreadgroupsZ.name(), "threadgroupsz");
        assert_eq!(Feature::ALL.len(), 17);
    }

    #[test]
    fn test_parse_from_str() {
        assert_eq!("rendertargets".parse::<SystemLimit>().unwrap(), SystemLimit::RenderTargets);
        assert_eq!("lighten".parse::<Feature>().unwrap(), Feature::Lighten);

        let err = "bogus".parse::<SystemLimit>().unwrap_err();
        assert!(matches!(err, crate::error::GraphicsError::Usage(_)));
        assert!(err.to_string().starts_with("Invalid SystemLimit 'bogus'"));
    }
}
