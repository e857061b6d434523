//! Enumerations shared by the state engine and the backends.
//!
//! Every caller-visible enum has a stable lowercase name so that scripting
//! layers and configuration files can refer to it by string.

use bitflags::bitflags;

/// Declares a fieldless enum together with `name`, `from_name` and `ALL`.
macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $str:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $str),+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($str => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::GraphicsError;

            fn from_str(s: &str) -> $crate::error::GraphicsResult<Self> {
                $name::from_name(s).ok_or_else(|| {
                    $crate::error::GraphicsError::Usage(format!(
                        "Invalid {} '{}', expected one of: {}",
                        stringify!($name),
                        s,
                        $name::ALL.iter().map(|v| v.name()).collect::<Vec<_>>().join(", ")
                    ))
                })
            }
        }
    };
}

pub(crate) use named_enum;

named_enum! {
    /// What a `push` captures.
    pub enum StackType {
        All => "all",
        Transform => "transform",
    }
}

named_enum! {
    pub enum DrawMode {
        Line => "line",
        Fill => "fill",
    }
}

named_enum! {
    pub enum ArcMode {
        Open => "open",
        Closed => "closed",
        Pie => "pie",
    }
}

named_enum! {
    pub enum LineStyle {
        Rough => "rough",
        Smooth => "smooth",
    }
}

named_enum! {
    pub enum LineJoin {
        None => "none",
        Miter => "miter",
        Bevel => "bevel",
    }
}

named_enum! {
    pub enum CullMode {
        None => "none",
        Back => "back",
        Front => "front",
    }
}

named_enum! {
    /// Front-face vertex winding.
    pub enum Winding {
        Cw => "cw",
        Ccw => "ccw",
    }
}

named_enum! {
    pub enum CompareMode {
        Less => "less",
        LessEqual => "lequal",
        Equal => "equal",
        GreaterEqual => "gequal",
        Greater => "greater",
        NotEqual => "notequal",
        Always => "always",
        Never => "never",
    }
}

impl CompareMode {
    /// The mode with its operands swapped, so `a OP b` becomes `b OP' a`.
    pub fn reversed(self) -> CompareMode {
        match self {
            CompareMode::Less => CompareMode::Greater,
            CompareMode::LessEqual => CompareMode::GreaterEqual,
            CompareMode::Greater => CompareMode::Less,
            CompareMode::GreaterEqual => CompareMode::LessEqual,
            other => other,
        }
    }
}

named_enum! {
    pub enum StencilAction {
        Keep => "keep",
        Zero => "zero",
        Replace => "replace",
        Increment => "increment",
        Decrement => "decrement",
        IncrementWrap => "incrementwrap",
        DecrementWrap => "decrementwrap",
        Invert => "invert",
    }
}

named_enum! {
    pub enum PrimitiveType {
        Triangles => "triangles",
        TriangleStrip => "strip",
        TriangleFan => "fan",
        Points => "points",
    }
}

named_enum! {
    /// How indices are generated for a batched draw.
    pub enum TriangleIndexMode {
        None => "none",
        Strip => "strip",
        Fan => "fan",
        Quads => "quads",
    }
}

named_enum! {
    /// Built-in shader used when no custom shader is active.
    pub enum StandardShader {
        Default => "default",
        Points => "points",
    }
}

named_enum! {
    pub enum ShaderStageType {
        Vertex => "vertex",
        Pixel => "pixel",
        Compute => "compute",
    }
}

impl ShaderStageType {
    pub(crate) fn index(self) -> usize {
        match self {
            ShaderStageType::Vertex => 0,
            ShaderStageType::Pixel => 1,
            ShaderStageType::Compute => 2,
        }
    }
}

named_enum! {
    pub enum TextureType {
        D2 => "2d",
        Volume => "volume",
        Array => "array",
        Cube => "cube",
    }
}

named_enum! {
    /// How often buffer contents are expected to change.
    pub enum BufferDataUsage {
        Static => "static",
        Dynamic => "dynamic",
        Stream => "stream",
        Readback => "readback",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    U16,
    U32,
}

impl IndexFormat {
    pub fn size(self) -> usize {
        match self {
            IndexFormat::U16 => 2,
            IndexFormat::U32 => 4,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorChannelMask: u8 {
        const RED = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE = 1 << 2;
        const ALPHA = 1 << 3;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u16 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const TEXEL = 1 << 2;
        const SHADER_STORAGE = 1 << 3;
        const INDIRECT_ARGUMENTS = 1 << 4;
        const COPY_SOURCE = 1 << 5;
        const COPY_DEST = 1 << 6;
    }
}

/// Vertex layouts used by batched draws.
///
/// Attribute locations are fixed: position at 0, texture coordinates at 1
/// and color at 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CommonFormat {
    #[default]
    None,
    /// `[f32; 2]` position.
    Xy,
    /// `[f32; 3]` position.
    Xyz,
    /// RGBA8 color.
    Rgba8,
    /// `[f32; 2]` texture coordinates followed by RGBA8 color.
    StRgba8,
    XySt,
    XyStRgba8,
    XyzStRgba8,
}

impl CommonFormat {
    pub fn stride(self) -> usize {
        match self {
            CommonFormat::None => 0,
            CommonFormat::Xy => 8,
            CommonFormat::Xyz => 12,
            CommonFormat::Rgba8 => 4,
            CommonFormat::StRgba8 => 12,
            CommonFormat::XySt => 16,
            CommonFormat::XyStRgba8 => 20,
            CommonFormat::XyzStRgba8 => 24,
        }
    }

    /// Number of position components, zero when absent.
    pub fn position_components(self) -> u32 {
        match self {
            CommonFormat::Xy | CommonFormat::XySt | CommonFormat::XyStRgba8 => 2,
            CommonFormat::Xyz | CommonFormat::XyzStRgba8 => 3,
            _ => 0,
        }
    }

    pub fn has_texcoord(self) -> bool {
        matches!(
            self,
            CommonFormat::StRgba8 | CommonFormat::XySt | CommonFormat::XyStRgba8 | CommonFormat::XyzStRgba8
        )
    }

    pub fn has_color(self) -> bool {
        matches!(
            self,
            CommonFormat::Rgba8 | CommonFormat::StRgba8 | CommonFormat::XyStRgba8 | CommonFormat::XyzStRgba8
        )
    }

    /// Byte offsets of (position, texcoord, color) within one vertex.
    pub fn attribute_offsets(self) -> (Option<usize>, Option<usize>, Option<usize>) {
        let pos = (self.position_components() > 0).then_some(0);
        let pos_size = self.position_components() as usize * 4;
        let st = self.has_texcoord().then_some(pos_size);
        let color = self
            .has_color()
            .then_some(pos_size + if self.has_texcoord() { 8 } else { 0 });
        (pos, st, color)
    }
}

pub const ATTRIB_POSITION: u32 = 0;
pub const ATTRIB_TEXCOORD: u32 = 1;
pub const ATTRIB_COLOR: u32 = 2;

named_enum! {
    pub enum FilterMode {
        Nearest => "nearest",
        Linear => "linear",
    }
}

named_enum! {
    pub enum MipmapFilterMode {
        None => "none",
        Nearest => "nearest",
        Linear => "linear",
    }
}

named_enum! {
    pub enum WrapMode {
        Clamp => "clamp",
        ClampZero => "clampzero",
        ClampOne => "clampone",
        Repeat => "repeat",
        MirroredRepeat => "mirroredrepeat",
    }
}

/// Texture sampling parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerState {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub mipmap_filter: MipmapFilterMode,
    pub wrap_u: WrapMode,
    pub wrap_v: WrapMode,
    pub wrap_w: WrapMode,
    pub lod_bias: f32,
    pub max_anisotropy: u8,
    pub min_lod: f32,
    pub max_lod: f32,
    /// Depth comparison for shadow samplers.
    pub depth_compare: Option<CompareMode>,
}

impl Default for SamplerState {
    fn default() -> Self {
        Self {
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            mipmap_filter: MipmapFilterMode::None,
            wrap_u: WrapMode::Clamp,
            wrap_v: WrapMode::Clamp,
            wrap_w: WrapMode::Clamp,
            lod_bias: 0.0,
            max_anisotropy: 1,
            min_lod: 0.0,
            max_lod: 1000.0,
            depth_compare: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilState {
    pub action: StencilAction,
    pub compare: CompareMode,
    pub value: i32,
    pub read_mask: u32,
    pub write_mask: u32,
}

impl Default for StencilState {
    fn default() -> Self {
        Self {
            action: StencilAction::Keep,
            compare: CompareMode::Always,
            value: 0,
            read_mask: u32::MAX,
            write_mask: u32::MAX,
        }
    }
}

impl StencilState {
    /// Whether drawing with this state touches the stencil buffer at all.
    pub fn is_active(&self) -> bool {
        self.action != StencilAction::Keep || self.compare != CompareMode::Always
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthState {
    pub compare: CompareMode,
    pub write: bool,
}

impl Default for DepthState {
    fn default() -> Self {
        Self {
            compare: CompareMode::Always,
            write: false,
        }
    }
}

impl DepthState {
    pub fn is_active(&self) -> bool {
        self.compare != CompareMode::Always || self.write
    }
}
