//! Backend-independent pixel formats and their properties.

use bitflags::bitflags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    R8Unorm,
    R8Int,
    R8Uint,
    R16Unorm,
    R16Float,
    R16Int,
    R16Uint,
    R32Float,
    R32Int,
    R32Uint,

    Rg8Unorm,
    Rg8Int,
    Rg8Uint,
    /// Luminance-alpha, stored as two channels.
    La8Unorm,
    Rg16Unorm,
    Rg16Float,
    Rg16Int,
    Rg16Uint,
    Rg32Float,
    Rg32Int,
    Rg32Uint,

    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba8Int,
    Rgba8Uint,
    Rgba16Unorm,
    Rgba16Float,
    Rgba16Int,
    Rgba16Uint,
    Rgba32Float,
    Rgba32Int,
    Rgba32Uint,

    Rgba4Unorm,
    Rgb5a1Unorm,
    Rgb565Unorm,
    Rgb10a2Unorm,
    Rg11b10Float,

    Stencil8,
    Depth16Unorm,
    Depth24Unorm,
    Depth32Float,
    Depth24UnormStencil8,
    Depth32FloatStencil8,

    Dxt1Unorm,
    Dxt3Unorm,
    Dxt5Unorm,
    Bc4Unorm,
    Bc5Unorm,
    Bc7Unorm,
    Etc2RgbUnorm,
    Astc4x4Unorm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormatType {
    Unorm,
    Float,
    Int,
    Uint,
}

/// Static description of a pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormatInfo {
    pub components: u8,
    pub block_width: u8,
    pub block_height: u8,
    /// Bytes per block (a block is one pixel for uncompressed formats).
    pub block_size: u8,
    pub data_type: PixelFormatType,
    pub color: bool,
    pub depth: bool,
    pub stencil: bool,
    pub compressed: bool,
}

const fn color(components: u8, block_size: u8, data_type: PixelFormatType) -> PixelFormatInfo {
    PixelFormatInfo {
        components,
        block_width: 1,
        block_height: 1,
        block_size,
        data_type,
        color: true,
        depth: false,
        stencil: false,
        compressed: false,
    }
}

const fn depth_stencil(block_size: u8, depth: bool, stencil: bool, data_type: PixelFormatType) -> PixelFormatInfo {
    PixelFormatInfo {
        components: depth as u8 + stencil as u8,
        block_width: 1,
        block_height: 1,
        block_size,
        data_type,
        color: false,
        depth,
        stencil,
        compressed: false,
    }
}

const fn compressed(components: u8, block: u8, block_size: u8) -> PixelFormatInfo {
    PixelFormatInfo {
        components,
        block_width: block,
        block_height: block,
        block_size,
        data_type: PixelFormatType::Unorm,
        color: true,
        depth: false,
        stencil: false,
        compressed: true,
    }
}

impl PixelFormat {
    pub fn info(self) -> PixelFormatInfo {
        use PixelFormat::*;
        use PixelFormatType::{Float, Int, Uint, Unorm};

        match self {
            R8Unorm => color(1, 1, Unorm),
            R8Int => color(1, 1, Int),
            R8Uint => color(1, 1, Uint),
            R16Unorm => color(1, 2, Unorm),
            R16Float => color(1, 2, Float),
            R16Int => color(1, 2, Int),
            R16Uint => color(1, 2, Uint),
            R32Float => color(1, 4, Float),
            R32Int => color(1, 4, Int),
            R32Uint => color(1, 4, Uint),

            Rg8Unorm | La8Unorm => color(2, 2, Unorm),
            Rg8Int => color(2, 2, Int),
            Rg8Uint => color(2, 2, Uint),
            Rg16Unorm => color(2, 4, Unorm),
            Rg16Float => color(2, 4, Float),
            Rg16Int => color(2, 4, Int),
            Rg16Uint => color(2, 4, Uint),
            Rg32Float => color(2, 8, Float),
            Rg32Int => color(2, 8, Int),
            Rg32Uint => color(2, 8, Uint),

            Rgba8Unorm | Rgba8UnormSrgb | Bgra8Unorm | Bgra8UnormSrgb => color(4, 4, Unorm),
            Rgba8Int => color(4, 4, Int),
            Rgba8Uint => color(4, 4, Uint),
            Rgba16Unorm => color(4, 8, Unorm),
            Rgba16Float => color(4, 8, Float),
            Rgba16Int => color(4, 8, Int),
            Rgba16Uint => color(4, 8, Uint),
            Rgba32Float => color(4, 16, Float),
            Rgba32Int => color(4, 16, Int),
            Rgba32Uint => color(4, 16, Uint),

            Rgba4Unorm | Rgb5a1Unorm => color(4, 2, Unorm),
            Rgb565Unorm => color(3, 2, Unorm),
            Rgb10a2Unorm => color(4, 4, Unorm),
            Rg11b10Float => color(3, 4, Float),

            Stencil8 => depth_stencil(1, false, true, Uint),
            Depth16Unorm => depth_stencil(2, true, false, Unorm),
            Depth24Unorm => depth_stencil(4, true, false, Unorm),
            Depth32Float => depth_stencil(4, true, false, Float),
            Depth24UnormStencil8 => depth_stencil(4, true, true, Unorm),
            Depth32FloatStencil8 => depth_stencil(8, true, true, Float),

            Dxt1Unorm => compressed(4, 4, 8),
            Dxt3Unorm | Dxt5Unorm => compressed(4, 4, 16),
            Bc4Unorm => compressed(1, 4, 8),
            Bc5Unorm => compressed(2, 4, 16),
            Bc7Unorm => compressed(4, 4, 16),
            Etc2RgbUnorm => compressed(3, 4, 8),
            Astc4x4Unorm => compressed(4, 4, 16),
        }
    }

    pub fn name(self) -> &'static str {
        use PixelFormat::*;

        match self {
            R8Unorm => "r8",
            R8Int => "r8i",
            R8Uint => "r8ui",
            R16Unorm => "r16",
            R16Float => "r16f",
            R16Int => "r16i",
            R16Uint => "r16ui",
            R32Float => "r32f",
            R32Int => "r32i",
            R32Uint => "r32ui",
            Rg8Unorm => "rg8",
            Rg8Int => "rg8i",
            Rg8Uint => "rg8ui",
            La8Unorm => "la8",
            Rg16Unorm => "rg16",
            Rg16Float => "rg16f",
            Rg16Int => "rg16i",
            Rg16Uint => "rg16ui",
            Rg32Float => "rg32f",
            Rg32Int => "rg32i",
            Rg32Uint => "rg32ui",
            Rgba8Unorm => "rgba8",
            Rgba8UnormSrgb => "srgba8",
            Bgra8Unorm => "bgra8",
            Bgra8UnormSrgb => "bgra8srgb",
            Rgba8Int => "rgba8i",
            Rgba8Uint => "rgba8ui",
            Rgba16Unorm => "rgba16",
            Rgba16Float => "rgba16f",
            Rgba16Int => "rgba16i",
            Rgba16Uint => "rgba16ui",
            Rgba32Float => "rgba32f",
            Rgba32Int => "rgba32i",
            Rgba32Uint => "rgba32ui",
            Rgba4Unorm => "rgba4",
            Rgb5a1Unorm => "rgb5a1",
            Rgb565Unorm => "rgb565",
            Rgb10a2Unorm => "rgb10a2",
            Rg11b10Float => "rg11b10f",
            Stencil8 => "stencil8",
            Depth16Unorm => "depth16",
            Depth24Unorm => "depth24",
            Depth32Float => "depth32f",
            Depth24UnormStencil8 => "depth24stencil8",
            Depth32FloatStencil8 => "depth32fstencil8",
            Dxt1Unorm => "DXT1",
            Dxt3Unorm => "DXT3",
            Dxt5Unorm => "DXT5",
            Bc4Unorm => "BC4",
            Bc5Unorm => "BC5",
            Bc7Unorm => "BC7",
            Etc2RgbUnorm => "ETC2rgb",
            Astc4x4Unorm => "ASTC4x4",
        }
    }

    pub fn is_depth_stencil(self) -> bool {
        let info = self.info();
        info.depth || info.stencil
    }

    pub fn is_depth(self) -> bool {
        self.info().depth
    }

    pub fn is_stencil(self) -> bool {
        self.info().stencil
    }

    pub fn is_compressed(self) -> bool {
        self.info().compressed
    }

    pub fn is_srgb(self) -> bool {
        matches!(self, PixelFormat::Rgba8UnormSrgb | PixelFormat::Bgra8UnormSrgb)
    }

    pub fn is_integer(self) -> bool {
        matches!(self.info().data_type, PixelFormatType::Int | PixelFormatType::Uint) && !self.is_depth_stencil()
    }

    /// The sRGB-encoded sibling of a linear format, or the format itself.
    pub fn srgb_variant(self) -> PixelFormat {
        match self {
            PixelFormat::Rgba8Unorm => PixelFormat::Rgba8UnormSrgb,
            PixelFormat::Bgra8Unorm => PixelFormat::Bgra8UnormSrgb,
            other => other,
        }
    }

    pub fn linear_variant(self) -> PixelFormat {
        match self {
            PixelFormat::Rgba8UnormSrgb => PixelFormat::Rgba8Unorm,
            PixelFormat::Bgra8UnormSrgb => PixelFormat::Bgra8Unorm,
            other => other,
        }
    }

    /// Bytes used by `pixels` consecutive pixels of an uncompressed format.
    pub fn row_size(self, pixels: u32) -> u64 {
        let info = self.info();
        if info.compressed {
            return 0;
        }
        pixels as u64 * info.block_size as u64
    }

    /// Bytes used by one `width` x `height` slice, rounding up to whole blocks.
    pub fn slice_size(self, width: u32, height: u32) -> u64 {
        let info = self.info();
        let blocks_x = width.div_ceil(info.block_width as u32) as u64;
        let blocks_y = height.div_ceil(info.block_height as u32) as u64;
        blocks_x * blocks_y * info.block_size as u64
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// What a backend can do with textures of a given format.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PixelFormatUsage: u8 {
        const SAMPLE = 1 << 0;
        const LINEAR = 1 << 1;
        const RENDERTARGET = 1 << 2;
        const BLEND = 1 << 3;
        const MSAA = 1 << 4;
        const COMPUTEWRITE = 1 << 5;
    }
}

impl PixelFormatUsage {
    pub const COMMON_SAMPLE: Self = Self::SAMPLE.union(Self::LINEAR);
    pub const COMMON_RENDER: Self = Self::RENDERTARGET.union(Self::BLEND).union(Self::MSAA);
}
