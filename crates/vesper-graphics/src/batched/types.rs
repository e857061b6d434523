use bytemuck::{Pod, Zeroable};
use vesper_core::color::Color32;

use crate::resource::Texture;
use crate::types::{CommonFormat, PrimitiveType, StandardShader, TriangleIndexMode};

/// Largest vertex index addressable by the 16-bit index stream.
pub const MAX_BATCH_VERTICES: u32 = u16::MAX as u32;

/// A request to append vertices to the current batch.
#[derive(Debug, Clone)]
pub struct BatchedDrawCommand {
    pub primitive: PrimitiveType,
    pub formats: [CommonFormat; 2],
    pub index_mode: TriangleIndexMode,
    pub vertex_count: u32,
    pub texture: Option<Texture>,
    pub standard_shader: StandardShader,
}

impl Default for BatchedDrawCommand {
    fn default() -> Self {
        Self {
            primitive: PrimitiveType::Triangles,
            formats: [CommonFormat::None; 2],
            index_mode: TriangleIndexMode::None,
            vertex_count: 0,
            texture: None,
            standard_shader: StandardShader::Default,
        }
    }
}

/// Interleaved position, texture coordinate and color; the `XyStRgba8` layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct TexturedVertex {
    pub position: [f32; 2],
    pub texcoord: [f32; 2],
    pub color: Color32,
}

/// Number of indices generated for `vertex_count` vertices.
pub fn index_count(mode: TriangleIndexMode, vertex_count: u32) -> u32 {
    match mode {
        TriangleIndexMode::None => 0,
        TriangleIndexMode::Strip | TriangleIndexMode::Fan => 3 * vertex_count.saturating_sub(2),
        TriangleIndexMode::Quads => 6 * (vertex_count / 4),
    }
}

/// Writes triangle-list indices for `vertex_count` vertices starting at `base`.
pub fn fill_indices(mode: TriangleIndexMode, base: u16, vertex_count: u32, out: &mut [u16]) {
    match mode {
        TriangleIndexMode::None => {}
        TriangleIndexMode::Strip => {
            // 012, 213, 234, 435, ...
            for i in 0..vertex_count.saturating_sub(2) as usize {
                let odd = (i & 1) as u16;
                let i16 = i as u16;
                out[i * 3] = base + i16;
                out[i * 3 + 1] = base + i16 + 1 + odd;
                out[i * 3 + 2] = base + i16 + 2 - odd;
            }
        }
        TriangleIndexMode::Fan => {
            for i in 2..vertex_count as usize {
                let t = (i - 2) * 3;
                out[t] = base;
                out[t + 1] = base + (i - 1) as u16;
                out[t + 2] = base + i as u16;
            }
        }
        TriangleIndexMode::Quads => {
            for quad in 0..(vertex_count / 4) as usize {
                let v = base + (quad * 4) as u16;
                let i = quad * 6;
                out[i..i + 6].copy_from_slice(&[v, v + 1, v + 2, v + 2, v + 3, v]);
            }
        }
    }
}
