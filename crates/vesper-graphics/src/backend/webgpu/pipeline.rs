//! Standard WGSL shaders, bind group layouts and render pipeline creation.
//!
//! Every program sees the same interface: group 0 holds the per-draw
//! [`Globals`] at a dynamic offset, group 1 the draw texture and its sampler.
//! Vertex inputs use the attribute locations shared with the GL backend.

use std::borrow::Cow;

use bytemuck::{Pod, Zeroable};
use vesper_core::profiling::profile_function;

use crate::backend::DrawState;
use crate::blend::BlendState;
use crate::error::{GraphicsError, GraphicsResult};
use crate::pixel_format::PixelFormat;
use crate::resource::ShaderBinding;
use crate::shader_cache::ShaderCompileOptions;
use crate::types::{
    ATTRIB_COLOR, ATTRIB_POSITION, ATTRIB_TEXCOORD, ColorChannelMask, CommonFormat, CompareMode, CullMode, DepthState,
    ShaderStageType, StandardShader, StencilAction, TextureType, Winding,
};

use super::formats;

const GLOBALS_WGSL: &str = r#"
struct Globals {
    transform: mat4x4<f32>,
    projection: mat4x4<f32>,
    color: vec4<f32>,
    point_size: f32,
};

@group(0) @binding(0) var<uniform> globals: Globals;
"#;

pub const DEFAULT_VERTEX: &str = r#"
struct VertexInput {
    @location(0) position: vec4<f32>,
    @location(1) texcoord: vec2<f32>,
    @location(2) color: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) texcoord: vec2<f32>,
    @location(1) color: vec4<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.texcoord = in.texcoord;
    out.color = in.color * globals.color;
    out.position = globals.projection * globals.transform * in.position;
    return out;
}
"#;

pub const DEFAULT_PIXEL: &str = r#"
@group(1) @binding(0) var main_texture: texture_2d<f32>;
@group(1) @binding(1) var main_sampler: sampler;

@fragment
fn fs_main(@location(0) texcoord: vec2<f32>, @location(1) color: vec4<f32>) -> @location(0) vec4<f32> {
    return textureSample(main_texture, main_sampler, texcoord) * color;
}
"#;

pub const POINTS_PIXEL: &str = r#"
@fragment
fn fs_main(@location(0) texcoord: vec2<f32>, @location(1) color: vec4<f32>) -> @location(0) vec4<f32> {
    return color;
}
"#;

pub fn default_source(stage: ShaderStageType) -> &'static str {
    match stage {
        ShaderStageType::Vertex => DEFAULT_VERTEX,
        ShaderStageType::Pixel => DEFAULT_PIXEL,
        ShaderStageType::Compute => "",
    }
}

pub fn standard_sources(shader: StandardShader) -> [(ShaderStageType, &'static str); 2] {
    let pixel = match shader {
        StandardShader::Default => DEFAULT_PIXEL,
        StandardShader::Points => POINTS_PIXEL,
    };
    [(ShaderStageType::Vertex, DEFAULT_VERTEX), (ShaderStageType::Pixel, pixel)]
}

/// Full module source for a stage: defines as constants, then the globals
/// block for graphics stages, then the stage itself.
pub fn compose_source<'a>(stage: ShaderStageType, source: &'a str, options: &ShaderCompileOptions) -> Cow<'a, str> {
    let wants_globals = stage != ShaderStageType::Compute && !source.contains("var<uniform> globals");
    if options.defines.is_empty() && !wants_globals {
        return Cow::Borrowed(source);
    }

    let mut out = String::with_capacity(source.len() + GLOBALS_WGSL.len() + 64);
    for (name, value) in &options.defines {
        let value = if value.is_empty() { "true" } else { value.as_str() };
        out.push_str(&format!("const {} = {};\n", name, value));
    }
    if wants_globals {
        out.push_str(GLOBALS_WGSL);
    }
    out.push_str(source);
    Cow::Owned(out)
}

/// Per-draw uniform block, matching `Globals` in WGSL.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Globals {
    pub transform: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub color: [f32; 4],
    pub point_size: f32,
    pub _padding: [f32; 3],
}

const _: () = assert!(std::mem::size_of::<Globals>() == 160);

impl Globals {
    pub const SIZE: u64 = std::mem::size_of::<Globals>() as u64;

    pub fn new(state: &DrawState) -> Self {
        Self {
            transform: state.transform.to_cols_array_2d(),
            projection: state.projection.to_cols_array_2d(),
            color: state.constant_color.to_array(),
            point_size: state.point_size,
            _padding: [0.0; 3],
        }
    }
}

pub fn globals_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Globals Layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: wgpu::BufferSize::new(Globals::SIZE),
            },
            count: None,
        }],
    })
}

/// How a texture is bound in group 1. Textures with equal keys share a
/// bind group layout and therefore pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureLayoutKey {
    pub sample_type: wgpu::TextureSampleType,
    pub view_dimension: wgpu::TextureViewDimension,
    pub multisampled: bool,
    pub sampler: wgpu::SamplerBindingType,
}

impl TextureLayoutKey {
    /// Layout of the 1x1 white texture bound when a draw has none.
    pub const WHITE: TextureLayoutKey = TextureLayoutKey {
        sample_type: wgpu::TextureSampleType::Float { filterable: true },
        view_dimension: wgpu::TextureViewDimension::D2,
        multisampled: false,
        sampler: wgpu::SamplerBindingType::Filtering,
    };

    pub fn for_texture(
        format: PixelFormat,
        texture_type: TextureType,
        msaa: u32,
        depth_compare: bool,
        device_features: wgpu::Features,
    ) -> GraphicsResult<Self> {
        let native = formats::texture_format(format)
            .ok_or_else(|| GraphicsError::unsupported(format!("The {} pixel format is not supported.", format)))?;
        let multisampled = msaa > 1;
        let aspect = formats::sample_aspect(format);

        let sample_type = match native.sample_type(Some(aspect), Some(device_features)) {
            Some(wgpu::TextureSampleType::Depth) if depth_compare && !multisampled => wgpu::TextureSampleType::Depth,
            Some(wgpu::TextureSampleType::Depth) => wgpu::TextureSampleType::Float { filterable: false },
            Some(wgpu::TextureSampleType::Float { .. }) if multisampled => {
                wgpu::TextureSampleType::Float { filterable: false }
            }
            Some(ty) => ty,
            None => {
                return Err(GraphicsError::unsupported(format!(
                    "The {} pixel format cannot be sampled.",
                    format
                )));
            }
        };

        let sampler = match sample_type {
            wgpu::TextureSampleType::Float { filterable: true } => wgpu::SamplerBindingType::Filtering,
            wgpu::TextureSampleType::Depth => wgpu::SamplerBindingType::Comparison,
            _ => wgpu::SamplerBindingType::NonFiltering,
        };

        Ok(Self {
            sample_type,
            view_dimension: formats::texture_dimension(texture_type).1,
            multisampled,
            sampler,
        })
    }

    pub fn create_layout(&self, device: &wgpu::Device) -> wgpu::BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Texture Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: self.sample_type,
                        view_dimension: self.view_dimension,
                        multisampled: self.multisampled,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Sampler(self.sampler),
                    count: None,
                },
            ],
        })
    }
}

/// Stencil state minus the reference value, which is dynamic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilKey {
    pub action: StencilAction,
    pub compare: CompareMode,
    pub read_mask: u32,
    pub write_mask: u32,
}

/// Everything a render pipeline is built from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub shader: ShaderBinding,
    pub vertex_formats: [CommonFormat; 2],
    pub topology: wgpu::PrimitiveTopology,
    pub texture: TextureLayoutKey,
    pub colors: Vec<wgpu::TextureFormat>,
    pub depth_stencil: Option<wgpu::TextureFormat>,
    pub samples: u32,
    pub blend: BlendState,
    pub color_mask: ColorChannelMask,
    pub stencil: StencilKey,
    pub depth: DepthState,
    pub cull_mode: CullMode,
    pub winding: Winding,
    pub wireframe: bool,
}

/// Attribute values for inputs no bound stream provides: position and
/// texture coordinates at zero, color white.
pub const VERTEX_DEFAULTS: [u8; 12] = [0, 0, 0, 0, 0, 0, 0, 0, 255, 255, 255, 255];

/// Vertex buffer layouts for `formats`, in slot order, plus the defaults
/// slot when some attribute is missing.
///
/// Returns the attribute lists separately since layouts borrow them.
pub fn vertex_attribute_sets(formats: &[CommonFormat; 2]) -> Vec<(u64, Vec<wgpu::VertexAttribute>)> {
    let mut sets = Vec::with_capacity(3);
    let mut provided = [false; 3];

    for &format in formats.iter().filter(|f| **f != CommonFormat::None) {
        let attributes: Vec<_> = formats::vertex_attributes(format)
            .into_iter()
            .filter(|a| !provided[a.shader_location as usize])
            .collect();
        for a in &attributes {
            provided[a.shader_location as usize] = true;
        }
        sets.push((format.stride() as u64, attributes));
    }

    let mut defaults = Vec::new();
    if !provided[ATTRIB_POSITION as usize] {
        defaults.push(wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: 0,
            shader_location: ATTRIB_POSITION,
        });
    }
    if !provided[ATTRIB_TEXCOORD as usize] {
        defaults.push(wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: 0,
            shader_location: ATTRIB_TEXCOORD,
        });
    }
    if !provided[ATTRIB_COLOR as usize] {
        defaults.push(wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Unorm8x4,
            offset: 8,
            shader_location: ATTRIB_COLOR,
        });
    }
    if !defaults.is_empty() {
        sets.push((0, defaults));
    }
    sets
}

/// Whether draws with `formats` bind the defaults buffer after their streams.
pub fn needs_defaults(formats: &[CommonFormat; 2]) -> bool {
    let position = formats.iter().any(|f| f.position_components() > 0);
    let texcoord = formats.iter().any(|f| f.has_texcoord());
    let color = formats.iter().any(|f| f.has_color());
    !(position && texcoord && color)
}

pub struct PipelineModules<'a> {
    pub vertex: &'a wgpu::ShaderModule,
    pub pixel: &'a wgpu::ShaderModule,
    pub layout: &'a wgpu::PipelineLayout,
}

pub fn create_render_pipeline(
    device: &wgpu::Device,
    key: &PipelineKey,
    modules: PipelineModules<'_>,
) -> GraphicsResult<wgpu::RenderPipeline> {
    profile_function!();

    let attribute_sets = vertex_attribute_sets(&key.vertex_formats);
    let buffers: Vec<wgpu::VertexBufferLayout<'_>> = attribute_sets
        .iter()
        .map(|(stride, attributes)| wgpu::VertexBufferLayout {
            array_stride: *stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes,
        })
        .collect();

    let blend = formats::blend_state(&key.blend);
    let write_mask = formats::color_writes(key.color_mask);
    let targets: Vec<Option<wgpu::ColorTargetState>> = key
        .colors
        .iter()
        .map(|&format| {
            Some(wgpu::ColorTargetState {
                format,
                blend,
                write_mask,
            })
        })
        .collect();

    let depth_stencil = key.depth_stencil.map(|format| {
        let face = wgpu::StencilFaceState {
            compare: formats::compare(key.stencil.compare),
            fail_op: wgpu::StencilOperation::Keep,
            depth_fail_op: wgpu::StencilOperation::Keep,
            pass_op: formats::stencil_operation(key.stencil.action),
        };
        let has_stencil = format.has_stencil_aspect();
        let has_depth = format.has_depth_aspect();
        wgpu::DepthStencilState {
            format,
            depth_write_enabled: has_depth && key.depth.write,
            depth_compare: if has_depth {
                formats::compare(key.depth.compare)
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: if has_stencil {
                wgpu::StencilState {
                    front: face,
                    back: face,
                    read_mask: key.stencil.read_mask,
                    write_mask: key.stencil.write_mask,
                }
            } else {
                wgpu::StencilState::default()
            },
            bias: wgpu::DepthBiasState::default(),
        }
    });

    let polygon_mode = if key.wireframe && device.features().contains(wgpu::Features::POLYGON_MODE_LINE) {
        wgpu::PolygonMode::Line
    } else {
        wgpu::PolygonMode::Fill
    };

    let descriptor = wgpu::RenderPipelineDescriptor {
        label: Some("Vesper Render Pipeline"),
        layout: Some(modules.layout),
        vertex: wgpu::VertexState {
            module: modules.vertex,
            entry_point: None,
            buffers: &buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: modules.pixel,
            entry_point: None,
            targets: &targets,
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: key.topology,
            strip_index_format: None,
            front_face: formats::front_face(key.winding),
            cull_mode: formats::cull_face(key.cull_mode),
            polygon_mode,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil,
        multisample: wgpu::MultisampleState {
            count: key.samples.max(1),
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    };

    validated(device, "Cannot create render pipeline", || device.create_render_pipeline(&descriptor))
}

pub fn create_shader_module(
    device: &wgpu::Device,
    stage: ShaderStageType,
    source: &str,
    options: &ShaderCompileOptions,
) -> GraphicsResult<wgpu::ShaderModule> {
    profile_function!();
    let source = compose_source(stage, source, options);
    let label = format!("{} shader", stage);
    validated(device, &format!("Cannot compile {} shader", stage), || {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&label),
            source: wgpu::ShaderSource::Wgsl(source),
        })
    })
}

/// Runs `create` inside a validation error scope and turns a captured error
/// into a backend error prefixed with `what`.
pub fn validated<T>(device: &wgpu::Device, what: &str, create: impl FnOnce() -> T) -> GraphicsResult<T> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(GraphicsError::backend(format!("{}: {}", what, err))),
        None => Ok(value),
    }
}
