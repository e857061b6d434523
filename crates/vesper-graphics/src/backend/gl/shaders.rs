//! GLSL sources for the standard shaders and source assembly.
//!
//! Stage sources are written against GLSL 3.30 / ES 3.00 syntax without a
//! `#version` line. [`compose_source`] prepends a header for the context's
//! GLSL dialect; on GLSL 1.x the header maps `in`/`out` and the fragment
//! output onto their legacy spellings.

use crate::shader_cache::ShaderCompileOptions;
use crate::types::{ShaderStageType, StandardShader};

use super::features::GlFeatureSet;

pub const DEFAULT_VERTEX: &str = r#"
in vec4 a_position;
in vec2 a_texcoord;
in vec4 a_color;

out vec2 v_texcoord;
out vec4 v_color;

uniform mat4 u_transform;
uniform mat4 u_projection;
uniform vec4 u_color;
uniform float u_point_size;

void main() {
    v_texcoord = a_texcoord;
    v_color = a_color * u_color;
    gl_PointSize = u_point_size;
    gl_Position = u_projection * u_transform * a_position;
}
"#;

pub const DEFAULT_PIXEL: &str = r#"
in vec2 v_texcoord;
in vec4 v_color;

uniform sampler2D u_texture;

void main() {
    frag_color = texture(u_texture, v_texcoord) * v_color;
}
"#;

pub const POINTS_PIXEL: &str = r#"
in vec2 v_texcoord;
in vec4 v_color;

void main() {
    frag_color = v_color;
}
"#;

/// Vertex attribute names, indexed by attribute location.
pub const ATTRIBUTE_NAMES: [&str; 3] = ["a_position", "a_texcoord", "a_color"];

pub const UNIFORM_TRANSFORM: &str = "u_transform";
pub const UNIFORM_PROJECTION: &str = "u_projection";
pub const UNIFORM_COLOR: &str = "u_color";
pub const UNIFORM_POINT_SIZE: &str = "u_point_size";
pub const UNIFORM_TEXTURE: &str = "u_texture";

pub fn default_source(stage: ShaderStageType) -> &'static str {
    match stage {
        ShaderStageType::Vertex => DEFAULT_VERTEX,
        ShaderStageType::Pixel => DEFAULT_PIXEL,
        ShaderStageType::Compute => "",
    }
}

/// Stage sources of a standard shader.
pub fn standard_sources(shader: StandardShader) -> [(ShaderStageType, &'static str); 2] {
    let pixel = match shader {
        StandardShader::Default => DEFAULT_PIXEL,
        StandardShader::Points => POINTS_PIXEL,
    };
    [(ShaderStageType::Vertex, DEFAULT_VERTEX), (ShaderStageType::Pixel, pixel)]
}

/// `#version` line and compatibility defines for `stage`.
pub fn header(stage: ShaderStageType, features: &GlFeatureSet) -> String {
    let modern = features.glsl3();
    let mut out = String::new();

    let version = match (features.es, modern) {
        (true, _) if features.gles_at_least(3, 1) && stage == ShaderStageType::Compute => "#version 310 es",
        (true, true) => "#version 300 es",
        (true, false) => "#version 100",
        (false, _) if stage == ShaderStageType::Compute => "#version 430 core",
        (false, true) if features.core_profile => "#version 330 core",
        (false, true) => "#version 130",
        (false, false) => "#version 120",
    };
    out.push_str(version);
    out.push('\n');

    if features.es {
        out.push_str("precision highp float;\nprecision highp int;\n");
    }

    match (stage, modern) {
        (ShaderStageType::Pixel, true) => out.push_str("out vec4 frag_color;\n"),
        (ShaderStageType::Vertex, false) => out.push_str("#define in attribute\n#define out varying\n"),
        (ShaderStageType::Pixel, false) => {
            out.push_str("#define in varying\n#define frag_color gl_FragColor\n#define texture texture2D\n")
        }
        _ => {}
    }
    out
}

/// Full source handed to the driver.
///
/// Sources that carry their own `#version` line are kept as they are, with
/// the defines inserted right after it.
pub fn compose_source(
    stage: ShaderStageType,
    body: &str,
    options: &ShaderCompileOptions,
    features: &GlFeatureSet,
) -> String {
    let defines: String = options
        .defines
        .iter()
        .map(|(name, value)| format!("#define {} {}\n", name, value))
        .collect();

    let trimmed = body.trim_start();
    if trimmed.starts_with("#version") {
        let (version, rest) = match trimmed.find('\n') {
            Some(end) => trimmed.split_at(end + 1),
            None => (trimmed, ""),
        };
        let mut out = String::with_capacity(body.len() + defines.len() + 1);
        out.push_str(version);
        if !version.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&defines);
        out.push_str(rest);
        return out;
    }

    let mut out = header(stage, features);
    out.push_str(&defines);
    out.push_str("#line 1\n");
    out.push_str(body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(defines: &[(&str, &str)]) -> ShaderCompileOptions {
        ShaderCompileOptions {
            defines: defines.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    #[test]
    fn test_header_per_dialect() {
        let core = GlFeatureSet::desktop(3, 3);
        assert!(header(ShaderStageType::Vertex, &core).starts_with("#version 330 core"));
        assert!(header(ShaderStageType::Pixel, &core).contains("out vec4 frag_color;"));

        let es2 = GlFeatureSet::gles(2, 0);
        let pixel = header(ShaderStageType::Pixel, &es2);
        assert!(pixel.starts_with("#version 100"));
        assert!(pixel.contains("precision highp float;"));
        assert!(pixel.contains("#define frag_color gl_FragColor"));
    }

    #[test]
    fn test_defines_follow_existing_version_line() {
        let src = "#version 450\nvoid main() {}\n";
        let out = compose_source(
            ShaderStageType::Vertex,
            src,
            &options(&[("FOO", "1")]),
            &GlFeatureSet::desktop(4, 5),
        );
        assert_eq!(out, "#version 450\n#define FOO 1\nvoid main() {}\n");
    }

    #[test]
    fn test_generated_header_precedes_body() {
        let out = compose_source(
            ShaderStageType::Pixel,
            DEFAULT_PIXEL,
            &ShaderCompileOptions::default(),
            &GlFeatureSet::gles(3, 0),
        );
        assert!(out.starts_with("#version 300 es\n"));
        assert!(out.ends_with(DEFAULT_PIXEL));
    }

    #[test]
    fn test_points_shader_skips_texture() {
        let [(_, vertex), (_, pixel)] = standard_sources(StandardShader::Points);
        assert_eq!(vertex, DEFAULT_VERTEX);
        assert!(!pixel.contains("u_texture"));
    }
}
