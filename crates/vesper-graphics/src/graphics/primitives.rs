//! Points, lines and shapes drawn through the batch.
//!
//! Vertices are transformed on the CPU. Two-dimensional affine transforms
//! produce `Xy` positions, anything else keeps the depth and uses `Xyz`.
//! Colors are written per vertex so shapes of different colors share a batch.

use glam::Vec2;
use vesper_core::color::{Color, Color32};
use vesper_core::geometry::Rect;
use vesper_core::math::is_affine_2d;
use vesper_core::profiling::profile_function;

use super::Graphics;
use crate::backend::GraphicsBackend;
use crate::batched::{BatchedDrawCommand, MAX_BATCH_VERTICES, TexturedVertex};
use crate::error::{GraphicsError, GraphicsResult};
use crate::polyline::{Join, PolylineStyle, tessellate};
use crate::resource::Texture;
use crate::shapes::{self, Outline};
use crate::transform::{transform_xy, transform_xy0};
use crate::types::{
    ArcMode, CommonFormat, DrawMode, LineJoin, LineStyle, PrimitiveType, StandardShader, TriangleIndexMode,
};

impl<B: GraphicsBackend> Graphics<B> {
    /// Draws single pixels (or `point_size` squares) at `points`.
    ///
    /// Entries of `colors` are multiplied with the current color. Points
    /// without a matching entry use the current color alone.
    pub fn points(&mut self, points: &[Vec2], colors: Option<&[Color]>) -> GraphicsResult<()> {
        profile_function!();
        if points.is_empty() {
            return Ok(());
        }

        let current = self.color();
        let vertex_colors: Vec<Color32> = (0..points.len())
            .map(|i| {
                let color = match colors.and_then(|c| c.get(i)) {
                    Some(c) => *c * current,
                    None => current,
                };
                self.linear_color(color).to_color32()
            })
            .collect();

        for (chunk, colors) in points
            .chunks(MAX_BATCH_VERTICES as usize)
            .zip(vertex_colors.chunks(MAX_BATCH_VERTICES as usize))
        {
            self.emit(
                PrimitiveType::Points,
                TriangleIndexMode::None,
                StandardShader::Points,
                chunk,
                |i| colors[i],
            )?;
        }
        Ok(())
    }

    /// Draws connected line segments through `points`.
    pub fn line(&mut self, points: &[Vec2]) -> GraphicsResult<()> {
        if points.len() < 2 {
            return Err(GraphicsError::usage("Need at least two vertices to draw a line."));
        }
        self.polyline(points)
    }

    pub fn polygon(&mut self, mode: DrawMode, points: &[Vec2]) -> GraphicsResult<()> {
        if points.len() < 3 {
            return Err(GraphicsError::usage("Need at least three vertices to draw a polygon."));
        }

        match mode {
            DrawMode::Fill => {
                let open = if points.first() == points.last() { &points[..points.len() - 1] } else { points };
                self.fill(open)
            }
            DrawMode::Line => {
                let mut closed = points.to_vec();
                if points.first() != points.last() {
                    closed.push(points[0]);
                }
                self.polyline(&closed)
            }
        }
    }

    pub fn rectangle(&mut self, mode: DrawMode, x: f32, y: f32, width: f32, height: f32) -> GraphicsResult<()> {
        self.outline(mode, &shapes::rectangle(x, y, width, height))
    }

    /// Rectangle with elliptical corners of radii `rx` and `ry`.
    #[allow(clippy::too_many_arguments)]
    pub fn rounded_rectangle(
        &mut self,
        mode: DrawMode,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        rx: f32,
        ry: f32,
    ) -> GraphicsResult<()> {
        let points = shapes::ellipse_point_count(rx, ry, self.pixel_scale());
        self.rounded_rectangle_with_points(mode, x, y, width, height, rx, ry, points)
    }

    /// [`rounded_rectangle`](Self::rounded_rectangle) with an explicit segment count per corner.
    #[allow(clippy::too_many_arguments)]
    pub fn rounded_rectangle_with_points(
        &mut self,
        mode: DrawMode,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        rx: f32,
        ry: f32,
        points: u32,
    ) -> GraphicsResult<()> {
        self.outline(mode, &shapes::rounded_rectangle(x, y, width, height, rx, ry, points))
    }

    pub fn circle(&mut self, mode: DrawMode, x: f32, y: f32, radius: f32) -> GraphicsResult<()> {
        let points = shapes::ellipse_point_count(radius, radius, self.pixel_scale());
        self.outline(mode, &shapes::circle(mode, x, y, radius, points))
    }

    pub fn ellipse(&mut self, mode: DrawMode, x: f32, y: f32, a: f32, b: f32) -> GraphicsResult<()> {
        let points = shapes::ellipse_point_count(a, b, self.pixel_scale());
        self.ellipse_with_points(mode, x, y, a, b, points)
    }

    pub fn ellipse_with_points(
        &mut self,
        mode: DrawMode,
        x: f32,
        y: f32,
        a: f32,
        b: f32,
        points: u32,
    ) -> GraphicsResult<()> {
        self.outline(mode, &shapes::ellipse(mode, x, y, a, b, points))
    }

    /// Arc from `angle1` to `angle2`, in radians.
    #[allow(clippy::too_many_arguments)]
    pub fn arc(
        &mut self,
        draw_mode: DrawMode,
        arc_mode: ArcMode,
        x: f32,
        y: f32,
        radius: f32,
        angle1: f32,
        angle2: f32,
    ) -> GraphicsResult<()> {
        let points = shapes::arc_point_count(radius, angle1, angle2, self.pixel_scale());
        match shapes::arc(draw_mode, arc_mode, x, y, radius, angle1, angle2, points) {
            Some(outline) => self.outline(draw_mode, &outline),
            None => Ok(()),
        }
    }

    /// Draws the `source` region of `texture` (in normalized coordinates) into `dest`.
    pub fn draw_quad(&mut self, texture: &Texture, dest: Rect<f32>, source: Rect<f32>) -> GraphicsResult<()> {
        let transform = self.transform();
        let color = self.linear_color(self.color()).to_color32();

        let corners = [
            (Vec2::new(dest.x, dest.y), Vec2::new(source.x, source.y)),
            (Vec2::new(dest.x, dest.y + dest.height), Vec2::new(source.x, source.y + source.height)),
            (
                Vec2::new(dest.x + dest.width, dest.y + dest.height),
                Vec2::new(source.x + source.width, source.y + source.height),
            ),
            (Vec2::new(dest.x + dest.width, dest.y), Vec2::new(source.x + source.width, source.y)),
        ];

        let cmd = BatchedDrawCommand {
            primitive: PrimitiveType::Triangles,
            formats: [CommonFormat::XyStRgba8, CommonFormat::None],
            index_mode: TriangleIndexMode::Quads,
            vertex_count: 4,
            texture: Some(texture.clone()),
            standard_shader: StandardShader::Default,
        };
        let mut data = self.request_batched_draw(&cmd)?;
        let vertices = data.cast::<TexturedVertex>(0);
        for (vertex, (position, texcoord)) in vertices.iter_mut().zip(corners) {
            *vertex = TexturedVertex {
                position: transform_xy(&transform, position).to_array(),
                texcoord: texcoord.to_array(),
                color,
            };
        }
        Ok(())
    }

    fn outline(&mut self, mode: DrawMode, outline: &Outline) -> GraphicsResult<()> {
        match mode {
            DrawMode::Fill => self.fill(outline.fill_points()),
            DrawMode::Line => self.polyline(&outline.points),
        }
    }

    fn fill(&mut self, points: &[Vec2]) -> GraphicsResult<()> {
        if points.len() < 3 {
            return Ok(());
        }
        let color = self.linear_color(self.color()).to_color32();
        self.emit(
            PrimitiveType::Triangles,
            TriangleIndexMode::Fan,
            StandardShader::Default,
            points,
            |_| color,
        )
    }

    fn polyline(&mut self, points: &[Vec2]) -> GraphicsResult<()> {
        profile_function!();
        let state = self.state();
        let pixel_size = (1.0 / self.pixel_scale()) as f32;
        let style = PolylineStyle {
            half_width: state.line_width * 0.5,
            pixel_size,
            join: match state.line_join {
                LineJoin::None => Join::None,
                LineJoin::Miter => Join::Miter,
                LineJoin::Bevel => Join::Bevel,
            },
            smooth: state.line_style == LineStyle::Smooth,
        };
        let color = self.linear_color(state.color);

        for part in tessellate(points, &style) {
            for piece in part.split(MAX_BATCH_VERTICES as usize) {
                let colors: Vec<Color32> = piece
                    .alphas
                    .iter()
                    .map(|alpha| Color::new(color.r, color.g, color.b, color.a * alpha).to_color32())
                    .collect();
                self.emit(
                    PrimitiveType::Triangles,
                    piece.index_mode,
                    StandardShader::Default,
                    &piece.vertices,
                    |i| colors[i],
                )?;
            }
        }
        Ok(())
    }

    /// Writes `points` with per-vertex colors as one batched request.
    fn emit(
        &mut self,
        primitive: PrimitiveType,
        index_mode: TriangleIndexMode,
        standard_shader: StandardShader,
        points: &[Vec2],
        color: impl Fn(usize) -> Color32,
    ) -> GraphicsResult<()> {
        let transform = self.transform();
        let flat = is_affine_2d(&transform);
        let cmd = BatchedDrawCommand {
            primitive,
            formats: [if flat { CommonFormat::Xy } else { CommonFormat::Xyz }, CommonFormat::Rgba8],
            index_mode,
            vertex_count: points.len() as u32,
            texture: None,
            standard_shader,
        };

        let mut data = self.request_batched_draw(&cmd)?;
        if flat {
            let (positions, colors) = data.split::<[f32; 2], Color32>();
            for (i, point) in points.iter().enumerate() {
                positions[i] = transform_xy(&transform, *point).to_array();
                colors[i] = color(i);
            }
        } else {
            let (positions, colors) = data.split::<[f32; 3], Color32>();
            for (i, point) in points.iter().enumerate() {
                positions[i] = transform_xy0(&transform, *point).to_array();
                colors[i] = color(i);
            }
        }
        Ok(())
    }
}
