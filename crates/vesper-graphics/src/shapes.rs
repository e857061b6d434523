//! Outline generation for the built-in shapes.
//!
//! Every shape is reduced to a closed loop of points. Filled shapes are then
//! drawn as a triangle fan over that loop, outlined shapes go through the
//! polyline tessellator.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use glam::Vec2;

use crate::types::{ArcMode, DrawMode};

/// A point loop ready for `polygon`.
#[derive(Debug, Clone, PartialEq)]
pub struct Outline {
    pub points: Vec<Vec2>,
    /// Leave the closing point out of the fan in fill mode.
    pub skip_last_filled: bool,
}

impl Outline {
    fn closed(points: Vec<Vec2>) -> Self {
        Self {
            points,
            skip_last_filled: true,
        }
    }

    /// Points that make up the fan when filling.
    pub fn fill_points(&self) -> &[Vec2] {
        let n = self.points.len();
        if self.skip_last_filled && n > 0 { &self.points[..n - 1] } else { &self.points }
    }
}

/// Segment count for a curve of radii `rx`, `ry` at the current pixel scale.
pub fn ellipse_point_count(rx: f32, ry: f32, pixel_scale: f64) -> u32 {
    let points = (((rx + ry) / 2.0) * 20.0 * pixel_scale as f32).sqrt() as i32;
    points.max(8) as u32
}

pub fn rectangle(x: f32, y: f32, w: f32, h: f32) -> Outline {
    Outline::closed(vec![
        Vec2::new(x, y),
        Vec2::new(x, y + h),
        Vec2::new(x + w, y + h),
        Vec2::new(x + w, y),
        Vec2::new(x, y),
    ])
}

/// Rectangle with elliptical corners. Non-positive radii give a plain rectangle.
pub fn rounded_rectangle(x: f32, y: f32, w: f32, h: f32, mut rx: f32, mut ry: f32, points: u32) -> Outline {
    if rx <= 0.0 || ry <= 0.0 {
        return rectangle(x, y, w, h);
    }

    // Radii past half the size would fold the corners over each other.
    if w >= 0.02 {
        rx = rx.min(w / 2.0 - 0.01);
    }
    if h >= 0.02 {
        ry = ry.min(h / 2.0 - 0.01);
    }

    let points = (points as usize / 4).max(1);
    let angle_shift = FRAC_PI_2 / (points as f32 + 1.0);
    let per_corner = points + 2;
    let num_coords = per_corner * 4;

    let mut coords = vec![Vec2::ZERO; num_coords + 1];

    let corners: [(f32, &dyn Fn(f32) -> Vec2); 4] = [
        (0.0, &|phi: f32| Vec2::new(x + rx * (1.0 - phi.cos()), y + ry * (1.0 - phi.sin()))),
        (FRAC_PI_2, &|phi: f32| Vec2::new(x + w - rx * (1.0 + phi.cos()), y + ry * (1.0 - phi.sin()))),
        (PI, &|phi: f32| Vec2::new(x + w - rx * (1.0 + phi.cos()), y + h - ry * (1.0 + phi.sin()))),
        (3.0 * FRAC_PI_2, &|phi: f32| Vec2::new(x + rx * (1.0 - phi.cos()), y + h - ry * (1.0 + phi.sin()))),
    ];

    // Each corner writes one point past its range, which the next corner overwrites.
    for (corner, (start, point_at)) in corners.iter().enumerate() {
        let mut phi = *start;
        for coord in &mut coords[corner * per_corner..=(corner + 1) * per_corner] {
            *coord = point_at(phi);
            phi += angle_shift;
        }
    }

    coords[num_coords] = coords[0];
    Outline::closed(coords)
}

/// Ellipse loop. In fill mode the center comes first and the closing point is kept.
pub fn ellipse(mode: DrawMode, x: f32, y: f32, a: f32, b: f32, points: u32) -> Outline {
    let points = points.max(1) as usize;
    let angle_shift = TAU / points as f32;

    let mut coords = Vec::with_capacity(points + 2);
    if mode == DrawMode::Fill {
        coords.push(Vec2::new(x, y));
    }
    let first = coords.len();

    let mut phi = 0.0f32;
    for _ in 0..points {
        coords.push(Vec2::new(x + a * phi.cos(), y + b * phi.sin()));
        phi += angle_shift;
    }
    coords.push(coords[first]);

    Outline {
        points: coords,
        skip_last_filled: false,
    }
}

pub fn circle(mode: DrawMode, x: f32, y: f32, radius: f32, points: u32) -> Outline {
    ellipse(mode, x, y, radius, radius, points)
}

/// Segment count for an arc, proportional to the fraction of the circle it covers.
pub fn arc_point_count(radius: f32, angle1: f32, angle2: f32, pixel_scale: f64) -> u32 {
    let mut points = ellipse_point_count(radius, radius, pixel_scale) as f32;
    let angle = (angle1 - angle2).abs();
    if angle < TAU {
        points *= angle / TAU;
    }
    (points + 0.5) as u32
}

/// Arc loop, or `None` when there is nothing to draw.
#[allow(clippy::too_many_arguments)]
pub fn arc(
    draw_mode: DrawMode,
    mut arc_mode: ArcMode,
    x: f32,
    y: f32,
    radius: f32,
    angle1: f32,
    angle2: f32,
    points: u32,
) -> Option<Outline> {
    if points == 0 || angle1 == angle2 {
        return None;
    }

    if (angle1 - angle2).abs() >= TAU {
        return Some(circle(draw_mode, x, y, radius, points));
    }

    let angle_shift = (angle2 - angle1) / points as f32;
    if angle_shift == 0.0 {
        return None;
    }

    // A closing segment at a very small angle makes the miter join spike.
    if draw_mode == DrawMode::Line && arc_mode == ArcMode::Closed && (angle1 - angle2).abs() < 4f32.to_radians() {
        arc_mode = ArcMode::Open;
    }

    // Fans need a closed loop.
    if draw_mode == DrawMode::Fill && arc_mode == ArcMode::Open {
        arc_mode = ArcMode::Closed;
    }

    let center = Vec2::new(x, y);
    let points = points as usize;
    let mut coords = Vec::with_capacity(points + 3);

    if arc_mode == ArcMode::Pie {
        coords.push(center);
    }

    let mut phi = angle1;
    for _ in 0..=points {
        coords.push(Vec2::new(x + radius * phi.cos(), y + radius * phi.sin()));
        phi += angle_shift;
    }

    match arc_mode {
        ArcMode::Pie => coords.push(center),
        ArcMode::Closed => coords.push(coords[0]),
        ArcMode::Open => {}
    }

    Some(Outline::closed(coords))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_count_has_floor() {
        assert_eq!(ellipse_point_count(0.5, 0.5, 1.0), 8);
        assert_eq!(ellipse_point_count(100.0, 100.0, 1.0), 44);
        assert_eq!(ellipse_point_count(100.0, 100.0, 4.0), 89);
    }

    #[test]
    fn test_rectangle_is_closed_loop() {
        let outline = rectangle(1.0, 2.0, 3.0, 4.0);
        assert_eq!(outline.points.len(), 5);
        assert_eq!(outline.points[0], outline.points[4]);
        assert_eq!(outline.fill_points().len(), 4);
    }

    #[test]
    fn test_rounded_rectangle_falls_back_without_radius() {
        assert_eq!(rounded_rectangle(0.0, 0.0, 10.0, 10.0, 0.0, 2.0, 16), rectangle(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn test_rounded_rectangle_point_count() {
        let outline = rounded_rectangle(0.0, 0.0, 100.0, 50.0, 10.0, 10.0, 16);
        // 16 / 4 = 4 per corner, plus 2 ends, times 4 corners, plus closing point.
        assert_eq!(outline.points.len(), 25);
        assert_eq!(outline.points[0], outline.points[24]);
        for p in &outline.points {
            assert!(p.x >= -1e-3 && p.x <= 100.001 && p.y >= -1e-3 && p.y <= 50.001);
        }
    }

    #[test]
    fn test_filled_ellipse_has_center_and_closing_point() {
        let outline = ellipse(DrawMode::Fill, 5.0, 5.0, 2.0, 1.0, 8);
        assert_eq!(outline.points.len(), 10);
        assert_eq!(outline.points[0], Vec2::new(5.0, 5.0));
        assert_eq!(outline.points[1], outline.points[9]);
        assert_eq!(outline.fill_points().len(), 10);

        let line = ellipse(DrawMode::Line, 5.0, 5.0, 2.0, 1.0, 8);
        assert_eq!(line.points.len(), 9);
    }

    #[test]
    fn test_arc_modes() {
        assert!(arc(DrawMode::Fill, ArcMode::Pie, 0.0, 0.0, 1.0, 1.0, 1.0, 10).is_none());
        assert!(arc(DrawMode::Fill, ArcMode::Pie, 0.0, 0.0, 1.0, 0.0, 1.0, 0).is_none());

        let pie = arc(DrawMode::Fill, ArcMode::Pie, 0.0, 0.0, 1.0, 0.0, PI, 4).unwrap();
        assert_eq!(pie.points.len(), 7);
        assert_eq!(pie.points[0], Vec2::ZERO);
        assert_eq!(pie.points[6], Vec2::ZERO);

        let open = arc(DrawMode::Line, ArcMode::Open, 0.0, 0.0, 1.0, 0.0, PI, 4).unwrap();
        assert_eq!(open.points.len(), 5);

        // Filled open arcs are closed.
        let filled_open = arc(DrawMode::Fill, ArcMode::Open, 0.0, 0.0, 1.0, 0.0, PI, 4).unwrap();
        assert_eq!(filled_open.points.len(), 6);
    }

    #[test]
    fn test_full_turn_arc_is_circle() {
        let full = arc(DrawMode::Line, ArcMode::Pie, 0.0, 0.0, 1.0, 0.0, TAU, 12).unwrap();
        assert_eq!(full, circle(DrawMode::Line, 0.0, 0.0, 1.0, 12));
    }

    #[test]
    fn test_arc_point_count_scales_with_angle() {
        let full = ellipse_point_count(50.0, 50.0, 1.0);
        assert_eq!(arc_point_count(50.0, 0.0, PI, 1.0), (full as f32 / 2.0 + 0.5) as u32);
    }
}
