//! Polyline tessellation.
//!
//! A line is turned into one or more parts, each drawn with a single batched
//! request. Miter and bevel joins produce a continuous triangle strip; lines
//! without joins produce independent quads. Smooth lines get an extra fringe
//! one pixel wide on each side whose outer edge fades to transparent.

use glam::Vec2;

use crate::types::TriangleIndexMode;

/// Miters longer than this many half widths are beveled instead.
const MITER_LIMIT: f32 = 4.0;

#[derive(Debug, Clone, PartialEq)]
pub struct PolylinePart {
    pub index_mode: TriangleIndexMode,
    pub vertices: Vec<Vec2>,
    /// Alpha multiplier per vertex; 0 on the outer edge of a fringe.
    pub alphas: Vec<f32>,
}

impl PolylinePart {
    fn new(index_mode: TriangleIndexMode) -> Self {
        Self {
            index_mode,
            vertices: Vec::new(),
            alphas: Vec::new(),
        }
    }

    fn push(&mut self, position: Vec2, alpha: f32) {
        self.vertices.push(position);
        self.alphas.push(alpha);
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Splits the part into pieces of at most `max` vertices that draw the same triangles.
    pub fn split(&self, max: usize) -> Vec<PolylinePart> {
        if self.len() <= max {
            return vec![self.clone()];
        }

        let mut parts = Vec::new();
        match self.index_mode {
            TriangleIndexMode::Strip => {
                // Pieces overlap by one vertex pair and start on even indices to keep winding.
                let step = (max & !1).saturating_sub(2).max(2);
                let mut start = 0;
                while start + 2 < self.len() {
                    let end = (start + step + 2).min(self.len());
                    parts.push(self.slice(start, end));
                    start += step;
                }
            }
            _ => {
                let step = (max & !3).max(4);
                let mut start = 0;
                while start < self.len() {
                    let end = (start + step).min(self.len());
                    parts.push(self.slice(start, end));
                    start = end;
                }
            }
        }
        parts
    }

    fn slice(&self, start: usize, end: usize) -> PolylinePart {
        PolylinePart {
            index_mode: self.index_mode,
            vertices: self.vertices[start..end].to_vec(),
            alphas: self.alphas[start..end].to_vec(),
        }
    }
}

/// Which join to use between segments. `None` draws every segment on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Join {
    None,
    Miter,
    Bevel,
}

#[derive(Debug, Clone, Copy)]
pub struct PolylineStyle {
    pub half_width: f32,
    /// Width of one device pixel in the line's coordinate space.
    pub pixel_size: f32,
    pub join: Join,
    pub smooth: bool,
}

fn normal(a: Vec2, b: Vec2) -> Vec2 {
    (b - a).normalize_or_zero().perp()
}

fn dedup(points: &[Vec2]) -> Vec<Vec2> {
    let mut out: Vec<Vec2> = Vec::with_capacity(points.len());
    for p in points {
        if out.last() != Some(p) {
            out.push(*p);
        }
    }
    out
}

pub fn tessellate(points: &[Vec2], style: &PolylineStyle) -> Vec<PolylinePart> {
    let points = dedup(points);
    if points.len() < 2 {
        return Vec::new();
    }

    match style.join {
        Join::None => vec![tessellate_segments(&points, style)],
        Join::Miter | Join::Bevel => tessellate_joined(&points, style),
    }
}

fn tessellate_segments(points: &[Vec2], style: &PolylineStyle) -> PolylinePart {
    let mut part = PolylinePart::new(TriangleIndexMode::Quads);
    let hw = style.half_width;

    for segment in points.windows(2) {
        let (a, b) = (segment[0], segment[1]);
        let n = normal(a, b) * hw;

        part.push(a + n, 1.0);
        part.push(a - n, 1.0);
        part.push(b - n, 1.0);
        part.push(b + n, 1.0);

        if style.smooth {
            let f = n.normalize_or_zero() * style.pixel_size;
            for (inner_a, inner_b, outward) in [(a + n, b + n, f), (a - n, b - n, -f)] {
                part.push(inner_a, 1.0);
                part.push(inner_a + outward, 0.0);
                part.push(inner_b + outward, 0.0);
                part.push(inner_b, 1.0);
            }
        }
    }

    part
}

/// Left/right vertex pairs along the line, one or two pairs per point.
fn joined_edges(points: &[Vec2], style: &PolylineStyle) -> Vec<(Vec2, Vec2)> {
    let hw = style.half_width;
    let n = points.len();
    let closed = n > 2 && points[0] == points[n - 1];

    let mut edges = Vec::with_capacity(n * 2);

    let join = |edges: &mut Vec<(Vec2, Vec2)>, prev: Vec2, p: Vec2, next: Vec2| {
        let n0 = normal(prev, p);
        let n1 = normal(p, next);
        let sum = n0 + n1;
        let cos = sum.normalize_or_zero().dot(n0);

        let miter_ok = style.join == Join::Miter && cos > 1.0 / MITER_LIMIT;
        if miter_ok {
            let m = sum.normalize() * (hw / cos);
            edges.push((p + m, p - m));
        } else if sum.length_squared() < 1e-12 {
            // The line folds back on itself.
            edges.push((p + n0 * hw, p - n0 * hw));
        } else {
            edges.push((p + n0 * hw, p - n0 * hw));
            edges.push((p + n1 * hw, p - n1 * hw));
        }
    };

    if closed {
        join(&mut edges, points[n - 2], points[0], points[1]);
    } else {
        let n0 = normal(points[0], points[1]) * hw;
        edges.push((points[0] + n0, points[0] - n0));
    }

    for i in 1..n - 1 {
        join(&mut edges, points[i - 1], points[i], points[i + 1]);
    }

    if closed {
        let first = edges[0];
        edges.push(first);
    } else {
        let n1 = normal(points[n - 2], points[n - 1]) * hw;
        edges.push((points[n - 1] + n1, points[n - 1] - n1));
    }

    edges
}

fn tessellate_joined(points: &[Vec2], style: &PolylineStyle) -> Vec<PolylinePart> {
    let edges = joined_edges(points, style);

    let mut core = PolylinePart::new(TriangleIndexMode::Strip);
    for (left, right) in &edges {
        core.push(*left, 1.0);
        core.push(*right, 1.0);
    }

    if !style.smooth {
        return vec![core];
    }

    let mut left_fringe = PolylinePart::new(TriangleIndexMode::Strip);
    let mut right_fringe = PolylinePart::new(TriangleIndexMode::Strip);
    for (left, right) in &edges {
        let outward = (*left - *right).normalize_or_zero() * style.pixel_size;
        left_fringe.push(*left + outward, 0.0);
        left_fringe.push(*left, 1.0);
        right_fringe.push(*right, 1.0);
        right_fringe.push(*right - outward, 0.0);
    }

    vec![core, left_fringe, right_fringe]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style(join: Join, smooth: bool) -> PolylineStyle {
        PolylineStyle {
            half_width: 1.0,
            pixel_size: 1.0,
            join,
            smooth,
        }
    }

    #[test]
    fn test_straight_line_strip() {
        let parts = tessellate(&[Vec2::ZERO, Vec2::new(10.0, 0.0)], &style(Join::Miter, false));
        assert_eq!(parts.len(), 1);
        let part = &parts[0];
        assert_eq!(part.index_mode, TriangleIndexMode::Strip);
        assert_eq!(part.vertices.len(), 4);
        for v in &part.vertices {
            assert!((v.y.abs() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_right_angle_miter() {
        let points = [Vec2::ZERO, Vec2::new(10.0, 0.0), Vec2::new(10.0, 10.0)];
        let part = &tessellate(&points, &style(Join::Miter, false))[0];
        assert_eq!(part.vertices.len(), 6);
        let corner = part.vertices[2..4].iter().map(|v| (*v - Vec2::new(10.0, 0.0)).length());
        for len in corner {
            assert!((len - std::f32::consts::SQRT_2).abs() < 1e-5);
        }
    }

    #[test]
    fn test_bevel_adds_pair_per_joint() {
        let points = [Vec2::ZERO, Vec2::new(10.0, 0.0), Vec2::new(10.0, 10.0)];
        let part = &tessellate(&points, &style(Join::Bevel, false))[0];
        assert_eq!(part.vertices.len(), 8);
    }

    #[test]
    fn test_sharp_miter_falls_back_to_bevel() {
        let points = [Vec2::ZERO, Vec2::new(10.0, 0.0), Vec2::new(0.0, 0.5)];
        let part = &tessellate(&points, &style(Join::Miter, false))[0];
        assert_eq!(part.vertices.len(), 8);
    }

    #[test]
    fn test_no_join_uses_quads() {
        let points = [Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0)];
        let parts = tessellate(&points, &style(Join::None, true));
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].index_mode, TriangleIndexMode::Quads);
        assert_eq!(parts[0].vertices.len(), 2 * 12);
        assert!(parts[0].alphas.contains(&0.0));
    }

    #[test]
    fn test_smooth_adds_fringes() {
        let parts = tessellate(&[Vec2::ZERO, Vec2::new(5.0, 0.0)], &style(Join::Miter, true));
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].alphas, vec![0.0, 1.0, 0.0, 1.0]);
        assert!((parts[1].vertices[0].y.abs() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_closed_loop_joins_ends() {
        let square = [
            Vec2::ZERO,
            Vec2::new(4.0, 0.0),
            Vec2::new(4.0, 4.0),
            Vec2::new(0.0, 4.0),
            Vec2::ZERO,
        ];
        let part = &tessellate(&square, &style(Join::Miter, false))[0];
        let n = part.vertices.len();
        assert_eq!(part.vertices[0], part.vertices[n - 2]);
        assert_eq!(part.vertices[1], part.vertices[n - 1]);
    }

    #[test]
    fn test_degenerate_input() {
        assert!(tessellate(&[Vec2::ONE], &style(Join::Miter, false)).is_empty());
        assert!(tessellate(&[Vec2::ONE, Vec2::ONE], &style(Join::Bevel, true)).is_empty());
    }

    #[test]
    fn test_split_strip_overlaps() {
        let points: Vec<Vec2> = (0..20).map(|i| Vec2::new(i as f32, (i % 2) as f32)).collect();
        let part = tessellate(&points, &style(Join::Bevel, false)).remove(0);
        let pieces = part.split(10);
        assert!(pieces.len() > 1);
        for piece in &pieces {
            assert!(piece.len() <= 10);
            assert_eq!(piece.len() % 2, 0);
        }
        assert_eq!(pieces[0].vertices[8..10], pieces[1].vertices[0..2]);
    }
}
