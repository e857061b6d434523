//! The transform stack and projection helpers.
//!
//! Batched primitives are transformed on the CPU before they are written to
//! the vertex streams, so the stack never needs a flush when it changes.
//! Alongside each matrix the stack keeps an approximate pixel scale, which
//! tessellation uses to pick how many segments a curve needs.

use bitflags::bitflags;
use glam::{Mat4, Vec2, Vec3, Vec4};
use vesper_core::math::{approximate_scale, shear};

#[derive(Debug, Clone)]
pub struct TransformStack {
    matrices: Vec<Mat4>,
    pixel_scales: Vec<f64>,
}

impl Default for TransformStack {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformStack {
    pub fn new() -> Self {
        Self {
            matrices: vec![Mat4::IDENTITY],
            pixel_scales: vec![1.0],
        }
    }

    pub fn depth(&self) -> usize {
        self.matrices.len()
    }

    /// Duplicates the top matrix and pixel scale.
    pub fn push(&mut self) {
        let top = self.current();
        let scale = self.pixel_scale();
        self.matrices.push(top);
        self.pixel_scales.push(scale);
    }

    /// Removes the top entry. The base entry is never removed.
    pub fn pop(&mut self) -> bool {
        if self.matrices.len() <= 1 {
            return false;
        }
        self.matrices.pop();
        self.pixel_scales.pop();
        true
    }

    /// Back to a single identity entry.
    pub fn reset(&mut self) {
        self.matrices.truncate(1);
        self.pixel_scales.truncate(1);
        self.origin();
    }

    pub fn current(&self) -> Mat4 {
        self.matrices.last().copied().unwrap_or(Mat4::IDENTITY)
    }

    pub fn pixel_scale(&self) -> f64 {
        self.pixel_scales.last().copied().unwrap_or(1.0)
    }

    fn top_mut(&mut self) -> (&mut Mat4, &mut f64) {
        if self.matrices.is_empty() {
            self.matrices.push(Mat4::IDENTITY);
            self.pixel_scales.push(1.0);
        }
        let last = self.matrices.len() - 1;
        (&mut self.matrices[last], &mut self.pixel_scales[last])
    }

    pub fn translate(&mut self, x: f32, y: f32) {
        let (m, _) = self.top_mut();
        *m *= Mat4::from_translation(Vec3::new(x, y, 0.0));
    }

    pub fn rotate(&mut self, angle: f32) {
        let (m, _) = self.top_mut();
        *m *= Mat4::from_rotation_z(angle);
    }

    pub fn scale(&mut self, x: f32, y: f32) {
        let (m, scale) = self.top_mut();
        *m *= Mat4::from_scale(Vec3::new(x, y, 1.0));
        *scale *= (x.abs() as f64 + y.abs() as f64) / 2.0;
    }

    pub fn shear(&mut self, kx: f32, ky: f32) {
        let (m, _) = self.top_mut();
        *m *= shear(kx, ky);
    }

    /// Resets the top matrix to identity.
    pub fn origin(&mut self) {
        let (m, scale) = self.top_mut();
        *m = Mat4::IDENTITY;
        *scale = 1.0;
    }

    /// Multiplies `transform` onto the top matrix.
    pub fn apply(&mut self, transform: &Mat4) {
        let (m, scale) = self.top_mut();
        *m *= *transform;
        let s = approximate_scale(m);
        *scale = (s.x as f64 + s.y as f64) / 2.0;
    }

    pub fn replace(&mut self, transform: &Mat4) {
        let (m, scale) = self.top_mut();
        *m = *transform;
        let s = approximate_scale(m);
        *scale = (s.x as f64 + s.y as f64) / 2.0;
    }

    pub fn transform_point(&self, p: Vec2) -> Vec2 {
        self.current().transform_point3(p.extend(0.0)).truncate()
    }

    pub fn inverse_transform_point(&self, p: Vec2) -> Vec2 {
        self.current().inverse().transform_point3(p.extend(0.0)).truncate()
    }
}

bitflags! {
    /// Adjustments a backend needs to map our projection onto its clip space.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DeviceProjectionFlags: u8 {
        /// Negate Y in clip space.
        const FLIP_Y = 1 << 0;
        /// Clip space depth is `[0, 1]` instead of `[-1, 1]`.
        const Z_01 = 1 << 1;
        /// Depth is stored reversed (near = 1).
        const REVERSE_Z = 1 << 2;
    }
}

/// Orthographic projection with the origin at the top-left corner.
pub fn screen_ortho(width: f32, height: f32, near: f32, far: f32) -> Mat4 {
    Mat4::orthographic_rh_gl(0.0, width, height, 0.0, near, far)
}

/// Converts a `[-1, 1]` depth, y-up projection into what the backend expects.
pub fn calculate_device_projection(projection: &Mat4, flags: DeviceProjectionFlags) -> Mat4 {
    // Operate on rows, which are the columns of the transpose.
    let mut rows = projection.transpose();

    if flags.contains(DeviceProjectionFlags::FLIP_Y) {
        rows.y_axis = -rows.y_axis;
    }

    if flags.contains(DeviceProjectionFlags::Z_01) {
        let factor = if flags.contains(DeviceProjectionFlags::REVERSE_Z) { -0.5 } else { 0.5 };
        rows.z_axis = rows.z_axis * factor + rows.w_axis * 0.5;
    } else if flags.contains(DeviceProjectionFlags::REVERSE_Z) {
        rows.z_axis = -rows.z_axis;
    }

    rows.transpose()
}

/// Applies `m` to a point, keeping the homogeneous divide out of the picture.
pub(crate) fn transform_xy(m: &Mat4, p: Vec2) -> Vec2 {
    let v = *m * Vec4::new(p.x, p.y, 0.0, 1.0);
    Vec2::new(v.x, v.y)
}

pub(crate) fn transform_xy0(m: &Mat4, p: Vec2) -> Vec3 {
    let v = *m * Vec4::new(p.x, p.y, 0.0, 1.0);
    Vec3::new(v.x, v.y, v.z)
}
