//! Math types re-exported from [`glam`], plus helpers for 2D affine work.

pub use glam::{Mat3, Mat4, Vec2, Vec3, Vec4, vec2, vec3, vec4};

/// Returns true when `m` only transforms the XY plane (no projective or Z
/// component).
pub fn is_affine_2d(m: &Mat4) -> bool {
    m.x_axis.z == 0.0
        && m.x_axis.w == 0.0
        && m.y_axis.z == 0.0
        && m.y_axis.w == 0.0
        && m.z_axis.x == 0.0
        && m.z_axis.y == 0.0
        && m.z_axis.z == 1.0
        && m.z_axis.w == 0.0
        && m.w_axis.z == 0.0
        && m.w_axis.w == 1.0
}

/// Approximate X and Y scale factors of a 2D transform.
///
/// Takes the lengths of the first two rows of the linear part, which is exact
/// when the scale is applied after any rotation (`S * R`) and for uniform
/// scales in either order.
pub fn approximate_scale(m: &Mat4) -> Vec2 {
    let sx = (m.x_axis.x * m.x_axis.x + m.y_axis.x * m.y_axis.x).sqrt();
    let sy = (m.x_axis.y * m.x_axis.y + m.y_axis.y * m.y_axis.y).sqrt();
    Vec2::new(sx, sy)
}

/// A 2D shear matrix: `x' = x + kx * y`, `y' = ky * x + y`.
pub fn shear(kx: f32, ky: f32) -> Mat4 {
    Mat4::from_cols(
        Vec4::new(1.0, ky, 0.0, 0.0),
        Vec4::new(kx, 1.0, 0.0, 0.0),
        Vec4::Z,
        Vec4::W,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affine_detection() {
        assert!(is_affine_2d(&Mat4::IDENTITY));
        assert!(is_affine_2d(&Mat4::from_translation(Vec3::new(3.0, 4.0, 0.0))));
        assert!(!is_affine_2d(&Mat4::perspective_rh_gl(1.0, 1.0, 0.1, 10.0)));
    }

    #[test]
    fn test_approximate_scale_ignores_rotation() {
        let m = Mat4::from_scale(Vec3::new(2.0, 3.0, 1.0)) * Mat4::from_rotation_z(0.7);
        let s = approximate_scale(&m);
        assert!((s.x - 2.0).abs() < 1e-5);
        assert!((s.y - 3.0).abs() < 1e-5);

        let uniform = Mat4::from_rotation_z(0.7) * Mat4::from_scale(Vec3::new(4.0, 4.0, 1.0));
        let s = approximate_scale(&uniform);
        assert!((s - Vec2::splat(4.0)).length() < 1e-5);
    }

    #[test]
    fn test_approximate_scale_uses_rows() {
        // Rows (1, 2) and (0, 1): a shear along x.
        let m = shear(2.0, 0.0);
        let s = approximate_scale(&m);
        assert!((s.x - 5.0f32.sqrt()).abs() < 1e-5);
        assert!((s.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_shear() {
        let p = shear(0.5, 0.0).transform_point3(Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(p, Vec3::new(1.0, 2.0, 0.0));
    }
}
