//! Floating point and packed 8-bit colors.

use bytemuck::{Pod, Zeroable};

/// Linear RGBA color with `f32` channels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Color = Color::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Converts gamma-space RGB to linear space. Alpha is left untouched.
    pub fn gamma_to_linear(self) -> Self {
        Self::new(
            gamma_to_linear(self.r),
            gamma_to_linear(self.g),
            gamma_to_linear(self.b),
            self.a,
        )
    }

    pub fn linear_to_gamma(self) -> Self {
        Self::new(
            linear_to_gamma(self.r),
            linear_to_gamma(self.g),
            linear_to_gamma(self.b),
            self.a,
        )
    }

    /// Packs the color into 8-bit channels, clamping to `[0, 1]`.
    pub fn to_color32(self) -> Color32 {
        let pack = |c: f32| (c.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
        Color32 {
            r: pack(self.r),
            g: pack(self.g),
            b: pack(self.b),
            a: pack(self.a),
        }
    }
}

impl std::ops::Mul for Color {
    type Output = Color;

    fn mul(self, rhs: Color) -> Color {
        Color::new(self.r * rhs.r, self.g * rhs.g, self.b * rhs.b, self.a * rhs.a)
    }
}

/// Packed RGBA8 color, laid out exactly as the `RGBAub` vertex attribute.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct Color32 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

static_assertions::assert_eq_size!(Color32, u32);

impl Color32 {
    pub const WHITE: Color32 = Color32::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_color(self) -> Color {
        Color::new(
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        )
    }
}

/// sRGB electro-optical transfer function for a single channel.
pub fn gamma_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

pub fn linear_to_gamma(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_clamps() {
        let c = Color::new(2.0, -1.0, 0.5, 1.0).to_color32();
        assert_eq!(c, Color32::new(255, 0, 128, 255));
    }

    #[test]
    fn test_gamma_round_trip() {
        for i in 0..=10 {
            let v = i as f32 / 10.0;
            assert!((linear_to_gamma(gamma_to_linear(v)) - v).abs() < 1e-5);
        }
    }
}
