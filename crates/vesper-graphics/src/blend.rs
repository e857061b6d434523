//! Blend equations and the named blend mode presets.

use crate::types::named_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOperation {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
    OneMinusDstColor,
    DstAlpha,
    OneMinusDstAlpha,
    SrcAlphaSaturated,
}

/// Full blend equation, per color and alpha channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub enable: bool,
    pub operation_rgb: BlendOperation,
    pub operation_a: BlendOperation,
    pub src_factor_rgb: BlendFactor,
    pub src_factor_a: BlendFactor,
    pub dst_factor_rgb: BlendFactor,
    pub dst_factor_a: BlendFactor,
}

impl BlendState {
    pub const DISABLED: BlendState = BlendState {
        enable: false,
        operation_rgb: BlendOperation::Add,
        operation_a: BlendOperation::Add,
        src_factor_rgb: BlendFactor::One,
        src_factor_a: BlendFactor::One,
        dst_factor_rgb: BlendFactor::Zero,
        dst_factor_a: BlendFactor::Zero,
    };

    pub const fn new(op: BlendOperation, src_rgb: BlendFactor, src_a: BlendFactor, dst_rgb: BlendFactor, dst_a: BlendFactor) -> Self {
        BlendState {
            enable: true,
            operation_rgb: op,
            operation_a: op,
            src_factor_rgb: src_rgb,
            src_factor_a: src_a,
            dst_factor_rgb: dst_rgb,
            dst_factor_a: dst_a,
        }
    }

    /// Whether the equation needs min/max blend support.
    pub fn uses_min_max(&self) -> bool {
        self.enable
            && (matches!(self.operation_rgb, BlendOperation::Min | BlendOperation::Max)
                || matches!(self.operation_a, BlendOperation::Min | BlendOperation::Max))
    }
}

impl Default for BlendState {
    fn default() -> Self {
        compute_blend_state(BlendMode::Alpha, BlendAlpha::Multiply)
    }
}

named_enum! {
    pub enum BlendMode {
        Alpha => "alpha",
        Add => "add",
        Subtract => "subtract",
        Multiply => "multiply",
        Lighten => "lighten",
        Darken => "darken",
        Screen => "screen",
        Replace => "replace",
        None => "none",
    }
}

named_enum! {
    pub enum BlendAlpha {
        Multiply => "alphamultiply",
        Premultiplied => "premultiplied",
    }
}

impl BlendMode {
    /// Modes whose math is only defined for premultiplied source colors.
    pub fn requires_premultiplied(self) -> bool {
        matches!(self, BlendMode::Multiply | BlendMode::Lighten | BlendMode::Darken)
    }
}

/// Builds the blend equation for a named mode.
pub fn compute_blend_state(mode: BlendMode, alpha: BlendAlpha) -> BlendState {
    use BlendFactor::*;
    use BlendOperation as Op;

    let mut state = match mode {
        BlendMode::Alpha => BlendState::new(Op::Add, One, One, OneMinusSrcAlpha, OneMinusSrcAlpha),
        BlendMode::Multiply => BlendState::new(Op::Add, DstColor, DstColor, Zero, Zero),
        BlendMode::Subtract => BlendState::new(Op::ReverseSubtract, One, Zero, One, One),
        BlendMode::Add => BlendState::new(Op::Add, One, Zero, One, One),
        BlendMode::Lighten => BlendState::new(Op::Max, One, One, One, One),
        BlendMode::Darken => BlendState::new(Op::Min, One, One, One, One),
        BlendMode::Screen => BlendState::new(Op::Add, One, One, OneMinusSrcColor, OneMinusSrcColor),
        BlendMode::Replace => BlendState::new(Op::Add, One, One, Zero, Zero),
        BlendMode::None => BlendState::DISABLED,
    };

    // Non-premultiplied sources get their color scaled by alpha in the blend unit.
    if state.enable && alpha == BlendAlpha::Multiply && state.src_factor_rgb == One {
        state.src_factor_rgb = SrcAlpha;
    }

    state
}

/// Maps a blend equation back to the named mode that produces it, if any.
pub fn compute_blend_mode(state: &BlendState) -> Option<(BlendMode, BlendAlpha)> {
    for mode in BlendMode::ALL {
        for alpha in BlendAlpha::ALL {
            if mode.requires_premultiplied() && *alpha == BlendAlpha::Multiply {
                continue;
            }
            let candidate = compute_blend_state(*mode, *alpha);
            if candidate == *state || (!state.enable && !candidate.enable) {
                return Some((*mode, *alpha));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpha_multiply_scales_source() {
        let state = compute_blend_state(BlendMode::Alpha, BlendAlpha::Multiply);
        assert_eq!(state.src_factor_rgb, BlendFactor::SrcAlpha);
        assert_eq!(state.src_factor_a, BlendFactor::One);
        assert_eq!(state.dst_factor_rgb, BlendFactor::OneMinusSrcAlpha);

        let pre = compute_blend_state(BlendMode::Alpha, BlendAlpha::Premultiplied);
        assert_eq!(pre.src_factor_rgb, BlendFactor::One);
    }

    #[test]
    fn test_mode_round_trip() {
        for mode in BlendMode::ALL {
            let alpha = if mode.requires_premultiplied() {
                BlendAlpha::Premultiplied
            } else {
                BlendAlpha::Multiply
            };
            let state = compute_blend_state(*mode, alpha);
            assert_eq!(compute_blend_mode(&state), Some((*mode, alpha)), "{mode}");
        }
    }

    #[test]
    fn test_lighten_needs_min_max() {
        assert!(compute_blend_state(BlendMode::Lighten, BlendAlpha::Premultiplied).uses_min_max());
        assert!(!BlendState::default().uses_min_max());
    }
}
