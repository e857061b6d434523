//! Sampler reuse.
//!
//! `wgpu::SamplerDescriptor` is not hashable, so samplers are keyed by a
//! copy of its fields with the float clamps stored as bits.

use std::hash::{Hash, Hasher};

use vesper_core::alloc::HashMap;
use vesper_core::profiling::profile_function;

use crate::backend::sampler_compare;
use crate::types::SamplerState;

use super::formats;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerKey {
    pub address_mode_u: wgpu::AddressMode,
    pub address_mode_v: wgpu::AddressMode,
    pub address_mode_w: wgpu::AddressMode,
    pub mag_filter: wgpu::FilterMode,
    pub min_filter: wgpu::FilterMode,
    pub mipmap_filter: wgpu::FilterMode,
    pub lod_min_clamp: u32, // f32 bits
    pub lod_max_clamp: u32, // f32 bits
    pub compare: Option<wgpu::CompareFunction>,
    pub anisotropy_clamp: u16,
    pub border_color: Option<wgpu::SamplerBorderColor>,
}

impl Hash for SamplerKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address_mode_u.hash(state);
        self.address_mode_v.hash(state);
        self.address_mode_w.hash(state);
        self.mag_filter.hash(state);
        self.min_filter.hash(state);
        self.mipmap_filter.hash(state);
        self.lod_min_clamp.hash(state);
        self.lod_max_clamp.hash(state);
        self.compare.hash(state);
        self.anisotropy_clamp.hash(state);
        self.border_color.hash(state);
    }
}

impl SamplerKey {
    /// Key for sampling with `state` through a binding of type `binding`.
    ///
    /// Non-filtering bindings force nearest filtering, and anisotropy is only
    /// kept when every filter is linear, as wgpu requires.
    pub fn from_state(state: &SamplerState, binding: wgpu::SamplerBindingType, border_clamp: bool) -> Self {
        let (address_mode_u, border_u) = formats::address_mode(state.wrap_u, border_clamp);
        let (address_mode_v, border_v) = formats::address_mode(state.wrap_v, border_clamp);
        let (address_mode_w, border_w) = formats::address_mode(state.wrap_w, border_clamp);

        let filtering = binding == wgpu::SamplerBindingType::Filtering;
        let pick = |filter: wgpu::FilterMode| if filtering { filter } else { wgpu::FilterMode::Nearest };
        let mag_filter = pick(formats::filter(state.mag_filter));
        let min_filter = pick(formats::filter(state.min_filter));
        let mipmap_filter = pick(formats::mipmap_filter(state.mipmap_filter));

        let all_linear = [mag_filter, min_filter, mipmap_filter]
            .iter()
            .all(|f| *f == wgpu::FilterMode::Linear);
        let anisotropy_clamp = if all_linear { state.max_anisotropy.clamp(1, 16) as u16 } else { 1 };

        let lod_min = state.min_lod.max(0.0);
        let lod_max = if state.mipmap_filter == crate::types::MipmapFilterMode::None {
            lod_min
        } else {
            state.max_lod.max(lod_min)
        };

        let compare = match binding {
            wgpu::SamplerBindingType::Comparison => sampler_compare(state).map(formats::compare),
            _ => None,
        };

        Self {
            address_mode_u,
            address_mode_v,
            address_mode_w,
            mag_filter,
            min_filter,
            mipmap_filter,
            lod_min_clamp: lod_min.to_bits(),
            lod_max_clamp: lod_max.to_bits(),
            compare,
            anisotropy_clamp,
            border_color: border_u.or(border_v).or(border_w),
        }
    }

    pub fn to_descriptor<'a>(&self, label: Option<&'a str>) -> wgpu::SamplerDescriptor<'a> {
        wgpu::SamplerDescriptor {
            label,
            address_mode_u: self.address_mode_u,
            address_mode_v: self.address_mode_v,
            address_mode_w: self.address_mode_w,
            mag_filter: self.mag_filter,
            min_filter: self.min_filter,
            mipmap_filter: self.mipmap_filter,
            lod_min_clamp: f32::from_bits(self.lod_min_clamp),
            lod_max_clamp: f32::from_bits(self.lod_max_clamp),
            compare: self.compare,
            anisotropy_clamp: self.anisotropy_clamp,
            border_color: self.border_color,
        }
    }
}

/// Samplers shared by every texture with an identical key.
#[derive(Default)]
pub struct SamplerCache {
    cache: HashMap<SamplerKey, wgpu::Sampler>,
}

impl SamplerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&mut self, device: &wgpu::Device, key: SamplerKey) -> wgpu::Sampler {
        profile_function!();
        self.cache
            .entry(key)
            .or_insert_with_key(|key| device.create_sampler(&key.to_descriptor(Some("Cached Sampler"))))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompareMode, FilterMode, MipmapFilterMode, WrapMode};
    use std::hash::BuildHasher;

    #[test]
    fn test_non_filtering_forces_nearest() {
        let state = SamplerState {
            max_anisotropy: 8,
            ..Default::default()
        };
        let key = SamplerKey::from_state(&state, wgpu::SamplerBindingType::NonFiltering, true);
        assert_eq!(key.mag_filter, wgpu::FilterMode::Nearest);
        assert_eq!(key.anisotropy_clamp, 1);
    }

    #[test]
    fn test_anisotropy_needs_linear_filters() {
        let mut state = SamplerState {
            max_anisotropy: 8,
            mipmap_filter: MipmapFilterMode::Linear,
            ..Default::default()
        };
        let key = SamplerKey::from_state(&state, wgpu::SamplerBindingType::Filtering, true);
        assert_eq!(key.anisotropy_clamp, 8);

        state.mag_filter = FilterMode::Nearest;
        let key = SamplerKey::from_state(&state, wgpu::SamplerBindingType::Filtering, true);
        assert_eq!(key.anisotropy_clamp, 1);
    }

    #[test]
    fn test_comparison_sampler_reverses_compare() {
        let state = SamplerState {
            depth_compare: Some(CompareMode::Less),
            ..Default::default()
        };
        let key = SamplerKey::from_state(&state, wgpu::SamplerBindingType::Comparison, false);
        assert_eq!(key.compare, Some(wgpu::CompareFunction::Greater));

        let key = SamplerKey::from_state(&state, wgpu::SamplerBindingType::NonFiltering, false);
        assert_eq!(key.compare, None);
    }

    #[test]
    fn test_equal_states_hash_equal() {
        let state = SamplerState {
            wrap_u: WrapMode::ClampZero,
            ..Default::default()
        };
        let a = SamplerKey::from_state(&state, wgpu::SamplerBindingType::Filtering, true);
        let b = SamplerKey::from_state(&state, wgpu::SamplerBindingType::Filtering, true);
        assert_eq!(a, b);
        assert_eq!(a.border_color, Some(wgpu::SamplerBorderColor::TransparentBlack));
        assert_eq!(vesper_core::alloc::stable_hash(&a), vesper_core::alloc::stable_hash(&b));
    }
}
