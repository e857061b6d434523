//! Deduplication of compiled shader stages.
//!
//! Stages compiled from identical source share one backend object. The cache
//! only holds weak references: once every shader using a stage is gone the
//! stage is released as usual and its entry is dropped.

use std::sync::Weak;

use vesper_core::alloc::{HashMap, stable_hash};

use crate::resource::{ResourceId, ShaderStage, ShaderStageInner};
use crate::types::ShaderStageType;

/// Preprocessor defines passed alongside shader source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderCompileOptions {
    pub defines: Vec<(String, String)>,
}

/// Hash identifying a stage's source text.
pub fn source_key(source: &str) -> u64 {
    stable_hash(source)
}

/// Stages with custom defines or compute stages are never shared.
pub fn is_cacheable(stage: ShaderStageType, source: &str, options: &ShaderCompileOptions) -> bool {
    stage != ShaderStageType::Compute && options.defines.is_empty() && !source.is_empty()
}

#[derive(Debug, Default)]
pub struct ShaderStageCache {
    stages: [HashMap<u64, Weak<ShaderStageInner>>; 3],
}

impl ShaderStageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, stage: ShaderStageType, key: u64) -> Option<ShaderStage> {
        self.stages[stage.index()].get(&key).and_then(Weak::upgrade).map(ShaderStage)
    }

    pub fn insert(&mut self, stage: &ShaderStage) {
        self.stages[stage.stage().index()].insert(stage.source_hash(), stage.downgrade());
    }

    /// Forgets the entry for a released stage, unless a newer stage took its key.
    pub fn remove(&mut self, stage: ShaderStageType, key: u64, id: ResourceId) {
        let map = &mut self.stages[stage.index()];
        let stale = match map.get(&key).and_then(Weak::upgrade) {
            Some(live) => ShaderStage(live).id() == id,
            None => true,
        };
        if stale {
            map.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.stages.iter().map(|m| m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        for map in &mut self.stages {
            map.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ReleaseQueue;

    #[test]
    fn test_identical_source_shares_stage() {
        let release = ReleaseQueue::new();
        let mut cache = ShaderStageCache::new();
        let key = source_key("void main() {}");

        let stage = ShaderStage::new(ShaderStageType::Pixel, key, release.clone());
        cache.insert(&stage);

        let hit = cache.get(ShaderStageType::Pixel, key).unwrap();
        assert_eq!(hit.id(), stage.id());
        assert!(cache.get(ShaderStageType::Vertex, key).is_none());
    }

    #[test]
    fn test_dead_stage_is_not_returned() {
        let release = ReleaseQueue::new();
        let mut cache = ShaderStageCache::new();
        let stage = ShaderStage::new(ShaderStageType::Vertex, 1, release.clone());
        let id = stage.id();
        cache.insert(&stage);
        drop(stage);

        assert!(cache.get(ShaderStageType::Vertex, 1).is_none());
        cache.remove(ShaderStageType::Vertex, 1, id);
        assert!(cache.is_empty());
        assert_eq!(release.len(), 1);
    }

    #[test]
    fn test_remove_keeps_replacement() {
        let release = ReleaseQueue::new();
        let mut cache = ShaderStageCache::new();
        let old = ShaderStage::new(ShaderStageType::Vertex, 1, release.clone());
        let old_id = old.id();
        drop(old);

        let new = ShaderStage::new(ShaderStageType::Vertex, 1, release.clone());
        cache.insert(&new);
        cache.remove(ShaderStageType::Vertex, 1, old_id);
        assert_eq!(cache.get(ShaderStageType::Vertex, 1).map(|s| s.id()), Some(new.id()));
    }

    #[test]
    fn test_cacheability() {
        let none = ShaderCompileOptions::default();
        let defines = ShaderCompileOptions {
            defines: vec![("FOO".into(), "1".into())],
        };
        assert!(is_cacheable(ShaderStageType::Vertex, "x", &none));
        assert!(!is_cacheable(ShaderStageType::Vertex, "x", &defines));
        assert!(!is_cacheable(ShaderStageType::Compute, "x", &none));
        assert!(!is_cacheable(ShaderStageType::Pixel, "", &none));
        assert_eq!(source_key("abc"), source_key("abc"));
        assert_ne!(source_key("abc"), source_key("abd"));
    }
}
