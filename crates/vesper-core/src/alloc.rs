//! Hash collections backed by AHash.
//!
//! Lookups in the graphics caches (pipelines, framebuffers, shader stages)
//! sit on hot paths, so every map in the workspace goes through these aliases.

pub use ahash::{AHashMap as HashMap, AHashSet as HashSet, RandomState};

/// Hashes a value with a fixed-seed AHash state.
///
/// Unlike [`RandomState::new`], the result is stable for the lifetime of the
/// process, which lets it serve as a content key.
pub fn stable_hash<T: std::hash::Hash + ?Sized>(value: &T) -> u64 {
    RandomState::with_seeds(0x5f1d_3a0b, 0x9e37_79b9, 0x7f4a_7c15, 0x2545_f491).hash_one(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashmap_ahash() {
        let mut map = HashMap::new();
        map.insert("key", "value");
        assert_eq!(map.get("key"), Some(&"value"));
    }

    #[test]
    fn test_stable_hash_is_deterministic() {
        assert_eq!(stable_hash("void main() {}"), stable_hash("void main() {}"));
        assert_ne!(stable_hash("a"), stable_hash("b"));
    }
}
