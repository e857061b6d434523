//! Pools of short-lived textures and buffers.
//!
//! Entries are checked out while in use and checked back in afterwards. A
//! checked-in entry ages by one every frame and is evicted once it has sat
//! idle for the configured number of frames. Requesting a matching shape
//! before then hands the same resource back.

use crate::pixel_format::PixelFormat;
use crate::types::{BufferDataUsage, BufferUsage, IndexFormat};

/// Shape key of a temporary texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureShape {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub msaa: u32,
}

/// Shape key of a temporary buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferShape {
    pub size: u64,
    pub usage: BufferUsage,
    pub data_usage: BufferDataUsage,
    pub index_format: Option<IndexFormat>,
}

const CHECKED_OUT: i32 = -1;

#[derive(Debug)]
struct Entry<S, R> {
    shape: S,
    resource: R,
    frames_since_use: i32,
}

#[derive(Debug)]
pub struct TemporaryPool<S, R> {
    entries: Vec<Entry<S, R>>,
    max_idle_frames: i32,
}

impl<S: PartialEq + Clone, R: Clone + PartialEq> TemporaryPool<S, R> {
    pub fn new(max_idle_frames: u32) -> Self {
        Self {
            entries: Vec::new(),
            max_idle_frames: max_idle_frames.min(i32::MAX as u32) as i32,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks out an idle entry of `shape`, or creates and checks out a new one.
    pub fn acquire_with<E>(&mut self, shape: &S, create: impl FnOnce(&S) -> Result<R, E>) -> Result<R, E> {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.frames_since_use != CHECKED_OUT && e.shape == *shape)
        {
            entry.frames_since_use = CHECKED_OUT;
            return Ok(entry.resource.clone());
        }

        let resource = create(shape)?;
        self.entries.push(Entry {
            shape: shape.clone(),
            resource: resource.clone(),
            frames_since_use: CHECKED_OUT,
        });
        Ok(resource)
    }

    /// Checks `resource` back in. Unknown resources are ignored.
    pub fn release(&mut self, resource: &R) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.resource == *resource) {
            entry.frames_since_use = 0;
        }
    }

    /// Ages checked-in entries and returns the ones that passed the idle threshold.
    pub fn update(&mut self) -> Vec<R> {
        let mut evicted = Vec::new();
        for i in (0..self.entries.len()).rev() {
            let age = self.entries[i].frames_since_use;
            if age >= self.max_idle_frames {
                evicted.push(self.entries.swap_remove(i).resource);
            } else if age >= 0 {
                self.entries[i].frames_since_use += 1;
            }
        }
        evicted
    }

    /// Drops every entry regardless of state.
    pub fn clear(&mut self) -> Vec<R> {
        self.entries.drain(..).map(|e| e.resource).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(w: u32) -> TextureShape {
        TextureShape {
            format: PixelFormat::Depth16Unorm,
            width: w,
            height: w,
            msaa: 1,
        }
    }

    #[test]
    fn test_release_then_acquire_reuses() {
        let mut pool: TemporaryPool<TextureShape, u32> = TemporaryPool::new(16);
        let mut created = 0;
        let mut create = |_: &TextureShape| -> Result<u32, ()> {
            created += 1;
            Ok(created)
        };

        let a = pool.acquire_with(&shape(8), &mut create).unwrap();
        pool.release(&a);
        let b = pool.acquire_with(&shape(8), &mut create).unwrap();
        assert_eq!(a, b);
        assert_eq!(pool.len(), 1);

        // Checked out entries are never handed out twice.
        let c = pool.acquire_with(&shape(8), &mut create).unwrap();
        assert_ne!(b, c);

        // Different shape never matches.
        pool.release(&c);
        let d = pool.acquire_with(&shape(16), &mut create).unwrap();
        assert_ne!(c, d);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_eviction_after_idle_threshold() {
        let mut pool: TemporaryPool<TextureShape, u32> = TemporaryPool::new(3);
        let r = pool.acquire_with(&shape(4), |_| Ok::<_, ()>(7)).unwrap();

        // Checked out entries never age.
        for _ in 0..10 {
            assert!(pool.update().is_empty());
        }

        pool.release(&r);
        for _ in 0..3 {
            assert!(pool.update().is_empty());
        }
        assert_eq!(pool.update(), vec![7]);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_failed_creation_leaves_pool_untouched() {
        let mut pool: TemporaryPool<TextureShape, u32> = TemporaryPool::new(3);
        assert_eq!(pool.acquire_with(&shape(4), |_| Err("oom")), Err("oom"));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_clear_returns_everything() {
        let mut pool: TemporaryPool<BufferShape, u32> = TemporaryPool::new(3);
        let shape = BufferShape {
            size: 64,
            usage: BufferUsage::VERTEX,
            data_usage: BufferDataUsage::Stream,
            index_format: None,
        };
        pool.acquire_with(&shape, |_| Ok::<_, ()>(1)).unwrap();
        pool.acquire_with(&shape, |_| Ok::<_, ()>(2)).unwrap();
        let mut all = pool.clear();
        all.sort();
        assert_eq!(all, vec![1, 2]);
    }
}
