//! Fences for frame pacing tests.
//!
//! A [`MockFence`] starts unsignaled. Waiting on it counts the wait and
//! signals it, the same as a GPU finishing the frame while the CPU blocks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use vesper_graphics::backend::frame::Fence;
use vesper_graphics::error::{GraphicsError, GraphicsResult};

#[derive(Debug, Default)]
struct FenceState {
    signaled: AtomicBool,
    lost: AtomicBool,
    waits: AtomicU32,
}

/// Shared mock fence. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct MockFence(Arc<FenceState>);

impl MockFence {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fence whose device was lost. Waiting fails.
    pub fn lost() -> Self {
        let fence = Self::default();
        fence.0.lost.store(true, Ordering::SeqCst);
        fence
    }

    /// Marks the work as finished without a wait.
    pub fn signal(&self) {
        self.0.signaled.store(true, Ordering::SeqCst);
    }

    /// How many times [`Fence::wait`] was called.
    pub fn wait_count(&self) -> u32 {
        self.0.waits.load(Ordering::SeqCst)
    }
}

impl Fence for MockFence {
    fn wait(&self) -> GraphicsResult<()> {
        self.0.waits.fetch_add(1, Ordering::SeqCst);
        if self.0.lost.load(Ordering::SeqCst) {
            return Err(GraphicsError::Backend("Device lost while waiting on a fence".to_string()));
        }
        self.signal();
        Ok(())
    }

    fn is_signaled(&self) -> bool {
        self.0.signaled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_signals() {
        let fence = MockFence::new();
        let observer = fence.clone();
        assert!(!observer.is_signaled());

        fence.wait().unwrap();
        assert!(observer.is_signaled());
        assert_eq!(observer.wait_count(), 1);
    }

    #[test]
    fn test_lost_fence_fails() {
        let fence = MockFence::lost();
        assert!(fence.wait().is_err());
        assert!(!fence.is_signaled());
    }
}
