//! Frames-in-flight pacing.
//!
//! Each of the N slots records one frame at a time. Starting a frame on a
//! slot first waits for the fence of the frame that last used it, which caps
//! how far the CPU may run ahead of the GPU. Work that must wait until the
//! GPU is done with a frame (destroying resources it references) is queued
//! on that frame's slot and handed back once its fence has signaled.

use vesper_core::profiling::profile_function;

use crate::error::{GraphicsError, GraphicsResult};

/// Completion signal for submitted GPU work.
pub trait Fence {
    /// Blocks until the work has completed.
    fn wait(&self) -> GraphicsResult<()>;
    fn is_signaled(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Recording,
    Submitted,
}

#[derive(Debug)]
struct FrameSlot<F, T> {
    fence: Option<F>,
    state: FrameState,
    cleanup: Vec<T>,
}

#[derive(Debug)]
pub struct FramePacer<F, T> {
    slots: Vec<FrameSlot<F, T>>,
    current: usize,
    frame_index: u64,
}

impl<F: Fence, T> FramePacer<F, T> {
    pub fn new(frames_in_flight: u32) -> Self {
        let slots = (0..frames_in_flight.max(1))
            .map(|_| FrameSlot {
                fence: None,
                state: FrameState::Idle,
                cleanup: Vec::new(),
            })
            .collect();
        Self {
            slots,
            current: 0,
            frame_index: 0,
        }
    }

    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    pub fn current_slot(&self) -> usize {
        self.current
    }

    /// Number of frames submitted so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn state(&self, slot: usize) -> FrameState {
        self.slots[slot].state
    }

    pub fn is_recording(&self) -> bool {
        self.slots[self.current].state == FrameState::Recording
    }

    /// Waits for the current slot's previous frame and starts recording on it.
    ///
    /// Returns the cleanup work that was waiting on that frame. Calling this
    /// again while already recording is a no-op.
    pub fn begin_frame(&mut self) -> GraphicsResult<Vec<T>> {
        profile_function!();
        let slot = &mut self.slots[self.current];
        if slot.state == FrameState::Recording {
            return Ok(Vec::new());
        }

        if let Some(fence) = slot.fence.take() {
            if let Err(err) = fence.wait() {
                slot.fence = Some(fence);
                return Err(err);
            }
        }

        slot.state = FrameState::Recording;
        Ok(std::mem::take(&mut slot.cleanup))
    }

    /// Queues `item` until the GPU is done with every frame recorded so far.
    pub fn defer(&mut self, item: T) {
        let n = self.slots.len();
        let slot = if self.is_recording() { self.current } else { (self.current + n - 1) % n };
        self.slots[slot].cleanup.push(item);
    }

    /// Hands the current frame to the GPU and moves to the next slot.
    pub fn submit(&mut self, fence: F) -> GraphicsResult<()> {
        let slot = &mut self.slots[self.current];
        if slot.state != FrameState::Recording {
            return Err(GraphicsError::backend("Submitting a frame that was never begun"));
        }
        slot.fence = Some(fence);
        slot.state = FrameState::Submitted;
        self.current = (self.current + 1) % self.slots.len();
        self.frame_index += 1;
        Ok(())
    }

    /// Collects cleanup work of submitted frames whose fences have already signaled.
    pub fn poll_completed(&mut self) -> Vec<T> {
        let mut done = Vec::new();
        for slot in &mut self.slots {
            if slot.state == FrameState::Submitted && slot.fence.as_ref().is_some_and(Fence::is_signaled) {
                slot.fence = None;
                slot.state = FrameState::Idle;
                done.append(&mut slot.cleanup);
            }
        }
        done
    }

    /// Waits for every submitted frame and returns all pending cleanup work.
    pub fn wait_all(&mut self) -> GraphicsResult<Vec<T>> {
        let mut done = Vec::new();
        for slot in &mut self.slots {
            if let Some(fence) = slot.fence.take() {
                fence.wait()?;
            }
            if slot.state == FrameState::Submitted {
                slot.state = FrameState::Idle;
            }
            done.append(&mut slot.cleanup);
        }
        Ok(done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct TestFence {
        signaled: Rc<Cell<bool>>,
        waits: Rc<Cell<u32>>,
    }

    impl Fence for TestFence {
        fn wait(&self) -> GraphicsResult<()> {
            self.waits.set(self.waits.get() + 1);
            self.signaled.set(true);
            Ok(())
        }

        fn is_signaled(&self) -> bool {
            self.signaled.get()
        }
    }

    #[test]
    fn test_waits_only_when_slot_reused() {
        let mut pacer: FramePacer<TestFence, u32> = FramePacer::new(2);
        let fences = [TestFence::default(), TestFence::default()];

        pacer.begin_frame().unwrap();
        pacer.submit(fences[0].clone()).unwrap();
        pacer.begin_frame().unwrap();
        pacer.submit(fences[1].clone()).unwrap();
        assert_eq!(fences[0].waits.get(), 0);

        pacer.begin_frame().unwrap();
        assert_eq!(fences[0].waits.get(), 1);
        assert_eq!(fences[1].waits.get(), 0);
        assert_eq!(pacer.current_slot(), 0);
        assert_eq!(pacer.frame_index(), 2);
    }

    #[test]
    fn test_cleanup_runs_after_owning_frame() {
        let mut pacer: FramePacer<TestFence, &str> = FramePacer::new(2);

        pacer.begin_frame().unwrap();
        pacer.defer("frame0");
        pacer.submit(TestFence::default()).unwrap();

        // Between frames, releases attach to the last submitted frame.
        pacer.defer("between");

        assert!(pacer.begin_frame().unwrap().is_empty());
        pacer.submit(TestFence::default()).unwrap();

        let cleanup = pacer.begin_frame().unwrap();
        assert_eq!(cleanup, vec!["frame0", "between"]);
    }

    #[test]
    fn test_poll_and_wait_all() {
        let mut pacer: FramePacer<TestFence, u32> = FramePacer::new(3);
        let fence = TestFence::default();
        pacer.begin_frame().unwrap();
        pacer.defer(1);
        pacer.submit(fence.clone()).unwrap();

        assert!(pacer.poll_completed().is_empty());
        fence.signaled.set(true);
        assert_eq!(pacer.poll_completed(), vec![1]);
        assert_eq!(pacer.state(0), FrameState::Idle);

        pacer.begin_frame().unwrap();
        pacer.defer(2);
        pacer.submit(TestFence::default()).unwrap();
        assert_eq!(pacer.wait_all().unwrap(), vec![2]);
    }

    #[test]
    fn test_submit_requires_recording() {
        let mut pacer: FramePacer<TestFence, u32> = FramePacer::new(1);
        assert!(pacer.submit(TestFence::default()).is_err());
    }
}
