//! Frames-in-flight pacing tests with mock fences (no GPU required).

use vesper_graphics::backend::frame::{FramePacer, FrameState};
use vesper_test_utils::MockFence;

#[test]
fn test_third_frame_waits_on_first() {
    let mut pacer: FramePacer<MockFence, ()> = FramePacer::new(2);
    let fences = [MockFence::new(), MockFence::new()];

    for fence in &fences {
        pacer.begin_frame().unwrap();
        pacer.submit(fence.clone()).unwrap();
    }
    assert_eq!(fences[0].wait_count(), 0);
    assert_eq!(fences[1].wait_count(), 0);

    // Slot 0 is reused, so its previous frame must be complete first.
    pacer.begin_frame().unwrap();
    assert_eq!(fences[0].wait_count(), 1);
    assert_eq!(fences[1].wait_count(), 0);
    assert!(pacer.is_recording());
}

#[test]
fn test_signaled_fence_is_not_waited_on_by_poll() {
    let mut pacer: FramePacer<MockFence, u32> = FramePacer::new(3);
    let fence = MockFence::new();

    pacer.begin_frame().unwrap();
    pacer.defer(7);
    pacer.submit(fence.clone()).unwrap();
    assert!(pacer.poll_completed().is_empty());
    assert_eq!(pacer.state(0), FrameState::Submitted);

    fence.signal();
    assert_eq!(pacer.poll_completed(), vec![7]);
    assert_eq!(pacer.state(0), FrameState::Idle);
    assert_eq!(fence.wait_count(), 0);
}

#[test]
fn test_cleanup_waits_for_owning_frame() {
    let mut pacer: FramePacer<MockFence, &str> = FramePacer::new(2);
    let first = MockFence::new();
    let second = MockFence::new();

    pacer.begin_frame().unwrap();
    pacer.defer("texture");
    pacer.submit(first.clone()).unwrap();

    pacer.begin_frame().unwrap();
    pacer.submit(second.clone()).unwrap();

    let released = pacer.begin_frame().unwrap();
    assert_eq!(released, vec!["texture"]);
    assert_eq!(second.wait_count(), 0);
}

#[test]
fn test_lost_device_surfaces_error() {
    let mut pacer: FramePacer<MockFence, ()> = FramePacer::new(1);

    pacer.begin_frame().unwrap();
    pacer.submit(MockFence::lost()).unwrap();

    assert!(pacer.begin_frame().is_err());
    assert!(!pacer.is_recording());
}

#[test]
fn test_wait_all_drains_every_frame() {
    let mut pacer: FramePacer<MockFence, u32> = FramePacer::new(2);
    let fences = [MockFence::new(), MockFence::new()];

    for (i, fence) in fences.iter().enumerate() {
        pacer.begin_frame().unwrap();
        pacer.defer(i as u32);
        pacer.submit(fence.clone()).unwrap();
    }

    let mut done = pacer.wait_all().unwrap();
    done.sort();
    assert_eq!(done, vec![0, 1]);
    assert!(fences.iter().all(|f| f.wait_count() == 1));
    assert_eq!(pacer.frame_index(), 2);
}

#[test]
fn test_submit_without_begin_fails() {
    let mut pacer: FramePacer<MockFence, ()> = FramePacer::new(2);
    assert!(pacer.submit(MockFence::new()).is_err());
}
