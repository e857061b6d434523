//! GPU to CPU readbacks.
//!
//! A backend starts a copy and hands back a [`ReadbackTask`] that can be
//! polled for completion. Asynchronous readbacks are polled once per frame by
//! the [`ReadbackQueue`]; immediate ones block on the task straight away.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{GraphicsError, GraphicsResult};
use crate::pixel_format::PixelFormat;
use crate::resource::ResourceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadbackMethod {
    /// Block until the data is available.
    Immediate,
    /// Complete on a later frame.
    Async,
}

/// Result of polling a backend copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadbackPoll {
    Pending,
    Ready(Vec<u8>),
    Failed(String),
}

/// A copy in flight on the GPU.
pub trait ReadbackTask: Send {
    /// Checks for completion. With `wait` set, blocks until the copy resolves.
    fn poll(&mut self, wait: bool) -> ReadbackPoll;
}

/// A task that is already resolved, for backends that copy synchronously.
#[derive(Debug)]
pub struct CompletedReadback(Option<ReadbackPoll>);

impl CompletedReadback {
    pub fn ready(data: Vec<u8>) -> Self {
        Self(Some(ReadbackPoll::Ready(data)))
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self(Some(ReadbackPoll::Failed(reason.into())))
    }
}

impl ReadbackTask for CompletedReadback {
    fn poll(&mut self, _wait: bool) -> ReadbackPoll {
        self.0.take().unwrap_or_else(|| ReadbackPoll::Failed("Readback already consumed".to_string()))
    }
}

/// What a readback copies from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadbackSource {
    Buffer {
        id: ResourceId,
        offset: u64,
        size: u64,
    },
    Texture {
        id: ResourceId,
        slice: u32,
        mipmap: u32,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        format: PixelFormat,
    },
    /// The backbuffer as tightly packed RGBA8 rows, top row first.
    Screen { width: u32, height: u32 },
}

impl ReadbackSource {
    /// Bytes the readback produces.
    pub fn size(&self) -> u64 {
        match *self {
            ReadbackSource::Buffer { size, .. } => size,
            ReadbackSource::Texture {
                width, height, format, ..
            } => format.slice_size(width, height),
            ReadbackSource::Screen { width, height } => width as u64 * height as u64 * 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadbackStatus {
    Pending,
    Complete,
    Failed(String),
}

struct ReadbackState {
    task: Option<Box<dyn ReadbackTask>>,
    status: ReadbackStatus,
    data: Option<Arc<[u8]>>,
}

impl ReadbackState {
    fn update(&mut self, wait: bool) {
        let Some(task) = self.task.as_mut() else {
            return;
        };
        match task.poll(wait) {
            ReadbackPoll::Pending => return,
            ReadbackPoll::Ready(bytes) => {
                self.data = Some(bytes.into());
                self.status = ReadbackStatus::Complete;
            }
            ReadbackPoll::Failed(reason) => {
                tracing::warn!("Readback failed: {}", reason);
                self.status = ReadbackStatus::Failed(reason);
            }
        }
        self.task = None;
    }
}

/// Shared handle to a readback. Clones observe the same completion.
#[derive(Clone)]
pub struct Readback {
    method: ReadbackMethod,
    source: ReadbackSource,
    state: Arc<Mutex<ReadbackState>>,
}

impl std::fmt::Debug for Readback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Readback")
            .field("method", &self.method)
            .field("source", &self.source)
            .field("status", &self.status())
            .finish()
    }
}

impl Readback {
    pub fn new(method: ReadbackMethod, source: ReadbackSource, task: Box<dyn ReadbackTask>) -> Self {
        Self {
            method,
            source,
            state: Arc::new(Mutex::new(ReadbackState {
                task: Some(task),
                status: ReadbackStatus::Pending,
                data: None,
            })),
        }
    }

    /// A readback whose backend copy is started later with [`Readback::start`].
    pub fn deferred(method: ReadbackMethod, source: ReadbackSource) -> Self {
        Self {
            method,
            source,
            state: Arc::new(Mutex::new(ReadbackState {
                task: None,
                status: ReadbackStatus::Pending,
                data: None,
            })),
        }
    }

    /// Hands a deferred readback its backend copy.
    pub fn start(&self, task: Box<dyn ReadbackTask>) {
        let mut state = self.state.lock();
        if state.status == ReadbackStatus::Pending {
            state.task = Some(task);
        }
    }

    /// Resolves a readback as failed without a backend copy.
    pub fn fail(&self, reason: impl Into<String>) {
        let mut state = self.state.lock();
        if state.status == ReadbackStatus::Pending {
            let reason = reason.into();
            tracing::warn!("Readback failed: {}", reason);
            state.task = None;
            state.status = ReadbackStatus::Failed(reason);
        }
    }

    pub fn method(&self) -> ReadbackMethod {
        self.method
    }

    pub fn source(&self) -> ReadbackSource {
        self.source
    }

    pub fn status(&self) -> ReadbackStatus {
        self.state.lock().status.clone()
    }

    pub fn is_complete(&self) -> bool {
        !matches!(self.state.lock().status, ReadbackStatus::Pending)
    }

    pub fn has_error(&self) -> bool {
        matches!(self.state.lock().status, ReadbackStatus::Failed(_))
    }

    /// The copied bytes, once complete.
    pub fn data(&self) -> Option<Arc<[u8]>> {
        self.state.lock().data.clone()
    }

    /// Polls without blocking.
    pub fn update(&self) {
        self.state.lock().update(false);
    }

    /// Blocks until the readback resolves.
    pub fn wait(&self) -> GraphicsResult<Arc<[u8]>> {
        let mut state = self.state.lock();
        state.update(true);
        match (&state.status, &state.data) {
            (ReadbackStatus::Complete, Some(data)) => Ok(data.clone()),
            (ReadbackStatus::Failed(reason), _) => Err(GraphicsError::backend(reason.clone())),
            _ if state.task.is_none() => Err(GraphicsError::usage("The readback has not been started yet.")),
            _ => Err(GraphicsError::backend("Readback did not complete")),
        }
    }
}

/// Asynchronous readbacks awaiting completion.
#[derive(Debug, Default)]
pub struct ReadbackQueue {
    pending: Vec<Readback>,
}

impl ReadbackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, readback: Readback) {
        self.pending.push(readback);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Polls every pending readback and drops the completed ones.
    pub fn update(&mut self) {
        for i in (0..self.pending.len()).rev() {
            self.pending[i].update();
            if self.pending[i].is_complete() {
                self.pending.swap_remove(i);
            }
        }
    }

    /// Blocks on every pending readback.
    pub fn wait_all(&mut self) {
        for readback in self.pending.drain(..) {
            let _ = readback.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountdownTask {
        remaining: u32,
        data: Vec<u8>,
    }

    impl ReadbackTask for CountdownTask {
        fn poll(&mut self, wait: bool) -> ReadbackPoll {
            if wait {
                self.remaining = 0;
            }
            if self.remaining == 0 {
                ReadbackPoll::Ready(std::mem::take(&mut self.data))
            } else {
                self.remaining -= 1;
                ReadbackPoll::Pending
            }
        }
    }

    fn source() -> ReadbackSource {
        ReadbackSource::Buffer {
            id: ResourceId::next(),
            offset: 0,
            size: 3,
        }
    }

    #[test]
    fn test_async_completes_after_polls() {
        let task = CountdownTask {
            remaining: 2,
            data: vec![1, 2, 3],
        };
        let readback = Readback::new(ReadbackMethod::Async, source(), Box::new(task));
        let mut queue = ReadbackQueue::new();
        queue.push(readback.clone());

        queue.update();
        queue.update();
        assert!(!readback.is_complete());
        assert_eq!(queue.len(), 1);

        queue.update();
        assert!(readback.is_complete());
        assert!(queue.is_empty());
        assert_eq!(&*readback.data().unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn test_wait_blocks_to_completion() {
        let task = CountdownTask {
            remaining: 100,
            data: vec![9],
        };
        let readback = Readback::new(ReadbackMethod::Immediate, source(), Box::new(task));
        assert_eq!(&*readback.wait().unwrap(), &[9]);
        assert_eq!(readback.status(), ReadbackStatus::Complete);
    }

    #[test]
    fn test_failure_is_reported() {
        let readback = Readback::new(ReadbackMethod::Async, source(), Box::new(CompletedReadback::failed("lost")));
        readback.update();
        assert!(readback.has_error());
        assert!(readback.data().is_none());
        assert!(readback.wait().is_err());
    }

    #[test]
    fn test_deferred_stays_pending_until_started() {
        let readback = Readback::deferred(ReadbackMethod::Async, ReadbackSource::Screen { width: 2, height: 1 });
        readback.update();
        assert_eq!(readback.status(), ReadbackStatus::Pending);
        assert!(matches!(readback.wait(), Err(GraphicsError::Usage(_))));

        readback.start(Box::new(CompletedReadback::ready(vec![7; 8])));
        readback.update();
        assert_eq!(readback.status(), ReadbackStatus::Complete);
        assert_eq!(readback.data().unwrap().len(), readback.source().size() as usize);
    }

    #[test]
    fn test_failed_deferred_ignores_later_start() {
        let readback = Readback::deferred(ReadbackMethod::Async, ReadbackSource::Screen { width: 1, height: 1 });
        readback.fail("gone");
        readback.start(Box::new(CompletedReadback::ready(vec![0; 4])));
        readback.update();
        assert_eq!(readback.status(), ReadbackStatus::Failed("gone".to_string()));
    }
}
