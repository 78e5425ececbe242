use bytes::Bytes;
use parking_lot::Mutex;
use std::pin::pin;
use tokio::sync::Notify;
use tracing::debug;

use crate::error::{FsError, Result};

/// Lifecycle of one streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// Handle exists, no session requested yet (or waiting for the slot).
    Idle,
    /// Slot held, transport loading, nothing appended yet.
    Loading,
    Streaming,
    Complete,
    Failed,
    Cancelled,
}

impl StreamPhase {
    /// Whether this phase holds the playback slot.
    pub fn is_live(&self) -> bool {
        matches!(self, StreamPhase::Loading | StreamPhase::Streaming)
    }
}

/// How much data a read waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Returns as soon as at least one byte at `offset` exists.
    #[default]
    Exploratory,
    /// Waits for the whole `offset..offset + len` range.
    Full,
}

#[derive(Debug)]
struct BufferState {
    data: Vec<u8>,
    finished: bool,
    error: Option<FsError>,
    phase: StreamPhase,
}

impl BufferState {
    fn slice(&self, offset: u64, len: usize) -> Bytes {
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(self.data.len());
        let end = start.saturating_add(len).min(self.data.len());
        Bytes::copy_from_slice(&self.data[start..end])
    }

    /// Resolves a read, or `None` if it still has to wait.
    fn try_read(&self, offset: u64, len: usize, mode: ReadMode) -> Option<Result<Bytes>> {
        let available = self.data.len() as u64;
        let needed = match mode {
            ReadMode::Exploratory => offset.saturating_add(1),
            ReadMode::Full => offset.saturating_add(len as u64),
        };

        if available >= needed {
            return Some(Ok(self.slice(offset, len)));
        }
        if let Some(err) = &self.error {
            return Some(Err(err.clone()));
        }
        if self.finished {
            return Some(Ok(self.slice(offset, len)));
        }
        None
    }
}

/// Append-only byte accumulator shared by one producer and many readers.
///
/// Bytes are only ever appended, and nothing changes once the buffer is
/// finished, so any range a reader has seen stays the same forever.
#[derive(Debug)]
pub struct StreamBuffer {
    state: Mutex<BufferState>,
    changed: Notify,
}

impl StreamBuffer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BufferState {
                data: Vec::new(),
                finished: false,
                error: None,
                phase: StreamPhase::Idle,
            }),
            changed: Notify::new(),
        }
    }

    pub fn phase(&self) -> StreamPhase {
        self.state.lock().phase
    }

    pub fn len(&self) -> u64 {
        self.state.lock().data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    pub fn error(&self) -> Option<FsError> {
        self.state.lock().error.clone()
    }

    /// Total length once the stream ended without error.
    pub fn finished_len(&self) -> Option<u64> {
        let state = self.state.lock();
        (state.finished && state.error.is_none()).then_some(state.data.len() as u64)
    }

    /// Idle → Loading. Returns false if the buffer was already finished
    /// (cancelled while waiting for the slot).
    pub fn mark_loading(&self) -> bool {
        let mut state = self.state.lock();
        if state.finished {
            return false;
        }
        state.phase = StreamPhase::Loading;
        true
    }

    /// Appends encoded bytes and wakes readers. Ignored once finished.
    pub fn append(&self, bytes: &[u8]) -> bool {
        {
            let mut state = self.state.lock();
            if state.finished {
                return false;
            }
            if bytes.is_empty() {
                return true;
            }
            state.data.extend_from_slice(bytes);
            if state.phase == StreamPhase::Loading {
                state.phase = StreamPhase::Streaming;
            }
        }
        self.changed.notify_waiters();
        true
    }

    /// Ends the stream, storing `error` for every later read that needs
    /// bytes past the end. No-op if already finished.
    pub fn finish(&self, error: Option<FsError>) {
        {
            let mut state = self.state.lock();
            if state.finished {
                return;
            }
            state.finished = true;
            state.phase = if error.is_some() {
                StreamPhase::Failed
            } else {
                StreamPhase::Complete
            };
            state.error = error;
            debug!(
                "Stream finished: {} bytes, phase {:?}",
                state.data.len(),
                state.phase
            );
        }
        self.changed.notify_waiters();
    }

    /// Aborts an unfinished stream. Waiting readers get
    /// [`FsError::StreamAborted`].
    ///
    /// Returns the phase the stream was in, or `None` if it had already
    /// finished.
    pub fn cancel(&self) -> Option<StreamPhase> {
        let previous = {
            let mut state = self.state.lock();
            if state.finished {
                return None;
            }
            let previous = state.phase;
            state.finished = true;
            state.error = Some(FsError::StreamAborted);
            state.phase = StreamPhase::Cancelled;
            previous
        };
        self.changed.notify_waiters();
        Some(previous)
    }

    /// Reads `buffer[offset..offset + len]`, waiting per `mode` until the
    /// bytes exist or the stream ends.
    ///
    /// A read that cannot be satisfied on a failed stream returns the stored
    /// error. A read on a cleanly finished stream returns whatever is there,
    /// which may be short or empty.
    pub async fn read(&self, offset: u64, len: usize, mode: ReadMode) -> Result<Bytes> {
        if len == 0 {
            return Ok(Bytes::new());
        }

        loop {
            let mut notified = pin!(self.changed.notified());
            notified.as_mut().enable();

            let outcome = self.state.lock().try_read(offset, len, mode);
            if let Some(outcome) = outcome {
                return outcome;
            }

            notified.await;
        }
    }

    /// Resolves once the stream is finished for any reason.
    pub async fn wait_finished(&self) {
        loop {
            let mut notified = pin!(self.changed.notified());
            notified.as_mut().enable();

            if self.is_finished() {
                return;
            }

            notified.await;
        }
    }
}

impl Default for StreamBuffer {
    fn default() -> Self {
        Self::new()
    }
}
