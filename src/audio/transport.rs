use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{FsError, Result};

/// Interleaved 16-bit PCM as delivered by a playback session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmChunk {
    pub samples: Vec<i16>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl PcmChunk {
    pub fn new(samples: Vec<i16>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels,
            sample_rate,
        }
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }
}

/// Receiving end a session delivers its PCM into.
///
/// Backed by a bounded channel, so a session that outruns the encoder waits.
/// Each sink carries the stop token of the session it belongs to. Delivery
/// fails with [`FsError::StreamAborted`] once the consumer is gone or the
/// session was stopped; a session should stop when that happens.
#[derive(Debug, Clone)]
pub struct PcmSink {
    tx: mpsc::Sender<PcmChunk>,
    stop: CancellationToken,
}

impl PcmSink {
    pub fn new(tx: mpsc::Sender<PcmChunk>) -> Self {
        Self::with_stop(tx, CancellationToken::new())
    }

    /// A sink whose session ends when `stop` is cancelled.
    pub fn with_stop(tx: mpsc::Sender<PcmChunk>, stop: CancellationToken) -> Self {
        Self { tx, stop }
    }

    pub async fn deliver(&self, chunk: PcmChunk) -> Result<()> {
        if self.stop.is_cancelled() {
            return Err(FsError::StreamAborted);
        }
        self.tx
            .send(chunk)
            .await
            .map_err(|_| FsError::StreamAborted)
    }

    /// For sessions decoding on a blocking thread.
    pub fn deliver_blocking(&self, chunk: PcmChunk) -> Result<()> {
        if self.stop.is_cancelled() {
            return Err(FsError::StreamAborted);
        }
        self.tx
            .blocking_send(chunk)
            .map_err(|_| FsError::StreamAborted)
    }

    pub fn stop_token(&self) -> &CancellationToken {
        &self.stop
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled() || self.tx.is_closed()
    }

    /// Resolves once the session was stopped or the consumer went away.
    pub async fn stopped(&self) {
        tokio::select! {
            _ = self.stop.cancelled() => {}
            _ = self.tx.closed() => {}
        }
    }
}

/// The live playback session provider.
///
/// Only one session may run at a time; callers serialize through
/// [`PlaybackSlot`](super::PlaybackSlot).
#[async_trait]
pub trait PlaybackTransport: Send + Sync {
    /// Runs a session for `track_id`, delivering decoded PCM into `sink`.
    /// Resolves when the track ends, fails, or is stopped.
    async fn load(&self, track_id: &str, sink: PcmSink) -> Result<()>;

    /// Asks the active session to stop. Does not wait for it.
    ///
    /// Callers also cancel the session's sink, so a stop that races the
    /// start of a session still ends it.
    fn stop(&self);
}
