use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::error::{FsError, Result};

/// Process-wide gate admitting one live playback session at a time.
///
/// The streaming account supports a single active session, so every track
/// pipeline holds a [`SlotPermit`] for as long as it streams. Waiters are
/// admitted in FIFO order (tokio's semaphore is fair).
#[derive(Debug, Clone)]
pub struct PlaybackSlot {
    permits: Arc<Semaphore>,
}

/// Proof of holding the slot; dropping it releases the slot.
#[derive(Debug)]
pub struct SlotPermit {
    _permit: OwnedSemaphorePermit,
    track_id: String,
}

impl PlaybackSlot {
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
        }
    }

    /// Waits until no other session is active.
    pub async fn acquire(&self, track_id: &str) -> Result<SlotPermit> {
        debug!("Waiting for playback slot ({})", track_id);
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| FsError::remote("playback slot closed"))?;
        debug!("Playback slot acquired ({})", track_id);
        Ok(SlotPermit {
            _permit: permit,
            track_id: track_id.to_string(),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.permits.available_permits() == 0
    }
}

impl Default for PlaybackSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        debug!("Playback slot released ({})", self.track_id);
    }
}
