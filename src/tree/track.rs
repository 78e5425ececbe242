use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use crate::audio::{PlaybackEngine, TrackFileHandle};
use crate::container::framer::estimated_size;
use crate::error::{FsError, Result};

/// A streamed track file.
///
/// At most one [`TrackFileHandle`] is attached at a time; every open shares
/// it, and the last release detaches and cancels it.
#[derive(Debug)]
pub struct TrackFile {
    track_id: String,
    duration_ms: u64,
    bitrate_kbps: u32,
    attached: Mutex<Option<Attached>>,
}

#[derive(Debug)]
struct Attached {
    handle: Arc<TrackFileHandle>,
    refs: usize,
}

impl TrackFile {
    pub fn new(track_id: impl Into<String>, duration_ms: u64, bitrate_kbps: u32) -> Self {
        Self {
            track_id: track_id.into(),
            duration_ms,
            bitrate_kbps,
            attached: Mutex::new(None),
        }
    }

    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn bitrate_kbps(&self) -> u32 {
        self.bitrate_kbps
    }

    /// Attaches to the active handle, creating it on first open.
    pub fn open(&self, engine: &Arc<PlaybackEngine>) -> Arc<TrackFileHandle> {
        let mut attached = self.attached.lock();
        match attached.as_mut() {
            Some(active) => {
                active.refs += 1;
                debug!("Sharing stream {} ({} open)", self.track_id, active.refs);
                active.handle.clone()
            }
            None => {
                let handle = Arc::new(TrackFileHandle::new(self.track_id.clone(), engine.clone()));
                *attached = Some(Attached {
                    handle: handle.clone(),
                    refs: 1,
                });
                debug!("New stream handle for {}", self.track_id);
                handle
            }
        }
    }

    /// Drops one reference. The last one detaches the handle and cancels
    /// its session if it is still running.
    pub fn release(&self, handle: &Arc<TrackFileHandle>) -> Result<()> {
        let detached = {
            let mut attached = self.attached.lock();
            let remaining = match attached.as_mut() {
                Some(active) if Arc::ptr_eq(&active.handle, handle) => {
                    active.refs -= 1;
                    active.refs
                }
                _ => {
                    return Err(FsError::not_found(format!(
                        "no open handle for track {}",
                        self.track_id
                    )))
                }
            };
            if remaining == 0 {
                attached.take()
            } else {
                None
            }
        };

        if let Some(detached) = detached {
            debug!("Last reference to {} released", self.track_id);
            detached.handle.cancel();
        }
        Ok(())
    }

    pub fn active_handle(&self) -> Option<Arc<TrackFileHandle>> {
        self.attached.lock().as_ref().map(|active| active.handle.clone())
    }

    pub fn open_count(&self) -> usize {
        self.attached.lock().as_ref().map_or(0, |active| active.refs)
    }

    /// Exact size if an attached stream has finished, otherwise the
    /// estimate from duration and bitrate.
    pub fn size(&self, header_size: usize) -> u64 {
        self.active_handle()
            .and_then(|handle| handle.finished_size())
            .unwrap_or_else(|| estimated_size(header_size, self.duration_ms, self.bitrate_kbps))
    }
}
