use async_trait::async_trait;
use bytes::Bytes;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    EncoderFactory, PcmChunk, PcmSink, PlaybackSlot, PlaybackTransport, ReadMode, StreamBuffer,
    StreamPhase,
};
use crate::config::Config;
use crate::container::{ContainerFramer, PayloadSource, TagSource};
use crate::error::{FsError, Result};

/// Shared playback machinery: the slot, the transport and the encoder.
pub struct PlaybackEngine {
    slot: PlaybackSlot,
    transport: Arc<dyn PlaybackTransport>,
    encoders: Arc<dyn EncoderFactory>,
    bitrate_kbps: u32,
    header_size: usize,
    queue_depth: usize,
}

impl PlaybackEngine {
    pub fn new(
        transport: Arc<dyn PlaybackTransport>,
        encoders: Arc<dyn EncoderFactory>,
        config: &Config,
    ) -> Self {
        Self {
            slot: PlaybackSlot::new(),
            transport,
            encoders,
            bitrate_kbps: config.target_bitrate_kbps,
            header_size: config.id3_header_size,
            queue_depth: config.pcm_queue_depth.max(1),
        }
    }

    pub fn slot(&self) -> &PlaybackSlot {
        &self.slot
    }

    pub fn bitrate_kbps(&self) -> u32 {
        self.bitrate_kbps
    }

    pub fn header_size(&self) -> usize {
        self.header_size
    }
}

/// One open track: a single decode session shared by every descriptor that
/// has the track open.
///
/// The session starts on the first payload read. It waits for the playback
/// slot, runs the transport on a task, and encodes on a blocking thread that
/// appends into the buffer.
pub struct TrackFileHandle {
    track_id: String,
    buffer: Arc<StreamBuffer>,
    framer: ContainerFramer,
    engine: Arc<PlaybackEngine>,
    started: AtomicBool,
    session: CancellationToken,
}

impl TrackFileHandle {
    pub fn new(track_id: impl Into<String>, engine: Arc<PlaybackEngine>) -> Self {
        let track_id = track_id.into();
        Self {
            framer: ContainerFramer::new(track_id.clone(), engine.header_size),
            track_id,
            buffer: Arc::new(StreamBuffer::new()),
            engine,
            started: AtomicBool::new(false),
            session: CancellationToken::new(),
        }
    }

    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    pub fn phase(&self) -> StreamPhase {
        self.buffer.phase()
    }

    pub fn buffer(&self) -> &Arc<StreamBuffer> {
        &self.buffer
    }

    pub fn framer(&self) -> &ContainerFramer {
        &self.framer
    }

    /// Exact framed size, once the stream has ended cleanly.
    pub fn finished_size(&self) -> Option<u64> {
        self.buffer
            .finished_len()
            .map(|payload| self.framer.exact_size(payload))
    }

    /// Reads the framed file.
    pub async fn read(
        &self,
        tags: &dyn TagSource,
        offset: u64,
        len: usize,
        mode: ReadMode,
    ) -> Result<Bytes> {
        self.framer.read(tags, self, offset, len, mode).await
    }

    /// Stops the session if it is still running.
    ///
    /// Waiting readers get [`FsError::StreamAborted`]. The session's sink is
    /// stopped either way; the transport is only told to stop if this
    /// handle's session is the one holding the slot.
    pub fn cancel(&self) {
        let previous = self.buffer.cancel();
        self.session.cancel();
        match previous {
            Some(previous) if previous.is_live() => {
                info!("⏹️ Cancelling stream {}", self.track_id);
                self.engine.transport.stop();
            }
            Some(_) => debug!("Cancelled {} before it started", self.track_id),
            None => {}
        }
    }

    fn ensure_started(&self) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }
        tokio::spawn(run_session(
            self.track_id.clone(),
            self.buffer.clone(),
            self.engine.clone(),
            self.session.clone(),
        ));
    }
}

#[async_trait]
impl PayloadSource for TrackFileHandle {
    async fn read_payload(&self, offset: u64, len: usize, mode: ReadMode) -> Result<Bytes> {
        self.ensure_started();
        self.buffer.read(offset, len, mode).await
    }

    fn finished_len(&self) -> Option<u64> {
        self.buffer.finished_len()
    }
}

impl std::fmt::Debug for TrackFileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackFileHandle")
            .field("track_id", &self.track_id)
            .field("phase", &self.buffer.phase())
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

async fn run_session(
    track_id: String,
    buffer: Arc<StreamBuffer>,
    engine: Arc<PlaybackEngine>,
    session: CancellationToken,
) {
    let permit = tokio::select! {
        permit = engine.slot.acquire(&track_id) => match permit {
            Ok(permit) => permit,
            Err(e) => {
                buffer.finish(Some(e));
                return;
            }
        },
        _ = buffer.wait_finished() => {
            debug!("Stream {} closed while waiting for the slot", track_id);
            return;
        }
    };

    if !buffer.mark_loading() {
        return;
    }
    info!("▶️ Loading track {}", track_id);

    let (tx, rx) = mpsc::channel(engine.queue_depth);
    let load = {
        let transport = engine.transport.clone();
        let track_id = track_id.clone();
        let session = session.clone();
        let sink = PcmSink::with_stop(tx, session.clone());
        // Dropping the load on cancellation also drops its sink, which ends
        // the encode loop even if the transport never saw the stop.
        tokio::spawn(async move {
            tokio::select! {
                loaded = transport.load(&track_id, sink) => loaded,
                _ = session.cancelled() => Err(FsError::StreamAborted),
            }
        })
    };
    let encode = {
        let encoders = engine.encoders.clone();
        let bitrate = engine.bitrate_kbps;
        let buffer = buffer.clone();
        tokio::task::spawn_blocking(move || encode_loop(rx, encoders.as_ref(), bitrate, &buffer))
    };

    let encoded = encode
        .await
        .unwrap_or_else(|e| Err(FsError::remote(format!("encoder task: {}", e))));
    if encoded.is_err() {
        // The transport may still be producing into a closed sink.
        session.cancel();
        if !load.is_finished() {
            engine.transport.stop();
        }
    }
    let loaded = load
        .await
        .unwrap_or_else(|e| Err(FsError::remote(format!("transport task: {}", e))));

    match encoded.and(loaded) {
        _ if buffer.phase() == StreamPhase::Cancelled => {
            debug!("Stream {} wound down after cancellation", track_id);
        }
        Ok(()) => {
            buffer.finish(None);
            info!("✅ Stream {} complete ({} bytes)", track_id, buffer.len());
        }
        Err(e) => {
            error!("❌ Stream {} failed: {}", track_id, e);
            buffer.finish(Some(e));
        }
    }

    drop(permit);
}

/// Drains PCM from the transport into the encoder until the sender is gone
/// or the buffer is closed underneath us.
fn encode_loop(
    mut rx: mpsc::Receiver<PcmChunk>,
    encoders: &dyn EncoderFactory,
    bitrate_kbps: u32,
    buffer: &StreamBuffer,
) -> Result<()> {
    let mut encoder = encoders.create(bitrate_kbps)?;

    while let Some(chunk) = rx.blocking_recv() {
        if buffer.is_finished() {
            debug!("Buffer closed, dropping remaining PCM");
            return Ok(());
        }
        let bytes = encoder.encode(&chunk)?;
        buffer.append(&bytes);
    }

    let tail = encoder.flush()?;
    if !buffer.append(&tail) {
        warn!("Encoder tail dropped, buffer already closed");
    }
    Ok(())
}
