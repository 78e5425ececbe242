use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::{io::Cursor, sync::Arc};
use symphonia::core::{
    audio::SampleBuffer,
    codecs::DecoderOptions,
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{PcmChunk, PcmSink, PlaybackTransport};
use crate::catalog::{CatalogFetcher, EntityKind};
use crate::error::{FsError, Result};

/// Playback transport that plays a track's 30-second preview clip.
///
/// The clip is downloaded through the catalog client and decoded with
/// symphonia on a blocking thread. A session runs until its sink is stopped;
/// `stop` stops the sink of the session that last started.
pub struct PreviewTransport {
    fetcher: Arc<dyn CatalogFetcher>,
    current: Mutex<CancellationToken>,
}

impl PreviewTransport {
    pub fn new(fetcher: Arc<dyn CatalogFetcher>) -> Self {
        Self {
            fetcher,
            current: Mutex::new(CancellationToken::new()),
        }
    }
}

#[async_trait]
impl PlaybackTransport for PreviewTransport {
    async fn load(&self, track_id: &str, sink: PcmSink) -> Result<()> {
        *self.current.lock() = sink.stop_token().clone();
        if sink.is_stopped() {
            return Err(FsError::StreamAborted);
        }

        let track = tokio::select! {
            track = self.fetcher.fetch_entity(EntityKind::Track, track_id) => track?,
            _ = sink.stopped() => return Err(FsError::StreamAborted),
        };
        let url = track["preview_url"]
            .as_str()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| FsError::not_found(format!("no preview for track {}", track_id)))?;

        let clip = tokio::select! {
            clip = self.fetcher.fetch_blob(url) => clip?,
            _ = sink.stopped() => return Err(FsError::StreamAborted),
        };
        info!("🎧 Decoding preview of {} ({} bytes)", track_id, clip.len());

        tokio::task::spawn_blocking(move || decode_into(clip, &sink))
            .await
            .map_err(|e| FsError::remote(format!("decoder task: {}", e)))?
    }

    fn stop(&self) {
        debug!("Stopping preview session");
        self.current.lock().cancel();
    }
}

/// Decodes a compressed clip and delivers interleaved i16 PCM packet by
/// packet, until the clip ends or the sink is stopped.
pub fn decode_into(clip: Bytes, sink: &PcmSink) -> Result<()> {
    let source = MediaSourceStream::new(Box::new(Cursor::new(clip.to_vec())), Default::default());
    let mut hint = Hint::new();
    hint.with_extension("mp3");

    let detected = symphonia::default::get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| FsError::remote(format!("unsupported clip: {}", e)))?;
    let mut format = detected.format;

    let track = format
        .default_track()
        .ok_or_else(|| FsError::remote("clip has no audio track"))?;
    let track_id = track.id;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| FsError::remote(format!("no decoder for clip: {}", e)))?;

    loop {
        if sink.is_stopped() {
            return Err(FsError::StreamAborted);
        }

        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(());
            }
            Err(e) => return Err(FsError::remote(format!("clip read: {}", e))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                // Corrupt frame, skip it.
                warn!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(FsError::remote(format!("clip decode: {}", e))),
        };

        let spec = *decoded.spec();
        let mut samples = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
        samples.copy_interleaved_ref(decoded);

        sink.deliver_blocking(PcmChunk::new(
            samples.samples().to_vec(),
            spec.channels.count() as u16,
            spec.rate,
        ))?;
    }
}
