use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::sync::OnceCell;
use tracing::info;

use super::{id3, TagSource, TrackTags};
use crate::audio::{ReadMode, StreamBuffer};
use crate::error::{FsError, Result};

/// The streamed audio between the two tag blocks.
#[async_trait]
pub trait PayloadSource: Send + Sync {
    async fn read_payload(&self, offset: u64, len: usize, mode: ReadMode) -> Result<Bytes>;

    /// Payload length once it has ended cleanly.
    fn finished_len(&self) -> Option<u64>;
}

#[async_trait]
impl PayloadSource for StreamBuffer {
    async fn read_payload(&self, offset: u64, len: usize, mode: ReadMode) -> Result<Bytes> {
        self.read(offset, len, mode).await
    }

    fn finished_len(&self) -> Option<u64> {
        StreamBuffer::finished_len(self)
    }
}

/// Presents a track as `[ID3v2 header][payload][ID3v1 trailer]`.
///
/// The header has a fixed size, so payload offsets are known before the
/// metadata is. Metadata is fetched once, on the first read that needs a tag
/// block.
#[derive(Debug)]
pub struct ContainerFramer {
    track_id: String,
    header_size: usize,
    tags: OnceCell<TrackTags>,
    header: OnceCell<Bytes>,
    trailer: OnceCell<Bytes>,
}

impl ContainerFramer {
    pub fn new(track_id: impl Into<String>, header_size: usize) -> Self {
        Self {
            track_id: track_id.into(),
            header_size,
            tags: OnceCell::new(),
            header: OnceCell::new(),
            trailer: OnceCell::new(),
        }
    }

    pub fn header_len(&self) -> u64 {
        self.header_size as u64
    }

    pub fn trailer_len(&self) -> u64 {
        id3::V1_TAG_LEN as u64
    }

    pub fn estimated_size(&self, duration_ms: u64, bitrate_kbps: u32) -> u64 {
        estimated_size(self.header_size, duration_ms, bitrate_kbps)
    }

    pub fn exact_size(&self, payload_len: u64) -> u64 {
        self.header_len() + payload_len + self.trailer_len()
    }

    async fn tags(&self, source: &dyn TagSource) -> Result<&TrackTags> {
        self.tags
            .get_or_try_init(|| source.track_tags(&self.track_id))
            .await
    }

    pub async fn header(&self, source: &dyn TagSource) -> Result<Bytes> {
        self.header
            .get_or_try_init(|| async {
                let tags = self.tags(source).await?;
                info!("🏷️ Tagging {} - {}", tags.artist_line(), tags.title);
                Ok::<_, FsError>(id3::encode_v2(tags, self.header_size))
            })
            .await
            .cloned()
    }

    pub async fn trailer(&self, source: &dyn TagSource) -> Result<Bytes> {
        self.trailer
            .get_or_try_init(|| async {
                Ok::<_, FsError>(id3::encode_v1(self.tags(source).await?))
            })
            .await
            .cloned()
    }

    /// Reads `len` bytes at `offset` of the framed file.
    ///
    /// An exploratory read returns the first non-empty piece it finds (it
    /// never waits on the payload once header bytes are in hand). A full read
    /// keeps going across the header, payload and trailer until `len` bytes
    /// are collected or the file ends.
    pub async fn read<P>(
        &self,
        source: &dyn TagSource,
        payload: &P,
        offset: u64,
        len: usize,
        mode: ReadMode,
    ) -> Result<Bytes>
    where
        P: PayloadSource + ?Sized,
    {
        if len == 0 {
            return Ok(Bytes::new());
        }

        let mut out = BytesMut::with_capacity(len);
        let mut position = offset;
        let header_len = self.header_len();

        if position < header_len {
            let header = self.header(source).await?;
            let piece = slice(&header, position, len);
            position += piece.len() as u64;
            out.extend_from_slice(&piece);
            if mode == ReadMode::Exploratory || out.len() == len {
                return Ok(out.freeze());
            }
        }

        let payload_offset = position - header_len;
        let piece = payload
            .read_payload(payload_offset, len - out.len(), mode)
            .await?;
        position += piece.len() as u64;
        out.extend_from_slice(&piece);
        if out.len() == len || (mode == ReadMode::Exploratory && !piece.is_empty()) {
            return Ok(out.freeze());
        }

        // A short payload read means the payload ended.
        let Some(payload_len) = payload.finished_len() else {
            return Ok(out.freeze());
        };
        let trailer = self.trailer(source).await?;
        let trailer_offset = position.saturating_sub(header_len + payload_len);
        out.extend_from_slice(&slice(&trailer, trailer_offset, len - out.len()));
        Ok(out.freeze())
    }
}

/// Advertised size of a framed track before its payload length is known:
/// both tag blocks plus `duration × bitrate / 8`.
pub fn estimated_size(header_size: usize, duration_ms: u64, bitrate_kbps: u32) -> u64 {
    header_size as u64 + duration_ms * u64::from(bitrate_kbps) / 8 + id3::V1_TAG_LEN as u64
}

fn slice(bytes: &Bytes, offset: u64, len: usize) -> Bytes {
    let start = usize::try_from(offset).unwrap_or(usize::MAX).min(bytes.len());
    let end = start.saturating_add(len).min(bytes.len());
    bytes.slice(start..end)
}
