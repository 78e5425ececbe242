//! # Audio Module
//!
//! The streaming pipeline behind track files.
//!
//! A [`PlaybackTransport`] session delivers decoded PCM into a bounded
//! channel; a blocking encoder loop turns it into MP3 frames and appends them
//! to a [`StreamBuffer`]; readers wait on the buffer at their own offsets.
//! The [`PlaybackSlot`] makes sure only one session runs in the process.
//!
//! ```text
//! transport.load ──PcmChunk──▶ encode loop ──mp3──▶ StreamBuffer ◀── read(offset, len)
//!        ▲                                              │
//!        └──────────── PlaybackSlot (1 permit) ─────────┘
//! ```

pub mod buffer;
pub mod encoder;
pub mod handle;
pub mod preview;
pub mod slot;
pub mod transport;

pub use buffer::{ReadMode, StreamBuffer, StreamPhase};
pub use encoder::{EncoderFactory, PcmEncoder};
pub use handle::{PlaybackEngine, TrackFileHandle};
pub use preview::PreviewTransport;
pub use slot::{PlaybackSlot, SlotPermit};
pub use transport::{PcmChunk, PcmSink, PlaybackTransport};
