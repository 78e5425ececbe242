//! PCM to MP3 encoding.
//!
//! The LAME-backed encoder lives behind the `lame` cargo feature, which is on
//! by default. Built with `--no-default-features`, [`default_factory`]
//! returns a factory that fails every session with a clear error.

use super::PcmChunk;
use crate::error::{FsError, Result};

/// Stateful encoder for one stream.
///
/// Encoders are created on the thread that drives them and never move, so
/// implementations do not need to be `Send`.
pub trait PcmEncoder {
    /// Encodes one chunk, returning whatever frames are complete so far.
    fn encode(&mut self, chunk: &PcmChunk) -> Result<Vec<u8>>;

    /// Emits the remaining frames, padding the last one so it is complete.
    fn flush(&mut self) -> Result<Vec<u8>>;
}

pub trait EncoderFactory: Send + Sync {
    fn create(&self, bitrate_kbps: u32) -> Result<Box<dyn PcmEncoder>>;
}

/// Factory used when the crate is built without an MP3 encoder.
#[derive(Debug, Default)]
pub struct UnavailableEncoder;

impl EncoderFactory for UnavailableEncoder {
    fn create(&self, _bitrate_kbps: u32) -> Result<Box<dyn PcmEncoder>> {
        Err(FsError::remote(
            "no MP3 encoder available (build with the `lame` feature)",
        ))
    }
}

#[cfg(feature = "lame")]
pub use lame::LameEncoderFactory;

pub fn default_factory() -> std::sync::Arc<dyn EncoderFactory> {
    #[cfg(feature = "lame")]
    {
        std::sync::Arc::new(LameEncoderFactory)
    }
    #[cfg(not(feature = "lame"))]
    {
        std::sync::Arc::new(UnavailableEncoder)
    }
}

/// Converts any channel layout to interleaved stereo.
pub fn to_stereo(chunk: &PcmChunk) -> Vec<i16> {
    match chunk.channels {
        2 => chunk.samples.clone(),
        0 | 1 => chunk.samples.iter().flat_map(|&s| [s, s]).collect(),
        channels => chunk
            .samples
            .chunks_exact(usize::from(channels))
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}

#[cfg(feature = "lame")]
mod lame {
    use mp3lame_encoder::{Bitrate, Builder, Encoder, FlushNoGap, InterleavedPcm, Quality};
    use tracing::debug;

    use super::{to_stereo, EncoderFactory, PcmEncoder};
    use crate::audio::PcmChunk;
    use crate::error::{FsError, Result};

    #[derive(Debug, Default)]
    pub struct LameEncoderFactory;

    impl EncoderFactory for LameEncoderFactory {
        fn create(&self, bitrate_kbps: u32) -> Result<Box<dyn PcmEncoder>> {
            Ok(Box::new(LameEncoder {
                bitrate: bitrate(bitrate_kbps),
                encoder: None,
                sample_rate: 0,
            }))
        }
    }

    /// Built lazily because LAME needs the sample rate of the first chunk.
    struct LameEncoder {
        bitrate: Bitrate,
        encoder: Option<Encoder>,
        sample_rate: u32,
    }

    impl LameEncoder {
        fn encoder(&mut self, sample_rate: u32) -> Result<&mut Encoder> {
            if self.encoder.is_some() && self.sample_rate != sample_rate {
                return Err(FsError::remote(format!(
                    "sample rate changed mid-stream ({} -> {})",
                    self.sample_rate, sample_rate
                )));
            }

            if self.encoder.is_none() {
                let mut builder =
                    Builder::new().ok_or_else(|| FsError::remote("LAME initialization failed"))?;
                builder
                    .set_num_channels(2)
                    .map_err(|e| FsError::remote(format!("LAME channels: {:?}", e)))?;
                builder
                    .set_sample_rate(sample_rate)
                    .map_err(|e| FsError::remote(format!("LAME sample rate: {:?}", e)))?;
                builder
                    .set_brate(self.bitrate)
                    .map_err(|e| FsError::remote(format!("LAME bitrate: {:?}", e)))?;
                builder
                    .set_quality(Quality::Best)
                    .map_err(|e| FsError::remote(format!("LAME quality: {:?}", e)))?;
                let encoder = builder
                    .build()
                    .map_err(|e| FsError::remote(format!("LAME build: {:?}", e)))?;

                debug!("LAME encoder ready ({} Hz)", sample_rate);
                self.sample_rate = sample_rate;
                self.encoder = Some(encoder);
            }

            self.encoder
                .as_mut()
                .ok_or_else(|| FsError::remote("LAME encoder missing"))
        }
    }

    impl PcmEncoder for LameEncoder {
        fn encode(&mut self, chunk: &PcmChunk) -> Result<Vec<u8>> {
            let samples = to_stereo(chunk);
            let encoder = self.encoder(chunk.sample_rate)?;

            let mut out = Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(
                samples.len() / 2,
            ));
            encoder
                .encode_to_vec(InterleavedPcm(&samples), &mut out)
                .map_err(|e| FsError::remote(format!("LAME encode: {:?}", e)))?;
            Ok(out)
        }

        fn flush(&mut self) -> Result<Vec<u8>> {
            let Some(encoder) = self.encoder.as_mut() else {
                return Ok(Vec::new());
            };

            let mut out = Vec::with_capacity(7200);
            encoder
                .flush_to_vec::<FlushNoGap>(&mut out)
                .map_err(|e| FsError::remote(format!("LAME flush: {:?}", e)))?;
            Ok(out)
        }
    }

    fn bitrate(kbps: u32) -> Bitrate {
        match kbps {
            0..=39 => Bitrate::Kbps32,
            40..=47 => Bitrate::Kbps40,
            48..=63 => Bitrate::Kbps48,
            64..=79 => Bitrate::Kbps64,
            80..=95 => Bitrate::Kbps80,
            96..=111 => Bitrate::Kbps96,
            112..=127 => Bitrate::Kbps112,
            128..=159 => Bitrate::Kbps128,
            160..=191 => Bitrate::Kbps160,
            192..=223 => Bitrate::Kbps192,
            224..=255 => Bitrate::Kbps224,
            256..=319 => Bitrate::Kbps256,
            _ => Bitrate::Kbps320,
        }
    }
}
