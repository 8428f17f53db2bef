use std::fmt;

use crate::error::{Error, Result};

use super::filter::RowWindow;
use super::model::{Channel, MAX_SRAM_VALUE};

/// 8-bit samples are unsigned with 0x80 as silence.  Dividing by a quarter of
/// the register span lands whole byte values on whole register steps.
const UNSIGNED_BYTE_DIVISOR: f64 = MAX_SRAM_VALUE as f64 / 4.0;

// ---------------------------------------------------------------------------
// Sample layout
// ---------------------------------------------------------------------------

/// Sample encoding as declared by the audio container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoding {
    /// Uncompressed integer PCM.
    Pcm,
    IeeeFloat,
    /// Anything else, named by the container.
    Other(String),
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Pcm => write!(f, "PCM"),
            Encoding::IeeeFloat => write!(f, "IEEE float"),
            Encoding::Other(name) => write!(f, "{name}"),
        }
    }
}

/// Layout of an interleaved sample stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFormat {
    pub channels: usize,
    /// Bytes per sample.
    pub sample_width: usize,
    pub encoding: Encoding,
}

impl AudioFormat {
    pub fn pcm(channels: usize, sample_width: usize) -> Self {
        AudioFormat {
            channels,
            sample_width,
            encoding: Encoding::Pcm,
        }
    }

    /// Bytes in one frame (one sample of every channel).
    pub fn frame_bytes(&self) -> usize {
        self.channels * self.sample_width
    }

    fn validate(&self) -> Result<()> {
        if self.encoding != Encoding::Pcm {
            return Err(unsupported(&self.encoding));
        }
        if self.channels == 0 {
            return Err(Error::UnsupportedFormat("audio with no channels".into()));
        }
        if self.sample_width == 0 || self.sample_width > 8 {
            return Err(Error::UnsupportedFormat(format!(
                "{}-byte samples",
                self.sample_width
            )));
        }
        Ok(())
    }
}

/// The error for any encoding other than integer PCM.
pub fn unsupported(encoding: &Encoding) -> Error {
    Error::UnsupportedFormat(format!(
        "compressed or non-integer audio is not supported (type = {encoding})"
    ))
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Normalize one sample to [-1.0, 1.0].
///
/// * 1 byte: unsigned, 0x80 is silence.
/// * wider: signed little-endian, divided by `1 << (bits - 1)`.
fn decode_sample(bytes: &[u8]) -> f64 {
    if let [b] = bytes {
        return f64::from(*b) / UNSIGNED_BYTE_DIVISOR - 1.0;
    }
    let bits = bytes.len() * 8;
    let raw = bytes
        .iter()
        .rev()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
    // Sign-extend from `bits` wide.
    let shift = 64 - bits;
    let value = ((raw << shift) as i64) >> shift;
    value as f64 / (1u64 << (bits - 1)) as f64
}

/// Decode interleaved PCM bytes into one channel per audio channel.
///
/// The window counts whole frames; a trailing partial frame is dropped.
pub fn extract_channels(bytes: &[u8], format: &AudioFormat, window: RowWindow) -> Result<Vec<Channel>> {
    format.validate()?;

    let frame_bytes = format.frame_bytes();
    let frames = bytes.len() / frame_bytes;
    let capacity = frames.saturating_sub(window.start()).min(window.max_rows());
    let mut channels: Vec<Channel> = (0..format.channels)
        .map(|_| Vec::with_capacity(capacity))
        .collect();

    for frame in window.select(bytes.chunks_exact(frame_bytes)) {
        for (channel, sample) in channels
            .iter_mut()
            .zip(frame.chunks_exact(format.sample_width))
        {
            channel.push(decode_sample(sample));
        }
    }

    Ok(channels)
}
