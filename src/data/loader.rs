use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use crate::error::Error;

use super::audio::{self, AudioFormat, Encoding};
use super::combine::combine_channels;
use super::model::{Channel, ChannelRange, Detect, Diagnostics, LoadParameters, RegisterValue};
use super::scale::{pad, quantize_all, scale};
use super::tabular;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Register values ready for encoding, plus what was absorbed on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub registers: Vec<RegisterValue>,
    pub diagnostics: Diagnostics,
}

/// Combine, pad, scale and quantize extracted channels.
pub fn to_registers(
    channels: &[Channel],
    ranges: &[Option<ChannelRange>],
    params: &LoadParameters,
) -> crate::error::Result<Waveform> {
    let combined = combine_channels(channels, ranges, params.selection())?;
    let padded = pad(combined, params.rows_to_write());
    let scaled = scale(padded, params.scale_auto(), params.scale_multiplier());
    let (registers, clipped) = quantize_all(&scaled);

    Ok(Waveform {
        registers,
        diagnostics: Diagnostics {
            clipped,
            truncated_from: None,
        },
    })
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: any delimiter the sniffer recognises, optional header row.
/// Column ranges from `params` apply per column.
pub fn load_csv(path: &Path, params: &LoadParameters) -> Result<Waveform> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading CSV file {}", path.display()))?;
    let channels = csv_channels(&text, params).context("parsing CSV")?;
    to_registers(&channels, params.channel_ranges(), params)
        .with_context(|| format!("processing {}", path.display()))
}

/// Extract the channels of CSV text (a leading byte-order mark is ignored).
pub fn csv_channels(text: &str, params: &LoadParameters) -> crate::error::Result<Vec<Channel>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let table = tabular::extract_channels(text, params.header(), params.window())?;

    if params.print_diagnostics() && params.header() == Detect::Auto {
        info!(
            "Auto-detecting CSV header row... {}",
            if table.has_header { "detected." } else { "not detected." }
        );
    }
    log::debug!(
        "CSV delimiter {:?}, {} column(s)",
        table.dialect.delimiter as char,
        table.channels.len()
    );

    Ok(table.channels)
}

// ---------------------------------------------------------------------------
// WAV loader
// ---------------------------------------------------------------------------

/// WAV channels are already in the canonical range; column ranges are not
/// applied to them.
pub fn load_wav(path: &Path, params: &LoadParameters) -> Result<Waveform> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening WAV file {}", path.display()))?;
    let channels = wav_channels(std::io::BufReader::new(file), params)
        .with_context(|| format!("reading WAV file {}", path.display()))?;
    to_registers(&channels, &[], params)
        .with_context(|| format!("processing {}", path.display()))
}

/// Decode the windowed frames of a WAV stream into channels.
pub fn wav_channels<R: Read + Seek>(
    mut reader: R,
    params: &LoadParameters,
) -> crate::error::Result<Vec<Channel>> {
    let layout = read_layout(&mut reader).ok().flatten();
    reader.rewind()?;

    let wav = hound::WavReader::new(reader).map_err(|e| wav_error(e, layout.as_ref()))?;
    let spec = wav.spec();
    let format = AudioFormat {
        channels: usize::from(spec.channels),
        sample_width: sample_width(layout.as_ref(), &spec),
        encoding: match spec.sample_format {
            hound::SampleFormat::Int => Encoding::Pcm,
            hound::SampleFormat::Float => Encoding::IeeeFloat,
        },
    };
    let available = match layout.and_then(|l| l.data_len) {
        Some(len) if format.frame_bytes() > 0 => len as usize / format.frame_bytes(),
        _ => wav.duration() as usize,
    };

    if params.print_diagnostics() {
        info!(
            "Opened WAV file with the following properties: {} channel(s), {} Hz, {}-bit {} in {}-byte samples, {} frames",
            spec.channels,
            spec.sample_rate,
            spec.bits_per_sample,
            format.encoding,
            format.sample_width,
            available
        );
    }

    // Only the frames up to the end of the window are read.
    let window = params.window();
    let frames = available.min(window.end());
    let byte_count = frames.saturating_mul(format.frame_bytes());
    let mut data = Vec::with_capacity(byte_count);
    wav.into_inner()
        .take(byte_count as u64)
        .read_to_end(&mut data)?;

    audio::extract_channels(&data, &format, window)
}

fn wav_error(err: hound::Error, layout: Option<&WavLayout>) -> Error {
    match (err, layout) {
        (hound::Error::Unsupported, Some(layout)) => {
            audio::unsupported(&encoding_for_tag(layout.format_tag))
        }
        (hound::Error::Unsupported, None) => {
            Error::UnsupportedFormat("unrecognised WAV encoding".into())
        }
        (other, _) => Error::Wav(other),
    }
}

// ---------------------------------------------------------------------------
// RIFF layout
// ---------------------------------------------------------------------------

const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Bytes of a `fmt ` chunk that are inspected; the rest is skipped.
const FMT_PREFIX: u32 = 40;

/// Sample layout as declared by the `fmt ` and `data` chunk headers.
///
/// hound checks the header but exposes neither the block alignment nor the
/// format tag of encodings it rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WavLayout {
    /// Sub-format tag for WAVE_FORMAT_EXTENSIBLE.
    format_tag: u16,
    channels: u16,
    block_align: u16,
    data_len: Option<u32>,
}

/// Walk the RIFF chunks up to `data`.  `None` when the stream is not a
/// WAVE file or has no `fmt ` chunk before its data.
fn read_layout<R: Read + Seek>(reader: &mut R) -> io::Result<Option<WavLayout>> {
    let mut riff = [0u8; 12];
    reader.read_exact(&mut riff)?;
    if &riff[..4] != b"RIFF" || &riff[8..] != b"WAVE" {
        return Ok(None);
    }

    let mut layout: Option<WavLayout> = None;
    let mut header = [0u8; 8];
    while reader.read_exact(&mut header).is_ok() {
        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let padded = i64::from(len) + i64::from(len & 1);
        match &header[..4] {
            b"fmt " => {
                let kept = len.min(FMT_PREFIX);
                let mut body = vec![0u8; kept as usize];
                reader.read_exact(&mut body)?;
                reader.seek(SeekFrom::Current(padded - i64::from(kept)))?;
                if body.len() < 16 {
                    return Ok(None);
                }
                let u16_at = |i: usize| u16::from_le_bytes([body[i], body[i + 1]]);
                let format_tag = match u16_at(0) {
                    WAVE_FORMAT_EXTENSIBLE if body.len() >= 26 => u16_at(24),
                    tag => tag,
                };
                layout = Some(WavLayout {
                    format_tag,
                    channels: u16_at(2),
                    block_align: u16_at(12),
                    data_len: None,
                });
            }
            b"data" => {
                return Ok(layout.map(|l| WavLayout {
                    data_len: Some(len),
                    ..l
                }));
            }
            _ => {
                reader.seek(SeekFrom::Current(padded))?;
            }
        }
    }
    Ok(layout)
}

/// Bytes per sample: the block alignment shared out over the channels, so a
/// 24-bit sample in a 4-byte container reads as 4 bytes.
fn sample_width(layout: Option<&WavLayout>, spec: &hound::WavSpec) -> usize {
    match layout {
        Some(l) if l.channels > 0 && l.block_align > 0 && l.block_align % l.channels == 0 => {
            usize::from(l.block_align / l.channels)
        }
        _ => usize::from(spec.bits_per_sample).div_ceil(8),
    }
}

fn encoding_for_tag(tag: u16) -> Encoding {
    let name = match tag {
        0x0001 => return Encoding::Pcm,
        0x0003 => return Encoding::IeeeFloat,
        0x0002 => "Microsoft ADPCM",
        0x0006 => "A-law",
        0x0007 => "mu-law",
        0x0011 => "IMA ADPCM",
        0x0031 => "GSM 6.10",
        0x0050 => "MPEG",
        0x0055 => "MPEG Layer III",
        _ => "format",
    };
    Encoding::Other(format!("{name} 0x{tag:04X}"))
}
