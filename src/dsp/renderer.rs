//! WAV renderer: writes a harmonic bank snapshot as 16-bit PCM WAV.
//!
//! Output is a 44-byte canonical RIFF header followed by little-endian i16
//! samples. Both chunk sizes are derived from the sample count actually
//! written. Files are written sequentially; an interrupted write leaves a
//! truncated file behind rather than being renamed into place atomically.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::RenderError;

use super::bank::{HarmonicBank, RenderSettings};

pub const HEADER_LEN: usize = 44;
pub const BITS_PER_SAMPLE: u16 = 16;
const PCM_FORMAT: u16 = 1;
const FMT_CHUNK_LEN: u32 = 16;

/// The fields of a canonical PCM WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub riff_size: u32,
    pub format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_size: u32,
}

impl WavHeader {
    /// Header for `sample_count` 16-bit samples (all channels together).
    /// Fails when a declared size does not fit its 32-bit field.
    pub fn pcm16(sample_rate: u32, channels: u16, sample_count: usize) -> Result<Self, RenderError> {
        let too_large = |what: &str| RenderError::InvalidHeader(format!("{what} does not fit in a WAV header"));
        let block_align = channels
            .checked_mul(BITS_PER_SAMPLE / 8)
            .ok_or_else(|| too_large("block align"))?;
        let byte_rate = sample_rate
            .checked_mul(u32::from(block_align))
            .ok_or_else(|| too_large(&format!("byte rate for {sample_rate} Hz")))?;
        let data_size = sample_count
            .checked_mul(2)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| too_large(&format!("data size for {sample_count} samples")))?;
        let riff_size = data_size
            .checked_add(36)
            .ok_or_else(|| too_large(&format!("RIFF size for {sample_count} samples")))?;
        Ok(WavHeader {
            riff_size,
            format: PCM_FORMAT,
            channels,
            sample_rate,
            byte_rate,
            block_align,
            bits_per_sample: BITS_PER_SAMPLE,
            data_size,
        })
    }

    /// Header for a mono render with `settings`, checked before any samples
    /// are produced.
    pub fn for_settings(settings: &RenderSettings) -> Result<Self, RenderError> {
        WavHeader::pcm16(settings.sample_rate, 1, settings.sample_count())
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        let fields: [&[u8]; 13] = [
            // RIFF header
            b"RIFF",
            &self.riff_size.to_le_bytes(),
            b"WAVE",
            // fmt chunk
            b"fmt ",
            &FMT_CHUNK_LEN.to_le_bytes(),
            &self.format.to_le_bytes(),
            &self.channels.to_le_bytes(),
            &self.sample_rate.to_le_bytes(),
            &self.byte_rate.to_le_bytes(),
            &self.block_align.to_le_bytes(),
            &self.bits_per_sample.to_le_bytes(),
            // data chunk
            b"data",
            &self.data_size.to_le_bytes(),
        ];
        let mut pos = 0;
        for field in fields {
            buf[pos..pos + field.len()].copy_from_slice(field);
            pos += field.len();
        }
        buf
    }

    /// Parse a canonical 44-byte header.
    pub fn parse(bytes: &[u8]) -> Result<Self, RenderError> {
        if bytes.len() < HEADER_LEN {
            return Err(RenderError::InvalidHeader(format!(
                "need {HEADER_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let tag = |at: usize, expected: &[u8; 4]| {
            if &bytes[at..at + 4] == expected {
                Ok(())
            } else {
                Err(RenderError::InvalidHeader(format!(
                    "expected {:?} at byte {at}",
                    String::from_utf8_lossy(expected)
                )))
            }
        };
        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let u32_at =
            |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);

        tag(0, b"RIFF")?;
        tag(8, b"WAVE")?;
        tag(12, b"fmt ")?;
        tag(36, b"data")?;
        Ok(WavHeader {
            riff_size: u32_at(4),
            format: u16_at(20),
            channels: u16_at(22),
            sample_rate: u32_at(24),
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            bits_per_sample: u16_at(34),
            data_size: u32_at(40),
        })
    }

    /// Whether the declared sizes agree with each other and the format fields.
    pub fn is_consistent(&self) -> bool {
        self.riff_size == 36 + self.data_size
            && self.block_align == self.channels * (self.bits_per_sample / 8)
            && self.byte_rate == self.sample_rate * self.block_align as u32
            && self.data_size % self.block_align.max(1) as u32 == 0
    }
}

/// Encode interleaved i16 PCM samples to a WAV byte buffer.
pub fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>, RenderError> {
    let header = WavHeader::pcm16(sample_rate, channels, samples.len())?;
    let mut buf = Vec::with_capacity(HEADER_LEN + samples.len() * 2);
    buf.extend_from_slice(&header.to_bytes());
    for &sample in samples {
        buf.extend_from_slice(&sample.to_le_bytes());
    }
    Ok(buf)
}

/// Stream a WAV to `out`: `header` first, then the samples in order.
/// `header` must describe exactly `samples`.
pub fn write_wav<W: Write>(out: &mut W, header: &WavHeader, samples: &[i16]) -> io::Result<()> {
    debug_assert_eq!(header.data_size as usize, samples.len() * 2);
    out.write_all(&header.to_bytes())?;
    for &sample in samples {
        out.write_all(&sample.to_le_bytes())?;
    }
    out.flush()
}

/// Outcome of a successful render to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderReport {
    pub path: PathBuf,
    pub samples: usize,
    pub bytes: u64,
}

/// Render `bank` and write it to `<dir>/<name>.wav`, creating `dir` if needed.
pub fn render_to_file(
    bank: &HarmonicBank,
    settings: &RenderSettings,
    dir: &Path,
    name: &str,
) -> Result<RenderReport, RenderError> {
    let path = dir.join(format!("{name}.wav"));
    let io_err = |source| RenderError::Io {
        path: path.clone(),
        source,
    };

    let header = WavHeader::for_settings(settings)?;
    let samples = bank.render(settings);
    fs::create_dir_all(dir).map_err(io_err)?;
    let file = File::create(&path).map_err(io_err)?;
    let mut out = BufWriter::new(file);
    write_wav(&mut out, &header, &samples).map_err(io_err)?;

    let bytes = (HEADER_LEN + samples.len() * 2) as u64;
    info!(path = %path.display(), samples = samples.len(), bytes, "wave file written");
    Ok(RenderReport {
        path,
        samples: samples.len(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::bank::Normalization;

    fn tone_bank() -> HarmonicBank {
        let mut bank = HarmonicBank::new(4, 440.0).unwrap();
        bank.set_amplitude(0, 0.9).unwrap();
        bank.set_amplitude(2, 0.4).unwrap();
        bank
    }

    #[test]
    fn wav_header_valid() {
        let wav = encode_wav(&[0, 1, -1, 32767], 44100, 1).unwrap();

        // Check RIFF header
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(&wav[36..40], b"data");

        // Check sample rate
        let sr = u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]);
        assert_eq!(sr, 44100);

        // Check channels
        let ch = u16::from_le_bytes([wav[22], wav[23]]);
        assert_eq!(ch, 1);

        // Samples follow little-endian
        assert_eq!(&wav[44..46], &[0, 0]);
        assert_eq!(&wav[46..48], &[1, 0]);
        assert_eq!(&wav[48..50], &[0xff, 0xff]);
        assert_eq!(&wav[50..52], &[0xff, 0x7f]);
    }

    #[test]
    fn declared_sizes_match_data() {
        let settings = RenderSettings {
            sample_rate: 22050,
            duration_secs: 0.37,
            normalization: Normalization::Sounding,
        };
        let samples = tone_bank().render(&settings);
        let wav = encode_wav(&samples, settings.sample_rate, 1).unwrap();
        let header = WavHeader::parse(&wav).unwrap();

        assert_eq!(header.data_size as usize, 2 * samples.len());
        assert_eq!(header.riff_size, 36 + header.data_size);
        assert_eq!(wav.len(), HEADER_LEN + header.data_size as usize);
        assert_eq!(header.byte_rate, 44100);
        assert_eq!(header.block_align, 2);
        assert!(header.is_consistent());
    }

    #[test]
    fn streamed_and_buffered_encodings_agree() {
        let samples = tone_bank().render(&RenderSettings {
            duration_secs: 0.05,
            ..RenderSettings::default()
        });
        let mut streamed = Vec::new();
        let header = WavHeader::pcm16(44100, 1, samples.len()).unwrap();
        write_wav(&mut streamed, &header, &samples).unwrap();
        assert_eq!(streamed, encode_wav(&samples, 44100, 1).unwrap());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(WavHeader::parse(b"RIFF").is_err());
        let mut wav = encode_wav(&[1, 2, 3], 8000, 1).unwrap();
        wav[8..12].copy_from_slice(b"AVI ");
        assert!(matches!(WavHeader::parse(&wav), Err(RenderError::InvalidHeader(_))));
    }

    #[test]
    fn render_to_file_is_readable_by_hound() {
        let dir = tempfile::tempdir().unwrap();
        let settings = RenderSettings {
            sample_rate: 16000,
            duration_secs: 0.25,
            normalization: Normalization::Sounding,
        };
        let bank = tone_bank();
        let report = render_to_file(&bank, &settings, &dir.path().join("nested"), "tone").unwrap();
        assert_eq!(report.samples, 4000);
        assert_eq!(report.path, dir.path().join("nested").join("tone.wav"));
        assert_eq!(fs::metadata(&report.path).unwrap().len(), report.bytes);

        let mut reader = hound::WavReader::open(&report.path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, hound::SampleFormat::Int);
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, bank.render(&settings));
    }

    #[test]
    fn unwritable_destination_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        // A regular file cannot act as the output directory
        let err = render_to_file(&tone_bank(), &RenderSettings::default(), &blocker, "out").unwrap_err();
        assert!(matches!(err, RenderError::Io { .. }), "got {err:?}");
    }

    #[test]
    fn oversized_sample_rate_is_rejected() {
        let err = WavHeader::pcm16(3_000_000_000, 1, 0).unwrap_err();
        assert!(matches!(err, RenderError::InvalidHeader(_)), "got {err:?}");
        assert!(encode_wav(&[], 3_000_000_000, 1).is_err());
        // The largest rate whose byte rate still fits
        let header = WavHeader::pcm16(u32::MAX / 2, 1, 0).unwrap();
        assert_eq!(header.byte_rate, u32::MAX - 1);
    }

    #[test]
    fn data_size_never_wraps() {
        // 2^31 + 99 samples would wrap to 198 bytes if truncated
        assert!(WavHeader::pcm16(44100, 1, 2_147_483_747).is_err());
        // Largest count whose RIFF size (36 + data) still fits
        let max = ((u32::MAX - 36) / 2) as usize;
        let header = WavHeader::pcm16(44100, 1, max).unwrap();
        assert_eq!(header.data_size as usize, 2 * max);
        assert_eq!(header.riff_size, 36 + header.data_size);
        assert!(WavHeader::pcm16(44100, 1, max + 1).is_err());
    }

    #[test]
    fn render_to_file_checks_header_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let settings = RenderSettings {
            sample_rate: 3_000_000_000,
            duration_secs: 0.0,
            normalization: Normalization::Sounding,
        };
        let err = render_to_file(&tone_bank(), &settings, dir.path(), "huge").unwrap_err();
        assert!(matches!(err, RenderError::InvalidHeader(_)), "got {err:?}");
        assert!(!dir.path().join("huge.wav").exists());
    }
}
