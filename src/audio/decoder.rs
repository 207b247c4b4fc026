//! # Audio Decoder
//!
//! Decodes audio files to mono PCM at the recognizer sample rate.
//!
//! ## Decoding paths:
//! - **WAV**: read with `hound`, averaged to mono, resampled with `rubato`
//! - **Everything else** (mp3, m4a, flac, ...): piped through the system
//!   FFmpeg binary as 16-bit little-endian PCM
//!
//! FFmpeg availability is resolved once when the decoder is constructed;
//! decoding a compressed container without it is a classified
//! `MissingAudioCodec` failure, not a crash.

use crate::transcription::error::TranscribeError;
use crate::transcription::model::SAMPLE_RATE;
use anyhow::{anyhow, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use rubato::{FftFixedIn, Resampler};
use std::io::Cursor;
use std::path::Path;
use std::process::Command;

const RESAMPLER_CHUNK_SIZE: usize = 1024;

/// Decoded PCM ready for recognition.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Mono samples at 16kHz, normalized to [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Audio duration in seconds.
    pub duration_seconds: f64,
}

/// File-to-PCM decoder with an FFmpeg capability flag.
pub struct AudioDecoder {
    ffmpeg_available: bool,
}

impl AudioDecoder {
    /// Probe the system FFmpeg once and construct the decoder.
    pub fn new() -> Self {
        let ffmpeg_available = probe_ffmpeg();
        if ffmpeg_available {
            tracing::info!("FFmpeg found; compressed audio formats enabled");
        } else {
            tracing::warn!(
                "FFmpeg not found; only WAV files can be decoded until it is installed"
            );
        }
        Self { ffmpeg_available }
    }

    /// Whether compressed containers can be decoded on this host.
    pub fn ffmpeg_available(&self) -> bool {
        self.ffmpeg_available
    }

    /// Decode a file to 16kHz mono PCM.
    pub fn decode(&self, path: &Path) -> Result<DecodedAudio, TranscribeError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        let samples = if extension == "wav" {
            decode_wav(path).map_err(|e| TranscribeError::classify(&e))?
        } else {
            if !self.ffmpeg_available {
                return Err(TranscribeError::MissingAudioCodec(format!(
                    "ffmpeg is required to decode .{} files",
                    extension
                )));
            }
            decode_with_ffmpeg(path).map_err(|e| TranscribeError::classify(&e))?
        };

        let duration_seconds = samples.len() as f64 / SAMPLE_RATE as f64;
        Ok(DecodedAudio {
            samples,
            duration_seconds,
        })
    }
}

impl Default for AudioDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Check whether `ffmpeg -version` runs.
fn probe_ffmpeg() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Decode a WAV file with hound, downmix, and resample.
fn decode_wav(path: &Path) -> Result<Vec<f32>> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file {}", path.display()))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .context("Failed to read float WAV samples")?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .context("Failed to read integer WAV samples")?
        }
    };

    let mono = to_mono(&samples, spec.channels as usize);
    resample(&mono, spec.sample_rate as usize)
}

/// Decode any FFmpeg-supported container by piping raw s16le PCM out of it.
fn decode_with_ffmpeg(path: &Path) -> Result<Vec<f32>> {
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-i"])
        .arg(path)
        .args(["-f", "s16le", "-ac", "1", "-ar"])
        .arg(SAMPLE_RATE.to_string())
        .arg("-")
        .output()
        .context("Failed to spawn ffmpeg")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "ffmpeg failed to decode {}: {}",
            path.display(),
            stderr.trim()
        ));
    }

    let mut cursor = Cursor::new(output.stdout);
    let mut samples = Vec::with_capacity(cursor.get_ref().len() / 2);
    while let Ok(value) = cursor.read_i16::<LittleEndian>() {
        samples.push(value as f32 / 32768.0);
    }
    Ok(samples)
}

/// Average interleaved channels down to mono.
fn to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    let frames = samples.len() / channels;
    let mut mono = Vec::with_capacity(frames);
    for frame in 0..frames {
        let mut sum = 0.0f32;
        for ch in 0..channels {
            sum += samples[frame * channels + ch];
        }
        mono.push(sum / channels as f32);
    }
    mono
}

/// Resample mono PCM to the recognizer sample rate.
fn resample(samples: &[f32], source_rate: usize) -> Result<Vec<f32>> {
    if source_rate == SAMPLE_RATE {
        return Ok(samples.to_vec());
    }

    let mut resampler =
        FftFixedIn::<f32>::new(source_rate, SAMPLE_RATE, RESAMPLER_CHUNK_SIZE, 1, 1)
            .map_err(|e| anyhow!("Failed to create resampler: {}", e))?;

    let mut output = Vec::new();
    let mut input_pos = 0;

    while input_pos + RESAMPLER_CHUNK_SIZE <= samples.len() {
        let chunk = &samples[input_pos..input_pos + RESAMPLER_CHUNK_SIZE];
        let resampled = resampler
            .process(&[chunk], None)
            .map_err(|e| anyhow!("Resampling failed: {}", e))?;
        output.extend_from_slice(&resampled[0]);
        input_pos += RESAMPLER_CHUNK_SIZE;
    }

    // Zero-pad the tail chunk, then trim the padding back off the output.
    if input_pos < samples.len() {
        let remaining = samples.len() - input_pos;
        let mut last_chunk = vec![0.0f32; RESAMPLER_CHUNK_SIZE];
        last_chunk[..remaining].copy_from_slice(&samples[input_pos..]);
        let resampled = resampler
            .process(&[last_chunk.as_slice()], None)
            .map_err(|e| anyhow!("Resampling failed: {}", e))?;
        let out_len = (remaining as f64 * SAMPLE_RATE as f64 / source_rate as f64) as usize;
        output.extend_from_slice(&resampled[0][..out_len.min(resampled[0].len())]);
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_mono_passthrough() {
        let samples = vec![0.0f32, 0.5, 1.0, -1.0];
        assert_eq!(to_mono(&samples, 1), samples);
    }

    #[test]
    fn test_to_mono_averages_stereo() {
        let samples = vec![0.1f32, 0.3, 0.5, 0.7];
        let mono = to_mono(&samples, 2);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.2).abs() < 0.001);
        assert!((mono[1] - 0.6).abs() < 0.001);
    }

    #[test]
    fn test_resample_identity_at_target_rate() {
        let samples = vec![0.25f32; 4800];
        let resampled = resample(&samples, SAMPLE_RATE).unwrap();
        assert_eq!(resampled, samples);
    }

    #[test]
    fn test_resample_halves_sample_count() {
        let samples = vec![0.1f32; 32_000];
        let resampled = resample(&samples, 32_000).unwrap();
        // 32kHz -> 16kHz should roughly halve the sample count.
        let expected = samples.len() / 2;
        assert!((resampled.len() as i64 - expected as i64).abs() < 1024);
    }

    #[test]
    fn test_compressed_format_without_ffmpeg_is_classified() {
        let decoder = AudioDecoder {
            ffmpeg_available: false,
        };
        let result = decoder.decode(Path::new("/tmp/clip.mp3"));
        match result {
            Err(TranscribeError::MissingAudioCodec(reason)) => {
                assert!(reason.contains("mp3"));
            }
            other => panic!("expected MissingAudioCodec, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_wav_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: SAMPLE_RATE as u32,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..SAMPLE_RATE {
            let t = i as f32 / SAMPLE_RATE as f32;
            let sample = (t * 440.0 * 2.0 * std::f32::consts::PI).sin();
            writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();

        let decoder = AudioDecoder {
            ffmpeg_available: false,
        };
        let decoded = decoder.decode(&path).unwrap();
        assert_eq!(decoded.samples.len(), SAMPLE_RATE);
        assert!((decoded.duration_seconds - 1.0).abs() < 0.001);
    }
}
