//! PCM sources feeding the analysis path.
//!
//! The engine never decodes compressed audio itself: a source hands out
//! interleaved signed 16-bit frames and knows how to rewind.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader};
use tracing::{debug, info, warn};

use crate::error::{Result, VisualizerError};

/// Streaming PCM source
pub trait AudioSource {
    /// Read up to `frames` frames of interleaved samples
    ///
    /// Returns fewer than `frames * channel_count()` samples at end of stream.
    fn read_chunk(&mut self, frames: usize) -> Vec<i16>;

    /// Seek back to the first frame
    fn rewind(&mut self);

    /// Bytes per sample
    fn sample_width(&self) -> u16;

    fn channel_count(&self) -> u16;

    fn sample_rate(&self) -> u32;
}

/// WAV file source (16-bit integer PCM)
pub struct WavSource {
    path: PathBuf,
    reader: WavReader<BufReader<File>>,
}

impl WavSource {
    /// Open a WAV file for chunked reading
    ///
    /// Fails if the file is missing, unreadable or not 16-bit integer PCM.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let reader = WavReader::open(&path).map_err(|source| VisualizerError::AudioOpen {
            path: path.clone(),
            source,
        })?;

        let spec = reader.spec();
        if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(VisualizerError::UnsupportedFormat(format!(
                "{}: expected 16-bit integer PCM, got {}-bit {:?}",
                path.display(),
                spec.bits_per_sample,
                spec.sample_format
            )));
        }

        info!(
            "Audio source: {} ({} ch @ {}Hz, {} frames)",
            path.display(),
            spec.channels,
            spec.sample_rate,
            reader.duration()
        );

        Ok(Self { path, reader })
    }
}

impl AudioSource for WavSource {
    fn read_chunk(&mut self, frames: usize) -> Vec<i16> {
        let wanted = frames * self.channel_count() as usize;
        let mut samples = Vec::with_capacity(wanted);

        for sample in self.reader.samples::<i16>().take(wanted) {
            match sample {
                Ok(s) => samples.push(s),
                Err(e) => {
                    // Treat a corrupt tail like end of stream
                    warn!("Audio read error in {}: {}", self.path.display(), e);
                    break;
                }
            }
        }

        samples
    }

    fn rewind(&mut self) {
        if let Err(e) = self.reader.seek(0) {
            warn!("Failed to rewind {}: {}", self.path.display(), e);
        }
    }

    fn sample_width(&self) -> u16 {
        self.reader.spec().bits_per_sample / 8
    }

    fn channel_count(&self) -> u16 {
        self.reader.spec().channels
    }

    fn sample_rate(&self) -> u32 {
        self.reader.spec().sample_rate
    }
}

impl Drop for WavSource {
    fn drop(&mut self) {
        debug!("Released audio source {}", self.path.display());
    }
}

/// In-memory source over already-decoded samples
#[derive(Debug, Clone)]
pub struct MemorySource {
    samples: Vec<i16>,
    channels: u16,
    sample_rate: u32,
    position: usize,
    rewinds: usize,
}

impl MemorySource {
    /// Create a source over interleaved samples
    pub fn new(samples: Vec<i16>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels: channels.max(1),
            sample_rate,
            position: 0,
            rewinds: 0,
        }
    }

    /// Source of `frames` frames of digital silence
    pub fn silent(frames: usize, channels: u16, sample_rate: u32) -> Self {
        Self::new(vec![0; frames * channels.max(1) as usize], channels, sample_rate)
    }

    /// Number of times `rewind` has been called
    pub fn rewind_count(&self) -> usize {
        self.rewinds
    }
}

impl AudioSource for MemorySource {
    fn read_chunk(&mut self, frames: usize) -> Vec<i16> {
        let wanted = frames * self.channels as usize;
        let end = (self.position + wanted).min(self.samples.len());
        let chunk = self.samples[self.position..end].to_vec();
        self.position = end;
        chunk
    }

    fn rewind(&mut self) {
        self.position = 0;
        self.rewinds += 1;
    }

    fn sample_width(&self) -> u16 {
        2
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_short_read_at_end() {
        let mut source = MemorySource::new((0..10).collect(), 1, 44100);

        assert_eq!(source.read_chunk(4), vec![0, 1, 2, 3]);
        assert_eq!(source.read_chunk(4), vec![4, 5, 6, 7]);
        assert_eq!(source.read_chunk(4), vec![8, 9]);
        assert!(source.read_chunk(4).is_empty());

        source.rewind();
        assert_eq!(source.rewind_count(), 1);
        assert_eq!(source.read_chunk(2), vec![0, 1]);
    }

    #[test]
    fn test_memory_source_reads_whole_frames() {
        // Stereo: one frame = two samples
        let mut source = MemorySource::new(vec![1, -1, 2, -2, 3, -3], 2, 48000);
        assert_eq!(source.read_chunk(2), vec![1, -1, 2, -2]);
        assert_eq!(source.channel_count(), 2);
        assert_eq!(source.sample_width(), 2);
    }

    #[test]
    fn test_wav_source_missing_file_is_fatal() {
        let result = WavSource::open("/nonexistent/definitely-missing.wav");
        assert!(matches!(result, Err(VisualizerError::AudioOpen { .. })));
    }

    #[test]
    fn test_wav_source_roundtrip_and_rewind() {
        let path = std::env::temp_dir().join(format!(
            "spiralstorm-source-{}.wav",
            std::process::id()
        ));
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for s in 0..8i16 {
            writer.write_sample(s * 100).unwrap();
        }
        writer.finalize().unwrap();

        let mut source = WavSource::open(&path).unwrap();
        assert_eq!(source.sample_rate(), 44100);
        assert_eq!(source.read_chunk(5), vec![0, 100, 200, 300, 400]);
        assert_eq!(source.read_chunk(5), vec![500, 600, 700]);

        source.rewind();
        assert_eq!(source.read_chunk(2), vec![0, 100]);

        drop(source);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_wav_source_rejects_float_pcm() {
        let path = std::env::temp_dir().join(format!(
            "spiralstorm-float-{}.wav",
            std::process::id()
        ));
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0.5f32).unwrap();
        writer.finalize().unwrap();

        let result = WavSource::open(&path);
        assert!(matches!(result, Err(VisualizerError::UnsupportedFormat(_))));
        let _ = std::fs::remove_file(&path);
    }
}
