//! Audible playback of the analysed file on the default output device.
//!
//! Playback is independent of the analysis path: the file is decoded once
//! up front and looped by the output callback, so sound and visuals may drift
//! slightly but both wrap at end of stream.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use hound::WavReader;
use tracing::{error, info, warn};

use crate::error::{Result, VisualizerError};

/// Something that plays the session's audio and can be paused
pub trait PlaybackSink {
    fn set_paused(&mut self, paused: bool);
}

/// Fully decoded file, samples scaled to [-1, 1]
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }
}

/// Decode a 16-bit WAV file into memory
pub fn decode_all(path: &Path) -> Result<DecodedAudio> {
    let mut reader = WavReader::open(path).map_err(|source| VisualizerError::AudioOpen {
        path: path.to_path_buf(),
        source,
    })?;
    let spec = reader.spec();
    if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
        return Err(VisualizerError::UnsupportedFormat(format!(
            "{}: expected 16-bit integer PCM",
            path.display()
        )));
    }

    let samples = reader
        .samples::<i16>()
        .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
        .collect::<std::result::Result<Vec<f32>, _>>()
        .map_err(|source| VisualizerError::AudioOpen {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(DecodedAudio {
        samples,
        channels: spec.channels.max(1),
        sample_rate: spec.sample_rate,
    })
}

/// Looping output stream on the default device
pub struct LoopedPlayback {
    /// Audio output stream (kept alive)
    _stream: cpal::Stream,
    paused: Arc<AtomicBool>,
}

impl LoopedPlayback {
    /// Decode `path` and start looping it immediately
    pub fn start(path: &Path) -> Result<Self> {
        let audio = decode_all(path)?;

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| VisualizerError::Playback("No audio output device found".into()))?;

        let config = output_config(&device, audio.sample_rate)?;
        let output_rate = config.sample_rate().0;

        info!(
            "Audio output: {} @ {}Hz",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            output_rate
        );
        if output_rate != audio.sample_rate {
            warn!(
                "Output runs at {}Hz but the file is {}Hz; resampling on the fly",
                output_rate, audio.sample_rate
            );
        }

        let out_channels = config.channels().max(1) as usize;
        let src_channels = audio.channels as usize;
        let mut cursor = LoopCursor::new(audio.frames(), audio.sample_rate, output_rate);
        let samples = Arc::new(audio.samples);
        let paused = Arc::new(AtomicBool::new(false));
        let paused_cb = Arc::clone(&paused);

        let stream = device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(out_channels) {
                        if paused_cb.load(Ordering::Relaxed) {
                            frame.fill(0.0);
                            continue;
                        }
                        cursor.next_frame(&samples, src_channels, frame);
                    }
                },
                |err| error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| VisualizerError::Playback(format!("Failed to build audio stream: {e}")))?;

        stream
            .play()
            .map_err(|e| VisualizerError::Playback(format!("Failed to start audio stream: {e}")))?;

        Ok(Self {
            _stream: stream,
            paused,
        })
    }
}

/// Prefer an f32 output config running at the file's own rate
fn output_config(device: &cpal::Device, target_rate: u32) -> Result<cpal::SupportedStreamConfig> {
    if let Ok(ranges) = device.supported_output_configs() {
        let matching = ranges
            .filter(|range| range.sample_format() == cpal::SampleFormat::F32)
            .find(|range| {
                (range.min_sample_rate().0..=range.max_sample_rate().0).contains(&target_rate)
            });
        if let Some(range) = matching {
            return Ok(range.with_sample_rate(cpal::SampleRate(target_rate)));
        }
    }

    device
        .default_output_config()
        .map_err(|e| VisualizerError::Playback(format!("Failed to get audio config: {e}")))
}

/// Fractional read position into looped, interleaved audio
///
/// Advances `source_rate / output_rate` source frames per output frame and
/// interpolates linearly between neighbours, wrapping at end of stream.
#[derive(Debug, Clone)]
pub struct LoopCursor {
    position: f64,
    step: f64,
    frames: usize,
}

impl LoopCursor {
    pub fn new(frames: usize, source_rate: u32, output_rate: u32) -> Self {
        let step = if source_rate == 0 || output_rate == 0 {
            1.0
        } else {
            source_rate as f64 / output_rate as f64
        };
        Self {
            position: 0.0,
            step,
            frames,
        }
    }

    /// Source frames consumed per output frame
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Current position in source frames, always below the frame count
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Fill one output frame from `samples` and advance
    ///
    /// Output channels beyond the source's repeat its last channel.
    pub fn next_frame(&mut self, samples: &[f32], channels: usize, out: &mut [f32]) {
        if self.frames == 0 || channels == 0 || samples.len() < self.frames * channels {
            out.fill(0.0);
            return;
        }

        let i = (self.position as usize).min(self.frames - 1);
        let j = (i + 1) % self.frames;
        let t = (self.position - i as f64) as f32;
        for (ch, sample) in out.iter_mut().enumerate() {
            let ch = ch.min(channels - 1);
            let a = samples[i * channels + ch];
            let b = samples[j * channels + ch];
            *sample = a + (b - a) * t;
        }

        self.position += self.step;
        if self.position >= self.frames as f64 {
            self.position %= self.frames as f64;
        }
    }
}

impl PlaybackSink for LoopedPlayback {
    fn set_paused(&mut self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }
}

impl Drop for LoopedPlayback {
    fn drop(&mut self) {
        info!("Audio playback stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_all_scales_samples() {
        let path = std::env::temp_dir().join(format!(
            "spiralstorm-decode-{}.wav",
            std::process::id()
        ));
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for s in [i16::MAX, 0, 0, i16::MAX] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let audio = decode_all(&path).unwrap();
        assert_eq!(audio.channels, 2);
        assert_eq!(audio.sample_rate, 22050);
        assert_eq!(audio.frames(), 2);
        assert_eq!(audio.samples, vec![1.0, 0.0, 0.0, 1.0]);

        let _ = std::fs::remove_file(&path);
    }

    fn pull(cursor: &mut LoopCursor, samples: &[f32], channels: usize, n: usize) -> Vec<f32> {
        let mut out = Vec::new();
        let mut frame = [0.0f32; 1];
        for _ in 0..n {
            cursor.next_frame(samples, channels, &mut frame);
            out.push(frame[0]);
        }
        out
    }

    #[test]
    fn test_cursor_matching_rates_plays_samples_verbatim() {
        let samples = [0.1, 0.2, 0.3];
        let mut cursor = LoopCursor::new(3, 44100, 44100);
        let out = pull(&mut cursor, &samples, 1, 5);
        assert_eq!(out, vec![0.1, 0.2, 0.3, 0.1, 0.2]);
    }

    #[test]
    fn test_cursor_upsampling_interpolates_midpoints() {
        let samples = [0.0, 1.0, 0.0, -1.0];
        let mut cursor = LoopCursor::new(4, 22050, 44100);
        assert_eq!(cursor.step(), 0.5);

        let out = pull(&mut cursor, &samples, 1, 10);
        let expected = [0.0, 0.5, 1.0, 0.5, 0.0, -0.5, -1.0, -0.5, 0.0, 0.5];
        for (got, want) in out.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "got {got}, want {want}");
        }
    }

    #[test]
    fn test_cursor_keeps_file_tempo_on_faster_device() {
        // One second at 48kHz must consume one second of a 44.1kHz file
        let samples = vec![0.0; 100_000];
        let mut cursor = LoopCursor::new(samples.len(), 44100, 48000);
        pull(&mut cursor, &samples, 1, 48000);
        assert!((cursor.position() - 44100.0).abs() < 1e-3);
    }

    #[test]
    fn test_cursor_wraps_at_end_of_stream() {
        let samples = vec![0.0; 10];
        let mut cursor = LoopCursor::new(10, 44100, 48000);
        for _ in 0..1000 {
            let mut frame = [0.0f32; 2];
            cursor.next_frame(&samples, 1, &mut frame);
            assert!(cursor.position() < 10.0);
        }
    }

    #[test]
    fn test_cursor_maps_channels() {
        // Stereo frames (L, R): (1, -1), (3, -3)
        let stereo = [1.0, -1.0, 3.0, -3.0];
        let mut cursor = LoopCursor::new(2, 1, 2);
        let mut frame = [0.0f32; 2];
        cursor.next_frame(&stereo, 2, &mut frame);
        assert_eq!(frame, [1.0, -1.0]);
        cursor.next_frame(&stereo, 2, &mut frame);
        assert_eq!(frame, [2.0, -2.0]);

        // Mono fans out to every output channel
        let mut cursor = LoopCursor::new(1, 44100, 44100);
        let mut frame = [0.0f32; 3];
        cursor.next_frame(&[0.25], 1, &mut frame);
        assert_eq!(frame, [0.25; 3]);
    }

    #[test]
    fn test_cursor_empty_source_is_silent() {
        let mut cursor = LoopCursor::new(0, 44100, 48000);
        let mut frame = [1.0f32; 2];
        cursor.next_frame(&[], 1, &mut frame);
        assert_eq!(frame, [0.0, 0.0]);
    }

    #[test]
    fn test_decode_all_missing_file() {
        let result = decode_all(Path::new("/nonexistent/missing.wav"));
        assert!(matches!(result, Err(VisualizerError::AudioOpen { .. })));
    }
}
