//! Spectrum extraction: PCM chunk → normalized magnitude vector.

use std::f32::consts::PI;
use std::ops::Range;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use tracing::{debug, trace};

use super::source::AudioSource;
use crate::params::AnalysisConfig;

/// Normalized magnitude-by-bin vector for one audio chunk
///
/// Every bin is in `[0, 1]`; a silent chunk produces all zeros.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFrame {
    bins: Vec<f32>,
}

impl SpectrumFrame {
    /// All-zero frame of `len` bins
    pub fn zeros(len: usize) -> Self {
        Self {
            bins: vec![0.0; len],
        }
    }

    /// Wrap precomputed bins, clamping each into `[0, 1]`
    pub fn from_bins(bins: Vec<f32>) -> Self {
        Self {
            bins: bins
                .into_iter()
                .map(|b| if b.is_finite() { b.clamp(0.0, 1.0) } else { 0.0 })
                .collect(),
        }
    }

    pub fn bins(&self) -> &[f32] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn is_silent(&self) -> bool {
        self.bins.iter().all(|&b| b == 0.0)
    }

    /// Sum of magnitudes over `range`, clamped to the frame length
    pub fn band_energy(&self, range: &Range<usize>) -> f32 {
        let end = range.end.min(self.bins.len());
        let start = range.start.min(end);
        self.bins[start..end].iter().sum()
    }
}

/// Turns raw PCM chunks into spectrum frames
pub struct SpectrumExtractor {
    chunk_size: usize,
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    window: Option<Vec<f32>>,
    smoothing: Option<f32>,
    previous: Option<Vec<f32>>,
}

impl SpectrumExtractor {
    pub fn new(config: &AnalysisConfig) -> Self {
        let chunk_size = config.chunk_size;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(chunk_size);

        let window: Option<Vec<f32>> = config
            .hann_window
            .then(|| (0..chunk_size).map(|i| hann_window(i, chunk_size)).collect());

        Self {
            chunk_size,
            fft,
            buffer: vec![Complex::new(0.0, 0.0); chunk_size],
            window,
            smoothing: config.smoothing,
            previous: None,
        }
    }

    /// Pull the next chunk from `source` and transform it
    ///
    /// Loops the source on end of stream. A completely empty source yields a
    /// zero frame of `chunk_size / 2` bins.
    pub fn next_frame(&mut self, source: &mut dyn AudioSource) -> SpectrumFrame {
        match read_looped(source, self.chunk_size) {
            Some(chunk) => self.extract(&chunk),
            None => SpectrumFrame::zeros(self.chunk_size / 2),
        }
    }

    /// Transform one mono chunk
    ///
    /// Chunks shorter than the configured size are zero-padded, longer ones
    /// truncated.
    pub fn extract(&mut self, samples: &[i16]) -> SpectrumFrame {
        let n = self.chunk_size;

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = samples.get(i).copied().unwrap_or(0) as f32;
            let weight = self.window.as_ref().map_or(1.0, |w| w[i]);
            *slot = Complex::new(sample * weight, 0.0);
        }

        self.fft.process(&mut self.buffer);

        // Real input: bins past n/2 mirror the lower half
        let scale = 1.0 / n as f32;
        let mut bins: Vec<f32> = self.buffer[..n / 2 + 1]
            .iter()
            .map(|c| c.norm() * scale)
            .collect();

        let max = bins.iter().copied().fold(0.0f32, f32::max);
        if max > 0.0 {
            for bin in &mut bins {
                *bin /= max;
            }
        } else {
            bins.fill(0.0);
        }

        if let Some(alpha) = self.smoothing {
            if let Some(previous) = self.previous.as_ref().filter(|p| p.len() == bins.len()) {
                for (bin, prev) in bins.iter_mut().zip(previous) {
                    *bin = alpha * *bin + (1.0 - alpha) * prev;
                }
            }
            self.previous = Some(bins.clone());
        }

        trace!("Spectrum peak before normalization: {max}");
        SpectrumFrame { bins }
    }
}

/// Read one mono chunk of exactly `chunk_size` frames, looping at end of stream
///
/// A short read triggers exactly one rewind and re-read; if the source is
/// shorter than a chunk the remainder is zero-padded. Returns `None` only for
/// a source with no frames at all.
pub fn read_looped(source: &mut dyn AudioSource, chunk_size: usize) -> Option<Vec<i16>> {
    let channels = source.channel_count().max(1) as usize;

    let mut raw = source.read_chunk(chunk_size);
    if raw.len() < chunk_size * channels {
        debug!("End of audio stream, rewinding");
        source.rewind();
        raw = source.read_chunk(chunk_size);
    }

    if raw.is_empty() {
        return None;
    }

    // Downmix by taking the first channel of each frame
    let mut mono: Vec<i16> = raw.iter().step_by(channels).copied().collect();
    mono.resize(chunk_size, 0);
    Some(mono)
}

/// Hann window function for FFT analysis
pub fn hann_window(index: usize, size: usize) -> f32 {
    if size < 2 {
        return 1.0;
    }
    0.5 * (1.0 - ((2.0 * PI * index as f32) / (size as f32 - 1.0)).cos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::MemorySource;
    use proptest::prelude::*;

    /// Integer-period sine so the tone lands exactly on one bin
    fn tone(bin: usize, amplitude: f32, len: usize) -> Vec<i16> {
        (0..len)
            .map(|i| {
                let phase = 2.0 * PI * bin as f32 * i as f32 / len as f32;
                (amplitude * phase.sin()).round() as i16
            })
            .collect()
    }

    #[test]
    fn test_silent_chunk_yields_zero_frame() {
        let config = AnalysisConfig::default();
        let mut extractor = SpectrumExtractor::new(&config);

        let frame = extractor.extract(&vec![0; config.chunk_size]);

        assert_eq!(frame.len(), config.spectrum_len());
        assert!(frame.is_silent());
        assert!(frame.bins().iter().all(|b| b.is_finite()));
    }

    #[test]
    fn test_tone_peaks_at_its_bin() {
        let config = AnalysisConfig::default();
        let mut extractor = SpectrumExtractor::new(&config);

        let frame = extractor.extract(&tone(32, 8000.0, config.chunk_size));

        let (peak, &value) = frame
            .bins()
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert_eq!(peak, 32);
        assert!((value - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_short_read_rewinds_exactly_once() {
        let config = AnalysisConfig::default();
        let mut extractor = SpectrumExtractor::new(&config);

        // One and a half chunks: the second read comes up short
        let samples = tone(10, 4000.0, config.chunk_size + config.chunk_size / 2);
        let mut source = MemorySource::new(samples, 1, 44100);

        let first = extractor.next_frame(&mut source);
        assert_eq!(source.rewind_count(), 0);

        let second = extractor.next_frame(&mut source);
        assert_eq!(source.rewind_count(), 1);

        assert_eq!(first.len(), config.spectrum_len());
        assert_eq!(second.len(), config.spectrum_len());
        // After the rewind we read the same opening chunk again
        assert_eq!(first, second);
    }

    #[test]
    fn test_source_shorter_than_chunk_is_padded() {
        let config = AnalysisConfig::default();
        let mut extractor = SpectrumExtractor::new(&config);
        let mut source = MemorySource::new(tone(4, 3000.0, 100), 1, 44100);

        let frame = extractor.next_frame(&mut source);

        assert_eq!(source.rewind_count(), 1);
        assert_eq!(frame.len(), config.spectrum_len());
        assert!(!frame.is_silent());
    }

    #[test]
    fn test_empty_source_yields_zero_frame() {
        let config = AnalysisConfig::default();
        let mut extractor = SpectrumExtractor::new(&config);
        let mut source = MemorySource::new(Vec::new(), 1, 44100);

        let frame = extractor.next_frame(&mut source);

        assert_eq!(frame.len(), config.chunk_size / 2);
        assert!(frame.is_silent());
        assert_eq!(source.rewind_count(), 1);
    }

    #[test]
    fn test_stereo_downmix_uses_first_channel() {
        let config = AnalysisConfig::default();
        let mut extractor = SpectrumExtractor::new(&config);

        let left = tone(20, 6000.0, config.chunk_size);
        let right = tone(90, 6000.0, config.chunk_size);
        let interleaved: Vec<i16> = left
            .iter()
            .zip(&right)
            .flat_map(|(&l, &r)| [l, r])
            .collect();
        let mut source = MemorySource::new(interleaved, 2, 44100);

        let frame = extractor.next_frame(&mut source);

        assert!((frame.bins()[20] - 1.0).abs() < 1e-6);
        assert!(frame.bins()[90] < 0.01);
    }

    #[test]
    fn test_smoothing_blends_with_previous_frame() {
        let config = AnalysisConfig {
            smoothing: Some(0.5),
            ..Default::default()
        };
        let mut extractor = SpectrumExtractor::new(&config);

        extractor.extract(&vec![0; config.chunk_size]);
        let frame = extractor.extract(&tone(16, 5000.0, config.chunk_size));

        assert!((frame.bins()[16] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_hann_window() {
        let size = 1024;

        // Hann window should be 0 at edges, 1 at center
        assert!((hann_window(0, size) - 0.0).abs() < 0.01);
        assert!((hann_window(size - 1, size) - 0.0).abs() < 0.01);
        assert!((hann_window(size / 2, size) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_band_energy_clamps_range() {
        let frame = SpectrumFrame::from_bins(vec![0.5, 0.25, 0.25]);
        assert!((frame.band_energy(&(0..50)) - 1.0).abs() < 1e-6);
        assert_eq!(frame.band_energy(&(10..20)), 0.0);
    }

    proptest! {
        #[test]
        fn prop_bins_are_normalized(samples in proptest::collection::vec(any::<i16>(), 0..600)) {
            let config = AnalysisConfig::default();
            let mut extractor = SpectrumExtractor::new(&config);

            let frame = extractor.extract(&samples);

            prop_assert_eq!(frame.len(), config.spectrum_len());
            for &bin in frame.bins() {
                prop_assert!(bin.is_finite());
                prop_assert!((0.0..=1.0 + 1e-6).contains(&bin));
            }
        }
    }
}
