//! Audio analysis configuration: chunking, spectrum shaping and beat tuning.

use std::ops::Range;
use std::time::Duration;

use crate::error::{Result, VisualizerError};

/// Spectrum extraction and beat detection parameters
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Frames pulled from the audio source per tick (FFT length)
    /// 512 frames ≈ 11.6ms @ 44.1kHz
    pub chunk_size: usize,

    /// Apply a Hann window before the transform
    /// Off by default: the radial field was tuned on the raw spectrum
    pub hann_window: bool,

    /// Exponential smoothing factor α in `α·new + (1-α)·previous`
    /// `None` disables smoothing (each frame stands alone)
    pub smoothing: Option<f32>,

    /// Spectrum bin indices summed into the bass energy
    /// 0..50 @ 512 frames ≈ 0-4.3kHz, deliberately wide
    pub bass_bins: Range<usize>,

    /// Ratio of instantaneous to average bass energy that counts as a beat
    pub beat_threshold: f32,

    /// Per-tick multiplier applied to the residual beat intensity
    pub beat_decay: f32,

    /// Number of bass energies kept for the rolling average
    pub history_capacity: usize,

    /// Minimum spacing between two reported beats
    pub refractory: Duration,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            hann_window: false,
            smoothing: None,
            bass_bins: 0..50,
            beat_threshold: 1.3,
            beat_decay: 0.95,
            history_capacity: 50,
            refractory: Duration::from_millis(100),
        }
    }
}

impl AnalysisConfig {
    /// Number of magnitude bins produced by a real-input transform of one chunk
    pub fn spectrum_len(&self) -> usize {
        self.chunk_size / 2 + 1
    }

    /// Validate configuration (chunk size must allow a transform, etc.)
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size < 2 {
            return Err(VisualizerError::InvalidConfig(format!(
                "chunk size must be at least 2, got {}",
                self.chunk_size
            )));
        }
        if let Some(alpha) = self.smoothing {
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(VisualizerError::InvalidConfig(format!(
                    "smoothing factor must be in (0, 1], got {alpha}"
                )));
            }
        }
        if self.bass_bins.is_empty() {
            return Err(VisualizerError::InvalidConfig(
                "bass bin range is empty".to_string(),
            ));
        }
        if self.beat_threshold <= 0.0 {
            return Err(VisualizerError::InvalidConfig(format!(
                "beat threshold must be > 0, got {}",
                self.beat_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.beat_decay) {
            return Err(VisualizerError::InvalidConfig(format!(
                "beat decay must be in [0, 1], got {}",
                self.beat_decay
            )));
        }
        if self.history_capacity == 0 {
            return Err(VisualizerError::InvalidConfig(
                "energy history capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
