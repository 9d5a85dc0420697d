//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::params::{AnalysisConfig, PipelineStages, RenderConfig, VisualizerConfig};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "spiralstorm")]
#[command(about = "Audio-reactive spiral field with beat-driven lightning", long_about = None)]
pub struct Args {
    /// 16-bit PCM WAV file to visualize
    #[arg(value_name = "AUDIO")]
    pub audio: PathBuf,

    /// Canvas width (pixels)
    #[arg(long, default_value_t = 800)]
    pub width: u32,

    /// Canvas height (pixels)
    #[arg(long, default_value_t = 765)]
    pub height: u32,

    /// Target frame rate (frames per second)
    #[arg(long, default_value_t = 150)]
    pub fps: u32,

    /// Frames per analysis chunk
    #[arg(long, value_name = "FRAMES", default_value_t = 512)]
    pub chunk_size: usize,

    /// Number of bright spiral rings
    #[arg(long, default_value_t = 15)]
    pub bright_spirals: usize,

    /// Number of dark spiral rings
    #[arg(long, default_value_t = 15)]
    pub dark_spirals: usize,

    /// Background value, 0 = black, 1 = full brightness
    #[arg(long, default_value_t = 0.5)]
    pub background_darkness: f32,

    /// Background saturation (0-1)
    #[arg(long, default_value_t = 1.0)]
    pub background_saturation: f32,

    /// Bass energy ratio over the running mean that counts as a beat
    #[arg(long, default_value_t = 1.3)]
    pub beat_threshold: f32,

    /// Per-frame decay of the beat afterglow
    #[arg(long, default_value_t = 0.95)]
    pub beat_decay: f32,

    /// First spectrum bin of the bass band
    #[arg(long, default_value_t = 0)]
    pub bass_start: usize,

    /// End (exclusive) of the bass band
    #[arg(long, default_value_t = 50)]
    pub bass_end: usize,

    /// Blur downscale factor
    #[arg(long, default_value_t = 4)]
    pub blur_scale: u32,

    /// Hard cap on live lightning bolts
    #[arg(long, default_value_t = 64)]
    pub max_particles: usize,

    /// Apply a Hann window before the transform
    #[arg(long)]
    pub hann: bool,

    /// Exponential smoothing factor for spectra (0-1], off by default
    #[arg(long, value_name = "ALPHA")]
    pub smoothing: Option<f32>,

    /// Skip the blur stage
    #[arg(long)]
    pub no_blur: bool,

    /// Disable beat detection (no lightning)
    #[arg(long)]
    pub no_beats: bool,

    /// Keep the canvas at its initial size when the window resizes
    #[arg(long)]
    pub fixed_size: bool,

    /// Do not play the audio, only visualize it
    #[arg(long)]
    pub mute: bool,

    /// Random seed for particles and dark-ring flicker
    #[arg(long, default_value_t = 0x5EED)]
    pub seed: u64,

    /// Log debug output (RUST_LOG overrides)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Build the session configuration from the parsed flags
    pub fn to_config(&self) -> VisualizerConfig {
        VisualizerConfig {
            analysis: AnalysisConfig {
                chunk_size: self.chunk_size,
                hann_window: self.hann,
                smoothing: self.smoothing,
                bass_bins: self.bass_start..self.bass_end,
                beat_threshold: self.beat_threshold,
                beat_decay: self.beat_decay,
                ..Default::default()
            },
            render: RenderConfig {
                width: self.width,
                height: self.height,
                fps: self.fps,
                bright_spirals: self.bright_spirals,
                dark_spirals: self.dark_spirals,
                background_darkness: self.background_darkness,
                background_saturation: self.background_saturation,
                blur_scale: self.blur_scale,
                max_live_particles: self.max_particles,
                ..Default::default()
            },
            stages: PipelineStages {
                blur: !self.no_blur,
                beats: !self.no_beats,
                resizable: !self.fixed_size,
            },
            seed: self.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_params() {
        let args = Args::try_parse_from(["spiralstorm", "song.wav"]).unwrap();
        let config = args.to_config();
        let defaults = VisualizerConfig::default();

        assert_eq!(args.audio, PathBuf::from("song.wav"));
        assert_eq!(config.analysis.chunk_size, defaults.analysis.chunk_size);
        assert_eq!(config.analysis.bass_bins, defaults.analysis.bass_bins);
        assert_eq!(config.render.width, defaults.render.width);
        assert_eq!(config.render.height, defaults.render.height);
        assert_eq!(config.render.fps, defaults.render.fps);
        assert_eq!(config.seed, defaults.seed);
        assert!(config.stages.blur && config.stages.beats && config.stages.resizable);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "spiralstorm",
            "song.wav",
            "--width",
            "400",
            "--chunk-size",
            "1024",
            "--bass-start",
            "2",
            "--bass-end",
            "20",
            "--no-blur",
            "--smoothing",
            "0.5",
            "--seed",
            "42",
        ])
        .unwrap();
        let config = args.to_config();

        assert_eq!(config.render.width, 400);
        assert_eq!(config.analysis.chunk_size, 1024);
        assert_eq!(config.analysis.bass_bins, 2..20);
        assert_eq!(config.analysis.smoothing, Some(0.5));
        assert!(!config.stages.blur);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn test_audio_path_required() {
        assert!(Args::try_parse_from(["spiralstorm"]).is_err());
    }
}
