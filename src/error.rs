//! Error types shared by the engine, the audio collaborators and the presenter.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while setting up or running a visualizer session
///
/// Per-frame audio hiccups (short reads, silence) are recovered locally and
/// never show up here; everything in this enum is fatal for the operation
/// that produced it.
#[derive(Error, Debug)]
pub enum VisualizerError {
    #[error("Failed to open audio source {path}: {source}")]
    AudioOpen {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to allocate {width}x{height} render surface")]
    SurfaceAllocation { width: u32, height: u32 },

    #[error("Audio playback error: {0}")]
    Playback(String),

    #[error("Presenter error: {0}")]
    Presenter(String),

    #[error("Playback loop is not running")]
    NotRunning,
}

pub type Result<T> = std::result::Result<T, VisualizerError>;
