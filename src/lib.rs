//! Spiralstorm - audio-reactive spiral field with beat-driven lightning
//!
//! The engine runs headless on a CPU canvas; the binary adds a window,
//! a wgpu presenter and audible playback on top.

pub mod audio;
pub mod cli;
pub mod engine;
pub mod error;
pub mod logging;
pub mod params;
pub mod presenter;
pub mod scheduler;
pub mod visuals;

pub use engine::{TickReport, Visualizer};
pub use error::{Result, VisualizerError};
pub use params::VisualizerConfig;
pub use scheduler::{FrameLimiter, LoopEvent, LoopState, PlaybackLoop, TickOutcome};
