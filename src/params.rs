//! Parameter definitions with units and documented semantics.
//!
//! All tuning constants live here with:
//! - Units (pixels, ticks, bins, milliseconds)
//! - Documented ranges and meanings
//! - A `validate()` that rejects values the engine cannot run with

mod audio;
mod render;

use crate::error::Result;

// Re-export all types
pub use audio::AnalysisConfig;
pub use render::{PipelineStages, RenderConfig};

/// Session configuration, read-only once the engine is built
#[derive(Debug, Clone)]
pub struct VisualizerConfig {
    pub analysis: AnalysisConfig,
    pub render: RenderConfig,
    pub stages: PipelineStages,

    /// Seed for the engine's random generator
    pub seed: u64,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig::default(),
            render: RenderConfig::default(),
            stages: PipelineStages::default(),
            seed: 0x5EED,
        }
    }
}

impl VisualizerConfig {
    pub fn validate(&self) -> Result<()> {
        self.analysis.validate()?;
        self.render.validate()
    }
}
