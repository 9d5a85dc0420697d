//! Rendering configuration: canvas, frame rate, spiral families and compositing.

use crate::error::{Result, VisualizerError};

/// Rendering configuration
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Baseline canvas width (pixels); all geometry is authored against it
    pub width: u32,

    /// Baseline canvas height (pixels)
    pub height: u32,

    /// Target frame rate (ticks per second)
    pub fps: u32,

    /// Rings in the bright spiral family
    pub bright_spirals: usize,

    /// Rings in the dark spiral family
    pub dark_spirals: usize,

    /// Background value (HSV "V", 0-1)
    pub background_darkness: f32,

    /// Background saturation (HSV "S", 0-1)
    pub background_saturation: f32,

    /// Alpha of the background wash laid over the accumulated frame (0-255)
    /// 255 clears every frame, lower values leave trails
    pub background_wash_alpha: u8,

    /// Alpha of the black glow rectangle blended every frame (0-255)
    pub glow_alpha: u8,

    /// Downscale factor for the fast blur
    pub blur_scale: u32,

    /// Hue advance per tick (fraction of a full turn)
    pub hue_increment: f64,

    /// Animation time advance per tick (arbitrary units)
    pub time_increment: f64,

    /// Hard cap on live lightning bolts
    pub max_live_particles: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 765,
            fps: 150,
            bright_spirals: 15,
            dark_spirals: 15,
            background_darkness: 0.5,
            background_saturation: 1.0,
            background_wash_alpha: 40,
            glow_alpha: 10,
            blur_scale: 4,
            hue_increment: 0.005,
            time_increment: 0.05,
            max_live_particles: 64,
        }
    }
}

impl RenderConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(VisualizerError::InvalidConfig(format!(
                "canvas must be non-empty, got {}x{}",
                self.width, self.height
            )));
        }
        if self.fps == 0 {
            return Err(VisualizerError::InvalidConfig(
                "fps must be > 0".to_string(),
            ));
        }
        if self.blur_scale == 0 {
            return Err(VisualizerError::InvalidConfig(
                "blur scale must be >= 1".to_string(),
            ));
        }
        for (name, value) in [
            ("background darkness", self.background_darkness),
            ("background saturation", self.background_saturation),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(VisualizerError::InvalidConfig(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Optional pipeline stages
///
/// Each stage can be switched off independently; the pipeline order stays
/// fixed.
#[derive(Debug, Clone, Copy)]
pub struct PipelineStages {
    /// Downscale/upscale blur over the field layer
    pub blur: bool,

    /// Beat detection and lightning bolts
    pub beats: bool,

    /// Accept window resizes (otherwise the canvas stays at baseline size)
    pub resizable: bool,
}

impl Default for PipelineStages {
    fn default() -> Self {
        Self {
            blur: true,
            beats: true,
            resizable: true,
        }
    }
}
