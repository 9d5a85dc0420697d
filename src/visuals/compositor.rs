//! Layer compositing: background wash, glow trails, fast blur, crisp overlay.

use tracing::debug;

use super::canvas::Canvas;
use super::color::Rgba;
use crate::error::Result;
use crate::params::{PipelineStages, RenderConfig};

/// Intermediate surfaces, always sized to the current canvas
pub struct RenderSurfaceSet {
    /// Persistent field layer; prior frames fade here instead of clearing
    accum: Canvas,
    /// Downscaled copy used by the fast blur
    blur: Canvas,
    /// Final frame handed to the presenter
    output: Canvas,
}

impl RenderSurfaceSet {
    pub fn new(width: u32, height: u32, blur_scale: u32) -> Result<Self> {
        let blur_scale = blur_scale.max(1);
        Ok(Self {
            accum: Canvas::new(width, height)?,
            blur: Canvas::new((width / blur_scale).max(1), (height / blur_scale).max(1))?,
            output: Canvas::new(width, height)?,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        self.output.size()
    }

    pub fn blur_size(&self) -> (u32, u32) {
        self.blur.size()
    }
}

/// Fixed-order compositing pipeline
///
/// background → glow → field → blur → present → overlay
pub struct Compositor {
    saturation: f32,
    darkness: f32,
    wash_alpha: u8,
    glow_alpha: u8,
    blur_scale: u32,
    blur: bool,
    surfaces: RenderSurfaceSet,
    needs_base_fill: bool,
}

impl Compositor {
    pub fn new(config: &RenderConfig, stages: &PipelineStages) -> Result<Self> {
        Ok(Self {
            saturation: config.background_saturation,
            darkness: config.background_darkness,
            wash_alpha: config.background_wash_alpha,
            glow_alpha: config.glow_alpha,
            blur_scale: config.blur_scale,
            blur: stages.blur,
            surfaces: RenderSurfaceSet::new(config.width, config.height, config.blur_scale)?,
            needs_base_fill: true,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        self.surfaces.size()
    }

    pub fn surfaces(&self) -> &RenderSurfaceSet {
        &self.surfaces
    }

    /// Reallocate every surface for a new canvas size
    ///
    /// The new set is built completely before it replaces the old one; on
    /// failure the previous surfaces stay in place.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let surfaces = RenderSurfaceSet::new(width, height, self.blur_scale)?;
        self.surfaces = surfaces;
        self.needs_base_fill = true;
        debug!("Render surfaces resized to {}x{}", width, height);
        Ok(())
    }

    /// Background color for a hue in turns
    pub fn background_color(&self, hue: f32) -> Rgba {
        Rgba::from_hsv(hue, self.saturation, self.darkness, 255.0)
    }

    /// Run one frame through the pipeline and return the finished canvas
    ///
    /// `draw_field` paints onto the blurred layer, `draw_overlay` onto the
    /// final canvas after blurring. Both get `ctx` (typically the engine's
    /// random generator).
    pub fn composite<C>(
        &mut self,
        hue: f32,
        ctx: &mut C,
        draw_field: impl FnOnce(&mut Canvas, &mut C),
        draw_overlay: impl FnOnce(&mut Canvas, &mut C),
    ) -> &Canvas {
        let background = self.background_color(hue);
        let surfaces = &mut self.surfaces;

        // Background wash
        if self.needs_base_fill {
            surfaces.accum.fill(background);
            self.needs_base_fill = false;
        } else {
            surfaces.accum.wash(background.with_alpha(self.wash_alpha));
        }

        // Glow: fade what earlier frames left behind
        surfaces.accum.wash(Rgba::BLACK.with_alpha(self.glow_alpha));

        draw_field(&mut surfaces.accum, ctx);

        if self.blur {
            surfaces.blur.rescale_from(&surfaces.accum);
            surfaces.output.rescale_from(&surfaces.blur);
        } else {
            surfaces.output.copy_from(&surfaces.accum);
        }

        draw_overlay(&mut surfaces.output, ctx);

        &surfaces.output
    }

    /// Last finished frame
    pub fn output(&self) -> &Canvas {
        &self.surfaces.output
    }
}
