//! Radial point field: nested spiral rings driven directly by the spectrum.
//!
//! Geometry is authored against the configured baseline canvas and scaled
//! uniformly about the live canvas center, so the field keeps its proportions
//! across resizes.

use glam::Vec2;
use rand::Rng;

use super::canvas::Canvas;
use super::color::Rgba;
use crate::audio::SpectrumFrame;
use crate::params::RenderConfig;

/// Which ring family a point belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpiralFamily {
    /// Saturated, amplitude-lit points: the spectrum silhouette
    Bright,
    /// Desaturated, randomly dimmed points further out: background texture
    Dark,
}

impl SpiralFamily {
    /// Ring spacing multiplier
    fn spacing(self) -> f32 {
        match self {
            SpiralFamily::Bright => 1.5,
            SpiralFamily::Dark => 3.0,
        }
    }
}

/// One point of the field, in canvas pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldPoint {
    pub family: SpiralFamily,
    pub position: Vec2,
    pub dot_radius: f32,
    pub hue: f32,
    pub amplitude: f32,
}

/// Spiral field renderer
#[derive(Debug, Clone)]
pub struct RadialField {
    base_size: Vec2,
    bright_spirals: usize,
    dark_spirals: usize,
}

impl RadialField {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            base_size: Vec2::new(config.width as f32, config.height as f32),
            bright_spirals: config.bright_spirals,
            dark_spirals: config.dark_spirals,
        }
    }

    /// Uniform scale from baseline to `canvas_size`
    pub fn scale_factor(&self, canvas_size: (u32, u32)) -> f32 {
        let sx = canvas_size.0 as f32 / self.base_size.x;
        let sy = canvas_size.1 as f32 / self.base_size.y;
        sx.min(sy)
    }

    /// Compute every point for `frame` without drawing
    pub fn layout(
        &self,
        frame: &SpectrumFrame,
        hue_offset: f32,
        canvas_size: (u32, u32),
    ) -> Vec<FieldPoint> {
        let bins = frame.bins();
        if bins.is_empty() {
            return Vec::new();
        }

        let scale = self.scale_factor(canvas_size);
        let center = Vec2::new(canvas_size.0 as f32 / 2.0, canvas_size.1 as f32 / 2.0);
        let max_radius = (self.base_size.min_element() / 2.1).floor();
        let n = bins.len() as f32;

        let rings_total = self.bright_spirals + self.dark_spirals;
        let mut points = Vec::with_capacity(bins.len() * rings_total);

        for (family, rings) in [
            (SpiralFamily::Bright, self.bright_spirals),
            (SpiralFamily::Dark, self.dark_spirals),
        ] {
            if rings == 0 {
                continue;
            }
            let row_spacing = (max_radius / (rings / 2).max(1) as f32).floor();

            for ring in 0..rings {
                let mut offset = ring as f32 * row_spacing * family.spacing();
                if family == SpiralFamily::Dark {
                    // Dark rings start further out than the bright ones
                    offset += row_spacing * self.bright_spirals as f32;
                }
                let ring_radius = max_radius + offset;

                for (i, &amplitude) in bins.iter().enumerate() {
                    let angle = i as f32 * (360.0 / n) + hue_offset * 360.0 + offset * 0.5;
                    let radius = amplitude * ring_radius * scale;
                    let position = center + Vec2::from_angle(angle.to_radians()) * radius;

                    let dot_radius = match family {
                        SpiralFamily::Bright => 15.0 + amplitude * 50.0,
                        SpiralFamily::Dark => 5.0 + amplitude * 15.0,
                    } * scale;

                    points.push(FieldPoint {
                        family,
                        position,
                        dot_radius,
                        hue: (hue_offset + i as f32 / n + offset).rem_euclid(1.0),
                        amplitude,
                    });
                }
            }
        }

        points
    }

    /// Draw the field for `frame` onto `canvas`
    pub fn render<R: Rng>(
        &self,
        frame: &SpectrumFrame,
        hue_offset: f32,
        canvas: &mut Canvas,
        rng: &mut R,
    ) {
        for point in self.layout(frame, hue_offset, canvas.size()) {
            let color = match point.family {
                SpiralFamily::Bright => {
                    let value = (point.amplitude * 1.5).min(1.0);
                    Rgba::from_hsv(point.hue, 1.0, value, 255.0).brighten(100)
                }
                SpiralFamily::Dark => {
                    let value = if rng.gen::<f32>() > 0.3 { 0.2 } else { 0.0 };
                    Rgba::from_hsv(point.hue, 0.3, value, 115.0)
                }
            };
            canvas.fill_circle(point.position, point.dot_radius, color);
        }
    }
}
