//! Procedural visuals drawn on a CPU canvas.

mod canvas;
mod color;
mod compositor;
mod field;
mod particles;

// Re-export public types
pub use canvas::Canvas;
pub use color::{hsv_to_rgb, Rgba};
pub use compositor::{Compositor, RenderSurfaceSet};
pub use field::{FieldPoint, RadialField, SpiralFamily};
pub use particles::{
    jagged_path, Branch, LightningBolt, ParticleSystem, MAX_LIFETIME, MIN_LIFETIME,
};
