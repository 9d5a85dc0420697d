//! CPU drawing surface built on tiny-skia.

use glam::Vec2;
use tiny_skia::{
    BlendMode, Color, FillRule, FilterQuality, LineCap, LineJoin, Paint, PathBuilder, Pixmap,
    PixmapPaint, Rect, Stroke, Transform,
};

use super::color::Rgba;
use crate::error::{Result, VisualizerError};

/// Resizable 2D pixel surface
///
/// Pixels are stored premultiplied RGBA8, row-major, which is also the
/// layout the presenter uploads.
pub struct Canvas {
    pixmap: Pixmap,
}

impl Canvas {
    /// Allocate a transparent canvas
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let pixmap =
            Pixmap::new(width, height).ok_or(VisualizerError::SurfaceAllocation { width, height })?;
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width() as f32 / 2.0, self.height() as f32 / 2.0)
    }

    /// Raw premultiplied RGBA bytes
    pub fn data(&self) -> &[u8] {
        self.pixmap.data()
    }

    /// Replace every pixel with `color`
    pub fn fill(&mut self, color: Rgba) {
        self.pixmap.fill(Color::from_rgba8(color.r, color.g, color.b, color.a));
    }

    pub fn clear(&mut self) {
        self.fill(Rgba::TRANSPARENT);
    }

    /// Blend `color` over the whole surface using its alpha
    pub fn wash(&mut self, color: Rgba) {
        let Some(rect) = Rect::from_xywh(0.0, 0.0, self.width() as f32, self.height() as f32)
        else {
            return;
        };
        let paint = paint(color);
        self.pixmap
            .fill_rect(rect, &paint, Transform::identity(), None);
    }

    pub fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgba) {
        if color.a == 0 {
            return;
        }
        let Some(circle) = PathBuilder::from_circle(center.x, center.y, radius) else {
            return;
        };
        self.pixmap.fill_path(
            &circle,
            &paint(color),
            FillRule::Winding,
            Transform::identity(),
            None,
        );
    }

    pub fn stroke_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Rgba) {
        self.stroke_polyline(&[from, to], width, color);
    }

    /// Stroke connected segments through `points`
    pub fn stroke_polyline(&mut self, points: &[Vec2], width: f32, color: Rgba) {
        if points.len() < 2 || color.a == 0 {
            return;
        }

        let mut pb = PathBuilder::new();
        pb.move_to(points[0].x, points[0].y);
        for p in &points[1..] {
            pb.line_to(p.x, p.y);
        }
        let Some(path) = pb.finish() else {
            return;
        };

        let stroke = Stroke {
            width: width.max(0.0),
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };
        self.pixmap
            .stroke_path(&path, &paint(color), &stroke, Transform::identity(), None);
    }

    /// Copy `src` pixel for pixel; falls back to rescaling on a size mismatch
    pub fn copy_from(&mut self, src: &Canvas) {
        if self.size() == src.size() {
            self.pixmap.data_mut().copy_from_slice(src.pixmap.data());
        } else {
            self.rescale_from(src);
        }
    }

    /// Replace this canvas with `src` smoothly rescaled to fit it
    pub fn rescale_from(&mut self, src: &Canvas) {
        let sx = self.width() as f32 / src.width() as f32;
        let sy = self.height() as f32 / src.height() as f32;
        let paint = PixmapPaint {
            opacity: 1.0,
            blend_mode: BlendMode::Source,
            quality: FilterQuality::Bilinear,
        };
        self.clear();
        self.pixmap.draw_pixmap(
            0,
            0,
            src.pixmap.as_ref(),
            &paint,
            Transform::from_scale(sx, sy),
            None,
        );
    }

    /// Unpremultiplied color at `(x, y)`, `None` outside the canvas
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        // Pixmap::pixel only checks the flat index, so x == width wraps a row
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let p = self.pixmap.pixel(x, y)?.demultiply();
        Some(Rgba {
            r: p.red(),
            g: p.green(),
            b: p.blue(),
            a: p.alpha(),
        })
    }
}

fn paint(color: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.a);
    paint.anti_alias = true;
    paint
}
