//! tiny-skia surface the page render device paints into.

use image::RgbaImage;
use kurbo::{Affine, BezPath, PathEl};
use tiny_skia::{
    Color, ColorU8, FillRule, FilterQuality, Mask, Paint, Path, PathBuilder, Pixmap, PixmapPaint,
    Stroke, Transform,
};

pub const PAPER: [u8; 4] = [255, 255, 255, 255];

/// RGBA page surface with a clip stack.
///
/// Paths are given in their own space together with the transform into device pixels, so
/// stroke widths scale with the page. Clip paths are already in device space.
pub struct Canvas {
    pixmap: Pixmap,
    /// Intersected clip masks; `None` leaves drawing unclipped at that depth.
    clips: Vec<Option<Mask>>,
}

impl Canvas {
    /// Creates a canvas cleared to the paper color. `None` for a zero-sized surface.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        let mut pixmap = Pixmap::new(width, height)?;
        pixmap.fill(Color::WHITE);
        Some(Self {
            pixmap,
            clips: Vec::new(),
        })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let color = self.pixmap.pixel(x, y)?.demultiply();
        Some([color.red(), color.green(), color.blue(), color.alpha()])
    }

    pub fn fill_path(&mut self, path: &BezPath, transform: Affine, color: [u8; 4], rule: FillRule) {
        let Some(path) = skia_path(path) else {
            return;
        };
        self.pixmap.fill_path(
            &path,
            &solid(color),
            rule,
            skia_transform(transform),
            self.clips.last().and_then(Option::as_ref),
        );
    }

    pub fn stroke_path(&mut self, path: &BezPath, transform: Affine, color: [u8; 4], stroke: &Stroke) {
        let Some(path) = skia_path(path) else {
            return;
        };
        self.pixmap.stroke_path(
            &path,
            &solid(color),
            stroke,
            skia_transform(transform),
            self.clips.last().and_then(Option::as_ref),
        );
    }

    /// Draws straight-alpha RGBA pixels; `transform` maps image pixels to device pixels.
    pub fn draw_rgba(
        &mut self,
        width: u32,
        height: u32,
        rgba: &[u8],
        transform: Affine,
        smooth: bool,
    ) {
        let Some(mut image) = Pixmap::new(width, height) else {
            return;
        };
        for (pixel, source) in image.pixels_mut().iter_mut().zip(rgba.chunks_exact(4)) {
            *pixel = ColorU8::from_rgba(source[0], source[1], source[2], source[3]).premultiply();
        }

        let paint = PixmapPaint {
            quality: if smooth {
                FilterQuality::Bilinear
            } else {
                FilterQuality::Nearest
            },
            ..PixmapPaint::default()
        };
        self.pixmap.draw_pixmap(
            0,
            0,
            image.as_ref(),
            &paint,
            skia_transform(transform),
            self.clips.last().and_then(Option::as_ref),
        );
    }

    /// Restricts drawing to `path` (device space) intersected with the current clip.
    pub fn push_clip(&mut self, path: &BezPath, rule: FillRule) {
        let current = self.clips.last().cloned().flatten();
        let mask = match (current, skia_path(path)) {
            (Some(mut mask), Some(path)) => {
                mask.intersect_path(&path, rule, true, Transform::identity());
                Some(mask)
            }
            (None, Some(path)) => Mask::new(self.width(), self.height()).map(|mut mask| {
                mask.fill_path(&path, rule, true, Transform::identity());
                mask
            }),
            // An empty clip path hides everything.
            (_, None) => Mask::new(self.width(), self.height()),
        };
        self.clips.push(mask);
    }

    pub fn pop_clip(&mut self) {
        if self.clips.pop().is_none() {
            tracing::debug!("clip stack underflow");
        }
    }

    pub fn into_image(self) -> Option<RgbaImage> {
        let (width, height) = (self.width(), self.height());
        let data = self
            .pixmap
            .pixels()
            .iter()
            .flat_map(|pixel| {
                let color = pixel.demultiply();
                [color.red(), color.green(), color.blue(), color.alpha()]
            })
            .collect();
        RgbaImage::from_raw(width, height, data)
    }
}

fn solid(color: [u8; 4]) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color[0], color[1], color[2], color[3]);
    paint.anti_alias = true;
    paint
}

fn skia_transform(affine: Affine) -> Transform {
    let [a, b, c, d, e, f] = affine.as_coeffs();
    Transform::from_row(a as f32, b as f32, c as f32, d as f32, e as f32, f as f32)
}

fn skia_path(path: &BezPath) -> Option<Path> {
    let mut builder = PathBuilder::new();
    for element in path.elements() {
        match *element {
            PathEl::MoveTo(p) => builder.move_to(p.x as f32, p.y as f32),
            PathEl::LineTo(p) => builder.line_to(p.x as f32, p.y as f32),
            PathEl::QuadTo(c, p) => builder.quad_to(c.x as f32, c.y as f32, p.x as f32, p.y as f32),
            PathEl::CurveTo(c1, c2, p) => builder.cubic_to(
                c1.x as f32,
                c1.y as f32,
                c2.x as f32,
                c2.y as f32,
                p.x as f32,
                p.y as f32,
            ),
            PathEl::ClosePath => builder.close(),
        }
    }
    builder.finish()
}
