//! PDF page rendering to bitmap
//!
//! Uses hayro-interpret to parse and interpret the page, and tiny-skia (through `Canvas`) for
//! rasterization.

use std::sync::Arc;

use hayro_interpret::font::Glyph;
use hayro_interpret::hayro_syntax::Pdf;
use hayro_interpret::util::PageExt;
use hayro_interpret::{
    BlendMode, ClipPath, Context, Device, FillRule, GlyphDrawMode, Image as PdfImage,
    InterpreterSettings, LumaData, Paint, PathDrawMode, RgbData, SoftMask, StrokeProps,
    interpret_page,
};
use image::RgbaImage;
use kurbo::{Affine, BezPath, Cap, Join, Rect};
use snafu::{OptionExt, ensure};
use tiny_skia::{LineCap, LineJoin, Stroke, StrokeDash};

use crate::error::{
    BitmapSnafu, InvalidViewportSnafu, PageOutOfRangeSnafu, PdfRenderError, PdfResult,
};
use crate::raster::Canvas;

/// Display scale applied to the page's natural viewport.
pub const DEFAULT_DISPLAY_SCALE: f32 = 1.2;
/// Upper bound on rasterized pixels for one page.
pub const MAX_VIEWPORT_PIXELS: u64 = 40_000_000;
/// Stand-in color for pattern and shading paints.
pub const PATTERN_TONE: [u8; 4] = [128, 128, 128, 255];

/// One rasterized page, sized to the scaled viewport.
#[derive(Debug, Clone)]
pub struct RasterizedPage {
    /// 1-based page number that was rendered.
    pub page_number: u32,
    pub page_count: usize,
    pub image: RgbaImage,
}

impl RasterizedPage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn byte_len(&self) -> usize {
        self.image.as_raw().len()
    }
}

/// Render a single PDF page to an RGBA image.
#[derive(Debug, Clone, Copy)]
pub struct PageRenderer {
    scale: f32,
}

impl Default for PageRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLAY_SCALE)
    }
}

impl PageRenderer {
    /// Non-finite or non-positive scales fall back to [`DEFAULT_DISPLAY_SCALE`].
    pub fn new(scale: f32) -> Self {
        let scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            DEFAULT_DISPLAY_SCALE
        };
        Self { scale }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Parses `data` and renders the 1-based `page_number`.
    pub fn render_document(&self, data: Vec<u8>, page_number: u32) -> PdfResult<RasterizedPage> {
        let pdf = Pdf::new(Arc::new(data)).map_err(|error| PdfRenderError::Parse {
            stage: "parse-document",
            details: format!("{error:?}"),
        })?;
        self.render_page(&pdf, page_number)
    }

    /// Renders the 1-based `page_number` of an already parsed document.
    pub fn render_page(&self, pdf: &Pdf, page_number: u32) -> PdfResult<RasterizedPage> {
        let pages = pdf.pages();
        let page_count = pages.len();
        ensure!(
            page_number >= 1 && page_number as usize <= page_count,
            PageOutOfRangeSnafu {
                stage: "select-page",
                requested: page_number,
                page_count,
            }
        );

        let page = pages
            .get(page_number as usize - 1)
            .context(PageOutOfRangeSnafu {
                stage: "load-page",
                requested: page_number,
                page_count,
            })?;

        let (page_width, page_height) = page.render_dimensions();
        let (width, height) = self.viewport(page_width, page_height)?;

        let canvas = Canvas::new(width, height).context(BitmapSnafu {
            stage: "allocate-bitmap",
            width,
            height,
        })?;
        let mut device = CanvasDevice { canvas };
        let bbox = Rect::new(0.0, 0.0, f64::from(width), f64::from(height));
        let transform = Affine::scale(f64::from(self.scale)) * page.initial_transform(true);
        let mut ctx = Context::new(
            transform,
            bbox,
            page.xref(),
            InterpreterSettings::default(),
        );

        interpret_page(page, &mut ctx, &mut device);

        let image = device.canvas.into_image().context(BitmapSnafu {
            stage: "finish-bitmap",
            width,
            height,
        })?;

        tracing::debug!(page_number, page_count, width, height, "rasterized pdf page");
        Ok(RasterizedPage {
            page_number,
            page_count,
            image,
        })
    }

    fn viewport(&self, page_width: f32, page_height: f32) -> PdfResult<(u32, u32)> {
        let width = (page_width * self.scale).round();
        let height = (page_height * self.scale).round();

        let in_range = width.is_finite() && height.is_finite() && width >= 1.0 && height >= 1.0;
        ensure!(
            in_range && (width as u64) * (height as u64) <= MAX_VIEWPORT_PIXELS,
            InvalidViewportSnafu {
                stage: "compute-viewport",
                width,
                height,
            }
        );

        Ok((width as u32, height as u32))
    }
}

fn paint_color(paint: &Paint<'_>) -> [u8; 4] {
    match paint {
        Paint::Color(color) => color.to_rgba().to_rgba8(),
        Paint::Pattern(_) => PATTERN_TONE,
    }
}

fn skia_fill_rule(rule: &FillRule) -> tiny_skia::FillRule {
    match rule {
        FillRule::NonZero => tiny_skia::FillRule::Winding,
        FillRule::EvenOdd => tiny_skia::FillRule::EvenOdd,
    }
}

fn skia_stroke(props: &StrokeProps) -> Stroke {
    // An odd dash array repeats to form on/off pairs.
    let mut dashes = props.dash_array.to_vec();
    if dashes.len() % 2 == 1 {
        dashes.extend_from_within(..);
    }

    Stroke {
        width: props.line_width,
        miter_limit: props.miter_limit,
        line_cap: match props.line_cap {
            Cap::Butt => LineCap::Butt,
            Cap::Round => LineCap::Round,
            Cap::Square => LineCap::Square,
        },
        line_join: match props.line_join {
            Join::Bevel => LineJoin::Bevel,
            Join::Miter => LineJoin::Miter,
            Join::Round => LineJoin::Round,
        },
        dash: StrokeDash::new(dashes, props.dash_offset),
    }
}

/// Straight RGBA from decoded color samples and an optional same-sized alpha plane.
fn merge_alpha(rgb: &RgbData, alpha: Option<&LumaData>) -> Vec<u8> {
    let alpha = alpha.filter(|alpha| alpha.width == rgb.width && alpha.height == rgb.height);
    rgb.data
        .chunks_exact(3)
        .enumerate()
        .flat_map(|(index, pixel)| {
            let opacity = alpha
                .and_then(|alpha| alpha.data.get(index).copied())
                .unwrap_or(u8::MAX);
            [pixel[0], pixel[1], pixel[2], opacity]
        })
        .collect()
}

/// Render device painting paths, glyphs, images and clips onto a [`Canvas`].
///
/// Soft masks, blend modes and group opacity are not interpreted.
struct CanvasDevice {
    canvas: Canvas,
}

impl<'a> Device<'a> for CanvasDevice {
    fn draw_glyph(
        &mut self,
        glyph: &Glyph<'a>,
        transform: Affine,
        glyph_transform: Affine,
        paint: &Paint<'a>,
        draw_mode: &GlyphDrawMode,
    ) {
        match glyph {
            Glyph::Outline(outline) => {
                let path = glyph_transform * outline.outline();
                let color = paint_color(paint);
                match draw_mode {
                    GlyphDrawMode::Fill => self.canvas.fill_path(
                        &path,
                        transform,
                        color,
                        tiny_skia::FillRule::Winding,
                    ),
                    GlyphDrawMode::Stroke(props) => {
                        self.canvas
                            .stroke_path(&path, transform, color, &skia_stroke(props))
                    }
                    GlyphDrawMode::Invisible => {}
                }
            }
            Glyph::Type3(glyph) => {
                if !matches!(draw_mode, GlyphDrawMode::Invisible) {
                    glyph.interpret(self, transform, glyph_transform, paint);
                }
            }
        }
    }

    fn draw_image(&mut self, image: PdfImage<'a, '_>, transform: Affine) {
        match image {
            PdfImage::Raster(raster) => raster.with_rgba(
                |rgb, alpha| {
                    let (sx, sy) = rgb.scale_factors;
                    let rgba = merge_alpha(&rgb, alpha.as_ref());
                    self.canvas.draw_rgba(
                        rgb.width,
                        rgb.height,
                        &rgba,
                        transform * Affine::scale_non_uniform(f64::from(sx), f64::from(sy)),
                        rgb.interpolate,
                    );
                },
                None,
            ),
            PdfImage::Stencil(stencil) => stencil.with_stencil(
                |luma, paint| {
                    let [red, green, blue, alpha] = paint_color(paint);
                    let rgba: Vec<u8> = luma
                        .data
                        .iter()
                        .flat_map(|coverage| {
                            let opacity = u16::from(alpha) * u16::from(*coverage) / 255;
                            [red, green, blue, opacity as u8]
                        })
                        .collect();
                    let (sx, sy) = luma.scale_factors;
                    self.canvas.draw_rgba(
                        luma.width,
                        luma.height,
                        &rgba,
                        transform * Affine::scale_non_uniform(f64::from(sx), f64::from(sy)),
                        luma.interpolate,
                    );
                },
                None,
            ),
        }
    }

    fn draw_path(
        &mut self,
        path: &BezPath,
        transform: Affine,
        paint: &Paint<'a>,
        draw_mode: &PathDrawMode,
    ) {
        let color = paint_color(paint);
        match draw_mode {
            PathDrawMode::Fill(rule) => {
                self.canvas
                    .fill_path(path, transform, color, skia_fill_rule(rule));
            }
            PathDrawMode::Stroke(props) => {
                self.canvas
                    .stroke_path(path, transform, color, &skia_stroke(props));
            }
        }
    }

    fn push_clip_path(&mut self, clip_path: &ClipPath) {
        self.canvas
            .push_clip(&clip_path.path, skia_fill_rule(&clip_path.fill));
    }

    fn pop_clip_path(&mut self) {
        self.canvas.pop_clip();
    }

    fn set_soft_mask(&mut self, _mask: Option<SoftMask<'a>>) {}
    fn set_blend_mode(&mut self, _blend_mode: BlendMode) {}
    fn push_transparency_group(
        &mut self,
        _opacity: f32,
        _mask: Option<SoftMask<'a>>,
        _blend_mode: BlendMode,
    ) {
    }
    fn pop_transparency_group(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{painted_pdf, sample_pdf};

    const BLACK: [u8; 4] = [0, 0, 0, 255];

    #[test]
    fn renders_page_at_scaled_viewport() {
        let page = PageRenderer::default()
            .render_document(sample_pdf(2), 2)
            .expect("page 2 should render");

        assert_eq!(page.page_number, 2);
        assert_eq!(page.page_count, 2);
        assert_eq!((page.width(), page.height()), (240, 120));
        assert_eq!(page.byte_len(), 240 * 120 * 4);
        assert!(page.image.pixels().any(|pixel| pixel.0 == BLACK));
    }

    #[test]
    fn out_of_range_page_is_an_error_not_a_clamp() {
        let renderer = PageRenderer::default();

        let error = renderer
            .render_document(sample_pdf(1), 3)
            .expect_err("page 3 of 1 must fail");
        assert!(matches!(
            error,
            PdfRenderError::PageOutOfRange {
                requested: 3,
                page_count: 1,
                ..
            }
        ));

        let error = renderer
            .render_document(sample_pdf(1), 0)
            .expect_err("page 0 must fail");
        assert!(matches!(error, PdfRenderError::PageOutOfRange { .. }));
    }

    #[test]
    fn garbage_bytes_fail_to_parse() {
        let error = PageRenderer::default()
            .render_document(b"definitely not a pdf".to_vec(), 1)
            .expect_err("garbage must not parse");
        assert!(matches!(
            error,
            PdfRenderError::Parse { .. } | PdfRenderError::PageOutOfRange { page_count: 0, .. }
        ));
    }

    #[test]
    fn invalid_scale_falls_back_to_default() {
        assert_eq!(PageRenderer::new(f32::NAN).scale(), DEFAULT_DISPLAY_SCALE);
        assert_eq!(PageRenderer::new(-2.0).scale(), DEFAULT_DISPLAY_SCALE);
        assert_eq!(PageRenderer::new(2.0).scale(), 2.0);
    }

    #[test]
    fn paints_colors_clips_and_images() {
        let page = PageRenderer::new(1.0)
            .render_document(painted_pdf(), 1)
            .expect("painted page should render");
        let pixel = |x, y| page.image.get_pixel(x, y).0;

        assert_eq!((page.width(), page.height()), (200, 100));
        // Blue square at (10, 10)-(60, 60) in page space.
        assert_eq!(pixel(35, 65), [0, 0, 255, 255]);
        // Red 2x2 image scaled to (100, 20)-(150, 70).
        assert_eq!(pixel(125, 55), [255, 0, 0, 255]);
        // Green band clipped to x in 160..190.
        assert_eq!(pixel(175, 12), [0, 255, 0, 255]);
        assert_eq!(pixel(100, 12), crate::raster::PAPER);
    }
}
