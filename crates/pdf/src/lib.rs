//! Single-page PDF rasterization for source previews.
//!
//! This crate provides:
//! - `PageRenderer`, which parses a document and rasterizes one 1-based page
//!   into an RGBA buffer sized to the page's scaled viewport
//! - `Canvas`, the tiny-skia surface the render device paints into
//!
//! Notes:
//! - Fills, strokes, clip paths, outline and Type3 glyphs, and raster and
//!   stencil images are drawn. Patterns and shadings become a flat gray; soft
//!   masks, blend modes and group opacity are ignored.
//! - Page numbers are 1-based everywhere in the public API. Out-of-range pages
//!   are errors, never clamped.

pub mod error;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod raster;
pub mod render;

pub use error::{PdfRenderError, PdfResult};
pub use raster::Canvas;
pub use render::{DEFAULT_DISPLAY_SCALE, MAX_VIEWPORT_PIXELS, PageRenderer, RasterizedPage};
