use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PdfRenderError {
    #[snafu(display("failed to parse PDF document on `{stage}`: {details}"))]
    Parse {
        stage: &'static str,
        details: String,
    },
    #[snafu(display("page {requested} is out of range, document has {page_count} page(s)"))]
    PageOutOfRange {
        stage: &'static str,
        requested: u32,
        page_count: usize,
    },
    #[snafu(display("page viewport {width}x{height} cannot be rasterized"))]
    InvalidViewport {
        stage: &'static str,
        width: f32,
        height: f32,
    },
    #[snafu(display("rasterized buffer does not match a {width}x{height} RGBA image"))]
    Bitmap {
        stage: &'static str,
        width: u32,
        height: u32,
    },
}

pub type PdfResult<T> = Result<T, PdfRenderError>;
