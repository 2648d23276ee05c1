use ragview_client::{BackendError, FailureKind};
use ragview_pdf::PdfRenderError;
use snafu::Snafu;

use super::audio::AudioError;

pub type PreviewResult<T> = Result<T, PreviewError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PreviewError {
    #[snafu(display("failed to fetch {url} on `{stage}`: {source}"))]
    Fetch {
        stage: &'static str,
        url: String,
        source: BackendError,
    },
    #[snafu(display("failed to decode image on `{stage}`: {source}"))]
    DecodeImage {
        stage: &'static str,
        source: image::ImageError,
    },
    #[snafu(display("failed to render pdf on `{stage}`: {source}"))]
    RenderPdf {
        stage: &'static str,
        source: PdfRenderError,
    },
    #[snafu(display("failed to decode audio on `{stage}`: {source}"))]
    DecodeAudio {
        stage: &'static str,
        source: AudioError,
    },
    #[snafu(display("decode task on `{stage}` did not finish: {source}"))]
    DecodeTask {
        stage: &'static str,
        source: tokio::task::JoinError,
    },
}

impl PreviewError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Fetch { source, .. } => source.kind(),
            Self::DecodeImage { .. }
            | Self::RenderPdf { .. }
            | Self::DecodeAudio { .. }
            | Self::DecodeTask { .. } => FailureKind::Decode,
        }
    }
}
