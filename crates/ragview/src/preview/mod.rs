pub mod audio;
pub mod error;
pub mod locator;
pub mod renderer;
pub mod resource;
pub mod state;

pub use audio::{AudioError, AudioResult, Waveform, WaveformPlayer};
pub use error::{PreviewError, PreviewResult};
pub use locator::{ArtifactKind, ArtifactLocation, ArtifactLocator, parse_time_offset, storage_suffix};
pub use renderer::PreviewRenderer;
pub use resource::{PreviewPayload, PreviewResource};
pub use state::{
    PreviewRequestId, PreviewState, PreviewSummary, PreviewTarget, PreviewTransition,
    PreviewTransitionRejection,
};
