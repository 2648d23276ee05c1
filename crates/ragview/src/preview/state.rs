use std::time::Duration;

use ragview_client::FailureKind;

use crate::chat::CitationKey;

/// Identifier for one preview acquisition.
///
/// This must change on every open so late results can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PreviewRequestId(pub u64);

impl PreviewRequestId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Routing key used for stale-result rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PreviewTarget {
    pub citation: CitationKey,
    pub request: PreviewRequestId,
}

impl PreviewTarget {
    pub const fn new(citation: CitationKey, request: PreviewRequestId) -> Self {
        Self { citation, request }
    }
}

/// Display-facing description of a ready preview.
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewSummary {
    Text {
        content: String,
    },
    Image {
        width: u32,
        height: u32,
    },
    Pdf {
        page_number: u32,
        page_count: usize,
        width: u32,
        height: u32,
    },
    Audio {
        duration: Duration,
        position: Duration,
        sample_rate: u32,
        channels: u16,
    },
    Unsupported {
        file_type: String,
        content: String,
    },
}

/// Preview lifecycle.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PreviewState {
    #[default]
    Closed,
    Loading(PreviewTarget),
    Ready {
        target: PreviewTarget,
        summary: PreviewSummary,
    },
    Failed {
        target: PreviewTarget,
        kind: FailureKind,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PreviewTransition {
    /// Starts an acquisition, superseding whatever was shown or loading.
    Begin(PreviewTarget),
    Resolve {
        target: PreviewTarget,
        summary: PreviewSummary,
    },
    Fail {
        target: PreviewTarget,
        kind: FailureKind,
        message: String,
    },
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewTransitionRejection {
    NoActiveRequest {
        attempted: PreviewTarget,
    },
    RequestMismatch {
        active: PreviewTarget,
        attempted: PreviewTarget,
    },
}

pub type PreviewTransitionResult = Result<PreviewState, PreviewTransitionRejection>;

impl PreviewState {
    pub fn target(&self) -> Option<PreviewTarget> {
        match self {
            Self::Closed => None,
            Self::Loading(target) | Self::Ready { target, .. } | Self::Failed { target, .. } => {
                Some(*target)
            }
        }
    }

    pub fn citation(&self) -> Option<CitationKey> {
        self.target().map(|target| target.citation)
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Closed)
    }

    /// Returns true when a finished acquisition for `target` may still be installed.
    pub fn accepts_result(&self, target: PreviewTarget) -> bool {
        matches!(self, Self::Loading(active) if *active == target)
    }

    pub fn apply(&self, transition: PreviewTransition) -> PreviewTransitionResult {
        match transition {
            PreviewTransition::Begin(target) => Ok(Self::Loading(target)),
            PreviewTransition::Resolve { target, summary } => {
                self.apply_finish(target, |target| Self::Ready { target, summary })
            }
            PreviewTransition::Fail {
                target,
                kind,
                message,
            } => self.apply_finish(target, |target| Self::Failed {
                target,
                kind,
                message,
            }),
            PreviewTransition::Close => Ok(Self::Closed),
        }
    }

    fn apply_finish(
        &self,
        target: PreviewTarget,
        finish: impl FnOnce(PreviewTarget) -> Self,
    ) -> PreviewTransitionResult {
        match self {
            Self::Loading(active) if *active == target => Ok(finish(target)),
            Self::Loading(active) | Self::Ready { target: active, .. } | Self::Failed {
                target: active,
                ..
            } => Err(PreviewTransitionRejection::RequestMismatch {
                active: *active,
                attempted: target,
            }),
            Self::Closed => Err(PreviewTransitionRejection::NoActiveRequest { attempted: target }),
        }
    }
}
