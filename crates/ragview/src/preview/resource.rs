use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::RgbaImage;
use ragview_pdf::RasterizedPage;

use super::audio::WaveformPlayer;
use super::state::PreviewSummary;
use crate::chat::CitationKey;

/// Decoded content backing a ready preview.
#[derive(Debug)]
pub enum PreviewPayload {
    Text(String),
    Image(RgbaImage),
    Pdf(RasterizedPage),
    Audio(WaveformPlayer),
    Unsupported { file_type: String, content: String },
}

impl PreviewPayload {
    pub fn summary(&self) -> PreviewSummary {
        match self {
            Self::Text(content) => PreviewSummary::Text {
                content: content.clone(),
            },
            Self::Image(image) => PreviewSummary::Image {
                width: image.width(),
                height: image.height(),
            },
            Self::Pdf(page) => PreviewSummary::Pdf {
                page_number: page.page_number,
                page_count: page.page_count,
                width: page.width(),
                height: page.height(),
            },
            Self::Audio(player) => {
                let (sample_rate, channels) = player
                    .waveform()
                    .map_or((0, 0), |waveform| (waveform.sample_rate(), waveform.channels()));
                PreviewSummary::Audio {
                    duration: player.duration().unwrap_or_default(),
                    position: player.position(),
                    sample_rate,
                    channels,
                }
            }
            Self::Unsupported { file_type, content } => PreviewSummary::Unsupported {
                file_type: file_type.clone(),
                content: content.clone(),
            },
        }
    }
}

/// Counts preview resources currently alive.
#[derive(Debug, Clone, Default)]
pub(crate) struct ResourceLedger {
    live: Arc<AtomicUsize>,
}

impl ResourceLedger {
    pub(crate) fn lease(&self) -> ResourceLease {
        self.live.fetch_add(1, Ordering::SeqCst);
        ResourceLease {
            live: Arc::clone(&self.live),
        }
    }

    pub(crate) fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub(crate) struct ResourceLease {
    live: Arc<AtomicUsize>,
}

impl Drop for ResourceLease {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The single live resource owned by the previewer.
#[derive(Debug)]
pub struct PreviewResource {
    citation: CitationKey,
    payload: PreviewPayload,
    _lease: ResourceLease,
}

impl PreviewResource {
    pub(crate) fn new(citation: CitationKey, payload: PreviewPayload, lease: ResourceLease) -> Self {
        Self {
            citation,
            payload,
            _lease: lease,
        }
    }

    pub fn citation(&self) -> CitationKey {
        self.citation
    }

    pub fn payload(&self) -> &PreviewPayload {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut PreviewPayload {
        &mut self.payload
    }

    pub fn summary(&self) -> PreviewSummary {
        self.payload.summary()
    }

    /// Halts playback and frees the decoded content.
    pub(crate) fn release(mut self) {
        if let PreviewPayload::Audio(player) = &mut self.payload {
            player.stop();
        }
        tracing::debug!(
            turn_id = self.citation.turn_id.0,
            ordinal = self.citation.ordinal,
            "released preview resource"
        );
    }
}
