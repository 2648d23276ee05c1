use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use ragview_client::ArtifactFetcher;
use ragview_pdf::PageRenderer;
use snafu::ResultExt;
use tokio::sync::Mutex;

use super::audio::{Waveform, WaveformPlayer};
use super::error::{
    DecodeAudioSnafu, DecodeImageSnafu, DecodeTaskSnafu, FetchSnafu, PreviewResult,
    RenderPdfSnafu,
};
use super::locator::{ArtifactKind, ArtifactLocator};
use super::resource::{PreviewPayload, PreviewResource, ResourceLedger};
use super::state::{
    PreviewRequestId, PreviewState, PreviewSummary, PreviewTarget, PreviewTransition,
};
use crate::chat::Citation;

#[derive(Debug, Default)]
struct RendererInner {
    state: PreviewState,
    resource: Option<PreviewResource>,
    next_request: u64,
}

impl RendererInner {
    fn release(&mut self) {
        if let Some(resource) = self.resource.take() {
            resource.release();
        }
    }

    fn transition(&mut self, transition: PreviewTransition) -> bool {
        match self.state.apply(transition) {
            Ok(next) => {
                self.state = next;
                true
            }
            Err(rejection) => {
                tracing::debug!(?rejection, "preview transition rejected");
                false
            }
        }
    }

    fn is_showing(&self, citation: &Citation) -> bool {
        matches!(&self.state, PreviewState::Ready { target, .. } if target.citation == citation.key)
            && self.resource.is_some()
    }
}

/// Loads and holds the preview for at most one citation at a time.
///
/// Opening a citation releases whatever was shown before any new acquisition starts. Results
/// of superseded or closed acquisitions are dropped without being installed.
pub struct PreviewRenderer {
    fetcher: Arc<dyn ArtifactFetcher>,
    locator: ArtifactLocator,
    pages: PageRenderer,
    inner: Mutex<RendererInner>,
    ledger: ResourceLedger,
}

impl PreviewRenderer {
    pub fn new(fetcher: Arc<dyn ArtifactFetcher>, locator: ArtifactLocator, pdf_scale: f32) -> Self {
        Self {
            fetcher,
            locator,
            pages: PageRenderer::new(pdf_scale),
            inner: Mutex::new(RendererInner::default()),
            ledger: ResourceLedger::default(),
        }
    }

    pub fn locator(&self) -> &ArtifactLocator {
        &self.locator
    }

    pub async fn state(&self) -> PreviewState {
        self.inner.lock().await.state.clone()
    }

    /// Number of decoded resources currently alive. Never exceeds one.
    pub fn live_resources(&self) -> usize {
        self.ledger.live()
    }

    pub async fn with_resource<R>(&self, read: impl FnOnce(Option<&PreviewResource>) -> R) -> R {
        let inner = self.inner.lock().await;
        read(inner.resource.as_ref())
    }

    /// Runs `control` against the open audio player and refreshes the ready summary.
    ///
    /// Returns `None` when no audio preview is ready.
    pub async fn control_audio(
        &self,
        control: impl FnOnce(&mut WaveformPlayer),
    ) -> Option<PreviewSummary> {
        let mut inner = self.inner.lock().await;
        let resource = inner.resource.as_mut()?;
        let PreviewPayload::Audio(player) = resource.payload_mut() else {
            return None;
        };
        control(player);
        let refreshed = resource.summary();

        if let PreviewState::Ready { summary, .. } = &mut inner.state {
            *summary = refreshed.clone();
        }
        Some(refreshed)
    }

    /// Opens the preview for `citation` and returns the state once acquisition settles.
    ///
    /// The returned state may belong to a newer request if this one was superseded.
    pub async fn open(&self, citation: &Citation) -> PreviewState {
        let location = self.locator.resolve(citation);

        let target = {
            let mut inner = self.inner.lock().await;
            if inner.is_showing(citation) {
                tracing::debug!(
                    turn_id = citation.key.turn_id.0,
                    ordinal = citation.key.ordinal,
                    "preview already showing"
                );
                return inner.state.clone();
            }

            inner.release();
            inner.next_request += 1;
            let target =
                PreviewTarget::new(citation.key, PreviewRequestId::new(inner.next_request));
            inner.transition(PreviewTransition::Begin(target));
            target
        };

        tracing::info!(
            turn_id = citation.key.turn_id.0,
            ordinal = citation.key.ordinal,
            request = target.request.0,
            url = %location.url,
            "opening preview"
        );
        let acquired = self.acquire(location.kind).await;

        let mut inner = self.inner.lock().await;
        if !inner.state.accepts_result(target) {
            tracing::debug!(request = target.request.0, "dropping superseded preview result");
            return inner.state.clone();
        }

        match acquired {
            Ok(payload) => {
                let resource = PreviewResource::new(citation.key, payload, self.ledger.lease());
                let summary = resource.summary();
                inner.resource = Some(resource);
                inner.transition(PreviewTransition::Resolve { target, summary });
            }
            Err(error) => {
                tracing::warn!(request = target.request.0, %error, "preview failed");
                inner.transition(PreviewTransition::Fail {
                    target,
                    kind: error.kind(),
                    message: error.to_string(),
                });
            }
        }
        inner.state.clone()
    }

    /// Stops playback, frees the resource and closes. Closing twice is a no-op.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        if !inner.state.is_open() && inner.resource.is_none() {
            return;
        }
        inner.release();
        inner.transition(PreviewTransition::Close);
        tracing::debug!("preview closed");
    }

    async fn acquire(&self, kind: ArtifactKind) -> PreviewResult<PreviewPayload> {
        match kind {
            ArtifactKind::Text { content } => Ok(PreviewPayload::Text(content)),
            ArtifactKind::Unsupported { file_type, content } => {
                Ok(PreviewPayload::Unsupported { file_type, content })
            }
            ArtifactKind::Image { url } => {
                let bytes = self.fetch(&url).await?;
                let image = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
                    .await
                    .context(DecodeTaskSnafu {
                        stage: "decode-image",
                    })?
                    .context(DecodeImageSnafu {
                        stage: "decode-image",
                    })?;
                Ok(PreviewPayload::Image(image.into_rgba8()))
            }
            ArtifactKind::Pdf { url, page } => {
                let bytes = self.fetch(&url).await?;
                let pages = self.pages;
                let page = tokio::task::spawn_blocking(move || {
                    pages.render_document(bytes.to_vec(), page.get())
                })
                .await
                .context(DecodeTaskSnafu {
                    stage: "render-pdf",
                })?
                .context(RenderPdfSnafu {
                    stage: "render-pdf",
                })?;
                Ok(PreviewPayload::Pdf(page))
            }
            ArtifactKind::Audio { url, start } => {
                let mut player = WaveformPlayer::new();
                if let Some(start) = start {
                    player.seek(start);
                }
                let bytes = self.fetch(&url).await?;
                let extension = Path::new(&url)
                    .extension()
                    .and_then(|extension| extension.to_str())
                    .map(str::to_string);
                let waveform = tokio::task::spawn_blocking(move || {
                    Waveform::decode(bytes, extension.as_deref())
                })
                    .await
                    .context(DecodeTaskSnafu {
                        stage: "decode-audio",
                    })?
                    .context(DecodeAudioSnafu {
                        stage: "decode-audio",
                    })?;
                player.load(waveform);
                Ok(PreviewPayload::Audio(player))
            }
        }
    }

    async fn fetch(&self, url: &str) -> PreviewResult<Bytes> {
        self.fetcher.fetch(url).await.context(FetchSnafu {
            stage: "fetch-artifact",
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;
    use std::time::Duration;

    use ragview_client::{FailureKind, SourceRecord};
    use tokio::sync::Notify;

    use super::*;
    use crate::chat::{CitationKey, TurnId};
    use crate::preview::audio::fixtures::{sine_flac, sine_wav};
    use crate::testing::{MockFetcher, png_bytes};

    const BASE: &str = "http://files.local";

    fn renderer(fetcher: Arc<MockFetcher>) -> PreviewRenderer {
        PreviewRenderer::new(fetcher, ArtifactLocator::new(BASE), 1.0)
    }

    fn citation(ordinal: u32, file_type: &str, path: &str) -> Citation {
        Citation::from_source(
            TurnId::new(2),
            ordinal,
            SourceRecord {
                file_name: path.to_string(),
                file_type: file_type.to_string(),
                filepath: Some(format!("/srv/storage/{path}")),
                ..SourceRecord::default()
            },
        )
    }

    fn url(path: &str) -> String {
        format!("{BASE}/storage/{path}")
    }

    #[tokio::test]
    async fn image_preview_reports_dimensions() {
        let fetcher = Arc::new(MockFetcher::new().with_artifact(url("cat.png"), png_bytes(3, 2)));
        let renderer = renderer(fetcher);

        let state = renderer.open(&citation(1, "image", "cat.png")).await;
        match state {
            PreviewState::Ready { summary, .. } => {
                assert_eq!(summary, PreviewSummary::Image { width: 3, height: 2 });
            }
            other => panic!("unexpected state: {other:?}"),
        }
        assert_eq!(renderer.live_resources(), 1);
    }

    #[tokio::test]
    async fn pdf_preview_renders_requested_page() {
        let fetcher = Arc::new(
            MockFetcher::new().with_artifact(url("policy.pdf"), ragview_pdf::fixtures::sample_pdf(2)),
        );
        let renderer = renderer(fetcher);
        let mut policy = citation(1, "pdf", "policy.pdf");
        policy.page_number = NonZeroU32::new(2);

        let state = renderer.open(&policy).await;
        assert!(matches!(
            state,
            PreviewState::Ready {
                summary: PreviewSummary::Pdf {
                    page_number: 2,
                    page_count: 2,
                    width: 200,
                    height: 100,
                },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn out_of_range_page_fails_as_decode() {
        let fetcher = Arc::new(
            MockFetcher::new().with_artifact(url("policy.pdf"), ragview_pdf::fixtures::sample_pdf(1)),
        );
        let renderer = renderer(fetcher);
        let mut policy = citation(1, "pdf", "policy.pdf");
        policy.page_number = NonZeroU32::new(5);

        let state = renderer.open(&policy).await;
        assert!(matches!(
            state,
            PreviewState::Failed {
                kind: FailureKind::Decode,
                ..
            }
        ));
        assert_eq!(renderer.live_resources(), 0);
    }

    #[tokio::test]
    async fn missing_artifact_fails_as_network() {
        let renderer = renderer(Arc::new(MockFetcher::new()));
        let state = renderer.open(&citation(1, "image", "gone.png")).await;
        assert!(matches!(
            state,
            PreviewState::Failed {
                kind: FailureKind::Network,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn audio_preview_seeks_to_range_start() {
        let fetcher = Arc::new(MockFetcher::new().with_artifact(url("talk.wav"), sine_wav(3, 8_000)));
        let renderer = renderer(fetcher);
        let mut talk = citation(1, "audio", "talk.wav");
        talk.time_range = Some("150-300".to_string());

        let state = renderer.open(&talk).await;
        match state {
            PreviewState::Ready {
                summary:
                    PreviewSummary::Audio {
                        duration, position, ..
                    },
                ..
            } => {
                assert_eq!(duration, Duration::from_secs(3));
                assert_eq!(position, Duration::from_millis(1500));
            }
            other => panic!("unexpected state: {other:?}"),
        }

        let summary = renderer.control_audio(WaveformPlayer::play).await;
        assert!(summary.is_some());
        let playing = renderer
            .with_resource(|resource| match resource.map(PreviewResource::payload) {
                Some(PreviewPayload::Audio(player)) => player.is_playing(),
                _ => false,
            })
            .await;
        assert!(playing);
    }

    #[tokio::test]
    async fn flac_citation_previews_as_audio() {
        let fetcher =
            Arc::new(MockFetcher::new().with_artifact(url("memo.flac"), sine_flac(2, 8_000)));
        let renderer = renderer(fetcher);
        let mut memo = citation(1, "audio", "memo.flac");
        memo.time_range = Some("50-100".to_string());

        let state = renderer.open(&memo).await;
        assert!(matches!(
            state,
            PreviewState::Ready {
                summary: PreviewSummary::Audio {
                    duration,
                    position,
                    sample_rate: 8_000,
                    channels: 1,
                },
                ..
            } if duration == Duration::from_secs(2) && position == Duration::from_millis(500)
        ));
    }

    #[tokio::test]
    async fn reopening_ready_citation_does_not_refetch() {
        let fetcher = Arc::new(MockFetcher::new().with_artifact(url("cat.png"), png_bytes(4, 4)));
        let renderer = renderer(Arc::clone(&fetcher));
        let cat = citation(1, "image", "cat.png");

        let first = renderer.open(&cat).await;
        let second = renderer.open(&cat).await;
        assert_eq!(first, second);
        assert_eq!(fetcher.fetch_count(&url("cat.png")), 1);
        assert_eq!(renderer.live_resources(), 1);
    }

    #[tokio::test]
    async fn superseded_open_is_discarded() {
        let gate = Arc::new(Notify::new());
        let fetcher = Arc::new(
            MockFetcher::new()
                .with_artifact(url("one.png"), png_bytes(1, 1))
                .with_artifact(url("two.png"), png_bytes(2, 2))
                .with_gate(url("one.png"), Arc::clone(&gate)),
        );
        let renderer = renderer(fetcher);
        let first = citation(1, "image", "one.png");
        let second = citation(2, "image", "two.png");

        let (first_state, second_state) = tokio::join!(renderer.open(&first), async {
            tokio::task::yield_now().await;
            let state = renderer.open(&second).await;
            gate.notify_one();
            state
        });

        let expected = CitationKey::new(TurnId::new(2), 2);
        assert!(matches!(second_state, PreviewState::Ready { .. }));
        assert_eq!(second_state.citation(), Some(expected));
        assert_eq!(first_state, second_state);
        assert_eq!(renderer.live_resources(), 1);
        let shown = renderer
            .with_resource(|resource| resource.map(PreviewResource::citation))
            .await;
        assert_eq!(shown, Some(expected));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_drops_late_results() {
        let gate = Arc::new(Notify::new());
        let fetcher = Arc::new(
            MockFetcher::new()
                .with_artifact(url("one.png"), png_bytes(1, 1))
                .with_artifact(url("two.png"), png_bytes(2, 2))
                .with_gate(url("one.png"), Arc::clone(&gate)),
        );
        let renderer = renderer(fetcher);

        renderer.open(&citation(2, "image", "two.png")).await;
        assert_eq!(renderer.live_resources(), 1);
        renderer.close().await;
        renderer.close().await;
        assert_eq!(renderer.state().await, PreviewState::Closed);
        assert_eq!(renderer.live_resources(), 0);

        let one = citation(1, "image", "one.png");
        let (late, ()) = tokio::join!(renderer.open(&one), async {
            tokio::task::yield_now().await;
            renderer.close().await;
            gate.notify_one();
        });

        assert_eq!(late, PreviewState::Closed);
        assert_eq!(renderer.state().await, PreviewState::Closed);
        assert_eq!(renderer.live_resources(), 0);
    }
}
