//! Uploads user files to the ingestion service.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use ragview_client::{AssistantBackend, BackendResult, FailureKind, UploadFile};

use crate::chat::Attachment;
use crate::preview::ArtifactLocator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestResult {
    /// No files were selected; nothing was sent.
    Empty,
    Single {
        file_label: String,
        vectors_indexed: u64,
    },
    Batch {
        file_labels: Vec<String>,
        vectors_indexed: u64,
    },
    Failed {
        kind: Option<FailureKind>,
        reason: String,
    },
}

impl IngestResult {
    pub fn vectors_indexed(&self) -> Option<u64> {
        match self {
            Self::Single {
                vectors_indexed, ..
            }
            | Self::Batch {
                vectors_indexed, ..
            } => Some(*vectors_indexed),
            Self::Empty | Self::Failed { .. } => None,
        }
    }

    /// One-line outcome for the uploader status area.
    pub fn status_line(&self) -> String {
        match self {
            Self::Empty => "No files selected.".to_string(),
            Self::Single {
                file_label,
                vectors_indexed,
            } => format!("Indexed {vectors_indexed} vectors from {file_label}"),
            Self::Batch {
                file_labels,
                vectors_indexed,
            } => format!(
                "Indexed {vectors_indexed} vectors from {} files: {}",
                file_labels.len(),
                file_labels.join(", ")
            ),
            Self::Failed { reason, .. } => format!("Upload failed: {reason}"),
        }
    }

    /// Attachment pointing at a single uploaded file, for multimodal queries.
    pub fn attachment(&self, locator: &ArtifactLocator) -> Option<Attachment> {
        match self {
            Self::Single { file_label, .. } => Some(Attachment::new(locator.storage_url(file_label))),
            Self::Empty | Self::Batch { .. } | Self::Failed { .. } => None,
        }
    }
}

pub struct IngestionCoordinator {
    backend: Arc<dyn AssistantBackend>,
}

impl IngestionCoordinator {
    pub fn new(backend: Arc<dyn AssistantBackend>) -> Self {
        Self { backend }
    }

    /// Uploads one file through the single route or several through the batch route.
    pub async fn upload(&self, mut files: Vec<UploadFile>) -> IngestResult {
        let result = match files.len() {
            0 => return IngestResult::Empty,
            1 => {
                let file = files.remove(0);
                tracing::info!(file = %file.name, "uploading file");
                Self::guarded(self.backend.ingest_single(file))
                    .await
                    .map(|response| IngestResult::Single {
                        file_label: response.file,
                        vectors_indexed: response.vectors_indexed,
                    })
            }
            count => {
                tracing::info!(count, "uploading batch");
                Self::guarded(self.backend.ingest_batch(files))
                    .await
                    .map(|response| IngestResult::Batch {
                        file_labels: response.files,
                        vectors_indexed: response.vectors_indexed,
                    })
            }
        };

        result.unwrap_or_else(|failed| failed)
    }

    async fn guarded<T>(
        call: impl Future<Output = BackendResult<T>>,
    ) -> Result<T, IngestResult> {
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(error)) => {
                tracing::warn!(kind = ?error.kind(), %error, "upload failed");
                Err(IngestResult::Failed {
                    kind: Some(error.kind()),
                    reason: error.to_string(),
                })
            }
            Err(_) => {
                tracing::error!("backend panicked during upload");
                Err(IngestResult::Failed {
                    kind: None,
                    reason: "backend panicked".to_string(),
                })
            }
        }
    }
}
