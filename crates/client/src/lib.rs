//! Boundary to the remote answer, ingestion, and artifact storage service.
//!
//! The session and preview layers only see the [`AssistantBackend`] and
//! [`ArtifactFetcher`] traits; [`HttpBackend`] is the reqwest implementation.

mod backend;
mod http;
mod wire;

pub use backend::{
    ArtifactFetcher, AssistantBackend, BackendError, BackendResult, BoxFuture, FailureKind,
};
pub use http::{
    BackendConfig, DEFAULT_API_BASE_URL, DEFAULT_BATCH_INGEST_PATH, DEFAULT_INGEST_PATH,
    DEFAULT_QUERY_PATH, HttpBackend, join_url,
};
pub use wire::{
    BatchIngestResponse, QueryRequest, QueryResponse, SingleIngestResponse, SourceRecord,
    UploadFile,
};
