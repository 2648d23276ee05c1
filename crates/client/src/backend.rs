use bytes::Bytes;
use snafu::Snafu;

use crate::wire::{
    BatchIngestResponse, QueryRequest, QueryResponse, SingleIngestResponse, UploadFile,
};

pub use futures::future::BoxFuture;

pub type BackendResult<T> = Result<T, BackendError>;

/// Coarse failure class used by callers that only need to tell transport from payload problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Unreachable service or a non-2xx status.
    Network,
    /// The service answered, but the body could not be decoded.
    Decode,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BackendError {
    #[snafu(display("failed to build http client on `{stage}`: {source}"))]
    BuildClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("request to {url} failed on `{stage}`: {source}"))]
    Request {
        stage: &'static str,
        url: String,
        source: reqwest::Error,
    },
    #[snafu(display("{url} returned status {status}: {body}"))]
    Status {
        stage: &'static str,
        url: String,
        status: u16,
        body: String,
    },
    #[snafu(display("failed to read response body from {url} on `{stage}`: {source}"))]
    ReadBody {
        stage: &'static str,
        url: String,
        source: reqwest::Error,
    },
    #[snafu(display("malformed response body from {url} on `{stage}`: {source}"))]
    DecodeBody {
        stage: &'static str,
        url: String,
        source: serde_json::Error,
    },
    #[snafu(display("upload part for '{file_name}' is invalid: {source}"))]
    InvalidUpload {
        stage: &'static str,
        file_name: String,
        source: reqwest::Error,
    },
}

impl BackendError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::DecodeBody { .. } => FailureKind::Decode,
            Self::BuildClient { .. }
            | Self::Request { .. }
            | Self::Status { .. }
            | Self::ReadBody { .. }
            | Self::InvalidUpload { .. } => FailureKind::Network,
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            Self::BuildClient { stage, .. }
            | Self::Request { stage, .. }
            | Self::Status { stage, .. }
            | Self::ReadBody { stage, .. }
            | Self::DecodeBody { stage, .. }
            | Self::InvalidUpload { stage, .. } => *stage,
        }
    }
}

/// Answer and ingestion service consumed by the conversation session.
pub trait AssistantBackend: Send + Sync {
    fn query<'a>(&'a self, request: QueryRequest) -> BoxFuture<'a, BackendResult<QueryResponse>>;

    fn ingest_single<'a>(
        &'a self,
        file: UploadFile,
    ) -> BoxFuture<'a, BackendResult<SingleIngestResponse>>;

    fn ingest_batch<'a>(
        &'a self,
        files: Vec<UploadFile>,
    ) -> BoxFuture<'a, BackendResult<BatchIngestResponse>>;
}

/// Raw artifact download used by source previews.
pub trait ArtifactFetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, BackendResult<Bytes>>;
}
