use std::time::Duration;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde::de::DeserializeOwned;
use snafu::ResultExt;

use crate::backend::{
    ArtifactFetcher, AssistantBackend, BackendResult, BoxFuture, BuildClientSnafu,
    DecodeBodySnafu, InvalidUploadSnafu, ReadBodySnafu, RequestSnafu, StatusSnafu,
};
use crate::wire::{
    BatchIngestResponse, QueryRequest, QueryResponse, SingleIngestResponse, UploadFile,
};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_QUERY_PATH: &str = "/query";
pub const DEFAULT_INGEST_PATH: &str = "/ingest";
pub const DEFAULT_BATCH_INGEST_PATH: &str = "/ingest/batch";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub api_base_url: String,
    pub query_path: String,
    pub ingest_path: String,
    pub batch_ingest_path: String,
    /// `None` leaves requests unbounded.
    pub request_timeout: Option<Duration>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL)
    }
}

impl BackendConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into().trim().to_string(),
            query_path: DEFAULT_QUERY_PATH.to_string(),
            ingest_path: DEFAULT_INGEST_PATH.to_string(),
            batch_ingest_path: DEFAULT_BATCH_INGEST_PATH.to_string(),
            request_timeout: None,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn endpoint(&self, path: &str) -> String {
        join_url(&self.api_base_url, path)
    }
}

/// Joins a base URL and a path with exactly one separating slash.
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    let path = path.trim().trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    }
}

/// reqwest-backed implementation of both collaborator traits.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> BackendResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context(BuildClientSnafu {
            stage: "http-backend-new",
        })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    async fn post_json<B, T>(&self, stage: &'static str, url: String, body: &B) -> BackendResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        tracing::debug!(%url, stage, "sending json request");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .context(RequestSnafu {
                stage,
                url: url.clone(),
            })?;
        Self::decode(stage, url, response).await
    }

    async fn post_form<T>(&self, stage: &'static str, url: String, form: Form) -> BackendResult<T>
    where
        T: DeserializeOwned,
    {
        tracing::debug!(%url, stage, "sending multipart request");
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .context(RequestSnafu {
                stage,
                url: url.clone(),
            })?;
        Self::decode(stage, url, response).await
    }

    async fn read_success(
        stage: &'static str,
        url: &str,
        response: reqwest::Response,
    ) -> BackendResult<Bytes> {
        let status = response.status();
        let body = response.bytes().await.context(ReadBodySnafu { stage, url })?;

        if !status.is_success() {
            tracing::warn!(%url, status = status.as_u16(), stage, "request rejected");
            return StatusSnafu {
                stage,
                url,
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            }
            .fail();
        }

        Ok(body)
    }

    async fn decode<T>(
        stage: &'static str,
        url: String,
        response: reqwest::Response,
    ) -> BackendResult<T>
    where
        T: DeserializeOwned,
    {
        let body = Self::read_success(stage, &url, response).await?;
        serde_json::from_slice(&body).context(DecodeBodySnafu { stage, url })
    }

    fn upload_part(stage: &'static str, file: UploadFile) -> BackendResult<Part> {
        let part = Part::bytes(file.bytes.to_vec()).file_name(file.name.clone());
        match file.mime_type {
            Some(mime_type) => part.mime_str(&mime_type).context(InvalidUploadSnafu {
                stage,
                file_name: file.name,
            }),
            None => Ok(part),
        }
    }
}

impl AssistantBackend for HttpBackend {
    fn query<'a>(&'a self, request: QueryRequest) -> BoxFuture<'a, BackendResult<QueryResponse>> {
        Box::pin(async move {
            let url = self.config.endpoint(&self.config.query_path);
            self.post_json("query", url, &request).await
        })
    }

    fn ingest_single<'a>(
        &'a self,
        file: UploadFile,
    ) -> BoxFuture<'a, BackendResult<SingleIngestResponse>> {
        Box::pin(async move {
            let url = self.config.endpoint(&self.config.ingest_path);
            let form = Form::new().part("file", Self::upload_part("ingest-single-part", file)?);
            self.post_form("ingest-single", url, form).await
        })
    }

    fn ingest_batch<'a>(
        &'a self,
        files: Vec<UploadFile>,
    ) -> BoxFuture<'a, BackendResult<BatchIngestResponse>> {
        Box::pin(async move {
            let url = self.config.endpoint(&self.config.batch_ingest_path);
            let mut form = Form::new();
            // Repeated `files` fields keep the caller's order.
            for file in files {
                form = form.part("files", Self::upload_part("ingest-batch-part", file)?);
            }
            self.post_form("ingest-batch", url, form).await
        })
    }
}

impl ArtifactFetcher for HttpBackend {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, BackendResult<Bytes>> {
        Box::pin(async move {
            let stage = "fetch-artifact";
            tracing::debug!(%url, "fetching artifact");
            let response = self
                .client
                .get(url)
                .send()
                .await
                .context(RequestSnafu { stage, url })?;
            Self::read_success(stage, url, response).await
        })
    }
}
