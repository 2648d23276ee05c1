//! Scripted collaborators shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use image::{ImageFormat, Rgba, RgbaImage};
use ragview_client::{
    ArtifactFetcher, AssistantBackend, BackendError, BackendResult, BatchIngestResponse,
    BoxFuture, QueryRequest, QueryResponse, SingleIngestResponse, SourceRecord, UploadFile,
};
use tokio::sync::Notify;

pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([200, 10, 10, 255]));
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

pub(crate) fn source(file_name: &str, file_type: &str) -> SourceRecord {
    SourceRecord {
        file_name: file_name.to_string(),
        file_type: file_type.to_string(),
        filepath: Some(format!("/srv/storage/{file_name}")),
        ..SourceRecord::default()
    }
}

fn status_error(stage: &'static str, url: &str, status: u16) -> BackendError {
    BackendError::Status {
        stage,
        url: url.to_string(),
        status,
        body: "scripted failure".to_string(),
    }
}

type Scripted<T> = Result<T, u16>;

#[derive(Default)]
pub(crate) struct MockBackend {
    answers: HashMap<String, Scripted<QueryResponse>>,
    panicking: HashSet<String>,
    gates: HashMap<String, Arc<Notify>>,
    single: Option<Scripted<SingleIngestResponse>>,
    batch: Option<Scripted<BatchIngestResponse>>,
    queries: Mutex<Vec<QueryRequest>>,
    uploads: Mutex<Vec<Vec<String>>>,
}

impl MockBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn answer(mut self, query: &str, answer: &str, sources: Vec<SourceRecord>) -> Self {
        self.answers.insert(
            query.to_string(),
            Ok(QueryResponse {
                answer: answer.to_string(),
                sources,
            }),
        );
        self
    }

    pub(crate) fn fail(mut self, query: &str, status: u16) -> Self {
        self.answers.insert(query.to_string(), Err(status));
        self
    }

    pub(crate) fn explode(mut self, query: &str) -> Self {
        self.panicking.insert(query.to_string());
        self
    }

    /// Holds `query` until `gate` is notified.
    pub(crate) fn with_gate(mut self, query: &str, gate: Arc<Notify>) -> Self {
        self.gates.insert(query.to_string(), gate);
        self
    }

    pub(crate) fn single_ingest_reply(mut self, response: Scripted<SingleIngestResponse>) -> Self {
        self.single = Some(response);
        self
    }

    pub(crate) fn batch_ingest_reply(mut self, response: Scripted<BatchIngestResponse>) -> Self {
        self.batch = Some(response);
        self
    }

    pub(crate) fn queries(&self) -> Vec<QueryRequest> {
        self.queries.lock().unwrap().clone()
    }

    pub(crate) fn uploads(&self) -> Vec<Vec<String>> {
        self.uploads.lock().unwrap().clone()
    }

    fn record_upload(&self, files: &[UploadFile]) {
        let names = files.iter().map(|file| file.name.clone()).collect();
        self.uploads.lock().unwrap().push(names);
    }
}

impl AssistantBackend for MockBackend {
    fn query<'a>(&'a self, request: QueryRequest) -> BoxFuture<'a, BackendResult<QueryResponse>> {
        Box::pin(async move {
            let text = request.text().to_string();
            self.queries.lock().unwrap().push(request);
            if let Some(gate) = self.gates.get(&text) {
                gate.notified().await;
            }
            if self.panicking.contains(&text) {
                panic!("scripted backend panic for '{text}'");
            }
            match self.answers.get(&text) {
                Some(Ok(response)) => Ok(response.clone()),
                Some(Err(status)) => Err(status_error("query", "mock://query", *status)),
                None => Err(status_error("query", "mock://query", 500)),
            }
        })
    }

    fn ingest_single<'a>(
        &'a self,
        file: UploadFile,
    ) -> BoxFuture<'a, BackendResult<SingleIngestResponse>> {
        Box::pin(async move {
            self.record_upload(std::slice::from_ref(&file));
            match &self.single {
                Some(Ok(response)) => Ok(response.clone()),
                Some(Err(status)) => Err(status_error("ingest-single", "mock://ingest", *status)),
                None => Err(status_error("ingest-single", "mock://ingest", 500)),
            }
        })
    }

    fn ingest_batch<'a>(
        &'a self,
        files: Vec<UploadFile>,
    ) -> BoxFuture<'a, BackendResult<BatchIngestResponse>> {
        Box::pin(async move {
            self.record_upload(&files);
            match &self.batch {
                Some(Ok(response)) => Ok(response.clone()),
                Some(Err(status)) => Err(status_error("ingest-batch", "mock://batch", *status)),
                None => Err(status_error("ingest-batch", "mock://batch", 500)),
            }
        })
    }
}

#[derive(Default)]
pub(crate) struct MockFetcher {
    artifacts: HashMap<String, Bytes>,
    gates: HashMap<String, Arc<Notify>>,
    fetches: Mutex<HashMap<String, usize>>,
}

impl MockFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_artifact(mut self, url: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        self.artifacts.insert(url.into(), bytes.into());
        self
    }

    /// Holds fetches of `url` until `gate` is notified.
    pub(crate) fn with_gate(mut self, url: impl Into<String>, gate: Arc<Notify>) -> Self {
        self.gates.insert(url.into(), gate);
        self
    }

    pub(crate) fn fetch_count(&self, url: &str) -> usize {
        self.fetches.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

impl ArtifactFetcher for MockFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, BackendResult<Bytes>> {
        Box::pin(async move {
            *self.fetches.lock().unwrap().entry(url.to_string()).or_default() += 1;
            if let Some(gate) = self.gates.get(url) {
                gate.notified().await;
            }
            self.artifacts
                .get(url)
                .cloned()
                .ok_or_else(|| status_error("fetch-artifact", url, 404))
        })
    }
}
