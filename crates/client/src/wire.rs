//! Request/response shapes exchanged with the answer and ingestion service.

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Body of a query request.
///
/// The multimodal shape is used when the user turn carries an inline attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryRequest {
    Text {
        query: String,
    },
    Multimodal {
        text: String,
        #[serde(rename = "imageUrl")]
        image_url: String,
    },
}

impl QueryRequest {
    pub fn new(text: impl Into<String>, attachment_url: Option<String>) -> Self {
        let text = text.into();
        match attachment_url {
            Some(image_url) => Self::Multimodal { text, image_url },
            None => Self::Text { query: text },
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Text { query } => query,
            Self::Multimodal { text, .. } => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<SourceRecord>,
}

/// One retrieved source as the service reports it.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct SourceRecord {
    #[serde(alias = "fileName")]
    pub file_name: String,
    #[serde(alias = "fileType")]
    pub file_type: String,
    #[serde(alias = "storagePath", alias = "storage_path")]
    pub filepath: Option<String>,
    pub score: Option<f64>,
    #[serde(alias = "pageNumber")]
    pub page_number: Option<u32>,
    /// `"start-end"` range; some indexers emit it as a bare number.
    #[serde(alias = "timeRange", deserialize_with = "string_or_number")]
    pub timestamp: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SingleIngestResponse {
    pub file: String,
    pub vectors_indexed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BatchIngestResponse {
    pub files: Vec<String>,
    pub vectors_indexed: u64,
}

/// A file queued for ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Bytes,
    pub mime_type: Option<String>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let name = name.into();
        let mime_type = mime_guess::from_path(&name)
            .first()
            .map(|mime| mime.essence_str().to_string());
        Self {
            name,
            bytes: bytes.into(),
            mime_type,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}
