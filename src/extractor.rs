use std::collections::HashMap;

use async_trait::async_trait;
use axum::body::Bytes;
use futures::stream::BoxStream;
use reqwest::StatusCode;
use thiserror::Error;

/// Bytes of one format, in order, as the hosting site serves them.
pub type ByteStream = BoxStream<'static, Result<Bytes, ExtractError>>;

/// Resolves video URLs into metadata and playable streams.
///
/// Everything site-specific (signature ciphers, format negotiation) lives
/// behind this trait so handlers can be driven by a test double.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn fetch_info(&self, url: &str) -> Result<VideoInfo, ExtractError>;

    /// Opens the byte stream of `format`, which must come from a
    /// `fetch_info` call for the same `url`.
    async fn open_stream(&self, url: &str, format: &SourceFormat)
    -> Result<ByteStream, ExtractError>;
}

#[derive(Clone, Debug)]
pub struct VideoInfo {
    pub title: String,
    pub formats: Vec<SourceFormat>,
}

impl VideoInfo {
    pub fn find_format(&self, itag: u32) -> Option<&SourceFormat> {
        self.formats.iter().find(|format| format.itag == itag)
    }
}

#[derive(Clone, Debug, Default)]
pub struct SourceFormat {
    pub itag: u32,
    pub quality_label: Option<String>,
    pub has_audio: bool,
    pub has_video: bool,
    pub resolution: Option<String>,
    pub mime_type: String,
    pub container: Option<String>,
    // direct media location, only meaningful to the extractor that produced it
    pub url: String,
    pub http_headers: HashMap<String, String>,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("video not found: {0}")]
    NotFound(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream responded with {0}")]
    Status(StatusCode),

    #[error("failed to parse extractor output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to run extractor: {0}")]
    Process(#[from] std::io::Error),

    #[error("extraction failed: {0}")]
    Extraction(String),
}

impl ExtractError {
    /// Stable label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractError::NotFound(_) => "not_found",
            ExtractError::Network(_) | ExtractError::Http(_) => "network",
            ExtractError::Status(_) => "status",
            ExtractError::Parse(_) => "parse",
            ExtractError::Process(_) => "process",
            ExtractError::Extraction(_) => "extraction",
        }
    }
}
