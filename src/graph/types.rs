use crate::env;
use crate::graph::object::GraphObject;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

pub type RequestId = Uuid;
pub type CursorId = Uuid;

/// How a picker walks the remaining pages after the first one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadingStrategy {
    /// Follow every next link as soon as a page arrives (friend lists)
    #[default]
    Immediate,
    /// Follow the next link only when the list scrolls to its loaded end (places)
    AsNeeded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PagerConfig {
    pub loading_strategy: LoadingStrategy,
    pub sort_fields: Vec<String>,
    pub group_by_field: Option<String>,
    pub show_pictures: bool,
    pub multi_select: bool,
    pub max_prefetched_pictures: usize,
    pub prefetch_buffer: usize,
    pub max_concurrent_downloads: usize,
    pub cached_result_refresh_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self {
            loading_strategy: LoadingStrategy::Immediate,
            sort_fields: vec![env::graph::NAME_FIELD.to_string()],
            group_by_field: Some(env::graph::NAME_FIELD.to_string()),
            show_pictures: true,
            multi_select: true,
            max_prefetched_pictures: env::graph::MAX_PREFETCHED_PICTURES,
            prefetch_buffer: env::graph::PICTURE_PREFETCH_BUFFER,
            max_concurrent_downloads: env::graph::MAX_CONCURRENT_DOWNLOADS,
            cached_result_refresh_delay: env::graph::CACHED_RESULT_REFRESH_DELAY,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// A request for one page of graph objects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRequest {
    /// Graph path (`me/friends`) or an absolute continuation URL
    pub target: String,
    pub parameters: BTreeMap<String, String>,
    /// Whether a cached response is acceptable for this request
    pub accept_cached: bool,
}

impl GraphRequest {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            parameters: BTreeMap::new(),
            accept_cached: false,
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Request for the page behind a continuation token
    pub fn for_continuation(next: &str) -> Self {
        Self::new(next)
    }

    pub fn with_accept_cached(mut self, accept_cached: bool) -> Self {
        self.accept_cached = accept_cached;
        self
    }

    /// Fields requested from the graph, comma separated
    pub fn with_fields(self, fields: &[&str]) -> Self {
        self.with_parameter("fields", fields.join(","))
    }
}

/// One fetched page
#[derive(Debug, Clone, Default)]
pub struct GraphResponse {
    pub objects: Option<Vec<GraphObject>>,
    pub next: Option<String>,
    pub from_cache: bool,
    pub error: Option<GraphError>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl GraphResponse {
    pub fn page(objects: Vec<GraphObject>, next: Option<String>) -> Self {
        Self {
            objects: Some(objects),
            next,
            from_cache: false,
            error: None,
            fetched_at: Some(Utc::now()),
        }
    }

    pub fn failed(error: GraphError) -> Self {
        Self {
            error: Some(error),
            fetched_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn cached(mut self) -> Self {
        self.from_cache = true;
        self
    }
}

/// Downloaded picture bytes
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub url: Url,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum GraphError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Server returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Failed to decode response: {0}")]
    Decode(String),
    #[error("Received an object without an ID.")]
    MissingId,
    #[error("Paging loader received neither a result nor an error.")]
    NoResult,
    #[error("A request is already in flight")]
    AlreadyLoading,
    #[error("Image download failed for {url}: {message}")]
    Image { url: String, message: String },
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for GraphError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => GraphError::Status {
                status: status.as_u16(),
                message: error.to_string(),
            },
            None if error.is_decode() => GraphError::Decode(error.to_string()),
            None => GraphError::Network(error.to_string()),
        }
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(error: serde_json::Error) -> Self {
        GraphError::Decode(error.to_string())
    }
}
