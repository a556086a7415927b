use crate::graph::object::GraphObject;
use crate::graph::types::{GraphError, GraphRequest, GraphResponse};
use dashmap::DashMap;
use futures::future::BoxFuture;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Anything that can serve pages of graph objects
pub trait GraphSource: Send + Sync {
    /// Fetch one page
    ///
    /// Transport failures are returned as errors; the loader folds them into
    /// the response it reports to its error listener.
    fn fetch(&self, request: GraphRequest) -> BoxFuture<'_, Result<GraphResponse, GraphError>>;

    /// Source name for logs
    fn source_name(&self) -> &'static str;
}

/// Decode the graph paging shape `{ "data": [...], "paging": { "next": ... } }`.
///
/// A body without `data` decodes to a response with no objects at all,
/// which the loader reports as [`GraphError::NoResult`].
pub fn parse_paged_results(body: Value) -> Result<GraphResponse, GraphError> {
    let Value::Object(mut body) = body else {
        return Err(GraphError::Decode("paged result is not a JSON object".to_string()));
    };

    if let Some(error) = body.remove("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown graph error")
            .to_string();
        let status = error.get("code").and_then(Value::as_u64).unwrap_or(400) as u16;
        return Err(GraphError::Status { status, message });
    }

    let next = body
        .get("paging")
        .and_then(|paging| paging.get("next"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let objects = match body.remove("data") {
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .map(GraphObject::from_value)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Some(other) => {
            return Err(GraphError::Decode(format!("`data` is not an array: {}", other)));
        }
        None => None,
    };

    Ok(GraphResponse {
        objects,
        next,
        from_cache: false,
        error: None,
        fetched_at: Some(chrono::Utc::now()),
    })
}

/// Graph API over HTTP
pub struct HttpGraphSource {
    client: reqwest::Client,
    base_url: Url,
    access_token: Option<String>,
    response_cache: DashMap<String, GraphResponse>,
}

impl HttpGraphSource {
    pub fn new(base_url: Url, access_token: Option<String>, timeout: Duration) -> Result<Self, GraphError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            access_token,
            response_cache: DashMap::new(),
        })
    }

    /// Resolve the request target to a URL, adding parameters and the access token
    pub fn request_url(&self, request: &GraphRequest) -> Result<Url, GraphError> {
        // Continuation links are absolute and already carry their parameters.
        if let Ok(url) = Url::parse(&request.target) {
            return Ok(url);
        }

        let mut url = self
            .base_url
            .join(request.target.trim_start_matches('/'))
            .map_err(|e| GraphError::InvalidRequest(format!("{}: {}", request.target, e)))?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in &request.parameters {
                query.append_pair(key, value);
            }
            if let Some(token) = &self.access_token {
                query.append_pair("access_token", token);
            }
        }
        Ok(url)
    }

    async fn fetch_remote(&self, url: Url) -> Result<GraphResponse, GraphError> {
        debug!("GET {}", url);
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        let body: Value = response.json().await?;

        if !status.is_success() && body.get("error").is_none() {
            return Err(GraphError::Status {
                status: status.as_u16(),
                message: format!("request to {} failed", url),
            });
        }

        let page = parse_paged_results(body)?;
        self.response_cache.insert(url.to_string(), page.clone());
        Ok(page)
    }
}

impl GraphSource for HttpGraphSource {
    fn fetch(&self, request: GraphRequest) -> BoxFuture<'_, Result<GraphResponse, GraphError>> {
        Box::pin(async move {
            let url = self.request_url(&request)?;

            if request.accept_cached {
                if let Some(cached) = self.response_cache.get(url.as_str()) {
                    debug!("Serving {} from cache", url);
                    return Ok(cached.clone().cached());
                }
            }

            self.fetch_remote(url).await
        })
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}

/// Continuation tokens used by [`FileGraphSource`]
const FILE_PAGE_PREFIX: &str = "page:";

/// Pages served from a local JSON fixture of the form `{ "pages": [ {...}, ... ] }`
pub struct FileGraphSource {
    pages: Vec<Value>,
}

impl FileGraphSource {
    pub fn from_value(fixture: Value) -> Result<Self, GraphError> {
        let pages = match fixture {
            Value::Object(mut fixture) => match fixture.remove("pages") {
                Some(Value::Array(pages)) => pages,
                _ => {
                    return Err(GraphError::Decode("fixture has no `pages` array".to_string()));
                }
            },
            Value::Array(pages) => pages,
            _ => return Err(GraphError::Decode("fixture is not a JSON object".to_string())),
        };
        Ok(Self { pages })
    }

    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, GraphError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GraphError::InvalidRequest(format!("{}: {}", path.display(), e)))?;
        let source = Self::from_value(serde_json::from_str(&content)?)?;
        info!("Loaded {} fixture pages from {:?}", source.pages.len(), path);
        Ok(source)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_index(target: &str) -> usize {
        target
            .strip_prefix(FILE_PAGE_PREFIX)
            .and_then(|index| index.parse().ok())
            .unwrap_or(0)
    }
}

impl GraphSource for FileGraphSource {
    fn fetch(&self, request: GraphRequest) -> BoxFuture<'_, Result<GraphResponse, GraphError>> {
        Box::pin(async move {
            let index = Self::page_index(&request.target);
            let Some(page) = self.pages.get(index) else {
                warn!("Fixture has no page {}", index);
                return Ok(GraphResponse::page(Vec::new(), None));
            };

            let mut response = parse_paged_results(page.clone())?;
            response.next = (index + 1 < self.pages.len())
                .then(|| format!("{}{}", FILE_PAGE_PREFIX, index + 1));
            Ok(response)
        })
    }

    fn source_name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_paged_results() {
        let page = parse_paged_results(json!({
            "data": [{ "id": "1", "name": "Ann" }, { "id": "2", "name": "Bob" }],
            "paging": { "next": "https://graph.example.com/me/friends?after=2" }
        }))
        .unwrap();

        assert_eq!(page.objects.as_ref().unwrap().len(), 2);
        assert_eq!(
            page.next.as_deref(),
            Some("https://graph.example.com/me/friends?after=2")
        );
        assert!(!page.from_cache);
    }

    #[test]
    fn test_parse_without_data_has_no_objects() {
        let page = parse_paged_results(json!({ "paging": {} })).unwrap();
        assert!(page.objects.is_none());
        assert!(page.next.is_none());
    }

    #[test]
    fn test_parse_error_body() {
        let result = parse_paged_results(json!({
            "error": { "message": "Invalid OAuth access token.", "code": 190 }
        }));
        assert!(matches!(result, Err(GraphError::Status { status: 190, .. })));
    }

    #[test]
    fn test_request_url() {
        let source = HttpGraphSource::new(
            Url::parse("https://graph.example.com/").unwrap(),
            Some("token".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();

        let request = GraphRequest::new("me/friends").with_fields(&["id", "name"]);
        let url = source.request_url(&request).unwrap();
        assert_eq!(
            url.as_str(),
            "https://graph.example.com/me/friends?fields=id%2Cname&access_token=token"
        );

        let next = GraphRequest::for_continuation("https://graph.example.com/me/friends?after=x");
        assert_eq!(
            source.request_url(&next).unwrap().as_str(),
            "https://graph.example.com/me/friends?after=x"
        );
    }

    #[tokio::test]
    async fn test_file_source_paging() {
        let source = FileGraphSource::from_value(json!({
            "pages": [
                { "data": [{ "id": "1" }] },
                { "data": [{ "id": "2" }] }
            ]
        }))
        .unwrap();

        let first = source.fetch(GraphRequest::new("me/friends")).await.unwrap();
        assert_eq!(first.next.as_deref(), Some("page:1"));

        let second = source
            .fetch(GraphRequest::for_continuation("page:1"))
            .await
            .unwrap();
        assert!(second.next.is_none());
        assert_eq!(second.objects.unwrap()[0].id().unwrap(), "2");
    }
}
