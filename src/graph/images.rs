//! Picture downloads for picker rows.
//!
//! Downloads go through a priority queue owned by a dispatcher task: new
//! requests join the back, scrolling moves the visible ones to the front.
//! Completed downloads are posted back on the requester's channel, to be
//! applied on the task that owns the adapter.

use crate::graph::types::{GraphError, ImageData, RequestId};
use async_trait::async_trait;
use lru::LruCache;
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

/// Fetches picture bytes
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<ImageData, GraphError>;
}

pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, GraphError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &Url) -> Result<ImageData, GraphError> {
        let image_error = |message: String| GraphError::Image {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| image_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(image_error(format!("status {}", response.status())));
        }
        let bytes = response.bytes().await.map_err(|e| image_error(e.to_string()))?;

        Ok(ImageData {
            url: url.clone(),
            bytes: bytes.to_vec(),
        })
    }
}

/// A queued picture download
#[derive(Debug)]
pub struct ImageRequest {
    pub id: RequestId,
    /// Graph object the picture belongs to
    pub key: String,
    pub url: Url,
    /// Prefetches go to the picture cache instead of a row
    pub prefetch: bool,
    reply: mpsc::UnboundedSender<ImageResponse>,
}

impl ImageRequest {
    pub fn new(
        key: impl Into<String>,
        url: Url,
        prefetch: bool,
        reply: mpsc::UnboundedSender<ImageResponse>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: key.into(),
            url,
            prefetch,
            reply,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageResponse {
    pub request_id: RequestId,
    pub key: String,
    pub url: Url,
    pub prefetch: bool,
    pub result: Result<Arc<ImageData>, GraphError>,
}

#[derive(Debug)]
enum DownloaderCommand {
    Enqueue(ImageRequest),
    Prioritize(RequestId),
    Cancel(RequestId),
}

/// Handle to the download dispatcher. Cloning shares the same queue.
#[derive(Clone)]
pub struct ImageDownloader {
    commands: mpsc::UnboundedSender<DownloaderCommand>,
}

impl ImageDownloader {
    /// Spawn the dispatcher on the current tokio runtime.
    ///
    /// The dispatcher stops once every handle is dropped and the running
    /// downloads have finished.
    pub fn start(fetcher: Arc<dyn ImageFetcher>, max_concurrent: usize) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_dispatcher(fetcher, receiver, max_concurrent.max(1)));
        Self { commands }
    }

    pub fn download_async(&self, request: ImageRequest) {
        if self.commands.send(DownloaderCommand::Enqueue(request)).is_err() {
            warn!("Image dispatcher is gone, dropping download");
        }
    }

    /// Move a queued request to the front of the queue
    pub fn prioritize_request(&self, request_id: RequestId) {
        let _ = self.commands.send(DownloaderCommand::Prioritize(request_id));
    }

    /// Drop a queued request; running downloads are not interrupted
    pub fn cancel_request(&self, request_id: RequestId) {
        let _ = self.commands.send(DownloaderCommand::Cancel(request_id));
    }
}

async fn run_dispatcher(
    fetcher: Arc<dyn ImageFetcher>,
    mut commands: mpsc::UnboundedReceiver<DownloaderCommand>,
    max_concurrent: usize,
) {
    let (finished_tx, mut finished_rx) = mpsc::unbounded_channel::<RequestId>();
    let mut queue: VecDeque<ImageRequest> = VecDeque::new();
    let mut active = 0usize;
    let mut accepting = true;

    loop {
        while active < max_concurrent {
            let Some(request) = queue.pop_front() else {
                break;
            };
            active += 1;
            tokio::spawn(download(fetcher.clone(), request, finished_tx.clone()));
        }

        if !accepting && active == 0 {
            break;
        }

        tokio::select! {
            command = commands.recv(), if accepting => match command {
                Some(DownloaderCommand::Enqueue(request)) => {
                    debug!(request_id = %request.id, "Queued picture {}", request.url);
                    queue.push_back(request);
                }
                Some(DownloaderCommand::Prioritize(request_id)) => {
                    if let Some(index) = queue.iter().position(|r| r.id == request_id) {
                        if let Some(request) = queue.remove(index) {
                            queue.push_front(request);
                        }
                    }
                }
                Some(DownloaderCommand::Cancel(request_id)) => {
                    queue.retain(|r| r.id != request_id);
                }
                None => {
                    accepting = false;
                    queue.clear();
                }
            },
            Some(_) = finished_rx.recv() => {
                active -= 1;
            }
        }
    }
    debug!("Image dispatcher stopped");
}

async fn download(
    fetcher: Arc<dyn ImageFetcher>,
    request: ImageRequest,
    finished: mpsc::UnboundedSender<RequestId>,
) {
    let result = fetcher.fetch(&request.url).await.map(Arc::new);
    let response = ImageResponse {
        request_id: request.id,
        key: request.key,
        url: request.url,
        prefetch: request.prefetch,
        result,
    };
    // A closed reply channel means the requester detached.
    let _ = request.reply.send(response);
    let _ = finished.send(request.id);
}

/// Strict LRU cache of prefetched pictures, keyed by graph object id
pub struct PictureCache {
    entries: LruCache<String, Arc<ImageData>>,
}

impl PictureCache {
    /// A zero capacity is raised to one entry.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or_else(|| {
            warn!("Picture cache capacity must be at least 1, using 1");
            NonZeroUsize::MIN
        });
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Insert a picture, returning the id evicted to make room
    pub fn put(&mut self, id: impl Into<String>, picture: Arc<ImageData>) -> Option<String> {
        let id = id.into();
        match self.entries.push(id.clone(), picture) {
            Some((evicted, _)) if evicted != id => {
                debug!("Evicted prefetched picture for {}", evicted);
                Some(evicted)
            }
            _ => None,
        }
    }

    /// Look a picture up, marking it most recently used
    pub fn get(&mut self, id: &str) -> Option<Arc<ImageData>> {
        self.entries.get(id).cloned()
    }

    /// Mark an entry most recently used without reading it
    pub fn touch(&mut self, id: &str) -> bool {
        if self.entries.contains(id) {
            self.entries.promote(id);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::graph::MAX_PREFETCHED_PICTURES;

    fn picture(n: usize) -> Arc<ImageData> {
        Arc::new(ImageData {
            url: Url::parse(&format!("https://example.com/{}.png", n)).unwrap(),
            bytes: vec![n as u8],
        })
    }

    #[test]
    fn test_cache_never_exceeds_capacity() {
        let mut cache = PictureCache::new(MAX_PREFETCHED_PICTURES);
        for n in 0..MAX_PREFETCHED_PICTURES {
            assert!(cache.put(n.to_string(), picture(n)).is_none());
        }
        assert_eq!(cache.len(), 20);

        let evicted = cache.put("20", picture(20));
        assert_eq!(evicted.as_deref(), Some("0"));
        assert_eq!(cache.len(), 20);
        assert!(!cache.contains("0"));
    }

    #[test]
    fn test_access_refreshes_recency() {
        let mut cache = PictureCache::new(3);
        cache.put("a", picture(1));
        cache.put("b", picture(2));
        cache.put("c", picture(3));

        assert!(cache.get("a").is_some());
        assert!(cache.touch("b"));
        assert_eq!(cache.put("d", picture(4)).as_deref(), Some("c"));
        assert!(cache.contains("a"));
    }

    #[test]
    fn test_replacing_an_entry_evicts_nothing() {
        let mut cache = PictureCache::new(2);
        cache.put("a", picture(1));
        assert!(cache.put("a", picture(2)).is_none());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a").unwrap().bytes, vec![2]);
    }

    #[test]
    fn test_zero_capacity_holds_one_entry() {
        let mut cache = PictureCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.put("a", picture(1));
        assert_eq!(cache.put("b", picture(2)).as_deref(), Some("a"));
        assert_eq!(cache.len(), 1);
    }
}
