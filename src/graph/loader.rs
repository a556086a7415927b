use crate::graph::cursor::GraphObjectCursor;
use crate::graph::source::GraphSource;
use crate::graph::types::{GraphError, GraphRequest, GraphResponse, RequestId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type LoadFinishedListener = Arc<dyn Fn(GraphObjectCursor) + Send + Sync>;
pub type ErrorListener = Arc<dyn Fn(GraphError) + Send + Sync>;

/// Fetches pages from a [`GraphSource`] and accumulates them into cursors.
///
/// At most one request is in flight at a time. The guard lives in the
/// shared state, so concurrent callers get [`GraphError::AlreadyLoading`]
/// instead of racing.
#[derive(Clone)]
pub struct PagingLoader {
    source: Arc<dyn GraphSource>,
    state: Arc<Mutex<LoaderState>>,
}

#[derive(Default)]
struct LoaderState {
    original_request: Option<GraphRequest>,
    current_request: Option<RequestId>,
    next_link: Option<String>,
    cursor: Option<GraphObjectCursor>,
    loading: bool,
    append_results: bool,
    on_load_finished: Option<LoadFinishedListener>,
    on_error: Option<ErrorListener>,
}

/// Delay before a delivered cursor must be refreshed from the network.
///
/// Cached results are provisional: a cached cursor is re-fetched
/// immediately when empty, otherwise after `refresh_delay`.
pub fn cache_refresh_delay(cursor: &GraphObjectCursor, refresh_delay: Duration) -> Option<Duration> {
    if !cursor.is_from_cache() {
        return None;
    }
    if cursor.is_empty() {
        Some(Duration::ZERO)
    } else {
        Some(refresh_delay)
    }
}

impl PagingLoader {
    pub fn new(source: Arc<dyn GraphSource>) -> Self {
        Self {
            source,
            state: Arc::new(Mutex::new(LoaderState::default())),
        }
    }

    pub async fn set_on_load_finished(&self, listener: Option<LoadFinishedListener>) {
        self.state.lock().await.on_load_finished = listener;
    }

    pub async fn set_on_error_listener(&self, listener: Option<ErrorListener>) {
        self.state.lock().await.on_error = listener;
    }

    /// Drop both listeners; responses still in flight are discarded silently
    pub async fn detach(&self) {
        let mut state = self.state.lock().await;
        state.on_load_finished = None;
        state.on_error = None;
    }

    pub async fn is_loading(&self) -> bool {
        self.state.lock().await.loading
    }

    pub async fn cursor(&self) -> Option<GraphObjectCursor> {
        self.state.lock().await.cursor.clone()
    }

    pub async fn has_next_link(&self) -> bool {
        self.state.lock().await.next_link.is_some()
    }

    /// Start loading the first page of `request`, replacing any previous results
    pub async fn start_loading(
        &self,
        request: GraphRequest,
        skip_round_trip_if_cached: bool,
    ) -> Result<(), GraphError> {
        let mut state = self.state.lock().await;
        if state.loading {
            return Err(GraphError::AlreadyLoading);
        }
        state.original_request = Some(request.clone());
        self.begin(&mut state, request, skip_round_trip_if_cached, Duration::ZERO);
        Ok(())
    }

    /// Re-issue the original request from the network after `delay`.
    ///
    /// The loader counts as loading from the moment the refresh is scheduled.
    pub async fn refresh_original_request(&self, delay: Duration) -> Result<(), GraphError> {
        let mut state = self.state.lock().await;
        if state.loading {
            return Err(GraphError::AlreadyLoading);
        }
        let request = state
            .original_request
            .clone()
            .ok_or_else(|| GraphError::InvalidRequest("nothing to refresh".to_string()))?;
        info!("Refreshing original request in {:?}", delay);
        self.begin(&mut state, request, false, delay);
        Ok(())
    }

    /// Fetch the page behind the retained continuation and append it.
    ///
    /// Continuation pages always come from the network. Returns `false`
    /// when there is no continuation to follow.
    pub async fn follow_next_link(&self) -> Result<bool, GraphError> {
        let mut state = self.state.lock().await;
        if state.loading {
            return Err(GraphError::AlreadyLoading);
        }
        let Some(next) = state.next_link.clone() else {
            return Ok(false);
        };

        let request = GraphRequest::for_continuation(&next).with_accept_cached(false);
        state.append_results = true;
        let request_id = Uuid::new_v4();
        state.current_request = Some(request_id);
        state.loading = true;
        debug!(%request_id, "Following next link {}", next);
        self.spawn_fetch(request_id, request, Duration::ZERO);
        Ok(true)
    }

    /// Forget results, continuation and the in-flight request
    pub async fn clear_results(&self) {
        let mut state = self.state.lock().await;
        if let Some(cursor) = state.cursor.as_mut() {
            cursor.close();
        }
        state.cursor = None;
        state.next_link = None;
        state.current_request = None;
        state.loading = false;
        state.append_results = false;
    }

    fn begin(
        &self,
        state: &mut LoaderState,
        request: GraphRequest,
        skip_round_trip_if_cached: bool,
        delay: Duration,
    ) {
        state.append_results = false;
        state.next_link = None;
        state.loading = true;

        let request_id = Uuid::new_v4();
        state.current_request = Some(request_id);
        debug!(%request_id, target = %request.target, "Starting load");
        self.spawn_fetch(
            request_id,
            request.with_accept_cached(skip_round_trip_if_cached),
            delay,
        );
    }

    fn spawn_fetch(&self, request_id: RequestId, request: GraphRequest, delay: Duration) {
        let loader = self.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let result = loader.source.fetch(request).await;
            loader.request_completed(request_id, result).await;
        });
    }

    async fn request_completed(&self, request_id: RequestId, result: Result<GraphResponse, GraphError>) {
        let mut state = self.state.lock().await;
        if state.current_request != Some(request_id) {
            debug!(%request_id, "Dropping response for a superseded request");
            return;
        }
        state.current_request = None;
        state.loading = false;

        let response = result.and_then(|response| match response.error {
            Some(error) => Err(error),
            None if response.objects.is_none() => Err(GraphError::NoResult),
            None => Ok(response),
        });

        match response {
            Ok(response) => {
                let cursor = Self::add_results(&mut state, response);
                state.cursor = Some(cursor.clone());
                let listener = state.on_load_finished.clone();
                drop(state);

                if let Some(listener) = listener {
                    listener(cursor);
                }
            }
            Err(error) => {
                warn!(%request_id, "Load failed: {}", error);
                state.next_link = None;
                let listener = state.on_error.clone();
                drop(state);

                if let Some(listener) = listener {
                    listener(error);
                }
            }
        }
    }

    fn add_results(state: &mut LoaderState, response: GraphResponse) -> GraphObjectCursor {
        let mut cursor = match (&state.cursor, state.append_results) {
            (Some(existing), true) => GraphObjectCursor::appended(existing),
            _ => GraphObjectCursor::new(),
        };

        let objects = response.objects.unwrap_or_default();
        if objects.is_empty() {
            cursor.set_more_objects_available(false);
            cursor.set_from_cache(response.from_cache);
            state.next_link = None;
        } else {
            state.next_link = response.next;
            cursor.add_graph_objects(objects, response.from_cache);
            cursor.set_more_objects_available(state.next_link.is_some());
        }

        debug!(
            count = cursor.count(),
            more = cursor.are_more_objects_available(),
            from_cache = cursor.is_from_cache(),
            "Delivering cursor"
        );
        cursor
    }
}
