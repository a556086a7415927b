use crate::graph::adapter::{AdapterConfig, GraphObjectAdapter, GraphObjectFilter, Row};
use crate::graph::cursor::GraphObjectCursor;
use crate::graph::images::ImageDownloader;
use crate::graph::loader::{cache_refresh_delay, ErrorListener, PagingLoader};
use crate::graph::object::GraphObject;
use crate::graph::selection::SelectionStrategy;
use crate::graph::source::GraphSource;
use crate::graph::types::{GraphError, GraphRequest, LoadingStrategy, PagerConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

pub type DataChangedListener = Arc<dyn Fn() + Send + Sync>;

/// Loader output, posted to the task that owns the picker
#[derive(Debug, Clone)]
pub enum PickerEvent {
    LoadFinished(GraphObjectCursor),
    LoadFailed(GraphError),
}

/// A paged picker: loader, adapter and selection wired together.
///
/// The picker is owned by a single task. Loader results arrive through a
/// channel and are applied by [`Picker::next_event`] or
/// [`Picker::process_pending_events`].
pub struct Picker {
    config: PagerConfig,
    loader: PagingLoader,
    adapter: GraphObjectAdapter,
    selection: SelectionStrategy,
    events: mpsc::UnboundedReceiver<PickerEvent>,
    data_needed: Arc<AtomicBool>,
    on_error: Option<ErrorListener>,
    on_data_changed: Option<DataChangedListener>,
}

impl Picker {
    pub async fn new(
        source: Arc<dyn GraphSource>,
        downloader: Option<ImageDownloader>,
        config: PagerConfig,
    ) -> Self {
        let loader = PagingLoader::new(source);
        let (events_tx, events) = mpsc::unbounded_channel();

        let finished_tx = events_tx.clone();
        loader
            .set_on_load_finished(Some(Arc::new(move |cursor: GraphObjectCursor| {
                let _ = finished_tx.send(PickerEvent::LoadFinished(cursor));
            })))
            .await;
        loader
            .set_on_error_listener(Some(Arc::new(move |error: GraphError| {
                let _ = events_tx.send(PickerEvent::LoadFailed(error));
            })))
            .await;

        let mut adapter = GraphObjectAdapter::new(AdapterConfig::from(&config), downloader);
        let data_needed = Arc::new(AtomicBool::new(false));
        if config.loading_strategy == LoadingStrategy::AsNeeded {
            let flag = data_needed.clone();
            adapter.set_data_needed_listener(Some(Arc::new(move || {
                flag.store(true, Ordering::SeqCst);
            })));
        }

        let selection = if config.multi_select {
            SelectionStrategy::multi()
        } else {
            SelectionStrategy::single()
        };

        Self {
            config,
            loader,
            adapter,
            selection,
            events,
            data_needed,
            on_error: None,
            on_data_changed: None,
        }
    }

    pub fn adapter(&self) -> &GraphObjectAdapter {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut GraphObjectAdapter {
        &mut self.adapter
    }

    pub fn loader(&self) -> &PagingLoader {
        &self.loader
    }

    pub fn selection(&self) -> &SelectionStrategy {
        &self.selection
    }

    /// Route loader and picture errors to a single listener
    pub fn set_on_error_listener(&mut self, listener: Option<ErrorListener>) {
        self.adapter.set_on_error_listener(listener.clone());
        self.on_error = listener;
    }

    pub fn set_on_data_changed_listener(&mut self, listener: Option<DataChangedListener>) {
        self.on_data_changed = listener;
    }

    pub fn set_filter(&mut self, filter: Option<GraphObjectFilter>) {
        self.adapter.set_filter(filter);
    }

    /// Load the first page of `request`.
    ///
    /// Unless `force_reload` is set, nothing happens while data is shown
    /// or a load is already running. Only the first page may come from
    /// cache, and only when `request` accepts cached results. Returns
    /// whether a load was started.
    pub async fn load_data(&mut self, request: GraphRequest, force_reload: bool) -> Result<bool, GraphError> {
        if !force_reload && (!self.adapter.is_empty() || self.loader.is_loading().await) {
            return Ok(false);
        }
        self.clear_results().await?;
        info!("Loading {}", request.target);
        let accept_cached = request.accept_cached;
        self.loader.start_loading(request, accept_cached).await?;
        Ok(true)
    }

    pub async fn clear_results(&mut self) -> Result<(), GraphError> {
        let had_data = !self.adapter.is_empty();
        self.loader.clear_results().await;
        self.selection.clear();
        self.adapter.change_cursor(None)?;
        self.data_needed.store(false, Ordering::SeqCst);
        if had_data {
            self.notify_data_changed();
        }
        Ok(())
    }

    /// Wait for the next loader event and apply it
    pub async fn next_event(&mut self) -> Option<PickerEvent> {
        let event = self.events.recv().await?;
        self.handle_event(event.clone()).await;
        Some(event)
    }

    /// Apply every loader event and picture download that already arrived
    pub async fn process_pending_events(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event).await;
            processed += 1;
        }
        self.adapter.poll_image_responses();
        processed
    }

    async fn handle_event(&mut self, event: PickerEvent) {
        match event {
            PickerEvent::LoadFinished(cursor) => self.on_load_finished(cursor).await,
            PickerEvent::LoadFailed(error) => self.report_error(error),
        }
    }

    async fn on_load_finished(&mut self, cursor: GraphObjectCursor) {
        let more_objects_available = cursor.are_more_objects_available();
        let refresh_delay = cache_refresh_delay(&cursor, self.config.cached_result_refresh_delay);

        match self.adapter.change_cursor(Some(cursor)) {
            Ok(true) => self.notify_data_changed(),
            Ok(false) => {}
            Err(error) => {
                self.report_error(error);
                return;
            }
        }

        if self.loader.is_loading().await {
            return;
        }

        match self.config.loading_strategy {
            LoadingStrategy::Immediate => {
                if more_objects_available {
                    self.follow_next_link().await;
                } else if let Some(delay) = refresh_delay {
                    self.refresh_from_network(delay).await;
                }
            }
            // A cached first page is replaced before paging begins.
            LoadingStrategy::AsNeeded => {
                if let Some(delay) = refresh_delay {
                    self.refresh_from_network(delay).await;
                } else if more_objects_available && self.data_needed.swap(false, Ordering::SeqCst) {
                    self.follow_next_link().await;
                }
            }
        }
    }

    async fn refresh_from_network(&mut self, delay: Duration) {
        debug!("Cached result delivered, refreshing in {:?}", delay);
        if let Err(error) = self.loader.refresh_original_request(delay).await {
            self.report_error(error);
        }
    }

    async fn follow_next_link(&mut self) {
        match self.loader.follow_next_link().await {
            Ok(_) => {}
            Err(GraphError::AlreadyLoading) => debug!("Next page already loading"),
            Err(error) => self.report_error(error),
        }
    }

    /// Render a row; reaching the loaded end fetches the next page
    pub async fn row(&mut self, position: usize) -> Option<Row> {
        let row = self.adapter.row(position);
        if self.data_needed.swap(false, Ordering::SeqCst) {
            self.follow_next_link().await;
        }
        row
    }

    /// The viewport moved
    pub fn on_scroll(&mut self, first_visible: usize, last_visible: usize) {
        self.adapter
            .prioritize_view_range(first_visible, last_visible, self.config.prefetch_buffer);
    }

    pub fn toggle_selection(&mut self, id: &str) {
        self.selection.toggle_selection(id);
    }

    pub fn selected_graph_objects(&self) -> Vec<GraphObject> {
        self.adapter
            .graph_objects_by_id(self.selection.selected_ids())
    }

    /// Whether data is shown or on its way
    pub async fn is_data_present_or_loading(&self) -> bool {
        !self.adapter.is_empty() || self.loader.is_loading().await
    }

    /// Stop listening; responses still in flight are dropped
    pub async fn detach(&mut self) {
        self.loader.detach().await;
        self.adapter.set_data_needed_listener(None);
        self.adapter.set_on_error_listener(None);
        self.on_error = None;
        self.on_data_changed = None;
    }

    fn report_error(&self, error: GraphError) {
        if let Some(listener) = &self.on_error {
            listener(error);
        }
    }

    fn notify_data_changed(&self) {
        if let Some(listener) = &self.on_data_changed {
            listener();
        }
    }
}
