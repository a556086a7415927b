use crate::env::graph::DISPLAY_SECTIONS_THRESHOLD;
use crate::graph::cursor::GraphObjectCursor;
use crate::graph::images::{ImageDownloader, ImageRequest, ImageResponse, PictureCache};
use crate::graph::object::GraphObject;
use crate::graph::types::{GraphError, ImageData, PagerConfig, RequestId};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

pub type GraphObjectFilter = Arc<dyn Fn(&GraphObject) -> bool + Send + Sync>;
pub type DataNeededListener = Arc<dyn Fn() + Send + Sync>;
pub type AdapterErrorListener = Arc<dyn Fn(GraphError) + Send + Sync>;

/// Adapter settings taken from the pager configuration
#[derive(Debug, Clone, Default)]
pub struct AdapterConfig {
    pub sort_fields: Vec<String>,
    pub group_by_field: Option<String>,
    pub show_pictures: bool,
    pub max_prefetched_pictures: usize,
}

impl From<&PagerConfig> for AdapterConfig {
    fn from(config: &PagerConfig) -> Self {
        Self {
            sort_fields: config.sort_fields.clone(),
            group_by_field: config.group_by_field.clone(),
            show_pictures: config.show_pictures,
            max_prefetched_pictures: config.max_prefetched_pictures,
        }
    }
}

/// What sits at a list position
#[derive(Debug, Clone, PartialEq)]
pub enum SectionAndItem {
    SectionHeader(String),
    GraphObject {
        section_key: String,
        graph_object: GraphObject,
    },
    /// Trailing row shown while more objects can be fetched
    ActivityCircle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewType {
    SectionHeader = 0,
    GraphObject = 1,
    ActivityCircle = 2,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PictureState {
    /// Pictures are disabled or the object has none
    None,
    /// Default picture shown while the real one downloads
    Default,
    Ready(Arc<ImageData>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRow {
    pub id: String,
    pub title: Option<String>,
    pub picture: PictureState,
}

/// A rendered list row
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    SectionHeader(String),
    GraphObject(ObjectRow),
    ActivityCircle,
}

/// Compare two strings the way the platform collator does for list ordering:
/// case is ignored first, and only breaks ties.
pub fn collate(a: &str, b: &str) -> Ordering {
    let primary = a
        .chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase));
    primary.then_with(|| a.cmp(b))
}

/// Compare by each sort field in turn; a missing value sorts first
pub fn compare_graph_objects(a: &GraphObject, b: &GraphObject, sort_fields: &[String]) -> Ordering {
    for field in sort_fields {
        let ordering = match (a.property_str(field), b.property_str(field)) {
            (Some(sa), Some(sb)) => collate(sa, sb),
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Presents a cursor as a flat, sectioned list and prefetches row pictures.
pub struct GraphObjectAdapter {
    config: AdapterConfig,
    filter: Option<GraphObjectFilter>,
    data_needed_listener: Option<DataNeededListener>,
    error_listener: Option<AdapterErrorListener>,
    cursor: Option<GraphObjectCursor>,

    section_keys: Vec<String>,
    objects_by_section: HashMap<String, Vec<GraphObject>>,
    objects_by_id: HashMap<String, GraphObject>,
    display_sections: bool,

    downloader: Option<ImageDownloader>,
    image_tx: mpsc::UnboundedSender<ImageResponse>,
    image_rx: mpsc::UnboundedReceiver<ImageResponse>,
    pending_requests: HashMap<String, RequestId>,
    prefetched: PictureCache,
    prefetching: HashSet<String>,
    displayed: HashMap<String, Arc<ImageData>>,
}

impl GraphObjectAdapter {
    pub fn new(config: AdapterConfig, downloader: Option<ImageDownloader>) -> Self {
        let (image_tx, image_rx) = mpsc::unbounded_channel();
        let prefetched = PictureCache::new(config.max_prefetched_pictures);
        Self {
            config,
            filter: None,
            data_needed_listener: None,
            error_listener: None,
            cursor: None,
            section_keys: Vec::new(),
            objects_by_section: HashMap::new(),
            objects_by_id: HashMap::new(),
            display_sections: false,
            downloader,
            image_tx,
            image_rx,
            pending_requests: HashMap::new(),
            prefetched,
            prefetching: HashSet::new(),
            displayed: HashMap::new(),
        }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn set_sort_fields(&mut self, sort_fields: Vec<String>) {
        self.config.sort_fields = sort_fields;
    }

    pub fn set_group_by_field(&mut self, group_by_field: Option<String>) {
        self.config.group_by_field = group_by_field;
    }

    pub fn set_show_pictures(&mut self, show_pictures: bool) {
        self.config.show_pictures = show_pictures;
    }

    pub fn set_filter(&mut self, filter: Option<GraphObjectFilter>) {
        self.filter = filter;
    }

    pub fn set_data_needed_listener(&mut self, listener: Option<DataNeededListener>) {
        self.data_needed_listener = listener;
    }

    pub fn set_on_error_listener(&mut self, listener: Option<AdapterErrorListener>) {
        self.error_listener = listener;
    }

    pub fn cursor(&self) -> Option<&GraphObjectCursor> {
        self.cursor.as_ref()
    }

    /// Swap in a new cursor and rebuild the sections.
    ///
    /// Returns `false` when `cursor` is the one already shown.
    pub fn change_cursor(&mut self, cursor: Option<GraphObjectCursor>) -> Result<bool, GraphError> {
        let current = self.cursor.as_ref().map(GraphObjectCursor::id);
        if current == cursor.as_ref().map(GraphObjectCursor::id) {
            return Ok(false);
        }
        if let Some(old) = self.cursor.as_mut() {
            old.close();
        }
        self.cursor = cursor;
        self.rebuild_sections()?;
        Ok(true)
    }

    fn section_key_of(&self, graph_object: &GraphObject) -> String {
        self.config
            .group_by_field
            .as_deref()
            .and_then(|field| graph_object.property_str(field))
            .and_then(|value| value.chars().next())
            .map(|first| first.to_uppercase().collect())
            .unwrap_or_default()
    }

    fn filter_includes(&self, graph_object: &GraphObject) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter(graph_object))
    }

    /// Regroup the cursor's filter-passing objects into sorted sections
    pub fn rebuild_sections(&mut self) -> Result<(), GraphError> {
        self.section_keys.clear();
        self.objects_by_section.clear();
        self.objects_by_id.clear();
        self.display_sections = false;

        let Some(cursor) = self.cursor.as_ref() else {
            return Ok(());
        };

        let mut section_keys = Vec::new();
        let mut objects_by_section: HashMap<String, Vec<GraphObject>> = HashMap::new();
        let mut objects_by_id = HashMap::new();
        let mut objects_added = 0usize;

        for graph_object in cursor.iter() {
            if !self.filter_includes(graph_object) {
                continue;
            }
            let id = graph_object.id()?.to_string();
            objects_added += 1;

            let key = self.section_key_of(graph_object);
            objects_by_section
                .entry(key.clone())
                .or_insert_with(|| {
                    section_keys.push(key);
                    Vec::new()
                })
                .push(graph_object.clone());
            objects_by_id.insert(id, graph_object.clone());
        }

        if !self.config.sort_fields.is_empty() {
            let sort_fields = &self.config.sort_fields;
            for section in objects_by_section.values_mut() {
                section.sort_by(|a, b| compare_graph_objects(a, b, sort_fields));
            }
        }
        section_keys.sort_by(|a, b| collate(a, b));

        self.display_sections = section_keys.len() > 1 && objects_added > DISPLAY_SECTIONS_THRESHOLD;
        self.section_keys = section_keys;
        self.objects_by_section = objects_by_section;
        self.displayed.retain(|id, _| objects_by_id.contains_key(id));
        self.objects_by_id = objects_by_id;

        debug!(
            sections = self.section_keys.len(),
            objects = objects_added,
            "Rebuilt sections"
        );
        Ok(())
    }

    fn should_show_activity_circle(&self) -> bool {
        self.cursor
            .as_ref()
            .is_some_and(GraphObjectCursor::are_more_objects_available)
            && self.data_needed_listener.is_some()
            && !self.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.section_keys.is_empty()
    }

    pub fn count(&self) -> usize {
        if self.section_keys.is_empty() {
            return 0;
        }
        let headers = if self.display_sections { self.section_keys.len() } else { 0 };
        let objects: usize = self.objects_by_section.values().map(Vec::len).sum();
        let activity = usize::from(self.should_show_activity_circle());
        headers + objects + activity
    }

    pub fn is_displaying_sections(&self) -> bool {
        self.display_sections
    }

    pub fn section_and_item(&self, position: usize) -> Option<SectionAndItem> {
        let count = self.count();
        if position >= count {
            return None;
        }
        if self.should_show_activity_circle() && position == count - 1 {
            return Some(SectionAndItem::ActivityCircle);
        }

        if !self.display_sections {
            let section_key = self.section_keys.first()?;
            let graph_object = self.objects_by_section.get(section_key)?.get(position)?;
            return Some(SectionAndItem::GraphObject {
                section_key: section_key.clone(),
                graph_object: graph_object.clone(),
            });
        }

        // Each section starts with its header row.
        let mut remaining = position;
        for key in &self.section_keys {
            if remaining == 0 {
                return Some(SectionAndItem::SectionHeader(key.clone()));
            }
            remaining -= 1;

            let section = self.objects_by_section.get(key)?;
            if remaining < section.len() {
                return Some(SectionAndItem::GraphObject {
                    section_key: key.clone(),
                    graph_object: section[remaining].clone(),
                });
            }
            remaining -= section.len();
        }
        None
    }

    /// Position of `graph_object` within `section_key`, or of the section's
    /// header when `graph_object` is `None`
    pub fn position_of(&self, section_key: &str, graph_object: Option<&GraphObject>) -> Option<usize> {
        let mut position = 0usize;
        let mut found = false;

        for key in &self.section_keys {
            if self.display_sections {
                position += 1;
            }
            if key == section_key {
                found = true;
                break;
            }
            position += self.objects_by_section.get(key).map_or(0, Vec::len);
        }

        if !found {
            return None;
        }
        let Some(graph_object) = graph_object else {
            return Some(position - usize::from(self.display_sections));
        };

        self.objects_by_section
            .get(section_key)?
            .iter()
            .position(|candidate| candidate.has_same_id(graph_object))
            .map(|index| position + index)
    }

    /// Whether every row is selectable.
    ///
    /// Header rows are never enabled, so this holds exactly when no section
    /// headers are shown. It agrees with [`Self::is_enabled`], not with list
    /// adapters that report `true` whenever sections are displayed.
    pub fn are_all_items_enabled(&self) -> bool {
        !self.display_sections
    }

    pub fn has_stable_ids(&self) -> bool {
        true
    }

    pub fn is_enabled(&self, position: usize) -> bool {
        matches!(
            self.section_and_item(position),
            Some(SectionAndItem::GraphObject { .. })
        )
    }

    pub fn item(&self, position: usize) -> Option<GraphObject> {
        match self.section_and_item(position)? {
            SectionAndItem::GraphObject { graph_object, .. } => Some(graph_object),
            _ => None,
        }
    }

    /// Numeric id of the object at `position`, 0 when there is none
    pub fn item_id(&self, position: usize) -> i64 {
        self.item(position)
            .and_then(|object| object.id().ok().and_then(|id| id.parse().ok()))
            .unwrap_or(0)
    }

    pub fn view_type_count(&self) -> usize {
        3
    }

    pub fn item_view_type(&self, position: usize) -> Option<ViewType> {
        Some(match self.section_and_item(position)? {
            SectionAndItem::SectionHeader(_) => ViewType::SectionHeader,
            SectionAndItem::GraphObject { .. } => ViewType::GraphObject,
            SectionAndItem::ActivityCircle => ViewType::ActivityCircle,
        })
    }

    /// Render the row at `position`.
    ///
    /// Rendering the activity row means the list reached its loaded end,
    /// so the data-needed listener fires.
    pub fn row(&mut self, position: usize) -> Option<Row> {
        Some(match self.section_and_item(position)? {
            SectionAndItem::SectionHeader(key) => Row::SectionHeader(key),
            SectionAndItem::GraphObject { graph_object, .. } => Row::GraphObject(self.object_row(&graph_object)),
            SectionAndItem::ActivityCircle => {
                if let Some(listener) = &self.data_needed_listener {
                    listener();
                }
                Row::ActivityCircle
            }
        })
    }

    fn object_row(&mut self, graph_object: &GraphObject) -> ObjectRow {
        // Objects without ids never make it into a section.
        let id = graph_object.id().unwrap_or_default().to_string();
        let title = graph_object.name().map(str::to_string);

        let picture = match (self.config.show_pictures, graph_object.picture_url()) {
            (true, Some(url)) => {
                if let Some(picture) = self.prefetched.get(&id) {
                    PictureState::Ready(picture)
                } else if let Some(picture) = self.displayed.get(&id).filter(|p| p.url == url) {
                    PictureState::Ready(picture.clone())
                } else {
                    self.download_picture(&id, url, false);
                    PictureState::Default
                }
            }
            _ => PictureState::None,
        };

        ObjectRow { id, title, picture }
    }

    pub fn sections(&self) -> Vec<String> {
        if self.display_sections {
            self.section_keys.clone()
        } else {
            Vec::new()
        }
    }

    pub fn position_for_section(&self, section: usize) -> usize {
        if !self.display_sections {
            return 0;
        }
        let section = section.min(self.section_keys.len().saturating_sub(1));
        self.section_keys
            .get(section)
            .and_then(|key| self.position_of(key, None))
            .unwrap_or(0)
    }

    pub fn section_for_position(&self, position: usize) -> usize {
        let key = match self.section_and_item(position) {
            Some(SectionAndItem::SectionHeader(key)) => key,
            Some(SectionAndItem::GraphObject { section_key, .. }) => section_key,
            _ => return 0,
        };
        self.section_keys.iter().position(|k| *k == key).unwrap_or(0)
    }

    /// Look up loaded objects by id, skipping unknown and repeated ids
    pub fn graph_objects_by_id<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> Vec<GraphObject> {
        let mut seen = HashSet::new();
        ids.into_iter()
            .filter(|id| seen.insert(*id))
            .filter_map(|id| self.objects_by_id.get(id).cloned())
            .collect()
    }

    /// Reorder picture downloads after the viewport moved.
    ///
    /// Pending downloads of visible rows jump the queue (bottom row first,
    /// so the top row ends up at the front); pictures of objects within
    /// `prefetch_buffer` rows around the viewport are fetched into the
    /// picture cache.
    pub fn prioritize_view_range(&mut self, first_visible: usize, last_visible: usize, prefetch_buffer: usize) {
        if last_visible < first_visible || self.section_keys.is_empty() {
            return;
        }

        if let Some(downloader) = &self.downloader {
            for position in (0..=last_visible).rev() {
                if let Some(SectionAndItem::GraphObject { graph_object, .. }) = self.section_and_item(position) {
                    let pending = graph_object
                        .id()
                        .ok()
                        .and_then(|id| self.pending_requests.get(id));
                    if let Some(request_id) = pending {
                        downloader.prioritize_request(*request_id);
                    }
                }
            }
        }

        let count = self.count();
        let start = first_visible.saturating_sub(prefetch_buffer);
        let end = (last_visible + prefetch_buffer).min(count.saturating_sub(1));
        let to_prefetch: Vec<GraphObject> = (start..first_visible)
            .chain(last_visible + 1..=end)
            .filter_map(|position| self.item(position))
            .collect();

        for graph_object in to_prefetch {
            let Ok(id) = graph_object.id() else {
                continue;
            };
            let id = id.to_string();

            // Already cached or on its way: only refresh its recency.
            if self.prefetched.touch(&id) || self.prefetching.contains(&id) {
                continue;
            }
            if let Some(url) = graph_object.picture_url() {
                // A pending display download for the same id queues nothing.
                if self.download_picture(&id, url, true) {
                    self.prefetching.insert(id);
                }
            }
        }
    }

    /// Queue a download unless one is already pending for `id`; returns whether one was queued
    fn download_picture(&mut self, id: &str, url: Url, prefetch: bool) -> bool {
        let Some(downloader) = &self.downloader else {
            return false;
        };
        if self.pending_requests.contains_key(id) {
            return false;
        }
        let request = ImageRequest::new(id, url, prefetch, self.image_tx.clone());
        self.pending_requests.insert(id.to_string(), request.id);
        downloader.download_async(request);
        true
    }

    /// Apply picture downloads that completed so far; returns how many
    pub fn poll_image_responses(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(response) = self.image_rx.try_recv() {
            self.process_image_response(response);
            applied += 1;
        }
        applied
    }

    /// Wait for the next picture download to complete and apply it
    pub async fn wait_for_image_response(&mut self) -> bool {
        match self.image_rx.recv().await {
            Some(response) => {
                self.process_image_response(response);
                true
            }
            None => false,
        }
    }

    fn process_image_response(&mut self, response: ImageResponse) {
        if self.pending_requests.get(&response.key) == Some(&response.request_id) {
            self.pending_requests.remove(&response.key);
        }
        if response.prefetch {
            self.prefetching.remove(&response.key);
        }

        match response.result {
            Ok(picture) if response.prefetch => {
                self.prefetched.put(response.key, picture);
            }
            Ok(picture) => {
                self.displayed.insert(response.key, picture);
            }
            Err(error) => {
                warn!("Picture download for {} failed: {}", response.key, error);
                if let Some(listener) = &self.error_listener {
                    listener(error);
                }
            }
        }
    }

    pub fn prefetched_pictures(&self) -> &PictureCache {
        &self.prefetched
    }

    pub fn pending_picture_count(&self) -> usize {
        self.pending_requests.len()
    }
}
