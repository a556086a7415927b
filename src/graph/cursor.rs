use crate::graph::object::GraphObject;
use crate::graph::types::CursorId;
use uuid::Uuid;

/// Paginated accumulation of graph objects.
///
/// The position starts before the first object. Appending a page to an
/// already delivered cursor goes through [`GraphObjectCursor::appended`],
/// which keeps the existing objects as an unchanged prefix.
#[derive(Debug, Clone)]
pub struct GraphObjectCursor {
    id: CursorId,
    objects: Vec<GraphObject>,
    position: isize,
    more_objects_available: bool,
    from_cache: bool,
    closed: bool,
}

impl Default for GraphObjectCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphObjectCursor {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            objects: Vec::new(),
            position: -1,
            more_objects_available: false,
            from_cache: false,
            closed: false,
        }
    }

    /// A new cursor holding a copy of `other`'s objects and flags
    pub fn appended(other: &GraphObjectCursor) -> Self {
        Self {
            id: Uuid::new_v4(),
            objects: other.objects.clone(),
            position: -1,
            more_objects_available: other.more_objects_available,
            from_cache: other.from_cache,
            closed: false,
        }
    }

    pub fn id(&self) -> CursorId {
        self.id
    }

    pub fn add_graph_objects(&mut self, objects: impl IntoIterator<Item = GraphObject>, from_cache: bool) {
        self.objects.extend(objects);
        self.from_cache |= from_cache;
    }

    pub fn is_from_cache(&self) -> bool {
        self.from_cache
    }

    pub fn set_from_cache(&mut self, from_cache: bool) {
        self.from_cache = from_cache;
    }

    pub fn are_more_objects_available(&self) -> bool {
        self.more_objects_available
    }

    pub fn set_more_objects_available(&mut self, more_objects_available: bool) {
        self.more_objects_available = more_objects_available;
    }

    pub fn count(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn position(&self) -> isize {
        self.position
    }

    pub fn move_to_position(&mut self, position: isize) -> bool {
        let count = self.objects.len() as isize;
        if position >= count {
            self.position = count;
            return false;
        }
        if position < 0 {
            self.position = -1;
            return false;
        }
        self.position = position;
        true
    }

    pub fn move_by(&mut self, offset: isize) -> bool {
        self.move_to_position(self.position + offset)
    }

    pub fn move_to_first(&mut self) -> bool {
        self.move_to_position(0)
    }

    pub fn move_to_last(&mut self) -> bool {
        self.move_to_position(self.objects.len() as isize - 1)
    }

    pub fn move_to_next(&mut self) -> bool {
        self.move_to_position(self.position + 1)
    }

    pub fn move_to_previous(&mut self) -> bool {
        self.move_to_position(self.position - 1)
    }

    pub fn is_before_first(&self) -> bool {
        self.objects.is_empty() || self.position == -1
    }

    pub fn is_after_last(&self) -> bool {
        self.objects.is_empty() || self.position == self.objects.len() as isize
    }

    /// Object at the current position
    pub fn graph_object(&self) -> Option<&GraphObject> {
        usize::try_from(self.position)
            .ok()
            .and_then(|index| self.objects.get(index))
    }

    pub fn objects(&self) -> &[GraphObject] {
        &self.objects
    }

    pub fn iter(&self) -> impl Iterator<Item = &GraphObject> {
        self.objects.iter()
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
