use serde::{Deserialize, Serialize};

/// Which graph objects the user picked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionStrategy {
    /// At most one object; selecting another replaces it
    Single(Option<String>),
    /// Any number of objects, in the order they were picked
    Multi(Vec<String>),
}

impl SelectionStrategy {
    pub fn single() -> Self {
        SelectionStrategy::Single(None)
    }

    pub fn multi() -> Self {
        SelectionStrategy::Multi(Vec::new())
    }

    pub fn is_selected(&self, id: &str) -> bool {
        match self {
            SelectionStrategy::Single(selected) => selected.as_deref() == Some(id),
            SelectionStrategy::Multi(selected) => selected.iter().any(|s| s == id),
        }
    }

    pub fn toggle_selection(&mut self, id: &str) {
        match self {
            SelectionStrategy::Single(selected) => {
                if selected.as_deref() == Some(id) {
                    *selected = None;
                } else {
                    *selected = Some(id.to_string());
                }
            }
            SelectionStrategy::Multi(selected) => {
                if let Some(index) = selected.iter().position(|s| s == id) {
                    selected.remove(index);
                } else {
                    selected.push(id.to_string());
                }
            }
        }
    }

    pub fn selected_ids(&self) -> Vec<&str> {
        match self {
            SelectionStrategy::Single(selected) => selected.as_deref().into_iter().collect(),
            SelectionStrategy::Multi(selected) => selected.iter().map(String::as_str).collect(),
        }
    }

    pub fn clear(&mut self) {
        match self {
            SelectionStrategy::Single(selected) => *selected = None,
            SelectionStrategy::Multi(selected) => selected.clear(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            SelectionStrategy::Single(selected) => selected.is_none(),
            SelectionStrategy::Multi(selected) => selected.is_empty(),
        }
    }

    /// Multi selection shows a checkbox on every row
    pub fn shows_checkbox_if_unselected(&self) -> bool {
        matches!(self, SelectionStrategy::Multi(_))
    }
}
