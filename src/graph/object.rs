//! Loosely typed graph objects.
//!
//! A graph object is the JSON property map returned by the graph for a
//! friend, a place or any other entity. Only the `id` property is required.

use crate::env::graph::{ID_FIELD, NAME_FIELD, PICTURE_FIELD};
use crate::graph::types::GraphError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphObject {
    properties: Map<String, Value>,
}

impl GraphObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value, which must be an object
    pub fn from_value(value: Value) -> Result<Self, GraphError> {
        match value {
            Value::Object(properties) => Ok(Self { properties }),
            other => Err(GraphError::Decode(format!(
                "expected a JSON object, found {}",
                other
            ))),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_property(key, value);
        self
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// String property; non-string values read as absent
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    pub fn remove_property(&mut self, key: &str) -> Option<Value> {
        self.properties.remove(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.properties
    }

    /// The object's identity.
    ///
    /// A missing or non-string `id` is a hard failure.
    pub fn id(&self) -> Result<&str, GraphError> {
        self.property_str(ID_FIELD).ok_or(GraphError::MissingId)
    }

    pub fn name(&self) -> Option<&str> {
        self.property_str(NAME_FIELD)
    }

    /// Picture URL, given either as a plain string or as `{ "data": { "url": ... } }`
    pub fn picture_url(&self) -> Option<Url> {
        let raw = match self.property(PICTURE_FIELD)? {
            Value::String(url) => url.as_str(),
            Value::Object(picture) => picture
                .get("data")
                .and_then(|data| data.get("url"))
                .and_then(Value::as_str)?,
            _ => return None,
        };
        Url::parse(raw).ok()
    }

    /// Whether both objects carry the same id; objects without ids never match
    pub fn has_same_id(&self, other: &GraphObject) -> bool {
        match (self.id(), other.id()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Map<String, Value>> for GraphObject {
    fn from(properties: Map<String, Value>) -> Self {
        Self { properties }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_is_required() {
        let object = GraphObject::new().with_property("name", "Bob");
        assert!(matches!(object.id(), Err(GraphError::MissingId)));

        let numeric = GraphObject::new().with_property("id", 42);
        assert!(matches!(numeric.id(), Err(GraphError::MissingId)));

        let object = object.with_property("id", "42");
        assert_eq!(object.id().unwrap(), "42");
    }

    #[test]
    fn test_picture_url_shapes() {
        let plain = GraphObject::new().with_property("picture", "https://example.com/a.png");
        assert_eq!(
            plain.picture_url().unwrap().as_str(),
            "https://example.com/a.png"
        );

        let nested = GraphObject::from_value(json!({
            "id": "1",
            "picture": { "data": { "url": "https://example.com/b.png" } }
        }))
        .unwrap();
        assert_eq!(
            nested.picture_url().unwrap().as_str(),
            "https://example.com/b.png"
        );

        let broken = GraphObject::new().with_property("picture", "not a url");
        assert!(broken.picture_url().is_none());
    }

    #[test]
    fn test_same_id() {
        let a = GraphObject::new().with_property("id", "7").with_property("name", "A");
        let b = GraphObject::new().with_property("id", "7").with_property("name", "B");
        let anonymous = GraphObject::new();

        assert!(a.has_same_id(&b));
        assert!(!a.has_same_id(&anonymous));
        assert!(!anonymous.has_same_id(&anonymous));
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(GraphObject::from_value(json!([1, 2])).is_err());
    }
}
