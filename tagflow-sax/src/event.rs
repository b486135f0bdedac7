//! Tag/text events and the listener contract.

use crate::error::SaxError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An opening tag.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OpenTag {
    pub name: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    /// Written as `<name/>`. A close event for the same name follows.
    #[serde(default)]
    pub self_closing: bool,
}

impl OpenTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// A single event produced by an event source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagEvent {
    OpenTag(OpenTag),
    CloseTag(String),
    Text(String),
    End,
}

/// Receiver of the four event kinds.
///
/// Each method is one callback slot. Returning an error stops delivery;
/// the error surfaces from the event source's `write`/`end` call.
pub trait TagListener {
    type Error: From<SaxError>;

    fn open_tag(&mut self, tag: OpenTag) -> Result<(), Self::Error>;

    fn close_tag(&mut self, name: String) -> Result<(), Self::Error>;

    fn text(&mut self, data: String) -> Result<(), Self::Error>;

    fn end(&mut self) -> Result<(), Self::Error>;
}

/// Routes an event to the matching listener slot.
pub fn deliver<L: TagListener>(event: TagEvent, listener: &mut L) -> Result<(), L::Error> {
    match event {
        TagEvent::OpenTag(tag) => listener.open_tag(tag),
        TagEvent::CloseTag(name) => listener.close_tag(name),
        TagEvent::Text(data) => listener.text(data),
        TagEvent::End => listener.end(),
    }
}

/// Push-style producer of tag events.
///
/// Implementations call back into `listener` zero or more times per
/// `write`, synchronously and in document order.
pub trait EventSource {
    fn write<L: TagListener>(&mut self, chunk: &[u8], listener: &mut L) -> Result<(), L::Error>;

    fn end<L: TagListener>(&mut self, listener: &mut L) -> Result<(), L::Error>;
}

/// Collects every event it receives.
impl TagListener for Vec<TagEvent> {
    type Error = SaxError;

    fn open_tag(&mut self, tag: OpenTag) -> Result<(), SaxError> {
        self.push(TagEvent::OpenTag(tag));
        Ok(())
    }

    fn close_tag(&mut self, name: String) -> Result<(), SaxError> {
        self.push(TagEvent::CloseTag(name));
        Ok(())
    }

    fn text(&mut self, data: String) -> Result<(), SaxError> {
        self.push(TagEvent::Text(data));
        Ok(())
    }

    fn end(&mut self) -> Result<(), SaxError> {
        self.push(TagEvent::End);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_tag_builder() {
        let tag = OpenTag::new("item").with_attribute("id", "7");
        assert_eq!(tag.name, "item");
        assert_eq!(tag.attribute("id"), Some("7"));
        assert_eq!(tag.attribute("missing"), None);
        assert!(!tag.self_closing);
    }

    #[test]
    fn test_open_tag_serialization() {
        let tag = OpenTag::new("item");
        let json = serde_json::to_value(&tag).unwrap();
        assert_eq!(json, serde_json::json!({"name": "item", "self_closing": false}));

        let tag = OpenTag::new("a").with_attribute("href", "/x");
        let json = serde_json::to_value(&tag).unwrap();
        assert_eq!(json["attributes"]["href"], "/x");
    }

    #[test]
    fn test_deliver_routes_to_slots() {
        let mut log: Vec<TagEvent> = Vec::new();
        deliver(TagEvent::OpenTag(OpenTag::new("a")), &mut log).unwrap();
        deliver(TagEvent::Text("hi".to_string()), &mut log).unwrap();
        deliver(TagEvent::CloseTag("a".to_string()), &mut log).unwrap();
        deliver(TagEvent::End, &mut log).unwrap();

        assert_eq!(
            log,
            vec![
                TagEvent::OpenTag(OpenTag::new("a")),
                TagEvent::Text("hi".to_string()),
                TagEvent::CloseTag("a".to_string()),
                TagEvent::End,
            ]
        );
    }
}
