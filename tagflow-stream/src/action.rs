//! Event to action translation.
//!
//! | Event | Action | Arguments |
//! |---|---|---|
//! | open tag | `o:<name>` | `[Tag(tag)]` |
//! | close tag | `c:<name>` | `[]` |
//! | text | `t` | `[Text(data)]` |
//! | end | `e` | `[]` |

use tagflow_sax::{OpenTag, TagEvent};

pub const OPEN_PREFIX: &str = "o:";
pub const CLOSE_PREFIX: &str = "c:";
pub const TEXT_ACTION: &str = "t";
pub const END_ACTION: &str = "e";

/// Argument passed to handlers of stream-driven machines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagArg {
    Tag(OpenTag),
    Text(String),
}

impl TagArg {
    pub fn as_tag(&self) -> Option<&OpenTag> {
        match self {
            TagArg::Tag(tag) => Some(tag),
            TagArg::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            TagArg::Text(data) => Some(data),
            TagArg::Tag(_) => None,
        }
    }
}

pub fn open_action(name: &str) -> String {
    format!("{}{}", OPEN_PREFIX, name)
}

pub fn close_action(name: &str) -> String {
    format!("{}{}", CLOSE_PREFIX, name)
}

/// Maps an event to the action name and arguments dispatched for it.
pub fn translate(event: TagEvent) -> (String, Vec<TagArg>) {
    match event {
        TagEvent::OpenTag(tag) => (open_action(&tag.name), vec![TagArg::Tag(tag)]),
        TagEvent::CloseTag(name) => (close_action(&name), Vec::new()),
        TagEvent::Text(data) => (TEXT_ACTION.to_string(), vec![TagArg::Text(data)]),
        TagEvent::End => (END_ACTION.to_string(), Vec::new()),
    }
}
