//! # tagflow-sax
//!
//! Streaming tag/text tokenizer for tagflow.
//!
//! This crate provides:
//! - The four event kinds (open tag, close tag, text, end)
//! - The listener contract (`TagListener`) and push sources (`EventSource`)
//! - `TagParser`, an incremental tokenizer safe across chunk boundaries

pub mod error;
pub mod escape;
pub mod event;
pub mod parser;

pub use error::SaxError;
pub use escape::unescape;
pub use event::{deliver, EventSource, OpenTag, TagEvent, TagListener};
pub use parser::{ParserConfig, TagParser, DEFAULT_MAX_TOKEN_LEN};
