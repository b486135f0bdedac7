//! # tagflow-stream
//!
//! Drives a tagflow machine from a stream of tag/text events.
//!
//! Open tags dispatch `o:<name>`, close tags `c:<name>`, text `t` and end
//! of input `e`. See [`action`] for the argument each action carries.

pub mod action;
pub mod adapter;
pub mod error;

pub use action::{
    close_action, open_action, translate, TagArg, CLOSE_PREFIX, END_ACTION, OPEN_PREFIX,
    TEXT_ACTION,
};
pub use adapter::{StreamAdapter, Subscription};
pub use error::StreamError;
