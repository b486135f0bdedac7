//! # tagflow-core
//!
//! Transition engine for tagflow.
//!
//! This crate provides:
//! - Transition tables with a wildcard fallback row
//! - Machine instances and the dispatch algorithm
//! - Table definition files (JSON/YAML) and a handler registry

pub mod definition;
pub mod error;
pub mod machine;
pub mod registry;
pub mod table;

pub use definition::{EntryDefinition, TableDefinition};
pub use error::CoreError;
pub use machine::{Machine, TransitionRecord};
pub use registry::HandlerRegistry;
pub use table::{Handler, HandlerContext, TransitionEntry, TransitionTable, WILDCARD};
