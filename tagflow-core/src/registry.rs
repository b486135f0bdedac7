//! Named handlers for table definitions.

use crate::table::{Handler, HandlerContext};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Maps handler names used in definition files to handler functions.
pub struct HandlerRegistry<D, A> {
    handlers: HashMap<String, Handler<D, A>>,
}

impl<D, A> HandlerRegistry<D, A> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers a handler under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&mut HandlerContext<'_, D>, &[A]) -> String + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
    }

    pub fn with<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut HandlerContext<'_, D>, &[A]) -> String + Send + Sync + 'static,
    {
        self.register(name, handler);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Handler<D, A>> {
        self.handlers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Returns registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<D, A> Default for HandlerRegistry<D, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D, A> fmt::Debug for HandlerRegistry<D, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}
