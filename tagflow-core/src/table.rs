//! Transition tables.
//!
//! A table maps a state name to the actions legal in that state. Each action
//! resolves to a [`TransitionEntry`]:
//!
//! - [`TransitionEntry::Bare`] moves the machine to the named state.
//! - [`TransitionEntry::Handled`] runs a handler; the handler's return value
//!   is the next state, whatever the nominal target says.
//!
//! The row keyed by [`WILDCARD`] supplies actions for every state that has no
//! entry of its own for them. A state literally named `"*"` is that row.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Reserved state key holding wildcard actions.
pub const WILDCARD: &str = "*";

/// Side-effecting transition function.
///
/// Receives the owning machine's context and the action arguments, returns
/// the name of the next state.
pub type Handler<D, A> = Arc<dyn Fn(&mut HandlerContext<'_, D>, &[A]) -> String + Send + Sync>;

/// View of the dispatching machine handed to a handler.
pub struct HandlerContext<'a, D> {
    pub(crate) state: &'a str,
    pub(crate) action: &'a str,
    pub(crate) target: &'a str,
    pub(crate) data: &'a mut D,
}

impl<'a, D> HandlerContext<'a, D> {
    /// State the machine is in while the handler runs.
    pub fn state(&self) -> &str {
        self.state
    }

    /// Action being dispatched.
    pub fn action(&self) -> &str {
        self.action
    }

    /// Nominal next state declared alongside the handler.
    pub fn target(&self) -> &str {
        self.target
    }

    pub fn data(&self) -> &D {
        self.data
    }

    pub fn data_mut(&mut self) -> &mut D {
        self.data
    }
}

/// Outcome of an action in a given state.
pub enum TransitionEntry<D, A> {
    /// Unconditional move to the named state.
    Bare(String),
    /// Handler whose return value becomes the next state.
    Handled { target: String, handler: Handler<D, A> },
}

impl<D, A> TransitionEntry<D, A> {
    pub fn bare(next: impl Into<String>) -> Self {
        TransitionEntry::Bare(next.into())
    }

    pub fn handled<F>(target: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut HandlerContext<'_, D>, &[A]) -> String + Send + Sync + 'static,
    {
        TransitionEntry::Handled {
            target: target.into(),
            handler: Arc::new(handler),
        }
    }

    /// Nominal next state. For handled entries this is informational only.
    pub fn target(&self) -> &str {
        match self {
            TransitionEntry::Bare(next) => next,
            TransitionEntry::Handled { target, .. } => target,
        }
    }

    pub fn has_handler(&self) -> bool {
        matches!(self, TransitionEntry::Handled { .. })
    }
}

impl<D, A> Clone for TransitionEntry<D, A> {
    fn clone(&self) -> Self {
        match self {
            TransitionEntry::Bare(next) => TransitionEntry::Bare(next.clone()),
            TransitionEntry::Handled { target, handler } => TransitionEntry::Handled {
                target: target.clone(),
                handler: Arc::clone(handler),
            },
        }
    }
}

impl<D, A> fmt::Debug for TransitionEntry<D, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionEntry::Bare(next) => f.debug_tuple("Bare").field(next).finish(),
            TransitionEntry::Handled { target, .. } => f
                .debug_struct("Handled")
                .field("target", target)
                .field("handler", &"<fn>")
                .finish(),
        }
    }
}

/// Declarative (state, action) -> entry mapping.
///
/// Tables are immutable once shared; machines hold them behind an `Arc`.
pub struct TransitionTable<D, A> {
    rows: HashMap<String, HashMap<String, TransitionEntry<D, A>>>,
}

impl<D, A> TransitionTable<D, A> {
    pub fn new() -> Self {
        Self {
            rows: HashMap::new(),
        }
    }

    /// Inserts an entry, returning the one it replaced.
    pub fn insert(
        &mut self,
        state: impl Into<String>,
        action: impl Into<String>,
        entry: TransitionEntry<D, A>,
    ) -> Option<TransitionEntry<D, A>> {
        self.rows
            .entry(state.into())
            .or_default()
            .insert(action.into(), entry)
    }

    pub fn with_entry(
        mut self,
        state: impl Into<String>,
        action: impl Into<String>,
        entry: TransitionEntry<D, A>,
    ) -> Self {
        self.insert(state, action, entry);
        self
    }

    pub fn with_bare(
        self,
        state: impl Into<String>,
        action: impl Into<String>,
        next: impl Into<String>,
    ) -> Self {
        self.with_entry(state, action, TransitionEntry::bare(next))
    }

    pub fn with_handler<F>(
        self,
        state: impl Into<String>,
        action: impl Into<String>,
        target: impl Into<String>,
        handler: F,
    ) -> Self
    where
        F: Fn(&mut HandlerContext<'_, D>, &[A]) -> String + Send + Sync + 'static,
    {
        self.with_entry(state, action, TransitionEntry::handled(target, handler))
    }

    pub fn with_wildcard(self, action: impl Into<String>, entry: TransitionEntry<D, A>) -> Self {
        self.with_entry(WILDCARD, action, entry)
    }

    /// Resolves an action in a state, falling back to the wildcard row.
    pub fn resolve(&self, state: &str, action: &str) -> Option<&TransitionEntry<D, A>> {
        self.resolve_with_origin(state, action).map(|(entry, _)| entry)
    }

    /// Like [`resolve`](Self::resolve), also reporting whether the wildcard
    /// row supplied the entry.
    pub(crate) fn resolve_with_origin(
        &self,
        state: &str,
        action: &str,
    ) -> Option<(&TransitionEntry<D, A>, bool)> {
        if let Some(entry) = self.lookup(state, action) {
            return Some((entry, false));
        }
        self.lookup(WILDCARD, action).map(|entry| (entry, true))
    }

    fn lookup(&self, state: &str, action: &str) -> Option<&TransitionEntry<D, A>> {
        self.rows.get(state)?.get(action)
    }

    /// Returns true if the table has a row for `state`.
    pub fn has_state(&self, state: &str) -> bool {
        self.rows.contains_key(state)
    }

    /// Returns all state names with a row, excluding the wildcard row, sorted.
    pub fn states(&self) -> Vec<&str> {
        let mut states: Vec<&str> = self
            .rows
            .keys()
            .map(String::as_str)
            .filter(|s| *s != WILDCARD)
            .collect();
        states.sort_unstable();
        states
    }

    /// Returns the actions declared directly on `state`, sorted.
    pub fn actions_from(&self, state: &str) -> Vec<&str> {
        let mut actions: Vec<&str> = self
            .rows
            .get(state)
            .map(|row| row.keys().map(String::as_str).collect())
            .unwrap_or_default();
        actions.sort_unstable();
        actions
    }

    /// Returns the actions of the wildcard row, sorted.
    pub fn wildcard_actions(&self) -> Vec<&str> {
        self.actions_from(WILDCARD)
    }

    /// Total number of entries, wildcard row included.
    pub fn len(&self) -> usize {
        self.rows.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<D, A> Default for TransitionTable<D, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D, A> Clone for TransitionTable<D, A> {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows.clone(),
        }
    }
}

impl<D, A> fmt::Debug for TransitionTable<D, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionTable")
            .field("rows", &self.rows)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> TransitionTable<(), String> {
        TransitionTable::new()
            .with_bare("idle", "start", "running")
            .with_handler("running", "tick", "running", |ctx, _| {
                ctx.target().to_string()
            })
            .with_bare("running", "stop", "idle")
            .with_wildcard("reset", TransitionEntry::bare("idle"))
    }

    #[test]
    fn test_resolve_direct_entry() {
        let table = sample_table();
        let entry = table.resolve("idle", "start").unwrap();
        assert_eq!(entry.target(), "running");
        assert!(!entry.has_handler());

        let entry = table.resolve("running", "tick").unwrap();
        assert!(entry.has_handler());
    }

    #[test]
    fn test_resolve_falls_back_to_wildcard() {
        let table = sample_table();
        let (entry, wildcard) = table.resolve_with_origin("running", "reset").unwrap();
        assert_eq!(entry.target(), "idle");
        assert!(wildcard);

        // States unknown to the table still see wildcard actions
        assert!(table.resolve("nowhere", "reset").is_some());
    }

    #[test]
    fn test_direct_entry_shadows_wildcard() {
        let table = sample_table().with_bare("idle", "reset", "running");
        let (entry, wildcard) = table.resolve_with_origin("idle", "reset").unwrap();
        assert_eq!(entry.target(), "running");
        assert!(!wildcard);
    }

    #[test]
    fn test_resolve_missing() {
        let table = sample_table();
        assert!(table.resolve("idle", "stop").is_none());
        assert!(table.resolve("nowhere", "start").is_none());
    }

    #[test]
    fn test_insert_replaces() {
        let mut table: TransitionTable<(), ()> = TransitionTable::new();
        assert!(table.insert("a", "go", TransitionEntry::bare("b")).is_none());
        let old = table.insert("a", "go", TransitionEntry::bare("c")).unwrap();
        assert_eq!(old.target(), "b");
        assert_eq!(table.resolve("a", "go").unwrap().target(), "c");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_introspection() {
        let table = sample_table();
        assert_eq!(table.states(), vec!["idle", "running"]);
        assert_eq!(table.actions_from("running"), vec!["stop", "tick"]);
        assert_eq!(table.wildcard_actions(), vec!["reset"]);
        assert!(table.actions_from("nowhere").is_empty());
        assert!(table.has_state("idle"));
        assert!(table.has_state(WILDCARD));
        assert!(!table.has_state("nowhere"));
        assert_eq!(table.len(), 4);
        assert!(!table.is_empty());
        assert!(TransitionTable::<(), ()>::default().is_empty());
    }

    #[test]
    fn test_entry_debug_hides_handler() {
        let entry: TransitionEntry<(), ()> = TransitionEntry::handled("x", |_, _| "y".to_string());
        let dbg = format!("{:?}", entry);
        assert!(dbg.contains("Handled"));
        assert!(dbg.contains("\"x\""));
    }
}
