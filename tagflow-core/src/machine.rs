//! Machine instances and the dispatch algorithm.

use crate::error::CoreError;
use crate::table::{HandlerContext, TransitionEntry, TransitionTable};
use std::fmt;
use std::sync::Arc;

/// Result of a successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRecord {
    pub from: String,
    pub action: String,
    pub to: String,
    /// A handler ran and chose `to`.
    pub handled: bool,
    /// The entry came from the wildcard row.
    pub wildcard: bool,
}

/// A single state machine instance.
///
/// Holds a shared, immutable transition table, the current state name and
/// an opaque state-data value that only handlers look at. The instance is
/// changed exclusively through [`dispatch`](Self::dispatch).
///
/// Handlers get a [`HandlerContext`], not the machine, so a handler cannot
/// dispatch on the instance that is running it. Instances are not
/// synchronized; callers sharing one across threads must lock around it.
pub struct Machine<D, A> {
    table: Arc<TransitionTable<D, A>>,
    state: String,
    data: D,
}

impl<D, A> Machine<D, A> {
    pub fn new(table: Arc<TransitionTable<D, A>>, initial: impl Into<String>, data: D) -> Self {
        Self {
            table,
            state: initial.into(),
            data,
        }
    }

    /// Applies an action to the machine.
    ///
    /// The entry is resolved against the current state first and the
    /// wildcard row second. A bare entry moves to its state. A handled entry
    /// runs its handler once with `args`; the returned name becomes the new
    /// state even if it differs from the entry's nominal target, and it is
    /// not checked against the table.
    ///
    /// Fails with [`CoreError::BadTransition`] when neither row has the
    /// action. The machine is left untouched in that case.
    pub fn dispatch(&mut self, action: &str, args: &[A]) -> Result<TransitionRecord, CoreError> {
        let Some((entry, wildcard)) = self.table.resolve_with_origin(&self.state, action) else {
            tracing::warn!("no transition for '{}' in state '{}'", action, self.state);
            return Err(CoreError::BadTransition {
                state: self.state.clone(),
                action: action.to_string(),
            });
        };

        let (next, handled) = match entry {
            TransitionEntry::Bare(next) => (next.clone(), false),
            TransitionEntry::Handled { target, handler } => {
                let mut ctx = HandlerContext {
                    state: &self.state,
                    action,
                    target,
                    data: &mut self.data,
                };
                ((handler.as_ref())(&mut ctx, args), true)
            }
        };

        tracing::debug!(
            "transition '{}' --{}--> '{}'{}",
            self.state,
            action,
            next,
            if wildcard { " (wildcard)" } else { "" }
        );

        let from = std::mem::replace(&mut self.state, next);
        Ok(TransitionRecord {
            from,
            action: action.to_string(),
            to: self.state.clone(),
            handled,
            wildcard,
        })
    }

    /// Returns true if `action` resolves in the current state.
    pub fn can_dispatch(&self, action: &str) -> bool {
        self.table.resolve(&self.state, action).is_some()
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn data(&self) -> &D {
        &self.data
    }

    pub fn table(&self) -> &Arc<TransitionTable<D, A>> {
        &self.table
    }

    /// Consumes the machine, returning its state data.
    pub fn into_data(self) -> D {
        self.data
    }

    /// Consumes the machine, returning its final state and state data.
    pub fn into_parts(self) -> (String, D) {
        (self.state, self.data)
    }
}

impl<D: fmt::Debug, A> fmt::Debug for Machine<D, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("state", &self.state)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}
