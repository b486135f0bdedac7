//! Stream adapter.
//!
//! A [`StreamAdapter`] owns one machine and one event source. Writes are
//! forwarded to the source with the adapter's binding as listener; every
//! event the source reports is translated and dispatched before the source
//! moves on to the next one.

use crate::action::{translate, TagArg};
use crate::error::StreamError;
use std::fmt;
use std::sync::Arc;
use tagflow_core::{Machine, TransitionRecord, TransitionTable};
use tagflow_sax::{EventSource, OpenTag, ParserConfig, TagEvent, TagListener, TagParser};

/// Lifecycle of the adapter's subscription to its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscription {
    Active,
    /// The end event was delivered.
    Ended,
    /// Unsubscribed through [`StreamAdapter::detach`].
    Detached,
}

type Observer = Box<dyn FnMut(&TransitionRecord)>;

/// The listener side of the subscription.
struct Binding<D> {
    machine: Machine<D, TagArg>,
    subscription: Subscription,
    observer: Option<Observer>,
}

impl<D> Binding<D> {
    fn dispatch(&mut self, event: TagEvent) -> Result<(), StreamError> {
        let (action, args) = translate(event);
        let record = self.machine.dispatch(&action, &args)?;
        if let Some(observer) = self.observer.as_mut() {
            observer(&record);
        }
        Ok(())
    }
}

impl<D> TagListener for Binding<D> {
    type Error = StreamError;

    fn open_tag(&mut self, tag: OpenTag) -> Result<(), StreamError> {
        self.dispatch(TagEvent::OpenTag(tag))
    }

    fn close_tag(&mut self, name: String) -> Result<(), StreamError> {
        self.dispatch(TagEvent::CloseTag(name))
    }

    fn text(&mut self, data: String) -> Result<(), StreamError> {
        self.dispatch(TagEvent::Text(data))
    }

    fn end(&mut self) -> Result<(), StreamError> {
        self.subscription = Subscription::Ended;
        self.dispatch(TagEvent::End)
    }
}

/// Drives a [`Machine`] from a tag/text event source.
pub struct StreamAdapter<D, S = TagParser> {
    source: S,
    binding: Binding<D>,
}

impl<D, S: EventSource> StreamAdapter<D, S> {
    /// Subscribes a new machine to `source`.
    pub fn new(
        source: S,
        table: Arc<TransitionTable<D, TagArg>>,
        initial: impl Into<String>,
        data: D,
    ) -> Self {
        Self {
            source,
            binding: Binding {
                machine: Machine::new(table, initial, data),
                subscription: Subscription::Active,
                observer: None,
            },
        }
    }

    /// Registers a callback run after every successful transition.
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&TransitionRecord) + 'static,
    {
        self.binding.observer = Some(Box::new(observer));
        self
    }

    /// Forwards a chunk of input to the event source.
    ///
    /// Events completed by the chunk are dispatched in order. The first
    /// rejected action aborts the call. The rejected event is consumed;
    /// events after it stay with the source and are delivered by the next
    /// `write` or `end`.
    pub fn write(&mut self, chunk: impl AsRef<[u8]>) -> Result<(), StreamError> {
        self.ensure_active()?;
        self.source.write(chunk.as_ref(), &mut self.binding)
    }

    /// Signals end of input to the event source, which delivers any
    /// buffered events and then the `e` action. The subscription is closed
    /// afterwards, even if one of those actions is rejected.
    pub fn end(&mut self) -> Result<(), StreamError> {
        self.ensure_active()?;
        self.binding.subscription = Subscription::Ended;
        self.source.end(&mut self.binding)
    }

    /// Unsubscribes from the source. Later `write`/`end` calls fail with
    /// [`StreamError::Closed`].
    pub fn detach(&mut self) {
        if self.binding.subscription == Subscription::Active {
            tracing::debug!("detaching in state '{}'", self.binding.machine.state());
            self.binding.subscription = Subscription::Detached;
        }
    }

    fn ensure_active(&self) -> Result<(), StreamError> {
        match self.binding.subscription {
            Subscription::Active => Ok(()),
            _ => Err(StreamError::Closed),
        }
    }
}

impl<D, S> StreamAdapter<D, S> {
    pub fn subscription(&self) -> Subscription {
        self.binding.subscription
    }

    pub fn is_active(&self) -> bool {
        self.binding.subscription == Subscription::Active
    }

    pub fn machine(&self) -> &Machine<D, TagArg> {
        &self.binding.machine
    }

    pub fn state(&self) -> &str {
        self.binding.machine.state()
    }

    pub fn data(&self) -> &D {
        self.binding.machine.data()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Tears the adapter down, returning the machine.
    pub fn into_machine(self) -> Machine<D, TagArg> {
        self.binding.machine
    }
}

impl<D> StreamAdapter<D, TagParser> {
    /// Creates an adapter over a default [`TagParser`].
    pub fn with_parser(
        table: Arc<TransitionTable<D, TagArg>>,
        initial: impl Into<String>,
        data: D,
    ) -> Self {
        Self::new(TagParser::new(), table, initial, data)
    }

    pub fn with_parser_config(
        config: ParserConfig,
        table: Arc<TransitionTable<D, TagArg>>,
        initial: impl Into<String>,
        data: D,
    ) -> Self {
        Self::new(TagParser::with_config(config), table, initial, data)
    }
}

impl<D: fmt::Debug, S: fmt::Debug> fmt::Debug for StreamAdapter<D, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamAdapter")
            .field("source", &self.source)
            .field("machine", &self.binding.machine)
            .field("subscription", &self.binding.subscription)
            .finish()
    }
}
