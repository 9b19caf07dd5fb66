//! Per-event-type broadcast hub.
//!
//! An [`EventListenerSet`] delivers each emitted value to its listeners in
//! registration order. Values emitted while no listener is registered are
//! kept in a bounded backlog and replayed, oldest first, as soon as a
//! listener is added.
//!
//! The set is owned by a single execution context. All methods take `&self`
//! so a handler holding a reference to its own set may add or remove
//! listeners, or emit again, while it runs. Each emit pass iterates over a
//! snapshot of the entries taken before the first handler is called.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::rc::Rc;

use super::listener::{ListenerEntry, ListenerId};
use crate::dispatch::TickQueue;

/// Configuration for an [`EventListenerSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerSetConfig {
    /// Maximum number of backlogged values. 0 disables the backlog.
    pub max_queue_length: usize,
    /// Merge pending payload-less (zero-sized) values into one.
    pub coalesce: bool,
    /// Panic on invariant violations instead of logging and recovering.
    pub strict: bool,
}

impl Default for ListenerSetConfig {
    fn default() -> Self {
        Self {
            max_queue_length: 128,
            coalesce: false,
            strict: cfg!(debug_assertions),
        }
    }
}

impl ListenerSetConfig {
    /// Create a ListenerSetConfig from application config values.
    pub fn from_config(queue_length: usize, coalesce: bool) -> Self {
        Self {
            max_queue_length: queue_length,
            coalesce,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_queue_length(mut self, max_queue_length: usize) -> Self {
        self.max_queue_length = max_queue_length;
        self
    }

    #[must_use]
    pub fn with_coalesce(mut self, coalesce: bool) -> Self {
        self.coalesce = coalesce;
        self
    }

    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Ordered listeners for one kind of event, with a backlog for early emits.
pub struct EventListenerSet<T> {
    listeners: RefCell<Vec<Rc<ListenerEntry<T>>>>,
    queue: RefCell<VecDeque<T>>,
    config: ListenerSetConfig,
    ticks: TickQueue,
    next_id: Cell<u64>,
    dropped: Cell<u64>,
}

impl<T> EventListenerSet<T> {
    /// Create an empty set with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ListenerSetConfig::default())
    }

    /// Create an empty set with its own tick queue.
    pub fn with_config(config: ListenerSetConfig) -> Self {
        Self::with_ticks(config, TickQueue::new())
    }

    /// Create an empty set that defers recursive deliveries onto `ticks`.
    ///
    /// Sets living on the same execution context can share one tick queue;
    /// deferred work then runs once the outermost emit on any of them returns.
    pub fn with_ticks(config: ListenerSetConfig, ticks: TickQueue) -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
            queue: RefCell::new(VecDeque::new()),
            config,
            ticks,
            next_id: Cell::new(1),
            dropped: Cell::new(0),
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// True if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    /// Number of values waiting in the backlog.
    pub fn queued(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Number of values dropped because the backlog was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.get()
    }

    pub fn config(&self) -> &ListenerSetConfig {
        &self.config
    }

    pub fn ticks(&self) -> &TickQueue {
        &self.ticks
    }

    /// Remove every listener. The backlog is left untouched.
    pub fn remove_all_listeners(&self) {
        let removed = mem::take(&mut *self.listeners.borrow_mut());
        tracing::trace!(count = removed.len(), "Removed all listeners");
    }

    /// Remove the listener registered under `id`.
    ///
    /// Returns true if it was still registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        match listeners.iter().position(|entry| entry.id() == id) {
            Some(idx) => {
                listeners.remove(idx);
                true
            }
            None => false,
        }
    }

    fn next_listener_id(&self) -> ListenerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        ListenerId(id)
    }

    fn queue_value(&self, value: T) {
        let max = self.config.max_queue_length;
        if max == 0 {
            return;
        }

        let mut queue = self.queue.borrow_mut();

        // Only values without payload can be merged without a merge function.
        if self.config.coalesce && !queue.is_empty() && mem::size_of::<T>() == 0 {
            return;
        }

        if queue.len() >= max {
            let queued = queue.len();
            drop(queue);
            self.dropped.set(self.dropped.get() + 1);
            tracing::warn!(
                queued,
                max,
                dropped = self.dropped.get(),
                "Event queue exceeded capacity, dropping event"
            );
            assert!(
                !self.config.strict,
                "event queue exceeded capacity (#{queued} max #{max})"
            );
            return;
        }

        queue.push_back(value);
    }
}

impl<T: 'static> EventListenerSet<T> {
    /// Register a listener that receives every emitted value.
    pub fn add(&self, handler: impl FnMut(&T) + 'static) -> ListenerId {
        self.add_with(handler, false)
    }

    /// Register a listener that is removed after its first value.
    pub fn add_once(&self, handler: impl FnMut(&T) + 'static) -> ListenerId {
        self.add_with(handler, true)
    }

    /// Register a listener and replay the backlog through the listener set.
    ///
    /// Replay stops early once the set runs out of listeners, e.g. when the
    /// new listener is a once listener and consumed the first value.
    pub fn add_with(&self, handler: impl FnMut(&T) + 'static, once: bool) -> ListenerId {
        let id = self.next_listener_id();
        self.listeners
            .borrow_mut()
            .push(Rc::new(ListenerEntry::new(id, Box::new(handler), once)));

        loop {
            if self.is_empty() {
                break;
            }
            let next = self.queue.borrow_mut().pop_front();
            let Some(value) = next else { break };
            self.emit(value);
        }

        id
    }

    /// Deliver `value` to every listener, or backlog it if there are none.
    pub fn emit(&self, value: T) {
        if self.is_empty() {
            self.queue_value(value);
            return;
        }

        let _tick = self.ticks.enter();
        let snapshot: Vec<Rc<ListenerEntry<T>>> = self.listeners.borrow().clone();
        let value = Rc::new(value);

        if snapshot.iter().any(|entry| entry.is_once()) {
            self.emit_with_once(&snapshot, &value);
        } else {
            self.emit_plain(&snapshot, &value);
        }
    }

    fn emit_plain(&self, snapshot: &[Rc<ListenerEntry<T>>], value: &Rc<T>) {
        for entry in snapshot {
            if entry.is_emitting() {
                tracing::warn!(listener = %entry.id(), "Recursion in event handler, listener skipped");
                assert!(!self.config.strict, "recursion in event handler {}", entry.id());
                continue;
            }
            entry.invoke(value);
        }
    }

    fn emit_with_once(&self, snapshot: &[Rc<ListenerEntry<T>>], value: &Rc<T>) {
        for entry in snapshot {
            if entry.is_emitting() {
                if entry.is_once() {
                    tracing::error!(
                        listener = %entry.id(),
                        "Once event handler called again while emitting"
                    );
                    assert!(
                        !self.config.strict,
                        "once event handler {} called again while emitting",
                        entry.id()
                    );
                } else {
                    tracing::warn!(
                        listener = %entry.id(),
                        "Recursive event handler, deferring to next tick"
                    );
                    let entry = Rc::clone(entry);
                    let value = Rc::clone(value);
                    self.ticks.defer(move || {
                        entry.invoke(&value);
                    });
                }
            } else if entry.is_once() && entry.has_fired() {
                // Fired in a nested pass and already removed there.
                continue;
            } else {
                entry.invoke(value);
            }

            if entry.is_once() && !self.remove(entry.id()) {
                tracing::warn!(
                    listener = %entry.id(),
                    "Listener race, once-entry already removed"
                );
            }
        }
    }
}

impl<T> Default for EventListenerSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Display for EventListenerSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.len();
        let queued = self.queued();

        f.write_str("<EventListenerSet:")?;
        match (listeners, queued) {
            (0, 0) => f.write_str(" empty")?,
            (0, q) => write!(f, " queueing(#{q})")?,
            (l, 0) => write!(f, " listening(#{l})")?,
            (l, q) => write!(f, " queued-events=#{q} listeners=#{l}")?,
        }
        f.write_str(">")
    }
}

impl<T> fmt::Debug for EventListenerSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListenerSet")
            .field("listeners", &self.len())
            .field("queued", &self.queued())
            .field("dropped", &self.dropped())
            .field("config", &self.config)
            .finish()
    }
}
