//! Listener entries and their removal tokens.

use std::cell::{Cell, RefCell};
use std::fmt;

/// Opaque token identifying a listener within one [`EventListenerSet`].
///
/// Returned by `add`; pass it to `remove` to unregister the listener.
///
/// [`EventListenerSet`]: super::EventListenerSet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) type Handler<T> = Box<dyn FnMut(&T)>;

/// A registered handler plus its delivery bookkeeping.
pub struct ListenerEntry<T> {
    id: ListenerId,
    once: bool,
    /// Active invocations of this entry's handler.
    emitting: Cell<usize>,
    /// Set after the first invocation of a once entry.
    fired: Cell<bool>,
    handler: RefCell<Handler<T>>,
}

impl<T> ListenerEntry<T> {
    pub(crate) fn new(id: ListenerId, handler: Handler<T>, once: bool) -> Self {
        Self {
            id,
            once,
            emitting: Cell::new(0),
            fired: Cell::new(false),
            handler: RefCell::new(handler),
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn is_once(&self) -> bool {
        self.once
    }

    /// Whether the handler is currently executing (possibly nested).
    pub fn is_emitting(&self) -> bool {
        self.emitting.get() > 0
    }

    /// Whether a once entry has already been invoked.
    pub fn has_fired(&self) -> bool {
        self.fired.get()
    }

    /// Invoke the handler with `value`.
    ///
    /// Returns false if the handler could not be borrowed, which only happens
    /// when it is already running further up the stack.
    pub(crate) fn invoke(&self, value: &T) -> bool {
        let _active = Emitting::enter(&self.emitting);
        let Ok(mut handler) = self.handler.try_borrow_mut() else {
            tracing::warn!(listener = %self.id, "Handler already running, invocation skipped");
            return false;
        };
        if self.once {
            self.fired.set(true);
        }
        (*handler)(value);
        true
    }
}

impl<T> fmt::Debug for ListenerEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerEntry")
            .field("id", &self.id)
            .field("once", &self.once)
            .field("emitting", &self.emitting.get())
            .finish_non_exhaustive()
    }
}

/// Keeps the reentrancy counter balanced even if the handler panics.
struct Emitting<'a>(&'a Cell<usize>);

impl<'a> Emitting<'a> {
    fn enter(counter: &'a Cell<usize>) -> Self {
        counter.set(counter.get() + 1);
        Self(counter)
    }
}

impl Drop for Emitting<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}
