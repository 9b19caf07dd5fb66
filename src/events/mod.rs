//! Event broadcasting with backlog buffering.
//!
//! Provides:
//! - [`EventListenerSet`]: ordered listeners, once-semantics, backlog queue
//! - [`ListenerEntry`] and [`ListenerId`]: per-listener state and removal token
//! - [`ListenerSetConfig`]: queue bound, coalescing and strictness

pub mod listener;
pub mod set;

pub use listener::{ListenerEntry, ListenerId};
pub use set::{EventListenerSet, ListenerSetConfig};
