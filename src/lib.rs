//! Weir: event listener sets and batched sink targets.
//!
//! Weir is the notification and flow-control core for stream-style I/O:
//! producers emit state changes to listeners and push batched payloads into
//! consumers, getting back delivered counts that drive backpressure.
//!
//! # Architecture
//!
//! - **Listener sets**: ordered delivery, once-listeners, bounded backlog for
//!   values emitted before anyone listens, reentrancy protection
//! - **Sink targets**: ordered "chunks of chunks" fed into a single-value
//!   sink, inline or on a dedicated serial worker with a per-call cap
//! - **Explicit scheduling**: serial, concurrent and next-tick queues are
//!   created and passed by the caller
//!
//! # Modules
//!
//! - [`config`]: CLI and environment configuration
//! - [`dispatch`]: Serial, concurrent and next-tick execution contexts
//! - [`events`]: Event listener sets
//! - [`observability`]: Tracing setup
//! - [`sink`]: Sink capability and sync/async sink targets

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions, // events::listener::ListenerEntry is fine
    clippy::must_use_candidate,      // Not all functions need #[must_use]
    clippy::missing_errors_doc,      // Error docs can be verbose
    clippy::missing_panics_doc,      // Panic docs can be verbose
    clippy::new_without_default      // Default is implemented where it matters
)]

pub mod config;
pub mod dispatch;
pub mod events;
pub mod observability;
pub mod sink;

pub use dispatch::{ConcurrentQueue, DispatchError, DispatchQueue, QueueRef, SerialQueue, TickQueue};
pub use events::{EventListenerSet, ListenerId, ListenerSetConfig};
pub use sink::{AsyncSinkConfig, AsyncSinkTarget, Sink, SyncSinkTarget, WriteError};
