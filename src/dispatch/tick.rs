//! "Defer to next tick" for a single execution context.
//!
//! A [`TickQueue`] collects jobs while some caller holds a [`TickGuard`] from
//! [`TickQueue::enter`]. When the outermost guard is dropped, the call stack
//! that produced the jobs has unwound and the pending jobs run in FIFO order.
//! Jobs deferred while draining are picked up by the same drain.
//!
//! The queue is `!Send`: it belongs to the context that created it.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// A deferred unit of work bound to the current context.
pub type LocalJob = Box<dyn FnOnce()>;

/// Single-context FIFO of deferred jobs.
#[derive(Clone, Default)]
pub struct TickQueue {
    inner: Rc<TickInner>,
}

#[derive(Default)]
struct TickInner {
    pending: RefCell<VecDeque<LocalJob>>,
    depth: Cell<usize>,
    draining: Cell<bool>,
}

impl TickQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defer `job` until the current scope unwinds.
    ///
    /// Outside of any [`enter`](Self::enter) scope the job waits for the next
    /// scope to close or an explicit [`run_pending`](Self::run_pending).
    pub fn defer(&self, job: impl FnOnce() + 'static) {
        self.inner.pending.borrow_mut().push_back(Box::new(job));
    }

    /// Open a scope. Pending jobs run when the outermost scope closes.
    pub fn enter(&self) -> TickGuard {
        self.inner.depth.set(self.inner.depth.get() + 1);
        TickGuard {
            queue: self.clone(),
        }
    }

    /// Number of jobs waiting for the next tick.
    pub fn pending(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    /// Whether a scope is currently open.
    pub fn is_active(&self) -> bool {
        self.inner.depth.get() > 0
    }

    /// Run every pending job, including jobs deferred by those jobs.
    ///
    /// Returns the number of jobs run. Reentrant calls return 0 and leave the
    /// work to the drain already in progress.
    pub fn run_pending(&self) -> usize {
        if self.inner.draining.replace(true) {
            return 0;
        }
        let _draining = Draining(&self.inner.draining);

        let mut ran = 0;
        loop {
            // Release the borrow before running; the job may defer more work.
            let next = self.inner.pending.borrow_mut().pop_front();
            let Some(job) = next else { break };
            job();
            ran += 1;
        }
        ran
    }
}

/// Clears the draining flag on exit, including when a job panics.
struct Draining<'a>(&'a Cell<bool>);

impl Drop for Draining<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl fmt::Debug for TickQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickQueue")
            .field("pending", &self.pending())
            .field("depth", &self.inner.depth.get())
            .finish()
    }
}

/// Scope handle returned by [`TickQueue::enter`].
#[must_use = "pending jobs run when the guard is dropped"]
pub struct TickGuard {
    queue: TickQueue,
}

impl Drop for TickGuard {
    fn drop(&mut self) {
        let inner = &self.queue.inner;
        let depth = inner.depth.get().saturating_sub(1);
        inner.depth.set(depth);

        if depth == 0 && !std::thread::panicking() {
            self.queue.run_pending();
        }
    }
}
