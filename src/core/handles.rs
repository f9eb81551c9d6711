//! # Handles passed into hooks.
//!
//! - [`Reporter`]: lets `on_filled` and `first` hooks fail the queue through the
//!   same funnel as operation errors.
//! - [`Done`]: one-shot continuation of a `for_each` hook.

use std::fmt;
use std::sync::Arc;

use crate::error::{BoxError, QueueError};

/// Receiver of errors surfaced by hooks (implemented by the queue internals).
pub(crate) trait ErrorSink: Send + Sync + 'static {
    fn report(&self, err: QueueError);
}

/// Error funnel handed to hooks.
///
/// Reporting kills the queue exactly like an operation error: the dispatcher
/// halts, the error is logged and the `catch` hook runs. Once the queue is
/// terminal, further reports are dropped.
#[derive(Clone)]
pub struct Reporter {
    sink: Arc<dyn ErrorSink>,
}

impl Reporter {
    pub(crate) fn new(sink: Arc<dyn ErrorSink>) -> Self {
        Self { sink }
    }

    /// Fails the queue with `err` (wrapped as [`QueueError::Hook`]).
    pub fn report(&self, err: impl Into<BoxError>) {
        self.sink.report(QueueError::hook(err));
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter").finish_non_exhaustive()
    }
}

/// How a [`Done`] was resolved.
pub(crate) enum Resolution {
    Ok,
    Failed(BoxError),
    /// Dropped while the thread was unwinding from a panic.
    Abandoned,
}

type Resolve = Box<dyn FnOnce(Resolution) + Send + 'static>;

/// Continuation of a `for_each` hook.
///
/// Resolve it exactly once, possibly later from another task:
/// - [`Done::ok`] marks the task finished;
/// - [`Done::fail`] kills the queue with [`QueueError::Processing`].
///
/// Dropping an unresolved `Done` counts as [`Done::ok`], unless it is dropped
/// by a panic unwinding through its owner; that kills the queue.
#[must_use = "the task stays in flight until `Done` is resolved or dropped"]
pub struct Done {
    slot: Option<Resolve>,
}

impl Done {
    pub(crate) fn new(resolve: impl FnOnce(Resolution) + Send + 'static) -> Self {
        Self {
            slot: Some(Box::new(resolve)),
        }
    }

    /// Marks the task finished successfully.
    pub fn ok(mut self) {
        self.resolve(Resolution::Ok);
    }

    /// Fails the queue with a processing error.
    pub fn fail(mut self, err: impl Into<BoxError>) {
        self.resolve(Resolution::Failed(err.into()));
    }

    /// Resolves from a `Result`.
    pub fn finish<E: Into<BoxError>>(self, res: Result<(), E>) {
        match res {
            Ok(()) => self.ok(),
            Err(err) => self.fail(err),
        }
    }

    fn resolve(&mut self, how: Resolution) {
        if let Some(resolve) = self.slot.take() {
            resolve(how);
        }
    }
}

impl Drop for Done {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.resolve(Resolution::Abandoned);
        } else {
            self.resolve(Resolution::Ok);
        }
    }
}

impl fmt::Debug for Done {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Done")
            .field("resolved", &self.slot.is_none())
            .finish()
    }
}
