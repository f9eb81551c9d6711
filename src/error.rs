//! Error types used by the queue and its collaborators.
//!
//! [`QueueError`] covers both synchronous misuse (returned from
//! [`Queue::push`](crate::Queue::push) and [`Queue::start`](crate::Queue::start))
//! and asynchronous failures that terminate the queue through its single error
//! funnel (operation errors, per-result processing errors, hook-reported errors).
//!
//! The type provides [`QueueError::as_label`] for logs and
//! [`QueueError::is_misuse`] to tell caller mistakes apart from task failures.

use thiserror::Error;

/// Boxed error accepted from user operations and hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// # Errors produced by the queue.
///
/// `Filled` and `Killed` are returned synchronously to the caller.
/// `Operation`, `Processing` and `Hook` are never returned; they are delivered
/// to the `catch` hook and the [`Logger`](crate::Logger) and kill the queue.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum QueueError {
    /// A task was pushed after the producer declared the queue filled.
    #[error("queue is filled; no further tasks are accepted")]
    Filled,

    /// A task was pushed (or the queue started) after the queue terminated.
    #[error("queue is killed; admission rejected")]
    Killed,

    /// The per-task operation failed (or panicked).
    #[error("operation failed: {source}")]
    Operation {
        /// Error returned by the operation.
        #[source]
        source: BoxError,
    },

    /// The `for_each` hook resolved its continuation with an error.
    #[error("processing failed: {source}")]
    Processing {
        /// Error passed to [`Done::fail`](crate::Done::fail).
        #[source]
        source: BoxError,
    },

    /// A hook surfaced an error through its [`Reporter`](crate::Reporter).
    #[error("hook reported failure: {source}")]
    Hook {
        /// Error passed to [`Reporter::report`](crate::Reporter::report).
        #[source]
        source: BoxError,
    },
}

impl QueueError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use taskfill::QueueError;
    ///
    /// assert_eq!(QueueError::Filled.as_label(), "queue_filled");
    /// let err = QueueError::Operation { source: "boom".into() };
    /// assert_eq!(err.as_label(), "operation_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            QueueError::Filled => "queue_filled",
            QueueError::Killed => "queue_killed",
            QueueError::Operation { .. } => "operation_failed",
            QueueError::Processing { .. } => "processing_failed",
            QueueError::Hook { .. } => "hook_failed",
        }
    }

    /// True for errors caused by calling the queue at the wrong time.
    pub fn is_misuse(&self) -> bool {
        matches!(self, QueueError::Filled | QueueError::Killed)
    }

    pub(crate) fn operation(source: impl Into<BoxError>) -> Self {
        QueueError::Operation {
            source: source.into(),
        }
    }

    pub(crate) fn processing(source: impl Into<BoxError>) -> Self {
        QueueError::Processing {
            source: source.into(),
        }
    }

    pub(crate) fn hook(source: impl Into<BoxError>) -> Self {
        QueueError::Hook {
            source: source.into(),
        }
    }
}

/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
