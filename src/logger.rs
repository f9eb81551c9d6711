//! # Error logger collaborator.
//!
//! The queue hands the first fatal error to a [`Logger`] before invoking the
//! `catch` hook. [`TracingLogger`] is the default and writes through `tracing`.

use crate::error::QueueError;

/// Records errors that terminate a queue.
pub trait Logger: Send + Sync + 'static {
    /// Records one fatal error.
    fn error(&self, err: &QueueError);
}

/// Logger backed by `tracing::error!`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn error(&self, err: &QueueError) {
        tracing::error!(label = err.as_label(), error = %err, "queue terminated by error");
    }
}
