//! # Logging subscriber.
//!
//! [`LogWriter`] turns queue events into `tracing` records. Install any
//! `tracing` subscriber in the application to see them.
//!
//! ## Output levels
//! ```text
//! DEBUG  task buffered / admitted / rejected / finished / ignored
//! INFO   queue started / filled / completed
//! WARN   task failed, error suppressed
//! ERROR  queue failed
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Subscriber that writes every event through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWriter;

impl LogWriter {
    /// Creates a new log writer.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let reason = e.reason.as_deref().unwrap_or_default();
        match e.kind {
            EventKind::TaskBuffered => tracing::debug!(seq = e.seq, "[buffered]"),
            EventKind::TaskRejected => tracing::debug!(seq = e.seq, "[rejected]"),
            EventKind::TaskAdmitted => {
                tracing::debug!(seq = e.seq, ticket = e.ticket, in_flight = e.in_flight, "[admitted]")
            }
            EventKind::TaskFinished => {
                tracing::debug!(seq = e.seq, ticket = e.ticket, in_flight = e.in_flight, "[finished]")
            }
            EventKind::TaskIgnored => tracing::debug!(seq = e.seq, ticket = e.ticket, "[ignored]"),
            EventKind::TaskFailed => {
                tracing::warn!(seq = e.seq, ticket = e.ticket, err = reason, "[task-failed]")
            }
            EventKind::QueueStarted => {
                tracing::info!(seq = e.seq, in_flight = e.in_flight, "[started]")
            }
            EventKind::QueueFilled => tracing::info!(seq = e.seq, "[filled]"),
            EventKind::QueueCompleted => tracing::info!(seq = e.seq, "[completed]"),
            EventKind::QueueFailed => tracing::error!(seq = e.seq, err = reason, "[failed]"),
            EventKind::ErrorSuppressed => {
                tracing::warn!(seq = e.seq, err = reason, "[error-suppressed]")
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
