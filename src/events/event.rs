//! # Lifecycle events emitted by a queue.
//!
//! The [`EventKind`] enum classifies event types across two categories:
//! - **Task events**: one task moving through the queue (buffered, admitted, rejected, finished, failed)
//! - **Queue events**: the queue lifecycle (started, filled, completed, failed)
//!
//! The [`Event`] struct carries metadata such as the admission ticket of the
//! task, an error reason and the in-flight count at the time of the event.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use taskfill::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskFailed)
//!     .with_ticket(3)
//!     .with_reason("boom")
//!     .with_in_flight(2);
//!
//! assert_eq!(ev.kind, EventKind::TaskFailed);
//! assert_eq!(ev.ticket, Some(3));
//! assert_eq!(ev.reason.as_deref(), Some("boom"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of queue events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Task events ===
    /// Task pushed before start and held until the queue starts.
    TaskBuffered,

    /// Task vetoed by the admission filter; it is not counted.
    TaskRejected,

    /// Task accepted and submitted to the dispatcher.
    ///
    /// Sets:
    /// - `ticket`: admission ticket (0-based, per queue)
    /// - `in_flight`: in-flight count including this task
    TaskAdmitted,

    /// Task result delivered and its continuation resolved successfully.
    ///
    /// Sets:
    /// - `ticket`: admission ticket
    /// - `in_flight`: in-flight count after this task
    TaskFinished,

    /// Task operation failed or its continuation reported an error.
    ///
    /// Sets:
    /// - `ticket`: admission ticket
    /// - `reason`: error message
    TaskFailed,

    /// Completion callback arrived after the queue terminated and was ignored.
    ///
    /// Sets:
    /// - `ticket`: admission ticket
    TaskIgnored,

    // === Queue events ===
    /// Dispatch activated; buffered tasks were admitted.
    ///
    /// Sets:
    /// - `in_flight`: in-flight count after draining the buffer
    QueueStarted,

    /// Producer declared that no further tasks will arrive.
    QueueFilled,

    /// All accepted tasks finished after filling; the queue terminated normally.
    QueueCompleted,

    /// The first error terminated the queue.
    ///
    /// Sets:
    /// - `reason`: error message
    QueueFailed,

    /// An error arrived after termination and was dropped.
    ///
    /// Sets:
    /// - `reason`: error message
    ErrorSuppressed,
}

/// Queue event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Admission ticket of the task, if applicable.
    pub ticket: Option<u64>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Number of admitted tasks not yet finished.
    pub in_flight: Option<usize>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            ticket: None,
            reason: None,
            in_flight: None,
        }
    }

    /// Attaches an admission ticket.
    #[inline]
    pub fn with_ticket(mut self, ticket: u64) -> Self {
        self.ticket = Some(ticket);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches the current in-flight count.
    #[inline]
    pub fn with_in_flight(mut self, n: usize) -> Self {
        self.in_flight = Some(n);
        self
    }

    /// True for events that end the queue (normally or not).
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, EventKind::QueueCompleted | EventKind::QueueFailed)
    }
}
