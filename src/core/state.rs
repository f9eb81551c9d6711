//! # Queue state machine.
//!
//! [`State`] holds every mutable field of a queue. It is owned by the queue,
//! guarded by one mutex, and only changed through the transition methods below.
//! None of them call user code, so the lock is never held across a hook.
//!
//! ## Phases
//! ```text
//!            start()              drain done
//!   Idle ───────────► Starting ───────────► Started
//!    │                    │                    │
//!    └────────────────────┴────────────────────┴──► terminal: Completed | Failed
//! ```
//!
//! ## Rules
//! - `filled` is set once and never unset.
//! - `terminal` is entered once (first of: error, normal completion) and never left.
//! - `in_flight` counts admitted tasks whose result has not been fully handled.
//! - Once terminal, result/finish transitions report "ignored" (`None`).

use crate::error::QueueError;

/// How a queue terminated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// Every accepted task finished after the queue was filled.
    Completed,
    /// The first error killed the queue.
    Failed,
}

/// Dispatch activation phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Starting,
    Started,
}

/// Point-in-time view of a queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueStatus {
    /// Tasks buffered before start.
    pub pending: usize,
    /// Tasks admitted into the dispatcher so far.
    pub accepted: usize,
    /// Admitted tasks not yet finished.
    pub in_flight: usize,
    /// Results delivered to the result path.
    pub completed: usize,
    /// Producer declared no further tasks.
    pub filled: bool,
    /// Dispatch is active.
    pub started: bool,
    /// Terminal state, if reached.
    pub terminal: Option<Termination>,
}

/// Result of [`State::push`].
pub(crate) enum Pushed<T> {
    /// Held in `pending` until start.
    Buffered,
    /// Dispatch is active; the caller must admit the task.
    Admit(T),
}

/// Result of [`State::drain_or_start`].
pub(crate) enum Drained<T> {
    /// Buffered tasks to admit, in push order.
    Batch(Vec<T>),
    /// Buffer empty; the queue is now started. `fire_filled` is set when the
    /// fill happened before this transition, so `start` owns the `on_filled` call.
    Started { fire_filled: bool },
}

/// Result of [`State::begin_start`].
pub(crate) enum Begin {
    /// This call owns the start sequence.
    Proceed,
    /// Start already ran (or is running on another call).
    AlreadyStarted,
}

pub(crate) struct State<T> {
    pending: Vec<T>,
    accepted: Vec<T>,
    in_flight: usize,
    completed: usize,
    filled: bool,
    phase: Phase,
    terminal: Option<Termination>,
    next_ticket: u64,
}

impl<T: Clone> State<T> {
    pub(crate) fn new() -> Self {
        Self {
            pending: Vec::new(),
            accepted: Vec::new(),
            in_flight: 0,
            completed: 0,
            filled: false,
            phase: Phase::Idle,
            terminal: None,
            next_ticket: 0,
        }
    }

    #[inline]
    pub(crate) fn is_killed(&self) -> bool {
        self.terminal.is_some()
    }

    #[inline]
    pub(crate) fn is_started(&self) -> bool {
        self.phase == Phase::Started
    }

    #[inline]
    pub(crate) fn is_filled(&self) -> bool {
        self.filled
    }

    /// Producer-side push: rejects misuse, buffers before start, admits after.
    pub(crate) fn push(&mut self, task: T) -> Result<Pushed<T>, QueueError> {
        if self.filled {
            return Err(QueueError::Filled);
        }
        if self.is_killed() {
            return Err(QueueError::Killed);
        }
        if self.is_started() {
            Ok(Pushed::Admit(task))
        } else {
            self.pending.push(task);
            Ok(Pushed::Buffered)
        }
    }

    /// Fails with `Killed` once terminal.
    pub(crate) fn ensure_live(&self) -> Result<(), QueueError> {
        if self.is_killed() {
            Err(QueueError::Killed)
        } else {
            Ok(())
        }
    }

    /// Records an admitted task; returns its ticket and the new in-flight count.
    pub(crate) fn admit(&mut self, task: &T) -> Result<(u64, usize), QueueError> {
        self.ensure_live()?;
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.accepted.push(task.clone());
        self.in_flight += 1;
        Ok((ticket, self.in_flight))
    }

    /// Claims the start sequence.
    pub(crate) fn begin_start(&mut self) -> Result<Begin, QueueError> {
        self.ensure_live()?;
        match self.phase {
            Phase::Idle => {
                self.phase = Phase::Starting;
                Ok(Begin::Proceed)
            }
            Phase::Starting | Phase::Started => Ok(Begin::AlreadyStarted),
        }
    }

    /// Takes the next batch of buffered tasks, or marks the queue started when
    /// the buffer is empty.
    pub(crate) fn drain_or_start(&mut self) -> Result<Drained<T>, QueueError> {
        self.ensure_live()?;
        if self.pending.is_empty() {
            self.phase = Phase::Started;
            Ok(Drained::Started {
                fire_filled: self.filled,
            })
        } else {
            Ok(Drained::Batch(std::mem::take(&mut self.pending)))
        }
    }

    /// Sets `filled`; returns whether dispatch is already active, i.e. whether
    /// the caller owns the `on_filled` call. Before that, `drain_or_start` owns it.
    pub(crate) fn fill(&mut self) -> bool {
        self.filled = true;
        self.is_started()
    }

    /// Snapshot of accepted tasks, unless terminal.
    pub(crate) fn accepted_snapshot(&self) -> Option<Vec<T>> {
        if self.is_killed() {
            None
        } else {
            Some(self.accepted.clone())
        }
    }

    /// Counts one delivered result; `Some(true)` for the very first one.
    pub(crate) fn record_result(&mut self) -> Option<bool> {
        if self.is_killed() {
            return None;
        }
        self.completed += 1;
        Some(self.completed == 1)
    }

    /// Marks one task finished; returns the new in-flight count.
    pub(crate) fn finish_one(&mut self) -> Option<usize> {
        if self.is_killed() {
            return None;
        }
        self.in_flight = self.in_flight.saturating_sub(1);
        Some(self.in_flight)
    }

    /// Enters `Completed` when started, filled and drained.
    pub(crate) fn try_complete(&mut self) -> bool {
        if self.is_started() && self.filled && self.in_flight == 0 && !self.is_killed() {
            self.terminal = Some(Termination::Completed);
            true
        } else {
            false
        }
    }

    /// Enters `Failed`; `false` if the queue was already terminal.
    pub(crate) fn try_fail(&mut self) -> bool {
        if self.is_killed() {
            return false;
        }
        self.terminal = Some(Termination::Failed);
        self.pending.clear();
        true
    }

    pub(crate) fn status(&self) -> QueueStatus {
        QueueStatus {
            pending: self.pending.len(),
            accepted: self.accepted.len(),
            in_flight: self.in_flight,
            completed: self.completed,
            filled: self.filled,
            started: self.is_started(),
            terminal: self.terminal,
        }
    }
}
