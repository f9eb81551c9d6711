//! # Lifecycle hooks.
//!
//! One optional slot per lifecycle event. An empty slot is the no-op default.
//! Slots are cloned out before a call, so hooks run without any queue lock held
//! and may re-enter the queue (e.g. push more tasks).

use std::sync::Arc;

use crate::core::handles::{Done, Reporter};
use crate::error::QueueError;

/// Admission filter: `false` drops the task before it is counted.
pub type PushIfHook<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;
/// Called with every accepted task once the queue is filled.
pub type FilledHook<T> = Arc<dyn Fn(&[T], &Reporter) + Send + Sync>;
/// Called per result; must resolve the [`Done`] continuation.
pub type ForEachHook<T, R> = Arc<dyn Fn(T, R, Done) + Send + Sync>;
/// Called with the first successful result only.
pub type FirstHook<R> = Arc<dyn Fn(&R, &Reporter) + Send + Sync>;
/// Called once on normal completion.
pub type CompletedHook = Arc<dyn Fn() + Send + Sync>;
/// Called once with the error that killed the queue.
pub type CatchHook = Arc<dyn Fn(&QueueError) + Send + Sync>;

pub(crate) struct Hooks<T, R> {
    pub(crate) push_if: Option<PushIfHook<T>>,
    pub(crate) on_filled: Option<FilledHook<T>>,
    pub(crate) for_each: Option<ForEachHook<T, R>>,
    pub(crate) first: Option<FirstHook<R>>,
    pub(crate) completed: Option<CompletedHook>,
    pub(crate) catch: Option<CatchHook>,
}

impl<T, R> Default for Hooks<T, R> {
    fn default() -> Self {
        Self {
            push_if: None,
            on_filled: None,
            for_each: None,
            first: None,
            completed: None,
            catch: None,
        }
    }
}

impl<T, R> Clone for Hooks<T, R> {
    fn clone(&self) -> Self {
        Self {
            push_if: self.push_if.clone(),
            on_filled: self.on_filled.clone(),
            for_each: self.for_each.clone(),
            first: self.first.clone(),
            completed: self.completed.clone(),
            catch: self.catch.clone(),
        }
    }
}
