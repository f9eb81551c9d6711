//! # Dispatcher contract.
//!
//! A dispatcher runs submitted operation futures with bounded concurrency and
//! calls one completion callback per submission. The queue owns exactly one
//! dispatcher and drives it through [`Dispatch::pause`], [`Dispatch::resume`]
//! and [`Dispatch::halt`].

use crate::error::BoxError;
use crate::tasks::OperationFuture;

/// Completion callback invoked with the outcome of one submitted job.
pub type OnDone<R> = Box<dyn FnOnce(Result<R, BoxError>) + Send + 'static>;

/// Bounded-concurrency runner used by a [`Queue`](crate::Queue).
///
/// ### Contract
/// - Jobs are launched in submission order.
/// - `on_done` is called exactly once for every launched job.
/// - After `halt`, jobs not yet launched are dropped without calling `on_done`;
///   jobs already running are not aborted.
/// - A dispatcher starts **paused**: nothing launches before `resume`.
pub trait Dispatch<R>: Send + Sync + 'static {
    /// Enqueues one job.
    fn submit(&self, job: OperationFuture<R>, on_done: OnDone<R>);

    /// Stops launching jobs until [`Dispatch::resume`].
    fn pause(&self);

    /// Allows queued jobs to launch.
    fn resume(&self);

    /// Permanently stops launching jobs.
    fn halt(&self);
}
