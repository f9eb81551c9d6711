//! # taskfill
//!
//! **Taskfill** is a bounded-concurrency task queue for Tokio with an explicit
//! fill/complete lifecycle.
//!
//! Producers push tasks of type `T`; one asynchronous operation turns each
//! task into a result of type `R`. The queue runs at most `concurrency`
//! operations at once, hands every result to a per-result hook, and decides
//! when the whole job is over: either every accepted task was processed after
//! the producer declared the queue *filled*, or the first error killed it.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   producer ──push(task)──┐        ┌── filled() ── start()
//!                          ▼        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Queue (shared handle, cheap to clone)                            │
//! │  - State    (pending, accepted, in_flight, terminal)              │
//! │  - Hooks    (push_if, on_filled, for_each, first, completed,      │
//! │              catch)                                               │
//! │  - Logger   (first error only)                                    │
//! │  - Bus      (broadcast events)                                    │
//! └──────┬──────────────────────────────────────────────────┬─────────┘
//!        │ submit(op(task), on_done)                        │ publish
//!        ▼                                                  ▼
//! ┌──────────────────────────────┐             ┌─────────────────────────┐
//! │  PooledDispatcher            │             │  Bus (broadcast)        │
//! │  - FIFO channel              │             └────────────┬────────────┘
//! │  - pause gate (until start)  │                          ▼
//! │  - Semaphore(concurrency)    │             ┌─────────────────────────┐
//! │  - halt token                │             │  subscriber_listener    │
//! └──────┬───────────────────────┘             └────────────┬────────────┘
//!        │ on_done(Result<R, _>)                            ▼
//!        ▼                                           SubscriberSet
//!  first(&r) ─► for_each(task, r, done)            (per-sub queues)
//!                         │                     ┌─────────┼─────────┐
//!                  done.ok() / done.fail(e)     ▼         ▼         ▼
//!                                            sub1.on   sub2.on   subN.on
//!                                             _event()  _event()  _event()
//! ```
//!
//! ### Lifecycle
//! ```text
//! Idle ──start()──► Started ──(filled && in_flight == 0)──► Completed
//!   │                  │
//!   │                  └──first error (operation, done.fail, reporter)──► Failed
//!   │
//!   └── push() buffers tasks in order; start() admits them in push order
//!
//! Completed / Failed are terminal:
//!   - dispatcher halted, queued operations dropped
//!   - push() ─► Err(Killed); late results ignored
//!   - completed() or catch(&err) fired exactly once
//! ```
//!
//! ## Features
//! | Area               | Description                                                   | Key types / traits                         |
//! |--------------------|---------------------------------------------------------------|--------------------------------------------|
//! | **Queue**          | Push, fill, start; hooks for every lifecycle step.            | [`Queue`], [`QueueBuilder`]                |
//! | **Handles**        | Fail the queue from hooks; resolve per-result processing.     | [`Reporter`], [`Done`]                     |
//! | **Operations**     | Define the per-task async work as a closure or a trait impl.  | [`Operation`], [`OperationFn`]             |
//! | **Dispatch**       | Bounded FIFO execution, pluggable.                            | [`Dispatch`], [`PooledDispatcher`]         |
//! | **Subscriber API** | Observe queue events (logging, metrics, custom subscribers).  | [`Subscribe`], [`LogWriter`]               |
//! | **Errors**         | Typed errors for misuse and for the error that killed a queue.| [`QueueError`], [`Logger`]                 |
//! | **Configuration**  | Concurrency and event bus sizing.                             | [`QueueConfig`]                            |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use taskfill::{LogWriter, OperationFn, OperationRef, Queue, QueueError, Subscribe};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), QueueError> {
//!     let fetch: OperationRef<String, usize> = OperationFn::arc(|url: String| async move {
//!         // pretend to download `url`
//!         Ok::<_, std::io::Error>(url.len())
//!     });
//!
//!     let queue = Queue::builder(fetch)
//!         .with_concurrency(4)
//!         .with_subscribers(vec![Arc::new(LogWriter::new()) as Arc<dyn Subscribe>])
//!         .build();
//!
//!     queue
//!         .push_if(|url| url.starts_with("https://"))
//!         .on_filled(|urls, _| println!("{} urls accepted", urls.len()))
//!         .for_each(|url, size, done| {
//!             println!("{url}: {size} bytes");
//!             done.ok();
//!         })
//!         .completed(|| println!("all done"))
//!         .catch(|err| eprintln!("crawl failed: {err}"));
//!
//!     for url in ["https://a.example", "ftp://b.example", "https://c.example"] {
//!         queue.push(url.to_string())?;
//!     }
//!     queue.filled().start()?;
//!     queue.terminated().await;
//!     Ok(())
//! }
//! ```
mod core;
mod dispatch;
mod error;
mod events;
mod logger;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use core::{
    CatchHook, CompletedHook, Done, FilledHook, FirstHook, ForEachHook, PushIfHook, Queue,
    QueueBuilder, QueueConfig, QueueStatus, Reporter, Termination,
};
pub use dispatch::{Dispatch, OnDone, PooledDispatcher};
pub use error::{BoxError, QueueError};
pub use events::{Bus, Event, EventKind};
pub use logger::{Logger, TracingLogger};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use tasks::{Operation, OperationFn, OperationFuture, OperationRef};
