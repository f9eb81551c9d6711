//! # Queue: fill/complete lifecycle over a bounded dispatcher.
//!
//! The [`Queue`] owns the [`State`] machine, the hook table, a dispatcher and a
//! logger. Producers push tasks, declare the queue filled, and start dispatch;
//! the queue admits tasks, handles per-task completions and decides termination.
//!
//! ## Flow
//! ```text
//! push(task) ──► filled? ─► Err(Filled)
//!      │         killed? ─► Err(Killed)
//!      ├── not started ─► pending (order kept)
//!      └── started ─────► admit(task)
//!
//! admit(task) ──► push_if(&task) == false ─► dropped (TaskRejected)
//!      └──► accepted += task, in_flight += 1 ─► dispatcher.submit(op(task), on_done)
//!
//! on_done(outcome)
//!   ├─ Err(e)        ─► report_error(Operation)
//!   ├─ killed        ─► ignored
//!   ├─ first result  ─► first(&r, reporter)
//!   └─ for_each(task, r, done)
//!         ├─ done.fail(e) ─► report_error(Processing)
//!         └─ done.ok()    ─► in_flight -= 1 ─► maybe_complete()
//!
//! maybe_complete(): started && filled && in_flight == 0
//!   └─► terminal = Completed ─► dispatcher.halt() ─► completed()
//!
//! report_error(e): first error only
//!   └─► terminal = Failed ─► dispatcher.halt() ─► logger.error(e) ─► catch(&e)
//! ```
//!
//! ## Rules
//! - Tasks pushed before `start` are admitted in push order.
//! - `completed` fires at most once, only after `filled` and a full drain.
//! - After termination no hook fires again and late completions are ignored.
//! - Hooks run without the state lock held, so they may push re-entrantly.
//! - A panicking hook kills the queue with [`QueueError::Hook`].

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tokio_util::sync::CancellationToken;

use crate::core::builder::QueueBuilder;
use crate::core::handles::{Done, ErrorSink, Reporter, Resolution};
use crate::core::hooks::Hooks;
use crate::core::state::{Begin, Drained, Pushed, QueueStatus, State};
use crate::dispatch::Dispatch;
use crate::error::{BoxError, QueueError, panic_message};
use crate::events::{Bus, Event, EventKind};
use crate::logger::Logger;
use crate::tasks::{OperationFn, OperationRef};

/// Bounded-concurrency task queue with a fill/complete lifecycle.
///
/// Cloning is cheap; all clones share the same queue.
///
/// ## Example
/// ```rust
/// use std::convert::Infallible;
/// use taskfill::Queue;
/// use tokio::sync::oneshot;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let (tx, rx) = oneshot::channel();
///     let tx = std::sync::Mutex::new(Some(tx));
///
///     let queue = Queue::new(|n: u32| async move { Ok::<_, Infallible>(n * 2) }, 2);
///     queue
///         .for_each(|task, doubled, done| {
///             assert_eq!(doubled, task * 2);
///             done.ok();
///         })
///         .completed(move || {
///             if let Some(tx) = tx.lock().unwrap().take() {
///                 let _ = tx.send(());
///             }
///         });
///
///     queue.push(1)?.push(2)?.push(3)?;
///     queue.filled().start()?;
///     rx.await?;
///     Ok(())
/// }
/// ```
pub struct Queue<T, R> {
    inner: Arc<Inner<T, R>>,
}

impl<T, R> Clone for Queue<T, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, R> fmt::Debug for Queue<T, R>
where
    T: Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("status", &self.snapshot())
            .finish()
    }
}

impl<T, R> Queue<T, R>
where
    T: Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    /// Creates a queue running `op` with at most `concurrency` tasks in flight.
    ///
    /// `concurrency = 0` is treated as 1. Must be called inside a Tokio runtime.
    pub fn new<F, Fut, E>(op: F, concurrency: usize) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let op: OperationRef<T, R> = OperationFn::arc(op);
        Self::builder(op).with_concurrency(concurrency).build()
    }

    /// Starts a [`QueueBuilder`] for the given operation.
    pub fn builder(op: OperationRef<T, R>) -> QueueBuilder<T, R> {
        QueueBuilder::new(op)
    }

    pub(crate) fn from_parts(
        op: OperationRef<T, R>,
        dispatcher: Arc<dyn Dispatch<R>>,
        logger: Arc<dyn Logger>,
        bus: Bus,
    ) -> Self {
        dispatcher.pause();
        Self {
            inner: Arc::new(Inner {
                op,
                dispatcher,
                logger,
                bus,
                state: Mutex::new(State::new()),
                hooks: RwLock::new(Hooks::default()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Pushes one task.
    ///
    /// Before [`start`](Self::start) the task is buffered; afterwards it is
    /// admitted immediately.
    ///
    /// # Errors
    /// - [`QueueError::Filled`] if [`filled`](Self::filled) was already called;
    /// - [`QueueError::Killed`] if the queue already terminated.
    pub fn push(&self, task: T) -> Result<&Self, QueueError> {
        let pushed = self.inner.lock_state().push(task)?;
        match pushed {
            Pushed::Buffered => self.inner.bus.publish(Event::new(EventKind::TaskBuffered)),
            Pushed::Admit(task) => self.inner.admit(task)?,
        }
        Ok(self)
    }

    /// Declares that no further tasks will be pushed.
    ///
    /// After start this invokes `on_filled` with the accepted tasks and checks
    /// for completion; before start both are deferred to [`start`](Self::start).
    pub fn filled(&self) -> &Self {
        let started = self.inner.lock_state().fill();
        self.inner.bus.publish(Event::new(EventKind::QueueFilled));
        if started {
            self.inner.fire_filled();
            self.inner.maybe_complete();
        }
        self
    }

    /// Activates dispatch.
    ///
    /// Admits buffered tasks in push order, invokes `on_filled` if the queue is
    /// already filled, resumes the dispatcher and checks for completion.
    /// A second call is a no-op.
    ///
    /// # Errors
    /// [`QueueError::Killed`] if the queue terminated before starting.
    pub fn start(&self) -> Result<&Self, QueueError> {
        if let Begin::AlreadyStarted = self.inner.lock_state().begin_start()? {
            return Ok(self);
        }

        let fire_filled = loop {
            let drained = self.inner.lock_state().drain_or_start()?;
            match drained {
                Drained::Batch(batch) => {
                    for task in batch {
                        self.inner.admit(task)?;
                    }
                }
                Drained::Started { fire_filled } => break fire_filled,
            }
        };

        let status = self.snapshot();
        self.inner
            .bus
            .publish(Event::new(EventKind::QueueStarted).with_in_flight(status.in_flight));
        if fire_filled {
            self.inner.fire_filled();
        }
        self.inner.dispatcher.resume();
        self.inner.maybe_complete();
        Ok(self)
    }

    /// Registers the admission filter; tasks for which it returns `false` are
    /// dropped without being counted.
    pub fn push_if<F>(&self, f: F) -> &Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.inner.write_hooks().push_if = Some(Arc::new(f));
        self
    }

    /// Registers the hook receiving every accepted task once the queue is filled.
    pub fn on_filled<F>(&self, f: F) -> &Self
    where
        F: Fn(&[T], &Reporter) + Send + Sync + 'static,
    {
        self.inner.write_hooks().on_filled = Some(Arc::new(f));
        self
    }

    /// Registers the per-result hook. The task stays in flight until the
    /// [`Done`] handle is resolved.
    pub fn for_each<F>(&self, f: F) -> &Self
    where
        F: Fn(T, R, Done) + Send + Sync + 'static,
    {
        self.inner.write_hooks().for_each = Some(Arc::new(f));
        self
    }

    /// Registers the hook receiving the first successful result.
    pub fn first<F>(&self, f: F) -> &Self
    where
        F: Fn(&R, &Reporter) + Send + Sync + 'static,
    {
        self.inner.write_hooks().first = Some(Arc::new(f));
        self
    }

    /// Registers the normal-completion hook.
    pub fn completed<F>(&self, f: F) -> &Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.write_hooks().completed = Some(Arc::new(f));
        self
    }

    /// Registers the hook receiving the error that killed the queue.
    pub fn catch<F>(&self, f: F) -> &Self
    where
        F: Fn(&QueueError) + Send + Sync + 'static,
    {
        self.inner.write_hooks().catch = Some(Arc::new(f));
        self
    }

    /// Point-in-time counters and flags.
    pub fn snapshot(&self) -> QueueStatus {
        self.inner.lock_state().status()
    }

    /// True once [`filled`](Self::filled) was called.
    pub fn is_filled(&self) -> bool {
        self.inner.lock_state().is_filled()
    }

    /// True once dispatch is active.
    pub fn is_started(&self) -> bool {
        self.inner.lock_state().is_started()
    }

    /// True once the queue terminated (completed or failed).
    pub fn is_killed(&self) -> bool {
        self.inner.lock_state().is_killed()
    }

    /// Resolves when the queue terminates.
    pub async fn terminated(&self) {
        self.inner.shutdown.cancelled().await;
    }

    /// Subscribes to this queue's events.
    pub fn events(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.inner.bus.subscribe()
    }
}

struct Inner<T, R> {
    op: OperationRef<T, R>,
    dispatcher: Arc<dyn Dispatch<R>>,
    logger: Arc<dyn Logger>,
    bus: Bus,
    state: Mutex<State<T>>,
    hooks: RwLock<Hooks<T, R>>,
    shutdown: CancellationToken,
}

impl<T, R> Inner<T, R>
where
    T: Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    fn lock_state(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn hooks(&self) -> Hooks<T, R> {
        self.hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn write_hooks(&self) -> std::sync::RwLockWriteGuard<'_, Hooks<T, R>> {
        self.hooks.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clears the hook table so captured handles are released.
    fn take_hooks(&self) -> Hooks<T, R> {
        std::mem::take(&mut *self.write_hooks())
    }

    fn reporter(self: &Arc<Self>) -> Reporter {
        Reporter::new(Arc::clone(self) as Arc<dyn ErrorSink>)
    }

    fn admit(self: &Arc<Self>, task: T) -> Result<(), QueueError> {
        self.lock_state().ensure_live()?;

        if let Some(filter) = self.hooks().push_if {
            let keep = self
                .guard("push_if", || filter(&task))
                .ok_or(QueueError::Killed)?;
            if !keep {
                self.bus.publish(Event::new(EventKind::TaskRejected));
                return Ok(());
            }
        }

        let (ticket, in_flight) = self.lock_state().admit(&task)?;
        self.bus.publish(
            Event::new(EventKind::TaskAdmitted)
                .with_ticket(ticket)
                .with_in_flight(in_flight),
        );

        let job = self.op.call(task.clone());
        let me = Arc::clone(self);
        self.dispatcher.submit(
            job,
            Box::new(move |outcome| me.on_task_done(ticket, task, outcome)),
        );
        Ok(())
    }

    fn on_task_done(self: &Arc<Self>, ticket: u64, task: T, outcome: Result<R, BoxError>) {
        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                self.bus.publish(
                    Event::new(EventKind::TaskFailed)
                        .with_ticket(ticket)
                        .with_reason(err.to_string()),
                );
                self.report_error(QueueError::operation(err));
                return;
            }
        };

        let Some(is_first) = self.lock_state().record_result() else {
            self.publish_ignored(ticket);
            return;
        };

        let hooks = self.hooks();
        if is_first {
            if let Some(first) = &hooks.first {
                let reporter = self.reporter();
                self.guard("first", || first(&result, &reporter));
            }
        }

        if self.lock_state().is_killed() {
            self.publish_ignored(ticket);
            return;
        }

        match &hooks.for_each {
            Some(for_each) => {
                let call = Arc::new(Mutex::new(ForEachCall::default()));
                let me = Arc::clone(self);
                let tracked = Arc::clone(&call);
                let done = Done::new(move |how| match how {
                    Resolution::Ok => me.finish_task(ticket),
                    Resolution::Failed(err) => {
                        me.bus.publish(
                            Event::new(EventKind::TaskFailed)
                                .with_ticket(ticket)
                                .with_reason(err.to_string()),
                        );
                        me.report_error(QueueError::processing(err));
                    }
                    Resolution::Abandoned => {
                        let mut call = tracked.lock().unwrap_or_else(PoisonError::into_inner);
                        if call.returned {
                            drop(call);
                            me.report_error(QueueError::hook(ABANDONED));
                        } else {
                            // The hook itself is unwinding; `guard` reports the panic.
                            call.abandoned = true;
                        }
                    }
                });

                let returned = self.guard("for_each", || for_each(task, result, done));
                let abandoned = {
                    let mut call = call.lock().unwrap_or_else(PoisonError::into_inner);
                    call.returned = true;
                    call.abandoned
                };
                if returned.is_some() && abandoned {
                    self.report_error(QueueError::hook(ABANDONED));
                }
            }
            None => self.finish_task(ticket),
        }
    }

    fn finish_task(&self, ticket: u64) {
        let finished = {
            let mut st = self.lock_state();
            st.finish_one().map(|in_flight| (in_flight, st.try_complete()))
        };
        let Some((in_flight, complete)) = finished else {
            self.publish_ignored(ticket);
            return;
        };

        self.bus.publish(
            Event::new(EventKind::TaskFinished)
                .with_ticket(ticket)
                .with_in_flight(in_flight),
        );
        if complete {
            self.complete();
        }
    }

    fn fire_filled(self: &Arc<Self>) {
        let Some(accepted) = self.lock_state().accepted_snapshot() else {
            return;
        };
        if let Some(on_filled) = self.hooks().on_filled {
            let reporter = self.reporter();
            self.guard("on_filled", || on_filled(&accepted, &reporter));
        }
    }

    fn maybe_complete(&self) {
        let complete = self.lock_state().try_complete();
        if complete {
            self.complete();
        }
    }

    /// Normal termination; called once, right after entering `Completed`.
    fn complete(&self) {
        self.dispatcher.halt();
        self.bus.publish(Event::new(EventKind::QueueCompleted));
        let hooks = self.take_hooks();
        if let Some(completed) = hooks.completed {
            terminal_hook("completed", || completed());
        }
        self.shutdown.cancel();
    }

    /// Single error funnel; only the first error has any effect.
    fn report_error(&self, err: QueueError) {
        let fresh = self.lock_state().try_fail();
        if !fresh {
            self.bus
                .publish(Event::new(EventKind::ErrorSuppressed).with_reason(err.to_string()));
            return;
        }

        self.dispatcher.halt();
        self.logger.error(&err);
        self.bus
            .publish(Event::new(EventKind::QueueFailed).with_reason(err.to_string()));
        let hooks = self.take_hooks();
        if let Some(catch) = hooks.catch {
            terminal_hook("catch", || catch(&err));
        }
        self.shutdown.cancel();
    }

    /// Runs a live-queue hook; a panic is routed into the error funnel and
    /// yields `None`.
    fn guard<O>(&self, hook: &'static str, f: impl FnOnce() -> O) -> Option<O> {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(out) => Some(out),
            Err(payload) => {
                self.report_error(QueueError::hook(format!(
                    "{hook} hook panicked: {}",
                    panic_message(&*payload)
                )));
                None
            }
        }
    }

    fn publish_ignored(&self, ticket: u64) {
        self.bus
            .publish(Event::new(EventKind::TaskIgnored).with_ticket(ticket));
    }
}

const ABANDONED: &str = "for_each continuation dropped during a panic";

/// Bookkeeping for one `for_each` call: a [`Done`] dropped by a panic is
/// reported once, either by `guard` (the hook panicked) or afterwards.
#[derive(Default)]
struct ForEachCall {
    returned: bool,
    abandoned: bool,
}

/// Runs `completed`/`catch`. The queue is already terminal, so a panic can
/// only be logged.
fn terminal_hook(hook: &'static str, f: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
        tracing::error!(hook, panic = %panic_message(&*payload), "terminal hook panicked");
    }
}

impl<T, R> ErrorSink for Inner<T, R>
where
    T: Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    fn report(&self, err: QueueError) {
        self.report_error(err);
    }
}
