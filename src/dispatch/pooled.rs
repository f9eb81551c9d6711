//! # PooledDispatcher: Tokio dispatcher with a concurrency cap.
//!
//! One driver task pulls submissions in FIFO order and launches each of them as
//! a separate Tokio task once the pause gate is open and a semaphore permit is
//! available.
//!
//! ## Architecture
//! ```text
//! submit(job, on_done) ──► [unbounded mpsc] ──► driver loop
//!
//! loop {
//!   ├─► recv next submission          (cancellable)
//!   ├─► wait for gate == open         (cancellable)
//!   ├─► acquire semaphore permit      (cancellable)
//!   └─► spawn:
//!         ├─► job.catch_unwind().await
//!         ├─► on_done(outcome)
//!         └─► release permit
//! }
//! ```
//!
//! ## Rules
//! - Launch order equals submission order.
//! - At most `concurrency` jobs run at the same time; a job holds its permit
//!   until `on_done` returns, so a halt issued from `on_done` wins over the
//!   next launch.
//! - `halt` cancels the driver; queued submissions are dropped, running jobs finish.
//! - A panicking job is delivered to `on_done` as an error.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::select;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::dispatch::{Dispatch, OnDone};
use crate::error::{BoxError, panic_message};
use crate::tasks::OperationFuture;

/// One queued job together with its completion callback.
struct Submission<R> {
    job: OperationFuture<R>,
    on_done: OnDone<R>,
}

/// Default [`Dispatch`] implementation backed by Tokio tasks.
pub struct PooledDispatcher<R> {
    tx: mpsc::UnboundedSender<Submission<R>>,
    gate: watch::Sender<bool>,
    token: CancellationToken,
    concurrency: usize,
}

impl<R: Send + 'static> PooledDispatcher<R> {
    /// Creates a paused dispatcher and spawns its driver.
    ///
    /// `concurrency` is clamped to at least 1. Must be called inside a Tokio runtime.
    pub fn new(concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        let (tx, rx) = mpsc::unbounded_channel();
        let (gate, gate_rx) = watch::channel(false);
        let token = CancellationToken::new();
        let semaphore = Arc::new(Semaphore::new(concurrency));

        tokio::spawn(drive(rx, gate_rx, semaphore, token.clone()));

        Self {
            tx,
            gate,
            token,
            concurrency,
        }
    }

    /// Maximum number of jobs running at once.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// True once [`Dispatch::halt`] was called.
    pub fn is_halted(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl<R: Send + 'static> Dispatch<R> for PooledDispatcher<R> {
    fn submit(&self, job: OperationFuture<R>, on_done: OnDone<R>) {
        // Send fails only after the driver exited, i.e. after halt.
        let _ = self.tx.send(Submission { job, on_done });
    }

    fn pause(&self) {
        self.gate.send_replace(false);
    }

    fn resume(&self) {
        self.gate.send_replace(true);
    }

    fn halt(&self) {
        self.token.cancel();
    }
}

impl<R> Drop for PooledDispatcher<R> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Driver loop: launches submissions in order while respecting gate and permits.
async fn drive<R: Send + 'static>(
    mut rx: mpsc::UnboundedReceiver<Submission<R>>,
    mut gate: watch::Receiver<bool>,
    semaphore: Arc<Semaphore>,
    token: CancellationToken,
) {
    loop {
        let sub = select! {
            biased;
            _ = token.cancelled() => break,
            next = rx.recv() => match next {
                Some(sub) => sub,
                None => break,
            },
        };

        let open = select! {
            biased;
            _ = token.cancelled() => break,
            open = wait_open(&mut gate) => open,
        };
        if !open {
            break;
        }

        let permit = select! {
            biased;
            _ = token.cancelled() => break,
            res = semaphore.clone().acquire_owned() => match res {
                Ok(permit) => permit,
                Err(_closed) => break,
            },
        };

        tokio::spawn(run_job(sub, permit));
    }
}

/// Resolves once the gate is open; `false` if the dispatcher handle is gone.
async fn wait_open(gate: &mut watch::Receiver<bool>) -> bool {
    gate.wait_for(|open| *open).await.is_ok()
}

async fn run_job<R>(sub: Submission<R>, permit: OwnedSemaphorePermit) {
    let outcome = match AssertUnwindSafe(sub.job).catch_unwind().await {
        Ok(res) => res,
        Err(panic) => Err(BoxError::from(format!(
            "operation panicked: {}",
            panic_message(&*panic)
        ))),
    };
    (sub.on_done)(outcome);
    drop(permit);
}
