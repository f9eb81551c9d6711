//! # Example: custom_subscriber
//!
//! Demonstrates how to build and attach a custom event subscriber.
//!
//! Shows how to:
//! - Implement the [`Subscribe`] trait.
//! - Inspect [`Event`] / [`EventKind`] for queue lifecycle metrics.
//! - Wire the subscriber in through [`QueueBuilder::with_subscribers`](taskfill::QueueBuilder::with_subscribers).
//!
//! The operation fails on task `3`, so the run ends through `catch`.
//!
//! ## Flow
//! ```text
//! Queue::push / filled / start
//!     ├─► Bus.publish(TaskBuffered / TaskAdmitted / TaskFinished / TaskFailed / ...)
//!     └─► subscriber_listener (in QueueBuilder::build)
//!           └─► SubscriberSet.emit() ──► ConsoleSubscriber.on_event()
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example custom_subscriber
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use taskfill::{BoxError, Event, EventKind, OperationFn, OperationRef, Queue, Subscribe};

/// Prints selected events and counts finished tasks.
/// In real life, you could export metrics, ship logs, or trigger alerts.
#[derive(Default)]
struct ConsoleSubscriber {
    finished: AtomicUsize,
}

#[async_trait::async_trait]
impl Subscribe for ConsoleSubscriber {
    async fn on_event(&self, ev: &Event) {
        match ev.kind {
            EventKind::TaskAdmitted => println!(
                "[sub] admitted: ticket={} in_flight={}",
                ev.ticket.unwrap_or_default(),
                ev.in_flight.unwrap_or_default()
            ),
            EventKind::TaskFinished => {
                let n = self.finished.fetch_add(1, Ordering::Relaxed) + 1;
                println!("[sub] finished: ticket={} total={n}", ev.ticket.unwrap_or_default());
            }
            EventKind::TaskFailed => println!(
                "[sub] failed:   ticket={} reason={}",
                ev.ticket.unwrap_or_default(),
                ev.reason.as_deref().unwrap_or("<none>")
            ),
            EventKind::QueueCompleted => println!("[sub] queue completed"),
            EventKind::QueueFailed => println!(
                "[sub] queue failed: {}",
                ev.reason.as_deref().unwrap_or("<none>")
            ),
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "console"
    }

    fn queue_capacity(&self) -> usize {
        256
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let op: OperationRef<u32, u32> = OperationFn::arc(|n: u32| async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if n == 3 {
            return Err(BoxError::from(format!("task {n} is unlucky")));
        }
        Ok(n + 100)
    });

    let subscriber = Arc::new(ConsoleSubscriber::default());
    let queue = Queue::builder(op)
        .with_concurrency(1)
        .with_subscribers(vec![subscriber.clone() as Arc<dyn Subscribe>])
        .build();

    queue.catch(|err| eprintln!("[catch] {} ({})", err, err.as_label()));

    queue.start()?;
    for n in 1..=5 {
        queue.push(n)?;
    }
    queue.filled();
    queue.terminated().await;

    // Let the subscriber worker drain its queue before exiting.
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("[main] finished tasks: {}", subscriber.finished.load(Ordering::Relaxed));
    Ok(())
}
