//! # Example: fill_before_start
//!
//! Pushes every task up front, declares the queue filled, then starts it.
//!
//! Demonstrates how to:
//! - Create a [`Queue`] from a closure with a concurrency limit.
//! - Filter tasks with `push_if` and inspect the accepted set in `on_filled`.
//! - Process results in `for_each` and resolve each [`Done`](taskfill::Done).
//! - Wait for termination with [`Queue::terminated`].
//!
//! ## Flow
//! ```text
//! push(1..=6) ──► pending (push order kept)
//! filled()    ──► on_filled deferred until start
//! start()
//!     ├─► admit pending (push_if drops odd numbers)
//!     ├─► on_filled([2, 4, 6])
//!     ├─► dispatcher runs up to 2 operations at once
//!     ├─► for_each(task, result, done) ─► done.ok()
//!     └─► in_flight == 0 ─► completed()
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example fill_before_start
//! ```

use std::time::Duration;
use taskfill::Queue;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. The operation: a slow square
    let queue = Queue::new(
        |n: u64| async move {
            tokio::time::sleep(Duration::from_millis(100 * n)).await;
            Ok::<_, std::io::Error>(n * n)
        },
        2,
    );

    // 2. Hooks
    queue
        .push_if(|n| n % 2 == 0)
        .on_filled(|tasks, _| println!("[filled] accepted={tasks:?}"))
        .first(|square, _| println!("[first] {square}"))
        .for_each(|n, square, done| {
            println!("[result] {n}^2 = {square}");
            done.ok();
        })
        .completed(|| println!("[completed]"))
        .catch(|err| eprintln!("[failed] {err}"));

    // 3. Fill before start
    for n in 1..=6 {
        queue.push(n)?;
    }
    queue.filled();

    // 4. Start and wait
    queue.start()?;
    queue.terminated().await;
    println!("[status] {:?}", queue.snapshot());
    Ok(())
}
