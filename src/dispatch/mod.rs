//! Task dispatching.
//!
//! - [`Dispatch`]: contract of the bounded-concurrency runner a queue drives;
//! - [`PooledDispatcher`]: default Tokio implementation (FIFO launch, semaphore cap,
//!   pause gate, cancellation-token halt).

mod dispatcher;
mod pooled;

pub use dispatcher::{Dispatch, OnDone};
pub use pooled::PooledDispatcher;
