//! # Per-task operation.
//!
//! The [`Operation`] trait maps one task to an asynchronous result. The queue
//! calls it once per admitted task and never inspects the task or the result.
//! The shared handle type is [`OperationRef`].

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::BoxError;

/// Boxed future returned by [`Operation::call`].
pub type OperationFuture<R> = BoxFuture<'static, Result<R, BoxError>>;

/// Shared handle to an operation.
pub type OperationRef<T, R> = Arc<dyn Operation<T, R>>;

/// # Asynchronous per-task work.
///
/// Each call produces a fresh future that owns its state.
///
/// # Example
/// ```
/// use taskfill::{BoxError, Operation, OperationFuture};
///
/// struct Double;
///
/// impl Operation<u32, u32> for Double {
///     fn call(&self, task: u32) -> OperationFuture<u32> {
///         Box::pin(async move { Ok::<_, BoxError>(task * 2) })
///     }
/// }
/// ```
pub trait Operation<T, R>: Send + Sync + 'static {
    /// Starts processing `task`.
    fn call(&self, task: T) -> OperationFuture<R>;
}
