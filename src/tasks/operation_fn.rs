//! # Function-backed operation (`OperationFn`)
//!
//! [`OperationFn`] wraps a closure `F: Fn(T) -> Fut`, producing a fresh future
//! per task. If shared state is needed, capture an `Arc<...>` explicitly.
//!
//! ## Example
//! ```rust
//! use taskfill::{OperationFn, OperationRef};
//!
//! let op: OperationRef<String, usize> =
//!     OperationFn::arc(|s: String| async move { Ok::<_, std::io::Error>(s.len()) });
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;

use crate::error::BoxError;
use crate::tasks::operation::{Operation, OperationFuture};

/// Function-backed operation implementation.
pub struct OperationFn<F> {
    f: F,
}

impl<F> OperationFn<F> {
    /// Creates a new function-backed operation.
    ///
    /// Prefer [`OperationFn::arc`] when you immediately need an [`OperationRef`](crate::OperationRef).
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the operation and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

impl<T, R, E, F, Fut> Operation<T, R> for OperationFn<F>
where
    T: 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    E: Into<BoxError> + 'static,
{
    fn call(&self, task: T) -> OperationFuture<R> {
        (self.f)(task).map(|res| res.map_err(Into::into)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::OperationRef;

    #[tokio::test]
    async fn test_closure_result_is_forwarded() {
        let op: OperationRef<u32, u32> = OperationFn::arc(|n: u32| async move {
            if n == 0 {
                Err("zero")
            } else {
                Ok(n + 1)
            }
        });

        assert_eq!(op.call(1).await.unwrap(), 2);
        let err = op.call(0).await.unwrap_err();
        assert_eq!(err.to_string(), "zero");
    }
}
