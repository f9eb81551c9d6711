//! # Operation abstractions.
//!
//! - [`Operation`] - trait for per-task async work
//! - [`OperationFn`] - closure-backed implementation
//! - [`OperationRef`] - shared reference (`Arc<dyn Operation<T, R>>`)

mod operation;
mod operation_fn;

pub use operation::{Operation, OperationFuture, OperationRef};
pub use operation_fn::OperationFn;
