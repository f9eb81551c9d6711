//! # Queue configuration.
//!
//! Provides [`QueueConfig`], the settings resolved by
//! [`QueueBuilder`](crate::QueueBuilder) when a queue is built.
//!
//! ## Sentinel values
//! - `concurrency = 0` → treated as `1` (a queue always makes progress)
//! - `bus_capacity = 0` → treated as `1`

/// Settings for a [`Queue`](crate::Queue).
///
/// ## Field semantics
/// - `concurrency`: maximum number of operations running at once (min 1)
/// - `bus_capacity`: event bus ring buffer size (min 1)
///
/// All fields are public. Prefer the clamped accessors over reading fields directly.
#[derive(Clone, Debug)]
pub struct QueueConfig {
    /// Maximum number of task operations in flight at the same time.
    ///
    /// Ignored when a custom dispatcher is supplied to the builder.
    pub concurrency: usize,

    /// Capacity of the event bus broadcast channel.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` events skip
    /// the oldest ones.
    pub bus_capacity: usize,
}

impl QueueConfig {
    /// Returns the concurrency limit, clamped to a minimum of 1.
    #[inline]
    pub fn concurrency_clamped(&self) -> usize {
        self.concurrency.max(1)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for QueueConfig {
    /// Default configuration:
    ///
    /// - `concurrency = 1` (strictly sequential processing)
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            concurrency: 1,
            bus_capacity: 1024,
        }
    }
}
