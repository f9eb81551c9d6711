//! Queue core: state machine, hooks and construction.
//!
//! The only public API from this module is [`Queue`] with its builder,
//! configuration and the handles passed into hooks.
//!
//! Internal modules:
//! - [`state`]: counters, flags and the single terminal transition;
//! - [`queue`]: push/fill/start, admission, completion callbacks, error funnel;
//! - [`hooks`]: one optional slot per lifecycle event;
//! - [`handles`]: [`Reporter`] and [`Done`] given to hooks;
//! - [`builder`]: wires dispatcher, logger, bus and subscribers;
//! - [`config`]: [`QueueConfig`].

mod builder;
mod config;
mod handles;
mod hooks;
mod queue;
mod state;

#[cfg(test)]
mod tests;

pub use builder::QueueBuilder;
pub use config::QueueConfig;
pub use handles::{Done, Reporter};
pub use hooks::{CatchHook, CompletedHook, FilledHook, FirstHook, ForEachHook, PushIfHook};
pub use queue::Queue;
pub use state::{QueueStatus, Termination};
