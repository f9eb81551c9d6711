use std::sync::Arc;

use crate::{
    core::{QueueConfig, queue::Queue},
    dispatch::{Dispatch, PooledDispatcher},
    events::Bus,
    logger::{Logger, TracingLogger},
    subscribers::{Subscribe, SubscriberSet},
    tasks::OperationRef,
};

/// Builder for constructing a [`Queue`] with optional collaborators.
pub struct QueueBuilder<T, R> {
    op: OperationRef<T, R>,
    cfg: QueueConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    dispatcher: Option<Arc<dyn Dispatch<R>>>,
    logger: Option<Arc<dyn Logger>>,
}

impl<T, R> QueueBuilder<T, R>
where
    T: Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    /// Creates a new builder with default configuration.
    pub fn new(op: OperationRef<T, R>) -> Self {
        Self {
            op,
            cfg: QueueConfig::default(),
            subscribers: Vec::new(),
            dispatcher: None,
            logger: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn with_config(mut self, cfg: QueueConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets the concurrency limit (`0` is treated as 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.cfg.concurrency = concurrency;
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive queue events through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Uses a custom dispatcher instead of [`PooledDispatcher`].
    ///
    /// The configured concurrency is not applied to a custom dispatcher.
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatch<R>>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Uses a custom error logger instead of [`TracingLogger`].
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Builds the queue.
    ///
    /// This initializes:
    /// - the event bus and, if subscribers were given, the fan-out listener;
    /// - the dispatcher (paused until [`Queue::start`]);
    /// - the logger.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn build(self) -> Queue<T, R> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        if !self.subscribers.is_empty() {
            subscriber_listener(&bus, SubscriberSet::new(self.subscribers));
        }

        let dispatcher: Arc<dyn Dispatch<R>> = match self.dispatcher {
            Some(dispatcher) => dispatcher,
            None => Arc::new(PooledDispatcher::new(self.cfg.concurrency_clamped())),
        };
        let logger: Arc<dyn Logger> = match self.logger {
            Some(logger) => logger,
            None => Arc::new(TracingLogger),
        };

        Queue::from_parts(self.op, dispatcher, logger, bus)
    }
}

/// Forwards bus events to the subscriber set until the queue terminates.
fn subscriber_listener(bus: &Bus, set: SubscriberSet) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => {
                    let last = ev.is_terminal();
                    set.emit(&ev);
                    if last {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscriber listener lagged behind the bus");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
        set.shutdown().await;
    });
}
