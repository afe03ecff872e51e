//! Bounded in-process event bus.

use std::sync::Arc;

use domain::{EventPublisher, ShopEvent};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::listener::EventListener;

/// Sizing of the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventBusConfig {
    /// Events buffered before `publish` starts dropping.
    pub capacity: usize,
    /// Tasks draining the queue.
    pub workers: usize,
}

impl EventBusConfig {
    pub const DEFAULT_CAPACITY: usize = 1024;
    pub const DEFAULT_WORKERS: usize = 2;
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            capacity: Self::DEFAULT_CAPACITY,
            workers: Self::DEFAULT_WORKERS,
        }
    }
}

/// Publishes events onto a bounded queue drained by a worker pool.
///
/// Every worker hands each event it receives to every listener, in
/// registration order. `publish` never waits: when the queue is full the
/// event is dropped and counted.
///
/// The queue closes once every clone of the bus is dropped; the workers then
/// drain what is left and exit.
#[derive(Clone)]
pub struct EventBus {
    sender: mpsc::Sender<ShopEvent>,
}

/// Joins the worker pool of an [`EventBus`].
pub struct EventBusHandle {
    workers: Vec<JoinHandle<()>>,
}

impl EventBus {
    /// Spawns the workers and returns the publishing side with its handle.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        config: EventBusConfig,
        listeners: Vec<Arc<dyn EventListener>>,
    ) -> (Self, EventBusHandle) {
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let listeners: Arc<[Arc<dyn EventListener>]> = listeners.into();

        let workers = (0..config.workers.max(1))
            .map(|worker| {
                tokio::spawn(run_worker(worker, receiver.clone(), listeners.clone()))
            })
            .collect();

        tracing::info!(
            capacity = config.capacity,
            workers = config.workers,
            listeners = listeners.len(),
            "event bus started"
        );

        (Self { sender }, EventBusHandle { workers })
    }
}

impl EventPublisher for EventBus {
    fn publish(&self, event: ShopEvent) {
        let event_type = event.event_type();
        match self.sender.try_send(event) {
            Ok(()) => {
                metrics::counter!("events_published_total", "event_type" => event_type)
                    .increment(1);
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(event_type, "event bus full, event dropped");
                metrics::counter!("events_dropped_total", "event_type" => event_type)
                    .increment(1);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(event_type, "event bus closed, event dropped");
                metrics::counter!("events_dropped_total", "event_type" => event_type)
                    .increment(1);
            }
        }
    }
}

async fn run_worker(
    worker: usize,
    receiver: Arc<Mutex<mpsc::Receiver<ShopEvent>>>,
    listeners: Arc<[Arc<dyn EventListener>]>,
) {
    loop {
        // The lock is released before listeners run so other workers can pick
        // up the next event.
        let next = receiver.lock().await.recv().await;
        let Some(event) = next else {
            break;
        };

        for listener in listeners.iter() {
            if let Err(error) = listener.handle(&event).await {
                tracing::error!(
                    worker,
                    listener = listener.name(),
                    event_type = event.event_type(),
                    %error,
                    "listener failed"
                );
            }
        }
    }
    tracing::debug!(worker, "event bus worker stopped");
}

impl EventBusHandle {
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Waits for every worker to finish. Workers finish once all publishers
    /// are dropped and the queue is empty.
    pub async fn join(self) {
        for worker in self.workers {
            if let Err(error) = worker.await {
                tracing::error!(%error, "event bus worker panicked");
            }
        }
    }
}
