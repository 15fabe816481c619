//! Live subscriber registry.
//!
//! Every subscriber owns a bounded channel. Publishing never waits: a
//! frame is offered with `try_send`, and a subscriber whose buffer is full
//! or whose receiving side has gone away is removed from the registry.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::broadcaster::TelemetryFrame;

/// Opaque subscriber handle.
pub type SubscriberId = Uuid;

/// Why a frame could not be handed to a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubscriberSendError {
    /// The subscriber is not draining its buffer fast enough.
    #[error("subscriber buffer is full")]
    Overflow,

    /// The receiving side was dropped.
    #[error("subscriber channel is closed")]
    Closed,
}

/// Receiving side of a subscription.
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<Arc<TelemetryFrame>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next frame. `None` once the registry dropped this subscriber.
    pub async fn recv(&mut self) -> Option<Arc<TelemetryFrame>> {
        self.receiver.recv().await
    }

    /// Take a frame if one is already buffered.
    pub fn try_recv(&mut self) -> Option<Arc<TelemetryFrame>> {
        self.receiver.try_recv().ok()
    }
}

/// Outcome of publishing one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub dropped: Vec<(SubscriberId, SubscriberSendError)>,
}

/// Registry of live subscribers.
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<SubscriberId, mpsc::Sender<Arc<TelemetryFrame>>>>,
    buffer: usize,
}

impl SubscriberRegistry {
    /// Create a registry whose subscribers buffer up to `buffer` frames.
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// Register a new subscriber.
    pub async fn connect(&self) -> Subscription {
        let (tx, receiver) = mpsc::channel(self.buffer);
        let id = Uuid::new_v4();

        let mut subscribers = self.subscribers.write().await;
        subscribers.insert(id, tx);
        info!(subscriber = %id, total = subscribers.len(), "Subscriber connected");

        Subscription { id, receiver }
    }

    /// Remove a subscriber. Returns whether it was still registered.
    pub async fn disconnect(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write().await;
        let removed = subscribers.remove(&id).is_some();
        if removed {
            info!(subscriber = %id, total = subscribers.len(), "Subscriber disconnected");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.subscribers.read().await.is_empty()
    }

    /// Offer a frame to every subscriber, removing the ones that fail.
    pub async fn publish(&self, frame: Arc<TelemetryFrame>) -> PublishReport {
        let mut subscribers = self.subscribers.write().await;
        let mut report = PublishReport::default();

        for (id, tx) in subscribers.iter() {
            match tx.try_send(Arc::clone(&frame)) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    report.dropped.push((*id, SubscriberSendError::Overflow));
                }
                Err(TrySendError::Closed(_)) => {
                    report.dropped.push((*id, SubscriberSendError::Closed));
                }
            }
        }

        for (id, reason) in &report.dropped {
            subscribers.remove(id);
            warn!(subscriber = %id, "Dropping subscriber: {}", reason);
        }

        debug!(
            sequence = frame.sequence,
            delivered = report.delivered,
            dropped = report.dropped.len(),
            "Frame published"
        );
        report
    }

    /// Drop every subscriber, closing their channels.
    pub async fn clear(&self) {
        let mut subscribers = self.subscribers.write().await;
        let count = subscribers.len();
        subscribers.clear();
        if count > 0 {
            info!(count, "Released all subscribers");
        }
    }
}
