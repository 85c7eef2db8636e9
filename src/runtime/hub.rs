//! Event broadcast hub
//!
//! Fans each domain event out to every registered subscriber through its own
//! bounded queue. Publishing never waits: a subscriber whose queue is full or
//! closed is unregistered on the spot and the remaining subscribers still get
//! the event.

use crate::state_machine::DomainEvent;
use futures::Stream;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Default per-subscriber queue capacity
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

struct Slot {
    id: u64,
    tx: mpsc::Sender<DomainEvent>,
}

struct HubInner {
    subscribers: Mutex<Vec<Slot>>,
    next_id: AtomicU64,
    capacity: usize,
    /// Number of events published (for monitoring)
    published: AtomicUsize,
}

impl HubInner {
    fn remove(&self, id: u64) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|slot| slot.id != id);
    }
}

/// Fan-out of domain events to N subscriber queues
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                capacity: capacity.max(1),
                published: AtomicUsize::new(0),
            }),
        }
    }

    /// Register a new subscriber. It sees only events published from now on.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Slot { id, tx });

        tracing::debug!(subscriber = id, "Subscriber registered");

        Subscription {
            id,
            rx,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every subscriber, in registration order.
    ///
    /// Returns the number of subscribers that accepted it.
    pub fn publish(&self, event: &DomainEvent) -> usize {
        self.inner.published.fetch_add(1, Ordering::Relaxed);

        let mut subscribers = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut delivered = 0;
        subscribers.retain(|slot| match slot.tx.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    subscriber = slot.id,
                    event = event.kind(),
                    "Subscriber queue full, dropping subscriber"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(subscriber = slot.id, "Subscriber closed, removing");
                false
            }
        });

        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Get the total number of events published
    pub fn published_count(&self) -> usize {
        self.inner.published.load(Ordering::Relaxed)
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("subscriber_count", &self.subscriber_count())
            .field("published_count", &self.published_count())
            .finish()
    }
}

/// One subscriber's queue. Dropping it unregisters the subscriber.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<DomainEvent>,
    hub: Weak<HubInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next event; `None` once the hub has dropped this subscriber and the
    /// queue is drained.
    pub async fn recv(&mut self) -> Option<DomainEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<DomainEvent> {
        self.rx.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = DomainEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(self.id);
        }
    }
}
