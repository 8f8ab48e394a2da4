//! In-process fan-out of CDC events to bounded subscriber queues.
//!
//! Publishing never blocks: an event that doesn't fit a subscriber's
//! buffer is dropped for that subscriber and counted. Cache TTLs bound
//! the staleness this can cause.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use orgcache_core::events::CdcEvent;

/// Snapshot of bus counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BusStats {
    pub subscribers: usize,
    pub published: u64,
    /// Deliveries dropped because a subscriber's buffer was full.
    pub dropped: u64,
    pub closed: bool,
}

#[derive(Debug, Default)]
struct BusState {
    subscribers: Vec<mpsc::Sender<CdcEvent>>,
    closed: bool,
}

/// Broadcast bus for [`CdcEvent`]s.
#[derive(Debug)]
pub struct CacheEventBus {
    state: RwLock<BusState>,
    buffer_size: usize,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl CacheEventBus {
    /// Create a bus whose subscribers each buffer up to `buffer_size` events.
    pub fn new(buffer_size: usize) -> Self {
        Self {
            state: RwLock::new(BusState::default()),
            buffer_size: buffer_size.max(1),
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Register a subscriber.
    ///
    /// After [`close`](Self::close) the returned receiver is already
    /// terminated.
    pub fn subscribe(&self) -> mpsc::Receiver<CdcEvent> {
        let (tx, rx) = mpsc::channel(self.buffer_size);
        let mut state = self.state.write();
        if !state.closed {
            state.subscribers.push(tx);
        }
        rx
    }

    /// Offer `event` to every subscriber without waiting.
    ///
    /// Returns the number of subscribers that accepted it.
    pub fn publish(&self, event: CdcEvent) -> usize {
        let mut delivered = 0;
        let mut saw_closed = false;
        {
            let state = self.state.read();
            if state.closed {
                debug!(event_id = %event.event_id, "Event bus closed, dropping event");
                return 0;
            }
            self.published.fetch_add(1, Ordering::Relaxed);

            for tx in &state.subscribers {
                match tx.try_send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            event_id = %event.event_id,
                            tenant_id = %event.tenant_id,
                            "Subscriber buffer full, dropping CDC event"
                        );
                    }
                    Err(TrySendError::Closed(_)) => saw_closed = true,
                }
            }
        }

        if saw_closed {
            let mut state = self.state.write();
            state.subscribers.retain(|tx| !tx.is_closed());
            debug!(remaining = state.subscribers.len(), "Pruned closed subscribers");
        }
        delivered
    }

    /// Stop accepting events and terminate all subscriptions. Idempotent.
    pub fn close(&self) {
        let mut state = self.state.write();
        if state.closed {
            return;
        }
        state.closed = true;
        state.subscribers.clear();
        debug!("Event bus closed");
    }

    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }

    pub fn stats(&self) -> BusStats {
        let state = self.state.read();
        BusStats {
            subscribers: state.subscribers.len(),
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            closed: state.closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgcache_core::events::CdcOperation;
    use orgcache_core::types::Organization;
    use uuid::Uuid;

    fn event(code: &str) -> CdcEvent {
        let org = Organization {
            code: code.to_string(),
            ..Organization::default()
        };
        CdcEvent::organization(CdcOperation::Update, Uuid::nil(), &org, "test").unwrap()
    }

    #[tokio::test]
    async fn test_fan_out_to_all_subscribers() {
        let bus = CacheEventBus::new(4);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        assert_eq!(bus.publish(event("X")), 2);
        assert_eq!(a.recv().await.unwrap().entity_id, "X");
        assert_eq!(b.recv().await.unwrap().entity_id, "X");
    }

    #[tokio::test]
    async fn test_full_buffer_drops_without_blocking() {
        let bus = CacheEventBus::new(2);
        let mut rx = bus.subscribe();

        for code in ["1", "2", "3", "4"] {
            bus.publish(event(code));
        }

        assert_eq!(rx.recv().await.unwrap().entity_id, "1");
        assert_eq!(rx.recv().await.unwrap().entity_id, "2");
        assert!(rx.try_recv().is_err());

        let stats = bus.stats();
        assert_eq!(stats.published, 4);
        assert_eq!(stats.dropped, 2);
    }

    #[tokio::test]
    async fn test_close_terminates_subscribers_and_is_idempotent() {
        let bus = CacheEventBus::new(4);
        let mut rx = bus.subscribe();
        bus.close();
        bus.close();

        assert!(rx.recv().await.is_none());
        assert_eq!(bus.publish(event("X")), 0);
        assert!(bus.subscribe().recv().await.is_none());
        assert!(bus.stats().closed);
    }

    #[tokio::test]
    async fn test_dropped_receivers_are_pruned() {
        let bus = CacheEventBus::new(4);
        let rx = bus.subscribe();
        let _kept = bus.subscribe();
        drop(rx);

        assert_eq!(bus.publish(event("X")), 1);
        assert_eq!(bus.stats().subscribers, 1);
    }
}
