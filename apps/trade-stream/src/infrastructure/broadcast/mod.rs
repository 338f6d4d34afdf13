//! Subscriber Registry
//!
//! Fan-out of published trades to a dynamic set of subscriber channels.
//!
//! # Architecture
//!
//! Each subscriber owns the receiving half of its own bounded `mpsc` channel.
//! The registry keeps the sending halves keyed by `SubscriberId` behind a
//! `tokio::sync::RwLock`: subscribe and unsubscribe take the write lock,
//! publish takes the read lock and holds it while delivering.
//!
//! Two delivery modes are supported:
//! - `Blocking`: each subscriber has a one-slot buffer and the publisher
//!   awaits a free slot for each subscriber in turn. One slow subscriber
//!   stalls every other subscriber and, through the handoff channels, both
//!   producers.
//! - `DropOnFull`: each subscriber has a bounded buffer. When it is full the
//!   event is dropped for that subscriber only.
//!
//! Because publish holds the read lock while it waits, `unsubscribe` in
//! `Blocking` mode waits for any publish stuck on a full subscriber. A
//! subscriber must keep draining its `Subscription`, or drop it, while it
//! unsubscribes; a subscriber that stops reading and then unsubscribes from
//! the same task deadlocks the stream.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, mpsc};
use tokio_stream::wrappers::ReceiverStream;

use crate::domain::trade::AggTrade;
use crate::infrastructure::metrics;

/// Default per-subscriber buffer in drop-on-full mode.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 1024;

/// Unique subscriber identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Raw identifier value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscriber-{}", self.0)
    }
}

/// How `publish` behaves when a subscriber is not keeping up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FanoutMode {
    /// One-slot buffer per subscriber; publish awaits until the slot is free.
    ///
    /// This is not a rendezvous: a send completes once the trade is buffered,
    /// before the subscriber has read it.
    #[default]
    Blocking,
    /// Drop the event for subscribers whose buffer is full.
    DropOnFull {
        /// Per-subscriber buffer size.
        capacity: usize,
    },
}

impl FanoutMode {
    /// Channel capacity for a new subscriber.
    #[must_use]
    pub const fn channel_capacity(&self) -> usize {
        match self {
            Self::Blocking => 1,
            Self::DropOnFull { capacity } => *capacity,
        }
    }

    /// Mode name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Blocking => "blocking",
            Self::DropOnFull { .. } => "drop",
        }
    }
}

/// Delivery outcome of a single publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    /// Subscribers that accepted the event.
    pub delivered: usize,
    /// Subscribers that missed it because their buffer was full.
    pub dropped: usize,
    /// Subscribers whose receiver is gone.
    pub closed: usize,
}

/// A registered subscriber's receiving end.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<AggTrade>,
}

impl Subscription {
    /// Identifier to pass to `unsubscribe`.
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Receive the next trade. Returns `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<AggTrade> {
        self.receiver.recv().await
    }

    /// Receive without waiting.
    ///
    /// # Errors
    ///
    /// Returns an error if no trade is buffered or the subscription is closed.
    pub fn try_recv(&mut self) -> Result<AggTrade, mpsc::error::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Convert into a `Stream` of trades.
    #[must_use]
    pub fn into_stream(self) -> ReceiverStream<AggTrade> {
        ReceiverStream::new(self.receiver)
    }
}

/// Registry of live subscriber channels.
pub struct SubscriberRegistry {
    mode: FanoutMode,
    next_id: AtomicU64,
    subscribers: RwLock<BTreeMap<SubscriberId, mpsc::Sender<AggTrade>>>,
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("mode", &self.mode)
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new(FanoutMode::default())
    }
}

impl SubscriberRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new(mode: FanoutMode) -> Self {
        Self {
            mode,
            next_id: AtomicU64::new(1),
            subscribers: RwLock::new(BTreeMap::new()),
        }
    }

    /// Delivery mode.
    #[must_use]
    pub const fn mode(&self) -> FanoutMode {
        self.mode
    }

    /// Register a new subscriber.
    pub async fn subscribe(&self) -> Subscription {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, receiver) = mpsc::channel(self.mode.channel_capacity().max(1));

        let count = {
            let mut subscribers = self.subscribers.write().await;
            subscribers.insert(id, tx);
            subscribers.len()
        };
        metrics::set_subscriber_count(count);
        tracing::debug!(%id, subscribers = count, "Subscriber registered");

        Subscription { id, receiver }
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    ///
    /// Buffered trades remain readable; no new trade is delivered afterwards.
    /// Waits for any in-flight publish, so in `Blocking` mode the caller's
    /// `Subscription` must be drained or dropped for this to complete.
    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        let (removed, count) = {
            let mut subscribers = self.subscribers.write().await;
            let removed = subscribers.remove(&id).is_some();
            (removed, subscribers.len())
        };

        if removed {
            metrics::set_subscriber_count(count);
            tracing::debug!(%id, subscribers = count, "Subscriber removed");
        }
        removed
    }

    /// Number of registered subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Deliver a clone of `trade` to every registered subscriber.
    pub async fn publish(&self, trade: &AggTrade) -> PublishStats {
        let mut stats = PublishStats::default();
        let subscribers = self.subscribers.read().await;

        for (id, tx) in subscribers.iter() {
            match self.mode {
                FanoutMode::Blocking => {
                    if tx.send(trade.clone()).await.is_ok() {
                        stats.delivered += 1;
                    } else {
                        stats.closed += 1;
                    }
                }
                FanoutMode::DropOnFull { .. } => match tx.try_send(trade.clone()) {
                    Ok(()) => stats.delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        stats.dropped += 1;
                        tracing::trace!(%id, "Subscriber buffer full, dropping trade");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => stats.closed += 1,
                },
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use tokio_stream::StreamExt;

    use super::*;

    fn trade(id: u64) -> AggTrade {
        let time = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        AggTrade {
            symbol: "BTCUSDT".to_string(),
            aggregate_id: id,
            price: Decimal::new(4_200_000, 2),
            quantity: Decimal::new(5, 1),
            first_trade_id: id,
            last_trade_id: id,
            trade_time: time,
            event_time: time,
            buyer_is_maker: false,
        }
    }

    #[tokio::test]
    async fn every_subscriber_receives_each_trade() {
        let registry = SubscriberRegistry::new(FanoutMode::DropOnFull { capacity: 8 });
        let mut a = registry.subscribe().await;
        let mut b = registry.subscribe().await;
        assert_ne!(a.id(), b.id());

        let stats = registry.publish(&trade(1)).await;
        assert_eq!(stats.delivered, 2);

        assert_eq!(a.recv().await.unwrap().aggregate_id, 1);
        assert_eq!(b.recv().await.unwrap().aggregate_id, 1);
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_is_noop() {
        let registry = SubscriberRegistry::default();
        assert_eq!(registry.publish(&trade(1)).await, PublishStats::default());
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let registry = SubscriberRegistry::new(FanoutMode::DropOnFull { capacity: 8 });
        let mut sub = registry.subscribe().await;

        registry.publish(&trade(1)).await;
        assert!(registry.unsubscribe(sub.id()).await);
        registry.publish(&trade(2)).await;

        assert_eq!(sub.recv().await.unwrap().aggregate_id, 1);
        assert!(sub.recv().await.is_none());
        assert_eq!(registry.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn unsubscribe_twice_is_noop() {
        let registry = SubscriberRegistry::default();
        let sub = registry.subscribe().await;
        assert!(registry.unsubscribe(sub.id()).await);
        assert!(!registry.unsubscribe(sub.id()).await);
    }

    #[tokio::test]
    async fn dropped_receiver_is_skipped() {
        let registry = SubscriberRegistry::default();
        let gone = registry.subscribe().await;
        let mut alive = registry.subscribe().await;
        drop(gone);

        let stats = registry.publish(&trade(7)).await;
        assert_eq!(stats.closed, 1);
        assert_eq!(stats.delivered, 1);
        assert_eq!(alive.recv().await.unwrap().aggregate_id, 7);
    }

    #[tokio::test]
    async fn drop_on_full_drops_only_for_slow_subscriber() {
        let registry = SubscriberRegistry::new(FanoutMode::DropOnFull { capacity: 1 });
        let mut slow = registry.subscribe().await;
        let mut fast = registry.subscribe().await;

        registry.publish(&trade(1)).await;
        assert_eq!(fast.recv().await.unwrap().aggregate_id, 1);

        let stats = registry.publish(&trade(2)).await;
        assert_eq!(stats, PublishStats { delivered: 1, dropped: 1, closed: 0 });

        assert_eq!(slow.recv().await.unwrap().aggregate_id, 1);
        assert_eq!(fast.recv().await.unwrap().aggregate_id, 2);
        assert!(slow.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn blocking_mode_waits_for_slow_subscriber() {
        let registry = Arc::new(SubscriberRegistry::new(FanoutMode::Blocking));
        let mut sub = registry.subscribe().await;

        registry.publish(&trade(1)).await;

        let publisher = Arc::clone(&registry);
        let pending = tokio::spawn(async move { publisher.publish(&trade(2)).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pending.is_finished());

        assert_eq!(sub.recv().await.unwrap().aggregate_id, 1);
        let stats = pending.await.unwrap();
        assert_eq!(stats.delivered, 1);
        assert_eq!(sub.recv().await.unwrap().aggregate_id, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribe_completes_once_stalled_subscription_is_dropped() {
        let registry = Arc::new(SubscriberRegistry::new(FanoutMode::Blocking));
        let sub = registry.subscribe().await;
        let id = sub.id();

        // Fill the single slot, then stall the next publish on it.
        registry.publish(&trade(1)).await;
        let publisher = Arc::clone(&registry);
        let pending_publish = tokio::spawn(async move { publisher.publish(&trade(2)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let remover = Arc::clone(&registry);
        let pending_unsubscribe = tokio::spawn(async move { remover.unsubscribe(id).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pending_publish.is_finished());
        assert!(!pending_unsubscribe.is_finished());

        drop(sub);

        let stats = pending_publish.await.unwrap();
        assert_eq!(stats.closed, 1);
        assert!(pending_unsubscribe.await.unwrap());
        assert_eq!(registry.subscriber_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribe_completes_while_subscription_drains() {
        let registry = Arc::new(SubscriberRegistry::new(FanoutMode::Blocking));
        let mut sub = registry.subscribe().await;
        let id = sub.id();

        registry.publish(&trade(1)).await;
        let publisher = Arc::clone(&registry);
        let pending_publish = tokio::spawn(async move { publisher.publish(&trade(2)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let remover = Arc::clone(&registry);
        let pending_unsubscribe = tokio::spawn(async move { remover.unsubscribe(id).await });

        assert_eq!(sub.recv().await.unwrap().aggregate_id, 1);
        assert_eq!(pending_publish.await.unwrap().delivered, 1);
        assert!(pending_unsubscribe.await.unwrap());

        // The trade buffered before removal is still readable.
        assert_eq!(sub.recv().await.unwrap().aggregate_id, 2);
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_subscribe_and_publish() {
        let registry = Arc::new(SubscriberRegistry::new(FanoutMode::DropOnFull {
            capacity: 256,
        }));

        let publisher = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                for id in 0..200 {
                    registry.publish(&trade(id)).await;
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut churners = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            churners.push(tokio::spawn(async move {
                for _ in 0..20 {
                    let sub = registry.subscribe().await;
                    let id = sub.id();
                    tokio::task::yield_now().await;
                    assert!(registry.unsubscribe(id).await);

                    // Nothing arrives after unsubscribe beyond what was buffered.
                    let received: Vec<_> = sub.into_stream().collect().await;
                    assert!(received.windows(2).all(|w| w[0].aggregate_id < w[1].aggregate_id));
                }
            }));
        }

        publisher.await.unwrap();
        for churner in churners {
            churner.await.unwrap();
        }
        assert_eq!(registry.subscriber_count().await, 0);
    }
}
