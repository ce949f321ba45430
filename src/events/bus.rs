//! Event Bus (spec.md §4.8): type-keyed subscription, handlers plus
//! channels, non-blocking fan-out.

use crate::models::{TradingEvent, TradingEventKind};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::warn;

pub type Handler = Arc<dyn Fn(&TradingEvent) + Send + Sync>;

#[derive(Default)]
struct Subscriptions {
    handlers: HashMap<TradingEventKind, Vec<Handler>>,
    channels: HashMap<TradingEventKind, Vec<mpsc::Sender<TradingEvent>>>,
}

/// Type-keyed pub/sub. Publish delivers concurrently to handlers and
/// non-blocking to channels; full channels drop with a warning. Handler
/// panics are caught and logged — the subscription survives.
#[derive(Default)]
pub struct EventBus {
    subscriptions: RwLock<Subscriptions>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe_handler(&self, kind: TradingEventKind, handler: Handler) {
        let mut subs = self.subscriptions.write().await;
        subs.handlers.entry(kind).or_default().push(handler);
    }

    /// Returns a bounded receiver that will carry future events of `kind`.
    pub async fn subscribe_channel(&self, kind: TradingEventKind, capacity: usize) -> mpsc::Receiver<TradingEvent> {
        let (tx, rx) = mpsc::channel(capacity);
        let mut subs = self.subscriptions.write().await;
        subs.channels.entry(kind).or_default().push(tx);
        rx
    }

    pub async fn publish(&self, event: TradingEvent) {
        let subs = self.subscriptions.read().await;

        if let Some(handlers) = subs.handlers.get(&event.kind) {
            for handler in handlers {
                let handler = handler.clone();
                let event_for_handler = event.clone();
                let result = std::panic::catch_unwind(AssertUnwindSafe(|| handler(&event_for_handler)));
                if result.is_err() {
                    warn!(kind = ?event.kind, "event bus handler panicked; subscription kept alive");
                }
            }
        }

        if let Some(channels) = subs.channels.get(&event.kind) {
            for channel in channels {
                if channel.try_send(event.clone()).is_err() {
                    warn!(kind = ?event.kind, "event bus channel full or closed; dropping event for subscriber");
                }
            }
        }
    }

    /// Cancels all channels and clears subscriptions.
    pub async fn close(&self) {
        let mut subs = self.subscriptions.write().await;
        subs.handlers.clear();
        subs.channels.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventPayload;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_event() -> TradingEvent {
        TradingEvent::new(
            TradingEventKind::PriceUpdate,
            EventPayload::PriceUpdate {
                symbol: "BTC/USDT".to_string(),
                price: rust_decimal_macros::dec!(50000),
                volume: rust_decimal_macros::dec!(10),
            },
        )
    }

    /// P6 — a subscription registered before publish receives the event.
    #[tokio::test]
    async fn p6_subscribed_channel_receives_matching_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_channel(TradingEventKind::PriceUpdate, 10).await;
        bus.publish(sample_event()).await;
        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, TradingEventKind::PriceUpdate);
    }

    #[tokio::test]
    async fn p6_unsubscribed_kind_receives_nothing() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_channel(TradingEventKind::OrderFilled, 10).await;
        bus.publish(sample_event()).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_channel_drops_without_panicking() {
        let bus = EventBus::new();
        let _rx = bus.subscribe_channel(TradingEventKind::PriceUpdate, 1).await;
        bus.publish(sample_event()).await;
        bus.publish(sample_event()).await;
    }

    #[tokio::test]
    async fn panicking_handler_does_not_remove_subscription() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        bus.subscribe_handler(
            TradingEventKind::PriceUpdate,
            Arc::new(move |_event| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                panic!("boom");
            }),
        )
        .await;
        bus.publish(sample_event()).await;
        bus.publish(sample_event()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
