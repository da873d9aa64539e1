//! # Signal Publisher
//!
//! Publishing side of the UI signal bus.

use crate::events::{SignalFilter, UiSignal};
use crate::subscriber::{SignalStream, SignalSubscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Trait for publishing UI signals.
pub trait SignalPublisher: Send + Sync {
    /// Publish a signal.
    ///
    /// Returns the number of subscribers that received it.
    fn publish(&self, signal: UiSignal) -> usize;

    /// Total signals published.
    fn signals_published(&self) -> u64;
}

/// In-process signal bus.
///
/// Uses `tokio::sync::broadcast` so any number of UI consumers can listen.
/// Publishing never blocks and works from plain threads.
pub struct SignalBus {
    sender: broadcast::Sender<UiSignal>,

    signals_published: AtomicU64,

    capacity: usize,
}

impl SignalBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            signals_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to signals matching a filter.
    #[must_use]
    pub fn subscribe(&self, filter: SignalFilter) -> SignalSubscription {
        debug!(channels = ?filter.channels, "UI subscription created");
        SignalSubscription::new(self.sender.subscribe(), filter)
    }

    /// Stream of signals matching a filter.
    #[must_use]
    pub fn stream(&self, filter: SignalFilter) -> SignalStream {
        SignalStream::new(self.sender.subscribe(), filter)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalPublisher for SignalBus {
    fn publish(&self, signal: UiSignal) -> usize {
        let channel = signal.channel;
        self.signals_published.fetch_add(1, Ordering::Relaxed);

        match self.sender.send(signal) {
            Ok(receivers) => {
                trace!(channel, receivers, "UI signal published");
                receivers
            }
            Err(_) => {
                // Nobody listening is normal before the UI attaches.
                trace!(channel, "UI signal dropped (no subscribers)");
                0
            }
        }
    }

    fn signals_published(&self) -> u64 {
        self.signals_published.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_publish_no_subscribers() {
        let bus = SignalBus::new();
        assert_eq!(bus.publish(UiSignal::new(1, json!(1))), 0);
        assert_eq!(bus.signals_published(), 1);
    }

    #[test]
    fn test_publish_with_subscribers() {
        let bus = SignalBus::new();
        let _all = bus.subscribe(SignalFilter::all());
        let _some = bus.subscribe(SignalFilter::channels(vec![4]));

        assert_eq!(bus.publish(UiSignal::new(1, json!("x"))), 2);
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_default_bus() {
        let bus = SignalBus::default();
        assert_eq!(bus.capacity(), DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.signals_published(), 0);
    }
}
