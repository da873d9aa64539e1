//! # Signal Subscriber
//!
//! Receiving side of the UI signal bus.

use crate::events::{SignalFilter, UiSignal};
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The signal bus was dropped.
    #[error("Signal bus closed")]
    Closed,
}

/// A filtered subscription. Dropping it unsubscribes.
pub struct SignalSubscription {
    receiver: broadcast::Receiver<UiSignal>,
    filter: SignalFilter,
}

impl SignalSubscription {
    pub(crate) fn new(receiver: broadcast::Receiver<UiSignal>, filter: SignalFilter) -> Self {
        Self { receiver, filter }
    }

    /// Receive the next matching signal, or `None` once the bus is gone.
    ///
    /// A lagging subscriber skips the signals it missed.
    pub async fn recv(&mut self) -> Option<UiSignal> {
        loop {
            let signal = match self.receiver.recv().await {
                Ok(s) => s,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "UI subscriber lagged, signals dropped");
                    continue;
                }
            };

            if self.filter.matches(&signal) {
                return Some(signal);
            }
        }
    }

    /// Receive without waiting.
    pub fn try_recv(&mut self) -> Result<Option<UiSignal>, SubscriptionError> {
        loop {
            let signal = match self.receiver.try_recv() {
                Ok(s) => s,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };

            if self.filter.matches(&signal) {
                return Ok(Some(signal));
            }
        }
    }

    #[must_use]
    pub fn filter(&self) -> &SignalFilter {
        &self.filter
    }
}

/// Filtered stream of UI signals.
pub struct SignalStream {
    inner: BroadcastStream<UiSignal>,
    filter: SignalFilter,
}

impl SignalStream {
    pub(crate) fn new(receiver: broadcast::Receiver<UiSignal>, filter: SignalFilter) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
            filter,
        }
    }

    #[must_use]
    pub fn filter(&self) -> &SignalFilter {
        &self.filter
    }
}

impl Stream for SignalStream {
    type Item = UiSignal;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(signal))) => {
                    if self.filter.matches(&signal) {
                        return Poll::Ready(Some(signal));
                    }
                }
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(count)))) => {
                    debug!(lagged = count, "UI stream lagged, signals dropped");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
