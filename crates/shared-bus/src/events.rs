//! # UI Signals
//!
//! Values flowing from modules back to the UI layer, addressed by a small
//! integer channel id.

use serde::{Deserialize, Serialize};
use shared_types::Value;

/// One value published on a UI channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiSignal {
    /// UI channel identifier.
    pub channel: u32,
    /// Payload.
    pub value: Value,
}

impl UiSignal {
    #[must_use]
    pub fn new(channel: u32, value: Value) -> Self {
        Self { channel, value }
    }
}

/// Filter for UI signal subscriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalFilter {
    /// Channels to include. Empty means all channels.
    pub channels: Vec<u32>,
}

impl SignalFilter {
    /// Accept every channel.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Accept only the listed channels.
    #[must_use]
    pub fn channels(channels: Vec<u32>) -> Self {
        Self { channels }
    }

    #[must_use]
    pub fn matches(&self, signal: &UiSignal) -> bool {
        self.channels.is_empty() || self.channels.contains(&signal.channel)
    }
}
