//! Bridge module: forwards module output onto UI channels.

use super::parse_settings;
use crate::module::{MethodTable, Module, ModuleContext};
use serde::Deserialize;
use shared_types::{ModuleError, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use tracing::warn;

/// Channel alarms are published on unless configured otherwise.
pub const ALARM_CHANNEL: u32 = 1;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct UiSettings {
    alarm_channel: u32,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            alarm_channel: ALARM_CHANNEL,
        }
    }
}

pub struct UiModule {
    ctx: OnceLock<ModuleContext>,
    alarm_channel: AtomicU32,
}

impl Default for UiModule {
    fn default() -> Self {
        Self {
            ctx: OnceLock::new(),
            alarm_channel: AtomicU32::new(ALARM_CHANNEL),
        }
    }
}

impl UiModule {
    /// `[channel, value]` → UI.
    fn to_ui(&self, channel: Value, value: Value) {
        let Some(channel) = channel.as_u64().and_then(|c| u32::try_from(c).ok()) else {
            warn!(%channel, "toUi needs a numeric channel");
            return;
        };
        if let Some(ctx) = self.ctx.get() {
            ctx.publish_ui(channel, value);
        }
    }

    fn notify_alarm(&self, value: Value) {
        if let Some(ctx) = self.ctx.get() {
            ctx.publish_ui(self.alarm_channel.load(Ordering::Relaxed), value);
        }
    }
}

impl Module for UiModule {
    fn methods() -> MethodTable<Self> {
        MethodTable::new()
            .pair("toUi", Self::to_ui)
            .consume("notifyAlarm", Self::notify_alarm)
    }

    fn start(&self, ctx: ModuleContext, settings: &Value) -> Result<(), ModuleError> {
        let settings: UiSettings = parse_settings(ctx.name(), settings)?;
        self.alarm_channel
            .store(settings.alarm_channel, Ordering::Relaxed);
        let _ = self.ctx.set(ctx);
        Ok(())
    }
}
