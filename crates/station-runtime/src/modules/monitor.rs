//! Threshold monitor.
//!
//! Every sample is re-emitted as `sample`. A sample above the threshold is
//! also emitted as `alarm` and broadcast to every `notifyAlarm` handler.

use super::parse_settings;
use crate::module::{MethodTable, Module, ModuleContext};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::json;
use shared_types::{ModuleError, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
#[serde(default)]
struct MonitorSettings {
    threshold: f64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self { threshold: 100.0 }
    }
}

pub struct Monitor {
    ctx: OnceLock<ModuleContext>,
    threshold: RwLock<f64>,
    last: RwLock<Option<f64>>,
    alarms: AtomicU64,
}

impl Default for Monitor {
    fn default() -> Self {
        Self {
            ctx: OnceLock::new(),
            threshold: RwLock::new(MonitorSettings::default().threshold),
            last: RwLock::new(None),
            alarms: AtomicU64::new(0),
        }
    }
}

impl Monitor {
    fn on_sample(&self, value: Value) {
        let Some(reading) = reading(&value) else {
            debug!(%value, "Ignoring non-numeric sample");
            return;
        };
        *self.last.write() = Some(reading);

        let Some(ctx) = self.ctx.get() else {
            return;
        };
        ctx.emit("sample", json!(reading));

        let threshold = *self.threshold.read();
        if reading > threshold {
            self.alarms.fetch_add(1, Ordering::SeqCst);
            warn!(module = ctx.name(), reading, threshold, "Threshold exceeded");

            let alarm = json!({
                "source": ctx.name(),
                "value": reading,
                "threshold": threshold,
            });
            ctx.emit("alarm", alarm.clone());
            ctx.notify("Alarm", alarm);
        }
    }

    fn set_threshold(&self, value: Value) {
        match value.as_f64() {
            Some(threshold) => *self.threshold.write() = threshold,
            None => debug!(%value, "Ignoring non-numeric threshold"),
        }
    }

    fn last_sample(&self, _value: Value) -> Value {
        json!(*self.last.read())
    }

    fn alarm_count(&self, _value: Value) -> Value {
        json!(self.alarms.load(Ordering::SeqCst))
    }
}

/// A bare number or `{"value": n}`.
fn reading(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.get("value").and_then(Value::as_f64))
}

impl Module for Monitor {
    fn methods() -> MethodTable<Self> {
        MethodTable::new()
            .consume("onSample", Self::on_sample)
            .consume("setThreshold", Self::set_threshold)
            .query("lastSample", Self::last_sample)
            .query("alarmCount", Self::alarm_count)
            .event("sample")
            .event("alarm")
    }

    fn start(&self, ctx: ModuleContext, settings: &Value) -> Result<(), ModuleError> {
        let settings: MonitorSettings = parse_settings(ctx.name(), settings)?;
        if !settings.threshold.is_finite() {
            return Err(ModuleError::settings(ctx.name(), "threshold must be finite"));
        }

        *self.threshold.write() = settings.threshold;
        let _ = self.ctx.set(ctx);
        Ok(())
    }
}
