//! Bounded in-memory event log.

use super::parse_settings;
use crate::module::{MethodTable, Module, ModuleContext};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use shared_types::{ModuleError, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

const DEFAULT_CAPACITY: usize = 1000;
const DEFAULT_RECENT: usize = 10;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RecorderSettings {
    capacity: usize,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Keeps the newest `capacity` records; older ones fall off the front.
pub struct Recorder {
    records: Mutex<VecDeque<Value>>,
    capacity: AtomicUsize,
}

impl Default for Recorder {
    fn default() -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            capacity: AtomicUsize::new(DEFAULT_CAPACITY),
        }
    }
}

impl Recorder {
    fn on_record(&self, value: Value) {
        self.push(value);
    }

    fn notify_alarm(&self, value: Value) {
        self.push(json!({ "alarm": value }));
    }

    fn count(&self, _value: Value) -> Value {
        json!(self.records.lock().len())
    }

    /// Newest `n` records, oldest first. `n` defaults to 10.
    fn recent(&self, value: Value) -> Value {
        let n = value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(DEFAULT_RECENT);
        let records = self.records.lock();
        let skip = records.len().saturating_sub(n);
        Value::Array(records.iter().skip(skip).cloned().collect())
    }

    fn clear(&self) {
        self.records.lock().clear();
    }

    fn push(&self, value: Value) {
        let capacity = self.capacity.load(Ordering::Relaxed);
        let mut records = self.records.lock();
        records.push_back(value);
        while records.len() > capacity {
            records.pop_front();
        }
    }
}

impl Module for Recorder {
    fn methods() -> MethodTable<Self> {
        MethodTable::new()
            .consume("onRecord", Self::on_record)
            .consume("notifyAlarm", Self::notify_alarm)
            .query("count", Self::count)
            .query("recent", Self::recent)
            .notify("clear", Self::clear)
    }

    fn start(&self, ctx: ModuleContext, settings: &Value) -> Result<(), ModuleError> {
        let settings: RecorderSettings = parse_settings(ctx.name(), settings)?;
        if settings.capacity == 0 {
            return Err(ModuleError::settings(ctx.name(), "capacity must be greater than 0"));
        }
        self.capacity.store(settings.capacity, Ordering::Relaxed);
        Ok(())
    }
}
