//! Modules that ship with the runtime.
//!
//! | Type | Handlers | Events |
//! |------|----------|--------|
//! | `heartbeat` | `count`, `reset` | `tick` |
//! | `monitor` | `onSample`, `setThreshold`, `lastSample`, `alarmCount` | `sample`, `alarm` |
//! | `recorder` | `onRecord`, `notifyAlarm`, `count`, `recent`, `clear` | |
//! | `ui` | `toUi`, `notifyAlarm` | |

pub mod heartbeat;
pub mod monitor;
pub mod recorder;
pub mod ui;

pub use heartbeat::Heartbeat;
pub use monitor::Monitor;
pub use recorder::Recorder;
pub use ui::UiModule;

use crate::container::ModuleFactory;
use serde::de::DeserializeOwned;
use shared_types::{ModuleError, Value};

/// Register every built-in module type under its type name.
pub fn register_builtin(factory: &mut ModuleFactory) {
    factory.register("heartbeat", Heartbeat::default);
    factory.register("monitor", Monitor::default);
    factory.register("recorder", Recorder::default);
    factory.register("ui", UiModule::default);
}

/// Decode a module's settings block. A missing block gives the defaults.
fn parse_settings<T>(module: &str, settings: &Value) -> Result<T, ModuleError>
where
    T: DeserializeOwned + Default,
{
    if settings.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(settings.clone()).map_err(|e| ModuleError::settings(module, e.to_string()))
}
