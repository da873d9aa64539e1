//! UI actions for the alarm panel.

use crate::bridge::UI_MODULE;
use crate::container::Registrar;
use shared_bus::Handler;
use shared_types::Value;
use tracing::warn;

/// Operator acknowledges the active alarms.
pub const ACTION_ACKNOWLEDGE: u32 = 1;
/// Ask for the number of recorded events; answered inline and on
/// [`CHANNEL_RECORD_COUNT`].
pub const ACTION_RECORD_COUNT: u32 = 2;
/// Feed a manual sample to the monitor.
pub const ACTION_INJECT_SAMPLE: u32 = 3;

pub const CHANNEL_RECORD_COUNT: u32 = 2;

pub fn register(registrar: &mut Registrar<'_>) {
    let link = registrar.link();
    registrar.register_action(
        UI_MODULE,
        ACTION_ACKNOWLEDGE,
        Handler::consume(move |value| {
            link.notify("Acknowledge", value);
        }),
        true,
    );

    let link = registrar.link();
    registrar.register_action(
        UI_MODULE,
        ACTION_RECORD_COUNT,
        Handler::query(move |_| match link.invoke_sync("recorder", "count", Value::Null) {
            Ok(count) => {
                link.publish_ui(CHANNEL_RECORD_COUNT, count.clone());
                count
            }
            Err(e) => {
                warn!(error = %e, "Record count unavailable");
                Value::Null
            }
        }),
        false,
    );

    let link = registrar.link();
    registrar.register_action(
        UI_MODULE,
        ACTION_INJECT_SAMPLE,
        Handler::consume(move |value| {
            if let Err(e) = link.invoke_async("monitor", "onSample", value) {
                warn!(error = %e, "Manual sample not delivered");
            }
        }),
        true,
    );
}
