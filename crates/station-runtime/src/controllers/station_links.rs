//! Default wiring between the built-in modules.

use crate::container::Registrar;

pub fn register(registrar: &mut Registrar<'_>) {
    registrar.connect("heartbeat", "tick", "recorder", "onRecord");
    registrar.connect("monitor", "alarm", "recorder", "onRecord");
}
