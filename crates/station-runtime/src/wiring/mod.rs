//! # Module Wiring
//!
//! Everything that carries a call from one module to another once the
//! modules exist.
//!
//! ## Wiring Responsibilities
//!
//! 1. **Connections**: `source.event → target.handler` links, queued or blocking
//! 2. **Notify**: type-keyed broadcast to every `notify<Type>` handler
//! 3. **Lookup**: [`StationLink`] resolves module names at call time

pub mod event_routing;
pub mod station_link;

pub use event_routing::{notify_handler_name, EventRouter};
pub use station_link::StationLink;
