//! # Shared Types Crate
//!
//! Cross-crate types for the station core.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: route keys, lifecycle states and error types
//!   used by both the registry and the runtime live here.
//! - **Status, not unwinding**: dispatch failures are values. Only startup
//!   errors may end the process, and only the binary decides that.

pub mod errors;
pub mod lifecycle;
pub mod route;
pub mod value;

pub use errors::*;
pub use lifecycle::ModuleState;
pub use route::{RouteKey, ROUTE_SEPARATOR};
pub use value::{zero_value, Value};
