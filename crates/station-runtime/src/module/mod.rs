//! # Module Base
//!
//! Every station component (camera, database, network link, UI) is a
//! [`Module`]. The runtime gives each instance a home thread and exposes its
//! named methods through a [`ModuleHandle`].
//!
//! ## Calling Conventions
//!
//! | Call | Runs on | Caller waits |
//! |------|---------|--------------|
//! | `invoke_async` | pool worker | no |
//! | `post` | home thread | no |
//! | `invoke_sync` | home thread (direct if already there) | yes, up to the sync timeout |
//!
//! ## Lifecycle
//!
//! ```text
//! Created ──start()──▶ Started ──stop()──▶ Stopped
//!    └──────────────stop()─────────────────▲
//! ```
//!
//! Modules take `&self` everywhere and keep their state behind interior
//! mutability, so a handler can call back into its own module from the
//! home thread without deadlocking.

mod context;
mod host;
mod methods;

pub use context::ModuleContext;
pub use host::{Fanout, ModuleHandle};
pub use methods::{HandlerTable, Method, MethodTable};

use shared_bus::RouteTable;
use shared_types::{ModuleError, Value};

/// A station component.
pub trait Module: Send + Sync + 'static {
    /// Named methods and emitted events. Built once per instance, before
    /// `start`.
    fn methods() -> MethodTable<Self>
    where
        Self: Sized,
    {
        MethodTable::new()
    }

    /// Receive the capability entries controllers registered for this
    /// instance. Called once, before `start`.
    fn customize(&self, _routes: &RouteTable) {}

    /// Begin work. `settings` is the module's block from the station config.
    fn start(&self, ctx: ModuleContext, settings: &Value) -> Result<(), ModuleError>;

    /// Release resources. Not called if the module never started.
    fn stop(&self) -> Result<(), ModuleError> {
        Ok(())
    }
}
