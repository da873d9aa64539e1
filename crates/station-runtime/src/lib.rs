//! # Station Runtime Library
//!
//! Module registry and dispatch core for the monitoring station. The
//! `station` binary in `main.rs` is a thin shell around [`Station::bootstrap`].
//!
//! ## Layout
//!
//! - `pool/` - bounded background workers and named recurring timers
//! - `module/` - the `Module` trait, home threads, sync/async invocation
//! - `registry/` - live name → module table and status report
//! - `container/` - config, module factory, controller registrar
//! - `wiring/` - resolved connections, notify broadcast, late-bound lookup
//! - `bridge/` - UI actions in, UI signals out
//! - `modules/` - built-in module types
//! - `controllers/` - built-in capability and connection registrations

#![allow(clippy::type_complexity)]
#![allow(clippy::module_name_repetitions)]

pub mod bridge;
pub mod container;
pub mod controllers;
pub mod module;
pub mod modules;
pub mod pool;
pub mod registry;
pub mod station;
pub mod wiring;

pub use bridge::{UiBridge, UI_MODULE};
pub use container::{AppSettings, ControllerFn, ModuleEntry, ModuleFactory, Registrar, StationConfig};
pub use module::{Fanout, HandlerTable, MethodTable, Module, ModuleContext, ModuleHandle};
pub use pool::{ConcurrencyPool, PoolError};
pub use registry::ModuleRegistry;
pub use station::{ConnectReport, Station};
pub use wiring::{EventRouter, StationLink};
