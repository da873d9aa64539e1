//! # Shared Bus - Registration and Signalling Infrastructure
//!
//! Everything controllers and modules share before and after startup.
//!
//! ## Components
//!
//! ```text
//!  controllers ──register()──▶ CapabilityRegistry ──freeze()──▶ FrozenCapabilities
//!                                                                  │ entries_for(owner)
//!  controllers ──declare()───▶ ConnectionTable                     ▼
//!                                   │ resolved after all      module RouteTable
//!                                   ▼ modules exist
//!                              live links
//!
//!  modules ──publish()──▶ SignalBus ──subscribe()──▶ UI layer
//! ```
//!
//! - **Handler**: closed set of callable shapes (the invocation adapter)
//! - **Capability registry**: append-only, frozen before the first module is created
//! - **Connection table**: declarations resolved only once every module exists
//! - **Signal bus**: module → UI values keyed by channel id

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod capability;
pub mod connections;
pub mod events;
pub mod handler;
pub mod publisher;
pub mod subscriber;

pub use capability::{CapabilityEntry, CapabilityRegistry, FrozenCapabilities, RouteTable};
pub use connections::{ConnectionDeclaration, ConnectionTable, Delivery};
pub use events::{SignalFilter, UiSignal};
pub use handler::{Handler, Shape};
pub use publisher::{SignalBus, SignalPublisher};
pub use subscriber::{SignalStream, SignalSubscription, SubscriptionError};

/// Maximum UI signals buffered per subscriber before the slowest one lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
