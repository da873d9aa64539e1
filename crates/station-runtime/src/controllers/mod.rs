//! # Controllers
//!
//! Startup-time registration code. Each controller contributes capability
//! entries and connection declarations through a [`Registrar`]; none of them
//! may assume any module exists yet.
//!
//! [`Registrar`]: crate::container::Registrar

pub mod alarm_panel;
pub mod station_links;

use crate::container::ControllerFn;

/// Every controller, run in this order by the binary.
pub const ALL: &[ControllerFn] = &[alarm_panel::register, station_links::register];
