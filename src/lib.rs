#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![deny(clippy::all)]

mod autofire;
/// Error kinds raised by net construction and simulation.
pub mod error;
/// Columnar collectors built on top of the observer interfaces.
pub mod meters;
/// The net itself: places, transitions, arcs, and tokens.
pub mod net;
/// Observer and plugin interfaces for reacting to net activity.
pub mod observer;
mod scheduler;
