//! # arinc-core
//!
//! Core flight telemetry model and simulator.
//!
//! This crate provides:
//! - The six-field `FlightSample` and its per-field envelopes
//! - `FlightDynamics`, a dead-reckoning simulator with bounded history
//! - `WaypointNavigator`, an optional heading controller
//! - Runtime settings
//!
//! This crate is intentionally runtime-agnostic and contains no async code.

pub mod config;
pub mod model;
pub mod navigation;
pub mod simulator;

pub use config::{ConfigError, RateMode, ServerSettings, Settings, SimulationSettings};
pub use model::{Envelope, Field, FlightSample};
pub use navigation::{Waypoint, WaypointNavigator};
pub use simulator::{FlightDynamics, KinematicState, Perturbation, RateParameters};
