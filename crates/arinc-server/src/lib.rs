//! # arinc-server
//!
//! Tick-driven telemetry broadcaster.
//!
//! Each tick advances the flight simulator, encodes the new sample into
//! ARINC 429 words and fans the result out to:
//! - live subscribers, each behind its own bounded channel
//! - enabled external HTTP sinks, as concurrent best-effort POSTs
//!
//! A failing subscriber or sink never affects the others or the tick loop.

pub mod broadcaster;
pub mod sinks;
pub mod statistics;
pub mod subscription;

pub use arinc_core::{FlightDynamics, FlightSample, SimulationSettings};
pub use broadcaster::{BroadcastError, BroadcasterHandle, TelemetryBroadcaster, TelemetryFrame, TickReport};
pub use sinks::{ExternalSinkError, RegistryError, SinkDispatcher, SinkRegistry};
pub use statistics::{BroadcastStatistics, StatisticsCollector};
pub use subscription::{SubscriberId, SubscriberRegistry, SubscriberSendError, Subscription};
